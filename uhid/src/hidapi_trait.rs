use crate::{Error, FeatureReport, Protocol};
use hidapi::{HidApi, HidDevice};
use std::ffi::CString;

impl FeatureReport for HidDevice {
    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize, Error> {
        HidDevice::get_feature_report(self, buf).map_err(|e| e.into())
    }
    fn send_feature_report(&self, data: &[u8]) -> Result<usize, Error> {
        HidDevice::send_feature_report(self, data)?;
        Ok(data.len())
    }
}

impl From<hidapi::HidError> for Error {
    fn from(err: hidapi::HidError) -> Self {
        Error::Transport(err.to_string())
    }
}

/// Which USB devices to consider and which protocol they speak.
///
/// String filters left as `None` match anything.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMatch {
    pub vendor: u16,
    pub product: u16,
    pub protocol: Protocol,
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
    pub serial: Option<String>,
}

impl DeviceMatch {
    pub fn new(vendor: u16, product: u16, protocol: Protocol) -> Self {
        DeviceMatch {
            vendor,
            product,
            protocol,
            manufacturer: None,
            product_name: None,
            serial: None,
        }
    }

    fn manufacturer(mut self, manufacturer: &str) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    pub fn matches(&self, device: &hidapi::DeviceInfo) -> bool {
        device.vendor_id() == self.vendor
            && device.product_id() == self.product
            && string_matches(&self.manufacturer, device.manufacturer_string())
            && string_matches(&self.product_name, device.product_string())
            && string_matches(&self.serial, device.serial_number())
    }
}

// a device without the string never matches a filter asking for one
fn string_matches(filter: &Option<String>, value: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(filter) => value == Some(filter.as_str()),
    }
}

/// Bootloaders known to speak one of the protocols.
pub fn compatible_devices() -> Vec<DeviceMatch> {
    vec![
        DeviceMatch::new(0x1d50, 0x6032, Protocol::Uhid).manufacturer("uHID"),
        DeviceMatch::new(0x16c0, 0x05df, Protocol::Uhid).manufacturer("uhid.ncrmnt.org"),
        DeviceMatch::new(0x16c0, 0x05df, Protocol::Uisp).manufacturer("www.ncrmnt.org"),
    ]
}

/// Opens the first connected device accepted by any of `matches`, in device list order.
pub fn open(api: &HidApi, matches: &[DeviceMatch]) -> Result<(HidDevice, Protocol), Error> {
    for device in api.device_list() {
        if let Some(m) = matches.iter().find(|m| m.matches(device)) {
            log::info!(
                "found {:04x}:{:04x} {:?} {:?} at {:?}",
                device.vendor_id(),
                device.product_id(),
                device.manufacturer_string(),
                device.product_string(),
                device.path()
            );
            let d = device.open_device(api)?;
            return Ok((d, m.protocol));
        }
    }

    Err(Error::DeviceNotFound)
}

/// Opens the device at a platform specific `path`, e.g. a hidraw node.
pub fn open_path(api: &HidApi, path: &str) -> Result<HidDevice, Error> {
    let path = CString::new(path)
        .map_err(|_| Error::Transport(format!("invalid device path {:?}", path)))?;

    Ok(api.open_path(&path)?)
}
