use crate::{Error, FeatureReport};
use core::fmt;
use core::str::FromStr;
use scroll::{ctx, Pread, LE};
use std::borrow::Cow;

/// Width of the name field of a partition record, terminating NUL included.
pub const PART_NAME_LEN: usize = 8;

/// Packed size of one partition record on the wire.
pub const PART_INFO_SIZE: usize = 15;

/// Largest feature report we ask the device for.
pub const MAX_REPORT_SIZE: usize = 255;

/// Report id used to hand control over to the application.
pub const REPORT_ID_RUN: u8 = 0;

/// Revision of the loader protocol. Decides the layout of the device info record and
/// the report ids partitions are reached through.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Protocol {
    /// Current loaders. The info record sits on report 1 and carries a reserved byte
    /// after the report id; partition n is reached on report n + 1.
    Uhid,
    /// uISP era loaders. Info on report 0, three byte header, partition n on report n.
    Uisp,
}

impl Protocol {
    pub fn info_report_id(self) -> u8 {
        match self {
            Protocol::Uhid => 1,
            Protocol::Uisp => 0,
        }
    }

    /// Bytes in front of the first partition record.
    pub fn header_size(self) -> usize {
        match self {
            Protocol::Uhid => 4,
            Protocol::Uisp => 3,
        }
    }

    /// Report id of the 1-based partition `part`.
    pub fn part_report_id(self, part: usize) -> u8 {
        match self {
            Protocol::Uhid => (part + 1) as u8,
            Protocol::Uisp => part as u8,
        }
    }

    /// Feature report asking the loader to start the application found in the 1-based
    /// partition `part`.
    pub fn run_request(self, part: usize) -> Vec<u8> {
        match self {
            Protocol::Uhid => vec![REPORT_ID_RUN, (part - 1) as u8],
            Protocol::Uisp => vec![REPORT_ID_RUN],
        }
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Uhid
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uhid" => Ok(Protocol::Uhid),
            "uisp" => Ok(Protocol::Uisp),
            _ => Err(format!("unknown protocol {:?}, expected uhid or uisp", s)),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Uhid => f.write_str("uhid"),
            Protocol::Uisp => f.write_str("uisp"),
        }
    }
}

/// One memory region of the target, as described by the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionInfo {
    /// 1-based position in the partition table.
    pub index: usize,
    /// Report id the partition is transferred through.
    pub report_id: u8,
    /// Erase/program granularity.
    pub page_size: u16,
    pub size: u32,
    /// Payload bytes per feature report.
    pub io_size: u8,
    /// Always NUL terminated, the last byte is cleared on decode.
    pub name: [u8; PART_NAME_LEN],
}

impl PartitionInfo {
    /// Name up to the first NUL.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(PART_NAME_LEN);
        &self.name[..end]
    }

    /// Rejects records a transfer could not make progress with.
    pub fn check(&self) -> Result<(), Error> {
        if self.page_size == 0 {
            return Err(Error::InvalidPartitionMetadata {
                part: self.index,
                reason: "page size is 0",
            });
        }
        if self.io_size == 0 {
            return Err(Error::InvalidPartitionMetadata {
                part: self.index,
                reason: "io size is 0",
            });
        }
        Ok(())
    }
}

// index and report_id depend on the position in the table, DeviceInfo fills them in
impl<'a> ctx::TryFromCtx<'a, scroll::Endian> for PartitionInfo {
    type Error = Error;
    fn try_from_ctx(this: &'a [u8], le: scroll::Endian) -> Result<(Self, usize), Self::Error> {
        if this.len() < PART_INFO_SIZE {
            return Err(Error::ShortRead {
                expected: PART_INFO_SIZE,
                actual: this.len(),
            });
        }

        let mut offset = 0;
        let page_size = this.gread_with::<u16>(&mut offset, le)?;
        let size = this.gread_with::<u32>(&mut offset, le)?;
        let io_size = this.gread_with::<u8>(&mut offset, le)?;
        let mut name = [0_u8; PART_NAME_LEN];
        this.gread_inout_with(&mut offset, &mut name[..], le)?;
        name[PART_NAME_LEN - 1] = 0;

        Ok((
            PartitionInfo {
                index: 0,
                report_id: 0,
                page_size,
                size,
                io_size,
                name,
            },
            offset,
        ))
    }
}

/// The loader's description of itself. Read it fresh for every session, the layout can
/// change between loader versions.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub protocol: Protocol,
    pub report_id: u8,
    pub num_parts: u8,
    /// CPU clock in tenths of a MHz.
    pub cpu_freq_raw: u8,
    pub parts: Vec<PartitionInfo>,
}

impl DeviceInfo {
    /// Decodes a raw info report as laid out by `protocol`.
    pub fn parse(bytes: &[u8], protocol: Protocol) -> Result<DeviceInfo, Error> {
        bytes.pread_with(0, protocol)
    }

    pub fn cpu_freq_hz(&self) -> u32 {
        u32::from(self.cpu_freq_raw) * 100_000
    }

    pub fn cpu_freq_mhz(&self) -> f32 {
        f32::from(self.cpu_freq_raw) / 10.0
    }

    /// Partition by 1-based index, `1 <= part <= num_parts`.
    pub fn partition(&self, part: usize) -> Result<&PartitionInfo, Error> {
        if part == 0 || part > self.parts.len() {
            return Err(Error::InvalidPartition(part));
        }
        Ok(&self.parts[part - 1])
    }

    /// 1-based index of the partition called exactly `name`.
    pub fn lookup_partition(&self, name: &str) -> Result<usize, Error> {
        self.parts
            .iter()
            .find(|p| p.name_bytes() == name.as_bytes())
            .map(|p| p.index)
            .ok_or_else(|| Error::PartitionNotFound(name.into()))
    }
}

impl<'a> ctx::TryFromCtx<'a, Protocol> for DeviceInfo {
    type Error = Error;
    fn try_from_ctx(this: &'a [u8], protocol: Protocol) -> Result<(Self, usize), Self::Error> {
        let header = protocol.header_size();
        if this.len() < header {
            return Err(Error::ShortRead {
                expected: header,
                actual: this.len(),
            });
        }

        let mut offset = 0;
        let report_id = this.gread_with::<u8>(&mut offset, LE)?;
        if protocol == Protocol::Uhid {
            // reserved, left over from early hidapi firmware
            offset += 1;
        }
        let num_parts = this.gread_with::<u8>(&mut offset, LE)?;
        let cpu_freq_raw = this.gread_with::<u8>(&mut offset, LE)?;

        let expected = header + usize::from(num_parts) * PART_INFO_SIZE;
        if this.len() < expected {
            return Err(Error::ShortRead {
                expected,
                actual: this.len(),
            });
        }

        let mut parts = Vec::with_capacity(usize::from(num_parts));
        for index in 1..=usize::from(num_parts) {
            let mut part = this.gread_with::<PartitionInfo>(&mut offset, LE)?;
            part.index = index;
            part.report_id = protocol.part_report_id(index);
            parts.push(part);
        }

        Ok((
            DeviceInfo {
                protocol,
                report_id,
                num_parts,
                cpu_freq_raw,
                parts,
            },
            offset,
        ))
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Partitions:        {}", self.num_parts)?;
        writeln!(f, "CPU Frequency:     {:.1} MHz", self.cpu_freq_mhz())?;
        for p in &self.parts {
            writeln!(
                f,
                "{}. {} {} bytes ({} byte pages, {} bytes per packet)",
                p.index,
                p.name(),
                p.size,
                p.page_size,
                p.io_size
            )?;
        }
        Ok(())
    }
}

/// Reads the device info record. Nothing is cached, every call goes to the device.
pub fn read_info<T: FeatureReport + ?Sized>(d: &T, protocol: Protocol) -> Result<DeviceInfo, Error> {
    let mut buffer = [0_u8; MAX_REPORT_SIZE];
    buffer[0] = protocol.info_report_id();

    let len = d.get_feature_report(&mut buffer)?.min(MAX_REPORT_SIZE);
    log::debug!("info report: {:02X?}", &buffer[..len]);

    DeviceInfo::parse(&buffer[..len], protocol)
}

/// Requests the info record only for its side effect: the loader rewinds every
/// partition's transfer position to offset 0. The reply is discarded.
pub fn rewind<T: FeatureReport + ?Sized>(d: &T, protocol: Protocol) -> Result<(), Error> {
    let mut buffer = [0_u8; MAX_REPORT_SIZE];
    buffer[0] = protocol.info_report_id();

    d.get_feature_report(&mut buffer)?;
    Ok(())
}

/// A partition picked on the command line, by 1-based index or by name.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionHandle {
    Index(usize),
    Name(String),
}

impl PartitionHandle {
    /// 1-based index of the partition in `info`.
    pub fn resolve(&self, info: &DeviceInfo) -> Result<usize, Error> {
        match self {
            PartitionHandle::Index(part) => info.partition(*part).map(|p| p.index),
            PartitionHandle::Name(name) => info.lookup_partition(name),
        }
    }
}

impl FromStr for PartitionHandle {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(part) = s.parse() {
                return Ok(PartitionHandle::Index(part));
            }
        }
        Ok(PartitionHandle::Name(s.into()))
    }
}
