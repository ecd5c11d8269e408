use crate::{DeviceInfo, Error, FeatureReport};

/// Asks the loader to start the application in the 1-based partition `part`.
///
/// The device resets right away, the handle is of no use afterwards.
pub fn run_partition<T: FeatureReport + ?Sized>(
    d: &T,
    info: &DeviceInfo,
    part: usize,
) -> Result<(), Error> {
    let partition = info.partition(part)?;
    log::info!("Starting application in partition {}", partition.name());

    d.send_feature_report(&info.protocol.run_request(partition.index))?;
    Ok(())
}
