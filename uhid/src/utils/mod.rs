use crate::{
    read_partition, verify_partition, write_partition, DeviceInfo, Error, FeatureReport,
    FirmwareImage, Progress, Verification, WriteSummary,
};
use std::path::Path;

/// Loads `path` (binary or Intel HEX by extension) and writes it into partition `part`.
pub fn write_partition_from_file<T: FeatureReport + ?Sized>(
    d: &T,
    info: &DeviceInfo,
    part: usize,
    path: &Path,
    progress: &mut dyn Progress,
) -> Result<WriteSummary, Error> {
    let image = FirmwareImage::load(path)?;
    log::debug!(
        "{} bytes from {}, data at 0x{:x}..0x{:x}",
        image.len(),
        path.display(),
        image.start,
        image.end
    );

    write_partition(d, info, part, &image.data, progress)
}

/// Dumps partition `part` into `path` as raw binary, returning the number of bytes saved.
pub fn read_partition_to_file<T: FeatureReport + ?Sized>(
    d: &T,
    info: &DeviceInfo,
    part: usize,
    path: &Path,
    progress: &mut dyn Progress,
) -> Result<usize, Error> {
    let data = read_partition(d, info, part, progress)?;

    std::fs::write(path, &data).map_err(|source| Error::File {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Saved {} bytes to {}", data.len(), path.display());

    Ok(data.len())
}

/// Loads `path` and compares it against the contents of partition `part`.
pub fn verify_partition_from_file<T: FeatureReport + ?Sized>(
    d: &T,
    info: &DeviceInfo,
    part: usize,
    path: &Path,
    progress: &mut dyn Progress,
) -> Result<Verification, Error> {
    let image = FirmwareImage::load(path)?;

    verify_partition(d, info, part, &image.data, progress)
}
