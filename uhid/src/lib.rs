use std::path::PathBuf;

/// Device info record: partition table, cpu frequency and protocol revision.
mod info;
pub use info::*;

/// Read a whole partition back from the device, one feature report at a time.
mod readpart;
pub use readpart::*;

/// Write a buffer into a partition, padded up to the partition page size.
mod writepart;
pub use writepart::*;

/// Compare an image against a partition read back from the device.
mod verify;
pub use verify::*;

/// Leave the bootloader and start the application.
mod run;
pub use run::*;

/// Progress notifications for multi chunk transfers.
mod progress;
pub use progress::*;

/// Firmware images loaded from disk, raw binary or Intel HEX.
mod image;
pub use image::*;

/// Intel HEX decoding.
pub mod ihex;

#[cfg(test)]
mod mock;

/// Load/store partitions from and to files.
pub mod utils;

#[cfg(feature = "hidapi")]
mod hidapi_trait;
#[cfg(feature = "hidapi")]
pub use hidapi_trait::*;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("short read on device info, expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
    #[error("invalid partition {0}")]
    InvalidPartition(usize),
    #[error("no partition named {0:?}")]
    PartitionNotFound(String),
    #[error("partition {part} has invalid metadata: {reason}")]
    InvalidPartitionMetadata { part: usize, reason: &'static str },
    #[error("{}: {}", .path.display(), .source)]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("intel hex line {line}: {reason}")]
    Hex { line: usize, reason: &'static str },
    #[error("no compatible device found")]
    DeviceNotFound,
    #[error("parse error: {0}")]
    Parse(#[from] scroll::Error),
}

/// Trait to implement HID devices carrying feature reports.
///
/// Both directions put the report id in the first byte of the buffer.
pub trait FeatureReport {
    /// Fills `buf` with a feature report, `buf[0]` selecting which one. Returns the
    /// number of bytes received including the report id byte.
    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize>;
    /// Sends `data` as a feature report, `data[0]` being the report id. Returns the
    /// number of bytes written.
    fn send_feature_report(&self, data: &[u8]) -> Result<usize>;
}
