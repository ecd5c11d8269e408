use crate::{read_partition, DeviceInfo, Error, FeatureReport, Progress};

/// Outcome of comparing an image with what the device holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The first `compared` bytes are identical.
    Match { compared: usize },
    /// First differing byte.
    Mismatch { offset: usize },
}

impl Verification {
    pub fn is_match(&self) -> bool {
        matches!(self, Verification::Match { .. })
    }
}

/// Compares the overlapping prefix of `expected` and `actual`.
pub fn compare(expected: &[u8], actual: &[u8]) -> Verification {
    let len = expected.len().min(actual.len());

    match expected[..len]
        .iter()
        .zip(&actual[..len])
        .position(|(a, b)| a != b)
    {
        Some(offset) => Verification::Mismatch { offset },
        None => Verification::Match { compared: len },
    }
}

/// Reads the 1-based partition `part` back and compares it with `expected`.
///
/// Only the overlap is compared. A read back shorter than `expected` still verifies,
/// it is logged and shows up in `Verification::Match::compared`.
pub fn verify_partition<T: FeatureReport + ?Sized>(
    d: &T,
    info: &DeviceInfo,
    part: usize,
    expected: &[u8],
    progress: &mut dyn Progress,
) -> Result<Verification, Error> {
    let actual = read_partition(d, info, part, progress)?;

    if actual.len() < expected.len() {
        log::warn!(
            "Read back {} bytes but the image has {}, only the first {} are verified",
            actual.len(),
            expected.len(),
            actual.len()
        );
    }
    log::info!("Verifying {} bytes", expected.len().min(actual.len()));

    let verification = compare(expected, &actual);
    if let Verification::Mismatch { offset } = verification {
        log::debug!(
            "mismatch @ {}: ours {:02X} theirs {:02X}",
            offset,
            expected[offset],
            actual[offset]
        );
    }

    Ok(verification)
}
