use crate::{rewind, DeviceInfo, Error, FeatureReport, Progress};

/// What a partition write actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    /// Length of the data handed in.
    pub requested: usize,
    /// Bytes put on the wire, rounded up to whole pages.
    pub written: usize,
    /// The data did not fit and was cut to the partition size.
    pub truncated: bool,
}

/// Writes `data` into the 1-based partition `part`.
///
/// Data larger than the partition is truncated with a warning. The transfer is rounded
/// up to a whole number of pages, the padding is zeroes. Every report carries
/// `io_size` payload bytes behind the partition's report id. The device is rewound
/// first, so every write starts at offset 0.
///
/// There is no rollback: if the transport fails halfway the reports sent before the
/// failure are already committed on the device.
pub fn write_partition<T: FeatureReport + ?Sized>(
    d: &T,
    info: &DeviceInfo,
    part: usize,
    data: &[u8],
    progress: &mut dyn Progress,
) -> Result<WriteSummary, Error> {
    let partition = info.partition(part)?;
    partition.check()?;

    let size = partition.size as usize;
    let page_size = usize::from(partition.page_size);
    let io_size = usize::from(partition.io_size);

    let truncated = data.len() > size;
    if truncated {
        log::warn!(
            "Input is {} bytes but partition {} holds {}, the data will be truncated",
            data.len(),
            partition.name(),
            size
        );
    }

    let len = data.len().min(size);
    let total = round_up(len, page_size);
    let summary = WriteSummary {
        requested: data.len(),
        written: total,
        truncated,
    };
    if total == 0 {
        log::debug!("nothing to write to partition {}", partition.name());
        progress.progress("Writing", 0, 0);
        return Ok(summary);
    }

    rewind(d, info.protocol)?;

    let mut staging = vec![0_u8; total];
    staging[..len].copy_from_slice(&data[..len]);

    let mut report = vec![0_u8; io_size + 1];
    let mut pos = 0;
    for chunk in staging.chunks(io_size) {
        report[0] = partition.report_id;
        report[1..=chunk.len()].copy_from_slice(chunk);
        for byte in &mut report[chunk.len() + 1..] {
            *byte = 0;
        }

        let written = d.send_feature_report(&report)?;
        log::debug!("{} bytes written @ {}", written, pos);

        pos += chunk.len();
        progress.progress("Writing", pos, total);
    }

    progress.progress("Writing", total, total);
    Ok(summary)
}

fn round_up(len: usize, page_size: usize) -> usize {
    match len % page_size {
        0 => len,
        rem => len + page_size - rem,
    }
}
