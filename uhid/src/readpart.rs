use crate::{rewind, DeviceInfo, Error, FeatureReport, Progress};

/// Reads the whole of the 1-based partition `part`.
///
/// The partition is pulled in reports of at most `io_size` payload bytes, each one
/// prefixed by the partition's report id. The device is rewound first, so every read
/// starts at offset 0. On error whatever was read so far is dropped.
pub fn read_partition<T: FeatureReport + ?Sized>(
    d: &T,
    info: &DeviceInfo,
    part: usize,
    progress: &mut dyn Progress,
) -> Result<Vec<u8>, Error> {
    let partition = info.partition(part)?;
    partition.check()?;

    let size = partition.size as usize;
    let io_size = usize::from(partition.io_size);
    let mut data = Vec::with_capacity(size);
    let mut report = vec![0_u8; io_size + 1];

    rewind(d, info.protocol)?;
    while data.len() < size {
        let want = io_size.min(size - data.len());
        let buffer = &mut report[..=want];
        buffer[0] = partition.report_id;

        let len = d.get_feature_report(buffer)?;
        if len <= 1 {
            return Err(Error::Transport(format!(
                "empty report from partition {} at {}",
                partition.name(),
                data.len()
            )));
        }

        // skip the report id, devices may hand back more than was asked for
        let payload = (len - 1).min(want);
        data.extend_from_slice(&buffer[1..=payload]);
        log::debug!("{} bytes read @ {}", payload, data.len() - payload);

        progress.progress("Reading", data.len(), size);
    }

    progress.progress("Reading", size, size);
    Ok(data)
}
