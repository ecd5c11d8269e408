use crate::{Error, FeatureReport, Protocol, PART_INFO_SIZE, PART_NAME_LEN, REPORT_ID_RUN};
use scroll::{Pwrite, LE};
use std::cell::{Cell, RefCell};
use std::sync::Once;

/// Device whose feature reports are served by closures.
pub struct MockDevice<R, W>
where
    R: Fn(&mut [u8]) -> Result<usize, Error>,
    W: Fn(&[u8]) -> Result<usize, Error>,
{
    pub reader: R,
    pub writer: W,
}

impl<R, W> MockDevice<R, W>
where
    R: Fn(&mut [u8]) -> Result<usize, Error>,
    W: Fn(&[u8]) -> Result<usize, Error>,
{
    pub fn new(reader: R, writer: W) -> Self {
        MockDevice { reader, writer }
    }
}

impl<R, W> FeatureReport for MockDevice<R, W>
where
    R: Fn(&mut [u8]) -> Result<usize, Error>,
    W: Fn(&[u8]) -> Result<usize, Error>,
{
    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize, Error> {
        (self.reader)(buf)
    }
    fn send_feature_report(&self, data: &[u8]) -> Result<usize, Error> {
        (self.writer)(data)
    }
}

/// Partition served by a [`MockLoader`].
#[derive(Debug, Clone)]
pub struct MockPart {
    pub name: String,
    pub page_size: u16,
    pub size: u32,
    pub io_size: u8,
}

impl MockPart {
    pub fn new(name: &str, page_size: u16, size: u32, io_size: u8) -> Self {
        MockPart {
            name: name.into(),
            page_size,
            size,
            io_size,
        }
    }
}

/// Builds the info record a loader speaking `protocol` would answer with.
pub fn descriptor(protocol: Protocol, cpu_freq_raw: u8, parts: &[MockPart]) -> Vec<u8> {
    let mut buffer = vec![0_u8; protocol.header_size() + parts.len() * PART_INFO_SIZE];
    let mut offset = 0;

    // buffers are sized above, writes cannot run out of room
    buffer
        .gwrite_with(protocol.info_report_id(), &mut offset, LE)
        .unwrap();
    if protocol == Protocol::Uhid {
        offset += 1;
    }
    buffer.gwrite_with(parts.len() as u8, &mut offset, LE).unwrap();
    buffer.gwrite_with(cpu_freq_raw, &mut offset, LE).unwrap();

    for part in parts {
        buffer.gwrite_with(part.page_size, &mut offset, LE).unwrap();
        buffer.gwrite_with(part.size, &mut offset, LE).unwrap();
        buffer.gwrite_with(part.io_size, &mut offset, LE).unwrap();
        let name = part.name.as_bytes();
        let len = name.len().min(PART_NAME_LEN);
        buffer[offset..offset + len].copy_from_slice(&name[..len]);
        offset += PART_NAME_LEN;
    }

    buffer
}

/// In memory loader speaking the feature report protocol, for exercising transfers
/// end to end.
///
/// Every partition keeps separate read and write cursors. Both rewind when the info
/// record is requested and wrap when they reach the end of the partition.
pub struct MockLoader {
    protocol: Protocol,
    info: Vec<u8>,
    parts: Vec<MockPart>,
    memory: RefCell<Vec<Vec<u8>>>,
    read_pos: RefCell<Vec<usize>>,
    write_pos: RefCell<Vec<usize>>,
    sent: RefCell<Vec<Vec<u8>>>,
    transfers: Cell<usize>,
    fail_after: Option<usize>,
}

impl MockLoader {
    pub fn new(protocol: Protocol, parts: &[MockPart]) -> Self {
        MockLoader {
            protocol,
            info: descriptor(protocol, 160, parts),
            parts: parts.to_vec(),
            memory: RefCell::new(parts.iter().map(|p| vec![0xFF; p.size as usize]).collect()),
            read_pos: RefCell::new(vec![0; parts.len()]),
            write_pos: RefCell::new(vec![0; parts.len()]),
            sent: RefCell::new(vec![]),
            transfers: Cell::new(0),
            fail_after: None,
        }
    }

    /// Fail every partition transfer after the first `transfers` succeeded.
    pub fn fail_after(mut self, transfers: usize) -> Self {
        self.fail_after = Some(transfers);
        self
    }

    /// Answer info requests with `info` instead of the generated record.
    pub fn with_info(mut self, info: Vec<u8>) -> Self {
        self.info = info;
        self
    }

    /// Replace the contents of the 1-based partition `part`.
    pub fn fill(&self, part: usize, data: &[u8]) {
        let mut memory = self.memory.borrow_mut();
        let mem = &mut memory[part - 1];
        let len = data.len().min(mem.len());
        mem[..len].copy_from_slice(&data[..len]);
    }

    /// Contents of the 1-based partition `part`.
    pub fn contents(&self, part: usize) -> Vec<u8> {
        self.memory.borrow()[part - 1].clone()
    }

    /// Every feature report sent so far, report id included.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.borrow().clone()
    }

    fn part_for(&self, report_id: u8) -> Option<usize> {
        (1..=self.parts.len()).find(|part| self.protocol.part_report_id(*part) == report_id)
    }

    fn count_transfer(&self) -> Result<(), Error> {
        let done = self.transfers.get();
        if let Some(limit) = self.fail_after {
            if done >= limit {
                return Err(Error::Transport("device disconnected".into()));
            }
        }
        self.transfers.set(done + 1);
        Ok(())
    }
}

impl FeatureReport for MockLoader {
    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let report_id = buf[0];

        if report_id == self.protocol.info_report_id() {
            for pos in self.read_pos.borrow_mut().iter_mut() {
                *pos = 0;
            }
            for pos in self.write_pos.borrow_mut().iter_mut() {
                *pos = 0;
            }
            let len = self.info.len().min(buf.len());
            buf[..len].copy_from_slice(&self.info[..len]);
            return Ok(len);
        }

        let part = self
            .part_for(report_id)
            .ok_or_else(|| Error::Transport(format!("no report {}", report_id)))?;
        self.count_transfer()?;

        let memory = self.memory.borrow();
        let mem = &memory[part - 1];
        let mut read_pos = self.read_pos.borrow_mut();
        let pos = &mut read_pos[part - 1];

        let chunk = (buf.len() - 1).min(usize::from(self.parts[part - 1].io_size));
        for i in 0..chunk {
            buf[1 + i] = mem.get(*pos + i).copied().unwrap_or(0);
        }
        *pos += chunk;
        if *pos >= mem.len() {
            *pos = 0;
        }

        Ok(chunk + 1)
    }

    fn send_feature_report(&self, data: &[u8]) -> Result<usize, Error> {
        self.sent.borrow_mut().push(data.to_vec());
        let report_id = data[0];

        if report_id == REPORT_ID_RUN {
            return Ok(data.len());
        }

        let part = self
            .part_for(report_id)
            .ok_or_else(|| Error::Transport(format!("no report {}", report_id)))?;
        self.count_transfer()?;

        let mut memory = self.memory.borrow_mut();
        let mem = &mut memory[part - 1];
        let mut write_pos = self.write_pos.borrow_mut();
        let pos = &mut write_pos[part - 1];

        for (i, byte) in data[1..].iter().enumerate() {
            if let Some(cell) = mem.get_mut(*pos + i) {
                *cell = *byte;
            }
        }
        *pos += data.len() - 1;
        if *pos >= mem.len() {
            *pos = 0;
        }

        Ok(data.len())
    }
}

thread_local! {
    static WARNINGS: RefCell<Vec<String>> = RefCell::new(vec![]);
}

/// Keeps warnings per thread, tests run side by side.
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Warn
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            WARNINGS.with(|w| w.borrow_mut().push(record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

/// Runs `f`, returning its result and the warnings it logged.
pub fn capture_warnings<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = log::set_logger(&CaptureLogger);
        log::set_max_level(log::LevelFilter::Warn);
    });

    WARNINGS.with(|w| w.borrow_mut().clear());
    let result = f();
    let warnings = WARNINGS.with(|w| w.borrow_mut().split_off(0));
    (result, warnings)
}
