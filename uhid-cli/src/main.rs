use hidapi::{HidApi, HidDevice};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use uhid::utils::{read_partition_to_file, verify_partition_from_file, write_partition_from_file};
use uhid::{DeviceMatch, Error, PartitionHandle, Progress, Protocol, Verification};

fn main() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    let args = Opt::from_args();

    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            log::error!("{}", e);
            if let Error::ShortRead { .. } = e {
                log::error!("Device answered with a short info record, is it running a loader of a different protocol version? Try --protocol");
            }
            std::process::exit(1);
        }
    }
}

fn run(args: Opt) -> Result<bool, Error> {
    let api = HidApi::new()?;
    let (d, protocol) = open_device(&api, &args)?;
    let protocol = args.protocol.unwrap_or(protocol);
    log::debug!("speaking {}", protocol);

    let info = uhid::read_info(&d, protocol)?;

    match args.cmd {
        Cmd::info => {
            println!("{}", info);
            Ok(true)
        }
        Cmd::read { part, file } => {
            let part = part.resolve(&info)?;
            println!("Reading partition {} from device to {}", part, file.display());

            read_partition_to_file(&d, &info, part, &file, &mut Bar::default())?;
            Ok(true)
        }
        Cmd::write {
            part,
            file,
            no_verify,
        } => {
            let part = part.resolve(&info)?;
            println!("Writing partition {} from {}", part, file.display());

            let summary = write_partition_from_file(&d, &info, part, &file, &mut Bar::default())?;
            log::info!("Wrote {} bytes", summary.written);
            if no_verify {
                return Ok(true);
            }

            verify(&d, &info, part, &file)
        }
        Cmd::verify { part, file } => {
            let part = part.resolve(&info)?;
            verify(&d, &info, part, &file)
        }
        Cmd::run { part } => {
            let part = match part {
                Some(part) => part.resolve(&info)?,
                None => 1,
            };
            uhid::run_partition(&d, &info, part)?;
            Ok(true)
        }
    }
}

fn open_device(api: &HidApi, args: &Opt) -> Result<(HidDevice, Protocol), Error> {
    if let Some(path) = &args.path {
        let d = uhid::open_path(api, path)?;
        return Ok((d, args.protocol.unwrap_or_default()));
    }

    let mut matches = if let (Some(v), Some(p)) = (args.vid, args.pid) {
        vec![DeviceMatch::new(v, p, args.protocol.unwrap_or_default())]
    } else {
        log::debug!("no vid/pid provided, trying known bootloaders");
        uhid::compatible_devices()
    };
    for m in &mut matches {
        m.serial = args.serial.clone();
    }

    uhid::open(api, &matches)
}

fn verify(
    d: &HidDevice,
    info: &uhid::DeviceInfo,
    part: usize,
    file: &Path,
) -> Result<bool, Error> {
    println!("Verifying partition {} from {}", part, file.display());

    match verify_partition_from_file(d, info, part, file, &mut Bar::default())? {
        Verification::Match { compared } => {
            println!("Verification completed without error ({} bytes)", compared);
            Ok(true)
        }
        Verification::Mismatch { offset } => {
            println!("Verification failed at offset 0x{:x}", offset);
            Ok(false)
        }
    }
}

/// Terminal progress bar, started on the first update of each label.
#[derive(Default)]
struct Bar {
    bar: Option<(String, ProgressBar)>,
}

impl Progress for Bar {
    fn progress(&mut self, label: &str, current: usize, total: usize) {
        let fresh = match &self.bar {
            Some((l, _)) => l != label,
            None => true,
        };
        if fresh {
            if let Some((_, pb)) = self.bar.take() {
                pb.finish();
            }
            let style = ProgressStyle::default_bar()
                .template(
                    "{msg:8} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-");
            let pb = ProgressBar::new(total as u64);
            pb.set_style(style);
            pb.set_message(label.to_string());
            self.bar = Some((label.to_string(), pb));
        }

        if let Some((_, pb)) = &self.bar {
            if pb.is_finished() {
                return;
            }
            pb.set_position(current as u64);
            if current >= total {
                pb.finish();
            }
        }
    }
}

fn parse_hex_16(input: &str) -> Result<u16, std::num::ParseIntError> {
    if input.starts_with("0x") {
        u16::from_str_radix(&input[2..], 16)
    } else {
        input.parse::<u16>()
    }
}

#[derive(Debug, StructOpt)]
#[structopt(name = "uhid", about = "Talk to uHID bootloaders over USB HID feature reports")]
struct Opt {
    #[structopt(subcommand)]
    cmd: Cmd,

    #[structopt(short = "p", name = "pid", long = "pid", parse(try_from_str = parse_hex_16))]
    pid: Option<u16>,
    #[structopt(short = "v", name = "vid", long = "vid", parse(try_from_str = parse_hex_16))]
    vid: Option<u16>,
    /// Only use the device with this USB serial number
    #[structopt(short = "s", long = "serial")]
    serial: Option<String>,
    /// Open the device at this path instead of searching for one
    #[structopt(long = "path")]
    path: Option<String>,
    /// Protocol revision, uhid or uisp. Defaults to the one of the matched device
    #[structopt(long = "protocol")]
    protocol: Option<Protocol>,
}

#[allow(non_camel_case_types)]
#[derive(Debug, StructOpt)]
enum Cmd {
    /// Print the partition table and cpu frequency
    info,
    /// Dump a partition to a binary file
    read {
        #[structopt(short = "P", long = "part")]
        part: PartitionHandle,
        #[structopt(short = "f", name = "file", long = "file", parse(from_os_str))]
        file: PathBuf,
    },
    /// Write a binary or Intel HEX file to a partition and verify it
    write {
        #[structopt(short = "P", long = "part")]
        part: PartitionHandle,
        #[structopt(short = "f", name = "file", long = "file", parse(from_os_str))]
        file: PathBuf,
        /// Skip reading the partition back after writing
        #[structopt(long = "no-verify")]
        no_verify: bool,
    },
    /// Compare a partition with a binary or Intel HEX file
    verify {
        #[structopt(short = "P", long = "part")]
        part: PartitionHandle,
        #[structopt(short = "f", name = "file", long = "file", parse(from_os_str))]
        file: PathBuf,
    },
    /// Start the application, from the first partition unless given
    run {
        #[structopt(short = "P", long = "part")]
        part: Option<PartitionHandle>,
    },
}
