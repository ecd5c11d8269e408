//! Intel HEX decoding.
//!
//! Only data records (type `00`) are applied, every other record type is skipped. The
//! decoded buffer is indexed by absolute address, so it starts at address 0 whatever
//! the lowest record is. Bad checksums are warned about and the record is used anyway.
//!
//! Decoding takes two passes over the text: [`measure`] finds the address extent
//! without writing anything, [`apply`] writes the records into a buffer sized from
//! that extent. [`decode`] does both.

use crate::Error;

/// Value of bytes no record covers, what erased flash reads as.
pub const FILL: u8 = 0xFF;

const DATA_RECORD: u8 = 0x00;

/// Address range `[start, end)` covered by data records.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HexExtent {
    pub start: usize,
    pub end: usize,
}

/// A record whose checksum did not add up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumWarning {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HexImage {
    /// `end` bytes, indexed by address.
    pub data: Vec<u8>,
    pub start: usize,
    pub end: usize,
    pub warnings: Vec<ChecksumWarning>,
}

struct Record {
    line: usize,
    address: usize,
    data: Vec<u8>,
    checksum_ok: bool,
}

/// Address extent of all data records, without decoding into a buffer.
pub fn measure(text: &str) -> Result<HexExtent, Error> {
    let mut extent: Option<HexExtent> = None;

    for record in data_records(text) {
        let record = record?;
        if record.data.is_empty() {
            continue;
        }

        let start = record.address;
        let end = record.address + record.data.len();
        extent = Some(match extent {
            None => HexExtent { start, end },
            Some(extent) => HexExtent {
                start: extent.start.min(start),
                end: extent.end.max(end),
            },
        });
    }

    Ok(extent.unwrap_or_default())
}

/// Writes every data record into `buffer` at its address. The buffer has to cover the
/// extent [`measure`] reports.
pub fn apply(text: &str, buffer: &mut [u8]) -> Result<Vec<ChecksumWarning>, Error> {
    let mut warnings = vec![];

    for record in data_records(text) {
        let record = record?;
        let end = record.address + record.data.len();

        if !record.data.is_empty() {
            buffer
                .get_mut(record.address..end)
                .ok_or(Error::Hex {
                    line: record.line,
                    reason: "record outside of the image buffer",
                })?
                .copy_from_slice(&record.data);
        }

        if !record.checksum_ok {
            log::warn!(
                "Checksum error between address 0x{:x} and 0x{:x}",
                record.address,
                end
            );
            warnings.push(ChecksumWarning {
                line: record.line,
                start: record.address,
                end,
            });
        }
    }

    Ok(warnings)
}

/// Measures, allocates and applies in one go. Gaps are [`FILL`].
pub fn decode(text: &str) -> Result<HexImage, Error> {
    let extent = measure(text)?;
    let mut data = vec![FILL; extent.end];
    let warnings = apply(text, &mut data)?;

    Ok(HexImage {
        data,
        start: extent.start,
        end: extent.end,
        warnings,
    })
}

// lines without a colon are not records, anything in front of the colon is noise
fn data_records(text: &str) -> impl Iterator<Item = Result<Record, Error>> + '_ {
    text.lines()
        .enumerate()
        .filter_map(|(n, line)| {
            let colon = line.find(':')?;
            parse_record(n + 1, &line.as_bytes()[colon + 1..]).transpose()
        })
}

/// `LLAAAATT<data>CC` after the colon. Records other than data come back as `None`.
fn parse_record(line: usize, digits: &[u8]) -> Result<Option<Record>, Error> {
    let byte = |i: usize| -> Result<u8, Error> {
        let pair = digits.get(2 * i..2 * i + 2).ok_or(Error::Hex {
            line,
            reason: "truncated record",
        })?;
        match (nibble(pair[0]), nibble(pair[1])) {
            (Some(hi), Some(lo)) => Ok(hi << 4 | lo),
            _ => Err(Error::Hex {
                line,
                reason: "invalid hex digit",
            }),
        }
    };

    let len = byte(0)?;
    let address_hi = byte(1)?;
    let address_lo = byte(2)?;
    let kind = byte(3)?;
    if kind != DATA_RECORD {
        return Ok(None);
    }

    let data = (0..usize::from(len))
        .map(|i| byte(4 + i))
        .collect::<Result<Vec<u8>, Error>>()?;
    let checksum = byte(4 + usize::from(len))?;

    let header = [len, address_hi, address_lo, kind];
    let sum = header
        .iter()
        .chain(data.iter())
        .chain(std::iter::once(&checksum))
        .fold(0_u8, |sum, b| sum.wrapping_add(*b));

    Ok(Some(Record {
        line,
        address: usize::from(address_hi) << 8 | usize::from(address_lo),
        data,
        checksum_ok: sum == 0,
    }))
}

fn nibble(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}
