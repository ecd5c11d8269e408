use crate::ihex::{self, ChecksumWarning};
use crate::Error;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Binary,
    IntelHex,
}

impl ImageFormat {
    /// `.hex` and `.ihx` files are Intel HEX, everything else is raw binary.
    pub fn from_path(path: &Path) -> ImageFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("hex") | Some("ihx") => ImageFormat::IntelHex,
            _ => ImageFormat::Binary,
        }
    }
}

/// Image ready to be written to a partition.
#[derive(Debug, Clone, PartialEq)]
pub struct FirmwareImage {
    pub format: ImageFormat,
    /// Bytes to write, starting at partition offset 0.
    pub data: Vec<u8>,
    /// Lowest address a HEX record touched, 0 for binaries.
    pub start: usize,
    /// One past the highest address written.
    pub end: usize,
    pub warnings: Vec<ChecksumWarning>,
}

impl FirmwareImage {
    pub fn from_binary(data: Vec<u8>) -> Self {
        let end = data.len();
        FirmwareImage {
            format: ImageFormat::Binary,
            data,
            start: 0,
            end,
            warnings: vec![],
        }
    }

    pub fn from_hex(text: &str) -> Result<Self, Error> {
        let image = ihex::decode(text)?;
        Ok(FirmwareImage {
            format: ImageFormat::IntelHex,
            data: image.data,
            start: image.start,
            end: image.end,
            warnings: image.warnings,
        })
    }

    /// Loads `path`, picking the format from its extension.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file_error = |source| Error::File {
            path: path.to_path_buf(),
            source,
        };

        match ImageFormat::from_path(path) {
            ImageFormat::IntelHex => {
                log::info!("Input file detected as Intel Hex");
                let text = std::fs::read_to_string(path).map_err(file_error)?;
                FirmwareImage::from_hex(&text)
            }
            ImageFormat::Binary => {
                log::info!("Input file detected as binary");
                let data = std::fs::read(path).map_err(file_error)?;
                Ok(FirmwareImage::from_binary(data))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
