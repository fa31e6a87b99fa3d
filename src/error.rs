use std::fmt::Display;

use crate::image::format::{ChannelLayout, Compression, DataType};
use crate::image::Consistency;

#[derive(Debug)]
pub enum Error {
    UnableToOpenInputFileForReading(String, std::io::Error),
    UnableToOpenOutputFileForWriting(String, std::io::Error),
    UnknownFileFormat(String),
    FailedToRead(&'static str, std::io::Error),
    FailedToWrite(&'static str, std::io::Error),
    InvalidMagicNumber(&'static str),
    UnsupportedImageType(&'static str, u32),
    UnsupportedBitDepth(&'static str, u32),
    UnsupportedDxgiFormat(u32),
    UnsupportedPixelFormat(&'static str),
    UnsupportedDataType(&'static str, DataType),
    UnsupportedChannelLayout(&'static str, ChannelLayout),
    UnsupportedCompression(&'static str, Compression),
    NotImplemented(&'static str),
    PaletteWithCompression,
    PaletteNotAssigned,
    InvalidPaletteSize(usize),
    ConversionIntoPalette,
    ColorKeyOnPalette,
    InvalidSize,
    NoData,
    DataSizeMismatch { expected: usize, actual: usize },
    ImageHasNoBuffer,
    InconsistentImage(Consistency),
    ConversionWorkerLost(usize),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnableToOpenInputFileForReading(path, error) => {
                write!(
                    f,
                    "Unable to open input file '{}' for reading: {}",
                    path, error
                )
            }
            Self::UnableToOpenOutputFileForWriting(path, error) => {
                write!(
                    f,
                    "Unable to open output file '{}' for writing: {}",
                    path, error
                )
            }
            Self::UnknownFileFormat(path) => {
                write!(f, "File format of '{}' could not be determined", path)
            }
            Self::FailedToRead(what, error) => write!(f, "Failed to read {}: {}", what, error),
            Self::FailedToWrite(what, error) => write!(f, "Failed to write {}: {}", what, error),
            Self::InvalidMagicNumber(format) => {
                write!(f, "File does not start with a valid {} signature", format)
            }
            Self::UnsupportedImageType(format, image_type) => {
                write!(f, "Unsupported {} image type {}", format, image_type)
            }
            Self::UnsupportedBitDepth(format, bits) => {
                write!(f, "Unsupported {} bit depth of {} bits per pixel", format, bits)
            }
            Self::UnsupportedDxgiFormat(format) => {
                write!(f, "Unsupported DXGI format {}", format)
            }
            Self::UnsupportedPixelFormat(description) => {
                write!(f, "Unsupported pixel format: {}", description)
            }
            Self::UnsupportedDataType(context, data_type) => {
                write!(f, "Data type {:?} is not supported by {}", data_type, context)
            }
            Self::UnsupportedChannelLayout(context, layout) => {
                write!(
                    f,
                    "Channel layout {:?} is not supported by {}",
                    layout, context
                )
            }
            Self::UnsupportedCompression(context, compression) => {
                write!(
                    f,
                    "Compression {:?} is not supported by {}",
                    compression, context
                )
            }
            Self::NotImplemented(what) => write!(f, "{} is not implemented", what),
            Self::PaletteWithCompression => {
                write!(f, "Palette images can not be block compressed")
            }
            Self::PaletteNotAssigned => {
                write!(f, "Image uses a palette layout, but has no palette assigned")
            }
            Self::InvalidPaletteSize(size) => {
                write!(f, "Palette with {} colors can not be used here", size)
            }
            Self::ConversionIntoPalette => {
                write!(f, "Conversion into a palette layout is not supported")
            }
            Self::ColorKeyOnPalette => {
                write!(f, "Color keying can not be applied to palette images")
            }
            Self::InvalidSize => write!(f, "Image size is zero or too large in some dimension"),
            Self::NoData => write!(f, "Image buffer does not contain any data"),
            Self::DataSizeMismatch { expected, actual } => {
                write!(
                    f,
                    "Expected at least {} bytes of image data, but got {}",
                    expected, actual
                )
            }
            Self::ImageHasNoBuffer => write!(f, "Image does not contain any buffer"),
            Self::InconsistentImage(consistency) => {
                write!(f, "Image is inconsistent: {:?}", consistency)
            }
            Self::ConversionWorkerLost(count) => {
                write!(f, "{} conversion workers terminated unexpectedly", count)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnableToOpenInputFileForReading(_, error)
            | Self::UnableToOpenOutputFileForWriting(_, error)
            | Self::FailedToRead(_, error)
            | Self::FailedToWrite(_, error) => Some(error),
            _ => None,
        }
    }
}
