use std::io::{Read, Write};
use std::path::Path;

use clap::builder::PossibleValue;
use clap::ValueEnum;

use super::reader::{BmpImageReader, DdsImageReader, TgaImageReader};
use super::writer::{BmpImageWriter, DdsImageWriter, TgaImageWriter};
use super::{Image, ImageReader, ImageWriter};
use crate::error::Error;

pub mod bmp;
pub mod dds;
pub mod tga;

/// Image file formats with a reader and a writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Tga,
    Bmp,
    Dds,
}

impl FileFormat {
    /// Picks the format from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> crate::Result<Self> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("tga") => Ok(Self::Tga),
            Some("bmp") => Ok(Self::Bmp),
            Some("dds") => Ok(Self::Dds),
            _ => Err(Error::UnknownFileFormat(path.display().to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Tga => "tga",
            Self::Bmp => "bmp",
            Self::Dds => "dds",
        }
    }
}

impl ValueEnum for FileFormat {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Tga, Self::Bmp, Self::Dds]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(PossibleValue::new(self.extension()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Run length encode TGA pixel data.
    pub rle: bool,
}

pub fn read_image<R: Read>(format: FileFormat, reader: R) -> crate::Result<Image<'static>> {
    match format {
        FileFormat::Tga => TgaImageReader::new(reader).read_image(),
        FileFormat::Bmp => BmpImageReader::new(reader).read_image(),
        FileFormat::Dds => DdsImageReader::new(reader).read_image(),
    }
}

pub fn write_image<W: Write>(
    format: FileFormat,
    writer: W,
    image: &Image<'_>,
    options: &SaveOptions,
) -> crate::Result<()> {
    match format {
        FileFormat::Tga => TgaImageWriter::new(writer, image, options.rle).write_image(),
        FileFormat::Bmp => BmpImageWriter::new(writer, image).write_image(),
        FileFormat::Dds => DdsImageWriter::new(writer, image).write_image(),
    }
}
