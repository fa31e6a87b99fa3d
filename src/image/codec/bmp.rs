use std::io::Read;

use crate::binary_stream::{read_exact, LittleEndianReader, LittleEndianWriter};
use crate::error::Error;

/// "BM" read as a little endian u16.
pub(crate) const BMP_MAGIC: u16 = 0x4D42;
pub(crate) const FILE_HEADER_SIZE: usize = 14;
pub(crate) const INFO_HEADER_SIZE: usize = 40;
pub(crate) const HEADERS_SIZE: usize = FILE_HEADER_SIZE + INFO_HEADER_SIZE;
pub(crate) const BI_RGB: u32 = 0;
pub(crate) const PALETTE_ENTRY_SIZE: usize = 4;
pub(crate) const MAX_PALETTE_ENTRIES: usize = 256;

/// `BITMAPFILEHEADER` followed by `BITMAPINFOHEADER`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BmpHeader {
    pub file_size: u32,
    pub data_offset: u32,
    pub info_size: u32,
    pub width: i32,
    /// Negative for rows stored top to bottom.
    pub height: i32,
    pub planes: u16,
    pub bits_per_pixel: u16,
    pub compression: u32,
    pub image_size: u32,
    pub x_pixels_per_meter: i32,
    pub y_pixels_per_meter: i32,
    pub colors_used: u32,
    pub colors_important: u32,
}

impl BmpHeader {
    pub fn read<R: Read>(reader: &mut R) -> crate::Result<Self> {
        let mut bytes = [0; HEADERS_SIZE];
        read_exact(reader, &mut bytes, "BMP header")?;
        crate::logger::log_header("BMP header", &bytes);
        let mut fields = LittleEndianReader::new(&bytes);
        if fields.read_u16() != BMP_MAGIC {
            return Err(Error::InvalidMagicNumber("BMP"));
        }
        let file_size = fields.read_u32();
        fields.skip(4);
        let data_offset = fields.read_u32();
        let info_size = fields.read_u32();
        if (info_size as usize) < INFO_HEADER_SIZE {
            return Err(Error::UnsupportedImageType("BMP info header size", info_size));
        }
        Ok(Self {
            file_size,
            data_offset,
            info_size,
            width: fields.read_i32(),
            height: fields.read_i32(),
            planes: fields.read_u16(),
            bits_per_pixel: fields.read_u16(),
            compression: fields.read_u32(),
            image_size: fields.read_u32(),
            x_pixels_per_meter: fields.read_i32(),
            y_pixels_per_meter: fields.read_i32(),
            colors_used: fields.read_u32(),
            colors_important: fields.read_u32(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = LittleEndianWriter::with_capacity(HEADERS_SIZE);
        writer
            .write_u16(BMP_MAGIC)
            .write_u32(self.file_size)
            .write_u32(0)
            .write_u32(self.data_offset)
            .write_u32(self.info_size)
            .write_i32(self.width)
            .write_i32(self.height)
            .write_u16(self.planes)
            .write_u16(self.bits_per_pixel)
            .write_u32(self.compression)
            .write_u32(self.image_size)
            .write_i32(self.x_pixels_per_meter)
            .write_i32(self.y_pixels_per_meter)
            .write_u32(self.colors_used)
            .write_u32(self.colors_important);
        writer.into_inner()
    }

    pub fn is_top_down(&self) -> bool {
        self.height < 0
    }

    /// Bytes of newer info header versions past the 40 understood here.
    pub fn extra_info_bytes(&self) -> usize {
        (self.info_size as usize).saturating_sub(INFO_HEADER_SIZE)
    }
}

/// Zero bytes appended to every row to reach a multiple of four.
pub fn row_padding(width: usize, bytes_per_pixel: usize) -> usize {
    (4 - (width * bytes_per_pixel) % 4) % 4
}
