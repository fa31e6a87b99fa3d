use std::io::Read;

use crate::binary_stream::{read_exact, LittleEndianReader, LittleEndianWriter};
use crate::error::Error;

pub(crate) const TGA_HEADER_SIZE: usize = 18;

pub(crate) const COLOR_MAP_NONE: u8 = 0;
pub(crate) const COLOR_MAP_PRESENT: u8 = 1;

pub(crate) const IMAGE_TYPE_COLOR_MAPPED: u8 = 1;
pub(crate) const IMAGE_TYPE_TRUE_COLOR: u8 = 2;
pub(crate) const IMAGE_TYPE_GRAYSCALE: u8 = 3;
/// Set on top of the base image type for run length encoded pixel data.
pub(crate) const IMAGE_TYPE_RLE: u8 = 0x08;

pub(crate) const DESCRIPTOR_TOP_LEFT: u8 = 0x20;
pub(crate) const DESCRIPTOR_ALPHA_BITS: u8 = 0x0F;

const RLE_PACKET: u8 = 0x80;
const MAX_PACKET_PIXELS: usize = 128;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TgaHeader {
    pub id_length: u8,
    pub color_map_type: u8,
    pub image_type: u8,
    pub color_map_start: u16,
    pub color_map_entries: u16,
    pub color_map_bits: u8,
    pub x_offset: u16,
    pub y_offset: u16,
    pub width: u16,
    pub height: u16,
    pub bits_per_pixel: u8,
    pub descriptor: u8,
}

impl TgaHeader {
    pub fn read<R: Read>(reader: &mut R) -> crate::Result<Self> {
        let mut bytes = [0; TGA_HEADER_SIZE];
        read_exact(reader, &mut bytes, "TGA header")?;
        let mut fields = LittleEndianReader::new(&bytes);
        Ok(Self {
            id_length: fields.read_u8(),
            color_map_type: fields.read_u8(),
            image_type: fields.read_u8(),
            color_map_start: fields.read_u16(),
            color_map_entries: fields.read_u16(),
            color_map_bits: fields.read_u8(),
            x_offset: fields.read_u16(),
            y_offset: fields.read_u16(),
            width: fields.read_u16(),
            height: fields.read_u16(),
            bits_per_pixel: fields.read_u8(),
            descriptor: fields.read_u8(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = LittleEndianWriter::with_capacity(TGA_HEADER_SIZE);
        writer
            .write_u8(self.id_length)
            .write_u8(self.color_map_type)
            .write_u8(self.image_type)
            .write_u16(self.color_map_start)
            .write_u16(self.color_map_entries)
            .write_u8(self.color_map_bits)
            .write_u16(self.x_offset)
            .write_u16(self.y_offset)
            .write_u16(self.width)
            .write_u16(self.height)
            .write_u8(self.bits_per_pixel)
            .write_u8(self.descriptor);
        writer.into_inner()
    }

    pub fn is_rle(&self) -> bool {
        self.image_type & IMAGE_TYPE_RLE != 0
    }

    pub fn is_top_down(&self) -> bool {
        self.descriptor & DESCRIPTOR_TOP_LEFT != 0
    }

    /// Bytes taken by the color map following the image ID.
    pub fn color_map_size(&self) -> usize {
        self.color_map_entries as usize * self.color_map_bits as usize / 8
    }
}

/// Unpacks run length encoded pixels until `size` bytes are produced.
pub fn decode_rle<R: Read>(
    reader: &mut R,
    pixel_size: usize,
    size: usize,
) -> crate::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    let mut pixel = vec![0; pixel_size];
    while decoded.len() < size {
        let mut packet = [0; 1];
        read_exact(reader, &mut packet, "TGA packet header")?;
        let count = (packet[0] & !RLE_PACKET) as usize + 1;
        if packet[0] & RLE_PACKET != 0 {
            read_exact(reader, &mut pixel, "TGA run")?;
            for _ in 0..count {
                decoded.extend_from_slice(&pixel);
            }
        } else {
            let start = decoded.len();
            decoded.resize(start + count * pixel_size, 0);
            read_exact(reader, &mut decoded[start..], "TGA raw packet")?;
        }
    }
    if decoded.len() > size {
        log::warn!(
            "TGA packets overrun the image by {} bytes",
            decoded.len() - size
        );
        decoded.truncate(size);
    }
    Ok(decoded)
}

/// Packs one scanline into run and raw packets of at most 128 pixels.
pub fn encode_rle_row(row: &[u8], pixel_size: usize, output: &mut Vec<u8>) -> crate::Result<()> {
    if pixel_size == 0 || row.len() % pixel_size != 0 {
        return Err(Error::DataSizeMismatch {
            expected: pixel_size,
            actual: row.len(),
        });
    }
    let pixels: Vec<&[u8]> = row.chunks_exact(pixel_size).collect();
    let mut index = 0;
    while index < pixels.len() {
        let run = pixels[index..]
            .iter()
            .take(MAX_PACKET_PIXELS)
            .take_while(|pixel| **pixel == pixels[index])
            .count();
        if run > 1 {
            output.push(RLE_PACKET | (run - 1) as u8);
            output.extend_from_slice(pixels[index]);
            index += run;
            continue;
        }
        let mut raw = 1;
        while index + raw < pixels.len()
            && raw < MAX_PACKET_PIXELS
            && (index + raw + 1 >= pixels.len() || pixels[index + raw] != pixels[index + raw + 1])
        {
            raw += 1;
        }
        output.push((raw - 1) as u8);
        for pixel in &pixels[index..index + raw] {
            output.extend_from_slice(pixel);
        }
        index += raw;
    }
    Ok(())
}
