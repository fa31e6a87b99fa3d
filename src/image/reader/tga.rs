use std::io::{self, Read};

use crate::binary_stream::{read_exact, read_up_to};
use crate::color::RgbColor;
use crate::error::Error;
use crate::image::codec::tga::{
    decode_rle, TgaHeader, COLOR_MAP_NONE, DESCRIPTOR_ALPHA_BITS, IMAGE_TYPE_COLOR_MAPPED,
    IMAGE_TYPE_GRAYSCALE, IMAGE_TYPE_RLE, IMAGE_TYPE_TRUE_COLOR,
};
use crate::image::format::{ChannelLayout, DataType, PixelFormat};
use crate::image::palette::Palette;
use crate::image::shared::SharedImageBuffer;
use crate::image::{Image, ImageReader, Size};

pub struct TgaImageReader<T: Read> {
    reader: T,
}

impl<T: Read> TgaImageReader<T> {
    pub fn new(reader: T) -> Self {
        Self { reader }
    }

    fn skip(&mut self, count: u64, what: &'static str) -> crate::Result<()> {
        let skipped = io::copy(&mut (&mut self.reader).take(count), &mut io::sink())
            .map_err(|e| Error::FailedToRead(what, e))?;
        if skipped < count {
            return Err(Error::FailedToRead(what, io::ErrorKind::UnexpectedEof.into()));
        }
        Ok(())
    }

    fn read_palette(&mut self, header: &TgaHeader) -> crate::Result<Palette> {
        let entry_size = match header.color_map_bits {
            24 => 3,
            32 => 4,
            bits => return Err(Error::UnsupportedBitDepth("TGA color map", bits as u32)),
        };
        let mut entries = vec![0; header.color_map_size()];
        read_exact(&mut self.reader, &mut entries, "TGA color map")?;
        let mut palette = Palette::new();
        for (index, bgr) in entries.chunks_exact(entry_size).enumerate() {
            palette.set_color(
                header.color_map_start as usize + index,
                RgbColor::new(bgr[2], bgr[1], bgr[0]),
            );
        }
        Ok(palette)
    }
}

impl<T: Read> ImageReader for TgaImageReader<T> {
    fn read_image(&mut self) -> crate::Result<Image<'static>> {
        let header = TgaHeader::read(&mut self.reader)?;
        log::info!(
            "Reading {}x{} TGA image of type {} with {} bits per pixel",
            header.width,
            header.height,
            header.image_type,
            header.bits_per_pixel
        );
        self.skip(header.id_length as u64, "TGA image ID")?;

        let image_type = header.image_type & !IMAGE_TYPE_RLE;
        let has_color_map =
            header.color_map_type != COLOR_MAP_NONE && header.color_map_size() > 0;
        let palette = if has_color_map && image_type == IMAGE_TYPE_COLOR_MAPPED {
            Some(self.read_palette(&header)?)
        } else {
            if has_color_map {
                log::warn!("Skipping color map of a TGA image without color mapping");
                self.skip(header.color_map_size() as u64, "TGA color map")?;
            }
            None
        };

        let layout = match (image_type, header.bits_per_pixel) {
            (IMAGE_TYPE_COLOR_MAPPED, 8) if palette.is_some() => ChannelLayout::Palette,
            (IMAGE_TYPE_COLOR_MAPPED, 8) => return Err(Error::PaletteNotAssigned),
            (IMAGE_TYPE_GRAYSCALE, 8) => ChannelLayout::Grayscale,
            (IMAGE_TYPE_TRUE_COLOR, 16) | (IMAGE_TYPE_TRUE_COLOR, 32) => ChannelLayout::Rgba,
            (IMAGE_TYPE_TRUE_COLOR, 24) => ChannelLayout::Rgb,
            (IMAGE_TYPE_COLOR_MAPPED | IMAGE_TYPE_GRAYSCALE | IMAGE_TYPE_TRUE_COLOR, bits) => {
                return Err(Error::UnsupportedBitDepth("TGA", bits as u32))
            }
            _ => return Err(Error::UnsupportedImageType("TGA", header.image_type as u32)),
        };
        let size = Size::flat(header.width as u32, header.height as u32);
        if !size.is_valid() {
            return Err(Error::InvalidSize);
        }
        let pixel_size = header.bits_per_pixel as usize / 8;
        let stored_size = size
            .checked_num_pixels()
            .and_then(|num_pixels| num_pixels.checked_mul(pixel_size))
            .ok_or(Error::InvalidSize)?;
        let mut stored = if header.is_rle() {
            decode_rle(&mut self.reader, pixel_size, stored_size)?
        } else {
            let stored = read_up_to(&mut self.reader, stored_size)
                .map_err(|e| Error::FailedToRead("TGA pixel data", e))?;
            if stored.len() < stored_size {
                return Err(Error::FailedToRead(
                    "TGA pixel data",
                    io::ErrorKind::UnexpectedEof.into(),
                ));
            }
            stored
        };

        if !header.is_top_down() {
            let row_size = header.width as usize * pixel_size;
            flip_rows(&mut stored, row_size);
        }
        let data = match header.bits_per_pixel {
            16 => unpack_5551(&stored, header.descriptor & DESCRIPTOR_ALPHA_BITS != 0),
            24 | 32 => {
                for pixel in stored.chunks_exact_mut(pixel_size) {
                    pixel.swap(0, 2);
                }
                stored
            }
            _ => stored,
        };

        let mut buffer = SharedImageBuffer::new();
        buffer.create_image(PixelFormat::uncompressed(DataType::Byte, layout), size);
        buffer.take_over_data(data)?;
        buffer.set_palette(palette);
        Ok(Image::from_buffer(buffer))
    }
}

fn flip_rows(data: &mut [u8], row_size: usize) {
    if row_size == 0 {
        return;
    }
    let rows = data.len() / row_size;
    for top in 0..rows / 2 {
        let bottom = rows - 1 - top;
        let (head, tail) = data.split_at_mut(bottom * row_size);
        head[top * row_size..(top + 1) * row_size].swap_with_slice(&mut tail[..row_size]);
    }
}

/// Expands 5:5:5:1 BGRA pixels to RGBA bytes. Without attribute bits every pixel is opaque.
fn unpack_5551(stored: &[u8], has_alpha: bool) -> Vec<u8> {
    let mut data = Vec::with_capacity(stored.len() * 2);
    for bytes in stored.chunks_exact(2) {
        let pixel = u16::from_le_bytes([bytes[0], bytes[1]]);
        let red = ((pixel >> 10) & 0x1F) << 3;
        let green = ((pixel >> 5) & 0x1F) << 3;
        let blue = (pixel & 0x1F) << 3;
        let alpha = if !has_alpha || pixel & 0x8000 != 0 {
            0xFF
        } else {
            0
        };
        data.extend_from_slice(&[red as u8, green as u8, blue as u8, alpha]);
    }
    data
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::codec::tga::{COLOR_MAP_PRESENT, DESCRIPTOR_TOP_LEFT};
    use std::io::Cursor;

    fn tga_file(header: TgaHeader, payload: &[u8]) -> Cursor<Vec<u8>> {
        let mut bytes = header.to_bytes();
        bytes.extend_from_slice(payload);
        Cursor::new(bytes)
    }

    fn true_color(width: u16, height: u16, bits_per_pixel: u8) -> TgaHeader {
        TgaHeader {
            image_type: IMAGE_TYPE_TRUE_COLOR,
            width,
            height,
            bits_per_pixel,
            ..Default::default()
        }
    }

    #[test]
    fn bottom_up_rows_and_bgr_order() {
        let payload = [1, 2, 3, 4, 5, 6];
        let image = TgaImageReader::new(tga_file(true_color(1, 2, 24), &payload))
            .read_image()
            .unwrap();
        let buffer = image.buffer().unwrap();
        assert_eq!(buffer.layout(), ChannelLayout::Rgb);
        assert_eq!(buffer.data(), Some(&[6, 5, 4, 3, 2, 1][..]));

        let mut header = true_color(1, 2, 24);
        header.descriptor = DESCRIPTOR_TOP_LEFT;
        let image = TgaImageReader::new(tga_file(header, &payload))
            .read_image()
            .unwrap();
        assert_eq!(image.buffer().unwrap().data(), Some(&[3, 2, 1, 6, 5, 4][..]));
    }

    #[test]
    fn image_id_is_skipped() {
        let mut header = true_color(1, 1, 32);
        header.id_length = 3;
        let image = TgaImageReader::new(tga_file(header, &[9, 9, 9, 10, 20, 30, 40]))
            .read_image()
            .unwrap();
        assert_eq!(image.buffer().unwrap().data(), Some(&[30, 20, 10, 40][..]));
    }

    #[test]
    fn sixteen_bit_pixels() {
        let mut header = true_color(2, 1, 16);
        header.descriptor = 1 | DESCRIPTOR_TOP_LEFT;
        // 0b1_11111_00000_00001 and 0b0_00000_11111_00000
        let payload = [0x01, 0xFC, 0xE0, 0x03];
        let image = TgaImageReader::new(tga_file(header, &payload))
            .read_image()
            .unwrap();
        let buffer = image.buffer().unwrap();
        assert_eq!(buffer.layout(), ChannelLayout::Rgba);
        assert_eq!(buffer.data(), Some(&[248, 0, 8, 255, 0, 248, 0, 0][..]));

        header.descriptor = DESCRIPTOR_TOP_LEFT;
        let image = TgaImageReader::new(tga_file(header, &payload))
            .read_image()
            .unwrap();
        assert_eq!(image.buffer().unwrap().data().unwrap()[7], 255);
    }

    #[test]
    fn run_length_encoded_gray() {
        let header = TgaHeader {
            image_type: IMAGE_TYPE_GRAYSCALE | IMAGE_TYPE_RLE,
            width: 3,
            height: 2,
            bits_per_pixel: 8,
            descriptor: DESCRIPTOR_TOP_LEFT,
            ..Default::default()
        };
        let payload = [0x82, 7, 0x02, 1, 2, 3];
        let image = TgaImageReader::new(tga_file(header, &payload))
            .read_image()
            .unwrap();
        let buffer = image.buffer().unwrap();
        assert_eq!(buffer.layout(), ChannelLayout::Grayscale);
        assert_eq!(buffer.data(), Some(&[7, 7, 7, 1, 2, 3][..]));
    }

    #[test]
    fn color_mapped_image_keeps_its_palette() {
        let header = TgaHeader {
            color_map_type: COLOR_MAP_PRESENT,
            image_type: IMAGE_TYPE_COLOR_MAPPED,
            color_map_entries: 2,
            color_map_bits: 24,
            width: 2,
            height: 1,
            bits_per_pixel: 8,
            ..Default::default()
        };
        let payload = [3, 2, 1, 6, 5, 4, 1, 0];
        let image = TgaImageReader::new(tga_file(header, &payload))
            .read_image()
            .unwrap();
        let buffer = image.buffer().unwrap();
        assert_eq!(buffer.layout(), ChannelLayout::Palette);
        assert_eq!(buffer.data(), Some(&[1, 0][..]));
        let palette = buffer.palette().unwrap();
        assert_eq!(palette.color(0), Some(RgbColor::new(1, 2, 3)));
        assert_eq!(palette.color(1), Some(RgbColor::new(4, 5, 6)));
        assert_eq!(image.check_consistency(), crate::image::Consistency::Ok);
    }

    #[test]
    fn unsupported_files() {
        let result = TgaImageReader::new(tga_file(true_color(1, 1, 12), &[0, 0])).read_image();
        assert!(matches!(result, Err(Error::UnsupportedBitDepth("TGA", 12))));

        let mut header = true_color(1, 1, 24);
        header.image_type = 32;
        let result = TgaImageReader::new(tga_file(header, &[0, 0, 0])).read_image();
        assert!(matches!(result, Err(Error::UnsupportedImageType("TGA", 32))));

        let result = TgaImageReader::new(tga_file(true_color(2, 2, 24), &[0; 5])).read_image();
        assert!(matches!(result, Err(Error::FailedToRead(_, _))));
    }

    #[test]
    fn oversized_headers_are_rejected() {
        let result =
            TgaImageReader::new(tga_file(true_color(u16::MAX, u16::MAX, 32), &[1, 2, 3, 4]))
                .read_image();
        assert!(matches!(result, Err(Error::FailedToRead("TGA pixel data", _))));

        let mut header = true_color(u16::MAX, u16::MAX, 32);
        header.image_type |= IMAGE_TYPE_RLE;
        let result = TgaImageReader::new(tga_file(header, &[0xFF, 1, 2, 3, 4])).read_image();
        assert!(matches!(result, Err(Error::FailedToRead("TGA packet header", _))));

        let result = TgaImageReader::new(tga_file(true_color(0, 4, 24), &[])).read_image();
        assert!(matches!(result, Err(Error::InvalidSize)));
    }
}
