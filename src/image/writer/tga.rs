use std::io::Write;

use crate::binary_stream::write_all;
use crate::color::RgbColor;
use crate::error::Error;
use crate::image::codec::tga::{
    encode_rle_row, TgaHeader, COLOR_MAP_PRESENT, IMAGE_TYPE_COLOR_MAPPED, IMAGE_TYPE_RLE,
    IMAGE_TYPE_TRUE_COLOR,
};
use crate::image::format::{ChannelLayout, DataType};
use crate::image::palette::Palette;
use crate::image::{Image, ImageWriter};

const COLOR_MAP_ENTRIES: usize = 256;

/// Writes the base level of the first part as a bottom-up TGA file.
///
/// Grayscale and palette images are stored color mapped with a 256 entry
/// 24 bit map. RGB(A) and BGR(A) images are stored as true color.
pub struct TgaImageWriter<'a, 'b, T: Write> {
    writer: T,
    image: &'a Image<'b>,
    rle: bool,
}

impl<'a, 'b, T: Write> TgaImageWriter<'a, 'b, T> {
    pub fn new(writer: T, image: &'a Image<'b>, rle: bool) -> Self {
        Self { writer, image, rle }
    }
}

impl<T: Write> ImageWriter for TgaImageWriter<'_, '_, T> {
    fn write_image(&mut self) -> crate::Result<()> {
        let buffer = self.image.buffer().ok_or(Error::ImageHasNoBuffer)?;
        if buffer.data_type() != DataType::Byte {
            return Err(Error::UnsupportedDataType("TGA", buffer.data_type()));
        }
        let layout = buffer.layout();
        let color_map = match layout {
            ChannelLayout::Grayscale => Some(gray_color_map()),
            ChannelLayout::Palette => {
                let palette = buffer.palette().ok_or(Error::PaletteNotAssigned)?;
                Some(color_map_of(palette)?)
            }
            ChannelLayout::Rgb | ChannelLayout::Rgba | ChannelLayout::Bgr | ChannelLayout::Bgra => {
                None
            }
            ChannelLayout::GrayscaleAlpha => {
                return Err(Error::UnsupportedChannelLayout("TGA", layout))
            }
        };
        let size = buffer.size();
        let width = u16::try_from(size.width).map_err(|_| Error::InvalidSize)?;
        let height = u16::try_from(size.height).map_err(|_| Error::InvalidSize)?;
        let pixel_size = layout.components_per_pixel();

        let mut header = TgaHeader {
            width,
            height,
            bits_per_pixel: (pixel_size * 8) as u8,
            ..Default::default()
        };
        if color_map.is_some() {
            header.color_map_type = COLOR_MAP_PRESENT;
            header.image_type = IMAGE_TYPE_COLOR_MAPPED;
            header.color_map_entries = COLOR_MAP_ENTRIES as u16;
            header.color_map_bits = 24;
        } else {
            header.image_type = IMAGE_TYPE_TRUE_COLOR;
        }
        if layout.has_alpha() {
            header.descriptor = 8;
        }
        if self.rle {
            header.image_type |= IMAGE_TYPE_RLE;
        }
        log::info!(
            "Writing {}x{} TGA image of type {} from {:?} pixels",
            width,
            height,
            header.image_type,
            layout
        );

        let pixels = buffer.decoded_data()?;
        let row_size = size.width as usize * pixel_size;
        let mut encoded = header.to_bytes();
        if let Some(color_map) = color_map {
            encoded.extend_from_slice(&color_map);
        }
        let mut row = vec![0; row_size];
        for y in (0..size.height as usize).rev() {
            row.copy_from_slice(&pixels[y * row_size..(y + 1) * row_size]);
            if matches!(layout, ChannelLayout::Rgb | ChannelLayout::Rgba) {
                for pixel in row.chunks_exact_mut(pixel_size) {
                    pixel.swap(0, 2);
                }
            }
            if self.rle {
                encode_rle_row(&row, pixel_size, &mut encoded)?;
            } else {
                encoded.extend_from_slice(&row);
            }
        }

        write_all(&mut self.writer, &encoded, "TGA image")?;
        self.writer
            .flush()
            .map_err(|e| Error::FailedToWrite("TGA image", e))
    }
}

fn gray_color_map() -> Vec<u8> {
    (0..COLOR_MAP_ENTRIES)
        .flat_map(|value| [value as u8; 3])
        .collect()
}

fn color_map_of(palette: &Palette) -> crate::Result<Vec<u8>> {
    if palette.num_colors() > COLOR_MAP_ENTRIES {
        return Err(Error::InvalidPaletteSize(palette.num_colors()));
    }
    let mut color_map: Vec<u8> = palette
        .colors()
        .flat_map(|RgbColor { red, green, blue }| [blue, green, red])
        .collect();
    color_map.resize(COLOR_MAP_ENTRIES * 3, 0);
    Ok(color_map)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::format::PixelFormat;
    use crate::image::reader::TgaImageReader;
    use crate::image::shared::SharedImageBuffer;
    use crate::image::{ImageReader, Size};
    use std::io::Cursor;

    fn image_with(layout: ChannelLayout, size: Size, data: &[u8]) -> Image<'static> {
        let mut buffer = SharedImageBuffer::new();
        buffer.create_image(PixelFormat::uncompressed(DataType::Byte, layout), size);
        buffer.copy_data(data).unwrap();
        Image::from_buffer(buffer)
    }

    fn write(image: &Image<'_>, rle: bool) -> crate::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        TgaImageWriter::new(&mut bytes, image, rle).write_image()?;
        Ok(bytes)
    }

    #[test]
    fn true_color_layout() {
        let image = image_with(ChannelLayout::Rgb, Size::flat(1, 2), &[1, 2, 3, 4, 5, 6]);
        let bytes = write(&image, false).unwrap();
        let header = TgaHeader::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(header.image_type, IMAGE_TYPE_TRUE_COLOR);
        assert_eq!(header.bits_per_pixel, 24);
        assert!(!header.is_top_down());
        assert_eq!(&bytes[18..], [6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn run_length_encoded_round_trip() {
        let mut data = vec![7; 4 * 200];
        data[4 * 150..4 * 153].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        let image = image_with(ChannelLayout::Rgba, Size::flat(100, 2), &data);
        let bytes = write(&image, true).unwrap();
        assert!(bytes.len() < 18 + data.len());
        let read = TgaImageReader::new(Cursor::new(bytes)).read_image().unwrap();
        let buffer = read.buffer().unwrap();
        assert_eq!(buffer.layout(), ChannelLayout::Rgba);
        assert_eq!(buffer.data(), Some(&data[..]));
    }

    #[test]
    fn grayscale_is_color_mapped() {
        let image = image_with(ChannelLayout::Grayscale, Size::flat(2, 1), &[0, 200]);
        let bytes = write(&image, false).unwrap();
        assert_eq!(bytes.len(), 18 + 256 * 3 + 2);
        let read = TgaImageReader::new(Cursor::new(bytes)).read_image().unwrap();
        let buffer = read.buffer().unwrap();
        assert_eq!(buffer.layout(), ChannelLayout::Palette);
        assert_eq!(buffer.data(), Some(&[0, 200][..]));
        assert_eq!(buffer.palette().unwrap().color(200), Some(RgbColor::gray(200)));
    }

    #[test]
    fn palette_round_trip() {
        let mut image = image_with(ChannelLayout::Palette, Size::flat(2, 1), &[1, 0]);
        let palette = Palette::from_iter([RgbColor::new(1, 2, 3), RgbColor::new(4, 5, 6)]);
        image.buffer_mut().unwrap().set_palette(Some(palette));
        let bytes = write(&image, true).unwrap();
        let read = TgaImageReader::new(Cursor::new(bytes)).read_image().unwrap();
        let buffer = read.buffer().unwrap();
        assert_eq!(buffer.data(), Some(&[1, 0][..]));
        assert_eq!(buffer.palette().unwrap().color(1), Some(RgbColor::new(4, 5, 6)));
    }

    #[test]
    fn unsupported_images() {
        let image = image_with(ChannelLayout::GrayscaleAlpha, Size::flat(1, 1), &[1, 2]);
        assert!(matches!(
            write(&image, false),
            Err(Error::UnsupportedChannelLayout("TGA", ChannelLayout::GrayscaleAlpha))
        ));
        assert!(matches!(
            write(&Image::new(), false),
            Err(Error::ImageHasNoBuffer)
        ));
        let image = image_with(ChannelLayout::Palette, Size::flat(1, 1), &[0]);
        assert!(matches!(write(&image, false), Err(Error::PaletteNotAssigned)));
    }
}
