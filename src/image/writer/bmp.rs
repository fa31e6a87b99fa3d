use std::io::Write;

use crate::binary_stream::write_all;
use crate::error::Error;
use crate::image::codec::bmp::{
    row_padding, BmpHeader, BI_RGB, HEADERS_SIZE, INFO_HEADER_SIZE, MAX_PALETTE_ENTRIES,
    PALETTE_ENTRY_SIZE,
};
use crate::image::format::{ChannelLayout, DataType};
use crate::image::palette::Palette;
use crate::image::{Image, ImageWriter};

/// Writes the base level of the first part as a top-down bitmap.
pub struct BmpImageWriter<'a, 'b, T: Write> {
    writer: T,
    image: &'a Image<'b>,
}

impl<'a, 'b, T: Write> BmpImageWriter<'a, 'b, T> {
    pub fn new(writer: T, image: &'a Image<'b>) -> Self {
        Self { writer, image }
    }
}

impl<T: Write> ImageWriter for BmpImageWriter<'_, '_, T> {
    fn write_image(&mut self) -> crate::Result<()> {
        let buffer = self.image.buffer().ok_or(Error::ImageHasNoBuffer)?;
        if buffer.data_type() != DataType::Byte {
            return Err(Error::UnsupportedDataType("BMP", buffer.data_type()));
        }
        let layout = buffer.layout();
        let palette = match layout {
            ChannelLayout::Grayscale => Some(gray_palette_entries()),
            ChannelLayout::Palette => {
                let palette = buffer.palette().ok_or(Error::PaletteNotAssigned)?;
                Some(palette_entries(palette)?)
            }
            ChannelLayout::Rgb | ChannelLayout::Rgba | ChannelLayout::Bgr | ChannelLayout::Bgra => {
                None
            }
            ChannelLayout::GrayscaleAlpha => {
                return Err(Error::UnsupportedChannelLayout("BMP", layout))
            }
        };
        let size = buffer.size();
        let width = i32::try_from(size.width).map_err(|_| Error::InvalidSize)?;
        let height = i32::try_from(size.height).map_err(|_| Error::InvalidSize)?;
        let pixel_size = layout.components_per_pixel();
        let row_size = size.width as usize * pixel_size;
        let padding = row_padding(size.width as usize, pixel_size);
        let image_size = (row_size + padding) * size.height as usize;
        let palette_size = palette.as_ref().map_or(0, Vec::len);
        let data_offset = HEADERS_SIZE + palette_size;

        let header = BmpHeader {
            file_size: (data_offset + image_size) as u32,
            data_offset: data_offset as u32,
            info_size: INFO_HEADER_SIZE as u32,
            width,
            height: -height,
            planes: 1,
            bits_per_pixel: (pixel_size * 8) as u16,
            compression: BI_RGB,
            image_size: image_size as u32,
            colors_used: if palette.is_some() {
                MAX_PALETTE_ENTRIES as u32
            } else {
                0
            },
            ..Default::default()
        };
        log::info!(
            "Writing {}x{} BMP image with {} bits per pixel from {:?} pixels",
            width,
            height,
            header.bits_per_pixel,
            layout
        );

        let pixels = buffer.decoded_data()?;
        let mut encoded = Vec::with_capacity(data_offset + image_size);
        encoded.extend_from_slice(&header.to_bytes());
        if let Some(palette) = palette {
            encoded.extend_from_slice(&palette);
        }
        for row in pixels.chunks_exact(row_size).take(size.height as usize) {
            let start = encoded.len();
            encoded.extend_from_slice(row);
            if matches!(layout, ChannelLayout::Rgb | ChannelLayout::Rgba) {
                for pixel in encoded[start..].chunks_exact_mut(pixel_size) {
                    pixel.swap(0, 2);
                }
            }
            encoded.resize(encoded.len() + padding, 0);
        }

        write_all(&mut self.writer, &encoded, "BMP image")?;
        self.writer
            .flush()
            .map_err(|e| Error::FailedToWrite("BMP image", e))
    }
}

fn gray_palette_entries() -> Vec<u8> {
    (0..MAX_PALETTE_ENTRIES)
        .flat_map(|value| [value as u8, value as u8, value as u8, 0])
        .collect()
}

fn palette_entries(palette: &Palette) -> crate::Result<Vec<u8>> {
    if palette.num_colors() > MAX_PALETTE_ENTRIES {
        return Err(Error::InvalidPaletteSize(palette.num_colors()));
    }
    let mut entries: Vec<u8> = palette
        .colors()
        .flat_map(|color| [color.blue, color.green, color.red, 0])
        .collect();
    entries.resize(MAX_PALETTE_ENTRIES * PALETTE_ENTRY_SIZE, 0);
    Ok(entries)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::color::RgbColor;
    use crate::image::format::PixelFormat;
    use crate::image::reader::BmpImageReader;
    use crate::image::shared::SharedImageBuffer;
    use crate::image::{ImageReader, Size};
    use std::io::Cursor;

    fn image_with(layout: ChannelLayout, size: Size, data: &[u8]) -> Image<'static> {
        let mut buffer = SharedImageBuffer::new();
        buffer.create_image(PixelFormat::uncompressed(DataType::Byte, layout), size);
        buffer.copy_data(data).unwrap();
        Image::from_buffer(buffer)
    }

    fn write(image: &Image<'_>) -> crate::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        BmpImageWriter::new(&mut bytes, image).write_image()?;
        Ok(bytes)
    }

    #[test]
    fn rows_are_padded_to_four_bytes() {
        let data: Vec<u8> = (0..30).collect();
        let image = image_with(ChannelLayout::Rgb, Size::flat(5, 2), &data);
        let bytes = write(&image).unwrap();
        assert_eq!(bytes.len(), 54 + 16 * 2);
        let header = BmpHeader::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(header.file_size as usize, bytes.len());
        assert!(header.is_top_down());
        assert_eq!(&bytes[54..57], [2, 1, 0]);
        assert_eq!(bytes[54 + 15], 0);

        let read = BmpImageReader::new(Cursor::new(bytes)).read_image().unwrap();
        assert_eq!(read.buffer().unwrap().data(), Some(&data[..]));
    }

    #[test]
    fn bgra_is_stored_unchanged() {
        let image = image_with(ChannelLayout::Bgra, Size::flat(1, 1), &[1, 2, 3, 4]);
        let bytes = write(&image).unwrap();
        assert_eq!(&bytes[54..], [1, 2, 3, 4]);
    }

    #[test]
    fn grayscale_round_trip() {
        let image = image_with(ChannelLayout::Grayscale, Size::flat(3, 1), &[0, 128, 255]);
        let bytes = write(&image).unwrap();
        assert_eq!(bytes.len(), 54 + 1024 + 4);
        let read = BmpImageReader::new(Cursor::new(bytes)).read_image().unwrap();
        let buffer = read.buffer().unwrap();
        assert_eq!(buffer.layout(), ChannelLayout::Grayscale);
        assert_eq!(buffer.data(), Some(&[0, 128, 255][..]));
    }

    #[test]
    fn palette_images_expand_on_reading() {
        let mut image = image_with(ChannelLayout::Palette, Size::flat(2, 1), &[1, 0]);
        image
            .buffer_mut()
            .unwrap()
            .set_palette(Some(Palette::from_iter([
                RgbColor::new(1, 2, 3),
                RgbColor::new(4, 5, 6),
            ])));
        let bytes = write(&image).unwrap();
        let read = BmpImageReader::new(Cursor::new(bytes)).read_image().unwrap();
        let buffer = read.buffer().unwrap();
        assert_eq!(buffer.layout(), ChannelLayout::Rgb);
        assert_eq!(buffer.data(), Some(&[4, 5, 6, 1, 2, 3][..]));
    }

    #[test]
    fn unsupported_images() {
        let image = image_with(ChannelLayout::GrayscaleAlpha, Size::flat(1, 1), &[1, 2]);
        assert!(matches!(
            write(&image),
            Err(Error::UnsupportedChannelLayout("BMP", ChannelLayout::GrayscaleAlpha))
        ));
        let mut buffer = SharedImageBuffer::new();
        buffer.create_image(
            PixelFormat::uncompressed(DataType::Float, ChannelLayout::Rgb),
            Size::flat(1, 1),
        );
        assert!(matches!(
            write(&Image::from_buffer(buffer)),
            Err(Error::UnsupportedDataType("BMP", DataType::Float))
        ));
    }
}
