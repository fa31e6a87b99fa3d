use std::io::{self, Read};

use crate::binary_stream::{read_exact, read_up_to};
use crate::color::RgbColor;
use crate::error::Error;
use crate::image::codec::bmp::{
    row_padding, BmpHeader, BI_RGB, HEADERS_SIZE, MAX_PALETTE_ENTRIES, PALETTE_ENTRY_SIZE,
};
use crate::image::format::{ChannelLayout, DataType, PixelFormat};
use crate::image::shared::SharedImageBuffer;
use crate::image::{Image, ImageReader, Size};

/// Reads uncompressed 8, 24 and 32 bit Windows bitmaps.
///
/// 8 bit images are expanded through their palette: to grayscale when every
/// entry is gray, to RGB otherwise.
pub struct BmpImageReader<T: Read> {
    reader: T,
}

impl<T: Read> BmpImageReader<T> {
    pub fn new(reader: T) -> Self {
        Self { reader }
    }

    fn skip(&mut self, count: u64) -> crate::Result<()> {
        let skipped = io::copy(&mut (&mut self.reader).take(count), &mut io::sink())
            .map_err(|e| Error::FailedToRead("BMP header", e))?;
        if skipped < count {
            return Err(Error::FailedToRead(
                "BMP header",
                io::ErrorKind::UnexpectedEof.into(),
            ));
        }
        Ok(())
    }

    fn read_palette(&mut self, header: &BmpHeader) -> crate::Result<Vec<RgbColor>> {
        let num_colors = match header.colors_used as usize {
            0 => MAX_PALETTE_ENTRIES,
            count if count <= MAX_PALETTE_ENTRIES => count,
            count => return Err(Error::InvalidPaletteSize(count)),
        };
        let mut entries = vec![0; num_colors * PALETTE_ENTRY_SIZE];
        read_exact(&mut self.reader, &mut entries, "BMP palette")?;
        Ok(entries
            .chunks_exact(PALETTE_ENTRY_SIZE)
            .map(|bgrx| RgbColor::new(bgrx[2], bgrx[1], bgrx[0]))
            .collect())
    }
}

impl<T: Read> ImageReader for BmpImageReader<T> {
    fn read_image(&mut self) -> crate::Result<Image<'static>> {
        let header = BmpHeader::read(&mut self.reader)?;
        log::info!(
            "Reading {}x{} BMP image with {} bits per pixel",
            header.width,
            header.height,
            header.bits_per_pixel
        );
        self.skip(header.extra_info_bytes() as u64)?;
        if header.compression != BI_RGB {
            return Err(Error::UnsupportedImageType("BMP", header.compression));
        }
        let pixel_size = match header.bits_per_pixel {
            8 | 24 | 32 => header.bits_per_pixel as usize / 8,
            bits => return Err(Error::UnsupportedBitDepth("BMP", bits as u32)),
        };
        if header.width <= 0 || header.height == 0 {
            return Err(Error::InvalidSize);
        }
        let palette = if pixel_size == 1 {
            self.read_palette(&header)?
        } else {
            Vec::new()
        };

        let consumed = HEADERS_SIZE + header.extra_info_bytes() + palette.len() * PALETTE_ENTRY_SIZE;
        if header.data_offset as usize > consumed {
            self.skip((header.data_offset as usize - consumed) as u64)?;
        }

        let width = header.width as usize;
        let height = header.height.unsigned_abs() as usize;
        let row_size = width.checked_mul(pixel_size).ok_or(Error::InvalidSize)?;
        let stride = row_size
            .checked_add(row_padding(width, pixel_size))
            .ok_or(Error::InvalidSize)?;
        let pixel_data_size = stride.checked_mul(height).ok_or(Error::InvalidSize)?;
        let rows = read_up_to(&mut self.reader, pixel_data_size)
            .map_err(|e| Error::FailedToRead("BMP pixel data", e))?;
        if rows.len() < pixel_data_size {
            return Err(Error::FailedToRead(
                "BMP pixel data",
                io::ErrorKind::UnexpectedEof.into(),
            ));
        }

        let mut stored = Vec::with_capacity(row_size * height);
        let mut append_row = |row: &[u8]| stored.extend_from_slice(&row[..row_size]);
        if header.is_top_down() {
            rows.chunks_exact(stride).for_each(&mut append_row);
        } else {
            rows.chunks_exact(stride).rev().for_each(&mut append_row);
        }

        let (layout, data) = if pixel_size == 1 {
            expand_indices(&stored, &palette)
        } else {
            for pixel in stored.chunks_exact_mut(pixel_size) {
                pixel.swap(0, 2);
            }
            let layout = if pixel_size == 3 {
                ChannelLayout::Rgb
            } else {
                ChannelLayout::Rgba
            };
            (layout, stored)
        };

        let mut buffer = SharedImageBuffer::new();
        buffer.create_image(
            PixelFormat::uncompressed(DataType::Byte, layout),
            Size::flat(width as u32, height as u32),
        );
        buffer.take_over_data(data)?;
        Ok(Image::from_buffer(buffer))
    }
}

fn expand_indices(indices: &[u8], palette: &[RgbColor]) -> (ChannelLayout, Vec<u8>) {
    let color = |index: &u8| palette.get(*index as usize).copied().unwrap_or_default();
    if palette.iter().all(RgbColor::is_gray) {
        let data = indices.iter().map(|index| color(index).red).collect();
        (ChannelLayout::Grayscale, data)
    } else {
        let data = indices
            .iter()
            .flat_map(|index| <[u8; 3]>::from(color(index)))
            .collect();
        (ChannelLayout::Rgb, data)
    }
}
