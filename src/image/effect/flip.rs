use super::ImageEffect;
use crate::image::shared::SharedImageBuffer;

/// Mirrors every row horizontally.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlipX;

impl ImageEffect for FlipX {
    fn apply(&self, buffer: &mut SharedImageBuffer<'_>) -> crate::Result<()> {
        let pixel_size = buffer.bytes_per_pixel();
        let width = buffer.size().width as usize;
        let row_size = buffer.bytes_per_row();
        let data = buffer.data_mut()?;
        let mut scratch = vec![0; pixel_size];
        for row in data.chunks_exact_mut(row_size) {
            for left in 0..width / 2 {
                let right = width - 1 - left;
                let (head, tail) = row.split_at_mut(right * pixel_size);
                let left_pixel = &mut head[left * pixel_size..(left + 1) * pixel_size];
                let right_pixel = &mut tail[..pixel_size];
                scratch.copy_from_slice(left_pixel);
                left_pixel.copy_from_slice(right_pixel);
                right_pixel.copy_from_slice(&scratch);
            }
        }
        Ok(())
    }
}

/// Mirrors every depth slice vertically.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlipY;

impl ImageEffect for FlipY {
    fn apply(&self, buffer: &mut SharedImageBuffer<'_>) -> crate::Result<()> {
        let row_size = buffer.bytes_per_row();
        let height = buffer.size().height as usize;
        let slice_size = row_size * height;
        let data = buffer.data_mut()?;
        let mut scratch = vec![0; row_size];
        for slice in data.chunks_exact_mut(slice_size) {
            for top in 0..height / 2 {
                let bottom = height - 1 - top;
                let (head, tail) = slice.split_at_mut(bottom * row_size);
                let top_row = &mut head[top * row_size..(top + 1) * row_size];
                let bottom_row = &mut tail[..row_size];
                scratch.copy_from_slice(top_row);
                top_row.copy_from_slice(bottom_row);
                bottom_row.copy_from_slice(&scratch);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::buffer::TestImage;
    use crate::image::format::{ChannelLayout, DataType, PixelFormat};
    use crate::image::Size;

    fn numbered(size: Size, layout: ChannelLayout) -> SharedImageBuffer<'static> {
        let mut buffer = SharedImageBuffer::new();
        buffer.create_image(PixelFormat::uncompressed(DataType::Word, layout), size);
        for (index, byte) in buffer.data_mut().unwrap().iter_mut().enumerate() {
            *byte = index as u8;
        }
        buffer
    }

    #[test]
    fn flip_x_mirrors_pixels() {
        let mut buffer = numbered(Size::flat(3, 1), ChannelLayout::Grayscale);
        buffer.apply_effect(&FlipX).unwrap();
        assert_eq!(buffer.data(), Some(&[4, 5, 2, 3, 0, 1][..]));
    }

    #[test]
    fn flip_y_mirrors_rows_per_slice() {
        let mut buffer = SharedImageBuffer::new();
        buffer.create_image(
            PixelFormat::uncompressed(DataType::Byte, ChannelLayout::Grayscale),
            Size::new(1, 2, 2),
        );
        buffer.copy_data(&[1, 2, 3, 4]).unwrap();
        buffer.apply_effect(&FlipY).unwrap();
        assert_eq!(buffer.data(), Some(&[2, 1, 4, 3][..]));
    }

    #[test]
    fn flipping_twice_restores_the_buffer() {
        for size in [Size::flat(5, 3), Size::flat(4, 4), Size::new(3, 2, 2)] {
            let original = numbered(size, ChannelLayout::Rgba);
            let mut flipped = original.clone();
            flipped.apply_effect(&FlipX).unwrap();
            flipped.apply_effect(&FlipX).unwrap();
            assert_eq!(flipped.data(), original.data());
            flipped.apply_effect(&FlipY).unwrap();
            assert_ne!(flipped.data(), original.data());
            flipped.apply_effect(&FlipY).unwrap();
            assert_eq!(flipped.data(), original.data());
        }

        let mut checkers = SharedImageBuffer::new();
        checkers.create_test_image(TestImage::Checkers);
        let original = checkers.clone();
        checkers.apply_effect(&FlipY).unwrap();
        checkers.apply_effect(&FlipY).unwrap();
        assert_eq!(checkers.data(), original.data());
    }
}
