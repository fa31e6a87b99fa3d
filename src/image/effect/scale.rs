use super::{apply_to_base_level, ImageEffect};
use crate::error::Error;
use crate::image::shared::SharedImageBuffer;
use crate::image::{ImagePart, Size};

/// Resizes buffers with nearest neighbour sampling.
///
/// With `use_mipmaps` set, a part whose mip chain already holds a level of
/// the target size promotes that level instead of resampling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scale {
    pub size: Size,
    pub use_mipmaps: bool,
}

impl Scale {
    pub fn new(size: Size, use_mipmaps: bool) -> Self {
        Self { size, use_mipmaps }
    }
}

impl ImageEffect for Scale {
    fn apply(&self, buffer: &mut SharedImageBuffer<'_>) -> crate::Result<()> {
        if !self.size.is_valid() {
            return Err(Error::InvalidSize);
        }
        let source_size = buffer.size();
        if source_size == self.size {
            return Ok(());
        }
        let scaled_size = buffer
            .format()
            .checked_data_size(self.size)
            .ok_or(Error::InvalidSize)?;
        let pixel_size = buffer.bytes_per_pixel();
        let pixels = buffer.decoded_data()?;
        let (source_width, source_height, source_depth) = (
            source_size.width as usize,
            source_size.height as usize,
            source_size.depth as usize,
        );
        let (width, height, depth) = (
            self.size.width as usize,
            self.size.height as usize,
            self.size.depth as usize,
        );
        let mut scaled = Vec::with_capacity(scaled_size);
        for z in 0..depth {
            let source_z = z * source_depth / depth;
            for y in 0..height {
                let source_y = y * source_height / height;
                let row = (source_z * source_height + source_y) * source_width;
                for x in 0..width {
                    let source_x = x * source_width / width;
                    let offset = (row + source_x) * pixel_size;
                    scaled.extend_from_slice(&pixels[offset..offset + pixel_size]);
                }
            }
        }
        drop(pixels);

        log::debug!("Scaled buffer from {:?} to {:?}", source_size, self.size);
        let format = buffer.format();
        let palette = buffer.palette().cloned();
        buffer.create_image(format, self.size);
        buffer.set_palette(palette);
        buffer.take_over_data(scaled)
    }

    fn apply_to_part(&self, part: &mut ImagePart<'_>) -> crate::Result<()> {
        if self.use_mipmaps {
            let level = part
                .mipmaps()
                .iter()
                .position(|buffer| buffer.size() == self.size);
            if let Some(level) = level {
                log::debug!("Promoting mipmap level {} to {:?}", level, self.size);
                part.promote_mipmap(level);
                return Ok(());
            }
        }
        apply_to_base_level(self, part)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::format::{ChannelLayout, DataType, PixelFormat};
    use crate::image::PartSemantic;

    fn gray(size: Size, data: &[u8]) -> SharedImageBuffer<'static> {
        let mut buffer = SharedImageBuffer::new();
        buffer.create_image(
            PixelFormat::uncompressed(DataType::Byte, ChannelLayout::Grayscale),
            size,
        );
        buffer.copy_data(data).unwrap();
        buffer
    }

    #[test]
    fn nearest_neighbour_sampling() {
        let mut buffer = gray(Size::flat(2, 2), &[1, 2, 3, 4]);
        buffer
            .apply_effect(&Scale::new(Size::flat(4, 1), false))
            .unwrap();
        assert_eq!(buffer.size(), Size::flat(4, 1));
        assert_eq!(buffer.data(), Some(&[1, 1, 2, 2][..]));

        let mut shrunk = gray(Size::flat(4, 2), &[1, 2, 3, 4, 5, 6, 7, 8]);
        shrunk
            .apply_effect(&Scale::new(Size::flat(2, 1), false))
            .unwrap();
        assert_eq!(shrunk.data(), Some(&[1, 3][..]));
    }

    #[test]
    fn matching_mipmap_is_promoted() {
        let mut part = ImagePart::new(PartSemantic::Static);
        part.add_mipmap(gray(Size::flat(2, 2), &[1, 2, 3, 4]));
        part.add_mipmap(gray(Size::flat(1, 1), &[42]));

        part.apply_effect(&Scale::new(Size::flat(1, 1), true))
            .unwrap();
        assert_eq!(part.num_mipmaps(), 1);
        assert_eq!(part.base().unwrap().data(), Some(&[42][..]));
    }

    #[test]
    fn resampling_rebuilds_the_chain() {
        let mut part = ImagePart::new(PartSemantic::Static);
        part.add_mipmap(gray(Size::flat(2, 2), &[1, 2, 3, 4]));
        part.add_mipmap(gray(Size::flat(1, 1), &[42]));

        part.apply_effect(&Scale::new(Size::flat(1, 1), false))
            .unwrap();
        assert_eq!(part.base().unwrap().data(), Some(&[1][..]));
        assert_eq!(part.num_mipmaps(), 1);
    }

    #[test]
    fn wide_rows_index_without_overflow() {
        let source: Vec<u8> = (0..70_000u32).map(|index| (index % 251) as u8).collect();
        let mut buffer = gray(Size::flat(70_000, 1), &source);
        buffer
            .apply_effect(&Scale::new(Size::flat(70_001, 1), false))
            .unwrap();
        let data = buffer.data().unwrap();
        assert_eq!(data.len(), 70_001);
        assert_eq!(data[0], 0);
        assert_eq!(data[70_000], (69_999 % 251) as u8);
    }

    #[test]
    fn invalid_target_size() {
        let mut buffer = gray(Size::flat(1, 1), &[0]);
        assert!(matches!(
            buffer.apply_effect(&Scale::new(Size::flat(0, 1), false)),
            Err(Error::InvalidSize)
        ));
    }
}
