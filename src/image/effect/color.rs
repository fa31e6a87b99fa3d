use super::ImageEffect;
use crate::color::{luminance, RgbColor};
use crate::error::Error;
use crate::image::component::{with_component_type, Component};
use crate::image::converter::FormatConverter;
use crate::image::format::ChannelLayout;
use crate::image::palette::Palette;
use crate::image::shared::SharedImageBuffer;

/// Makes pixels close to a key color transparent and all others opaque.
///
/// Buffers without alpha are converted to the alpha variant of their layout
/// first. The tolerance is given in the normalized 0..1 range and applies to
/// every color channel; gray buffers compare against the key's luminance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorKey {
    pub color: RgbColor,
    pub tolerance: f64,
}

impl ColorKey {
    pub fn new(color: RgbColor, tolerance: f64) -> Self {
        Self { color, tolerance }
    }
}

impl ImageEffect for ColorKey {
    fn apply(&self, buffer: &mut SharedImageBuffer<'_>) -> crate::Result<()> {
        let layout = buffer.layout();
        if layout == ChannelLayout::Palette {
            return Err(Error::ColorKeyOnPalette);
        }
        let data_type = buffer.data_type();
        if !layout.has_alpha() {
            FormatConverter::convert(
                buffer.buffer_mut(),
                data_type,
                layout.with_alpha(),
                data_type.default_alpha(),
            )?;
        }
        let layout = buffer.layout();

        let max_value = data_type.max_value();
        let scale = |value: f64| {
            let scaled = value * max_value;
            if data_type.is_floating_point() {
                scaled
            } else {
                scaled.round()
            }
        };
        let [red, green, blue] = self.color.normalized();
        let tolerance = scale(self.tolerance);
        let (channels, key) = match layout.color_indices() {
            Some(indices) => (indices.to_vec(), vec![scale(red), scale(green), scale(blue)]),
            None => (vec![0], vec![scale(luminance(red, green, blue))]),
        };
        let alpha_index = layout.alpha_index().ok_or(Error::UnsupportedChannelLayout(
            "color keying",
            layout,
        ))?;

        let components = layout.components_per_pixel();
        let num_pixels = buffer.num_pixels();
        let data = buffer.data_mut()?;
        let mut keyed = 0usize;
        with_component_type!(data_type, C => {
            for pixel in 0..num_pixels {
                let offset = pixel * components;
                let matches = channels.iter().zip(&key).all(|(channel, key)| {
                    (C::get(data, offset + channel).to_f64() - key).abs() <= tolerance
                });
                let alpha = if matches {
                    keyed += 1;
                    0.0
                } else {
                    max_value
                };
                C::set(data, offset + alpha_index, C::from_f64(alpha));
            }
        });
        log::debug!(
            "Color key {} made {} of {} pixels transparent",
            self.color,
            keyed,
            num_pixels
        );
        Ok(())
    }
}

/// Replaces every color with its luminance, keeping the channel layout.
#[derive(Clone, Copy, Debug, Default)]
pub struct Monochrome;

impl ImageEffect for Monochrome {
    fn apply(&self, buffer: &mut SharedImageBuffer<'_>) -> crate::Result<()> {
        let layout = buffer.layout();
        if layout == ChannelLayout::Palette {
            if let Some(palette) = buffer.palette_mut() {
                *palette = palette
                    .colors()
                    .map(|color| RgbColor::gray(color.luminance()))
                    .collect::<Palette>();
            }
            return Ok(());
        }
        let Some([red, green, blue]) = layout.color_indices() else {
            return Ok(());
        };
        let components = layout.components_per_pixel();
        let num_pixels = buffer.num_pixels();
        let data_type = buffer.data_type();
        let data = buffer.data_mut()?;
        with_component_type!(data_type, C => {
            for pixel in 0..num_pixels {
                let offset = pixel * components;
                let value = C::from_f64_rounded(luminance(
                    C::get(data, offset + red).to_f64(),
                    C::get(data, offset + green).to_f64(),
                    C::get(data, offset + blue).to_f64(),
                ));
                for channel in [red, green, blue] {
                    C::set(data, offset + channel, value);
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::format::{DataType, PixelFormat};
    use crate::image::Size;

    fn buffer_with(layout: ChannelLayout, data: &[u8]) -> SharedImageBuffer<'static> {
        let mut buffer = SharedImageBuffer::new();
        let pixels = data.len() / layout.components_per_pixel();
        buffer.create_image(
            PixelFormat::uncompressed(DataType::Byte, layout),
            Size::flat(pixels as u32, 1),
        );
        buffer.copy_data(data).unwrap();
        buffer
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let mut buffer = buffer_with(
            ChannelLayout::Rgb,
            &[100, 100, 100, 110, 90, 110, 111, 100, 100, 50, 50, 50],
        );
        let key = ColorKey::new(RgbColor::gray(100), 10.0 / 255.0);
        buffer.apply_effect(&key).unwrap();
        assert_eq!(buffer.layout(), ChannelLayout::Rgba);
        let alpha: Vec<u8> = buffer.data().unwrap().chunks(4).map(|pixel| pixel[3]).collect();
        assert_eq!(alpha, [0, 0, 255, 255]);
    }

    #[test]
    fn existing_alpha_is_overwritten() {
        let mut buffer = buffer_with(ChannelLayout::Bgra, &[3, 2, 1, 128, 0, 0, 0, 7]);
        buffer
            .apply_effect(&ColorKey::new(RgbColor::new(1, 2, 3), 0.0))
            .unwrap();
        assert_eq!(buffer.data(), Some(&[3, 2, 1, 0, 0, 0, 0, 255][..]));
    }

    #[test]
    fn gray_buffers_compare_against_key_luminance() {
        let mut buffer = buffer_with(ChannelLayout::Grayscale, &[76, 77, 0]);
        buffer
            .apply_effect(&ColorKey::new(RgbColor::new(255, 0, 0), 0.0))
            .unwrap();
        assert_eq!(buffer.layout(), ChannelLayout::GrayscaleAlpha);
        assert_eq!(buffer.data(), Some(&[76, 0, 77, 255, 0, 255][..]));
    }

    #[test]
    fn color_key_rejects_palettes() {
        let mut buffer = buffer_with(ChannelLayout::Palette, &[0]);
        assert!(matches!(
            buffer.apply_effect(&ColorKey::new(RgbColor::gray(0), 0.1)),
            Err(Error::ColorKeyOnPalette)
        ));
    }

    #[test]
    fn monochrome_keeps_layout() {
        let mut buffer = buffer_with(ChannelLayout::Rgba, &[255, 0, 0, 9, 0, 0, 255, 8]);
        buffer.apply_effect(&Monochrome).unwrap();
        assert_eq!(
            buffer.data(),
            Some(&[76, 76, 76, 9, 29, 29, 29, 8][..])
        );
    }

    #[test]
    fn monochrome_on_palette_changes_the_colors() {
        let mut buffer = buffer_with(ChannelLayout::Palette, &[0, 1]);
        buffer.set_palette(Some(Palette::from_iter([
            RgbColor::new(0, 255, 0),
            RgbColor::new(255, 255, 255),
        ])));
        buffer.apply_effect(&Monochrome).unwrap();
        let colors: Vec<RgbColor> = buffer.palette().unwrap().colors().collect();
        assert_eq!(colors, [RgbColor::gray(150), RgbColor::gray(255)]);
        assert_eq!(buffer.data(), Some(&[0, 1][..]));
    }
}
