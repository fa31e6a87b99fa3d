use super::buffer::PixelBuffer;
use super::component::{with_component_type, Component};
use super::format::{ChannelLayout, DataType, PixelFormat};
use crate::color::luminance;
use crate::error::Error;

/// Where a destination component takes its value from.
#[derive(Clone, Copy, Debug, PartialEq)]
enum ChannelSource {
    Component(usize),
    /// Weighted sum of the source components at the red, green and blue indices.
    Luminance([usize; 3]),
    Fill,
}

/// Converts pixel buffers between data types and channel layouts.
///
/// Data type changes are plain numeric casts without rescaling, so a byte
/// value of 255 becomes 255.0 as float. Luminance reductions round when the
/// destination is an integer type.
pub struct FormatConverter;

impl FormatConverter {
    /// Replaces the pixels of `buffer` with an uncompressed copy in the given
    /// format. `alpha` fills an alpha channel the source does not have.
    ///
    /// Palette sources are expanded to RGB first. Palette destinations are
    /// rejected.
    pub fn convert(
        buffer: &mut PixelBuffer<'_>,
        data_type: DataType,
        layout: ChannelLayout,
        alpha: f64,
    ) -> crate::Result<()> {
        if layout == ChannelLayout::Palette {
            return Err(Error::ConversionIntoPalette);
        }
        if buffer.layout() == ChannelLayout::Palette {
            expand_palette(buffer)?;
        }
        let source_format = buffer.format();
        if source_format.data_type() == data_type
            && source_format.layout() == layout
            && !source_format.compression().is_compressed()
        {
            return Ok(());
        }

        let plan = channel_plan(source_format.layout(), layout);
        let pixels = buffer.decoded_data()?;
        let source_type = source_format.data_type();
        let converted = with_component_type!(source_type, S => {
            with_component_type!(data_type, D => {
                convert_pixels::<S, D>(
                    &pixels,
                    buffer.num_pixels(),
                    source_format.components_per_pixel(),
                    &plan,
                    alpha,
                )
            })
        });
        drop(pixels);

        log::debug!(
            "Converted {:?} pixels from {:?} {:?} to {:?} {:?}",
            buffer.size(),
            source_type,
            source_format.layout(),
            data_type,
            layout
        );
        let size = buffer.size();
        buffer.create_image(PixelFormat::uncompressed(data_type, layout), size);
        buffer.take_over_data(converted)
    }
}

/// Replaces a palette buffer with an RGB buffer of the same data type.
///
/// Indices outside the palette become black. The palette is dropped.
pub fn expand_palette(buffer: &mut PixelBuffer<'_>) -> crate::Result<()> {
    if buffer.layout() != ChannelLayout::Palette {
        return Ok(());
    }
    let palette = buffer.palette().ok_or(Error::PaletteNotAssigned)?;
    let indices = buffer.data().ok_or(Error::NoData)?;
    let data_type = buffer.data_type();
    let num_pixels = buffer.num_pixels();
    let expanded = with_component_type!(data_type, C => {
        let mut expanded = vec![0; num_pixels * 3 * C::SIZE];
        for pixel in 0..num_pixels {
            let index = C::get(indices, pixel).to_f64() as usize;
            let rgb: [u8; 3] = palette.color(index).unwrap_or_default().into();
            for (component, value) in rgb.iter().enumerate() {
                C::set(&mut expanded, pixel * 3 + component, C::from_f64(f64::from(*value)));
            }
        }
        expanded
    });
    let size = buffer.size();
    buffer.create_image(PixelFormat::uncompressed(data_type, ChannelLayout::Rgb), size);
    buffer.take_over_data(expanded)
}

fn channel_plan(source: ChannelLayout, destination: ChannelLayout) -> Vec<ChannelSource> {
    let gray = if source.is_grayscale() {
        ChannelSource::Component(0)
    } else {
        source
            .color_indices()
            .map(ChannelSource::Luminance)
            .unwrap_or(ChannelSource::Fill)
    };
    let alpha = source
        .alpha_index()
        .map(ChannelSource::Component)
        .unwrap_or(ChannelSource::Fill);

    let mut plan = vec![ChannelSource::Fill; destination.components_per_pixel()];
    match destination.color_indices() {
        Some(destination_indices) => {
            let source_indices = source.color_indices();
            for (channel, destination_index) in destination_indices.iter().enumerate() {
                plan[*destination_index] = match source_indices {
                    Some(source_indices) => ChannelSource::Component(source_indices[channel]),
                    None => gray,
                };
            }
        }
        None => plan[0] = gray,
    }
    if let Some(alpha_index) = destination.alpha_index() {
        plan[alpha_index] = alpha;
    }
    plan
}

fn convert_pixels<S: Component, D: Component>(
    source: &[u8],
    num_pixels: usize,
    source_components: usize,
    plan: &[ChannelSource],
    alpha: f64,
) -> Vec<u8> {
    let destination_components = plan.len();
    let mut destination = vec![0; num_pixels * destination_components * D::SIZE];
    for pixel in 0..num_pixels {
        let source_offset = pixel * source_components;
        let read = |component: usize| S::get(source, source_offset + component).to_f64();
        for (component, channel) in plan.iter().enumerate() {
            let value = match *channel {
                ChannelSource::Component(index) => D::from_f64(read(index)),
                ChannelSource::Luminance([red, green, blue]) => {
                    D::from_f64_rounded(luminance(read(red), read(green), read(blue)))
                }
                ChannelSource::Fill => D::from_f64(alpha),
            };
            D::set(
                &mut destination,
                pixel * destination_components + component,
                value,
            );
        }
    }
    destination
}
