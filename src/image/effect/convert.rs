use super::ImageEffect;
use crate::image::converter::{expand_palette, FormatConverter};
use crate::image::format::{ChannelLayout, DataType};
use crate::image::shared::SharedImageBuffer;

/// Converts buffers into another data type and channel layout.
///
/// Alpha channels added by the conversion are filled with the data type's
/// default alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Convert {
    pub data_type: DataType,
    pub layout: ChannelLayout,
}

impl Convert {
    pub fn new(data_type: DataType, layout: ChannelLayout) -> Self {
        Self { data_type, layout }
    }
}

impl ImageEffect for Convert {
    fn apply(&self, buffer: &mut SharedImageBuffer<'_>) -> crate::Result<()> {
        FormatConverter::convert(
            buffer.buffer_mut(),
            self.data_type,
            self.layout,
            self.data_type.default_alpha(),
        )
    }
}

/// Replaces palette indices with the RGB colors they refer to.
#[derive(Clone, Copy, Debug, Default)]
pub struct RemovePalette;

impl ImageEffect for RemovePalette {
    fn apply(&self, buffer: &mut SharedImageBuffer<'_>) -> crate::Result<()> {
        if buffer.layout() != ChannelLayout::Palette {
            return Ok(());
        }
        expand_palette(buffer.buffer_mut())
    }
}
