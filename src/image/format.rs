use clap::builder::PossibleValue;
use clap::ValueEnum;

use super::Size;
use crate::error::Error;

/// Numeric type of a single pixel component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DataType {
    #[default]
    Byte,
    Word,
    Half,
    Float,
    Double,
}

impl DataType {
    pub const ALL: [DataType; 5] = [
        DataType::Byte,
        DataType::Word,
        DataType::Half,
        DataType::Float,
        DataType::Double,
    ];

    pub const fn bytes_per_component(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Word | Self::Half => 2,
            Self::Float => 4,
            Self::Double => 8,
        }
    }

    pub const fn is_floating_point(self) -> bool {
        matches!(self, Self::Half | Self::Float | Self::Double)
    }

    /// Value representing "fully on" for this type: 255, 65535 or 1.0.
    pub const fn max_value(self) -> f64 {
        match self {
            Self::Byte => 255.0,
            Self::Word => 65535.0,
            Self::Half | Self::Float | Self::Double => 1.0,
        }
    }

    /// Alpha value used when a conversion has to invent an alpha channel.
    pub const fn default_alpha(self) -> f64 {
        self.max_value()
    }
}

/// Order and meaning of the components of a pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    #[default]
    Rgb,
    Rgba,
    Bgr,
    Bgra,
    Grayscale,
    GrayscaleAlpha,
    Palette,
}

impl ChannelLayout {
    /// Every layout the format converter accepts as source and destination.
    pub const CONVERTIBLE: [ChannelLayout; 6] = [
        ChannelLayout::Rgb,
        ChannelLayout::Rgba,
        ChannelLayout::Bgr,
        ChannelLayout::Bgra,
        ChannelLayout::Grayscale,
        ChannelLayout::GrayscaleAlpha,
    ];

    pub const fn components_per_pixel(self) -> usize {
        match self {
            Self::Rgb | Self::Bgr => 3,
            Self::Rgba | Self::Bgra => 4,
            Self::Grayscale | Self::Palette => 1,
            Self::GrayscaleAlpha => 2,
        }
    }

    pub const fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba | Self::Bgra | Self::GrayscaleAlpha)
    }

    /// Alpha variant of the layout. Palette has none and is returned as is.
    pub const fn with_alpha(self) -> Self {
        match self {
            Self::Rgb => Self::Rgba,
            Self::Bgr => Self::Bgra,
            Self::Grayscale => Self::GrayscaleAlpha,
            other => other,
        }
    }

    pub const fn without_alpha(self) -> Self {
        match self {
            Self::Rgba => Self::Rgb,
            Self::Bgra => Self::Bgr,
            Self::GrayscaleAlpha => Self::Grayscale,
            other => other,
        }
    }

    pub const fn is_grayscale(self) -> bool {
        matches!(self, Self::Grayscale | Self::GrayscaleAlpha)
    }

    /// Component indices of red, green and blue, `None` for gray and palette layouts.
    pub const fn color_indices(self) -> Option<[usize; 3]> {
        match self {
            Self::Rgb | Self::Rgba => Some([0, 1, 2]),
            Self::Bgr | Self::Bgra => Some([2, 1, 0]),
            _ => None,
        }
    }

    pub const fn alpha_index(self) -> Option<usize> {
        match self {
            Self::Rgba | Self::Bgra => Some(3),
            Self::GrayscaleAlpha => Some(1),
            _ => None,
        }
    }

    /// Same components with red and blue exchanged.
    pub const fn swapped(self) -> Self {
        match self {
            Self::Rgb => Self::Bgr,
            Self::Rgba => Self::Bgra,
            Self::Bgr => Self::Rgb,
            Self::Bgra => Self::Rgba,
            other => other,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    #[default]
    None,
    Dxt1,
    Dxt3,
    Dxt5,
    /// One channel block compression (ATI1 / LATC1).
    Bc4,
    /// Two channel block compression (ATI2 / LATC2).
    Bc5,
}

impl Compression {
    /// Bytes occupied by one 4x4 block.
    pub const fn block_size(self) -> usize {
        match self {
            Self::None => 0,
            Self::Dxt1 | Self::Bc4 => 8,
            Self::Dxt3 | Self::Dxt5 | Self::Bc5 => 16,
        }
    }

    pub const fn is_compressed(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl ValueEnum for Compression {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            Self::None,
            Self::Dxt1,
            Self::Dxt3,
            Self::Dxt5,
            Self::Bc4,
            Self::Bc5,
        ]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(match self {
            Self::None => PossibleValue::new("none"),
            Self::Dxt1 => PossibleValue::new("dxt1").alias("bc1"),
            Self::Dxt3 => PossibleValue::new("dxt3").alias("bc2"),
            Self::Dxt5 => PossibleValue::new("dxt5").alias("bc3"),
            Self::Bc4 => PossibleValue::new("bc4").alias("ati1"),
            Self::Bc5 => PossibleValue::new("bc5").alias("ati2"),
        })
    }
}

/// Complete description of how pixels are stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelFormat {
    data_type: DataType,
    layout: ChannelLayout,
    compression: Compression,
}

impl PixelFormat {
    pub fn new(
        data_type: DataType,
        layout: ChannelLayout,
        compression: Compression,
    ) -> crate::Result<Self> {
        if layout == ChannelLayout::Palette && compression.is_compressed() {
            return Err(Error::PaletteWithCompression);
        }
        Ok(Self {
            data_type,
            layout,
            compression,
        })
    }

    pub const fn uncompressed(data_type: DataType, layout: ChannelLayout) -> Self {
        Self {
            data_type,
            layout,
            compression: Compression::None,
        }
    }

    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    pub const fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub const fn compression(&self) -> Compression {
        self.compression
    }

    pub fn with_compression(self, compression: Compression) -> crate::Result<Self> {
        Self::new(self.data_type, self.layout, compression)
    }

    pub const fn components_per_pixel(&self) -> usize {
        self.layout.components_per_pixel()
    }

    pub const fn bytes_per_component(&self) -> usize {
        self.data_type.bytes_per_component()
    }

    pub const fn bytes_per_pixel(&self) -> usize {
        self.components_per_pixel() * self.bytes_per_component()
    }

    pub fn data_size(&self, size: Size) -> usize {
        size.num_pixels() * self.bytes_per_pixel()
    }

    pub fn checked_data_size(&self, size: Size) -> Option<usize> {
        size.checked_num_pixels()?.checked_mul(self.bytes_per_pixel())
    }

    /// Bytes needed for the block compressed representation, 0 when uncompressed.
    pub fn compressed_size(&self, size: Size) -> usize {
        let blocks_x = (size.width as usize).div_ceil(4);
        let blocks_y = (size.height as usize).div_ceil(4);
        blocks_x * blocks_y * self.compression.block_size() * size.depth as usize
    }

    pub fn checked_compressed_size(&self, size: Size) -> Option<usize> {
        (size.width as usize)
            .div_ceil(4)
            .checked_mul((size.height as usize).div_ceil(4))?
            .checked_mul(self.compression.block_size())?
            .checked_mul(size.depth as usize)
    }
}

/// Extent of mip level `level` for a base extent, halving per level and never below 1.
pub fn mipmap_extent(base: u32, level: u32) -> u32 {
    base.checked_shr(level).unwrap_or(0).max(1)
}
