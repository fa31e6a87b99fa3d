//! DDS header records, constants and pixel format resolution.
use std::io::Read;

use crate::binary_stream::{read_exact, LittleEndianReader, LittleEndianWriter};
use crate::error::Error;
use crate::image::format::{ChannelLayout, Compression, DataType, PixelFormat};

const fn four_cc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

pub(crate) const DDS_MAGIC: u32 = four_cc(b"DDS ");
/// Header size after the magic, as stored in the size field.
pub(crate) const DDS_HEADER_SIZE: u32 = 124;
pub(crate) const DX10_HEADER_SIZE: usize = 20;
pub(crate) const PIXEL_FORMAT_SIZE: u32 = 32;

pub(crate) const FOURCC_DXT1: u32 = four_cc(b"DXT1");
pub(crate) const FOURCC_DXT2: u32 = four_cc(b"DXT2");
pub(crate) const FOURCC_DXT3: u32 = four_cc(b"DXT3");
pub(crate) const FOURCC_DXT4: u32 = four_cc(b"DXT4");
pub(crate) const FOURCC_DXT5: u32 = four_cc(b"DXT5");
pub(crate) const FOURCC_ATI1: u32 = four_cc(b"ATI1");
pub(crate) const FOURCC_ATI2: u32 = four_cc(b"ATI2");
pub(crate) const FOURCC_DX10: u32 = four_cc(b"DX10");

// D3DFORMAT values stored directly in the FourCC field
pub(crate) const FOURCC_R16F: u32 = 111;
pub(crate) const FOURCC_G16R16F: u32 = 112;
pub(crate) const FOURCC_A16B16G16R16F: u32 = 113;
pub(crate) const FOURCC_R32F: u32 = 114;
pub(crate) const FOURCC_G32R32F: u32 = 115;
pub(crate) const FOURCC_A32B32G32R32F: u32 = 116;

// Header flags
pub(crate) const DDSD_CAPS: u32 = 0x1;
pub(crate) const DDSD_HEIGHT: u32 = 0x2;
pub(crate) const DDSD_WIDTH: u32 = 0x4;
pub(crate) const DDSD_PIXELFORMAT: u32 = 0x1000;
pub(crate) const DDSD_MIPMAPCOUNT: u32 = 0x20000;
pub(crate) const DDSD_LINEARSIZE: u32 = 0x80000;
pub(crate) const DDSD_DEPTH: u32 = 0x800000;

// Pixel format flags
pub(crate) const DDPF_ALPHAPIXELS: u32 = 0x1;
pub(crate) const DDPF_FOURCC: u32 = 0x4;
pub(crate) const DDPF_LUMINANCE: u32 = 0x20000;

// Capabilities
pub(crate) const DDSCAPS_COMPLEX: u32 = 0x8;
pub(crate) const DDSCAPS_TEXTURE: u32 = 0x1000;
pub(crate) const DDSCAPS_MIPMAP: u32 = 0x400000;
pub(crate) const DDSCAPS2_CUBEMAP: u32 = 0x200;
pub(crate) const DDSCAPS2_CUBEMAP_ALL_FACES: u32 = 0xFC00;

// DXGI formats
pub(crate) const DXGI_FORMAT_R32G32B32A32_FLOAT: u32 = 2;
pub(crate) const DXGI_FORMAT_R32G32B32_FLOAT: u32 = 6;
pub(crate) const DXGI_FORMAT_R16G16B16A16_FLOAT: u32 = 10;
pub(crate) const DXGI_FORMAT_R32G32_FLOAT: u32 = 16;
pub(crate) const DXGI_FORMAT_R8G8B8A8_TYPELESS: u32 = 27;
pub(crate) const DXGI_FORMAT_R8G8B8A8_UNORM: u32 = 28;
pub(crate) const DXGI_FORMAT_R8G8B8A8_UNORM_SRGB: u32 = 29;
pub(crate) const DXGI_FORMAT_R16G16_FLOAT: u32 = 34;
pub(crate) const DXGI_FORMAT_R32_FLOAT: u32 = 41;
pub(crate) const DXGI_FORMAT_R8G8_UNORM: u32 = 49;
pub(crate) const DXGI_FORMAT_R16_FLOAT: u32 = 54;
pub(crate) const DXGI_FORMAT_R8_UNORM: u32 = 61;
pub(crate) const DXGI_FORMAT_BC1_TYPELESS: u32 = 70;
pub(crate) const DXGI_FORMAT_BC1_UNORM: u32 = 71;
pub(crate) const DXGI_FORMAT_BC1_UNORM_SRGB: u32 = 72;
pub(crate) const DXGI_FORMAT_BC2_TYPELESS: u32 = 73;
pub(crate) const DXGI_FORMAT_BC2_UNORM: u32 = 74;
pub(crate) const DXGI_FORMAT_BC2_UNORM_SRGB: u32 = 75;
pub(crate) const DXGI_FORMAT_BC3_TYPELESS: u32 = 76;
pub(crate) const DXGI_FORMAT_BC3_UNORM: u32 = 77;
pub(crate) const DXGI_FORMAT_BC3_UNORM_SRGB: u32 = 78;
pub(crate) const DXGI_FORMAT_BC4_TYPELESS: u32 = 79;
pub(crate) const DXGI_FORMAT_BC4_UNORM: u32 = 80;
pub(crate) const DXGI_FORMAT_BC5_TYPELESS: u32 = 82;
pub(crate) const DXGI_FORMAT_BC5_UNORM: u32 = 83;
pub(crate) const DXGI_FORMAT_B8G8R8A8_UNORM: u32 = 87;
pub(crate) const DXGI_FORMAT_B8G8R8A8_TYPELESS: u32 = 90;
pub(crate) const DXGI_FORMAT_B8G8R8A8_UNORM_SRGB: u32 = 91;

/// The `DDS_PIXELFORMAT` record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DdsPixelFormat {
    pub size: u32,
    pub flags: u32,
    pub four_cc: u32,
    pub rgb_bit_count: u32,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
    pub alpha_mask: u32,
}

/// Magic, `DDS_HEADER` and, when announced, the DX10 extension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DdsHeader {
    pub size: u32,
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    pub mipmap_count: u32,
    pub pixel_format: DdsPixelFormat,
    pub caps1: u32,
    pub caps2: u32,
    pub dx10: Option<Dx10Header>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dx10Header {
    pub dxgi_format: u32,
    pub resource_dimension: u32,
    pub misc_flag: u32,
    pub array_size: u32,
}

impl DdsHeader {
    pub fn read<R: Read>(reader: &mut R) -> crate::Result<Self> {
        let mut bytes = [0; 4 + DDS_HEADER_SIZE as usize];
        read_exact(reader, &mut bytes, "DDS header")?;
        crate::logger::log_header("DDS header", &bytes);
        let mut fields = LittleEndianReader::new(&bytes);
        if fields.read_u32() != DDS_MAGIC {
            return Err(Error::InvalidMagicNumber("DDS"));
        }
        let size = fields.read_u32();
        // A size field repeating the magic marks a broken writer
        if size == DDS_MAGIC {
            return Err(Error::InvalidMagicNumber("DDS"));
        }
        let flags = fields.read_u32();
        let height = fields.read_u32();
        let width = fields.read_u32();
        let pitch_or_linear_size = fields.read_u32();
        let depth = fields.read_u32();
        let mipmap_count = fields.read_u32();
        fields.skip(11 * 4);
        let pixel_format = DdsPixelFormat {
            size: fields.read_u32(),
            flags: fields.read_u32(),
            four_cc: fields.read_u32(),
            rgb_bit_count: fields.read_u32(),
            red_mask: fields.read_u32(),
            green_mask: fields.read_u32(),
            blue_mask: fields.read_u32(),
            alpha_mask: fields.read_u32(),
        };
        let caps1 = fields.read_u32();
        let caps2 = fields.read_u32();

        let dx10 = if pixel_format.flags & DDPF_FOURCC != 0 && pixel_format.four_cc == FOURCC_DX10 {
            let mut bytes = [0; DX10_HEADER_SIZE];
            read_exact(reader, &mut bytes, "DDS DX10 header")?;
            let mut fields = LittleEndianReader::new(&bytes);
            Some(Dx10Header {
                dxgi_format: fields.read_u32(),
                resource_dimension: fields.read_u32(),
                misc_flag: fields.read_u32(),
                array_size: fields.read_u32(),
            })
        } else {
            None
        };

        Ok(Self {
            size,
            flags,
            height,
            width,
            pitch_or_linear_size,
            depth,
            mipmap_count,
            pixel_format,
            caps1,
            caps2,
            dx10,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = LittleEndianWriter::with_capacity(4 + DDS_HEADER_SIZE as usize);
        writer
            .write_u32(DDS_MAGIC)
            .write_u32(self.size)
            .write_u32(self.flags)
            .write_u32(self.height)
            .write_u32(self.width)
            .write_u32(self.pitch_or_linear_size)
            .write_u32(self.depth)
            .write_u32(self.mipmap_count)
            .pad(11 * 4)
            .write_u32(self.pixel_format.size)
            .write_u32(self.pixel_format.flags)
            .write_u32(self.pixel_format.four_cc)
            .write_u32(self.pixel_format.rgb_bit_count)
            .write_u32(self.pixel_format.red_mask)
            .write_u32(self.pixel_format.green_mask)
            .write_u32(self.pixel_format.blue_mask)
            .write_u32(self.pixel_format.alpha_mask)
            .write_u32(self.caps1)
            .write_u32(self.caps2)
            .pad(3 * 4);
        if let Some(dx10) = &self.dx10 {
            writer
                .write_u32(dx10.dxgi_format)
                .write_u32(dx10.resource_dimension)
                .write_u32(dx10.misc_flag)
                .write_u32(dx10.array_size)
                .write_u32(0);
        }
        writer.into_inner()
    }

    pub fn is_cubemap(&self) -> bool {
        self.caps2 & DDSCAPS2_CUBEMAP != 0
    }

    /// Depth of every level, at least 1.
    pub fn depth(&self) -> u32 {
        self.depth.max(1)
    }

    /// Stored mip levels per face, at least 1.
    pub fn mipmap_count(&self) -> u32 {
        self.mipmap_count.max(1)
    }
}

/// How the pixel payload is stored and what it is loaded as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DdsPixelLayout {
    /// Format of the loaded buffers.
    pub format: PixelFormat,
    /// Channel order in the file. Differs from the loaded layout for BGR(A) files.
    pub stored_layout: ChannelLayout,
    /// Pixels are packed integers decoded through the bit masks.
    pub masked: bool,
}

impl DdsPixelLayout {
    fn raw(data_type: DataType, layout: ChannelLayout) -> Self {
        Self::stored_as(data_type, layout, layout)
    }

    fn stored_as(data_type: DataType, layout: ChannelLayout, stored_layout: ChannelLayout) -> Self {
        Self {
            format: PixelFormat::uncompressed(data_type, layout),
            stored_layout,
            masked: false,
        }
    }

    fn compressed(layout: ChannelLayout, compression: Compression) -> crate::Result<Self> {
        Ok(Self {
            format: PixelFormat::new(DataType::Byte, layout, compression)?,
            stored_layout: layout,
            masked: false,
        })
    }

    fn masked(layout: ChannelLayout) -> Self {
        Self {
            masked: true,
            ..Self::raw(DataType::Byte, layout)
        }
    }

    /// Whether red and blue have to be exchanged after loading.
    pub fn needs_swap(&self) -> bool {
        self.stored_layout != self.format.layout()
    }
}

/// Maps the header to the format of the stored pixels.
pub fn resolve_pixel_layout(header: &DdsHeader) -> crate::Result<DdsPixelLayout> {
    let pixel_format = &header.pixel_format;
    if let Some(dx10) = &header.dx10 {
        return resolve_dxgi_format(dx10.dxgi_format, pixel_format);
    }
    if pixel_format.flags & DDPF_FOURCC != 0 {
        return resolve_four_cc(pixel_format);
    }
    let layout = if pixel_format.flags & DDPF_LUMINANCE != 0 {
        ChannelLayout::Grayscale
    } else {
        ChannelLayout::Rgb
    };
    let layout = if pixel_format.flags & DDPF_ALPHAPIXELS != 0 {
        layout.with_alpha()
    } else {
        layout
    };
    if !(8..=32).contains(&pixel_format.rgb_bit_count) || pixel_format.rgb_bit_count % 8 != 0 {
        return Err(Error::UnsupportedBitDepth("DDS", pixel_format.rgb_bit_count));
    }
    Ok(DdsPixelLayout::masked(layout))
}

fn bgr_if_blue_low(pixel_format: &DdsPixelFormat, layout: ChannelLayout) -> ChannelLayout {
    if pixel_format.blue_mask == 0xFF {
        layout.swapped()
    } else {
        layout
    }
}

fn resolve_dxgi_format(
    dxgi_format: u32,
    pixel_format: &DdsPixelFormat,
) -> crate::Result<DdsPixelLayout> {
    use ChannelLayout::*;
    Ok(match dxgi_format {
        DXGI_FORMAT_R8_UNORM => DdsPixelLayout::raw(DataType::Byte, Grayscale),
        DXGI_FORMAT_R8G8_UNORM => DdsPixelLayout::raw(DataType::Byte, GrayscaleAlpha),
        DXGI_FORMAT_R8G8B8A8_TYPELESS
        | DXGI_FORMAT_R8G8B8A8_UNORM
        | DXGI_FORMAT_R8G8B8A8_UNORM_SRGB => {
            DdsPixelLayout::stored_as(DataType::Byte, Rgba, bgr_if_blue_low(pixel_format, Rgba))
        }
        DXGI_FORMAT_B8G8R8A8_UNORM
        | DXGI_FORMAT_B8G8R8A8_TYPELESS
        | DXGI_FORMAT_B8G8R8A8_UNORM_SRGB => DdsPixelLayout::stored_as(DataType::Byte, Rgba, Bgra),
        DXGI_FORMAT_R16_FLOAT => DdsPixelLayout::raw(DataType::Half, Grayscale),
        DXGI_FORMAT_R16G16_FLOAT => DdsPixelLayout::raw(DataType::Half, GrayscaleAlpha),
        DXGI_FORMAT_R16G16B16A16_FLOAT => DdsPixelLayout::raw(DataType::Half, Rgba),
        DXGI_FORMAT_R32_FLOAT => DdsPixelLayout::raw(DataType::Float, Grayscale),
        DXGI_FORMAT_R32G32_FLOAT => DdsPixelLayout::raw(DataType::Float, GrayscaleAlpha),
        DXGI_FORMAT_R32G32B32_FLOAT => DdsPixelLayout::raw(DataType::Float, Rgb),
        DXGI_FORMAT_R32G32B32A32_FLOAT => DdsPixelLayout::raw(DataType::Float, Rgba),
        DXGI_FORMAT_BC1_TYPELESS | DXGI_FORMAT_BC1_UNORM | DXGI_FORMAT_BC1_UNORM_SRGB => {
            DdsPixelLayout::compressed(Rgb, Compression::Dxt1)?
        }
        DXGI_FORMAT_BC2_TYPELESS | DXGI_FORMAT_BC2_UNORM | DXGI_FORMAT_BC2_UNORM_SRGB => {
            DdsPixelLayout::compressed(Rgba, Compression::Dxt3)?
        }
        DXGI_FORMAT_BC3_TYPELESS | DXGI_FORMAT_BC3_UNORM | DXGI_FORMAT_BC3_UNORM_SRGB => {
            DdsPixelLayout::compressed(Rgba, Compression::Dxt5)?
        }
        DXGI_FORMAT_BC4_TYPELESS | DXGI_FORMAT_BC4_UNORM => {
            DdsPixelLayout::compressed(Grayscale, Compression::Bc4)?
        }
        DXGI_FORMAT_BC5_TYPELESS | DXGI_FORMAT_BC5_UNORM => {
            DdsPixelLayout::compressed(GrayscaleAlpha, Compression::Bc5)?
        }
        other => return Err(Error::UnsupportedDxgiFormat(other)),
    })
}

fn resolve_four_cc(pixel_format: &DdsPixelFormat) -> crate::Result<DdsPixelLayout> {
    use ChannelLayout::*;
    Ok(match pixel_format.four_cc {
        FOURCC_R16F => DdsPixelLayout::raw(DataType::Half, Grayscale),
        FOURCC_G16R16F => DdsPixelLayout::raw(DataType::Half, GrayscaleAlpha),
        FOURCC_A16B16G16R16F => DdsPixelLayout::raw(DataType::Half, Rgba),
        FOURCC_R32F => DdsPixelLayout::raw(DataType::Float, Grayscale),
        FOURCC_G32R32F => DdsPixelLayout::raw(DataType::Float, GrayscaleAlpha),
        FOURCC_A32B32G32R32F => DdsPixelLayout::raw(DataType::Float, Rgba),
        FOURCC_DXT1 => DdsPixelLayout::compressed(Rgb, Compression::Dxt1)?,
        FOURCC_DXT2 | FOURCC_DXT3 => DdsPixelLayout::compressed(Rgba, Compression::Dxt3)?,
        FOURCC_DXT4 | FOURCC_DXT5 => DdsPixelLayout::compressed(Rgba, Compression::Dxt5)?,
        FOURCC_ATI1 => DdsPixelLayout::compressed(Grayscale, Compression::Bc4)?,
        FOURCC_ATI2 => DdsPixelLayout::compressed(GrayscaleAlpha, Compression::Bc5)?,
        _ => match pixel_format.rgb_bit_count {
            8 => DdsPixelLayout::raw(DataType::Byte, Grayscale),
            16 if pixel_format.alpha_mask == 0xFF00 => {
                DdsPixelLayout::raw(DataType::Byte, GrayscaleAlpha)
            }
            24 => DdsPixelLayout::stored_as(DataType::Byte, Rgb, bgr_if_blue_low(pixel_format, Rgb)),
            32 if pixel_format.red_mask != 0x3FF00000 => {
                DdsPixelLayout::stored_as(DataType::Byte, Rgba, bgr_if_blue_low(pixel_format, Rgba))
            }
            16 | 32 => {
                return Err(Error::UnsupportedPixelFormat(
                    "packed DDS pixels with unsupported channel masks",
                ))
            }
            bits => return Err(Error::UnsupportedBitDepth("DDS", bits)),
        },
    })
}

/// Extraction of one channel from a packed pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ChannelMask {
    mask: u32,
    shift_right: u32,
    shift_left: u32,
}

impl ChannelMask {
    /// Shifts for a contiguous run of set bits, widening runs shorter than 8 bits.
    fn new(mask: u32) -> Self {
        if mask == 0 {
            return Self {
                mask,
                shift_right: 0,
                shift_left: 0,
            };
        }
        let shift_right = mask.trailing_zeros();
        let width = (mask >> shift_right).trailing_ones().min(8);
        Self {
            mask,
            shift_right,
            shift_left: 8 - width,
        }
    }

    fn extract(&self, pixel: u32) -> u8 {
        (((pixel & self.mask) >> self.shift_right) << self.shift_left) as u8
    }

    /// Like `extract`, with narrow alpha widened to the full 0..255 range.
    fn extract_alpha(&self, pixel: u32) -> u8 {
        let alpha = self.extract(pixel);
        if self.shift_left >= 7 {
            if alpha != 0 {
                0xFF
            } else {
                0
            }
        } else if self.shift_left >= 4 {
            alpha | (alpha >> 4)
        } else {
            alpha
        }
    }
}

/// Decodes packed pixels through the channel masks into byte components of `layout`.
pub fn unpack_masked_pixels(
    pixel_format: &DdsPixelFormat,
    layout: ChannelLayout,
    packed: &[u8],
    num_pixels: usize,
) -> crate::Result<Vec<u8>> {
    let packed_size = (pixel_format.rgb_bit_count / 8) as usize;
    if !(1..=4).contains(&packed_size) {
        return Err(Error::UnsupportedBitDepth("DDS", pixel_format.rgb_bit_count));
    }
    if packed.len() < num_pixels * packed_size {
        return Err(Error::DataSizeMismatch {
            expected: num_pixels * packed_size,
            actual: packed.len(),
        });
    }
    let red = ChannelMask::new(pixel_format.red_mask);
    let green = ChannelMask::new(pixel_format.green_mask);
    let blue = ChannelMask::new(pixel_format.blue_mask);
    let alpha = ChannelMask::new(pixel_format.alpha_mask);

    let mut unpacked = Vec::with_capacity(num_pixels * layout.components_per_pixel());
    for bytes in packed.chunks_exact(packed_size).take(num_pixels) {
        let mut value = [0; 4];
        value[..packed_size].copy_from_slice(bytes);
        let pixel = u32::from_le_bytes(value);
        match layout {
            ChannelLayout::Grayscale => unpacked.push(red.extract(pixel)),
            ChannelLayout::GrayscaleAlpha => {
                unpacked.extend_from_slice(&[red.extract(pixel), alpha.extract_alpha(pixel)])
            }
            ChannelLayout::Rgb => unpacked.extend_from_slice(&[
                red.extract(pixel),
                green.extract(pixel),
                blue.extract(pixel),
            ]),
            ChannelLayout::Rgba => unpacked.extend_from_slice(&[
                red.extract(pixel),
                green.extract(pixel),
                blue.extract(pixel),
                alpha.extract_alpha(pixel),
            ]),
            other => return Err(Error::UnsupportedChannelLayout("DDS channel masks", other)),
        }
    }
    Ok(unpacked)
}

/// FourCC written for a compression kind.
pub fn compression_four_cc(compression: Compression) -> Option<u32> {
    match compression {
        Compression::None => None,
        Compression::Dxt1 => Some(FOURCC_DXT1),
        Compression::Dxt3 => Some(FOURCC_DXT3),
        Compression::Dxt5 => Some(FOURCC_DXT5),
        Compression::Bc4 => Some(FOURCC_ATI1),
        Compression::Bc5 => Some(FOURCC_ATI2),
    }
}
