//! DXT1/3/5 and BC4/BC5 block compression over byte pixel data.
//!
//! Blocks cover 4x4 pixels. Edge blocks of images whose extent is not a
//! multiple of 4 are clipped: decoding only writes the in-bounds pixels,
//! encoding replicates the last row and column.

use super::format::{ChannelLayout, Compression, DataType, PixelFormat};
use super::Size;
use crate::error::Error;

const BLOCK_EXTENT: usize = 4;
const PIXELS_PER_BLOCK: usize = BLOCK_EXTENT * BLOCK_EXTENT;

type Rgba = [u8; 4];

/// Where the channels a compression kind carries live inside a raw pixel.
#[derive(Clone, Copy)]
struct ChannelMap {
    components_per_pixel: usize,
    color: Option<[usize; 3]>,
    alpha: Option<usize>,
}

impl ChannelMap {
    fn new(format: &PixelFormat, context: &'static str) -> crate::Result<Self> {
        if format.data_type() != DataType::Byte {
            return Err(Error::UnsupportedDataType(context, format.data_type()));
        }
        let layout = format.layout();
        let map = Self {
            components_per_pixel: layout.components_per_pixel(),
            color: layout.color_indices(),
            alpha: layout.alpha_index(),
        };
        let supported = match format.compression() {
            Compression::None => false,
            Compression::Dxt1 | Compression::Dxt3 | Compression::Dxt5 => map.color.is_some(),
            Compression::Bc4 => layout != ChannelLayout::Palette,
            Compression::Bc5 => map.components_per_pixel >= 2,
        };
        if supported {
            Ok(map)
        } else {
            Err(Error::UnsupportedChannelLayout(context, layout))
        }
    }
}

fn expand_565(color: u16) -> [u8; 3] {
    [
        (((color >> 11) & 0x1F) << 3) as u8,
        (((color >> 5) & 0x3F) << 2) as u8,
        ((color & 0x1F) << 3) as u8,
    ]
}

fn pack_565(rgb: [u8; 3]) -> u16 {
    (u16::from(rgb[0] >> 3) << 11) | (u16::from(rgb[1] >> 2) << 5) | u16::from(rgb[2] >> 3)
}

/// The four colors a color block can reference. In three color mode the
/// last entry is transparent black.
fn color_palette(color0: u16, color1: u16, four_color: bool) -> [Rgba; 4] {
    let first = expand_565(color0);
    let second = expand_565(color1);
    let mix = |weight0: u32, weight1: u32, divisor: u32| -> Rgba {
        let mut mixed = [0, 0, 0, 255];
        for channel in 0..3 {
            let sum = weight0 * u32::from(first[channel])
                + weight1 * u32::from(second[channel])
                + divisor / 2;
            mixed[channel] = (sum / divisor) as u8;
        }
        mixed
    };
    let opaque = |rgb: [u8; 3]| [rgb[0], rgb[1], rgb[2], 255];
    if color0 > color1 || four_color {
        [opaque(first), opaque(second), mix(2, 1, 3), mix(1, 2, 3)]
    } else {
        [opaque(first), opaque(second), mix(1, 1, 2), [0, 0, 0, 0]]
    }
}

fn decode_color_block(block: &[u8], four_color: bool) -> [Rgba; PIXELS_PER_BLOCK] {
    let color0 = u16::from_le_bytes([block[0], block[1]]);
    let color1 = u16::from_le_bytes([block[2], block[3]]);
    let palette = color_palette(color0, color1, four_color);
    let mut pixels = [[0; 4]; PIXELS_PER_BLOCK];
    for (index, pixel) in pixels.iter_mut().enumerate() {
        let row = block[4 + index / BLOCK_EXTENT];
        let selector = (row >> (2 * (index % BLOCK_EXTENT))) & 0x03;
        *pixel = palette[selector as usize];
    }
    pixels
}

fn explicit_alpha(block: &[u8]) -> [u8; PIXELS_PER_BLOCK] {
    let mut alpha = [0; PIXELS_PER_BLOCK];
    for (index, value) in alpha.iter_mut().enumerate() {
        let row = index / BLOCK_EXTENT;
        let bits = u16::from_le_bytes([block[2 * row], block[2 * row + 1]]);
        let nibble = (bits >> (4 * (index % BLOCK_EXTENT))) & 0x0F;
        *value = (nibble * 17) as u8;
    }
    alpha
}

/// Eight values an interpolated alpha block can reference.
fn alpha_palette(alpha0: u8, alpha1: u8) -> [u8; 8] {
    let (first, second) = (u32::from(alpha0), u32::from(alpha1));
    let mut palette = [alpha0, alpha1, 0, 0, 0, 0, 0, 0];
    if alpha0 > alpha1 {
        for k in 2..8 {
            palette[k] = (((8 - k as u32) * first + (k as u32 - 1) * second) / 7) as u8;
        }
    } else {
        for k in 2..6 {
            palette[k] = (((6 - k as u32) * first + (k as u32 - 1) * second) / 5) as u8;
        }
        palette[6] = 0;
        palette[7] = 255;
    }
    palette
}

fn interpolated_alpha(block: &[u8]) -> [u8; PIXELS_PER_BLOCK] {
    let palette = alpha_palette(block[0], block[1]);
    let mut bits = 0u64;
    for (shift, byte) in block[2..8].iter().enumerate() {
        bits |= u64::from(*byte) << (8 * shift);
    }
    let mut alpha = [0; PIXELS_PER_BLOCK];
    for (index, value) in alpha.iter_mut().enumerate() {
        *value = palette[((bits >> (3 * index)) & 0x07) as usize];
    }
    alpha
}

/// Decodes `compressed` into the raw pixel buffer `raw` of the given format.
pub fn decompress(
    format: &PixelFormat,
    size: Size,
    compressed: &[u8],
    raw: &mut [u8],
) -> crate::Result<()> {
    let map = ChannelMap::new(format, "block decompression")?;
    check_length(format.compressed_size(size), compressed.len())?;
    check_length(format.data_size(size), raw.len())?;
    let compression = format.compression();
    let block_size = compression.block_size();
    let mut blocks = compressed.chunks_exact(block_size);
    for_each_block(size, |z, x, y| {
        let Some(block) = blocks.next() else {
            return;
        };
        let decoded = decode_block(compression, block);
        let width = (size.width as usize - x).min(BLOCK_EXTENT);
        let height = (size.height as usize - y).min(BLOCK_EXTENT);
        for block_y in 0..height {
            for block_x in 0..width {
                let offset = pixel_offset(size, &map, z, x + block_x, y + block_y);
                let source = &decoded[block_y * BLOCK_EXTENT + block_x];
                store_pixel(compression, &map, source, &mut raw[offset..]);
            }
        }
    });
    Ok(())
}

/// Encodes the raw pixel buffer `raw` into `compressed`.
pub fn compress(
    format: &PixelFormat,
    size: Size,
    raw: &[u8],
    compressed: &mut [u8],
) -> crate::Result<()> {
    let map = ChannelMap::new(format, "block compression")?;
    check_length(format.data_size(size), raw.len())?;
    check_length(format.compressed_size(size), compressed.len())?;
    let compression = format.compression();
    let block_size = compression.block_size();
    let mut blocks = compressed.chunks_exact_mut(block_size);
    for_each_block(size, |z, x, y| {
        let Some(block) = blocks.next() else {
            return;
        };
        let mut pixels = [[0; 4]; PIXELS_PER_BLOCK];
        for (index, pixel) in pixels.iter_mut().enumerate() {
            let pixel_x = (x + index % BLOCK_EXTENT).min(size.width as usize - 1);
            let pixel_y = (y + index / BLOCK_EXTENT).min(size.height as usize - 1);
            let offset = pixel_offset(size, &map, z, pixel_x, pixel_y);
            *pixel = load_pixel(compression, &map, &raw[offset..]);
        }
        encode_block(compression, &pixels, map.alpha.is_some(), block);
    });
    Ok(())
}

fn check_length(expected: usize, actual: usize) -> crate::Result<()> {
    if actual < expected {
        Err(Error::DataSizeMismatch { expected, actual })
    } else {
        Ok(())
    }
}

fn for_each_block(size: Size, mut visit: impl FnMut(usize, usize, usize)) {
    for z in 0..size.depth as usize {
        for y in (0..size.height as usize).step_by(BLOCK_EXTENT) {
            for x in (0..size.width as usize).step_by(BLOCK_EXTENT) {
                visit(z, x, y);
            }
        }
    }
}

fn pixel_offset(size: Size, map: &ChannelMap, z: usize, x: usize, y: usize) -> usize {
    let width = size.width as usize;
    let height = size.height as usize;
    ((z * height + y) * width + x) * map.components_per_pixel
}

/// Decodes one block into RGBA. Single and dual channel kinds use red and green.
fn decode_block(compression: Compression, block: &[u8]) -> [Rgba; PIXELS_PER_BLOCK] {
    match compression {
        Compression::Dxt1 => decode_color_block(block, false),
        Compression::Dxt3 => {
            let mut pixels = decode_color_block(&block[8..], false);
            for (pixel, alpha) in pixels.iter_mut().zip(explicit_alpha(block)) {
                pixel[3] = alpha;
            }
            pixels
        }
        Compression::Dxt5 => {
            let mut pixels = decode_color_block(&block[8..], true);
            for (pixel, alpha) in pixels.iter_mut().zip(interpolated_alpha(block)) {
                pixel[3] = alpha;
            }
            pixels
        }
        Compression::Bc4 => interpolated_alpha(block).map(|value| [value, 0, 0, 255]),
        Compression::Bc5 => {
            let first = interpolated_alpha(&block[8..]);
            let second = interpolated_alpha(block);
            let mut pixels = [[0, 0, 0, 255]; PIXELS_PER_BLOCK];
            for (index, pixel) in pixels.iter_mut().enumerate() {
                pixel[0] = first[index];
                pixel[1] = second[index];
            }
            pixels
        }
        Compression::None => [[0; 4]; PIXELS_PER_BLOCK],
    }
}

fn store_pixel(compression: Compression, map: &ChannelMap, source: &Rgba, pixel: &mut [u8]) {
    match compression {
        Compression::Bc4 => pixel[0] = source[0],
        Compression::Bc5 => {
            pixel[0] = source[0];
            pixel[1] = source[1];
        }
        _ => {
            if let Some(color) = map.color {
                for (channel, index) in color.into_iter().enumerate() {
                    pixel[index] = source[channel];
                }
            }
            if let Some(alpha) = map.alpha {
                pixel[alpha] = source[3];
            }
        }
    }
}

fn load_pixel(compression: Compression, map: &ChannelMap, pixel: &[u8]) -> Rgba {
    match compression {
        Compression::Bc4 => [pixel[0], 0, 0, 255],
        Compression::Bc5 => [pixel[0], pixel[1], 0, 255],
        _ => {
            let mut rgba = [0, 0, 0, 255];
            if let Some(color) = map.color {
                for (channel, index) in color.into_iter().enumerate() {
                    rgba[channel] = pixel[index];
                }
            }
            if let Some(alpha) = map.alpha {
                rgba[3] = pixel[alpha];
            }
            rgba
        }
    }
}

fn encode_block(
    compression: Compression,
    pixels: &[Rgba; PIXELS_PER_BLOCK],
    has_alpha: bool,
    block: &mut [u8],
) {
    let channel = |index: usize| pixels.map(|pixel| pixel[index]);
    match compression {
        Compression::Dxt1 => encode_color_block(pixels, has_alpha, false, block),
        Compression::Dxt3 => {
            encode_explicit_alpha(&channel(3), &mut block[..8]);
            encode_color_block(pixels, false, false, &mut block[8..]);
        }
        Compression::Dxt5 => {
            encode_interpolated_alpha(&channel(3), &mut block[..8]);
            encode_color_block(pixels, false, true, &mut block[8..]);
        }
        Compression::Bc4 => encode_interpolated_alpha(&channel(0), block),
        Compression::Bc5 => {
            encode_interpolated_alpha(&channel(1), &mut block[..8]);
            encode_interpolated_alpha(&channel(0), &mut block[8..]);
        }
        Compression::None => {}
    }
}

fn color_distance(first: &Rgba, second: &Rgba) -> u32 {
    (0..3)
        .map(|channel| {
            let difference = i32::from(first[channel]) - i32::from(second[channel]);
            (difference * difference) as u32
        })
        .sum()
}

/// Endpoints are the two most distant opaque colors, each pixel picks the
/// nearest palette entry. With `punch_through` set, pixels with alpha below
/// 128 use the transparent entry of three color mode. `four_color` mirrors
/// the decoder: only DXT5 color blocks ignore the endpoint order.
fn encode_color_block(
    pixels: &[Rgba; PIXELS_PER_BLOCK],
    punch_through: bool,
    four_color: bool,
    block: &mut [u8],
) {
    let transparent = |pixel: &Rgba| punch_through && pixel[3] < 128;
    let mut endpoints = ([0u8; 4], [0u8; 4]);
    if let Some(pixel) = pixels.iter().find(|pixel| !transparent(pixel)) {
        endpoints = (*pixel, *pixel);
    }
    let mut largest_distance = 0;
    for (index, first) in pixels.iter().enumerate() {
        for second in &pixels[index + 1..] {
            if transparent(first) || transparent(second) {
                continue;
            }
            let distance = color_distance(first, second);
            if distance > largest_distance {
                largest_distance = distance;
                endpoints = (*first, *second);
            }
        }
    }
    let rgb = |pixel: Rgba| [pixel[0], pixel[1], pixel[2]];
    let (low, high) = (pack_565(rgb(endpoints.0)), pack_565(rgb(endpoints.1)));
    let any_transparent = pixels.iter().any(transparent);
    let (color0, color1) = if any_transparent {
        (low.min(high), low.max(high))
    } else {
        (low.max(high), low.min(high))
    };
    let palette = color_palette(color0, color1, four_color);
    let candidates = if color0 > color1 || four_color { 4 } else { 3 };

    block[0..2].copy_from_slice(&color0.to_le_bytes());
    block[2..4].copy_from_slice(&color1.to_le_bytes());
    for row in 0..BLOCK_EXTENT {
        let mut bits = 0u8;
        for column in 0..BLOCK_EXTENT {
            let pixel = &pixels[row * BLOCK_EXTENT + column];
            let selector = if transparent(pixel) {
                3
            } else {
                (0..candidates)
                    .min_by_key(|&candidate| color_distance(pixel, &palette[candidate]))
                    .unwrap_or(0)
            };
            bits |= (selector as u8) << (2 * column);
        }
        block[4 + row] = bits;
    }
}

fn encode_explicit_alpha(alpha: &[u8; PIXELS_PER_BLOCK], block: &mut [u8]) {
    for row in 0..BLOCK_EXTENT {
        let mut bits = 0u16;
        for column in 0..BLOCK_EXTENT {
            let value = u16::from(alpha[row * BLOCK_EXTENT + column]);
            bits |= ((value + 8) / 17) << (4 * column);
        }
        block[2 * row..2 * row + 2].copy_from_slice(&bits.to_le_bytes());
    }
}

fn encode_interpolated_alpha(values: &[u8; PIXELS_PER_BLOCK], block: &mut [u8]) {
    let maximum = values.iter().copied().max().unwrap_or(0);
    let minimum = values.iter().copied().min().unwrap_or(0);
    block[0] = maximum;
    block[1] = minimum;
    let palette = alpha_palette(maximum, minimum);
    let mut bits = 0u64;
    for (index, value) in values.iter().enumerate() {
        let selector = (0..8)
            .min_by_key(|&candidate| value.abs_diff(palette[candidate]))
            .unwrap_or(0);
        bits |= (selector as u64) << (3 * index);
    }
    block[2..8].copy_from_slice(&bits.to_le_bytes()[..6]);
}
