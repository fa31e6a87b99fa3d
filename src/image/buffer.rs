use std::borrow::Cow;
use std::fmt::Debug;

use super::block;
use super::component::{with_component_type, Component};
use super::format::{ChannelLayout, Compression, DataType, PixelFormat};
use super::palette::Palette;
use super::{Consistency, Size};
use crate::error::Error;

/// Raw pixel bytes either owned by the buffer or borrowed from the caller.
///
/// Borrowed bytes are never freed by the buffer. Cloning always produces
/// owned bytes.
pub enum PixelStore<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a mut [u8]),
}

impl PixelStore<'_> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Owned(data) => data,
            Self::Borrowed(data) => data,
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Self::Owned(data) => data,
            Self::Borrowed(data) => data,
        }
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self, Self::Borrowed(_))
    }
}

impl Clone for PixelStore<'_> {
    fn clone(&self) -> Self {
        Self::Owned(self.as_slice().to_vec())
    }
}

impl Debug for PixelStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owned(data) => write!(f, "Owned({} bytes)", data.len()),
            Self::Borrowed(data) => write!(f, "Borrowed({} bytes)", data.len()),
        }
    }
}

/// Which representations of the pixels currently exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageState {
    /// Geometry only, nothing allocated yet.
    Described,
    RawOnly,
    CompressedOnly,
    Both,
}

#[derive(Clone, Debug, Default)]
enum Storage<'a> {
    #[default]
    Described,
    Raw(PixelStore<'a>),
    Compressed(Vec<u8>),
    Both {
        raw: PixelStore<'a>,
        compressed: Vec<u8>,
    },
}

/// Built in 256x256 byte RGB images.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestImage {
    /// Solid blue.
    Simple,
    /// Red rising along x, green rising along y.
    Gradient,
    /// Black and white 32 pixel squares.
    Checkers,
}

const TEST_IMAGE_EXTENT: u32 = 256;
const CHECKER_EXTENT: u32 = 32;

/// Pixel storage for one image level.
///
/// `create_image` only describes the geometry. Memory for raw or block
/// compressed pixels is allocated by the first mutable accessor that needs
/// it. Raw and compressed bytes may coexist; writing to one of them drops
/// the other.
#[derive(Clone, Debug, Default)]
pub struct PixelBuffer<'a> {
    format: PixelFormat,
    size: Size,
    storage: Storage<'a>,
    palette: Option<Palette>,
}

impl<'a> PixelBuffer<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the buffer to an unallocated image of the given geometry.
    pub fn create_image(&mut self, format: PixelFormat, size: Size) {
        self.clear();
        if !size.is_valid() {
            log::warn!("Creating image with invalid size {:?}", size);
        }
        self.format = format;
        self.size = size;
    }

    /// Releases pixel data and palette and forgets the geometry.
    pub fn clear(&mut self) {
        self.storage = Storage::Described;
        self.palette = None;
        self.format = PixelFormat::default();
        self.size = Size::default();
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data_type(&self) -> DataType {
        self.format.data_type()
    }

    pub fn layout(&self) -> ChannelLayout {
        self.format.layout()
    }

    pub fn compression(&self) -> Compression {
        self.format.compression()
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn num_pixels(&self) -> usize {
        self.size.num_pixels()
    }

    pub fn components_per_pixel(&self) -> usize {
        self.format.components_per_pixel()
    }

    pub fn bytes_per_component(&self) -> usize {
        self.format.bytes_per_component()
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    pub fn bytes_per_row(&self) -> usize {
        self.size.width as usize * self.bytes_per_pixel()
    }

    pub fn data_size(&self) -> usize {
        self.format.data_size(self.size)
    }

    pub fn compressed_size(&self) -> usize {
        self.format.compressed_size(self.size)
    }

    pub fn storage_state(&self) -> StorageState {
        match self.storage {
            Storage::Described => StorageState::Described,
            Storage::Raw(_) => StorageState::RawOnly,
            Storage::Compressed(_) => StorageState::CompressedOnly,
            Storage::Both { .. } => StorageState::Both,
        }
    }

    pub fn has_data(&self) -> bool {
        matches!(self.storage, Storage::Raw(_) | Storage::Both { .. })
    }

    pub fn has_compressed_data(&self) -> bool {
        matches!(
            self.storage,
            Storage::Compressed(_) | Storage::Both { .. }
        )
    }

    pub fn has_any_data(&self) -> bool {
        !matches!(self.storage, Storage::Described)
    }

    pub fn is_borrowing(&self) -> bool {
        match &self.storage {
            Storage::Raw(raw) | Storage::Both { raw, .. } => raw.is_borrowed(),
            _ => false,
        }
    }

    /// Raw pixels if they exist. Never allocates or decodes.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.storage {
            Storage::Raw(raw) | Storage::Both { raw, .. } => Some(raw.as_slice()),
            _ => None,
        }
    }

    /// Writable raw pixels, allocated zeroed or decoded from the compressed
    /// representation on first access. Any compressed bytes are dropped.
    pub fn data_mut(&mut self) -> crate::Result<&mut [u8]> {
        if !self.size.is_valid() {
            return Err(Error::InvalidSize);
        }
        self.storage = match std::mem::take(&mut self.storage) {
            Storage::Described => Storage::Raw(PixelStore::Owned(vec![0; self.data_size()])),
            Storage::Raw(raw) | Storage::Both { raw, .. } => Storage::Raw(raw),
            Storage::Compressed(compressed) => match self.decode(&compressed) {
                Ok(raw) => Storage::Raw(PixelStore::Owned(raw)),
                Err(error) => {
                    self.storage = Storage::Compressed(compressed);
                    return Err(error);
                }
            },
        };
        match &mut self.storage {
            Storage::Raw(raw) => Ok(raw.as_mut_slice()),
            _ => Err(Error::NoData),
        }
    }

    /// Block compressed bytes if they exist. Never allocates or encodes.
    pub fn compressed_data(&self) -> Option<&[u8]> {
        match &self.storage {
            Storage::Compressed(compressed) | Storage::Both { compressed, .. } => {
                Some(compressed.as_slice())
            }
            _ => None,
        }
    }

    /// Writable compressed bytes, allocated zeroed or encoded from the raw
    /// pixels on first access. Any raw pixels are dropped.
    pub fn compressed_data_mut(&mut self) -> crate::Result<&mut [u8]> {
        self.require_compression("compressed data access")?;
        if !self.size.is_valid() {
            return Err(Error::InvalidSize);
        }
        self.storage = match std::mem::take(&mut self.storage) {
            Storage::Described => Storage::Compressed(vec![0; self.compressed_size()]),
            Storage::Compressed(compressed) | Storage::Both { compressed, .. } => {
                Storage::Compressed(compressed)
            }
            Storage::Raw(raw) => match self.encode(raw.as_slice()) {
                Ok(compressed) => Storage::Compressed(compressed),
                Err(error) => {
                    self.storage = Storage::Raw(raw);
                    return Err(error);
                }
            },
        };
        match &mut self.storage {
            Storage::Compressed(compressed) => Ok(compressed.as_mut_slice()),
            _ => Err(Error::NoData),
        }
    }

    /// Raw pixels for reading, decoding compressed-only buffers into a
    /// temporary copy without touching the stored state.
    pub fn decoded_data(&self) -> crate::Result<Cow<'_, [u8]>> {
        match &self.storage {
            Storage::Raw(raw) | Storage::Both { raw, .. } => Ok(Cow::Borrowed(raw.as_slice())),
            Storage::Compressed(compressed) => Ok(Cow::Owned(self.decode(compressed)?)),
            Storage::Described => Err(Error::NoData),
        }
    }

    /// Compressed bytes for reading, encoding raw-only buffers into a
    /// temporary copy without touching the stored state.
    pub fn encoded_data(&self) -> crate::Result<Cow<'_, [u8]>> {
        self.require_compression("compressed data access")?;
        match &self.storage {
            Storage::Compressed(compressed) | Storage::Both { compressed, .. } => {
                Ok(Cow::Borrowed(compressed.as_slice()))
            }
            Storage::Raw(raw) => Ok(Cow::Owned(self.encode(raw.as_slice())?)),
            Storage::Described => Err(Error::NoData),
        }
    }

    /// Adds the compressed representation next to the raw pixels.
    pub fn compress(&mut self) -> crate::Result<()> {
        self.require_compression("compress")?;
        self.storage = match std::mem::take(&mut self.storage) {
            Storage::Raw(raw) => match self.encode(raw.as_slice()) {
                Ok(compressed) => Storage::Both { raw, compressed },
                Err(error) => {
                    self.storage = Storage::Raw(raw);
                    return Err(error);
                }
            },
            Storage::Described => return Err(Error::NoData),
            other => other,
        };
        Ok(())
    }

    /// Adds the raw representation next to the compressed bytes.
    pub fn decompress(&mut self) -> crate::Result<()> {
        self.storage = match std::mem::take(&mut self.storage) {
            Storage::Compressed(compressed) => match self.decode(&compressed) {
                Ok(raw) => Storage::Both {
                    raw: PixelStore::Owned(raw),
                    compressed,
                },
                Err(error) => {
                    self.storage = Storage::Compressed(compressed);
                    return Err(error);
                }
            },
            Storage::Described => return Err(Error::NoData),
            other => other,
        };
        Ok(())
    }

    /// Drops the compressed bytes. A compressed-only buffer loses its pixels.
    pub fn invalidate_compressed(&mut self) {
        self.storage = match std::mem::take(&mut self.storage) {
            Storage::Both { raw, .. } | Storage::Raw(raw) => Storage::Raw(raw),
            Storage::Compressed(_) | Storage::Described => Storage::Described,
        };
    }

    /// Drops the raw pixels. A raw-only buffer loses its pixels.
    pub fn invalidate_raw(&mut self) {
        self.storage = match std::mem::take(&mut self.storage) {
            Storage::Both { compressed, .. } | Storage::Compressed(compressed) => {
                Storage::Compressed(compressed)
            }
            Storage::Raw(_) | Storage::Described => Storage::Described,
        };
    }

    /// Switches the block compression kind, keeping the raw pixels.
    pub fn set_compression(&mut self, compression: Compression) -> crate::Result<()> {
        let format = self.format.with_compression(compression)?;
        if format == self.format {
            return Ok(());
        }
        if let Storage::Compressed(_) = self.storage {
            self.decompress()?;
        }
        self.invalidate_compressed();
        self.format = format;
        Ok(())
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    pub fn palette_mut(&mut self) -> Option<&mut Palette> {
        self.palette.as_mut()
    }

    pub fn set_palette(&mut self, palette: Option<Palette>) {
        self.palette = palette;
    }

    /// Copies the first `data_size()` bytes of `data` into owned storage.
    pub fn copy_data(&mut self, data: &[u8]) -> crate::Result<()> {
        let data_size = self.checked_data_size(data.len())?;
        self.storage = Storage::Raw(PixelStore::Owned(data[..data_size].to_vec()));
        Ok(())
    }

    /// Takes ownership of `data`, cutting it down to `data_size()` bytes.
    pub fn take_over_data(&mut self, mut data: Vec<u8>) -> crate::Result<()> {
        let data_size = self.checked_data_size(data.len())?;
        data.truncate(data_size);
        self.storage = Storage::Raw(PixelStore::Owned(data));
        Ok(())
    }

    /// Uses caller memory as raw pixel storage without copying it.
    pub fn share_data(&mut self, data: &'a mut [u8]) -> crate::Result<()> {
        let data_size = self.checked_data_size(data.len())?;
        self.storage = Storage::Raw(PixelStore::Borrowed(&mut data[..data_size]));
        Ok(())
    }

    /// Takes ownership of block compressed bytes, dropping any raw pixels.
    pub fn take_over_compressed_data(&mut self, mut data: Vec<u8>) -> crate::Result<()> {
        self.require_compression("compressed data access")?;
        let expected = self.compressed_size();
        if data.len() < expected {
            return Err(Error::DataSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        data.truncate(expected);
        self.storage = Storage::Compressed(data);
        Ok(())
    }

    pub fn check_consistency(&self) -> Consistency {
        if !self.size.is_valid() {
            return Consistency::InvalidSize;
        }
        if !self.has_any_data() {
            return Consistency::NoData;
        }
        if self.layout() == ChannelLayout::Palette {
            match &self.palette {
                None => return Consistency::PaletteNotAssigned,
                Some(palette) if palette.is_empty() => return Consistency::PaletteEmpty,
                Some(_) => {}
            }
        }
        Consistency::Ok
    }

    pub fn create_test_image(&mut self, test_image: TestImage) {
        let size = Size::flat(TEST_IMAGE_EXTENT, TEST_IMAGE_EXTENT);
        self.create_image(
            PixelFormat::uncompressed(DataType::Byte, ChannelLayout::Rgb),
            size,
        );
        let mut data = Vec::with_capacity(self.data_size());
        for y in 0..size.height {
            for x in 0..size.width {
                let rgb = match test_image {
                    TestImage::Simple => [0, 0, 255],
                    TestImage::Gradient => [x as u8, y as u8, 0],
                    TestImage::Checkers => {
                        if (x / CHECKER_EXTENT + y / CHECKER_EXTENT) % 2 == 0 {
                            [255, 255, 255]
                        } else {
                            [0, 0, 0]
                        }
                    }
                };
                data.extend_from_slice(&rgb);
            }
        }
        self.storage = Storage::Raw(PixelStore::Owned(data));
    }

    fn require_compression(&self, context: &'static str) -> crate::Result<()> {
        if self.compression().is_compressed() {
            Ok(())
        } else {
            Err(Error::UnsupportedCompression(context, Compression::None))
        }
    }

    fn checked_data_size(&self, available: usize) -> crate::Result<usize> {
        if !self.size.is_valid() {
            return Err(Error::InvalidSize);
        }
        let expected = self.data_size();
        if available < expected {
            return Err(Error::DataSizeMismatch {
                expected,
                actual: available,
            });
        }
        Ok(expected)
    }

    fn decode(&self, compressed: &[u8]) -> crate::Result<Vec<u8>> {
        let mut raw = vec![0; self.data_size()];
        block::decompress(&self.format, self.size, compressed, &mut raw)?;
        Ok(raw)
    }

    fn encode(&self, raw: &[u8]) -> crate::Result<Vec<u8>> {
        let mut compressed = vec![0; self.compressed_size()];
        block::compress(&self.format, self.size, raw, &mut compressed)?;
        Ok(compressed)
    }
}

/// Builds every level below `base` down to 1x1 with a 2x2 box filter.
///
/// Levels keep the base format; compressed bases are filtered from their
/// decoded pixels and the new levels compress on demand.
pub fn build_mipmap_chain<'b>(base: &PixelBuffer<'b>) -> crate::Result<Vec<PixelBuffer<'b>>> {
    if base.layout() == ChannelLayout::Palette {
        return Err(Error::UnsupportedChannelLayout(
            "mipmap generation",
            ChannelLayout::Palette,
        ));
    }
    let mut chain: Vec<PixelBuffer<'b>> = Vec::new();
    let mut level = 1;
    loop {
        let source = match chain.last() {
            Some(previous) => previous,
            None => base,
        };
        let source_size = source.size();
        if source_size.width <= 1 && source_size.height <= 1 {
            break;
        }
        let size = base.size().mipmap(level);
        let pixels = source.decoded_data()?;
        let data = with_component_type!(base.data_type(), C => {
            downsample::<C>(&pixels, source_size, size, base.components_per_pixel())
        });
        let mut buffer = PixelBuffer::new();
        buffer.create_image(base.format(), size);
        buffer.take_over_data(data)?;
        drop(pixels);
        chain.push(buffer);
        level += 1;
    }
    Ok(chain)
}

fn downsample<C: Component>(
    source: &[u8],
    source_size: Size,
    size: Size,
    components_per_pixel: usize,
) -> Vec<u8> {
    let mut data = vec![0; size.num_pixels() * components_per_pixel * C::SIZE];
    let (source_width, source_height) = (source_size.width as usize, source_size.height as usize);
    let (width, height) = (size.width as usize, size.height as usize);
    for z in 0..size.depth as usize {
        for y in 0..height {
            for x in 0..width {
                let mut sums = [0.0f64; 4];
                let mut count = 0.0;
                for source_y in (2 * y..2 * y + 2).filter(|row| *row < source_height) {
                    for source_x in (2 * x..2 * x + 2).filter(|column| *column < source_width) {
                        let pixel = (z * source_height + source_y) * source_width + source_x;
                        for (component, sum) in sums.iter_mut().take(components_per_pixel).enumerate() {
                            *sum += C::get(source, pixel * components_per_pixel + component).to_f64();
                        }
                        count += 1.0;
                    }
                }
                let pixel = (z * height + y) * width + x;
                for (component, sum) in sums.iter().take(components_per_pixel).enumerate() {
                    C::set(
                        &mut data,
                        pixel * components_per_pixel + component,
                        C::from_f64_rounded(sum / count),
                    );
                }
            }
        }
    }
    data
}
