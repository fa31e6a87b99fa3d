use std::collections::HashSet;

use crate::error::Error;

pub mod block;
pub mod buffer;
pub mod codec;
pub mod component;
pub mod converter;
pub mod effect;
pub mod format;
pub mod palette;
pub mod reader;
pub mod shared;
pub mod writer;

use effect::ImageEffect;
use format::mipmap_extent;
use shared::SharedImageBuffer;

pub trait ImageReader {
    fn read_image(&mut self) -> crate::Result<Image<'static>>;
}

pub trait ImageWriter {
    fn write_image(&mut self) -> crate::Result<()>;
}

/// Extent of an image in pixels. Depth is 1 for flat images.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    pub const fn flat(width: u32, height: u32) -> Self {
        Self::new(width, height, 1)
    }

    pub const fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.depth > 0
    }

    pub fn num_pixels(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    /// Pixel count, `None` when it does not fit into `usize`. Sizes taken
    /// from file headers go through this before anything is allocated.
    pub fn checked_num_pixels(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.depth as usize)
    }

    /// Size of mip level `level`. Depth is kept, as volume mip chains only
    /// shrink in the image plane here.
    pub fn mipmap(&self, level: u32) -> Self {
        Self::new(
            mipmap_extent(self.width, level),
            mipmap_extent(self.height, level),
            self.depth,
        )
    }
}

/// Result of a consistency check. Checks are only run on request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Consistency {
    Ok,
    InvalidSize,
    NoData,
    PaletteNotAssigned,
    PaletteEmpty,
    InconsistentDataFormat,
    InconsistentColorFormat,
    PartEmpty,
    ImageEmpty,
    CubemapSideMissing,
    CubemapSideInvalid,
    CubemapSideDouble,
    MipmapInconsistent,
    MipmapsNotPowerOfTwo,
    MipmapsNot1x1,
}

impl Consistency {
    pub fn is_ok(&self) -> bool {
        *self == Self::Ok
    }
}

/// Role of an image part: the single part of a flat image or one cube face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PartSemantic {
    #[default]
    Static,
    CubePositiveX,
    CubeNegativeX,
    CubePositiveY,
    CubeNegativeY,
    CubePositiveZ,
    CubeNegativeZ,
}

impl PartSemantic {
    /// Cube faces in the order they are stored in files.
    pub const CUBE_FACES: [PartSemantic; 6] = [
        PartSemantic::CubePositiveX,
        PartSemantic::CubeNegativeX,
        PartSemantic::CubePositiveY,
        PartSemantic::CubeNegativeY,
        PartSemantic::CubePositiveZ,
        PartSemantic::CubeNegativeZ,
    ];

    pub fn is_cube_face(&self) -> bool {
        *self != Self::Static
    }
}

/// One part of an image with its mipmap chain, level 0 being the base.
#[derive(Clone, Debug, Default)]
pub struct ImagePart<'a> {
    semantic: PartSemantic,
    mipmaps: Vec<SharedImageBuffer<'a>>,
}

impl<'a> ImagePart<'a> {
    pub fn new(semantic: PartSemantic) -> Self {
        Self {
            semantic,
            mipmaps: Vec::new(),
        }
    }

    pub fn semantic(&self) -> PartSemantic {
        self.semantic
    }

    pub fn num_mipmaps(&self) -> usize {
        self.mipmaps.len()
    }

    pub fn mipmaps(&self) -> &[SharedImageBuffer<'a>] {
        &self.mipmaps
    }

    pub fn mipmaps_mut(&mut self) -> &mut [SharedImageBuffer<'a>] {
        &mut self.mipmaps
    }

    pub fn mipmap(&self, level: usize) -> Option<&SharedImageBuffer<'a>> {
        self.mipmaps.get(level)
    }

    pub fn mipmap_mut(&mut self, level: usize) -> Option<&mut SharedImageBuffer<'a>> {
        self.mipmaps.get_mut(level)
    }

    pub fn base(&self) -> Option<&SharedImageBuffer<'a>> {
        self.mipmaps.first()
    }

    pub fn base_mut(&mut self) -> Option<&mut SharedImageBuffer<'a>> {
        self.mipmaps.first_mut()
    }

    /// Appends an empty buffer to the chain and returns it.
    pub fn create_mipmap(&mut self) -> &mut SharedImageBuffer<'a> {
        self.mipmaps.push(SharedImageBuffer::new());
        let last = self.mipmaps.len() - 1;
        &mut self.mipmaps[last]
    }

    pub fn add_mipmap(&mut self, buffer: SharedImageBuffer<'a>) {
        self.mipmaps.push(buffer);
    }

    /// Drops every level above the base.
    pub fn delete_mipmaps(&mut self) {
        self.mipmaps.truncate(1);
    }

    /// Makes `level` the new base, dropping the larger levels in front of it.
    pub fn promote_mipmap(&mut self, level: usize) {
        if level < self.mipmaps.len() {
            self.mipmaps.drain(..level);
        }
    }

    /// Regenerates the full chain down to 1x1 from the base level.
    pub fn build_mipmaps(&mut self) -> crate::Result<()> {
        let chain = buffer::build_mipmap_chain(self.base().ok_or(Error::ImageHasNoBuffer)?)?;
        self.mipmaps.truncate(1);
        self.mipmaps.extend(chain.into_iter().map(SharedImageBuffer::from));
        log::debug!(
            "Rebuilt {} mipmap levels for {:?} part",
            self.mipmaps.len(),
            self.semantic
        );
        Ok(())
    }

    pub fn check_consistency(&self) -> Consistency {
        let Some(base) = self.base() else {
            return Consistency::PartEmpty;
        };
        for buffer in &self.mipmaps {
            let consistency = buffer.check_consistency();
            if !consistency.is_ok() {
                return consistency;
            }
            if buffer.data_type() != base.data_type() {
                return Consistency::InconsistentDataFormat;
            }
            if buffer.layout() != base.layout() {
                return Consistency::InconsistentColorFormat;
            }
        }
        if self.mipmaps.len() > 1 {
            let base_size = base.size();
            if !base_size.width.is_power_of_two() || !base_size.height.is_power_of_two() {
                return Consistency::MipmapsNotPowerOfTwo;
            }
            for (level, buffer) in self.mipmaps.iter().enumerate() {
                let expected = base_size.mipmap(level as u32);
                let actual = buffer.size();
                if actual.width != expected.width || actual.height != expected.height {
                    return Consistency::MipmapInconsistent;
                }
            }
            let last = self.mipmaps[self.mipmaps.len() - 1].size();
            if last.width != 1 || last.height != 1 {
                return Consistency::MipmapsNot1x1;
            }
        }
        Consistency::Ok
    }

    pub fn apply_effect(&mut self, effect: &dyn ImageEffect) -> crate::Result<()> {
        effect.apply_to_part(self)
    }
}

/// An image made of one static part or the six faces of a cube map.
#[derive(Clone, Debug, Default)]
pub struct Image<'a> {
    parts: Vec<ImagePart<'a>>,
}

impl<'a> Image<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flat image holding `buffer` as its only level.
    pub fn from_buffer(buffer: SharedImageBuffer<'a>) -> Self {
        let mut image = Self::new();
        image.create_part(PartSemantic::Static).add_mipmap(buffer);
        image
    }

    pub fn parts(&self) -> &[ImagePart<'a>] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [ImagePart<'a>] {
        &mut self.parts
    }

    pub fn create_part(&mut self, semantic: PartSemantic) -> &mut ImagePart<'a> {
        self.parts.push(ImagePart::new(semantic));
        let last = self.parts.len() - 1;
        &mut self.parts[last]
    }

    pub fn part(&self, semantic: PartSemantic) -> Option<&ImagePart<'a>> {
        self.parts.iter().find(|part| part.semantic == semantic)
    }

    pub fn part_mut(&mut self, semantic: PartSemantic) -> Option<&mut ImagePart<'a>> {
        self.parts.iter_mut().find(|part| part.semantic == semantic)
    }

    pub fn is_cubemap(&self) -> bool {
        self.parts.iter().any(|part| part.semantic.is_cube_face())
    }

    /// Base level of the first part.
    pub fn buffer(&self) -> Option<&SharedImageBuffer<'a>> {
        self.parts.first().and_then(ImagePart::base)
    }

    pub fn buffer_mut(&mut self) -> Option<&mut SharedImageBuffer<'a>> {
        self.parts.first_mut().and_then(ImagePart::base_mut)
    }

    /// Every buffer of every part, mip levels included.
    pub fn buffers_mut(&mut self) -> impl Iterator<Item = &mut SharedImageBuffer<'a>> {
        self.parts
            .iter_mut()
            .flat_map(|part| part.mipmaps.iter_mut())
    }

    pub fn clear(&mut self) {
        self.parts.clear();
    }

    pub fn check_consistency(&self) -> Consistency {
        let Some(first) = self.parts.first() else {
            return Consistency::ImageEmpty;
        };
        for part in &self.parts {
            let consistency = part.check_consistency();
            if !consistency.is_ok() {
                return consistency;
            }
        }
        if let (Some(reference), true) = (first.base(), self.parts.len() > 1) {
            for part in &self.parts[1..] {
                if let Some(base) = part.base() {
                    if base.data_type() != reference.data_type() {
                        return Consistency::InconsistentDataFormat;
                    }
                    if base.layout() != reference.layout() {
                        return Consistency::InconsistentColorFormat;
                    }
                }
            }
        }
        if self.is_cubemap() {
            return self.check_cube_faces();
        }
        if self.parts.len() > 1 {
            return Consistency::CubemapSideInvalid;
        }
        Consistency::Ok
    }

    fn check_cube_faces(&self) -> Consistency {
        let mut seen = HashSet::new();
        for part in &self.parts {
            if !part.semantic.is_cube_face() {
                return Consistency::CubemapSideInvalid;
            }
            if !seen.insert(part.semantic) {
                return Consistency::CubemapSideDouble;
            }
        }
        if seen.len() < PartSemantic::CUBE_FACES.len() {
            return Consistency::CubemapSideMissing;
        }
        Consistency::Ok
    }

    pub fn apply_effect(&mut self, effect: &dyn ImageEffect) -> crate::Result<()> {
        effect.apply_to_image(self)
    }
}
