use std::ops::Deref;
use std::rc::Rc;

use super::buffer::{PixelBuffer, TestImage};
use super::effect::ImageEffect;
use super::format::{Compression, PixelFormat};
use super::palette::Palette;
use super::Size;

/// Copy-on-write handle to a [`PixelBuffer`].
///
/// Cloning a handle only bumps a reference count. Reads go straight to the
/// shared buffer through `Deref`; every mutating method first makes the
/// buffer unique, deep copying it while other handles still refer to it.
/// The count is not atomic, handles stay on the thread that created them.
#[derive(Clone, Debug, Default)]
pub struct SharedImageBuffer<'a> {
    buffer: Rc<PixelBuffer<'a>>,
}

impl<'a> SharedImageBuffer<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reference_count(&self) -> usize {
        Rc::strong_count(&self.buffer)
    }

    pub fn is_shared(&self) -> bool {
        self.reference_count() > 1
    }

    /// Whether both handles refer to the same buffer.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.buffer, &other.buffer)
    }

    /// Unique mutable access, detaching from other handles first.
    pub fn buffer_mut(&mut self) -> &mut PixelBuffer<'a> {
        if self.is_shared() {
            log::debug!(
                "Detaching shared image buffer ({} references)",
                self.reference_count()
            );
        }
        Rc::make_mut(&mut self.buffer)
    }

    pub fn create_image(&mut self, format: PixelFormat, size: Size) {
        if self.is_shared() {
            self.buffer = Rc::new(PixelBuffer::new());
        }
        self.buffer_mut().create_image(format, size);
    }

    pub fn clear(&mut self) {
        if self.is_shared() {
            self.buffer = Rc::new(PixelBuffer::new());
        } else {
            self.buffer_mut().clear();
        }
    }

    pub fn data_mut(&mut self) -> crate::Result<&mut [u8]> {
        self.buffer_mut().data_mut()
    }

    pub fn compressed_data_mut(&mut self) -> crate::Result<&mut [u8]> {
        self.buffer_mut().compressed_data_mut()
    }

    pub fn compress(&mut self) -> crate::Result<()> {
        self.buffer_mut().compress()
    }

    pub fn decompress(&mut self) -> crate::Result<()> {
        self.buffer_mut().decompress()
    }

    pub fn set_compression(&mut self, compression: Compression) -> crate::Result<()> {
        self.buffer_mut().set_compression(compression)
    }

    pub fn invalidate_compressed(&mut self) {
        self.buffer_mut().invalidate_compressed();
    }

    pub fn set_palette(&mut self, palette: Option<Palette>) {
        self.buffer_mut().set_palette(palette);
    }

    pub fn palette_mut(&mut self) -> Option<&mut Palette> {
        self.buffer_mut().palette_mut()
    }

    pub fn copy_data(&mut self, data: &[u8]) -> crate::Result<()> {
        self.buffer_mut().copy_data(data)
    }

    pub fn take_over_data(&mut self, data: Vec<u8>) -> crate::Result<()> {
        self.buffer_mut().take_over_data(data)
    }

    pub fn share_data(&mut self, data: &'a mut [u8]) -> crate::Result<()> {
        self.buffer_mut().share_data(data)
    }

    pub fn take_over_compressed_data(&mut self, data: Vec<u8>) -> crate::Result<()> {
        self.buffer_mut().take_over_compressed_data(data)
    }

    pub fn create_test_image(&mut self, test_image: TestImage) {
        if self.is_shared() {
            self.buffer = Rc::new(PixelBuffer::new());
        }
        self.buffer_mut().create_test_image(test_image);
    }

    /// Hands the buffer to the effect, which decides what to mutate.
    pub fn apply_effect(&mut self, effect: &dyn ImageEffect) -> crate::Result<()> {
        effect.apply(self)
    }
}

impl<'a> Deref for SharedImageBuffer<'a> {
    type Target = PixelBuffer<'a>;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl<'a> From<PixelBuffer<'a>> for SharedImageBuffer<'a> {
    fn from(buffer: PixelBuffer<'a>) -> Self {
        Self {
            buffer: Rc::new(buffer),
        }
    }
}
