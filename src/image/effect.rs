use super::shared::SharedImageBuffer;
use super::{Image, ImagePart};

mod color;
mod convert;
mod flip;
mod scale;

pub use color::{ColorKey, Monochrome};
pub use convert::{Convert, RemovePalette};
pub use flip::{FlipX, FlipY};
pub use scale::Scale;

/// An operation on pixel buffers that can be applied at any container level.
///
/// Applying to a part runs the effect on the base level and regenerates
/// the mip chain when the part had one. Applying to an image does that for
/// every part. Effects override the container methods only when they can
/// do better than this fan-out.
pub trait ImageEffect {
    fn apply(&self, buffer: &mut SharedImageBuffer<'_>) -> crate::Result<()>;

    fn apply_to_part(&self, part: &mut ImagePart<'_>) -> crate::Result<()> {
        apply_to_base_level(self, part)
    }

    fn apply_to_image(&self, image: &mut Image<'_>) -> crate::Result<()> {
        for part in image.parts_mut() {
            self.apply_to_part(part)?;
        }
        Ok(())
    }
}

/// Runs `effect` on the base level of `part` and rebuilds its mipmaps.
pub fn apply_to_base_level<E: ImageEffect + ?Sized>(
    effect: &E,
    part: &mut ImagePart<'_>,
) -> crate::Result<()> {
    let had_mipmaps = part.num_mipmaps() > 1;
    let Some(base) = part.base_mut() else {
        return Ok(());
    };
    effect.apply(base)?;
    if had_mipmaps {
        part.build_mipmaps()?;
    }
    Ok(())
}
