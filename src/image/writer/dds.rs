use std::io::Write;

use crate::binary_stream::write_all;
use crate::error::Error;
use crate::image::codec::dds::{
    compression_four_cc, DdsHeader, DdsPixelFormat, DDPF_FOURCC, DDSCAPS2_CUBEMAP,
    DDSCAPS2_CUBEMAP_ALL_FACES, DDSCAPS_COMPLEX, DDSCAPS_MIPMAP, DDSCAPS_TEXTURE, DDSD_CAPS,
    DDSD_DEPTH, DDSD_HEIGHT, DDSD_LINEARSIZE, DDSD_MIPMAPCOUNT, DDSD_PIXELFORMAT, DDSD_WIDTH,
    DDS_HEADER_SIZE, PIXEL_FORMAT_SIZE,
};
use crate::image::{Consistency, Image, ImagePart, ImageWriter, PartSemantic};

/// Writes block compressed images with every mip level and cube face.
pub struct DdsImageWriter<'a, 'b, T: Write> {
    writer: T,
    image: &'a Image<'b>,
}

impl<'a, 'b, T: Write> DdsImageWriter<'a, 'b, T> {
    pub fn new(writer: T, image: &'a Image<'b>) -> Self {
        Self { writer, image }
    }

    /// Parts in the order they are stored, cube faces first to last.
    fn stored_parts(&self) -> crate::Result<Vec<&'a ImagePart<'b>>> {
        if !self.image.is_cubemap() {
            return Ok(self.image.parts().iter().take(1).collect());
        }
        PartSemantic::CUBE_FACES
            .iter()
            .map(|face| {
                self.image
                    .part(*face)
                    .ok_or(Error::InconsistentImage(Consistency::CubemapSideMissing))
            })
            .collect()
    }
}

impl<T: Write> ImageWriter for DdsImageWriter<'_, '_, T> {
    fn write_image(&mut self) -> crate::Result<()> {
        let base = self.image.buffer().ok_or(Error::ImageHasNoBuffer)?;
        let compression = base.compression();
        let four_cc = compression_four_cc(compression)
            .ok_or(Error::NotImplemented("Saving uncompressed DDS images"))?;
        let consistency = self.image.check_consistency();
        if !consistency.is_ok() {
            return Err(Error::InconsistentImage(consistency));
        }
        let parts = self.stored_parts()?;
        let num_mipmaps = parts[0].num_mipmaps() as u32;
        let size = base.size();
        for part in &parts {
            if part.mipmaps().iter().any(|buffer| buffer.compression() != compression) {
                return Err(Error::InconsistentImage(Consistency::InconsistentDataFormat));
            }
            let same_chain = part.num_mipmaps() as u32 == num_mipmaps
                && part.base().map(|face| face.size()) == Some(size);
            if !same_chain {
                return Err(Error::InconsistentImage(Consistency::MipmapInconsistent));
            }
        }

        let mut flags = DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT | DDSD_LINEARSIZE;
        let mut caps1 = DDSCAPS_TEXTURE;
        let mut caps2 = 0;
        if num_mipmaps > 1 {
            flags |= DDSD_MIPMAPCOUNT;
            caps1 |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
        }
        if size.depth > 1 {
            flags |= DDSD_DEPTH;
        }
        if self.image.is_cubemap() {
            caps1 |= DDSCAPS_COMPLEX;
            caps2 = DDSCAPS2_CUBEMAP | DDSCAPS2_CUBEMAP_ALL_FACES;
        }
        let header = DdsHeader {
            size: DDS_HEADER_SIZE,
            flags,
            height: size.height,
            width: size.width,
            pitch_or_linear_size: base.compressed_size() as u32,
            depth: if size.depth > 1 { size.depth } else { 0 },
            mipmap_count: if num_mipmaps > 1 { num_mipmaps } else { 0 },
            pixel_format: DdsPixelFormat {
                size: PIXEL_FORMAT_SIZE,
                flags: DDPF_FOURCC,
                four_cc,
                ..Default::default()
            },
            caps1,
            caps2,
            dx10: None,
        };
        log::info!(
            "Writing {}x{}x{} {:?} DDS image with {} parts of {} mip levels",
            size.width,
            size.height,
            size.depth,
            compression,
            parts.len(),
            num_mipmaps
        );

        write_all(&mut self.writer, &header.to_bytes(), "DDS header")?;
        for part in parts {
            for buffer in part.mipmaps() {
                write_all(&mut self.writer, &buffer.encoded_data()?, "DDS pixel data")?;
            }
        }
        self.writer
            .flush()
            .map_err(|e| Error::FailedToWrite("DDS image", e))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::buffer::TestImage;
    use crate::image::format::{ChannelLayout, Compression, DataType, PixelFormat};
    use crate::image::reader::DdsImageReader;
    use crate::image::shared::SharedImageBuffer;
    use crate::image::{ImageReader, Size};
    use std::io::Cursor;

    fn compressed_buffer(compression: Compression) -> SharedImageBuffer<'static> {
        let mut buffer = SharedImageBuffer::new();
        buffer.create_test_image(TestImage::Checkers);
        buffer.set_compression(compression).unwrap();
        buffer
    }

    fn write(image: &Image<'_>) -> crate::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        DdsImageWriter::new(&mut bytes, image).write_image()?;
        Ok(bytes)
    }

    #[test]
    fn compressed_mip_chain_round_trip() {
        let mut image = Image::from_buffer(compressed_buffer(Compression::Dxt1));
        image.parts_mut()[0].build_mipmaps().unwrap();
        let bytes = write(&image).unwrap();

        let header = DdsHeader::read(&mut Cursor::new(&bytes)).unwrap();
        let levels = image.parts()[0].num_mipmaps();
        assert_eq!(header.mipmap_count as usize, levels);
        assert_ne!(header.caps1 & DDSCAPS_MIPMAP, 0);

        let read = DdsImageReader::new(Cursor::new(bytes)).read_image().unwrap();
        let part = &read.parts()[0];
        assert_eq!(part.num_mipmaps(), levels);
        for (written, read) in image.parts()[0].mipmaps().iter().zip(part.mipmaps()) {
            assert_eq!(read.size(), written.size());
            assert_eq!(read.compression(), Compression::Dxt1);
            assert_eq!(
                read.compressed_data().unwrap(),
                &written.encoded_data().unwrap()[..]
            );
        }
    }

    #[test]
    fn cube_faces_are_written_in_order() {
        let mut image = Image::new();
        for (index, face) in PartSemantic::CUBE_FACES.iter().rev().enumerate() {
            let mut buffer = SharedImageBuffer::new();
            buffer.create_image(
                PixelFormat::new(DataType::Byte, ChannelLayout::Grayscale, Compression::Bc4)
                    .unwrap(),
                Size::flat(4, 4),
            );
            buffer.compressed_data_mut().unwrap()[0] = index as u8;
            image.create_part(*face).add_mipmap(buffer);
        }
        let bytes = write(&image).unwrap();
        let read = DdsImageReader::new(Cursor::new(bytes)).read_image().unwrap();
        assert_eq!(read.check_consistency(), Consistency::Ok);
        for (face, expected) in PartSemantic::CUBE_FACES.iter().zip([5, 4, 3, 2, 1, 0]) {
            let base = read.part(*face).unwrap().base().unwrap();
            assert_eq!(base.compressed_data().unwrap()[0], expected);
        }
    }

    #[test]
    fn incomplete_cube_map_is_rejected() {
        let mut image = Image::new();
        for face in &PartSemantic::CUBE_FACES[..2] {
            image
                .create_part(*face)
                .add_mipmap(compressed_buffer(Compression::Dxt5));
        }
        assert!(matches!(
            write(&image),
            Err(Error::InconsistentImage(Consistency::CubemapSideMissing))
        ));
    }

    fn cube_map(faces: [SharedImageBuffer<'static>; 6]) -> Image<'static> {
        let mut image = Image::new();
        for (face, buffer) in PartSemantic::CUBE_FACES.iter().zip(faces) {
            image.create_part(*face).add_mipmap(buffer);
        }
        image
    }

    #[test]
    fn mismatching_faces_are_rejected_before_writing() {
        let mut faces: [SharedImageBuffer<'static>; 6] =
            std::array::from_fn(|_| compressed_buffer(Compression::Dxt5));
        faces[5] = compressed_buffer(Compression::Dxt3);
        let image = cube_map(faces);
        assert_eq!(image.check_consistency(), Consistency::Ok);
        let mut bytes = Vec::new();
        let result = DdsImageWriter::new(&mut bytes, &image).write_image();
        assert!(matches!(
            result,
            Err(Error::InconsistentImage(Consistency::InconsistentDataFormat))
        ));
        assert!(bytes.is_empty());

        let mut image = cube_map(std::array::from_fn(|_| compressed_buffer(Compression::Dxt5)));
        image.parts_mut()[0].build_mipmaps().unwrap();
        assert_eq!(image.check_consistency(), Consistency::Ok);
        let mut bytes = Vec::new();
        let result = DdsImageWriter::new(&mut bytes, &image).write_image();
        assert!(matches!(
            result,
            Err(Error::InconsistentImage(Consistency::MipmapInconsistent))
        ));
        assert!(bytes.is_empty());
    }

    #[test]
    fn uncompressed_images_are_not_written() {
        let mut buffer = SharedImageBuffer::new();
        buffer.create_test_image(TestImage::Simple);
        assert!(matches!(
            write(&Image::from_buffer(buffer)),
            Err(Error::NotImplemented(_))
        ));
    }
}
