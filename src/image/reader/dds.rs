use std::io::{self, Read};

use crate::binary_stream::read_up_to;
use crate::error::Error;
use crate::image::codec::dds::{resolve_pixel_layout, unpack_masked_pixels, DdsHeader, DdsPixelLayout};
use crate::image::converter::FormatConverter;
use crate::image::format::PixelFormat;
use crate::image::shared::SharedImageBuffer;
use crate::image::{Image, ImagePart, ImageReader, PartSemantic, Size};

/// Reads DirectDraw surfaces with their mip chains and cube faces.
///
/// Block compressed levels stay compressed. Packed, swizzled and BGR(A)
/// payloads are normalized to the channel layout of the loaded format. A cube
/// map that ends early keeps the faces read so far; the missing faces show up
/// in the consistency check of the returned image.
pub struct DdsImageReader<T: Read> {
    reader: T,
}

impl<T: Read> DdsImageReader<T> {
    pub fn new(reader: T) -> Self {
        Self { reader }
    }

    /// Reads the payload of one level. Returns `None` when the stream ended
    /// before the first byte.
    fn read_level(
        &mut self,
        header: &DdsHeader,
        layout: &DdsPixelLayout,
        size: Size,
    ) -> crate::Result<Option<SharedImageBuffer<'static>>> {
        let format = layout.format;
        let stored_size = if format.compression().is_compressed() {
            format.checked_compressed_size(size)
        } else if layout.masked {
            let pixel_size = (header.pixel_format.rgb_bit_count / 8) as usize;
            size.checked_num_pixels()
                .and_then(|num_pixels| num_pixels.checked_mul(pixel_size))
        } else {
            format.checked_data_size(size)
        }
        .ok_or(Error::InvalidSize)?;
        let stored = read_up_to(&mut self.reader, stored_size)
            .map_err(|e| Error::FailedToRead("DDS pixel data", e))?;
        if stored.is_empty() && stored_size > 0 {
            return Ok(None);
        }
        if stored.len() < stored_size {
            return Err(Error::FailedToRead(
                "DDS pixel data",
                io::ErrorKind::UnexpectedEof.into(),
            ));
        }

        let mut buffer = SharedImageBuffer::new();
        if format.compression().is_compressed() {
            buffer.create_image(format, size);
            buffer.take_over_compressed_data(stored)?;
        } else if layout.masked {
            buffer.create_image(format, size);
            let unpacked = unpack_masked_pixels(
                &header.pixel_format,
                format.layout(),
                &stored,
                size.num_pixels(),
            )?;
            buffer.take_over_data(unpacked)?;
        } else {
            let data_type = format.data_type();
            buffer.create_image(
                PixelFormat::uncompressed(data_type, layout.stored_layout),
                size,
            );
            buffer.take_over_data(stored)?;
            if layout.needs_swap() {
                FormatConverter::convert(
                    buffer.buffer_mut(),
                    data_type,
                    format.layout(),
                    data_type.default_alpha(),
                )?;
            }
        }
        Ok(Some(buffer))
    }
}

impl<T: Read> ImageReader for DdsImageReader<T> {
    fn read_image(&mut self) -> crate::Result<Image<'static>> {
        let header = DdsHeader::read(&mut self.reader)?;
        let layout = resolve_pixel_layout(&header)?;
        log::info!(
            "Reading {}x{}x{} DDS image as {:?} with {} mip levels{}",
            header.width,
            header.height,
            header.depth(),
            layout.format,
            header.mipmap_count(),
            if header.is_cubemap() { " per cube face" } else { "" }
        );
        let semantics: &[PartSemantic] = if header.is_cubemap() {
            &PartSemantic::CUBE_FACES
        } else {
            &[PartSemantic::Static]
        };
        let base = Size::new(header.width, header.height, header.depth());
        if !base.is_valid() {
            return Err(Error::InvalidSize);
        }

        let mut image = Image::new();
        for (face, semantic) in semantics.iter().enumerate() {
            let mut part = ImagePart::new(*semantic);
            for level in 0..header.mipmap_count() {
                match self.read_level(&header, &layout, base.mipmap(level))? {
                    Some(buffer) => part.add_mipmap(buffer),
                    None if face > 0 && level == 0 => break,
                    None => {
                        return Err(Error::FailedToRead(
                            "DDS pixel data",
                            io::ErrorKind::UnexpectedEof.into(),
                        ))
                    }
                }
            }
            if part.num_mipmaps() == 0 {
                log::warn!(
                    "DDS cube map ends after {} of {} faces",
                    face,
                    semantics.len()
                );
                break;
            }
            *image.create_part(*semantic) = part;
        }
        Ok(image)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::codec::dds::{
        DdsPixelFormat, Dx10Header, DDPF_FOURCC, DDPF_LUMINANCE, DDSCAPS2_CUBEMAP,
        DDSCAPS2_CUBEMAP_ALL_FACES, DDS_HEADER_SIZE, DXGI_FORMAT_B8G8R8A8_UNORM, FOURCC_DX10,
        FOURCC_DXT1, PIXEL_FORMAT_SIZE,
    };
    use crate::image::format::{ChannelLayout, Compression, DataType};
    use crate::image::Consistency;
    use std::io::Cursor;

    const DDPF_RGB: u32 = 0x40;

    fn dds_file(header: DdsHeader, payload: &[u8]) -> Cursor<Vec<u8>> {
        let mut bytes = header.to_bytes();
        bytes.extend_from_slice(payload);
        Cursor::new(bytes)
    }

    fn header(width: u32, height: u32, pixel_format: DdsPixelFormat) -> DdsHeader {
        DdsHeader {
            size: DDS_HEADER_SIZE,
            width,
            height,
            pixel_format: DdsPixelFormat {
                size: PIXEL_FORMAT_SIZE,
                ..pixel_format
            },
            ..Default::default()
        }
    }

    fn dxt1_cube_header() -> DdsHeader {
        let mut header = header(
            4,
            4,
            DdsPixelFormat {
                flags: DDPF_FOURCC,
                four_cc: FOURCC_DXT1,
                ..Default::default()
            },
        );
        header.caps2 = DDSCAPS2_CUBEMAP | DDSCAPS2_CUBEMAP_ALL_FACES;
        header
    }

    #[test]
    fn packed_565_pixels() {
        let pixel_format = DdsPixelFormat {
            flags: DDPF_RGB,
            rgb_bit_count: 16,
            red_mask: 0xF800,
            green_mask: 0x07E0,
            blue_mask: 0x001F,
            ..Default::default()
        };
        let payload = [0x00, 0xF8, 0x1F, 0x00];
        let image = DdsImageReader::new(dds_file(header(2, 1, pixel_format), &payload))
            .read_image()
            .unwrap();
        let buffer = image.buffer().unwrap();
        assert_eq!(buffer.layout(), ChannelLayout::Rgb);
        assert_eq!(buffer.data(), Some(&[248, 0, 0, 0, 0, 248][..]));
    }

    #[test]
    fn luminance_mip_chain() {
        let mut header = header(
            4,
            4,
            DdsPixelFormat {
                flags: DDPF_LUMINANCE,
                rgb_bit_count: 8,
                red_mask: 0xFF,
                ..Default::default()
            },
        );
        header.mipmap_count = 3;
        let payload: Vec<u8> = (0..21).collect();
        let image = DdsImageReader::new(dds_file(header, &payload))
            .read_image()
            .unwrap();
        let part = &image.parts()[0];
        assert_eq!(part.num_mipmaps(), 3);
        assert_eq!(part.mipmap(1).unwrap().size(), Size::flat(2, 2));
        assert_eq!(part.mipmap(1).unwrap().data(), Some(&[16, 17, 18, 19][..]));
        assert_eq!(part.mipmap(2).unwrap().data(), Some(&[20][..]));
        assert_eq!(image.check_consistency(), Consistency::Ok);
    }

    #[test]
    fn dx10_bgra_is_swapped() {
        let mut header = header(
            1,
            1,
            DdsPixelFormat {
                flags: DDPF_FOURCC,
                four_cc: FOURCC_DX10,
                ..Default::default()
            },
        );
        header.dx10 = Some(Dx10Header {
            dxgi_format: DXGI_FORMAT_B8G8R8A8_UNORM,
            resource_dimension: 3,
            misc_flag: 0,
            array_size: 1,
        });
        let image = DdsImageReader::new(dds_file(header, &[1, 2, 3, 4]))
            .read_image()
            .unwrap();
        let buffer = image.buffer().unwrap();
        assert_eq!(buffer.format(), PixelFormat::uncompressed(DataType::Byte, ChannelLayout::Rgba));
        assert_eq!(buffer.data(), Some(&[3, 2, 1, 4][..]));
    }

    #[test]
    fn compressed_cube_map() {
        let payload: Vec<u8> = (0..6 * 8).collect();
        let image = DdsImageReader::new(dds_file(dxt1_cube_header(), &payload))
            .read_image()
            .unwrap();
        assert!(image.is_cubemap());
        assert_eq!(image.parts().len(), 6);
        assert_eq!(image.check_consistency(), Consistency::Ok);
        let negative_x = image.part(PartSemantic::CubeNegativeX).unwrap();
        let base = negative_x.base().unwrap();
        assert_eq!(base.compression(), Compression::Dxt1);
        assert_eq!(base.compressed_data(), Some(&payload[8..16]));
    }

    #[test]
    fn truncated_cube_map_keeps_read_faces() {
        let payload = [0; 2 * 8];
        let image = DdsImageReader::new(dds_file(dxt1_cube_header(), &payload))
            .read_image()
            .unwrap();
        assert_eq!(image.parts().len(), 2);
        assert_eq!(image.check_consistency(), Consistency::CubemapSideMissing);
    }

    #[test]
    fn oversized_headers_are_rejected() {
        let rgb32 = DdsPixelFormat {
            flags: DDPF_RGB,
            rgb_bit_count: 32,
            red_mask: 0x00FF_0000,
            green_mask: 0x0000_FF00,
            blue_mask: 0x0000_00FF,
            alpha_mask: 0xFF00_0000,
            ..Default::default()
        };
        let result =
            DdsImageReader::new(dds_file(header(u32::MAX, u32::MAX, rgb32), &[])).read_image();
        assert!(matches!(result, Err(Error::InvalidSize)));

        let mut compressed = dxt1_cube_header();
        compressed.caps2 = 0;
        compressed.width = u32::MAX;
        compressed.height = u32::MAX;
        compressed.depth = u32::MAX;
        let result = DdsImageReader::new(dds_file(compressed, &[])).read_image();
        assert!(matches!(result, Err(Error::InvalidSize)));

        // Fits into memory arithmetic but not into the stream
        let result =
            DdsImageReader::new(dds_file(header(1 << 20, 1 << 20, rgb32), &[0; 64])).read_image();
        assert!(matches!(result, Err(Error::FailedToRead("DDS pixel data", _))));
    }

    #[test]
    fn truncated_level_fails() {
        let result = DdsImageReader::new(dds_file(dxt1_cube_header(), &[0; 12])).read_image();
        assert!(matches!(result, Err(Error::FailedToRead("DDS pixel data", _))));

        let mut header = dxt1_cube_header();
        header.caps2 = 0;
        let result = DdsImageReader::new(dds_file(header, &[])).read_image();
        assert!(matches!(result, Err(Error::FailedToRead("DDS pixel data", _))));
    }
}
