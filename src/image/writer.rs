mod bmp;
mod dds;
mod tga;

pub use bmp::BmpImageWriter;
pub use dds::DdsImageWriter;
pub use tga::TgaImageWriter;
