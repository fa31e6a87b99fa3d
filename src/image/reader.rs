mod bmp;
mod dds;
mod tga;

pub use bmp::BmpImageReader;
pub use dds::DdsImageReader;
pub use tga::TgaImageReader;
