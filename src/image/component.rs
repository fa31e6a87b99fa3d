use half::f16;

/// Numeric access to one component stored in a raw pixel byte buffer.
///
/// Multi byte values are stored little endian. Conversions between types go
/// through `f64` and are plain numeric casts without any range rescaling.
pub trait Component: Copy + Default + PartialEq + std::fmt::Debug {
    const SIZE: usize;

    fn read(bytes: &[u8]) -> Self;

    fn write(self, bytes: &mut [u8]);

    fn to_f64(self) -> f64;

    /// Saturating cast, truncating toward zero for integer types.
    fn from_f64(value: f64) -> Self;

    /// Like `from_f64`, but rounds to the nearest integer for integer types.
    fn from_f64_rounded(value: f64) -> Self {
        Self::from_f64(value)
    }

    fn get(data: &[u8], index: usize) -> Self {
        let offset = index * Self::SIZE;
        Self::read(&data[offset..offset + Self::SIZE])
    }

    fn set(data: &mut [u8], index: usize, value: Self) {
        let offset = index * Self::SIZE;
        value.write(&mut data[offset..offset + Self::SIZE]);
    }
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut array = [0; N];
    array.copy_from_slice(&bytes[..N]);
    array
}

impl Component for u8 {
    const SIZE: usize = 1;

    fn read(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn write(self, bytes: &mut [u8]) {
        bytes[0] = self;
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn from_f64(value: f64) -> Self {
        value as u8
    }

    fn from_f64_rounded(value: f64) -> Self {
        value.round() as u8
    }
}

impl Component for u16 {
    const SIZE: usize = 2;

    fn read(bytes: &[u8]) -> Self {
        u16::from_le_bytes(array(bytes))
    }

    fn write(self, bytes: &mut [u8]) {
        bytes[..2].copy_from_slice(&self.to_le_bytes());
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn from_f64(value: f64) -> Self {
        value as u16
    }

    fn from_f64_rounded(value: f64) -> Self {
        value.round() as u16
    }
}

impl Component for f16 {
    const SIZE: usize = 2;

    fn read(bytes: &[u8]) -> Self {
        f16::from_le_bytes(array(bytes))
    }

    fn write(self, bytes: &mut [u8]) {
        bytes[..2].copy_from_slice(&self.to_le_bytes());
    }

    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }

    fn from_f64(value: f64) -> Self {
        f16::from_f64(value)
    }
}

impl Component for f32 {
    const SIZE: usize = 4;

    fn read(bytes: &[u8]) -> Self {
        f32::from_le_bytes(array(bytes))
    }

    fn write(self, bytes: &mut [u8]) {
        bytes[..4].copy_from_slice(&self.to_le_bytes());
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Component for f64 {
    const SIZE: usize = 8;

    fn read(bytes: &[u8]) -> Self {
        f64::from_le_bytes(array(bytes))
    }

    fn write(self, bytes: &mut [u8]) {
        bytes[..8].copy_from_slice(&self.to_le_bytes());
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn from_f64(value: f64) -> Self {
        value
    }
}

/// Binds `$component` to the Rust type stored for a `DataType` and evaluates `$body`.
macro_rules! with_component_type {
    ($data_type:expr, $component:ident => $body:expr) => {
        match $data_type {
            $crate::image::format::DataType::Byte => {
                type $component = u8;
                $body
            }
            $crate::image::format::DataType::Word => {
                type $component = u16;
                $body
            }
            $crate::image::format::DataType::Half => {
                type $component = half::f16;
                $body
            }
            $crate::image::format::DataType::Float => {
                type $component = f32;
                $body
            }
            $crate::image::format::DataType::Double => {
                type $component = f64;
                $body
            }
        }
    };
}

pub(crate) use with_component_type;
