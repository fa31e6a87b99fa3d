use std::fmt::Display;
use std::str::FromStr;

pub const LUMINANCE_RED: f64 = 0.299;
pub const LUMINANCE_GREEN: f64 = 0.587;
pub const LUMINANCE_BLUE: f64 = 0.114;

pub fn luminance(red: f64, green: f64, blue: f64) -> f64 {
    LUMINANCE_RED * red + LUMINANCE_GREEN * green + LUMINANCE_BLUE * blue
}

/// 8 bit RGB triple as stored in palettes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RgbColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RgbColor {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub const fn gray(value: u8) -> Self {
        Self::new(value, value, value)
    }

    pub fn luminance(&self) -> u8 {
        luminance(
            f64::from(self.red),
            f64::from(self.green),
            f64::from(self.blue),
        )
        .round() as u8
    }

    pub fn is_gray(&self) -> bool {
        self.red == self.green && self.green == self.blue
    }

    /// Components scaled into 0..1.
    pub fn normalized(&self) -> [f64; 3] {
        [
            f64::from(self.red) / 255.0,
            f64::from(self.green) / 255.0,
            f64::from(self.blue) / 255.0,
        ]
    }
}

impl From<[u8; 3]> for RgbColor {
    fn from(value: [u8; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

impl From<RgbColor> for [u8; 3] {
    fn from(value: RgbColor) -> Self {
        [value.red, value.green, value.blue]
    }
}

impl Display for RgbColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

impl FromStr for RgbColor {
    type Err = String;

    /// Parses `RRGGBB` hex notation, optionally prefixed with `#`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(format!("'{}' is not a color in RRGGBB notation", s));
        }
        let component = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|e| format!("'{}' is not a color in RRGGBB notation: {}", s, e))
        };
        Ok(Self::new(component(0..2)?, component(2..4)?, component(4..6)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn luminance_of_primaries() {
        assert_eq!(RgbColor::new(255, 0, 0).luminance(), 76);
        assert_eq!(RgbColor::new(0, 255, 0).luminance(), 150);
        assert_eq!(RgbColor::new(0, 0, 255).luminance(), 29);
        assert_eq!(RgbColor::new(255, 255, 255).luminance(), 255);
    }

    #[test]
    fn parse_hex_color() {
        assert_eq!("FF8000".parse::<RgbColor>(), Ok(RgbColor::new(255, 128, 0)));
        assert_eq!("#00ff10".parse::<RgbColor>(), Ok(RgbColor::new(0, 255, 16)));
        assert!("12345".parse::<RgbColor>().is_err());
        assert!("GG0000".parse::<RgbColor>().is_err());
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(RgbColor::new(1, 171, 255).to_string(), "01ABFF");
    }
}
