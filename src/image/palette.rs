use std::cell::OnceCell;
use std::collections::HashMap;

use crate::color::RgbColor;

const BYTES_PER_COLOR: usize = 3;

/// Indexed color table with a lazily built color to index lookup.
///
/// Colors are kept as packed RGB bytes. The lookup is invalidated by every
/// mutation through the palette's own methods, but not by writes through
/// [`Palette::data_mut`]; after such writes [`Palette::rebuild_color_index`]
/// must be called.
#[derive(Clone, Debug, Default)]
pub struct Palette {
    data: Vec<u8>,
    color_index: OnceCell<HashMap<RgbColor, usize>>,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Palette with `num_colors` black entries.
    pub fn with_colors(num_colors: usize) -> Self {
        let mut palette = Self::new();
        palette.create(num_colors);
        palette
    }

    pub fn create(&mut self, num_colors: usize) {
        self.data = vec![0; num_colors * BYTES_PER_COLOR];
        self.rebuild_color_index();
    }

    pub fn num_colors(&self) -> usize {
        self.data.len() / BYTES_PER_COLOR
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Appends a color and returns its index.
    pub fn add_color(&mut self, color: RgbColor) -> usize {
        let index = self.num_colors();
        self.data.extend_from_slice(&<[u8; 3]>::from(color));
        self.rebuild_color_index();
        index
    }

    /// Sets a color, growing the palette if `index` is past the end.
    pub fn set_color(&mut self, index: usize, color: RgbColor) {
        if index >= self.num_colors() {
            self.resize(index + 1);
        }
        let offset = index * BYTES_PER_COLOR;
        self.data[offset..offset + BYTES_PER_COLOR].copy_from_slice(&<[u8; 3]>::from(color));
        self.rebuild_color_index();
    }

    pub fn color(&self, index: usize) -> Option<RgbColor> {
        let offset = index * BYTES_PER_COLOR;
        self.data
            .get(offset..offset + BYTES_PER_COLOR)
            .map(|rgb| RgbColor::new(rgb[0], rgb[1], rgb[2]))
    }

    /// First index holding `color`.
    pub fn color_index(&self, color: RgbColor) -> Option<usize> {
        self.color_index
            .get_or_init(|| self.build_color_index())
            .get(&color)
            .copied()
    }

    pub fn resize(&mut self, num_colors: usize) {
        self.data.resize(num_colors * BYTES_PER_COLOR, 0);
        self.rebuild_color_index();
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.rebuild_color_index();
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Raw RGB bytes. Writing through this view leaves the color lookup stale.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Drops the color lookup so the next query rebuilds it.
    pub fn rebuild_color_index(&mut self) {
        self.color_index = OnceCell::new();
    }

    pub fn colors(&self) -> impl Iterator<Item = RgbColor> + '_ {
        self.data
            .chunks_exact(BYTES_PER_COLOR)
            .map(|rgb| RgbColor::new(rgb[0], rgb[1], rgb[2]))
    }

    fn build_color_index(&self) -> HashMap<RgbColor, usize> {
        let mut index = HashMap::with_capacity(self.num_colors());
        for (position, color) in self.colors().enumerate() {
            index.entry(color).or_insert(position);
        }
        index
    }
}

impl PartialEq for Palette {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl FromIterator<RgbColor> for Palette {
    fn from_iter<T: IntoIterator<Item = RgbColor>>(iter: T) -> Self {
        let data = iter
            .into_iter()
            .flat_map(<[u8; 3]>::from)
            .collect();
        Self {
            data,
            color_index: OnceCell::new(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_and_lookup_colors() {
        let mut palette = Palette::new();
        let red = RgbColor::new(255, 0, 0);
        let blue = RgbColor::new(0, 0, 255);
        assert_eq!(palette.add_color(red), 0);
        assert_eq!(palette.add_color(blue), 1);
        assert_eq!(palette.add_color(red), 2);
        assert_eq!(palette.num_colors(), 3);
        assert_eq!(palette.color(1), Some(blue));
        assert_eq!(palette.color(3), None);
        assert_eq!(palette.color_index(red), Some(0), "first match wins");
        assert_eq!(palette.color_index(RgbColor::gray(7)), None);
    }

    #[test]
    fn set_color_grows_and_refreshes_lookup() {
        let mut palette = Palette::with_colors(2);
        assert_eq!(palette.color_index(RgbColor::gray(0)), Some(0));
        palette.set_color(4, RgbColor::gray(9));
        assert_eq!(palette.num_colors(), 5);
        assert_eq!(palette.color_index(RgbColor::gray(9)), Some(4));
        palette.set_color(0, RgbColor::gray(1));
        assert_eq!(palette.color_index(RgbColor::gray(1)), Some(0));
        assert_eq!(palette.color_index(RgbColor::gray(0)), Some(1));
    }

    #[test]
    fn raw_writes_leave_lookup_stale_until_rebuilt() {
        let mut palette: Palette = [RgbColor::gray(10), RgbColor::gray(20)].into_iter().collect();
        assert_eq!(palette.color_index(RgbColor::gray(10)), Some(0));

        palette.data_mut()[0..3].copy_from_slice(&[30, 30, 30]);
        assert_eq!(palette.color(0), Some(RgbColor::gray(30)));
        assert_eq!(
            palette.color_index(RgbColor::gray(10)),
            Some(0),
            "lookup still reports the overwritten color"
        );
        assert_eq!(palette.color_index(RgbColor::gray(30)), None);

        palette.rebuild_color_index();
        assert_eq!(palette.color_index(RgbColor::gray(10)), None);
        assert_eq!(palette.color_index(RgbColor::gray(30)), Some(0));
    }

    #[test]
    fn clear_and_resize() {
        let mut palette = Palette::with_colors(4);
        palette.resize(2);
        assert_eq!(palette.num_colors(), 2);
        palette.clear();
        assert!(palette.is_empty());
    }
}
