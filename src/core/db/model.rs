use std::cmp::Ordering;

use serde::Serialize;

/// Marker position in percent of the rendered image box, `0.0..=100.0` on both axes.
///
/// Only constructible through [`Position::new`], so every value is in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    x: f64,
    y: f64,
}

impl Position {
    /// Where a marker without a stored position is drawn.
    pub const CENTER: Position = Position { x: 50.0, y: 50.0 };

    /// Builds a position, clamping both coordinates into `0..=100`.
    /// Non-finite input falls back to the centre.
    pub fn new(x: f64, y: f64) -> Self {
        let clamp = |v: f64, fallback: f64| {
            if v.is_finite() {
                v.clamp(0.0, 100.0)
            } else {
                fallback
            }
        };
        Position {
            x: clamp(x, Self::CENTER.x),
            y: clamp(y, Self::CENTER.y),
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub(super) fn from_columns(x: Option<f64>, y: Option<f64>) -> Option<Self> {
        match (x, y) {
            (Some(x), Some(y)) => Some(Position::new(x, y)),
            _ => None,
        }
    }

    pub(super) fn into_columns(position: Option<Position>) -> (Option<f64>, Option<f64>) {
        match position {
            Some(p) => (Some(p.x), Some(p.y)),
            None => (None, None),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::CENTER
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };

    pub const fn from_hex(value: u32) -> Self {
        Color {
            r: ((value >> 16) & 0xFF) as u8,
            g: ((value >> 8) & 0xFF) as u8,
            b: (value & 0xFF) as u8,
        }
    }
}

impl From<Color> for image::Rgba<u8> {
    fn from(color: Color) -> Self {
        image::Rgba([color.r, color.g, color.b, 255])
    }
}

/// Records that carry a manual sort key.
pub trait Sequenced {
    fn sequence(&self) -> Option<i64>;
    fn id(&self) -> i64;
}

/// Total order over sequenced records: present keys ascending, absent keys
/// after every present one, ties broken by ascending id.
pub fn compare_sequence<T: Sequenced>(a: &T, b: &T) -> Ordering {
    let by_key = match (a.sequence(), b.sequence()) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_key.then_with(|| a.id().cmp(&b.id()))
}

pub fn sort_by_sequence<T: Sequenced>(items: &mut [T]) {
    items.sort_by(compare_sequence);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item(i64, Option<i64>);

    impl Sequenced for Item {
        fn sequence(&self) -> Option<i64> {
            self.1
        }
        fn id(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn absent_keys_sort_last_and_ties_use_id() {
        let mut items = vec![
            Item(1, None),
            Item(2, Some(3)),
            Item(3, Some(0)),
            Item(4, None),
            Item(5, Some(3)),
            Item(6, Some(-1)),
        ];
        sort_by_sequence(&mut items);
        let ids: Vec<i64> = items.iter().map(|i| i.0).collect();
        assert_eq!(ids, vec![6, 3, 2, 5, 1, 4]);
    }

    #[test]
    fn position_is_clamped() {
        let clamped = Position::new(-4.0, 120.0);
        assert_eq!((clamped.x(), clamped.y()), (0.0, 100.0));
        let fallback = Position::new(f64::NAN, 12.5);
        assert_eq!((fallback.x(), fallback.y()), (50.0, 12.5));
    }

    #[test]
    fn stored_columns_are_clamped_on_read() {
        let position = Position::from_columns(Some(500.0), Some(-20.0));
        assert_eq!(position, Some(Position::new(100.0, 0.0)));
        assert_eq!(Position::from_columns(Some(10.0), None), None);
    }

    #[test]
    fn color_from_hex() {
        assert_eq!(
            Color::from_hex(0x1976d2),
            Color {
                r: 0x19,
                g: 0x76,
                b: 0xd2
            }
        );
    }
}
