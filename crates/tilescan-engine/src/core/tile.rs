use std::fmt;

use serde::{Deserialize, Serialize};

use crate::InvalidTileValue;

/// Value held by a single board cell.
///
/// Either `0` (empty) or `2^k` for `1 <= k <= 17`, i.e. `2..=131072`.
/// The exponent is stored instead of the value so the type stays small
/// and ordering matches numeric ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub struct TileValue {
    exponent: u8,
}

impl TileValue {
    /// Largest supported exponent (`2^17 = 131072`).
    pub const MAX_EXPONENT: u8 = 17;

    /// The empty cell.
    pub const EMPTY: Self = Self { exponent: 0 };

    /// Largest tile value supported by the board model.
    pub const MAX: Self = Self {
        exponent: Self::MAX_EXPONENT,
    };

    /// Creates a tile value from its numeric value.
    pub fn new(value: u32) -> Result<Self, InvalidTileValue> {
        if value == 0 {
            return Ok(Self::EMPTY);
        }
        if !value.is_power_of_two() || value == 1 {
            return Err(InvalidTileValue { value });
        }
        let exponent =
            u8::try_from(value.trailing_zeros()).map_err(|_| InvalidTileValue { value })?;
        Self::from_exponent(exponent).ok_or(InvalidTileValue { value })
    }

    /// Creates a tile value from its exponent (`0` is empty).
    #[must_use]
    pub const fn from_exponent(exponent: u8) -> Option<Self> {
        if exponent > Self::MAX_EXPONENT {
            return None;
        }
        Some(Self { exponent })
    }

    #[must_use]
    pub const fn exponent(self) -> u8 {
        self.exponent
    }

    /// Returns the numeric value (`0` for empty).
    #[must_use]
    pub const fn value(self) -> u32 {
        if self.exponent == 0 {
            0
        } else {
            1 << self.exponent
        }
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.exponent == 0
    }

    /// Returns the tile formed by merging two tiles of this value.
    ///
    /// Returns `None` for empty tiles and for [`TileValue::MAX`].
    #[must_use]
    pub const fn merged(self) -> Option<Self> {
        if self.exponent == 0 {
            return None;
        }
        Self::from_exponent(self.exponent + 1)
    }

    /// Iterates over every representable value, empty first.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..=Self::MAX_EXPONENT).map(|exponent| Self { exponent })
    }
}

impl TryFrom<u32> for TileValue {
    type Error = InvalidTileValue;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TileValue> for u32 {
    fn from(tile: TileValue) -> Self {
        tile.value()
    }
}

impl fmt::Display for TileValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accepts_powers_of_two() {
        for exponent in 1..=TileValue::MAX_EXPONENT {
            let value = 1_u32 << exponent;
            let tile = TileValue::new(value).unwrap();
            assert_eq!(tile.value(), value);
            assert_eq!(tile.exponent(), exponent);
        }
        assert!(TileValue::new(0).unwrap().is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_values() {
        for value in [1, 3, 6, 100, 262_144, u32::MAX] {
            assert_eq!(
                TileValue::new(value),
                Err(InvalidTileValue { value }),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn test_merged() {
        assert_eq!(TileValue::new(2).unwrap().merged(), TileValue::new(4).ok());
        assert_eq!(TileValue::EMPTY.merged(), None);
        assert_eq!(TileValue::MAX.merged(), None);
    }

    #[test]
    fn test_all_is_ordered_and_complete() {
        let all: Vec<_> = TileValue::all().collect();
        assert_eq!(all.len(), 18);
        assert!(all.is_sorted());
        assert_eq!(all[0], TileValue::EMPTY);
        assert_eq!(all[17].value(), 131_072);
    }

    #[test]
    fn test_serde_as_number() {
        let tile = TileValue::new(64).unwrap();
        assert_eq!(serde_json::to_string(&tile).unwrap(), "64");
        assert_eq!(serde_json::from_str::<TileValue>("64").unwrap(), tile);
        assert!(serde_json::from_str::<TileValue>("63").is_err());
    }
}
