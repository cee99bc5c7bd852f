//! Coordinate registry
//!
//! The ordered table of points fetched on every run. The built-in table covers
//! the Jæren coastline south of Stavanger; a `[[coordinates]]` table in the
//! configuration file replaces it wholesale.

use std::collections::HashSet;

use crate::error::IngestError;
use crate::models::Coordinate;

/// Built-in points as `(name, latitude, longitude)`, in fetch order
const DEFAULT_POINTS: [(&str, f64, f64); 9] = [
    ("Sande", 59.020_500_039_403_09, 5.592_325_942_611_728),
    ("Sola", 58.885_313_613_518_94, 5.602_662_428_854_268),
    ("Hellesto", 58.842_275_389_977_73, 5.560_516_132_410_946),
    ("Sele", 58.812_318_522_225_33, 5.546_945_324_943_648),
    ("Bore", 58.801_231_951_182_68, 5.548_094_133_609_664_5),
    ("Orre", 58.740_441_600_947_264, 5.512_925_570_900_187),
    ("X", 58.722_027, 5.521_960),
    ("Refsnes", 58.687_568_905_515_74, 5.551_150_818_355_702),
    ("Brusand", 58.537_976_480_022_99, 5.730_672_797_723_366),
];

/// Built-in coordinate table
#[must_use]
pub fn default_coordinates() -> Vec<Coordinate> {
    DEFAULT_POINTS
        .iter()
        .map(|(name, lat, lon)| Coordinate::new(*name, *lat, *lon))
        .collect()
}

/// Immutable, validated list of coordinates
#[derive(Debug, Clone)]
pub struct CoordinateRegistry {
    coordinates: Vec<Coordinate>,
}

impl CoordinateRegistry {
    /// Build a registry, rejecting empty tables, blank or duplicate names and out-of-range points
    pub fn new(coordinates: Vec<Coordinate>) -> crate::Result<Self> {
        if coordinates.is_empty() {
            return Err(IngestError::config("Coordinate registry cannot be empty"));
        }

        let mut seen = HashSet::new();
        for coordinate in &coordinates {
            if coordinate.name.trim().is_empty() {
                return Err(IngestError::config("Coordinate names cannot be empty"));
            }
            if !seen.insert(coordinate.name.as_str()) {
                return Err(IngestError::config(format!(
                    "Duplicate coordinate name '{}'",
                    coordinate.name
                )));
            }
            if !coordinate.is_within_bounds() {
                return Err(IngestError::config(format!(
                    "Coordinate '{}' is out of range ({})",
                    coordinate.name,
                    coordinate.format_coordinates()
                )));
            }
        }

        Ok(Self { coordinates })
    }

    #[must_use]
    pub fn builtin() -> Self {
        Self {
            coordinates: default_coordinates(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coordinate> {
        self.coordinates.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Coordinate] {
        &self.coordinates
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}
