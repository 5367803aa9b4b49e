//! Reel symbols and the 5x3 spin grid

use serde::{Deserialize, Serialize};

pub const GRID_COLUMNS: usize = 5;
pub const GRID_ROWS: usize = 3;

/// A symbol that can land on a reel cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbol {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    /// Matches any color when counting runs
    Wild,
    /// Scatter symbol; three or more anywhere trigger the bonus hit
    Bonus,
}

impl Symbol {
    pub const COLORS: [Symbol; 5] = [
        Symbol::Red,
        Symbol::Blue,
        Symbol::Green,
        Symbol::Yellow,
        Symbol::Purple,
    ];

    /// Whether this cell extends a run of `color`
    pub fn matches(self, color: Symbol) -> bool {
        self == color || self == Symbol::Wild
    }
}

pub type Row = [Symbol; GRID_COLUMNS];

/// Result of one spin: three rows of five cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid(pub [Row; GRID_ROWS]);

impl Grid {
    pub fn rows(&self) -> &[Row; GRID_ROWS] {
        &self.0
    }

    pub fn count(&self, symbol: Symbol) -> usize {
        self.0
            .iter()
            .flat_map(|row| row.iter())
            .filter(|cell| **cell == symbol)
            .count()
    }
}
