//! Core data types flowing through the fill pipeline.
//!
//! K_i: A cell is addressed by its absolute position in the table file.
//! Row 0 is the header, so the first data row is row 1. Column 0 holds
//! the term, so the first section column is column 1.

use std::fmt;
use std::str::FromStr;

/// Address of one cell in the table, and the checkpoint key for it.
///
/// The string form is `"{row}-{col}"`, which is exactly how the key is
/// stored in the checkpoint file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    /// Absolute row index (header = 0, first data row = 1)
    pub row: usize,
    /// Column index (term column = 0, first section = 1)
    pub col: usize,
}

impl CellKey {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.row, self.col)
    }
}

impl FromStr for CellKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (row, col) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid cell key: {s}"))?;
        let row = row.parse().map_err(|_| format!("invalid row in key: {s}"))?;
        let col = col.parse().map_err(|_| format!("invalid col in key: {s}"))?;
        Ok(Self { row, col })
    }
}

/// One empty cell eligible for generation.
#[derive(Debug, Clone)]
pub struct Task {
    /// Cell position and checkpoint key
    pub key: CellKey,
    /// Entity name from column 0 of the cell's row
    pub term: String,
    /// Section name from the header of the cell's column
    pub section: String,
}

/// Traversal direction for task discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Natural table order (default)
    #[default]
    TopDown,
    /// Reversed table order
    BottomUp,
}

/// Terminal result of generating one cell.
///
/// B_i(generation succeeds) is resolved here; a `Failed` outcome is a
/// value, not an error, so a bad cell can never abort its batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Validated content from one of the models
    Generated { content: String, model: String },
    /// All attempts exhausted; the cell stays empty and is never checkpointed
    Failed,
}

/// Summary of one fill pass.
#[derive(Debug, Clone, Default)]
pub struct FillStats {
    /// Eligible cells discovered at startup
    pub total_tasks: usize,
    /// Cells filled and checkpointed this run
    pub filled: usize,
    /// Cells whose every attempt failed
    pub failed: usize,
    /// Batches committed
    pub batches: usize,
    /// Wall-clock runtime
    pub runtime_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_key_roundtrip() {
        let key = CellKey::new(12, 3);
        assert_eq!(key.to_string(), "12-3");
        assert_eq!("12-3".parse::<CellKey>().unwrap(), key);
    }

    #[test]
    fn test_cell_key_rejects_garbage() {
        assert!("12".parse::<CellKey>().is_err());
        assert!("a-b".parse::<CellKey>().is_err());
        assert!("".parse::<CellKey>().is_err());
    }
}
