use rand::Rng;

use crate::constants::{DECOY_SYMBOLS, TARGET_SYMBOL};

/// Cells revealed for one round. Exactly one cell holds the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: Vec<&'static str>,
    target_index: usize,
}

impl Grid {
    /// Places the target uniformly and fills every other cell with a decoy
    /// drawn independently (with replacement). A size of 0 is treated as 1.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, size: usize) -> Self {
        let size = size.max(1);
        let target_index = rng.random_range(0..size);
        let cells = (0..size)
            .map(|index| {
                if index == target_index {
                    TARGET_SYMBOL
                } else {
                    DECOY_SYMBOLS[rng.random_range(0..DECOY_SYMBOLS.len())]
                }
            })
            .collect();

        Self {
            cells,
            target_index,
        }
    }

    pub fn cells(&self) -> &[&'static str] {
        &self.cells
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'static str> {
        self.cells.get(index).copied()
    }

    pub fn is_target(&self, index: usize) -> bool {
        self.get(index) == Some(TARGET_SYMBOL)
    }
}
