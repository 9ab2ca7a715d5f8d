//! Playfield occupancy grid

use crate::pieces::Piece;
use serde::{Deserialize, Serialize};

pub const GRID_WIDTH: usize = 10;
pub const GRID_HEIGHT: usize = 18;

/// 10 x 18 cells, row 0 at the top. Non-zero means filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    rows: Vec<[u8; GRID_WIDTH]>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            rows: vec![[0; GRID_WIDTH]; GRID_HEIGHT],
        }
    }

    pub fn filled(&self, x: usize, y: usize) -> bool {
        self.rows
            .get(y)
            .and_then(|row| row.get(x))
            .is_some_and(|&c| c != 0)
    }

    pub fn set(&mut self, x: usize, y: usize, filled: bool) {
        if let Some(cell) = self.rows.get_mut(y).and_then(|row| row.get_mut(x)) {
            *cell = filled as u8;
        }
    }

    pub fn count(&self) -> usize {
        self.rows.iter().flatten().filter(|&&c| c != 0).count()
    }

    pub fn clear(&mut self) {
        for row in &mut self.rows {
            *row = [0; GRID_WIDTH];
        }
    }

    /// Every occupied cell lies within the side walls and below the floor
    /// limit, and is either above the top (y < 0) or on an empty cell.
    pub fn can_place(&self, piece: &Piece) -> bool {
        piece.cells().all(|(gx, gy)| {
            if gx < 0 || gx as usize >= GRID_WIDTH || gy as isize >= GRID_HEIGHT as isize {
                return false;
            }
            gy < 0 || !self.filled(gx as usize, gy as usize)
        })
    }

    /// Copy the piece's on-grid cells into the board.
    pub fn lock(&mut self, piece: &Piece) {
        for (gx, gy) in piece.cells() {
            if gx >= 0 && gy >= 0 {
                self.set(gx as usize, gy as usize, true);
            }
        }
    }

    /// Remove full rows, shifting everything above down. Returns how many.
    pub fn clear_lines(&mut self) -> u8 {
        let before = self.rows.len();
        self.rows.retain(|row| row.iter().any(|&c| c == 0));
        let cleared = before - self.rows.len();
        for _ in 0..cleared {
            self.rows.insert(0, [0; GRID_WIDTH]);
        }
        cleared as u8
    }
}
