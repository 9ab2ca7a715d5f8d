//! Tetromino shapes
//!
//! Each shape has four rotations, each a 4x4 occupancy box indexed
//! `[row][col]`. Rotation `r + 1` is `r` turned clockwise.

use serde::{Deserialize, Serialize};

pub const SHAPE_COUNT: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    I,
    O,
    T,
    S,
    Z,
    L,
    J,
}

impl Shape {
    pub const ALL: [Shape; 7] = [
        Shape::I,
        Shape::O,
        Shape::T,
        Shape::S,
        Shape::Z,
        Shape::L,
        Shape::J,
    ];

    /// Shape for an index; wraps modulo 7.
    pub fn from_index(i: u16) -> Shape {
        Self::ALL[(i % SHAPE_COUNT as u16) as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn box_at(self, rotation: u8) -> &'static Footprint {
        &PIECES[self.index()][(rotation & 3) as usize]
    }
}

pub type Footprint = [[u8; 4]; 4];

/// A shape at a rotation and a grid position (top-left of its 4x4 box).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub shape: Shape,
    pub rotation: u8,
    pub x: i8,
    pub y: i8,
}

impl Piece {
    pub fn new(shape: Shape, x: i8, y: i8) -> Self {
        Self {
            shape,
            rotation: 0,
            x,
            y,
        }
    }

    pub fn moved(self, dx: i8, dy: i8) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    pub fn rotated(self) -> Self {
        Self {
            rotation: (self.rotation + 1) & 3,
            ..self
        }
    }

    /// Grid coordinates of the occupied cells.
    pub fn cells(&self) -> impl Iterator<Item = (i8, i8)> + '_ {
        let footprint = self.shape.box_at(self.rotation);
        (0..4i8).flat_map(move |row| {
            (0..4i8).filter_map(move |col| {
                (footprint[row as usize][col as usize] != 0).then_some((self.x + col, self.y + row))
            })
        })
    }

    /// Whether grid cell (gx, gy) is part of this piece.
    pub fn covers(&self, gx: i8, gy: i8) -> bool {
        let (lx, ly) = (gx - self.x, gy - self.y);
        (0..4).contains(&lx)
            && (0..4).contains(&ly)
            && self.shape.box_at(self.rotation)[ly as usize][lx as usize] != 0
    }
}

const PIECES: [[Footprint; 4]; 7] = [
    // I
    [
        [[0, 0, 0, 0], [1, 1, 1, 1], [0, 0, 0, 0], [0, 0, 0, 0]],
        [[0, 0, 1, 0], [0, 0, 1, 0], [0, 0, 1, 0], [0, 0, 1, 0]],
        [[0, 0, 0, 0], [0, 0, 0, 0], [1, 1, 1, 1], [0, 0, 0, 0]],
        [[0, 1, 0, 0], [0, 1, 0, 0], [0, 1, 0, 0], [0, 1, 0, 0]],
    ],
    // O
    [
        [[0, 0, 0, 0], [0, 1, 1, 0], [0, 1, 1, 0], [0, 0, 0, 0]],
        [[0, 0, 0, 0], [0, 1, 1, 0], [0, 1, 1, 0], [0, 0, 0, 0]],
        [[0, 0, 0, 0], [0, 1, 1, 0], [0, 1, 1, 0], [0, 0, 0, 0]],
        [[0, 0, 0, 0], [0, 1, 1, 0], [0, 1, 1, 0], [0, 0, 0, 0]],
    ],
    // T
    [
        [[0, 0, 0, 0], [1, 1, 1, 0], [0, 1, 0, 0], [0, 0, 0, 0]],
        [[0, 1, 0, 0], [1, 1, 0, 0], [0, 1, 0, 0], [0, 0, 0, 0]],
        [[0, 1, 0, 0], [1, 1, 1, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
        [[0, 1, 0, 0], [0, 1, 1, 0], [0, 1, 0, 0], [0, 0, 0, 0]],
    ],
    // S
    [
        [[0, 0, 0, 0], [0, 1, 1, 0], [1, 1, 0, 0], [0, 0, 0, 0]],
        [[0, 1, 0, 0], [0, 1, 1, 0], [0, 0, 1, 0], [0, 0, 0, 0]],
        [[0, 0, 0, 0], [0, 1, 1, 0], [1, 1, 0, 0], [0, 0, 0, 0]],
        [[0, 1, 0, 0], [0, 1, 1, 0], [0, 0, 1, 0], [0, 0, 0, 0]],
    ],
    // Z
    [
        [[0, 0, 0, 0], [1, 1, 0, 0], [0, 1, 1, 0], [0, 0, 0, 0]],
        [[0, 0, 1, 0], [0, 1, 1, 0], [0, 1, 0, 0], [0, 0, 0, 0]],
        [[0, 0, 0, 0], [1, 1, 0, 0], [0, 1, 1, 0], [0, 0, 0, 0]],
        [[0, 0, 1, 0], [0, 1, 1, 0], [0, 1, 0, 0], [0, 0, 0, 0]],
    ],
    // L
    [
        [[0, 0, 0, 0], [1, 1, 1, 0], [1, 0, 0, 0], [0, 0, 0, 0]],
        [[1, 1, 0, 0], [0, 1, 0, 0], [0, 1, 0, 0], [0, 0, 0, 0]],
        [[0, 0, 1, 0], [1, 1, 1, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
        [[0, 1, 0, 0], [0, 1, 0, 0], [0, 1, 1, 0], [0, 0, 0, 0]],
    ],
    // J
    [
        [[0, 0, 0, 0], [1, 1, 1, 0], [0, 0, 1, 0], [0, 0, 0, 0]],
        [[0, 1, 0, 0], [0, 1, 0, 0], [1, 1, 0, 0], [0, 0, 0, 0]],
        [[1, 0, 0, 0], [1, 1, 1, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
        [[0, 1, 1, 0], [0, 1, 0, 0], [0, 1, 0, 0], [0, 0, 0, 0]],
    ],
];
