//! Grid and collision primitives
//!
//! Pixel coordinates are signed 16-bit. A [`TileMap`] mirrors the 32x32
//! background the game drew, plus the scroll pair, so a pixel maps to a cell
//! the same way the display does: `((sx + px) & 255, (sy + py) & 255) / 8`.

use serde::{Deserialize, Serialize};

pub const TILE_SIZE: i16 = 8;
const MAP_CELLS: usize = 32;

/// Axis-aligned rectangle in pixels. `w` and `h` are positive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i16,
    pub y: i16,
    pub w: i16,
    pub h: i16,
}

impl Rect {
    pub const fn new(x: i16, y: i16, w: i16, h: i16) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> i16 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i16 {
        self.y + self.h
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        rect_overlap(self, other)
    }

    pub fn offset(&self, dx: i16, dy: i16) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.w, self.h)
    }
}

/// Standard AABB test; touching edges do not overlap.
pub fn rect_overlap(a: &Rect, b: &Rect) -> bool {
    a.x < b.right() && b.x < a.right() && a.y < b.bottom() && b.y < a.bottom()
}

/// Pixel to tile coordinate on the 256-pixel torus.
pub fn pixel_to_tile(px: i16) -> u8 {
    ((px as i32).rem_euclid(256) / TILE_SIZE as i32) as u8
}

/// Top-left pixel of a tile coordinate.
pub fn tile_to_pixel(tile: u8) -> i16 {
    tile as i16 * TILE_SIZE
}

/// For each tile index, whether it blocks movement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolidSet {
    bits: [u64; 4],
}

impl SolidSet {
    pub const fn empty() -> Self {
        Self { bits: [0; 4] }
    }

    pub fn from_tiles(tiles: &[u8]) -> Self {
        let mut set = Self::empty();
        for &t in tiles {
            set.insert(t);
        }
        set
    }

    pub fn insert(&mut self, tile: u8) {
        self.bits[(tile >> 6) as usize] |= 1 << (tile & 63);
    }

    pub fn contains(&self, tile: u8) -> bool {
        self.bits[(tile >> 6) as usize] & (1 << (tile & 63)) != 0
    }
}

/// Outcome of a swept move along one axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sweep {
    /// Signed distance actually covered
    pub moved: i16,
    /// A solid tile cut the move short
    pub blocked: bool,
}

/// Static collision map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileMap {
    cells: Vec<u8>,
    solids: SolidSet,
    scroll_x: u8,
    scroll_y: u8,
}

impl TileMap {
    pub fn new(solids: SolidSet) -> Self {
        Self {
            cells: vec![0; MAP_CELLS * MAP_CELLS],
            solids,
            scroll_x: 0,
            scroll_y: 0,
        }
    }

    /// Map from row-major rows of tile indices (missing cells are 0).
    pub fn from_rows(rows: &[&[u8]], solids: SolidSet) -> Self {
        let mut map = Self::new(solids);
        for (y, row) in rows.iter().enumerate().take(MAP_CELLS) {
            for (x, &tile) in row.iter().enumerate().take(MAP_CELLS) {
                map.set(x as u8, y as u8, tile);
            }
        }
        map
    }

    pub fn set(&mut self, x: u8, y: u8, tile: u8) {
        self.cells[cell_index(x, y)] = tile;
    }

    pub fn get(&self, x: u8, y: u8) -> u8 {
        self.cells[cell_index(x, y)]
    }

    pub fn set_scroll(&mut self, sx: u8, sy: u8) {
        self.scroll_x = sx;
        self.scroll_y = sy;
    }

    pub fn solids(&self) -> &SolidSet {
        &self.solids
    }

    pub fn tile_at(&self, x_px: i16, y_px: i16) -> u8 {
        let x = (self.scroll_x as i16).wrapping_add(x_px);
        let y = (self.scroll_y as i16).wrapping_add(y_px);
        self.get(pixel_to_tile(x), pixel_to_tile(y))
    }

    pub fn solid_at(&self, x_px: i16, y_px: i16) -> bool {
        self.solids.contains(self.tile_at(x_px, y_px))
    }

    /// Any solid pixel on the vertical segment x, y0..y1 (exclusive)?
    fn column_blocked(&self, x: i16, y0: i16, y1: i16) -> bool {
        probe_points(y0, y1).any(|y| self.solid_at(x, y))
    }

    fn row_blocked(&self, y: i16, x0: i16, x1: i16) -> bool {
        probe_points(x0, x1).any(|x| self.solid_at(x, y))
    }

    /// Move `rect` by up to `dx` pixels, one pixel at a time, stopping flush
    /// against the first solid tile the leading edge would enter.
    pub fn sweep_horizontal(&self, rect: &Rect, dx: i16) -> Sweep {
        let dir = dx.signum();
        let mut moved = 0;
        while moved != dx {
            let next = moved + dir;
            let edge = if dir > 0 {
                rect.right() - 1 + next
            } else {
                rect.x + next
            };
            if self.column_blocked(edge, rect.y, rect.bottom()) {
                return Sweep {
                    moved,
                    blocked: true,
                };
            }
            moved = next;
        }
        Sweep {
            moved,
            blocked: false,
        }
    }

    pub fn sweep_vertical(&self, rect: &Rect, dy: i16) -> Sweep {
        let dir = dy.signum();
        let mut moved = 0;
        while moved != dy {
            let next = moved + dir;
            let edge = if dir > 0 {
                rect.bottom() - 1 + next
            } else {
                rect.y + next
            };
            if self.row_blocked(edge, rect.x, rect.right()) {
                return Sweep {
                    moved,
                    blocked: true,
                };
            }
            moved = next;
        }
        Sweep {
            moved,
            blocked: false,
        }
    }
}

fn cell_index(x: u8, y: u8) -> usize {
    (y as usize % MAP_CELLS) * MAP_CELLS + (x as usize % MAP_CELLS)
}

/// One probe per tile the span touches, plus its last pixel.
fn probe_points(start: i16, end: i16) -> impl Iterator<Item = i16> {
    let last = end - 1;
    (start..end)
        .step_by(TILE_SIZE as usize)
        .chain(std::iter::once(last))
        .filter(move |&p| p <= last)
}

/// A moving rectangle with velocity and ground contact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    pub rect: Rect,
    pub vx: i16,
    pub vy: i16,
    pub on_ground: bool,
}

impl Body {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            ..Self::default()
        }
    }

    /// Accelerate downward, capped at `terminal`.
    pub fn apply_gravity(&mut self, gravity: i16, terminal: i16) {
        self.vy = (self.vy + gravity).min(terminal);
    }

    /// Leave the ground with an upward velocity.
    pub fn launch(&mut self, vy: i16) {
        self.vy = vy;
        self.on_ground = false;
    }

    /// Sweep x then y. A truncated axis ends flush and loses its velocity; a
    /// truncated downward move lands the body, a downward move of nonzero
    /// distance takes it off the ground.
    pub fn step(&mut self, map: &TileMap) -> (Sweep, Sweep) {
        let h = map.sweep_horizontal(&self.rect, self.vx);
        self.rect.x += h.moved;
        if h.blocked {
            self.vx = 0;
        }

        let falling = self.vy > 0;
        let v = map.sweep_vertical(&self.rect, self.vy);
        self.rect.y += v.moved;
        if falling && v.moved > 0 && !v.blocked {
            self.on_ground = false;
        }
        if v.blocked {
            if falling {
                self.on_ground = true;
            }
            self.vy = 0;
        }
        (h, v)
    }
}
