//! Counter game with a persistent high score
//!
//! A counts up, START saves the best count to NV scratch, SELECT erases the
//! save. The running count sits mid-screen on the background; the high
//! score is a one-row HUD on the window plane.

use serde::Serialize;
use serde_json::Value;
use tile_core::audio::{Envelope, Tone, PULSE2};
use tile_core::input::Button;
use tile_core::logging::{log, LogCategory, LogLevel};
use tile_core::video::tile::{mono, TileBundle, TileData};
use tile_core::video::{Plane, VideoModel, VISIBLE_COLS, VISIBLE_ROWS};
use tile_core::{Game, Kernel, KernelError};

/// NV tag identifying a clicker save
pub const SAVE_MAGIC: u8 = 0x42;

pub const BLANK_TILE: u8 = 0;
/// Tile of digit 0; 1..9 follow
pub const DIGIT_BASE: u8 = 1;
pub const BAR_TILE: u8 = 11;

pub const DIGITS: u8 = 5;
pub const COUNT_X: u8 = 8;
pub const COUNT_Y: u8 = 8;
/// Window HUD row, in screen pixels from the top
pub const HUD_Y: u8 = 136;

static TILES: [TileData; 12] = [
    [0; 16],
    mono([0x3C, 0x66, 0x6E, 0x76, 0x66, 0x66, 0x3C, 0x00], 3),
    mono([0x18, 0x38, 0x18, 0x18, 0x18, 0x18, 0x7E, 0x00], 3),
    mono([0x3C, 0x66, 0x06, 0x0C, 0x30, 0x60, 0x7E, 0x00], 3),
    mono([0x3C, 0x66, 0x06, 0x1C, 0x06, 0x66, 0x3C, 0x00], 3),
    mono([0x0C, 0x1C, 0x3C, 0x6C, 0x7E, 0x0C, 0x0C, 0x00], 3),
    mono([0x7E, 0x60, 0x7C, 0x06, 0x06, 0x66, 0x3C, 0x00], 3),
    mono([0x3C, 0x66, 0x60, 0x7C, 0x66, 0x66, 0x3C, 0x00], 3),
    mono([0x7E, 0x06, 0x0C, 0x18, 0x30, 0x30, 0x30, 0x00], 3),
    mono([0x3C, 0x66, 0x66, 0x3C, 0x66, 0x66, 0x3C, 0x00], 3),
    mono([0x3C, 0x66, 0x66, 0x3E, 0x06, 0x66, 0x3C, 0x00], 3),
    mono([0x00, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0x00], 1),
];

/// Tiles for `value` as five zero-padded digits.
pub fn digit_tiles(value: u16) -> [u8; DIGITS as usize] {
    let mut out = [DIGIT_BASE; DIGITS as usize];
    let mut v = value;
    for slot in out.iter_mut().rev() {
        *slot = DIGIT_BASE + (v % 10) as u8;
        v /= 10;
    }
    out
}

#[derive(Debug, Clone, Copy, Default)]
struct Controls {
    count: bool,
    save: bool,
    erase: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Clicker {
    count: u16,
    high: u16,
    /// A save was found at init
    restored: bool,
    #[serde(skip)]
    controls: Controls,
    #[serde(skip)]
    count_dirty: bool,
    #[serde(skip)]
    high_dirty: bool,
}

impl Clicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    pub fn high_score(&self) -> u16 {
        self.high
    }

    fn save(&self, kernel: &mut Kernel) {
        kernel.nv().store(&self.high.to_le_bytes());
        log(LogCategory::Game, LogLevel::Info, || {
            format!("high score {} saved", self.high)
        });
    }

    fn draw_number(video: &mut VideoModel, plane: Plane, x: u8, y: u8, value: u16) {
        let tiles = digit_tiles(value);
        match plane {
            Plane::Background => video.set_bg_region(x, y, DIGITS, 1, &tiles),
            Plane::Window => video.set_win_region(x, y, DIGITS, 1, &tiles),
        }
    }
}

impl Game for Clicker {
    fn name(&self) -> &'static str {
        "clicker"
    }

    fn init(&mut self, kernel: &mut Kernel) -> Result<(), KernelError> {
        kernel.load_tiles(&TileBundle::new(0, &TILES))?;

        let nv = kernel.nv();
        nv.set_magic(SAVE_MAGIC);
        if let Some(&[lo, hi]) = nv.load().and_then(|p| p.get(..2)) {
            self.high = u16::from_le_bytes([lo, hi]);
            self.restored = true;
        }

        let video = kernel.video();
        video.fill(Plane::Background, 0, 0, VISIBLE_COLS, VISIBLE_ROWS, BLANK_TILE);
        video.fill(Plane::Background, COUNT_X - 1, COUNT_Y + 1, DIGITS + 2, 1, BAR_TILE);
        video.fill(Plane::Window, 0, 0, VISIBLE_COLS, 1, BLANK_TILE);
        video.place_window(0, HUD_Y);
        video.show_window(true);
        self.count_dirty = true;
        self.high_dirty = true;
        Ok(())
    }

    fn handle_input(&mut self, kernel: &mut Kernel) {
        kernel.poll();
        let input = kernel.input();
        self.controls = Controls {
            count: input.pressed(Button::A),
            save: input.pressed(Button::Start),
            erase: input.pressed(Button::Select),
        };
    }

    fn update(&mut self, kernel: &mut Kernel) {
        if self.controls.count {
            self.count = self.count.saturating_add(1);
            self.count_dirty = true;
            if self.count > self.high {
                self.high = self.count;
                self.high_dirty = true;
            }
            kernel.audio().play_tone(
                PULSE2,
                0x7C1,
                Tone::Pulse { duty: 1 },
                Envelope::new(10, false, 1),
            );
        }
        if self.controls.save {
            self.save(kernel);
        }
        if self.controls.erase {
            kernel.nv().clear();
            self.high = 0;
            self.high_dirty = true;
            log(LogCategory::Game, LogLevel::Info, || "save erased".to_string());
        }
    }

    fn render(&mut self, kernel: &mut Kernel) {
        let video = kernel.video();
        if self.count_dirty {
            self.count_dirty = false;
            Self::draw_number(video, Plane::Background, COUNT_X, COUNT_Y, self.count);
        }
        if self.high_dirty {
            self.high_dirty = false;
            Self::draw_number(video, Plane::Window, VISIBLE_COLS - DIGITS - 1, 0, self.high);
        }
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
