//! Tile video model
//!
//! Games never touch display memory. They describe changes to the
//! background map, the overlay window, the 40-entry sprite table, the scroll
//! pair and the palettes, and the model queues those changes. The scheduler
//! commits the queue to the [`VideoHost`] inside the vblank window only.
//!
//! # Commit rules
//!
//! - Writes apply in enqueue order.
//! - At most `budget` writes apply per vblank; the rest wait for the next
//!   vblank in their original order. Nothing is ever dropped.
//! - Tile images may only be loaded while the display is off.
//!
//! # Coordinates
//!
//! - Map cells are masked to the 32x32 torus.
//! - Sprite positions carry the hardware offsets: a sprite at (8, 16) has its
//!   top-left corner at screen (0, 0). A sprite whose y is 0 or >= 160 is not
//!   displayed.
//! - The window position follows a +7 X convention: `wx = 7` places the
//!   window's left edge at screen x = 0 (see [`WINDOW_X_OFFSET`]).

pub mod tile;

use crate::logging::{log, LogCategory, LogLevel};
use crate::types::Frame;
use crate::KernelError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tile::TileData;

/// Width and height of each map plane, in tiles
pub const MAP_SIZE: u8 = 32;
/// Visible background window, in tiles
pub const VISIBLE_COLS: u8 = 20;
pub const VISIBLE_ROWS: u8 = 18;
/// Number of sprite table entries
pub const SPRITE_COUNT: usize = 40;
/// Display offsets baked into sprite coordinates
pub const SPRITE_OFFSET_X: u8 = 8;
pub const SPRITE_OFFSET_Y: u8 = 16;
/// Window X register value that maps to screen x = 0
pub const WINDOW_X_OFFSET: u8 = 7;
/// Visible scanlines per frame
pub const VISIBLE_LINES: u8 = 144;
/// Default number of queued writes committed per vblank
pub const DEFAULT_VBLANK_BUDGET: usize = 512;

/// Sprite attribute bits
pub mod attr {
    /// Use object palette 1 instead of 0
    pub const PALETTE1: u8 = 0x10;
    pub const X_FLIP: u8 = 0x20;
    pub const Y_FLIP: u8 = 0x40;
    /// Drawn behind background colors 1-3
    pub const BEHIND_BG: u8 = 0x80;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plane {
    Background,
    Window,
}

/// 8-bit display registers exposed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    ScrollX,
    ScrollY,
    WindowX,
    WindowY,
    ScanlineCompare,
    BgPalette,
    ObjPalette0,
    ObjPalette1,
}

/// Display hardware as seen by the kernel.
pub trait VideoHost {
    fn write_tile(&mut self, index: u8, data: &TileData);
    fn write_map(&mut self, plane: Plane, x: u8, y: u8, tile: u8);
    /// One 4-byte sprite memory entry: y, x, tile, attributes
    fn write_sprite(&mut self, id: u8, entry: [u8; 4]);
    fn write_register(&mut self, reg: Register, val: u8);
    fn read_register(&self, reg: Register) -> u8;
    fn set_window_visible(&mut self, visible: bool);
    fn set_display(&mut self, on: bool);

    /// The raster is about to output `line`.
    fn draw_line(&mut self, _line: u8) {}
    /// All visible lines of the frame are out.
    fn end_frame(&mut self) {}

    /// Copy of the last rendered picture, for hosts that produce one.
    fn frame(&self) -> Option<Frame> {
        None
    }
}

/// Host that discards everything; registers read back as written.
#[derive(Debug, Default)]
pub struct NullVideo {
    regs: [u8; 8],
}

fn register_slot(reg: Register) -> usize {
    match reg {
        Register::ScrollX => 0,
        Register::ScrollY => 1,
        Register::WindowX => 2,
        Register::WindowY => 3,
        Register::ScanlineCompare => 4,
        Register::BgPalette => 5,
        Register::ObjPalette0 => 6,
        Register::ObjPalette1 => 7,
    }
}

impl VideoHost for NullVideo {
    fn write_tile(&mut self, _index: u8, _data: &TileData) {}
    fn write_map(&mut self, _plane: Plane, _x: u8, _y: u8, _tile: u8) {}
    fn write_sprite(&mut self, _id: u8, _entry: [u8; 4]) {}
    fn write_register(&mut self, reg: Register, val: u8) {
        self.regs[register_slot(reg)] = val;
    }
    fn read_register(&self, reg: Register) -> u8 {
        self.regs[register_slot(reg)]
    }
    fn set_window_visible(&mut self, _visible: bool) {}
    fn set_display(&mut self, _on: bool) {}
}

/// One sprite table entry as the game sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprite {
    pub x: u8,
    pub y: u8,
    pub tile: u8,
    pub attr: u8,
    pub hidden: bool,
}

impl Sprite {
    pub fn is_visible(&self) -> bool {
        !self.hidden && self.y != 0 && self.y < 160
    }

    /// Sprite memory bytes. A hidden sprite is parked at y = 0.
    pub fn entry(&self) -> [u8; 4] {
        let y = if self.hidden { 0 } else { self.y };
        [y, self.x, self.tile, self.attr]
    }
}

/// Read-only record handed to the scanline callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanlineCommand {
    pub params: [u8; 8],
}

/// The subset of registers a scanline callback may change.
pub struct RasterRegs<'a> {
    host: &'a mut dyn VideoHost,
}

impl<'a> RasterRegs<'a> {
    pub fn new(host: &'a mut dyn VideoHost) -> Self {
        Self { host }
    }

    pub fn scroll(&self) -> (u8, u8) {
        (
            self.host.read_register(Register::ScrollX),
            self.host.read_register(Register::ScrollY),
        )
    }

    pub fn set_scroll_x(&mut self, sx: u8) {
        self.host.write_register(Register::ScrollX, sx);
    }

    pub fn set_scroll_y(&mut self, sy: u8) {
        self.host.write_register(Register::ScrollY, sy);
    }

    pub fn set_bg_palette(&mut self, palette: u8) {
        self.host.write_register(Register::BgPalette, palette);
    }

    pub fn set_obj_palette(&mut self, which: u8, palette: u8) {
        let reg = if which == 0 {
            Register::ObjPalette0
        } else {
            Register::ObjPalette1
        };
        self.host.write_register(reg, palette);
    }
}

/// Scanline callback. Returns the line to rearm at, if any; a line at or
/// before the current one fires in the next frame.
pub type ScanlineFn = fn(line: u8, cmd: &ScanlineCommand, regs: &mut RasterRegs<'_>) -> Option<u8>;

#[derive(Clone, Copy)]
pub struct ScanlineTrigger {
    pub line: u8,
    pub callback: ScanlineFn,
}

impl std::fmt::Debug for ScanlineTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanlineTrigger")
            .field("line", &self.line)
            .finish()
    }
}

/// Which scheduler stage is running; guards commits in debug builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Render,
    Input,
    Update,
    Display,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Render => "render",
            Phase::Input => "input",
            Phase::Update => "update",
            Phase::Display => "display",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VideoWrite {
    Cell { plane: Plane, x: u8, y: u8, tile: u8 },
    Sprite { id: u8, entry: [u8; 4] },
    Register { reg: Register, val: u8 },
    WindowVisible(bool),
}

pub struct VideoModel {
    queue: VecDeque<VideoWrite>,
    tiles: Vec<(u8, TileData)>,
    sprites: [Sprite; SPRITE_COUNT],
    budget: usize,
    used: usize,
    display_on: bool,
    phase: Phase,
    armed: Option<ScanlineTrigger>,
    command: ScanlineCommand,
}

impl Default for VideoModel {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoModel {
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_VBLANK_BUDGET)
    }

    pub fn with_budget(budget: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            tiles: Vec::new(),
            sprites: [Sprite::default(); SPRITE_COUNT],
            budget: budget.max(1),
            used: 0,
            display_on: false,
            phase: Phase::Init,
            armed: None,
            command: ScanlineCommand::default(),
        }
    }

    /// Stage a tile image. Only valid before the display is enabled.
    pub fn load_tile(&mut self, index: u8, data: &TileData) -> Result<(), KernelError> {
        if self.display_on {
            log(LogCategory::Video, LogLevel::Error, || {
                format!("tile {} loaded with display on", index)
            });
            return Err(KernelError::TileLoadAfterDisplay { index });
        }
        self.tiles.push((index, *data));
        Ok(())
    }

    pub fn load_tiles(&mut self, bundle: &tile::TileBundle) -> Result<(), KernelError> {
        for (index, data) in bundle.iter() {
            self.load_tile(index, data)?;
        }
        Ok(())
    }

    pub fn set_bg_tile(&mut self, x: u8, y: u8, tile: u8) {
        self.set_cell(Plane::Background, x, y, tile);
    }

    /// Row-major rectangle of `w` x `h` cells starting at (x, y).
    pub fn set_bg_region(&mut self, x: u8, y: u8, w: u8, h: u8, tiles: &[u8]) {
        self.set_region(Plane::Background, x, y, w, h, tiles);
    }

    pub fn set_win_tile(&mut self, x: u8, y: u8, tile: u8) {
        self.set_cell(Plane::Window, x, y, tile);
    }

    pub fn set_win_region(&mut self, x: u8, y: u8, w: u8, h: u8, tiles: &[u8]) {
        self.set_region(Plane::Window, x, y, w, h, tiles);
    }

    /// Fill a rectangle with one tile.
    pub fn fill(&mut self, plane: Plane, x: u8, y: u8, w: u8, h: u8, tile: u8) {
        for row in 0..h {
            for col in 0..w {
                self.set_cell(plane, x.wrapping_add(col), y.wrapping_add(row), tile);
            }
        }
    }

    pub fn set_cell(&mut self, plane: Plane, x: u8, y: u8, tile: u8) {
        self.queue.push_back(VideoWrite::Cell {
            plane,
            x: x % MAP_SIZE,
            y: y % MAP_SIZE,
            tile,
        });
    }

    fn set_region(&mut self, plane: Plane, x: u8, y: u8, w: u8, h: u8, tiles: &[u8]) {
        let cells = (0..h).flat_map(|row| (0..w).map(move |col| (col, row)));
        for ((col, row), &tile) in cells.zip(tiles) {
            self.set_cell(plane, x.wrapping_add(col), y.wrapping_add(row), tile);
        }
    }

    /// Background scroll in pixels; the map wraps every 256 pixels.
    pub fn set_scroll(&mut self, sx: u8, sy: u8) {
        self.set_register(Register::ScrollX, sx);
        self.set_register(Register::ScrollY, sy);
    }

    /// Window position in register units (`wx = WINDOW_X_OFFSET` is screen x 0).
    pub fn move_window(&mut self, wx: u8, wy: u8) {
        self.set_register(Register::WindowX, wx);
        self.set_register(Register::WindowY, wy);
    }

    /// Window position in screen pixels.
    pub fn place_window(&mut self, x: u8, y: u8) {
        self.move_window(x.saturating_add(WINDOW_X_OFFSET), y);
    }

    pub fn show_window(&mut self, visible: bool) {
        self.queue.push_back(VideoWrite::WindowVisible(visible));
    }

    pub fn set_bg_palette(&mut self, palette: u8) {
        self.set_register(Register::BgPalette, palette);
    }

    pub fn set_obj_palette(&mut self, which: u8, palette: u8) {
        let reg = if which == 0 {
            Register::ObjPalette0
        } else {
            Register::ObjPalette1
        };
        self.set_register(reg, palette);
    }

    fn set_register(&mut self, reg: Register, val: u8) {
        self.queue.push_back(VideoWrite::Register { reg, val });
    }

    /// Position in hardware coordinates (+8 x, +16 y).
    pub fn move_sprite(&mut self, id: u8, x: u8, y: u8) {
        self.update_sprite(id, |s| {
            s.x = x;
            s.y = y;
        });
    }

    pub fn set_sprite_tile(&mut self, id: u8, tile: u8) {
        self.update_sprite(id, |s| s.tile = tile);
    }

    pub fn set_sprite_attr(&mut self, id: u8, attr: u8) {
        self.update_sprite(id, |s| s.attr = attr);
    }

    pub fn hide_sprite(&mut self, id: u8) {
        self.update_sprite(id, |s| s.hidden = true);
    }

    /// Ids past the table are silently invisible.
    fn update_sprite(&mut self, id: u8, f: impl FnOnce(&mut Sprite)) {
        let Some(sprite) = self.sprites.get_mut(id as usize) else {
            log(LogCategory::Video, LogLevel::Debug, || {
                format!("sprite {} outside the {}-entry table", id, SPRITE_COUNT)
            });
            return;
        };
        f(sprite);
        let entry = sprite.entry();
        self.queue.push_back(VideoWrite::Sprite { id, entry });
    }

    pub fn sprite(&self, id: u8) -> Option<&Sprite> {
        self.sprites.get(id as usize)
    }

    /// Arm the single scanline trigger (replacing any armed one).
    pub fn arm_scanline(&mut self, line: u8, callback: ScanlineFn) {
        if line >= VISIBLE_LINES {
            log(LogCategory::Video, LogLevel::Warn, || {
                format!("scanline {} is not visible; trigger not armed", line)
            });
            return;
        }
        self.armed = Some(ScanlineTrigger { line, callback });
    }

    pub fn armed_scanline(&self) -> Option<u8> {
        self.armed.map(|t| t.line)
    }

    /// Publish the record the scanline callback will read.
    pub fn set_scanline_command(&mut self, cmd: ScanlineCommand) {
        self.command = cmd;
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn display_on(&self) -> bool {
        self.display_on
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Upload staged tiles, commit everything queued during init and turn
    /// the display on.
    pub(crate) fn enable_display(&mut self, host: &mut dyn VideoHost) {
        for (index, data) in self.tiles.drain(..) {
            host.write_tile(index, &data);
        }
        while let Some(write) = self.queue.pop_front() {
            apply(host, write);
        }
        host.set_display(true);
        self.display_on = true;
    }

    /// Start of a vblank window: the write budget is refilled.
    pub(crate) fn begin_vblank(&mut self) {
        self.used = 0;
    }

    /// Apply queued writes until the queue or this vblank's budget runs out.
    ///
    /// Returns the number of writes applied.
    pub(crate) fn commit(&mut self, host: &mut dyn VideoHost) -> Result<usize, KernelError> {
        if cfg!(debug_assertions) && !matches!(self.phase, Phase::Render | Phase::Init) {
            return Err(KernelError::VideoPhaseViolation {
                phase: self.phase.name(),
            });
        }
        let mut applied = 0;
        while self.used < self.budget {
            let Some(write) = self.queue.pop_front() else {
                break;
            };
            apply(host, write);
            self.used += 1;
            applied += 1;
        }
        if !self.queue.is_empty() {
            let left = self.queue.len();
            log(LogCategory::Video, LogLevel::Warn, || {
                format!("vblank budget spent; {} write(s) deferred", left)
            });
        }
        Ok(applied)
    }

    /// Output the visible lines, running the scanline trigger as the raster
    /// reaches its line. Scroll and palette changes made by the callback
    /// last until the end of this frame only.
    pub(crate) fn scan_out(&mut self, host: &mut dyn VideoHost) {
        let saved = [
            Register::ScrollX,
            Register::ScrollY,
            Register::BgPalette,
            Register::ObjPalette0,
            Register::ObjPalette1,
        ]
        .map(|reg| (reg, host.read_register(reg)));

        let mut trigger = self.armed;
        if let Some(t) = trigger {
            host.write_register(Register::ScanlineCompare, t.line);
        }
        for line in 0..VISIBLE_LINES {
            if let Some(t) = trigger.filter(|t| t.line == line) {
                let next = {
                    let mut regs = RasterRegs::new(host);
                    (t.callback)(line, &self.command, &mut regs)
                };
                trigger = next.filter(|&n| n < VISIBLE_LINES).map(|n| ScanlineTrigger {
                    line: n,
                    callback: t.callback,
                });
                if let Some(t) = trigger {
                    host.write_register(Register::ScanlineCompare, t.line);
                }
            }
            host.draw_line(line);
        }
        host.end_frame();

        for (reg, val) in saved {
            host.write_register(reg, val);
        }
        self.armed = trigger;
    }
}

fn apply(host: &mut dyn VideoHost, write: VideoWrite) {
    match write {
        VideoWrite::Cell { plane, x, y, tile } => host.write_map(plane, x, y, tile),
        VideoWrite::Sprite { id, entry } => host.write_sprite(id, entry),
        VideoWrite::Register { reg, val } => host.write_register(reg, val),
        VideoWrite::WindowVisible(v) => host.set_window_visible(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::SoftwareLcd;

    fn render_ready(budget: usize) -> (VideoModel, SoftwareLcd) {
        let mut video = VideoModel::with_budget(budget);
        let mut lcd = SoftwareLcd::new();
        video.enable_display(&mut lcd);
        video.set_phase(Phase::Render);
        video.begin_vblank();
        (video, lcd)
    }

    #[test]
    fn test_writes_invisible_until_commit() {
        let (mut video, mut lcd) = render_ready(64);
        video.set_phase(Phase::Update);
        video.set_bg_tile(3, 4, 9);
        assert_eq!(lcd.map_cell(Plane::Background, 3, 4), 0);

        video.set_phase(Phase::Render);
        assert_eq!(video.commit(&mut lcd), Ok(1));
        assert_eq!(lcd.map_cell(Plane::Background, 3, 4), 9);
    }

    #[test]
    fn test_map_writes_wrap_on_torus() {
        let (mut video, mut lcd) = render_ready(64);
        video.set_bg_tile(33, 64, 5);
        video.commit(&mut lcd).unwrap();
        assert_eq!(lcd.map_cell(Plane::Background, 1, 0), 5);
    }

    #[test]
    fn test_overflow_defers_in_order() {
        let (mut video, mut lcd) = render_ready(4);
        for i in 0..10u8 {
            video.set_bg_tile(i, 0, i + 1);
        }
        // Same cell written twice: the later value must win after both land
        video.set_bg_tile(0, 0, 0xAA);

        assert_eq!(video.commit(&mut lcd), Ok(4));
        assert_eq!(lcd.map_cell(Plane::Background, 3, 0), 4);
        assert_eq!(lcd.map_cell(Plane::Background, 4, 0), 0);
        // Budget for this vblank is spent
        assert_eq!(video.commit(&mut lcd), Ok(0));

        video.begin_vblank();
        assert_eq!(video.commit(&mut lcd), Ok(4));
        video.begin_vblank();
        assert_eq!(video.commit(&mut lcd), Ok(3));
        for i in 1..10u8 {
            assert_eq!(lcd.map_cell(Plane::Background, i, 0), i + 1);
        }
        assert_eq!(lcd.map_cell(Plane::Background, 0, 0), 0xAA);
        assert_eq!(video.pending(), 0);
    }

    #[test]
    fn test_tile_load_after_display_is_fatal() {
        let mut video = VideoModel::new();
        assert!(video.load_tile(1, &tile::solid(3)).is_ok());
        video.enable_display(&mut SoftwareLcd::new());
        assert_eq!(
            video.load_tile(2, &tile::solid(3)),
            Err(KernelError::TileLoadAfterDisplay { index: 2 })
        );
    }

    #[test]
    fn test_staged_tiles_upload_on_enable() {
        let mut video = VideoModel::new();
        let mut lcd = SoftwareLcd::new();
        video.load_tile(5, &tile::solid(2)).unwrap();
        video.enable_display(&mut lcd);
        assert_eq!(lcd.tile_bytes(5)[1], 0xFF);
        assert!(lcd.display_on());
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_commit_outside_render_is_rejected() {
        let (mut video, mut lcd) = render_ready(8);
        video.set_phase(Phase::Update);
        video.set_bg_tile(0, 0, 1);
        assert_eq!(
            video.commit(&mut lcd),
            Err(KernelError::VideoPhaseViolation { phase: "update" })
        );
        assert_eq!(video.pending(), 1);
    }

    #[test]
    fn test_sprite_hiding_and_limits() {
        let (mut video, mut lcd) = render_ready(64);
        video.move_sprite(0, 8, 16);
        video.set_sprite_tile(0, 3);
        video.hide_sprite(1);
        video.move_sprite(40, 50, 50);
        video.commit(&mut lcd).unwrap();

        assert_eq!(lcd.sprite_entry(0), [16, 8, 3, 0]);
        assert_eq!(lcd.sprite_entry(1)[0], 0);
        assert!(video.sprite(40).is_none());
        assert!(video.sprite(0).unwrap().is_visible());

        video.move_sprite(2, 10, 160);
        assert!(!video.sprite(2).unwrap().is_visible());
    }

    #[test]
    fn test_region_is_row_major() {
        let (mut video, mut lcd) = render_ready(64);
        video.set_win_region(1, 1, 2, 2, &[1, 2, 3, 4]);
        video.commit(&mut lcd).unwrap();
        assert_eq!(lcd.map_cell(Plane::Window, 1, 1), 1);
        assert_eq!(lcd.map_cell(Plane::Window, 2, 1), 2);
        assert_eq!(lcd.map_cell(Plane::Window, 1, 2), 3);
        assert_eq!(lcd.map_cell(Plane::Window, 2, 2), 4);
    }

    #[test]
    fn test_place_window_applies_x_offset() {
        let (mut video, mut lcd) = render_ready(64);
        video.place_window(0, 100);
        video.show_window(true);
        video.commit(&mut lcd).unwrap();
        assert_eq!(lcd.read_register(Register::WindowX), 7);
        assert_eq!(lcd.read_register(Register::WindowY), 100);
        assert!(lcd.window_visible());
    }

    fn parallax(line: u8, cmd: &ScanlineCommand, regs: &mut RasterRegs<'_>) -> Option<u8> {
        match line {
            32 => {
                regs.set_scroll_x(cmd.params[0]);
                Some(64)
            }
            64 => {
                regs.set_scroll_x(cmd.params[1]);
                Some(96)
            }
            _ => {
                regs.set_scroll_x(cmd.params[2]);
                Some(32)
            }
        }
    }

    #[test]
    fn test_scanline_triggers_reprogram_scroll() {
        let (mut video, mut lcd) = render_ready(64);
        video.set_scroll(0, 0);
        video.commit(&mut lcd).unwrap();
        video.set_scanline_command(ScanlineCommand {
            params: [10, 20, 30, 0, 0, 0, 0, 0],
        });
        video.arm_scanline(32, parallax);

        video.scan_out(&mut lcd);
        let seen: Vec<u8> = [0u8, 31, 32, 63, 64, 95, 96, 143]
            .iter()
            .map(|&l| lcd.line_registers(l).scroll_x)
            .collect();
        assert_eq!(seen, vec![0, 0, 10, 10, 20, 20, 30, 30]);

        // Main-context value restored, chain rearmed for the next frame
        assert_eq!(lcd.read_register(Register::ScrollX), 0);
        assert_eq!(video.armed_scanline(), Some(32));

        video.scan_out(&mut lcd);
        assert_eq!(lcd.line_registers(40).scroll_x, 10);
    }

    #[test]
    fn test_invisible_trigger_line_rejected() {
        let mut video = VideoModel::new();
        video.arm_scanline(144, parallax);
        assert_eq!(video.armed_scanline(), None);
    }
}
