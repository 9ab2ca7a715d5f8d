//! Software LCD
//!
//! A reference [`VideoHost`] that keeps tile, map and sprite memory in RAM
//! and renders each scanline as the raster reaches it, so scroll and palette
//! changes made by a scanline callback show up on the lines that follow.

use crate::logging::{log, LogCategory, LogLevel};
use crate::types::{Frame, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::video::tile::{decode_pixel, TileData, TILE_BYTES};
use crate::video::{attr, Plane, Register, VideoHost, SPRITE_COUNT, WINDOW_X_OFFSET};
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// 256 tiles of 16 bytes
pub const TILE_MEMORY: usize = 256 * TILE_BYTES;
/// One 32x32 map plane
pub const MAP_MEMORY: usize = 32 * 32;
/// 40 entries of 4 bytes
pub const SPRITE_MEMORY: usize = SPRITE_COUNT * 4;
/// Default per-scanline sprite limit
pub const DEFAULT_SPRITE_LINE_CAP: usize = 10;

/// Identity palette: color index n shows shade n
const DEFAULT_PALETTE: u8 = 0xE4;

/// DMG shades, lightest first
const SHADES: [u32; 4] = [0xFFFFFFFF, 0xFFAAAAAA, 0xFF555555, 0xFF000000];

/// Register values the raster used for one line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRegisters {
    pub scroll_x: u8,
    pub scroll_y: u8,
    pub bg_palette: u8,
}

pub struct SoftwareLcd {
    tiles: Vec<u8>,
    bg_map: Vec<u8>,
    win_map: Vec<u8>,
    oam: [u8; SPRITE_MEMORY],

    scx: u8,
    scy: u8,
    wx: u8,
    wy: u8,
    lyc: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,

    window_visible: bool,
    display_on: bool,
    sprite_line_cap: usize,

    frame: Frame,
    lines: [LineRegisters; SCREEN_HEIGHT],
    frames_rendered: u64,
}

impl Default for SoftwareLcd {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareLcd {
    pub fn new() -> Self {
        Self::with_sprite_cap(DEFAULT_SPRITE_LINE_CAP)
    }

    pub fn with_sprite_cap(sprite_line_cap: usize) -> Self {
        Self {
            tiles: vec![0; TILE_MEMORY],
            bg_map: vec![0; MAP_MEMORY],
            win_map: vec![0; MAP_MEMORY],
            oam: [0; SPRITE_MEMORY],
            scx: 0,
            scy: 0,
            wx: 0,
            wy: 0,
            lyc: 0,
            bgp: DEFAULT_PALETTE,
            obp0: DEFAULT_PALETTE,
            obp1: DEFAULT_PALETTE,
            window_visible: false,
            display_on: false,
            sprite_line_cap,
            frame: Frame::new(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32),
            lines: [LineRegisters::default(); SCREEN_HEIGHT],
            frames_rendered: 0,
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn display_on(&self) -> bool {
        self.display_on
    }

    pub fn window_visible(&self) -> bool {
        self.window_visible
    }

    pub fn map_cell(&self, plane: Plane, x: u8, y: u8) -> u8 {
        self.map(plane)[map_index(x, y)]
    }

    pub fn tile_bytes(&self, index: u8) -> &[u8] {
        let base = index as usize * TILE_BYTES;
        &self.tiles[base..base + TILE_BYTES]
    }

    pub fn sprite_entry(&self, id: u8) -> [u8; 4] {
        let base = (id as usize % SPRITE_COUNT) * 4;
        [
            self.oam[base],
            self.oam[base + 1],
            self.oam[base + 2],
            self.oam[base + 3],
        ]
    }

    /// Registers in effect when `line` was last drawn.
    pub fn line_registers(&self, line: u8) -> LineRegisters {
        self.lines
            .get(line as usize)
            .copied()
            .unwrap_or_default()
    }

    fn map(&self, plane: Plane) -> &[u8] {
        match plane {
            Plane::Background => &self.bg_map,
            Plane::Window => &self.win_map,
        }
    }

    /// Palette index of one pixel of a tile.
    fn tile_pixel(&self, tile: u8, x: u8, y: u8) -> u8 {
        decode_pixel(self.tile_bytes(tile), x & 7, y & 7)
    }

    fn render_background(&self, line: u8, color_ids: &mut [u8; SCREEN_WIDTH], out: &mut [u32]) {
        let y = line.wrapping_add(self.scy);
        for screen_x in 0..SCREEN_WIDTH {
            let x = (screen_x as u8).wrapping_add(self.scx);
            let tile = self.bg_map[map_index(x / 8, y / 8)];
            let color = self.tile_pixel(tile, x, y);
            color_ids[screen_x] = color;
            out[screen_x] = shade(self.bgp, color);
        }
    }

    fn render_window(&self, line: u8, color_ids: &mut [u8; SCREEN_WIDTH], out: &mut [u32]) {
        if !self.window_visible || line < self.wy || self.wx >= SCREEN_WIDTH as u8 + WINDOW_X_OFFSET {
            return;
        }
        let win_y = line - self.wy;
        let start_x = self.wx.saturating_sub(WINDOW_X_OFFSET) as usize;
        for screen_x in start_x..SCREEN_WIDTH {
            let win_x = (screen_x - start_x) as u8;
            let tile = self.win_map[map_index(win_x / 8, win_y / 8)];
            let color = self.tile_pixel(tile, win_x, win_y);
            color_ids[screen_x] = color;
            out[screen_x] = shade(self.bgp, color);
        }
    }

    fn render_sprites(&self, line: u8, color_ids: &[u8; SCREEN_WIDTH], out: &mut [u32]) {
        let on_line: Vec<usize> = (0..SPRITE_COUNT)
            .filter(|&i| {
                let y = self.oam[i * 4];
                let top = y as i16 - 16;
                y != 0 && (top..top + 8).contains(&(line as i16))
            })
            .collect();
        if on_line.len() > self.sprite_line_cap {
            log(LogCategory::Video, LogLevel::Trace, || {
                format!(
                    "line {}: {} sprites, {} dropped",
                    line,
                    on_line.len(),
                    on_line.len() - self.sprite_line_cap
                )
            });
        }

        // Lower index wins: draw the survivors back to front
        for &i in on_line.iter().take(self.sprite_line_cap).rev() {
            let base = i * 4;
            let top = self.oam[base] as i16 - 16;
            let left = self.oam[base + 1] as i16 - 8;
            let tile = self.oam[base + 2];
            let flags = self.oam[base + 3];

            let palette = if flags & attr::PALETTE1 != 0 {
                self.obp1
            } else {
                self.obp0
            };
            let row = (line as i16 - top) as u8;
            let row = if flags & attr::Y_FLIP != 0 { 7 - row } else { row };

            for sx in 0..8u8 {
                let screen_x = left + sx as i16;
                if !(0..SCREEN_WIDTH as i16).contains(&screen_x) {
                    continue;
                }
                let col = if flags & attr::X_FLIP != 0 { 7 - sx } else { sx };
                let color = self.tile_pixel(tile, col, row);
                // Color 0 is transparent
                if color == 0 {
                    continue;
                }
                let screen_x = screen_x as usize;
                if flags & attr::BEHIND_BG != 0 && color_ids[screen_x] != 0 {
                    continue;
                }
                out[screen_x] = shade(palette, color);
            }
        }
    }
}

fn map_index(x: u8, y: u8) -> usize {
    (y as usize % 32) * 32 + (x as usize % 32)
}

fn shade(palette: u8, color: u8) -> u32 {
    SHADES[((palette >> (color * 2)) & 0x03) as usize]
}

impl VideoHost for SoftwareLcd {
    fn write_tile(&mut self, index: u8, data: &TileData) {
        let base = index as usize * TILE_BYTES;
        self.tiles[base..base + TILE_BYTES].copy_from_slice(data);
    }

    fn write_map(&mut self, plane: Plane, x: u8, y: u8, tile: u8) {
        let map = match plane {
            Plane::Background => &mut self.bg_map,
            Plane::Window => &mut self.win_map,
        };
        map[map_index(x, y)] = tile;
    }

    fn write_sprite(&mut self, id: u8, entry: [u8; 4]) {
        let base = id as usize * 4;
        if let Some(slot) = self.oam.get_mut(base..base + 4) {
            slot.copy_from_slice(&entry);
        }
    }

    fn write_register(&mut self, reg: Register, val: u8) {
        match reg {
            Register::ScrollX => self.scx = val,
            Register::ScrollY => self.scy = val,
            Register::WindowX => self.wx = val,
            Register::WindowY => self.wy = val,
            Register::ScanlineCompare => self.lyc = val,
            Register::BgPalette => self.bgp = val,
            Register::ObjPalette0 => self.obp0 = val,
            Register::ObjPalette1 => self.obp1 = val,
        }
    }

    fn read_register(&self, reg: Register) -> u8 {
        match reg {
            Register::ScrollX => self.scx,
            Register::ScrollY => self.scy,
            Register::WindowX => self.wx,
            Register::WindowY => self.wy,
            Register::ScanlineCompare => self.lyc,
            Register::BgPalette => self.bgp,
            Register::ObjPalette0 => self.obp0,
            Register::ObjPalette1 => self.obp1,
        }
    }

    fn set_window_visible(&mut self, visible: bool) {
        self.window_visible = visible;
    }

    fn set_display(&mut self, on: bool) {
        self.display_on = on;
    }

    fn draw_line(&mut self, line: u8) {
        let y = line as usize;
        if y >= SCREEN_HEIGHT {
            return;
        }
        self.lines[y] = LineRegisters {
            scroll_x: self.scx,
            scroll_y: self.scy,
            bg_palette: self.bgp,
        };

        let mut row = [SHADES[0]; SCREEN_WIDTH];
        if self.display_on {
            let mut color_ids = [0u8; SCREEN_WIDTH];
            self.render_background(line, &mut color_ids, &mut row);
            self.render_window(line, &mut color_ids, &mut row);
            self.render_sprites(line, &color_ids, &mut row);
        }
        self.frame.pixels[y * SCREEN_WIDTH..(y + 1) * SCREEN_WIDTH].copy_from_slice(&row);
    }

    fn end_frame(&mut self) {
        self.frames_rendered += 1;
    }

    fn frame(&self) -> Option<Frame> {
        Some(self.frame.clone())
    }
}

/// Cloneable handle to one [`SoftwareLcd`], so a test or host can inspect
/// the display while the kernel owns the boxed host.
#[derive(Clone, Default)]
pub struct SharedLcd(Rc<RefCell<SoftwareLcd>>);

impl SharedLcd {
    pub fn new(lcd: SoftwareLcd) -> Self {
        Self(Rc::new(RefCell::new(lcd)))
    }

    pub fn lcd(&self) -> Ref<'_, SoftwareLcd> {
        self.0.borrow()
    }
}

impl VideoHost for SharedLcd {
    fn write_tile(&mut self, index: u8, data: &TileData) {
        self.0.borrow_mut().write_tile(index, data);
    }

    fn write_map(&mut self, plane: Plane, x: u8, y: u8, tile: u8) {
        self.0.borrow_mut().write_map(plane, x, y, tile);
    }

    fn write_sprite(&mut self, id: u8, entry: [u8; 4]) {
        self.0.borrow_mut().write_sprite(id, entry);
    }

    fn write_register(&mut self, reg: Register, val: u8) {
        self.0.borrow_mut().write_register(reg, val);
    }

    fn read_register(&self, reg: Register) -> u8 {
        self.0.borrow().read_register(reg)
    }

    fn set_window_visible(&mut self, visible: bool) {
        self.0.borrow_mut().set_window_visible(visible);
    }

    fn set_display(&mut self, on: bool) {
        self.0.borrow_mut().set_display(on);
    }

    fn draw_line(&mut self, line: u8) {
        self.0.borrow_mut().draw_line(line);
    }

    fn end_frame(&mut self) {
        self.0.borrow_mut().end_frame();
    }

    fn frame(&self) -> Option<Frame> {
        self.0.borrow().frame()
    }
}
