//! Three-layer parallax scroller
//!
//! The background is split into horizontal bands. The top band (sky) uses
//! the committed scroll register; a chained scanline trigger re-programs
//! scroll X at lines 32, 64 and 96 so the mountains, hills and ground move
//! at 1/4, 1/2 and 1x of the camera.

use serde::Serialize;
use serde_json::Value;
use tile_core::input::Button;
use tile_core::video::tile::{mono, solid, TileBundle, TileData};
use tile_core::video::{Plane, RasterRegs, ScanlineCommand, MAP_SIZE};
use tile_core::{Game, Kernel, KernelError};

/// First raster line of each scrolling band
pub const BAND_LINES: [u8; 3] = [32, 64, 96];

pub const SKY_TILE: u8 = 0;
pub const CLOUD_TILE: u8 = 1;
pub const MOUNTAIN_TILE: u8 = 2;
pub const HILL_TILE: u8 = 3;
pub const GROUND_TILE: u8 = 4;
pub const GRASS_TILE: u8 = 5;

static TILES: [TileData; 6] = [
    solid(0),
    mono([0x00, 0x3C, 0x7E, 0xFF, 0xFF, 0x7E, 0x00, 0x00], 1),
    mono([0x18, 0x18, 0x3C, 0x3C, 0x7E, 0x7E, 0xFF, 0xFF], 2),
    mono([0x00, 0x00, 0x00, 0x3C, 0x7E, 0xFF, 0xFF, 0xFF], 2),
    solid(3),
    mono([0x00, 0x44, 0xAA, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], 3),
];

/// Scanline handler: applies the band's scroll and arms the next band.
/// `cmd.params[0..3]` hold the scroll values for the three bands.
pub fn split_layers(line: u8, cmd: &ScanlineCommand, regs: &mut RasterRegs<'_>) -> Option<u8> {
    let band = BAND_LINES.iter().position(|&l| l == line)?;
    regs.set_scroll_x(cmd.params[band]);
    Some(BAND_LINES[(band + 1) % BAND_LINES.len()])
}

/// Band scroll values for a camera position: 1/4, 1/2 and 1x.
pub fn layer_scrolls(camera: u16) -> [u8; 3] {
    [(camera >> 2) as u8, (camera >> 1) as u8, camera as u8]
}

#[derive(Debug, Clone, Copy, Default)]
struct Controls {
    toggle: bool,
    forward: bool,
    back: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Parallax {
    camera: u16,
    paused: bool,
    layers: [u8; 3],
    #[serde(skip)]
    controls: Controls,
}

impl Default for Parallax {
    fn default() -> Self {
        Self::new()
    }
}

impl Parallax {
    pub fn new() -> Self {
        Self {
            camera: 0,
            paused: false,
            layers: [0; 3],
            controls: Controls::default(),
        }
    }

    pub fn camera(&self) -> u16 {
        self.camera
    }

    fn publish(&mut self, kernel: &mut Kernel) {
        self.layers = layer_scrolls(self.camera);
        let mut params = [0u8; 8];
        params[..3].copy_from_slice(&self.layers);
        kernel.video().set_scanline_command(ScanlineCommand { params });
    }
}

impl Game for Parallax {
    fn name(&self) -> &'static str {
        "parallax"
    }

    fn init(&mut self, kernel: &mut Kernel) -> Result<(), KernelError> {
        kernel.load_tiles(&TileBundle::new(0, &TILES))?;

        let video = kernel.video();
        video.fill(Plane::Background, 0, 0, MAP_SIZE, MAP_SIZE, SKY_TILE);
        for x in (0..MAP_SIZE).step_by(7) {
            video.set_bg_tile(x, 1 + x % 2, CLOUD_TILE);
        }
        for x in (0..MAP_SIZE).step_by(4) {
            video.fill(Plane::Background, x, 6, 2, 2, MOUNTAIN_TILE);
        }
        for x in (0..MAP_SIZE).step_by(3) {
            video.fill(Plane::Background, x, 10, 2, 2, HILL_TILE);
        }
        video.fill(Plane::Background, 0, 12, MAP_SIZE, 1, GRASS_TILE);
        video.fill(Plane::Background, 0, 13, MAP_SIZE, 5, GROUND_TILE);
        for x in (0..MAP_SIZE).step_by(5) {
            video.set_bg_tile(x, 12, GROUND_TILE);
        }
        video.set_scroll(0, 0);
        video.arm_scanline(BAND_LINES[0], split_layers);
        self.publish(kernel);
        Ok(())
    }

    fn handle_input(&mut self, kernel: &mut Kernel) {
        kernel.poll();
        let input = kernel.input();
        self.controls = Controls {
            toggle: input.pressed(Button::A),
            forward: input.held(Button::Right),
            back: input.held(Button::Left),
        };
    }

    fn update(&mut self, kernel: &mut Kernel) {
        if self.controls.toggle {
            self.paused = !self.paused;
        }
        let mut step: i16 = if self.paused { 0 } else { 1 };
        if self.controls.forward {
            step += 1;
        }
        if self.controls.back {
            step -= 2;
        }
        self.camera = self.camera.wrapping_add_signed(step);
        self.publish(kernel);
    }

    /// Everything moves through the scanline chain; nothing to enqueue.
    fn render(&mut self, _kernel: &mut Kernel) {}

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
