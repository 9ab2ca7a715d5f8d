//! Single-screen platformer
//!
//! An 8x8 player walks and jumps around a static level. Movement goes
//! through the kernel's swept collision ([`Body::step`]), so the player
//! always ends flush against walls, floors and ceilings. Holding A extends
//! a jump for up to [`MAX_JUMP_HOLD`] frames. Coins are sprites collected
//! by overlap.

use serde::Serialize;
use serde_json::Value;
use tile_core::audio::{Envelope, Tone, PULSE1, PULSE2};
use tile_core::grid::{rect_overlap, Body, Rect, SolidSet, TileMap};
use tile_core::input::Button;
use tile_core::logging::{log, LogCategory, LogLevel};
use tile_core::video::tile::{mono, solid, TileBundle, TileData};
use tile_core::video::{attr, SPRITE_OFFSET_X, SPRITE_OFFSET_Y};
use tile_core::{Game, Kernel, KernelError};

pub const GRAVITY: i16 = 1;
pub const TERMINAL_VELOCITY: i16 = 6;
pub const JUMP_VELOCITY: i16 = -6;
/// Frames a held A suspends gravity after take-off
pub const MAX_JUMP_HOLD: u8 = 10;
pub const WALK_SPEED: i16 = 2;

pub const PLAYER_SPRITE: u8 = 0;
/// Coins use the sprite ids after the player
pub const COIN_SPRITE_BASE: u8 = 1;

pub const AIR_TILE: u8 = 0;
pub const GROUND_TILE: u8 = 1;
pub const PLATFORM_TILE: u8 = 2;
const PLAYER_TILE: u8 = 3;
const COIN_TILE: u8 = 4;
/// Object palette 1: coin color 1 drawn dark gray
pub const COIN_PALETTE: u8 = 0xE8;

static TILES: [TileData; 5] = [
    solid(0),
    mono([0xFF, 0x88, 0xFF, 0x22, 0xFF, 0x88, 0xFF, 0x22], 3),
    mono([0xFF, 0xFF, 0x81, 0x81, 0xFF, 0x00, 0x00, 0x00], 2),
    mono([0x3C, 0x7E, 0x5A, 0x7E, 0x3C, 0x7E, 0x24, 0x66], 3),
    mono([0x18, 0x3C, 0x66, 0x66, 0x66, 0x66, 0x3C, 0x18], 1),
];

/// `#` ground, `=` platform, anything else air
const LEVEL: [&str; 18] = [
    "#..................#",
    "#..................#",
    "#..................#",
    "#..................#",
    "#..................#",
    "#..................#",
    "#..................#",
    "#..............===.#",
    "#..................#",
    "#..........===.....#",
    "#..................#",
    "#......===.........#",
    "#..................#",
    "#..===.............#",
    "#..................#",
    "#..................#",
    "####################",
    "####################",
];

/// Top-left pixel of each coin
pub const COINS: [(i16, i16); 4] = [(36, 96), (68, 80), (100, 64), (132, 48)];

pub const PLAYER_START: (i16, i16) = (16, 120);

fn level_tiles() -> Vec<Vec<u8>> {
    LEVEL
        .iter()
        .map(|row| {
            row.bytes()
                .map(|c| match c {
                    b'#' => GROUND_TILE,
                    b'=' => PLATFORM_TILE,
                    _ => AIR_TILE,
                })
                .collect()
        })
        .collect()
}

fn coin_rect(i: usize) -> Rect {
    let (x, y) = COINS[i];
    Rect::new(x, y, 8, 8)
}

#[derive(Debug, Clone, Copy, Default)]
struct Controls {
    jump: bool,
    jump_held: bool,
    left: bool,
    right: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Platformer {
    player: Body,
    facing_left: bool,
    jump_hold: u8,
    coins: [bool; COINS.len()],
    score: u16,
    #[serde(skip)]
    map: TileMap,
    #[serde(skip)]
    controls: Controls,
    #[serde(skip)]
    drawn: Option<(i16, i16, bool)>,
    #[serde(skip)]
    coins_drawn: [bool; COINS.len()],
}

impl Default for Platformer {
    fn default() -> Self {
        Self::new()
    }
}

impl Platformer {
    pub fn new() -> Self {
        let (x, y) = PLAYER_START;
        Self::with_player(Body::new(Rect::new(x, y, 8, 8)))
    }

    pub fn with_player(player: Body) -> Self {
        let rows = level_tiles();
        let rows: Vec<&[u8]> = rows.iter().map(Vec::as_slice).collect();
        Self {
            player,
            facing_left: false,
            jump_hold: 0,
            coins: [false; COINS.len()],
            score: 0,
            map: TileMap::from_rows(&rows, SolidSet::from_tiles(&[GROUND_TILE, PLATFORM_TILE])),
            controls: Controls::default(),
            drawn: None,
            coins_drawn: [false; COINS.len()],
        }
    }

    pub fn player(&self) -> &Body {
        &self.player
    }

    pub fn score(&self) -> u16 {
        self.score
    }

    fn collect_coins(&mut self, kernel: &mut Kernel) {
        for (i, taken) in self.coins.iter_mut().enumerate() {
            if *taken || !rect_overlap(&self.player.rect, &coin_rect(i)) {
                continue;
            }
            *taken = true;
            self.score += 1;
            log(LogCategory::Game, LogLevel::Debug, || {
                format!("coin {} collected, score {}", i, self.score)
            });
            kernel.audio().play_tone(
                PULSE2,
                0x783,
                Tone::Pulse { duty: 2 },
                Envelope::new(12, false, 1),
            );
        }
    }
}

fn sprite_pos(x: i16, y: i16) -> (u8, u8) {
    (
        (x + SPRITE_OFFSET_X as i16) as u8,
        (y + SPRITE_OFFSET_Y as i16) as u8,
    )
}

impl Game for Platformer {
    fn name(&self) -> &'static str {
        "platformer"
    }

    fn init(&mut self, kernel: &mut Kernel) -> Result<(), KernelError> {
        kernel.load_tiles(&TileBundle::new(0, &TILES))?;
        let video = kernel.video();
        for (y, row) in level_tiles().iter().enumerate() {
            video.set_bg_region(0, y as u8, row.len() as u8, 1, row);
        }
        video.set_scroll(0, 0);

        video.set_sprite_tile(PLAYER_SPRITE, PLAYER_TILE);
        video.set_obj_palette(1, COIN_PALETTE);
        for (i, &(cx, cy)) in COINS.iter().enumerate() {
            let id = COIN_SPRITE_BASE + i as u8;
            let (x, y) = sprite_pos(cx, cy);
            video.set_sprite_tile(id, COIN_TILE);
            video.set_sprite_attr(id, attr::PALETTE1);
            video.move_sprite(id, x, y);
        }
        Ok(())
    }

    fn handle_input(&mut self, kernel: &mut Kernel) {
        kernel.poll();
        let input = kernel.input();
        self.controls = Controls {
            jump: input.pressed(Button::A),
            jump_held: input.held(Button::A),
            left: input.held(Button::Left),
            right: input.held(Button::Right),
        };
    }

    fn update(&mut self, kernel: &mut Kernel) {
        let c = self.controls;
        self.player.vx = match (c.left, c.right) {
            (true, false) => -WALK_SPEED,
            (false, true) => WALK_SPEED,
            _ => 0,
        };
        if self.player.vx != 0 {
            self.facing_left = self.player.vx < 0;
        }

        if c.jump && self.player.on_ground {
            self.player.launch(JUMP_VELOCITY);
            self.jump_hold = MAX_JUMP_HOLD;
            kernel.audio().play_tone(
                PULSE1,
                0x700,
                Tone::Pulse { duty: 1 },
                Envelope::new(8, false, 1),
            );
        }
        if !c.jump_held {
            self.jump_hold = 0;
        }
        if self.jump_hold > 0 && self.player.vy < 0 {
            self.jump_hold -= 1;
        } else {
            self.player.apply_gravity(GRAVITY, TERMINAL_VELOCITY);
        }

        let rising = self.player.vy < 0;
        let (_, vertical) = self.player.step(&self.map);
        if rising && vertical.blocked {
            // Head hit a ceiling: the jump is over
            self.jump_hold = 0;
        }
        self.collect_coins(kernel);
    }

    fn render(&mut self, kernel: &mut Kernel) {
        let video = kernel.video();
        let now = (self.player.rect.x, self.player.rect.y, self.facing_left);
        if self.drawn != Some(now) {
            let (x, y) = sprite_pos(now.0, now.1);
            video.move_sprite(PLAYER_SPRITE, x, y);
            video.set_sprite_attr(PLAYER_SPRITE, if now.2 { attr::X_FLIP } else { 0 });
            self.drawn = Some(now);
        }
        for (i, (&taken, drawn)) in self.coins.iter().zip(self.coins_drawn.iter_mut()).enumerate() {
            if taken && !*drawn {
                video.hide_sprite(COIN_SPRITE_BASE + i as u8);
                *drawn = true;
            }
        }
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
