//! Bouncing ball sprite demo
//!
//! One sprite falls under gravity, bounces off the floor losing a quarter
//! of its speed each time, and rebounds off the side walls. A kicks it
//! upward; Left/Right nudge its horizontal speed.

use serde::Serialize;
use serde_json::Value;
use tile_core::audio::{Envelope, LfsrWidth, Tone, NOISE};
use tile_core::input::Button;
use tile_core::logging::{log, LogCategory, LogLevel};
use tile_core::video::tile::{mono, solid, TileBundle, TileData};
use tile_core::types::{SCREEN_HEIGHT, SCREEN_WIDTH};
use tile_core::video::{Plane, SPRITE_OFFSET_X, SPRITE_OFFSET_Y, VISIBLE_COLS, VISIBLE_ROWS};
use tile_core::{Game, Kernel, KernelError};

pub const BALL_SIZE: i16 = 8;
/// Height of the floor strip along the bottom row
pub const FLOOR_HEIGHT: i16 = 8;

/// Ball bounds in sprite (hardware) coordinates; the ball rests on the floor
pub const BALL_MIN_X: i16 = SPRITE_OFFSET_X as i16;
pub const BALL_MAX_X: i16 = SPRITE_OFFSET_X as i16 + SCREEN_WIDTH as i16 - BALL_SIZE;
pub const BALL_MIN_Y: i16 = SPRITE_OFFSET_Y as i16;
pub const BALL_MAX_Y: i16 =
    SPRITE_OFFSET_Y as i16 + SCREEN_HEIGHT as i16 - BALL_SIZE - FLOOR_HEIGHT;

pub const GRAVITY: i16 = 1;
pub const MAX_VELOCITY: i16 = 8;
pub const KICK_VELOCITY: i16 = -8;
pub const MAX_DX: i16 = 3;

pub const BALL_SPRITE: u8 = 0;
/// First of the spinning-ball frames
const BALL_TILE: u8 = 1;
const ANIM_FRAMES: u8 = 4;
/// Game frames per animation frame
const ANIM_SPEED: u8 = 8;
const FLOOR_TILE: u8 = 5;
const FLOOR_ROW: u8 = VISIBLE_ROWS - 1;

static TILES: [TileData; 6] = [
    solid(0),
    ball_frame(0xF3),
    ball_frame(0xE7),
    ball_frame(0xCF),
    ball_frame(0xE7),
    mono([0xFF, 0x00, 0xAA, 0x55, 0xAA, 0x55, 0xAA, 0x55], 2),
];

/// Outline in color 3 with a band of color 2 whose columns are `band`.
const fn ball_frame(band: u8) -> TileData {
    let outline = [0x3C, 0x7E, 0xFF, 0xFF, 0xFF, 0xFF, 0x7E, 0x3C];
    let mut tile = mono(outline, 3);
    let mut y = 2;
    while y < 6 {
        tile[y * 2] &= band;
        y += 1;
    }
    tile
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ball {
    pub x: i16,
    pub y: i16,
    pub dx: i16,
    pub dy: i16,
}

impl Ball {
    pub fn new(x: i16, y: i16, dx: i16, dy: i16) -> Self {
        Self { x, y, dx, dy }
    }

    /// One physics tick. Returns true on a floor hit.
    ///
    /// At the floor the ball is clamped, its vertical speed is reversed and
    /// then scaled by 3/4 (arithmetic shift, so it rounds toward -inf), and
    /// its horizontal speed loses one unit toward zero.
    pub fn step(&mut self) -> bool {
        self.dy = (self.dy + GRAVITY).min(MAX_VELOCITY);

        self.x += self.dx;
        if self.x < BALL_MIN_X {
            self.x = BALL_MIN_X;
            self.dx = -self.dx;
        } else if self.x > BALL_MAX_X {
            self.x = BALL_MAX_X;
            self.dx = -self.dx;
        }

        self.y += self.dy;
        if self.y < BALL_MIN_Y {
            self.y = BALL_MIN_Y;
            self.dy = 0;
        }
        if self.y < BALL_MAX_Y {
            return false;
        }
        self.y = BALL_MAX_Y;
        self.dy = (-self.dy * 3) >> 2;
        self.dx -= self.dx.signum();
        true
    }

    pub fn kick(&mut self) {
        self.dy = KICK_VELOCITY;
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Controls {
    kick: bool,
    left: bool,
    right: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bounce {
    ball: Ball,
    bounces: u32,
    frame_counter: u8,
    anim_frame: u8,
    #[serde(skip)]
    drawn: Option<(i16, i16, u8)>,
    #[serde(skip)]
    controls: Controls,
}

impl Default for Bounce {
    fn default() -> Self {
        Self::new()
    }
}

impl Bounce {
    pub fn new() -> Self {
        Self::with_ball(Ball::new(BALL_MIN_X + 8, BALL_MIN_Y, 2, 0))
    }

    pub fn with_ball(ball: Ball) -> Self {
        Self {
            ball,
            bounces: 0,
            frame_counter: 0,
            anim_frame: 0,
            drawn: None,
            controls: Controls::default(),
        }
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }
}

impl Game for Bounce {
    fn name(&self) -> &'static str {
        "bounce"
    }

    fn init(&mut self, kernel: &mut Kernel) -> Result<(), KernelError> {
        kernel.load_tiles(&TileBundle::new(0, &TILES))?;
        let video = kernel.video();
        video.fill(Plane::Background, 0, 0, VISIBLE_COLS, VISIBLE_ROWS, 0);
        video.fill(Plane::Background, 0, FLOOR_ROW, VISIBLE_COLS, 1, FLOOR_TILE);
        video.set_sprite_tile(BALL_SPRITE, BALL_TILE);
        video.set_sprite_attr(BALL_SPRITE, 0);
        Ok(())
    }

    fn handle_input(&mut self, kernel: &mut Kernel) {
        kernel.poll();
        let input = kernel.input();
        self.controls = Controls {
            kick: input.pressed(Button::A),
            left: input.pressed(Button::Left),
            right: input.pressed(Button::Right),
        };
    }

    fn update(&mut self, kernel: &mut Kernel) {
        if self.controls.kick {
            self.ball.kick();
        }
        if self.controls.left {
            self.ball.dx = (self.ball.dx - 1).max(-MAX_DX);
        }
        if self.controls.right {
            self.ball.dx = (self.ball.dx + 1).min(MAX_DX);
        }

        self.frame_counter = self.frame_counter.wrapping_add(1);
        self.anim_frame = (self.frame_counter / ANIM_SPEED) % ANIM_FRAMES;

        let impact = self.ball.dy;
        if self.ball.step() {
            self.bounces += 1;
            if impact > 2 {
                log(LogCategory::Game, LogLevel::Trace, || {
                    format!("floor hit at speed {}", impact)
                });
                kernel.audio().play_tone(
                    NOISE,
                    0,
                    Tone::Noise {
                        width: LfsrWidth::Bits7,
                        clock: 0x31,
                    },
                    Envelope::new(impact.min(15) as u8, false, 1),
                );
            }
        }
    }

    fn render(&mut self, kernel: &mut Kernel) {
        let (x, y, anim) = (self.ball.x, self.ball.y, self.anim_frame);
        let video = kernel.video();
        match self.drawn {
            Some((dx, dy, da)) if (dx, dy, da) == (x, y, anim) => return,
            Some((_, _, da)) if da == anim => {}
            _ => video.set_sprite_tile(BALL_SPRITE, BALL_TILE + anim),
        }
        video.move_sprite(BALL_SPRITE, x as u8, y as u8);
        self.drawn = Some((x, y, anim));
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_hit_reverses_then_dampens() {
        let mut ball = Ball::new(40, 136, 2, 8);
        assert!(ball.step());
        assert_eq!(ball.y, BALL_MAX_Y);
        assert_eq!(ball.dy, -6);
        assert_eq!(ball.dx, 1);
    }

    #[test]
    fn test_terminal_velocity() {
        let mut ball = Ball::new(40, BALL_MIN_Y, 0, 8);
        ball.step();
        assert_eq!(ball.dy, MAX_VELOCITY);
    }

    #[test]
    fn test_side_walls_reflect() {
        let mut ball = Ball::new(BALL_MAX_X - 1, 60, 3, -4);
        ball.step();
        assert_eq!(ball.x, BALL_MAX_X);
        assert_eq!(ball.dx, -3);

        let mut ball = Ball::new(BALL_MIN_X + 1, 60, -3, -4);
        ball.step();
        assert_eq!(ball.x, BALL_MIN_X);
        assert_eq!(ball.dx, 3);
    }

    #[test]
    fn test_ceiling_stops_rise() {
        let mut ball = Ball::new(40, BALL_MIN_Y + 2, 0, -8);
        ball.step();
        assert_eq!(ball.y, BALL_MIN_Y);
        assert_eq!(ball.dy, 0);
    }

    #[test]
    fn test_ball_comes_to_rest() {
        let mut ball = Ball::new(40, BALL_MIN_Y, 0, 0);
        for _ in 0..600 {
            ball.step();
        }
        for _ in 0..10 {
            ball.step();
            assert_eq!(ball.y, BALL_MAX_Y);
        }
    }
}
