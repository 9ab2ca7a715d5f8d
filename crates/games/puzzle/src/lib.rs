//! Falling-block puzzle
//!
//! Seven tetromino shapes drop into a 10 x 18 well drawn on the background
//! plane. Full rows clear and score on a 100/300/500/800 schedule.
//!
//! `handle_input` latches this frame's edges, `update` applies them and the
//! gravity timer, and `render` redraws only the cells the active piece left
//! or entered. Locks and clears force one full redraw of the well.

pub mod board;
pub mod pieces;

use board::{Board, GRID_HEIGHT, GRID_WIDTH};
use pieces::{Piece, Shape, SHAPE_COUNT};
use serde::Serialize;
use serde_json::Value;
use tile_core::audio::{Envelope, LfsrWidth, Tone, NOISE, PULSE1};
use tile_core::input::Button;
use tile_core::logging::{log, LogCategory, LogLevel};
use tile_core::video::tile::{TileBundle, TileData};
use tile_core::video::{Plane, VideoModel, VISIBLE_COLS, VISIBLE_ROWS};
use tile_core::{Game, Kernel, KernelError};

pub const EMPTY_TILE: u8 = 0;
pub const BLOCK_TILE: u8 = 1;
pub const ACTIVE_TILE: u8 = 2;
pub const WALL_TILE: u8 = 3;

/// Screen column of the well's first cell
pub const GRID_OFFSET_X: u8 = 5;
pub const SPAWN_X: i8 = 3;
pub const SPAWN_Y: i8 = 0;

/// Frames per descent
pub const DROP_NORMAL: u8 = 30;
pub const DROP_SOFT: u8 = 3;

/// Background palettes while playing and after game over
pub const PLAY_PALETTE: u8 = 0xE4;
pub const GAME_OVER_PALETTE: u8 = 0x1B;

/// Points for 0..=4 lines cleared by one lock
pub const SCORE_TABLE: [u32; 5] = [0, 100, 300, 500, 800];

static TILES: [TileData; 4] = [
    [0; 16],
    [
        0xFF, 0xFF, 0x81, 0xFF, 0x81, 0xFF, 0x81, 0xFF, 0x81, 0xFF, 0x81, 0xFF, 0x81, 0xFF, 0xFF,
        0xFF,
    ],
    [
        0xFF, 0xFF, 0xC3, 0xFF, 0xA5, 0xFF, 0x99, 0xFF, 0x99, 0xFF, 0xA5, 0xFF, 0xC3, 0xFF, 0xFF,
        0xFF,
    ],
    [0xFF; 16],
];

const GAME_OVER_ROW: u8 = 9;
const GAME_OVER_COLS: std::ops::Range<u8> = 6..14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PuzzleState {
    Playing,
    LineClear,
    GameOver,
}

/// Edges latched by `handle_input` for the next `update`.
#[derive(Debug, Default, Clone, Copy)]
struct Controls {
    left: bool,
    right: bool,
    rotate: bool,
    restart: bool,
    soft_drop: bool,
    held: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct Puzzle {
    board: Board,
    current: Piece,
    next: Shape,
    /// Footprint drawn last frame, for incremental redraw
    #[serde(skip)]
    drawn: Option<Piece>,
    drop_timer: u8,
    score: u32,
    lines: u32,
    locked: u32,
    state: PuzzleState,
    #[serde(skip)]
    controls: Controls,
    #[serde(skip)]
    needs_redraw: bool,
    #[serde(skip)]
    preset: bool,
}

impl Default for Puzzle {
    fn default() -> Self {
        Self::new()
    }
}

impl Puzzle {
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            current: Piece::new(Shape::I, SPAWN_X, SPAWN_Y),
            next: Shape::I,
            drawn: None,
            drop_timer: 0,
            score: 0,
            lines: 0,
            locked: 0,
            state: PuzzleState::Playing,
            controls: Controls::default(),
            needs_redraw: true,
            preset: false,
        }
    }

    /// Start from a prepared well with a given active piece. `init` keeps
    /// the position instead of spawning.
    pub fn with_position(board: Board, current: Piece, next: Shape) -> Self {
        Self {
            board,
            current,
            next,
            preset: true,
            ..Self::new()
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current(&self) -> &Piece {
        &self.current
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn lines(&self) -> u32 {
        self.lines
    }

    pub fn state(&self) -> PuzzleState {
        self.state
    }

    fn random_shape(kernel: &mut Kernel) -> Shape {
        Shape::from_index(kernel.rng().below(SHAPE_COUNT as u16))
    }

    fn reset(&mut self, kernel: &mut Kernel) {
        self.board.clear();
        self.score = 0;
        self.lines = 0;
        self.locked = 0;
        self.state = PuzzleState::Playing;
        self.next = Self::random_shape(kernel);
        self.spawn(kernel);
        self.needs_redraw = true;
    }

    fn spawn(&mut self, kernel: &mut Kernel) {
        self.current = Piece::new(self.next, SPAWN_X, SPAWN_Y);
        self.next = Self::random_shape(kernel);
        self.drop_timer = 0;
        if !self.board.can_place(&self.current) {
            self.state = PuzzleState::GameOver;
            self.needs_redraw = true;
            log(LogCategory::Game, LogLevel::Info, || {
                format!("game over: score {} after {} line(s)", self.score, self.lines)
            });
            kernel.audio().silence_all();
            kernel.audio().play_tone(
                NOISE,
                0,
                Tone::Noise {
                    width: LfsrWidth::Bits15,
                    clock: 0x55,
                },
                Envelope::new(15, false, 3),
            );
        } else {
            self.state = PuzzleState::Playing;
        }
    }

    fn try_move(&mut self, candidate: Piece) -> bool {
        if self.board.can_place(&candidate) {
            self.current = candidate;
            true
        } else {
            false
        }
    }

    fn lock(&mut self, kernel: &mut Kernel) {
        self.board.lock(&self.current);
        self.locked += 1;
        let cleared = self.board.clear_lines();
        self.needs_redraw = true;
        if cleared == 0 {
            self.spawn(kernel);
            return;
        }
        self.score += SCORE_TABLE[cleared as usize];
        self.lines += cleared as u32;
        self.state = PuzzleState::LineClear;
        log(LogCategory::Game, LogLevel::Debug, || {
            format!("cleared {} line(s), score {}", cleared, self.score)
        });
        kernel
            .audio()
            .play_tone(PULSE1, 0x6D6, Tone::Pulse { duty: 2 }, Envelope::new(12, false, 2));
    }

    fn gravity(&mut self, kernel: &mut Kernel) {
        let interval = if self.controls.soft_drop {
            DROP_SOFT
        } else {
            DROP_NORMAL
        };
        self.drop_timer += 1;
        if self.drop_timer < interval {
            return;
        }
        self.drop_timer = 0;
        if !self.try_move(self.current.moved(0, 1)) {
            self.lock(kernel);
        }
    }

    fn draw_cell(video: &mut VideoModel, gx: i8, gy: i8, tile: u8) {
        if (0..GRID_WIDTH as i8).contains(&gx) && (0..GRID_HEIGHT as i8).contains(&gy) {
            video.set_bg_tile(GRID_OFFSET_X + gx as u8, gy as u8, tile);
        }
    }

    fn board_tile(&self, gx: i8, gy: i8) -> u8 {
        if gx >= 0 && gy >= 0 && self.board.filled(gx as usize, gy as usize) {
            BLOCK_TILE
        } else {
            EMPTY_TILE
        }
    }

    fn redraw_well(&self, video: &mut VideoModel) {
        for gy in 0..GRID_HEIGHT as i8 {
            for gx in 0..GRID_WIDTH as i8 {
                Self::draw_cell(video, gx, gy, self.board_tile(gx, gy));
            }
        }
    }
}

impl Game for Puzzle {
    fn name(&self) -> &'static str {
        "puzzle"
    }

    fn init(&mut self, kernel: &mut Kernel) -> Result<(), KernelError> {
        kernel.load_tiles(&TileBundle::new(0, &TILES))?;
        let video = kernel.video();
        video.fill(Plane::Background, 0, 0, VISIBLE_COLS, VISIBLE_ROWS, EMPTY_TILE);
        video.fill(Plane::Background, GRID_OFFSET_X - 1, 0, 1, VISIBLE_ROWS, WALL_TILE);
        video.fill(
            Plane::Background,
            GRID_OFFSET_X + GRID_WIDTH as u8,
            0,
            1,
            VISIBLE_ROWS,
            WALL_TILE,
        );
        video.set_scroll(0, 0);

        if self.preset {
            self.needs_redraw = true;
        } else {
            self.reset(kernel);
        }
        Ok(())
    }

    fn handle_input(&mut self, kernel: &mut Kernel) {
        kernel.poll();
        let input = kernel.input();
        self.controls = Controls {
            left: input.pressed(Button::Left),
            right: input.pressed(Button::Right),
            rotate: input.pressed(Button::A),
            restart: input.pressed(Button::Start),
            soft_drop: input.held(Button::Down),
            held: input.held_mask(),
        };
    }

    fn update(&mut self, kernel: &mut Kernel) {
        kernel
            .rng()
            .mix(self.controls.held.wrapping_add(self.drop_timer));

        match self.state {
            PuzzleState::GameOver => {
                if self.controls.restart {
                    self.reset(kernel);
                }
            }
            PuzzleState::LineClear => self.spawn(kernel),
            PuzzleState::Playing => {
                if self.controls.left {
                    self.try_move(self.current.moved(-1, 0));
                }
                if self.controls.right {
                    self.try_move(self.current.moved(1, 0));
                }
                if self.controls.rotate {
                    self.try_move(self.current.rotated());
                }
                self.gravity(kernel);
            }
        }
    }

    fn render(&mut self, kernel: &mut Kernel) {
        let video = kernel.video();

        if self.needs_redraw {
            self.needs_redraw = false;
            self.drawn = None;
            self.redraw_well(video);
            if self.state == PuzzleState::GameOver {
                for col in GAME_OVER_COLS {
                    video.set_bg_tile(col, GAME_OVER_ROW, WALL_TILE);
                }
                video.set_bg_palette(GAME_OVER_PALETTE);
            } else {
                video.set_bg_palette(PLAY_PALETTE);
            }
        }
        if self.state != PuzzleState::Playing {
            return;
        }

        if let Some(prev) = self.drawn {
            for (gx, gy) in prev.cells() {
                if !self.current.covers(gx, gy) {
                    Self::draw_cell(video, gx, gy, self.board_tile(gx, gy));
                }
            }
        }
        for (gx, gy) in self.current.cells() {
            Self::draw_cell(video, gx, gy, ACTIVE_TILE);
        }
        self.drawn = Some(self.current);
    }

    fn snapshot(&self) -> Value {
        let mut state = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut state {
            map.insert("filled".into(), self.board.count().into());
        }
        state
    }
}
