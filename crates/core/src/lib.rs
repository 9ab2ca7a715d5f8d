//! Deterministic frame-synchronous kernel for small tile-and-sprite games.
//!
//! A game plugs into the kernel through the [`Game`] trait. Each frame the
//! [`Scheduler`] waits for vblank, lets the game render (committing queued
//! video writes), polls input, and runs one update tick.

pub mod audio;
pub mod clock;
pub mod game;
pub mod grid;
pub mod input;
pub mod lcd;
pub mod logging;
pub mod nv;
pub mod rng;
pub mod scheduler;
pub mod video;

pub mod types {
    use serde::{Deserialize, Serialize};

    /// Visible display width in pixels
    pub const SCREEN_WIDTH: usize = 160;
    /// Visible display height in pixels
    pub const SCREEN_HEIGHT: usize = 144;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }
    }
}

pub use game::{Game, Kernel};
pub use scheduler::Scheduler;

/// Fatal kernel conditions. Everything recoverable is an `Option`/`bool`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("tile {index} loaded after the display was enabled")]
    TileLoadAfterDisplay { index: u8 },
    #[error("video committed outside the vblank window during {phase}")]
    VideoPhaseViolation { phase: &'static str },
    #[error("game initialization failed: {0}")]
    GameInit(String),
}
