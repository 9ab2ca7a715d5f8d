//! Input edge detector
//!
//! The controller is read as one byte per frame. Bit order is fixed by the
//! host interface: 0=Right, 1=Left, 2=Up, 3=Down, 4=A, 5=B, 6=Select, 7=Start.
//! A set bit means the button is down.

use crate::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Right,
        Button::Left,
        Button::Up,
        Button::Down,
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
    ];

    pub const fn bit(self) -> u8 {
        match self {
            Button::Right => 0,
            Button::Left => 1,
            Button::Up => 2,
            Button::Down => 3,
            Button::A => 4,
            Button::B => 5,
            Button::Select => 6,
            Button::Start => 7,
        }
    }

    pub const fn mask(self) -> u8 {
        1 << self.bit()
    }
}

/// Controller as seen by the kernel.
pub trait InputHost {
    /// Current button mask in the fixed bit order.
    fn read(&mut self) -> u8;

    /// True once a finite input source (a replay) has nothing left to give.
    fn exhausted(&self) -> bool {
        false
    }
}

/// A controller with nothing pressed.
#[derive(Debug, Default)]
pub struct IdleInput;

impl InputHost for IdleInput {
    fn read(&mut self) -> u8 {
        0
    }
}

/// Plays back a fixed mask sequence, one byte per read, then reports
/// exhaustion and reads as idle.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    masks: Vec<u8>,
    cursor: usize,
}

impl ScriptedInput {
    pub fn new(masks: Vec<u8>) -> Self {
        Self { masks, cursor: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.masks.len().saturating_sub(self.cursor)
    }
}

impl InputHost for ScriptedInput {
    fn read(&mut self) -> u8 {
        match self.masks.get(self.cursor) {
            Some(&mask) => {
                self.cursor += 1;
                mask
            }
            None => 0,
        }
    }

    fn exhausted(&self) -> bool {
        self.cursor >= self.masks.len()
    }
}

/// Current and previous controller masks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub current: u8,
    pub previous: u8,
}

/// Edge detector over two consecutive polls.
///
/// Edge queries only answer after [`Input::poll`] ran in the current frame;
/// a game that forgets to poll sees no edges.
#[derive(Debug, Default)]
pub struct Input {
    snapshot: InputSnapshot,
    polled: bool,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one mask from the host and shift the old one into `previous`.
    pub fn poll(&mut self, host: &mut dyn InputHost) {
        if self.polled {
            log(LogCategory::Input, LogLevel::Warn, || {
                "poll called twice in one frame".to_string()
            });
        }
        self.snapshot.previous = self.snapshot.current;
        self.snapshot.current = host.read();
        self.polled = true;
    }

    /// Frame boundary: edges from the last poll stop being reported.
    pub(crate) fn begin_frame(&mut self) {
        self.polled = false;
    }

    pub fn held(&self, button: Button) -> bool {
        self.snapshot.current & button.mask() != 0
    }

    /// Rose from 0 to 1 since the previous poll
    pub fn pressed(&self, button: Button) -> bool {
        self.pressed_mask() & button.mask() != 0
    }

    /// Fell from 1 to 0 since the previous poll
    pub fn released(&self, button: Button) -> bool {
        self.released_mask() & button.mask() != 0
    }

    pub fn held_mask(&self) -> u8 {
        self.snapshot.current
    }

    pub fn pressed_mask(&self) -> u8 {
        if !self.polled {
            return 0;
        }
        self.snapshot.current & !self.snapshot.previous
    }

    pub fn released_mask(&self) -> u8 {
        if !self.polled {
            return 0;
        }
        !self.snapshot.current & self.snapshot.previous
    }

    pub fn snapshot(&self) -> InputSnapshot {
        self.snapshot
    }
}
