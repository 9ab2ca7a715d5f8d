//! Captured input traces.
//!
//! A trace file holds one controller mask per frame in the order the kernel
//! reads them (bit 0 Right, 1 Left, 2 Up, 3 Down, 4 A, 5 B, 6 Select,
//! 7 Start). There is no header.

use crate::HostError;
use std::fs;
use std::path::Path;
use tile_core::input::{InputHost, ScriptedInput};
use tile_core::logging::{log, LogCategory, LogLevel};

pub struct ReplayInput {
    trace: ScriptedInput,
    frames: usize,
    reported: bool,
}

impl ReplayInput {
    pub fn new(masks: Vec<u8>) -> Self {
        Self {
            frames: masks.len(),
            trace: ScriptedInput::new(masks),
            reported: false,
        }
    }

    pub fn load(path: &Path) -> Result<Self, HostError> {
        let masks = fs::read(path).map_err(|source| HostError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        log(LogCategory::Input, LogLevel::Info, || {
            format!("replaying {} frames from {}", masks.len(), path.display())
        });
        Ok(Self::new(masks))
    }

    /// Frames in the whole trace
    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl InputHost for ReplayInput {
    fn read(&mut self) -> u8 {
        let mask = self.trace.read();
        if self.trace.exhausted() && !self.reported {
            self.reported = true;
            log(LogCategory::Input, LogLevel::Debug, || {
                format!("replay finished after {} frames", self.frames)
            });
        }
        mask
    }

    fn exhausted(&self) -> bool {
        self.trace.exhausted()
    }
}

/// Write a trace file for `masks`.
pub fn save_trace(path: &Path, masks: &[u8]) -> Result<(), HostError> {
    fs::write(path, masks).map_err(|source| HostError::Write {
        path: path.to_path_buf(),
        source,
    })
}
