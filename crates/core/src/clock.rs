//! Frame clock
//!
//! The display refreshes once every 70224 dot clocks of a 4.194304 MHz
//! master clock, about 59.73 Hz. The clock exposes one blocking primitive,
//! [`FrameClock::wait_for_vblank`], and a wrapping 16-bit frame counter.
//!
//! # Overruns
//!
//! If the caller is still busy when a vblank boundary passes, that vblank is
//! lost: the clock waits for the next boundary after "now" instead of
//! returning immediately for every boundary it missed. The counter still
//! advances by exactly one per return; the skipped boundaries are counted in
//! [`FrameClock::dropped`].

use crate::logging::{log, LogCategory, LogLevel};
use std::time::{Duration, Instant};

/// Master clock frequency of the display hardware
pub const MASTER_CLOCK_HZ: u64 = 4_194_304;

/// Dot clocks per displayed frame (154 lines of 456 dots)
pub const CYCLES_PER_FRAME: u64 = 70_224;

/// Nominal duration of one frame (~16.74 ms)
pub fn frame_period() -> Duration {
    Duration::from_nanos(CYCLES_PER_FRAME * 1_000_000_000 / MASTER_CLOCK_HZ)
}

/// Source of vertical-blank transitions.
pub trait VblankSource {
    /// Block until the next vblank boundary.
    ///
    /// Returns how many frame periods elapsed since the previous return:
    /// 1 when the caller kept up, more when boundaries were missed.
    fn wait_vblank(&mut self) -> u32;
}

/// Sleep-based pacing against the monotonic clock.
pub struct SleepTiming {
    period: Duration,
    deadline: Option<Instant>,
}

impl SleepTiming {
    pub fn new() -> Self {
        Self::with_period(frame_period())
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            deadline: None,
        }
    }
}

impl Default for SleepTiming {
    fn default() -> Self {
        Self::new()
    }
}

impl VblankSource for SleepTiming {
    fn wait_vblank(&mut self) -> u32 {
        let now = Instant::now();
        let deadline = match self.deadline {
            Some(d) => d,
            None => {
                // First call: the first boundary is one period from now
                let d = now + self.period;
                std::thread::sleep(self.period);
                self.deadline = Some(d + self.period);
                return 1;
            }
        };

        let mut target = deadline;
        let mut periods = 1;
        if now > deadline {
            let late = now.duration_since(deadline);
            let missed = (late.as_nanos() / self.period.as_nanos().max(1)) as u32 + 1;
            target = deadline + self.period * missed;
            periods += missed;
        }

        let now = Instant::now();
        if target > now {
            std::thread::sleep(target - now);
        }
        self.deadline = Some(target + self.period);
        periods
    }
}

/// Non-sleeping source for replays, tests and benchmarks.
///
/// Every wait returns immediately; an overrun can be simulated with
/// [`ManualTiming::overrun`].
#[derive(Debug, Default)]
pub struct ManualTiming {
    pending_overrun: u32,
}

impl ManualTiming {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next wait report `periods` missed boundaries.
    pub fn overrun(&mut self, periods: u32) {
        self.pending_overrun = periods;
    }
}

impl VblankSource for ManualTiming {
    fn wait_vblank(&mut self) -> u32 {
        1 + std::mem::take(&mut self.pending_overrun)
    }
}

pub struct FrameClock {
    source: Box<dyn VblankSource>,
    frame: u16,
    dropped: u32,
}

impl FrameClock {
    pub fn new(source: Box<dyn VblankSource>) -> Self {
        Self {
            source,
            frame: 0,
            dropped: 0,
        }
    }

    /// Clock that never sleeps
    pub fn manual() -> Self {
        Self::new(Box::new(ManualTiming::new()))
    }

    /// Clock paced at the nominal 59.73 Hz
    pub fn realtime() -> Self {
        Self::new(Box::new(SleepTiming::new()))
    }

    /// Block until the next vblank and return the new frame count.
    pub fn wait_for_vblank(&mut self) -> u16 {
        let periods = self.source.wait_vblank();
        if periods > 1 {
            let missed = periods - 1;
            self.dropped = self.dropped.saturating_add(missed);
            log(LogCategory::Scheduler, LogLevel::Debug, || {
                format!("frame {} overran, dropped {} vblank(s)", self.frame, missed)
            });
        }
        self.frame = self.frame.wrapping_add(1);
        self.frame
    }

    /// Frames completed so far (wraps at 16 bits)
    pub fn frame(&self) -> u16 {
        self.frame
    }

    /// Vblank boundaries lost to overruns
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}
