//! Game loop scheduler
//!
//! One frame:
//!
//! 1. Display pass: the raster outputs 144 lines, running the scanline
//!    trigger chain.
//! 2. `wait_for_vblank`: the single suspension point.
//! 3. Commit the queue, `render`, commit again (all inside vblank).
//! 4. `handle_input` (the game polls the controller).
//! 5. `update`.
//! 6. One audio tick.
//!
//! Writes queued by `handle_input`/`update` in frame F therefore reach the
//! host at the start of frame F+1's render.

use crate::game::{Game, Kernel};
use crate::logging::{log, LogCategory, LogLevel};
use crate::video::Phase;
use crate::KernelError;
use std::convert::Infallible;

pub struct Scheduler {
    game: Box<dyn Game>,
    kernel: Kernel,
}

impl Scheduler {
    /// Run the game's `init` with the display off, then enable the display.
    pub fn new(mut game: Box<dyn Game>, mut kernel: Kernel) -> Result<Self, KernelError> {
        kernel.video.set_phase(Phase::Init);
        game.init(&mut kernel)?;
        kernel.take_fault()?;
        kernel.video.enable_display(kernel.video_host.as_mut());
        log(LogCategory::Scheduler, LogLevel::Info, || {
            format!("{} initialized, display on", game.name())
        });
        Ok(Self { game, kernel })
    }

    /// One full frame. Returns the new frame count.
    pub fn step(&mut self) -> Result<u16, KernelError> {
        let k = &mut self.kernel;

        k.video.set_phase(Phase::Display);
        k.video.scan_out(k.video_host.as_mut());

        let frame = k.clock.wait_for_vblank();

        k.video.begin_vblank();
        k.video.set_phase(Phase::Render);
        k.video.commit(k.video_host.as_mut())?;
        self.game.render(k);
        k.video.set_phase(Phase::Render);
        k.video.commit(k.video_host.as_mut())?;
        k.take_fault()?;

        k.input.begin_frame();
        k.video.set_phase(Phase::Input);
        self.game.handle_input(k);
        k.video.set_phase(Phase::Update);
        self.game.update(k);
        k.take_fault()?;

        k.mixer.tick(k.audio_host.as_mut());

        log(LogCategory::Scheduler, LogLevel::Trace, || {
            format!("frame {} done, {} write(s) pending", frame, k.video.pending())
        });
        Ok(frame)
    }

    /// Step until the input source runs dry or `limit` frames have run.
    /// Returns the number of frames stepped.
    pub fn run_for(&mut self, limit: Option<u64>) -> Result<u64, KernelError> {
        let mut frames = 0u64;
        while limit.map_or(true, |n| frames < n) {
            self.step()?;
            frames += 1;
            if self.kernel.input_exhausted() {
                log(LogCategory::Scheduler, LogLevel::Info, || {
                    format!("input exhausted after {} frame(s)", frames)
                });
                break;
            }
        }
        Ok(frames)
    }

    /// The outer loop. Only a fatal kernel error ends it.
    pub fn run(&mut self) -> Result<Infallible, KernelError> {
        loop {
            self.step()?;
        }
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut Kernel {
        &mut self.kernel
    }

    pub fn game(&self) -> &dyn Game {
        self.game.as_ref()
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "game": self.game.name(),
            "frame": self.kernel.frame(),
            "rng": self.kernel.rng.state(),
            "input": self.kernel.input.snapshot(),
            "audio": self.kernel.mixer.snapshot(),
            "state": self.game.snapshot(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Button, ScriptedInput};
    use crate::video::tile::{solid, TileBundle, TileData};
    use crate::lcd::SharedLcd;
    use crate::video::Plane;
    use serde_json::{json, Value};

    static TILES: [TileData; 2] = [solid(0), solid(3)];

    /// Paints cell (frame, 0) in update and cell (0, 1) in render.
    #[derive(Default)]
    struct Painter {
        ticks: u8,
        a_presses: u32,
    }

    impl Game for Painter {
        fn name(&self) -> &'static str {
            "painter"
        }

        fn init(&mut self, kernel: &mut Kernel) -> Result<(), KernelError> {
            kernel.load_tiles(&TileBundle::new(0, &TILES))
        }

        fn handle_input(&mut self, kernel: &mut Kernel) {
            kernel.poll();
            if kernel.input().pressed(Button::A) {
                self.a_presses += 1;
            }
        }

        fn update(&mut self, kernel: &mut Kernel) {
            self.ticks += 1;
            kernel.video().set_bg_tile(self.ticks, 0, 1);
        }

        fn render(&mut self, kernel: &mut Kernel) {
            kernel.video().set_bg_tile(0, 1, self.ticks);
        }

        fn snapshot(&self) -> Value {
            json!({ "ticks": self.ticks, "a_presses": self.a_presses })
        }
    }

    fn painter() -> (Scheduler, SharedLcd) {
        let lcd = SharedLcd::default();
        let kernel = Kernel::new()
            .with_video(Box::new(lcd.clone()))
            .with_input(Box::new(ScriptedInput::new(vec![0x00, 0x10, 0x10, 0x00, 0x10])));
        let s = Scheduler::new(Box::<Painter>::default(), kernel).unwrap();
        (s, lcd)
    }

    #[test]
    fn test_init_enables_display_with_tiles() {
        let (s, lcd) = painter();
        assert!(lcd.lcd().display_on());
        assert_eq!(lcd.lcd().tile_bytes(1)[0], 0xFF);
        assert_eq!(s.kernel().frame(), 0);
    }

    #[test]
    fn test_update_writes_land_next_render() {
        let (mut s, lcd) = painter();
        assert_eq!(s.step(), Ok(1));
        // Render writes are visible in the same frame
        assert_eq!(lcd.lcd().map_cell(Plane::Background, 0, 1), 0);
        // Update of frame 1 queued cell (1, 0); not yet committed
        assert_eq!(lcd.lcd().map_cell(Plane::Background, 1, 0), 0);
        assert_eq!(s.kernel().video.pending(), 1);

        assert_eq!(s.step(), Ok(2));
        assert_eq!(lcd.lcd().map_cell(Plane::Background, 1, 0), 1);
        assert_eq!(lcd.lcd().map_cell(Plane::Background, 0, 1), 1);
    }

    #[test]
    fn test_frame_counter_advances_once_per_step() {
        let (mut s, lcd) = painter();
        for expected in 1..=3u16 {
            assert_eq!(s.step(), Ok(expected));
        }
        assert_eq!(lcd.lcd().frames_rendered(), 3);
    }

    #[test]
    fn test_run_for_stops_when_replay_ends() {
        let (mut s, _lcd) = painter();
        assert_eq!(s.run_for(None), Ok(5));
        assert_eq!(s.snapshot()["state"]["a_presses"], json!(2));
        assert_eq!(s.snapshot()["frame"], json!(5));
        assert_eq!(s.snapshot()["audio"].as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn test_run_for_respects_limit() {
        let (mut s, _lcd) = painter();
        assert_eq!(s.run_for(Some(2)), Ok(2));
    }

    struct LateLoader;

    impl Game for LateLoader {
        fn name(&self) -> &'static str {
            "late"
        }
        fn init(&mut self, _kernel: &mut Kernel) -> Result<(), KernelError> {
            Ok(())
        }
        fn handle_input(&mut self, _kernel: &mut Kernel) {}
        fn update(&mut self, kernel: &mut Kernel) {
            let _ = kernel.load_tiles(&TileBundle::new(0, &TILES));
        }
        fn render(&mut self, _kernel: &mut Kernel) {}
        fn snapshot(&self) -> Value {
            Value::Null
        }
    }

    #[test]
    fn test_tile_load_after_display_aborts_frame() {
        let mut s = Scheduler::new(Box::new(LateLoader), Kernel::new()).unwrap();
        assert_eq!(
            s.step(),
            Err(KernelError::TileLoadAfterDisplay { index: 0 })
        );
    }

    struct SneakyFlush;

    impl Game for SneakyFlush {
        fn name(&self) -> &'static str {
            "sneaky"
        }
        fn init(&mut self, _kernel: &mut Kernel) -> Result<(), KernelError> {
            Ok(())
        }
        fn handle_input(&mut self, kernel: &mut Kernel) {
            kernel.poll();
        }
        fn update(&mut self, kernel: &mut Kernel) {
            kernel.video().set_bg_tile(0, 0, 1);
            let _ = kernel.flush_video();
        }
        fn render(&mut self, _kernel: &mut Kernel) {}
        fn snapshot(&self) -> Value {
            Value::Null
        }
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_update_committing_video_is_fatal_in_debug() {
        let mut s = Scheduler::new(Box::new(SneakyFlush), Kernel::new()).unwrap();
        assert_eq!(
            s.step(),
            Err(KernelError::VideoPhaseViolation { phase: "update" })
        );
    }
}
