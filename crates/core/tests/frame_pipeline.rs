//! End-to-end frame pipeline checks through the public kernel API.

use serde_json::{json, Value};
use tile_core::audio::{AudioEvent, Envelope, RecordingAudio, Tone, PULSE1};
use tile_core::input::{Button, ScriptedInput};
use tile_core::lcd::SharedLcd;
use tile_core::logging::{LogCategory, LogConfig, LogLevel};
use tile_core::nv::{MemoryNv, NvHost};
use tile_core::rng::Rng;
use tile_core::video::tile::{solid, TileBundle, TileData};
use tile_core::video::{Plane, RasterRegs, ScanlineCommand};
use tile_core::{Game, Kernel, KernelError, Scheduler};

static TILES: [TileData; 2] = [solid(0), solid(3)];

fn layer_split(line: u8, cmd: &ScanlineCommand, regs: &mut RasterRegs<'_>) -> Option<u8> {
    let (next, value) = match line {
        32 => (64, cmd.params[0]),
        64 => (96, cmd.params[1]),
        _ => (32, cmd.params[2]),
    };
    regs.set_scroll_x(value);
    Some(next)
}

/// Arms the three-layer chain once in init.
struct ThreeLayers;

impl Game for ThreeLayers {
    fn name(&self) -> &'static str {
        "three-layers"
    }

    fn init(&mut self, kernel: &mut Kernel) -> Result<(), KernelError> {
        kernel.load_tiles(&TileBundle::new(0, &TILES))?;
        let video = kernel.video();
        video.set_scroll(0, 0);
        video.set_scanline_command(ScanlineCommand {
            params: [10, 20, 30, 0, 0, 0, 0, 0],
        });
        video.arm_scanline(32, layer_split);
        Ok(())
    }

    fn handle_input(&mut self, kernel: &mut Kernel) {
        kernel.poll();
    }

    fn update(&mut self, _kernel: &mut Kernel) {}

    fn render(&mut self, _kernel: &mut Kernel) {}

    fn snapshot(&self) -> Value {
        Value::Null
    }
}

#[test]
fn parallax_scanline_chain_reprograms_scroll() {
    let lcd = SharedLcd::default();
    let kernel = Kernel::new().with_video(Box::new(lcd.clone()));
    let mut s = Scheduler::new(Box::new(ThreeLayers), kernel).unwrap();

    for _ in 0..3 {
        s.step().unwrap();
        let screen = lcd.lcd();
        let seen: Vec<u8> = [0u8, 31, 32, 63, 64, 95, 96, 143]
            .iter()
            .map(|&l| screen.line_registers(l).scroll_x)
            .collect();
        assert_eq!(seen, vec![0, 0, 10, 10, 20, 20, 30, 30]);
    }
}

/// Records what the game observed each frame.
#[derive(Default)]
struct InputProbe {
    frames: Vec<(u8, u8, u8)>,
}

impl Game for InputProbe {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn init(&mut self, _kernel: &mut Kernel) -> Result<(), KernelError> {
        Ok(())
    }

    fn handle_input(&mut self, kernel: &mut Kernel) {
        kernel.poll();
        let input = kernel.input();
        let snap = input.snapshot();
        self.frames
            .push((snap.previous, snap.current, input.pressed_mask()));
    }

    fn update(&mut self, _kernel: &mut Kernel) {}

    fn render(&mut self, _kernel: &mut Kernel) {}

    fn snapshot(&self) -> Value {
        json!(self.frames)
    }
}

#[test]
fn previous_mask_tracks_prior_frame_for_random_trace() {
    let mut rng = Rng::new(0x5EED);
    let trace: Vec<u8> = (0..200).map(|_| rng.next() as u8).collect();
    let kernel = Kernel::new().with_input(Box::new(ScriptedInput::new(trace.clone())));
    let mut s = Scheduler::new(Box::<InputProbe>::default(), kernel).unwrap();
    assert_eq!(s.run_for(None), Ok(200));

    let frames: Vec<(u8, u8, u8)> = serde_json::from_value(s.game().snapshot()).unwrap();
    let mut last = 0u8;
    for (i, &(previous, current, pressed)) in frames.iter().enumerate() {
        assert_eq!(current, trace[i]);
        assert_eq!(previous, last);
        assert_eq!(pressed, current & !last);
        last = current;
    }
}

#[test]
fn scripted_a_press_edges() {
    let kernel = Kernel::new().with_input(Box::new(ScriptedInput::new(vec![0x00, 0x10, 0x10, 0x00])));
    let mut s = Scheduler::new(Box::<InputProbe>::default(), kernel).unwrap();
    s.step().unwrap();
    s.step().unwrap();
    assert!(s.kernel().input().held(Button::A));
    assert!(s.kernel().input().pressed(Button::A));
    s.step().unwrap();
    assert!(s.kernel().input().held(Button::A));
    assert!(!s.kernel().input().pressed(Button::A));
    s.step().unwrap();
    assert!(!s.kernel().input().held(Button::A));
    assert!(s.kernel().input().released(Button::A));
}

/// Fills a whole map plane from update each frame.
struct Flood {
    tile: u8,
}

impl Game for Flood {
    fn name(&self) -> &'static str {
        "flood"
    }

    fn init(&mut self, kernel: &mut Kernel) -> Result<(), KernelError> {
        kernel.load_tiles(&TileBundle::new(0, &TILES))
    }

    fn handle_input(&mut self, _kernel: &mut Kernel) {}

    fn update(&mut self, kernel: &mut Kernel) {
        if self.tile == 0 {
            self.tile = 1;
            kernel.video().fill(Plane::Background, 0, 0, 32, 32, 1);
        }
    }

    fn render(&mut self, _kernel: &mut Kernel) {}

    fn snapshot(&self) -> Value {
        json!({ "tile": self.tile })
    }
}

#[test]
fn queue_overflow_defers_without_loss() {
    let lcd = SharedLcd::default();
    let kernel = Kernel::new()
        .with_video(Box::new(lcd.clone()))
        .with_vblank_budget(300);
    let mut s = Scheduler::new(Box::new(Flood { tile: 0 }), kernel).unwrap();

    // Frame 1 queues 1024 writes; they drain 300 per vblank from frame 2 on
    s.step().unwrap();
    let drained = |lcd: &SharedLcd| {
        let screen = lcd.lcd();
        (0..32u8)
            .flat_map(|y| (0..32u8).map(move |x| (x, y)))
            .filter(|&(x, y)| screen.map_cell(Plane::Background, x, y) == 1)
            .count()
    };
    let mut seen = Vec::new();
    for _ in 0..4 {
        s.step().unwrap();
        seen.push(drained(&lcd));
    }
    assert_eq!(seen, vec![300, 600, 900, 1024]);

    // Row-major order: the last cell is the last to land
    assert_eq!(lcd.lcd().map_cell(Plane::Background, 31, 31), 1);
}

/// Plays one decaying note on the first frame.
#[derive(Default)]
struct Beeper {
    played: bool,
}

impl Game for Beeper {
    fn name(&self) -> &'static str {
        "beeper"
    }

    fn init(&mut self, _kernel: &mut Kernel) -> Result<(), KernelError> {
        Ok(())
    }

    fn handle_input(&mut self, _kernel: &mut Kernel) {}

    fn update(&mut self, kernel: &mut Kernel) {
        if !self.played {
            self.played = true;
            kernel
                .audio()
                .play_tone(PULSE1, 0x783, Tone::Pulse { duty: 2 }, Envelope::new(15, false, 1));
        }
    }

    fn render(&mut self, _kernel: &mut Kernel) {}

    fn snapshot(&self) -> Value {
        json!({ "played": self.played })
    }
}

#[test]
fn envelope_decays_to_silence_within_a_second() {
    let mut s = Scheduler::new(Box::<Beeper>::default(), Kernel::new()).unwrap();
    s.step().unwrap();
    assert!(s.kernel_mut().audio().volume(PULSE1) > 0);
    for _ in 0..60 {
        s.step().unwrap();
    }
    assert_eq!(s.kernel_mut().audio().volume(PULSE1), 0);
}

#[test]
fn recording_host_sees_trigger_then_steps() {
    let mut mixer = tile_core::audio::Mixer::new();
    let mut host = RecordingAudio::default();
    mixer.play_tone(PULSE1, 0x783, Tone::Pulse { duty: 2 }, Envelope::new(15, false, 1));
    for _ in 0..30 {
        mixer.tick(&mut host);
    }
    assert!(matches!(host.events[0], AudioEvent::Trigger { voice: 0, volume: 15, .. }));
    assert_eq!(host.events.last(), Some(&AudioEvent::Volume { voice: 0, volume: 0 }));
}

#[test]
fn save_survives_a_fresh_process() {
    // First run stores a high score of 1
    let mut first = tile_core::nv::NvScratch::new(Box::new(MemoryNv::new(8)));
    first.set_magic(0x42);
    first.store(&[0x01, 0x00]);

    // The battery contents carry over to the next process
    let mut battery = MemoryNv::new(8);
    battery.enable();
    for addr in 0..8 {
        battery.write(addr, [0x42, 0x01, 0, 0, 0, 0, 0, 0][addr]);
    }
    battery.disable();

    let mut second = tile_core::nv::NvScratch::new(Box::new(battery));
    second.set_magic(0x42);
    assert_eq!(&second.load().unwrap()[..2], &[0x01, 0x00]);
    second.clear();
    assert!(second.load().is_none());
}

#[test]
fn logging_levels_are_configurable_per_category() {
    let config = LogConfig::global();
    config.set_level(LogCategory::Game, LogLevel::Trace);
    assert!(config.should_log(LogCategory::Game, LogLevel::Trace));
    config.set_level(LogCategory::Game, LogLevel::Off);
    assert!(!config.should_log(LogCategory::Game, LogLevel::Error));
}
