//! Game module interface
//!
//! A game owns one state value and exposes four entry points. Every entry
//! point receives the [`Kernel`], which is the only path to input, the RNG,
//! the video queue, audio and NV scratch. There is no ambient global.

use crate::audio::{AudioHost, Mixer, NullAudio};
use crate::clock::FrameClock;
use crate::input::{IdleInput, Input, InputHost};
use crate::lcd::SoftwareLcd;
use crate::logging::{log, LogCategory, LogLevel};
use crate::nv::{NvHost, NvScratch};
use crate::rng::Rng;
use crate::types::Frame;
use crate::video::tile::TileBundle;
use crate::video::{Phase, VideoHost, VideoModel, DEFAULT_VBLANK_BUDGET};
use crate::KernelError;
use serde_json::Value;

/// The four entry points a game supplies, plus a state dump.
pub trait Game {
    /// Registry name (`host <name>`)
    fn name(&self) -> &'static str;

    /// Called once before the display is enabled. Loads tiles, draws the
    /// first screen and sets up state.
    fn init(&mut self, kernel: &mut Kernel) -> Result<(), KernelError>;

    /// Poll the controller and latch this frame's edges into game state.
    fn handle_input(&mut self, kernel: &mut Kernel);

    /// Advance one tick. Video changes go through the queue only.
    fn update(&mut self, kernel: &mut Kernel);

    /// Enqueue the video writes for whatever changed since the last frame.
    fn render(&mut self, kernel: &mut Kernel);

    /// Full game state as JSON, for dumps and replay comparison.
    fn snapshot(&self) -> Value;
}

/// Kernel services handed to every game entry point.
pub struct Kernel {
    pub(crate) video: VideoModel,
    pub(crate) video_host: Box<dyn VideoHost>,
    pub(crate) input: Input,
    pub(crate) input_host: Box<dyn InputHost>,
    pub(crate) rng: Rng,
    pub(crate) nv: NvScratch,
    pub(crate) mixer: Mixer,
    pub(crate) audio_host: Box<dyn AudioHost>,
    pub(crate) clock: FrameClock,
    /// First fatal raised outside the scheduler's own calls
    pub(crate) fault: Option<KernelError>,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Headless kernel: software LCD, idle controller, in-memory NV, no
    /// audio output, unpaced clock, RNG seed 1.
    pub fn new() -> Self {
        Self {
            video: VideoModel::with_budget(DEFAULT_VBLANK_BUDGET),
            video_host: Box::new(SoftwareLcd::new()),
            input: Input::new(),
            input_host: Box::new(IdleInput),
            rng: Rng::default(),
            nv: NvScratch::in_memory(),
            mixer: Mixer::new(),
            audio_host: Box::new(NullAudio),
            clock: FrameClock::manual(),
            fault: None,
        }
    }

    pub fn with_video(mut self, host: Box<dyn VideoHost>) -> Self {
        self.video_host = host;
        self
    }

    pub fn with_input(mut self, host: Box<dyn InputHost>) -> Self {
        self.input_host = host;
        self
    }

    pub fn with_nv(mut self, host: Box<dyn NvHost>) -> Self {
        self.nv = NvScratch::new(host);
        self
    }

    pub fn with_audio(mut self, host: Box<dyn AudioHost>) -> Self {
        self.audio_host = host;
        self
    }

    pub fn with_clock(mut self, clock: FrameClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_seed(mut self, seed: u16) -> Self {
        self.rng.seed(seed);
        self
    }

    pub fn with_vblank_budget(mut self, budget: usize) -> Self {
        self.video = VideoModel::with_budget(budget);
        self
    }

    pub fn video(&mut self) -> &mut VideoModel {
        &mut self.video
    }

    /// Stage the game's tile artwork; only valid during `init`.
    pub fn load_tiles(&mut self, bundle: &TileBundle) -> Result<(), KernelError> {
        self.video.load_tiles(bundle).map_err(|e| self.record(e))
    }

    /// Commit queued video writes now. Only legal from `render`; anywhere
    /// else it is a fatal fault in debug builds.
    pub fn flush_video(&mut self) -> Result<usize, KernelError> {
        match self.video.commit(self.video_host.as_mut()) {
            Ok(n) => Ok(n),
            Err(e) => {
                log(LogCategory::Video, LogLevel::Error, || e.to_string());
                Err(self.record(e))
            }
        }
    }

    /// Keep the first fatal for the scheduler and hand the error back.
    fn record(&mut self, e: KernelError) -> KernelError {
        if self.fault.is_none() {
            self.fault = Some(e.clone());
        }
        e
    }

    /// Read the controller once for this frame.
    pub fn poll(&mut self) {
        self.input.poll(self.input_host.as_mut());
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    /// The replay (if any) driving the controller has run out.
    pub fn input_exhausted(&self) -> bool {
        self.input_host.exhausted()
    }

    pub fn rng(&mut self) -> &mut Rng {
        &mut self.rng
    }

    pub fn nv(&mut self) -> &mut NvScratch {
        &mut self.nv
    }

    pub fn audio(&mut self) -> &mut Mixer {
        &mut self.mixer
    }

    /// Frames completed (wraps at 16 bits)
    pub fn frame(&self) -> u16 {
        self.clock.frame()
    }

    pub fn dropped_frames(&self) -> u32 {
        self.clock.dropped()
    }

    pub fn phase(&self) -> Phase {
        self.video.phase()
    }

    /// The host's last rendered picture, if it renders one.
    pub fn screen(&self) -> Option<Frame> {
        self.video_host.frame()
    }

    pub fn video_host(&self) -> &dyn VideoHost {
        self.video_host.as_ref()
    }

    pub(crate) fn take_fault(&mut self) -> Result<(), KernelError> {
        match self.fault.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
