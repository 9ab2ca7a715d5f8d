//! Four-voice audio mixer
//!
//! ## Voices
//!
//! 0. **Pulse 1**: square wave, duty 12.5/25/50/75%
//! 1. **Pulse 2**: same as pulse 1
//! 2. **Wave**: 32 x 4-bit samples, output level mute/100/50/25%
//! 3. **Noise**: LFSR noise, 15-bit or 7-bit width
//!
//! Voices 0, 1 and 3 have a volume envelope (NRx2 layout: `VVVV APPP`,
//! start volume, direction, step period). Envelopes step at 64 Hz; the
//! mixer derives those ticks from the frame rate with an integer cycle
//! accumulator, so one frame advances 70224 master cycles and one envelope
//! step takes 65536.
//!
//! Everything here is advisory. A faithful host reproduces the envelope from
//! the volume changes it is told about; a minimal host only starts and stops
//! tones.

use crate::clock::CYCLES_PER_FRAME;
use crate::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

pub const VOICE_COUNT: usize = 4;
pub const PULSE1: u8 = 0;
pub const PULSE2: u8 = 1;
pub const WAVE: u8 = 2;
pub const NOISE: u8 = 3;

/// Master cycles per 64 Hz envelope step
const CYCLES_PER_ENVELOPE_STEP: u32 = 65_536;

/// Volume envelope settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Start volume (0-15)
    pub volume: u8,
    /// true = volume rises, false = decays
    pub increase: bool,
    /// Steps happen every `step` 64 Hz ticks; 0 holds the volume
    pub step: u8,
}

impl Envelope {
    pub const fn new(volume: u8, increase: bool, step: u8) -> Self {
        Self {
            volume: volume & 0x0F,
            increase,
            step: step & 0x07,
        }
    }

    /// Decode an NRx2-style byte.
    pub const fn from_register(val: u8) -> Self {
        Self::new(val >> 4, val & 0x08 != 0, val & 0x07)
    }

    pub const fn to_register(self) -> u8 {
        (self.volume << 4) | if self.increase { 0x08 } else { 0 } | self.step
    }
}

/// Noise LFSR width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LfsrWidth {
    Bits15,
    /// Short, metallic period
    Bits7,
}

/// Voice-specific tone parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    /// Duty selector 0-3 (12.5%, 25%, 50%, 75%)
    Pulse { duty: u8 },
    /// 32 packed 4-bit samples, high nibble first; level 0=mute 1=100% 2=50% 3=25%
    Wave { samples: [u8; 16], level: u8 },
    /// LFSR width plus the polynomial clock byte (`SSSS -DDD`)
    Noise { width: LfsrWidth, clock: u8 },
}

impl Tone {
    fn fits(&self, voice: u8) -> bool {
        matches!(
            (self, voice),
            (Tone::Pulse { .. }, PULSE1 | PULSE2) | (Tone::Wave { .. }, WAVE) | (Tone::Noise { .. }, NOISE)
        )
    }
}

/// Pulse voice pitch for an 11-bit frequency divisor.
pub fn pulse_hz(freq11: u16) -> f32 {
    131_072.0 / (2048 - (freq11 & 0x7FF) as u32) as f32
}

/// Wave voice pitch (one full 32-sample cycle).
pub fn wave_hz(freq11: u16) -> f32 {
    65_536.0 / (2048 - (freq11 & 0x7FF) as u32) as f32
}

/// Per-voice register pokes as seen by the kernel.
pub trait AudioHost {
    /// Start a note. `freq11` is ignored for the noise voice.
    fn trigger(&mut self, voice: u8, freq11: u16, tone: &Tone, volume: u8);
    /// Envelope or silence changed the voice's volume.
    fn set_volume(&mut self, voice: u8, volume: u8);
    /// Voice switched off.
    fn stop(&mut self, voice: u8);
}

#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioHost for NullAudio {
    fn trigger(&mut self, _voice: u8, _freq11: u16, _tone: &Tone, _volume: u8) {}
    fn set_volume(&mut self, _voice: u8, _volume: u8) {}
    fn stop(&mut self, _voice: u8) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioEvent {
    Trigger { voice: u8, freq11: u16, tone: Tone, volume: u8 },
    Volume { voice: u8, volume: u8 },
    Stop { voice: u8 },
}

/// Host that keeps every poke, for tests.
#[derive(Debug, Default)]
pub struct RecordingAudio {
    pub events: Vec<AudioEvent>,
}

impl AudioHost for RecordingAudio {
    fn trigger(&mut self, voice: u8, freq11: u16, tone: &Tone, volume: u8) {
        self.events.push(AudioEvent::Trigger {
            voice,
            freq11,
            tone: *tone,
            volume,
        });
    }

    fn set_volume(&mut self, voice: u8, volume: u8) {
        self.events.push(AudioEvent::Volume { voice, volume });
    }

    fn stop(&mut self, voice: u8) {
        self.events.push(AudioEvent::Stop { voice });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Trigger { freq11: u16, tone: Tone, envelope: Envelope },
    Silence,
    Off,
}

#[derive(Debug, Clone, Default, Serialize)]
struct VoiceState {
    enabled: bool,
    volume: u8,
    frequency: u16,
    envelope: Envelope,
    /// 64 Hz ticks until the next envelope step
    timer: u8,
    #[serde(skip)]
    pending: Option<Pending>,
}

impl VoiceState {
    /// One 64 Hz envelope tick; true if the volume changed.
    fn clock_envelope(&mut self) -> bool {
        if !self.enabled || self.envelope.step == 0 {
            return false;
        }
        if self.timer > 1 {
            self.timer -= 1;
            return false;
        }
        self.timer = self.envelope.step;
        let before = self.volume;
        if self.envelope.increase {
            self.volume = (self.volume + 1).min(15);
        } else {
            self.volume = self.volume.saturating_sub(1);
        }
        self.volume != before
    }
}

/// Note-on / note-off / silence front end over an [`AudioHost`].
///
/// Requests take effect at the next [`Mixer::tick`], which the scheduler
/// runs once per frame.
#[derive(Debug, Default)]
pub struct Mixer {
    voices: [VoiceState; VOICE_COUNT],
    cycles: u32,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger a note. Returns false (and plays nothing) when the voice id is
    /// out of range or the tone kind does not match the voice.
    pub fn play_tone(&mut self, voice: u8, freq11: u16, tone: Tone, envelope: Envelope) -> bool {
        let Some(state) = self.voices.get_mut(voice as usize) else {
            log(LogCategory::Audio, LogLevel::Warn, || {
                format!("no voice {}", voice)
            });
            return false;
        };
        if !tone.fits(voice) {
            log(LogCategory::Audio, LogLevel::Warn, || {
                format!("tone {:?} does not fit voice {}", tone, voice)
            });
            return false;
        }
        state.pending = Some(Pending::Trigger {
            freq11: freq11 & 0x7FF,
            tone,
            envelope,
        });
        true
    }

    /// Volume to zero at the next tick; the voice stays enabled.
    pub fn silence(&mut self, voice: u8) {
        if let Some(state) = self.voices.get_mut(voice as usize) {
            state.pending = Some(Pending::Silence);
        }
    }

    pub fn note_off(&mut self, voice: u8) {
        if let Some(state) = self.voices.get_mut(voice as usize) {
            state.pending = Some(Pending::Off);
        }
    }

    pub fn silence_all(&mut self) {
        for voice in 0..VOICE_COUNT as u8 {
            self.silence(voice);
        }
    }

    pub fn volume(&self, voice: u8) -> u8 {
        self.voices.get(voice as usize).map_or(0, |v| v.volume)
    }

    pub fn enabled(&self, voice: u8) -> bool {
        self.voices.get(voice as usize).is_some_and(|v| v.enabled)
    }

    pub fn frequency(&self, voice: u8) -> u16 {
        self.voices.get(voice as usize).map_or(0, |v| v.frequency)
    }

    /// One frame of audio time: apply requests, then run due envelope steps.
    pub fn tick(&mut self, host: &mut dyn AudioHost) {
        for (id, state) in self.voices.iter_mut().enumerate() {
            let voice = id as u8;
            match state.pending.take() {
                Some(Pending::Trigger {
                    freq11,
                    tone,
                    envelope,
                }) => {
                    state.enabled = true;
                    state.frequency = freq11;
                    // The wave voice has no envelope; its level is the volume
                    state.envelope = if voice == WAVE {
                        Envelope::new(15, false, 0)
                    } else {
                        envelope
                    };
                    state.volume = state.envelope.volume;
                    state.timer = state.envelope.step;
                    host.trigger(voice, freq11, &tone, state.volume);
                }
                Some(Pending::Silence) => {
                    if state.volume != 0 {
                        state.volume = 0;
                        host.set_volume(voice, 0);
                    }
                }
                Some(Pending::Off) => {
                    if state.enabled {
                        state.enabled = false;
                        state.volume = 0;
                        host.stop(voice);
                    }
                }
                None => {}
            }
        }

        self.cycles += CYCLES_PER_FRAME as u32;
        while self.cycles >= CYCLES_PER_ENVELOPE_STEP {
            self.cycles -= CYCLES_PER_ENVELOPE_STEP;
            for (id, state) in self.voices.iter_mut().enumerate() {
                if state.clock_envelope() {
                    host.set_volume(id as u8, state.volume);
                }
            }
        }
    }

    /// Voice states for debugging dumps.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(&self.voices).unwrap_or(serde_json::Value::Null)
    }
}
