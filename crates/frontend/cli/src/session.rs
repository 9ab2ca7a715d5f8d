//! Kernel assembly for one host run.

use crate::config::{HostConfig, Pacing};
use crate::file_nv::FileNv;
use crate::registry;
use crate::replay::ReplayInput;
use crate::HostError;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tile_core::clock::FrameClock;
use tile_core::lcd::SoftwareLcd;
use tile_core::{Kernel, Scheduler};

/// Everything a run needs beyond the config file
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub game: String,
    pub seed: Option<u16>,
    pub replay: Option<PathBuf>,
    /// Battery file, overriding the config's `nv_dir`
    pub nv: Option<PathBuf>,
}

/// Build the kernel and initialize the game. Any error here is a host
/// initialization failure.
pub fn start(options: &RunOptions, config: &HostConfig) -> Result<Scheduler> {
    let game = registry::create(&options.game)
        .ok_or_else(|| HostError::UnknownGame(options.game.clone()))?;

    let mut kernel = Kernel::new()
        .with_video(Box::new(SoftwareLcd::with_sprite_cap(config.sprite_line_cap)))
        .with_vblank_budget(config.vblank_write_budget);

    if let Some(seed) = options.seed {
        kernel = kernel.with_seed(seed);
    }

    if let Some(path) = &options.replay {
        let replay = ReplayInput::load(path).context("loading replay")?;
        kernel = kernel.with_input(Box::new(replay));
    }

    let save = options.nv.clone().or_else(|| config.save_path(&options.game));
    if let Some(path) = save {
        let nv = FileNv::open(path).context("opening battery file")?;
        log::info!("battery save at {}", nv.path().display());
        kernel = kernel.with_nv(Box::new(nv));
    }

    let clock = match config.effective_pacing(options.replay.is_some()) {
        Pacing::Realtime => FrameClock::realtime(),
        Pacing::Unpaced => FrameClock::manual(),
    };
    kernel = kernel.with_clock(clock);

    Scheduler::new(game, kernel)
        .with_context(|| format!("initializing {}", options.game))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_game_fails_to_start() {
        let options = RunOptions {
            game: "pong".into(),
            ..RunOptions::default()
        };
        let err = start(&options, &HostConfig::default()).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<HostError>(),
            Some(HostError::UnknownGame(name)) if name == "pong"
        ));
    }

    #[test]
    fn test_same_seed_same_start() {
        let options = RunOptions {
            game: "puzzle".into(),
            seed: Some(0xBEEF),
            ..RunOptions::default()
        };
        let a = start(&options, &HostConfig::default()).unwrap();
        let b = start(&options, &HostConfig::default()).unwrap();
        assert_eq!(a.snapshot(), b.snapshot());
    }
}
