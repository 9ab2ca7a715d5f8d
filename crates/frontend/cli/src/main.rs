use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tile_core::logging::LogConfig;
use tile_host::config::HostConfig;
use tile_host::session::{self, RunOptions};
use tile_host::{apply_log_filter, registry, screenshot};

#[derive(Parser)]
#[command(name = "host", about = "Run one tile-kernel game headless")]
struct Args {
    /// Game to run (see --list)
    #[arg(required_unless_present = "list")]
    game: Option<String>,

    /// Seed for the kernel RNG
    #[arg(long)]
    seed: Option<u16>,

    /// Input trace, one controller byte per frame
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Battery save file
    #[arg(long)]
    nv: Option<PathBuf>,

    /// JSON config (default: host.json next to the executable)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the final state as JSON to this file
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Write the last frame as a PNG image
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Kernel log level, e.g. "info" or "warn,video=trace"
    #[arg(long)]
    log_level: Option<String>,

    /// Also write kernel logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the available games and exit
    #[arg(long, default_value_t = false)]
    list: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list {
        for name in registry::GAMES {
            println!("{}", name);
        }
        return Ok(());
    }

    let config_path = args.config.clone().unwrap_or_else(HostConfig::config_path);
    let config = HostConfig::load_from(&config_path);

    if let Some(filter) = args.log_level.as_ref().or(config.log_level.as_ref()) {
        apply_log_filter(filter)?;
    }
    if let Some(path) = args.log_file.as_ref().or(config.log_file.as_ref()) {
        LogConfig::global()
            .set_log_file(path.clone())
            .with_context(|| format!("opening log file {}", path.display()))?;
    }

    let options = RunOptions {
        game: args.game.clone().unwrap_or_default(),
        seed: args.seed,
        replay: args.replay.clone(),
        nv: args.nv.clone(),
    };
    let mut scheduler = session::start(&options, &config)?;

    if args.replay.is_some() || args.frames.is_some() {
        let frames = scheduler.run_for(args.frames)?;
        log::info!(
            "{} stopped after {} frame(s), {} dropped",
            options.game,
            frames,
            scheduler.kernel().dropped_frames()
        );
    } else {
        let never = scheduler.run()?;
        match never {}
    }

    if let Some(path) = &args.dump {
        let mut f = File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        write!(f, "{}", serde_json::to_string_pretty(&scheduler.snapshot())?)?;
    }
    if let Some(path) = &args.screenshot {
        match scheduler.kernel().screen() {
            Some(frame) => screenshot::write_png(path, &frame)?,
            None => log::warn!("video host keeps no frame, screenshot skipped"),
        }
    }

    LogConfig::global().clear_log_file();
    Ok(())
}
