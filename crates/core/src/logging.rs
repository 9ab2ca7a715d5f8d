//! Centralized logging configuration for the kernel.
//!
//! Every kernel component reports through a single category/level filter so
//! the host can turn on exactly the subsystem it is debugging without paying
//! for the others.
//!
//! # Architecture
//!
//! - **LogConfig**: Thread-safe global configuration using atomic operations
//! - **LogLevel**: Hierarchical log levels (Off < Error < Warn < Info < Debug < Trace)
//! - **LogCategory**: Kernel subsystems (Video, Input, Audio, Save, Scheduler, Game)
//! - **log()**: Common logging function for all output with async file I/O
//!
//! # Performance
//!
//! - Messages bound for a file go to a background writer thread via a channel
//! - Console output goes straight to stderr
//! - The message closure is never evaluated when the category is filtered out
//!
//! # Usage
//!
//! ```rust
//! use tile_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Video, LogLevel::Debug, || {
//!     format!("deferred {} writes to next vblank", 12)
//! });
//! ```

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

const CATEGORY_COUNT: usize = 6;

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Log category for the kernel subsystems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Video queue, tile loads, sprite table, scanline triggers
    Video,
    /// Controller polling and replay traces
    Input,
    /// Voice triggers and envelopes
    Audio,
    /// Non-volatile scratch validation and writes
    Save,
    /// Frame clock and game loop ordering
    Scheduler,
    /// Messages emitted by game modules
    Game,
}

impl LogCategory {
    fn index(self) -> usize {
        match self {
            LogCategory::Video => 0,
            LogCategory::Input => 1,
            LogCategory::Audio => 2,
            LogCategory::Save => 3,
            LogCategory::Scheduler => 4,
            LogCategory::Game => 5,
        }
    }

    /// Parse a category name as used on the host command line
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "video" => Some(LogCategory::Video),
            "input" => Some(LogCategory::Input),
            "audio" => Some(LogCategory::Audio),
            "save" | "nv" => Some(LogCategory::Save),
            "scheduler" | "clock" => Some(LogCategory::Scheduler),
            "game" => Some(LogCategory::Game),
            _ => None,
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sliding-window rate limiter, one window per category.
struct RateLimiter {
    max_logs_per_second: AtomicUsize,
    window_duration: Duration,
    timestamps: Mutex<[VecDeque<Instant>; CATEGORY_COUNT]>,
    dropped_counts: Mutex<[usize; CATEGORY_COUNT]>,
    last_drop_report: Mutex<[Option<Instant>; CATEGORY_COUNT]>,
}

impl RateLimiter {
    fn new(max_logs_per_second: usize) -> Self {
        Self {
            max_logs_per_second: AtomicUsize::new(max_logs_per_second),
            window_duration: Duration::from_secs(1),
            timestamps: Mutex::new(Default::default()),
            dropped_counts: Mutex::new([0; CATEGORY_COUNT]),
            last_drop_report: Mutex::new([None; CATEGORY_COUNT]),
        }
    }

    fn set_max_logs_per_second(&self, max: usize) {
        self.max_logs_per_second.store(max, Ordering::Relaxed);
    }

    fn get_max_logs_per_second(&self) -> usize {
        self.max_logs_per_second.load(Ordering::Relaxed)
    }

    /// Returns (allowed, dropped_count) where dropped_count is Some(n) if drops should be reported
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let idx = category.index();

        let mut timestamps = lock(&self.timestamps);
        let mut dropped_counts = lock(&self.dropped_counts);
        let mut last_drop_report = lock(&self.last_drop_report);

        let window = &mut timestamps[idx];
        while let Some(&front) = window.front() {
            if now.duration_since(front) > self.window_duration {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < self.get_max_logs_per_second() {
            window.push_back(now);

            let dropped = dropped_counts[idx];
            if dropped > 0 {
                dropped_counts[idx] = 0;
                last_drop_report[idx] = Some(now);
                return (true, Some(dropped));
            }

            (true, None)
        } else {
            dropped_counts[idx] += 1;

            let should_report = match last_drop_report[idx] {
                None => true,
                Some(last) => now.duration_since(last) >= Duration::from_secs(1),
            };

            if should_report {
                let dropped = dropped_counts[idx];
                dropped_counts[idx] = 0;
                last_drop_report[idx] = Some(now);
                (false, Some(dropped))
            } else {
                (false, None)
            }
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    /// Applies to every category without its own level
    global_level: AtomicU8,
    /// Per-category overrides, indexed by `LogCategory::index`
    levels: [AtomicU8; CATEGORY_COUNT],
    log_sender: Mutex<Option<Sender<String>>>,
    file_logging_enabled: AtomicBool,
    rate_limiter: RateLimiter,
}

impl LogConfig {
    /// All logging disabled, 60 messages per second per category
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            levels: Default::default(),
            log_sender: Mutex::new(None),
            file_logging_enabled: AtomicBool::new(false),
            rate_limiter: RateLimiter::new(60),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        use std::sync::OnceLock;
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category with its own level uses it; otherwise the global level applies.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        let category_level = self.get_level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.get_global_level()
        }
    }

    /// Reset all logging to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for level in &self.levels {
            level.store(LogLevel::Off as u8, Ordering::Relaxed);
        }
    }

    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .set_max_logs_per_second(max_logs_per_second);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.get_max_logs_per_second()
    }

    /// Route output to a file written by a background thread.
    ///
    /// A previously configured writer is replaced; its thread exits once the
    /// old sender is dropped.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                let mut file = file;
                while let Ok(message) = receiver.recv() {
                    let _ = writeln!(file, "{}", message);
                    let _ = file.flush();
                }
                let _ = file.flush();
            })?;

        *lock(&self.log_sender) = Some(sender);
        self.file_logging_enabled.store(true, Ordering::Relaxed);

        Ok(())
    }

    /// Close the log file and go back to stderr
    pub fn clear_log_file(&self) {
        *lock(&self.log_sender) = None;
        self.file_logging_enabled.store(false, Ordering::Relaxed);
    }

    fn write_message(&self, message: &str) {
        if self.file_logging_enabled.load(Ordering::Relaxed) {
            let log_sender = lock(&self.log_sender);
            match log_sender.as_ref() {
                Some(sender) if sender.send(message.to_string()).is_ok() => {}
                _ => eprintln!("{}", message),
            }
        } else {
            eprintln!("{}", message);
        }
    }
}

/// Log a message with the specified category and level.
///
/// The closure only runs when the category/level filter and the rate limiter
/// both let the message through. When messages were dropped by the limiter a
/// one-line summary is emitted first.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if config.should_log(category, level) {
        let (allowed, dropped_count) = config.rate_limiter.should_allow(category);

        if let Some(count) = dropped_count {
            if count > 0 {
                let warning = format!(
                    "[{:?}] WARNING: Rate limit exceeded, {} log message(s) dropped in the last second",
                    category, count
                );
                config.write_message(&warning);
            }
        }

        if allowed {
            let message = format!("[{:?}] {}", category, message_fn());
            config.write_message(&message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_filter_level_names() {
        let names = [
            ("off", LogLevel::Off),
            ("ERR", LogLevel::Error),
            ("WARNING", LogLevel::Warn),
            ("3", LogLevel::Info),
            ("debug", LogLevel::Debug),
            ("TRACE", LogLevel::Trace),
        ];
        for (name, level) in names {
            assert_eq!(LogLevel::from_str(name), Some(level), "{}", name);
        }
        assert_eq!(LogLevel::from_str("loud"), None);
    }

    #[test]
    fn test_category_names() {
        assert_eq!(LogCategory::from_name("Video"), Some(LogCategory::Video));
        assert_eq!(LogCategory::from_name("nv"), Some(LogCategory::Save));
        assert_eq!(LogCategory::from_name("clock"), Some(LogCategory::Scheduler));
        assert_eq!(LogCategory::from_name("cpu"), None);
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Off < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_should_log_with_category_level() {
        let config = LogConfig::new();
        config.set_level(LogCategory::Video, LogLevel::Info);

        assert!(config.should_log(LogCategory::Video, LogLevel::Warn));
        assert!(config.should_log(LogCategory::Video, LogLevel::Info));
        assert!(!config.should_log(LogCategory::Video, LogLevel::Debug));
    }

    #[test]
    fn test_category_level_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Error);
        config.set_level(LogCategory::Save, LogLevel::Debug);

        assert!(config.should_log(LogCategory::Save, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::Audio, LogLevel::Warn));
        assert!(config.should_log(LogCategory::Audio, LogLevel::Error));
    }

    #[test]
    fn test_reset() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        config.set_level(LogCategory::Input, LogLevel::Debug);

        config.reset();

        assert_eq!(config.get_global_level(), LogLevel::Off);
        assert_eq!(config.get_level(LogCategory::Input), LogLevel::Off);
    }

    #[test]
    fn test_scanline_flood_is_capped_per_category() {
        let limiter = RateLimiter::new(60);

        // One sprite-cap trace per visible line of a frame
        let allowed = (0..144)
            .filter(|_| limiter.should_allow(LogCategory::Video).0)
            .count();
        assert_eq!(allowed, 60);

        // A save failure in the same second still gets through
        assert!(limiter.should_allow(LogCategory::Save).0);
        assert!(limiter.should_allow(LogCategory::Scheduler).0);
    }

    #[test]
    fn test_dropped_tone_warnings_are_summarised() {
        let limiter = RateLimiter::new(5);

        for _ in 0..5 {
            limiter.should_allow(LogCategory::Audio);
        }
        // First drop reports immediately, the rest accumulate
        for _ in 0..10 {
            limiter.should_allow(LogCategory::Audio);
        }

        std::thread::sleep(Duration::from_millis(1100));

        let (allowed, dropped) = limiter.should_allow(LogCategory::Audio);
        assert!(allowed);
        assert_eq!(dropped, Some(9));
    }
}
