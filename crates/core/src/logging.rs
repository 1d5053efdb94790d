//! Centralized logging configuration for the emulator.
//!
//! # Architecture
//!
//! - **LogConfig**: process-wide configuration stored in atomics
//! - **LogLevel**: Off < Error < Warn < Info < Debug < Trace
//! - **LogCategory**: one level per emulated component
//! - **log()**: lazy message construction, rate limited per category,
//!   written to stderr or handed to a background file writer
//!
//! Logging never influences emulation; a machine behaves identically with
//! every category switched off.
//!
//! # Usage
//!
//! ```rust
//! use emu_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Cartridge, LogLevel::Debug, || {
//!     format!("Cartridge: bank {} selected", 3)
//! });
//! ```

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

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

/// Log category for different emulator components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Instruction execution
    CPU,
    /// Address decoding and memory-mapped registers
    Bus,
    /// Cartridge parsing and bank switching
    Cartridge,
    /// Display-list DMA and scanline rendering
    Graphics,
    /// Sound chips
    Sound,
    /// Interval timer and input ports
    Timer,
    /// NMI / IRQ delivery
    Interrupts,
    /// Save-state encoding and decoding
    SaveState,
}

impl LogCategory {
    pub const ALL: [LogCategory; 8] = [
        LogCategory::CPU,
        LogCategory::Bus,
        LogCategory::Cartridge,
        LogCategory::Graphics,
        LogCategory::Sound,
        LogCategory::Timer,
        LogCategory::Interrupts,
        LogCategory::SaveState,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Parse a category name as used on command lines.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cpu" => Some(LogCategory::CPU),
            "bus" => Some(LogCategory::Bus),
            "cart" | "cartridge" => Some(LogCategory::Cartridge),
            "gfx" | "graphics" | "maria" => Some(LogCategory::Graphics),
            "sound" | "audio" => Some(LogCategory::Sound),
            "timer" | "riot" => Some(LogCategory::Timer),
            "irq" | "interrupts" => Some(LogCategory::Interrupts),
            "state" | "savestate" => Some(LogCategory::SaveState),
            _ => None,
        }
    }
}

const CATEGORY_COUNT: usize = LogCategory::ALL.len();

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct WindowState {
    timestamps: VecDeque<Instant>,
    dropped: usize,
    last_drop_report: Option<Instant>,
}

/// Sliding-window limiter: at most `max_logs_per_second` messages per category.
struct RateLimiter {
    max_logs_per_second: AtomicUsize,
    window_duration: Duration,
    windows: Mutex<[WindowState; CATEGORY_COUNT]>,
}

impl RateLimiter {
    fn new(max_logs_per_second: usize) -> Self {
        Self {
            max_logs_per_second: AtomicUsize::new(max_logs_per_second),
            window_duration: Duration::from_secs(1),
            windows: Mutex::new(Default::default()),
        }
    }

    /// Returns whether the message may be written, plus a dropped-message
    /// count when one is due to be reported.
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let mut windows = lock(&self.windows);
        let state = &mut windows[category.index()];

        while let Some(&front) = state.timestamps.front() {
            if now.duration_since(front) > self.window_duration {
                state.timestamps.pop_front();
            } else {
                break;
            }
        }

        if state.timestamps.len() < self.max_logs_per_second.load(Ordering::Relaxed) {
            state.timestamps.push_back(now);
            if state.dropped > 0 {
                let dropped = std::mem::take(&mut state.dropped);
                state.last_drop_report = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        state.dropped += 1;
        let due = state
            .last_drop_report
            .map_or(true, |last| now.duration_since(last) >= Duration::from_secs(1));
        if due {
            state.last_drop_report = Some(now);
            (false, Some(std::mem::take(&mut state.dropped)))
        } else {
            (false, None)
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    category_levels: [AtomicU8; CATEGORY_COUNT],
    log_sender: Mutex<Option<Sender<String>>>,
    file_logging_enabled: AtomicBool,
    rate_limiter: RateLimiter,
}

impl LogConfig {
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            category_levels: Default::default(),
            log_sender: Mutex::new(None),
            file_logging_enabled: AtomicBool::new(false),
            rate_limiter: RateLimiter::new(60),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    /// Set the level used by categories without their own level
    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    /// Set log level for a specific category
    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.category_levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.category_levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category-specific level wins; `Off` falls back to the global level.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        let category_level = self.get_level(category);
        let limit = if category_level != LogLevel::Off {
            category_level
        } else {
            self.get_global_level()
        };
        level != LogLevel::Off && level <= limit
    }

    /// Reset all logging to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    /// Set the maximum logs per second per category
    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .max_logs_per_second
            .store(max_logs_per_second, Ordering::Relaxed);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.max_logs_per_second.load(Ordering::Relaxed)
    }

    /// Send log output to a file, written by a background thread.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    let _ = writeln!(file, "{}", message);
                    let _ = file.flush();
                }
            })?;

        *lock(&self.log_sender) = Some(sender);
        self.file_logging_enabled.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Stop file logging; the writer thread exits once its channel closes.
    pub fn clear_log_file(&self) {
        *lock(&self.log_sender) = None;
        self.file_logging_enabled.store(false, Ordering::Relaxed);
    }

    fn write_message(&self, message: String) {
        if self.file_logging_enabled.load(Ordering::Relaxed) {
            if let Some(sender) = lock(&self.log_sender).as_ref() {
                if let Err(failed) = sender.send(message) {
                    eprintln!("{}", failed.0);
                }
                return;
            }
        }
        eprintln!("{}", message);
    }
}

/// Log a message with the specified category and level
///
/// The closure only runs when the category is enabled at `level` and the
/// rate limiter admits the message.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }
    let (allowed, dropped) = config.rate_limiter.should_allow(category);
    if let Some(count) = dropped.filter(|&n| n > 0) {
        config.write_message(format!(
            "[{:?}] WARNING: Rate limit exceeded, {} log message(s) dropped in the last second",
            category, count
        ));
    }
    if allowed {
        config.write_message(message_fn());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("off"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_str("ERR"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("invalid"), None);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(LogCategory::from_str("maria"), Some(LogCategory::Graphics));
        assert_eq!(LogCategory::from_str("RIOT"), Some(LogCategory::Timer));
        assert_eq!(LogCategory::from_str("cart"), Some(LogCategory::Cartridge));
        assert_eq!(LogCategory::from_str("nope"), None);
    }

    #[test]
    fn test_category_level_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Error);
        config.set_level(LogCategory::CPU, LogLevel::Debug);

        assert!(config.should_log(LogCategory::CPU, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::CPU, LogLevel::Trace));
        assert!(!config.should_log(LogCategory::Bus, LogLevel::Warn));
        assert!(config.should_log(LogCategory::Bus, LogLevel::Error));
    }

    #[test]
    fn test_off_never_logs() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        assert!(!config.should_log(LogCategory::Sound, LogLevel::Off));
    }

    #[test]
    fn test_reset() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        config.set_level(LogCategory::Graphics, LogLevel::Info);
        config.reset();
        assert_eq!(config.get_global_level(), LogLevel::Off);
        assert_eq!(config.get_level(LogCategory::Graphics), LogLevel::Off);
    }

    #[test]
    fn test_rate_limiter_per_category() {
        let limiter = RateLimiter::new(60);
        for _ in 0..60 {
            assert!(limiter.should_allow(LogCategory::CPU).0);
        }
        assert!(!limiter.should_allow(LogCategory::CPU).0);
        assert!(limiter.should_allow(LogCategory::Bus).0);
    }

    #[test]
    fn test_rate_limiter_reports_dropped_count() {
        let limiter = RateLimiter::new(5);
        for _ in 0..5 {
            limiter.should_allow(LogCategory::Timer);
        }
        // First drop is reported immediately, the rest accumulate
        let (allowed, first) = limiter.should_allow(LogCategory::Timer);
        assert!(!allowed);
        assert_eq!(first, Some(1));
        for _ in 0..4 {
            assert_eq!(limiter.should_allow(LogCategory::Timer), (false, None));
        }

        std::thread::sleep(Duration::from_millis(1100));
        let (allowed, dropped) = limiter.should_allow(LogCategory::Timer);
        assert!(allowed);
        assert_eq!(dropped, Some(4));
    }
}
