use chrono::{DateTime, Utc};
use colored::*;
use log::{Level, Metadata, Record};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

static STUDIO_LOGGER: Lazy<StudioLogger> = Lazy::new(StudioLogger::default);

/// Installs the global logger. Fails if the log file cannot be opened or a
/// logger is already set.
pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let max_level = config.min_level.to_log_level_filter();
    STUDIO_LOGGER
        .apply(config)
        .map_err(|e| format!("Failed to open log file: {}", e))?;
    log::set_logger(&*STUDIO_LOGGER).map_err(|e| format!("Failed to set logger: {:?}", e))?;
    log::set_max_level(max_level);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::Cyan,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Trace => "🔍",
            LogLevel::Debug => "🐛",
            LogLevel::Info => "💡",
            LogLevel::Warn => "⚠️",
            LogLevel::Error => "❌",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn to_log_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// One emitted record; also the shape of a JSON log line.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub module: String,
    pub message: String,
    pub location: String,
}

impl LogEntry {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level: record.level().into(),
            module: record.module_path().unwrap_or_default().to_string(),
            message: record.args().to_string(),
            location: format!(
                "{}:{}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0)
            ),
        }
    }

    /// `2024-05-01 12:00:00.000 [⚠️ WARN] fluxgen::store: message`
    fn to_line(&self, colors: bool, with_location: bool) -> String {
        let timestamp = self.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let level = format!("{} {}", self.level.emoji(), self.level.as_str());

        let mut line = if colors {
            format!(
                "{} [{}] ",
                timestamp.bright_black(),
                level.color(self.level.color()).bold()
            )
        } else {
            format!("{} [{}] ", timestamp, level)
        };

        if !self.module.is_empty() {
            if colors {
                line.push_str(&format!("{}: ", self.module.bright_blue()));
            } else {
                line.push_str(&format!("{}: ", self.module));
            }
        }
        line.push_str(&self.message);

        if with_location {
            if colors {
                line.push_str(&format!(" ({})", self.location.bright_black()));
            } else {
                line.push_str(&format!(" ({})", self.location));
            }
        }
        line
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub colors: bool,
    pub json: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Warn,
            colors: true,
            json: false,
            log_file: None,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.colors = enabled;
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.json = enabled;
        self
    }

    /// Appends every entry to `path` as well, without colour codes.
    pub fn with_file_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    fn render(&self, entry: &LogEntry, colors: bool) -> String {
        if self.json {
            serde_json::to_string(entry).unwrap_or_default()
        } else {
            entry.to_line(colors, self.min_level <= LogLevel::Debug)
        }
    }
}

/// `log` backend writing to stderr, so the terminal front end keeps stdout.
#[derive(Default)]
pub struct StudioLogger {
    config: Mutex<LoggerConfig>,
    log_file: Mutex<Option<File>>,
}

impl StudioLogger {
    /// Swaps in `config`, opening its log file first. On error the previous
    /// configuration stays active.
    pub fn apply(&self, config: LoggerConfig) -> io::Result<()> {
        let file = match &config.log_file {
            Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
            None => None,
        };

        // Same lock order as `log`: config, then file.
        if let Ok(mut current) = self.config.lock() {
            if let Ok(mut log_file) = self.log_file.lock() {
                *log_file = file;
            }
            *current = config;
        }
        Ok(())
    }

    fn write_to_file(&self, entry: &LogEntry, config: &LoggerConfig) {
        if let Ok(mut guard) = self.log_file.lock() {
            if let Some(file) = guard.as_mut() {
                let line = config.render(entry, false) + "\n";
                let _ = file.write_all(line.as_bytes());
            }
        }
    }
}

impl log::Log for StudioLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match self.config.lock() {
            Ok(config) => LogLevel::from(metadata.level()) >= config.min_level,
            Err(_) => true,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry::from_record(record);

        if let Ok(config) = self.config.lock() {
            eprintln!("{}", config.render(&entry, config.colors));
            self.write_to_file(&entry, &config);
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
        if let Ok(mut guard) = self.log_file.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

/// Times an operation. `stop` reports completion; dropping an unstopped
/// timer reports it as abandoned instead.
pub struct Timer {
    start: Instant,
    name: String,
    stopped: bool,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::debug!("⏱️  Starting timer: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
            stopped: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn stop(&mut self) -> Duration {
        let duration = self.elapsed();
        if !self.stopped {
            self.stopped = true;
            let (level, message) = self.report(true);
            log::log!(level, "{}", message);
        }
        duration
    }

    fn report(&self, completed: bool) -> (Level, String) {
        let millis = self.elapsed().as_millis();
        if completed {
            (
                Level::Info,
                format!("⏱️  Timer '{}' completed in {}ms", self.name, millis),
            )
        } else {
            (
                Level::Debug,
                format!("⏱️  Timer '{}' abandoned after {}ms", self.name, millis),
            )
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if !self.stopped {
            let (level, message) = self.report(false);
            log::log!(level, "{}", message);
        }
    }
}

pub fn timer(name: &str) -> Timer {
    Timer::new(name)
}

pub fn log_startup_info(app_name: &str, version: &str) {
    log::info!("🚀 Starting {} v{}", app_name, version);
    log::info!("📝 Logger initialized successfully");
}

pub fn log_config_info(config: &crate::config::Config) {
    log::info!("⚙️  Configuration loaded:");
    log::info!("   Endpoint: {}", config.together.base_url());
    log::info!("   Model: {}", config.together.model());
    log::info!(
        "   API key: {}",
        if config.together.api_key.is_some() { "✅" } else { "❌" }
    );
    if let Some(timeout) = config.together.timeout() {
        log::info!("   Timeout: {}s", timeout.as_secs());
    }
    log::info!("   Downloads: {}", config.download_dir().display());
    if let Some(path) = &config.log_file {
        log::info!("   Log file: {}", path.display());
    }
}
