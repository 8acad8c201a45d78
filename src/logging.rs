/*
================================================================================
                            DetSkater Logging System
================================================================================

Standard application logging on top of the `log` crate (debug!, info!, etc.).

- `BufferLogger`: keeps the last `MAX_LOG_LINES` messages in memory for export
- `CompositeLogger`: console output (env_logger) plus the in-memory buffer
- `setup_logger()`: installs the composite logger with the default filters
- `setup_panic_hook()`: writes panics with a backtrace and recent logs to panic.log
- `export_debug_logs()`: writes the buffered messages to debug.log

**Log Levels**:
- Debug builds: DEBUG and above
- Release builds: ERROR only (unless RUST_LOG is set)
- Logs from other crates are filtered out

Log files live in `<data_dir>/detskater/logs/`.
================================================================================
*/

use std::panic;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use env_logger::fmt::Color;
use log::{LevelFilter, Metadata, Record};
use env_logger::fmt::Formatter;
use chrono::Utc;

#[allow(unused_imports)]
use log::{Level, debug, info, warn, error};

use crate::config::APP_NAME;

const MAX_LOG_LINES: usize = 1000;

pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

struct BufferLogger {
    log_buffer: LogBuffer,
}

impl BufferLogger {
    fn new() -> Self {
        Self {
            log_buffer: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_LOG_LINES))),
        }
    }

    fn log_to_buffer(&self, message: &str, target: &str, line: Option<u32>) {
        if !target.starts_with(APP_NAME) {
            return;
        }
        // A poisoned buffer only means a panic mid-push; keep logging
        let mut buffer = match self.log_buffer.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if buffer.len() == MAX_LOG_LINES {
            buffer.pop_front();
        }

        let formatted_message = if let Some(line_num) = line {
            format!("{target}:{line_num} {message}")
        } else {
            format!("{target} {message}")
        };

        buffer.push_back(formatted_message);
    }

    fn get_shared_buffer(&self) -> LogBuffer {
        Arc::clone(&self.log_buffer)
    }
}

impl log::Log for BufferLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with(APP_NAME) && metadata.level() <= LevelFilter::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!("{:<5} {}", record.level(), record.args());
            self.log_to_buffer(&message, record.target(), record.line());
        }
    }

    fn flush(&self) {}
}

struct CompositeLogger {
    console_logger: env_logger::Logger,
    buffer_logger: BufferLogger,
}

impl log::Log for CompositeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console_logger.enabled(metadata) || self.buffer_logger.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.console_logger.enabled(record.metadata()) {
            self.console_logger.log(record);
        }
        if self.buffer_logger.enabled(record.metadata()) {
            self.buffer_logger.log(record);
        }
    }

    fn flush(&self) {
        self.console_logger.flush();
        self.buffer_logger.flush();
    }
}

/// Install the console + buffer logger and return the shared buffer.
///
/// `verbose` forces DEBUG on the console even in release builds.
pub fn setup_logger(verbose: bool) -> LogBuffer {
    let buffer_logger = BufferLogger::new();
    let shared_buffer = buffer_logger.get_shared_buffer();

    let mut builder = env_logger::Builder::new();

    // Filter out all other crates' logs
    builder.filter(None, LevelFilter::Off);

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    } else if verbose || cfg!(debug_assertions) {
        builder.filter(Some(APP_NAME), LevelFilter::Debug);
    } else {
        builder.filter(Some(APP_NAME), LevelFilter::Error);
    }

    builder.format(|buf: &mut Formatter, record: &Record| {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

        let module_info = match (record.module_path(), record.line()) {
            (Some(module), Some(line)) => format!("{module}:{line}"),
            (Some(module), None) => module.to_string(),
            (None, Some(line)) => format!("line:{line}"),
            (None, None) => "unknown".to_string(),
        };

        let mut level_style = buf.style();
        let mut meta_style = buf.style();

        match record.level() {
            Level::Error => level_style.set_color(Color::Red).set_bold(true),
            Level::Warn => level_style.set_color(Color::Yellow).set_bold(true),
            Level::Info => level_style.set_color(Color::Green).set_bold(true),
            Level::Debug => level_style.set_color(Color::Blue).set_bold(true),
            Level::Trace => level_style.set_color(Color::White),
        };

        // Color::Rgb does not render on macOS terminals
        #[cfg(target_os = "macos")]
        {
            meta_style.set_color(Color::Blue);
        }

        #[cfg(not(target_os = "macos"))]
        {
            meta_style.set_color(Color::Rgb(120, 120, 120));
        }

        writeln!(
            buf,
            "{} {} {} {}",
            meta_style.value(timestamp),
            level_style.value(record.level()),
            meta_style.value(module_info),
            record.args()
        )
    });

    let composite_logger = CompositeLogger {
        console_logger: builder.build(),
        buffer_logger,
    };

    match log::set_boxed_logger(Box::new(composite_logger)) {
        // Always set the maximum level to Trace so per-logger filtering decides
        Ok(()) => log::set_max_level(LevelFilter::Trace),
        Err(e) => eprintln!("Logger already initialized: {e}"),
    }

    shared_buffer
}

pub fn get_log_directory(app_name: &str) -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join(app_name).join("logs")
}

/// Exports the current log buffer to `<log dir>/debug.log`.
///
/// Only messages from the log macros are captured, not raw `println!` output.
pub fn export_debug_logs(app_name: &str, log_buffer: &LogBuffer) -> Result<PathBuf, std::io::Error> {
    let log_dir_path = get_log_directory(app_name);
    write_debug_log(&log_dir_path, log_buffer)
}

fn write_debug_log(log_dir_path: &Path, log_buffer: &LogBuffer) -> Result<PathBuf, std::io::Error> {
    std::fs::create_dir_all(log_dir_path)?;
    let debug_log_path = log_dir_path.join("debug.log");

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&debug_log_path)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

    // Copy out and release the lock before writing; info! below locks it again
    let log_entries: Vec<String> = match log_buffer.lock() {
        Ok(buffer) => buffer.iter().cloned().collect(),
        Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
    };

    writeln!(file, "{timestamp} [DEBUG EXPORT] =====================================")?;
    writeln!(file, "{timestamp} [DEBUG EXPORT] DetSkater Debug Log Export")?;
    writeln!(file, "{timestamp} [DEBUG EXPORT] Maximum captured entries: {MAX_LOG_LINES}")?;
    writeln!(file, "{timestamp} [DEBUG EXPORT] =====================================")?;
    writeln!(file)?;

    if log_entries.is_empty() {
        writeln!(file, "{timestamp} [DEBUG EXPORT] No log entries found in buffer")?;
    } else {
        writeln!(file, "{timestamp} [DEBUG EXPORT] Found {} log entries:", log_entries.len())?;
        writeln!(file)?;
        for log_entry in &log_entries {
            writeln!(file, "{timestamp} {log_entry}")?;
        }
    }

    writeln!(file)?;
    writeln!(file, "{timestamp} [DEBUG EXPORT] Total entries exported: {}", log_entries.len())?;
    file.flush()?;

    info!("Debug logs exported to: {}", debug_log_path.display());
    Ok(debug_log_path)
}

pub fn setup_panic_hook(app_name: &str, log_buffer: LogBuffer) {
    let log_file_path = get_log_directory(app_name).join("panic.log");
    if let Some(parent) = log_file_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Failed to create log directory {}: {}", parent.display(), e);
        }
    }

    panic::set_hook(Box::new(move |info| {
        let backtrace = backtrace::Backtrace::new();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

        let location = if let Some(location) = info.location() {
            format!("{}:{}", location.file(), location.line())
        } else {
            "unknown location".to_string()
        };

        let header_msg = format!("[PANIC] at {location} - {info}");
        let backtrace_lines: Vec<String> = format!("{backtrace:?}")
            .lines()
            .map(|line| format!("[BACKTRACE] {}", line.trim()))
            .collect();

        eprintln!("\n\n{header_msg}");
        eprintln!("[PANIC] Backtrace:");
        for line in &backtrace_lines {
            eprintln!("{line}");
        }

        // Never panic inside the panic hook; failures here are reported and dropped
        let written = (|| -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&log_file_path)?;

            writeln!(file, "{timestamp} {header_msg}")?;
            writeln!(file, "{timestamp} [PANIC] Backtrace:")?;
            for line in &backtrace_lines {
                writeln!(file, "{timestamp} {line}")?;
            }
            writeln!(file)?;
            writeln!(file)?;

            writeln!(file, "{timestamp} [PANIC] Last {MAX_LOG_LINES} log entries:")?;
            if let Ok(buffer) = log_buffer.lock() {
                for log in buffer.iter() {
                    writeln!(file, "{timestamp} {log}")?;
                }
            }
            Ok(())
        })();

        match written {
            Ok(()) => eprintln!("\nA complete crash log has been written to: {}", log_file_path.display()),
            Err(e) => eprintln!("\nFailed to write crash log {}: {}", log_file_path.display(), e),
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_keeps_last_lines_for_own_target() {
        let logger = BufferLogger::new();
        for i in 0..(MAX_LOG_LINES + 5) {
            logger.log_to_buffer(&format!("INFO  line {i}"), "detskater::session", Some(10));
        }
        logger.log_to_buffer("INFO  foreign", "image::codecs", Some(1));

        let buffer = logger.get_shared_buffer();
        let buffer = buffer.lock().unwrap();
        assert_eq!(buffer.len(), MAX_LOG_LINES);
        assert_eq!(buffer.front().unwrap(), "detskater::session:10 INFO  line 5");
        assert!(buffer.iter().all(|l| l.starts_with("detskater")));
    }

    #[test]
    fn test_write_debug_log() {
        let dir = std::env::temp_dir().join(format!("detskater-logs-{}", std::process::id()));
        let logger = BufferLogger::new();
        logger.log_to_buffer("WARN  something odd", "detskater::overlay", None);

        let path = write_debug_log(&dir, &logger.get_shared_buffer()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("detskater::overlay WARN  something odd"));
        assert!(contents.contains("Total entries exported: 1"));

        let _ = std::fs::remove_dir_all(dir);
    }
}
