//! Console logging plus a crash trail.
//!
//! Records go to stderr through `env_logger`. Records from this crate are
//! also kept in a bounded in-memory trail, which the panic hook writes to
//! `panic.log` together with a backtrace. `RUST_LOG` overrides the default
//! level (debug for debug builds, info for release builds).

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, Write};
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use backtrace::Backtrace;
use chrono::{Local, Utc};
use env_logger::fmt::Color;
use log::{Level, LevelFilter, Log, Metadata, Record};

const CRATE_TARGET: &str = "lanevis";
pub const TRAIL_CAPACITY: usize = 1000;

/// Most recent log lines of this crate, oldest first
#[derive(Clone, Default)]
pub struct LogTrail {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl LogTrail {
    // A panic while logging poisons the lock; the lines are still worth keeping
    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, line: String) {
        let mut lines = self.lock();
        if lines.len() >= TRAIL_CAPACITY {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }
}

/// Tees records to the console logger and the trail
struct TeeLogger {
    console: env_logger::Logger,
    trail: LogTrail,
}

fn wants_trail(metadata: &Metadata) -> bool {
    metadata.target().starts_with(CRATE_TARGET) && metadata.level() <= Level::Debug
}

fn trail_line(record: &Record) -> String {
    format!(
        "{} {:<5} [{}:{}] {}",
        Local::now().format("%H:%M:%S%.3f"),
        record.level(),
        record.target(),
        record.line().unwrap_or(0),
        record.args()
    )
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata) || wants_trail(metadata)
    }

    fn log(&self, record: &Record) {
        if self.console.matches(record) {
            self.console.log(record);
        }
        if wants_trail(record.metadata()) {
            self.trail.push(trail_line(record));
        }
    }

    fn flush(&self) {
        self.console.flush();
    }
}

fn build_console_logger() -> env_logger::Logger {
    let mut builder = env_logger::Builder::new();
    match std::env::var("RUST_LOG") {
        Ok(filters) => {
            builder.parse_filters(&filters);
        }
        Err(_) => {
            let level = if cfg!(debug_assertions) { LevelFilter::Debug } else { LevelFilter::Info };
            builder.filter_level(LevelFilter::Warn).filter_module(CRATE_TARGET, level);
        }
    }

    builder.format(|buf, record| {
        let color = match record.level() {
            Level::Error => Color::Red,
            Level::Warn => Color::Yellow,
            Level::Info => Color::Green,
            Level::Debug => Color::Cyan,
            Level::Trace => Color::White,
        };
        let mut style = buf.style();
        style.set_color(color).set_bold(record.level() <= Level::Warn);
        writeln!(buf, "{:<5} {}", style.value(record.level()), record.args())
    });

    builder.build()
}

/// Install the logger. The returned trail is shared with the panic hook.
pub fn setup_logger() -> Result<LogTrail, log::SetLoggerError> {
    let trail = LogTrail::default();
    let logger = TeeLogger {
        console: build_console_logger(),
        trail: trail.clone(),
    };
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(LevelFilter::Trace);
    Ok(trail)
}

/// `<data dir>/<app>/logs`, or `./<app>/logs` on systems without a data dir
pub fn log_directory(app_name: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(app_name)
        .join("logs")
}

/// Keep the default panic message and also write a crash report
pub fn setup_panic_hook(app_name: &str, trail: LogTrail) {
    let report_path = log_directory(app_name).join("panic.log");
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        default_hook(info);
        match write_crash_report(&report_path, &info.to_string(), &trail.snapshot()) {
            Ok(()) => eprintln!("Crash report written to {}", report_path.display()),
            Err(e) => eprintln!("Could not write crash report {}: {}", report_path.display(), e),
        }
    }));
}

fn write_crash_report(path: &Path, message: &str, lines: &[String]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut file = File::create(path)?;

    writeln!(file, "{} panic: {}", Utc::now().to_rfc3339(), message)?;
    writeln!(file, "\n{:?}", Backtrace::new())?;
    writeln!(file, "--- last {} of at most {} log lines ---", lines.len(), TRAIL_CAPACITY)?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}
