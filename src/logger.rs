//! # Log sink behind the `log` facade.
//!
//! [`KernelLogger`] writes timestamped records to the configured log file
//! (truncated on startup, parent directories created) and mirrors
//! INFO-and-above to stderr so the operator sees lifecycle changes in the
//! terminal. Child stderr lines arrive here too, tagged with the tool name
//! as the record target.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};

use crate::error::KernelError;

/// File-backed logger with a stderr mirror.
pub struct KernelLogger {
    file: Mutex<File>,
    level: LevelFilter,
}

/// Opens the log file and installs the logger process-wide.
///
/// Fatal at initialization: a log file that cannot be opened aborts
/// startup.
pub fn init(log_file: &Path, level: LevelFilter) -> Result<(), KernelError> {
    let logger = KernelLogger::open(log_file, level)?;
    log::set_boxed_logger(Box::new(logger)).map_err(|_| KernelError::Config {
        reason: "logger already installed".to_string(),
    })?;
    log::set_max_level(level);
    Ok(())
}

impl KernelLogger {
    /// Opens (and truncates) the log file, creating parent directories.
    pub fn open(log_file: &Path, level: LevelFilter) -> Result<Self, KernelError> {
        if let Some(parent) = log_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| KernelError::Config {
                    reason: format!("cannot create log directory {}: {e}", parent.display()),
                })?;
            }
        }
        let mut file = File::create(log_file).map_err(|e| KernelError::Config {
            reason: format!("cannot open log file {}: {e}", log_file.display()),
        })?;
        let _ = writeln!(
            file,
            "=== toolvisor {} started at {} ===",
            env!("CARGO_PKG_VERSION"),
            timestamp()
        );
        Ok(Self {
            file: Mutex::new(file),
            level,
        })
    }
}

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{} [{:<5}] [{}] {}",
            timestamp(),
            record.level(),
            record.target(),
            record.args()
        );
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{line}");
            let _ = file.flush();
        }
        if record.level() <= log::Level::Info {
            eprintln!(
                "[{:<5}] [{}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn writes_records_at_or_above_the_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("kernel.log");
        let logger = KernelLogger::open(&path, LevelFilter::Info).unwrap();

        logger.log(
            &Record::builder()
                .level(Level::Info)
                .target("probe")
                .args(format_args!("child said hello"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .target("probe")
                .args(format_args!("filtered out"))
                .build(),
        );
        logger.flush();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("[probe] child said hello"));
        assert!(!text.contains("filtered out"));
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("kernel.log");
        KernelLogger::open(&path, LevelFilter::Warn).unwrap();
        assert!(path.exists());
    }
}
