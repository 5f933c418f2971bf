//! File logging bootstrap.
//!
//! The terminal is owned by the UI, so log records only ever go to rotating
//! files. Initialization happens at most once per process.

use anyhow::{anyhow, bail, Context, Result};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::info;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "notemark";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    log_dir: PathBuf,
    _logger: LoggerHandle,
}

/// Starts file logging at `level` under `log_dir`.
///
/// Repeating the call with identical arguments is a no-op; any other
/// re-initialization is an error.
pub fn init_logging(level: &str, log_dir: &Path) -> Result<()> {
    let level = normalize_level(level)?;

    if let Some(state) = LOGGING_STATE.get() {
        if state.log_dir != log_dir {
            bail!(
                "logging already initialized at {}; refusing to switch to {}",
                state.log_dir.display(),
                log_dir.display()
            );
        }
        if state.level != level {
            bail!(
                "logging already initialized with level {}; refusing to switch to {level}",
                state.level
            );
        }
        return Ok(());
    }

    let dir = log_dir.to_path_buf();
    LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        let logger = Logger::try_with_str(level)
            .map_err(|err| anyhow!("invalid log level {level}: {err}"))?
            .log_to_file(
                FileSpec::default()
                    .directory(dir.as_path())
                    .basename(LOG_FILE_BASENAME),
            )
            .rotate(
                Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                Naming::Numbers,
                Cleanup::KeepLogFiles(MAX_LOG_FILES),
            )
            .write_mode(WriteMode::BufferAndFlush)
            .append()
            .format_for_files(flexi_logger::detailed_format)
            .start()
            .context("Failed to start logger")?;

        info!(
            "event=app_start status=ok version={} level={level} log_dir={}",
            env!("CARGO_PKG_VERSION"),
            dir.display()
        );

        Ok(LoggingState {
            level,
            log_dir: dir.clone(),
            _logger: logger,
        })
    })?;
    Ok(())
}

fn normalize_level(level: &str) -> Result<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => bail!("unsupported log level: {other:?}"),
    }
}
