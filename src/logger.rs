//! log4rs setup for the `log` facade.
//!
//! Nothing is installed by default; binaries and embedders call one of these once at startup.
//! A second initialisation in the same process is ignored.

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::errors::DbError;
use crate::set::LOG_TARGET;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETENTION: usize = 7;

/// Initialise from a log4rs YAML file.
///
/// # Errors
/// Returns `DbError::Io` if the file cannot be loaded.
pub fn init_file(path: &Path) -> Result<(), DbError> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())
        .map_err(|e| DbError::Io(format!("log config {}: {e}", path.display())))
}

/// `error|warn|info|debug|trace`, case-insensitive; anything else is `info`.
#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Rolling `docset.log` in `dir` (current directory when `None`), rolled to `docset.{n}.log`.
/// Executor diagnostics go to the same file under their own logger.
///
/// # Errors
/// Returns `DbError::Io` if the directory or appender cannot be created.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<(), DbError> {
    let base = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&base).map_err(|e| DbError::Io(format!("{}: {e}", base.display())))?;
    let keep = u32::try_from(retention.unwrap_or(DEFAULT_RETENTION)).unwrap_or(u32::MAX);
    let lvl = parse_level(level);

    let roller = FixedWindowRoller::builder()
        .build(&base.join("docset.{}.log").display().to_string(), keep)
        .map_err(|e| DbError::Io(format!("log roller: {e}")))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join("docset.log"), Box::new(policy))
        .map_err(|e| DbError::Io(format!("log appender: {e}")))?;

    let config = log4rs::config::Config::builder()
        .appender(Appender::builder().build("file", Box::new(appender)))
        .logger(Logger::builder().appender("file").additive(false).build(LOG_TARGET, lvl))
        .build(Root::builder().appender("file").build(lvl))
        .map_err(|e| DbError::config(format!("log config: {e}")))?;
    // Already initialised: keep the existing logger.
    let _ = log4rs::init_config(config);
    Ok(())
}

/// Reads `DOCSET_LOG_DIR`, `DOCSET_LOG_LEVEL` and `DOCSET_LOG_RETENTION`.
///
/// # Errors
/// As for [`configure_logging`].
pub fn configure_from_env() -> Result<(), DbError> {
    let dir = std::env::var("DOCSET_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("DOCSET_LOG_LEVEL").ok();
    let retention = std::env::var("DOCSET_LOG_RETENTION").ok().and_then(|s| s.parse().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}

/// # Errors
/// As for [`configure_logging`].
pub fn configure_from_config(config: &Config) -> Result<(), DbError> {
    configure_logging(config.log_dir.as_deref(), config.log_level.as_deref(), config.log_retention)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing() {
        assert_eq!(parse_level(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(parse_level(Some("warn")), LevelFilter::Warn);
        assert_eq!(parse_level(Some("loud")), LevelFilter::Info);
        assert_eq!(parse_level(None), LevelFilter::Info);
    }

    #[test]
    fn creates_log_file_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        configure_logging(Some(dir.path()), Some("debug"), Some(2)).unwrap();
        log::info!("hello");
        assert!(dir.path().join("docset.log").exists());
    }
}
