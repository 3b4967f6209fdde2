// invokeai-bridge/src/logging.rs

use std::path::Path;
use log::{info, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::error::{Error, Result};

const LOG_FILE_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const LOG_FILE_ARCHIVES: u32 = 3;
const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l:<5})} {t} - {m}{n}";

/// Initializes log4rs. A `log4rs.yaml` next to the working directory wins;
/// otherwise logs go to the console and to `<log_dir>/invokeai-bridge.log`,
/// rolled over at 10 MiB with three archives kept.
pub fn init_logging(config_file: &Path, log_dir: &Path) -> Result<()> {
    if config_file.exists() {
        log4rs::init_file(config_file, Default::default())
            .map_err(|e| Error::InvalidConfig(format!("log4rs config {}: {}", config_file.display(), e)))?;
        info!("[LOGGING] Initialized from {}", config_file.display());
        return Ok(());
    }

    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let log_file = log_dir.join("invokeai-bridge.log");
    let file = rolling_file_appender(&log_file, log_dir)?;

    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(
            Root::builder()
                .appender("console")
                .appender("file")
                .build(LevelFilter::Info),
        )
        .map_err(|e| Error::InvalidConfig(format!("log4rs config: {}", e)))?;

    log4rs::init_config(config).map_err(|e| Error::InvalidConfig(format!("log4rs init: {}", e)))?;
    info!("[LOGGING] Logging to console and {}", log_file.display());
    Ok(())
}

fn rolling_file_appender(log_file: &Path, log_dir: &Path) -> Result<RollingFileAppender> {
    let archive_pattern = log_dir.join("invokeai-bridge.{}.log");
    let roller = FixedWindowRoller::builder()
        .build(&archive_pattern.to_string_lossy(), LOG_FILE_ARCHIVES)
        .map_err(|e| Error::InvalidConfig(format!("log4rs roller: {}", e)))?;
    let policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(LOG_FILE_LIMIT_BYTES)),
        Box::new(roller),
    );
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(log_file, Box::new(policy))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_file_appender_opens_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let log_file = log_dir.join("invokeai-bridge.log");

        // The appender creates the log directory and opens the active file up front.
        let _appender = rolling_file_appender(&log_file, &log_dir).unwrap();
        assert!(log_file.exists());
    }

    #[test]
    fn test_shipped_config_uses_rolling_file() {
        let text = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/log4rs.yaml")).unwrap();
        let yaml: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        let file = &yaml["appenders"]["file"];
        assert_eq!(file["kind"].as_str(), Some("rolling_file"));
        assert_eq!(file["policy"]["trigger"]["kind"].as_str(), Some("size"));
        assert_eq!(file["policy"]["roller"]["count"].as_u64(), Some(3));
    }
}
