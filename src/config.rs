use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::env;
use tracing::warn;

use crate::importer::{ImportMode, ImportOptions};

/// Complete application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub import: ImportConfig,
    pub logging: LoggingConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Import policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    /// `strict` or `lenient`.
    pub mode: String,
    pub dry_run: bool,
}

/// Logging system configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        let config = Config {
            database: DatabaseConfig::from_env(),
            import: ImportConfig::from_env(),
            logging: LoggingConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.database.url.starts_with("sqlite:") {
            return Err(anyhow!("DATABASE_URL must start with 'sqlite:'"));
        }
        if ImportMode::parse(&self.import.mode).is_none() {
            return Err(anyhow!(
                "IMPORT_MODE must be 'strict' or 'lenient', got '{}'",
                self.import.mode
            ));
        }
        if !["trace", "debug", "info", "warn", "error"]
            .contains(&self.logging.level.to_lowercase().as_str())
            && !self.logging.level.contains('=')
            && !self.logging.level.contains(',')
        {
            warn!(
                "Unusual log level '{}', passing through to the env filter",
                self.logging.level
            );
        }
        Ok(())
    }

    /// The driver options implied by this configuration.
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            mode: ImportMode::parse(&self.import.mode).unwrap_or_default(),
            dry_run: self.import.dry_run,
        }
    }
}

impl DatabaseConfig {
    fn from_env() -> Self {
        let url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:question_bank.db".to_string());
        DatabaseConfig { url }
    }
}

impl ImportConfig {
    fn from_env() -> Self {
        let mode = env::var("IMPORT_MODE").unwrap_or_else(|_| "lenient".to_string());
        let dry_run = env::var("IMPORT_DRY_RUN")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);
        ImportConfig { mode, dry_run }
    }
}

impl LoggingConfig {
    fn from_env() -> Self {
        let level =
            env::var("RUST_LOG").unwrap_or_else(|_| "info,question_bank_importer=debug".to_string());
        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);
        let log_directory = env::var("LOG_DIRECTORY").unwrap_or_else(|_| "logs".to_string());
        LoggingConfig {
            level,
            file_enabled,
            log_directory,
        }
    }
}
