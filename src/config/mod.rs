pub mod cli;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::utils::error::ConfigError;
use crate::utils::validation::{self, Validate};
use std::time::Duration;

#[cfg(feature = "cli")]
use clap::Parser;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";

/// Effective client settings after merging the config file and CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_url: String,
    pub batch_cap: usize,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub strict_placeholders: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            batch_cap: crate::core::limiter::DEFAULT_BATCH_CAP,
            timeout_seconds: 60,
            retry_attempts: 1,
            retry_delay_ms: 500,
            strict_placeholders: false,
        }
    }
}

impl ConfigProvider for ClientSettings {
    fn api_url(&self) -> &str {
        &self.api_url
    }

    fn batch_cap(&self) -> usize {
        self.batch_cap
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    fn strict_placeholders(&self) -> bool {
        self.strict_placeholders
    }
}

impl Validate for ClientSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_url("api_url", &self.api_url)?;
        validation::validate_positive_number("batch_cap", self.batch_cap, 1)?;
        validation::validate_positive_number("timeout_seconds", self.timeout_seconds as usize, 1)?;
        validation::validate_range("retry_attempts", self.retry_attempts, 1, 10)?;
        Ok(())
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "csv-enrich")]
#[command(about = "Run a per-row query template over a CSV file through an extraction service")]
pub struct CliConfig {
    /// CSV file to upload
    #[arg(short, long)]
    pub input: String,

    /// Column whose value fills the template placeholder
    #[arg(short, long)]
    pub column: Option<String>,

    /// Query template, e.g. "Get the email address of {company}"
    #[arg(short, long)]
    pub template: Option<String>,

    /// Where to write the exported results
    #[arg(short, long, default_value = "results.csv")]
    pub output: String,

    /// Optional TOML configuration file
    #[arg(long)]
    pub config: Option<String>,

    /// Base URL of the extraction service
    #[arg(long, env = "EXTRACT_API_URL")]
    pub api_url: Option<String>,

    #[arg(long)]
    pub batch_cap: Option<usize>,

    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    /// Total attempts per submission, retrying transient failures with backoff
    #[arg(long)]
    pub retry_attempts: Option<u32>,

    /// Reject templates without a {placeholder}
    #[arg(long)]
    pub strict_placeholders: bool,

    /// Show the bound queries without calling the service
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Flags given on the command line win over the file, which wins over defaults.
    pub fn resolve(&self, file: Option<&toml_config::TomlConfig>) -> ClientSettings {
        let mut settings = file.map(|f| f.settings()).unwrap_or_default();

        if let Some(url) = &self.api_url {
            settings.api_url = url.clone();
        }
        if let Some(cap) = self.batch_cap {
            settings.batch_cap = cap;
        }
        if let Some(timeout) = self.timeout_seconds {
            settings.timeout_seconds = timeout;
        }
        if let Some(attempts) = self.retry_attempts {
            settings.retry_attempts = attempts;
        }
        if self.strict_placeholders {
            settings.strict_placeholders = true;
        }
        settings
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_non_empty_string("input", &self.input)?;
        validation::validate_non_empty_string("output", &self.output)?;
        if let Some(column) = &self.column {
            validation::validate_non_empty_string("column", column)?;
        }
        if let Some(template) = &self.template {
            validation::validate_non_empty_string("template", template)?;
        }
        Ok(())
    }
}
