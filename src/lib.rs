pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::{cli::LocalStorage, toml_config::TomlConfig, ClientSettings};
pub use core::{
    binder::{PlaceholderPolicy, QueryTemplate},
    client::{HttpExtractionClient, RetryPolicy},
    limiter::DEFAULT_BATCH_CAP,
    session::{Session, SubmitOutcome},
};
pub use utils::error::{AppError, ClientError, ConfigError, ExportError, ParseError, Result};
