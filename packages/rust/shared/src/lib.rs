//! Shared types, error model, and configuration for sitekit.
//!
//! This crate is the foundation depended on by all other sitekit crates.
//! It provides:
//! - [`SiteError`], the unified error type
//! - Domain types ([`Mode`], [`Stage`])
//! - Configuration ([`SiteConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, OutputConfig, SiteConfig, SitemapConfig, SourceConfig,
    StylesConfig, TailwindConfig, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, SiteError};
pub use types::{MODE_ENV_VAR, Mode, RELOAD_PATH, Stage};
