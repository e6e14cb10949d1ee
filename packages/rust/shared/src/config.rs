//! Build configuration for sitekit.
//!
//! The config lives at `<project root>/sitekit.toml`. A `.json` file with the
//! same schema is accepted too, so a `config.json` of the shape
//! `{"output": {...}, "app": {...}, "sitemap": {...}}` loads unchanged.
//! Missing keys fall back to the defaults below.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteError};
use crate::types::Mode;

/// Default configuration file name, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "sitekit.toml";

// ---------------------------------------------------------------------------
// Config structs (matching sitekit.toml schema)
// ---------------------------------------------------------------------------

/// Top-level build config, deserialized from TOML or JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Output directories per mode.
    #[serde(default)]
    pub output: OutputConfig,

    /// Preview server settings.
    #[serde(default)]
    pub app: AppConfig,

    /// Source tree layout.
    #[serde(default)]
    pub source: SourceConfig,

    /// Stylesheet compilation options.
    #[serde(default)]
    pub styles: StylesConfig,

    /// Sitemap options (production only).
    #[serde(default)]
    pub sitemap: SitemapConfig,

    /// Extra directive tokens merged into the built-in table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub directives: BTreeMap<String, String>,
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory in development mode.
    #[serde(default = "default_dist")]
    pub dist: String,

    /// Output directory in production mode.
    #[serde(default = "default_build")]
    pub build: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dist: default_dist(),
            build: default_build(),
        }
    }
}

fn default_dist() -> String {
    "dist".into()
}
fn default_build() -> String {
    "build".into()
}

/// `[app]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Preview server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Interface the preview server binds to.
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

/// `[source]` section. Sub-directories are relative to `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source root, also the base path for `@@include` lookups.
    #[serde(default = "default_source_root")]
    pub root: String,
    /// Page templates.
    #[serde(default = "default_pages")]
    pub pages: String,
    /// Top-level stylesheets.
    #[serde(default = "default_styles")]
    pub styles: String,
    /// Top-level scripts.
    #[serde(default = "default_scripts")]
    pub scripts: String,
    /// Per-component markup, styles and scripts.
    #[serde(default = "default_slices")]
    pub slices: String,
    /// Static assets copied verbatim.
    #[serde(default = "default_public")]
    pub public: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: default_source_root(),
            pages: default_pages(),
            styles: default_styles(),
            scripts: default_scripts(),
            slices: default_slices(),
            public: default_public(),
        }
    }
}

fn default_source_root() -> String {
    "src".into()
}
fn default_pages() -> String {
    "pages".into()
}
fn default_styles() -> String {
    "styles".into()
}
fn default_scripts() -> String {
    "scripts".into()
}
fn default_slices() -> String {
    "slices".into()
}
fn default_public() -> String {
    "public".into()
}

/// `[styles]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Browserslist queries used for vendor prefixing and syntax lowering.
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,

    /// Utility-class framework CLI. Disabled when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tailwind: Option<TailwindConfig>,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            browsers: default_browsers(),
            tailwind: None,
        }
    }
}

fn default_browsers() -> Vec<String> {
    vec!["defaults".into()]
}

/// `[styles.tailwind]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailwindConfig {
    /// Executable to spawn.
    #[serde(default = "default_tailwind_command")]
    pub command: String,

    /// Tailwind config file, relative to the project root.
    #[serde(default = "default_tailwind_config")]
    pub config: String,
}

impl Default for TailwindConfig {
    fn default() -> Self {
        Self {
            command: default_tailwind_command(),
            config: default_tailwind_config(),
        }
    }
}

fn default_tailwind_command() -> String {
    "tailwindcss".into()
}
fn default_tailwind_config() -> String {
    "tailwind.config.js".into()
}

/// `[sitemap]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapConfig {
    /// Public site URL every `<loc>` is resolved against. Required in production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// File name written to the output root.
    #[serde(default = "default_sitemap_file")]
    pub file_name: String,

    /// Optional `<changefreq>` for every entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changefreq: Option<String>,

    /// Optional `<priority>` for every entry, between 0.0 and 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f32>,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            url: None,
            file_name: default_sitemap_file(),
            changefreq: None,
            priority: None,
        }
    }
}

fn default_sitemap_file() -> String {
    "sitemap.xml".into()
}

const CHANGEFREQ_VALUES: [&str; 7] = [
    "always", "hourly", "daily", "weekly", "monthly", "yearly", "never",
];

impl SiteConfig {
    /// Output directory for the given mode, as written in the config.
    pub fn output_dir(&self, mode: Mode) -> &str {
        match mode {
            Mode::Production => &self.output.build,
            Mode::Development => &self.output.dist,
        }
    }

    /// Check the settings the given mode depends on.
    pub fn validate(&self, mode: Mode) -> Result<()> {
        if self.output_dir(mode).trim().is_empty() {
            return Err(SiteError::config(format!(
                "output directory for {mode} mode is empty"
            )));
        }

        if mode.is_production() && self.sitemap.url.is_none() {
            return Err(SiteError::config(
                "sitemap.url is required for production builds",
            ));
        }

        if let Some(freq) = &self.sitemap.changefreq {
            if !CHANGEFREQ_VALUES.contains(&freq.as_str()) {
                return Err(SiteError::config(format!(
                    "sitemap.changefreq '{freq}' is not one of {}",
                    CHANGEFREQ_VALUES.join(", ")
                )));
            }
        }

        if let Some(priority) = self.sitemap.priority {
            if !(0.0..=1.0).contains(&priority) {
                return Err(SiteError::config(format!(
                    "sitemap.priority {priority} is outside 0.0..=1.0"
                )));
            }
        }

        if self.directives.keys().any(|k| k.is_empty()) {
            return Err(SiteError::config("directive keys must not be empty"));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Path of the default config file inside a project root.
pub fn config_file_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

/// Load the project config. Returns defaults if `sitekit.toml` does not exist.
pub fn load_config(root: &Path) -> Result<SiteConfig> {
    let path = config_file_path(root);

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(SiteConfig::default());
    }

    load_config_from(&path)
}

/// Load the config from a specific file. `.json` files are parsed as JSON,
/// everything else as TOML.
pub fn load_config_from(path: &Path) -> Result<SiteConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SiteError::io(path, e))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let parsed = if is_json {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    } else {
        toml::from_str(&content).map_err(|e| e.to_string())
    };

    parsed.map_err(|e| SiteError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default `sitekit.toml` into the project root.
/// Refuses to overwrite an existing file.
pub fn init_config(root: &Path) -> Result<PathBuf> {
    let path = config_file_path(root);
    if path.exists() {
        return Err(SiteError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    std::fs::create_dir_all(root).map_err(|e| SiteError::io(root, e))?;

    let content = toml::to_string_pretty(&SiteConfig::default())
        .map_err(|e| SiteError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SiteError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("sitekit-config-{}", uuid::Uuid::now_v7()))
    }

    #[test]
    fn default_config_serializes() {
        let config = SiteConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("dist"));
        assert!(toml_str.contains("port = 3000"));
    }

    #[test]
    fn output_dir_follows_mode() {
        let config = SiteConfig::default();
        assert_eq!(config.output_dir(Mode::Development), "dist");
        assert_eq!(config.output_dir(Mode::Production), "build");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[output]
build = "public_html"

[sitemap]
url = "https://example.com"

[directives]
"@@analytics;" = "<script src=\"/a.js\"></script>"
"#;
        let config: SiteConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.output.dist, "dist");
        assert_eq!(config.output.build, "public_html");
        assert_eq!(config.app.port, 3000);
        assert_eq!(config.source.pages, "pages");
        assert_eq!(config.styles.browsers, vec!["defaults".to_string()]);
        assert_eq!(config.directives.len(), 1);
    }

    #[test]
    fn legacy_json_config_loads() {
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            r#"{"output":{"dist":"dist","build":"build"},"app":{"port":8080},"sitemap":{"url":"https://example.com"}}"#,
        )
        .unwrap();

        let config = load_config_from(&path).expect("load json");
        assert_eq!(config.app.port, 8080);
        assert_eq!(config.sitemap.url.as_deref(), Some("https://example.com"));
        assert_eq!(config.sitemap.file_name, "sitemap.xml");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_default_config_uses_defaults() {
        let dir = scratch_dir();
        let config = load_config(&dir).expect("defaults");
        assert_eq!(config.output.dist, "dist");
    }

    #[test]
    fn malformed_config_is_reported() {
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[app]\nport = \"not a number\"\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn init_writes_once() {
        let dir = scratch_dir();
        let path = init_config(&dir).expect("init");
        let config = load_config_from(&path).expect("reload");
        assert_eq!(config.app.host, "127.0.0.1");

        assert!(init_config(&dir).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn production_requires_sitemap_url() {
        let mut config = SiteConfig::default();
        assert!(config.validate(Mode::Development).is_ok());

        let err = config.validate(Mode::Production).unwrap_err();
        assert!(err.to_string().contains("sitemap.url"));

        config.sitemap.url = Some("https://example.com".into());
        assert!(config.validate(Mode::Production).is_ok());
    }

    #[test]
    fn sitemap_options_are_checked() {
        let mut config = SiteConfig::default();
        config.sitemap.changefreq = Some("sometimes".into());
        assert!(config.validate(Mode::Development).is_err());

        config.sitemap.changefreq = Some("weekly".into());
        config.sitemap.priority = Some(1.5);
        assert!(config.validate(Mode::Development).is_err());

        config.sitemap.priority = Some(0.8);
        assert!(config.validate(Mode::Development).is_ok());
    }
}
