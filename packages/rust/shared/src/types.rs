//! Core domain types shared by every sitekit crate.

use serde::{Deserialize, Serialize};

/// Environment variable that selects the build mode (see [`Mode::from_env_value`]).
pub const MODE_ENV_VAR: &str = "SITEKIT_ENV";

/// URL path of the live-reload event stream served in development mode.
pub const RELOAD_PATH: &str = "/__sitekit/reload";

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Build mode, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Writes to `output.build`, emits a sitemap, no preview or watch.
    Production,
    /// Writes to `output.dist`, serves a live preview and watches sources.
    #[default]
    Development,
}

impl Mode {
    /// Interpret a raw mode value. Only `production` selects production;
    /// anything else, including an empty value, means development.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::Development => f.write_str("development"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One discrete build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Clean,
    Html,
    Styles,
    Scripts,
    Files,
    Preview,
    Watch,
    Sitemap,
}

impl Stage {
    /// The content stages that run concurrently after Clean.
    pub const CONTENT: [Stage; 4] = [Stage::Html, Stage::Styles, Stage::Scripts, Stage::Files];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Html => "html",
            Self::Styles => "styles",
            Self::Scripts => "scripts",
            Self::Files => "files",
            Self::Preview => "preview",
            Self::Watch => "watch",
            Self::Sitemap => "sitemap",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing_is_lenient() {
        assert_eq!(Mode::from_env_value("production"), Mode::Production);
        assert_eq!(Mode::from_env_value(" PRODUCTION\n"), Mode::Production);
        assert_eq!(Mode::from_env_value("prod"), Mode::Development);
        assert_eq!(Mode::from_env_value(""), Mode::Development);
        assert_eq!(Mode::from_env_value("development"), Mode::Development);
    }

    #[test]
    fn stage_ordering_follows_pipeline() {
        let mut stages = vec![Stage::Sitemap, Stage::Html, Stage::Clean, Stage::Files];
        stages.sort();
        assert_eq!(
            stages,
            vec![Stage::Clean, Stage::Html, Stage::Files, Stage::Sitemap]
        );
        assert_eq!(Stage::Styles.to_string(), "styles");
    }
}
