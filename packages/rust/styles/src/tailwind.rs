//! Utility-class expansion through the external tailwind CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use sitekit_shared::{Result, SiteError, Stage};

/// Handle for running the tailwind CLI against single stylesheets.
#[derive(Debug, Clone)]
pub struct Tailwind {
    command: String,
    config: PathBuf,
    working_dir: PathBuf,
}

impl Tailwind {
    /// `config` is the tailwind config file; the CLI runs inside `working_dir`
    /// so content globs in that file resolve against the project root.
    pub fn new(command: impl Into<String>, config: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            config: config.into(),
            working_dir: working_dir.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config
    }

    /// Expand `input` and return the generated CSS.
    pub async fn process(&self, input: &Path) -> Result<String> {
        debug!(cmd = %self.command, input = %input.display(), "running tailwind");

        let output = Command::new(&self.command)
            .arg("--config")
            .arg(&self.config)
            .arg("--input")
            .arg(input)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                SiteError::transform(
                    Stage::Styles,
                    input,
                    format!("failed to spawn `{}`: {e}. Is it installed?", self.command),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SiteError::transform(
                Stage::Styles,
                input,
                format!(
                    "`{}` exited with {}: {}",
                    self.command,
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        let css = String::from_utf8(output.stdout).map_err(|e| {
            SiteError::transform(Stage::Styles, input, format!("non UTF-8 output: {e}"))
        })?;

        info!(input = %input.display(), bytes = css.len(), "tailwind pass complete");
        Ok(css)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let tailwind = Tailwind::new(
            "sitekit-definitely-not-installed",
            "tailwind.config.js",
            std::env::temp_dir(),
        );
        let err = tailwind.process(Path::new("main.css")).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("failed to spawn"));
        assert!(msg.contains("main.css"));
    }
}
