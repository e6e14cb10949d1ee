//! Script bundling: concatenate sources in order, then minify the result.

use std::path::{Path, PathBuf};

use minify_js::{Session, TopLevelMode};
use tracing::{debug, instrument};

use sitekit_shared::{Result, SiteError, Stage};

/// Separator placed between concatenated sources.
pub const SEPARATOR: &str = "\n";

/// Output of [`bundle`].
#[derive(Debug, Clone)]
pub struct ScriptBundle {
    /// Minified code.
    pub code: String,
    /// Number of source files that went in.
    pub inputs: usize,
}

/// Join sources with [`SEPARATOR`], keeping the given order.
pub fn concat<S: AsRef<str>>(sources: &[S]) -> String {
    sources
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// Minify a script. `origin` is used for error messages only.
pub fn minify(source: &str, origin: &Path) -> Result<String> {
    if source.trim().is_empty() {
        return Ok(String::new());
    }

    let session = Session::new();
    let mut out = Vec::with_capacity(source.len() / 2);
    minify_js::minify(&session, TopLevelMode::Global, source.as_bytes(), &mut out).map_err(
        |e| SiteError::transform(Stage::Scripts, origin, format!("{e:?}")),
    )?;

    String::from_utf8(out).map_err(|e| {
        SiteError::transform(Stage::Scripts, origin, format!("minifier produced non UTF-8 output: {e}"))
    })
}

/// Read `paths` in order, concatenate and minify them. `output_name` labels
/// minifier errors, since they refer to the combined source.
#[instrument(skip(paths), fields(inputs = paths.len()))]
pub async fn bundle(paths: &[PathBuf], output_name: &str) -> Result<ScriptBundle> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SiteError::io(path, e))?;
        let text = String::from_utf8(bytes).map_err(|e| {
            SiteError::invalid_input(format!("{} is not valid UTF-8: {e}", path.display()))
        })?;
        sources.push(text);
    }

    let combined = concat(&sources);
    let origin = PathBuf::from(output_name);
    let code = tokio::task::spawn_blocking(move || minify(&combined, &origin))
        .await
        .map_err(|e| {
            SiteError::transform(Stage::Scripts, output_name, format!("minify task failed: {e}"))
        })??;

    debug!(bytes = code.len(), "scripts bundled");
    Ok(ScriptBundle {
        code,
        inputs: paths.len(),
    })
}
