//! Stylesheet compilation.
//!
//! Every source stylesheet is compiled on its own:
//! 1. Optional utility-class expansion through the tailwind CLI ([`Tailwind`])
//! 2. `@import` bundling (when tailwind did not already inline imports)
//! 3. Nesting flattening and vendor prefixing against browserslist targets
//! 4. Minification
//!
//! The last three are handled by `lightningcss`. The compiled outputs are
//! concatenated by the caller.

pub mod tailwind;

use std::path::{Path, PathBuf};

use lightningcss::bundler::{Bundler, FileProvider};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Features, Targets};
use tracing::{debug, instrument};

use sitekit_shared::{Result, SiteError, Stage};

pub use tailwind::Tailwind;

/// Compiles individual stylesheets with fixed targets.
#[derive(Debug, Clone)]
pub struct StyleCompiler {
    targets: Targets,
    tailwind: Option<Tailwind>,
}

impl StyleCompiler {
    /// Create a compiler for the given browserslist queries. An empty query
    /// list disables prefixing and syntax lowering.
    pub fn new(browsers: &[String], tailwind: Option<Tailwind>) -> Result<Self> {
        Ok(Self {
            targets: targets_for(browsers)?,
            tailwind,
        })
    }

    pub fn targets(&self) -> Targets {
        self.targets
    }

    /// Compile one stylesheet to minified CSS.
    #[instrument(skip(self), fields(file = %path.display(), tailwind = self.tailwind.is_some()))]
    pub async fn compile(&self, path: &Path) -> Result<String> {
        let targets = self.targets;
        let owned: PathBuf = path.to_path_buf();

        let task = match &self.tailwind {
            Some(tailwind) => {
                let expanded = tailwind.process(path).await?;
                tokio::task::spawn_blocking(move || compile_source(&expanded, &owned, targets))
            }
            None => tokio::task::spawn_blocking(move || compile_file(&owned, targets)),
        };

        let css = task
            .await
            .map_err(|e| transform_error(path, format!("compile task failed: {e}")))??;

        debug!(bytes = css.len(), "stylesheet compiled");
        Ok(css)
    }
}

/// Resolve browserslist queries into lightningcss targets. Nesting is always
/// flattened, whatever the browsers support.
pub fn targets_for(browsers: &[String]) -> Result<Targets> {
    let resolved = if browsers.is_empty() {
        None
    } else {
        Browsers::from_browserslist(browsers.iter()).map_err(|e| {
            SiteError::config(format!(
                "invalid styles.browsers query {:?}: {e}",
                browsers
            ))
        })?
    };

    Ok(Targets {
        browsers: resolved,
        include: Features::Nesting,
        ..Targets::default()
    })
}

/// Bundle `@import`s starting at `path`, then lower and minify.
pub fn compile_file(path: &Path, targets: Targets) -> Result<String> {
    let fs = FileProvider::new();
    let mut bundler = Bundler::new(&fs, None, ParserOptions::default());
    let mut sheet = bundler
        .bundle(path)
        .map_err(|e| transform_error(path, e.to_string()))?;

    finish(&mut sheet, path, targets)
}

/// Lower and minify CSS that is already in memory. `origin` is used for
/// error messages only; `@import` rules are left as written.
pub fn compile_source(source: &str, origin: &Path, targets: Targets) -> Result<String> {
    let options = ParserOptions {
        filename: origin.display().to_string(),
        ..ParserOptions::default()
    };
    let mut sheet = StyleSheet::parse(source, options)
        .map_err(|e| transform_error(origin, e.to_string()))?;

    finish(&mut sheet, origin, targets)
}

fn finish(sheet: &mut StyleSheet, path: &Path, targets: Targets) -> Result<String> {
    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| transform_error(path, e.to_string()))?;

    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| transform_error(path, e.to_string()))?;

    Ok(printed.code)
}

fn transform_error(path: &Path, message: impl Into<String>) -> SiteError {
    SiteError::transform(Stage::Styles, path, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sitekit-styles-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn safari13() -> Targets {
        targets_for(&["safari 13".to_string()]).unwrap()
    }

    #[test]
    fn flattens_nesting_and_minifies() {
        let css = ".card {\n  color: blue;\n  & .title { font-weight: bold; }\n}\n";
        let out = compile_source(css, Path::new("card.css"), safari13()).unwrap();
        assert!(out.contains(".card .title"), "got {out}");
        assert!(!out.contains('&'));
        assert!(!out.contains('\n'));
    }

    #[test]
    fn adds_vendor_prefixes() {
        let css = ".no-select { user-select: none; }";
        let out = compile_source(css, Path::new("x.css"), safari13()).unwrap();
        assert!(out.contains("-webkit-user-select"), "got {out}");
    }

    #[test]
    fn bundles_imports() {
        let dir = scratch_dir();
        std::fs::create_dir_all(dir.join("partials")).unwrap();
        std::fs::write(dir.join("partials/base.css"), ".base { margin: 0 }").unwrap();
        std::fs::write(
            dir.join("main.css"),
            "@import \"partials/base.css\";\n.main { padding: 0 }",
        )
        .unwrap();

        let out = compile_file(&dir.join("main.css"), Targets::default()).unwrap();
        assert!(out.contains(".base"));
        assert!(out.contains(".main"));
        assert!(!out.contains("@import"));
        assert!(out.find(".base").unwrap() < out.find(".main").unwrap());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_import_is_transform_error() {
        let dir = scratch_dir();
        std::fs::write(dir.join("main.css"), "@import \"missing.css\";").unwrap();

        let err = compile_file(&dir.join("main.css"), Targets::default()).unwrap_err();
        assert!(matches!(
            err,
            SiteError::Transform {
                stage: Stage::Styles,
                ..
            }
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_browser_list_means_no_targets() {
        let targets = targets_for(&[]).unwrap();
        assert!(targets.browsers.is_none());
        assert!(targets.include.contains(Features::Nesting));
    }

    #[test]
    fn nesting_is_flattened_for_any_targets() {
        let css = ".card {\n  color: blue;\n  & .title { font-weight: bold; }\n}\n";
        for browsers in [vec![], vec!["chrome 120".to_string()], vec!["defaults".to_string()]] {
            let targets = targets_for(&browsers).unwrap();
            let out = compile_source(css, Path::new("card.css"), targets).unwrap();
            assert!(out.contains(".card .title"), "{browsers:?}: got {out}");
            assert!(!out.contains('&'), "{browsers:?}: got {out}");
        }
    }

    #[tokio::test]
    async fn compiler_reads_from_disk() {
        let dir = scratch_dir();
        std::fs::write(dir.join("site.css"), "body { margin: 0px; }").unwrap();

        let compiler = StyleCompiler::new(&[], None).unwrap();
        let out = compiler.compile(&dir.join("site.css")).await.unwrap();
        assert_eq!(out, "body{margin:0}");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
