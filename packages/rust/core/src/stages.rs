//! The individual build stages.
//!
//! Content stages (HTML, Styles, Scripts, Files) read disjoint inputs and
//! write disjoint outputs, so they can run concurrently and in any order.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use sitekit_artifacts::SitemapEntry;
use sitekit_shared::{Result, SiteError, Stage};

use crate::context::BuildContext;
use crate::sources;

/// Name of the combined stylesheet in the output root.
pub const STYLE_OUTPUT: &str = "style.css";

/// Name of the combined script in the output root.
pub const SCRIPT_OUTPUT: &str = "script.js";

/// Directory static assets are copied into, below the output root.
pub const PUBLIC_OUTPUT: &str = "public";

/// What a content stage consumed and produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub stage: Stage,
    /// Source files read.
    pub inputs: usize,
    /// Files written below the output directory.
    pub outputs: Vec<PathBuf>,
}

impl StageSummary {
    fn new(stage: Stage, inputs: usize, outputs: Vec<PathBuf>) -> Self {
        Self {
            stage,
            inputs,
            outputs,
        }
    }
}

// ---------------------------------------------------------------------------
// Clean
// ---------------------------------------------------------------------------

/// Remove the output directory. Returns `false` when there was nothing to remove.
#[instrument(skip_all, fields(output = %ctx.output_dir.display()))]
pub async fn clean(ctx: &BuildContext) -> Result<bool> {
    info!("cleaning output directory for a fresh start");

    match tokio::fs::remove_dir_all(&ctx.output_dir).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("output directory does not exist");
            Ok(false)
        }
        Err(e) => Err(SiteError::io(&ctx.output_dir, e)),
    }
}

// ---------------------------------------------------------------------------
// Content stages
// ---------------------------------------------------------------------------

/// Run one content stage by name. Used by the watcher for re-runs.
pub async fn run_content_stage(ctx: &BuildContext, stage: Stage) -> Result<StageSummary> {
    match stage {
        Stage::Html => html(ctx).await,
        Stage::Styles => styles(ctx).await,
        Stage::Scripts => scripts(ctx).await,
        Stage::Files => files(ctx).await,
        other => Err(SiteError::validation(format!(
            "{other} is not a content stage"
        ))),
    }
}

/// Render every page template into the output directory, mirroring the
/// layout below the pages directory.
#[instrument(skip_all)]
pub async fn html(ctx: &BuildContext) -> Result<StageSummary> {
    info!("preparing HTML");

    let pages = sources::collect(&ctx.layout.pages, "**/*.html")?;
    let renderer = ctx.page_renderer();

    let rendered = tokio::task::spawn_blocking(move || {
        pages
            .into_iter()
            .map(|page| renderer.render(&page).map(|html| (page, html)))
            .collect::<Result<Vec<_>>>()
    })
    .await
    .map_err(|e| SiteError::template(&ctx.layout.pages, format!("render task failed: {e}")))??;

    let mut outputs = Vec::with_capacity(rendered.len());
    for (page, html) in &rendered {
        let relative = page
            .strip_prefix(&ctx.layout.pages)
            .map_err(|_| SiteError::validation(format!("{} is outside the pages directory", page.display())))?;
        let target = ctx.output_dir.join(relative);
        write_file(&target, html.as_bytes()).await?;
        outputs.push(target);
    }

    info!(pages = outputs.len(), "HTML ready");
    Ok(StageSummary::new(Stage::Html, rendered.len(), outputs))
}

/// Compile top-level and component stylesheets into a single `style.css`.
#[instrument(skip_all)]
pub async fn styles(ctx: &BuildContext) -> Result<StageSummary> {
    info!("preparing CSS");

    let inputs = sources::collect_groups(&[
        (&ctx.layout.styles, "*.css"),
        (&ctx.layout.slices, "**/*.css"),
    ])?;
    if inputs.is_empty() {
        debug!("no stylesheets found");
        return Ok(StageSummary::new(Stage::Styles, 0, Vec::new()));
    }

    let compiler = ctx.style_compiler()?;
    let mut compiled = Vec::with_capacity(inputs.len());
    for input in &inputs {
        compiled.push(compiler.compile(input).await?);
    }

    let target = ctx.output_dir.join(STYLE_OUTPUT);
    write_file(&target, compiled.join("\n").as_bytes()).await?;

    info!(stylesheets = inputs.len(), "CSS ready");
    Ok(StageSummary::new(Stage::Styles, inputs.len(), vec![target]))
}

/// Concatenate top-level and component scripts into a minified `script.js`.
#[instrument(skip_all)]
pub async fn scripts(ctx: &BuildContext) -> Result<StageSummary> {
    info!("preparing JavaScript");

    let inputs = sources::collect_groups(&[
        (&ctx.layout.scripts, "*.js"),
        (&ctx.layout.slices, "**/*.js"),
    ])?;
    if inputs.is_empty() {
        debug!("no scripts found");
        return Ok(StageSummary::new(Stage::Scripts, 0, Vec::new()));
    }

    let bundle = sitekit_scripts::bundle(&inputs, SCRIPT_OUTPUT).await?;
    let target = ctx.output_dir.join(SCRIPT_OUTPUT);
    write_file(&target, bundle.code.as_bytes()).await?;

    info!(scripts = bundle.inputs, "JavaScript ready");
    Ok(StageSummary::new(Stage::Scripts, bundle.inputs, vec![target]))
}

/// Copy static assets verbatim into `<output>/public`.
#[instrument(skip_all)]
pub async fn files(ctx: &BuildContext) -> Result<StageSummary> {
    info!("preparing files");

    let inputs = sources::collect(&ctx.layout.public, "**/*")?;
    let destination = ctx.output_dir.join(PUBLIC_OUTPUT);

    let mut outputs = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let relative = input
            .strip_prefix(&ctx.layout.public)
            .map_err(|_| SiteError::validation(format!("{} is outside the public directory", input.display())))?;
        let target = destination.join(relative);
        ensure_parent(&target).await?;
        tokio::fs::copy(input, &target)
            .await
            .map_err(|e| SiteError::io(input, e))?;
        outputs.push(target);
    }

    info!(files = outputs.len(), "files ready");
    Ok(StageSummary::new(Stage::Files, inputs.len(), outputs))
}

// ---------------------------------------------------------------------------
// Sitemap
// ---------------------------------------------------------------------------

/// Write a sitemap listing every HTML file in the output tree.
#[instrument(skip_all, fields(output = %ctx.output_dir.display()))]
pub async fn sitemap(ctx: &BuildContext) -> Result<PathBuf> {
    let site_url = ctx
        .site_url
        .as_ref()
        .ok_or_else(|| SiteError::config("sitemap.url is required to generate a sitemap"))?;

    let pages = sources::collect(&ctx.output_dir, "**/*.html")?;
    let mut entries = Vec::with_capacity(pages.len());
    for page in &pages {
        let relative = page
            .strip_prefix(&ctx.output_dir)
            .map_err(|_| SiteError::validation(format!("{} is outside the output directory", page.display())))?;
        let modified = tokio::fs::metadata(page)
            .await
            .map_err(|e| SiteError::io(page, e))?
            .modified()
            .ok()
            .map(DateTime::<Utc>::from);

        entries.push(SitemapEntry {
            path: relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            last_modified: modified,
        });
    }

    let xml = sitekit_artifacts::generate_sitemap(site_url, &entries, &ctx.sitemap_options)?;
    let target = ctx.output_dir.join(&ctx.sitemap_file);
    write_file(&target, xml.as_bytes()).await?;

    info!(pages = entries.len(), path = %target.display(), "sitemap written");
    Ok(target)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SiteError::io(parent, e))?;
    }
    Ok(())
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent(path).await?;
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| SiteError::io(path, e))
}
