//! End-to-end build: clean → content stages → preview → watch → sitemap.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use sitekit_server::{PreviewServer, Reloader};
use sitekit_shared::{Mode, Result, SiteError, Stage};

use crate::context::BuildContext;
use crate::stages::{self, StageSummary};
use crate::watch::{self, WatchSession};

/// Result of a pipeline run.
#[derive(Debug)]
pub struct BuildReport {
    pub mode: Mode,
    pub output_dir: PathBuf,
    /// Pages rendered by the HTML stage.
    pub pages: usize,
    /// Stylesheets compiled into `style.css`.
    pub stylesheets: usize,
    /// Scripts bundled into `script.js`.
    pub scripts: usize,
    /// Static files copied.
    pub files: usize,
    /// Written sitemap (production only).
    pub sitemap: Option<PathBuf>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage begins.
    fn stage_started(&self, stage: Stage);
    /// Called when a stage completes successfully.
    fn stage_finished(&self, stage: Stage, elapsed: Duration);
    /// Called for stages that do nothing in the current mode.
    fn stage_skipped(&self, stage: Stage, mode: Mode);
    /// Called when the pipeline completes.
    fn done(&self, report: &BuildReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage, _elapsed: Duration) {}
    fn stage_skipped(&self, _stage: Stage, _mode: Mode) {}
    fn done(&self, _report: &BuildReport) {}
}

/// What a pipeline run leaves behind.
#[derive(Debug)]
pub struct BuildOutcome {
    pub report: BuildReport,
    /// Preview server and watcher, present in development mode only.
    pub dev: Option<DevSession>,
}

/// Running preview server plus source watcher.
#[derive(Debug)]
pub struct DevSession {
    server: PreviewServer,
    watcher: WatchSession,
    reloader: Reloader,
}

impl DevSession {
    pub fn url(&self) -> String {
        self.server.url()
    }

    pub fn server(&self) -> &PreviewServer {
        &self.server
    }

    pub fn reloader(&self) -> &Reloader {
        &self.reloader
    }

    /// Serve and watch until Ctrl-C, then shut both down.
    pub async fn run_until_shutdown(self) -> Result<()> {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| SiteError::Watch(format!("failed to listen for Ctrl-C: {e}")))?;
        info!("shutdown requested");
        self.stop().await
    }

    /// Stop watching first so no rebuild races the server shutdown.
    pub async fn stop(self) -> Result<()> {
        self.watcher.stop().await;
        self.server.shutdown().await
    }
}

/// Run the full pipeline.
///
/// 1. Clean the output directory
/// 2. HTML, Styles, Scripts and Files, concurrently
/// 3. Live preview (development)
/// 4. Watch (development)
/// 5. Sitemap (production)
#[instrument(skip_all, fields(mode = %ctx.mode, output = %ctx.output_dir.display()))]
pub async fn run(ctx: &BuildContext, progress: &dyn ProgressReporter) -> Result<BuildOutcome> {
    let start = Instant::now();
    info!("starting build pipeline");

    // --- Stage 1: Clean ---
    tracked(Stage::Clean, progress, stages::clean(ctx)).await?;

    // --- Stage 2: Content, fanned out ---
    let (html, styles, scripts, files) = tokio::try_join!(
        tracked(Stage::Html, progress, stages::html(ctx)),
        tracked(Stage::Styles, progress, stages::styles(ctx)),
        tracked(Stage::Scripts, progress, stages::scripts(ctx)),
        tracked(Stage::Files, progress, stages::files(ctx)),
    )?;

    // --- Stages 3 & 4: Live preview and watch ---
    let dev = if ctx.mode.is_development() {
        let reloader = Reloader::new();
        let server = tracked(Stage::Preview, progress, async {
            PreviewServer::start(&ctx.output_dir, &ctx.host, ctx.port, reloader.clone()).await
        })
        .await?;
        info!(url = %server.url(), "preview available");

        let started = tracked(Stage::Watch, progress, async {
            watch::start(ctx.clone(), reloader.clone())
        })
        .await;
        let watcher = match started {
            Ok(watcher) => watcher,
            Err(e) => {
                if let Err(stop) = server.shutdown().await {
                    warn!(error = %stop, "preview server did not stop cleanly");
                }
                return Err(e);
            }
        };

        Some(DevSession {
            server,
            watcher,
            reloader,
        })
    } else {
        progress.stage_skipped(Stage::Preview, ctx.mode);
        progress.stage_skipped(Stage::Watch, ctx.mode);
        None
    };

    // --- Stage 5: Sitemap ---
    let sitemap = if ctx.mode.is_production() {
        Some(tracked(Stage::Sitemap, progress, stages::sitemap(ctx)).await?)
    } else {
        progress.stage_skipped(Stage::Sitemap, ctx.mode);
        None
    };

    let report = BuildReport {
        mode: ctx.mode,
        output_dir: ctx.output_dir.clone(),
        pages: html.inputs,
        stylesheets: styles.inputs,
        scripts: scripts.inputs,
        files: files.inputs,
        sitemap,
        elapsed: start.elapsed(),
    };

    progress.done(&report);

    info!(
        pages = report.pages,
        stylesheets = report.stylesheets,
        scripts = report.scripts,
        files = report.files,
        elapsed_ms = report.elapsed.as_millis(),
        "build pipeline complete"
    );

    Ok(BuildOutcome { report, dev })
}

/// Summaries of every content stage, for callers that only need stage 2.
pub async fn build_content(ctx: &BuildContext) -> Result<[StageSummary; 4]> {
    let (html, styles, scripts, files) = tokio::try_join!(
        stages::html(ctx),
        stages::styles(ctx),
        stages::scripts(ctx),
        stages::files(ctx),
    )?;
    Ok([html, styles, scripts, files])
}

async fn tracked<T, F>(stage: Stage, progress: &dyn ProgressReporter, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    progress.stage_started(stage);
    let start = Instant::now();
    let value = fut.await?;
    progress.stage_finished(stage, start.elapsed());
    Ok(value)
}
