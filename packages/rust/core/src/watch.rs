//! Source watching for development builds.
//!
//! `notify` pushes changed paths into an unbounded channel. A single consumer
//! task classifies them with [`WatchRules`], re-runs the matching stages in
//! pipeline order, then asks the preview to reload. Dropping the watcher
//! closes the channel, which ends the consumer loop.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::GlobMatcher;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use sitekit_server::Reloader;
use sitekit_shared::{Result, SiteError, Stage};

use crate::context::BuildContext;
use crate::sources;
use crate::stages;

/// Quiet period used to fold a burst of events (one editor save) into a
/// single rebuild.
const SETTLE: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum PathMatcher {
    Under { base: PathBuf, glob: GlobMatcher },
    Exact(PathBuf),
}

impl PathMatcher {
    fn under(base: &Path, pattern: &str) -> Result<Self> {
        Ok(Self::Under {
            base: base.to_path_buf(),
            glob: sources::glob(pattern)?,
        })
    }

    fn matches(&self, path: &Path) -> bool {
        match self {
            Self::Under { base, glob } => path
                .strip_prefix(base)
                .is_ok_and(|relative| glob.is_match(relative)),
            Self::Exact(file) => path == file,
        }
    }
}

#[derive(Debug, Clone)]
struct WatchRule {
    label: &'static str,
    matchers: Vec<PathMatcher>,
    stages: &'static [Stage],
}

/// Maps changed source paths to the stages that must re-run.
#[derive(Debug, Clone)]
pub struct WatchRules {
    rules: Vec<WatchRule>,
}

impl WatchRules {
    pub fn for_context(ctx: &BuildContext) -> Result<Self> {
        let layout = &ctx.layout;

        let mut style_matchers = vec![
            PathMatcher::under(&layout.styles, "**/*.css")?,
            PathMatcher::under(&layout.slices, "**/*.css")?,
        ];
        if let Some(tailwind) = &ctx.tailwind {
            style_matchers.push(PathMatcher::Exact(tailwind.config_path().to_path_buf()));
        }

        let rules = vec![
            // Utility classes are generated from markup, so markup changes restyle too.
            WatchRule {
                label: "markup",
                matchers: vec![
                    PathMatcher::under(&layout.pages, "**/*.html")?,
                    PathMatcher::under(&layout.slices, "**/*.html")?,
                ],
                stages: &[Stage::Html, Stage::Styles],
            },
            WatchRule {
                label: "styles",
                matchers: style_matchers,
                stages: &[Stage::Styles],
            },
            WatchRule {
                label: "scripts",
                matchers: vec![
                    PathMatcher::under(&layout.scripts, "**/*.js")?,
                    PathMatcher::under(&layout.slices, "**/*.js")?,
                ],
                stages: &[Stage::Scripts],
            },
            WatchRule {
                label: "public",
                matchers: vec![PathMatcher::under(&layout.public, "**/*")?],
                stages: &[Stage::Files],
            },
        ];

        Ok(Self { rules })
    }

    /// Stages triggered by a single changed path.
    pub fn stages_for(&self, path: &Path) -> Vec<Stage> {
        self.plan([path])
    }

    /// Union of the stages triggered by `paths`, in pipeline order.
    pub fn plan<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) -> Vec<Stage> {
        let mut stages = BTreeSet::new();
        for path in paths {
            for rule in &self.rules {
                if rule.matchers.iter().any(|m| m.matches(path)) {
                    debug!(rule = rule.label, path = %path.display(), "change matched");
                    stages.extend(rule.stages.iter().copied());
                }
            }
        }
        stages.into_iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Live watch registration plus its consumer task.
pub struct WatchSession {
    watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession").finish_non_exhaustive()
    }
}

impl WatchSession {
    /// Close the event channel and wait for the consumer to drain.
    pub async fn stop(self) {
        drop(self.watcher);
        if let Err(e) = self.task.await {
            warn!(error = %e, "watch loop ended abnormally");
        }
    }
}

/// Register watches for the source tree and spawn the rebuild loop.
pub fn start(ctx: BuildContext, reloader: Reloader) -> Result<WatchSession> {
    let rules = WatchRules::for_context(&ctx)?;
    let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) if !matches!(event.kind, EventKind::Access(_)) => {
                for path in event.paths {
                    // The receiver is gone only during shutdown.
                    let _ = tx.send(path);
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "file watch error"),
        }
    })
    .map_err(|e| SiteError::Watch(format!("failed to create watcher: {e}")))?;

    if ctx.layout.root.is_dir() {
        watcher
            .watch(&ctx.layout.root, RecursiveMode::Recursive)
            .map_err(|e| SiteError::Watch(format!("{}: {e}", ctx.layout.root.display())))?;
    } else {
        warn!(path = %ctx.layout.root.display(), "source directory missing, nothing to watch");
    }

    // Top-level files such as the tailwind config.
    watcher
        .watch(&ctx.project_root, RecursiveMode::NonRecursive)
        .map_err(|e| SiteError::Watch(format!("{}: {e}", ctx.project_root.display())))?;

    info!("watching for changes");
    let task = tokio::spawn(event_loop(ctx, rules, rx, reloader));

    Ok(WatchSession { watcher, task })
}

async fn event_loop(
    ctx: BuildContext,
    rules: WatchRules,
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
    reloader: Reloader,
) {
    while let Some(first) = rx.recv().await {
        tokio::time::sleep(SETTLE).await;

        let mut changed = vec![first];
        while let Ok(path) = rx.try_recv() {
            changed.push(path);
        }

        let plan = rules.plan(changed.iter().map(PathBuf::as_path));
        if plan.is_empty() {
            continue;
        }

        info!(?plan, files = changed.len(), "changes detected");
        match rerun(&ctx, &plan).await {
            Ok(()) => {
                reloader.reload();
            }
            Err(e) => error!(error = %e, "rebuild failed"),
        }
    }

    debug!("watch channel closed");
}

/// Re-run content stages sequentially, stopping at the first failure.
pub async fn rerun(ctx: &BuildContext, plan: &[Stage]) -> Result<()> {
    for stage in plan {
        stages::run_content_stage(ctx, *stage).await?;
    }
    Ok(())
}
