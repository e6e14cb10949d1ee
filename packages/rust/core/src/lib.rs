//! Build orchestration for sitekit.
//!
//! This crate resolves a project into a [`BuildContext`], runs the build
//! stages, and in development mode keeps a preview server and source watcher
//! alive (see [`pipeline::run`]).

pub mod context;
pub mod pipeline;
pub mod sources;
pub mod stages;
pub mod watch;

#[cfg(test)]
mod testutil;

pub use context::{BuildContext, SourceLayout};
pub use pipeline::{BuildOutcome, BuildReport, DevSession, ProgressReporter, SilentProgress};
pub use stages::StageSummary;
