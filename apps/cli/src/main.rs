//! sitekit CLI: build, preview and watch a static site.
//!
//! Renders page templates, bundles styles and scripts, copies static files,
//! and either serves a live-reloading preview (development) or writes a
//! sitemap (production).

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
