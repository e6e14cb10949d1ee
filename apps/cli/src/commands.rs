//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use sitekit_core::pipeline::{BuildReport, ProgressReporter};
use sitekit_core::{BuildContext, stages};
use sitekit_shared::{MODE_ENV_VAR, Mode, SiteConfig, Stage, init_config, load_config, load_config_from};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sitekit: static site build pipeline with live preview.
#[derive(Parser)]
#[command(
    name = "sitekit",
    version,
    about = "Build HTML, CSS and JavaScript for a static site, with a live-reloading preview.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Project root containing the config file and sources.
    #[arg(long, default_value = ".", global = true)]
    pub root: PathBuf,

    /// Config file (defaults to <root>/sitekit.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Build mode. Only "production" selects production.
    #[arg(long, env = MODE_ENV_VAR, default_value = "development", global = true)]
    pub mode: String,

    /// Defaults to `build`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the build pipeline. In development, keep serving and watching until Ctrl-C.
    Build,

    /// Remove the output directory for the current mode.
    Clean,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a default sitekit.toml into the project root.
    Init,
    /// Show resolved configuration.
    Show,
}

impl Cli {
    fn mode(&self) -> Mode {
        Mode::from_env_value(&self.mode)
    }

    fn load_config(&self) -> Result<SiteConfig> {
        let config = match &self.config {
            Some(path) => load_config_from(path)?,
            None => load_config(&self.root)?,
        };
        Ok(config)
    }

    fn context(&self) -> Result<BuildContext> {
        let config = self.load_config()?;
        Ok(BuildContext::new(&self.root, &config, self.mode())?)
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sitekit=info",
        1 => "sitekit=debug",
        _ => "sitekit=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        None | Some(Command::Build) => cmd_build(&cli).await,
        Some(Command::Clean) => cmd_clean(&cli).await,
        Some(Command::Config { action }) => match action {
            ConfigAction::Init => cmd_config_init(&cli.root),
            ConfigAction::Show => cmd_config_show(&cli),
        },
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: Stage) {
        self.spinner.set_message(format!("Running {stage}"));
    }

    fn stage_finished(&self, stage: Stage, elapsed: Duration) {
        self.spinner
            .println(format!("  ✓ {stage:<8} {:>6.0}ms", elapsed.as_secs_f64() * 1000.0));
    }

    fn stage_skipped(&self, stage: Stage, mode: Mode) {
        self.spinner
            .println(format!("  - {stage:<8} skipped in {mode}"));
    }

    fn done(&self, _report: &BuildReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(cli: &Cli) -> Result<()> {
    let ctx = cli.context()?;
    info!(
        root = %ctx.project_root.display(),
        mode = %ctx.mode,
        "building site"
    );

    let reporter = CliProgress::new();
    let outcome = match sitekit_core::pipeline::run(&ctx, &reporter).await {
        Ok(outcome) => outcome,
        Err(e) => {
            reporter.spinner.abandon();
            return Err(e.into());
        }
    };
    let report = &outcome.report;

    println!();
    println!("  Build complete ({})", report.mode);
    println!("  Output:      {}", report.output_dir.display());
    println!("  Pages:       {}", report.pages);
    println!("  Stylesheets: {}", report.stylesheets);
    println!("  Scripts:     {}", report.scripts);
    println!("  Files:       {}", report.files);
    if let Some(sitemap) = &report.sitemap {
        println!("  Sitemap:     {}", sitemap.display());
    }
    println!("  Time:        {:.1}s", report.elapsed.as_secs_f64());
    println!();

    if let Some(dev) = outcome.dev {
        println!("  Preview available at {}", dev.url());
        println!("  Watching for changes. Press Ctrl-C to stop.");
        println!();
        dev.run_until_shutdown().await?;
    }

    Ok(())
}

async fn cmd_clean(cli: &Cli) -> Result<()> {
    let ctx = cli.context()?;
    if stages::clean(&ctx).await? {
        println!("Removed {}", ctx.output_dir.display());
    } else {
        println!("Nothing to clean at {}", ctx.output_dir.display());
    }
    Ok(())
}

fn cmd_config_init(root: &Path) -> Result<()> {
    let path = init_config(root)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = cli.load_config()?;
    config
        .validate(cli.mode())
        .map_err(|e| eyre!("configuration is invalid for {} mode: {e}", cli.mode()))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_builds() {
        let cli = Cli::try_parse_from(["sitekit", "--mode", "development"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.mode(), Mode::Development);
    }

    #[test]
    fn mode_flag_selects_production() {
        let cli = Cli::try_parse_from(["sitekit", "build", "--mode", "PRODUCTION"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Build)));
        assert_eq!(cli.mode(), Mode::Production);

        let cli = Cli::try_parse_from(["sitekit", "clean", "--mode", "staging"]).unwrap();
        assert_eq!(cli.mode(), Mode::Development);
    }

    #[test]
    fn config_subcommands_parse() {
        let cli = Cli::try_parse_from(["sitekit", "--root", "site", "config", "show"]).unwrap();
        assert_eq!(cli.root, PathBuf::from("site"));
        assert!(matches!(
            cli.command,
            Some(Command::Config {
                action: ConfigAction::Show
            })
        ));
    }
}
