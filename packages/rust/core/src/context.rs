//! Runtime build context, resolved once from the config, project root and mode.

use std::path::{Component, Path, PathBuf};

use url::Url;

use sitekit_artifacts::SitemapOptions;
use sitekit_html::{DirectiveTable, PageRenderer};
use sitekit_shared::{Mode, RELOAD_PATH, Result, SiteConfig, SiteError, SourceConfig};
use sitekit_styles::{StyleCompiler, Tailwind};

/// Absolute locations of every source directory.
#[derive(Debug, Clone)]
pub struct SourceLayout {
    /// Source root, also the `@@include` base path.
    pub root: PathBuf,
    pub pages: PathBuf,
    pub styles: PathBuf,
    pub scripts: PathBuf,
    pub slices: PathBuf,
    pub public: PathBuf,
}

impl SourceLayout {
    pub fn from_config(project_root: &Path, source: &SourceConfig) -> Self {
        let root = normalize(&project_root.join(&source.root));
        Self {
            pages: root.join(&source.pages),
            styles: root.join(&source.styles),
            scripts: root.join(&source.scripts),
            slices: root.join(&source.slices),
            public: root.join(&source.public),
            root,
        }
    }
}

/// Everything a stage needs. Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Canonical project root.
    pub project_root: PathBuf,
    pub mode: Mode,
    /// `output.dist` or `output.build`, resolved against the project root.
    pub output_dir: PathBuf,
    pub layout: SourceLayout,
    pub host: String,
    pub port: u16,
    /// Parsed `sitemap.url`.
    pub site_url: Option<Url>,
    pub sitemap_file: String,
    pub sitemap_options: SitemapOptions,
    pub browsers: Vec<String>,
    pub tailwind: Option<Tailwind>,
    pub directives: DirectiveTable,
}

impl BuildContext {
    /// Validate `config` for `mode` and resolve all paths below `project_root`.
    pub fn new(project_root: &Path, config: &SiteConfig, mode: Mode) -> Result<Self> {
        config.validate(mode)?;

        let project_root =
            std::fs::canonicalize(project_root).map_err(|e| SiteError::io(project_root, e))?;

        let site_url = config
            .sitemap
            .url
            .as_deref()
            .map(|raw| {
                Url::parse(raw)
                    .map_err(|e| SiteError::config(format!("invalid sitemap.url '{raw}': {e}")))
            })
            .transpose()?;

        let tailwind = config.styles.tailwind.as_ref().map(|tw| {
            Tailwind::new(
                tw.command.clone(),
                project_root.join(&tw.config),
                project_root.clone(),
            )
        });

        let ctx = Self {
            output_dir: normalize(&project_root.join(config.output_dir(mode))),
            layout: SourceLayout::from_config(&project_root, &config.source),
            mode,
            host: config.app.host.clone(),
            port: config.app.port,
            site_url,
            sitemap_file: config.sitemap.file_name.clone(),
            sitemap_options: SitemapOptions {
                changefreq: config.sitemap.changefreq.clone(),
                priority: config.sitemap.priority,
            },
            browsers: config.styles.browsers.clone(),
            tailwind,
            directives: DirectiveTable::with_extra(&config.directives)?,
            project_root,
        };

        ctx.check_output_location()?;
        Ok(ctx)
    }

    /// Renderer for the HTML stage. Development builds get the live-reload client.
    pub fn page_renderer(&self) -> PageRenderer {
        let renderer = PageRenderer::new(&self.layout.root, self.directives.clone());
        if self.mode.is_development() {
            renderer.with_live_reload(RELOAD_PATH)
        } else {
            renderer
        }
    }

    pub fn style_compiler(&self) -> Result<StyleCompiler> {
        StyleCompiler::new(&self.browsers, self.tailwind.clone())
    }

    /// The output directory is wiped by Clean and written by every content
    /// stage, so it must neither contain the project nor sit inside the
    /// sources.
    fn check_output_location(&self) -> Result<()> {
        let output = &self.output_dir;
        if self.project_root.starts_with(output) || self.layout.root.starts_with(output) {
            return Err(SiteError::config(format!(
                "output directory {} would contain the project sources",
                output.display()
            )));
        }
        if output.starts_with(&self.layout.root) {
            return Err(SiteError::config(format!(
                "output directory {} is inside the source directory {}",
                output.display(),
                self.layout.root.display()
            )));
        }
        Ok(())
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
