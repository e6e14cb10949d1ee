//! HTML page rendering: include expansion, directive substitution and
//! live-reload injection.
//!
//! A page goes through three passes in order:
//! 1. [`IncludeResolver`] inlines `@@include(...)` fragments and context variables
//! 2. [`DirectiveTable`] substitutes static directive tokens
//! 3. In development, the live-reload snippet is injected before `</body>`

pub mod directives;
pub mod include;
pub mod livereload;

use std::path::Path;

use tracing::{debug, instrument};

use sitekit_shared::Result;

pub use directives::{BEFORE_SCRIPT_SNIPPET, BEFORE_SCRIPT_TOKEN, DirectiveTable};
pub use include::{Context, IncludeResolver, MAX_INCLUDE_DEPTH};

/// Everything needed to render pages from one source tree.
#[derive(Debug, Clone)]
pub struct PageRenderer {
    resolver: IncludeResolver,
    directives: DirectiveTable,
    reload_snippet: Option<String>,
}

impl PageRenderer {
    /// Create a renderer resolving includes below `include_base`.
    pub fn new(include_base: &Path, directives: DirectiveTable) -> Self {
        Self {
            resolver: IncludeResolver::new(include_base),
            directives,
            reload_snippet: None,
        }
    }

    /// Inject a live-reload client listening on `endpoint` into every page.
    pub fn with_live_reload(mut self, endpoint: &str) -> Self {
        self.reload_snippet = Some(livereload::snippet(endpoint));
        self
    }

    /// Render one page template to its final HTML.
    #[instrument(skip(self), fields(page = %path.display()))]
    pub fn render(&self, path: &Path) -> Result<String> {
        let expanded = self.resolver.resolve_file(path)?;
        let mut html = self.directives.apply(&expanded);

        if let Some(snippet) = &self.reload_snippet {
            html = livereload::inject(&html, snippet);
        }

        debug!(bytes = html.len(), "page rendered");
        Ok(html)
    }
}
