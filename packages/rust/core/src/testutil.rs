//! Scratch project trees for tests.

use std::path::{Path, PathBuf};

use sitekit_shared::{Mode, SiteConfig};

use crate::context::BuildContext;

/// A throwaway project directory, removed on drop.
pub(crate) struct Project {
    root: PathBuf,
    pub(crate) config: SiteConfig,
}

impl Project {
    pub(crate) fn new() -> Self {
        let root = std::env::temp_dir().join(format!("sitekit-project-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&root).expect("create project root");

        let mut config = SiteConfig::default();
        config.sitemap.url = Some("https://example.com".into());
        config.app.port = 0;

        Self { root, config }
    }

    pub(crate) fn file(self, rel: &str, content: &str) -> Self {
        let path = self.root.join(rel);
        std::fs::create_dir_all(path.parent().expect("file has a parent")).expect("create dirs");
        std::fs::write(&path, content).expect("write fixture");
        self
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn context(&self, mode: Mode) -> BuildContext {
        BuildContext::new(&self.root, &self.config, mode).expect("valid test context")
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
