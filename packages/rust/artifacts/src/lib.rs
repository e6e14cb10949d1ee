//! Generated build artifacts.
//!
//! Currently a single artifact: the `sitemap.xml` document emitted at the end
//! of a production build.

pub mod sitemap;

pub use sitemap::{SitemapEntry, SitemapOptions, generate_sitemap, page_location};
