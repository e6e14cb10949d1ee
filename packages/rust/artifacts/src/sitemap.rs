//! sitemaps.org 0.9 document generation.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, instrument};
use url::Url;

use sitekit_shared::{Result, SiteError};

const XMLNS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// One emitted HTML page.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    /// Path relative to the output root, `/`-separated (e.g. `blog/index.html`).
    pub path: String,
    /// File modification time, written as `<lastmod>`.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Values applied to every `<url>` element.
#[derive(Debug, Clone, Default)]
pub struct SitemapOptions {
    pub changefreq: Option<String>,
    pub priority: Option<f32>,
}

/// Public URL of a page. `index.html` collapses to its directory.
pub fn page_location(site_url: &Url, path: &str) -> Result<Url> {
    let mut base = site_url.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }

    let path = path.trim_start_matches('/');
    let relative = if path == "index.html" {
        ""
    } else {
        path.strip_suffix("index.html")
            .filter(|dir| dir.ends_with('/'))
            .unwrap_or(path)
    };

    base.join(relative)
        .map_err(|e| SiteError::validation(format!("cannot build URL for {path}: {e}")))
}

/// Render the sitemap. Entries are sorted by path so output is stable.
#[instrument(skip_all, fields(site = %site_url, pages = entries.len()))]
pub fn generate_sitemap(
    site_url: &Url,
    entries: &[SitemapEntry],
    options: &SitemapOptions,
) -> Result<String> {
    let mut sorted: Vec<&SitemapEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!("<urlset xmlns=\"{XMLNS}\">\n"));

    for entry in sorted {
        let loc = page_location(site_url, &entry.path)?;
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", escape_xml(loc.as_str())));
        if let Some(modified) = entry.last_modified {
            xml.push_str(&format!(
                "    <lastmod>{}</lastmod>\n",
                modified.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        if let Some(freq) = &options.changefreq {
            xml.push_str(&format!("    <changefreq>{}</changefreq>\n", escape_xml(freq)));
        }
        if let Some(priority) = options.priority {
            xml.push_str(&format!("    <priority>{priority}</priority>\n"));
        }
        xml.push_str("  </url>\n");
    }

    xml.push_str("</urlset>\n");

    debug!(bytes = xml.len(), "sitemap generated");
    Ok(xml)
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn site() -> Url {
        Url::parse("https://example.com").unwrap()
    }

    #[test]
    fn index_pages_collapse_to_directories() {
        let site = site();
        assert_eq!(page_location(&site, "index.html").unwrap().as_str(), "https://example.com/");
        assert_eq!(
            page_location(&site, "blog/index.html").unwrap().as_str(),
            "https://example.com/blog/"
        );
        assert_eq!(
            page_location(&site, "about.html").unwrap().as_str(),
            "https://example.com/about.html"
        );
        assert_eq!(
            page_location(&site, "notindex.html").unwrap().as_str(),
            "https://example.com/notindex.html"
        );
    }

    #[test]
    fn site_url_with_path_prefix() {
        let site = Url::parse("https://example.com/docs").unwrap();
        assert_eq!(
            page_location(&site, "guide.html").unwrap().as_str(),
            "https://example.com/docs/guide.html"
        );
    }

    #[test]
    fn sitemap_lists_every_page_sorted() {
        let modified = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let entries = vec![
            SitemapEntry {
                path: "contact.html".into(),
                last_modified: Some(modified),
            },
            SitemapEntry {
                path: "index.html".into(),
                last_modified: None,
            },
        ];
        let options = SitemapOptions {
            changefreq: Some("weekly".into()),
            priority: Some(0.5),
        };

        let xml = generate_sitemap(&site(), &entries, &options).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(XMLNS));
        assert_eq!(xml.matches("<url>").count(), 2);
        assert!(xml.contains("<lastmod>2024-03-01T12:00:00Z</lastmod>"));
        assert!(xml.contains("<changefreq>weekly</changefreq>"));
        assert!(xml.contains("<priority>0.5</priority>"));

        let contact = xml.find("contact.html").unwrap();
        let root = xml.find("<loc>https://example.com/</loc>").unwrap();
        assert!(contact < root);
    }

    #[test]
    fn priority_is_written_as_configured() {
        let entries = vec![SitemapEntry {
            path: "index.html".into(),
            last_modified: None,
        }];
        let options = SitemapOptions {
            changefreq: None,
            priority: Some(0.25),
        };
        let xml = generate_sitemap(&site(), &entries, &options).unwrap();
        assert!(xml.contains("<priority>0.25</priority>"), "got {xml}");
        assert!(!xml.contains("<changefreq>"));
    }

    #[test]
    fn locations_are_escaped() {
        let entries = vec![SitemapEntry {
            path: "a&b.html".into(),
            last_modified: None,
        }];
        let xml = generate_sitemap(&site(), &entries, &SitemapOptions::default()).unwrap();
        assert!(xml.contains("a&amp;b.html"));
        assert!(!xml.contains("<changefreq>"));
    }

    #[test]
    fn empty_sitemap_is_valid() {
        let xml = generate_sitemap(&site(), &[], &SitemapOptions::default()).unwrap();
        assert!(xml.contains("<urlset"));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }
}
