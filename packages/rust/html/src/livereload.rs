//! Live-reload client snippet injected into pages built in development mode.

/// Script that reloads the page whenever the preview server emits an event
/// on `endpoint`.
pub fn snippet(endpoint: &str) -> String {
    format!(
        "<script>(function(){{var es=new EventSource(\"{endpoint}\");\
         es.onmessage=function(){{window.location.reload();}};}})();</script>"
    )
}

/// Insert `snippet` right before the last `</body>`, or append it when the
/// document has no closing body tag.
pub fn inject(html: &str, snippet: &str) -> String {
    // ASCII lowercasing keeps byte offsets identical.
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + snippet.len());
            out.push_str(&html[..idx]);
            out.push_str(snippet);
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{html}{snippet}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_before_last_body_close() {
        let html = "<html><BODY><p>x</p></Body></html>";
        let out = inject(html, "<s/>");
        assert_eq!(out, "<html><BODY><p>x</p><s/></Body></html>");
    }

    #[test]
    fn appends_to_fragments() {
        assert_eq!(inject("<p>x</p>", "<s/>"), "<p>x</p><s/>");
    }

    #[test]
    fn snippet_targets_endpoint() {
        let s = snippet("/__sitekit/reload");
        assert!(s.contains("EventSource(\"/__sitekit/reload\")"));
        assert!(s.starts_with("<script>"));
        assert!(s.ends_with("</script>"));
    }
}
