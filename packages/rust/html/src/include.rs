//! `@@include` resolution for HTML templates.
//!
//! Markers use the `@@` prefix and `;` suffix:
//!
//! ```text
//! @@include("slices/header/header.html")
//! @@include('slices/card/card.html', { "title": "Hello" });
//! <h2>@@title;</h2>
//! ```
//!
//! Include paths are relative to the resolver's base directory. The optional
//! second argument is a JSON object that is layered over the caller's context
//! for the included file. `@@name;` expands to a context value; names without
//! a value are left in place for later passes.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::trace;

use sitekit_shared::{Result, SiteError};

/// Variables visible to a template while it is being expanded.
pub type Context = Map<String, Value>;

/// Maximum include nesting. Deeper chains are reported as a probable cycle.
pub const MAX_INCLUDE_DEPTH: usize = 32;

const PREFIX: &str = "@@";
const SUFFIX: char = ';';
const INCLUDE_KEYWORD: &str = "include";

/// Expands include markers and context variables.
#[derive(Debug, Clone)]
pub struct IncludeResolver {
    base: PathBuf,
}

impl IncludeResolver {
    /// Create a resolver that looks up include paths below `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Read a page template and expand it with an empty context.
    pub fn resolve_file(&self, path: &Path) -> Result<String> {
        let source = read_template(path)?;
        self.expand(&source, path, &Context::new(), 0)
    }

    /// Expand `source`, attributing errors to `origin`.
    pub fn resolve_str(&self, source: &str, origin: &Path, context: &Context) -> Result<String> {
        self.expand(source, origin, context, 0)
    }

    fn expand(&self, source: &str, origin: &Path, context: &Context, depth: usize) -> Result<String> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(SiteError::template(
                origin,
                format!("include depth exceeded {MAX_INCLUDE_DEPTH} (circular include?)"),
            ));
        }

        let mut out = String::with_capacity(source.len());
        let mut pos = 0;

        while let Some(found) = source[pos..].find(PREFIX) {
            let start = pos + found;
            out.push_str(&source[pos..start]);
            let after = &source[start + PREFIX.len()..];

            if let Some(call) = include_call(after) {
                let (inner, call_len) = scan_call(&after[call..]).ok_or_else(|| {
                    SiteError::template(
                        origin,
                        format!("unterminated @@include at line {}", line_of(source, start)),
                    )
                })?;
                let (target, overlay) = parse_args(inner).map_err(|msg| {
                    SiteError::template(
                        origin,
                        format!("{msg} at line {}", line_of(source, start)),
                    )
                })?;

                let mut end = start + PREFIX.len() + call + call_len;
                if source[end..].starts_with(SUFFIX) {
                    end += SUFFIX.len_utf8();
                }

                let child_path = self.base.join(&target);
                trace!(from = %origin.display(), include = %child_path.display(), "resolving include");
                let child_source = read_template(&child_path)?;

                let mut child_context = context.clone();
                child_context.extend(overlay);
                out.push_str(&self.expand(&child_source, &child_path, &child_context, depth + 1)?);

                pos = end;
                continue;
            }

            if let Some((name, len)) = variable(after) {
                if let Some(value) = context.get(name) {
                    out.push_str(&render_value(value));
                    pos = start + PREFIX.len() + len;
                    continue;
                }
            }

            out.push_str(PREFIX);
            pos = start + PREFIX.len();
        }

        out.push_str(&source[pos..]);
        Ok(out)
    }
}

fn read_template(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| SiteError::io(path, e))?;
    String::from_utf8(bytes).map_err(|e| {
        SiteError::invalid_input(format!("{} is not valid UTF-8: {e}", path.display()))
    })
}

/// If `after` (the text following `@@`) starts an include call, return the
/// offset of its opening parenthesis.
fn include_call(after: &str) -> Option<usize> {
    let rest = after.strip_prefix(INCLUDE_KEYWORD)?;
    let trimmed = rest.trim_start_matches([' ', '\t']);
    trimmed
        .starts_with('(')
        .then(|| INCLUDE_KEYWORD.len() + (rest.len() - trimmed.len()))
}

/// Given text starting at `(`, return the argument text and the length up to
/// and including the matching `)`. Quotes and nested brackets are respected.
fn scan_call(text: &str) -> Option<(&str, usize)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    if c != ')' {
                        return None;
                    }
                    return Some((&text[1..i], i + 1));
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse `"path"` or `"path", { ...json... }`.
fn parse_args(inner: &str) -> std::result::Result<(String, Context), String> {
    let inner = inner.trim();
    let mut chars = inner.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('"' | '\''))) => q,
        _ => return Err("@@include path must be a quoted string".into()),
    };

    let mut path = String::new();
    let mut escaped = false;
    let mut close = None;
    for (i, c) in chars {
        if escaped {
            path.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            close = Some(i);
            break;
        } else {
            path.push(c);
        }
    }

    let close = close.ok_or("unterminated @@include path")?;
    if path.trim().is_empty() {
        return Err("@@include path is empty".into());
    }

    let rest = inner[close + quote.len_utf8()..].trim();
    if rest.is_empty() {
        return Ok((path, Context::new()));
    }

    let json = rest
        .strip_prefix(',')
        .ok_or("expected ',' after @@include path")?
        .trim();

    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok((path, map)),
        Ok(_) => Err("@@include context must be a JSON object".into()),
        Err(e) => Err(format!("invalid @@include context: {e}")),
    }
}

/// Match `name;` at the start of `after`, returning the name and the length
/// including the suffix.
fn variable(after: &str) -> Option<(&str, usize)> {
    let len = after
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        .unwrap_or(after.len());
    if len == 0 || !after[len..].starts_with(SUFFIX) {
        return None;
    }
    Some((&after[..len], len + SUFFIX.len_utf8()))
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let root =
                std::env::temp_dir().join(format!("sitekit-include-{}", uuid::Uuid::now_v7()));
            std::fs::create_dir_all(&root).unwrap();
            Self { root }
        }

        fn write(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, content).unwrap();
            path
        }

        fn resolver(&self) -> IncludeResolver {
            IncludeResolver::new(&self.root)
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    #[test]
    fn inlines_nested_includes() {
        let fx = Fixture::new();
        fx.write("slices/nav/nav.html", "<nav>@@include('slices/nav/link.html')</nav>");
        fx.write("slices/nav/link.html", "<a href=\"/\">home</a>");
        let page = fx.write(
            "pages/index.html",
            "<body>@@include(\"slices/nav/nav.html\");<main></main></body>",
        );

        let out = fx.resolver().resolve_file(&page).unwrap();
        assert_eq!(
            out,
            "<body><nav><a href=\"/\">home</a></nav><main></main></body>"
        );
    }

    #[test]
    fn context_variables_are_scoped_to_the_include() {
        let fx = Fixture::new();
        fx.write("slices/card.html", "<h2>@@title;</h2><p>@@count;</p>");
        let page = fx.write(
            "pages/index.html",
            r#"@@include("slices/card.html", { "title": "Hello", "count": 3 })@@title;"#,
        );

        let out = fx.resolver().resolve_file(&page).unwrap();
        assert_eq!(out, "<h2>Hello</h2><p>3</p>@@title;");
    }

    #[test]
    fn child_context_inherits_parent_values() {
        let fx = Fixture::new();
        fx.write("a.html", r#"@@include("b.html", { "inner": "i" })"#);
        fx.write("b.html", "@@outer;-@@inner;");
        let page = fx.write("page.html", r#"@@include("a.html", { "outer": "o" })"#);

        let out = fx.resolver().resolve_file(&page).unwrap();
        assert_eq!(out, "o-i");
    }

    #[test]
    fn unknown_variables_and_directives_survive() {
        let fx = Fixture::new();
        let page = fx.write("page.html", "<head>@@beforeScript;</head> email@@host");

        let out = fx.resolver().resolve_file(&page).unwrap();
        assert_eq!(out, "<head>@@beforeScript;</head> email@@host");
    }

    #[test]
    fn parentheses_inside_context_strings() {
        let fx = Fixture::new();
        fx.write("x.html", "@@label;");
        let page = fx.write("page.html", r#"@@include("x.html", {"label": "a (b) }"})"#);

        let out = fx.resolver().resolve_file(&page).unwrap();
        assert_eq!(out, "a (b) }");
    }

    #[test]
    fn circular_include_is_reported() {
        let fx = Fixture::new();
        fx.write("a.html", "@@include('b.html')");
        fx.write("b.html", "@@include('a.html')");
        let page = fx.write("page.html", "@@include('a.html')");

        let err = fx.resolver().resolve_file(&page).unwrap_err();
        assert!(err.to_string().contains("include depth exceeded"));
    }

    #[test]
    fn missing_include_is_io_error() {
        let fx = Fixture::new();
        let page = fx.write("page.html", "@@include('nope.html')");

        let err = fx.resolver().resolve_file(&page).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn malformed_markers_name_the_line() {
        let fx = Fixture::new();
        let page = fx.write("page.html", "<p>\n\n@@include('a.html'");
        let err = fx.resolver().resolve_file(&page).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unterminated"));
        assert!(msg.contains("line 3"));

        let page = fx.write("page2.html", "@@include(a.html)");
        let err = fx.resolver().resolve_file(&page).unwrap_err();
        assert!(err.to_string().contains("quoted string"));

        let page = fx.write("page3.html", "@@include('a.html', [1, 2])");
        let err = fx.resolver().resolve_file(&page).unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }

    #[test]
    fn resolve_str_uses_given_context() {
        let resolver = IncludeResolver::new("/nonexistent");
        let mut ctx = Context::new();
        ctx.insert("name".into(), Value::String("sitekit".into()));
        let out = resolver
            .resolve_str("hi @@name;!", Path::new("inline.html"), &ctx)
            .unwrap();
        assert_eq!(out, "hi sitekit!");
    }
}
