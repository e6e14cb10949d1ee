//! Static directive tokens substituted into rendered HTML.
//!
//! A directive is a literal marker such as `@@beforeScript;` that expands to a
//! fixed HTML snippet. Matching is exact substring replacement, never a
//! pattern. When keys overlap, the longest key starting at a position wins and
//! replacement text is not scanned again.

use std::collections::BTreeMap;

use regex::Regex;

use sitekit_shared::{Result, SiteError};

/// Token that expands to the deferred "before" script include.
pub const BEFORE_SCRIPT_TOKEN: &str = "@@beforeScript;";

/// Expansion of [`BEFORE_SCRIPT_TOKEN`].
pub const BEFORE_SCRIPT_SNIPPET: &str = r#"<script defer src="/js/before.js"></script>"#;

/// Immutable token → replacement table.
#[derive(Debug, Clone)]
pub struct DirectiveTable {
    entries: BTreeMap<String, String>,
    matcher: Option<Regex>,
}

impl DirectiveTable {
    /// Build a table from explicit entries. A later entry with the same key
    /// overrides an earlier one.
    pub fn new<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (key, value) in entries {
            let key = key.into();
            if key.is_empty() {
                return Err(SiteError::invalid_input("directive key must not be empty"));
            }
            map.insert(key, value.into());
        }

        let matcher = if map.is_empty() {
            None
        } else {
            // Regex alternation is leftmost-first, so longer keys go first.
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            let pattern = keys
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let re = Regex::new(&pattern).map_err(|e| {
                SiteError::invalid_input(format!("directive table too large: {e}"))
            })?;
            Some(re)
        };

        Ok(Self {
            entries: map,
            matcher,
        })
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        Self::new([(BEFORE_SCRIPT_TOKEN, BEFORE_SCRIPT_SNIPPET)])
            .expect("built-in directives are valid")
    }

    /// Built-in table extended (or overridden) by user entries.
    pub fn with_extra(extra: &BTreeMap<String, String>) -> Result<Self> {
        let builtin = [(BEFORE_SCRIPT_TOKEN.to_string(), BEFORE_SCRIPT_SNIPPET.to_string())];
        Self::new(
            builtin
                .into_iter()
                .chain(extra.iter().map(|(k, v)| (k.clone(), v.clone()))),
        )
    }

    /// Replace every occurrence of every key in `input`.
    pub fn apply(&self, input: &str) -> String {
        let Some(matcher) = &self.matcher else {
            return input.to_string();
        };

        matcher
            .replace_all(input, |caps: &regex::Captures<'_>| {
                let token = &caps[0];
                self.entries
                    .get(token)
                    .map_or_else(|| token.to_string(), Clone::clone)
            })
            .into_owned()
    }

    /// Like [`apply`](Self::apply), for raw file contents.
    pub fn apply_bytes(&self, input: &[u8]) -> Result<String> {
        let text = std::str::from_utf8(input)
            .map_err(|e| SiteError::invalid_input(format!("input is not UTF-8: {e}")))?;
        Ok(self.apply(text))
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries.get(token).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DirectiveTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_before_script() {
        let table = DirectiveTable::builtin();
        let out = table.apply("<head>@@beforeScript;</head>");
        assert_eq!(
            out,
            "<head><script defer src=\"/js/before.js\"></script></head>"
        );
    }

    #[test]
    fn replaces_every_occurrence() {
        let table = DirectiveTable::builtin();
        let input = "@@beforeScript;<p>a</p>@@beforeScript;@@beforeScript;";
        let out = table.apply(input);
        assert_eq!(out.matches(BEFORE_SCRIPT_TOKEN).count(), 0);
        assert_eq!(out.matches(BEFORE_SCRIPT_SNIPPET).count(), 3);
    }

    #[test]
    fn identity_without_tokens() {
        let table = DirectiveTable::builtin();
        for input in ["", "<p>plain</p>", "@@beforeScript", "@@other;", "beforeScript;"] {
            assert_eq!(table.apply(input), input);
        }
    }

    #[test]
    fn longest_key_wins_on_overlap() {
        let table = DirectiveTable::new([("@@a;", "short"), ("@@a;@@a;", "long")]).unwrap();
        assert_eq!(table.apply("@@a;@@a;@@a;"), "longshort");
    }

    #[test]
    fn replacements_are_not_rescanned() {
        let table = DirectiveTable::new([("X", "XY"), ("Y", "Z")]).unwrap();
        assert_eq!(table.apply("XY"), "XYZ");
    }

    #[test]
    fn extra_entries_merge_with_builtin() {
        let mut extra = BTreeMap::new();
        extra.insert("@@year;".to_string(), "2024".to_string());
        let table = DirectiveTable::with_extra(&extra).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.apply("@@year; @@beforeScript;").matches("2024").count(), 1);
        assert!(table.get(BEFORE_SCRIPT_TOKEN).is_some());
    }

    #[test]
    fn empty_key_is_invalid_input() {
        let err = DirectiveTable::new([("", "x")]).unwrap_err();
        assert!(matches!(err, SiteError::InvalidInput { .. }));
    }

    #[test]
    fn non_utf8_bytes_are_invalid_input() {
        let table = DirectiveTable::builtin();
        let err = table.apply_bytes(&[0xff, 0xfe, b'a']).unwrap_err();
        assert!(matches!(err, SiteError::InvalidInput { .. }));

        let ok = table.apply_bytes(b"@@beforeScript;").unwrap();
        assert_eq!(ok, BEFORE_SCRIPT_SNIPPET);
    }

    #[test]
    fn empty_table_is_identity() {
        let table = DirectiveTable::new(Vec::<(String, String)>::new()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.apply("@@beforeScript;"), "@@beforeScript;");
    }
}
