//! Placeholder scanner
//!
//! Recognizes `${{ <vault>.<dotted.key> }}` with optional whitespace inside
//! the braces. The scanner is left-to-right and does not nest: the first
//! `}}` after an opening `${{` closes the span.

use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{\{\s*([A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-:/]+)+)\s*\}\}")
        .unwrap_or_else(|e| unreachable!("placeholder pattern is valid: {e}"))
});

/// Opening token of a placeholder
pub const OPEN: &str = "${{";

/// A placeholder span found in a string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// Byte offset of `${{`
    pub start: usize,
    /// Byte offset one past `}}`
    pub end: usize,
    /// Trimmed body, `<vault>.<key>`
    pub body: &'a str,
}

impl<'a> Placeholder<'a> {
    /// Full placeholder text as written
    #[must_use]
    pub fn text(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    /// Candidate `(vault, key)` splits, longest vault prefix first
    pub fn splits(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let body = self.body;
        body.char_indices()
            .filter(|(_, c)| *c == '.')
            .map(|(i, _)| i)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .map(move |i| (&body[..i], &body[i + 1..]))
    }
}

/// Finds the first placeholder at or after `from`
#[must_use]
pub fn scan(source: &str, from: usize) -> Option<Placeholder<'_>> {
    let caps = PLACEHOLDER.captures_at(source, from)?;
    let whole = caps.get(0)?;
    let body = caps.get(1)?;
    Some(Placeholder {
        start: whole.start(),
        end: whole.end(),
        body: body.as_str(),
    })
}

/// Iterates every placeholder in `source`, left to right
pub fn scan_all(source: &str) -> impl Iterator<Item = Placeholder<'_>> {
    let mut from = 0;
    std::iter::from_fn(move || {
        let placeholder = scan(source, from)?;
        from = placeholder.end;
        Some(placeholder)
    })
}

/// Rewrites every placeholder without inner whitespace, `${{vault.key}}`
#[must_use]
pub fn compact(source: &str) -> String {
    PLACEHOLDER.replace_all(source, "$${{$1}}").into_owned()
}

/// Whether `source` contains at least one placeholder
#[must_use]
pub fn has_placeholder(source: &str) -> bool {
    source.contains(OPEN) && PLACEHOLDER.is_match(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scan_with_whitespace() {
        let source = "hi ${{   env.a }}!";
        let found = scan(source, 0).unwrap();
        assert_eq!(found.body, "env.a");
        assert_eq!(found.text(source), "${{   env.a }}");
        assert_eq!(&source[found.end..], "!");
    }

    #[test]
    fn test_scan_without_whitespace() {
        let found = scan("${{config.db.host}}", 0).unwrap();
        assert_eq!(found.body, "config.db.host");
    }

    #[test]
    fn test_scan_all_left_to_right() {
        let bodies: Vec<&str> = scan_all("${{ a.x }}-${{ b.y.z }}")
            .map(|p| p.body)
            .collect();
        assert_eq!(bodies, vec!["a.x", "b.y.z"]);
    }

    #[test]
    fn test_body_without_key_is_not_a_placeholder() {
        assert!(scan("${{ env }}", 0).is_none());
        assert!(!has_placeholder("plain text"));
        assert!(!has_placeholder("${ env.a }"));
    }

    #[test]
    fn test_compact_removes_inner_whitespace() {
        assert_eq!(
            compact("echo ${{ env.a }} and ${{config.b}}"),
            "echo ${{env.a}} and ${{config.b}}"
        );
    }

    #[test]
    fn test_splits_longest_prefix_first() {
        let found = scan("${{ config.db.host }}", 0).unwrap();
        let splits: Vec<_> = found.splits().collect();
        assert_eq!(
            splits,
            vec![("config.db", "host"), ("config", "db.host")]
        );
    }
}
