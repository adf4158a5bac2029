//! Placeholder engine
//!
//! Finds and substitutes `{{name}}` tokens in template text. Names are made of
//! ASCII letters, digits, `_` and `.`, and may be padded with whitespace inside
//! the braces (`{{ name }}`). This is flat substitution only: no conditionals,
//! loops, filters or escaping.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Pattern is a literal; compilation cannot fail
    Regex::new(r"\{\{\s*([a-zA-Z0-9_.]+)\s*\}\}").unwrap()
});

/// Collect the distinct placeholder names in `text`, sorted ascending
pub fn extract_placeholders(text: &str) -> BTreeSet<String> {
    PLACEHOLDER_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Replace every placeholder whose name is in `variables`
///
/// Unknown names keep their original text, braces and padding included, so an
/// unresolved slot stays visible in the output. Substituted values are not
/// scanned again.
pub fn render_with_vars(text: &str, variables: &HashMap<String, String>) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Rough token count: one token per four characters, at least one for non-empty text
///
/// This is a sizing hint, not a tokenizer. It will disagree with every real
/// model vocabulary and is only meant for "is this prompt huge" displays.
pub fn token_estimate(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.chars().count() / 4).max(1)
}
