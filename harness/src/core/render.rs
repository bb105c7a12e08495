//! `{{NAME}}` placeholder substitution for prompt templates.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is valid"));

/// Substitute `{{NAME}}` tokens in `template` with values from `vars`.
///
/// The template is scanned once: text inserted by a replacement is never
/// scanned again, so a value containing `{{OTHER}}` comes out literally.
/// Tokens without a mapping are left verbatim. When a name is listed twice,
/// the first entry wins.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            match vars.iter().find(|(key, _)| *key == name) {
                Some((_, value)) => (*value).to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
