//! Template resolution for recipe parameter values.
//!
//! Recipe values may embed `%(name)s`-style placeholders that refer to
//! other parameters of the same recipe (`%(version)s`, `%(namelower)s`,
//! ...). This module builds the substitution context from a recipe's
//! resolved fields and applies it recursively to strings, lists, tuples,
//! and mapping values.
//!
//! # Escaping
//!
//! A literal `%` is preserved by doubling it before substitution, *except*
//! when it is the first of a run of `%` characters immediately preceding a
//! placeholder: genuine placeholders survive untouched, and
//! percent-escaping the user already wrote (`%%(name)s`) is preserved
//! through the doubling. The observable laws:
//!
//! - `"10%"` resolves to `"10%"` (single unescaped percent)
//! - `"%(name)s"` with context `{name: "x"}` resolves to `"x"`
//! - `"%%(name)s"` resolves to the literal `"%(name)s"`
//! - `"%%%(name)s"` resolves to `"%x"`
//!
//! # Failure policy
//!
//! A placeholder whose key is absent from the context is a formatting
//! failure that is logged; the original string is returned unchanged.
//! Substitution failure is never fatal, so downstream consumers can still
//! see the literal placeholder for diagnostics.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::core::Value;
use crate::dependency::Toolchain;

/// The recipe fields a template context is derived from.
#[derive(Debug, Clone, Default)]
pub struct TemplateSeed {
    /// Software name.
    pub name: String,
    /// Software version.
    pub version: String,
    /// Version prefix.
    pub versionprefix: String,
    /// Version suffix.
    pub versionsuffix: String,
    /// Resolved toolchain, when known.
    pub toolchain: Option<Toolchain>,
}

/// Builds the name-to-string substitution context from a seed.
///
/// With `skip_lower` set, the all-lowercase-derivable shortcut entries
/// (`namelower`, `nameletterlower`) are suppressed. The context is
/// generated twice per recipe, first suppressing them and then including
/// them, so trivial lowercase shortcuts cannot shadow richer values.
#[must_use]
pub fn build_context(seed: &TemplateSeed, skip_lower: bool) -> BTreeMap<String, String> {
    let mut context = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        if !value.is_empty() {
            context.insert(key.to_string(), value);
        }
    };

    put("name", seed.name.clone());
    put("version", seed.version.clone());
    put("versionprefix", seed.versionprefix.clone());
    put("versionsuffix", seed.versionsuffix.clone());

    let components: Vec<&str> = seed.version.split('.').collect();
    if let Some(major) = components.first() {
        put("version_major", (*major).to_string());
    }
    if let Some(minor) = components.get(1) {
        put("version_minor", (*minor).to_string());
        put("version_major_minor", components[..2].join("."));
    }

    if let Some(letter) = seed.name.chars().next() {
        put("nameletter", letter.to_string());
    }
    if let Some(toolchain) = &seed.toolchain {
        put("toolchain_name", toolchain.name.clone());
        put("toolchain_version", toolchain.version.clone());
    }

    if !skip_lower {
        put("namelower", seed.name.to_lowercase());
        if let Some(letter) = seed.name.chars().next() {
            put("nameletterlower", letter.to_lowercase().to_string());
        }
    }

    context
}

/// Matches a placeholder tail (`(name)s`, possibly behind further `%`
/// characters) at the start of the remaining input.
static PLACEHOLDER_AHEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^%*\(\w+\)s").expect("static regex"));

/// Tokenizes an escaped string: doubled percents, placeholders, and stray
/// percents (which only occur in input that bypassed escaping).
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%%|%\((\w+)\)s|%").expect("static regex"));

/// Doubles every `%` that does not begin a run of `%` characters ending in
/// a placeholder.
fn escape_percents(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.char_indices() {
        if c == '%' && !PLACEHOLDER_AHEAD.is_match(&s[i + c.len_utf8()..]) {
            out.push_str("%%");
        } else {
            out.push(c);
        }
    }
    out
}

fn substitute(s: &str, context: &BTreeMap<String, String>) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for captures in TOKEN.captures_iter(s) {
        let m = captures.get(0).expect("whole match");
        out.push_str(&s[last..m.start()]);
        last = m.end();
        match m.as_str() {
            "%%" => out.push('%'),
            "%" => return Err("stray '%' character".to_string()),
            _ => {
                let key = captures.get(1).expect("placeholder key").as_str();
                match context.get(key) {
                    Some(value) => out.push_str(value),
                    None => return Err(format!("unknown template key '{key}'")),
                }
            }
        }
    }
    out.push_str(&s[last..]);
    Ok(out)
}

fn resolve_str(s: &str, context: &BTreeMap<String, String>) -> String {
    let escaped = escape_percents(s);
    match substitute(&escaped, context) {
        Ok(resolved) => resolved,
        Err(reason) => {
            warn!("unable to resolve template value '{s}': {reason}");
            s.to_string()
        }
    }
}

/// Recursively substitutes placeholders in a value.
///
/// Strings are escaped and substituted; lists and tuples recurse
/// element-wise, rebuilding the same sequence kind; mappings recurse over
/// values, preserving keys. Every other kind passes through unchanged.
#[must_use]
pub fn resolve(value: &Value, context: &BTreeMap<String, String>) -> Value {
    match value {
        Value::Str(s) => Value::Str(resolve_str(s, context)),
        Value::List(items) => {
            Value::List(items.iter().map(|item| resolve(item, context)).collect())
        }
        Value::Tuple(items) => {
            Value::Tuple(items.iter().map(|item| resolve(item, context)).collect())
        }
        Value::Map(entries) => Value::Map(
            entries.iter().map(|(key, item)| (key.clone(), resolve(item, context))).collect(),
        ),
        other => other.clone(),
    }
}
