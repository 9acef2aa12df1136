//! Dump serialization of a resolved recipe.
//!
//! The dump is the persisted derived form: parameters grouped into fixed
//! sections (identity, description, toolchain, sources, patches,
//! dependencies, parallelism, OS dependencies), followed by the remaining
//! parameters, emitting only values that differ from the schema default.
//! Raw (untemplated) values are written, so a dump re-resolves to the same
//! observable recipe.

use std::path::Path;

use crate::core::{Result, Value};
use crate::schema::{self, ParameterCategory};

use super::Recipe;

/// Ordered parameter groups of the dump format.
const GROUPED_KEYS: [&[&str]; 8] = [
    &["name", "version", "versionprefix", "versionsuffix"],
    &["homepage", "description"],
    &["toolchain", "toolchainopts"],
    &["source_urls", "sources"],
    &["patches"],
    &["builddependencies", "dependencies", "hiddendependencies"],
    &["parallel", "maxparallel"],
    &["osdependencies"],
];

impl Recipe {
    /// Serializes the recipe to its dump form.
    #[must_use]
    pub fn dump(&self) -> String {
        let defaults = schema::defaults();
        let mut lines: Vec<String> = Vec::new();
        let mut printed: Vec<&str> = Vec::new();

        for group in GROUPED_KEYS {
            let mut emitted = false;
            for key in group.iter().copied() {
                let Some(spec) = defaults.get(key) else { continue };
                let Ok(value) = self.raw_value(key) else { continue };
                if *value != spec.default {
                    lines.push(format!("{key} = {}", render(value)));
                    printed.push(key);
                    emitted = true;
                }
            }
            if emitted {
                lines.push(String::new());
            }
        }

        // remaining non-default parameters, in schema order
        for (key, spec) in defaults {
            if printed.contains(key) || spec.category == ParameterCategory::Hidden {
                continue;
            }
            let Ok(value) = self.raw_value(key) else { continue };
            if *value != spec.default {
                lines.push(format!("{key} = {}", render(value)));
            }
        }

        let mut out = lines.join("\n");
        while out.ends_with('\n') {
            out.pop();
        }
        out.push('\n');
        out
    }

    /// Writes the dump form to a file.
    pub fn dump_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.dump())?;
        Ok(())
    }
}

/// Renders a value in the dump's surface syntax.
fn render(value: &Value) -> String {
    match value {
        Value::None => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Str(s) => quote(s),
        Value::List(items) | Value::Tuple(items) => {
            let rendered: Vec<String> = items.iter().map(render).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Map(entries) => {
            let rendered: Vec<String> =
                entries.iter().map(|(k, v)| format!("{k} = {}", render(v))).collect();
            format!("{{ {} }}", rendered.join(", "))
        }
        Value::Dep(dep) => {
            let mut fields = vec![quote(&dep.name), quote(&dep.version)];
            if let Some(suffix) = &dep.versionsuffix {
                fields.push(quote(suffix));
            }
            if let Some((tc_name, tc_version)) = &dep.toolchain {
                fields.push(format!("[{}, {}]", quote(tc_name), quote(tc_version)));
            }
            format!("[{}]", fields.join(", "))
        }
    }
}

/// Quotes a string: triple-quoted when multi-line or mixing both quote
/// kinds, double-quoted when it contains a single quote, single-quoted
/// otherwise.
fn quote(s: &str) -> String {
    if s.contains('\n') || (s.contains('"') && s.contains('\'')) {
        format!("\"\"\"{s}\"\"\"")
    } else if s.contains('\'') {
        format!("\"{s}\"")
    } else {
        format!("'{s}'")
    }
}
