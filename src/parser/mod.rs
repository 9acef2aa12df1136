//! The raw-syntax parser seam.
//!
//! Turning recipe text into a name-to-value mapping is the job of an
//! external collaborator; the resolution pipeline only depends on the
//! [`RecipeParser`] trait. The default implementation, [`TomlRecipeParser`],
//! reads TOML-syntax recipes and is what the pipeline (and the test suite)
//! uses unless a different parser is injected.
//!
//! A single source file may contain more than one independent build
//! specification ("block"). Blocks are delimited by `#@block <name>` marker
//! lines; a source without markers is one anonymous block. Block extraction
//! lives here because it is a property of the surface syntax, not of the
//! resolution logic.
//!
//! Parser failures are opaque to the core: implementations report
//! [`anyhow::Error`] and the pipeline wraps them into a typed parse error
//! at the seam.

use std::collections::BTreeMap;

use anyhow::Context;
use tracing::debug;

use crate::core::value::Value;
use crate::core::{ForgeError, Result};

/// One independent build specification extracted from a source file.
#[derive(Debug, Clone)]
pub struct RecipeBlock {
    /// Block name, if the source used named block markers.
    pub name: Option<String>,
    /// The block's raw text.
    pub text: String,
}

/// External collaborator that turns raw recipe text into a raw mapping.
pub trait RecipeParser: Send + Sync {
    /// Parses raw text into a name-to-value mapping, seeded with the given
    /// build specs (which override parsed values key-by-key).
    fn parse(
        &self,
        raw: &str,
        build_specs: &BTreeMap<String, Value>,
    ) -> anyhow::Result<BTreeMap<String, Value>>;

    /// Fetches the string values of a few parameters from raw text without
    /// a full resolution, used to pick a builder before normalization.
    ///
    /// Best effort: unparsable text yields all-`None`.
    fn fetch(&self, raw: &str, keys: &[&str]) -> Vec<Option<String>> {
        match self.parse(raw, &BTreeMap::new()) {
            Ok(mapping) => keys
                .iter()
                .map(|key| {
                    mapping.get(*key).and_then(Value::as_str).map(ToString::to_string)
                })
                .collect(),
            Err(err) => {
                debug!("pre-parse fetch failed, continuing without: {err:#}");
                vec![None; keys.len()]
            }
        }
    }

    /// Splits raw source text into its blocks, optionally retaining only
    /// the named ones.
    fn split_blocks(
        &self,
        raw: &str,
        only_blocks: Option<&[String]>,
        location: &str,
    ) -> Result<Vec<RecipeBlock>> {
        let blocks = split_on_markers(raw);
        let Some(filter) = only_blocks else {
            return Ok(blocks);
        };
        let mut selected = Vec::new();
        for wanted in filter {
            match blocks.iter().find(|b| b.name.as_deref() == Some(wanted.as_str())) {
                Some(block) => selected.push(block.clone()),
                None => {
                    return Err(ForgeError::UnknownBlock {
                        name: wanted.clone(),
                        location: location.to_string(),
                    });
                }
            }
        }
        Ok(selected)
    }
}

/// Marker prefix delimiting named blocks inside a source file.
const BLOCK_MARKER: &str = "#@block";

fn split_on_markers(raw: &str) -> Vec<RecipeBlock> {
    if !raw.lines().any(|line| line.trim_start().starts_with(BLOCK_MARKER)) {
        return vec![RecipeBlock { name: None, text: raw.to_string() }];
    }

    let mut blocks = Vec::new();
    let mut current_name: Option<String> = None;
    let mut current_text = String::new();
    // text before the first marker is shared by every block
    let mut preamble = String::new();
    let mut seen_marker = false;

    for line in raw.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix(BLOCK_MARKER) {
            if seen_marker {
                blocks.push(RecipeBlock {
                    name: current_name.take(),
                    text: format!("{preamble}{current_text}"),
                });
                current_text.clear();
            }
            seen_marker = true;
            let name = rest.trim();
            current_name = (!name.is_empty()).then(|| name.to_string());
        } else if seen_marker {
            current_text.push_str(line);
            current_text.push('\n');
        } else {
            preamble.push_str(line);
            preamble.push('\n');
        }
    }
    blocks.push(RecipeBlock {
        name: current_name,
        text: format!("{preamble}{current_text}"),
    });
    blocks
}

/// Default recipe parser: TOML surface syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlRecipeParser;

impl RecipeParser for TomlRecipeParser {
    fn parse(
        &self,
        raw: &str,
        build_specs: &BTreeMap<String, Value>,
    ) -> anyhow::Result<BTreeMap<String, Value>> {
        let table: toml::Table = raw.parse().context("invalid TOML syntax")?;
        let mut mapping: BTreeMap<String, Value> =
            table.into_iter().map(|(key, value)| (key, convert(value))).collect();
        for (key, value) in build_specs {
            mapping.insert(key.clone(), value.clone());
        }
        Ok(mapping)
    }
}

fn convert(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Str(s),
        toml::Value::Integer(i) => Value::Int(i),
        toml::Value::Float(x) => Value::Float(x),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::Str(dt.to_string()),
        toml::Value::Array(items) => Value::List(items.into_iter().map(convert).collect()),
        toml::Value::Table(entries) => {
            Value::Map(entries.into_iter().map(|(k, v)| (k, convert(v))).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = r#"
name = "zlib"
version = "1.2.8"
dependencies = [["bzip2", "1.0.6"]]
toolchain = { name = "GCC", version = "4.8.2" }
"#;

    #[test]
    fn test_parse_toml_recipe() {
        let parser = TomlRecipeParser;
        let mapping = parser.parse(SIMPLE, &BTreeMap::new()).unwrap();
        assert_eq!(mapping["name"], Value::Str("zlib".into()));
        assert_eq!(
            mapping["dependencies"],
            Value::List(vec![Value::List(vec![
                Value::Str("bzip2".into()),
                Value::Str("1.0.6".into())
            ])])
        );
        let toolchain = mapping["toolchain"].as_map().unwrap();
        assert_eq!(toolchain["name"], Value::Str("GCC".into()));
    }

    #[test]
    fn test_build_specs_override_parsed_values() {
        let parser = TomlRecipeParser;
        let mut specs = BTreeMap::new();
        specs.insert("version".to_string(), Value::Str("1.2.11".into()));
        let mapping = parser.parse(SIMPLE, &specs).unwrap();
        assert_eq!(mapping["version"], Value::Str("1.2.11".into()));
    }

    #[test]
    fn test_fetch_is_best_effort() {
        let parser = TomlRecipeParser;
        let fetched = parser.fetch(SIMPLE, &["name", "easyblock"]);
        assert_eq!(fetched, vec![Some("zlib".to_string()), None]);
        assert_eq!(parser.fetch("not [valid", &["name"]), vec![None]);
    }

    #[test]
    fn test_split_blocks_without_markers() {
        let parser = TomlRecipeParser;
        let blocks = parser.split_blocks(SIMPLE, None, "test").unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].name.is_none());
    }

    #[test]
    fn test_split_blocks_with_markers_and_shared_preamble() {
        let raw = "homepage = \"https://example.org\"\n#@block one\nname = \"a\"\n#@block two\nname = \"b\"\n";
        let parser = TomlRecipeParser;
        let blocks = parser.split_blocks(raw, None, "test").unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].name.as_deref(), Some("one"));
        assert!(blocks[0].text.contains("homepage"));
        assert!(blocks[1].text.contains("name = \"b\""));
    }

    #[test]
    fn test_split_blocks_filter_unknown_block() {
        let raw = "#@block one\nname = \"a\"\n";
        let parser = TomlRecipeParser;
        let err = parser
            .split_blocks(raw, Some(&["two".to_string()]), "test")
            .unwrap_err();
        assert!(matches!(err, ForgeError::UnknownBlock { .. }));
    }
}
