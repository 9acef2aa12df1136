//! Dependency records and their resolution.
//!
//! Recipes declare dependencies in several heterogeneous shapes: an
//! explicit mapping, a positional `(name, version[, versionsuffix[,
//! toolchain]])` sequence, or a structured literal produced by the syntax
//! parser. [`parse`] normalizes all of them into a canonical
//! [`Dependency`] record, applying the toolchain-inheritance rules and
//! computing the record's module identity through the naming service.
//!
//! # Toolchain inheritance
//!
//! A dependency without a toolchain of its own inherits the owning
//! recipe's toolchain. The boolean literal `true` selects the system
//! sentinel (toolchain-independent build); a two-element pair or a
//! name/version mapping selects a custom toolchain. Anything else is an
//! error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::constants::{SYSTEM_TOOLCHAIN_NAME, SYSTEM_TOOLCHAIN_VERSION};
use crate::core::{ForgeError, Result, Value};
use crate::naming::{NamingService, NamingTarget, RecipeLookup};

/// The named compiler/library stack a build is compiled against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    /// Toolchain name.
    pub name: String,
    /// Toolchain version.
    pub version: String,
}

impl Toolchain {
    /// Creates a toolchain from a name and version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into() }
    }

    /// The sentinel toolchain denoting a toolchain-independent build.
    #[must_use]
    pub fn system() -> Self {
        Self::new(SYSTEM_TOOLCHAIN_NAME, SYSTEM_TOOLCHAIN_VERSION)
    }

    /// Whether this is the system sentinel.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.name == SYSTEM_TOOLCHAIN_NAME
    }

    /// Parses a toolchain from its raw parameter value: a mapping with
    /// `name` and `version` keys.
    pub fn from_value(value: &Value) -> Result<Self> {
        let entries = value.as_map().ok_or_else(|| unsupported(value))?;
        match (entries.get("name").and_then(Value::as_str), entries.get("version").and_then(Value::as_str)) {
            (Some(name), Some(version)) => Ok(Self::new(name, version)),
            _ => Err(unsupported(value)),
        }
    }
}

fn unsupported(value: &Value) -> ForgeError {
    ForgeError::UnsupportedToolchainSpec { spec: value.to_string() }
}

/// A fully resolved dependency record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// Software name.
    pub name: String,
    /// Software version.
    pub version: String,
    /// Version suffix, empty when not declared.
    pub versionsuffix: String,
    /// Resolved toolchain (inherited, custom, or the system sentinel).
    pub toolchain: Toolchain,
    /// Whether the dependency's module is installed hidden.
    pub hidden: bool,
    /// Whether the resolved toolchain is the system sentinel.
    pub system_toolchain: bool,
    /// Short module name, computed by the naming service.
    pub short_mod_name: String,
    /// Full module name, computed by the naming service.
    pub full_mod_name: String,
}

impl Dependency {
    /// The dependency's full effective version: version, toolchain part
    /// (unless system), and version suffix.
    #[must_use]
    pub fn full_version(&self) -> String {
        full_version("", &self.version, &self.versionsuffix, &self.toolchain)
    }
}

/// Derives a full effective version string from its parts.
///
/// The toolchain contributes a `-name-version` infix unless it is the
/// system sentinel.
#[must_use]
pub fn full_version(
    versionprefix: &str,
    version: &str,
    versionsuffix: &str,
    toolchain: &Toolchain,
) -> String {
    let mut full = format!("{versionprefix}{version}");
    if !toolchain.is_system() {
        full.push_str(&format!("-{}-{}", toolchain.name, toolchain.version));
    }
    full.push_str(versionsuffix);
    full
}

/// Positional field order of sequence-shaped dependency declarations.
const POSITIONAL_FIELDS: [&str; 4] = ["name", "version", "versionsuffix", "toolchain"];

/// Normalizes one raw dependency declaration into a [`Dependency`].
///
/// The input is never mutated. The owning recipe's toolchain is inherited
/// when the declaration carries no toolchain of its own; the naming
/// service computes the record's short and full module names from the
/// resolved fields (escalating to a fully parsed recipe through `lookup`
/// only if the active naming strategy demands one).
pub fn parse(
    dep: &Value,
    owner_toolchain: &Toolchain,
    hidden: bool,
    naming: &NamingService,
    lookup: &dyn RecipeLookup,
) -> Result<Dependency> {
    trace!("parsing {dep} as a dependency");

    let mut name = String::new();
    let mut version = String::new();
    let mut versionsuffix = String::new();
    let mut toolchain_spec: Option<Value> = None;

    match dep {
        Value::Map(entries) => {
            if let Some(value) = entries.get("name").and_then(Value::as_str) {
                name = value.to_string();
            }
            if let Some(value) = entries.get("version").and_then(Value::as_str) {
                version = value.to_string();
            }
            if let Some(value) = entries.get("versionsuffix").and_then(Value::as_str) {
                versionsuffix = value.to_string();
            }
            toolchain_spec = entries.get("toolchain").cloned();
            // legacy boolean field selecting the system toolchain
            if toolchain_spec.is_none() {
                toolchain_spec = entries.get("system").cloned();
            }
        }
        Value::Dep(literal) => {
            name = literal.name.clone();
            version = literal.version.clone();
            if let Some(suffix) = &literal.versionsuffix {
                versionsuffix = suffix.clone();
            }
            if let Some((tc_name, tc_version)) = &literal.toolchain {
                toolchain_spec = Some(Value::Tuple(vec![
                    Value::Str(tc_name.clone()),
                    Value::Str(tc_version.clone()),
                ]));
            }
        }
        Value::List(items) | Value::Tuple(items) => {
            for (field, value) in POSITIONAL_FIELDS.iter().zip(items) {
                match *field {
                    "name" => name = value.as_str().unwrap_or_default().to_string(),
                    "version" => version = value.as_str().unwrap_or_default().to_string(),
                    "versionsuffix" => {
                        versionsuffix = value.as_str().unwrap_or_default().to_string();
                    }
                    _ => toolchain_spec = Some(value.clone()),
                }
            }
        }
        other => {
            return Err(ForgeError::UnsupportedDependencyType {
                dep: other.to_string(),
                found: other.type_name().to_string(),
            });
        }
    }

    let toolchain = resolve_toolchain(toolchain_spec.as_ref(), owner_toolchain)?;
    let system_toolchain = toolchain.is_system();

    if name.is_empty() {
        return Err(ForgeError::MissingDependencyField {
            field: "name".to_string(),
            dep: dep.to_string(),
        });
    }
    if version.is_empty() {
        return Err(ForgeError::MissingDependencyField {
            field: "version".to_string(),
            dep: dep.to_string(),
        });
    }

    let mut record = Dependency {
        name,
        version,
        versionsuffix,
        toolchain,
        hidden,
        system_toolchain,
        short_mod_name: String::new(),
        full_mod_name: String::new(),
    };
    record.short_mod_name = naming.short_module_name(&NamingTarget::from_dependency(&record), lookup)?;
    record.full_mod_name =
        naming.full_module_name(&NamingTarget::from_dependency(&record), lookup, false)?;
    debug!("resolved dependency {} as module {}", record.name, record.full_mod_name);

    Ok(record)
}

/// Resolves a declared toolchain spec against the owner's toolchain.
fn resolve_toolchain(spec: Option<&Value>, owner: &Toolchain) -> Result<Toolchain> {
    let Some(spec) = spec else {
        return Ok(owner.clone());
    };
    match spec {
        Value::Bool(true) => Ok(Toolchain::system()),
        Value::List(items) | Value::Tuple(items) => match items.as_slice() {
            [Value::Str(name), Value::Str(version)] => {
                Ok(Toolchain::new(name.clone(), version.clone()))
            }
            _ => Err(unsupported(spec)),
        },
        Value::Map(_) => Toolchain::from_value(spec),
        other => Err(unsupported(other)),
    }
}

/// Removes dependencies whose software name is in the excluded set.
///
/// Filtering never fails; the number of removed entries is returned so
/// callers can observe how much was filtered out.
#[must_use]
pub fn filter_dependencies(deps: Vec<Dependency>, excluded: &[String]) -> (Vec<Dependency>, usize) {
    if excluded.is_empty() {
        return (deps, 0);
    }
    let before = deps.len();
    let kept: Vec<Dependency> = deps
        .into_iter()
        .filter(|dep| {
            let keep = !excluded.contains(&dep.name);
            if !keep {
                debug!("filtered out dependency {}", dep.name);
            }
            keep
        })
        .collect();
    let filtered = before - kept.len();
    (kept, filtered)
}
