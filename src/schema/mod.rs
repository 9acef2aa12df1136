//! The recipe parameter schema.
//!
//! This module holds the static table of recognized recipe parameters:
//! their default values, documentation, and category. The table is loaded
//! once per process and is immutable; recipes seed their parameter table
//! from it via [`merge`], layering in any builder-supplied extra
//! parameters.
//!
//! Two fixed side tables implement the parameter lifecycle policy:
//!
//! - [`deprecated`] maps a deprecated name to its replacement and the
//!   version the deprecation was announced in. Accessing a deprecated key
//!   logs a warning and transparently rewrites to the replacement.
//! - [`replaced`] maps a removed name to its successor. Accessing a
//!   replaced key always fails.
//!
//! Both tables are consulted by [`intercept`], which every keyed accessor
//! on a recipe calls as its first step, so that the policy applies
//! uniformly to get, set, contains, and update.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{ForgeError, Result, Value};

/// Category a recipe parameter belongs to.
///
/// Categories drive documentation grouping and a few policy decisions:
/// `Mandatory` parameters must be present in every recipe, and `Hidden`
/// parameters are internal bookkeeping that is never dumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterCategory {
    /// Must be defined by every recipe.
    Mandatory,
    /// Builder-specific parameter supplied via extra options.
    Custom,
    /// Toolchain selection and options.
    Toolchain,
    /// Configure/build/install phases.
    Build,
    /// Source, patch, and install-tree handling.
    FileManagement,
    /// Declared dependencies of all kinds.
    Dependencies,
    /// Licensing metadata.
    License,
    /// Extension (bundled sub-package) handling.
    Extensions,
    /// Generated environment-module behavior.
    Modules,
    /// Everything else.
    Other,
    /// Internal bookkeeping, never user-provided and never dumped.
    Hidden,
}

/// Specification of a single recipe parameter: default value,
/// documentation, and category.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    /// Value a recipe gets when the parameter is not declared.
    pub default: Value,
    /// One-line documentation string.
    pub doc: &'static str,
    /// The parameter's category.
    pub category: ParameterCategory,
}

/// An extra parameter contributed by a builder implementation.
#[derive(Debug, Clone)]
pub struct ExtraParameter {
    /// Default value.
    pub default: Value,
    /// One-line documentation string.
    pub doc: String,
    /// Whether recipes using this builder must define the parameter.
    pub mandatory: bool,
}

/// A parameter entry inside a recipe's table: the current value plus the
/// documentation and category inherited from the spec it was seeded from.
#[derive(Debug, Clone)]
pub struct ParameterEntry {
    /// Current value.
    pub value: Value,
    /// Documentation string.
    pub doc: String,
    /// Category.
    pub category: ParameterCategory,
}

macro_rules! schema {
    ($($name:literal => ($default:expr, $doc:literal, $cat:ident)),* $(,)?) => {{
        let mut table = BTreeMap::new();
        $(table.insert($name, ParameterSpec {
            default: $default,
            doc: $doc,
            category: ParameterCategory::$cat,
        });)*
        table
    }};
}

static DEFAULTS: LazyLock<BTreeMap<&'static str, ParameterSpec>> = LazyLock::new(|| {
    use Value::{Bool, List, Map, None as NoneV, Str};
    schema! {
        // mandatory
        "name" => (Str(String::new()), "Name of software", Mandatory),
        "version" => (Str(String::new()), "Version of software", Mandatory),
        "homepage" => (Str(String::new()), "The homepage of the software", Mandatory),
        "description" => (Str(String::new()), "A short description of the software", Mandatory),
        "toolchain" => (NoneV, "Name and version of toolchain", Mandatory),

        // custom
        "easyblock" => (NoneV, "Builder implementation to use, derived from software name when unset", Custom),
        "versionprefix" => (Str(String::new()), "Additional prefix for software version", Custom),
        "versionsuffix" => (Str(String::new()), "Additional suffix for software version", Custom),

        // toolchain
        "toolchainopts" => (NoneV, "Extra options for the toolchain", Toolchain),

        // build
        "preconfigopts" => (Str(String::new()), "Extra options pre-passed to configure", Build),
        "configopts" => (Str(String::new()), "Extra options passed to configure", Build),
        "prebuildopts" => (Str(String::new()), "Extra options pre-passed to build command", Build),
        "buildopts" => (Str(String::new()), "Extra options passed to build command", Build),
        "preinstallopts" => (Str(String::new()), "Extra prefix options for install", Build),
        "installopts" => (Str(String::new()), "Extra options for installation", Build),
        "unpack_options" => (Str(String::new()), "Extra options for unpacking source", Build),
        "stop" => (NoneV, "Last build step to execute", Build),
        "skip" => (Bool(false), "Skip existing software", Build),
        "skipsteps" => (Value::Tuple(vec![]), "Skip these build steps", Build),
        "parallel" => (NoneV, "Degree of parallelism for the build", Build),
        "maxparallel" => (NoneV, "Upper bound on the degree of parallelism", Build),
        "runtest" => (NoneV, "Test to run after the build step", Build),
        "tests" => (List(vec![]), "Independent sanity tests to run after installation", Build),
        "sanity_check_paths" => (Map(BTreeMap::new()), "Files and directories that must exist after installation", Build),
        "sanity_check_commands" => (List(vec![]), "Commands that must succeed after installation", Build),

        // file management
        "sources" => (List(vec![]), "List of source files", FileManagement),
        "source_urls" => (List(vec![]), "List of URLs for source files", FileManagement),
        "patches" => (List(vec![]), "List of patches to apply", FileManagement),
        "checksums" => (List(vec![]), "Checksums for sources and patches", FileManagement),
        "start_dir" => (NoneV, "Path to start the build in, relative to the unpacked source", FileManagement),
        "buildininstalldir" => (Bool(false), "Build in the installation directory", FileManagement),
        "cleanupoldbuild" => (Bool(true), "Remove previous build directory", FileManagement),
        "cleanupoldinstall" => (Bool(true), "Remove previous installation directory", FileManagement),
        "keeppreviousinstall" => (Bool(false), "Keep a previous installation if it exists", FileManagement),

        // dependencies
        "dependencies" => (List(vec![]), "List of dependencies", Dependencies),
        "builddependencies" => (List(vec![]), "List of build dependencies", Dependencies),
        "hiddendependencies" => (List(vec![]), "List of dependencies available as hidden modules", Dependencies),
        "osdependencies" => (List(vec![]), "OS packages that should be present on the system", Dependencies),
        "allow_system_deps" => (List(vec![]), "Allow these system dependencies, as (name, version) pairs", Dependencies),

        // license
        "software_license" => (NoneV, "Name of the software license", License),
        "license_file" => (NoneV, "License file for the software", License),
        "group" => (NoneV, "Group the installation should be restricted to", License),
        "key" => (NoneV, "Key for installing software", License),

        // extensions
        "exts_list" => (List(vec![]), "List of extensions for this software", Extensions),
        "exts_defaultclass" => (NoneV, "Default builder for extensions", Extensions),
        "exts_filter" => (NoneV, "Filter commands for extension sanity checks", Extensions),

        // modules
        "moduleclass" => (Str("base".to_string()), "Module class of the software", Modules),
        "modextrapaths" => (Map(BTreeMap::new()), "Extra paths to prepend in the generated module", Modules),
        "modextravars" => (Map(BTreeMap::new()), "Extra environment variables to set in the generated module", Modules),
        "modloadmsg" => (Str(String::new()), "Message to print when loading the module", Modules),
        "include_modpath_extensions" => (Bool(true), "Include modulepath extensions in the generated module", Modules),

        // other
        "buildstats" => (NoneV, "Build statistics of previous builds of this software", Other),
    }
});

static DEPRECATED: LazyLock<BTreeMap<&'static str, (&'static str, &'static str)>> =
    LazyLock::new(|| {
        let mut table = BTreeMap::new();
        table.insert("license", ("software_license", "2.0"));
        table
    });

static REPLACED: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut table = BTreeMap::new();
    table.insert("makeopts", "buildopts");
    table.insert("premakeopts", "prebuildopts");
    table
});

/// The immutable base schema: every recognized parameter with its default
/// value, documentation, and category.
#[must_use]
pub fn defaults() -> &'static BTreeMap<&'static str, ParameterSpec> {
    &DEFAULTS
}

/// The deprecated-parameter table: name -> (replacement, deprecated-since).
#[must_use]
pub fn deprecated() -> &'static BTreeMap<&'static str, (&'static str, &'static str)> {
    &DEPRECATED
}

/// The replaced-parameter table: name -> replacement.
#[must_use]
pub fn replaced() -> &'static BTreeMap<&'static str, &'static str> {
    &REPLACED
}

/// Whether the schema recognizes `name` as a current parameter.
#[must_use]
pub fn is_known(name: &str) -> bool {
    DEFAULTS.contains_key(name)
}

/// Applies the deprecation/replacement policy to a parameter name.
///
/// Deprecated names are rewritten to their replacement after logging a
/// warning; replaced names always fail. All other names pass through
/// untouched. Every keyed accessor on a recipe routes through this before
/// touching its table.
pub fn intercept(name: &str) -> Result<&str> {
    if let Some((replacement, since)) = DEPRECATED.get(name) {
        warn!(
            "recipe parameter '{name}' is deprecated since v{since}, use '{replacement}' instead"
        );
        return Ok(*replacement);
    }
    if let Some(replacement) = REPLACED.get(name) {
        return Err(ForgeError::ReplacedParameter {
            name: name.to_string(),
            replacement: (*replacement).to_string(),
        });
    }
    Ok(name)
}

/// Builds a recipe parameter table from the base schema plus
/// builder-supplied extra parameters.
#[must_use]
pub fn merge(extras: &BTreeMap<String, ExtraParameter>) -> BTreeMap<String, ParameterEntry> {
    let mut table: BTreeMap<String, ParameterEntry> = DEFAULTS
        .iter()
        .map(|(name, spec)| {
            ((*name).to_string(), ParameterEntry {
                value: spec.default.clone(),
                doc: spec.doc.to_string(),
                category: spec.category,
            })
        })
        .collect();
    for (name, extra) in extras {
        table.insert(name.clone(), ParameterEntry {
            value: extra.default.clone(),
            doc: extra.doc.clone(),
            category: if extra.mandatory {
                ParameterCategory::Mandatory
            } else {
                ParameterCategory::Custom
            },
        });
    }
    table
}

/// Interprets a dynamic value as a table of extra parameters.
///
/// Builders backed by declarative data hand their extra parameters over as
/// a [`Value`]; anything but a name-to-`(default, doc, mandatory)` mapping
/// fails with [`ForgeError::InvalidExtensionType`].
pub fn extras_from_value(value: &Value) -> Result<BTreeMap<String, ExtraParameter>> {
    let entries = value.as_map().ok_or_else(|| ForgeError::InvalidExtensionType {
        found: value.type_name().to_string(),
    })?;
    let mut extras = BTreeMap::new();
    for (name, spec) in entries {
        let fields = spec.as_sequence().ok_or_else(|| ForgeError::InvalidExtensionType {
            found: spec.type_name().to_string(),
        })?;
        let default = fields.first().cloned().unwrap_or(Value::None);
        let doc = fields.get(1).and_then(Value::as_str).unwrap_or_default().to_string();
        let mandatory = matches!(fields.get(2), Some(Value::Bool(true)));
        extras.insert(name.clone(), ExtraParameter { default, doc, mandatory });
    }
    Ok(extras)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_contains_mandatory_parameters() {
        for name in crate::constants::MANDATORY_PARAMETERS {
            let spec = defaults().get(name).expect("mandatory parameter in schema");
            assert_eq!(spec.category, ParameterCategory::Mandatory, "{name}");
        }
    }

    #[test]
    fn test_intercept_passthrough() {
        assert_eq!(intercept("buildopts").unwrap(), "buildopts");
        // unknown names pass through too; the accessor decides what unknown means
        assert_eq!(intercept("no_such_parameter").unwrap(), "no_such_parameter");
    }

    #[test]
    fn test_intercept_deprecated_rewrites() {
        assert_eq!(intercept("license").unwrap(), "software_license");
    }

    #[test]
    fn test_intercept_replaced_fails() {
        let err = intercept("makeopts").unwrap_err();
        match err {
            ForgeError::ReplacedParameter { name, replacement } => {
                assert_eq!(name, "makeopts");
                assert_eq!(replacement, "buildopts");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_merge_layers_extras_over_defaults() {
        let mut extras = BTreeMap::new();
        extras.insert("with_mpi".to_string(), ExtraParameter {
            default: Value::Bool(false),
            doc: "Enable MPI support".to_string(),
            mandatory: true,
        });
        let table = merge(&extras);
        assert_eq!(table["with_mpi"].category, ParameterCategory::Mandatory);
        assert_eq!(table["moduleclass"].value, Value::Str("base".into()));
    }

    #[test]
    fn test_extras_from_value_rejects_non_mapping() {
        let err = extras_from_value(&Value::Str("nope".into())).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidExtensionType { .. }));
    }

    #[test]
    fn test_extras_from_value_reads_triples() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "cuda_compute".to_string(),
            Value::Tuple(vec![
                Value::None,
                Value::Str("CUDA compute capabilities".into()),
                Value::Bool(true),
            ]),
        );
        let extras = extras_from_value(&Value::Map(entries)).unwrap();
        assert!(extras["cuda_compute"].mandatory);
    }
}
