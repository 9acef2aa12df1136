//! Error handling for modforge.
//!
//! This module provides the strongly-typed error enumeration used throughout
//! the configuration-resolution core. The error system follows two rules:
//!
//! 1. **One variant per failure mode** so callers can handle specific
//!    conditions without parsing message strings.
//! 2. **Batched reporting for validation-category failures**: steps that can
//!    fail for several items at once (missing mandatory parameters, typo
//!    suggestions, missing OS dependencies, unreconciled hidden
//!    dependencies, inconsistent iterate-option lengths) collect every
//!    offending item into a single error, giving the caller a complete
//!    picture instead of a fail-fast trickle.
//!
//! Deprecation of a parameter is deliberately *not* an error: it is logged
//! as a warning and the access is rewritten to the replacement name. Use of
//! a fully replaced parameter, on the other hand, is always fatal and
//! reported as [`ForgeError::ReplacedParameter`].
//!
//! External collaborators (the syntax parser, the host probe) report their
//! failures as opaque [`anyhow::Error`] values; the pipeline converts them
//! into [`ForgeError::ParseError`] at the seam.

use thiserror::Error;

/// Convenience alias used by every fallible operation in the core.
pub type Result<T> = std::result::Result<T, ForgeError>;

/// The main error type for modforge operations.
///
/// Each variant represents a specific failure mode of the resolution
/// pipeline. Variants that report per-item findings of a validation step
/// carry a `Vec` with *all* offending items of that step.
#[derive(Error, Debug)]
pub enum ForgeError {
    /// One or more mandatory parameters are absent from a recipe.
    ///
    /// Collected as a single report over the complete mandatory set
    /// (schema-mandatory plus builder-supplied mandatory extras).
    #[error("mandatory parameters not provided in {location}: {}", keys.join(", "))]
    MissingMandatoryParameters {
        /// Recipe path or literal-source description.
        location: String,
        /// Every mandatory key that is missing.
        keys: Vec<String>,
    },

    /// Unknown parameter names that closely match known ones.
    ///
    /// Reported together, as `unknown -> suggestion` pairs.
    #[error("you may have some typos in your recipe: {}", typos.iter().map(|(k, s)| format!("{k} -> {s}")).collect::<Vec<_>>().join(", "))]
    ParameterTypos {
        /// Pairs of (unknown key, closest known parameter).
        typos: Vec<(String, String)>,
    },

    /// A parameter that has been removed from the schema was used.
    #[error("recipe parameter '{name}' is replaced by '{replacement}'")]
    ReplacedParameter {
        /// The removed parameter name.
        name: String,
        /// The parameter that replaces it.
        replacement: String,
    },

    /// A keyed access named a parameter the schema does not know.
    #[error("use of unknown recipe parameter '{name}'")]
    UnknownParameter {
        /// The unknown parameter name.
        name: String,
    },

    /// Builder-supplied extra parameters were not a name-to-spec mapping.
    #[error("extra parameters should be a mapping, found {found}")]
    InvalidExtensionType {
        /// Type of the value that was supplied instead.
        found: String,
    },

    /// A dependency declared a toolchain in an unsupported shape.
    ///
    /// Supported shapes: absent (inherit), boolean `true` (system
    /// toolchain), a two-element name/version pair, or a mapping with
    /// `name` and `version` keys.
    #[error("unsupported toolchain specification: {spec}")]
    UnsupportedToolchainSpec {
        /// Rendering of the offending specification.
        spec: String,
    },

    /// A dependency was declared in a shape the resolver does not accept.
    ///
    /// Accepted shapes: an explicit mapping, a positional 2/3/4-element
    /// sequence, or a structured dependency literal.
    #[error("dependency {dep} of unsupported type: {found}")]
    UnsupportedDependencyType {
        /// Rendering of the offending declaration.
        dep: String,
        /// Kind of the value that was supplied.
        found: String,
    },

    /// A dependency record ended up without a name or version.
    #[error("dependency specified without {field}: {dep}")]
    MissingDependencyField {
        /// The empty field ("name" or "version").
        field: String,
        /// Rendering of the offending dependency.
        dep: String,
    },

    /// Hidden dependencies whose visible module names match no entry in the
    /// plain dependency list.
    #[error("hidden dependencies with visible module names {} not in list of dependencies: {}", missing.join(", "), dependencies.join(", "))]
    UnreconciledHiddenDependencies {
        /// Visible full module names of the faulty hidden dependencies.
        missing: Vec<String>,
        /// Full module names of the declared plain dependencies, for
        /// diagnosis.
        dependencies: Vec<String>,
    },

    /// A parameter value is not a member of its configured allowed list.
    #[error("{parameter} provided '{value}' is not valid: {}", allowed.join(", "))]
    InvalidEnumeratedValue {
        /// The constrained parameter name.
        parameter: String,
        /// The offending value.
        value: String,
        /// The configured allowed values.
        allowed: Vec<String>,
    },

    /// OS dependency sets with no candidate present on the host.
    #[error("one or more OS dependencies were not found: {}", missing.join(", "))]
    MissingOsDependencies {
        /// Rendering of each entirely-absent alternative set.
        missing: Vec<String>,
    },

    /// An OS dependency was declared in a shape other than a name or an
    /// alternative-set of names.
    #[error("invalid OS dependency specification {dep}, expected a name or a sequence of names")]
    InvalidOsDependencySpec {
        /// Rendering of the offending declaration.
        dep: String,
    },

    /// The skip-steps parameter was given as a scalar instead of a sequence.
    #[error("invalid type for skipsteps, allowed are list or tuple, got {found}")]
    InvalidSkipSteps {
        /// Type of the value that was supplied.
        found: String,
    },

    /// Iterate-option lists of differing lengths (> 1) were declared.
    #[error("build option lists for iterated build should have same length: {}", counts.iter().map(|(n, l)| format!("{n}={l}")).collect::<Vec<_>>().join(", "))]
    InconsistentIterateOptions {
        /// Every iterate-option parameter given as a list, with its length.
        counts: Vec<(String, usize)>,
    },

    /// The license parameter is mandatory but unset.
    #[error("license is mandatory, but 'software_license' is undefined")]
    MissingLicense,

    /// The license parameter holds a value of the wrong type.
    #[error("software license has to be a license name, found {found}")]
    InvalidLicenseType {
        /// Type of the value that was supplied.
        found: String,
    },

    /// The named license is not in the registered license table.
    #[error("invalid license {name}")]
    UnknownLicense {
        /// The unrecognized license name.
        name: String,
    },

    /// The configured module naming scheme is not in the registry.
    #[error("selected module naming scheme {name} could not be found in {}", available.join(", "))]
    UnknownNamingScheme {
        /// The unknown scheme name.
        name: String,
        /// Every registered scheme name.
        available: Vec<String>,
    },

    /// A naming scheme derived a module name that failed validation.
    #[error("{name} is not a valid module name")]
    InvalidModuleName {
        /// The invalid derived name.
        name: String,
    },

    /// A derived short module name does not identify its software.
    #[error("'{short}' is not a valid short module name for software '{software}'")]
    InvalidShortModuleName {
        /// The derived short module name.
        short: String,
        /// The software name it should identify.
        software: String,
    },

    /// No recipe file could be discovered for a (name, version) pair when
    /// the naming scheme demanded a fully parsed recipe.
    #[error("failed to find recipe file '{name}-{version}.{}' when determining module name", crate::constants::RECIPE_EXTENSION)]
    RecipeNotFound {
        /// Software name being looked up.
        name: String,
        /// Full effective version being looked up.
        version: String,
    },

    /// A named block was requested but the source does not contain it.
    #[error("no block '{name}' found in {location}")]
    UnknownBlock {
        /// The requested block name.
        name: String,
        /// Recipe path or literal-source description.
        location: String,
    },

    /// The syntax parser rejected the raw recipe text.
    #[error("failed to parse recipe {location}: {reason}")]
    ParseError {
        /// Recipe path or literal-source description.
        location: String,
        /// Parser-reported reason.
        reason: String,
    },

    /// `update` was called on a parameter that is neither a string nor a
    /// list.
    #[error("can't update configuration value for {name}, because it's not a string or list")]
    InvalidUpdate {
        /// The parameter that was updated.
        name: String,
    },

    /// IO error while reading recipe sources.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
