//! Global constants used throughout the modforge codebase.
//!
//! This module contains the well-known parameter lists, sentinel values,
//! thresholds, and timeout durations that are used across multiple modules.
//! Defining them centrally improves maintainability and makes magic numbers
//! more discoverable.

use std::time::Duration;

/// Name of the sentinel toolchain denoting a toolchain-independent build.
///
/// A recipe (or dependency) built against the system toolchain is compiled
/// with whatever the host provides; no toolchain module is loaded for it.
pub const SYSTEM_TOOLCHAIN_NAME: &str = "system";

/// Version of the sentinel toolchain denoting a toolchain-independent build.
pub const SYSTEM_TOOLCHAIN_VERSION: &str = "system";

/// Parameters that every recipe must define, in addition to any
/// builder-supplied parameters flagged as mandatory.
pub const MANDATORY_PARAMETERS: [&str; 5] =
    ["name", "version", "homepage", "description", "toolchain"];

/// Configure/build/install option parameters that may be given as lists for
/// an iterated build. When more than one of these is a list of length > 1,
/// all such lists must share the same length; length-1 lists behave like
/// scalars applied to every iteration.
pub const ITERATE_OPTIONS: [&str; 6] = [
    "preconfigopts",
    "configopts",
    "prebuildopts",
    "buildopts",
    "preinstallopts",
    "installopts",
];

/// Minimum normalized similarity for an unknown parameter name to be
/// reported as a likely typo of a known one.
pub const TYPO_SIMILARITY_THRESHOLD: f64 = 0.85;

/// File extension of recipe files on disk (without the leading dot).
pub const RECIPE_EXTENSION: &str = "mf";

/// Suffix appended to a mangled full module name to obtain the filename of
/// the corresponding devel module.
pub const DEVEL_MODULE_SUFFIX: &str = ".devel";

/// Upper bound on the time the host probe may spend on a single
/// package-manager query. A query that exceeds this is treated as
/// "package not found", never as a failure of the resolution itself.
pub const OS_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
