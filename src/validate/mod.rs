//! The validation engine.
//!
//! Validation runs only when both the global policy and the per-recipe
//! flag enable it. The steps run in a fixed order; each step reports its
//! failure independently, and steps that can fail for several items at
//! once (OS dependencies, iterate-option lengths) collect every offending
//! item into one error:
//!
//! 1. enumerated-value checks for constrained parameters (module class,
//!    stop phase); an absent allowed-list means "no constraint";
//! 2. OS-dependency presence (policy-gated), probing the host per
//!    alternative-set;
//! 3. the skip-steps value must be a sequence;
//! 4. iterate-option lists of length > 1 must all share one length;
//! 5. the declared license must name a registered license; a missing
//!    license is only an error when the license parameter is mandatory.

use tracing::{debug, info};

use crate::constants::ITERATE_OPTIONS;
use crate::core::{ForgeError, Result, Value};
use crate::license::LicenseRegistry;
use crate::osdeps::HostProbe;
use crate::pipeline::ResolveOptions;
use crate::recipe::Recipe;

/// Validates a resolved recipe against the configured policy.
pub fn validate(
    recipe: &Recipe,
    options: &ResolveOptions,
    licenses: &LicenseRegistry,
    probe: &dyn HostProbe,
) -> Result<()> {
    info!("validating recipe {}", recipe.name());

    check_enumerated(recipe, options)?;

    if options.check_osdeps {
        check_os_deps(recipe, probe)?;
    } else {
        debug!("not checking OS dependencies");
    }

    check_skipsteps(recipe)?;
    check_iterate_opts(recipe)?;
    check_license(recipe, licenses)?;

    Ok(())
}

/// Enumerated-value constraints: a set value must be a member of its
/// configured allowed list.
fn check_enumerated(recipe: &Recipe, options: &ResolveOptions) -> Result<()> {
    let constraints: [(&str, Option<&Vec<String>>); 2] = [
        ("moduleclass", options.valid_module_classes.as_ref()),
        ("stop", options.valid_stops.as_ref()),
    ];
    for (parameter, allowed) in constraints {
        let Some(allowed) = allowed else { continue };
        let value = recipe.value(parameter)?;
        if !value.is_set() {
            continue;
        }
        let rendered = value.to_string();
        if !allowed.contains(&rendered) {
            return Err(ForgeError::InvalidEnumeratedValue {
                parameter: parameter.to_string(),
                value: rendered,
                allowed: allowed.clone(),
            });
        }
    }
    Ok(())
}

/// OS-dependency presence: each declared dependency is a single name or
/// an alternative-set; at least one candidate must be detected. Absent
/// sets are collected and reported together.
fn check_os_deps(recipe: &Recipe, probe: &dyn HostProbe) -> Result<()> {
    let declared = recipe.value("osdependencies")?;
    let mut not_found = Vec::new();
    for dep in declared.as_sequence().unwrap_or_default() {
        let candidates: Vec<String> = match dep {
            Value::Str(name) => vec![name.clone()],
            Value::List(_) | Value::Tuple(_) => {
                let items = dep.as_sequence().unwrap_or_default();
                let names: Option<Vec<String>> =
                    items.iter().map(|v| v.as_str().map(ToString::to_string)).collect();
                names.ok_or_else(|| ForgeError::InvalidOsDependencySpec { dep: dep.to_string() })?
            }
            other => {
                return Err(ForgeError::InvalidOsDependencySpec { dep: other.to_string() });
            }
        };
        if probe.has_os_package(&candidates) {
            debug!("OS dependency ok: {}", candidates.join("|"));
        } else {
            not_found.push(candidates.join("|"));
        }
    }
    if not_found.is_empty() {
        Ok(())
    } else {
        Err(ForgeError::MissingOsDependencies { missing: not_found })
    }
}

/// The skip-steps parameter must be a sequence, not a scalar.
fn check_skipsteps(recipe: &Recipe) -> Result<()> {
    let value = recipe.raw_value("skipsteps")?;
    match value {
        Value::List(_) | Value::Tuple(_) => Ok(()),
        other => Err(ForgeError::InvalidSkipSteps { found: other.type_name().to_string() }),
    }
}

/// Iterate-option lists of length > 1 must all share the same length;
/// length-1 lists behave like scalars and are exempt.
fn check_iterate_opts(recipe: &Recipe) -> Result<()> {
    let mut counts = Vec::new();
    for option in ITERATE_OPTIONS {
        let value = recipe.value(option)?;
        if let Some(items) = value.as_sequence() {
            counts.push((option.to_string(), items.len()));
        }
    }

    let mut lengths: Vec<usize> =
        counts.iter().map(|(_, len)| *len).filter(|len| *len > 1).collect();
    lengths.sort_unstable();
    lengths.dedup();
    if lengths.len() > 1 {
        return Err(ForgeError::InconsistentIterateOptions { counts });
    }
    Ok(())
}

/// The declared license must be a registered license name; when unset it
/// is only an error if the license parameter is mandatory.
fn check_license(recipe: &Recipe, licenses: &LicenseRegistry) -> Result<()> {
    let value = recipe.value("software_license")?;
    match value {
        Value::None => {
            if recipe.mandatory().iter().any(|key| key == "software_license") {
                Err(ForgeError::MissingLicense)
            } else {
                Ok(())
            }
        }
        Value::Str(name) => {
            if licenses.lookup(&name).is_some() {
                Ok(())
            } else {
                Err(ForgeError::UnknownLicense { name })
            }
        }
        other => Err(ForgeError::InvalidLicenseType { found: other.type_name().to_string() }),
    }
}
