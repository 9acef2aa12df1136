//! The module naming scheme service.
//!
//! Every installed artifact is addressed through the environment-module
//! system by a *full* (unique) and a *short* (policy-visible) module name,
//! placed in a scheme-specific subdirectory. How those names are derived
//! from a resolved recipe is pluggable: a [`NamingScheme`] strategy is
//! selected once per process by name from a [`SchemeRegistry`] and wrapped
//! in a [`NamingService`], which is constructed lazily by the pipeline and
//! immutable for the life of the process.
//!
//! Naming queries accept a [`NamingTarget`] built either from a fully
//! parsed recipe or from a lightweight dependency record. When the active
//! strategy declares the partial key set insufficient, the service
//! escalates: it resolves a full recipe through the injected
//! [`RecipeLookup`] (backed by the discovery/cache layer) and substitutes
//! it before delegating, so strategies may consult arbitrary recipe detail
//! even when called with only a dependency record.
//!
//! Derived names are validated (non-empty, relative-path form, printable
//! characters only) before being returned. When the source record is
//! hidden and the caller did not force the visible form, the name is
//! mangled by dot-prefixing its trailing path segment.

mod schemes;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::DEVEL_MODULE_SUFFIX;
use crate::core::{ForgeError, Result};
use crate::dependency::{Dependency, Toolchain, full_version};
use crate::recipe::Recipe;

pub use schemes::{FlatScheme, HierarchicalScheme};

/// The derived module identity of a resolved recipe.
///
/// Derived, never independently mutated; it is recomputed when the owning
/// recipe's naming-relevant fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleIdentity {
    /// Full (unique) module name.
    pub full: String,
    /// Short (policy-visible) module name.
    pub short: String,
    /// Module subdirectory.
    pub subdir: String,
    /// Whether the module is installed hidden.
    pub hidden: bool,
}

/// The fields a naming strategy derives module identity from.
///
/// Built from either a fully parsed recipe or a dependency record; the
/// `recipe` field is `Some` only in the former case (or after the service
/// escalated a partial target).
#[derive(Clone)]
pub struct NamingTarget<'a> {
    /// Software name.
    pub name: String,
    /// Software version.
    pub version: String,
    /// Version prefix (always empty for dependency records).
    pub versionprefix: String,
    /// Version suffix.
    pub versionsuffix: String,
    /// Resolved toolchain.
    pub toolchain: Toolchain,
    /// Whether the module is installed hidden.
    pub hidden: bool,
    /// Module class, when known.
    pub moduleclass: Option<String>,
    /// The fully parsed recipe, when available.
    pub recipe: Option<&'a Recipe>,
}

impl<'a> NamingTarget<'a> {
    /// Builds a target from a fully parsed recipe.
    #[must_use]
    pub fn from_recipe(recipe: &'a Recipe) -> Self {
        Self {
            name: recipe.name(),
            version: recipe.version(),
            versionprefix: recipe.string_value("versionprefix"),
            versionsuffix: recipe.string_value("versionsuffix"),
            toolchain: recipe.toolchain().clone(),
            hidden: recipe.hidden(),
            moduleclass: Some(recipe.string_value("moduleclass")),
            recipe: Some(recipe),
        }
    }

    /// Builds a target from a dependency record's fields.
    #[must_use]
    pub fn from_dependency(dep: &Dependency) -> Self {
        Self {
            name: dep.name.clone(),
            version: dep.version.clone(),
            versionprefix: String::new(),
            versionsuffix: dep.versionsuffix.clone(),
            toolchain: dep.toolchain.clone(),
            hidden: dep.hidden,
            moduleclass: None,
            recipe: None,
        }
    }

    /// The target's full effective version.
    #[must_use]
    pub fn full_version(&self) -> String {
        full_version(&self.versionprefix, &self.version, &self.versionsuffix, &self.toolchain)
    }

    /// The full effective version without the toolchain infix, used by
    /// strategies that encode the toolchain in the subdirectory instead.
    #[must_use]
    pub fn bare_version(&self) -> String {
        full_version(&self.versionprefix, &self.version, &self.versionsuffix, &Toolchain::system())
    }

    /// The keys this target can answer, for sufficiency checks.
    fn available_keys(&self) -> Vec<&'static str> {
        let mut keys = vec!["name", "version", "versionsuffix", "toolchain"];
        if self.moduleclass.is_some() {
            keys.push("moduleclass");
        }
        if !self.versionprefix.is_empty() {
            keys.push("versionprefix");
        }
        keys
    }
}

/// A pluggable module naming strategy.
pub trait NamingScheme: Send + Sync {
    /// Registry name of the scheme.
    fn name(&self) -> &'static str;

    /// Keys the scheme needs to answer naming queries.
    fn required_keys(&self) -> &'static [&'static str];

    /// Whether the scheme always needs a fully parsed recipe, regardless
    /// of which keys a partial target can answer.
    fn requires_full_recipe(&self) -> bool {
        false
    }

    /// Derives the full (unique) module name.
    fn full_module_name(&self, target: &NamingTarget<'_>) -> String;

    /// Derives the short (policy-visible) module name.
    fn short_module_name(&self, target: &NamingTarget<'_>) -> String;

    /// Derives the subdirectory the module file lives in.
    fn module_subdir(&self, _target: &NamingTarget<'_>) -> String {
        String::new()
    }

    /// Derives the paths in which symlinks to the module file are created.
    fn symlink_paths(&self, _target: &NamingTarget<'_>) -> Vec<String> {
        Vec::new()
    }

    /// Derives the modulepath extensions the module provides.
    fn modpath_extensions(&self, _target: &NamingTarget<'_>) -> Vec<String> {
        Vec::new()
    }

    /// Derives the modulepaths that are in scope before any module is
    /// loaded.
    fn init_module_paths(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether load statements for a toolchain should be expanded to load
    /// statements for the toolchain's own dependencies.
    fn expand_toolchain_load(&self) -> bool {
        false
    }

    /// Whether `short` is a plausible short module name for the given
    /// software name.
    fn is_short_name_for(&self, short: &str, software: &str) -> bool {
        short == software || short.starts_with(&format!("{software}/"))
    }
}

/// Registry of available naming strategies, keyed by name.
pub struct SchemeRegistry {
    schemes: BTreeMap<String, Arc<dyn NamingScheme>>,
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        let mut registry = Self { schemes: BTreeMap::new() };
        registry.register(Arc::new(FlatScheme));
        registry.register(Arc::new(HierarchicalScheme));
        registry
    }
}

impl SchemeRegistry {
    /// Registers a strategy under its own name.
    pub fn register(&mut self, scheme: Arc<dyn NamingScheme>) {
        self.schemes.insert(scheme.name().to_string(), scheme);
    }

    /// Names of every registered strategy.
    #[must_use]
    pub fn available(&self) -> Vec<String> {
        self.schemes.keys().cloned().collect()
    }

    fn get(&self, name: &str) -> Option<Arc<dyn NamingScheme>> {
        self.schemes.get(name).cloned()
    }
}

/// Resolves full recipes for naming-scheme escalation.
///
/// Implemented by the discovery/cache layer; [`NoLookup`] is the inert
/// implementation for contexts where escalation is not available.
pub trait RecipeLookup {
    /// Finds and parses the recipe for (software name, full effective
    /// version), or returns `None` when no recipe file can be discovered.
    fn find_recipe(&self, name: &str, version: &str) -> Result<Option<Recipe>>;
}

/// A [`RecipeLookup`] that never finds anything.
pub struct NoLookup;

impl RecipeLookup for NoLookup {
    fn find_recipe(&self, _name: &str, _version: &str) -> Result<Option<Recipe>> {
        Ok(None)
    }
}

/// The active naming strategy, selected once and immutable thereafter.
pub struct NamingService {
    scheme: Arc<dyn NamingScheme>,
}

impl std::fmt::Debug for NamingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamingService").field("scheme", &self.scheme.name()).finish()
    }
}

impl NamingService {
    /// Selects a strategy by name from the registry.
    pub fn new(scheme_name: &str, registry: &SchemeRegistry) -> Result<Self> {
        let scheme = registry.get(scheme_name).ok_or_else(|| ForgeError::UnknownNamingScheme {
            name: scheme_name.to_string(),
            available: registry.available(),
        })?;
        debug!("selected module naming scheme {}", scheme.name());
        Ok(Self { scheme })
    }

    /// Name of the active strategy.
    #[must_use]
    pub fn scheme_name(&self) -> &'static str {
        self.scheme.name()
    }

    /// Whether the active strategy needs a fully parsed recipe for the
    /// given target.
    fn needs_escalation(&self, target: &NamingTarget<'_>) -> bool {
        if target.recipe.is_some() {
            return false;
        }
        if self.scheme.requires_full_recipe() {
            return true;
        }
        let available = target.available_keys();
        !self.scheme.required_keys().iter().all(|key| available.contains(key))
    }

    /// Runs a naming query against the effective target, escalating to a
    /// fully parsed recipe first when the strategy demands one.
    fn with_effective<T>(
        &self,
        target: &NamingTarget<'_>,
        lookup: &dyn RecipeLookup,
        query: impl FnOnce(&dyn NamingScheme, &NamingTarget<'_>) -> T,
    ) -> Result<T> {
        if !self.needs_escalation(target) {
            return Ok(query(self.scheme.as_ref(), target));
        }
        let version = target.full_version();
        debug!(
            "a parsed recipe is required to name {}/{version}, resolving one",
            target.name
        );
        let recipe = lookup.find_recipe(&target.name, &version)?.ok_or_else(|| {
            ForgeError::RecipeNotFound { name: target.name.clone(), version: version.clone() }
        })?;
        let mut full = NamingTarget::from_recipe(&recipe);
        full.hidden = target.hidden;
        Ok(query(self.scheme.as_ref(), &full))
    }

    fn checked(&self, name: String, hidden: bool, force_visible: bool) -> Result<String> {
        if !is_valid_module_name(&name) {
            return Err(ForgeError::InvalidModuleName { name });
        }
        if hidden && !force_visible {
            Ok(hidden_module_name(&name))
        } else {
            Ok(name)
        }
    }

    /// Determines the full module name for a target.
    ///
    /// With `force_visible` set, the hidden-name mangling is skipped even
    /// for hidden targets; the reconciliation of hidden dependencies
    /// relies on this to compare visible forms.
    pub fn full_module_name(
        &self,
        target: &NamingTarget<'_>,
        lookup: &dyn RecipeLookup,
        force_visible: bool,
    ) -> Result<String> {
        let name = self.with_effective(target, lookup, |scheme, t| scheme.full_module_name(t))?;
        self.checked(name, target.hidden, force_visible)
    }

    /// Determines the short module name for a target.
    pub fn short_module_name(
        &self,
        target: &NamingTarget<'_>,
        lookup: &dyn RecipeLookup,
    ) -> Result<String> {
        let name = self.with_effective(target, lookup, |scheme, t| scheme.short_module_name(t))?;
        let name = self.checked(name, target.hidden, false)?;
        if !self.scheme.is_short_name_for(&name, &target.name) {
            return Err(ForgeError::InvalidShortModuleName {
                short: name,
                software: target.name.clone(),
            });
        }
        Ok(name)
    }

    /// Determines the module subdirectory for a target.
    pub fn module_subdir(
        &self,
        target: &NamingTarget<'_>,
        lookup: &dyn RecipeLookup,
    ) -> Result<String> {
        self.with_effective(target, lookup, |scheme, t| scheme.module_subdir(t))
    }

    /// Determines the paths in which symlinks to the module file must be
    /// created.
    pub fn symlink_paths(
        &self,
        target: &NamingTarget<'_>,
        lookup: &dyn RecipeLookup,
    ) -> Result<Vec<String>> {
        self.with_effective(target, lookup, |scheme, t| scheme.symlink_paths(t))
    }

    /// Determines the modulepath extensions for a target.
    pub fn modpath_extensions(
        &self,
        target: &NamingTarget<'_>,
        lookup: &dyn RecipeLookup,
    ) -> Result<Vec<String>> {
        self.with_effective(target, lookup, |scheme, t| scheme.modpath_extensions(t))
    }

    /// The modulepaths in scope before any module is loaded.
    #[must_use]
    pub fn init_module_paths(&self) -> Vec<String> {
        self.scheme.init_module_paths()
    }

    /// Whether toolchain load statements should be expanded.
    #[must_use]
    pub fn expand_toolchain_load(&self) -> bool {
        self.scheme.expand_toolchain_load()
    }

    /// Whether `short` is a short module name for the given software.
    #[must_use]
    pub fn is_short_name_for(&self, short: &str, software: &str) -> bool {
        self.scheme.is_short_name_for(short, software)
    }

    /// Determines the devel-module filename for a target: the full module
    /// name with path separators flattened, plus a fixed suffix.
    pub fn devel_module_filename(
        &self,
        target: &NamingTarget<'_>,
        lookup: &dyn RecipeLookup,
    ) -> Result<String> {
        let full = self.full_module_name(target, lookup, false)?;
        Ok(format!("{}{DEVEL_MODULE_SUFFIX}", full.replace('/', "-")))
    }
}

/// Whether a derived module name is acceptable: non-empty, in relative-path
/// form, and made of printable characters only.
#[must_use]
pub fn is_valid_module_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('/')
        && name.chars().all(|c| c.is_ascii_graphic() || c == ' ')
}

/// Mangles a visible module name into its hidden form by dot-prefixing the
/// trailing path segment.
#[must_use]
pub fn hidden_module_name(name: &str) -> String {
    match name.rsplit_once('/') {
        Some((head, tail)) => format!("{head}/.{tail}"),
        None => format!(".{name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str, version: &str, toolchain: Toolchain) -> NamingTarget<'static> {
        NamingTarget {
            name: name.to_string(),
            version: version.to_string(),
            versionprefix: String::new(),
            versionsuffix: String::new(),
            toolchain,
            hidden: false,
            moduleclass: None,
            recipe: None,
        }
    }

    #[test]
    fn test_unknown_scheme_lists_candidates() {
        let err = NamingService::new("nope", &SchemeRegistry::default()).unwrap_err();
        match err {
            ForgeError::UnknownNamingScheme { name, available } => {
                assert_eq!(name, "nope");
                assert_eq!(available, vec!["flat".to_string(), "hierarchical".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_flat_names_from_partial_target() {
        let service = NamingService::new("flat", &SchemeRegistry::default()).unwrap();
        let t = target("GCC", "4.8.2", Toolchain::system());
        assert_eq!(service.full_module_name(&t, &NoLookup, false).unwrap(), "GCC/4.8.2");
        assert_eq!(service.short_module_name(&t, &NoLookup).unwrap(), "GCC/4.8.2");
        assert_eq!(service.module_subdir(&t, &NoLookup).unwrap(), "");
    }

    #[test]
    fn test_hidden_mangling_and_visible_override() {
        let service = NamingService::new("flat", &SchemeRegistry::default()).unwrap();
        let mut t = target("ictce", "5.3.0", Toolchain::system());
        t.hidden = true;
        assert_eq!(service.full_module_name(&t, &NoLookup, false).unwrap(), "ictce/.5.3.0");
        assert_eq!(service.full_module_name(&t, &NoLookup, true).unwrap(), "ictce/5.3.0");
    }

    #[test]
    fn test_hidden_module_name_without_separator() {
        assert_eq!(hidden_module_name("GCC"), ".GCC");
        assert_eq!(hidden_module_name("Core/GCC/4.8.2"), "Core/GCC/.4.8.2");
    }

    #[test]
    fn test_module_name_validation() {
        assert!(is_valid_module_name("GCC/4.8.2"));
        assert!(!is_valid_module_name(""));
        assert!(!is_valid_module_name("/abs/path"));
        assert!(!is_valid_module_name("bad\nname"));
    }

    #[test]
    fn test_devel_module_filename() {
        let service = NamingService::new("flat", &SchemeRegistry::default()).unwrap();
        let t = target("zlib", "1.2.8", Toolchain::new("GCC", "4.8.2"));
        assert_eq!(
            service.devel_module_filename(&t, &NoLookup).unwrap(),
            "zlib-1.2.8-GCC-4.8.2.devel"
        );
    }

    #[test]
    fn test_escalation_fails_without_recipe() {
        let service = NamingService::new("hierarchical", &SchemeRegistry::default()).unwrap();
        let t = target("zlib", "1.2.8", Toolchain::new("GCC", "4.8.2"));
        let err = service.full_module_name(&t, &NoLookup, false).unwrap_err();
        assert!(matches!(err, ForgeError::RecipeNotFound { .. }));
    }
}
