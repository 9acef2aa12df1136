//! The builder registry.
//!
//! Per-software build-step implementations ("builders") are external
//! collaborators; the resolution core only needs one capability from them:
//! the extra recipe parameters a builder contributes. Builders are looked
//! up by explicit name (the recipe's `easyblock` parameter) or, failing
//! that, by a key derived from the software name. The registry is
//! populated at startup; there is no reflective dispatch.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::core::{Result, Value};
use crate::schema::{self, ExtraParameter};

/// A build-step implementation, as far as the resolution core cares.
pub trait Builder: Send + Sync {
    /// Extra recipe parameters this builder contributes.
    fn extra_parameters(&self) -> BTreeMap<String, ExtraParameter> {
        BTreeMap::new()
    }
}

/// The fallback builder: no extra parameters.
pub struct GenericBuilder;

impl Builder for GenericBuilder {}

/// A builder whose extra parameters come from declarative data.
///
/// The payload must be a name-to-`(default, doc, mandatory)` mapping;
/// anything else fails with an invalid-extension-type error.
pub struct DeclaredBuilder {
    extras: BTreeMap<String, ExtraParameter>,
}

impl DeclaredBuilder {
    /// Builds from a dynamic extra-parameter payload.
    pub fn from_value(payload: &Value) -> Result<Self> {
        Ok(Self { extras: schema::extras_from_value(payload)? })
    }
}

impl Builder for DeclaredBuilder {
    fn extra_parameters(&self) -> BTreeMap<String, ExtraParameter> {
        self.extras.clone()
    }
}

/// Derives the registry key a software name resolves to when no builder
/// name is given explicitly: lowercased, with dashes folded to
/// underscores and other non-alphanumeric characters removed.
#[must_use]
pub fn builder_key(software_name: &str) -> String {
    software_name
        .chars()
        .filter_map(|c| match c {
            '-' => Some('_'),
            c if c.is_ascii_alphanumeric() || c == '_' => Some(c.to_ascii_lowercase()),
            _ => None,
        })
        .collect()
}

/// Registry mapping builder names to builder implementations.
pub struct BuilderRegistry {
    builders: BTreeMap<String, Arc<dyn Builder>>,
    generic: Arc<dyn Builder>,
}

impl Default for BuilderRegistry {
    fn default() -> Self {
        Self { builders: BTreeMap::new(), generic: Arc::new(GenericBuilder) }
    }
}

impl BuilderRegistry {
    /// Registers a builder under a name.
    pub fn register(&mut self, name: impl Into<String>, builder: Arc<dyn Builder>) {
        self.builders.insert(name.into(), builder);
    }

    /// Looks up the builder for a recipe: by explicit builder name first,
    /// then by the key derived from the software name, falling back to the
    /// generic builder.
    #[must_use]
    pub fn lookup(&self, easyblock: Option<&str>, software_name: Option<&str>) -> Arc<dyn Builder> {
        if let Some(name) = easyblock {
            if let Some(builder) = self.builders.get(name) {
                return Arc::clone(builder);
            }
            debug!("no builder registered under explicit name '{name}', using generic");
            return Arc::clone(&self.generic);
        }
        if let Some(software) = software_name {
            let key = builder_key(software);
            if let Some(builder) = self.builders.get(&key) {
                debug!("derived builder '{key}' for software '{software}'");
                return Arc::clone(builder);
            }
        }
        Arc::clone(&self.generic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MpiBuilder;

    impl Builder for MpiBuilder {
        fn extra_parameters(&self) -> BTreeMap<String, ExtraParameter> {
            let mut extras = BTreeMap::new();
            extras.insert("with_fabric".to_string(), ExtraParameter {
                default: Value::None,
                doc: "Fabric to build against".to_string(),
                mandatory: true,
            });
            extras
        }
    }

    #[test]
    fn test_builder_key_derivation() {
        assert_eq!(builder_key("OpenMPI"), "openmpi");
        assert_eq!(builder_key("netCDF-Fortran"), "netcdf_fortran");
        assert_eq!(builder_key("GCC(core)"), "gcccore");
    }

    #[test]
    fn test_lookup_explicit_then_derived_then_generic() {
        let mut registry = BuilderRegistry::default();
        registry.register("mpi", Arc::new(MpiBuilder));
        registry.register("openmpi", Arc::new(MpiBuilder));

        assert!(registry.lookup(Some("mpi"), None).extra_parameters().contains_key("with_fabric"));
        assert!(
            registry
                .lookup(None, Some("OpenMPI"))
                .extra_parameters()
                .contains_key("with_fabric")
        );
        assert!(registry.lookup(None, Some("zlib")).extra_parameters().is_empty());
        // explicit names never fall through to software-name derivation
        assert!(registry.lookup(Some("unknown"), Some("OpenMPI")).extra_parameters().is_empty());
    }

    #[test]
    fn test_declared_builder_roundtrip() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "plugins".to_string(),
            Value::List(vec![
                Value::List(vec![]),
                Value::Str("Plugins to bundle".into()),
                Value::Bool(false),
            ]),
        );
        let builder = DeclaredBuilder::from_value(&Value::Map(entries)).unwrap();
        assert!(!builder.extra_parameters()["plugins"].mandatory);
    }
}
