//! The registered license table.
//!
//! Recipes may declare the license their software is distributed under;
//! the validation engine checks the declared name against this table.
//! Lookups go by name, never by identity, so a recipe only needs to spell
//! the name of a registered license.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A known software license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    /// Canonical license name, as recipes spell it.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Whether sources under this license may be redistributed.
    pub distribute_source: bool,
}

impl License {
    fn new(name: &str, description: &str, distribute_source: bool) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            distribute_source,
        }
    }
}

/// The table of registered licenses.
pub struct LicenseRegistry {
    licenses: BTreeMap<String, License>,
}

impl Default for LicenseRegistry {
    fn default() -> Self {
        let mut registry = Self { licenses: BTreeMap::new() };
        for license in [
            License::new("Apache-2.0", "Apache License 2.0", true),
            License::new("BSD-3-Clause", "BSD 3-Clause License", true),
            License::new("GPL-2.0", "GNU General Public License v2", true),
            License::new("GPL-3.0", "GNU General Public License v3", true),
            License::new("LGPL-2.1", "GNU Lesser General Public License v2.1", true),
            License::new("MIT", "MIT License", true),
            License::new("Proprietary", "Proprietary, redistribution prohibited", false),
        ] {
            registry.register(license);
        }
        registry
    }
}

impl LicenseRegistry {
    /// Registers a license under its canonical name.
    pub fn register(&mut self, license: License) {
        self.licenses.insert(license.name.clone(), license);
    }

    /// Looks a license up by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&License> {
        self.licenses.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        let registry = LicenseRegistry::default();
        assert!(registry.lookup("GPL-3.0").is_some());
        assert!(registry.lookup("NotALicense").is_none());
    }

    #[test]
    fn test_register_custom_license() {
        let mut registry = LicenseRegistry::default();
        registry.register(License::new("SitePolicy-1.0", "Site-specific policy", false));
        assert!(!registry.lookup("SitePolicy-1.0").unwrap().distribute_source);
    }
}
