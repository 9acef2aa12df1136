//! The naming strategies shipped with modforge.
//!
//! `flat` mirrors the classic one-level layout: every module lives at the
//! top of the module tree under `name/full-version`, with the toolchain
//! encoded in the version. `hierarchical` moves the toolchain into the
//! module subdirectory, keeps versions bare, and relies on modulepath
//! extensions to make dependent subtrees visible.

use super::{NamingScheme, NamingTarget};

/// One-level naming: full = short = `name/full-version`.
pub struct FlatScheme;

impl NamingScheme for FlatScheme {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        &["name", "version", "versionsuffix", "toolchain"]
    }

    fn full_module_name(&self, target: &NamingTarget<'_>) -> String {
        format!("{}/{}", target.name, target.full_version())
    }

    fn short_module_name(&self, target: &NamingTarget<'_>) -> String {
        self.full_module_name(target)
    }

    fn symlink_paths(&self, target: &NamingTarget<'_>) -> Vec<String> {
        let mut paths = vec!["all".to_string()];
        if let Some(moduleclass) = &target.moduleclass {
            if !moduleclass.is_empty() {
                paths.push(moduleclass.clone());
            }
        }
        paths
    }
}

/// Toolchain-in-subdirectory naming.
///
/// Modules built with the system toolchain live under `Core`; everything
/// else lives under `Compiler/<toolchain-name>/<toolchain-version>`. The
/// module class decides whether a module extends the modulepath (compilers
/// and MPI stacks open up their own subtree). Symlink paths and modpath
/// extensions consult the module class, so this scheme always works from a
/// fully parsed recipe.
pub struct HierarchicalScheme;

/// Subdirectory for modules built with the system toolchain.
const CORE_SUBDIR: &str = "Core";

impl NamingScheme for HierarchicalScheme {
    fn name(&self) -> &'static str {
        "hierarchical"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        &["name", "version", "versionsuffix", "toolchain", "moduleclass"]
    }

    fn requires_full_recipe(&self) -> bool {
        true
    }

    fn full_module_name(&self, target: &NamingTarget<'_>) -> String {
        format!("{}/{}", self.module_subdir(target), self.short_module_name(target))
    }

    fn short_module_name(&self, target: &NamingTarget<'_>) -> String {
        format!("{}/{}", target.name, target.bare_version())
    }

    fn module_subdir(&self, target: &NamingTarget<'_>) -> String {
        if target.toolchain.is_system() {
            CORE_SUBDIR.to_string()
        } else {
            format!("Compiler/{}/{}", target.toolchain.name, target.toolchain.version)
        }
    }

    fn modpath_extensions(&self, target: &NamingTarget<'_>) -> Vec<String> {
        match target.moduleclass.as_deref() {
            Some("compiler") => {
                vec![format!("Compiler/{}/{}", target.name, target.version)]
            }
            Some("mpi") => {
                vec![format!("MPI/{}/{}", target.name, target.version)]
            }
            _ => Vec::new(),
        }
    }

    fn init_module_paths(&self) -> Vec<String> {
        vec![CORE_SUBDIR.to_string()]
    }

    fn expand_toolchain_load(&self) -> bool {
        true
    }
}
