//! The configuration resolution pipeline.
//!
//! [`Pipeline`] ties the components together: it reads recipe source text,
//! splits it into blocks, runs each block through the normalization
//! pipeline of [`crate::recipe`], and wraps the results into per-block
//! summaries. It owns the injected collaborator services (syntax parser,
//! builder registry, license table, host probe, naming-scheme registry)
//! and the process-wide [`RecipeCache`].
//!
//! The naming service is constructed lazily on first use and is immutable
//! for the life of the pipeline; its selection cannot change afterwards.
//!
//! Resolution requests without build specs are cached by (source,
//! validate, hidden, parse-only); cache hits return deep copies, and at
//! most one resolution per key is in flight at a time. Resolution of one
//! recipe is one ordered sequence with no internal suspension points;
//! concurrency exists only across different sources.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::{debug, warn};

use crate::cache::{CacheKey, RecipeCache};
use crate::constants::RECIPE_EXTENSION;
use crate::core::{Result, Value};
use crate::dependency::{self, Dependency, Toolchain};
use crate::license::LicenseRegistry;
use crate::naming::{NamingService, RecipeLookup, SchemeRegistry};
use crate::osdeps::{HostProbe, SystemProbe};
use crate::parser::{RecipeParser, TomlRecipeParser};
use crate::recipe::Recipe;
use crate::builder::BuilderRegistry;

/// Policy knobs of a resolution pipeline.
///
/// This replaces ambient global configuration: the pipeline owns one
/// options value, injected at construction.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Allowed values for the `moduleclass` parameter; `None` means no
    /// constraint.
    pub valid_module_classes: Option<Vec<String>>,
    /// Allowed values for the `stop` parameter; `None` means no
    /// constraint.
    pub valid_stops: Option<Vec<String>>,
    /// Global validation policy; combined with each request's flag.
    pub validate: bool,
    /// Whether the validation engine probes the host for OS dependencies.
    pub check_osdeps: bool,
    /// Software names removed from every dependency list.
    pub filter_deps: Vec<String>,
    /// Default hidden-module flag for requests that don't specify one.
    pub hidden: bool,
    /// Roots searched by recipe-path discovery.
    pub search_roots: Vec<PathBuf>,
    /// When set, only the named blocks of a source are resolved.
    pub only_blocks: Option<Vec<String>>,
    /// Name of the module naming scheme to use.
    pub naming_scheme: String,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        let classes = [
            "base", "bio", "chem", "compiler", "data", "debugger", "devel", "lang", "lib",
            "math", "mpi", "numlib", "perf", "phys", "system", "toolchain", "tools", "vis",
        ];
        let stops = [
            "fetch", "source", "patch", "prepare", "configure", "build", "test", "install",
            "sanitycheck", "cleanup", "module",
        ];
        Self {
            valid_module_classes: Some(classes.iter().map(ToString::to_string).collect()),
            valid_stops: Some(stops.iter().map(ToString::to_string).collect()),
            validate: true,
            check_osdeps: true,
            filter_deps: Vec::new(),
            hidden: false,
            search_roots: Vec::new(),
            only_blocks: None,
            naming_scheme: "flat".to_string(),
        }
    }
}

/// A recipe source: a file on disk or literal text.
#[derive(Debug, Clone)]
pub enum RecipeSource {
    /// Read the source from a file.
    Path(PathBuf),
    /// Use the given text directly.
    Literal(String),
}

impl RecipeSource {
    fn location(&self) -> String {
        match self {
            RecipeSource::Path(path) => path.display().to_string(),
            RecipeSource::Literal(_) => "<raw recipe text>".to_string(),
        }
    }

    fn cache_source(&self) -> String {
        match self {
            RecipeSource::Path(path) => format!("path:{}", path.display()),
            RecipeSource::Literal(text) => format!("literal:{text}"),
        }
    }

    fn path(&self) -> Option<&Path> {
        match self {
            RecipeSource::Path(path) => Some(path),
            RecipeSource::Literal(_) => None,
        }
    }
}

/// Per-block summary of one resolution.
#[derive(Debug, Clone)]
pub struct ResolvedRecipe {
    /// The resolved recipe.
    pub recipe: Recipe,
    /// Path of the block's source file, when resolved from disk.
    pub spec: Option<PathBuf>,
    /// Source path of the multi-block file this block came from, set only
    /// when the source contained more than one block.
    pub original_spec: Option<PathBuf>,
    /// Block name, for named blocks.
    pub block: Option<String>,
    /// The recipe's short module name.
    pub short_mod_name: String,
    /// The recipe's full module name.
    pub full_mod_name: String,
    /// All dependencies after filtering, including the toolchain.
    pub dependencies: Vec<Dependency>,
    /// The build dependencies.
    pub build_dependencies: Vec<Dependency>,
    /// The hidden dependencies.
    pub hidden_dependencies: Vec<Dependency>,
    /// Whether the module is installed hidden.
    pub hidden: bool,
}

/// The resolution pipeline and its injected services.
pub struct Pipeline {
    options: ResolveOptions,
    parser: Arc<dyn RecipeParser>,
    builders: BuilderRegistry,
    licenses: LicenseRegistry,
    probe: Arc<dyn HostProbe>,
    schemes: SchemeRegistry,
    naming: OnceLock<Arc<NamingService>>,
    naming_init: Mutex<()>,
    cache: RecipeCache,
}

impl Pipeline {
    /// Creates a pipeline with default collaborators (TOML parser, system
    /// probe, empty builder registry, built-in licenses and schemes).
    #[must_use]
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            options,
            parser: Arc::new(TomlRecipeParser),
            builders: BuilderRegistry::default(),
            licenses: LicenseRegistry::default(),
            probe: Arc::new(SystemProbe::default()),
            schemes: SchemeRegistry::default(),
            naming: OnceLock::new(),
            naming_init: Mutex::new(()),
            cache: RecipeCache::new(),
        }
    }

    /// Replaces the syntax parser.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn RecipeParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Replaces the builder registry.
    #[must_use]
    pub fn with_builders(mut self, builders: BuilderRegistry) -> Self {
        self.builders = builders;
        self
    }

    /// Replaces the license table.
    #[must_use]
    pub fn with_licenses(mut self, licenses: LicenseRegistry) -> Self {
        self.licenses = licenses;
        self
    }

    /// Replaces the host probe.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn HostProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Replaces the naming-scheme registry.
    #[must_use]
    pub fn with_schemes(mut self, schemes: SchemeRegistry) -> Self {
        self.schemes = schemes;
        self
    }

    /// The pipeline's policy options.
    #[must_use]
    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// The syntax parser.
    #[must_use]
    pub fn parser(&self) -> &dyn RecipeParser {
        self.parser.as_ref()
    }

    /// The builder registry.
    #[must_use]
    pub fn builders(&self) -> &BuilderRegistry {
        &self.builders
    }

    /// The license table.
    #[must_use]
    pub fn licenses(&self) -> &LicenseRegistry {
        &self.licenses
    }

    /// The host probe.
    #[must_use]
    pub fn probe(&self) -> &dyn HostProbe {
        self.probe.as_ref()
    }

    /// The cache service.
    #[must_use]
    pub fn cache(&self) -> &RecipeCache {
        &self.cache
    }

    /// The active naming service, constructed on first use.
    ///
    /// Concurrent first use constructs at most one instance; selecting an
    /// unknown scheme fails with the list of known candidates.
    pub fn naming(&self) -> Result<Arc<NamingService>> {
        if let Some(service) = self.naming.get() {
            return Ok(Arc::clone(service));
        }
        // double-checked: losers of the init race observe the winner's
        // instance instead of constructing their own
        let _init = self.naming_init.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(service) = self.naming.get() {
            return Ok(Arc::clone(service));
        }
        let service = Arc::new(NamingService::new(&self.options.naming_scheme, &self.schemes)?);
        let _ = self.naming.set(Arc::clone(&service));
        Ok(service)
    }

    /// Resolves a recipe source into per-block summaries.
    ///
    /// `validate` is combined with the global validation policy; `hidden`
    /// falls back to the configured default. With `parse_only` set, the
    /// summaries carry no dependency/module-name detail. Requests without
    /// build specs are served from (and stored into) the cache.
    pub fn resolve(
        &self,
        source: &RecipeSource,
        build_specs: Option<&BTreeMap<String, Value>>,
        validate: bool,
        hidden: Option<bool>,
        parse_only: bool,
    ) -> Result<Vec<ResolvedRecipe>> {
        let hidden = hidden.unwrap_or(self.options.hidden);

        // build specs can't be part of a cache key, so those requests
        // bypass the cache entirely
        if build_specs.is_some() {
            return self.resolve_uncached(source, build_specs, validate, hidden, parse_only);
        }

        let key = CacheKey {
            source: source.cache_source(),
            validate,
            hidden,
            parse_only,
        };
        if let Some(hit) = self.cache.get_recipes(&key) {
            return Ok(hit);
        }

        let lock = self.cache.flight_lock(&key);
        let _guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(hit) = self.cache.get_recipes(&key) {
            return Ok(hit);
        }
        let resolved = self.resolve_uncached(source, None, validate, hidden, parse_only)?;
        self.cache.insert_recipes(key, resolved.clone());
        Ok(resolved)
    }

    fn resolve_uncached(
        &self,
        source: &RecipeSource,
        build_specs: Option<&BTreeMap<String, Value>>,
        validate: bool,
        hidden: bool,
        parse_only: bool,
    ) -> Result<Vec<ResolvedRecipe>> {
        let location = source.location();
        let text = match source {
            RecipeSource::Path(path) => std::fs::read_to_string(path)?,
            RecipeSource::Literal(text) => text.clone(),
        };

        let blocks =
            self.parser.split_blocks(&text, self.options.only_blocks.as_deref(), &location)?;
        let multi_block = blocks.len() > 1;

        let mut resolved = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let recipe = Recipe::from_block(
                self,
                block,
                source.path(),
                build_specs,
                None,
                validate,
                hidden,
            )?;

            let mut summary = ResolvedRecipe {
                spec: source.path().map(Path::to_path_buf),
                original_spec: None,
                block: block.name.clone(),
                short_mod_name: String::new(),
                full_mod_name: String::new(),
                dependencies: Vec::new(),
                build_dependencies: Vec::new(),
                hidden_dependencies: Vec::new(),
                hidden,
                recipe,
            };

            if !parse_only {
                summary.short_mod_name = summary.recipe.short_module_name().to_string();
                summary.full_mod_name = summary.recipe.full_module_name().to_string();
                summary.build_dependencies = summary.recipe.build_dependencies().to_vec();
                summary.hidden_dependencies = summary.recipe.hidden_dependencies().to_vec();
                summary.dependencies = summary.recipe.dependencies();
                if multi_block {
                    summary.original_spec = source.path().map(Path::to_path_buf);
                }

                // the toolchain is a dependency too, unless it is the
                // system sentinel
                let toolchain = summary.recipe.toolchain().clone();
                if !toolchain.is_system() {
                    debug!(
                        "adding toolchain {}-{} as dependency for {}",
                        toolchain.name,
                        toolchain.version,
                        summary.recipe.name()
                    );
                    summary.dependencies.push(self.toolchain_dependency(&toolchain)?);
                }
            }

            resolved.push(summary);
        }

        Ok(resolved)
    }

    /// Builds the dependency record representing a recipe's toolchain.
    fn toolchain_dependency(&self, toolchain: &Toolchain) -> Result<Dependency> {
        let declaration = Value::Tuple(vec![
            Value::Str(toolchain.name.clone()),
            Value::Str(toolchain.version.clone()),
            Value::Str(String::new()),
            Value::Bool(true),
        ]);
        dependency::parse(&declaration, &Toolchain::system(), false, &*self.naming()?, self)
    }

    /// Discovers the recipe file for a (software name, full version)
    /// pair on the configured search roots.
    ///
    /// Candidate paths are generated deterministically per root (see
    /// [`candidate_paths`]); the first existing regular file wins and is
    /// cached. A miss is an answer, not an error.
    #[must_use]
    pub fn discover_path(&self, name: &str, version: &str) -> Option<PathBuf> {
        if let Some(cached) = self.cache.get_path(name, version) {
            return Some(cached);
        }
        for root in &self.options.search_roots {
            for candidate in candidate_paths(root, name, version) {
                debug!("checking recipe path {}", candidate.display());
                if candidate.is_file() {
                    debug!("found recipe for {name} {version} at {}", candidate.display());
                    self.cache.insert_path(name, version, candidate.clone());
                    return Some(candidate);
                }
            }
        }
        None
    }
}

impl RecipeLookup for Pipeline {
    /// Resolves a fully parsed recipe for naming-scheme escalation, via
    /// path discovery and a parse-only resolution.
    fn find_recipe(&self, name: &str, version: &str) -> Result<Option<Recipe>> {
        let Some(path) = self.discover_path(name, version) else {
            return Ok(None);
        };
        let mut resolved =
            self.resolve(&RecipeSource::Path(path), None, true, None, true)?;
        if resolved.len() > 1 {
            warn!("more than one parsed recipe obtained for {name}-{version}, only retaining first");
        }
        Ok(resolved.drain(..).next().map(|summary| summary.recipe))
    }
}

/// The candidate locations of a recipe file under one search root, in
/// resolution order.
#[must_use]
pub fn candidate_paths(root: &Path, name: &str, version: &str) -> Vec<PathBuf> {
    let first_letter = name
        .chars()
        .next()
        .map(|c| c.to_lowercase().to_string())
        .unwrap_or_default();
    vec![
        root.join(name).join(format!("{version}.{RECIPE_EXTENSION}")),
        root.join(name).join(format!("{name}-{version}.{RECIPE_EXTENSION}")),
        root.join(first_letter).join(name).join(format!("{name}-{version}.{RECIPE_EXTENSION}")),
        root.join(format!("{name}-{version}.{RECIPE_EXTENSION}")),
    ]
}

/// Convenience entry point: resolves a source with a fresh default
/// pipeline.
pub fn resolve_configuration(
    source: &RecipeSource,
    build_specs: Option<&BTreeMap<String, Value>>,
    validate: bool,
    hidden: Option<bool>,
) -> Result<Vec<ResolvedRecipe>> {
    Pipeline::new(ResolveOptions::default()).resolve(source, build_specs, validate, hidden, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ForgeError;

    #[test]
    fn test_candidate_paths_order() {
        let paths = candidate_paths(Path::new("/cfg"), "Foo", "1.2");
        let rendered: Vec<String> =
            paths.iter().map(|p| p.display().to_string()).collect();
        assert_eq!(rendered, vec![
            "/cfg/Foo/1.2.mf",
            "/cfg/Foo/Foo-1.2.mf",
            "/cfg/f/Foo/Foo-1.2.mf",
            "/cfg/Foo-1.2.mf",
        ]);
    }

    #[test]
    fn test_naming_service_is_constructed_once() {
        let pipeline = Pipeline::new(ResolveOptions::default());
        let first = pipeline.naming().unwrap();
        let second = pipeline.naming().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unknown_scheme_fails_lazily() {
        let pipeline = Pipeline::new(ResolveOptions {
            naming_scheme: "bogus".to_string(),
            ..ResolveOptions::default()
        });
        assert!(matches!(
            pipeline.naming().unwrap_err(),
            ForgeError::UnknownNamingScheme { .. }
        ));
    }
}
