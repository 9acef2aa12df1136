//! Recipe loading, normalization, and keyed access.
//!
//! A [`Recipe`] is one resolved build specification: a parameter table
//! seeded from the schema (plus builder-supplied extras), overlaid with
//! the raw mapping the syntax parser extracted from source text, with its
//! dependency lists normalized into [`Dependency`] records and its module
//! identity computed by the active naming scheme.
//!
//! # Normalization pipeline
//!
//! Resolution of one recipe runs as a single ordered sequence:
//!
//! 1. obtain the raw mapping from the syntax parser, seeded with build
//!    specs;
//! 2. check the mandatory set (schema-mandatory plus extras flagged
//!    mandatory), reporting *all* missing keys at once;
//! 3. report unknown keys that closely match a known parameter as likely
//!    typos, again all at once;
//! 4. store known keys, routing the dependency-list parameters through the
//!    dependency resolver; replaced keys always fail; other unknown keys
//!    are ignored;
//! 5. generate the template context (twice, see [`crate::template`]);
//! 6. validate, when both the global policy and the per-call flag ask for
//!    it;
//! 7. reconcile hidden dependencies against the plain dependency list;
//! 8. compute the module identity.
//!
//! A failed resolution never yields a partially-built recipe.
//!
//! # Raw versus templated access
//!
//! Reads normally pass through the template engine: [`Recipe::value`]
//! returns the templated view. Callers that need to edit nested structure
//! in place read via [`Recipe::raw_value`] instead; writes always store
//! the raw form. These are two distinct operations, not a toggle on
//! shared state.
//!
//! Every keyed accessor applies the deprecation/replacement policy first:
//! deprecated names are rewritten (with a warning) and replaced names
//! fail, uniformly across get, set, contains, and update.

mod dump;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::constants::MANDATORY_PARAMETERS;
use crate::core::{ForgeError, Result, Value};
use crate::dependency::{self, Dependency, Toolchain};
use crate::naming::{ModuleIdentity, NamingTarget, RecipeLookup};
use crate::parser::RecipeBlock;
use crate::pipeline::Pipeline;
use crate::schema::{self, ExtraParameter, ParameterCategory, ParameterEntry};
use crate::template::{self, TemplateSeed};
use crate::validate;

/// One resolved build specification.
#[derive(Debug, Clone)]
pub struct Recipe {
    path: Option<PathBuf>,
    rawtxt: String,
    table: BTreeMap<String, ParameterEntry>,
    mandatory: Vec<String>,
    toolchain: Toolchain,
    validation: bool,
    hidden: bool,
    template_context: BTreeMap<String, String>,
    deps: Vec<Dependency>,
    build_deps: Vec<Dependency>,
    hidden_deps: Vec<Dependency>,
    filter_deps: Vec<String>,
    identity: ModuleIdentity,
}

impl Recipe {
    /// Resolves one source block into a recipe.
    ///
    /// `extras` overrides the builder-supplied extra parameters; when
    /// absent they are derived by looking up a builder for the block's
    /// declared builder name or software name. `validate` is combined
    /// with the pipeline's global validation policy.
    pub fn from_block(
        pipeline: &Pipeline,
        block: &RecipeBlock,
        path: Option<&Path>,
        build_specs: Option<&BTreeMap<String, Value>>,
        extras: Option<BTreeMap<String, ExtraParameter>>,
        validate: bool,
        hidden: bool,
    ) -> Result<Self> {
        let location = path.map_or_else(|| "<raw recipe text>".to_string(), |p| p.display().to_string());
        info!("parsing recipe {location}");

        let empty_specs = BTreeMap::new();
        let raw = pipeline
            .parser()
            .parse(&block.text, build_specs.unwrap_or(&empty_specs))
            .map_err(|err| ForgeError::ParseError {
                location: location.clone(),
                reason: format!("{err:#}"),
            })?;

        // builder extras, unless the caller supplied them
        let extras = match extras {
            Some(extras) => extras,
            None => {
                let fetched = pipeline.parser().fetch(&block.text, &["easyblock", "name"]);
                let builder =
                    pipeline.builders().lookup(fetched[0].as_deref(), fetched[1].as_deref());
                builder.extra_parameters()
            }
        };

        let table = schema::merge(&extras);
        let mut mandatory: Vec<String> =
            MANDATORY_PARAMETERS.iter().map(ToString::to_string).collect();
        for (name, extra) in &extras {
            if extra.mandatory {
                mandatory.push(name.clone());
            }
        }

        let missing: Vec<String> =
            mandatory.iter().filter(|key| !raw.contains_key(*key)).cloned().collect();
        if !missing.is_empty() {
            return Err(ForgeError::MissingMandatoryParameters { location, keys: missing });
        }

        let typos = suggest_typos(&raw, &table);
        if !typos.is_empty() {
            return Err(ForgeError::ParameterTypos { typos });
        }

        let toolchain = Toolchain::from_value(&raw["toolchain"])?;

        let mut recipe = Self {
            path: path.map(Path::to_path_buf),
            rawtxt: block.text.clone(),
            table,
            mandatory,
            toolchain,
            validation: false,
            hidden,
            template_context: BTreeMap::new(),
            deps: Vec::new(),
            build_deps: Vec::new(),
            hidden_deps: Vec::new(),
            filter_deps: pipeline.options().filter_deps.clone(),
            identity: ModuleIdentity::default(),
        };

        // store known keys; replaced keys always fail, other unknown keys
        // are ignored
        for (key, value) in &raw {
            let key = schema::intercept(key)?;
            if let Some(entry) = recipe.table.get_mut(key) {
                entry.value = value.clone();
                debug!("setting recipe parameter {key}: {value}");
            } else {
                debug!("ignoring unknown recipe parameter {key} (value: {value})");
            }
        }

        recipe.regenerate_template_context();

        let naming = pipeline.naming()?;
        recipe.resolve_dependencies(&*naming, pipeline)?;

        recipe.table.insert("parsed".to_string(), ParameterEntry {
            value: Value::Bool(true),
            doc: "this is a parsed recipe".to_string(),
            category: ParameterCategory::Hidden,
        });

        recipe.validation = pipeline.options().validate && validate;
        if recipe.validation {
            validate::validate(
                &recipe,
                pipeline.options(),
                pipeline.licenses(),
                pipeline.probe(),
            )?;
        }

        recipe.filter_hidden_deps(&*naming, pipeline)?;

        recipe.identity = ModuleIdentity {
            full: naming.full_module_name(&NamingTarget::from_recipe(&recipe), pipeline, false)?,
            short: naming.short_module_name(&NamingTarget::from_recipe(&recipe), pipeline)?,
            subdir: naming.module_subdir(&NamingTarget::from_recipe(&recipe), pipeline)?,
            hidden,
        };

        Ok(recipe)
    }

    /// Normalizes the three dependency-list parameters into records.
    ///
    /// Declarations are templated before parsing, so placeholder-bearing
    /// versions and suffixes resolve against this recipe's own fields.
    fn resolve_dependencies(
        &mut self,
        naming: &crate::naming::NamingService,
        lookup: &dyn RecipeLookup,
    ) -> Result<()> {
        for (param, hidden) in
            [("dependencies", false), ("builddependencies", false), ("hiddendependencies", true)]
        {
            let declared = template::resolve(&self.table[param].value, &self.template_context);
            let elements = declared.as_sequence().map(<[Value]>::to_vec).unwrap_or_default();
            let mut records = Vec::with_capacity(elements.len());
            for element in &elements {
                records.push(dependency::parse(element, &self.toolchain, hidden, naming, lookup)?);
            }
            match param {
                "dependencies" => self.deps = records,
                "builddependencies" => self.build_deps = records,
                _ => self.hidden_deps = records,
            }
        }
        Ok(())
    }

    /// Reconciles hidden dependencies against the plain dependency list.
    ///
    /// A hidden dependency supersedes the plain declaration with the same
    /// visible full module name; one without a matching plain declaration
    /// is always an error.
    fn filter_hidden_deps(
        &mut self,
        naming: &crate::naming::NamingService,
        lookup: &dyn RecipeLookup,
    ) -> Result<()> {
        let dep_mod_names: Vec<String> =
            self.deps.iter().map(|dep| dep.full_mod_name.clone()).collect();

        let mut faulty = Vec::new();
        for hidden_dep in &self.hidden_deps {
            let visible =
                naming.full_module_name(&NamingTarget::from_dependency(hidden_dep), lookup, true)?;
            if dep_mod_names.contains(&visible) {
                self.deps.retain(|dep| dep.full_mod_name != visible);
                debug!("removed dependency matching hidden dependency {visible}");
            } else {
                warn!("hidden dependency {visible} not in list of dependencies");
                faulty.push(visible);
            }
        }

        if faulty.is_empty() {
            Ok(())
        } else {
            Err(ForgeError::UnreconciledHiddenDependencies {
                missing: faulty,
                dependencies: dep_mod_names,
            })
        }
    }

    /// Regenerates the memoized template context from the current
    /// parameter values.
    ///
    /// Runs the derivation twice, first suppressing the
    /// all-lowercase-derivable shortcut entries, so they cannot shadow
    /// richer values; the later pass wins on conflicts.
    pub fn regenerate_template_context(&mut self) {
        let seed = TemplateSeed {
            name: self.raw_string("name"),
            version: self.raw_string("version"),
            versionprefix: self.raw_string("versionprefix"),
            versionsuffix: self.raw_string("versionsuffix"),
            toolchain: Some(self.toolchain.clone()),
        };
        let mut context = template::build_context(&seed, true);
        context.extend(template::build_context(&seed, false));
        self.template_context = context;
    }

    fn raw_string(&self, key: &str) -> String {
        self.table.get(key).and_then(|e| e.value.as_str()).unwrap_or_default().to_string()
    }

    /// The templated value of a parameter.
    pub fn value(&self, key: &str) -> Result<Value> {
        let raw = self.raw_value(key)?;
        Ok(template::resolve(raw, &self.template_context))
    }

    /// The raw (untemplated) value of a parameter, for in-place
    /// structural edits.
    pub fn raw_value(&self, key: &str) -> Result<&Value> {
        let key = schema::intercept(key)?;
        self.table
            .get(key)
            .map(|entry| &entry.value)
            .ok_or_else(|| ForgeError::UnknownParameter { name: key.to_string() })
    }

    /// Sets a parameter value (documentation and category are left
    /// untouched). The value is stored raw.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let key = schema::intercept(key)?;
        match self.table.get_mut(key) {
            Some(entry) => {
                entry.value = value;
                Ok(())
            }
            None => Err(ForgeError::UnknownParameter { name: key.to_string() }),
        }
    }

    /// Whether a parameter is defined.
    pub fn contains(&self, key: &str) -> Result<bool> {
        let key = schema::intercept(key)?;
        Ok(self.table.contains_key(key))
    }

    /// Appends to a string parameter (space-separated) or extends a list
    /// parameter.
    pub fn update(&mut self, key: &str, value: &Value) -> Result<()> {
        let previous = self.raw_value(key)?.clone();
        let updated = match (&previous, value) {
            (Value::Str(old), addition) => {
                let addition = match addition {
                    Value::Str(s) => s.clone(),
                    other => other.to_string(),
                };
                if old.is_empty() {
                    Value::Str(addition)
                } else {
                    Value::Str(format!("{old} {addition}"))
                }
            }
            (Value::List(old), Value::List(new)) => {
                let mut items = old.clone();
                items.extend(new.iter().cloned());
                Value::List(items)
            }
            (Value::List(old), single) => {
                let mut items = old.clone();
                items.push(single.clone());
                Value::List(items)
            }
            _ => return Err(ForgeError::InvalidUpdate { name: key.to_string() }),
        };
        self.set(key, updated)
    }

    /// Software name.
    #[must_use]
    pub fn name(&self) -> String {
        self.string_value("name")
    }

    /// Software version.
    #[must_use]
    pub fn version(&self) -> String {
        self.string_value("version")
    }

    /// Templated string value of a parameter, empty when unset or not a
    /// string.
    #[must_use]
    pub fn string_value(&self, key: &str) -> String {
        self.value(key)
            .ok()
            .and_then(|value| value.as_str().map(ToString::to_string))
            .unwrap_or_default()
    }

    /// The recipe's toolchain.
    #[must_use]
    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// The recipe's full effective version.
    #[must_use]
    pub fn full_version(&self) -> String {
        dependency::full_version(
            &self.string_value("versionprefix"),
            &self.version(),
            &self.string_value("versionsuffix"),
            &self.toolchain,
        )
    }

    /// Whether the generated module is installed hidden.
    #[must_use]
    pub fn hidden(&self) -> bool {
        self.hidden
    }

    /// Whether validation ran for this recipe.
    #[must_use]
    pub fn validated(&self) -> bool {
        self.validation
    }

    /// Source path, when the recipe came from a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The raw source text this recipe was resolved from.
    #[must_use]
    pub fn raw_text(&self) -> &str {
        &self.rawtxt
    }

    /// The mandatory parameter set (schema plus builder extras).
    #[must_use]
    pub fn mandatory(&self) -> &[String] {
        &self.mandatory
    }

    /// The memoized template context.
    #[must_use]
    pub fn template_context(&self) -> &BTreeMap<String, String> {
        &self.template_context
    }

    /// The recipe's module identity.
    #[must_use]
    pub fn full_module_name(&self) -> &str {
        &self.identity.full
    }

    /// The recipe's short module name.
    #[must_use]
    pub fn short_module_name(&self) -> &str {
        &self.identity.short
    }

    /// The recipe's module subdirectory.
    #[must_use]
    pub fn module_subdir(&self) -> &str {
        &self.identity.subdir
    }

    /// All dependencies (plain, build, hidden) after the global filter.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.filtered_dependencies().0
    }

    /// All dependencies plus the number of entries the global filter
    /// removed.
    #[must_use]
    pub fn filtered_dependencies(&self) -> (Vec<Dependency>, usize) {
        let mut all = self.deps.clone();
        all.extend(self.build_deps.iter().cloned());
        all.extend(self.hidden_deps.iter().cloned());
        dependency::filter_dependencies(all, &self.filter_deps)
    }

    /// The parsed build dependencies.
    #[must_use]
    pub fn build_dependencies(&self) -> &[Dependency] {
        &self.build_deps
    }

    /// The parsed hidden dependencies.
    #[must_use]
    pub fn hidden_dependencies(&self) -> &[Dependency] {
        &self.hidden_deps
    }

    /// Environment-variable assignments for the allowed system
    /// dependencies, for the build step to apply.
    ///
    /// Each `(name, version)` pair in `allow_system_deps` yields a root
    /// variable (set to the software name) and a version variable.
    pub fn system_dep_env_vars(&self) -> Result<Vec<(String, String)>> {
        let declared = self.value("allow_system_deps")?;
        let mut vars = Vec::new();
        for pair in declared.as_sequence().unwrap_or_default() {
            let Some(items) = pair.as_sequence() else { continue };
            if let [Value::Str(name), Value::Str(version)] = items {
                let suffix = env_var_suffix(name);
                vars.push((format!("MF_ROOT_{suffix}"), name.clone()));
                vars.push((format!("MF_VERSION_{suffix}"), version.clone()));
            }
        }
        Ok(vars)
    }
}

/// Uppercased environment-variable suffix for a software name.
fn env_var_suffix(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Unknown raw keys that closely match a known parameter name.
fn suggest_typos(
    raw: &BTreeMap<String, Value>,
    table: &BTreeMap<String, ParameterEntry>,
) -> Vec<(String, String)> {
    let mut typos = Vec::new();
    for key in raw.keys() {
        if table.contains_key(key) {
            continue;
        }
        let lowered = key.to_lowercase();
        let best = table
            .keys()
            .map(|known| (known, strsim::normalized_levenshtein(&lowered, known)))
            .filter(|(_, score)| *score >= crate::constants::TYPO_SIMILARITY_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((suggestion, _)) = best {
            typos.push((key.clone(), suggestion.clone()));
        }
    }
    typos
}
