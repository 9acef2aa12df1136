//! modforge - configuration resolution for HPC build orchestration
//!
//! modforge is the configuration-resolution core of an HPC software build
//! orchestrator. It loads a declarative build specification (a "recipe"),
//! normalizes it against a versioned parameter schema, resolves its
//! dependency graph (including toolchain inheritance and hidden-dependency
//! reconciliation), expands template placeholders, validates invariants,
//! and computes a canonical module identity for the resulting artifact via
//! a pluggable naming strategy.
//!
//! # Architecture Overview
//!
//! Resolution of one recipe is a single ordered sequence:
//!
//! - the syntax parser (an injected collaborator) turns source text into a
//!   raw name-to-value mapping, seeded with build-spec overrides;
//! - the parameter schema seeds defaults and enforces the mandatory set,
//!   typo detection, and the deprecation/replacement policy;
//! - dependency-shaped values are normalized into canonical records, with
//!   toolchain inheritance applied;
//! - the template engine expands `%(name)s`-style placeholders from a
//!   context derived from the recipe's own fields;
//! - the validation engine checks enumerated values, OS dependencies,
//!   iterate-option consistency, and license well-formedness;
//! - the module naming scheme service assigns the recipe (and each
//!   dependency record) its module identity.
//!
//! The pipeline wraps all of this for repeated lookups behind a
//! process-wide cache with single-flight semantics per cache key.
//!
//! # Core Modules
//!
//! - [`core`] - error types and the dynamic parameter-value model
//! - [`schema`] - the recipe parameter schema and lifecycle tables
//! - [`recipe`] - recipe normalization, keyed access, and dump form
//! - [`dependency`] - dependency records and toolchain resolution
//! - [`template`] - placeholder expansion
//! - [`validate`] - the validation engine
//! - [`naming`] - pluggable module naming schemes
//! - [`pipeline`] - the orchestrating resolution pipeline and discovery
//! - [`cache`] - process-wide recipe and path caches
//!
//! # Collaborator Seams
//!
//! - [`parser`] - raw-syntax parsing (default: TOML surface syntax)
//! - [`builder`] - the registry of per-software build implementations
//! - [`license`] - the registered license table
//! - [`osdeps`] - host probing for OS-level dependencies
//!
//! # Example
//!
//! ```rust,no_run
//! use modforge::pipeline::{Pipeline, RecipeSource, ResolveOptions};
//!
//! # fn example() -> modforge::core::Result<()> {
//! let pipeline = Pipeline::new(ResolveOptions::default());
//! let resolved = pipeline.resolve(
//!     &RecipeSource::Path("recipes/z/zlib/zlib-1.2.8.mf".into()),
//!     None,
//!     true,
//!     None,
//!     false,
//! )?;
//! for summary in &resolved {
//!     println!("{} -> {}", summary.recipe.name(), summary.full_mod_name);
//! }
//! # Ok(())
//! # }
//! ```

// Core functionality modules
pub mod cache;
pub mod constants;
pub mod core;
pub mod pipeline;
pub mod recipe;

// Resolution components
pub mod dependency;
pub mod naming;
pub mod schema;
pub mod template;
pub mod validate;

// Collaborator seams
pub mod builder;
pub mod license;
pub mod osdeps;
pub mod parser;
