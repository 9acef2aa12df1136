//! Core types and functionality for modforge.
//!
//! This module forms the foundation of modforge's type system. It provides
//! the strongly-typed error enumeration used by every component of the
//! resolution pipeline, and the dynamic [`Value`] model that recipe
//! parameters are stored as between the syntax parser and the typed layers
//! above it.
//!
//! # Error Management
//!
//! modforge uses a single enumerated error type, [`ForgeError`], so that
//! callers can match precisely on failure modes (missing mandatory
//! parameters, unreconciled hidden dependencies, invalid module names, ...)
//! instead of string-matching error messages. Validation-category errors
//! carry *all* offending items of their step, not just the first one found.
//!
//! # Value Model
//!
//! Recipe parameters are heterogeneous: strings, booleans, integers, lists,
//! tuples, and nested mappings all occur in real recipes. [`Value`] is the
//! common representation handed over by the syntax parser and consumed by
//! the template engine, the dependency resolver, and the validation engine.

pub mod error;
pub mod value;

pub use error::{ForgeError, Result};
pub use value::{DependencyLiteral, Value};
