//! Dynamic value model for recipe parameters.
//!
//! The syntax parser hands over a mapping from parameter name to [`Value`].
//! Values stay in this dynamic form inside a recipe's parameter table; the
//! typed layers (dependency resolver, validation engine, naming service)
//! interpret them on demand. Tuples and lists are kept distinct so that the
//! template engine can rebuild the same sequence kind it recursed into, and
//! so that the dump serialization can render what was actually declared.

use std::collections::BTreeMap;
use std::fmt;

/// A structured dependency literal, as produced by syntax parsers that
/// support a dedicated dependency form (rather than a positional tuple or
/// an explicit mapping).
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyLiteral {
    /// Software name of the dependency.
    pub name: String,
    /// Version of the dependency.
    pub version: String,
    /// Optional version suffix.
    pub versionsuffix: Option<String>,
    /// Optional toolchain as a (name, version) pair.
    pub toolchain: Option<(String, String)>,
}

/// Dynamic representation of a recipe parameter value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Unset / no value.
    #[default]
    None,
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value; the only kind placeholders are substituted in.
    Str(String),
    /// Ordered, mutable sequence.
    List(Vec<Value>),
    /// Ordered, fixed-size sequence.
    Tuple(Vec<Value>),
    /// String-keyed mapping with deterministic iteration order.
    Map(BTreeMap<String, Value>),
    /// Structured dependency literal from the syntax parser.
    Dep(DependencyLiteral),
}

impl Value {
    /// Short human-readable name of the value's kind, for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "map",
            Value::Dep(_) => "dependency",
        }
    }

    /// Whether the value is unset.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// String contents, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Sequence elements, if this is a list or tuple.
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Mapping contents, if this is a map value.
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Whether a value is "set" in the sense the validation engine uses:
    /// not none, not an empty string, not an empty sequence.
    #[must_use]
    pub fn is_set(&self) -> bool {
        match self {
            Value::None => false,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            _ => true,
        }
    }
}

impl fmt::Display for Value {
    /// Renders the value the way the dump serialization does, which is also
    /// what error messages embed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) | Value::Tuple(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Value::Map(entries) => {
                let rendered: Vec<String> =
                    entries.iter().map(|(k, v)| format!("{k} = {v}")).collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Value::Dep(dep) => write!(f, "{}-{}", dep.name, dep.version),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_set_semantics() {
        assert!(!Value::None.is_set());
        assert!(!Value::Str(String::new()).is_set());
        assert!(!Value::List(vec![]).is_set());
        assert!(Value::Str("x".into()).is_set());
        assert!(Value::Bool(false).is_set());
        assert!(Value::Int(0).is_set());
    }

    #[test]
    fn test_display_nested() {
        let value = Value::List(vec![
            Value::Str("a".into()),
            Value::Tuple(vec![Value::Int(1), Value::Int(2)]),
        ]);
        assert_eq!(value.to_string(), "[a, [1, 2]]");
    }
}
