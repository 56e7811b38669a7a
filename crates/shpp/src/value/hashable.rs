//! Hashable wrapper for Value to enable use as map keys

use std::hash::{Hash, Hasher};

use crate::error::{ErrorKind, Result, RuntimeError};
use crate::value::Value;

/// A wrapper for [`Value`] that implements `Hash` and `Eq`.
///
/// Only immutable builtin kinds can be keys: null, bool, int, string,
/// and tuples of hashable values. Mutable containers and reals are
/// rejected with `INCOMPATIBLE_TYPE` at construction, so the `Hash`
/// impl never sees them.
#[derive(Debug, Clone, PartialEq)]
pub struct HashableValue(pub Value);

impl HashableValue {
    /// Wrap a value, rejecting unhashable kinds.
    pub fn try_new(value: Value) -> Result<Self> {
        if Self::is_hashable(&value) {
            Ok(Self(value))
        } else {
            Err(RuntimeError::new(
                ErrorKind::IncompatibleType,
                format!("type '{}' is not hashable", value.type_name()),
            ))
        }
    }

    /// Whether a value can serve as a map key.
    pub fn is_hashable(value: &Value) -> bool {
        match value {
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Str(_) => true,
            Value::Tuple(items) => items.iter().all(Self::is_hashable),
            _ => false,
        }
    }

    /// The wrapped value.
    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl Hash for HashableValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Null => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Int(n) => {
                2u8.hash(state);
                n.hash(state);
            }
            Value::Str(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Value::Tuple(items) => {
                4u8.hash(state);
                items.len().hash(state);
                for item in items.iter() {
                    // Construction guarantees every element is hashable.
                    HashableValue(item.clone()).hash(state);
                }
            }
            other => unreachable!("unhashable kind {:?} behind HashableValue", other.kind()),
        }
    }
}

impl Eq for HashableValue {}
