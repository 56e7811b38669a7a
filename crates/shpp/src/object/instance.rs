//! Declared-class instances

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::error::{ErrorKind, Result, RuntimeError};
use crate::object::TypeDesc;
use crate::value::{BoundMethod, Value};

/// An instance of a user-declared class.
///
/// Holds its class descriptor, a per-instance attribute table, and a
/// weak handle to itself. The weak handle seeds bound methods, so a
/// method value never keeps its owner alive.
pub struct Instance {
    class: Rc<TypeDesc>,
    attrs: RefCell<IndexMap<String, Value>>,
    self_ref: Weak<Instance>,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OBJECT({})", self.class.name())
    }
}

impl Instance {
    /// Allocate an instance of `class` with an empty attribute table.
    pub fn new(class: Rc<TypeDesc>) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            class,
            attrs: RefCell::new(IndexMap::new()),
            self_ref: self_ref.clone(),
        })
    }

    /// The class descriptor.
    pub fn class(&self) -> &Rc<TypeDesc> {
        &self.class
    }

    /// The class name, for messages and printing.
    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    /// The weak self handle bound methods carry.
    pub fn self_handle(&self) -> Weak<Instance> {
        self.self_ref.clone()
    }

    fn bind(&self, func: Rc<crate::value::FunctionValue>) -> Value {
        Value::Bound(Rc::new(BoundMethod {
            func,
            receiver: self.self_handle(),
        }))
    }

    /// Attribute read.
    ///
    /// The instance table wins; a function found there comes back bound.
    /// Otherwise the class chain is searched: builtin functions return
    /// raw, declared static methods are rejected, and declared instance
    /// methods come back bound.
    pub fn attr(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.attrs.borrow().get(name).cloned() {
            if let Value::Func(func) = value {
                return Ok(self.bind(func));
            }
            return Ok(value);
        }

        let value = self.class.search_attr(name).ok_or_else(|| {
            RuntimeError::new(
                ErrorKind::IdNotFound,
                format!("'{}' object has no attribute '{name}'", self.class_name()),
            )
        })?;

        match value {
            Value::Func(func) => {
                if func.declared_fn().is_none() {
                    return Ok(Value::Func(func));
                }
                if func.static_method() {
                    return Err(RuntimeError::incompatible(format!(
                        "static method '{name}' must not be called by object"
                    )));
                }
                Ok(self.bind(func))
            }
            other => Ok(other),
        }
    }

    /// Attribute assignment always targets the instance's own table.
    pub fn set_attr(&self, name: &str, value: Value) {
        self.attrs.borrow_mut().insert(name.to_string(), value);
    }

    /// Whether the instance's own table holds a name.
    pub fn has_own_attr(&self, name: &str) -> bool {
        self.attrs.borrow().contains_key(name)
    }
}
