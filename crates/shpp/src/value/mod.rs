//! Value representation for runtime values

pub mod callable;
pub mod display;
pub mod hashable;
pub mod impls;

pub use callable::{BoundMethod, BuiltinFn, BuiltinFnPtr, CmdDecl, DeclaredFn, FnImpl, FunctionValue};
pub use hashable::HashableValue;

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::object::{Instance, InterfaceDesc, ModuleValue, TypeDesc};

/// Runtime value: a tagged handle.
///
/// Two tiers, following the uniform-representation note in the design:
/// scalars are stored inline and copy on read; everything else is a
/// shared, reference-counted handle, so container reads alias.
#[derive(Clone)]
pub enum Value {
    /// `null`
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Integer scalar
    Int(i64),
    /// Floating scalar
    Real(f64),
    /// Immutable string
    Str(Rc<String>),
    /// Mutable ordered sequence
    Array(Rc<RefCell<Vec<Value>>>),
    /// Immutable fixed sequence
    Tuple(Rc<Vec<Value>>),
    /// Insertion-ordered hash map
    Map(Rc<RefCell<IndexMap<HashableValue, Value>>>),
    /// Captured command output plus exit status
    Cmd(Rc<CmdResult>),
    /// Line iterator over captured command output
    CmdIter(Rc<RefCell<CmdIter>>),
    /// Position iterator over an array
    ArrayIter(Rc<RefCell<ArrayIter>>),
    /// Function, declared or builtin
    Func(Rc<FunctionValue>),
    /// Bound method: function plus weak `self`
    Bound(Rc<BoundMethod>),
    /// Type descriptor, builtin or declared
    Type(Rc<TypeDesc>),
    /// Interface descriptor
    Iface(Rc<InterfaceDesc>),
    /// Declared-class instance
    Instance(Rc<Instance>),
    /// Imported module
    Module(Rc<ModuleValue>),
}

/// Variant tags, the observable `kind()` of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// `null`
    Null,
    /// Boolean
    Bool,
    /// Integer
    Int,
    /// Floating point
    Real,
    /// String
    Str,
    /// Array
    Array,
    /// Tuple
    Tuple,
    /// Map
    Map,
    /// Command result
    Cmd,
    /// Command output iterator
    CmdIter,
    /// Array iterator
    ArrayIter,
    /// Function
    Func,
    /// Bound method
    WrapperFunc,
    /// Builtin type descriptor
    Type,
    /// User-declared class descriptor
    DeclType,
    /// Declared-class instance
    Instance,
    /// Interface descriptor
    Iface,
    /// Module
    Module,
}

/// Output captured from a `${...}` subshell.
#[derive(Debug)]
pub struct CmdResult {
    /// Captured stdout, one trailing newline trimmed
    pub out: String,
    /// Exit status exposed to the language
    pub status: i32,
}

/// Iterator over a command result's lines.
#[derive(Debug)]
pub struct CmdIter {
    /// Remaining lines, front first
    pub lines: Vec<String>,
    /// Next position
    pub idx: usize,
}

/// Iterator over an array's elements.
#[derive(Debug)]
pub struct ArrayIter {
    /// The iterated array handle
    pub array: Rc<RefCell<Vec<Value>>>,
    /// Next position
    pub idx: usize,
}

impl Value {
    /// The variant tag.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Real(_) => Kind::Real,
            Value::Str(_) => Kind::Str,
            Value::Array(_) => Kind::Array,
            Value::Tuple(_) => Kind::Tuple,
            Value::Map(_) => Kind::Map,
            Value::Cmd(_) => Kind::Cmd,
            Value::CmdIter(_) => Kind::CmdIter,
            Value::ArrayIter(_) => Kind::ArrayIter,
            Value::Func(_) => Kind::Func,
            Value::Bound(_) => Kind::WrapperFunc,
            Value::Type(t) => {
                if t.declared() {
                    Kind::DeclType
                } else {
                    Kind::Type
                }
            }
            Value::Iface(_) => Kind::Iface,
            Value::Instance(_) => Kind::Instance,
            Value::Module(_) => Kind::Module,
        }
    }

    /// The type name used in error messages and `type()` output.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null_t",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Real(_) => "real",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "map",
            Value::Cmd(_) => "cmdobj",
            Value::CmdIter(_) => "cmd_iter",
            Value::ArrayIter(_) => "array_iter",
            Value::Func(_) => "func",
            Value::Bound(_) => "func",
            Value::Type(t) => t.name(),
            Value::Iface(i) => i.name(),
            Value::Instance(i) => i.class_name(),
            Value::Module(_) => "module",
        }
    }

    /// String value handle.
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(Rc::new(s.into()))
    }

    /// Fresh array handle.
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    /// Fresh tuple handle.
    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(items))
    }

    /// Fresh empty map handle.
    pub fn map(entries: IndexMap<HashableValue, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    /// Whether this variant is callable.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Func(_) | Value::Bound(_) | Value::Type(_) | Value::Iface(_)
        )
    }

    /// Identifier-read semantics: scalars copy, containers share.
    ///
    /// With scalars stored inline and containers behind `Rc`, a plain
    /// clone produces exactly that split.
    pub fn read(&self) -> Value {
        self.clone()
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}:{}", self.kind(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(Value::Null.kind(), Kind::Null);
        assert_eq!(Value::Int(3).kind(), Kind::Int);
        assert_eq!(Value::str("x").kind(), Kind::Str);
        assert_eq!(Value::array(vec![]).kind(), Kind::Array);
        assert_eq!(Value::tuple(vec![Value::Int(1)]).kind(), Kind::Tuple);
    }

    #[test]
    fn test_scalar_read_copies() {
        let a = Value::Int(1);
        let b = a.read();
        // Scalars are inline; the read is an independent copy.
        assert_eq!(a, Value::Int(1));
        assert_eq!(b, Value::Int(1));
    }

    #[test]
    fn test_container_read_shares() {
        let a = Value::array(vec![Value::Int(1)]);
        let b = a.read();
        if let (Value::Array(ra), Value::Array(rb)) = (&a, &b) {
            assert!(Rc::ptr_eq(ra, rb));
            rb.borrow_mut().push(Value::Int(2));
            assert_eq!(ra.borrow().len(), 2);
        } else {
            panic!("expected arrays");
        }
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "null_t");
        assert_eq!(Value::Real(0.5).type_name(), "real");
        assert_eq!(Value::map(IndexMap::new()).type_name(), "map");
    }
}
