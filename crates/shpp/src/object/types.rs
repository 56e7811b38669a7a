//! Type descriptors and abstract-method signatures

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{ErrorKind, Result, RuntimeError};
use crate::eval::Interp;
use crate::scope::{SymbolTable, TableKind, TableRef};
use crate::value::{impls, FunctionValue, Value};

/// What a type descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// `null_t`
    Null,
    /// `bool`
    Bool,
    /// `int`
    Int,
    /// `real`
    Real,
    /// `string`
    Str,
    /// `array`
    Array,
    /// `map`
    Map,
    /// `tuple`
    Tuple,
    /// `func`
    Func,
    /// `cmdobj`
    Cmd,
    /// `cmd_iter`
    CmdIter,
    /// `array_iter`
    ArrayIter,
    /// `module`
    Module,
    /// `type`, the metatype
    Type,
    /// A user-declared class
    Declared,
}

/// The shape a concrete implementation of an abstract method must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbstractMethod {
    /// Declared parameter count, defaults included
    pub num_params: usize,
    /// Count of parameters carrying defaults
    pub num_default_params: usize,
    /// Variadic tail parameter
    pub variadic: bool,
}

impl AbstractMethod {
    /// Signature of a function declaration.
    pub fn of_decl(decl: &crate::ast::FuncDecl) -> Self {
        Self {
            num_params: decl.num_params(),
            num_default_params: decl.num_default_params(),
            variadic: decl.variadic,
        }
    }

    /// Signature of an interface requirement.
    pub fn of_iface_method(m: &crate::ast::IfaceMethod) -> Self {
        Self {
            num_params: m.params.len(),
            num_default_params: m.params.iter().filter(|p| p.default.is_some()).count(),
            variadic: m.variadic,
        }
    }

    /// Whether a concrete function satisfies this signature.
    ///
    /// The default count takes part only in the variadic branch; the
    /// non-variadic parameter count already absorbs defaults.
    pub fn matches_func(&self, func: &FunctionValue) -> bool {
        if self.variadic {
            return func.num_params() == self.num_params
                && func.num_default_params() == self.num_default_params
                && func.variadic() == self.variadic;
        }
        func.num_params() == self.num_params && func.variadic() == self.variadic
    }

    /// Signature-to-signature comparison with the same variadic rule.
    pub fn matches(&self, other: &AbstractMethod) -> bool {
        if self.variadic {
            return other.num_params == self.num_params
                && other.num_default_params == self.num_default_params
                && other.variadic == self.variadic;
        }
        other.num_params == self.num_params && other.variadic == self.variadic
    }
}

/// A type: builtin or user-declared class.
///
/// Declared classes add a base chain, an interface list, and the
/// abstract-method map the class executor fills in while the body runs.
pub struct TypeDesc {
    name: String,
    kind: TypeKind,
    base: Option<Rc<TypeDesc>>,
    ifaces: Vec<Value>,
    attrs: TableRef,
    abstract_: bool,
    abstract_methods: RefCell<IndexMap<String, AbstractMethod>>,
}

impl std::fmt::Debug for TypeDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TYPE({})", self.name)
    }
}

impl TypeDesc {
    /// Create a builtin type descriptor.
    pub fn builtin(name: &str, kind: TypeKind) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_string(),
            kind,
            base: None,
            ifaces: Vec::new(),
            attrs: SymbolTable::shared(TableKind::Class),
            abstract_: false,
            abstract_methods: RefCell::new(IndexMap::new()),
        })
    }

    /// Create a declared-class descriptor. Base validation and
    /// abstract-map inheritance happen in [`super::new_decl_class`].
    pub(crate) fn new_declared(
        name: &str,
        base: Option<Rc<TypeDesc>>,
        ifaces: Vec<Value>,
        abstract_: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind: TypeKind::Declared,
            base,
            ifaces,
            attrs: SymbolTable::shared(TableKind::Class),
            abstract_,
            abstract_methods: RefCell::new(IndexMap::new()),
        }
    }

    /// The type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The descriptor kind.
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Whether this is a user-declared class.
    pub fn declared(&self) -> bool {
        self.kind == TypeKind::Declared
    }

    /// Whether the class was declared `abstract`.
    pub fn is_abstract(&self) -> bool {
        self.abstract_
    }

    /// The base class, if any.
    pub fn base(&self) -> Option<&Rc<TypeDesc>> {
        self.base.as_ref()
    }

    /// Declared interface list.
    pub fn ifaces(&self) -> &[Value] {
        &self.ifaces
    }

    /// The class attribute table. Class bodies execute inside this
    /// table, so methods land here.
    pub fn attrs_table(&self) -> &TableRef {
        &self.attrs
    }

    /// The abstract-method map, declared plus inherited.
    pub fn abstract_methods(&self) -> &RefCell<IndexMap<String, AbstractMethod>> {
        &self.abstract_methods
    }

    /// Walk own attributes then the base chain. Interfaces constrain,
    /// they never provide, so they are not consulted.
    pub fn search_attr(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.attrs.borrow().get(name) {
            return Some(value);
        }
        self.base.as_ref().and_then(|base| base.search_attr(name))
    }

    /// Whether a name resolves anywhere on the chain.
    pub fn exists_attr(&self, name: &str) -> bool {
        self.search_attr(name).is_some()
    }

    /// Register a member in the class table. Duplicates are rejected.
    pub fn register_method(&self, name: &str, value: Value) -> Result<()> {
        self.attrs.borrow_mut().insert(name, value)
    }
}

/// An interface: required method signatures, inherited transitively.
pub struct InterfaceDesc {
    name: String,
    methods: IndexMap<String, AbstractMethod>,
}

impl std::fmt::Debug for InterfaceDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IFACE({})", self.name)
    }
}

impl InterfaceDesc {
    pub(crate) fn new(name: &str, methods: IndexMap<String, AbstractMethod>) -> Self {
        Self {
            name: name.to_string(),
            methods,
        }
    }

    /// The interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Required signatures, own plus inherited.
    pub fn methods(&self) -> &IndexMap<String, AbstractMethod> {
        &self.methods
    }
}

/// `type(args)`-style construction for every descriptor kind.
///
/// Builtin types behave as conversions; container types copy their
/// single argument; declared classes allocate an instance; interfaces
/// and the function type reject construction.
pub fn construct(
    interp: &mut Interp,
    ty: &Rc<TypeDesc>,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<Value> {
    if ty.declared() {
        return super::class::construct_instance(interp, ty, args, kwargs);
    }

    let one = |args: &[Value]| -> Result<Value> {
        if args.len() != 1 {
            return Err(RuntimeError::new(
                ErrorKind::FuncParams,
                format!("{}() takes exactly 1 argument", ty.name()),
            ));
        }
        Ok(args[0].clone())
    };

    match ty.kind() {
        TypeKind::Null => Ok(Value::Null),
        TypeKind::Bool => {
            let v = one(&args)?;
            Ok(Value::Bool(crate::dispatch::truthy(interp, &v)?))
        }
        TypeKind::Int => impls::to_int(&one(&args)?),
        TypeKind::Real => impls::to_real(&one(&args)?),
        TypeKind::Str => {
            let v = one(&args)?;
            let s = crate::dispatch::to_str_value(interp, &v)?;
            Ok(s)
        }
        TypeKind::Array | TypeKind::Map | TypeKind::Tuple => {
            // Container constructors are explicit deep copies.
            Ok(impls::deep_copy(&one(&args)?))
        }
        TypeKind::Type => {
            let v = one(&args)?;
            Ok(interp.type_of(&v))
        }
        TypeKind::Func
        | TypeKind::Cmd
        | TypeKind::CmdIter
        | TypeKind::ArrayIter
        | TypeKind::Module => Err(RuntimeError::new(
            ErrorKind::FuncParams,
            format!("{}() is not constructible", ty.name()),
        )),
        TypeKind::Declared => unreachable!("handled above"),
    }
}
