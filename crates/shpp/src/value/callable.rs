//! Callable value types: declared functions, builtins, bound methods

use std::rc::{Rc, Weak};

use crate::ast;
use crate::error::{ErrorKind, Result, RuntimeError};
use crate::eval::Interp;
use crate::object::Instance;
use crate::scope::ScopeStack;
use crate::value::Value;

/// Signature of a native builtin: full interpreter access so builtins
/// like `print` and `hash` can re-enter protocol dispatch.
pub type BuiltinFnPtr = Rc<dyn Fn(&mut Interp, Vec<Value>) -> Result<Value>>;

/// A user-declared function: its AST plus the scope stack snapshotted at
/// the declaration site. Calls run against that snapshot, which is what
/// makes closures work.
#[derive(Clone)]
pub struct DeclaredFn {
    /// The declaration node
    pub decl: Rc<ast::FuncDecl>,
    /// Handle-sharing snapshot of the declaring stack
    pub scope: ScopeStack,
}

/// A native function exposed to the language.
#[derive(Clone)]
pub struct BuiltinFn {
    /// Fixed arity; `None` for variadic builtins
    pub arity: Option<usize>,
    /// The native entry point
    pub func: BuiltinFnPtr,
}

/// How a function value is implemented.
#[derive(Clone)]
pub enum FnImpl {
    /// Interpreted body with captured scopes
    Declared(DeclaredFn),
    /// Native code
    Builtin(BuiltinFn),
}

/// A function value, declared or builtin.
#[derive(Clone)]
pub struct FunctionValue {
    /// Display name; lambdas use `<lambda>`
    pub name: String,
    /// Implementation
    pub imp: FnImpl,
}

impl FunctionValue {
    /// Wrap a declared function.
    pub fn declared(decl: Rc<ast::FuncDecl>, scope: ScopeStack) -> Self {
        Self {
            name: decl.name.clone().unwrap_or_else(|| "<lambda>".to_string()),
            imp: FnImpl::Declared(DeclaredFn { decl, scope }),
        }
    }

    /// Wrap a native function.
    pub fn builtin(name: &str, arity: Option<usize>, func: BuiltinFnPtr) -> Self {
        Self {
            name: name.to_string(),
            imp: FnImpl::Builtin(BuiltinFn { arity, func }),
        }
    }

    /// Whether this is a user-declared (interpreted) function.
    pub fn declared_fn(&self) -> Option<&DeclaredFn> {
        match &self.imp {
            FnImpl::Declared(d) => Some(d),
            FnImpl::Builtin(_) => None,
        }
    }

    /// Declared parameter count; defaults included, builtin arity for
    /// natives.
    pub fn num_params(&self) -> usize {
        match &self.imp {
            FnImpl::Declared(d) => d.decl.num_params(),
            FnImpl::Builtin(b) => b.arity.unwrap_or(0),
        }
    }

    /// Count of parameters carrying defaults.
    pub fn num_default_params(&self) -> usize {
        match &self.imp {
            FnImpl::Declared(d) => d.decl.num_default_params(),
            FnImpl::Builtin(_) => 0,
        }
    }

    /// Whether the last parameter is variadic.
    pub fn variadic(&self) -> bool {
        match &self.imp {
            FnImpl::Declared(d) => d.decl.variadic,
            FnImpl::Builtin(b) => b.arity.is_none(),
        }
    }

    /// Whether the declaration carries the `static` qualifier.
    pub fn static_method(&self) -> bool {
        match &self.imp {
            FnImpl::Declared(d) => d.decl.static_,
            FnImpl::Builtin(_) => false,
        }
    }
}

impl std::fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.imp {
            FnImpl::Declared(_) => write!(f, "FUNC({})", self.name),
            FnImpl::Builtin(_) => write!(f, "BUILTIN({})", self.name),
        }
    }
}

/// A bound method: a function paired with its owner instance.
///
/// The receiver is weak. Methods never keep an instance alive, which is
/// the one back-edge the ownership model allows.
pub struct BoundMethod {
    /// The wrapped function
    pub func: Rc<FunctionValue>,
    /// Weak handle to the owner
    pub receiver: Weak<Instance>,
}

impl BoundMethod {
    /// Promote the weak receiver. Dispatch through a dead `self` is an
    /// error, not a crash.
    pub fn receiver(&self) -> Result<Value> {
        match self.receiver.upgrade() {
            Some(instance) => Ok(Value::Instance(instance)),
            None => Err(RuntimeError::new(
                ErrorKind::IncompatibleType,
                format!("method '{}' called on a destroyed object", self.func.name),
            )),
        }
    }
}

impl std::fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BOUND({})", self.func.name)
    }
}

/// A user-declared command: `cmd name { ... }`.
///
/// Resolved by pipelines through the command namespace; the body runs
/// in the forked child against the declaring scope snapshot.
pub struct CmdDecl {
    /// Name pipelines resolve
    pub name: String,
    /// Body statements
    pub body: Rc<ast::Block>,
    /// Declaring stack snapshot
    pub scope: ScopeStack,
}

impl std::fmt::Debug for CmdDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CMD({})", self.name)
    }
}
