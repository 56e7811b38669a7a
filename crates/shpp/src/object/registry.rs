//! Builtin type registration in the root scope

use std::rc::Rc;

use crate::dispatch;
use crate::error::{ErrorKind, Result, RuntimeError};
use crate::eval::Interp;
use crate::object::{TypeDesc, TypeKind};
use crate::scope::ScopeStack;
use crate::value::{impls, BuiltinFnPtr, FunctionValue, Value};

/// One descriptor per builtin type, created at interpreter startup and
/// shared for the whole run.
pub struct TypeRegistry {
    /// `null_t`
    pub null_t: Rc<TypeDesc>,
    /// `bool`
    pub bool_t: Rc<TypeDesc>,
    /// `int`
    pub int_t: Rc<TypeDesc>,
    /// `real`
    pub real_t: Rc<TypeDesc>,
    /// `string`
    pub string_t: Rc<TypeDesc>,
    /// `array`
    pub array_t: Rc<TypeDesc>,
    /// `map`
    pub map_t: Rc<TypeDesc>,
    /// `tuple`
    pub tuple_t: Rc<TypeDesc>,
    /// `func`
    pub func_t: Rc<TypeDesc>,
    /// `cmdobj`
    pub cmd_t: Rc<TypeDesc>,
    /// `cmd_iter`
    pub cmd_iter_t: Rc<TypeDesc>,
    /// `array_iter`
    pub array_iter_t: Rc<TypeDesc>,
    /// `module`
    pub module_t: Rc<TypeDesc>,
    /// `type`, the metatype
    pub type_t: Rc<TypeDesc>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create the builtin descriptors.
    pub fn new() -> Self {
        Self {
            null_t: TypeDesc::builtin("null_t", TypeKind::Null),
            bool_t: TypeDesc::builtin("bool", TypeKind::Bool),
            int_t: TypeDesc::builtin("int", TypeKind::Int),
            real_t: TypeDesc::builtin("real", TypeKind::Real),
            string_t: TypeDesc::builtin("string", TypeKind::Str),
            array_t: TypeDesc::builtin("array", TypeKind::Array),
            map_t: TypeDesc::builtin("map", TypeKind::Map),
            tuple_t: TypeDesc::builtin("tuple", TypeKind::Tuple),
            func_t: TypeDesc::builtin("func", TypeKind::Func),
            cmd_t: TypeDesc::builtin("cmdobj", TypeKind::Cmd),
            cmd_iter_t: TypeDesc::builtin("cmd_iter", TypeKind::CmdIter),
            array_iter_t: TypeDesc::builtin("array_iter", TypeKind::ArrayIter),
            module_t: TypeDesc::builtin("module", TypeKind::Module),
            type_t: TypeDesc::builtin("type", TypeKind::Type),
        }
    }

    /// The descriptor of a value, as a value.
    pub fn type_of(&self, value: &Value) -> Value {
        let ty = match value {
            Value::Null => &self.null_t,
            Value::Bool(_) => &self.bool_t,
            Value::Int(_) => &self.int_t,
            Value::Real(_) => &self.real_t,
            Value::Str(_) => &self.string_t,
            Value::Array(_) => &self.array_t,
            Value::Map(_) => &self.map_t,
            Value::Tuple(_) => &self.tuple_t,
            Value::Func(_) | Value::Bound(_) => &self.func_t,
            Value::Cmd(_) => &self.cmd_t,
            Value::CmdIter(_) => &self.cmd_iter_t,
            Value::ArrayIter(_) => &self.array_iter_t,
            Value::Module(_) => &self.module_t,
            Value::Type(_) | Value::Iface(_) => &self.type_t,
            Value::Instance(obj) => return Value::Type(obj.class().clone()),
        };
        Value::Type(ty.clone())
    }

    fn all(&self) -> Vec<&Rc<TypeDesc>> {
        vec![
            &self.null_t,
            &self.bool_t,
            &self.int_t,
            &self.real_t,
            &self.string_t,
            &self.array_t,
            &self.map_t,
            &self.tuple_t,
            &self.func_t,
            &self.cmd_t,
            &self.cmd_iter_t,
            &self.array_iter_t,
            &self.module_t,
            &self.type_t,
        ]
    }
}

fn builtin(name: &str, arity: Option<usize>, func: BuiltinFnPtr) -> Value {
    Value::Func(Rc::new(FunctionValue::builtin(name, arity, func)))
}

fn arg1(name: &str, args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(RuntimeError::new(
            ErrorKind::FuncParams,
            format!("{name}() takes exactly 1 argument"),
        ));
    }
    Ok(args[0].clone())
}

/// Install the builtin types and native functions into the root scope.
pub fn register_builtins(scopes: &mut ScopeStack, registry: &TypeRegistry) {
    let root = scopes.root();
    for ty in registry.all() {
        root.borrow_mut().set(ty.name(), Value::Type(ty.clone()));
    }

    let print = builtin(
        "print",
        None,
        Rc::new(|interp: &mut Interp, args: Vec<Value>| {
            let mut parts = Vec::with_capacity(args.len());
            for arg in &args {
                parts.push(dispatch::to_print(interp, arg)?);
            }
            let mut line = parts.join(" ");
            line.push('\n');
            // Written straight to fd 1 rather than through `println!`,
            // since a forked child (see cmd::process::launch_in_child)
            // inherits the test harness's output-capture hook, which
            // would otherwise swallow the write instead of reaching
            // the pipe the parent is reading from.
            let fd = unsafe { std::os::fd::BorrowedFd::borrow_raw(1) };
            let _ = nix::unistd::write(fd, line.as_bytes());
            Ok(Value::Null)
        }),
    );
    root.borrow_mut().set("print", print);

    let len = builtin(
        "len",
        Some(1),
        Rc::new(|interp: &mut Interp, args: Vec<Value>| {
            let v = arg1("len", &args)?;
            Ok(Value::Int(dispatch::length(interp, &v)?))
        }),
    );
    root.borrow_mut().set("len", len);

    let hash = builtin(
        "hash",
        Some(1),
        Rc::new(|interp: &mut Interp, args: Vec<Value>| {
            let v = arg1("hash", &args)?;
            Ok(Value::Int(dispatch::hash_value(interp, &v)?))
        }),
    );
    root.borrow_mut().set("hash", hash);

    let begin = builtin(
        "begin",
        Some(1),
        Rc::new(|interp: &mut Interp, args: Vec<Value>| {
            let v = arg1("begin", &args)?;
            dispatch::begin(interp, &v)
        }),
    );
    root.borrow_mut().set("begin", begin);

    let end = builtin(
        "end",
        Some(1),
        Rc::new(|interp: &mut Interp, args: Vec<Value>| {
            let v = arg1("end", &args)?;
            dispatch::end(interp, &v)
        }),
    );
    root.borrow_mut().set("end", end);

    let to_string = builtin(
        "to_string",
        Some(1),
        Rc::new(|interp: &mut Interp, args: Vec<Value>| {
            let v = arg1("to_string", &args)?;
            dispatch::to_str_value(interp, &v)
        }),
    );
    root.borrow_mut().set("to_string", to_string);

    let copy = builtin(
        "copy",
        Some(1),
        Rc::new(|_: &mut Interp, args: Vec<Value>| {
            let v = arg1("copy", &args)?;
            Ok(impls::deep_copy(&v))
        }),
    );
    root.borrow_mut().set("copy", copy);

    let assert_fn = builtin(
        "assert",
        None,
        Rc::new(|interp: &mut Interp, args: Vec<Value>| {
            if args.is_empty() || args.len() > 2 {
                return Err(RuntimeError::new(
                    ErrorKind::FuncParams,
                    "assert() takes 1 or 2 arguments",
                ));
            }
            if dispatch::truthy(interp, &args[0])? {
                return Ok(Value::Null);
            }
            let msg = match args.get(1) {
                Some(m) => dispatch::to_print(interp, m)?,
                None => "assertion failed".to_string(),
            };
            Err(RuntimeError::new(ErrorKind::Assert, msg))
        }),
    );
    root.borrow_mut().set("assert", assert_fn);
}
