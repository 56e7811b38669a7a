//! Operator and protocol dispatch
//!
//! Declared-class instances route every operator and builtin protocol
//! through a dunder-named method on their type; everything else falls
//! through to the builtin semantics in [`crate::value::impls`]. The
//! dunder names are the public contract; internally operators resolve
//! through [`DunderOp`] ids, not ad-hoc strings.

use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::ast::{BinOp, UnOp};
use crate::error::{ErrorKind, Result, RuntimeError};
use crate::eval::{call, Interp};
use crate::value::{impls, ArrayIter, CmdIter, HashableValue, Value};

/// Protocol and operator ids with their dunder method names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DunderOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
    /// `a % b`
    Mod,
    /// `a << b`
    Lshift,
    /// `a >> b`
    Rshift,
    /// `a < b`
    Lt,
    /// `a > b`
    Gt,
    /// `a <= b`
    Le,
    /// `a >= b`
    Ge,
    /// `a == b`
    Eq,
    /// `a != b`
    Ne,
    /// `a in b`, dispatched on `b`
    Contains,
    /// `a & b`
    BitAnd,
    /// `a | b`
    BitOr,
    /// `a ^ b`
    BitXor,
    /// `~a`
    BitNot,
    /// logical `and`
    And,
    /// logical `or`
    Or,
    /// `a[b]`
    GetItem,
    /// `del a`
    Del,
    /// iteration start
    Iter,
    /// iterator advance
    Next,
    /// iterator probe
    HasNext,
    /// iterator lower bound
    Begin,
    /// iterator upper bound
    End,
    /// unary `+`
    Pos,
    /// unary `-`
    Neg,
    /// `!a`
    Invert,
    /// `a(...)`
    Call,
    /// `print a`
    Print,
    /// `len(a)`
    Len,
    /// `hash(a)`
    Hash,
    /// boolean coercion
    Bool,
    /// command-word coercion
    Cmd,
    /// string coercion
    Str,
}

impl DunderOp {
    /// The dunder method name this operation resolves.
    pub fn method_name(self) -> &'static str {
        match self {
            DunderOp::Add => "__add__",
            DunderOp::Sub => "__sub__",
            DunderOp::Mul => "__mul__",
            DunderOp::Div => "__div__",
            DunderOp::Mod => "__mod__",
            DunderOp::Lshift => "__lshift__",
            DunderOp::Rshift => "__rshift__",
            DunderOp::Lt => "__lt__",
            DunderOp::Gt => "__gt__",
            DunderOp::Le => "__le__",
            DunderOp::Ge => "__ge__",
            DunderOp::Eq => "__eq__",
            DunderOp::Ne => "__ne__",
            DunderOp::Contains => "__contains__",
            DunderOp::BitAnd => "__rand__",
            DunderOp::BitOr => "__ror__",
            DunderOp::BitXor => "__rxor__",
            DunderOp::BitNot => "__rinvert__",
            DunderOp::And => "__and__",
            DunderOp::Or => "__or__",
            DunderOp::GetItem => "__getitem__",
            DunderOp::Del => "__del__",
            DunderOp::Iter => "__iter__",
            DunderOp::Next => "__next__",
            DunderOp::HasNext => "__has_next__",
            DunderOp::Begin => "__begin__",
            DunderOp::End => "__end__",
            DunderOp::Pos => "__pos__",
            DunderOp::Neg => "__neg__",
            DunderOp::Invert => "__invert__",
            DunderOp::Call => "__call__",
            DunderOp::Print => "__print__",
            DunderOp::Len => "__len__",
            DunderOp::Hash => "__hash__",
            DunderOp::Bool => "__bool__",
            DunderOp::Cmd => "__cmd__",
            DunderOp::Str => "__str__",
        }
    }
}

/// Invoke a dunder method on an instance with `self` prepended.
///
/// The method must live in the type's method table (base chain
/// included); the instance's own attribute table takes no part in
/// operator dispatch.
pub fn call_dunder(interp: &mut Interp, value: &Value, op: DunderOp, args: Vec<Value>) -> Result<Value> {
    let Value::Instance(obj) = value else {
        return Err(RuntimeError::incompatible(format!(
            "operator dispatch on non-object '{}'",
            value.type_name()
        )));
    };

    let name = op.method_name();
    let method = obj.class().search_attr(name).ok_or_else(|| {
        RuntimeError::incompatible(format!(
            "'{}' object has no '{name}' method",
            obj.class_name()
        ))
    })?;
    let Value::Func(func) = method else {
        return Err(RuntimeError::incompatible(format!("symbol '{name}' must be func")));
    };

    let mut call_args = Vec::with_capacity(args.len() + 1);
    call_args.push(value.clone());
    call_args.extend(args);
    call::call_function(interp, &func, call_args, Vec::new())
}

fn binop_dunder(op: BinOp) -> DunderOp {
    match op {
        BinOp::Add => DunderOp::Add,
        BinOp::Sub => DunderOp::Sub,
        BinOp::Mul => DunderOp::Mul,
        BinOp::Div => DunderOp::Div,
        BinOp::Mod => DunderOp::Mod,
        BinOp::Shl => DunderOp::Lshift,
        BinOp::Shr => DunderOp::Rshift,
        BinOp::Lt => DunderOp::Lt,
        BinOp::Gt => DunderOp::Gt,
        BinOp::Le => DunderOp::Le,
        BinOp::Ge => DunderOp::Ge,
        BinOp::Eq => DunderOp::Eq,
        BinOp::Ne => DunderOp::Ne,
        BinOp::In => DunderOp::Contains,
        BinOp::BitAnd => DunderOp::BitAnd,
        BinOp::BitOr => DunderOp::BitOr,
        BinOp::BitXor => DunderOp::BitXor,
        BinOp::And => DunderOp::And,
        BinOp::Or => DunderOp::Or,
    }
}

/// Binary operator over evaluated operands.
///
/// `in` dispatches on its right operand; every other operator
/// dispatches on the left.
pub fn binary(interp: &mut Interp, op: BinOp, l: &Value, r: &Value) -> Result<Value> {
    if op == BinOp::In {
        if matches!(r, Value::Instance(_)) {
            return call_dunder(interp, r, DunderOp::Contains, vec![l.clone()]);
        }
        return Ok(Value::Bool(impls::contains(r, l)?));
    }

    if matches!(l, Value::Instance(_)) {
        return call_dunder(interp, l, binop_dunder(op), vec![r.clone()]);
    }

    use std::cmp::Ordering;
    match op {
        BinOp::Add => impls::add(l, r),
        BinOp::Sub => impls::sub(l, r),
        BinOp::Mul => impls::mul(l, r),
        BinOp::Div => impls::div(l, r),
        BinOp::Mod => impls::rem(l, r),
        BinOp::Shl => impls::shl(l, r),
        BinOp::Shr => impls::shr(l, r),
        BinOp::BitAnd => impls::bit_and(l, r),
        BinOp::BitOr => impls::bit_or(l, r),
        BinOp::BitXor => impls::bit_xor(l, r),
        BinOp::Lt => Ok(Value::Bool(impls::compare(l, r)? == Ordering::Less)),
        BinOp::Gt => Ok(Value::Bool(impls::compare(l, r)? == Ordering::Greater)),
        BinOp::Le => Ok(Value::Bool(impls::compare(l, r)? != Ordering::Greater)),
        BinOp::Ge => Ok(Value::Bool(impls::compare(l, r)? != Ordering::Less)),
        BinOp::Eq => Ok(Value::Bool(equal(interp, l, r)?)),
        BinOp::Ne => Ok(Value::Bool(!equal(interp, l, r)?)),
        BinOp::And => Ok(Value::Bool(truthy(interp, l)? && truthy(interp, r)?)),
        BinOp::Or => Ok(Value::Bool(truthy(interp, l)? || truthy(interp, r)?)),
        BinOp::In => unreachable!("handled above"),
    }
}

/// Unary operator over an evaluated operand.
pub fn unary(interp: &mut Interp, op: UnOp, v: &Value) -> Result<Value> {
    if matches!(v, Value::Instance(_)) {
        let dunder = match op {
            UnOp::Pos => DunderOp::Pos,
            UnOp::Neg => DunderOp::Neg,
            UnOp::Invert => DunderOp::Invert,
            UnOp::BitNot => DunderOp::BitNot,
        };
        return call_dunder(interp, v, dunder, vec![]);
    }

    match op {
        UnOp::Pos => impls::pos(v),
        UnOp::Neg => impls::neg(v),
        UnOp::Invert => Ok(Value::Bool(!impls::truthy(v)?)),
        UnOp::BitNot => impls::bit_not(v),
    }
}

/// Equality through `__eq__` when the left side is an instance.
pub fn equal(interp: &mut Interp, l: &Value, r: &Value) -> Result<bool> {
    if matches!(l, Value::Instance(_)) {
        let result = call_dunder(interp, l, DunderOp::Eq, vec![r.clone()])?;
        return impls::truthy(&result);
    }
    Ok(impls::equal(l, r))
}

/// Boolean coercion: `__bool__` for instances, builtin truthiness
/// otherwise.
pub fn truthy(interp: &mut Interp, v: &Value) -> Result<bool> {
    if matches!(v, Value::Instance(_)) {
        let result = call_dunder(interp, v, DunderOp::Bool, vec![])?;
        return impls::truthy(&result);
    }
    impls::truthy(v)
}

/// Printing: `__print__` must return a string; builtin values format
/// through `Display`.
pub fn to_print(interp: &mut Interp, v: &Value) -> Result<String> {
    if matches!(v, Value::Instance(_)) {
        let result = call_dunder(interp, v, DunderOp::Print, vec![])?;
        return match result {
            Value::Str(s) => Ok(s.as_ref().clone()),
            _ => Err(RuntimeError::incompatible("print func must return string")),
        };
    }
    Ok(v.to_string())
}

/// String coercion: `__str__` for instances, `Display` otherwise.
pub fn to_str_value(interp: &mut Interp, v: &Value) -> Result<Value> {
    if matches!(v, Value::Instance(_)) {
        return call_dunder(interp, v, DunderOp::Str, vec![]);
    }
    Ok(Value::str(v.to_string()))
}

/// Command-word coercion used when a value is spliced into a command
/// line: `__cmd__` for instances, plain formatting otherwise.
pub fn to_cmd_word(interp: &mut Interp, v: &Value) -> Result<String> {
    if matches!(v, Value::Instance(_)) {
        let result = call_dunder(interp, v, DunderOp::Cmd, vec![])?;
        return match result {
            Value::Str(s) => Ok(s.as_ref().clone()),
            other => Ok(other.to_string()),
        };
    }
    Ok(v.to_string())
}

/// Length: `__len__` must return an int.
pub fn length(interp: &mut Interp, v: &Value) -> Result<i64> {
    if matches!(v, Value::Instance(_)) {
        let result = call_dunder(interp, v, DunderOp::Len, vec![])?;
        return match result {
            Value::Int(n) => Ok(n),
            _ => Err(RuntimeError::incompatible("__len__ func must return integer")),
        };
    }
    impls::len(v)
}

/// Hash: `__hash__` must return an int; the exposed value is clamped
/// non-negative. Builtin values hash through the map-key wrapper.
pub fn hash_value(interp: &mut Interp, v: &Value) -> Result<i64> {
    if matches!(v, Value::Instance(_)) {
        let result = call_dunder(interp, v, DunderOp::Hash, vec![])?;
        return match result {
            Value::Int(n) => Ok(n.wrapping_abs().max(0)),
            _ => Err(RuntimeError::incompatible("__hash__ func must return integer")),
        };
    }

    let key = HashableValue::try_new(v.clone())?;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    Ok((hasher.finish() & i64::MAX as u64) as i64)
}

/// Indexing with `__getitem__` for instances.
pub fn get_item(interp: &mut Interp, obj: &Value, key: &Value) -> Result<Value> {
    if matches!(obj, Value::Instance(_)) {
        return call_dunder(interp, obj, DunderOp::GetItem, vec![key.clone()]);
    }
    impls::get_item(obj, key)
}

/// Item assignment. Instances expose no assignment dunder; only builtin
/// containers accept it.
pub fn set_item(interp: &mut Interp, obj: &Value, key: &Value, value: Value) -> Result<()> {
    let _ = interp;
    impls::set_item(obj, key, value)
}

/// Deletion: `__del__` for instances, element removal for containers.
pub fn del_item(interp: &mut Interp, obj: &Value, key: Option<&Value>) -> Result<()> {
    if matches!(obj, Value::Instance(_)) {
        call_dunder(interp, obj, DunderOp::Del, vec![])?;
        return Ok(());
    }
    match key {
        Some(key) => impls::del_item(obj, key),
        None => Err(RuntimeError::incompatible(format!(
            "type '{}' does not support deletion",
            obj.type_name()
        ))),
    }
}

/// Start of iteration: builtin iterables wrap into iterator values,
/// instances go through `__iter__`.
pub fn iter_value(interp: &mut Interp, v: &Value) -> Result<Value> {
    match v {
        Value::Array(items) => Ok(Value::ArrayIter(Rc::new(RefCell::new(ArrayIter {
            array: items.clone(),
            idx: 0,
        })))),
        Value::Tuple(items) => {
            let copied: Vec<Value> = items.iter().cloned().collect();
            match Value::array(copied) {
                Value::Array(array) => Ok(Value::ArrayIter(Rc::new(RefCell::new(ArrayIter {
                    array,
                    idx: 0,
                })))),
                _ => unreachable!(),
            }
        }
        Value::Map(entries) => {
            let keys: Vec<Value> = entries.borrow().keys().map(|k| k.value().clone()).collect();
            iter_value(interp, &Value::array(keys))
        }
        Value::Str(s) => {
            let chars: Vec<Value> = s.chars().map(|c| Value::str(c.to_string())).collect();
            iter_value(interp, &Value::array(chars))
        }
        Value::Cmd(res) => Ok(Value::CmdIter(Rc::new(RefCell::new(CmdIter {
            lines: res.out.lines().map(str::to_string).collect(),
            idx: 0,
        })))),
        Value::ArrayIter(_) | Value::CmdIter(_) => Ok(v.clone()),
        Value::Instance(obj) => {
            // `__iter__` is the primary entry; classes written against
            // the begin/end style are driven through `__begin__`.
            let op = if !obj.class().exists_attr(DunderOp::Iter.method_name())
                && obj.class().exists_attr(DunderOp::Begin.method_name())
            {
                DunderOp::Begin
            } else {
                DunderOp::Iter
            };
            call_dunder(interp, v, op, vec![])
        }
        _ => Err(RuntimeError::incompatible(format!(
            "type '{}' is not iterable",
            v.type_name()
        ))),
    }
}

/// Iteration lower bound: `__begin__` for instances, a fresh iterator
/// at the first position for builtin iterables.
pub fn begin(interp: &mut Interp, v: &Value) -> Result<Value> {
    if matches!(v, Value::Instance(_)) {
        return call_dunder(interp, v, DunderOp::Begin, vec![]);
    }
    iter_value(interp, v)
}

/// Iteration upper bound: `__end__` for instances, an exhausted
/// iterator for builtin iterables.
pub fn end(interp: &mut Interp, v: &Value) -> Result<Value> {
    if matches!(v, Value::Instance(_)) {
        return call_dunder(interp, v, DunderOp::End, vec![]);
    }
    let it = iter_value(interp, v)?;
    match &it {
        Value::ArrayIter(state) => {
            let len = state.borrow().array.borrow().len();
            state.borrow_mut().idx = len;
        }
        Value::CmdIter(state) => {
            let len = state.borrow().lines.len();
            state.borrow_mut().idx = len;
        }
        _ => {}
    }
    Ok(it)
}

/// Whether an iterator has more elements.
pub fn has_next(interp: &mut Interp, it: &Value) -> Result<bool> {
    match it {
        Value::ArrayIter(state) => {
            let state = state.borrow();
            let len = state.array.borrow().len();
            Ok(state.idx < len)
        }
        Value::CmdIter(state) => {
            let state = state.borrow();
            Ok(state.idx < state.lines.len())
        }
        Value::Instance(_) => {
            let result = call_dunder(interp, it, DunderOp::HasNext, vec![])?;
            impls::truthy(&result)
        }
        _ => Err(RuntimeError::incompatible(format!(
            "type '{}' is not an iterator",
            it.type_name()
        ))),
    }
}

/// Advance an iterator.
pub fn next_value(interp: &mut Interp, it: &Value) -> Result<Value> {
    match it {
        Value::ArrayIter(state) => {
            let mut state = state.borrow_mut();
            let items = state.array.borrow();
            match items.get(state.idx).cloned() {
                Some(item) => {
                    drop(items);
                    state.idx += 1;
                    Ok(item)
                }
                None => Err(RuntimeError::new(
                    ErrorKind::OutOfRange,
                    "iterator exhausted",
                )),
            }
        }
        Value::CmdIter(state) => {
            let mut state = state.borrow_mut();
            match state.lines.get(state.idx).cloned() {
                Some(line) => {
                    state.idx += 1;
                    Ok(Value::str(line))
                }
                None => Err(RuntimeError::new(
                    ErrorKind::OutOfRange,
                    "iterator exhausted",
                )),
            }
        }
        Value::Instance(_) => call_dunder(interp, it, DunderOp::Next, vec![]),
        _ => Err(RuntimeError::incompatible(format!(
            "type '{}' is not an iterator",
            it.type_name()
        ))),
    }
}
