//! Builtin operator, container, and conversion semantics
//!
//! Everything here covers the non-declared kinds only. Declared-class
//! instances reach these functions through the dispatch layer after
//! their dunder methods have had the first chance.

use std::cmp::Ordering;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{ErrorKind, Result, RuntimeError};
use crate::value::{HashableValue, Value};

fn incompat_bin(op: &str, l: &Value, r: &Value) -> RuntimeError {
    RuntimeError::incompatible(format!(
        "operator '{op}' not supported between '{}' and '{}'",
        l.type_name(),
        r.type_name()
    ))
}

fn incompat_un(op: &str, v: &Value) -> RuntimeError {
    RuntimeError::incompatible(format!(
        "operator '{op}' not supported for '{}'",
        v.type_name()
    ))
}

/// Structural equality over builtin kinds.
///
/// Numbers compare across int/real; containers compare element-wise;
/// functions, types, and instances compare by handle identity. Instance
/// `__eq__` overrides are applied by the dispatch layer before this
/// fallback is consulted.
pub fn equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Real(a), Value::Real(b)) => a == b,
        (Value::Int(a), Value::Real(b)) | (Value::Real(b), Value::Int(a)) => (*a as f64) == *b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            if Rc::ptr_eq(a, b) {
                return true;
            }
            let (a, b) = (a.borrow(), b.borrow());
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| equal(x, y))
        }
        (Value::Tuple(a), Value::Tuple(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| equal(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            if Rc::ptr_eq(a, b) {
                return true;
            }
            let (a, b) = (a.borrow(), b.borrow());
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).map(|w| equal(v, w)).unwrap_or(false))
        }
        (Value::Cmd(a), Value::Cmd(b)) => a.out == b.out && a.status == b.status,
        (Value::Func(a), Value::Func(b)) => Rc::ptr_eq(a, b),
        (Value::Bound(a), Value::Bound(b)) => {
            Rc::ptr_eq(&a.func, &b.func) && a.receiver.ptr_eq(&b.receiver)
        }
        (Value::Type(a), Value::Type(b)) => a.name() == b.name(),
        (Value::Iface(a), Value::Iface(b)) => Rc::ptr_eq(a, b),
        (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
        (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        equal(self, other)
    }
}

/// `l + r`
pub fn add(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
        (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a + b)),
        (Value::Int(a), Value::Real(b)) => Ok(Value::Real(*a as f64 + b)),
        (Value::Real(a), Value::Int(b)) => Ok(Value::Real(a + *b as f64)),
        (Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{a}{b}"))),
        (Value::Array(a), Value::Array(b)) => {
            let mut out = a.borrow().clone();
            out.extend(b.borrow().iter().cloned());
            Ok(Value::array(out))
        }
        (Value::Tuple(a), Value::Tuple(b)) => {
            let mut out = a.as_ref().clone();
            out.extend(b.iter().cloned());
            Ok(Value::tuple(out))
        }
        _ => Err(incompat_bin("+", l, r)),
    }
}

/// `l - r`
pub fn sub(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(*b))),
        (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a - b)),
        (Value::Int(a), Value::Real(b)) => Ok(Value::Real(*a as f64 - b)),
        (Value::Real(a), Value::Int(b)) => Ok(Value::Real(a - *b as f64)),
        _ => Err(incompat_bin("-", l, r)),
    }
}

/// `l * r`
pub fn mul(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(*b))),
        (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a * b)),
        (Value::Int(a), Value::Real(b)) => Ok(Value::Real(*a as f64 * b)),
        (Value::Real(a), Value::Int(b)) => Ok(Value::Real(a * *b as f64)),
        (Value::Str(s), Value::Int(n)) => Ok(Value::str(s.repeat((*n).max(0) as usize))),
        _ => Err(incompat_bin("*", l, r)),
    }
}

/// `l / r`; integer division stays integral.
pub fn div(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                Err(RuntimeError::new(ErrorKind::ZeroDiv, "division by zero"))
            } else {
                Ok(Value::Int(a / b))
            }
        }
        (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a / b)),
        (Value::Int(a), Value::Real(b)) => Ok(Value::Real(*a as f64 / b)),
        (Value::Real(a), Value::Int(b)) => Ok(Value::Real(a / *b as f64)),
        _ => Err(incompat_bin("/", l, r)),
    }
}

/// `l % r`
pub fn rem(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                Err(RuntimeError::new(ErrorKind::ZeroDiv, "modulo by zero"))
            } else {
                Ok(Value::Int(a % b))
            }
        }
        (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a % b)),
        _ => Err(incompat_bin("%", l, r)),
    }
}

fn int_pair(op: &str, l: &Value, r: &Value) -> Result<(i64, i64)> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok((*a, *b)),
        _ => Err(incompat_bin(op, l, r)),
    }
}

/// `l << r`
pub fn shl(l: &Value, r: &Value) -> Result<Value> {
    let (a, b) = int_pair("<<", l, r)?;
    Ok(Value::Int(a.wrapping_shl(b as u32)))
}

/// `l >> r`
pub fn shr(l: &Value, r: &Value) -> Result<Value> {
    let (a, b) = int_pair(">>", l, r)?;
    Ok(Value::Int(a.wrapping_shr(b as u32)))
}

/// `l & r`
pub fn bit_and(l: &Value, r: &Value) -> Result<Value> {
    let (a, b) = int_pair("&", l, r)?;
    Ok(Value::Int(a & b))
}

/// `l | r`
pub fn bit_or(l: &Value, r: &Value) -> Result<Value> {
    let (a, b) = int_pair("|", l, r)?;
    Ok(Value::Int(a | b))
}

/// `l ^ r`
pub fn bit_xor(l: &Value, r: &Value) -> Result<Value> {
    let (a, b) = int_pair("^", l, r)?;
    Ok(Value::Int(a ^ b))
}

/// Unary `-`
pub fn neg(v: &Value) -> Result<Value> {
    match v {
        Value::Int(n) => Ok(Value::Int(-n)),
        Value::Real(r) => Ok(Value::Real(-r)),
        _ => Err(incompat_un("-", v)),
    }
}

/// Unary `+`
pub fn pos(v: &Value) -> Result<Value> {
    match v {
        Value::Int(_) | Value::Real(_) => Ok(v.clone()),
        _ => Err(incompat_un("+", v)),
    }
}

/// `~v`
pub fn bit_not(v: &Value) -> Result<Value> {
    match v {
        Value::Int(n) => Ok(Value::Int(!n)),
        _ => Err(incompat_un("~", v)),
    }
}

/// Ordering between comparable builtin values.
pub fn compare(l: &Value, r: &Value) -> Result<Ordering> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Real(a), Value::Real(b)) => a
            .partial_cmp(b)
            .ok_or_else(|| incompat_bin("<", l, r)),
        (Value::Int(a), Value::Real(b)) => (*a as f64)
            .partial_cmp(b)
            .ok_or_else(|| incompat_bin("<", l, r)),
        (Value::Real(a), Value::Int(b)) => a
            .partial_cmp(&(*b as f64))
            .ok_or_else(|| incompat_bin("<", l, r)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => Err(incompat_bin("<", l, r)),
    }
}

/// `item in container`
pub fn contains(container: &Value, item: &Value) -> Result<bool> {
    match container {
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(needle.as_str())),
            _ => Err(incompat_bin("in", item, container)),
        },
        Value::Array(items) => Ok(items.borrow().iter().any(|v| equal(v, item))),
        Value::Tuple(items) => Ok(items.iter().any(|v| equal(v, item))),
        Value::Map(entries) => {
            let key = HashableValue::try_new(item.clone())?;
            Ok(entries.borrow().contains_key(&key))
        }
        Value::Cmd(res) => match item {
            Value::Str(needle) => Ok(res.out.contains(needle.as_str())),
            _ => Err(incompat_bin("in", item, container)),
        },
        _ => Err(incompat_bin("in", item, container)),
    }
}

/// Builtin truthiness. Instances go through `__bool__` in dispatch and
/// never reach this function.
pub fn truthy(v: &Value) -> Result<bool> {
    match v {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::Int(n) => Ok(*n != 0),
        Value::Real(r) => Ok(*r != 0.0),
        Value::Str(s) => Ok(!s.is_empty()),
        Value::Array(items) => Ok(!items.borrow().is_empty()),
        Value::Tuple(items) => Ok(!items.is_empty()),
        Value::Map(entries) => Ok(!entries.borrow().is_empty()),
        Value::Cmd(res) => Ok(res.status == 0),
        Value::Func(_) | Value::Bound(_) | Value::Type(_) | Value::Iface(_) | Value::Module(_) => {
            Ok(true)
        }
        _ => Err(RuntimeError::incompatible(format!(
            "type '{}' has no boolean value",
            v.type_name()
        ))),
    }
}

/// Builtin `len`.
pub fn len(v: &Value) -> Result<i64> {
    match v {
        Value::Str(s) => Ok(s.chars().count() as i64),
        Value::Array(items) => Ok(items.borrow().len() as i64),
        Value::Tuple(items) => Ok(items.len() as i64),
        Value::Map(entries) => Ok(entries.borrow().len() as i64),
        Value::Cmd(res) => Ok(res.out.lines().count() as i64),
        _ => Err(RuntimeError::incompatible(format!(
            "type '{}' has no length",
            v.type_name()
        ))),
    }
}

fn normalize_index(idx: i64, len: usize, what: &str) -> Result<usize> {
    let len = len as i64;
    let resolved = if idx < 0 { idx + len } else { idx };
    if resolved < 0 || resolved >= len {
        Err(RuntimeError::new(
            ErrorKind::OutOfRange,
            format!("{what} index {idx} out of range for length {len}"),
        ))
    } else {
        Ok(resolved as usize)
    }
}

fn index_of(v: &Value) -> Result<i64> {
    match v {
        Value::Int(n) => Ok(*n),
        _ => Err(RuntimeError::incompatible(format!(
            "index must be int, not '{}'",
            v.type_name()
        ))),
    }
}

/// `obj[key]`
pub fn get_item(obj: &Value, key: &Value) -> Result<Value> {
    match obj {
        Value::Array(items) => {
            let items = items.borrow();
            let idx = normalize_index(index_of(key)?, items.len(), "array")?;
            Ok(items[idx].clone())
        }
        Value::Tuple(items) => {
            let idx = normalize_index(index_of(key)?, items.len(), "tuple")?;
            Ok(items[idx].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let idx = normalize_index(index_of(key)?, chars.len(), "string")?;
            Ok(Value::str(chars[idx].to_string()))
        }
        Value::Map(entries) => {
            let hkey = HashableValue::try_new(key.clone())?;
            entries.borrow().get(&hkey).cloned().ok_or_else(|| {
                RuntimeError::new(ErrorKind::KeyNotFound, format!("key '{key}' not found"))
            })
        }
        Value::Cmd(res) => {
            let lines: Vec<&str> = res.out.lines().collect();
            let idx = normalize_index(index_of(key)?, lines.len(), "cmd")?;
            Ok(Value::str(lines[idx].to_string()))
        }
        _ => Err(RuntimeError::incompatible(format!(
            "type '{}' is not indexable",
            obj.type_name()
        ))),
    }
}

/// `obj[key] = value`
pub fn set_item(obj: &Value, key: &Value, value: Value) -> Result<()> {
    match obj {
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            let idx = normalize_index(index_of(key)?, items.len(), "array")?;
            items[idx] = value;
            Ok(())
        }
        Value::Map(entries) => {
            let hkey = HashableValue::try_new(key.clone())?;
            entries.borrow_mut().insert(hkey, value);
            Ok(())
        }
        _ => Err(RuntimeError::incompatible(format!(
            "type '{}' does not support item assignment",
            obj.type_name()
        ))),
    }
}

/// `del obj[key]`
pub fn del_item(obj: &Value, key: &Value) -> Result<()> {
    match obj {
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            let idx = normalize_index(index_of(key)?, items.len(), "array")?;
            items.remove(idx);
            Ok(())
        }
        Value::Map(entries) => {
            let hkey = HashableValue::try_new(key.clone())?;
            match entries.borrow_mut().shift_remove(&hkey) {
                Some(_) => Ok(()),
                None => Err(RuntimeError::new(
                    ErrorKind::KeyNotFound,
                    format!("key '{key}' not found"),
                )),
            }
        }
        _ => Err(RuntimeError::incompatible(format!(
            "type '{}' does not support item deletion",
            obj.type_name()
        ))),
    }
}

/// Resolve `[start:stop:step]` into the selected positions, with
/// negative indices and negative strides handled the Python way.
fn slice_positions(
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
    len: usize,
) -> Result<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(RuntimeError::incompatible("slice step cannot be zero"));
    }
    let len = len as i64;

    let clamp = |idx: i64, upper: i64| -> i64 {
        let idx = if idx < 0 { idx + len } else { idx };
        idx.clamp(if step > 0 { 0 } else { -1 }, upper)
    };

    let (mut pos, end) = if step > 0 {
        (
            clamp(start.unwrap_or(0), len),
            clamp(stop.unwrap_or(len), len),
        )
    } else {
        (
            clamp(start.unwrap_or(len - 1), len - 1),
            clamp(stop.unwrap_or(-len - 1), len - 1),
        )
    };

    let mut out = Vec::new();
    while (step > 0 && pos < end) || (step < 0 && pos > end) {
        if (0..len).contains(&pos) {
            out.push(pos as usize);
        }
        pos += step;
    }
    Ok(out)
}

/// `obj[start:stop:step]`
pub fn slice(
    obj: &Value,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> Result<Value> {
    match obj {
        Value::Array(items) => {
            let items = items.borrow();
            let picked = slice_positions(start, stop, step, items.len())?
                .into_iter()
                .map(|i| items[i].clone())
                .collect();
            Ok(Value::array(picked))
        }
        Value::Tuple(items) => {
            let picked = slice_positions(start, stop, step, items.len())?
                .into_iter()
                .map(|i| items[i].clone())
                .collect();
            Ok(Value::tuple(picked))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let picked: String = slice_positions(start, stop, step, chars.len())?
                .into_iter()
                .map(|i| chars[i])
                .collect();
            Ok(Value::str(picked))
        }
        _ => Err(RuntimeError::incompatible(format!(
            "type '{}' is not sliceable",
            obj.type_name()
        ))),
    }
}

/// `int(v)`
pub fn to_int(v: &Value) -> Result<Value> {
    match v {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Real(r) => Ok(Value::Int(*r as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            RuntimeError::incompatible(format!("cannot convert '{s}' to int"))
        }),
        _ => Err(RuntimeError::incompatible(format!(
            "cannot convert '{}' to int",
            v.type_name()
        ))),
    }
}

/// `real(v)`
pub fn to_real(v: &Value) -> Result<Value> {
    match v {
        Value::Real(r) => Ok(Value::Real(*r)),
        Value::Int(n) => Ok(Value::Real(*n as f64)),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Real).map_err(|_| {
            RuntimeError::incompatible(format!("cannot convert '{s}' to real"))
        }),
        _ => Err(RuntimeError::incompatible(format!(
            "cannot convert '{}' to real",
            v.type_name()
        ))),
    }
}

/// Explicit deep copy: containers duplicate recursively, scalars and
/// opaque handles clone.
pub fn deep_copy(v: &Value) -> Value {
    match v {
        Value::Array(items) => Value::array(items.borrow().iter().map(deep_copy).collect()),
        Value::Tuple(items) => Value::tuple(items.iter().map(deep_copy).collect()),
        Value::Map(entries) => {
            let copied: IndexMap<HashableValue, Value> = entries
                .borrow()
                .iter()
                .map(|(k, val)| (k.clone(), deep_copy(val)))
                .collect();
            Value::map(copied)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_add() {
        assert_eq!(add(&Value::Int(2), &Value::Int(3)).unwrap(), Value::Int(5));
        assert_eq!(
            add(&Value::Int(2), &Value::Real(0.5)).unwrap(),
            Value::Real(2.5)
        );
    }

    #[test]
    fn test_string_and_array_add() {
        assert_eq!(
            add(&Value::str("ab"), &Value::str("cd")).unwrap(),
            Value::str("abcd")
        );
        let joined = add(
            &Value::array(vec![Value::Int(1)]),
            &Value::array(vec![Value::Int(2)]),
        )
        .unwrap();
        assert_eq!(joined, Value::array(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn test_add_incompatible() {
        let err = add(&Value::Int(1), &Value::str("x")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncompatibleType);
        assert!(err.msg.contains("'int'"));
        assert!(err.msg.contains("'string'"));
    }

    #[test]
    fn test_div_by_zero() {
        let err = div(&Value::Int(1), &Value::Int(0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ZeroDiv);
        let err = rem(&Value::Int(1), &Value::Int(0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ZeroDiv);
    }

    #[test]
    fn test_int_division_stays_integral() {
        assert_eq!(div(&Value::Int(7), &Value::Int(2)).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_bitwise_int_only() {
        assert_eq!(
            shl(&Value::Int(1), &Value::Int(3)).unwrap(),
            Value::Int(8)
        );
        assert!(bit_and(&Value::Real(1.0), &Value::Int(1)).is_err());
    }

    #[test]
    fn test_equality_cross_numeric() {
        assert!(equal(&Value::Int(1), &Value::Real(1.0)));
        assert!(!equal(&Value::Int(1), &Value::Real(1.5)));
        assert!(!equal(&Value::Int(0), &Value::Null));
    }

    #[test]
    fn test_deep_container_equality() {
        let a = Value::array(vec![Value::Int(1), Value::array(vec![Value::str("x")])]);
        let b = Value::array(vec![Value::Int(1), Value::array(vec![Value::str("x")])]);
        assert!(equal(&a, &b));
    }

    #[test]
    fn test_compare_orderings() {
        assert_eq!(
            compare(&Value::Int(1), &Value::Int(2)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare(&Value::str("b"), &Value::str("a")).unwrap(),
            Ordering::Greater
        );
        assert!(compare(&Value::Int(1), &Value::str("a")).is_err());
    }

    #[test]
    fn test_contains() {
        assert!(contains(&Value::str("hello"), &Value::str("ell")).unwrap());
        let arr = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert!(contains(&arr, &Value::Int(2)).unwrap());
        assert!(!contains(&arr, &Value::Int(9)).unwrap());
    }

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&Value::Null).unwrap());
        assert!(!truthy(&Value::Int(0)).unwrap());
        assert!(truthy(&Value::str("x")).unwrap());
        assert!(!truthy(&Value::array(vec![])).unwrap());
    }

    #[test]
    fn test_negative_indexing() {
        let arr = Value::array(vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
        assert_eq!(get_item(&arr, &Value::Int(-1)).unwrap(), Value::Int(30));
        assert_eq!(get_item(&arr, &Value::Int(0)).unwrap(), Value::Int(10));

        let err = get_item(&arr, &Value::Int(3)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OutOfRange);
        let err = get_item(&arr, &Value::Int(-4)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OutOfRange);
    }

    #[test]
    fn test_map_get_set_del() {
        let map = Value::map(IndexMap::new());
        set_item(&map, &Value::str("k"), Value::Int(1)).unwrap();
        assert_eq!(get_item(&map, &Value::str("k")).unwrap(), Value::Int(1));

        let err = get_item(&map, &Value::str("missing")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::KeyNotFound);

        del_item(&map, &Value::str("k")).unwrap();
        let err = del_item(&map, &Value::str("k")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::KeyNotFound);
    }

    #[test]
    fn test_slice_basic() {
        let arr = Value::array((0..6).map(Value::Int).collect());
        assert_eq!(
            slice(&arr, Some(1), Some(4), None).unwrap(),
            Value::array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_slice_step_and_negative() {
        let arr = Value::array((0..6).map(Value::Int).collect());
        assert_eq!(
            slice(&arr, None, None, Some(2)).unwrap(),
            Value::array(vec![Value::Int(0), Value::Int(2), Value::Int(4)])
        );
        // Reversal via negative stride.
        assert_eq!(
            slice(&arr, None, None, Some(-1)).unwrap(),
            Value::array((0..6).rev().map(Value::Int).collect())
        );
        // Negative bounds count from the end.
        assert_eq!(
            slice(&arr, Some(-2), None, None).unwrap(),
            Value::array(vec![Value::Int(4), Value::Int(5)])
        );
    }

    #[test]
    fn test_slice_string() {
        let s = Value::str("abcdef");
        assert_eq!(slice(&s, Some(1), Some(3), None).unwrap(), Value::str("bc"));
    }

    #[test]
    fn test_slice_zero_step_rejected() {
        let arr = Value::array(vec![Value::Int(1)]);
        assert!(slice(&arr, None, None, Some(0)).is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(to_int(&Value::str(" 42 ")).unwrap(), Value::Int(42));
        assert_eq!(to_int(&Value::Real(3.9)).unwrap(), Value::Int(3));
        assert_eq!(to_real(&Value::Int(2)).unwrap(), Value::Real(2.0));
        assert!(to_int(&Value::str("nope")).is_err());
    }

    #[test]
    fn test_deep_copy_detaches() {
        let inner = Value::array(vec![Value::Int(1)]);
        let outer = Value::array(vec![inner.clone()]);
        let copy = deep_copy(&outer);

        if let Value::Array(items) = &inner {
            items.borrow_mut().push(Value::Int(2));
        }
        // The copy kept the original single element.
        assert_eq!(
            copy,
            Value::array(vec![Value::array(vec![Value::Int(1)])])
        );
    }

    #[test]
    fn test_len() {
        assert_eq!(len(&Value::str("héllo")).unwrap(), 5);
        assert_eq!(len(&Value::array(vec![Value::Int(1)])).unwrap(), 1);
        assert!(len(&Value::Int(1)).is_err());
    }
}
