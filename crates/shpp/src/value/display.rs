//! Human-readable formatting for values
//!
//! `Display` covers every builtin kind. Declared-class instances format
//! through `__print__` dispatch in the evaluator; the fallback here is
//! only reached when a raw instance handle is printed without dispatch.

use std::fmt;

use crate::value::{FnImpl, Value};

/// Format a value as a container element: strings gain quotes so
/// `["a,b", "c"]` stays unambiguous.
fn fmt_element(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::Str(s) => write!(f, "\"{s}\""),
        other => write!(f, "{other}"),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Real(r) => {
                if r.fract() == 0.0 && r.is_finite() {
                    write!(f, "{r:.1}")
                } else {
                    write!(f, "{r}")
                }
            }
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    fmt_element(item, f)?;
                }
                f.write_str("]")
            }
            Value::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    fmt_element(item, f)?;
                }
                f.write_str(")")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    fmt_element(key.value(), f)?;
                    f.write_str(": ")?;
                    fmt_element(value, f)?;
                }
                f.write_str("}")
            }
            Value::Cmd(res) => f.write_str(&res.out),
            Value::CmdIter(_) => f.write_str("CMD_ITER"),
            Value::ArrayIter(_) => f.write_str("ARRAY_ITER"),
            Value::Func(func) => match func.imp {
                FnImpl::Declared(_) => write!(f, "FUNC({})", func.name),
                FnImpl::Builtin(_) => write!(f, "BUILTIN({})", func.name),
            },
            Value::Bound(bound) => write!(f, "BOUND({})", bound.func.name),
            Value::Type(t) => write!(f, "TYPE({})", t.name()),
            Value::Iface(i) => write!(f, "IFACE({})", i.name()),
            Value::Instance(i) => write!(f, "OBJECT({})", i.class_name()),
            Value::Module(m) => write!(f, "MODULE({})", m.name),
        }
    }
}
