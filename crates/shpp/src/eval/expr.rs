//! Expression evaluation

use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{BinOp, Expr, Literal};
use crate::dispatch;
use crate::error::{ErrorKind, RuntimeError};
use crate::eval::{call, control::Flow, Evaluate, Interp};
use crate::value::{FunctionValue, HashableValue, Value};

impl Evaluate for Expr {
    fn eval(&self, interp: &mut Interp) -> Flow<Value> {
        match self {
            Expr::Literal(lit, _) => Ok(eval_literal(lit)),

            // Identifier reads copy scalars and share containers; both
            // fall out of the handle representation.
            Expr::Ident(name, pos) => Ok(interp
                .scopes
                .lookup_or_err(name)
                .map_err(|e| e.or_pos(*pos))?
                .read()),

            Expr::Binary { op, lhs, rhs, pos } => {
                // Logical operators short-circuit unless the left side
                // is an object with a dunder to call.
                if matches!(op, BinOp::And | BinOp::Or) {
                    let l = lhs.eval(interp)?;
                    if !matches!(l, Value::Instance(_)) {
                        let l_true =
                            dispatch::truthy(interp, &l).map_err(|e| e.or_pos(*pos))?;
                        match op {
                            BinOp::And if !l_true => return Ok(Value::Bool(false)),
                            BinOp::Or if l_true => return Ok(Value::Bool(true)),
                            _ => {
                                let r = rhs.eval(interp)?;
                                let r_true = dispatch::truthy(interp, &r)
                                    .map_err(|e| e.or_pos(*pos))?;
                                return Ok(Value::Bool(r_true));
                            }
                        }
                    }
                    let r = rhs.eval(interp)?;
                    return Ok(dispatch::binary(interp, *op, &l, &r)
                        .map_err(|e| e.or_pos(*pos))?);
                }

                let l = lhs.eval(interp)?;
                let r = rhs.eval(interp)?;
                Ok(dispatch::binary(interp, *op, &l, &r).map_err(|e| e.or_pos(*pos))?)
            }

            Expr::Unary { op, operand, pos } => {
                let v = operand.eval(interp)?;
                Ok(dispatch::unary(interp, *op, &v).map_err(|e| e.or_pos(*pos))?)
            }

            Expr::Index { obj, index, pos } => {
                let obj = obj.eval(interp)?;
                let index = index.eval(interp)?;
                Ok(dispatch::get_item(interp, &obj, &index).map_err(|e| e.or_pos(*pos))?)
            }

            Expr::Slice {
                obj,
                start,
                stop,
                step,
                pos,
            } => {
                let obj = obj.eval(interp)?;
                let start = eval_bound(interp, start)?;
                let stop = eval_bound(interp, stop)?;
                let step = eval_bound(interp, step)?;
                Ok(crate::value::impls::slice(&obj, start, stop, step)
                    .map_err(|e| e.or_pos(*pos))?)
            }

            Expr::Call {
                callee,
                args,
                kwargs,
                pos,
            } => call::eval_call(interp, callee, args, kwargs, *pos),

            Expr::Attr { obj, name, pos } => {
                let obj = obj.eval(interp)?;
                Ok(eval_attr(&obj, name).map_err(|e| e.or_pos(*pos))?)
            }

            Expr::Array(items, _) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.eval(interp)?);
                }
                Ok(Value::array(out))
            }

            Expr::Tuple(items, _) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.eval(interp)?);
                }
                Ok(Value::tuple(out))
            }

            Expr::Map(pairs, pos) => {
                let mut out = IndexMap::with_capacity(pairs.len());
                for (key, value) in pairs {
                    let key = key.eval(interp)?;
                    let key = HashableValue::try_new(key).map_err(|e| e.or_pos(*pos))?;
                    out.insert(key, value.eval(interp)?);
                }
                Ok(Value::map(out))
            }

            Expr::Lambda(decl) => Ok(Value::Func(Rc::new(FunctionValue::declared(
                decl.clone(),
                interp.scopes.snapshot(),
            )))),

            Expr::CmdCapture(line, pos) => {
                Ok(crate::cmd::run_capture(interp, line).map_err(|e| e.or_pos(*pos))?)
            }

            Expr::Glob {
                pattern,
                recursive,
                pos,
            } => {
                let words = interp
                    .glob()
                    .expand(pattern, *recursive)
                    .map_err(|e| e.or_pos(*pos))?;
                Ok(Value::array(words.into_iter().map(Value::str).collect()))
            }
        }
    }
}

fn eval_literal(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Real(r) => Value::Real(*r),
        Literal::Str(s) => Value::str(s.clone()),
    }
}

fn eval_bound(interp: &mut Interp, bound: &Option<Box<Expr>>) -> Flow<Option<i64>> {
    match bound {
        None => Ok(None),
        Some(expr) => match expr.eval(interp)? {
            Value::Int(n) => Ok(Some(n)),
            other => Err(RuntimeError::incompatible(format!(
                "slice bound must be int, not '{}'",
                other.type_name()
            ))
            .into()),
        },
    }
}

/// Attribute access across every receiver kind.
pub(crate) fn eval_attr(obj: &Value, name: &str) -> crate::error::Result<Value> {
    match obj {
        Value::Instance(instance) => instance.attr(name),
        Value::Type(ty) => ty.search_attr(name).ok_or_else(|| {
            RuntimeError::new(
                ErrorKind::IdNotFound,
                format!("type '{}' has no attribute '{name}'", ty.name()),
            )
        }),
        Value::Module(module) => module.attr(name),
        Value::Iface(_) => Err(RuntimeError::incompatible(
            "methods from interface can't be called",
        )),
        other => Err(RuntimeError::incompatible(format!(
            "type '{}' has no attributes",
            other.type_name()
        ))),
    }
}
