//! Function and constructor calls

use crate::ast::Expr;
use crate::dispatch::{self, DunderOp};
use crate::error::{ErrorKind, Pos, Result, RuntimeError};
use crate::eval::{control::Flow, Evaluate, Interp, Interrupt};
use crate::value::{FnImpl, FunctionValue, Value};

/// Evaluate callee and arguments, then dispatch the call.
///
/// A method call holds a strong handle to its receiver for the whole
/// call, so `T().m()` works even though the bound wrapper itself only
/// refers to the instance weakly.
pub fn eval_call(
    interp: &mut Interp,
    callee: &Expr,
    args: &[Expr],
    kwargs: &[(String, Expr)],
    pos: Pos,
) -> Flow<Value> {
    let _receiver_guard;
    let callee = match callee {
        Expr::Attr { obj, name, pos } => {
            let receiver = obj.eval(interp)?;
            let attr = crate::eval::expr::eval_attr(&receiver, name)
                .map_err(|e| e.or_pos(*pos))?;
            _receiver_guard = Some(receiver);
            attr
        }
        other => {
            _receiver_guard = None;
            other.eval(interp)?
        }
    };
    let mut arg_values = Vec::with_capacity(args.len());
    for arg in args {
        arg_values.push(arg.eval(interp)?);
    }
    let mut kwarg_values = Vec::with_capacity(kwargs.len());
    for (name, expr) in kwargs {
        kwarg_values.push((name.clone(), expr.eval(interp)?));
    }
    Ok(call_value(interp, &callee, arg_values, kwarg_values).map_err(|e| e.or_pos(pos))?)
}

/// Call any callable value.
pub fn call_value(
    interp: &mut Interp,
    callee: &Value,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<Value> {
    match callee {
        Value::Func(func) => call_function(interp, func, args, kwargs),
        Value::Bound(bound) => {
            let receiver = bound.receiver()?;
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(receiver);
            full.extend(args);
            call_function(interp, &bound.func, full, kwargs)
        }
        Value::Type(ty) => crate::object::construct(interp, ty, args, kwargs),
        Value::Iface(iface) => Err(RuntimeError::incompatible(format!(
            "interface '{}' can not be instantiated",
            iface.name()
        ))),
        Value::Instance(_) => dispatch::call_dunder(interp, callee, DunderOp::Call, args),
        other => Err(RuntimeError::incompatible(format!(
            "type '{}' is not callable",
            other.type_name()
        ))),
    }
}

/// Call a function value with positional and keyword arguments.
pub fn call_function(
    interp: &mut Interp,
    func: &FunctionValue,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<Value> {
    match &func.imp {
        FnImpl::Builtin(builtin) => {
            if !kwargs.is_empty() {
                return Err(RuntimeError::new(
                    ErrorKind::FuncParams,
                    format!("{}() takes no keyword arguments", func.name),
                ));
            }
            if let Some(arity) = builtin.arity {
                if args.len() != arity {
                    return Err(RuntimeError::new(
                        ErrorKind::FuncParams,
                        format!(
                            "{}() takes exactly {arity} argument(s), got {}",
                            func.name,
                            args.len()
                        ),
                    ));
                }
            }
            (builtin.func)(interp, args)
        }
        FnImpl::Declared(declared) => {
            interp.enter_call()?;

            // The body runs against the declaration-site snapshot with
            // one fresh frame for the parameters.
            let saved = std::mem::replace(&mut interp.scopes, declared.scope.snapshot());
            interp.scopes.push();

            let result = bind_params(interp, func, args, kwargs).and_then(|()| {
                run_body(interp, &declared.decl.body)
            });

            interp.scopes.pop();
            interp.scopes = saved;
            interp.exit_call();

            result
        }
    }
}

fn run_body(interp: &mut Interp, body: &crate::ast::Block) -> Result<Value> {
    let outcome = interp.with_defer_frame(|interp| {
        for stmt_node in &body.stmts {
            crate::eval::Execute::exec(stmt_node, interp)?;
        }
        Ok(())
    });

    match outcome {
        Ok(()) => Ok(Value::Null),
        Err(Interrupt::Return(value)) => Ok(value),
        Err(other) => Err(other.into_error()),
    }
}

/// Bind call arguments to parameters in the innermost scope:
/// positionals first, then keywords by name, then defaults; a variadic
/// tail collects the surplus into an array.
fn bind_params(
    interp: &mut Interp,
    func: &FunctionValue,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<()> {
    let decl = &func
        .declared_fn()
        .expect("bind_params only runs for declared functions")
        .decl;
    let params = &decl.params;

    let plain_count = if decl.variadic {
        params.len().saturating_sub(1)
    } else {
        params.len()
    };

    if !decl.variadic && args.len() > params.len() {
        return Err(RuntimeError::new(
            ErrorKind::FuncParams,
            format!(
                "{}() takes {} argument(s), got {}",
                func.name,
                params.len(),
                args.len()
            ),
        ));
    }

    let mut bound: Vec<Option<Value>> = vec![None; params.len()];
    let mut args = args.into_iter();

    for slot in bound.iter_mut().take(plain_count) {
        match args.next() {
            Some(value) => *slot = Some(value),
            None => break,
        }
    }

    for (name, value) in kwargs {
        let idx = params.iter().position(|p| p.name == name).ok_or_else(|| {
            RuntimeError::new(
                ErrorKind::FuncParams,
                format!("{}() has no parameter '{name}'", func.name),
            )
        })?;
        if bound[idx].is_some() {
            return Err(RuntimeError::new(
                ErrorKind::FuncParams,
                format!("{}() got multiple values for '{name}'", func.name),
            ));
        }
        bound[idx] = Some(value);
    }

    for (idx, param) in params.iter().enumerate().take(plain_count) {
        if bound[idx].is_none() {
            match &param.default {
                Some(default) => {
                    let value = default
                        .eval(interp)
                        .map_err(Interrupt::into_error)?;
                    bound[idx] = Some(value);
                }
                None => {
                    return Err(RuntimeError::new(
                        ErrorKind::FuncParams,
                        format!("{}() missing argument '{}'", func.name, param.name),
                    ))
                }
            }
        }
    }

    if decl.variadic && !params.is_empty() {
        let rest: Vec<Value> = args.collect();
        bound[params.len() - 1] = Some(Value::array(rest));
    }

    for (param, value) in params.iter().zip(bound) {
        let value = value.expect("every parameter bound above");
        interp.scopes.top().borrow_mut().set(&param.name, value);
    }
    Ok(())
}
