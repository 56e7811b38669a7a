//! Statement execution

use std::rc::Rc;

use crate::ast::{Block, Expr, Stmt};
use crate::dispatch;
use crate::error::{ErrorKind, RuntimeError};
use crate::eval::{class, control::Flow, Evaluate, Execute, Interp, Interrupt};
use crate::value::{callable::CmdDecl, FunctionValue, Value};

/// Execute a block in a fresh scope with its own defer stack.
///
/// Every scope kind owns its deferred statements: a `defer` inside an
/// `if` or loop body flushes when that block exits, not when the
/// enclosing function unwinds.
pub fn exec_block(interp: &mut Interp, block: &Block) -> Flow<()> {
    interp.scopes.push();
    let result = interp.with_defer_frame(|interp| exec_stmts(interp, block));
    interp.scopes.pop();
    result
}

fn exec_stmts(interp: &mut Interp, block: &Block) -> Flow<()> {
    for stmt in &block.stmts {
        stmt.exec(interp)?;
    }
    Ok(())
}

impl Execute for Stmt {
    fn exec(&self, interp: &mut Interp) -> Flow<()> {
        match self {
            Stmt::Expr(expr) => {
                expr.eval(interp)?;
                Ok(())
            }

            Stmt::Assign {
                targets,
                values,
                pos,
            } => {
                if targets.len() == values.len() {
                    let evaluated: Vec<Value> = values
                        .iter()
                        .map(|v| v.eval(interp))
                        .collect::<Flow<_>>()?;
                    for (target, value) in targets.iter().zip(evaluated) {
                        assign_to(interp, target, value)?;
                    }
                    return Ok(());
                }

                // One right-hand value unpacks across several targets.
                if values.len() == 1 {
                    let value = values[0].eval(interp)?;
                    let items: Vec<Value> = match &value {
                        Value::Array(items) => items.borrow().clone(),
                        Value::Tuple(items) => items.as_ref().clone(),
                        _ => {
                            return Err(RuntimeError::with_pos(
                                ErrorKind::IncompatibleType,
                                format!("cannot unpack '{}'", value.type_name()),
                                *pos,
                            )
                            .into())
                        }
                    };
                    if items.len() != targets.len() {
                        return Err(RuntimeError::with_pos(
                            ErrorKind::IncompatibleType,
                            format!(
                                "cannot unpack {} values into {} targets",
                                items.len(),
                                targets.len()
                            ),
                            *pos,
                        )
                        .into());
                    }
                    for (target, item) in targets.iter().zip(items) {
                        assign_to(interp, target, item)?;
                    }
                    return Ok(());
                }

                Err(RuntimeError::with_pos(
                    ErrorKind::IncompatibleType,
                    "mismatched assignment arity",
                    *pos,
                )
                .into())
            }

            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                let cond = cond.eval(interp)?;
                if dispatch::truthy(interp, &cond)? {
                    exec_block(interp, then_block)
                } else if let Some(else_block) = else_block {
                    exec_block(interp, else_block)
                } else {
                    Ok(())
                }
            }

            Stmt::While { cond, body } => {
                loop {
                    let value = cond.eval(interp)?;
                    if !dispatch::truthy(interp, &value)? {
                        break;
                    }
                    match exec_block(interp, body) {
                        Ok(()) | Err(Interrupt::Continue) => {}
                        Err(Interrupt::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }

            Stmt::For {
                var,
                iterable,
                body,
            } => {
                let iterable = iterable.eval(interp)?;
                let iter = dispatch::iter_value(interp, &iterable)?;
                while dispatch::has_next(interp, &iter)? {
                    let item = dispatch::next_value(interp, &iter)?;
                    interp.scopes.push();
                    interp.scopes.top().borrow_mut().set(var, item);
                    // Each iteration is one block scope; its defers
                    // flush before the next iteration starts.
                    let result =
                        interp.with_defer_frame(|interp| exec_stmts(interp, body));
                    interp.scopes.pop();
                    match result {
                        Ok(()) | Err(Interrupt::Continue) => {}
                        Err(Interrupt::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => expr.eval(interp)?,
                    None => Value::Null,
                };
                Err(Interrupt::Return(value))
            }

            Stmt::Break { .. } => Err(Interrupt::Break),
            Stmt::Continue { .. } => Err(Interrupt::Continue),

            Stmt::Throw { value, pos } => {
                let value = value.eval(interp)?;
                let msg = dispatch::to_print(interp, &value)?;
                Err(RuntimeError::with_pos(ErrorKind::Custom, msg, *pos).into())
            }

            Stmt::Defer { stmt, .. } => {
                let snapshot = interp.scopes.snapshot();
                interp.push_defer((**stmt).clone(), snapshot)?;
                Ok(())
            }

            Stmt::FuncDecl(decl) => {
                let name = decl
                    .name
                    .clone()
                    .expect("parser never emits an unnamed func statement");
                let func = Value::Func(Rc::new(FunctionValue::declared(
                    decl.clone(),
                    interp.scopes.snapshot(),
                )));
                interp.scopes.set(&name, func);
                Ok(())
            }

            Stmt::ClassDecl(decl) => Ok(class::exec_class_decl(interp, decl)?),
            Stmt::IfaceDecl(decl) => Ok(class::exec_iface_decl(interp, decl)?),

            Stmt::CmdDecl { name, body, .. } => {
                interp.scopes.insert_cmd(Rc::new(CmdDecl {
                    name: name.clone(),
                    body: body.clone(),
                    scope: interp.scopes.snapshot(),
                }));
                Ok(())
            }

            Stmt::Cmd(line) => {
                crate::cmd::run_statement(interp, line).map_err(|e| e.or_pos(line.pos))?;
                Ok(())
            }
        }
    }
}

/// Store a value through an assignable expression.
fn assign_to(interp: &mut Interp, target: &Expr, value: Value) -> Flow<()> {
    match target {
        Expr::Ident(name, _) => {
            interp.scopes.set(name, value);
            Ok(())
        }
        Expr::Attr { obj, name, pos } => {
            let obj = obj.eval(interp)?;
            match obj {
                // Instance assignment always lands in the instance's
                // own table.
                Value::Instance(instance) => {
                    instance.set_attr(name, value);
                    Ok(())
                }
                Value::Type(ty) => {
                    ty.attrs_table().borrow_mut().set(name, value);
                    Ok(())
                }
                other => Err(RuntimeError::with_pos(
                    ErrorKind::IncompatibleType,
                    format!("cannot assign attribute on '{}'", other.type_name()),
                    *pos,
                )
                .into()),
            }
        }
        Expr::Index { obj, index, pos } => {
            let obj = obj.eval(interp)?;
            let index = index.eval(interp)?;
            dispatch::set_item(interp, &obj, &index, value).map_err(|e| e.or_pos(*pos))?;
            Ok(())
        }
        other => Err(RuntimeError::with_pos(
            ErrorKind::IncompatibleType,
            "expression is not assignable",
            other.pos(),
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;
    use crate::error::Pos;

    fn assign(name: &str, value: Expr) -> Stmt {
        Stmt::Assign {
            targets: vec![Expr::ident(name)],
            values: vec![value],
            pos: Pos::default(),
        }
    }

    fn block(stmts: Vec<Stmt>) -> Block {
        Block { stmts }
    }

    #[test]
    fn test_assign_and_read() {
        let mut interp = Interp::new();
        assign("x", Expr::int(5)).exec(&mut interp).unwrap();
        assert_eq!(interp.scopes().lookup("x"), Some(Value::Int(5)));
    }

    #[test]
    fn test_unpack_assignment() {
        let mut interp = Interp::new();
        let stmt = Stmt::Assign {
            targets: vec![Expr::ident("a"), Expr::ident("b")],
            values: vec![Expr::Tuple(
                vec![Expr::int(1), Expr::int(2)],
                Pos::default(),
            )],
            pos: Pos::default(),
        };
        stmt.exec(&mut interp).unwrap();
        assert_eq!(interp.scopes().lookup("a"), Some(Value::Int(1)));
        assert_eq!(interp.scopes().lookup("b"), Some(Value::Int(2)));
    }

    #[test]
    fn test_unpack_arity_mismatch() {
        let mut interp = Interp::new();
        let stmt = Stmt::Assign {
            targets: vec![Expr::ident("a"), Expr::ident("b")],
            values: vec![Expr::Tuple(vec![Expr::int(1)], Pos::default())],
            pos: Pos::default(),
        };
        assert!(matches!(
            stmt.exec(&mut interp),
            Err(Interrupt::Error(_))
        ));
    }

    #[test]
    fn test_if_else() {
        let mut interp = Interp::new();
        let stmt = Stmt::If {
            cond: Expr::bool(false),
            then_block: block(vec![assign("x", Expr::int(1))]),
            else_block: Some(block(vec![assign("x", Expr::int(2))])),
        };
        interp.scopes_mut().set("x", Value::Int(0));
        stmt.exec(&mut interp).unwrap();
        assert_eq!(interp.scopes().lookup("x"), Some(Value::Int(2)));
    }

    #[test]
    fn test_while_with_break() {
        let mut interp = Interp::new();
        interp.scopes_mut().set("n", Value::Int(0));

        // while true { n = n + 1; if n >= 3 { break } }
        let stmt = Stmt::While {
            cond: Expr::bool(true),
            body: block(vec![
                assign(
                    "n",
                    Expr::binary(BinOp::Add, Expr::ident("n"), Expr::int(1)),
                ),
                Stmt::If {
                    cond: Expr::binary(BinOp::Ge, Expr::ident("n"), Expr::int(3)),
                    then_block: block(vec![Stmt::Break { pos: Pos::default() }]),
                    else_block: None,
                },
            ]),
        };
        stmt.exec(&mut interp).unwrap();
        assert_eq!(interp.scopes().lookup("n"), Some(Value::Int(3)));
    }

    #[test]
    fn test_for_over_array() {
        let mut interp = Interp::new();
        interp.scopes_mut().set("sum", Value::Int(0));

        let stmt = Stmt::For {
            var: "i".to_string(),
            iterable: Expr::Array((1..=4).map(Expr::int).collect(), Pos::default()),
            body: block(vec![assign(
                "sum",
                Expr::binary(BinOp::Add, Expr::ident("sum"), Expr::ident("i")),
            )]),
        };
        stmt.exec(&mut interp).unwrap();
        assert_eq!(interp.scopes().lookup("sum"), Some(Value::Int(10)));
        // The loop variable does not leak.
        assert!(!interp.scopes().exists("i"));
    }

    #[test]
    fn test_loop_scope_does_not_leak() {
        let mut interp = Interp::new();
        let stmt = Stmt::If {
            cond: Expr::bool(true),
            then_block: block(vec![assign("inner", Expr::int(1))]),
            else_block: None,
        };
        stmt.exec(&mut interp).unwrap();
        assert!(!interp.scopes().exists("inner"));
    }

    #[test]
    fn test_block_defer_flushes_at_block_exit() {
        let mut interp = Interp::new();
        interp.scopes_mut().set("x", Value::str(""));

        // if true { defer x = x + "a"; x = x + "b" }
        let stmt = Stmt::If {
            cond: Expr::bool(true),
            then_block: block(vec![
                Stmt::Defer {
                    stmt: Box::new(assign(
                        "x",
                        Expr::binary(BinOp::Add, Expr::ident("x"), Expr::str("a")),
                    )),
                    pos: Pos::default(),
                },
                assign(
                    "x",
                    Expr::binary(BinOp::Add, Expr::ident("x"), Expr::str("b")),
                ),
            ]),
            else_block: None,
        };
        stmt.exec(&mut interp).unwrap();

        // The defer ran when the if-block exited, not later.
        assert_eq!(interp.scopes().lookup("x"), Some(Value::str("ba")));
    }

    #[test]
    fn test_throw_becomes_custom_error() {
        let mut interp = Interp::new();
        let stmt = Stmt::Throw {
            value: Expr::str("boom"),
            pos: Pos::new(1, 1),
        };
        match stmt.exec(&mut interp) {
            Err(Interrupt::Error(err)) => {
                assert_eq!(err.kind, ErrorKind::Custom);
                assert_eq!(err.msg, "boom");
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_index_assignment() {
        let mut interp = Interp::new();
        interp
            .scopes_mut()
            .set("arr", Value::array(vec![Value::Int(1), Value::Int(2)]));
        let stmt = Stmt::Assign {
            targets: vec![Expr::Index {
                obj: Box::new(Expr::ident("arr")),
                index: Box::new(Expr::int(1)),
                pos: Pos::default(),
            }],
            values: vec![Expr::int(9)],
            pos: Pos::default(),
        };
        stmt.exec(&mut interp).unwrap();
        assert_eq!(
            interp.scopes().lookup("arr"),
            Some(Value::array(vec![Value::Int(1), Value::Int(9)]))
        );
    }
}
