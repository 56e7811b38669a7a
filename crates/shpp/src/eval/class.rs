//! Class and interface declaration execution

use std::rc::Rc;

use crate::ast::{ClassDecl, IfaceDecl, Stmt};
use crate::error::Result;
use crate::eval::{Evaluate, Execute, Interp, Interrupt};
use crate::object::{self, AbstractMethod};
use crate::value::{FunctionValue, Value};

/// Execute a class declaration.
///
/// The descriptor is created first (inheriting the base's abstract
/// map), the body then runs inside the class table, and the
/// conformance checks close the declaration. Only after everything
/// passes does the class name bind in the enclosing scope.
pub fn exec_class_decl(interp: &mut Interp, decl: &ClassDecl) -> Result<()> {
    let base = match &decl.base {
        Some(expr) => Some(expr.eval(interp).map_err(Interrupt::into_error)?),
        None => None,
    };
    let mut ifaces = Vec::with_capacity(decl.ifaces.len());
    for expr in &decl.ifaces {
        ifaces.push(expr.eval(interp).map_err(Interrupt::into_error)?);
    }

    let ty = object::new_decl_class(&decl.name, base, ifaces, decl.abstract_)
        .map_err(|e| e.or_pos(decl.pos))?;

    // The class body runs with the class table innermost, so member
    // declarations land on the type while methods still capture the
    // surrounding lexical scopes.
    interp.scopes.push_table(ty.attrs_table().clone());
    let body_result = exec_class_body(interp, &ty, &decl.body.stmts);
    interp.scopes.pop();
    body_result.map_err(|e| e.or_pos(decl.pos))?;

    object::check_abstract_methods(&ty).map_err(|e| e.or_pos(decl.pos))?;
    object::check_interface_compatibility(&ty).map_err(|e| e.or_pos(decl.pos))?;

    interp.scopes.set(&decl.name, Value::Type(ty));
    Ok(())
}

fn exec_class_body(
    interp: &mut Interp,
    ty: &Rc<object::TypeDesc>,
    stmts: &[Stmt],
) -> Result<()> {
    for stmt in stmts {
        match stmt {
            Stmt::FuncDecl(func) if func.abstract_ => {
                let name = func.name.as_deref().expect("abstract member has a name");
                object::add_abstract_method(ty, name, AbstractMethod::of_decl(func))?;
            }
            Stmt::FuncDecl(func) => {
                let name = func.name.as_deref().expect("class member has a name");
                let value = Value::Func(Rc::new(FunctionValue::declared(
                    func.clone(),
                    interp.scopes.snapshot(),
                )));
                ty.register_method(name, value)?;
            }
            // Simple assignments declare class-level data. They target
            // the class table unconditionally, shadowing rather than
            // rebinding any enclosing name.
            Stmt::Assign {
                targets,
                values,
                ..
            } if targets.len() == values.len()
                && targets.iter().all(|t| matches!(t, crate::ast::Expr::Ident(_, _))) =>
            {
                for (target, value) in targets.iter().zip(values) {
                    let crate::ast::Expr::Ident(name, _) = target else {
                        unreachable!("guard checked idents");
                    };
                    let value = value.eval(interp).map_err(Interrupt::into_error)?;
                    ty.attrs_table().borrow_mut().set(name, value);
                }
            }
            other => other.exec(interp).map_err(Interrupt::into_error)?,
        }
    }
    Ok(())
}

/// Execute an interface declaration.
pub fn exec_iface_decl(interp: &mut Interp, decl: &IfaceDecl) -> Result<()> {
    let mut bases = Vec::with_capacity(decl.bases.len());
    for expr in &decl.bases {
        bases.push(expr.eval(interp).map_err(Interrupt::into_error)?);
    }

    let methods = decl
        .methods
        .iter()
        .map(|m| (m.name.clone(), AbstractMethod::of_iface_method(m)))
        .collect();

    let iface =
        object::new_interface(&decl.name, bases, methods).map_err(|e| e.or_pos(decl.pos))?;
    interp.scopes.set(&decl.name, Value::Iface(iface));
    Ok(())
}
