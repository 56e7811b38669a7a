//! Declared-class and interface semantics
//!
//! The class executor drives these in order: create the descriptor
//! (inheriting the base's abstract map), run the body into the class
//! table, then, for concrete classes, check the abstract map and the
//! declared interfaces.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use crate::error::{ErrorKind, Result, RuntimeError};
use crate::eval::Interp;
use crate::object::{AbstractMethod, Instance, InterfaceDesc, TypeDesc};
use crate::value::Value;

/// Step 1 and 3 of class construction: build the descriptor and copy
/// the base's abstract-method map. Duplicate names in the inherited map
/// are fatal.
pub fn new_decl_class(
    name: &str,
    base: Option<Value>,
    ifaces: Vec<Value>,
    abstract_: bool,
) -> Result<Rc<TypeDesc>> {
    let base = match base {
        None => None,
        Some(Value::Type(base)) => Some(base),
        Some(other) => {
            return Err(RuntimeError::incompatible(format!(
                "base of class '{name}' must be a class, not '{}'",
                other.type_name()
            )))
        }
    };

    let ty = Rc::new(TypeDesc::new_declared(name, base.clone(), ifaces, abstract_));

    // Only declared bases carry abstract methods.
    if let Some(base) = base.filter(|b| b.declared()) {
        let inherited = base.abstract_methods().borrow();
        let mut own = ty.abstract_methods().borrow_mut();
        for (mname, sig) in inherited.iter() {
            if own.contains_key(mname) {
                return Err(RuntimeError::incompatible(format!(
                    "not allowed same name '{mname}' method on class"
                )));
            }
            own.insert(mname.clone(), *sig);
        }
    }

    Ok(ty)
}

/// Record an abstract member while the class body runs.
///
/// Requires the class to be abstract, the name to be new to the
/// abstract map, and the name not to collide with any resolvable
/// attribute.
pub fn add_abstract_method(ty: &TypeDesc, name: &str, sig: AbstractMethod) -> Result<()> {
    if !ty.is_abstract() {
        return Err(RuntimeError::incompatible(format!(
            "not allowed abstract '{name}' method on no abstract class"
        )));
    }
    if ty.abstract_methods().borrow().contains_key(name) {
        return Err(RuntimeError::incompatible(format!(
            "not allowed same name '{name}' method on class"
        )));
    }
    if ty.exists_attr(name) {
        return Err(RuntimeError::incompatible(format!(
            "not allowed same name '{name}' attribute on class"
        )));
    }
    ty.abstract_methods().borrow_mut().insert(name.to_string(), sig);
    Ok(())
}

fn resolve_concrete(ty: &TypeDesc, name: &str) -> Result<Rc<crate::value::FunctionValue>> {
    let value = ty.search_attr(name).ok_or_else(|| {
        RuntimeError::incompatible(format!("method '{name}' is not implemented"))
    })?;
    match value {
        Value::Func(func) => Ok(func),
        _ => Err(RuntimeError::incompatible(format!(
            "attribute '{name}' is not a method"
        ))),
    }
}

/// Step 5: every abstract name on a concrete class must resolve to a
/// function with a matching signature.
pub fn check_abstract_methods(ty: &TypeDesc) -> Result<()> {
    if ty.is_abstract() {
        return Ok(());
    }

    for (name, sig) in ty.abstract_methods().borrow().iter() {
        let func = resolve_concrete(ty, name)?;
        if !sig.matches_func(&func) {
            return Err(RuntimeError::incompatible(format!(
                "method '{name}' has wrong number of parameters"
            )));
        }
        // The signature rule ignores default counts off the variadic
        // branch; surface a changed count instead of failing.
        if !sig.variadic && func.num_default_params() != sig.num_default_params {
            warn!(
                method = name,
                expected = sig.num_default_params,
                got = func.num_default_params(),
                "override changes default parameter count"
            );
        }
    }
    Ok(())
}

/// Step 6: each declared interface must be satisfied. A requirement may
/// stay abstract on an abstract class when the signatures agree;
/// otherwise it must resolve to an equal-signature function.
pub fn check_interface_compatibility(ty: &TypeDesc) -> Result<()> {
    for iface in ty.ifaces() {
        let iface = match iface {
            Value::Iface(i) => i,
            other => {
                return Err(RuntimeError::incompatible(format!(
                    "only interface supported, not '{}'",
                    other.type_name()
                )))
            }
        };

        for (name, required) in iface.methods().iter() {
            if let Some(declared) = ty.abstract_methods().borrow().get(name) {
                if required.matches(declared) {
                    continue;
                }
            }

            let func = resolve_concrete(ty, name).map_err(|mut err| {
                err.msg = format!(
                    "class '{}' does not implement method '{name}' of interface '{}'",
                    ty.name(),
                    iface.name()
                );
                err
            })?;
            if !required.matches_func(&func) {
                return Err(RuntimeError::incompatible(format!(
                    "method '{name}' has wrong number of parameters"
                )));
            }
        }
    }
    Ok(())
}

/// Instantiate a declared class: allocate, then run `__init__` with
/// `self` prepended when the chain provides one. Abstract classes do
/// not construct.
pub fn construct_instance(
    interp: &mut Interp,
    ty: &Rc<TypeDesc>,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<Value> {
    if ty.is_abstract() {
        return Err(RuntimeError::incompatible(format!(
            "abstract class '{}' can not be instantiated",
            ty.name()
        )));
    }

    let instance = Instance::new(ty.clone());
    let self_value = Value::Instance(instance);

    if let Some(Value::Func(init)) = ty.search_attr("__init__") {
        let mut call_args = Vec::with_capacity(args.len() + 1);
        call_args.push(self_value.clone());
        call_args.extend(args);
        crate::eval::call::call_function(interp, &init, call_args, kwargs)?;
    } else if !args.is_empty() || !kwargs.is_empty() {
        return Err(RuntimeError::new(
            ErrorKind::FuncParams,
            format!("{}() takes no arguments", ty.name()),
        ));
    }

    Ok(self_value)
}

/// Build an interface descriptor, folding in base-interface methods.
/// Duplicate names across bases are errors, as are non-interface bases.
pub fn new_interface(
    name: &str,
    bases: Vec<Value>,
    own: Vec<(String, AbstractMethod)>,
) -> Result<Rc<InterfaceDesc>> {
    let mut methods: IndexMap<String, AbstractMethod> = IndexMap::new();

    for base in &bases {
        let base = match base {
            Value::Iface(i) => i,
            other => {
                return Err(RuntimeError::incompatible(format!(
                    "base of interface '{name}' must be an interface, not '{}'",
                    other.type_name()
                )))
            }
        };
        for (mname, sig) in base.methods().iter() {
            if methods.insert(mname.clone(), *sig).is_some() {
                return Err(RuntimeError::incompatible(format!(
                    "not allowed same name '{mname}' method on interface"
                )));
            }
        }
    }

    for (mname, sig) in own {
        if methods.insert(mname.clone(), sig).is_some() {
            return Err(RuntimeError::incompatible(format!(
                "not allowed same name '{mname}' method on interface"
            )));
        }
    }

    Ok(Rc::new(InterfaceDesc::new(name, methods)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Block, FuncDecl};
    use crate::scope::ScopeStack;
    use crate::value::FunctionValue;

    fn sig(num: usize, variadic: bool) -> AbstractMethod {
        AbstractMethod {
            num_params: num,
            num_default_params: 0,
            variadic,
        }
    }

    fn func_value(params: &[&str]) -> Value {
        Value::Func(Rc::new(FunctionValue::declared(
            Rc::new(FuncDecl::simple("f", params, Block::default())),
            ScopeStack::new(),
        )))
    }

    fn abstract_class(name: &str) -> Rc<TypeDesc> {
        new_decl_class(name, None, vec![], true).unwrap()
    }

    #[test]
    fn test_abstract_method_requires_abstract_class() {
        let ty = new_decl_class("C", None, vec![], false).unwrap();
        let err = add_abstract_method(&ty, "f", sig(1, false)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncompatibleType);
    }

    #[test]
    fn test_abstract_method_unique_names() {
        let ty = abstract_class("A");
        add_abstract_method(&ty, "f", sig(1, false)).unwrap();
        assert!(add_abstract_method(&ty, "f", sig(2, false)).is_err());
    }

    #[test]
    fn test_abstract_method_collision_with_attr() {
        let ty = abstract_class("A");
        ty.register_method("f", func_value(&["self"])).unwrap();
        let err = add_abstract_method(&ty, "f", sig(1, false)).unwrap_err();
        assert!(err.msg.contains("attribute"));
    }

    #[test]
    fn test_inherited_abstract_map() {
        let base = abstract_class("A");
        add_abstract_method(&base, "f", sig(2, false)).unwrap();

        let derived = new_decl_class("B", Some(Value::Type(base)), vec![], true).unwrap();
        assert!(derived.abstract_methods().borrow().contains_key("f"));
    }

    #[test]
    fn test_concrete_class_must_implement() {
        let base = abstract_class("A");
        add_abstract_method(&base, "f", sig(2, false)).unwrap();

        // Missing implementation fails.
        let b = new_decl_class("B", Some(Value::Type(base.clone())), vec![], false).unwrap();
        assert!(check_abstract_methods(&b).is_err());

        // Matching implementation passes. `self` plus one argument is
        // two parameters against a two-parameter signature.
        let c = new_decl_class("C", Some(Value::Type(base)), vec![], false).unwrap();
        c.register_method("f", func_value(&["self", "x"])).unwrap();
        check_abstract_methods(&c).unwrap();
    }

    #[test]
    fn test_wrong_arity_names_method() {
        let base = abstract_class("A");
        add_abstract_method(&base, "f", sig(2, false)).unwrap();

        let b = new_decl_class("B", Some(Value::Type(base)), vec![], false).unwrap();
        b.register_method("f", func_value(&["self", "x", "y"])).unwrap();
        let err = check_abstract_methods(&b).unwrap_err();
        assert!(err.msg.contains("'f'"));
    }

    #[test]
    fn test_interface_conformance() {
        let iface = new_interface("I", vec![], vec![("g".to_string(), sig(2, false))]).unwrap();

        let bad = new_decl_class("C", None, vec![Value::Iface(iface.clone())], false).unwrap();
        bad.register_method("g", func_value(&["self"])).unwrap();
        assert!(check_interface_compatibility(&bad).is_err());

        let good = new_decl_class("D", None, vec![Value::Iface(iface)], false).unwrap();
        good.register_method("g", func_value(&["self", "x"])).unwrap();
        check_interface_compatibility(&good).unwrap();
    }

    #[test]
    fn test_interface_satisfied_by_matching_abstract() {
        let iface = new_interface("I", vec![], vec![("g".to_string(), sig(2, false))]).unwrap();

        let ty = new_decl_class("A", None, vec![Value::Iface(iface)], true).unwrap();
        add_abstract_method(&ty, "g", sig(2, false)).unwrap();
        check_interface_compatibility(&ty).unwrap();
    }

    #[test]
    fn test_interface_base_inheritance_and_duplicates() {
        let base = new_interface("I", vec![], vec![("g".to_string(), sig(1, false))]).unwrap();
        let child = new_interface(
            "J",
            vec![Value::Iface(base.clone())],
            vec![("h".to_string(), sig(1, false))],
        )
        .unwrap();
        assert_eq!(child.methods().len(), 2);

        // A duplicate across base and own methods is fatal.
        let dup = new_interface(
            "K",
            vec![Value::Iface(base)],
            vec![("g".to_string(), sig(1, false))],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_non_interface_rejected() {
        let not_iface = Value::Int(1);
        let ty = new_decl_class("C", None, vec![not_iface], false).unwrap();
        let err = check_interface_compatibility(&ty).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncompatibleType);
    }
}
