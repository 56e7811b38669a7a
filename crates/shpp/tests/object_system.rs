//! End-to-end tests for classes, interfaces, and dispatch
//!
//! Programs are built as AST directly; the parser collaborator is out
//! of scope. Methods declare `self` explicitly, the way the front end
//! desugars them.

use std::rc::Rc;

use shpp::ast::{
    BinOp, Block, ClassDecl, Expr, FuncDecl, IfaceDecl, IfaceMethod, Param, Program, Stmt,
};
use shpp::error::Pos;
use shpp::{ErrorKind, Interp, Value};

fn params(names: &[&str]) -> Vec<Param> {
    names
        .iter()
        .map(|n| Param {
            name: n.to_string(),
            default: None,
        })
        .collect()
}

fn method(name: &str, param_names: &[&str], body: Vec<Stmt>) -> Stmt {
    Stmt::FuncDecl(Rc::new(FuncDecl {
        name: Some(name.to_string()),
        params: params(param_names),
        variadic: false,
        body: Rc::new(Block { stmts: body }),
        static_: false,
        abstract_: false,
        pos: Pos::default(),
    }))
}

fn ret(expr: Expr) -> Stmt {
    Stmt::Return {
        value: Some(expr),
        pos: Pos::default(),
    }
}

fn class(name: &str, base: Option<&str>, ifaces: &[&str], abstract_: bool, body: Vec<Stmt>) -> Stmt {
    Stmt::ClassDecl(Rc::new(ClassDecl {
        name: name.to_string(),
        base: base.map(Expr::ident),
        ifaces: ifaces.iter().map(|i| Expr::ident(*i)).collect(),
        abstract_,
        body: Block { stmts: body },
        pos: Pos::default(),
    }))
}

fn abstract_method(name: &str, param_names: &[&str]) -> Stmt {
    Stmt::FuncDecl(Rc::new(FuncDecl::abstract_sig(name, param_names, false)))
}

fn exec(interp: &mut Interp, stmts: Vec<Stmt>) -> shpp::Result<()> {
    interp.exec_program(&Program { stmts })
}

fn call(f: Expr, args: Vec<Expr>) -> Expr {
    Expr::call(f, args)
}

// Scenario: a concrete subclass satisfying an inherited abstract
// signature declares fine and dispatches.
#[test]
fn abstract_contract_satisfied() {
    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![
            class(
                "A",
                None,
                &[],
                true,
                vec![abstract_method("f", &["self", "x"])],
            ),
            class(
                "B",
                Some("A"),
                &[],
                false,
                vec![method(
                    "f",
                    &["self", "x"],
                    vec![ret(Expr::binary(
                        BinOp::Add,
                        Expr::ident("x"),
                        Expr::int(1),
                    ))],
                )],
            ),
        ],
    )
    .unwrap();

    let result = interp
        .eval_expr(&call(
            Expr::attr(call(Expr::ident("B"), vec![]), "f"),
            vec![Expr::int(2)],
        ))
        .unwrap();
    assert_eq!(result, Value::Int(3));
}

// Scenario: the same subclass with a wrong-arity override fails to
// declare, and the error names the method.
#[test]
fn abstract_contract_arity_mismatch() {
    let mut interp = Interp::new();
    let err = exec(
        &mut interp,
        vec![
            class(
                "A",
                None,
                &[],
                true,
                vec![abstract_method("f", &["self", "x"])],
            ),
            class(
                "B",
                Some("A"),
                &[],
                false,
                vec![method("f", &["self", "x", "y"], vec![ret(Expr::null())])],
            ),
        ],
    )
    .unwrap_err();

    assert_eq!(err.kind, ErrorKind::IncompatibleType);
    assert!(err.msg.contains("'f'"), "message should name 'f': {err}");
}

#[test]
fn abstract_class_cannot_instantiate() {
    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![class(
            "A",
            None,
            &[],
            true,
            vec![abstract_method("f", &["self"])],
        )],
    )
    .unwrap();

    let err = interp
        .eval_expr(&call(Expr::ident("A"), vec![]))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompatibleType);
    assert!(err.msg.contains("abstract"));
}

fn iface_method(name: &str, param_names: &[&str]) -> IfaceMethod {
    IfaceMethod {
        name: name.to_string(),
        params: params(param_names),
        variadic: false,
        pos: Pos::default(),
    }
}

fn iface(name: &str, bases: &[&str], methods: Vec<IfaceMethod>) -> Stmt {
    Stmt::IfaceDecl(Rc::new(IfaceDecl {
        name: name.to_string(),
        bases: bases.iter().map(|b| Expr::ident(*b)).collect(),
        methods,
        pos: Pos::default(),
    }))
}

// Scenario: conformance is checked at declaration, and corrected
// arity makes the same class declare fine.
#[test]
fn interface_conformance() {
    let mut interp = Interp::new();
    let err = exec(
        &mut interp,
        vec![
            iface("I", &[], vec![iface_method("g", &["self", "x", "y"])]),
            class(
                "C",
                None,
                &["I"],
                false,
                vec![method("g", &["self", "x"], vec![ret(Expr::null())])],
            ),
        ],
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompatibleType);

    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![
            iface("I", &[], vec![iface_method("g", &["self", "x", "y"])]),
            class(
                "C",
                None,
                &["I"],
                false,
                vec![method("g", &["self", "x", "y"], vec![ret(Expr::null())])],
            ),
        ],
    )
    .unwrap();
}

#[test]
fn interface_cannot_instantiate() {
    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![iface("I", &[], vec![iface_method("g", &["self"])])],
    )
    .unwrap();

    let err = interp
        .eval_expr(&call(Expr::ident("I"), vec![]))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompatibleType);
}

#[test]
fn interface_duplicate_across_bases_rejected() {
    let mut interp = Interp::new();
    let err = exec(
        &mut interp,
        vec![
            iface("I", &[], vec![iface_method("g", &["self"])]),
            iface("J", &["I"], vec![iface_method("g", &["self"])]),
        ],
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompatibleType);
}

// Scenario: a bound method keeps working when passed around as a
// value, with `self` injected at call time.
#[test]
fn bound_method_carries_self() {
    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![
            class(
                "P",
                None,
                &[],
                false,
                vec![method("name", &["self"], vec![ret(Expr::str("p"))])],
            ),
            Stmt::Assign {
                targets: vec![Expr::ident("p")],
                values: vec![call(Expr::ident("P"), vec![])],
                pos: Pos::default(),
            },
            Stmt::Assign {
                targets: vec![Expr::ident("m")],
                values: vec![Expr::attr(Expr::ident("p"), "name")],
                pos: Pos::default(),
            },
        ],
    )
    .unwrap();

    let result = interp
        .eval_expr(&call(Expr::ident("m"), vec![]))
        .unwrap();
    assert_eq!(result, Value::str("p"));
}

// Scenario: `__add__` dispatches, and an operator with no dunder
// fails with INCOMPATIBLE_TYPE.
#[test]
fn operator_overload_add_only() {
    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![class(
            "V",
            None,
            &[],
            false,
            vec![method(
                "__add__",
                &["self", "o"],
                vec![ret(call(Expr::ident("V"), vec![]))],
            )],
        )],
    )
    .unwrap();

    let sum = interp
        .eval_expr(&Expr::binary(
            BinOp::Add,
            call(Expr::ident("V"), vec![]),
            call(Expr::ident("V"), vec![]),
        ))
        .unwrap();
    match sum {
        Value::Instance(obj) => assert_eq!(obj.class_name(), "V"),
        other => panic!("expected V instance, got {other:?}"),
    }

    let err = interp
        .eval_expr(&Expr::binary(
            BinOp::Sub,
            call(Expr::ident("V"), vec![]),
            call(Expr::ident("V"), vec![]),
        ))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompatibleType);
    assert!(err.msg.contains("__sub__"));
}

#[test]
fn init_runs_and_instance_attrs_stick() {
    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![
            class(
                "Point",
                None,
                &[],
                false,
                vec![method(
                    "__init__",
                    &["self", "x"],
                    vec![Stmt::Assign {
                        targets: vec![Expr::attr(Expr::ident("self"), "x")],
                        values: vec![Expr::ident("x")],
                        pos: Pos::default(),
                    }],
                )],
            ),
            Stmt::Assign {
                targets: vec![Expr::ident("p")],
                values: vec![call(Expr::ident("Point"), vec![Expr::int(7)])],
                pos: Pos::default(),
            },
        ],
    )
    .unwrap();

    let x = interp
        .eval_expr(&Expr::attr(Expr::ident("p"), "x"))
        .unwrap();
    assert_eq!(x, Value::Int(7));
}

#[test]
fn print_len_hash_contracts_enforced() {
    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![class(
            "Bad",
            None,
            &[],
            false,
            vec![
                method("__print__", &["self"], vec![ret(Expr::int(1))]),
                method("__len__", &["self"], vec![ret(Expr::str("x"))]),
                method("__hash__", &["self"], vec![ret(Expr::str("x"))]),
            ],
        )],
    )
    .unwrap();

    // print() must get a string back from __print__.
    let err = interp
        .eval_expr(&call(
            Expr::ident("print"),
            vec![call(Expr::ident("Bad"), vec![])],
        ))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompatibleType);

    // len() must get an int back from __len__.
    let err = interp
        .eval_expr(&call(
            Expr::ident("len"),
            vec![call(Expr::ident("Bad"), vec![])],
        ))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompatibleType);

    // hash() must get an int back from __hash__.
    let err = interp
        .eval_expr(&call(
            Expr::ident("hash"),
            vec![call(Expr::ident("Bad"), vec![])],
        ))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompatibleType);
}

#[test]
fn len_and_hash_dunders_flow_through() {
    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![class(
            "Sized",
            None,
            &[],
            false,
            vec![
                method("__len__", &["self"], vec![ret(Expr::int(11))]),
                method("__hash__", &["self"], vec![ret(Expr::int(-5))]),
            ],
        )],
    )
    .unwrap();

    let n = interp
        .eval_expr(&call(
            Expr::ident("len"),
            vec![call(Expr::ident("Sized"), vec![])],
        ))
        .unwrap();
    assert_eq!(n, Value::Int(11));

    // Hash values surface non-negative.
    let h = interp
        .eval_expr(&call(
            Expr::ident("hash"),
            vec![call(Expr::ident("Sized"), vec![])],
        ))
        .unwrap();
    assert_eq!(h, Value::Int(5));
}

#[test]
fn to_string_matches_str_dunder() {
    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![
            class(
                "Named",
                None,
                &[],
                false,
                vec![method("__str__", &["self"], vec![ret(Expr::str("named!"))])],
            ),
            Stmt::Assign {
                targets: vec![Expr::ident("n")],
                values: vec![call(Expr::ident("Named"), vec![])],
                pos: Pos::default(),
            },
        ],
    )
    .unwrap();

    // to_string(x) and x.__str__() agree.
    let via_builtin = interp
        .eval_expr(&call(Expr::ident("to_string"), vec![Expr::ident("n")]))
        .unwrap();
    let via_method = interp
        .eval_expr(&call(Expr::attr(Expr::ident("n"), "__str__"), vec![]))
        .unwrap();
    assert_eq!(via_builtin, via_method);
    assert_eq!(via_builtin, Value::str("named!"));
}

#[test]
fn static_method_rejected_through_instance() {
    let mut interp = Interp::new();
    let mut decl = FuncDecl::simple("make", &["self"], Block::default());
    decl.static_ = true;

    exec(
        &mut interp,
        vec![
            class("F", None, &[], false, vec![Stmt::FuncDecl(Rc::new(decl))]),
            Stmt::Assign {
                targets: vec![Expr::ident("f")],
                values: vec![call(Expr::ident("F"), vec![])],
                pos: Pos::default(),
            },
        ],
    )
    .unwrap();

    let err = interp
        .eval_expr(&Expr::attr(Expr::ident("f"), "make"))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompatibleType);
    assert!(err.msg.contains("static"));
}

#[test]
fn inherited_method_dispatches_on_subclass_instance() {
    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![
            class(
                "Base",
                None,
                &[],
                false,
                vec![method("who", &["self"], vec![ret(Expr::str("base"))])],
            ),
            class("Derived", Some("Base"), &[], false, vec![]),
        ],
    )
    .unwrap();

    let result = interp
        .eval_expr(&call(
            Expr::attr(call(Expr::ident("Derived"), vec![]), "who"),
            vec![],
        ))
        .unwrap();
    assert_eq!(result, Value::str("base"));
}

// The only back-edge is weak: dropping the instance kills its bound
// methods instead of leaking a cycle.
#[test]
fn bound_method_does_not_keep_instance_alive() {
    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![
            class(
                "P",
                None,
                &[],
                false,
                vec![method("name", &["self"], vec![ret(Expr::str("p"))])],
            ),
            Stmt::Assign {
                targets: vec![Expr::ident("p")],
                values: vec![call(Expr::ident("P"), vec![])],
                pos: Pos::default(),
            },
            Stmt::Assign {
                targets: vec![Expr::ident("m")],
                values: vec![Expr::attr(Expr::ident("p"), "name")],
                pos: Pos::default(),
            },
            // Drop the only strong handle.
            Stmt::Assign {
                targets: vec![Expr::ident("p")],
                values: vec![Expr::null()],
                pos: Pos::default(),
            },
        ],
    )
    .unwrap();

    let err = interp
        .eval_expr(&call(Expr::ident("m"), vec![]))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompatibleType);
    assert!(err.msg.contains("destroyed"));
}

#[test]
fn getitem_and_contains_dunders() {
    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![class(
            "Box",
            None,
            &[],
            false,
            vec![
                method(
                    "__getitem__",
                    &["self", "k"],
                    vec![ret(Expr::binary(
                        BinOp::Mul,
                        Expr::ident("k"),
                        Expr::int(10),
                    ))],
                ),
                method(
                    "__contains__",
                    &["self", "k"],
                    vec![ret(Expr::binary(
                        BinOp::Eq,
                        Expr::ident("k"),
                        Expr::int(1),
                    ))],
                ),
            ],
        )],
    )
    .unwrap();

    let item = interp
        .eval_expr(&Expr::Index {
            obj: Box::new(call(Expr::ident("Box"), vec![])),
            index: Box::new(Expr::int(3)),
            pos: Pos::default(),
        })
        .unwrap();
    assert_eq!(item, Value::Int(30));

    let yes = interp
        .eval_expr(&Expr::binary(
            BinOp::In,
            Expr::int(1),
            call(Expr::ident("Box"), vec![]),
        ))
        .unwrap();
    assert_eq!(yes, Value::Bool(true));
}

#[test]
fn instance_iteration_protocol() {
    let mut interp = Interp::new();
    // Counter iterates 1..=3 through __iter__/__has_next__/__next__.
    exec(
        &mut interp,
        vec![
            class(
                "Counter",
                None,
                &[],
                false,
                vec![
                    method(
                        "__init__",
                        &["self"],
                        vec![Stmt::Assign {
                            targets: vec![Expr::attr(Expr::ident("self"), "n")],
                            values: vec![Expr::int(0)],
                            pos: Pos::default(),
                        }],
                    ),
                    method("__iter__", &["self"], vec![ret(Expr::ident("self"))]),
                    method(
                        "__has_next__",
                        &["self"],
                        vec![ret(Expr::binary(
                            BinOp::Lt,
                            Expr::attr(Expr::ident("self"), "n"),
                            Expr::int(3),
                        ))],
                    ),
                    method(
                        "__next__",
                        &["self"],
                        vec![
                            Stmt::Assign {
                                targets: vec![Expr::attr(Expr::ident("self"), "n")],
                                values: vec![Expr::binary(
                                    BinOp::Add,
                                    Expr::attr(Expr::ident("self"), "n"),
                                    Expr::int(1),
                                )],
                                pos: Pos::default(),
                            },
                            ret(Expr::attr(Expr::ident("self"), "n")),
                        ],
                    ),
                ],
            ),
            Stmt::Assign {
                targets: vec![Expr::ident("total")],
                values: vec![Expr::int(0)],
                pos: Pos::default(),
            },
            Stmt::For {
                var: "i".to_string(),
                iterable: call(Expr::ident("Counter"), vec![]),
                body: Block {
                    stmts: vec![Stmt::Assign {
                        targets: vec![Expr::ident("total")],
                        values: vec![Expr::binary(
                            BinOp::Add,
                            Expr::ident("total"),
                            Expr::ident("i"),
                        )],
                        pos: Pos::default(),
                    }],
                },
            },
        ],
    )
    .unwrap();

    assert_eq!(interp.scopes().lookup("total"), Some(Value::Int(6)));
}

// A class written against the begin/end style (no `__iter__`) is
// driven through `__begin__`, and the `end()` builtin dispatches
// `__end__`.
#[test]
fn begin_end_protocol_drives_iteration() {
    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![
            class(
                "UpTo",
                None,
                &[],
                false,
                vec![
                    method(
                        "__init__",
                        &["self"],
                        vec![Stmt::Assign {
                            targets: vec![Expr::attr(Expr::ident("self"), "n")],
                            values: vec![Expr::int(0)],
                            pos: Pos::default(),
                        }],
                    ),
                    method("__begin__", &["self"], vec![ret(Expr::ident("self"))]),
                    method("__end__", &["self"], vec![ret(Expr::int(2))]),
                    method(
                        "__has_next__",
                        &["self"],
                        vec![ret(Expr::binary(
                            BinOp::Lt,
                            Expr::attr(Expr::ident("self"), "n"),
                            Expr::int(2),
                        ))],
                    ),
                    method(
                        "__next__",
                        &["self"],
                        vec![
                            Stmt::Assign {
                                targets: vec![Expr::attr(Expr::ident("self"), "n")],
                                values: vec![Expr::binary(
                                    BinOp::Add,
                                    Expr::attr(Expr::ident("self"), "n"),
                                    Expr::int(1),
                                )],
                                pos: Pos::default(),
                            },
                            ret(Expr::attr(Expr::ident("self"), "n")),
                        ],
                    ),
                ],
            ),
            Stmt::Assign {
                targets: vec![Expr::ident("total")],
                values: vec![Expr::int(0)],
                pos: Pos::default(),
            },
            Stmt::For {
                var: "i".to_string(),
                iterable: call(Expr::ident("UpTo"), vec![]),
                body: Block {
                    stmts: vec![Stmt::Assign {
                        targets: vec![Expr::ident("total")],
                        values: vec![Expr::binary(
                            BinOp::Add,
                            Expr::ident("total"),
                            Expr::ident("i"),
                        )],
                        pos: Pos::default(),
                    }],
                },
            },
        ],
    )
    .unwrap();

    assert_eq!(interp.scopes().lookup("total"), Some(Value::Int(3)));

    // end() reaches __end__ directly.
    let bound = interp
        .eval_expr(&call(
            Expr::ident("end"),
            vec![call(Expr::ident("UpTo"), vec![])],
        ))
        .unwrap();
    assert_eq!(bound, Value::Int(2));
}

#[test]
fn begin_end_missing_both_protocols_fails() {
    let mut interp = Interp::new();
    exec(&mut interp, vec![class("Opaque", None, &[], false, vec![])]).unwrap();

    let err = interp
        .exec_program(&Program {
            stmts: vec![Stmt::For {
                var: "x".to_string(),
                iterable: call(Expr::ident("Opaque"), vec![]),
                body: Block { stmts: vec![] },
            }],
        })
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompatibleType);
    assert!(err.msg.contains("__iter__"));
}

#[test]
fn class_attribute_reachable_through_type_and_instance() {
    let mut interp = Interp::new();
    exec(
        &mut interp,
        vec![class(
            "Config",
            None,
            &[],
            false,
            vec![Stmt::Assign {
                targets: vec![Expr::ident("limit")],
                values: vec![Expr::int(42)],
                pos: Pos::default(),
            }],
        )],
    )
    .unwrap();

    let through_type = interp
        .eval_expr(&Expr::attr(Expr::ident("Config"), "limit"))
        .unwrap();
    assert_eq!(through_type, Value::Int(42));

    let through_instance = interp
        .eval_expr(&Expr::attr(call(Expr::ident("Config"), vec![]), "limit"))
        .unwrap();
    assert_eq!(through_instance, Value::Int(42));
}
