//! AST datatypes consumed by the evaluator
//!
//! The lexer and parser live outside this crate; a [`crate::frontend::Frontend`]
//! implementation produces these nodes. Each node carries the [`Pos`] the
//! error model reports. Tests build nodes directly through the constructor
//! helpers at the bottom.

use std::rc::Rc;

use crate::error::Pos;

/// A parsed source file or REPL line.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Top-level statements in program order
    pub stmts: Vec<Stmt>,
}

/// A braced statement sequence.
#[derive(Debug, Clone, Default)]
pub struct Block {
    /// Statements in program order
    pub stmts: Vec<Stmt>,
}

/// Function declaration, also used for lambdas and abstract members.
///
/// An abstract member has `abstract_: true` and an empty body; the class
/// executor records its signature instead of a callable.
#[derive(Debug, Clone)]
pub struct FuncDecl {
    /// Name; `None` for lambda expressions
    pub name: Option<String>,
    /// Positional parameters, defaults trailing
    pub params: Vec<Param>,
    /// Whether the last parameter collects surplus arguments
    pub variadic: bool,
    /// Body, empty for abstract members
    pub body: Rc<Block>,
    /// Declared with the `static` qualifier
    pub static_: bool,
    /// Declared with the `abstract` qualifier
    pub abstract_: bool,
    /// Declaration site
    pub pos: Pos,
}

/// A single formal parameter.
#[derive(Debug, Clone)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Default value expression, if any
    pub default: Option<Expr>,
}

/// Class declaration: `class Name(Base) : IfaceA, IfaceB { ... }`.
#[derive(Debug, Clone)]
pub struct ClassDecl {
    /// Class name
    pub name: String,
    /// Base class expression (single inheritance)
    pub base: Option<Expr>,
    /// Implemented interface expressions
    pub ifaces: Vec<Expr>,
    /// Declared with the `abstract` qualifier
    pub abstract_: bool,
    /// Class body, executed in a class-table scope
    pub body: Block,
    /// Declaration site
    pub pos: Pos,
}

/// Interface declaration: `interface Name : BaseIface { method sig; ... }`.
#[derive(Debug, Clone)]
pub struct IfaceDecl {
    /// Interface name
    pub name: String,
    /// Base interface expressions
    pub bases: Vec<Expr>,
    /// Required method signatures
    pub methods: Vec<IfaceMethod>,
    /// Declaration site
    pub pos: Pos,
}

/// One `method name(params);` requirement inside an interface body.
#[derive(Debug, Clone)]
pub struct IfaceMethod {
    /// Method name
    pub name: String,
    /// Formal parameters (defaults allowed, trailing)
    pub params: Vec<Param>,
    /// Variadic tail parameter
    pub variadic: bool,
    /// Declaration site
    pub pos: Pos,
}

/// Statements.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Expression evaluated for its effects
    Expr(Expr),
    /// `targets = values`, element-wise
    Assign {
        /// Assignable targets: identifiers, attributes, index expressions
        targets: Vec<Expr>,
        /// Right-hand expressions
        values: Vec<Expr>,
        /// Statement site
        pos: Pos,
    },
    /// `if cond { ... } else { ... }`
    If {
        /// Condition expression
        cond: Expr,
        /// Taken when the condition is true
        then_block: Block,
        /// Taken otherwise, if present
        else_block: Option<Block>,
    },
    /// `while cond { ... }`
    While {
        /// Condition expression
        cond: Expr,
        /// Loop body
        body: Block,
    },
    /// `for var in iterable { ... }`
    For {
        /// Loop variable, bound in the loop scope
        var: String,
        /// Iterated expression
        iterable: Expr,
        /// Loop body
        body: Block,
    },
    /// `return expr?`
    Return {
        /// Returned expression; `null` when absent
        value: Option<Expr>,
        /// Statement site
        pos: Pos,
    },
    /// `break`
    Break {
        /// Statement site
        pos: Pos,
    },
    /// `continue`
    Continue {
        /// Statement site
        pos: Pos,
    },
    /// `throw expr`
    Throw {
        /// Thrown value, stringified into a CUSTOM error
        value: Expr,
        /// Statement site
        pos: Pos,
    },
    /// `defer stmt`, run at scope exit in reverse registration order
    Defer {
        /// Deferred statement
        stmt: Box<Stmt>,
        /// Statement site
        pos: Pos,
    },
    /// Named function declaration
    FuncDecl(Rc<FuncDecl>),
    /// Class declaration
    ClassDecl(Rc<ClassDecl>),
    /// Interface declaration
    IfaceDecl(Rc<IfaceDecl>),
    /// `cmd name { ... }`: user-defined command declaration
    CmdDecl {
        /// Command name as seen by pipelines
        name: String,
        /// Body, executed in the forked child
        body: Rc<Block>,
        /// Statement site
        pos: Pos,
    },
    /// A command line executed as a statement
    Cmd(CmdLine),
}

/// Expressions.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Literal constant
    Literal(Literal, Pos),
    /// Identifier read
    Ident(String, Pos),
    /// Binary operation, including logical and membership operators
    Binary {
        /// Operator
        op: BinOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
        /// Operator site
        pos: Pos,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnOp,
        /// Operand
        operand: Box<Expr>,
        /// Operator site
        pos: Pos,
    },
    /// `obj[index]`
    Index {
        /// Indexed container
        obj: Box<Expr>,
        /// Index or key expression
        index: Box<Expr>,
        /// Bracket site
        pos: Pos,
    },
    /// `obj[start:stop:step]`, any part optional
    Slice {
        /// Sliced container
        obj: Box<Expr>,
        /// Lower bound
        start: Option<Box<Expr>>,
        /// Upper bound
        stop: Option<Box<Expr>>,
        /// Stride
        step: Option<Box<Expr>>,
        /// Bracket site
        pos: Pos,
    },
    /// Call with positional and keyword arguments
    Call {
        /// Callee expression
        callee: Box<Expr>,
        /// Positional arguments
        args: Vec<Expr>,
        /// Keyword arguments in source order
        kwargs: Vec<(String, Expr)>,
        /// Call site
        pos: Pos,
    },
    /// `obj.name`
    Attr {
        /// Receiver expression
        obj: Box<Expr>,
        /// Attribute name
        name: String,
        /// Dot site
        pos: Pos,
    },
    /// `[a, b, c]`
    Array(Vec<Expr>, Pos),
    /// `(a, b, c)`
    Tuple(Vec<Expr>, Pos),
    /// `{k: v, ...}`
    Map(Vec<(Expr, Expr)>, Pos),
    /// Anonymous function
    Lambda(Rc<FuncDecl>),
    /// `${...}` subshell capture
    CmdCapture(Box<CmdLine>, Pos),
    /// `%pat%` or `%%pat%%` glob literal
    Glob {
        /// Pattern text between the delimiters
        pattern: String,
        /// Recursive (`%%...%%`) form
        recursive: bool,
        /// Literal site
        pos: Pos,
    },
}

/// Literal constants.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Floating literal
    Real(f64),
    /// String literal
    Str(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `in`
    In,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// short-circuit `and`
    And,
    /// short-circuit `or`
    Or,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// unary `+`
    Pos,
    /// unary `-`
    Neg,
    /// `!`, boolean invert
    Invert,
    /// `~`, bitwise invert
    BitNot,
}

/// One command line: a pipeline plus a background flag.
#[derive(Debug, Clone)]
pub struct CmdLine {
    /// Pipeline stages, left to right; never empty
    pub pipeline: Vec<CmdSimple>,
    /// Launch without waiting
    pub background: bool,
    /// Command site
    pub pos: Pos,
}

/// One pipeline stage: words plus redirections.
#[derive(Debug, Clone)]
pub struct CmdSimple {
    /// argv words; the first resolves the command entry
    pub words: Vec<CmdWord>,
    /// Redirections applied to this stage
    pub redirects: Vec<Redirect>,
}

/// A shell word assembled from literal and substituted pieces.
#[derive(Debug, Clone)]
pub struct CmdWord {
    /// Concatenated pieces
    pub pieces: Vec<CmdPiece>,
}

/// A piece of a shell word.
#[derive(Debug, Clone)]
pub enum CmdPiece {
    /// Verbatim text
    Lit(String),
    /// `$name` variable substitution
    Var(String),
    /// Embedded expression substitution, converted through `to_cmd`
    Expr(Expr),
}

/// A redirection attached to a pipeline stage.
#[derive(Debug, Clone)]
pub struct Redirect {
    /// Redirection operator
    pub kind: RedirKind,
    /// Target path word
    pub target: CmdWord,
}

/// Redirection operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirKind {
    /// `<`
    In,
    /// `>`
    Out,
    /// `>>`
    Append,
    /// `2>`
    Err,
    /// `&>`
    OutErr,
}

impl Expr {
    /// The source position of this expression.
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Literal(_, pos)
            | Expr::Ident(_, pos)
            | Expr::Binary { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::Index { pos, .. }
            | Expr::Slice { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::Attr { pos, .. }
            | Expr::Array(_, pos)
            | Expr::Tuple(_, pos)
            | Expr::Map(_, pos)
            | Expr::CmdCapture(_, pos)
            | Expr::Glob { pos, .. } => *pos,
            Expr::Lambda(decl) => decl.pos,
        }
    }

    /// Literal `null`.
    pub fn null() -> Self {
        Expr::Literal(Literal::Null, Pos::default())
    }

    /// Integer literal.
    pub fn int(n: i64) -> Self {
        Expr::Literal(Literal::Int(n), Pos::default())
    }

    /// Real literal.
    pub fn real(r: f64) -> Self {
        Expr::Literal(Literal::Real(r), Pos::default())
    }

    /// Boolean literal.
    pub fn bool(b: bool) -> Self {
        Expr::Literal(Literal::Bool(b), Pos::default())
    }

    /// String literal.
    pub fn str(s: impl Into<String>) -> Self {
        Expr::Literal(Literal::Str(s.into()), Pos::default())
    }

    /// Identifier read.
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into(), Pos::default())
    }

    /// Binary operation.
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            pos: Pos::default(),
        }
    }

    /// Attribute access.
    pub fn attr(obj: Expr, name: impl Into<String>) -> Self {
        Expr::Attr {
            obj: Box::new(obj),
            name: name.into(),
            pos: Pos::default(),
        }
    }

    /// Call with positional arguments only.
    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args,
            kwargs: Vec::new(),
            pos: Pos::default(),
        }
    }
}

impl FuncDecl {
    /// A concrete named function with simple parameters and no defaults.
    pub fn simple(name: &str, params: &[&str], body: Block) -> Self {
        Self {
            name: Some(name.to_string()),
            params: params
                .iter()
                .map(|p| Param {
                    name: p.to_string(),
                    default: None,
                })
                .collect(),
            variadic: false,
            body: Rc::new(body),
            static_: false,
            abstract_: false,
            pos: Pos::default(),
        }
    }

    /// An abstract member: signature only, no body.
    pub fn abstract_sig(name: &str, params: &[&str], variadic: bool) -> Self {
        Self {
            name: Some(name.to_string()),
            params: params
                .iter()
                .map(|p| Param {
                    name: p.to_string(),
                    default: None,
                })
                .collect(),
            variadic,
            body: Rc::new(Block::default()),
            static_: false,
            abstract_: true,
            pos: Pos::default(),
        }
    }

    /// Number of declared parameters, defaults included.
    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    /// Number of parameters carrying defaults.
    pub fn num_default_params(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_some()).count()
    }
}

impl CmdWord {
    /// A word made of one literal piece.
    pub fn lit(s: impl Into<String>) -> Self {
        Self {
            pieces: vec![CmdPiece::Lit(s.into())],
        }
    }
}

impl CmdLine {
    /// A foreground pipeline over plain words, no redirections.
    pub fn pipeline_of(stages: &[&[&str]]) -> Self {
        Self {
            pipeline: stages
                .iter()
                .map(|words| CmdSimple {
                    words: words.iter().map(|w| CmdWord::lit(*w)).collect(),
                    redirects: Vec::new(),
                })
                .collect(),
            background: false,
            pos: Pos::default(),
        }
    }
}
