//! # shpp
//!
//! The Shell++ runtime: a dynamically typed object system with
//! user-defined classes, abstract methods, interfaces, and operator
//! overloading, fused with a process-group-aware command engine for
//! Unix pipelines, redirection, and terminal handoff.
//!
//! ## Architecture
//!
//! - **Frontend collaborators**: a parser produces [`ast`] nodes, a
//!   glob expander resolves `%...%` literals (see [`frontend`])
//! - **Object system**: shared value handles ([`value`]), lexical
//!   scopes ([`scope`]), type descriptors and classes ([`object`]),
//!   dunder dispatch ([`dispatch`])
//! - **Evaluator**: tree-walking execution with closures and defer
//!   stacks ([`eval`])
//! - **Command engine**: jobs, pipelines, redirections, job control
//!   ([`cmd`])
//!
//! The interpreter runs on a single thread; the only concurrency is
//! the processes a job forks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod cmd;
pub mod dispatch;
pub mod error;
pub mod eval;
pub mod frontend;
pub mod object;
pub mod scope;
pub mod value;

pub use error::{ErrorKind, Pos, Result, RuntimeError};
pub use eval::{Interp, InterpConfig};
pub use value::Value;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
