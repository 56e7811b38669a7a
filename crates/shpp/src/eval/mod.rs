//! Tree-walking evaluation
//!
//! [`Interp`] owns the scope stack, the builtin type registry, the
//! shell state, and the defer frames. AST nodes evaluate themselves
//! against it through the [`Evaluate`] and [`Execute`] traits; one
//! frame kind per construct, with control flow riding the
//! [`control::Interrupt`] channel.

pub mod call;
pub mod class;
pub mod control;
pub mod expr;
pub mod stmt;

pub use control::{Flow, Interrupt};

use tracing::warn;

use crate::ast::{Program, Stmt};
use crate::cmd::ShellEnv;
use crate::error::{ErrorKind, Result, RuntimeError};
use crate::frontend::{GlobExpander, LiteralGlob};
use crate::object::{register_builtins, TypeRegistry};
use crate::scope::ScopeStack;
use crate::value::Value;

/// Trait for evaluating expression nodes to values.
pub trait Evaluate {
    /// Evaluate this node against the interpreter state.
    fn eval(&self, interp: &mut Interp) -> Flow<Value>;
}

/// Trait for executing statement nodes.
pub trait Execute {
    /// Execute this node against the interpreter state.
    fn exec(&self, interp: &mut Interp) -> Flow<()>;
}

/// Interpreter configuration.
#[derive(Debug, Clone)]
pub struct InterpConfig {
    /// Recursion limit for function calls
    pub max_call_depth: usize,
    /// Force the shell interactive or not; `None` probes the terminal.
    /// The default forces non-interactive, which is what embeddings
    /// want; the CLI front end passes `None` to enable job control on
    /// a real terminal.
    pub interactive: Option<bool>,
}

impl Default for InterpConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 1000,
            interactive: Some(false),
        }
    }
}

/// The interpreter: scope stack, type registry, shell state, defer
/// frames.
pub struct Interp {
    pub(crate) scopes: ScopeStack,
    types: TypeRegistry,
    shell: ShellEnv,
    glob: Box<dyn GlobExpander>,
    defer_frames: Vec<Vec<(Stmt, ScopeStack)>>,
    call_depth: usize,
    config: InterpConfig,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    /// Create an interpreter with default configuration.
    pub fn new() -> Self {
        Self::with_config(InterpConfig::default())
    }

    /// Create an interpreter with explicit configuration.
    pub fn with_config(config: InterpConfig) -> Self {
        let mut scopes = ScopeStack::new();
        let types = TypeRegistry::new();
        register_builtins(&mut scopes, &types);

        Self {
            scopes,
            types,
            shell: ShellEnv::new(config.interactive),
            glob: Box::new(LiteralGlob),
            defer_frames: Vec::new(),
            call_depth: 0,
            config,
        }
    }

    /// The scope stack.
    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    /// The scope stack, writable.
    pub fn scopes_mut(&mut self) -> &mut ScopeStack {
        &mut self.scopes
    }

    /// Shell state used by the command engine.
    pub fn shell(&self) -> &ShellEnv {
        &self.shell
    }

    /// Shell state, writable.
    pub fn shell_mut(&mut self) -> &mut ShellEnv {
        &mut self.shell
    }

    /// Replace the glob collaborator.
    pub fn set_glob(&mut self, glob: Box<dyn GlobExpander>) {
        self.glob = glob;
    }

    /// The glob collaborator.
    pub fn glob(&self) -> &dyn GlobExpander {
        self.glob.as_ref()
    }

    /// The type descriptor of a value, as a value.
    pub fn type_of(&self, value: &Value) -> Value {
        self.types.type_of(value)
    }

    /// Execute a whole program. Stray control-flow signals at the root
    /// are fatal; defers registered at the top level run on the way
    /// out.
    pub fn exec_program(&mut self, program: &Program) -> Result<()> {
        let result = self.with_defer_frame(|interp| {
            for stmt in &program.stmts {
                stmt.exec(interp)?;
            }
            Ok(())
        });
        result.map_err(Interrupt::into_error)
    }

    /// Evaluate a single expression to a value. Control-flow signals
    /// are illegal in expression position at the top level.
    pub fn eval_expr(&mut self, expr: &crate::ast::Expr) -> Result<Value> {
        expr.eval(self).map_err(Interrupt::into_error)
    }

    /// Run `f` inside a fresh defer frame, then unwind the frame: the
    /// deferred statements run in reverse registration order, each in
    /// its captured scope. Errors inside a deferred statement are
    /// logged and swallowed so later entries still run, and the
    /// original signal, if any, survives.
    pub(crate) fn with_defer_frame<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Flow<T>,
    ) -> Flow<T> {
        self.defer_frames.push(Vec::new());
        let result = f(self);

        let defers = self.defer_frames.pop().expect("frame pushed above");
        for (stmt, scope) in defers.into_iter().rev() {
            let saved = std::mem::replace(&mut self.scopes, scope);
            if let Err(signal) = stmt.exec(self) {
                match signal {
                    Interrupt::Error(err) => {
                        warn!(error = %err, "error in deferred statement");
                    }
                    other => {
                        warn!(?other, "control flow escaped a deferred statement");
                    }
                }
            }
            self.scopes = saved;
        }

        result
    }

    /// Register a deferred statement in the innermost frame.
    pub(crate) fn push_defer(&mut self, stmt: Stmt, scope: ScopeStack) -> Result<()> {
        match self.defer_frames.last_mut() {
            Some(frame) => {
                frame.push((stmt, scope));
                Ok(())
            }
            None => Err(RuntimeError::new(
                ErrorKind::Custom,
                "'defer' outside of an executable scope",
            )),
        }
    }

    /// Enter a function call, guarding recursion depth.
    pub(crate) fn enter_call(&mut self) -> Result<()> {
        if self.call_depth >= self.config.max_call_depth {
            return Err(RuntimeError::new(
                ErrorKind::Custom,
                format!(
                    "call depth exceeds maximum {}",
                    self.config.max_call_depth
                ),
            ));
        }
        self.call_depth += 1;
        Ok(())
    }

    /// Leave a function call.
    pub(crate) fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    #[test]
    fn test_new_interp_has_builtins() {
        let interp = Interp::new();
        assert!(interp.scopes().exists("int"));
        assert!(interp.scopes().exists("print"));
    }

    #[test]
    fn test_eval_literal_expr() {
        let mut interp = Interp::new();
        assert_eq!(interp.eval_expr(&Expr::int(41)).unwrap(), Value::Int(41));
    }

    #[test]
    fn test_type_of_through_registry() {
        let interp = Interp::new();
        match interp.type_of(&Value::Bool(true)) {
            Value::Type(t) => assert_eq!(t.name(), "bool"),
            other => panic!("expected type, got {other:?}"),
        }
    }

    #[test]
    fn test_defer_outside_frame_rejected() {
        let mut interp = Interp::new();
        let err = interp
            .push_defer(Stmt::Expr(Expr::null()), ScopeStack::new())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Custom);
    }

    #[test]
    fn test_call_depth_guard() {
        let mut interp = Interp::with_config(InterpConfig {
            max_call_depth: 2,
            interactive: Some(false),
        });
        interp.enter_call().unwrap();
        interp.enter_call().unwrap();
        assert!(interp.enter_call().is_err());
        interp.exit_call();
        interp.enter_call().unwrap();
    }
}
