//! Control flow signals for break/continue/return
//!
//! Non-local exits ride the error channel as an [`Interrupt`]: the
//! innermost matching frame catches its own signal (loops catch
//! `Break`/`Continue`, function frames catch `Return`) and runtime
//! errors pass every frame until the root. Defer stacks run while a
//! signal is in flight and then let it continue.

use crate::error::{ErrorKind, RuntimeError};
use crate::value::Value;

/// A propagating stop signal.
#[derive(Debug)]
pub enum Interrupt {
    /// `break`, caught by the nearest loop
    Break,
    /// `continue`, caught by the nearest loop
    Continue,
    /// `return value`, caught by the nearest function frame
    Return(Value),
    /// A runtime error; only the root (or a future `try`) catches it
    Error(RuntimeError),
}

/// Result alias for evaluation: a value or a propagating signal.
pub type Flow<T> = std::result::Result<T, Interrupt>;

impl From<RuntimeError> for Interrupt {
    fn from(err: RuntimeError) -> Self {
        Interrupt::Error(err)
    }
}

impl Interrupt {
    /// Collapse a signal that escaped every matching frame into the
    /// error the root reports.
    pub fn into_error(self) -> RuntimeError {
        match self {
            Interrupt::Error(err) => err,
            Interrupt::Break => {
                RuntimeError::new(ErrorKind::Custom, "'break' outside of a loop")
            }
            Interrupt::Continue => {
                RuntimeError::new(ErrorKind::Custom, "'continue' outside of a loop")
            }
            Interrupt::Return(_) => {
                RuntimeError::new(ErrorKind::Custom, "'return' outside of a function")
            }
        }
    }

    /// Whether this is a runtime error rather than structured flow.
    pub fn is_error(&self) -> bool {
        matches!(self, Interrupt::Error(_))
    }
}
