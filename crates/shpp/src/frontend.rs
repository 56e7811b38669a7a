//! Collaborator interfaces for the out-of-scope front end
//!
//! The runtime consumes [`crate::ast`] nodes; where they come from is
//! someone else's business. These traits name the seams: a parser that
//! turns source text into a program, and a glob expander for `%...%`
//! literals.

use crate::ast::Program;
use crate::error::Result;

/// Parses source text into a program.
///
/// Implementations map lex and parse failures to
/// [`crate::error::ErrorKind::Parser`].
pub trait Frontend {
    /// Parse a whole source file or REPL line.
    fn parse(&self, source: &str) -> Result<Program>;
}

/// Expands glob literals into word lists.
pub trait GlobExpander {
    /// Expand a pattern; `recursive` marks the `%%...%%` form.
    fn expand(&self, pattern: &str, recursive: bool) -> Result<Vec<String>>;
}

/// Default expander: returns the pattern verbatim, like a shell with
/// no matches and `nullglob` off.
pub struct LiteralGlob;

impl GlobExpander for LiteralGlob {
    fn expand(&self, pattern: &str, _recursive: bool) -> Result<Vec<String>> {
        Ok(vec![pattern.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_glob_passthrough() {
        let words = LiteralGlob.expand("*.txt", false).unwrap();
        assert_eq!(words, vec!["*.txt".to_string()]);
    }
}
