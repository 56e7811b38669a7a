//! Command resolution: user-declared, builtin, or external

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{ErrorKind, Result, RuntimeError};
use crate::eval::Interp;
use crate::value::callable::CmdDecl;

/// Builtins that run in the shell process itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `cd [dir]`
    Cd,
    /// `exit [code]`
    Exit,
    /// `export name`
    Export,
}

/// A resolved argv[0].
pub enum CmdEntry {
    /// User-declared command, executed in the forked child
    User(Rc<CmdDecl>),
    /// Shell builtin, executed in the parent
    Builtin(Builtin),
    /// External program resolved to a path
    External(PathBuf),
}

impl std::fmt::Debug for CmdEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CmdEntry::User(cmd) => write!(f, "User({})", cmd.name),
            CmdEntry::Builtin(b) => write!(f, "Builtin({b:?})"),
            CmdEntry::External(path) => write!(f, "External({})", path.display()),
        }
    }
}

/// Resolve a command name: the command namespace wins, then the
/// builtins, then a PATH search. An unresolvable name is reported from
/// the parent as `INVALID_COMMAND`.
pub fn resolve(interp: &Interp, name: &str) -> Result<CmdEntry> {
    if let Some(cmd) = interp.scopes().lookup_cmd(name) {
        return Ok(CmdEntry::User(cmd));
    }

    match name {
        "cd" => return Ok(CmdEntry::Builtin(Builtin::Cd)),
        "exit" => return Ok(CmdEntry::Builtin(Builtin::Exit)),
        "export" => return Ok(CmdEntry::Builtin(Builtin::Export)),
        _ => {}
    }

    let search_paths = std::env::var("PATH").unwrap_or_default();
    find_command_path(&search_paths, Path::new(name))
        .map(CmdEntry::External)
        .ok_or_else(|| {
            RuntimeError::new(
                ErrorKind::InvalidCommand,
                format!("{name}: command not found"),
            )
        })
}

fn executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Resolve a command path the way a shell would: paths with separators
/// stand on their own, bare names walk the PATH directories.
pub fn find_command_path(search_paths: &str, path: &Path) -> Option<PathBuf> {
    if path.components().count() > 1 {
        return executable(path).then(|| path.to_path_buf());
    }

    for dir in std::env::split_paths(search_paths) {
        let candidate = dir.join(path);
        if executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}
