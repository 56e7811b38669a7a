//! The command engine: pipelines, redirections, job control
//!
//! Command statements and `${...}` captures lower into a [`Job`]: an
//! ordered list of processes plus three standard fds. The launcher
//! forks and execs, keeps the pipeline in one process group, and hands
//! the controlling terminal over for interactive foreground jobs.

pub mod entry;
pub mod job;
pub mod process;
pub mod redirect;
pub mod shell;

pub use entry::{resolve, Builtin, CmdEntry};
pub use job::Job;
pub use process::Process;
pub use redirect::JobFds;
pub use shell::ShellEnv;

use std::io::Read;
use std::os::fd::{FromRawFd, IntoRawFd};
use std::rc::Rc;

use nix::unistd::{close, pipe};

use crate::ast::{CmdLine, CmdPiece, CmdSimple, CmdWord};
use crate::dispatch;
use crate::error::{ErrorKind, Result, RuntimeError};
use crate::eval::{Evaluate, Interp, Interrupt};
use crate::value::{CmdResult, Value};

/// Expand one word into argv entries. A word that is a single
/// expression piece evaluating to an array spreads into several
/// entries; everything else concatenates into one.
fn expand_word(interp: &mut Interp, word: &CmdWord) -> Result<Vec<String>> {
    if let [CmdPiece::Expr(expr)] = word.pieces.as_slice() {
        let value = expr.eval(interp).map_err(Interrupt::into_error)?;
        if let Value::Array(items) = &value {
            // Snapshot first: conversion may re-enter user code.
            let items: Vec<Value> = items.borrow().clone();
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                out.push(dispatch::to_cmd_word(interp, item)?);
            }
            return Ok(out);
        }
        return Ok(vec![dispatch::to_cmd_word(interp, &value)?]);
    }

    let mut out = String::new();
    for piece in &word.pieces {
        match piece {
            CmdPiece::Lit(text) => out.push_str(text),
            CmdPiece::Var(name) => {
                if let Some(value) = interp.scopes().lookup(name) {
                    out.push_str(&dispatch::to_cmd_word(interp, &value)?);
                } else if let Ok(value) = std::env::var(name) {
                    out.push_str(&value);
                }
                // An unset name substitutes as empty, like a shell.
            }
            CmdPiece::Expr(expr) => {
                let value = expr.eval(interp).map_err(Interrupt::into_error)?;
                out.push_str(&dispatch::to_cmd_word(interp, &value)?);
            }
        }
    }
    Ok(vec![out])
}

struct Stage {
    argv: Vec<String>,
    entry: CmdEntry,
}

/// Expand a pipeline stage and resolve its command entry.
fn expand_stage(interp: &mut Interp, stage: &CmdSimple, fds: &mut JobFds) -> Result<Stage> {
    let mut argv = Vec::new();
    for word in &stage.words {
        argv.extend(expand_word(interp, word)?);
    }
    if argv.is_empty() {
        return Err(RuntimeError::new(ErrorKind::InvalidCommand, "empty command"));
    }

    for redirect in &stage.redirects {
        let target = expand_word(interp, &redirect.target)?;
        let [target] = target.as_slice() else {
            return Err(RuntimeError::new(
                ErrorKind::InvalidCommand,
                "redirection target must expand to one word",
            ));
        };
        fds.apply(redirect.kind, target)?;
    }

    let entry = resolve(interp, &argv[0])?;
    Ok(Stage { argv, entry })
}

/// Lower a command line into a job against the given fds.
fn build_job(interp: &mut Interp, line: &CmdLine, mut fds: JobFds) -> Result<Job> {
    let mut processes = Vec::with_capacity(line.pipeline.len());
    let multi = line.pipeline.len() > 1;

    for stage in &line.pipeline {
        let stage = expand_stage(interp, stage, &mut fds)?;
        if multi && matches!(stage.entry, CmdEntry::Builtin(_)) {
            return Err(RuntimeError::new(
                ErrorKind::InvalidCommand,
                format!("builtin '{}' not allowed in a pipeline", stage.argv[0]),
            ));
        }
        processes.push(Process::new(stage.argv, stage.entry));
    }

    Ok(Job::new(processes, fds, !line.background))
}

/// Execute a command statement, returning its exit code.
pub fn run_statement(interp: &mut Interp, line: &CmdLine) -> Result<i32> {
    // A lone builtin runs in the shell process.
    if line.pipeline.len() == 1 {
        let mut fds = JobFds::inherited();
        let stage = expand_stage(interp, &line.pipeline[0], &mut fds)?;
        if let CmdEntry::Builtin(builtin) = stage.entry {
            fds.close_owned();
            return run_builtin(interp, builtin, &stage.argv);
        }
        let mut job = Job::new(vec![Process::new(stage.argv, stage.entry)], fds, !line.background);
        job.launch(interp)?;
        return job.finish(interp);
    }

    let mut job = build_job(interp, line, JobFds::inherited())?;
    job.launch(interp)?;
    job.finish(interp)
}

/// Execute a `${...}` capture: the job's stdout feeds a pipe the
/// parent drains into a string, with one trailing newline trimmed.
pub fn run_capture(interp: &mut Interp, line: &CmdLine) -> Result<Value> {
    let (read_end, write_end) = pipe().map_err(|err| {
        RuntimeError::new(ErrorKind::InvalidCommand, format!("pipe failed: {err}"))
    })?;
    let (read_fd, write_fd) = (read_end.into_raw_fd(), write_end.into_raw_fd());

    // The write end rides in `owned`, so the launcher closes it in the
    // parent as soon as the children hold their duplicates. Without
    // that close the read loop below would never see EOF.
    let mut fds = JobFds::inherited();
    fds.stdout = write_fd;
    fds.owned.push(write_fd);

    let mut job = match build_job(interp, line, fds) {
        Ok(job) => job,
        Err(err) => {
            let _ = close(read_fd);
            return Err(err);
        }
    };

    if let Err(err) = job.launch(interp) {
        let _ = close(read_fd);
        return Err(err);
    }

    let mut bytes = Vec::new();
    {
        // Takes ownership of the read end; dropping it closes the fd.
        let mut reader = unsafe { std::fs::File::from_raw_fd(read_fd) };
        let _ = reader.read_to_end(&mut bytes);
    }

    let status = job.finish(interp)?;

    let mut out = String::from_utf8_lossy(&bytes).into_owned();
    if out.ends_with('\n') {
        out.pop();
    }

    Ok(Value::Cmd(Rc::new(CmdResult { out, status })))
}

/// Run a parent-side builtin.
fn run_builtin(interp: &mut Interp, builtin: Builtin, argv: &[String]) -> Result<i32> {
    match builtin {
        Builtin::Cd => {
            let target = match argv.get(1) {
                Some(dir) => dir.clone(),
                None => std::env::var("HOME").unwrap_or_else(|_| "/".to_string()),
            };
            match std::env::set_current_dir(&target) {
                Ok(()) => Ok(0),
                Err(err) => {
                    eprintln!("shpp: cd: {target}: {err}");
                    Ok(1)
                }
            }
        }
        Builtin::Exit => {
            let code = argv
                .get(1)
                .and_then(|c| c.parse::<i32>().ok())
                .unwrap_or(0);
            std::process::exit(code);
        }
        Builtin::Export => {
            let Some(spec) = argv.get(1) else {
                return Err(RuntimeError::new(
                    ErrorKind::InvalidCommand,
                    "export: name required",
                ));
            };
            match spec.split_once('=') {
                Some((name, value)) => {
                    interp.scopes_mut().set(name, Value::str(value.to_string()));
                    interp.scopes_mut().export(name)?;
                }
                None => interp.scopes_mut().export(spec)?,
            }
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    fn word_var(name: &str) -> CmdWord {
        CmdWord {
            pieces: vec![CmdPiece::Var(name.to_string())],
        }
    }

    #[test]
    fn test_expand_literal_word() {
        let mut interp = Interp::new();
        let words = expand_word(&mut interp, &CmdWord::lit("hello")).unwrap();
        assert_eq!(words, vec!["hello".to_string()]);
    }

    #[test]
    fn test_expand_variable_word() {
        let mut interp = Interp::new();
        interp.scopes_mut().set("greeting", Value::str("hi"));
        let words = expand_word(&mut interp, &word_var("greeting")).unwrap();
        assert_eq!(words, vec!["hi".to_string()]);
    }

    #[test]
    fn test_unset_variable_expands_empty() {
        let mut interp = Interp::new();
        let words = expand_word(&mut interp, &word_var("no_such_shpp_var")).unwrap();
        assert_eq!(words, vec![String::new()]);
    }

    #[test]
    fn test_array_expression_spreads() {
        let mut interp = Interp::new();
        interp.scopes_mut().set(
            "parts",
            Value::array(vec![Value::str("a"), Value::str("b")]),
        );
        let word = CmdWord {
            pieces: vec![CmdPiece::Expr(Expr::ident("parts"))],
        };
        let words = expand_word(&mut interp, &word).unwrap();
        assert_eq!(words, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_concatenated_pieces() {
        let mut interp = Interp::new();
        interp.scopes_mut().set("n", Value::Int(3));
        let word = CmdWord {
            pieces: vec![
                CmdPiece::Lit("file-".to_string()),
                CmdPiece::Var("n".to_string()),
                CmdPiece::Lit(".txt".to_string()),
            ],
        };
        let words = expand_word(&mut interp, &word).unwrap();
        assert_eq!(words, vec!["file-3.txt".to_string()]);
    }

    #[test]
    fn test_builtin_in_pipeline_refused() {
        let mut interp = Interp::new();
        let line = CmdLine::pipeline_of(&[&["echo", "x"], &["cd", "/"]]);
        let err = run_statement(&mut interp, &line).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCommand);
        assert!(err.msg.contains("builtin"));
    }

    #[test]
    fn test_unknown_command_reported_from_parent() {
        let mut interp = Interp::new();
        let line = CmdLine::pipeline_of(&[&["this-command-does-not-exist-xyz"]]);
        let err = run_statement(&mut interp, &line).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCommand);
    }
}
