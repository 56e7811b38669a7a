//! One pipeline process: child-side setup and execution

use std::ffi::CString;
use std::os::fd::{BorrowedFd, RawFd};

use nix::sys::signal::{signal, SigHandler, Signal};
use nix::unistd::{close, dup2, execvp, getpid, setpgid, tcsetpgrp, Pid};

use crate::cmd::entry::CmdEntry;
use crate::eval::{Execute, Interp, Interrupt};
use crate::value::Value;

/// Launch parameters the child needs, captured before the fork.
#[derive(Debug, Clone, Copy)]
pub struct ChildSetup {
    /// Whether job control is active
    pub interactive: bool,
    /// Controlling terminal fd
    pub terminal: RawFd,
    /// Job process group; zero means "start one with my pid"
    pub pgid: Pid,
    /// Whether the job takes the terminal
    pub foreground: bool,
    /// Child stdin
    pub infile: RawFd,
    /// Child stdout
    pub outfile: RawFd,
    /// Child stderr
    pub errfile: RawFd,
}

/// One process of a job.
#[derive(Debug)]
pub struct Process {
    /// Expanded argv; never empty
    pub argv: Vec<String>,
    /// Resolved command entry
    pub entry: CmdEntry,
    /// Pid once forked
    pub pid: Option<Pid>,
    /// Stopped by a signal
    pub stopped: bool,
    /// Reaped
    pub completed: bool,
    /// Exit code; `128 + signal` when signaled
    pub status: i32,
    /// Terminated by a signal rather than a normal exit
    pub signaled: bool,
}

impl Process {
    /// Wrap a resolved command.
    pub fn new(argv: Vec<String>, entry: CmdEntry) -> Self {
        Self {
            argv,
            entry,
            pid: None,
            stopped: false,
            completed: false,
            status: 0,
            signaled: false,
        }
    }

    /// Child-side launch; never returns.
    ///
    /// Process-group placement and the terminal grab run here as well
    /// as in the parent, because neither side may assume the other has
    /// run first. Job-control signal handling returns to the defaults
    /// before anything executes.
    pub fn launch_in_child(&self, interp: &mut Interp, setup: ChildSetup) -> ! {
        if setup.interactive {
            let pid = getpid();
            let pgid = if setup.pgid.as_raw() == 0 {
                pid
            } else {
                setup.pgid
            };
            let _ = setpgid(pid, pgid);
            if setup.foreground {
                let fd = unsafe { BorrowedFd::borrow_raw(setup.terminal) };
                let _ = tcsetpgrp(fd, pgid);
            }

            unsafe {
                let _ = signal(Signal::SIGINT, SigHandler::SigDfl);
                let _ = signal(Signal::SIGQUIT, SigHandler::SigDfl);
                let _ = signal(Signal::SIGTSTP, SigHandler::SigDfl);
                let _ = signal(Signal::SIGTTIN, SigHandler::SigDfl);
                let _ = signal(Signal::SIGTTOU, SigHandler::SigDfl);
                let _ = signal(Signal::SIGCHLD, SigHandler::SigDfl);
            }
        }

        // Wire the standard streams and drop the originals.
        if setup.infile != 0 {
            let _ = dup2(setup.infile, 0);
            let _ = close(setup.infile);
        }
        if setup.outfile != 1 {
            let _ = dup2(setup.outfile, 1);
            if setup.outfile != setup.errfile {
                let _ = close(setup.outfile);
            }
        }
        if setup.errfile != 2 {
            let _ = dup2(setup.errfile, 2);
            let _ = close(setup.errfile);
        }

        match &self.entry {
            CmdEntry::User(cmd) => {
                // The body runs in this forked child against the
                // declaring scope, with argv bound as `args`; the
                // child then exits so the pipeline stays
                // process-based.
                let mut scope = cmd.scope.snapshot();
                scope.push();
                let args: Vec<Value> =
                    self.argv.iter().map(|a| Value::str(a.clone())).collect();
                scope
                    .top()
                    .borrow_mut()
                    .set("args", Value::array(args));

                let saved = std::mem::replace(&mut interp.scopes, scope);
                let mut code = 0;
                for stmt in &cmd.body.stmts {
                    match stmt.exec(interp) {
                        Ok(()) => {}
                        Err(Interrupt::Return(_)) => break,
                        Err(signal) => {
                            eprintln!("shpp: {}", signal.into_error());
                            code = 1;
                            break;
                        }
                    }
                }
                interp.scopes = saved;
                std::process::exit(code);
            }
            CmdEntry::External(path) => {
                let prog = CString::new(path.to_string_lossy().as_bytes())
                    .unwrap_or_else(|_| CString::new("").expect("empty cstring"));
                let argv: Vec<CString> = self
                    .argv
                    .iter()
                    .map(|a| CString::new(a.as_bytes()).unwrap_or_default())
                    .collect();
                let _ = execvp(&prog, &argv);
                // Reached only when exec failed.
                eprintln!("shpp: {}: command not found", self.argv[0]);
                std::process::exit(127);
            }
            CmdEntry::Builtin(_) => {
                // Builtins run in the parent; the launcher refuses to
                // put one into a pipeline.
                eprintln!("shpp: builtin in pipeline");
                std::process::exit(1);
            }
        }
    }

    /// Record a wait status.
    pub fn mark_status(&mut self, status: nix::sys::wait::WaitStatus) {
        use nix::sys::wait::WaitStatus;
        match status {
            WaitStatus::Exited(_, code) => {
                self.completed = true;
                self.stopped = false;
                self.status = code;
            }
            WaitStatus::Signaled(_, sig, _) => {
                self.completed = true;
                self.stopped = false;
                self.signaled = true;
                self.status = 128 + sig as i32;
            }
            WaitStatus::Stopped(_, _) => {
                self.stopped = true;
            }
            WaitStatus::Continued(_) => {
                self.stopped = false;
            }
            _ => {}
        }
    }
}
