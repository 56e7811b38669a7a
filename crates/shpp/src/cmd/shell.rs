//! Shell-side process state: interactivity, terminal, process group

use std::os::fd::{BorrowedFd, RawFd};

use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::termios::{tcgetattr, tcsetattr, SetArg, Termios};
use nix::unistd::{getpgrp, getpid, isatty, setpgid, tcgetpgrp, tcsetpgrp, Pid};
use tracing::debug;

use crate::error::{ErrorKind, Result, RuntimeError};

/// Shell state shared by every launched job: whether the session is
/// interactive, the controlling terminal fd, the shell's process
/// group, and the terminal modes to restore after foreground jobs.
#[derive(Debug)]
pub struct ShellEnv {
    interactive: bool,
    terminal: RawFd,
    pgid: Pid,
    tmodes: Option<Termios>,
}

fn borrow_fd(fd: RawFd) -> BorrowedFd<'static> {
    // The terminal fd is stdin, which outlives the interpreter.
    unsafe { BorrowedFd::borrow_raw(fd) }
}

impl ShellEnv {
    /// Probe the terminal, or honor an explicit override (tests and
    /// embedders force non-interactive).
    pub fn new(interactive_override: Option<bool>) -> Self {
        let terminal: RawFd = 0;
        let interactive =
            interactive_override.unwrap_or_else(|| isatty(terminal).unwrap_or(false));

        let mut shell = Self {
            interactive,
            terminal,
            pgid: getpgrp(),
            tmodes: None,
        };
        if interactive {
            shell.init_interactive();
        }
        shell
    }

    /// Interactive-shell setup: wait until foregrounded, ignore the
    /// job-control signals, take a process group of our own, and grab
    /// the terminal. Both here and in the children `setpgid` runs
    /// before anyone calls `tcsetpgrp`.
    fn init_interactive(&mut self) {
        while let Ok(fg) = tcgetpgrp(borrow_fd(self.terminal)) {
            if fg == getpgrp() {
                break;
            }
            let _ = nix::sys::signal::killpg(getpgrp(), Signal::SIGTTIN);
        }

        unsafe {
            let _ = signal(Signal::SIGINT, SigHandler::SigIgn);
            let _ = signal(Signal::SIGQUIT, SigHandler::SigIgn);
            let _ = signal(Signal::SIGTSTP, SigHandler::SigIgn);
            let _ = signal(Signal::SIGTTIN, SigHandler::SigIgn);
            let _ = signal(Signal::SIGTTOU, SigHandler::SigIgn);
        }

        let pid = getpid();
        if setpgid(pid, pid).is_ok() {
            self.pgid = pid;
        }
        let _ = tcsetpgrp(borrow_fd(self.terminal), self.pgid);
        self.tmodes = tcgetattr(borrow_fd(self.terminal)).ok();
        debug!(pgid = self.pgid.as_raw(), "interactive shell initialized");
    }

    /// Whether job control is active.
    pub fn interactive(&self) -> bool {
        self.interactive
    }

    /// The controlling terminal fd.
    pub fn terminal(&self) -> RawFd {
        self.terminal
    }

    /// The shell's process group.
    pub fn pgid(&self) -> Pid {
        self.pgid
    }

    /// Saved terminal modes, present only for interactive sessions.
    pub fn tmodes(&self) -> Option<&Termios> {
        self.tmodes.as_ref()
    }

    /// Hand the terminal to a job's process group.
    pub fn give_terminal_to(&self, pgid: Pid) -> Result<()> {
        tcsetpgrp(borrow_fd(self.terminal), pgid).map_err(|err| {
            RuntimeError::new(
                ErrorKind::InvalidCommand,
                format!("tcsetpgrp failed: {err}"),
            )
        })
    }

    /// Take the terminal back and restore the shell's modes with
    /// `TCSADRAIN`. Returns the job's terminal modes so a stopped job
    /// can be resumed with them later.
    pub fn reclaim_terminal(&self) -> Option<Termios> {
        let fd = borrow_fd(self.terminal);
        let _ = tcsetpgrp(fd, self.pgid);
        let job_modes = tcgetattr(fd).ok();
        if let Some(modes) = &self.tmodes {
            let _ = tcsetattr(fd, SetArg::TCSADRAIN, modes);
        }
        job_modes
    }

    /// Restore a job's saved terminal modes before continuing it.
    pub fn restore_job_modes(&self, modes: &Termios) {
        let _ = tcsetattr(borrow_fd(self.terminal), SetArg::TCSADRAIN, modes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_non_interactive() {
        let shell = ShellEnv::new(Some(false));
        assert!(!shell.interactive());
        assert!(shell.tmodes().is_none());
        assert_eq!(shell.terminal(), 0);
    }

    #[test]
    fn test_pgid_is_own_group() {
        let shell = ShellEnv::new(Some(false));
        assert_eq!(shell.pgid(), getpgrp());
    }
}
