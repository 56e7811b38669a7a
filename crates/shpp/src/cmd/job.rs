//! Jobs: pipelines launched as one process group

use std::os::fd::{IntoRawFd, RawFd};

use nix::sys::signal::{killpg, Signal};
use nix::sys::termios::Termios;
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::{close, fork, pipe, setpgid, ForkResult, Pid};
use tracing::debug;

use crate::cmd::process::{ChildSetup, Process};
use crate::cmd::redirect::JobFds;
use crate::error::{ErrorKind, Result, RuntimeError};
use crate::eval::Interp;

/// One pipeline: an ordered set of processes sharing a process group
/// plus the job-level standard fds.
pub struct Job {
    processes: Vec<Process>,
    fds: JobFds,
    pgid: Option<Pid>,
    foreground: bool,
    tmodes: Option<Termios>,
    status: i32,
}

impl Job {
    /// Assemble a job. `processes` is never empty.
    pub fn new(processes: Vec<Process>, fds: JobFds, foreground: bool) -> Self {
        Self {
            processes,
            fds,
            pgid: None,
            foreground,
            tmodes: None,
            status: 0,
        }
    }

    /// The job's process group once launched.
    pub fn pgid(&self) -> Option<Pid> {
        self.pgid
    }

    /// Fork every process, connecting neighbors with pipes. On return
    /// the children are running and the parent holds none of the pipe
    /// fds.
    pub fn launch(&mut self, interp: &mut Interp) -> Result<()> {
        let interactive = interp.shell().interactive();
        let terminal = interp.shell().terminal();
        let job_stdin = self.fds.stdin;
        let job_stdout = self.fds.stdout;
        let job_stderr = self.fds.stderr;

        let count = self.processes.len();
        let mut infile = job_stdin;

        for i in 0..count {
            let mut pipe_fds: Option<(RawFd, RawFd)> = None;
            let outfile = if i != count - 1 {
                let (read, write) = pipe().map_err(|err| {
                    RuntimeError::new(
                        ErrorKind::InvalidCommand,
                        format!("pipe failed: {err}"),
                    )
                })?;
                let (read, write) = (read.into_raw_fd(), write.into_raw_fd());
                pipe_fds = Some((read, write));
                write
            } else {
                job_stdout
            };

            let setup = ChildSetup {
                interactive,
                terminal,
                pgid: self.pgid.unwrap_or(Pid::from_raw(0)),
                foreground: self.foreground,
                infile,
                outfile,
                errfile: job_stderr,
            };

            match unsafe { fork() } {
                Ok(ForkResult::Child) => {
                    if let Some((read, _)) = pipe_fds {
                        let _ = close(read);
                    }
                    self.processes[i].launch_in_child(interp, setup);
                }
                Ok(ForkResult::Parent { child }) => {
                    self.processes[i].pid = Some(child);
                    if interactive {
                        let pgid = *self.pgid.get_or_insert(child);
                        // Also done in the child; whoever runs first
                        // wins and the other call is a no-op.
                        let _ = setpgid(child, pgid);
                    }
                    debug!(pid = child.as_raw(), argv = ?self.processes[i].argv, "spawned");
                }
                Err(err) => {
                    return Err(RuntimeError::new(
                        ErrorKind::InvalidCommand,
                        format!("fork failed: {err}"),
                    ))
                }
            }

            if infile != job_stdin {
                let _ = close(infile);
            }
            if outfile != job_stdout {
                let _ = close(outfile);
            }
            infile = pipe_fds.map(|(read, _)| read).unwrap_or(job_stdin);
        }

        // Redirection fds are duplicated into the children by now.
        self.fds.close_owned();
        Ok(())
    }

    /// Wait for the job (or schedule it) according to interactivity
    /// and the foreground flag, then report the exit code.
    pub fn finish(&mut self, interp: &mut Interp) -> Result<i32> {
        if !interp.shell().interactive() {
            self.wait_for_job();
        } else if self.foreground {
            self.put_in_foreground(interp, false)?;
        } else {
            self.put_in_background(false);
            return Ok(0);
        }
        Ok(self.exit_code())
    }

    /// Give the job the terminal, optionally continue it, wait, then
    /// take the terminal back and restore the shell modes.
    pub fn put_in_foreground(&mut self, interp: &mut Interp, cont: bool) -> Result<()> {
        let pgid = self.pgid.unwrap_or(interp.shell().pgid());
        interp.shell().give_terminal_to(pgid)?;

        if cont {
            if let Some(modes) = &self.tmodes {
                interp.shell().restore_job_modes(modes);
            }
            let _ = killpg(pgid, Signal::SIGCONT);
        }

        self.wait_for_job();

        self.tmodes = interp.shell().reclaim_terminal();
        Ok(())
    }

    /// Continue a background job without waiting.
    pub fn put_in_background(&self, cont: bool) {
        if cont {
            if let Some(pgid) = self.pgid {
                let _ = killpg(pgid, Signal::SIGCONT);
            }
        }
    }

    /// Reap until every process is completed or the job stops.
    ///
    /// Waits pid by pid rather than on the whole group, so concurrent
    /// jobs in one embedding process never steal each other's
    /// children.
    fn wait_for_job(&mut self) {
        loop {
            if self.is_completed() || self.is_stopped() {
                return;
            }
            for process in self.processes.iter_mut() {
                if process.completed || process.stopped {
                    continue;
                }
                let Some(pid) = process.pid else {
                    process.completed = true;
                    continue;
                };
                match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
                    Ok(status) => {
                        process.mark_status(status);
                        self.status |= process.status;
                    }
                    Err(_) => {
                        // ECHILD: already reaped elsewhere.
                        process.completed = true;
                    }
                }
            }
        }
    }

    /// Every process is stopped or completed, and at least one is
    /// stopped.
    pub fn is_stopped(&self) -> bool {
        self.processes
            .iter()
            .all(|p| p.completed || p.stopped)
            && self.processes.iter().any(|p| p.stopped)
    }

    /// Every process has been reaped.
    pub fn is_completed(&self) -> bool {
        self.processes.iter().all(|p| p.completed)
    }

    /// OR of the raw process statuses.
    pub fn status(&self) -> i32 {
        self.processes.iter().fold(0, |acc, p| acc | p.status)
    }

    /// The exit code the language sees: the last process's code when
    /// everything exited normally, a non-zero sentinel otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_completed() && self.processes.iter().all(|p| !p.signaled) {
            self.processes.last().map(|p| p.status).unwrap_or(0)
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::entry::CmdEntry;

    fn fake_process(status: i32, signaled: bool, completed: bool) -> Process {
        let mut p = Process::new(
            vec!["x".to_string()],
            CmdEntry::External("/bin/true".into()),
        );
        p.status = status;
        p.signaled = signaled;
        p.completed = completed;
        p
    }

    fn job_of(processes: Vec<Process>) -> Job {
        Job::new(processes, JobFds::inherited(), true)
    }

    #[test]
    fn test_exit_code_prefers_last_process() {
        let job = job_of(vec![
            fake_process(1, false, true),
            fake_process(0, false, true),
        ]);
        assert!(job.is_completed());
        assert_eq!(job.exit_code(), 0);
        assert_eq!(job.status(), 1);
    }

    #[test]
    fn test_exit_code_sentinel_on_signal() {
        let job = job_of(vec![
            fake_process(0, false, true),
            fake_process(143, true, true),
        ]);
        assert_eq!(job.exit_code(), 1);
    }

    #[test]
    fn test_stopped_requires_one_stopped() {
        let mut stopped = fake_process(0, false, false);
        stopped.stopped = true;
        let job = job_of(vec![fake_process(0, false, true), stopped]);
        assert!(job.is_stopped());
        assert!(!job.is_completed());
    }

    #[test]
    fn test_running_job_neither_stopped_nor_completed() {
        let job = job_of(vec![fake_process(0, false, false)]);
        assert!(!job.is_stopped());
        assert!(!job.is_completed());
    }
}
