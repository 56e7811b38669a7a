//! Redirection fd plumbing

use std::fs::OpenOptions;
use std::os::fd::{IntoRawFd, RawFd};

use crate::ast::RedirKind;
use crate::error::{ErrorKind, Result, RuntimeError};

/// Job-level standard fds after redirections are applied.
///
/// `out_to_err` marks `&>`: stdout additionally duplicated onto
/// stderr at launch time.
#[derive(Debug)]
pub struct JobFds {
    /// Job stdin
    pub stdin: RawFd,
    /// Job stdout
    pub stdout: RawFd,
    /// Job stderr
    pub stderr: RawFd,
    /// `&>` was present
    pub out_to_err: bool,
    /// fds this module opened; closed after launch
    pub owned: Vec<RawFd>,
}

impl JobFds {
    /// The untouched standard streams.
    pub fn inherited() -> Self {
        Self {
            stdin: 0,
            stdout: 1,
            stderr: 2,
            out_to_err: false,
            owned: Vec::new(),
        }
    }

    /// Apply one redirection. Later redirections of the same stream
    /// win, like in a shell.
    pub fn apply(&mut self, kind: RedirKind, target: &str) -> Result<()> {
        match kind {
            RedirKind::In => {
                let fd = open_read(target)?;
                self.stdin = fd;
                self.owned.push(fd);
            }
            RedirKind::Out => {
                let fd = open_write(target, false)?;
                self.stdout = fd;
                self.owned.push(fd);
            }
            RedirKind::Append => {
                let fd = open_write(target, true)?;
                self.stdout = fd;
                self.owned.push(fd);
            }
            RedirKind::Err => {
                let fd = open_write(target, false)?;
                self.stderr = fd;
                self.owned.push(fd);
            }
            RedirKind::OutErr => {
                let fd = open_write(target, false)?;
                self.stdout = fd;
                self.stderr = fd;
                self.out_to_err = true;
                self.owned.push(fd);
            }
        }
        Ok(())
    }

    /// Close every fd this struct opened. Safe to call once after the
    /// job has been launched (children hold their own duplicates).
    pub fn close_owned(&mut self) {
        for fd in self.owned.drain(..) {
            let _ = nix::unistd::close(fd);
        }
    }
}

impl Drop for JobFds {
    fn drop(&mut self) {
        // Backstop for error paths; `drain` makes the explicit
        // post-launch close and this drop never double-close.
        self.close_owned();
    }
}

fn open_err(path: &str, err: std::io::Error) -> RuntimeError {
    RuntimeError::new(
        ErrorKind::InvalidCommand,
        format!("cannot open '{path}': {err}"),
    )
}

/// `<`: O_RDONLY.
fn open_read(path: &str) -> Result<RawFd> {
    OpenOptions::new()
        .read(true)
        .open(path)
        .map(IntoRawFd::into_raw_fd)
        .map_err(|err| open_err(path, err))
}

/// `>` and friends: O_WRONLY|O_CREAT, with O_APPEND or O_TRUNC.
fn open_write(path: &str, append: bool) -> Result<RawFd> {
    let mut options = OpenOptions::new();
    options.write(true).create(true);
    if append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    options
        .open(path)
        .map(IntoRawFd::into_raw_fd)
        .map_err(|err| open_err(path, err))
}
