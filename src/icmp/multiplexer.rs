//! Component B: a readiness multiplexer over a fixed set of raw-socket file
//! descriptors, built on `nix::poll`. Transparently retries on `EINTR` so a
//! signal delivered mid-wait never looks like a timeout or an error.

use std::os::fd::{AsFd, BorrowedFd, RawFd};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::errors::ProbeError;

/// Borrowed-fd registration: the multiplexer never takes ownership of the
/// sockets it polls, matching §5's "owned by the engine" resource policy.
pub struct Multiplexer {
    fds: Vec<RawFd>,
}

impl Multiplexer {
    pub fn new() -> Self {
        Self { fds: Vec::new() }
    }

    pub fn register(&mut self, fd: RawFd) {
        if !self.fds.contains(&fd) {
            self.fds.push(fd);
        }
    }

    /// Waits up to `timeout` for any registered descriptor to become
    /// readable. `timeout == Duration::ZERO` means non-blocking poll.
    /// Returns the first readable descriptor, or `None` on timeout.
    /// Restarts transparently on `EINTR`.
    pub fn wait(&self, timeout: Duration) -> Result<Option<RawFd>, ProbeError> {
        let deadline = Instant::now() + timeout;
        let mut remaining = timeout;
        loop {
            let borrowed: Vec<BorrowedFd> = self
                .fds
                .iter()
                .map(|&fd| unsafe { BorrowedFd::borrow_raw(fd) })
                .collect();
            let mut pollfds: Vec<PollFd> = borrowed
                .iter()
                .map(|fd| PollFd::new(fd.as_fd(), PollFlags::POLLIN))
                .collect();

            let poll_timeout = PollTimeout::try_from(remaining)
                .map_err(|_| ProbeError::Multiplexer("timeout out of range".into()))?;

            match poll(&mut pollfds, poll_timeout) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    for (i, pfd) in pollfds.iter().enumerate() {
                        if pfd.revents().unwrap_or(PollFlags::empty()).contains(PollFlags::POLLIN)
                        {
                            return Ok(Some(self.fds[i]));
                        }
                    }
                    return Ok(None);
                }
                Err(Errno::EINTR) => {
                    remaining = deadline.saturating_duration_since(Instant::now());
                    continue;
                }
                Err(errno) => return Err(ProbeError::Multiplexer(errno.to_string())),
            }
        }
    }
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new()
    }
}
