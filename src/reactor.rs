//! The reactor: register/modify/remove/wait wrapped around the per-OS
//! [`Selector`](crate::sys::Selector).

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::{INIT_POLL_EVENTS_CAP, MAX_POLL_EVENTS_CAP, MIN_POLL_EVENTS_CAP};
use crate::error::{Error, Result};
use crate::event::{EventMask, PollMode};
use crate::sys::{self, Selector};

/// Wraps the raw per-OS selector with the fd/mode bookkeeping spec'd for
/// the reactor: `Register`/`ModRead`/`ModReadWrite`/`Remove`/`Wait`.
pub(crate) struct Poller {
    selector: Selector,
    modes: Mutex<HashMap<RawFd, PollMode>>,
    target_cap: AtomicUsize,
}

impl Poller {
    pub fn new() -> std::io::Result<Poller> {
        Ok(Poller {
            selector: Selector::new()?,
            modes: Mutex::new(HashMap::new()),
            target_cap: AtomicUsize::new(INIT_POLL_EVENTS_CAP),
        })
    }

    /// Adds `fd` to the interest set under `mode`.
    pub fn register(&self, fd: RawFd, mode: PollMode) -> Result<()> {
        if fd <= 0 {
            return Err(Error::FdIsZero);
        }
        let mut modes = self.modes.lock().unwrap();
        if modes.contains_key(&fd) {
            return Err(Error::FdRegistered);
        }
        self.selector.register(fd, mode.to_event_mask())?;
        modes.insert(fd, mode);
        Ok(())
    }

    /// Downgrades `fd` to `Read` interest. A no-op, issuing zero syscalls,
    /// if it is already at `Read`.
    pub fn mod_read(&self, fd: RawFd) -> Result<()> {
        self.transition(fd, PollMode::Read)
    }

    /// Upgrades `fd` to `ReadWrite` interest. A no-op if already there.
    pub fn mod_read_write(&self, fd: RawFd) -> Result<()> {
        self.transition(fd, PollMode::ReadWrite)
    }

    fn transition(&self, fd: RawFd, target: PollMode) -> Result<()> {
        let mut modes = self.modes.lock().unwrap();
        match modes.get_mut(&fd) {
            None => Err(Error::FdUnregistered),
            Some(mode) if *mode == target => Ok(()),
            Some(mode) => {
                self.selector.reregister(fd, target.to_event_mask())?;
                *mode = target;
                Ok(())
            }
        }
    }

    /// Removes `fd` from the interest set.
    pub fn remove(&self, fd: RawFd) -> Result<()> {
        let mut modes = self.modes.lock().unwrap();
        if modes.remove(&fd).is_none() {
            return Err(Error::FdUnregistered);
        }
        self.selector.deregister(fd)?;
        Ok(())
    }

    /// Blocks up to `timeout`, returning the ready `(fd, mask)` pairs.
    /// Returns an empty vector on timeout or on `EINTR`, never an error for
    /// either of those conditions.
    pub fn wait(&self, timeout: Duration) -> std::io::Result<Vec<(RawFd, EventMask)>> {
        let cap = self.target_cap.load(Ordering::Relaxed);
        let mut events = sys::Events::with_capacity(cap);
        match self.selector.select(&mut events, Some(timeout)) {
            Ok(()) => {}
            Err(err) if err.raw_os_error() == Some(libc::EINTR) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        }

        self.adjust_capacity(events.len(), cap);

        Ok(events
            .iter()
            .map(|event| {
                let fd = sys::event::fd(event);
                let mut mask = EventMask::empty();
                if sys::event::is_readable(event) {
                    mask = mask | EventMask::IN;
                }
                if sys::event::is_writable(event) {
                    mask = mask | EventMask::OUT;
                }
                if sys::event::is_error(event) {
                    mask = mask | EventMask::ERR;
                }
                (fd, mask)
            })
            .collect())
    }

    /// Doubles the event-list capacity (floor `MAX`) on a sustained full
    /// return, halves it (floor `MIN`) once load drops below half.
    fn adjust_capacity(&self, returned: usize, cap: usize) {
        if returned >= cap && cap < MAX_POLL_EVENTS_CAP {
            self.target_cap
                .store((cap * 2).min(MAX_POLL_EVENTS_CAP), Ordering::Relaxed);
        } else if returned < cap / 2 && cap > MIN_POLL_EVENTS_CAP {
            self.target_cap
                .store((cap / 2).max(MIN_POLL_EVENTS_CAP), Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;

    fn pipe_fds() -> (std::os::unix::net::UnixStream, std::os::unix::net::UnixStream) {
        let (a, b) = std::os::unix::net::UnixStream::pair().unwrap();
        a.set_nonblocking(true).unwrap();
        b.set_nonblocking(true).unwrap();
        (a, b)
    }

    #[test]
    fn register_rejects_zero_fd() {
        let poller = Poller::new().unwrap();
        assert!(matches!(poller.register(0, PollMode::Read), Err(Error::FdIsZero)));
    }

    #[test]
    fn register_twice_fails() {
        let poller = Poller::new().unwrap();
        let (a, _b) = pipe_fds();
        let fd = a.as_raw_fd();
        poller.register(fd, PollMode::Read).unwrap();
        assert!(matches!(
            poller.register(fd, PollMode::Read),
            Err(Error::FdRegistered)
        ));
    }

    #[test]
    fn mod_read_on_unregistered_fd_fails() {
        let poller = Poller::new().unwrap();
        assert!(matches!(
            poller.mod_read(123_456),
            Err(Error::FdUnregistered)
        ));
    }

    #[test]
    fn remove_on_unregistered_fd_fails() {
        let poller = Poller::new().unwrap();
        assert!(matches!(
            poller.remove(123_456),
            Err(Error::FdUnregistered)
        ));
    }

    #[test]
    fn wait_with_no_ready_fds_returns_empty_not_error() {
        let poller = Poller::new().unwrap();
        let (a, _b) = pipe_fds();
        poller.register(a.as_raw_fd(), PollMode::Read).unwrap();
        let ready = poller.wait(Duration::from_millis(5)).unwrap();
        assert!(ready.is_empty());
    }

    #[test]
    fn readable_pipe_is_reported() {
        let poller = Poller::new().unwrap();
        let (a, b) = pipe_fds();
        poller.register(a.as_raw_fd(), PollMode::Read).unwrap();
        use std::io::Write;
        (&b).write_all(b"x").unwrap();
        let ready = poller.wait(Duration::from_millis(200)).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].0, a.as_raw_fd());
        assert!(ready[0].1.is_readable());
    }
}
