//! Owns the reactor, the fd-to-connection table, and the single dispatch
//! loop. Exactly one instance exists per process in ordinary use
//! ([`ConnectionManager::global`]); [`ConnectionManager::new`] is exposed
//! separately so tests and multi-stack callers can run independent
//! managers, each with its own dispatch thread and reactor.

use std::collections::HashMap;
use std::io;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::buf::RingBufferPool;
use crate::config::{MAX_BYTES_TO_WRITE_PER_LOOP, MAX_IOV_SIZE, POLL_TIMEOUT_MILLIS};
use crate::conn::Shared;
use crate::event::PollMode;
use crate::reactor::Poller;

static GLOBAL: OnceLock<Arc<ConnectionManager>> = OnceLock::new();

pub(crate) struct ConnectionManager {
    poller: Poller,
    conns: Mutex<HashMap<RawFd, Arc<Shared>>>,
    pool: RingBufferPool,
    running: Arc<AtomicBool>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Builds an independent manager with its own reactor and dispatch
    /// thread. Most callers want [`ConnectionManager::global`] instead.
    pub(crate) fn new() -> io::Result<Arc<ConnectionManager>> {
        let manager = Arc::new(ConnectionManager {
            poller: Poller::new()?,
            conns: Mutex::new(HashMap::new()),
            pool: RingBufferPool::new(),
            running: Arc::new(AtomicBool::new(true)),
            dispatch: Mutex::new(None),
        });

        let handle = {
            // The dispatch thread holds only a `Weak` reference: if it held
            // a strong `Arc`, the manager's refcount could never reach zero
            // while the thread is alive, and `Drop` (which is what stops the
            // thread) would never run.
            let weak = Arc::downgrade(&manager);
            std::thread::Builder::new()
                .name("blocktcp-manager".into())
                .spawn(move || ConnectionManager::run(weak))?
        };
        *manager.dispatch.lock().unwrap() = Some(handle);

        Ok(manager)
    }

    /// The process-wide singleton, lazily initialized on first use.
    pub(crate) fn global() -> Arc<ConnectionManager> {
        GLOBAL
            .get_or_init(|| {
                ConnectionManager::new()
                    .expect("failed to initialize the global blocktcp reactor")
            })
            .clone()
    }

    pub(crate) fn pool(&self) -> &RingBufferPool {
        &self.pool
    }

    /// Registers a freshly-accepted connection's fd with the reactor in
    /// `Read` mode and tracks its shared state.
    pub(crate) fn register(&self, fd: RawFd, shared: Arc<Shared>) -> crate::error::Result<()> {
        self.poller.register(fd, PollMode::Read)?;
        self.conns.lock().unwrap().insert(fd, shared);
        Ok(())
    }

    /// Upgrades interest on `fd` to `ReadWrite`, requested by
    /// [`crate::conn::Connection::write`].
    pub(crate) fn request_write_mode(&self, fd: RawFd) -> crate::error::Result<()> {
        self.poller.mod_read_write(fd)
    }

    /// Idempotent teardown: removes the fd from the table, deregisters it
    /// from the reactor, closes it, and releases its inbound ring to the
    /// pool.
    pub(crate) fn unset_conn(&self, fd: RawFd) {
        let removed = self.conns.lock().unwrap().remove(&fd);
        let Some(shared) = removed else {
            return;
        };
        if let Err(err) = self.poller.remove(fd) {
            log::debug!("reactor remove for fd {fd} during teardown: {err}");
        }
        shared.mark_closed();
        // Unblock a thread parked in `Connection::read`: it rechecks the
        // ring, finds it still empty, then observes `is_closed()` and
        // returns `Ok(0)` instead of waiting for a signal that will never
        // come.
        shared.wait_read.signal();
        let ring = shared.take_inbound_for_pool();
        self.pool.put(ring);
        // SAFETY: the fd is solely owned by this table entry; removing the
        // entry here is the single point at which it is closed.
        drop(unsafe { OwnedFd::from_raw_fd(fd) });
    }

    /// Polls via `weak` each iteration rather than holding a strong `Arc`,
    /// so the manager's `Drop` runs (and stops this loop) as soon as the
    /// last external handle is dropped.
    fn run(weak: Weak<Self>) {
        loop {
            let Some(manager) = weak.upgrade() else {
                return;
            };
            if !manager.running.load(Ordering::Relaxed) {
                return;
            }
            match manager.poller.wait(Duration::from_millis(POLL_TIMEOUT_MILLIS)) {
                Ok(events) => {
                    for (fd, mask) in events {
                        manager.handle_event(fd, mask);
                    }
                }
                Err(err) => {
                    log::warn!("reactor wait failed, rescheduling: {err}");
                }
            }
        }
    }

    fn handle_event(&self, fd: RawFd, mask: crate::event::EventMask) {
        let shared = {
            let conns = self.conns.lock().unwrap();
            conns.get(&fd).cloned()
        };
        let Some(shared) = shared else {
            // Stale event for an fd we already tore down; tolerate it.
            let _ = self.poller.remove(fd);
            return;
        };

        if mask.is_writable() && !self.write_phase(fd, &shared) {
            self.unset_conn(fd);
            return;
        }

        let outbound_empty = shared.outbound_is_empty();
        if !mask.is_writable() || outbound_empty {
            if !self.read_phase(fd, &shared) {
                self.unset_conn(fd);
            }
        }
    }

    /// Returns `false` if the connection must be torn down.
    fn write_phase(&self, fd: RawFd, shared: &Shared) -> bool {
        let mut outbound = shared.outbound.lock().unwrap();
        if outbound.is_empty() {
            return true;
        }

        let slices = outbound.peek(MAX_BYTES_TO_WRITE_PER_LOOP);
        let slices = &slices[..slices.len().min(MAX_IOV_SIZE)];
        match writev(fd, slices) {
            Ok(n) => outbound.discard(n),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return true,
            Err(_) => return false,
        }

        if outbound.is_empty() {
            drop(outbound);
            if let Err(err) = self.poller.mod_read(fd) {
                log::debug!("downgrading fd {fd} to Read after drain: {err}");
            }
        }
        true
    }

    /// Returns `false` if the connection must be torn down.
    fn read_phase(&self, fd: RawFd, shared: &Shared) -> bool {
        let mut inbound = shared.inbound.lock().unwrap();
        if inbound.free() == 0 {
            // Backpressure on the inbound side; nothing to do until the
            // application thread drains it.
            return true;
        }
        match inbound.copy_from_socket(fd) {
            Ok(0) => false, // peer performed an orderly shutdown
            Ok(_) => {
                drop(inbound);
                shared.wait_read.signal();
                true
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => true,
            Err(_) => false,
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.dispatch.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

fn writev(fd: RawFd, slices: &[&[u8]]) -> io::Result<usize> {
    let iovecs: Vec<libc::iovec> = slices
        .iter()
        .map(|slice| libc::iovec {
            iov_base: slice.as_ptr() as *mut libc::c_void,
            iov_len: slice.len(),
        })
        .collect();
    if iovecs.is_empty() {
        return Ok(0);
    }
    syscall!(writev(fd, iovecs.as_ptr(), iovecs.len() as libc::c_int)).map(|n| n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_the_last_handle_stops_the_dispatch_thread() {
        let manager = ConnectionManager::new().unwrap();
        let weak = Arc::downgrade(&manager);
        drop(manager);

        // `Drop` joins the dispatch thread before returning, so by the time
        // `drop` above has run the thread has already observed a failed
        // upgrade and exited; nothing should be able to upgrade `weak`
        // anymore.
        assert!(weak.upgrade().is_none());
    }
}
