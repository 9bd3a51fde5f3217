//! The user-visible passive socket handle.

use std::net::SocketAddr;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::{Config, POLL_TIMEOUT_MILLIS};
use crate::conn::Connection;
use crate::error::{Error, Result};
use crate::event::PollMode;
use crate::manager::ConnectionManager;
use crate::net;
use crate::reactor::Poller;
use crate::wake::WakeSlot;

/// A passive TCP socket. A dedicated dispatch thread watches the listen
/// fd and wakes [`Listener::accept`] callers; the application thread
/// performs the actual `accept(2)` calls.
pub struct Listener {
    fd: OwnedFd,
    local_addr: SocketAddr,
    poller: Arc<Poller>,
    has_new_conn: Arc<AtomicBool>,
    wake: Arc<WakeSlot>,
    running: Arc<AtomicBool>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
    manager: Arc<ConnectionManager>,
    config: Config,
    closed: AtomicBool,
}

impl Listener {
    /// Binds, sets `SO_REUSEADDR`, and starts listening with the default
    /// [`Config`].
    pub fn bind(addr: SocketAddr) -> Result<Listener> {
        Listener::bind_with_config(addr, Config::default())
    }

    pub fn bind_with_config(addr: SocketAddr, config: Config) -> Result<Listener> {
        let socket = net::new_v4_stream_socket()?;
        let raw = socket.as_raw_fd();
        net::set_reuseaddr(raw)?;
        net::bind(raw, addr)?;
        net::listen(raw, config.backlog)?;
        let local_addr = net::local_addr(raw)?;

        let poller = Arc::new(Poller::new()?);
        poller.register(raw, PollMode::Read)?;

        let has_new_conn = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(WakeSlot::new());
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let poller = Arc::clone(&poller);
            let has_new_conn = Arc::clone(&has_new_conn);
            let wake = Arc::clone(&wake);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name("blocktcp-listener".into())
                .spawn(move || dispatch_loop(poller, raw, has_new_conn, wake, running))?
        };

        Ok(Listener {
            fd: socket,
            local_addr,
            poller,
            has_new_conn,
            wake,
            running,
            dispatch: Mutex::new(Some(handle)),
            manager: ConnectionManager::global(),
            config,
            closed: AtomicBool::new(false),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Blocks until a connection is ready, then accepts exactly one.
    /// Internally loops until `accept(2)` succeeds or yields
    /// `WouldBlock`, draining the backlog across repeated calls rather
    /// than in one; `hasNewConn` is cleared only once `accept` reports
    /// the backlog empty.
    pub fn accept(&self) -> Result<Connection> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "listener is closed",
                )));
            }
            if !self.has_new_conn.load(Ordering::Acquire) {
                self.wake.wait();
            }

            match net::accept(self.fd.as_raw_fd()) {
                Ok((accepted, peer)) => {
                    let raw = accepted.as_raw_fd();
                    // Ownership transfers to the connection manager's
                    // table; it closes the fd on teardown.
                    std::mem::forget(accepted);
                    if let Err(err) = net::set_keepalive(raw) {
                        log::debug!("set_keepalive on accepted fd {raw} failed: {err}");
                    }
                    return Connection::new_accepted(
                        raw,
                        self.local_addr,
                        peer,
                        Arc::clone(&self.manager),
                        &self.config,
                    )
                    .map_err(Into::into);
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    self.has_new_conn.store(false, Ordering::Release);
                    continue;
                }
                Err(err) => return Err(Error::Io(err)),
            }
        }
    }

    /// Returns an iterator over accepted connections, each a fresh
    /// `accept()` call.
    pub fn incoming(&self) -> Incoming<'_> {
        Incoming { listener: self }
    }

    /// Closes the listen fd. Idempotent; further `accept` calls fail.
    pub fn close(self) {
        // Drop performs the actual teardown.
    }
}

fn dispatch_loop(
    poller: Arc<Poller>,
    fd: RawFd,
    has_new_conn: Arc<AtomicBool>,
    wake: Arc<WakeSlot>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        match poller.wait(Duration::from_millis(POLL_TIMEOUT_MILLIS)) {
            Ok(events) => {
                for (event_fd, _mask) in events {
                    if event_fd != fd {
                        continue;
                    }
                    has_new_conn.store(true, Ordering::Release);
                    wake.signal();
                }
            }
            Err(err) => {
                log::error!("listener reactor wait failed, stopping dispatch: {err}");
                break;
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.running.store(false, Ordering::Relaxed);
        // Unblock a parked `accept()` so it observes `closed`.
        self.wake.signal();
        if let Some(handle) = self.dispatch.lock().unwrap().take() {
            let _ = handle.join();
        }
        let raw = self.fd.as_raw_fd();
        if let Err(err) = self.poller.remove(raw) {
            log::debug!("listener reactor remove during close: {err}");
        }
        // `self.fd: OwnedFd` closes the socket when dropped.
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("fd", &self.fd.as_raw_fd())
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

/// Iterator over [`Listener::accept`] results.
pub struct Incoming<'a> {
    listener: &'a Listener,
}

impl<'a> std::fmt::Debug for Incoming<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Incoming").finish_non_exhaustive()
    }
}

impl<'a> Iterator for Incoming<'a> {
    type Item = Result<Connection>;

    fn next(&mut self) -> Option<Result<Connection>> {
        Some(self.listener.accept())
    }
}
