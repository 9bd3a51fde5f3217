//! The user-visible blocking connection handle.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::buf::{MixedBuffer, RingBuffer};
use crate::config::Config;
use crate::manager::ConnectionManager;
use crate::wake::{wait_with_optional_timeout, WakeSlot};

/// State shared between the application-facing [`Connection`] handle and
/// the dispatch thread that drives its fd.
pub(crate) struct Shared {
    pub(crate) fd: RawFd,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    read_deadline: Mutex<Option<Instant>>,
    write_deadline: Mutex<Option<Instant>>,
    pub(crate) inbound: Mutex<RingBuffer>,
    pub(crate) wait_read: WakeSlot,
    pub(crate) outbound: Mutex<MixedBuffer>,
    manager: Arc<ConnectionManager>,
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn outbound_is_empty(&self) -> bool {
        self.outbound.lock().unwrap().is_empty()
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Swaps the inbound ring out for an empty placeholder so the manager
    /// can return the real buffer to the pool during teardown.
    pub(crate) fn take_inbound_for_pool(&self) -> RingBuffer {
        std::mem::replace(&mut *self.inbound.lock().unwrap(), RingBuffer::new(2))
    }
}

/// A synchronous, blocking TCP connection. `read`/`write` semantically
/// block the caller even though the underlying fd is non-blocking; all
/// actual I/O happens on the connection manager's dispatch thread.
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Wraps a freshly-accepted fd, registers it with `manager` in `Read`
    /// mode, and returns the public handle.
    pub(crate) fn new_accepted(
        fd: RawFd,
        local_addr: SocketAddr,
        peer_addr: SocketAddr,
        manager: Arc<ConnectionManager>,
        config: &Config,
    ) -> crate::error::Result<Connection> {
        let inbound = manager.pool().get_with_size(config.ring_buffer_cap);
        let outbound = MixedBuffer::new(
            RingBuffer::new(config.ring_buffer_cap),
            config.max_stacking_bytes,
        );

        let shared = Arc::new(Shared {
            fd,
            local_addr,
            peer_addr,
            read_deadline: Mutex::new(None),
            write_deadline: Mutex::new(None),
            inbound: Mutex::new(inbound),
            wait_read: WakeSlot::new(),
            outbound: Mutex::new(outbound),
            manager: Arc::clone(&manager),
            closed: AtomicBool::new(false),
        });

        manager.register(fd, Arc::clone(&shared))?;
        Ok(Connection { shared })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.shared.peer_addr
    }

    pub fn set_deadline(&self, deadline: Option<Instant>) {
        *self.shared.read_deadline.lock().unwrap() = deadline;
        *self.shared.write_deadline.lock().unwrap() = deadline;
    }

    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        *self.shared.read_deadline.lock().unwrap() = deadline;
    }

    pub fn set_write_deadline(&self, deadline: Option<Instant>) {
        *self.shared.write_deadline.lock().unwrap() = deadline;
    }

    /// Tears down the connection: releases the inbound ring to the pool,
    /// drops the outbound buffer, and closes the fd. Idempotent; dropping
    /// a `Connection` without calling `close` has the same effect.
    pub fn close(self) {
        self.shared.manager.unset_conn(self.shared.fd);
    }
}

impl Read for Connection {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        loop {
            {
                let mut inbound = self.shared.inbound.lock().unwrap();
                if !inbound.is_empty() || dst.is_empty() {
                    return Ok(inbound.read(dst));
                }
            }

            if self.shared.is_closed() {
                return Ok(0);
            }

            let deadline = *self.shared.read_deadline.lock().unwrap();
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "read deadline exceeded",
                    ));
                }
            }

            let timeout = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            let woke = wait_with_optional_timeout(&self.shared.wait_read, timeout);
            if !woke {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "read deadline exceeded",
                ));
            }
            // Wake signals are edge-style: loop back and re-check the ring
            // rather than assuming data is present.
        }
    }
}

impl Write for Connection {
    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        if self.shared.is_closed() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "connection is closed",
            ));
        }
        if src.is_empty() {
            return Ok(0);
        }

        let deadline = *self.shared.write_deadline.lock().unwrap();
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "write deadline exceeded",
                ));
            }
        }

        self.shared
            .manager
            .request_write_mode(self.shared.fd)
            .map_err(io::Error::from)?;

        // Per-connection write serialization: concurrent writers never
        // interleave partial mixes.
        let mut outbound = self.shared.outbound.lock().unwrap();
        outbound.write(src);
        Ok(src.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Queued bytes are drained asynchronously by the dispatch thread;
        // there is no durability guarantee beyond process memory to wait
        // for here.
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.manager.unset_conn(self.shared.fd);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("fd", &self.shared.fd)
            .field("local_addr", &self.shared.local_addr)
            .field("peer_addr", &self.shared.peer_addr)
            .finish()
    }
}
