//! Tunables, exposed as a small builder instead of hard-coded constants.
//!
//! The numeric defaults are exactly the values fixed by this crate's
//! design: a `Config::default()` produces the same behavior a
//! caller would get with no configuration surface at all.

/// Tunables for a [`crate::listener::Listener`] and the connections it
/// accepts.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub(crate) backlog: i32,
    pub(crate) ring_buffer_cap: usize,
    pub(crate) max_stacking_bytes: usize,
}

/// `MaxBytesToWritePerLoop`: the most outbound bytes drained from one
/// connection's mixed buffer in a single dispatch-loop iteration.
pub const MAX_BYTES_TO_WRITE_PER_LOOP: usize = 64 * 1024;

/// `MaxIovSize`: the most iovecs passed to `writev` in a single call.
pub const MAX_IOV_SIZE: usize = 1024;

/// `InitPollEventsCap` / `MaxPollEventsCap` / `MinPollEventsCap`: the
/// reactor's adaptive event-list sizing bounds.
pub const INIT_POLL_EVENTS_CAP: usize = 128;
pub const MAX_POLL_EVENTS_CAP: usize = 1024;
pub const MIN_POLL_EVENTS_CAP: usize = 32;

/// The reactor's per-iteration wait timeout.
pub const POLL_TIMEOUT_MILLIS: u64 = 5;

/// The intended `listen(2)` backlog (resolving the ambiguity in the
/// reviewed source, where the backlog argument was read from an
/// uninitialized variable).
pub const DEFAULT_BACKLOG: i32 = 65535;

/// `MaxStreamBufferCap`: the default inbound ring buffer capacity,
/// rounded up to a power of two by the pool.
pub const DEFAULT_RING_BUFFER_CAP: usize = 64 * 1024;

impl Default for Config {
    fn default() -> Config {
        Config {
            backlog: DEFAULT_BACKLOG,
            ring_buffer_cap: DEFAULT_RING_BUFFER_CAP,
            max_stacking_bytes: DEFAULT_RING_BUFFER_CAP,
        }
    }
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    /// Sets the `listen(2)` backlog. Defaults to [`DEFAULT_BACKLOG`].
    pub fn backlog(mut self, backlog: i32) -> Config {
        self.backlog = backlog;
        self
    }

    /// Sets the inbound ring buffer capacity accepted connections are
    /// given. Rounded up to a power of two by the pool.
    pub fn ring_buffer_capacity(mut self, cap: usize) -> Config {
        self.ring_buffer_cap = cap;
        self
    }

    /// Sets the outbound mixed buffer's ring-vs-list spill threshold.
    pub fn max_stacking_bytes(mut self, bytes: usize) -> Config {
        self.max_stacking_bytes = bytes;
        self
    }
}
