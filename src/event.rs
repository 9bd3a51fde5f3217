//! Readiness bitset and per-fd interest mode.
//!
//! Modeled as a small copyable newtype rather than pulling in `bitflags`,
//! matching the style of mio's own `Interest` type.

use std::fmt;

const READABLE: u8 = 0b001;
const WRITABLE: u8 = 0b010;
const ERROR: u8 = 0b100;

/// A bitset of readiness signals reported by the reactor.
///
/// `IN` and `OUT` both implicitly carry `ERR`: a hang-up or error condition
/// is reported alongside whichever direction noticed it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EventMask(u8);

impl EventMask {
    /// Readable: data is available, or the peer performed an orderly
    /// shutdown of the read half.
    pub const IN: EventMask = EventMask(READABLE | ERROR);
    /// Writable: the socket send buffer has room.
    pub const OUT: EventMask = EventMask(WRITABLE | ERROR);
    /// Error, hang-up, or peer-closed condition only.
    pub const ERR: EventMask = EventMask(ERROR);

    pub const fn empty() -> EventMask {
        EventMask(0)
    }

    pub const fn is_readable(self) -> bool {
        self.0 & READABLE != 0
    }

    pub const fn is_writable(self) -> bool {
        self.0 & WRITABLE != 0
    }

    pub const fn is_error(self) -> bool {
        self.0 & ERROR != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn union(self, other: EventMask) -> EventMask {
        EventMask(self.0 | other.0)
    }
}

impl std::ops::BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        self.union(rhs)
    }
}

impl fmt::Debug for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        if self.is_readable() {
            list.entry(&"IN");
        }
        if self.is_writable() {
            list.entry(&"OUT");
        }
        if self.is_error() {
            list.entry(&"ERR");
        }
        list.finish()
    }
}

/// The interest a connection currently has registered with the reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PollMode {
    Read = 0,
    ReadWrite = 1,
}

impl PollMode {
    pub(crate) fn to_event_mask(self) -> EventMask {
        match self {
            PollMode::Read => EventMask::IN,
            PollMode::ReadWrite => EventMask::IN | EventMask::OUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_and_out_carry_err() {
        assert!(EventMask::IN.is_error());
        assert!(EventMask::OUT.is_error());
        assert!(!EventMask::IN.is_writable());
        assert!(!EventMask::OUT.is_readable());
    }

    #[test]
    fn union_combines_directions() {
        let mask = EventMask::IN | EventMask::OUT;
        assert!(mask.is_readable());
        assert!(mask.is_writable());
        assert!(mask.is_error());
    }

    #[test]
    fn poll_mode_to_event_mask() {
        assert!(!PollMode::Read.to_event_mask().is_writable());
        assert!(PollMode::ReadWrite.to_event_mask().is_writable());
    }
}
