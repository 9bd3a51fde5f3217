//! Per-OS reactor backend, selected at compile time. The dispatch-loop
//! code above this module (`reactor`, `manager`) is platform-independent;
//! only `epoll.rs`/`kqueue.rs` know about the underlying kernel facility.

#[cfg(any(
    target_os = "android",
    target_os = "illumos",
    target_os = "linux",
))]
mod epoll;

#[cfg(any(
    target_os = "android",
    target_os = "illumos",
    target_os = "linux",
))]
pub(crate) use self::epoll::{event, Event, Events, Selector};

#[cfg(any(
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "ios",
    target_os = "macos",
    target_os = "netbsd",
    target_os = "openbsd",
))]
mod kqueue;

#[cfg(any(
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "ios",
    target_os = "macos",
    target_os = "netbsd",
    target_os = "openbsd",
))]
pub(crate) use self::kqueue::{event, Event, Events, Selector};

#[cfg(not(any(
    target_os = "android",
    target_os = "illumos",
    target_os = "linux",
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "ios",
    target_os = "macos",
    target_os = "netbsd",
    target_os = "openbsd",
)))]
compile_error!(
    "blocktcp only implements the epoll and kqueue reactor backends for this target_os"
);
