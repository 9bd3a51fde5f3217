//! `blocktcp` is a user-space TCP runtime: a single epoll (Linux) /
//! kqueue (BSD, Darwin) reactor drives all I/O, while application code
//! sees conventional blocking [`Connection::read`]/[`Connection::write`]
//! and a blocking [`Listener::accept`].
//!
//! ```no_run
//! use blocktcp::Listener;
//! use std::io::{Read, Write};
//!
//! let listener = Listener::bind("127.0.0.1:0".parse().unwrap())?;
//! let mut conn = listener.accept()?;
//! let mut buf = [0u8; 4096];
//! let n = conn.read(&mut buf)?;
//! conn.write_all(&buf[..n])?;
//! # Ok::<(), blocktcp::Error>(())
//! ```
//!
//! Socket creation, address parsing, TLS, and application framing are
//! explicitly out of scope; see the crate's design notes for the full
//! list of non-goals.

#![warn(missing_debug_implementations)]

#[macro_use]
mod macros;

mod buf;
mod config;
mod conn;
mod error;
mod event;
mod listener;
mod manager;
mod net;
mod reactor;
mod sys;
mod util;
mod wake;

pub use config::Config;
pub use conn::Connection;
pub use error::Error;
pub use listener::{Incoming, Listener};

/// A specialized `Result` with [`Error`] as its error type.
pub type Result<T> = std::result::Result<T, Error>;
