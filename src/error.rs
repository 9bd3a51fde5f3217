use std::io;

/// Programming and transport errors surfaced by `blocktcp`.
///
/// [`Error::Io`] carries peer-caused failures (`ECONNRESET`, `EPIPE`, a
/// hung-up poll event) and unexpected syscall failures; the other variants
/// are invalid-argument errors raised synchronously by the reactor and are
/// never produced by ordinary I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file descriptor of zero (or negative) was passed to the reactor.
    #[error("file descriptor is zero or negative")]
    FdIsZero,

    /// `Register` was called for an fd already present in the interest set.
    #[error("file descriptor is already registered")]
    FdRegistered,

    /// `Remove`, `ModRead`, or `ModReadWrite` was called for an fd the
    /// reactor does not know about.
    #[error("file descriptor is not registered")]
    FdUnregistered,

    /// `Register` was called with an empty interest mode.
    #[error("poll mode must not be empty")]
    ModeIsNone,

    /// A transport or unexpected syscall failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Io(err) => err,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
