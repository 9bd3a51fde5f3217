#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub(crate) use self::unix::{event, Event, Events, Selector};
