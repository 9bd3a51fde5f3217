mod selector;

pub(crate) use selector::{event, Event, Events, Selector};
