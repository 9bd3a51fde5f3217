//! Buffering layer: the ring buffer, its pool, the list overflow, and the
//! mixed outbound composite built from them.

pub(crate) mod list;
pub(crate) mod mixed;
pub(crate) mod pool;
pub(crate) mod ring;

pub(crate) use mixed::MixedBuffer;
pub(crate) use pool::RingBufferPool;
pub(crate) use ring::RingBuffer;
