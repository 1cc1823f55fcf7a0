//! Push-to-pull bridge between a callback-driven transport and async readers.
//!
//! The transport pushes byte slices through a [`StreamProducer`] from whatever
//! thread its callbacks run on; every slice is copied before `write` returns,
//! so the transport may reuse its buffer immediately. The consumer pulls with
//! [`StreamReader::read`], which waits (bounded by an inactivity timeout) when
//! nothing is queued. Bytes come out in exactly the order they went in.

mod bridge;
mod chunk;
mod error;

pub use bridge::{
    stream_bridge, BridgeState, StreamProducer, StreamReader, DEFAULT_INACTIVITY_TIMEOUT,
};
pub use error::StreamError;
