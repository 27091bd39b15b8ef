//! Reconnecting consumer for the backend's `text/event-stream` endpoints.

pub mod backoff;
pub mod client;
pub mod decoder;
pub mod error;


pub use backoff::{ReconnectBackoff, DEFAULT_MAX_BACKOFF, DEFAULT_RECONNECT_BASE};
pub use client::{
    ConnectionState, ErrorObserver, EventStreamClient, ListenerId, MessageListener, StreamMessage,
};
pub use decoder::{data_payload, LineDecoder, DATA_PREFIX};
pub use error::StreamError;
