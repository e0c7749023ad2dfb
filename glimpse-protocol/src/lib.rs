//! # glimpse-protocol
//!
//! The host-facing side of the glimpse preview engine.
//!
//! The host and the engine exchange newline-delimited JSON frames:
//!
//! ```text
//! host  -> {"protocolVersion":"1.0","messageType":"start","capabilities":[...]}
//! engine-> {"protocolVersion":"1.0","messageType":"acknowledge","capabilities":[...]}
//! host  -> {"protocolVersion":"1.0","messageType":"request_preview","path":"a.md","liveUpdate":true}
//! engine-> {"protocolVersion":"1.0","messageType":"preview_complete","path":"a.md","html":"..."}
//! ```
//!
//! Frames are validated against [`schema::SchemaRegistry`], executed one at a
//! time by [`queue::QueuedMessageProcessor`] and dispatched to the
//! [`engine::Engine`] handlers.

pub mod engine;
pub mod message;
pub mod processor;
pub mod queue;
pub mod schema;
pub mod transport;

pub use engine::{
    advertised_capabilities, default_factory, requested_capabilities, Engine, EngineError,
};
pub use message::{handler_key, LogLevel, Message, MessageBody, PROTOCOL_VERSION};
pub use processor::{
    handler_fn, MessageHandler, MessageProcessor, ProcessError, ValidatingMessageProcessor,
};
pub use queue::QueuedMessageProcessor;
pub use schema::{SchemaRegistry, ValidationError, Violation};
pub use transport::{MessageLayer, StreamMessageLayer, TransportError};
