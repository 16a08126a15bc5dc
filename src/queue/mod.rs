pub mod config;
pub mod events;
pub mod payload;
pub mod queue;
pub mod types;
pub mod worker;

pub use config::{Config, ConfigBuilder};
pub use events::EventSink;
pub use payload::{IdSource, Payload, RandomIds};
pub use queue::{BatchQueue, Lifecycle};
pub use types::QueueError;
pub use worker::Worker;
