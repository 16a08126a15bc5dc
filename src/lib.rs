//! # payload-queue
//!
//! A size- and age-triggered payload batching queue built on Tokio.
//!
//! ## Features
//!
//! - **Batching by count or staleness** — a batch is dispatched as soon as the
//!   pending buffer reaches `max_size` or has been idle longer than `max_age`
//! - **Unbounded concurrent dispatch** with tracked graceful drain on close
//! - **Graceful cancellation** of the background monitor and intake tasks
//! - **Injectable id generation** and an optional diagnostic event sink
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use payload_queue::{BatchQueue, ConfigBuilder};
//! use std::time::Duration;
//!
//! let config = ConfigBuilder::default()
//!     .tag("jobs")
//!     .max_size(100usize)
//!     .max_age(Duration::from_secs(10))
//!     .build()?;
//!
//! let queue: BatchQueue<String> = BatchQueue::new(config)
//!     .worker(|items: Vec<String>| async move {
//!         // process one batch, return a status code
//!         0
//!     })
//!     .event_sink(|line| println!("{line}"));
//!
//! queue.start().await?;
//! queue.submit("work".to_string()).await;
//! queue.close().await;
//! ```
//!
//! ## Modules
//!
//! - [`queue`] - The batching queue core, its configuration and payload types

pub mod queue;

pub use queue::{BatchQueue, Config, ConfigBuilder, Lifecycle, Payload, QueueError, Worker};
