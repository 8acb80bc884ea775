//! Abatcher Core Library
//!
//! Sends batches of HTTP requests concurrently under an in-flight limit and a
//! start-rate limit, and returns one JSON result per request in input order.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`request`] - Request item shapes and normalization
//! - [`transport`] - Pooled HTTP transport with retries
//! - [`scheduler`] - Concurrency gate, rate limiter and dispatch stream
//! - [`result`] - Per-request results and batch statistics
//! - [`blocking`] - Synchronous front end
//!
//! # Example
//!
//! ```no_run
//! use abatcher_core::{BatchConfig, BatchOptions, Batcher, RequestItem};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), abatcher_core::BatchError> {
//! let batcher = Batcher::new(
//!     BatchConfig::default()
//!         .with_base_url("https://api.example.com")
//!         .with_max_concurrent(5)
//!         .with_max_per_second(10.0),
//! )?;
//!
//! let items = vec![
//!     RequestItem::from("/users/1"),
//!     RequestItem::from(("/users", json!({"name": "ada"}))),
//! ];
//! let results = batcher.process_batch(items, &BatchOptions::default()).await?;
//! assert_eq!(results.len(), 2);
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod batcher;
pub mod blocking;
mod collector;
mod config;
mod error;
pub mod request;
pub mod result;
pub mod scheduler;
pub mod transport;
mod user_agent;

// Re-export commonly used types
pub use batcher::{BatchOptions, Batcher, run};
pub use blocking::BlockingBatcher;
pub use collector::collect_ordered;
pub use config::BatchConfig;
pub use error::BatchError;
pub use request::{RequestDescriptor, RequestItem, ValidationError};
pub use result::{BatchStats, DispatchResult, Outcome};
pub use scheduler::{Dispatches, Scheduler};
pub use transport::{
    Connector, HttpConnector, HttpTransport, Transport, TransportError, TransportInitError,
    TransportSettings,
};

pub use reqwest::Method;
