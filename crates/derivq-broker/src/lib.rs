//! Queue publishers for derivq.
//!
//! [`Publisher`] is the seam the dispatcher writes through. [`StompPublisher`]
//! speaks STOMP 1.2 to a broker such as ActiveMQ; [`RecordingPublisher`]
//! keeps messages in memory for dry runs and tests.

pub mod config;
pub mod error;
pub mod frame;
pub mod memory;
pub mod publisher;
pub mod stomp;

pub use config::BrokerConfig;
pub use error::PublishError;
pub use frame::Frame;
pub use memory::{PublishedMessage, RecordingPublisher};
pub use publisher::{Headers, Publisher};
pub use stomp::StompPublisher;
