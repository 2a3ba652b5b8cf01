use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::PublishError;

/// Message headers in insertion order.
pub type Headers = IndexMap<String, String>;

/// Writes one message to a named queue.
///
/// Implementations must either deliver the whole message or return an
/// error; partial sends are not retried.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn publish(&self, queue: &str, headers: &Headers, body: &str)
    -> Result<(), PublishError>;
}
