//! Publisher that records messages instead of sending them.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::PublishError;
use crate::publisher::{Headers, Publisher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub queue: String,
    pub headers: Headers,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
    failure: Mutex<Option<String>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher whose every call is rejected with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            messages: Mutex::default(),
            failure: Mutex::new(Some(message.into())),
        }
    }

    pub async fn set_failure(&self, message: Option<String>) {
        *self.failure.lock().await = message;
    }

    pub async fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.messages.lock().await.len()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    fn name(&self) -> &str {
        "recording"
    }

    async fn publish(
        &self,
        queue: &str,
        headers: &Headers,
        body: &str,
    ) -> Result<(), PublishError> {
        if let Some(message) = self.failure.lock().await.clone() {
            return Err(PublishError::rejected(message));
        }
        self.messages.lock().await.push(PublishedMessage {
            queue: queue.to_string(),
            headers: headers.clone(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_messages() {
        let publisher = RecordingPublisher::new();
        let mut headers = Headers::new();
        headers.insert("Authorization".into(), "Bearer t".into());
        publisher.publish("q", &headers, "{}").await.unwrap();

        let messages = publisher.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].queue, "q");
        assert_eq!(messages[0].headers["Authorization"], "Bearer t");
    }

    #[tokio::test]
    async fn test_failure_toggle() {
        let publisher = RecordingPublisher::failing("broker down");
        assert!(publisher.publish("q", &Headers::new(), "{}").await.is_err());
        assert_eq!(publisher.count().await, 0);

        publisher.set_failure(None).await;
        publisher.publish("q", &Headers::new(), "{}").await.unwrap();
        assert_eq!(publisher.count().await, 1);
    }
}
