//! Job queue adapter
//!
//! Long-poll receive, delete, visibility extension, and enqueue against an
//! SQS-compatible queue. The queue's at-least-once contract shapes the
//! worker: a message is deleted only after the job commits, so a crash or
//! failure lets the visibility timeout redeliver it. Redrive to the
//! dead-letter queue after repeated receives is queue-side policy, not code
//! in this crate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aws_sdk_sqs::types::{MessageAttributeValue, QueueAttributeName};
use aws_sdk_sqs::Client;
use tracing::debug;

/// Errors surfaced by the queue adapter.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("sqs request failed: {0}")]
    Request(String),
    #[error("invalid message attribute: {0}")]
    Attribute(String),
}

/// One received queue message.
///
/// String-valued message attributes are lifted into `attributes` so the
/// worker can hand them to the trace-context extractor.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    pub attributes: HashMap<String, String>,
}

/// Shared SQS client handle bound to one queue URL.
#[derive(Clone)]
pub struct SqsClient {
    client: Arc<Client>,
    queue_url: String,
}

impl SqsClient {
    pub async fn new(queue_url: String) -> Self {
        let aws_config = aws_config::load_from_env().await;
        Self {
            client: Arc::new(Client::new(&aws_config)),
            queue_url,
        }
    }

    pub fn from_client(client: Client, queue_url: String) -> Self {
        Self {
            client: Arc::new(client),
            queue_url,
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Long-poll for up to `max_messages` messages. Returns within
    /// `wait` plus network overhead even when the queue is empty, so the
    /// caller's loop never busy-spins.
    pub async fn receive(
        &self,
        max_messages: i32,
        wait: Duration,
        visibility: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait.as_secs() as i32)
            .visibility_timeout(visibility.as_secs() as i32)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| QueueError::Request(e.to_string()))?;

        let messages = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| {
                let message_id = msg.message_id.clone()?;
                let receipt_handle = msg.receipt_handle.clone()?;
                let body = msg.body.clone().unwrap_or_default();
                let attributes = msg
                    .message_attributes
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|(k, v)| v.string_value.map(|s| (k, s)))
                    .collect();
                Some(QueueMessage {
                    message_id,
                    receipt_handle,
                    body,
                    attributes,
                })
            })
            .collect();

        Ok(messages)
    }

    /// Delete a message by receipt handle. Safe to repeat; SQS treats a
    /// second delete of the same handle as a no-op.
    pub async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Request(e.to_string()))?;

        debug!("deleted queue message");
        Ok(())
    }

    /// Extend the visibility timeout of an in-flight message.
    pub async fn change_visibility(
        &self,
        receipt_handle: &str,
        visibility: Duration,
    ) -> Result<(), QueueError> {
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(visibility.as_secs() as i32)
            .send()
            .await
            .map_err(|e| QueueError::Request(e.to_string()))?;

        Ok(())
    }

    /// Enqueue a message body with string attributes (trace headers).
    pub async fn send(
        &self,
        body: String,
        attributes: HashMap<String, String>,
    ) -> Result<String, QueueError> {
        let mut attribute_values = HashMap::new();
        for (key, value) in attributes {
            let attr = MessageAttributeValue::builder()
                .data_type("String")
                .string_value(value)
                .build()
                .map_err(|e| QueueError::Attribute(e.to_string()))?;
            attribute_values.insert(key, attr);
        }

        let response = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .set_message_attributes(if attribute_values.is_empty() {
                None
            } else {
                Some(attribute_values)
            })
            .send()
            .await
            .map_err(|e| QueueError::Request(e.to_string()))?;

        Ok(response.message_id.unwrap_or_default())
    }

    /// Deep-health probe: fetch queue attributes with a short deadline.
    pub async fn health_check(&self, deadline: Duration) -> Result<(), QueueError> {
        tokio::time::timeout(deadline, async {
            self.client
                .get_queue_attributes()
                .queue_url(&self.queue_url)
                .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
                .send()
                .await
                .map_err(|e| QueueError::Request(e.to_string()))
        })
        .await
        .map_err(|_| QueueError::Request("get_queue_attributes timed out".to_string()))??;

        Ok(())
    }
}
