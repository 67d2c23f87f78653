use async_trait::async_trait;
use aws_sdk_sqs::Client;
use tracing::{debug, info, error};
use crate::domain::{error::PipelineError, ports::MessagePublisher};

/// Publishes to an SQS queue; the topic is the queue URL.
pub struct SqsPublisher {
    client: Client,
}

impl SqsPublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MessagePublisher for SqsPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<String, PipelineError> {
        let body = String::from_utf8(payload)
            .map_err(|e| PipelineError::Notification(format!("payload is not UTF-8: {}", e)))?;
        debug!("Sending {} byte message to {}", body.len(), topic);

        let response = self.client
            .send_message()
            .queue_url(topic)
            .message_body(body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to publish message to {}: {}", topic, e);
                PipelineError::Notification(e.to_string())
            })?;

        let message_id = response.message_id().unwrap_or_default().to_string();
        info!("Message {} acknowledged by {}", message_id, topic);
        Ok(message_id)
    }
}
