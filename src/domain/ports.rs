use async_trait::async_trait;
use crate::domain::error::PipelineError;

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the raw payload of the named secret.
    async fn access_secret(&self, name: &str) -> Result<Vec<u8>, PipelineError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Overwrites `bucket/key` with `contents` and returns the object's reference URI.
    async fn write_object(&self, bucket: &str, key: &str, contents: Vec<u8>) -> Result<String, PipelineError>;
}

#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publishes `payload` and waits for the bus to acknowledge it. Returns the ack id.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<String, PipelineError>;
}
