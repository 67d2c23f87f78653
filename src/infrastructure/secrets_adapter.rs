use async_trait::async_trait;
use aws_sdk_secretsmanager::Client;
use tracing::{debug, error};
use crate::domain::{error::PipelineError, ports::SecretStore};

pub struct SecretsManagerAdapter {
    client: Client,
}

impl SecretsManagerAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerAdapter {
    async fn access_secret(&self, name: &str) -> Result<Vec<u8>, PipelineError> {
        debug!("Accessing secret {}", name);

        let response = self.client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to access secret {}: {}", name, e);
                PipelineError::SecretResolution {
                    name: name.to_string(),
                    reason: e.to_string(),
                }
            })?;

        if let Some(value) = response.secret_string() {
            return Ok(value.as_bytes().to_vec());
        }
        if let Some(blob) = response.secret_binary() {
            return Ok(blob.as_ref().to_vec());
        }

        Err(PipelineError::SecretResolution {
            name: name.to_string(),
            reason: "secret returned an empty payload".to_string(),
        })
    }
}
