use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio_util::sync::CancellationToken;
use tracing::{info, debug, error, warn};
use crate::{
    application::transport_cache::TransportCache,
    config::{AuctionSource, JobConfig, JobKind, TriggerEncoding},
    domain::{
        error::PipelineError,
        models::{Secrets, TriggerEnvelope, TriggerMessage},
        notify::NotifyMessage,
        ports::{MessagePublisher, ObjectStore, SecretStore},
    },
    infrastructure::{
        serializers::csv_writer::encode_csv,
        wow_api::{OAuth2Secrets, RealmDataClient},
    },
};

/// Pipeline stages, in execution order. Used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decode,
    ResolveSecrets,
    Authenticate,
    Fetch,
    Stage,
    Notify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Decode => "decode",
            Stage::ResolveSecrets => "resolve-secrets",
            Stage::Authenticate => "authenticate",
            Stage::Fetch => "fetch",
            Stage::Stage => "stage",
            Stage::Notify => "notify",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// The bus delivered a message without data.
    EmptyPayload,
    /// The trigger was meant for another job.
    Filtered { target: String },
    Completed {
        object_reference: String,
        rows: usize,
        ack_id: String,
    },
}

/// Runs one job (realm topology or auctions) per trigger message.
pub struct FetchOrchestrator {
    config: JobConfig,
    secret_store: Arc<dyn SecretStore>,
    object_store: Arc<dyn ObjectStore>,
    publisher: Arc<dyn MessagePublisher>,
    transports: Arc<TransportCache>,
}

impl FetchOrchestrator {
    pub fn new(
        config: JobConfig,
        secret_store: Arc<dyn SecretStore>,
        object_store: Arc<dyn ObjectStore>,
        publisher: Arc<dyn MessagePublisher>,
        transports: Arc<TransportCache>,
    ) -> Self {
        Self {
            config,
            secret_store,
            object_store,
            publisher,
            transports,
        }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Handles one delivery. Any error means the message should be redelivered;
    /// cancelling `cancel` abandons whichever stage is in flight.
    pub async fn handle(
        &self,
        envelope: &TriggerEnvelope,
        cancel: &CancellationToken,
    ) -> Result<InvocationOutcome, PipelineError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Invocation of {} cancelled", self.config.job_name);
                Err(PipelineError::Cancelled)
            }
            result = self.run(envelope) => result,
        }
    }

    async fn run(&self, envelope: &TriggerEnvelope) -> Result<InvocationOutcome, PipelineError> {
        if envelope.is_empty() {
            info!("Got empty message, skipping");
            return Ok(InvocationOutcome::EmptyPayload);
        }

        // Step 1: Decode the trigger and check it is meant for this job
        debug!("Step 1: Decoding {} byte trigger", envelope.data.len());
        let trigger = self.decode_trigger(envelope).map_err(failed(Stage::Decode))?;
        if trigger.target != self.config.job_name {
            info!("Trigger intended for a different target {:?}", trigger.target);
            return Ok(InvocationOutcome::Filtered { target: trigger.target });
        }

        // Step 2: Resolve OAuth2 credentials
        debug!("Step 2: Resolving secrets");
        let secrets = self.resolve_secrets().await.map_err(failed(Stage::ResolveSecrets))?;

        // Step 3: Build the authenticated API client
        debug!("Step 3: Authenticating against {}", self.config.endpoints.token_url);
        let client = self.authenticate(secrets).await.map_err(failed(Stage::Authenticate))?;

        // Step 4: Fetch and encode
        debug!("Step 4: Fetching {:?} data", self.config.kind);
        let (csv, rows) = self.fetch_csv(&client).await.map_err(failed(Stage::Fetch))?;
        info!("Fetched {} rows for {}", rows, self.config.job_name);

        // Step 5: Stage to object storage, replacing the previous run's output
        debug!("Step 5: Staging to {}/{}", self.config.bucket, self.config.object_key);
        let object_reference = self.object_store
            .write_object(&self.config.bucket, &self.config.object_key, csv)
            .await
            .map_err(failed(Stage::Stage))?;

        // Step 6: Tell the loader. The staged object stays put if this fails.
        debug!("Step 6: Notifying {}", self.config.notify_topic);
        let ack_id = self.notify(&object_reference).await.map_err(failed(Stage::Notify))?;

        info!("✅ Staged {} rows to {} and notified the loader", rows, object_reference);
        Ok(InvocationOutcome::Completed {
            object_reference,
            rows,
            ack_id,
        })
    }

    fn decode_trigger(&self, envelope: &TriggerEnvelope) -> Result<TriggerMessage, PipelineError> {
        let json = match self.config.trigger_encoding {
            TriggerEncoding::Raw => envelope.data.clone(),
            TriggerEncoding::Base64 => {
                let text = String::from_utf8_lossy(&envelope.data);
                STANDARD.decode(text.trim()).map_err(|e| {
                    PipelineError::MalformedTrigger(format!("failed to decode base64 {:?}: {}", text, e))
                })?
            }
        };

        serde_json::from_slice(&json).map_err(|e| {
            PipelineError::MalformedTrigger(format!(
                "failed to decode json {:?}: {}",
                String::from_utf8_lossy(&json),
                e
            ))
        })
    }

    async fn resolve_secrets(&self) -> Result<OAuth2Secrets, PipelineError> {
        let id_name = self.config.client_id_secret.as_str();
        let secret_name = self.config.client_secret_secret.as_str();

        let mut secrets = Secrets::requesting([id_name, secret_name]);
        for name in secrets.names() {
            let value = self.fetch_secret(&name).await?;
            secrets.set(&name, value);
        }
        debug!("Resolved {:?}", secrets);

        let lookup = |name: &str| {
            secrets
                .get(name)
                .map(str::to_string)
                .ok_or_else(|| PipelineError::SecretResolution {
                    name: name.to_string(),
                    reason: "secret was not resolved".to_string(),
                })
        };
        Ok(OAuth2Secrets {
            client_id: lookup(id_name)?,
            client_secret: lookup(secret_name)?,
        })
    }

    async fn fetch_secret(&self, name: &str) -> Result<String, PipelineError> {
        let resolution_error = |reason: String| PipelineError::SecretResolution {
            name: name.to_string(),
            reason,
        };

        let payload = tokio::time::timeout(self.config.secret_timeout, self.secret_store.access_secret(name))
            .await
            .map_err(|_| resolution_error(format!("timed out after {:?}", self.config.secret_timeout)))?
            .map_err(|e| match e {
                e @ PipelineError::SecretResolution { .. } => e,
                other => resolution_error(other.to_string()),
            })?;

        if payload.is_empty() {
            return Err(resolution_error("secret returned empty data".to_string()));
        }
        String::from_utf8(payload).map_err(|_| resolution_error("secret is not valid UTF-8".to_string()))
    }

    async fn authenticate(&self, secrets: OAuth2Secrets) -> Result<RealmDataClient, PipelineError> {
        let transport = self.transports
            .get_or_authenticate(secrets, &self.config.endpoints.token_url)
            .await?;
        Ok(RealmDataClient::with_base_url(
            transport,
            &self.config.region,
            self.config.endpoints.api_base_url.as_str(),
        ))
    }

    async fn fetch_csv(&self, client: &RealmDataClient) -> Result<(Vec<u8>, usize), PipelineError> {
        match self.config.kind {
            JobKind::Realms => {
                let rows = client.list_connected_realms().await?.rows();
                Ok((encode_csv(&rows)?, rows.len()))
            }
            JobKind::Auctions => {
                let realm_id = self.auction_realm_id(client).await?;
                let auctions = client.list_auctions(realm_id).await?;
                Ok((encode_csv(&auctions)?, auctions.len()))
            }
        }
    }

    async fn auction_realm_id(&self, client: &RealmDataClient) -> Result<i64, PipelineError> {
        match &self.config.auction_source {
            AuctionSource::ConnectedRealmId(id) => Ok(*id),
            AuctionSource::RealmName(name) => {
                let index = client.list_connected_realms().await?;
                let realm = index.get(name).ok_or_else(|| PipelineError::UnknownRealm(name.clone()))?;
                debug!("Realm {} belongs to connected realm {}", name, realm.id);
                Ok(realm.id)
            }
        }
    }

    async fn notify(&self, object_reference: &str) -> Result<String, PipelineError> {
        let message = NotifyMessage {
            object_reference: object_reference.to_string(),
            dataset_id: self.config.dataset_id.clone(),
            table_id: self.config.table_id.clone(),
            write_mode: self.config.write_disposition(),
        };
        debug!("Publishing {:?}", message);

        self.publisher
            .publish(&self.config.notify_topic, message.to_vec()?)
            .await
            .map_err(|e| match e {
                e @ PipelineError::Notification(_) => e,
                other => PipelineError::Notification(other.to_string()),
            })
    }
}

fn failed(stage: Stage) -> impl FnOnce(PipelineError) -> PipelineError {
    move |e| {
        error!("Stage {} failed: {}", stage, e);
        e
    }
}
