use std::sync::Arc;
use aws_sdk_sqs::Client as SqsClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, error, debug, warn, Instrument};
use uuid::Uuid;
use crate::{
    application::{
        fetch_orchestrator::{FetchOrchestrator, InvocationOutcome},
        transport_cache::TransportCache,
    },
    config::JobConfig,
    domain::{error::PipelineError, models::TriggerEnvelope},
    infrastructure::{
        s3_adapter::S3Adapter,
        secrets_adapter::SecretsManagerAdapter,
        sqs_publisher::SqsPublisher,
    },
};

/// Long-polls the trigger queue and runs each message through the orchestrator.
///
/// A message is deleted only once its invocation finished or was a no-op.
/// Failed messages stay on the queue and come back after the visibility
/// timeout, which is the only retry mechanism the pipeline has.
pub struct SqsWorker {
    orchestrator: FetchOrchestrator,
    sqs_client: SqsClient,
    queue_url: String,
}

impl SqsWorker {
    pub async fn new(config: JobConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        debug!("Initializing SQS worker for job {}", config.job_name);

        debug!("Loading AWS configuration");
        let mut aws_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest());

        // Configure endpoint for LocalStack if AWS_ENDPOINT_URL is set
        if let Ok(endpoint_url) = std::env::var("AWS_ENDPOINT_URL") {
            info!("Using custom AWS endpoint: {}", endpoint_url);
            aws_config_builder = aws_config_builder.endpoint_url(&endpoint_url);
        }

        let aws_config = aws_config_builder.load().await;
        debug!("AWS region: {:?}", aws_config.region());

        let mut s3_config = aws_sdk_s3::config::Builder::from(&aws_config);

        // Enable path-style addressing for LocalStack
        if std::env::var("AWS_ENDPOINT_URL").is_ok() {
            s3_config = s3_config.force_path_style(true);
        }

        let s3_client = aws_sdk_s3::Client::from_conf(s3_config.build());
        let sqs_client = SqsClient::new(&aws_config);
        let secrets_client = aws_sdk_secretsmanager::Client::new(&aws_config);
        debug!("AWS clients initialized");

        let queue_url = std::env::var("TRIGGER_QUEUE_URL").map_err(|_| {
            PipelineError::Config("TRIGGER_QUEUE_URL environment variable is required".to_string())
        })?;
        info!("Using trigger queue: {}", queue_url);

        let orchestrator = FetchOrchestrator::new(
            config,
            Arc::new(SecretsManagerAdapter::new(secrets_client)),
            Arc::new(S3Adapter::new(s3_client)),
            Arc::new(SqsPublisher::new(sqs_client.clone())),
            Arc::new(TransportCache::new()),
        );

        debug!("SQS worker initialization complete");
        Ok(Self { orchestrator, sqs_client, queue_url })
    }

    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Starting SQS worker, polling queue: {}", self.queue_url);

        let mut poll_count: u64 = 0;
        loop {
            poll_count += 1;
            debug!("Polling SQS queue (attempt {})", poll_count);

            let receive = self.sqs_client
                .receive_message()
                .queue_url(&self.queue_url)
                .max_number_of_messages(10)
                .wait_time_seconds(20)
                .send();

            let response = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping SQS worker");
                    return Ok(());
                }
                response = receive => response.map_err(|e| {
                    error!("Failed to receive messages from SQS: {}", e);
                    e
                })?,
            };

            let messages = response.messages.unwrap_or_default();
            if messages.is_empty() {
                debug!("No messages received from SQS");
                continue;
            }
            info!("Received {} messages from SQS", messages.len());

            for (i, message) in messages.iter().enumerate() {
                debug!("Processing message {} of {}", i + 1, messages.len());

                let Some(body) = &message.body else {
                    warn!("Received message without body");
                    continue;
                };

                let span = tracing::info_span!(
                    "invocation",
                    id = %Uuid::new_v4(),
                    job = %self.orchestrator.config().job_name,
                );
                let envelope = TriggerEnvelope::new(body.as_bytes());

                match self.orchestrator.handle(&envelope, &shutdown).instrument(span).await {
                    Ok(outcome) => {
                        log_outcome(&outcome);
                        if let Some(receipt_handle) = &message.receipt_handle {
                            self.delete_message(receipt_handle).await?;
                        }
                    }
                    Err(e) if e.is_cancelled() => {
                        info!("Shutdown interrupted message {}, leaving it for redelivery", i + 1);
                        return Ok(());
                    }
                    Err(e) => {
                        error!("Failed to process message {}, leaving it for redelivery: {}", i + 1, e);
                    }
                }
            }
        }
    }

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        debug!("Deleting processed message from queue");
        self.sqs_client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to delete message from SQS: {}", e);
                e
            })?;
        debug!("Message deleted from queue");
        Ok(())
    }
}

fn log_outcome(outcome: &InvocationOutcome) {
    match outcome {
        InvocationOutcome::EmptyPayload => debug!("Empty delivery acknowledged"),
        InvocationOutcome::Filtered { target } => debug!("Trigger for {} acknowledged without running", target),
        InvocationOutcome::Completed { object_reference, rows, ack_id } => {
            info!("Successfully processed message: {} rows at {} (notify ack {})", rows, object_reference, ack_id)
        }
    }
}
