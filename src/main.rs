use auction_ingestion::{config::JobConfig, sqs_worker::SqsWorker};
use tokio_util::sync::CancellationToken;
use tracing::{info, debug, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive("auction_ingestion=debug".parse()?)
            .add_directive("aws_sdk=warn".parse()?)
            .add_directive("reqwest=info".parse()?))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting auction ingestion worker");
    debug!("Environment variables: JOB_NAME={}, TRIGGER_QUEUE_URL={}, NOTIFY_QUEUE_URL={}",
        std::env::var("JOB_NAME").unwrap_or_else(|_| "not set".to_string()),
        std::env::var("TRIGGER_QUEUE_URL").unwrap_or_else(|_| "not set".to_string()),
        std::env::var("NOTIFY_QUEUE_URL").unwrap_or_else(|_| "not set".to_string())
    );

    let config = JobConfig::from_env()?;
    let worker = SqsWorker::new(config).await?;
    info!("SQS worker initialized successfully");

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl-C, shutting down");
            on_signal.cancel();
        }
    });

    worker.run(shutdown).await
}
