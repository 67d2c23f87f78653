//! Per-deployment job configuration.
//!
//! Every deployment runs exactly one job. The defaults below are the values the
//! jobs are deployed with; environment variables only override them.

use std::time::Duration;

use tracing::{debug, info};

use crate::domain::error::PipelineError;
use crate::domain::notify::WriteDisposition;
use crate::infrastructure::wow_api::client::api_base_url_for_region;
use crate::infrastructure::wow_api::oauth2::token_url_for_region;

pub const REALMS_JOB_NAME: &str = "fetch-realms";
pub const AUCTIONS_JOB_NAME: &str = "fetch-auctions";

const DEFAULT_REGION: &str = "us";
const DEFAULT_BUCKET: &str = "wow-realm-data";
const DEFAULT_DATASET: &str = "wow_data";
const DEFAULT_NOTIFY_TOPIC: &str = "storagetobigtable";
const DEFAULT_CLIENT_ID_SECRET: &str = "blizzard-oauth-client-id";
const DEFAULT_CLIENT_SECRET_SECRET: &str = "blizzard-oauth-client-secret";
// Zul'jin
const DEFAULT_CONNECTED_REALM_ID: i64 = 61;
const SECRET_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Realms,
    Auctions,
}

impl JobKind {
    pub fn write_disposition(&self) -> WriteDisposition {
        match self {
            JobKind::Realms => WriteDisposition::Truncate,
            JobKind::Auctions => WriteDisposition::Append,
        }
    }
}

/// How the trigger JSON is wrapped inside the bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEncoding {
    Raw,
    Base64,
}

#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub token_url: String,
    pub api_base_url: String,
}

impl ApiEndpoints {
    pub fn for_region(region: &str) -> Self {
        Self {
            token_url: token_url_for_region(region),
            api_base_url: api_base_url_for_region(region),
        }
    }
}

/// Which connected realm the auction job reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuctionSource {
    ConnectedRealmId(i64),
    /// Resolved through the realm index on every run.
    RealmName(String),
}

#[derive(Debug, Clone)]
pub struct JobConfig {
    pub kind: JobKind,
    pub job_name: String,
    pub trigger_encoding: TriggerEncoding,
    pub region: String,
    pub endpoints: ApiEndpoints,
    pub client_id_secret: String,
    pub client_secret_secret: String,
    pub secret_timeout: Duration,
    pub bucket: String,
    pub object_key: String,
    pub dataset_id: String,
    pub table_id: String,
    pub notify_topic: String,
    pub auction_source: AuctionSource,
}

impl JobConfig {
    pub fn realms(region: &str) -> Self {
        Self {
            kind: JobKind::Realms,
            job_name: REALMS_JOB_NAME.to_string(),
            trigger_encoding: TriggerEncoding::Base64,
            object_key: "realms".to_string(),
            table_id: "realms".to_string(),
            ..Self::base(region)
        }
    }

    pub fn auctions(region: &str) -> Self {
        Self {
            kind: JobKind::Auctions,
            job_name: AUCTIONS_JOB_NAME.to_string(),
            trigger_encoding: TriggerEncoding::Raw,
            object_key: "auctions".to_string(),
            table_id: "auctions".to_string(),
            ..Self::base(region)
        }
    }

    fn base(region: &str) -> Self {
        Self {
            kind: JobKind::Auctions,
            job_name: String::new(),
            trigger_encoding: TriggerEncoding::Raw,
            region: region.to_string(),
            endpoints: ApiEndpoints::for_region(region),
            client_id_secret: DEFAULT_CLIENT_ID_SECRET.to_string(),
            client_secret_secret: DEFAULT_CLIENT_SECRET_SECRET.to_string(),
            secret_timeout: SECRET_FETCH_TIMEOUT,
            bucket: DEFAULT_BUCKET.to_string(),
            object_key: String::new(),
            dataset_id: DEFAULT_DATASET.to_string(),
            table_id: String::new(),
            notify_topic: DEFAULT_NOTIFY_TOPIC.to_string(),
            auction_source: AuctionSource::ConnectedRealmId(DEFAULT_CONNECTED_REALM_ID),
        }
    }

    pub fn write_disposition(&self) -> WriteDisposition {
        self.kind.write_disposition()
    }

    pub fn from_env() -> Result<Self, PipelineError> {
        let job_name = std::env::var("JOB_NAME")
            .map_err(|_| PipelineError::Config("JOB_NAME environment variable is required".to_string()))?;
        let region = std::env::var("WOW_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());
        debug!("Loading configuration for job {} in region {}", job_name, region);

        let mut config = match job_name.as_str() {
            REALMS_JOB_NAME => Self::realms(&region),
            AUCTIONS_JOB_NAME => Self::auctions(&region),
            other => return Err(PipelineError::Config(format!("unknown job name {:?}", other))),
        };

        if let Ok(bucket) = std::env::var("DEST_BUCKET") {
            config.bucket = bucket;
        }
        if let Ok(topic) = std::env::var("NOTIFY_QUEUE_URL") {
            config.notify_topic = topic;
        }
        if let Ok(name) = std::env::var("CLIENT_ID_SECRET_NAME") {
            config.client_id_secret = name;
        }
        if let Ok(name) = std::env::var("CLIENT_SECRET_SECRET_NAME") {
            config.client_secret_secret = name;
        }
        if let Ok(url) = std::env::var("WOW_TOKEN_URL") {
            config.endpoints.token_url = url;
        }
        if let Ok(url) = std::env::var("WOW_API_BASE_URL") {
            config.endpoints.api_base_url = url;
        }
        if let Ok(name) = std::env::var("AUCTION_REALM_NAME") {
            config.auction_source = AuctionSource::RealmName(name);
        } else if let Ok(id) = std::env::var("AUCTION_CONNECTED_REALM_ID") {
            let id = id
                .parse()
                .map_err(|_| PipelineError::Config(format!("AUCTION_CONNECTED_REALM_ID {:?} is not an integer", id)))?;
            config.auction_source = AuctionSource::ConnectedRealmId(id);
        }

        info!(
            "Job {} will stage to s3://{}/{} and notify {}",
            config.job_name, config.bucket, config.object_key, config.notify_topic
        );
        Ok(config)
    }
}
