use async_trait::async_trait;
use aws_sdk_s3::{Client, primitives::ByteStream};
use tracing::{debug, info, error};
use crate::domain::{error::PipelineError, ports::ObjectStore};

const CSV_CONTENT_TYPE: &str = "text/csv";

pub struct S3Adapter {
    client: Client,
}

impl S3Adapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Adapter {
    async fn write_object(&self, bucket: &str, key: &str, contents: Vec<u8>) -> Result<String, PipelineError> {
        debug!("Uploading {} bytes to s3://{}/{}", contents.len(), bucket, key);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(CSV_CONTENT_TYPE)
            .body(ByteStream::from(contents))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload s3://{}/{}: {}", bucket, key, e);
                PipelineError::Storage(e.to_string())
            })?;

        // Read the metadata back so a reference is only returned for an object S3 can serve.
        let head = self.client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                error!("Uploaded object s3://{}/{} is not readable: {}", bucket, key, e);
                PipelineError::Storage(e.to_string())
            })?;

        info!("Staged s3://{}/{} (etag: {:?}, size: {:?})", bucket, key, head.e_tag(), head.content_length());
        Ok(format!("s3://{}/{}", bucket, key))
    }
}
