pub mod s3_adapter;
pub mod secrets_adapter;
pub mod serializers;
pub mod sqs_publisher;
pub mod wow_api;
