//! Fetches World of Warcraft realm and auction data from the Battle.net API,
//! stages it as CSV in S3 and notifies the warehouse loader over SQS.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod sqs_worker;
