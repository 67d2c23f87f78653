pub mod client;
pub mod oauth2;
mod responses;

pub use client::RealmDataClient;
pub use oauth2::{AuthenticatedTransport, OAuth2Secrets};
