pub mod error;
pub mod models;
pub mod notify;
pub mod ports;
