pub mod fetch_orchestrator;
pub mod transport_cache;
