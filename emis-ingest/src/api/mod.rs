//! HTTP API handlers for emis-ingest

pub mod health;
pub mod ingest;
pub mod jobs;
pub mod mapping;

pub use health::health_routes;
pub use ingest::ingest_routes;
pub use jobs::job_routes;
pub use mapping::mapping_routes;
