/// Basic application code
pub mod app;
/// Event catalog and form page caching
pub mod catalog;
/// REST clients for outside services
pub mod client;
/// Controllers for REST endpoints
pub mod controller;
/// Domain objects and signup validation
pub mod domain;
/// HTTP error responses
pub mod error;
/// Sweeps of expired dedupe markers and rate-limit counters
pub mod housekeeping;
/// Persisted records and queue messages
pub mod model;
/// Signup pipeline
pub mod pipeline;
/// Request admission control
pub mod rate_limit;
/// Repositories
pub mod repo;
/// Application settings
pub mod settings;
/// Application telemetry for tracing and logging
pub mod telemetry;
/// HTML pages
pub mod views;
/// SMS notification worker
pub mod worker;
