//! Order dispatch service.
//!
//! Hands order payloads to a downstream delivery system through one of
//! several transports (direct HTTP call, queue publish, staging write),
//! retries transient failures with linear backoff, and falls back to a
//! webhook notification plus a durable "undelivered" blob when delivery
//! gives up.

pub mod app;
pub mod config;
pub mod dispatch;
pub mod documents;
pub mod fallback;
pub mod handlers;
pub mod order;
pub mod queue;
pub mod staging;
pub mod transport;
pub mod utils;
