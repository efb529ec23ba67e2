//! Shared helpers: process bootstrap and retry backoff.

pub mod bootstrap;
pub mod retry;
