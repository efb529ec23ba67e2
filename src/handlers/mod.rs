//! HTTP handlers for the order dispatch service.

pub mod rest;
