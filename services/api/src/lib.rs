//! services/api/src/lib.rs
//!
//! The ReadCircle API service: adapters for the core ports, the lifecycle
//! engine, and the HTTP/WebSocket surface.

pub mod adapters;
pub mod config;
pub mod engine;
pub mod error;
pub mod web;
