//! Test helpers for forwarder integration tests.
//!
//! - Mock inspector UI (axum echo server)
//! - Raw WebSocket-style upgrade endpoint
//! - Forwarder construction with fixed launch parameters

#![allow(dead_code)] // Not every test file uses every helper

pub mod mock_upstream;

pub use mock_upstream::*;
