//! Integration test utilities for the gateway bridge
//!
//! Provides an in-process STOMP broker and a scripted gateway session so
//! the full bridge can run without external services.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
