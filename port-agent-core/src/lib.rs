//! Core types for the port agent transport layer
//!
//! This crate provides the error taxonomy shared by every transport variant
//! and by the connection composition layer.

pub mod error;

pub use error::{TransportError, TransportResult};
