//! Connection layer for the port agent
//!
//! Wires transport endpoints into the topology an instrument or observatory
//! hookup needs and exposes aggregate predicates over them.

pub mod config;
pub mod connection;
pub mod topology;

pub use config::ConnectionConfig;
pub use connection::Connection;
pub use topology::{Role, Topology};
