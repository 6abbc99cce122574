//! Port agent transport layer
//!
//! Relays byte streams between a remote instrument, reached over TCP, UDP or
//! a serial line, and shore-side consumers.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `port-agent-core`: error taxonomy and stable error codes
//! - `port-agent-transport`: endpoint capability and transport variants
//!   (TCP client, UDP client, TCP listener, serial line)
//! - `port-agent-connection`: topologies, roles and connection composition
//!
//! # Usage
//!
//! ```no_run
//! use port_agent::connection::{ConnectionConfig, Role, Topology};
//!
//! let mut config = ConnectionConfig::new(Topology::InstrumentTcp);
//! config.host = Some("10.0.0.5".into());
//! config.data_port = Some(4001);
//!
//! let mut conn = config.build()?;
//! conn.initialize()?;
//!
//! let mut buf = [0u8; 1024];
//! loop {
//!     let n = conn.read_data(Role::Data, &mut buf)?;
//!     if n == 0 && !conn.connected() {
//!         break;
//!     }
//! }
//! # Ok::<(), port_agent::TransportError>(())
//! ```

// Re-export core types
pub use port_agent_core::{TransportError, TransportResult};

// Re-export transport API
pub mod transport {
    pub use port_agent_transport::*;
}

// Re-export connection API
pub mod connection {
    pub use port_agent_connection::*;
}
