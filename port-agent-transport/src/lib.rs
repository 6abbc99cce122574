//! Transport layer for the port agent
//!
//! This crate provides the endpoint capability and its transport variants:
//! TCP client, UDP client, TCP listener and serial line. Every variant is
//! driven synchronously by a caller-owned poll loop.

pub mod endpoint;
pub mod listener;
pub mod serial;
pub mod socket;
mod stream;
pub mod tcp;
pub mod transport;
pub mod udp;

#[cfg(test)]
mod test_support;

pub use endpoint::{Endpoint, EndpointIdentity, TransportKind};
pub use listener::{ListenerSettings, ListenerTransport};
pub use serial::{
    data_bits_from_code, flow_control_from_code, parity_from_code, stop_bits_from_code,
    SerialSettings, SerialTransport, STANDARD_BAUD_RATES,
};
pub use socket::{ClientSocket, SocketSettings};
pub use tcp::TcpTransport;
pub use transport::Transport;
pub use udp::{UdpTransport, MAX_UDP_PAYLOAD_SIZE};

pub use port_agent_core::{TransportError, TransportResult};
pub use tokio_serial::{DataBits, FlowControl, Parity, StopBits};
