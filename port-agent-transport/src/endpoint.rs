//! Endpoint capability shared by every transport variant

use port_agent_core::TransportResult;
use std::fmt;
use tokio_serial::{DataBits, FlowControl, Parity, StopBits};

/// Transport tag of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Outbound TCP stream
    TcpClient,
    /// Outbound UDP datagrams
    UdpClient,
    /// TCP listening socket with a single accepted client
    TcpListener,
    /// Serial line
    Serial,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::TcpClient => "tcp-client",
            TransportKind::UdpClient => "udp-client",
            TransportKind::TcpListener => "tcp-listener",
            TransportKind::Serial => "serial",
        };
        f.write_str(name)
    }
}

/// Structural identity of an endpoint
///
/// Two endpoints are the same logical channel when their identities are
/// equal: same transport tag and same configuration. Live handles never take
/// part in the comparison. Publishers use this to drop duplicate endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointIdentity {
    TcpClient {
        hostname: String,
        port: u16,
    },
    UdpClient {
        hostname: String,
        port: u16,
    },
    TcpListener {
        port: Option<u16>,
    },
    Serial {
        device_path: String,
        baud_rate: u32,
        data_bits: DataBits,
        parity: Parity,
        stop_bits: StopBits,
        flow_control: FlowControl,
    },
}

impl EndpointIdentity {
    /// Transport tag this identity belongs to
    pub fn kind(&self) -> TransportKind {
        match self {
            EndpointIdentity::TcpClient { .. } => TransportKind::TcpClient,
            EndpointIdentity::UdpClient { .. } => TransportKind::UdpClient,
            EndpointIdentity::TcpListener { .. } => TransportKind::TcpListener,
            EndpointIdentity::Serial { .. } => TransportKind::Serial,
        }
    }
}

/// Capability contract every transport variant implements
///
/// # Lifecycle
/// ```text
/// unconfigured -> configured (required fields set)
/// configured   -> initialized (OS open/connect/bind succeeded)
/// initialized  -> configured (disconnect released the handle)
/// ```
///
/// Each endpoint exclusively owns at most one OS handle (two for a listener:
/// the listening socket and the accepted client). Handles are released when
/// the endpoint disconnects or is dropped, and immediately after any
/// non-recoverable I/O error.
///
/// # Blocking
/// Endpoints are non-blocking by default. A non-blocking endpoint reports
/// "no data yet" as a 0-byte read, never as an error. A blocking endpoint
/// suspends the calling thread on the single call in progress.
pub trait Endpoint {
    /// Transport tag
    fn kind(&self) -> TransportKind;

    /// Structural identity used by [`Endpoint::compare`]
    fn identity(&self) -> EndpointIdentity;

    /// Whether handles are put in blocking mode
    fn blocking(&self) -> bool;

    /// Select blocking mode
    ///
    /// Applies to handles opened later and, best effort, to the live handle.
    fn set_blocking(&mut self, blocking: bool);

    /// Whether every required configuration field is present
    fn is_configured(&self) -> bool;

    /// Whether the underlying OS resource exists
    ///
    /// For a listener this means listening, which is not the same as having
    /// a connected client.
    fn is_initialized(&self) -> bool;

    /// Whether data can flow right now
    fn connected(&self) -> bool;

    /// Open, connect or bind the OS resource
    ///
    /// # Errors
    /// `MissingConfiguration` when required fields are absent, otherwise a
    /// variant-specific failure such as `HostResolution` or `ConnectFailure`.
    fn initialize(&mut self) -> TransportResult<bool>;

    /// Establish the data path
    ///
    /// For client sockets this is the same as [`Endpoint::initialize`]; a
    /// listener overrides it to accept a pending client.
    fn connect_client(&mut self) -> TransportResult<bool> {
        self.initialize()
    }

    /// Release the OS resource
    ///
    /// Idempotent: disconnecting an endpoint that holds no handle does
    /// nothing. The configuration is kept so the endpoint can be initialized
    /// again.
    fn disconnect(&mut self);

    /// Send bytes
    ///
    /// # Returns
    /// The number of bytes written.
    fn write_data(&mut self, buf: &[u8]) -> TransportResult<usize>;

    /// Receive bytes with a single read attempt
    ///
    /// # Returns
    /// Number of bytes copied into `buf`; 0 means "no data now" on a
    /// non-blocking endpoint or that the peer closed the stream.
    fn read_data(&mut self, buf: &mut [u8]) -> TransportResult<usize>;

    /// Structural equality: same transport tag and same configuration
    fn compare(&self, other: &dyn Endpoint) -> bool {
        self.identity() == other.identity()
    }
}
