//! UDP client transport implementation

use crate::endpoint::{Endpoint, EndpointIdentity, TransportKind};
use crate::socket::{ClientSocket, SocketSettings};
use port_agent_core::{TransportError, TransportResult};
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};

/// Maximum UDP payload size
pub const MAX_UDP_PAYLOAD_SIZE: usize = 65507;

/// UDP client transport
///
/// Write-only: datagrams are sent to `hostname:port`, replies are never
/// expected, and [`Endpoint::read_data`] always fails with `NotImplemented`.
/// There is no handshake, so a send succeeds whether or not anything is
/// listening on the other side.
///
/// The destination is resolved again on every write. Hostname and port may
/// be changed between writes without re-initializing.
#[derive(Debug, Default)]
pub struct UdpTransport {
    settings: SocketSettings,
    socket: Option<UdpSocket>,
    blocking: bool,
}

impl UdpTransport {
    /// Create a new UDP transport layer
    pub fn new(settings: SocketSettings) -> Self {
        Self {
            settings,
            socket: None,
            blocking: false,
        }
    }

    /// Create UDP transport for `hostname:port`
    pub fn with_address(hostname: &str, port: u16) -> Self {
        Self::new(SocketSettings::new(hostname, port))
    }

    /// Unconnected copy carrying only this transport's configuration
    pub fn template(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            socket: None,
            blocking: self.blocking,
        }
    }

    /// Raw socket descriptor for external select/poll loops
    #[cfg(unix)]
    pub fn raw_fd(&self) -> Option<RawFd> {
        self.socket.as_ref().map(|s| s.as_raw_fd())
    }

    /// Resolve the destination, keeping only IPv4 addresses the socket can reach
    fn destination(&self) -> TransportResult<SocketAddr> {
        self.settings
            .resolve()?
            .into_iter()
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| {
                TransportError::HostResolution(format!(
                    "{}: no IPv4 address",
                    self.settings.hostname
                ))
            })
    }
}

impl ClientSocket for UdpTransport {
    fn settings(&self) -> &SocketSettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut SocketSettings {
        &mut self.settings
    }
}

impl Endpoint for UdpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::UdpClient
    }

    fn identity(&self) -> EndpointIdentity {
        EndpointIdentity::UdpClient {
            hostname: self.settings.hostname.clone(),
            port: self.settings.port,
        }
    }

    fn blocking(&self) -> bool {
        self.blocking
    }

    fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
        if let Some(socket) = &self.socket {
            if let Err(e) = socket.set_nonblocking(!blocking) {
                log::warn!("failed to change blocking mode: {}", e);
            }
        }
    }

    fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    fn is_initialized(&self) -> bool {
        self.socket.is_some()
    }

    fn connected(&self) -> bool {
        self.socket.is_some()
    }

    fn initialize(&mut self) -> TransportResult<bool> {
        log::debug!("UDP client initialize()");
        self.settings.require()?;
        self.disconnect();

        // Fail early on an unknown host; writes resolve again anyway.
        self.destination()?;

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .map_err(|e| TransportError::connect(&e))?;
        socket
            .set_nonblocking(!self.blocking)
            .map_err(|e| TransportError::connect(&e))?;

        log::info!(
            "UDP socket ready for {}:{}",
            self.settings.hostname,
            self.settings.port
        );
        self.socket = Some(socket);
        Ok(true)
    }

    fn disconnect(&mut self) {
        if self.socket.take().is_some() {
            log::info!("closed UDP socket");
        }
    }

    fn write_data(&mut self, buf: &[u8]) -> TransportResult<usize> {
        self.settings.require()?;
        if self.socket.is_none() {
            return Err(TransportError::NotInitialized);
        }
        if buf.len() > MAX_UDP_PAYLOAD_SIZE {
            return Err(TransportError::WriteFailure(format!(
                "datagram of {} bytes exceeds {}",
                buf.len(),
                MAX_UDP_PAYLOAD_SIZE
            )));
        }

        let destination = self.destination()?;
        let Some(socket) = &self.socket else {
            return Err(TransportError::NotInitialized);
        };

        match socket.send_to(buf, destination) {
            Ok(sent) => {
                log::debug!("bytes written: {} to {}", sent, destination);
                Ok(sent)
            }
            Err(e) => {
                log::error!("send to {} failed: {}", destination, e);
                self.socket = None;
                Err(TransportError::write(&e))
            }
        }
    }

    fn read_data(&mut self, _buf: &mut [u8]) -> TransportResult<usize> {
        Err(TransportError::NotImplemented("UDP client read"))
    }
}
