//! Shared base for hostname/port client sockets (TCP and UDP)

use crate::endpoint::Endpoint;
use port_agent_core::{TransportError, TransportResult};
use std::net::{SocketAddr, ToSocketAddrs};

/// Client socket settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocketSettings {
    pub hostname: String,
    pub port: u16,
}

impl SocketSettings {
    /// Create new socket settings
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }

    /// Whether both a hostname and a non-zero port are present
    pub fn is_configured(&self) -> bool {
        !self.hostname.is_empty() && self.port != 0
    }

    /// Fail with `MissingConfiguration` naming the first absent field
    pub fn require(&self) -> TransportResult<()> {
        if self.hostname.is_empty() {
            return Err(TransportError::MissingConfiguration("missing hostname".into()));
        }
        if self.port == 0 {
            return Err(TransportError::MissingConfiguration("missing inet port".into()));
        }
        Ok(())
    }

    /// Resolve the configured host to socket addresses
    ///
    /// # Errors
    /// `HostResolution` if the lookup fails or yields no address.
    pub fn resolve(&self) -> TransportResult<Vec<SocketAddr>> {
        log::trace!("looking up {}", self.hostname);
        let addrs: Vec<SocketAddr> = (self.hostname.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::HostResolution(format!("{}: {}", self.hostname, e)))?
            .collect();

        if addrs.is_empty() {
            return Err(TransportError::HostResolution(self.hostname.clone()));
        }
        Ok(addrs)
    }
}

/// Endpoint configured by hostname and port
///
/// Implemented by the TCP and UDP clients; supplies the shared configuration
/// accessors on top of [`Endpoint`].
pub trait ClientSocket: Endpoint {
    fn settings(&self) -> &SocketSettings;

    fn settings_mut(&mut self) -> &mut SocketSettings;

    fn hostname(&self) -> &str {
        &self.settings().hostname
    }

    fn port(&self) -> u16 {
        self.settings().port
    }

    /// Change the hostname; a live handle keeps its old peer until re-initialized
    fn set_hostname(&mut self, hostname: &str) {
        self.settings_mut().hostname = hostname.to_string();
    }

    /// Change the port; a live handle keeps its old peer until re-initialized
    fn set_port(&mut self, port: u16) {
        self.settings_mut().port = port;
    }
}
