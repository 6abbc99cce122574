//! Tagged transport value
//!
//! A [`Transport`] holds exactly one of the fixed transport variants and
//! forwards the [`Endpoint`] capability to it. Connections store their
//! endpoints as `Transport` values, so the role's variant is always known.

use crate::endpoint::{Endpoint, EndpointIdentity, TransportKind};
use crate::listener::ListenerTransport;
use crate::serial::SerialTransport;
use crate::tcp::TcpTransport;
use crate::udp::UdpTransport;
use port_agent_core::TransportResult;
#[cfg(unix)]
use std::os::unix::io::RawFd;

/// One endpoint of any transport kind
#[derive(Debug)]
pub enum Transport {
    Tcp(TcpTransport),
    Udp(UdpTransport),
    Listener(ListenerTransport),
    Serial(SerialTransport),
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            Transport::Tcp($inner) => $body,
            Transport::Udp($inner) => $body,
            Transport::Listener($inner) => $body,
            Transport::Serial($inner) => $body,
        }
    };
}

impl Transport {
    /// Unconnected copy of the same variant carrying only configuration
    pub fn template(&self) -> Transport {
        match self {
            Transport::Tcp(t) => Transport::Tcp(t.template()),
            Transport::Udp(t) => Transport::Udp(t.template()),
            Transport::Listener(t) => Transport::Listener(t.template()),
            Transport::Serial(t) => Transport::Serial(t.template()),
        }
    }

    pub fn as_tcp(&self) -> Option<&TcpTransport> {
        match self {
            Transport::Tcp(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_tcp_mut(&mut self) -> Option<&mut TcpTransport> {
        match self {
            Transport::Tcp(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_udp(&self) -> Option<&UdpTransport> {
        match self {
            Transport::Udp(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_udp_mut(&mut self) -> Option<&mut UdpTransport> {
        match self {
            Transport::Udp(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_listener(&self) -> Option<&ListenerTransport> {
        match self {
            Transport::Listener(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_listener_mut(&mut self) -> Option<&mut ListenerTransport> {
        match self {
            Transport::Listener(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_serial(&self) -> Option<&SerialTransport> {
        match self {
            Transport::Serial(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_serial_mut(&mut self) -> Option<&mut SerialTransport> {
        match self {
            Transport::Serial(t) => Some(t),
            _ => None,
        }
    }

    /// Descriptor carrying data: the client stream, datagram socket or the
    /// listener's accepted client. Serial lines report `None`.
    #[cfg(unix)]
    pub fn raw_fd(&self) -> Option<RawFd> {
        match self {
            Transport::Tcp(t) => t.raw_fd(),
            Transport::Udp(t) => t.raw_fd(),
            Transport::Listener(t) => t.client_fd(),
            Transport::Serial(_) => None,
        }
    }
}

impl Endpoint for Transport {
    fn kind(&self) -> TransportKind {
        dispatch!(self, t => t.kind())
    }

    fn identity(&self) -> EndpointIdentity {
        dispatch!(self, t => t.identity())
    }

    fn blocking(&self) -> bool {
        dispatch!(self, t => t.blocking())
    }

    fn set_blocking(&mut self, blocking: bool) {
        dispatch!(self, t => t.set_blocking(blocking))
    }

    fn is_configured(&self) -> bool {
        dispatch!(self, t => t.is_configured())
    }

    fn is_initialized(&self) -> bool {
        dispatch!(self, t => t.is_initialized())
    }

    fn connected(&self) -> bool {
        dispatch!(self, t => t.connected())
    }

    fn initialize(&mut self) -> TransportResult<bool> {
        dispatch!(self, t => t.initialize())
    }

    fn connect_client(&mut self) -> TransportResult<bool> {
        dispatch!(self, t => t.connect_client())
    }

    fn disconnect(&mut self) {
        dispatch!(self, t => t.disconnect())
    }

    fn write_data(&mut self, buf: &[u8]) -> TransportResult<usize> {
        dispatch!(self, t => t.write_data(buf))
    }

    fn read_data(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        dispatch!(self, t => t.read_data(buf))
    }
}

impl From<TcpTransport> for Transport {
    fn from(t: TcpTransport) -> Self {
        Transport::Tcp(t)
    }
}

impl From<UdpTransport> for Transport {
    fn from(t: UdpTransport) -> Self {
        Transport::Udp(t)
    }
}

impl From<ListenerTransport> for Transport {
    fn from(t: ListenerTransport) -> Self {
        Transport::Listener(t)
    }
}

impl From<SerialTransport> for Transport {
    fn from(t: SerialTransport) -> Self {
        Transport::Serial(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::ClientSocket;

    #[test]
    fn test_dispatch_follows_variant() {
        let tcp: Transport = TcpTransport::with_address("localhost", 4000).into();
        let udp: Transport = UdpTransport::with_address("localhost", 4000).into();
        let listener: Transport = ListenerTransport::with_port(4000).into();
        let serial: Transport = SerialTransport::with_device("/dev/ttyS0").into();

        assert_eq!(tcp.kind(), TransportKind::TcpClient);
        assert_eq!(udp.kind(), TransportKind::UdpClient);
        assert_eq!(listener.kind(), TransportKind::TcpListener);
        assert_eq!(serial.kind(), TransportKind::Serial);

        assert!(tcp.is_configured());
        assert!(!tcp.is_initialized());
        assert!(!tcp.compare(&udp));
        assert!(!listener.compare(&tcp));
    }

    #[test]
    fn test_accessors() {
        let mut tcp: Transport = TcpTransport::with_address("localhost", 4000).into();
        assert!(tcp.as_tcp().is_some());
        assert!(tcp.as_listener().is_none());
        assert!(tcp.as_serial_mut().is_none());

        if let Some(client) = tcp.as_tcp_mut() {
            client.set_port(4001);
        }
        assert_eq!(
            tcp.identity(),
            EndpointIdentity::TcpClient {
                hostname: "localhost".into(),
                port: 4001
            }
        );
    }

    #[test]
    fn test_template_keeps_variant() {
        let mut listener: Transport = ListenerTransport::with_port(0).into();
        listener.initialize().unwrap();
        assert!(listener.is_initialized());

        let copy = listener.template();
        assert!(copy.as_listener().is_some());
        assert!(!copy.is_initialized());
        assert!(copy.compare(&listener));
    }

    #[cfg(unix)]
    #[test]
    fn test_raw_fd_tracks_handle() {
        let mut udp: Transport = UdpTransport::with_address("127.0.0.1", 4000).into();
        assert!(udp.raw_fd().is_none());
        udp.initialize().unwrap();
        assert!(udp.raw_fd().is_some());
        udp.disconnect();
        assert!(udp.raw_fd().is_none());
    }
}
