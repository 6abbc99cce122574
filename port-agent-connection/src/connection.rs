//! Connection composition
//!
//! A [`Connection`] owns one endpoint per role of its topology and answers
//! aggregate questions about them. Only required roles count towards
//! [`Connection::configured`], [`Connection::initialized`] and
//! [`Connection::connected`]; an optional role may stay unconfigured.

use crate::topology::{Role, Topology};
use port_agent_core::{TransportError, TransportResult};
use port_agent_transport::{ClientSocket, Endpoint, Transport};
use std::collections::BTreeMap;
use std::time::Duration;

/// Endpoints of one instrument or observatory hookup
///
/// # Usage Example
/// ```rust,no_run
/// use port_agent_connection::{Connection, Role, Topology};
///
/// let mut conn = Connection::new(Topology::InstrumentBotpt);
/// conn.set_host("10.0.0.5")?;
/// conn.set_data_tx_port(4001)?;
/// conn.set_data_rx_port(4002)?;
///
/// conn.initialize()?;
/// conn.write_data(Role::DataTx, b"ID\r\n")?;
/// # Ok::<(), port_agent_core::TransportError>(())
/// ```
#[derive(Debug)]
pub struct Connection {
    topology: Topology,
    endpoints: BTreeMap<Role, Transport>,
}

impl Connection {
    /// Create a connection with the topology's default endpoints
    pub fn new(topology: Topology) -> Self {
        let endpoints = topology
            .roles()
            .filter_map(|role| topology.default_endpoint(role).map(|ep| (role, ep)))
            .collect();
        Self {
            topology,
            endpoints,
        }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn endpoint(&self, role: Role) -> Option<&Transport> {
        self.endpoints.get(&role)
    }

    pub fn endpoint_mut(&mut self, role: Role) -> Option<&mut Transport> {
        self.endpoints.get_mut(&role)
    }

    pub fn data(&self) -> Option<&Transport> {
        self.endpoint(Role::Data)
    }

    pub fn command(&self) -> Option<&Transport> {
        self.endpoint(Role::Command)
    }

    pub fn data_tx(&self) -> Option<&Transport> {
        self.endpoint(Role::DataTx)
    }

    pub fn data_rx(&self) -> Option<&Transport> {
        self.endpoint(Role::DataRx)
    }

    /// Every required role has its required fields
    pub fn configured(&self) -> bool {
        self.all_required(|ep| ep.is_configured())
    }

    /// Every required role holds its OS resource
    ///
    /// A listener role counts once it is listening, with or without a client.
    pub fn initialized(&self) -> bool {
        self.all_required(|ep| ep.is_initialized())
    }

    /// Every required role can move data right now
    pub fn connected(&self) -> bool {
        self.all_required(|ep| ep.connected())
    }

    pub fn role_configured(&self, role: Role) -> bool {
        self.endpoint(role).is_some_and(|ep| ep.is_configured())
    }

    pub fn role_initialized(&self, role: Role) -> bool {
        self.endpoint(role).is_some_and(|ep| ep.is_initialized())
    }

    pub fn role_connected(&self, role: Role) -> bool {
        self.endpoint(role).is_some_and(|ep| ep.connected())
    }

    fn all_required(&self, check: impl Fn(&Transport) -> bool) -> bool {
        self.topology
            .required_roles()
            .iter()
            .all(|role| self.endpoint(*role).is_some_and(&check))
    }

    /// Initialize every configured role that is not initialized yet
    ///
    /// Idempotent: a role that already holds its resource is left alone, so
    /// calling this again never reconnects or rebinds. Unconfigured roles are
    /// skipped and logged.
    ///
    /// # Returns
    /// Whether every required role is initialized afterwards.
    ///
    /// # Errors
    /// The first failure of a required role. Roles initialized before it
    /// stay up. A failing optional role is logged and left down.
    pub fn initialize(&mut self) -> TransportResult<bool> {
        let required = self.topology.required_roles();
        for role in self.topology.roles() {
            let Some(endpoint) = self.endpoints.get_mut(&role) else {
                continue;
            };
            if endpoint.is_initialized() {
                log::trace!("{} endpoint already initialized", role);
                continue;
            }
            if !endpoint.is_configured() {
                log::debug!("{} endpoint not configured, skipping", role);
                continue;
            }

            log::debug!("initializing {} endpoint ({})", role, endpoint.kind());
            match endpoint.initialize() {
                Ok(true) => {}
                Ok(false) => log::warn!("{} endpoint failed to initialize", role),
                Err(e) if !required.contains(&role) => {
                    log::warn!("optional {} endpoint failed to initialize: {}", role, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(self.initialized())
    }

    /// Apply `change` to the endpoint serving `role`
    ///
    /// If the endpoint was initialized and its identity changed, the old
    /// handle is released and the endpoint initialized again with the new
    /// configuration.
    ///
    /// # Returns
    /// Whether the endpoint was re-initialized.
    pub fn reconfigure<F>(&mut self, role: Role, change: F) -> TransportResult<bool>
    where
        F: FnOnce(&mut Transport),
    {
        let topology = self.topology;
        let endpoint = self
            .endpoints
            .get_mut(&role)
            .ok_or_else(|| missing_role(topology, role))?;

        let before = endpoint.identity();
        let live = endpoint.is_initialized();
        change(&mut *endpoint);

        if !live || endpoint.identity() == before {
            return Ok(false);
        }

        log::info!("{} endpoint reconfigured, re-initializing", role);
        endpoint.disconnect();
        if !endpoint.is_configured() {
            log::debug!("{} endpoint not configured, left down", role);
            return Ok(false);
        }
        endpoint.initialize()
    }

    /// Set the host of every client socket role
    pub fn set_host(&mut self, hostname: &str) -> TransportResult<()> {
        let roles: Vec<Role> = self.topology.roles().collect();
        for role in roles {
            self.reconfigure(role, |ep| match ep {
                Transport::Tcp(t) => t.set_hostname(hostname),
                Transport::Udp(t) => t.set_hostname(hostname),
                Transport::Listener(_) | Transport::Serial(_) => {}
            })?;
        }
        Ok(())
    }

    pub fn set_data_port(&mut self, port: u16) -> TransportResult<()> {
        self.set_port(Role::Data, port)
    }

    /// Set the command port
    ///
    /// On a command listener, port 0 means "no command channel" and leaves
    /// the role unconfigured rather than binding an OS-chosen port.
    pub fn set_command_port(&mut self, port: u16) -> TransportResult<()> {
        self.set_port(Role::Command, port)
    }

    pub fn set_data_tx_port(&mut self, port: u16) -> TransportResult<()> {
        self.set_port(Role::DataTx, port)
    }

    pub fn set_data_rx_port(&mut self, port: u16) -> TransportResult<()> {
        self.set_port(Role::DataRx, port)
    }

    fn set_port(&mut self, role: Role, port: u16) -> TransportResult<()> {
        self.reconfigure(role, |ep| match ep {
            Transport::Tcp(t) => t.set_port(port),
            Transport::Udp(t) => t.set_port(port),
            Transport::Listener(t) if port == 0 && role == Role::Command => t.clear_port(),
            Transport::Listener(t) => t.set_port(port),
            Transport::Serial(_) => log::warn!("{} endpoint is a serial line, port ignored", role),
        })?;
        Ok(())
    }

    /// Set the serial device of the data role
    pub fn set_device_path(&mut self, device_path: &str) -> TransportResult<()> {
        if !matches!(self.endpoint(Role::Data), Some(Transport::Serial(_))) {
            return Err(TransportError::MissingConfiguration(format!(
                "{} topology has no serial data line",
                self.topology
            )));
        }
        self.reconfigure(Role::Data, |ep| {
            if let Some(line) = ep.as_serial_mut() {
                line.set_device_path(device_path);
            }
        })?;
        Ok(())
    }

    /// Select blocking mode on every endpoint
    pub fn set_blocking(&mut self, blocking: bool) {
        for endpoint in self.endpoints.values_mut() {
            endpoint.set_blocking(blocking);
        }
    }

    /// Send a line break on the serial data line
    ///
    /// # Returns
    /// `false` for topologies without a serial line or if the break failed.
    pub fn send_break(&mut self, duration: Duration) -> bool {
        match self.endpoints.get_mut(&Role::Data) {
            Some(Transport::Serial(line)) => line.send_break(duration),
            _ => {
                log::warn!("send break: {} topology has no serial line", self.topology);
                false
            }
        }
    }

    pub fn write_data(&mut self, role: Role, buf: &[u8]) -> TransportResult<usize> {
        let topology = self.topology;
        self.endpoints
            .get_mut(&role)
            .ok_or_else(|| missing_role(topology, role))?
            .write_data(buf)
    }

    pub fn read_data(&mut self, role: Role, buf: &mut [u8]) -> TransportResult<usize> {
        let topology = self.topology;
        self.endpoints
            .get_mut(&role)
            .ok_or_else(|| missing_role(topology, role))?
            .read_data(buf)
    }

    /// Release every role's handles; configuration is kept
    pub fn disconnect(&mut self) {
        for (role, endpoint) in self.endpoints.iter_mut() {
            if endpoint.is_initialized() {
                log::debug!("disconnecting {} endpoint", role);
            }
            endpoint.disconnect();
        }
    }
}

fn missing_role(topology: Topology, role: Role) -> TransportError {
    TransportError::MissingConfiguration(format!("{} topology has no {} role", topology, role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use port_agent_transport::{ListenerTransport, TcpTransport};
    use std::thread;

    fn listening_peer() -> (ListenerTransport, u16) {
        let mut peer = ListenerTransport::with_port(0);
        peer.initialize().unwrap();
        let port = peer.listen_port();
        (peer, port)
    }

    fn accept_within(peer: &mut ListenerTransport, attempts: usize) -> bool {
        for _ in 0..attempts {
            if peer.accept_client().unwrap() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    /// A loopback port with nothing listening on it
    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn instrument_tcp(port: u16) -> Connection {
        let mut conn = Connection::new(Topology::InstrumentTcp);
        conn.set_host("127.0.0.1").unwrap();
        conn.set_data_port(port).unwrap();
        conn
    }

    #[test]
    fn test_unconfigured_connection() {
        let mut conn = Connection::new(Topology::InstrumentTcp);
        assert!(!conn.configured());
        assert!(!conn.initialized());
        assert!(!conn.connected());

        assert!(!conn.initialize().unwrap());
        assert!(!conn.initialized());
    }

    #[test]
    fn test_optional_command_role_skipped() {
        let (mut peer, port) = listening_peer();
        let mut conn = instrument_tcp(port);

        assert!(conn.configured());
        assert!(!conn.role_configured(Role::Command));
        assert!(conn.initialize().unwrap());
        assert!(conn.initialized());
        assert!(conn.connected());
        assert!(!conn.role_initialized(Role::Command));
        assert!(accept_within(&mut peer, 100));
    }

    #[test]
    fn test_optional_command_failure_keeps_data_up() {
        let (mut peer, port) = listening_peer();
        let mut conn = instrument_tcp(port);
        conn.set_command_port(free_port()).unwrap();
        assert!(conn.role_configured(Role::Command));

        assert!(conn.initialize().unwrap());
        assert!(conn.initialized());
        assert!(conn.connected());
        assert!(!conn.role_initialized(Role::Command));
        assert!(accept_within(&mut peer, 100));

        // The command role is retried and fails again without an error.
        assert!(conn.initialize().unwrap());
        assert!(conn.role_connected(Role::Data));
    }

    #[test]
    fn test_required_role_failure_is_raised() {
        let mut conn = instrument_tcp(free_port());
        assert!(matches!(
            conn.initialize(),
            Err(TransportError::ConnectFailure(_))
        ));
        assert!(!conn.initialized());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (mut peer, port) = listening_peer();
        let mut conn = instrument_tcp(port);

        assert!(conn.initialize().unwrap());
        assert!(accept_within(&mut peer, 100));
        peer.disconnect_client();

        assert!(conn.initialize().unwrap());
        assert!(conn.initialize().unwrap());
        thread::sleep(Duration::from_millis(50));
        assert!(!peer.accept_client().unwrap());
    }

    #[test]
    fn test_botpt_split_channels() {
        let (mut tx_peer, tx_port) = listening_peer();
        let (mut rx_peer, rx_port) = listening_peer();
        tx_peer.set_blocking(true);
        rx_peer.set_blocking(true);

        let mut conn = Connection::new(Topology::InstrumentBotpt);
        conn.set_host("127.0.0.1").unwrap();
        conn.set_data_tx_port(tx_port).unwrap();
        assert!(!conn.configured());
        conn.set_data_rx_port(rx_port).unwrap();
        assert!(conn.configured());

        conn.set_blocking(true);
        assert!(conn.initialize().unwrap());
        assert!(conn.connected());
        assert!(tx_peer.accept_client().unwrap());
        assert!(rx_peer.accept_client().unwrap());

        let mut buf = [0u8; 64];
        assert_eq!(conn.write_data(Role::DataTx, b"ID\r\n").unwrap(), 4);
        let n = tx_peer.read_data(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ID\r\n");

        rx_peer.write_data(b"OK\r\n").unwrap();
        let n = conn.read_data(Role::DataRx, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"OK\r\n");

        assert!(conn.write_data(Role::Data, b"x").is_err());
    }

    #[test]
    fn test_observatory_initialized_not_connected() {
        let mut conn = Connection::new(Topology::ObservatoryStandard);
        assert!(conn.role_configured(Role::Data));
        assert!(!conn.configured());

        conn.set_command_port(0).unwrap();
        assert!(!conn.configured());

        conn.set_command_port(free_port()).unwrap();
        assert!(conn.configured());
        assert!(conn.initialize().unwrap());
        assert!(conn.initialized());
        assert!(!conn.connected());

        let data_port = conn
            .data()
            .and_then(|ep| ep.as_listener())
            .map(|l| l.listen_port())
            .unwrap();
        let command_port = conn
            .command()
            .and_then(|ep| ep.as_listener())
            .map(|l| l.listen_port())
            .unwrap();
        assert_ne!(data_port, 0);
        assert_ne!(command_port, 0);

        let mut data_client = TcpTransport::with_address("127.0.0.1", data_port);
        data_client.initialize().unwrap();
        let data = conn.endpoint_mut(Role::Data).unwrap();
        let mut accepted = false;
        for _ in 0..100 {
            if data.connect_client().unwrap() {
                accepted = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(accepted);
        assert!(conn.role_connected(Role::Data));
        assert!(!conn.connected());
    }

    #[test]
    fn test_command_port_zero_unconfigures_listener() {
        let mut conn = Connection::new(Topology::ObservatoryStandard);
        conn.set_command_port(5001).unwrap();
        assert!(conn.role_configured(Role::Command));

        conn.set_command_port(0).unwrap();
        assert!(!conn.role_configured(Role::Command));
        assert!(!conn.configured());

        // Port 0 on the data listener still means "OS-chosen".
        conn.set_data_port(0).unwrap();
        assert!(conn.role_configured(Role::Data));
    }

    #[test]
    fn test_reconfigure_live_endpoint() {
        let (mut first, first_port) = listening_peer();
        let (mut second, second_port) = listening_peer();
        let mut conn = instrument_tcp(first_port);
        conn.initialize().unwrap();
        assert!(accept_within(&mut first, 100));
        first.disconnect_client();

        // Same identity: nothing happens.
        assert!(!conn.reconfigure(Role::Data, |_| {}).unwrap());
        conn.set_data_port(first_port).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(!first.accept_client().unwrap());

        conn.set_data_port(second_port).unwrap();
        assert!(conn.connected());
        assert!(accept_within(&mut second, 100));
    }

    #[test]
    fn test_reconfigure_before_initialize() {
        let mut conn = Connection::new(Topology::InstrumentTcp);
        let reinitialized = conn
            .reconfigure(Role::Data, |ep| {
                if let Some(t) = ep.as_tcp_mut() {
                    t.set_hostname("localhost");
                    t.set_port(4001);
                }
            })
            .unwrap();
        assert!(!reinitialized);
        assert!(conn.configured());
        assert!(!conn.initialized());

        assert!(matches!(
            conn.reconfigure(Role::DataTx, |_| {}),
            Err(TransportError::MissingConfiguration(_))
        ));
    }

    #[test]
    fn test_serial_topology_open_failure() {
        let mut conn = Connection::new(Topology::InstrumentSerial);
        assert!(!conn.configured());
        conn.set_device_path("/dev/port-agent-no-such-tty").unwrap();
        assert!(conn.configured());

        assert!(!conn.initialize().unwrap());
        assert!(!conn.configured());
        assert!(!conn.send_break(Duration::from_millis(1)));
    }

    #[test]
    fn test_device_path_needs_serial_topology() {
        let mut conn = Connection::new(Topology::InstrumentTcp);
        assert!(conn.set_device_path("/dev/ttyS0").is_err());
        assert!(!conn.send_break(Duration::from_millis(1)));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (_peer, port) = listening_peer();
        let mut conn = instrument_tcp(port);
        conn.initialize().unwrap();

        conn.disconnect();
        assert!(!conn.initialized());
        assert!(conn.configured());
        conn.disconnect();

        assert!(conn.initialize().unwrap());
    }
}
