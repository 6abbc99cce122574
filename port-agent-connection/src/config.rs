//! Serializable connection configuration

use crate::connection::Connection;
use crate::topology::{Role, Topology};
use port_agent_core::TransportResult;
use port_agent_transport::{
    data_bits_from_code, flow_control_from_code, parity_from_code, stop_bits_from_code,
    SerialTransport,
};
use serde::{Deserialize, Serialize};

/// Description of one instrument or observatory hookup
///
/// Serial line fields use numeric codes: parity 0 none / 1 odd / 2 even,
/// flow control 0 none / 1 hardware / 2 software, data bits 5..=8, stop bits
/// 1 or 2. Fields the topology has no use for are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub topology: Topology,
    pub host: Option<String>,
    pub data_port: Option<u16>,
    pub command_port: Option<u16>,
    pub data_tx_port: Option<u16>,
    pub data_rx_port: Option<u16>,
    pub device_path: Option<String>,
    pub baud: Option<u32>,
    pub parity: Option<u8>,
    pub flow_control: Option<u8>,
    pub data_bits: Option<u8>,
    pub stop_bits: Option<u8>,
    pub blocking: bool,
}

impl ConnectionConfig {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            ..Self::default()
        }
    }

    /// Build a configured, uninitialized connection
    ///
    /// Out-of-range serial codes are logged and the line keeps its default
    /// for that field.
    pub fn build(&self) -> TransportResult<Connection> {
        let mut conn = Connection::new(self.topology);
        conn.set_blocking(self.blocking);

        if let Some(host) = &self.host {
            conn.set_host(host)?;
        }

        let ports = [
            (Role::Data, self.data_port),
            (Role::Command, self.command_port),
            (Role::DataTx, self.data_tx_port),
            (Role::DataRx, self.data_rx_port),
        ];
        for (role, port) in ports {
            let Some(port) = port else { continue };
            if !self.topology.has_role(role) {
                log::warn!("{} topology has no {} role, port {} ignored", self.topology, role, port);
                continue;
            }
            match role {
                Role::Data => conn.set_data_port(port)?,
                Role::Command => conn.set_command_port(port)?,
                Role::DataTx => conn.set_data_tx_port(port)?,
                Role::DataRx => conn.set_data_rx_port(port)?,
            }
        }

        if let Some(line) = conn.endpoint_mut(Role::Data).and_then(|ep| ep.as_serial_mut()) {
            self.apply_serial(line);
        }

        Ok(conn)
    }

    fn apply_serial(&self, line: &mut SerialTransport) {
        if let Some(path) = &self.device_path {
            line.set_device_path(path);
        }
        if let Some(baud) = self.baud {
            line.set_baud(baud);
        }
        if let Some(code) = self.parity {
            match parity_from_code(code) {
                Some(parity) => line.set_parity(parity),
                None => log::warn!("invalid parity code {}", code),
            }
        }
        if let Some(code) = self.flow_control {
            match flow_control_from_code(code) {
                Some(flow) => line.set_flow_control(flow),
                None => log::warn!("invalid flow control code {}", code),
            }
        }
        if let Some(bits) = self.data_bits {
            match data_bits_from_code(bits) {
                Some(data_bits) => line.set_data_bits(data_bits),
                None => log::warn!("invalid data bits {}", bits),
            }
        }
        if let Some(bits) = self.stop_bits {
            match stop_bits_from_code(bits) {
                Some(stop_bits) => line.set_stop_bits(stop_bits),
                None => log::warn!("invalid stop bits {}", bits),
            }
        }
    }
}
