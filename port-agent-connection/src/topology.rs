//! Instrument and observatory topologies
//!
//! A topology fixes which roles a connection has and which transport kind
//! serves each role.

use port_agent_transport::{
    ListenerTransport, SerialTransport, TcpTransport, Transport, TransportKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named purpose of an endpoint inside a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Bidirectional instrument data
    Data,
    /// Side channel for commands
    Command,
    /// Transmit half of a split data channel
    DataTx,
    /// Receive half of a split data channel
    DataRx,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Data => "data",
            Role::Command => "command",
            Role::DataTx => "data-tx",
            Role::DataRx => "data-rx",
        };
        f.write_str(name)
    }
}

/// Shape of a port agent hookup
///
/// | topology | required roles | optional roles |
/// |---|---|---|
/// | `ObservatoryStandard` | data (listener), command (listener) | |
/// | `InstrumentTcp` | data (TCP client) | command (TCP client) |
/// | `InstrumentBotpt` | data-tx, data-rx (TCP clients) | |
/// | `InstrumentSerial` | data (serial line) | |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Shore side: data and command listeners for consumers
    ObservatoryStandard,
    /// Instrument reached over one TCP data port
    #[default]
    InstrumentTcp,
    /// Instrument with independent transmit and receive TCP ports
    InstrumentBotpt,
    /// Instrument on a serial line
    InstrumentSerial,
}

impl Topology {
    /// Roles that must all be up for the connection to count as up
    pub fn required_roles(&self) -> &'static [Role] {
        match self {
            Topology::ObservatoryStandard => &[Role::Data, Role::Command],
            Topology::InstrumentTcp => &[Role::Data],
            Topology::InstrumentBotpt => &[Role::DataTx, Role::DataRx],
            Topology::InstrumentSerial => &[Role::Data],
        }
    }

    /// Roles that may be left unconfigured
    pub fn optional_roles(&self) -> &'static [Role] {
        match self {
            Topology::InstrumentTcp => &[Role::Command],
            _ => &[],
        }
    }

    /// Required roles followed by optional roles
    pub fn roles(self) -> impl Iterator<Item = Role> {
        self.required_roles()
            .iter()
            .chain(self.optional_roles())
            .copied()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles().any(|r| r == role)
    }

    /// Transport kind serving `role`, `None` if the topology lacks the role
    pub fn endpoint_kind(&self, role: Role) -> Option<TransportKind> {
        if !self.has_role(role) {
            return None;
        }
        Some(match self {
            Topology::ObservatoryStandard => TransportKind::TcpListener,
            Topology::InstrumentTcp | Topology::InstrumentBotpt => TransportKind::TcpClient,
            Topology::InstrumentSerial => TransportKind::Serial,
        })
    }

    /// Default endpoint for `role`
    ///
    /// The observatory data listener defaults to an OS-chosen port and is
    /// therefore configured out of the box; every other endpoint starts
    /// unconfigured.
    pub(crate) fn default_endpoint(&self, role: Role) -> Option<Transport> {
        let endpoint: Transport = match self.endpoint_kind(role)? {
            TransportKind::TcpListener if role == Role::Data => {
                ListenerTransport::with_port(0).into()
            }
            TransportKind::TcpListener => ListenerTransport::default().into(),
            TransportKind::Serial => SerialTransport::default().into(),
            _ => TcpTransport::default().into(),
        };
        Some(endpoint)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Topology::ObservatoryStandard => "observatory-standard",
            Topology::InstrumentTcp => "instrument-tcp",
            Topology::InstrumentBotpt => "instrument-botpt",
            Topology::InstrumentSerial => "instrument-serial",
        };
        f.write_str(name)
    }
}
