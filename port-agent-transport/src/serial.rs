//! Serial port transport implementation
//!
//! The line is driven through the synchronous `SerialPort` API that
//! `tokio-serial` re-exports. Line-discipline fields map one to one onto the
//! builder; a non-blocking line is opened with a zero timeout so an empty
//! poll comes back immediately as "no data".
//!
//! Unlike the socket variants, a failed open does not raise. It clears the
//! transport's configured flag instead and `initialize()` returns `Ok(false)`;
//! callers check [`Endpoint::is_configured`] afterwards.

use crate::endpoint::{Endpoint, EndpointIdentity, TransportKind};
use crate::stream::{self, ReadOutcome};
use port_agent_core::{TransportError, TransportResult};
use std::fmt;
use std::thread;
use std::time::Duration;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, StopBits};

/// Baud rates accepted by [`SerialTransport::set_baud`]
pub const STANDARD_BAUD_RATES: [u32; 8] = [1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

/// Read/write timeout of a blocking line
const BLOCKING_TIMEOUT: Duration = Duration::from_secs(3600);

/// Serial line settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub device_path: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }
}

impl SerialSettings {
    /// 8N1 settings without flow control
    pub fn new(device_path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device_path: device_path.into(),
            baud_rate,
            ..Self::default()
        }
    }
}

/// Parity from its numeric code: 0 none, 1 odd, 2 even
pub fn parity_from_code(code: u8) -> Option<Parity> {
    match code {
        0 => Some(Parity::None),
        1 => Some(Parity::Odd),
        2 => Some(Parity::Even),
        _ => None,
    }
}

/// Flow control from its numeric code: 0 none, 1 hardware, 2 software
pub fn flow_control_from_code(code: u8) -> Option<FlowControl> {
    match code {
        0 => Some(FlowControl::None),
        1 => Some(FlowControl::Hardware),
        2 => Some(FlowControl::Software),
        _ => None,
    }
}

pub fn data_bits_from_code(bits: u8) -> Option<DataBits> {
    match bits {
        5 => Some(DataBits::Five),
        6 => Some(DataBits::Six),
        7 => Some(DataBits::Seven),
        8 => Some(DataBits::Eight),
        _ => None,
    }
}

pub fn stop_bits_from_code(bits: u8) -> Option<StopBits> {
    match bits {
        1 => Some(StopBits::One),
        2 => Some(StopBits::Two),
        _ => None,
    }
}

/// Serial line transport
///
/// # Usage Example
/// ```rust,no_run
/// use port_agent_transport::{Endpoint, SerialTransport};
/// use std::time::Duration;
///
/// let mut line = SerialTransport::with_device("/dev/ttyUSB0");
/// line.set_baud(19200);
/// if !line.initialize()? {
///     assert!(!line.is_configured());
/// }
/// line.send_break(Duration::from_millis(250));
/// # Ok::<(), port_agent_core::TransportError>(())
/// ```
pub struct SerialTransport {
    settings: SerialSettings,
    /// Line settings applied by the most recent successful open
    applied: Option<SerialSettings>,
    port: Option<Box<dyn SerialPort>>,
    configured: bool,
    blocking: bool,
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("settings", &self.settings)
            .field("open", &self.port.is_some())
            .field("configured", &self.configured)
            .field("blocking", &self.blocking)
            .finish()
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new(SerialSettings::default())
    }
}

impl SerialTransport {
    /// Create a new serial transport layer
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            applied: None,
            port: None,
            configured: true,
            blocking: false,
        }
    }

    /// Serial transport on `device_path` with default line settings
    pub fn with_device(device_path: &str) -> Self {
        Self::new(SerialSettings::new(device_path, 9600))
    }

    /// Unopened copy carrying only this line's configuration
    pub fn template(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            applied: None,
            port: None,
            configured: true,
            blocking: self.blocking,
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    pub fn device_path(&self) -> &str {
        &self.settings.device_path
    }

    /// Line settings applied by the last successful open
    ///
    /// This is what this transport wrote to the line, not a read-back of the
    /// device state.
    pub fn last_applied_settings(&self) -> Option<&SerialSettings> {
        self.applied.as_ref()
    }

    /// Change the device; re-arms the configured flag after a failed open
    pub fn set_device_path(&mut self, device_path: &str) {
        self.settings.device_path = device_path.to_string();
        self.configured = true;
    }

    /// Select a standard baud rate
    ///
    /// A rate outside [`STANDARD_BAUD_RATES`] is ignored and the current rate
    /// is kept.
    ///
    /// # Returns
    /// `true` if the rate was accepted.
    pub fn set_baud(&mut self, baud_rate: u32) -> bool {
        if !STANDARD_BAUD_RATES.contains(&baud_rate) {
            log::warn!(
                "unsupported baud rate {}, keeping {}",
                baud_rate,
                self.settings.baud_rate
            );
            return false;
        }
        self.settings.baud_rate = baud_rate;
        true
    }

    pub fn set_parity(&mut self, parity: Parity) {
        self.settings.parity = parity;
    }

    pub fn set_data_bits(&mut self, data_bits: DataBits) {
        self.settings.data_bits = data_bits;
    }

    pub fn set_stop_bits(&mut self, stop_bits: StopBits) {
        self.settings.stop_bits = stop_bits;
    }

    pub fn set_flow_control(&mut self, flow_control: FlowControl) {
        self.settings.flow_control = flow_control;
    }

    /// Hold the line in break state for `duration`
    ///
    /// # Returns
    /// `false` if the line is not open or the break could not be set.
    pub fn send_break(&mut self, duration: Duration) -> bool {
        let Some(port) = &self.port else {
            log::warn!("send break: serial line not open");
            return false;
        };

        log::debug!("sending break for {:?}", duration);
        if let Err(e) = port.set_break() {
            log::error!("failed to set break on {}: {}", self.settings.device_path, e);
            return false;
        }
        thread::sleep(duration);
        if let Err(e) = port.clear_break() {
            log::error!("failed to clear break on {}: {}", self.settings.device_path, e);
            return false;
        }
        true
    }

    fn timeout(&self) -> Duration {
        if self.blocking {
            BLOCKING_TIMEOUT
        } else {
            Duration::ZERO
        }
    }
}

impl Endpoint for SerialTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn identity(&self) -> EndpointIdentity {
        EndpointIdentity::Serial {
            device_path: self.settings.device_path.clone(),
            baud_rate: self.settings.baud_rate,
            data_bits: self.settings.data_bits,
            parity: self.settings.parity,
            stop_bits: self.settings.stop_bits,
            flow_control: self.settings.flow_control,
        }
    }

    fn blocking(&self) -> bool {
        self.blocking
    }

    fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
        let timeout = self.timeout();
        if let Some(port) = self.port.as_mut() {
            if let Err(e) = port.set_timeout(timeout) {
                log::warn!("failed to change serial timeout: {}", e);
            }
        }
    }

    /// Device path present and the last open did not fail
    fn is_configured(&self) -> bool {
        self.configured && !self.settings.device_path.is_empty()
    }

    fn is_initialized(&self) -> bool {
        self.port.is_some()
    }

    fn connected(&self) -> bool {
        self.port.is_some()
    }

    /// (Re)open the device and apply every line field
    ///
    /// # Returns
    /// `Ok(false)` if the device could not be opened; the configured flag is
    /// cleared in that case.
    fn initialize(&mut self) -> TransportResult<bool> {
        log::debug!("serial initialize()");
        if self.settings.device_path.is_empty() {
            return Err(TransportError::MissingConfiguration("missing device path".into()));
        }

        self.disconnect();

        let settings = &self.settings;
        log::info!(
            "opening {} at {} baud ({:?}, {:?}, {:?}, flow {:?})",
            settings.device_path,
            settings.baud_rate,
            settings.data_bits,
            settings.parity,
            settings.stop_bits,
            settings.flow_control
        );

        let opened = tokio_serial::new(settings.device_path.as_str(), settings.baud_rate)
            .data_bits(settings.data_bits)
            .stop_bits(settings.stop_bits)
            .parity(settings.parity)
            .flow_control(settings.flow_control)
            .timeout(self.timeout())
            .open();

        match opened {
            Ok(port) => {
                if let Some(replaced) = self.applied.replace(self.settings.clone()) {
                    if replaced != self.settings {
                        log::debug!("line settings replaced: {:?}", replaced);
                    }
                }
                self.port = Some(port);
                self.configured = true;
                Ok(true)
            }
            Err(e) => {
                log::warn!("failed to open {}: {}", self.settings.device_path, e);
                self.configured = false;
                Ok(false)
            }
        }
    }

    fn disconnect(&mut self) {
        if self.port.take().is_some() {
            log::info!("closed serial line {}", self.settings.device_path);
        }
    }

    fn write_data(&mut self, buf: &[u8]) -> TransportResult<usize> {
        stream::write_fully(&mut self.port, buf)
    }

    fn read_data(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        match stream::read_once(&mut self.port, buf)? {
            ReadOutcome::Data(n) => Ok(n),
            ReadOutcome::WouldBlock => Ok(0),
            ReadOutcome::Closed => {
                log::trace!("serial read returned no data");
                Ok(0)
            }
        }
    }
}
