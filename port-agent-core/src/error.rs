use thiserror::Error;

/// Error type for port agent transport operations
///
/// Every variant is a distinct failure kind that downstream code can match
/// on. The numeric code returned by [`TransportError::code`] is stable and
/// matches the codes emitted by earlier port agent releases, but callers
/// should depend on the variant, not the number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// A required configuration field (host, port, device path) is absent
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),

    /// Name lookup for the configured host failed
    #[error("host lookup failed: {0}")]
    HostResolution(String),

    /// The OS-level connect, bind, listen, accept or open failed
    #[error("connect failed: {0}")]
    ConnectFailure(String),

    /// A non-recoverable read error (would-block is never reported here)
    #[error("read failed: {0}")]
    ReadFailure(String),

    /// A non-recoverable write error
    #[error("write failed: {0}")]
    WriteFailure(String),

    /// A listener is up but has no accepted client to talk to
    #[error("no client connected")]
    NotConnected,

    /// `accept` attempted while a client is already attached
    #[error("client already connected")]
    AlreadyConnected,

    /// Operation attempted before the endpoint was opened or bound
    #[error("endpoint not initialized")]
    NotInitialized,

    /// The transport deliberately does not support this capability
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

impl TransportError {
    /// Stable numeric code for this error kind
    pub fn code(&self) -> u16 {
        match self {
            TransportError::NotImplemented(_) => 108,
            TransportError::HostResolution(_) => 303,
            TransportError::ConnectFailure(_) => 304,
            TransportError::ReadFailure(_) => 305,
            TransportError::WriteFailure(_) => 306,
            TransportError::MissingConfiguration(_) => 307,
            TransportError::NotConnected => 308,
            TransportError::AlreadyConnected => 309,
            TransportError::NotInitialized => 310,
        }
    }

    /// Build a [`TransportError::ReadFailure`] from an I/O error
    pub fn read(err: &std::io::Error) -> Self {
        TransportError::ReadFailure(err.to_string())
    }

    /// Build a [`TransportError::WriteFailure`] from an I/O error
    pub fn write(err: &std::io::Error) -> Self {
        TransportError::WriteFailure(err.to_string())
    }

    /// Build a [`TransportError::ConnectFailure`] from an I/O error
    pub fn connect(err: &std::io::Error) -> Self {
        TransportError::ConnectFailure(err.to_string())
    }
}

/// Result type alias for port agent transport operations
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(TransportError::HostResolution("x".into()).code(), 303);
        assert_eq!(TransportError::ConnectFailure("x".into()).code(), 304);
        assert_eq!(TransportError::ReadFailure("x".into()).code(), 305);
        assert_eq!(TransportError::WriteFailure("x".into()).code(), 306);
        assert_eq!(TransportError::MissingConfiguration("x".into()).code(), 307);
        assert_eq!(TransportError::NotConnected.code(), 308);
        assert_eq!(TransportError::AlreadyConnected.code(), 309);
        assert_eq!(TransportError::NotInitialized.code(), 310);
        assert_eq!(TransportError::NotImplemented("udp read").code(), 108);
    }

    #[test]
    fn test_io_conversions_keep_os_text() {
        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused");
        match TransportError::connect(&err) {
            TransportError::ConnectFailure(msg) => assert!(msg.contains("refused")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(TransportError::read(&err), TransportError::ReadFailure(_)));
        assert!(matches!(TransportError::write(&err), TransportError::WriteFailure(_)));
    }

    #[test]
    fn test_display() {
        let err = TransportError::MissingConfiguration("port".into());
        assert_eq!(err.to_string(), "missing configuration: port");
    }
}
