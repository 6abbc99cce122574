//! Byte-level I/O shared by the stream-oriented transports
//!
//! TCP clients, the accepted client of a listener and serial lines all move
//! bytes through an owned handle held in an `Option`. The helpers here run the
//! actual read/write calls and release the handle on any non-recoverable
//! error, so `connected()` reflects the failure without another syscall.

use port_agent_core::{TransportError, TransportResult};
use std::io::{self, Read, Write};

/// Outcome of a single read attempt on a stream handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    /// Bytes were copied into the caller's buffer
    Data(usize),
    /// Nothing available right now
    WouldBlock,
    /// The peer performed an orderly close (zero-length read)
    Closed,
}

/// Whether an I/O error only means "try again later"
///
/// Serial lines opened with a zero timeout report an empty poll as
/// `TimedOut`, so it is grouped with `WouldBlock` here.
pub(crate) fn is_would_block(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// Write every byte of `buf`, accumulating partial writes
///
/// # Returns
///
/// `buf.len()` on success. A short count is never returned: either every
/// byte went out or the call fails with [`TransportError::WriteFailure`] and
/// the handle is released.
pub(crate) fn write_fully<S: Write>(handle: &mut Option<S>, buf: &[u8]) -> TransportResult<usize> {
    let Some(stream) = handle.as_mut() else {
        return Err(TransportError::WriteFailure("not connected".into()));
    };

    match write_loop(stream, buf) {
        Ok(written) => {
            log::debug!("bytes written: {}", written);
            Ok(written)
        }
        Err(e) => {
            log::error!("write failed: {} ({:?})", e, e.kind());
            *handle = None;
            Err(TransportError::write(&e))
        }
    }
}

fn write_loop<S: Write>(stream: &mut S, buf: &[u8]) -> io::Result<usize> {
    let mut written = 0;
    while written < buf.len() {
        match stream.write(&buf[written..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "Failed to write all data",
                ));
            }
            Ok(n) => {
                written += n;
                log::trace!("wrote bytes: {} bytes remaining: {}", n, buf.len() - written);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(written)
}

/// Perform a single read attempt
///
/// Would-block conditions are absorbed into [`ReadOutcome::WouldBlock`].
/// Any other error releases the handle and is raised as
/// [`TransportError::ReadFailure`].
pub(crate) fn read_once<S: Read>(
    handle: &mut Option<S>,
    buf: &mut [u8],
) -> TransportResult<ReadOutcome> {
    let Some(stream) = handle.as_mut() else {
        return Err(TransportError::ReadFailure("not connected".into()));
    };

    match stream.read(buf) {
        Ok(0) if !buf.is_empty() => Ok(ReadOutcome::Closed),
        Ok(n) => {
            log::debug!("bytes read: {}", n);
            Ok(ReadOutcome::Data(n))
        }
        Err(e) if is_would_block(&e) => {
            log::trace!("read would block, ignored: {}", e);
            Ok(ReadOutcome::WouldBlock)
        }
        Err(e) => {
            log::error!("read failed: {} ({:?})", e, e.kind());
            *handle = None;
            Err(TransportError::read(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Writer that accepts at most `chunk` bytes per call
    struct Trickle {
        chunk: usize,
        sink: Vec<u8>,
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.sink.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Writer that fails after the first partial write
    struct Broken {
        calls: usize,
    }

    impl Write for Broken {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.calls == 1 {
                Ok(buf.len() / 2)
            } else {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "Broken pipe"))
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Blocked;

    impl Read for Blocked {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "Resource temporarily unavailable"))
        }
    }

    struct Reset;

    impl Read for Reset {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "Connection reset by peer"))
        }
    }

    #[test]
    fn test_partial_writes_are_accumulated() {
        let mut handle = Some(Trickle { chunk: 3, sink: Vec::new() });
        let data = b"a partial write loop";
        assert_eq!(write_fully(&mut handle, data).unwrap(), data.len());
        assert_eq!(handle.unwrap().sink, data.to_vec());
    }

    #[test]
    fn test_write_error_releases_handle() {
        let mut handle = Some(Broken { calls: 0 });
        let err = write_fully(&mut handle, b"Test").unwrap_err();
        assert!(matches!(err, TransportError::WriteFailure(_)));
        assert!(handle.is_none());
    }

    #[test]
    fn test_write_without_handle() {
        let mut handle: Option<Trickle> = None;
        assert!(matches!(
            write_fully(&mut handle, b"x"),
            Err(TransportError::WriteFailure(_))
        ));
    }

    #[test]
    fn test_read_outcomes() {
        let mut data = Some(Cursor::new(b"Test".to_vec()));
        let mut buf = [0u8; 16];
        assert_eq!(read_once(&mut data, &mut buf).unwrap(), ReadOutcome::Data(4));
        assert_eq!(read_once(&mut data, &mut buf).unwrap(), ReadOutcome::Closed);

        let mut blocked = Some(Blocked);
        assert_eq!(read_once(&mut blocked, &mut buf).unwrap(), ReadOutcome::WouldBlock);
        assert!(blocked.is_some());
    }

    #[test]
    fn test_read_error_releases_handle() {
        let mut reset = Some(Reset);
        let mut buf = [0u8; 16];
        let err = read_once(&mut reset, &mut buf).unwrap_err();
        assert!(matches!(err, TransportError::ReadFailure(_)));
        assert!(reset.is_none());
    }
}
