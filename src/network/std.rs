//! Blocking TCP transport built on `std::net::TcpStream`.
//!
//! TLS is not handled here; wrap the stream in your own [`Connection`] if the
//! broker requires it.

use super::error::Error;
use super::{Close, Connect, Connection, Read, Ready, Write};
use ::std::io::{ErrorKind, Read as StdRead, Write as StdWrite};
use ::std::net::{Shutdown, TcpStream};
use ::std::time::Duration;

/// A connected TCP stream.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
}

impl TcpConnection {
    /// Wraps an already connected stream.
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Borrows the underlying stream, e.g. to adjust socket options.
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

impl Read for TcpConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.stream.read(buf).map_err(|e| match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => Error::Timeout,
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => Error::ConnectionClosed,
            _ => Error::ReadError,
        })
    }
}

impl Write for TcpConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream.write(buf).map_err(|_| Error::WriteError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.stream.flush().map_err(|_| Error::WriteError)
    }
}

impl Close for TcpConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // Already torn down by the peer.
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(_) => Err(Error::NotOpen),
        }
    }
}

impl Ready for TcpConnection {
    type Error = Error;

    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        self.stream
            .set_nonblocking(true)
            .map_err(|_| Error::ReadError)?;
        let mut peeked = [0u8; 1];
        let ready = match self.stream.peek(&mut peeked) {
            // Either data or end-of-stream; both make the next read return at once.
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(_) => Err(Error::ReadError),
        };
        self.stream
            .set_nonblocking(false)
            .map_err(|_| Error::ReadError)?;
        ready
    }
}

impl Connection for TcpConnection {}

/// Opens [`TcpConnection`]s to `host:port` remotes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector {
    /// Read timeout applied to every new stream; `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
}

impl TcpConnector {
    /// A connector whose streams time out reads after `timeout`.
    pub fn with_read_timeout(timeout: Duration) -> Self {
        Self {
            read_timeout: Some(timeout),
        }
    }
}

impl Connect for TcpConnector {
    type Connection = TcpConnection;
    type Error = Error;

    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error> {
        let stream = TcpStream::connect(remote).map_err(|e| match e.kind() {
            ErrorKind::ConnectionRefused => Error::ConnectionRefused,
            ErrorKind::InvalidInput => Error::InvalidAddress,
            ErrorKind::TimedOut => Error::Timeout,
            _ => Error::NotOpen,
        })?;
        stream
            .set_read_timeout(self.read_timeout)
            .map_err(|_| Error::NotOpen)?;
        stream.set_nodelay(true).map_err(|_| Error::NotOpen)?;
        Ok(TcpConnection::new(stream))
    }
}
