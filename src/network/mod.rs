//! Transport abstraction for the MQTT engine.
//!
//! The protocol layer never opens sockets itself. It consumes an ordered byte
//! stream through the small set of traits below, so the same client runs over
//! a `std` TCP socket, a TLS session supplied by the platform, an embedded
//! network stack, or an in-memory mock in tests.
//!
//! Blocking transports implement [`Read`], [`Write`] and [`Close`] (together
//! [`Connection`]) and are opened by a [`Connect`] implementation. The
//! optional [`Ready`] trait adds a zero-timeout readability check used by
//! non-blocking polling. With the `async` feature the same shape exists as
//! `Async*` traits where every operation is a suspension point.
//!
//! Every transport error converts into [`error::Error`], so a read timeout
//! reported by the transport reaches the caller as
//! [`Timeout`](error::Error::Timeout) rather than a generic read failure.

#![allow(missing_docs)]
#![allow(async_fn_in_trait)]
#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// Application protocols built on the transport traits
pub mod application;

/// Blocking TCP transport over `std::net`
#[cfg(feature = "std")]
pub mod std;

/// Re-exports of common traits
pub mod prelude {
    #[cfg(feature = "async")]
    pub use super::{AsyncClose, AsyncConnect, AsyncConnection, AsyncRead, AsyncReady, AsyncWrite};
    pub use super::{Close, Connect, Connection, Read, Ready, Write};
}

// Core synchronous traits
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug + Into<error::Error>;
    /// Read data from the connection.
    ///
    /// Returning `Ok(0)` for a non-empty `buf` means the peer closed the stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug + Into<error::Error>;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug + Into<error::Error>;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// Zero-timeout readability check.
pub trait Ready {
    /// Associated error type
    type Error: core::fmt::Debug + Into<error::Error>;
    /// Returns `true` if at least one byte (or end-of-stream) can be read
    /// without blocking.
    fn read_ready(&mut self) -> Result<bool, Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {}

/// A synchronous connector (client)
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: core::fmt::Debug + Into<error::Error>;
    /// Open a connection to `remote`, given as `host:port`
    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error>;
}

// Core async traits
#[cfg(feature = "async")]
pub trait AsyncRead {
    /// Associated error type
    type Error: core::fmt::Debug + Into<error::Error>;
    /// Read data from the connection asynchronously
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

#[cfg(feature = "async")]
pub trait AsyncWrite {
    /// Associated error type
    type Error: core::fmt::Debug + Into<error::Error>;
    /// Write data to the connection asynchronously
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer asynchronously
    async fn flush(&mut self) -> Result<(), Self::Error>;
}

#[cfg(feature = "async")]
pub trait AsyncClose {
    /// Associated error type
    type Error: core::fmt::Debug + Into<error::Error>;
    /// Close the connection asynchronously
    async fn close(self) -> Result<(), Self::Error>;
}

#[cfg(feature = "async")]
pub trait AsyncReady {
    /// Associated error type
    type Error: core::fmt::Debug + Into<error::Error>;
    /// Returns `true` if a read would complete without suspending
    fn read_ready(&mut self) -> Result<bool, Self::Error>;
}

#[cfg(feature = "async")]
pub trait AsyncConnection: AsyncRead + AsyncWrite + AsyncClose {}

#[cfg(feature = "async")]
pub trait AsyncConnect {
    /// Associated connection type
    type Connection: AsyncConnection;
    /// Associated error type
    type Error: core::fmt::Debug + Into<error::Error>;
    /// Open a connection asynchronously
    async fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error>;
}
