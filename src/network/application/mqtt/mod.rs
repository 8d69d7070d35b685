//! MQTT 3.1.1 client engine.
//!
//! Implements the client side of MQTT v3.1.1 over any ordered byte stream:
//! the CONNECT/CONNACK handshake, PUBLISH at QoS 0 and 1, SUBSCRIBE, incoming
//! PUBLISH dispatch with automatic PUBACK, PINGREQ and DISCONNECT. QoS 2 is
//! not supported.
//!
//! # Layout
//!
//! - [`codec`]: the variable-length "remaining length" integer
//! - [`packet`]: opcodes, [`QoS`] and frame builders/parsers
//! - [`session`]: [`Options`], [`LastWill`], the packet id counter and the
//!   message callback
//! - [`client`]: the blocking [`Client`]
//! - `async_client`: `AsyncClient`, the same protocol over the async
//!   transport traits, behind the `async` feature
//!
//! # Usage
//!
//! ```rust,no_run
//! use picomqtt::network::application::mqtt::{Client, Options, QoS};
//! # use picomqtt::network::{Close, Connect, Connection, Read, Write};
//! # use picomqtt::network::error::Error as NetError;
//! # struct Transport;
//! # impl Connection for Transport {}
//! # impl Read for Transport {
//! #     type Error = NetError;
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl Write for Transport {
//! #     type Error = NetError;
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl Close for Transport {
//! #     type Error = NetError;
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # struct Network;
//! # impl Connect for Network {
//! #     type Connection = Transport;
//! #     type Error = NetError;
//! #     fn connect(&mut self, _remote: &str) -> Result<Transport, NetError> { Ok(Transport) }
//! # }
//!
//! let mut on_message = |topic: &str, payload: &[u8]| {
//!     println!("{}: {} bytes", topic, payload.len());
//! };
//!
//! let mut options = Options::new("iot_device_123", "test.mosquitto.org");
//! options.keep_alive_seconds = 60;
//!
//! let mut client: Client<'_, Network> = Client::new(Network, options);
//! client.session_mut().set_callback(&mut on_message);
//! client.connect(true)?;
//! client.subscribe("sensors/+", QoS::AtLeastOnce)?;
//! client.publish("status", b"online", false, QoS::AtMostOnce)?;
//! loop {
//!     client.dispatch_blocking()?;
//! }
//! # Ok::<(), picomqtt::network::application::mqtt::Error>(())
//! ```
//!
//! With the `std` feature, `network::std::TcpConnector` stands in for
//! `Network`.

pub mod client;
pub mod codec;
pub mod error;
pub mod packet;
pub mod session;

#[cfg(feature = "async")]
pub mod async_client;

#[cfg(feature = "async")]
pub use async_client::AsyncClient;
pub use client::{Client, DEFAULT_BUFFER_SIZE, MAX_JSON_PAYLOAD, State};
pub use error::{ConnectReturnCode, Error, ProtocolError, Unsupported, ValidationError};
pub use packet::QoS;
pub use session::{LastWill, MessageHandler, Options, Session};
