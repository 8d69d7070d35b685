//! # picomqtt - MQTT 3.1.1 client engine for IoT devices
//!
//! A small MQTT v3.1.1 client protocol engine that runs over a single ordered
//! byte stream: a TCP socket, a TLS session supplied by the platform, or any
//! other transport implementing the [`network`] traits. It is designed for
//! embedded systems and supports `no_std` environments without an allocator.
//!
//! ## Features
//!
//! - CONNECT/CONNACK handshake with credentials and last will
//! - PUBLISH at QoS 0 and QoS 1 (waits for the matching PUBACK)
//! - SUBSCRIBE with SUBACK verification
//! - Incoming PUBLISH dispatch to a registered callback, with automatic PUBACK
//! - PINGREQ and DISCONNECT
//! - Blocking client, plus an async client behind the `async` feature
//!
//! Sensor polling, network association, scheduling and reconnect/backoff are
//! left to the application. Every failure is surfaced to the caller, which
//! decides whether to build a fresh session and connect again.
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! picomqtt = "0.1.0"
//! ```
//!
//! ### MQTT Client Example
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
//! let mut options = Options::new("power-meter", "broker.local");
//! options.keep_alive_seconds = 60;
//!
//! let mut client: Client<'_, Network> = Client::new(Network, options);
//! client.connect(true)?;
//! client.publish_str("sensors/power/state", "1234", false, QoS::AtMostOnce)?;
//! client.disconnect()?;
//! # Ok::<(), picomqtt::network::application::mqtt::Error>(())
//! ```
//!
//! ## Platform Support
//!
//! This library is designed to work on:
//! - Embedded microcontrollers (ARM Cortex-M, RISC-V, etc.)
//! - Linux-based IoT devices (Raspberry Pi, etc.)
//! - Any platform supporting Rust's `core` library
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support and a TCP transport (default: disabled)
//! - `async`: Enable the async transport traits and `AsyncClient`
//! - `defmt`: Enable defmt formatting and logging
//! - `log`: Enable logging through the `log` crate

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Network abstraction layer providing the transport traits and the MQTT
/// protocol engine built on them.
pub mod network;
