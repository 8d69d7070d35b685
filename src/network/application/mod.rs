//! # Application Layer Protocols
//!
//! Application layer (OSI Layer 7) protocols built on the core network traits.
//!
//! - **[`mqtt`]**: MQTT 3.1.1 client for lightweight publish-subscribe messaging
//!
//! Protocol clients are connection agnostic: they work with any type
//! implementing [`Connection`](crate::network::Connection), use fixed-size
//! buffers, and never allocate.

/// MQTT client implementation.
///
/// Provides an MQTT 3.1.1 client for lightweight publish-subscribe messaging,
/// commonly used in IoT applications.
pub mod mqtt;
