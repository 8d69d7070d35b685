//! Session state: who the client is and what it has configured.
//!
//! A [`Session`] holds the client identity and credentials, the optional last
//! will, the packet identifier counter and the single message callback slot.
//! It carries no transport; the [`Client`](super::Client) pairs it with one
//! for the lifetime of a connection.

use super::error::ValidationError;
use super::packet::{Connect, QoS};
use core::fmt::Write as _;
use heapless::String;

/// Default broker port for plain TCP.
pub const DEFAULT_PORT: u16 = 1883;
/// Default broker port when the transport is TLS wrapped.
pub const DEFAULT_TLS_PORT: u16 = 8883;
/// Capacity of the rendered `server:port` string.
pub const MAX_REMOTE_LEN: usize = 128;

/// Configuration options for an MQTT session.
///
/// ```rust
/// use picomqtt::network::application::mqtt::Options;
///
/// let mut options = Options::new("power-meter", "broker.local");
/// options.tls = true;
/// assert_eq!(options.resolved_port(), 8883);
/// assert_eq!(options.remote().unwrap().as_str(), "broker.local:8883");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Options<'a> {
    /// The client identifier, unique per broker.
    pub client_id: &'a str,

    /// Broker host name or address.
    pub server: &'a str,

    /// Broker port. `0` selects [`DEFAULT_PORT`], or [`DEFAULT_TLS_PORT`]
    /// when `tls` is set.
    pub port: u16,

    /// The connector wraps the stream in TLS. The engine itself never sees
    /// the handshake; this only changes the default port.
    pub tls: bool,

    /// Optional username. When set, a password field is always sent.
    pub username: Option<&'a str>,

    /// Optional password, ignored without a username.
    pub password: Option<&'a str>,

    /// The keep-alive interval in seconds, 0 disables it.
    ///
    /// The broker drops the connection after one and a half intervals of
    /// silence; sending PINGREQ in time is up to the caller.
    pub keep_alive_seconds: u16,
}

impl<'a> Options<'a> {
    /// Options with no credentials, no keep-alive and the default port.
    pub fn new(client_id: &'a str, server: &'a str) -> Self {
        Self {
            client_id,
            server,
            port: 0,
            tls: false,
            username: None,
            password: None,
            keep_alive_seconds: 0,
        }
    }

    /// The port actually dialled.
    pub fn resolved_port(&self) -> u16 {
        match (self.port, self.tls) {
            (0, false) => DEFAULT_PORT,
            (0, true) => DEFAULT_TLS_PORT,
            (port, _) => port,
        }
    }

    /// `server:port`, as handed to the connector.
    pub fn remote(&self) -> Result<String<MAX_REMOTE_LEN>, ValidationError> {
        let mut remote = String::new();
        write!(remote, "{}:{}", self.server, self.resolved_port())
            .map_err(|_| ValidationError::RemoteTooLong)?;
        Ok(remote)
    }
}

/// Message the broker publishes on the client's behalf if it disconnects
/// uncleanly.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct LastWill<'a> {
    /// Topic the will is published on; never empty.
    pub topic: &'a str,
    /// Raw will payload.
    pub payload: &'a [u8],
    /// QoS the broker publishes the will with.
    pub qos: QoS,
    /// Whether the broker retains the will message.
    pub retain: bool,
}

/// Receiver of incoming application messages.
///
/// Implemented for every `FnMut(&str, &[u8])`, so a closure can be
/// registered directly.
pub trait MessageHandler {
    /// Called once per incoming PUBLISH with the decoded topic and the payload
    /// exactly as received.
    fn on_message(&mut self, topic: &str, payload: &[u8]);
}

impl<F> MessageHandler for F
where
    F: FnMut(&str, &[u8]),
{
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        self(topic, payload)
    }
}

/// Client identity, will, packet identifier counter and callback slot.
pub struct Session<'a> {
    options: Options<'a>,
    will: Option<LastWill<'a>>,
    packet_id: u16,
    handler: Option<&'a mut dyn MessageHandler>,
}

impl<'a> Session<'a> {
    /// A fresh session: no will, no callback, packet id counter at 0.
    pub fn new(options: Options<'a>) -> Self {
        Self {
            options,
            will: None,
            packet_id: 0,
            handler: None,
        }
    }

    /// The configured options.
    pub fn options(&self) -> &Options<'a> {
        &self.options
    }

    /// Configures the last will sent with the next CONNECT.
    ///
    /// Validation happens here rather than at connect time: an empty topic
    /// is rejected, and so is a QoS level outside `0..=2` when it comes from
    /// [`QoS::try_from`].
    ///
    /// ```rust
    /// use picomqtt::network::application::mqtt::{Options, QoS, Session};
    ///
    /// let mut session = Session::new(Options::new("c1", "broker"));
    /// assert!(session.set_last_will("", b"offline", false, QoS::AtMostOnce).is_err());
    /// session.set_last_will("dev/status", b"offline", true, QoS::AtLeastOnce).unwrap();
    /// assert_eq!(session.last_will().unwrap().topic, "dev/status");
    /// ```
    ///
    /// Payloads are bytes; text must be encoded by the caller:
    ///
    /// ```compile_fail
    /// use picomqtt::network::application::mqtt::{Options, QoS, Session};
    ///
    /// let mut session = Session::new(Options::new("c1", "broker"));
    /// session.set_last_will("dev/status", "offline", true, QoS::AtLeastOnce).unwrap();
    /// ```
    pub fn set_last_will(
        &mut self,
        topic: &'a str,
        payload: &'a [u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), ValidationError> {
        if topic.is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        self.will = Some(LastWill {
            topic,
            payload,
            qos,
            retain,
        });
        Ok(())
    }

    /// The configured last will, if any.
    pub fn last_will(&self) -> Option<&LastWill<'a>> {
        self.will.as_ref()
    }

    /// Removes the last will.
    pub fn clear_last_will(&mut self) {
        self.will = None;
    }

    /// Registers the message callback, replacing any previous one.
    pub fn set_callback(&mut self, handler: &'a mut dyn MessageHandler) {
        self.handler = Some(handler);
    }

    /// `true` once a callback is registered.
    pub fn has_callback(&self) -> bool {
        self.handler.is_some()
    }

    /// The last packet identifier handed out (0 before the first).
    pub fn last_packet_id(&self) -> u16 {
        self.packet_id
    }

    /// Allocates the next packet identifier. Identifiers start at 1 and skip
    /// 0 when the counter wraps.
    pub fn next_packet_id(&mut self) -> u16 {
        self.packet_id = self.packet_id.wrapping_add(1);
        if self.packet_id == 0 {
            self.packet_id = 1;
        }
        self.packet_id
    }

    /// Restarts identifier allocation; the next id handed out is 1.
    ///
    /// Identifiers are scoped to one network connection, so the clients call
    /// this whenever a new transport is opened.
    pub fn reset_packet_ids(&mut self) {
        self.packet_id = 0;
    }

    /// CONNECT framing parameters for this session.
    pub fn connect_packet(&self, clean_session: bool) -> Connect<'_> {
        Connect {
            client_id: self.options.client_id,
            keep_alive: self.options.keep_alive_seconds,
            clean_session,
            will: self.will.as_ref(),
            username: self.options.username,
            password: self.options.password,
        }
    }

    /// Hands an incoming message to the callback, if one is registered.
    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        match self.handler.as_mut() {
            Some(handler) => handler.on_message(topic, payload),
            None => debug!("mqtt: no callback for message on {}", topic),
        }
    }
}

impl core::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("options", &self.options)
            .field("will", &self.will)
            .field("packet_id", &self.packet_id)
            .field("has_callback", &self.handler.is_some())
            .finish()
    }
}
