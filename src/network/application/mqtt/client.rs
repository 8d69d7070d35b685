//! Blocking MQTT 3.1.1 client.
//!
//! [`Client`] drives the protocol exchanges over a transport opened by a
//! [`Connect`] implementation:
//!
//! - **Handshake**: CONNECT, then exactly four CONNACK bytes.
//! - **Publish**: PUBLISH at QoS 0, or QoS 1 waiting for the matching PUBACK.
//! - **Subscribe**: SUBSCRIBE, waiting for the matching SUBACK.
//! - **Dispatch**: read one incoming packet, deliver PUBLISH to the callback
//!   and acknowledge it at QoS 1.
//! - **Lifecycle**: PINGREQ and DISCONNECT.
//!
//! Every transport read and write is a blocking call. There is no timeout in
//! the engine; a caller that needs one configures it on the transport (the
//! `std` feature's `TcpConnector::with_read_timeout`, for instance). The
//! transport's own error is kept, so an expired wait surfaces as
//! `Error::Transport(Timeout)` and the caller reconnects.
//!
//! Any error raised once an exchange has touched the transport closes it and
//! leaves the client [`State::Disconnected`]. Input validation happens first,
//! so a [`ValidationError`] never costs the connection.

use super::codec::RemainingLength;
use super::error::{Error, ProtocolError, ValidationError};
use super::packet::{
    Ack, DISCONNECT_FRAME, PINGREQ_FRAME, PUBACK, PacketKind, PublishLayout, QoS, SUBACK,
    check_pingresp, check_puback, classify, decode_topic, match_puback, match_suback,
    parse_connack, publish_header, publish_response, subscribe_header,
};
use super::session::{Options, Session};
use crate::network::error::Error as NetworkError;
use crate::network::{Close, Connect, Connection, Read, Ready, Write};
use heapless::Vec;
use serde::Serialize;

/// Default receive buffer capacity; bounds topic plus payload of an incoming
/// PUBLISH.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Largest serialized document [`Client::publish_json`] can send.
pub const MAX_JSON_PAYLOAD: usize = 512;

/// Lifecycle of the connection owned by a client.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
    /// No transport. Initial and terminal state.
    Disconnected,
    /// CONNECT sent, CONNACK not yet accepted.
    Connecting,
    /// Handshake accepted; publish, subscribe and dispatch are available.
    Connected,
    /// DISCONNECT being sent.
    Disconnecting,
}

/// What one dispatch step read off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Incoming {
    /// A PINGRESP, fully consumed.
    PingResp,
    /// A PUBLISH, delivered and acknowledged as its QoS requires.
    Publish(u8),
    /// Any other packet type byte; its body is still on the wire.
    Other(u8),
}

/// An MQTT 3.1.1 client for publish-subscribe messaging.
///
/// The client owns its connector, the [`Session`] and at most one open
/// transport. `BUF` sizes the receive buffer used for incoming PUBLISH
/// packets.
///
/// # Examples
///
/// ```rust
/// use picomqtt::network::application::mqtt::{Client, Options, State};
/// # use picomqtt::network::{Close, Connect, Connection, Read, Write};
/// # use picomqtt::network::error::Error as NetError;
/// # struct Transport;
/// # impl Connection for Transport {}
/// # impl Read for Transport {
/// #     type Error = NetError;
/// #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
/// # }
/// # impl Write for Transport {
/// #     type Error = NetError;
/// #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
/// #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
/// # }
/// # impl Close for Transport {
/// #     type Error = NetError;
/// #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
/// # }
/// # struct Network;
/// # impl Connect for Network {
/// #     type Connection = Transport;
/// #     type Error = NetError;
/// #     fn connect(&mut self, _remote: &str) -> Result<Transport, NetError> { Ok(Transport) }
/// # }
///
/// let mut received = 0;
/// let mut on_message = |_topic: &str, _payload: &[u8]| received += 1;
///
/// let mut client: Client<'_, Network, 256> =
///     Client::new(Network, Options::new("sensor_node_1", "broker.local"));
/// client.session_mut().set_callback(&mut on_message);
/// assert_eq!(client.state(), State::Disconnected);
/// ```
pub struct Client<'a, N: Connect, const BUF: usize = DEFAULT_BUFFER_SIZE> {
    connector: N,
    connection: Option<N::Connection>,
    session: Session<'a>,
    state: State,
    buffer: Vec<u8, BUF>,
}

impl<'a, N: Connect, const BUF: usize> Client<'a, N, BUF> {
    /// Creates a disconnected client. Nothing is sent until [`connect`](Self::connect).
    pub fn new(connector: N, options: Options<'a>) -> Self {
        Self {
            connector,
            connection: None,
            session: Session::new(options),
            state: State::Disconnected,
            buffer: Vec::new(),
        }
    }

    /// Session state: identity, will, packet ids, callback.
    pub fn session(&self) -> &Session<'a> {
        &self.session
    }

    /// Mutable session state, e.g. to set the last will or the callback.
    pub fn session_mut(&mut self) -> &mut Session<'a> {
        &mut self.session
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// `true` while a transport is held and the handshake was accepted.
    pub fn is_connected(&self) -> bool {
        self.state == State::Connected
    }

    /// Opens the transport and performs the CONNECT/CONNACK handshake.
    ///
    /// Returns the session-present flag from the CONNACK. A transport still
    /// held from an earlier connection is closed first, and packet
    /// identifiers restart at 1 on the new one.
    ///
    /// # Errors
    ///
    /// * [`Error::Validation`] - the remote address or a CONNECT field is too
    ///   long; nothing is opened
    /// * [`Error::Transport`] - the connector failed (carrying its error), or
    ///   the stream failed or closed during the handshake
    /// * [`Error::Protocol`] - the response is not a CONNACK
    /// * [`Error::ConnectionRefused`] - the broker refused with a return code
    ///
    /// On every error after the transport is opened it is closed again and
    /// the client is left [`State::Disconnected`].
    pub fn connect(&mut self, clean_session: bool) -> Result<bool, Error> {
        let remote = self.session.options().remote()?;
        self.session.connect_packet(clean_session).header()?;

        if self.connection.is_some() {
            debug!("mqtt: closing previous transport");
            self.release();
        }

        info!(
            "mqtt: connecting to {} as {}",
            remote.as_str(),
            self.session.options().client_id
        );
        self.state = State::Connecting;
        match self.connector.connect(&remote) {
            Ok(connection) => {
                self.connection = Some(connection);
                self.session.reset_packet_ids();
            }
            Err(e) => {
                let cause: NetworkError = e.into();
                self.state = State::Disconnected;
                warn!("mqtt: could not open {}: {}", remote.as_str(), cause);
                return Err(cause.into());
            }
        }

        let session_present = self.exchange(|connection, session, _| {
            let packet = session.connect_packet(clean_session);
            let (fixed, variable) = packet.header()?;
            write_all(connection, fixed.as_bytes())?;
            write_all(connection, &variable)?;
            for field in packet.fields() {
                write_all(connection, &(field.len() as u16).to_be_bytes())?;
                write_all(connection, field)?;
            }
            flush(connection)?;

            let mut connack = [0u8; 4];
            read_exact(connection, &mut connack)?;
            parse_connack(connack)
        })?;

        self.state = State::Connected;
        info!("mqtt: connected, session present: {}", session_present);
        Ok(session_present)
    }

    /// Publishes `payload` on `topic`.
    ///
    /// At QoS 0 the call returns once the frame is flushed and reads nothing.
    /// At QoS 1 it blocks until a PUBACK carrying the packet identifier just
    /// sent arrives. PUBLISH packets arriving meanwhile are delivered to the
    /// callback, and PUBACKs for other identifiers are consumed.
    ///
    /// Payloads are bytes; use [`publish_str`](Self::publish_str) for text.
    ///
    /// ```compile_fail
    /// use picomqtt::network::Connect;
    /// use picomqtt::network::application::mqtt::{Client, QoS};
    ///
    /// fn send<N: Connect>(client: &mut Client<'_, N>) {
    ///     let _ = client.publish("a", "text", false, QoS::AtMostOnce);
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// * [`Unsupported::ExactlyOnce`](super::Unsupported::ExactlyOnce) - QoS
    ///   2, before any write
    /// * [`Error::Validation`] - remaining length would reach
    ///   [`MAX_PACKET_SIZE`](super::packet::MAX_PACKET_SIZE), before any write
    /// * [`Error::NotConnected`] - no transport
    /// * [`Error::Transport`], [`Error::Protocol`] - the exchange failed and
    ///   the transport was closed
    pub fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), Error> {
        let header = publish_header(topic.len(), payload.len(), qos, retain)?;
        if self.connection.is_none() {
            return Err(Error::NotConnected);
        }
        let packet_id = match qos {
            QoS::AtMostOnce => None,
            _ => Some(self.session.next_packet_id()),
        };
        debug!(
            "mqtt: publish {} ({} bytes, qos {})",
            topic,
            payload.len(),
            qos as u8
        );

        self.exchange(|connection, session, buffer| {
            write_all(connection, header.as_bytes())?;
            write_all(connection, &(topic.len() as u16).to_be_bytes())?;
            write_all(connection, topic.as_bytes())?;
            if let Some(id) = packet_id {
                write_all(connection, &id.to_be_bytes())?;
            }
            write_all(connection, payload)?;
            flush(connection)?;

            match packet_id {
                Some(id) => wait_for_puback(connection, session, buffer, id),
                None => Ok(()),
            }
        })
    }

    /// Publishes UTF-8 text.
    pub fn publish_str(
        &mut self,
        topic: &str,
        text: &str,
        retain: bool,
        qos: QoS,
    ) -> Result<(), Error> {
        self.publish(topic, text.as_bytes(), retain, qos)
    }

    /// Serializes `value` as JSON and publishes it.
    ///
    /// The document must fit [`MAX_JSON_PAYLOAD`] bytes, otherwise
    /// [`ValidationError::JsonEncoding`] is returned and nothing is sent.
    pub fn publish_json<T: Serialize>(
        &mut self,
        topic: &str,
        value: &T,
        retain: bool,
        qos: QoS,
    ) -> Result<(), Error> {
        let mut json = [0u8; MAX_JSON_PAYLOAD];
        let len = serde_json_core::to_slice(value, &mut json)
            .map_err(|_| ValidationError::JsonEncoding)?;
        self.publish(topic, &json[..len], retain, qos)
    }

    /// Subscribes to a topic filter and waits for the matching SUBACK.
    ///
    /// A callback must be registered first with
    /// [`Session::set_callback`]; messages on the filter are delivered
    /// through [`dispatch_blocking`](Self::dispatch_blocking) or
    /// [`poll_once`](Self::poll_once).
    ///
    /// # Errors
    ///
    /// * [`ValidationError::CallbackNotSet`] - no callback, before any write
    /// * [`Error::Unsupported`] - QoS 2, before any write
    /// * [`Error::NotConnected`] - no transport
    /// * [`ProtocolError::SubscriptionRejected`] - the broker granted `0x80`
    /// * [`Error::Transport`], [`Error::Protocol`] - the exchange failed and
    ///   the transport was closed
    pub fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Error> {
        if !self.session.has_callback() {
            return Err(ValidationError::CallbackNotSet.into());
        }
        let header = subscribe_header(topic.len(), qos)?;
        if self.connection.is_none() {
            return Err(Error::NotConnected);
        }
        let packet_id = self.session.next_packet_id();
        debug!("mqtt: subscribe {} (qos {}, id {})", topic, qos as u8, packet_id);

        self.exchange(|connection, session, buffer| {
            write_all(connection, header.as_bytes())?;
            write_all(connection, &packet_id.to_be_bytes())?;
            write_all(connection, &(topic.len() as u16).to_be_bytes())?;
            write_all(connection, topic.as_bytes())?;
            write_all(connection, &[qos as u8])?;
            flush(connection)?;

            wait_for_suback(connection, session, buffer, packet_id)
        })
    }

    /// Sends PINGREQ. The PINGRESP is consumed by the next dispatch.
    pub fn ping(&mut self) -> Result<(), Error> {
        self.exchange(|connection, _, _| {
            write_all(connection, &PINGREQ_FRAME)?;
            flush(connection)?;
            Ok(())
        })
    }

    /// Sends DISCONNECT and releases the transport.
    ///
    /// The transport is closed and the client left [`State::Disconnected`]
    /// even when the DISCONNECT write fails; that write error is then
    /// returned. Without a transport this does nothing.
    pub fn disconnect(&mut self) -> Result<(), Error> {
        let Some(mut connection) = self.connection.take() else {
            self.state = State::Disconnected;
            return Ok(());
        };
        self.state = State::Disconnecting;

        let sent = write_all(&mut connection, &DISCONNECT_FRAME)
            .and_then(|()| flush(&mut connection));
        if connection.close().is_err() {
            warn!("mqtt: close failed after DISCONNECT");
        }
        self.state = State::Disconnected;
        info!("mqtt: disconnected");
        sent.map_err(Error::from)
    }

    /// Reads and processes one incoming packet, blocking until it arrives.
    ///
    /// Returns `None` for a PINGRESP. Otherwise returns the packet type byte:
    /// a PUBLISH has been delivered to the callback (and acknowledged at QoS
    /// 1); any other packet has been skipped whole.
    pub fn dispatch_blocking(&mut self) -> Result<Option<u8>, Error> {
        self.exchange(|connection, session, buffer| {
            match next_packet(connection, session, buffer)? {
                Incoming::PingResp => Ok(None),
                Incoming::Publish(packet_type) => Ok(Some(packet_type)),
                Incoming::Other(packet_type) => {
                    skip_packet(connection, packet_type)?;
                    Ok(Some(packet_type))
                }
            }
        })
    }

    /// Runs the exchange on the open transport; any error closes it.
    fn exchange<T>(
        &mut self,
        op: impl FnOnce(&mut N::Connection, &mut Session<'a>, &mut Vec<u8, BUF>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(Error::NotConnected);
        };
        let result = op(connection, &mut self.session, &mut self.buffer);
        if let Err(e) = &result {
            self.teardown(e);
        }
        result
    }

    fn teardown(&mut self, cause: &Error) {
        self.release();
        warn!("mqtt: connection dropped: {}", cause);
    }

    fn release(&mut self) {
        if let Some(connection) = self.connection.take() {
            if connection.close().is_err() {
                warn!("mqtt: close failed");
            }
        }
        self.state = State::Disconnected;
    }
}

impl<'a, N, const BUF: usize> Client<'a, N, BUF>
where
    N: Connect,
    N::Connection: Ready,
{
    /// Non-blocking [`dispatch_blocking`](Self::dispatch_blocking).
    ///
    /// Returns `None` at once when no byte is waiting; otherwise processes
    /// exactly one packet.
    pub fn poll_once(&mut self) -> Result<Option<u8>, Error> {
        let ready = self.exchange(|connection, _, _| {
            connection
                .read_ready()
                .map_err(|e| Error::Transport(e.into()))
        })?;
        if !ready {
            return Ok(None);
        }
        self.dispatch_blocking()
    }
}

impl<N: Connect, const BUF: usize> core::fmt::Debug for Client<'_, N, BUF> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("session", &self.session)
            .field("has_transport", &self.connection.is_some())
            .finish()
    }
}

fn write_all<C: Write>(connection: &mut C, mut bytes: &[u8]) -> Result<(), NetworkError> {
    while !bytes.is_empty() {
        match connection.write(bytes) {
            Ok(0) => return Err(NetworkError::WriteError),
            Ok(n) => bytes = &bytes[n..],
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn flush<C: Write>(connection: &mut C) -> Result<(), NetworkError> {
    connection.flush().map_err(Into::into)
}

fn read_exact<C: Read>(connection: &mut C, buf: &mut [u8]) -> Result<(), NetworkError> {
    let mut filled = 0;
    while filled < buf.len() {
        match connection.read(&mut buf[filled..]) {
            Ok(0) => return Err(NetworkError::ConnectionClosed),
            Ok(n) => filled += n,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn read_byte<C: Read>(connection: &mut C) -> Result<u8, NetworkError> {
    let mut byte = [0u8; 1];
    read_exact(connection, &mut byte)?;
    Ok(byte[0])
}

fn read_remaining_length<C: Read>(connection: &mut C) -> Result<usize, Error> {
    let mut decoder = RemainingLength::new();
    loop {
        if let Some(len) = decoder.feed(read_byte(connection)?)? {
            return Ok(len);
        }
    }
}

/// Discards the body of a packet whose type byte was already read.
fn skip_packet<C: Read>(connection: &mut C, packet_type: u8) -> Result<(), Error> {
    let mut remaining = read_remaining_length(connection)?;
    debug!("mqtt: skipping packet {} ({} bytes)", packet_type, remaining);
    let mut scratch = [0u8; 16];
    while remaining > 0 {
        let n = remaining.min(scratch.len());
        read_exact(connection, &mut scratch[..n])?;
        remaining -= n;
    }
    Ok(())
}

/// The dispatch step shared by explicit dispatch and the ack waits.
fn next_packet<C: Connection, const BUF: usize>(
    connection: &mut C,
    session: &mut Session<'_>,
    buffer: &mut Vec<u8, BUF>,
) -> Result<Incoming, Error> {
    let packet_type = read_byte(connection)?;
    match classify(packet_type)? {
        PacketKind::PingResp => {
            check_pingresp(read_byte(connection)?)?;
            trace!("mqtt: PINGRESP");
            Ok(Incoming::PingResp)
        }
        PacketKind::Publish(qos) => {
            receive_publish(connection, session, buffer, qos)?;
            Ok(Incoming::Publish(packet_type))
        }
        PacketKind::Other => Ok(Incoming::Other(packet_type)),
    }
}

fn receive_publish<C: Connection, const BUF: usize>(
    connection: &mut C,
    session: &mut Session<'_>,
    buffer: &mut Vec<u8, BUF>,
    qos: QoS,
) -> Result<(), Error> {
    let remaining = read_remaining_length(connection)?;
    let mut prefix = [0u8; 2];
    read_exact(connection, &mut prefix)?;
    let layout = PublishLayout::new(qos, remaining, u16::from_be_bytes(prefix) as usize, BUF)?;

    buffer.clear();
    buffer
        .resize(layout.body_len(), 0)
        .map_err(|_| ProtocolError::PacketTooLarge(remaining))?;
    let (topic, payload) = buffer.split_at_mut(layout.topic_len);
    read_exact(connection, topic)?;
    let mut packet_id = 0;
    if layout.has_packet_id() {
        let mut id = [0u8; 2];
        read_exact(connection, &mut id)?;
        packet_id = u16::from_be_bytes(id);
    }
    read_exact(connection, payload)?;

    let topic = decode_topic(topic)?;
    debug!(
        "mqtt: received {} ({} bytes, qos {})",
        topic,
        payload.len(),
        qos as u8
    );
    session.deliver(topic, payload);

    if let Some(ack) = publish_response(qos, packet_id)? {
        write_all(connection, &ack)?;
        flush(connection)?;
        trace!("mqtt: PUBACK {}", packet_id);
    }
    Ok(())
}

fn wait_for_puback<C: Connection, const BUF: usize>(
    connection: &mut C,
    session: &mut Session<'_>,
    buffer: &mut Vec<u8, BUF>,
    packet_id: u16,
) -> Result<(), Error> {
    loop {
        match next_packet(connection, session, buffer)? {
            Incoming::Other(PUBACK) => {
                check_puback(read_byte(connection)?)?;
                let mut id = [0u8; 2];
                read_exact(connection, &mut id)?;
                match match_puback(id, packet_id) {
                    Ack::Matched => {
                        trace!("mqtt: PUBACK {} matched", packet_id);
                        return Ok(());
                    }
                    Ack::Other(acked) => {
                        debug!("mqtt: PUBACK {} while waiting for {}", acked, packet_id)
                    }
                }
            }
            Incoming::Other(packet_type) => skip_packet(connection, packet_type)?,
            Incoming::PingResp | Incoming::Publish(_) => {}
        }
    }
}

fn wait_for_suback<C: Connection, const BUF: usize>(
    connection: &mut C,
    session: &mut Session<'_>,
    buffer: &mut Vec<u8, BUF>,
    packet_id: u16,
) -> Result<(), Error> {
    loop {
        match next_packet(connection, session, buffer)? {
            Incoming::Other(SUBACK) => {
                let mut body = [0u8; 4];
                read_exact(connection, &mut body)?;
                match match_suback(body, packet_id)? {
                    Ack::Matched => {
                        debug!("mqtt: SUBACK {} granted", packet_id);
                        return Ok(());
                    }
                    Ack::Other(acked) => {
                        debug!("mqtt: SUBACK {} while waiting for {}", acked, packet_id)
                    }
                }
            }
            Incoming::Other(packet_type) => skip_packet(connection, packet_type)?,
            Incoming::PingResp | Incoming::Publish(_) => {}
        }
    }
}
