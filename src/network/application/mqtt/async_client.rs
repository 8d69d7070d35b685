//! Async MQTT 3.1.1 client.
//!
//! [`AsyncClient`] speaks exactly the same protocol as the blocking
//! [`Client`](super::Client), over the `Async*` transport traits. Every
//! transport read, write, flush and close is an `.await` point; nothing else
//! suspends. The client holds no timers, so wrapping any call in an external
//! deadline (e.g. `embassy_time::with_timeout`) is how a caller bounds an ack
//! wait. A call abandoned mid-frame leaves the stream unusable: drop the
//! client and build a fresh one.
//!
//! One operation at a time: the methods take `&mut self`, which serializes
//! publish, subscribe and dispatch on the same session.

use super::client::{DEFAULT_BUFFER_SIZE, Incoming, MAX_JSON_PAYLOAD, State};
use super::codec::RemainingLength;
use super::error::{Error, ProtocolError, ValidationError};
use super::packet::{
    Ack, DISCONNECT_FRAME, PINGREQ_FRAME, PUBACK, PacketKind, PublishLayout, QoS, SUBACK,
    check_pingresp, check_puback, classify, decode_topic, match_puback, match_suback,
    parse_connack, publish_header, publish_response, subscribe_header,
};
use super::session::{Options, Session};
use crate::network::error::Error as NetworkError;
use crate::network::{AsyncClose, AsyncConnect, AsyncConnection, AsyncRead, AsyncReady, AsyncWrite};
use heapless::Vec;
use serde::Serialize;

/// An MQTT 3.1.1 client over async transports.
///
/// ```rust
/// use picomqtt::network::application::mqtt::{AsyncClient, Options, QoS};
/// # use picomqtt::network::{AsyncClose, AsyncConnect, AsyncConnection, AsyncRead, AsyncWrite};
/// # use picomqtt::network::error::Error as NetError;
/// # struct Transport;
/// # impl AsyncConnection for Transport {}
/// # impl AsyncRead for Transport {
/// #     type Error = NetError;
/// #     async fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
/// #         let connack = [0x20, 0x02, 0x00, 0x00];
/// #         buf[..4].copy_from_slice(&connack);
/// #         Ok(4)
/// #     }
/// # }
/// # impl AsyncWrite for Transport {
/// #     type Error = NetError;
/// #     async fn write(&mut self, buf: &[u8]) -> Result<usize, NetError> { Ok(buf.len()) }
/// #     async fn flush(&mut self) -> Result<(), NetError> { Ok(()) }
/// # }
/// # impl AsyncClose for Transport {
/// #     type Error = NetError;
/// #     async fn close(self) -> Result<(), NetError> { Ok(()) }
/// # }
/// # struct Network;
/// # impl AsyncConnect for Network {
/// #     type Connection = Transport;
/// #     type Error = NetError;
/// #     async fn connect(&mut self, _remote: &str) -> Result<Transport, NetError> { Ok(Transport) }
/// # }
///
/// futures::executor::block_on(async {
///     let mut client: AsyncClient<'_, Network> =
///         AsyncClient::new(Network, Options::new("c1", "broker.local"));
///     assert_eq!(client.connect(true).await, Ok(false));
///     client.publish("a", b"z", false, QoS::AtMostOnce).await.unwrap();
///     client.disconnect().await.unwrap();
/// });
/// ```
pub struct AsyncClient<'a, N: AsyncConnect, const BUF: usize = DEFAULT_BUFFER_SIZE> {
    connector: N,
    connection: Option<N::Connection>,
    session: Session<'a>,
    state: State,
    buffer: Vec<u8, BUF>,
}

impl<'a, N: AsyncConnect, const BUF: usize> AsyncClient<'a, N, BUF> {
    /// Creates a disconnected client.
    pub fn new(connector: N, options: Options<'a>) -> Self {
        Self {
            connector,
            connection: None,
            session: Session::new(options),
            state: State::Disconnected,
            buffer: Vec::new(),
        }
    }

    /// Session state.
    pub fn session(&self) -> &Session<'a> {
        &self.session
    }

    /// Mutable session state.
    pub fn session_mut(&mut self) -> &mut Session<'a> {
        &mut self.session
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// `true` once the handshake was accepted and until the transport is dropped.
    pub fn is_connected(&self) -> bool {
        self.state == State::Connected
    }

    /// See [`Client::connect`](super::Client::connect).
    pub async fn connect(&mut self, clean_session: bool) -> Result<bool, Error> {
        let remote = self.session.options().remote()?;
        self.session.connect_packet(clean_session).header()?;

        if self.connection.is_some() {
            debug!("mqtt: closing previous transport");
            self.release().await;
        }

        info!(
            "mqtt: connecting to {} as {}",
            remote.as_str(),
            self.session.options().client_id
        );
        self.state = State::Connecting;
        match self.connector.connect(&remote).await {
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

        let (connection, session, _) = self.parts()?;
        let result = handshake(connection, session, clean_session).await;
        let session_present = self.settle(result).await?;

        self.state = State::Connected;
        info!("mqtt: connected, session present: {}", session_present);
        Ok(session_present)
    }

    /// See [`Client::publish`](super::Client::publish).
    pub async fn publish(
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

        let (connection, session, buffer) = self.parts()?;
        let result = send_publish(connection, header.as_bytes(), topic, packet_id, payload).await;
        let result = match (result, packet_id) {
            (Ok(()), Some(id)) => wait_for_puback(connection, session, buffer, id).await,
            (result, _) => result,
        };
        self.settle(result).await
    }

    /// Publishes UTF-8 text.
    pub async fn publish_str(
        &mut self,
        topic: &str,
        text: &str,
        retain: bool,
        qos: QoS,
    ) -> Result<(), Error> {
        self.publish(topic, text.as_bytes(), retain, qos).await
    }

    /// Serializes `value` as JSON (at most [`MAX_JSON_PAYLOAD`] bytes) and
    /// publishes it.
    pub async fn publish_json<T: Serialize>(
        &mut self,
        topic: &str,
        value: &T,
        retain: bool,
        qos: QoS,
    ) -> Result<(), Error> {
        let mut json = [0u8; MAX_JSON_PAYLOAD];
        let len = serde_json_core::to_slice(value, &mut json)
            .map_err(|_| ValidationError::JsonEncoding)?;
        self.publish(topic, &json[..len], retain, qos).await
    }

    /// See [`Client::subscribe`](super::Client::subscribe).
    pub async fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Error> {
        if !self.session.has_callback() {
            return Err(ValidationError::CallbackNotSet.into());
        }
        let header = subscribe_header(topic.len(), qos)?;
        if self.connection.is_none() {
            return Err(Error::NotConnected);
        }
        let packet_id = self.session.next_packet_id();
        debug!("mqtt: subscribe {} (qos {}, id {})", topic, qos as u8, packet_id);

        let (connection, session, buffer) = self.parts()?;
        let sent = send_subscribe(connection, header.as_bytes(), packet_id, topic, qos).await;
        let result = match sent {
            Ok(()) => wait_for_suback(connection, session, buffer, packet_id).await,
            Err(e) => Err(e),
        };
        self.settle(result).await
    }

    /// Sends PINGREQ.
    pub async fn ping(&mut self) -> Result<(), Error> {
        let (connection, _, _) = self.parts()?;
        let result = match write_all(connection, &PINGREQ_FRAME).await {
            Ok(()) => flush(connection).await,
            Err(e) => Err(e),
        };
        self.settle(result.map_err(Error::from)).await
    }

    /// See [`Client::disconnect`](super::Client::disconnect).
    pub async fn disconnect(&mut self) -> Result<(), Error> {
        let Some(mut connection) = self.connection.take() else {
            self.state = State::Disconnected;
            return Ok(());
        };
        self.state = State::Disconnecting;

        let sent = match write_all(&mut connection, &DISCONNECT_FRAME).await {
            Ok(()) => flush(&mut connection).await,
            Err(e) => Err(e),
        };
        if connection.close().await.is_err() {
            warn!("mqtt: close failed after DISCONNECT");
        }
        self.state = State::Disconnected;
        info!("mqtt: disconnected");
        sent.map_err(Error::from)
    }

    /// See [`Client::dispatch_blocking`](super::Client::dispatch_blocking).
    /// Suspends until a packet arrives.
    pub async fn dispatch(&mut self) -> Result<Option<u8>, Error> {
        let (connection, session, buffer) = self.parts()?;
        let result = dispatch_one(connection, session, buffer).await;
        self.settle(result).await
    }

    fn parts(
        &mut self,
    ) -> Result<(&mut N::Connection, &mut Session<'a>, &mut Vec<u8, BUF>), Error> {
        match self.connection.as_mut() {
            Some(connection) => Ok((connection, &mut self.session, &mut self.buffer)),
            None => Err(Error::NotConnected),
        }
    }

    async fn settle<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(e) = &result {
            self.release().await;
            warn!("mqtt: connection dropped: {}", e);
        }
        result
    }

    async fn release(&mut self) {
        if let Some(connection) = self.connection.take() {
            if connection.close().await.is_err() {
                warn!("mqtt: close failed");
            }
        }
        self.state = State::Disconnected;
    }
}

impl<'a, N, const BUF: usize> AsyncClient<'a, N, BUF>
where
    N: AsyncConnect,
    N::Connection: AsyncReady,
{
    /// Processes one packet if a byte is already waiting, otherwise returns
    /// `None` without suspending on the transport.
    pub async fn poll_once(&mut self) -> Result<Option<u8>, Error> {
        let (connection, _, _) = self.parts()?;
        let ready = connection
            .read_ready()
            .map_err(|e| Error::Transport(e.into()));
        if !self.settle(ready).await? {
            return Ok(None);
        }
        self.dispatch().await
    }
}

impl<N: AsyncConnect, const BUF: usize> core::fmt::Debug for AsyncClient<'_, N, BUF> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AsyncClient")
            .field("state", &self.state)
            .field("session", &self.session)
            .field("has_transport", &self.connection.is_some())
            .finish()
    }
}

async fn write_all<C: AsyncWrite>(connection: &mut C, mut bytes: &[u8]) -> Result<(), NetworkError> {
    while !bytes.is_empty() {
        match connection.write(bytes).await {
            Ok(0) => return Err(NetworkError::WriteError),
            Ok(n) => bytes = &bytes[n..],
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn flush<C: AsyncWrite>(connection: &mut C) -> Result<(), NetworkError> {
    connection.flush().await.map_err(Into::into)
}

async fn read_exact<C: AsyncRead>(connection: &mut C, buf: &mut [u8]) -> Result<(), NetworkError> {
    let mut filled = 0;
    while filled < buf.len() {
        match connection.read(&mut buf[filled..]).await {
            Ok(0) => return Err(NetworkError::ConnectionClosed),
            Ok(n) => filled += n,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn read_byte<C: AsyncRead>(connection: &mut C) -> Result<u8, NetworkError> {
    let mut byte = [0u8; 1];
    read_exact(connection, &mut byte).await?;
    Ok(byte[0])
}

async fn read_remaining_length<C: AsyncRead>(connection: &mut C) -> Result<usize, Error> {
    let mut decoder = RemainingLength::new();
    loop {
        if let Some(len) = decoder.feed(read_byte(connection).await?)? {
            return Ok(len);
        }
    }
}

async fn skip_packet<C: AsyncRead>(connection: &mut C, packet_type: u8) -> Result<(), Error> {
    let mut remaining = read_remaining_length(connection).await?;
    debug!("mqtt: skipping packet {} ({} bytes)", packet_type, remaining);
    let mut scratch = [0u8; 16];
    while remaining > 0 {
        let n = remaining.min(scratch.len());
        read_exact(connection, &mut scratch[..n]).await?;
        remaining -= n;
    }
    Ok(())
}

async fn send_publish<C: AsyncWrite>(
    connection: &mut C,
    header: &[u8],
    topic: &str,
    packet_id: Option<u16>,
    payload: &[u8],
) -> Result<(), Error> {
    write_all(connection, header).await?;
    write_all(connection, &(topic.len() as u16).to_be_bytes()).await?;
    write_all(connection, topic.as_bytes()).await?;
    if let Some(id) = packet_id {
        write_all(connection, &id.to_be_bytes()).await?;
    }
    write_all(connection, payload).await?;
    flush(connection).await?;
    Ok(())
}

async fn send_subscribe<C: AsyncWrite>(
    connection: &mut C,
    header: &[u8],
    packet_id: u16,
    topic: &str,
    qos: QoS,
) -> Result<(), Error> {
    write_all(connection, header).await?;
    write_all(connection, &packet_id.to_be_bytes()).await?;
    write_all(connection, &(topic.len() as u16).to_be_bytes()).await?;
    write_all(connection, topic.as_bytes()).await?;
    write_all(connection, &[qos as u8]).await?;
    flush(connection).await?;
    Ok(())
}

async fn dispatch_one<C: AsyncConnection, const BUF: usize>(
    connection: &mut C,
    session: &mut Session<'_>,
    buffer: &mut Vec<u8, BUF>,
) -> Result<Option<u8>, Error> {
    match next_packet(connection, session, buffer).await? {
        Incoming::PingResp => Ok(None),
        Incoming::Publish(packet_type) => Ok(Some(packet_type)),
        Incoming::Other(packet_type) => {
            skip_packet(connection, packet_type).await?;
            Ok(Some(packet_type))
        }
    }
}

async fn handshake<C: AsyncConnection>(
    connection: &mut C,
    session: &Session<'_>,
    clean_session: bool,
) -> Result<bool, Error> {
    let packet = session.connect_packet(clean_session);
    let (fixed, variable) = packet.header()?;
    write_all(connection, fixed.as_bytes()).await?;
    write_all(connection, &variable).await?;
    for field in packet.fields() {
        write_all(connection, &(field.len() as u16).to_be_bytes()).await?;
        write_all(connection, field).await?;
    }
    flush(connection).await?;

    let mut connack = [0u8; 4];
    read_exact(connection, &mut connack).await?;
    parse_connack(connack)
}

async fn next_packet<C: AsyncConnection, const BUF: usize>(
    connection: &mut C,
    session: &mut Session<'_>,
    buffer: &mut Vec<u8, BUF>,
) -> Result<Incoming, Error> {
    let packet_type = read_byte(connection).await?;
    match classify(packet_type)? {
        PacketKind::PingResp => {
            check_pingresp(read_byte(connection).await?)?;
            trace!("mqtt: PINGRESP");
            Ok(Incoming::PingResp)
        }
        PacketKind::Publish(qos) => {
            receive_publish(connection, session, buffer, qos).await?;
            Ok(Incoming::Publish(packet_type))
        }
        PacketKind::Other => Ok(Incoming::Other(packet_type)),
    }
}

async fn receive_publish<C: AsyncConnection, const BUF: usize>(
    connection: &mut C,
    session: &mut Session<'_>,
    buffer: &mut Vec<u8, BUF>,
    qos: QoS,
) -> Result<(), Error> {
    let remaining = read_remaining_length(connection).await?;
    let mut prefix = [0u8; 2];
    read_exact(connection, &mut prefix).await?;
    let layout = PublishLayout::new(qos, remaining, u16::from_be_bytes(prefix) as usize, BUF)?;

    buffer.clear();
    buffer
        .resize(layout.body_len(), 0)
        .map_err(|_| ProtocolError::PacketTooLarge(remaining))?;
    let (topic, payload) = buffer.split_at_mut(layout.topic_len);
    read_exact(connection, topic).await?;
    let mut packet_id = 0;
    if layout.has_packet_id() {
        let mut id = [0u8; 2];
        read_exact(connection, &mut id).await?;
        packet_id = u16::from_be_bytes(id);
    }
    read_exact(connection, payload).await?;

    let topic = decode_topic(topic)?;
    debug!(
        "mqtt: received {} ({} bytes, qos {})",
        topic,
        payload.len(),
        qos as u8
    );
    session.deliver(topic, payload);

    if let Some(ack) = publish_response(qos, packet_id)? {
        write_all(connection, &ack).await?;
        flush(connection).await?;
        trace!("mqtt: PUBACK {}", packet_id);
    }
    Ok(())
}

async fn wait_for_puback<C: AsyncConnection, const BUF: usize>(
    connection: &mut C,
    session: &mut Session<'_>,
    buffer: &mut Vec<u8, BUF>,
    packet_id: u16,
) -> Result<(), Error> {
    loop {
        match next_packet(connection, session, buffer).await? {
            Incoming::Other(PUBACK) => {
                check_puback(read_byte(connection).await?)?;
                let mut id = [0u8; 2];
                read_exact(connection, &mut id).await?;
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
            Incoming::Other(packet_type) => skip_packet(connection, packet_type).await?,
            Incoming::PingResp | Incoming::Publish(_) => {}
        }
    }
}

async fn wait_for_suback<C: AsyncConnection, const BUF: usize>(
    connection: &mut C,
    session: &mut Session<'_>,
    buffer: &mut Vec<u8, BUF>,
    packet_id: u16,
) -> Result<(), Error> {
    loop {
        match next_packet(connection, session, buffer).await? {
            Incoming::Other(SUBACK) => {
                let mut body = [0u8; 4];
                read_exact(connection, &mut body).await?;
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
            Incoming::Other(packet_type) => skip_packet(connection, packet_type).await?,
            Incoming::PingResp | Incoming::Publish(_) => {}
        }
    }
}
