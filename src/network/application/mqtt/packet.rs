//! Frame builder and parser for the MQTT 3.1.1 packets this client speaks.
//!
//! Builders only produce headers; topics and payloads are streamed to the
//! transport straight from the caller's buffers so no packet is ever copied
//! in full.

use super::codec::{MAX_LENGTH_BYTES, encode_remaining_length};
use super::error::{Error, ProtocolError, Unsupported, ValidationError};
use super::session::LastWill;
use heapless::Vec;

// MQTT Control Packet types - these are the fixed header packet type values
/// CONNECT packet type.
pub const CONNECT: u8 = 0x10;
/// CONNACK packet type.
pub const CONNACK: u8 = 0x20;
/// PUBLISH packet type; QoS lives in bits 2-1 and retain in bit 0.
pub const PUBLISH: u8 = 0x30;
/// PUBACK packet type.
pub const PUBACK: u8 = 0x40;
/// SUBSCRIBE packet type, with its mandatory `0010` flags.
pub const SUBSCRIBE: u8 = 0x82;
/// SUBACK packet type.
pub const SUBACK: u8 = 0x90;
/// PINGREQ packet type.
pub const PINGREQ: u8 = 0xC0;
/// PINGRESP packet type.
pub const PINGRESP: u8 = 0xD0;
/// DISCONNECT packet type.
pub const DISCONNECT: u8 = 0xE0;

/// Mask selecting the packet type nibble.
pub const PACKET_TYPE_MASK: u8 = 0xF0;

/// Complete PINGREQ frame.
pub const PINGREQ_FRAME: [u8; 2] = [PINGREQ, 0];
/// Complete DISCONNECT frame.
pub const DISCONNECT_FRAME: [u8; 2] = [DISCONNECT, 0];

// MQTT 3.1.1 protocol constants
/// MQTT protocol name.
pub const PROTOCOL_NAME: &[u8] = b"MQTT";
/// MQTT protocol level for version 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;

/// Ceiling on an outgoing PUBLISH remaining length.
pub const MAX_PACKET_SIZE: usize = 2_097_152;

/// Longest string a two-byte length prefix can describe.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

// Connect flag bits
const CLEAN_SESSION: u8 = 0x02;
const WILL_FLAG: u8 = 0x04;
const WILL_RETAIN: u8 = 0x20;
const PASSWORD_FLAG: u8 = 0x40;
const USERNAME_FLAG: u8 = 0x80;

/// Granted QoS value a broker uses to refuse a subscription.
pub const SUBACK_FAILURE: u8 = 0x80;

/// Quality of Service levels for MQTT messages.
///
/// ```rust
/// use picomqtt::network::application::mqtt::QoS;
///
/// assert_eq!(QoS::try_from(1), Ok(QoS::AtLeastOnce));
/// assert!(QoS::try_from(3).is_err());
/// assert_eq!(QoS::ExactlyOnce as u8, 2);
/// ```
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QoS {
    /// **QoS 0**: at most once, fire and forget.
    AtMostOnce = 0,
    /// **QoS 1**: at least once, acknowledged with PUBACK.
    AtLeastOnce = 1,
    /// **QoS 2**: exactly once. Accepted for a last will, refused for
    /// publish and subscribe.
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = ValidationError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(ValidationError::InvalidQoS(other)),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for QoS {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", *self as u8)
    }
}

/// Packet type byte followed by an encoded remaining length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    bytes: [u8; 1 + MAX_LENGTH_BYTES],
    len: usize,
}

impl FixedHeader {
    /// Builds the header for a packet whose variable header and payload span
    /// `remaining` bytes.
    pub fn new(packet_type: u8, remaining: usize) -> Result<Self, Error> {
        let mut length: Vec<u8, MAX_LENGTH_BYTES> = Vec::new();
        encode_remaining_length(&mut length, remaining)?;
        let mut bytes = [0u8; 1 + MAX_LENGTH_BYTES];
        bytes[0] = packet_type;
        bytes[1..=length.len()].copy_from_slice(&length);
        Ok(Self {
            bytes,
            len: 1 + length.len(),
        })
    }

    /// The encoded header.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

fn check_string(field: &[u8]) -> Result<(), ValidationError> {
    if field.len() > MAX_STRING_LEN {
        return Err(ValidationError::StringTooLong(field.len()));
    }
    Ok(())
}

/// Everything needed to frame a CONNECT packet.
#[derive(Debug, Clone, Copy)]
pub struct Connect<'a> {
    /// Client identifier.
    pub client_id: &'a str,
    /// Keep-alive interval in seconds, 0 disables it.
    pub keep_alive: u16,
    /// Ask the broker to discard any previous session.
    pub clean_session: bool,
    /// Optional last will.
    pub will: Option<&'a LastWill<'a>>,
    /// Optional username; a password is always sent alongside it.
    pub username: Option<&'a str>,
    /// Password, empty when a username is given without one.
    pub password: Option<&'a str>,
}

impl<'a> Connect<'a> {
    /// The connect-flags byte.
    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.clean_session {
            flags |= CLEAN_SESSION;
        }
        if self.username.is_some() {
            flags |= USERNAME_FLAG | PASSWORD_FLAG;
        }
        if let Some(will) = self.will {
            flags |= WILL_FLAG | ((will.qos as u8) << 3);
            if will.retain {
                flags |= WILL_RETAIN;
            }
        }
        flags
    }

    /// Payload fields in wire order: client id, will topic and message,
    /// username and password. Each is sent with a two-byte length prefix.
    pub fn fields(&self) -> Vec<&'a [u8], 5> {
        let mut fields: Vec<&'a [u8], 5> = Vec::new();
        // At most five fields are ever pushed.
        let _ = fields.push(self.client_id.as_bytes());
        if let Some(will) = self.will {
            let _ = fields.push(will.topic.as_bytes());
            let _ = fields.push(will.payload);
        }
        if let Some(username) = self.username {
            let _ = fields.push(username.as_bytes());
            let _ = fields.push(self.password.unwrap_or("").as_bytes());
        }
        fields
    }

    /// Variable header plus payload size.
    pub fn remaining_length(&self) -> usize {
        self.fields()
            .iter()
            .fold(10, |acc, field| acc + 2 + field.len())
    }

    /// Fixed header and the ten-byte variable header.
    pub fn header(&self) -> Result<(FixedHeader, [u8; 10]), Error> {
        for field in self.fields() {
            check_string(field)?;
        }
        let fixed = FixedHeader::new(CONNECT, self.remaining_length())?;

        let keep_alive = self.keep_alive.to_be_bytes();
        let name_len = (PROTOCOL_NAME.len() as u16).to_be_bytes();
        let variable = [
            name_len[0],
            name_len[1],
            PROTOCOL_NAME[0],
            PROTOCOL_NAME[1],
            PROTOCOL_NAME[2],
            PROTOCOL_NAME[3],
            PROTOCOL_LEVEL,
            self.flags(),
            keep_alive[0],
            keep_alive[1],
        ];
        Ok((fixed, variable))
    }
}

/// Interprets the four CONNACK bytes, returning the session-present flag.
pub fn parse_connack(raw: [u8; 4]) -> Result<bool, Error> {
    if raw[0] != CONNACK || raw[1] != 2 {
        return Err(ProtocolError::UnexpectedConnack(raw).into());
    }
    if raw[3] != 0 {
        return Err(Error::ConnectionRefused(raw[3].into()));
    }
    Ok(raw[2] & 0x01 == 0x01)
}

/// PUBLISH remaining length: topic prefix, topic, packet id (QoS > 0), payload.
pub fn publish_remaining_length(topic_len: usize, payload_len: usize, qos: QoS) -> usize {
    let mut len = 2 + topic_len + payload_len;
    if qos != QoS::AtMostOnce {
        len += 2;
    }
    len
}

/// PUBLISH fixed header, validated before anything is written.
pub fn publish_header(
    topic_len: usize,
    payload_len: usize,
    qos: QoS,
    retain: bool,
) -> Result<FixedHeader, Error> {
    if qos == QoS::ExactlyOnce {
        return Err(Unsupported::ExactlyOnce.into());
    }
    if topic_len > MAX_STRING_LEN {
        return Err(ValidationError::StringTooLong(topic_len).into());
    }
    let remaining = publish_remaining_length(topic_len, payload_len, qos);
    if remaining >= MAX_PACKET_SIZE {
        return Err(ValidationError::PayloadTooLarge(remaining).into());
    }
    FixedHeader::new(PUBLISH | ((qos as u8) << 1) | retain as u8, remaining)
}

/// QoS carried in bits 2-1 of a PUBLISH packet type byte.
pub fn publish_qos(packet_type: u8) -> Result<QoS, ProtocolError> {
    let bits = (packet_type >> 1) & 0x03;
    QoS::try_from(bits).map_err(|_| ProtocolError::InvalidQoS(bits))
}

/// How an incoming packet is handled, decided from its type byte alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// PINGRESP; a single length byte follows.
    PingResp,
    /// PUBLISH at the QoS carried in its flags.
    Publish(QoS),
    /// Anything else. Its remaining length and body are still on the wire.
    Other,
}

/// Classifies an incoming packet type byte.
///
/// Fails only for a PUBLISH with the reserved QoS bits `11`.
pub fn classify(packet_type: u8) -> Result<PacketKind, ProtocolError> {
    if packet_type == PINGRESP {
        return Ok(PacketKind::PingResp);
    }
    if packet_type & PACKET_TYPE_MASK == PUBLISH {
        return publish_qos(packet_type).map(PacketKind::Publish);
    }
    Ok(PacketKind::Other)
}

/// Checks the remaining length byte of a PINGRESP.
pub fn check_pingresp(len: u8) -> Result<(), ProtocolError> {
    match len {
        0 => Ok(()),
        len => Err(ProtocolError::InvalidPingrespLength(len)),
    }
}

/// Payload length of an incoming PUBLISH once the topic prefix, topic and
/// packet id (QoS > 0) are taken out of its remaining length.
pub fn incoming_payload_len(
    remaining: usize,
    topic_len: usize,
    qos: QoS,
) -> Result<usize, ProtocolError> {
    let id_len = if qos == QoS::AtMostOnce { 0 } else { 2 };
    remaining
        .checked_sub(2 + topic_len + id_len)
        .ok_or(ProtocolError::MalformedPublish)
}

/// Where the parts of an incoming PUBLISH body sit, checked against the
/// receive buffer before any of the body is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishLayout {
    /// QoS from the packet flags.
    pub qos: QoS,
    /// Topic length from its two-byte prefix.
    pub topic_len: usize,
    /// Bytes left for the payload.
    pub payload_len: usize,
}

impl PublishLayout {
    /// Lays out a PUBLISH of `remaining` bytes whose topic prefix announced
    /// `topic_len`, for a receive buffer of `capacity` bytes.
    pub fn new(
        qos: QoS,
        remaining: usize,
        topic_len: usize,
        capacity: usize,
    ) -> Result<Self, ProtocolError> {
        let payload_len = incoming_payload_len(remaining, topic_len, qos)?;
        if topic_len + payload_len > capacity {
            return Err(ProtocolError::PacketTooLarge(remaining));
        }
        Ok(Self {
            qos,
            topic_len,
            payload_len,
        })
    }

    /// Topic plus payload, the bytes that land in the receive buffer.
    pub fn body_len(&self) -> usize {
        self.topic_len + self.payload_len
    }

    /// A packet identifier sits between topic and payload.
    pub fn has_packet_id(&self) -> bool {
        self.qos != QoS::AtMostOnce
    }
}

/// The topic of an incoming PUBLISH as text.
pub fn decode_topic(bytes: &[u8]) -> Result<&str, ProtocolError> {
    core::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidTopicEncoding)
}

/// The reply owed for a delivered PUBLISH: nothing at QoS 0, a PUBACK at
/// QoS 1. QoS 2 would need PUBREC and is refused.
pub fn publish_response(qos: QoS, packet_id: u16) -> Result<Option<[u8; 4]>, Error> {
    match qos {
        QoS::AtMostOnce => Ok(None),
        QoS::AtLeastOnce => Ok(Some(puback(packet_id))),
        QoS::ExactlyOnce => Err(Unsupported::IncomingExactlyOnce.into()),
    }
}

/// Outcome of matching an acknowledgement against the id being waited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// It acknowledges the outstanding request.
    Matched,
    /// It carries another identifier and is dropped.
    Other(u16),
}

/// Checks the remaining length byte of a PUBACK.
pub fn check_puback(len: u8) -> Result<(), ProtocolError> {
    match len {
        2 => Ok(()),
        len => Err(ProtocolError::InvalidPubackLength(len)),
    }
}

/// Matches the packet id of a PUBACK.
pub fn match_puback(id: [u8; 2], expected: u16) -> Ack {
    match u16::from_be_bytes(id) {
        acked if acked == expected => Ack::Matched,
        acked => Ack::Other(acked),
    }
}

/// SUBSCRIBE fixed header for a single topic filter.
pub fn subscribe_header(topic_len: usize, qos: QoS) -> Result<FixedHeader, Error> {
    if qos == QoS::ExactlyOnce {
        return Err(Unsupported::ExactlyOnce.into());
    }
    if topic_len > MAX_STRING_LEN {
        return Err(ValidationError::StringTooLong(topic_len).into());
    }
    FixedHeader::new(SUBSCRIBE, 2 + 2 + topic_len + 1)
}

/// Splits the four bytes following a SUBACK type byte into packet id and
/// granted QoS.
pub fn parse_suback(body: [u8; 4]) -> Result<(u16, u8), ProtocolError> {
    if body[0] != 3 {
        return Err(ProtocolError::InvalidSubackLength(body[0]));
    }
    Ok((u16::from_be_bytes([body[1], body[2]]), body[3]))
}

/// Verdict on a SUBACK while waiting for `expected`. A refusal only counts
/// when it answers our own SUBSCRIBE.
pub fn match_suback(body: [u8; 4], expected: u16) -> Result<Ack, ProtocolError> {
    let (acked, granted) = parse_suback(body)?;
    if acked != expected {
        return Ok(Ack::Other(acked));
    }
    if granted == SUBACK_FAILURE {
        return Err(ProtocolError::SubscriptionRejected);
    }
    Ok(Ack::Matched)
}

/// Complete PUBACK frame for `packet_id`.
pub fn puback(packet_id: u16) -> [u8; 4] {
    let id = packet_id.to_be_bytes();
    [PUBACK, 2, id[0], id[1]]
}
