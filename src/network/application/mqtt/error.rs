//! Error taxonomy for the MQTT client.
//!
//! Failures are split by what the caller can do about them:
//!
//! - [`ValidationError`] and [`Error::NotConnected`]: bad input or no
//!   transport. Raised before any byte is written; the session is untouched
//!   and the call can be retried with corrected input.
//! - [`ProtocolError`] and [`Error::ConnectionRefused`]: the broker sent
//!   something unexpected, or refused the handshake.
//! - [`Error::Transport`]: the byte stream failed or reached end-of-stream.
//! - [`Unsupported`]: the request needs a feature this client does not
//!   implement. A QoS 2 request is refused before any I/O; an incoming QoS
//!   2 PUBLISH drops the connection.
//!
//! Any error raised once a protocol exchange has started writing or reading
//! closes the transport; the client is left disconnected.

use crate::network::error::Error as NetworkError;

/// Caller input rejected before any I/O.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ValidationError {
    /// QoS level outside `0..=2`.
    InvalidQoS(u8),
    /// An empty topic where one is required (last will).
    EmptyTopic,
    /// A string field longer than the 65535 bytes its length prefix can hold.
    StringTooLong(usize),
    /// The PUBLISH remaining length would reach the packet size ceiling.
    PayloadTooLarge(usize),
    /// `subscribe` was called before a message callback was registered.
    CallbackNotSet,
    /// `server:port` does not fit the remote address buffer.
    RemoteTooLong,
    /// A value could not be serialized to JSON within the payload buffer.
    JsonEncoding,
}

/// Malformed or unexpected bytes from the broker.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ProtocolError {
    /// CONNACK did not start with `0x20 0x02`; carries the raw response.
    UnexpectedConnack([u8; 4]),
    /// PUBACK remaining length was not 2.
    InvalidPubackLength(u8),
    /// PINGRESP remaining length was not 0.
    InvalidPingrespLength(u8),
    /// SUBACK remaining length was not 3.
    InvalidSubackLength(u8),
    /// The broker refused the subscription (granted QoS `0x80`).
    SubscriptionRejected,
    /// Remaining length used more than four bytes.
    MalformedRemainingLength,
    /// Topic of an incoming PUBLISH was not valid UTF-8.
    InvalidTopicEncoding,
    /// An incoming PUBLISH is shorter than its topic and packet id.
    MalformedPublish,
    /// Reserved QoS bits (`11`) in an incoming PUBLISH.
    InvalidQoS(u8),
    /// An incoming PUBLISH does not fit the receive buffer.
    PacketTooLarge(usize),
}

/// Requested behaviour this client does not implement.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Unsupported {
    /// QoS 2 (exactly-once) publish or subscribe, refused before any I/O.
    ExactlyOnce,
    /// An incoming QoS 2 PUBLISH. It is delivered, but the PUBREC exchange
    /// it needs cannot follow, so the connection is dropped.
    IncomingExactlyOnce,
}

/// Return code of a refused CONNACK.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectReturnCode {
    /// 1: the broker does not support protocol level 4.
    UnacceptableProtocolVersion,
    /// 2: the client identifier is not allowed.
    IdentifierRejected,
    /// 3: the MQTT service is unavailable.
    ServerUnavailable,
    /// 4: malformed username or password.
    BadUsernameOrPassword,
    /// 5: the client is not authorized to connect.
    NotAuthorized,
    /// Any other non-zero code.
    Reserved(u8),
}

impl ConnectReturnCode {
    /// The raw code as sent on the wire.
    pub fn code(self) -> u8 {
        match self {
            ConnectReturnCode::UnacceptableProtocolVersion => 1,
            ConnectReturnCode::IdentifierRejected => 2,
            ConnectReturnCode::ServerUnavailable => 3,
            ConnectReturnCode::BadUsernameOrPassword => 4,
            ConnectReturnCode::NotAuthorized => 5,
            ConnectReturnCode::Reserved(code) => code,
        }
    }
}

impl From<u8> for ConnectReturnCode {
    fn from(code: u8) -> Self {
        match code {
            1 => ConnectReturnCode::UnacceptableProtocolVersion,
            2 => ConnectReturnCode::IdentifierRejected,
            3 => ConnectReturnCode::ServerUnavailable,
            4 => ConnectReturnCode::BadUsernameOrPassword,
            5 => ConnectReturnCode::NotAuthorized,
            other => ConnectReturnCode::Reserved(other),
        }
    }
}

/// Any failure of an MQTT client operation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The operation needs a connected transport and there is none.
    NotConnected,
    /// Caller input rejected before any I/O.
    Validation(ValidationError),
    /// The broker sent malformed or unexpected bytes.
    Protocol(ProtocolError),
    /// The broker answered CONNECT with a non-zero return code.
    ConnectionRefused(ConnectReturnCode),
    /// The transport failed or reached end-of-stream.
    Transport(NetworkError),
    /// The request needs an unimplemented feature.
    Unsupported(Unsupported),
}

impl Error {
    /// `true` for failures raised before any I/O, which leave the session
    /// and any open connection usable.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::NotConnected | Error::Unsupported(Unsupported::ExactlyOnce)
        )
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Error::Transport(e)
    }
}

impl From<Unsupported> for Error {
    fn from(e: Unsupported) -> Self {
        Error::Unsupported(e)
    }
}

impl core::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ValidationError::InvalidQoS(qos) => write!(f, "invalid QoS {}, must be 0-2", qos),
            ValidationError::EmptyTopic => write!(f, "topic cannot be empty"),
            ValidationError::StringTooLong(len) => write!(f, "field of {} bytes is too long", len),
            ValidationError::PayloadTooLarge(len) => {
                write!(f, "message too long: remaining length {}", len)
            }
            ValidationError::CallbackNotSet => write!(f, "callback not set"),
            ValidationError::RemoteTooLong => write!(f, "remote address too long"),
            ValidationError::JsonEncoding => write!(f, "JSON payload encoding failed"),
        }
    }
}

impl core::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProtocolError::UnexpectedConnack(raw) => write!(
                f,
                "unexpected CONNACK {:02x} {:02x} {:02x} {:02x}",
                raw[0], raw[1], raw[2], raw[3]
            ),
            ProtocolError::InvalidPubackLength(len) => write!(f, "invalid PUBACK size: {}", len),
            ProtocolError::InvalidPingrespLength(len) => {
                write!(f, "invalid PINGRESP size: {}", len)
            }
            ProtocolError::InvalidSubackLength(len) => write!(f, "invalid SUBACK size: {}", len),
            ProtocolError::SubscriptionRejected => write!(f, "subscription rejected by broker"),
            ProtocolError::MalformedRemainingLength => write!(f, "malformed remaining length"),
            ProtocolError::InvalidTopicEncoding => write!(f, "topic is not valid UTF-8"),
            ProtocolError::MalformedPublish => {
                write!(f, "PUBLISH shorter than its topic and packet id")
            }
            ProtocolError::InvalidQoS(qos) => write!(f, "invalid PUBLISH QoS bits {}", qos),
            ProtocolError::PacketTooLarge(len) => {
                write!(f, "incoming packet of {} bytes exceeds the receive buffer", len)
            }
        }
    }
}

impl core::fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConnectReturnCode::UnacceptableProtocolVersion => {
                write!(f, "unacceptable protocol version")
            }
            ConnectReturnCode::IdentifierRejected => write!(f, "identifier rejected"),
            ConnectReturnCode::ServerUnavailable => write!(f, "server unavailable"),
            ConnectReturnCode::BadUsernameOrPassword => write!(f, "bad username or password"),
            ConnectReturnCode::NotAuthorized => write!(f, "not authorized"),
            ConnectReturnCode::Reserved(code) => write!(f, "reserved return code {}", code),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NotConnected => write!(f, "not connected"),
            Error::Validation(e) => write!(f, "validation error: {}", e),
            Error::Protocol(e) => write!(f, "protocol error: {}", e),
            Error::ConnectionRefused(code) => write!(f, "connection refused: {}", code),
            Error::Transport(e) => write!(f, "transport error: {}", e),
            Error::Unsupported(Unsupported::ExactlyOnce) => write!(f, "QoS 2 not supported"),
            Error::Unsupported(Unsupported::IncomingExactlyOnce) => {
                write!(f, "incoming QoS 2 PUBLISH not supported")
            }
        }
    }
}

impl core::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for ValidationError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ValidationError::InvalidQoS(qos) => defmt::write!(f, "InvalidQoS({})", qos),
            ValidationError::EmptyTopic => defmt::write!(f, "EmptyTopic"),
            ValidationError::StringTooLong(len) => defmt::write!(f, "StringTooLong({})", len),
            ValidationError::PayloadTooLarge(len) => defmt::write!(f, "PayloadTooLarge({})", len),
            ValidationError::CallbackNotSet => defmt::write!(f, "CallbackNotSet"),
            ValidationError::RemoteTooLong => defmt::write!(f, "RemoteTooLong"),
            ValidationError::JsonEncoding => defmt::write!(f, "JsonEncoding"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ProtocolError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ProtocolError::UnexpectedConnack(raw) => defmt::write!(f, "UnexpectedConnack({})", raw),
            ProtocolError::InvalidPubackLength(len) => {
                defmt::write!(f, "InvalidPubackLength({})", len)
            }
            ProtocolError::InvalidPingrespLength(len) => {
                defmt::write!(f, "InvalidPingrespLength({})", len)
            }
            ProtocolError::InvalidSubackLength(len) => {
                defmt::write!(f, "InvalidSubackLength({})", len)
            }
            ProtocolError::SubscriptionRejected => defmt::write!(f, "SubscriptionRejected"),
            ProtocolError::MalformedRemainingLength => defmt::write!(f, "MalformedRemainingLength"),
            ProtocolError::InvalidTopicEncoding => defmt::write!(f, "InvalidTopicEncoding"),
            ProtocolError::MalformedPublish => defmt::write!(f, "MalformedPublish"),
            ProtocolError::InvalidQoS(qos) => defmt::write!(f, "InvalidQoS({})", qos),
            ProtocolError::PacketTooLarge(len) => defmt::write!(f, "PacketTooLarge({})", len),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotConnected => defmt::write!(f, "NotConnected"),
            Error::Validation(e) => defmt::write!(f, "Validation({})", e),
            Error::Protocol(e) => defmt::write!(f, "Protocol({})", e),
            Error::ConnectionRefused(code) => defmt::write!(f, "ConnectionRefused({})", code.code()),
            Error::Transport(e) => defmt::write!(f, "Transport({})", e),
            Error::Unsupported(Unsupported::ExactlyOnce) => {
                defmt::write!(f, "Unsupported(ExactlyOnce)")
            }
            Error::Unsupported(Unsupported::IncomingExactlyOnce) => {
                defmt::write!(f, "Unsupported(IncomingExactlyOnce)")
            }
        }
    }
}
