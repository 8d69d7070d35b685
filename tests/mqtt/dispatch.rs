use super::mock::{Inbox, MockNetwork, Wire, connected, options};
use picomqtt::network::application::mqtt::{
    Client, Error, ProtocolError, State, Unsupported,
};
use picomqtt::network::error::Error as NetworkError;

#[test]
fn test_incoming_qos0_publish() {
    let wire = Wire::new();
    let mut inbox = Inbox::default();
    let seen = inbox.clone();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    client.session_mut().set_callback(&mut inbox);
    wire.push(&[0x30, 0x05, 0x00, 0x01, 0x61, 0x7A, 0x7A]);

    assert_eq!(client.dispatch_blocking(), Ok(Some(0x30)));

    assert_eq!(seen.messages(), [("a".to_string(), b"zz".to_vec())]);
    assert!(wire.written().is_empty());
}

#[test]
fn test_incoming_qos1_publish_is_acknowledged() {
    let wire = Wire::new();
    let mut inbox = Inbox::default();
    let seen = inbox.clone();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    client.session_mut().set_callback(&mut inbox);
    wire.push(&[0x32, 0x07, 0x00, 0x01, b'a', 0x00, 0x2A, b'z', b'z']);

    assert_eq!(client.dispatch_blocking(), Ok(Some(0x32)));

    assert_eq!(seen.messages(), [("a".to_string(), b"zz".to_vec())]);
    assert_eq!(wire.written(), [0x40, 0x02, 0x00, 0x2A]);
    assert!(wire.flushes() >= 2);
}

#[test]
fn test_binary_payload_is_passed_through() {
    let wire = Wire::new();
    let mut inbox = Inbox::default();
    let seen = inbox.clone();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    client.session_mut().set_callback(&mut inbox);
    wire.push(&[0x30, 0x06, 0x00, 0x01, b't', 0x00, 0xFF, 0x80]);

    client.dispatch_blocking().unwrap();

    assert_eq!(seen.messages()[0].1, [0x00, 0xFF, 0x80]);
}

#[test]
fn test_multi_byte_remaining_length() {
    let wire = Wire::new();
    let mut inbox = Inbox::default();
    let seen = inbox.clone();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    client.session_mut().set_callback(&mut inbox);
    let payload = [0x5Au8; 200];
    // 2 + 1 + 200 = 203
    wire.push(&[0x30, 0xCB, 0x01, 0x00, 0x01, b'p']);
    wire.push(&payload);

    assert_eq!(client.dispatch_blocking(), Ok(Some(0x30)));
    assert_eq!(seen.messages()[0].1, payload);
}

#[test]
fn test_publish_without_callback_is_consumed() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    wire.push(&[0x30, 0x05, 0x00, 0x01, 0x61, 0x7A, 0x7A]);

    assert_eq!(client.dispatch_blocking(), Ok(Some(0x30)));
    assert_eq!(wire.pending(), 0);
}

#[test]
fn test_pingresp() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    wire.push(&[0xD0, 0x00]);

    assert_eq!(client.dispatch_blocking(), Ok(None));
    assert!(client.is_connected());
}

#[test]
fn test_pingresp_with_bad_length() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    wire.push(&[0xD0, 0x01]);

    assert_eq!(
        client.dispatch_blocking(),
        Err(Error::Protocol(ProtocolError::InvalidPingrespLength(1)))
    );
    assert!(wire.closed());
}

#[test]
fn test_other_packets_are_skipped_whole() {
    let wire = Wire::new();
    let mut inbox = Inbox::default();
    let seen = inbox.clone();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    client.session_mut().set_callback(&mut inbox);
    wire.push(&[0x40, 0x02, 0x00, 0x07]);
    wire.push(&[0x30, 0x05, 0x00, 0x01, 0x61, 0x7A, 0x7A]);

    assert_eq!(client.dispatch_blocking(), Ok(Some(0x40)));
    assert_eq!(client.dispatch_blocking(), Ok(Some(0x30)));
    assert_eq!(seen.messages().len(), 1);
}

#[test]
fn test_end_of_stream() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);

    assert_eq!(
        client.dispatch_blocking(),
        Err(Error::Transport(NetworkError::ConnectionClosed))
    );
    assert!(wire.closed());
    assert_eq!(client.state(), State::Disconnected);
}

#[test]
fn test_invalid_topic_encoding() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    wire.push(&[0x30, 0x04, 0x00, 0x01, 0xFF, b'z']);

    assert_eq!(
        client.dispatch_blocking(),
        Err(Error::Protocol(ProtocolError::InvalidTopicEncoding))
    );
    assert!(!client.is_connected());
}

#[test]
fn test_topic_longer_than_packet() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    wire.push(&[0x30, 0x03, 0x00, 0x05, b'a']);

    assert_eq!(
        client.dispatch_blocking(),
        Err(Error::Protocol(ProtocolError::MalformedPublish))
    );
    assert!(wire.closed());
}

#[test]
fn test_reserved_qos_bits() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    wire.push(&[0x36, 0x05, 0x00, 0x01, 0x61, 0x7A, 0x7A]);

    assert_eq!(
        client.dispatch_blocking(),
        Err(Error::Protocol(ProtocolError::InvalidQoS(3)))
    );
}

#[test]
fn test_incoming_qos2_is_unsupported() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    wire.push(&[0x34, 0x07, 0x00, 0x01, b'a', 0x00, 0x01, b'z', b'z']);

    assert_eq!(
        client.dispatch_blocking(),
        Err(Error::Unsupported(Unsupported::IncomingExactlyOnce))
    );
    assert!(wire.written().is_empty());
    assert!(wire.closed());
}

#[test]
fn test_malformed_remaining_length() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    wire.push(&[0x30, 0x80, 0x80, 0x80, 0x80, 0x01]);

    assert_eq!(
        client.dispatch_blocking(),
        Err(Error::Protocol(ProtocolError::MalformedRemainingLength))
    );
}

#[test]
fn test_packet_larger_than_receive_buffer() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork, 8> = connected(&wire);
    wire.push(&[0x30, 0x0D, 0x00, 0x01, b'a']);
    wire.push(&[b'z'; 10]);

    assert_eq!(
        client.dispatch_blocking(),
        Err(Error::Protocol(ProtocolError::PacketTooLarge(13)))
    );
    assert!(wire.closed());
}

#[test]
fn test_poll_once_returns_immediately_when_idle() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    let reads = wire.reads();

    assert_eq!(client.poll_once(), Ok(None));
    assert_eq!(wire.reads(), reads);
    assert!(client.is_connected());
}

#[test]
fn test_poll_once_processes_one_packet() {
    let wire = Wire::new();
    let mut inbox = Inbox::default();
    let seen = inbox.clone();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    client.session_mut().set_callback(&mut inbox);
    wire.push(&[0x30, 0x05, 0x00, 0x01, 0x61, 0x7A, 0x7A]);
    wire.push(&[0x30, 0x05, 0x00, 0x01, 0x62, 0x7A, 0x7A]);

    assert_eq!(client.poll_once(), Ok(Some(0x30)));
    assert_eq!(seen.messages().len(), 1);
    assert_eq!(client.poll_once(), Ok(Some(0x30)));
    assert_eq!(seen.messages()[1].0, "b");
    assert_eq!(client.poll_once(), Ok(None));
}

#[test]
fn test_dispatch_without_connection() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = Client::new(MockNetwork::new(&wire), options());

    assert_eq!(client.dispatch_blocking(), Err(Error::NotConnected));
    assert_eq!(client.poll_once(), Err(Error::NotConnected));
}

#[test]
fn test_qos1_publish_missing_packet_id() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    // QoS 1 with room for the topic only
    wire.push(&[0x32, 0x03, 0x00, 0x01, b'a']);

    assert_eq!(
        client.dispatch_blocking(),
        Err(Error::Protocol(ProtocolError::MalformedPublish))
    );
    assert!(wire.written().is_empty());
}

#[test]
fn test_read_timeout_is_reported_as_timeout() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    wire.fail_reads(Some(NetworkError::Timeout));

    assert_eq!(
        client.dispatch_blocking(),
        Err(Error::Transport(NetworkError::Timeout))
    );
    assert!(wire.closed());
    assert_eq!(client.state(), State::Disconnected);
}

#[test]
fn test_read_failure_keeps_transport_error() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    wire.fail_reads(Some(NetworkError::ReadError));

    assert_eq!(
        client.dispatch_blocking(),
        Err(Error::Transport(NetworkError::ReadError))
    );
}
