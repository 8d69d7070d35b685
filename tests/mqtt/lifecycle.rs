use super::mock::{CONNACK_OK, MockNetwork, Wire, connected, options};
use picomqtt::network::application::mqtt::{Client, Error, QoS, State, ValidationError};
use picomqtt::network::error::Error as NetworkError;

#[test]
fn test_state_transitions() {
    let wire = Wire::new();
    wire.push(&CONNACK_OK);
    let mut client: Client<'_, MockNetwork> = Client::new(MockNetwork::new(&wire), options());
    assert_eq!(client.state(), State::Disconnected);

    client.connect(true).unwrap();
    assert_eq!(client.state(), State::Connected);

    client.disconnect().unwrap();
    assert_eq!(client.state(), State::Disconnected);
}

#[test]
fn test_disconnect_sends_frame_and_closes() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);

    client.disconnect().unwrap();

    assert_eq!(wire.written(), [0xE0, 0x00]);
    assert!(wire.closed());
    assert!(!client.is_connected());
}

#[test]
fn test_disconnect_closes_even_when_write_fails() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    wire.fail_writes(true);

    assert_eq!(
        client.disconnect(),
        Err(Error::Transport(NetworkError::WriteError))
    );
    assert!(wire.closed());
    assert_eq!(client.state(), State::Disconnected);
    assert_eq!(client.ping(), Err(Error::NotConnected));
}

#[test]
fn test_disconnect_without_connection_is_a_no_op() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = Client::new(MockNetwork::new(&wire), options());

    assert_eq!(client.disconnect(), Ok(()));
    assert!(wire.written().is_empty());
}

#[test]
fn test_ping_writes_pingreq_and_reads_nothing() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    let reads = wire.reads();

    client.ping().unwrap();

    assert_eq!(wire.written(), [0xC0, 0x00]);
    assert_eq!(wire.reads(), reads);
}

#[test]
fn test_ping_without_connection() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = Client::new(MockNetwork::new(&wire), options());

    assert_eq!(client.ping(), Err(Error::NotConnected));
}

#[test]
fn test_failure_leaves_client_reconnectable() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);

    assert!(client.dispatch_blocking().is_err());
    assert_eq!(
        client.publish("a", b"z", false, QoS::AtMostOnce),
        Err(Error::NotConnected)
    );

    wire.push(&CONNACK_OK);
    client.connect(true).unwrap();
    wire.clear_written();
    client.publish("a", b"z", false, QoS::AtMostOnce).unwrap();
    assert_eq!(wire.written(), [0x30, 0x04, 0x00, 0x01, 0x61, 0x7A]);
}

#[test]
fn test_validation_errors_keep_the_connection() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);

    assert_eq!(
        client
            .session_mut()
            .set_last_will("", b"offline", false, QoS::AtMostOnce),
        Err(ValidationError::EmptyTopic)
    );
    assert!(client.subscribe("a", QoS::AtMostOnce).unwrap_err().is_validation());
    assert!(client.is_connected());
    assert!(!wire.closed());
}

#[test]
fn test_will_with_qos2_is_accepted() {
    let wire = Wire::new();
    wire.push(&CONNACK_OK);
    let mut client: Client<'_, MockNetwork> = Client::new(MockNetwork::new(&wire), options());
    client
        .session_mut()
        .set_last_will("t", b"", false, QoS::ExactlyOnce)
        .unwrap();

    client.connect(true).unwrap();
    // will flag, will QoS 2, clean session
    assert_eq!(wire.written()[9], 0x04 | 0x10 | 0x02);
}

#[test]
fn test_packet_ids_restart_on_reconnect() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    wire.push(&[0x40, 0x02, 0x00, 0x01]);
    client.publish("a", b"z", false, QoS::AtLeastOnce).unwrap();
    assert_eq!(&wire.written()[5..7], &[0x00, 0x01]);
    client.disconnect().unwrap();

    wire.push(&CONNACK_OK);
    client.connect(true).unwrap();
    assert_eq!(client.session().last_packet_id(), 0);
    wire.clear_written();
    wire.push(&[0x40, 0x02, 0x00, 0x01]);
    client.publish("a", b"z", false, QoS::AtLeastOnce).unwrap();

    assert_eq!(&wire.written()[5..7], &[0x00, 0x01]);
    assert_eq!(wire.pending(), 0);
}

#[test]
fn test_packet_ids_restart_after_failed_connection() {
    let wire = Wire::new();
    let mut client: Client<'_, MockNetwork> = connected(&wire);
    // never acknowledged: end of stream tears the connection down
    assert!(client.publish("a", b"z", false, QoS::AtLeastOnce).is_err());
    assert_eq!(client.session().last_packet_id(), 1);

    wire.push(&CONNACK_OK);
    client.connect(true).unwrap();
    wire.clear_written();
    wire.push(&[0x40, 0x02, 0x00, 0x01]);
    client.publish("a", b"z", false, QoS::AtLeastOnce).unwrap();
    assert_eq!(&wire.written()[5..7], &[0x00, 0x01]);
}
