use super::mock::{CONNACK_OK, Inbox, MockNetwork, Wire, options};
use futures::executor::block_on;
use picomqtt::network::application::mqtt::{
    AsyncClient, Error, ProtocolError, QoS, State, Unsupported,
};
use picomqtt::network::error::Error as NetworkError;

#[test]
fn test_async_handshake_and_publish() {
    block_on(async {
        let wire = Wire::new();
        wire.push(&CONNACK_OK);
        let mut client: AsyncClient<'_, MockNetwork> =
            AsyncClient::new(MockNetwork::new(&wire), options());

        assert_eq!(client.connect(true).await, Ok(false));
        assert_eq!(&wire.written()[..2], &[0x10, 0x0E]);
        wire.clear_written();

        client.publish("a", b"z", false, QoS::AtMostOnce).await.unwrap();
        assert_eq!(wire.written(), [0x30, 0x04, 0x00, 0x01, 0x61, 0x7A]);

        client.disconnect().await.unwrap();
        assert!(wire.closed());
        assert_eq!(client.state(), State::Disconnected);
    });
}

#[test]
fn test_async_qos1_with_interleaved_publish() {
    block_on(async {
        let wire = Wire::new();
        let mut inbox = Inbox::default();
        let seen = inbox.clone();
        wire.push(&CONNACK_OK);
        let mut client: AsyncClient<'_, MockNetwork> =
            AsyncClient::new(MockNetwork::new(&wire), options());
        client.session_mut().set_callback(&mut inbox);
        client.connect(true).await.unwrap();
        wire.clear_written();

        wire.push(&[0x32, 0x07, 0x00, 0x01, b'b', 0x00, 0x05, b'h', b'i']);
        wire.push(&[0x40, 0x02, 0x00, 0x02]);
        wire.push(&[0x40, 0x02, 0x00, 0x01]);
        client.publish("a", b"z", false, QoS::AtLeastOnce).await.unwrap();

        assert_eq!(seen.messages(), [("b".to_string(), b"hi".to_vec())]);
        assert!(wire.written().ends_with(&[0x40, 0x02, 0x00, 0x05]));
        assert_eq!(wire.pending(), 0);
    });
}

#[test]
fn test_async_subscribe_and_dispatch() {
    block_on(async {
        let wire = Wire::new();
        let mut inbox = Inbox::default();
        let seen = inbox.clone();
        wire.push(&CONNACK_OK);
        let mut client: AsyncClient<'_, MockNetwork> =
            AsyncClient::new(MockNetwork::new(&wire), options());
        client.session_mut().set_callback(&mut inbox);
        client.connect(true).await.unwrap();

        wire.push(&[0x90, 0x03, 0x00, 0x01, 0x00]);
        client.subscribe("a", QoS::AtMostOnce).await.unwrap();

        assert_eq!(client.poll_once().await, Ok(None));
        wire.push(&[0x30, 0x05, 0x00, 0x01, 0x61, 0x7A, 0x7A]);
        wire.push(&[0xD0, 0x00]);
        assert_eq!(client.poll_once().await, Ok(Some(0x30)));
        assert_eq!(client.dispatch().await, Ok(None));
        assert_eq!(seen.messages(), [("a".to_string(), b"zz".to_vec())]);
    });
}

#[test]
fn test_async_errors_tear_down() {
    block_on(async {
        let wire = Wire::new();
        wire.push(&[0x20, 0x02, 0x00, 0x04]);
        let mut client: AsyncClient<'_, MockNetwork> =
            AsyncClient::new(MockNetwork::new(&wire), options());
        assert!(matches!(
            client.connect(true).await,
            Err(Error::ConnectionRefused(_))
        ));
        assert!(wire.closed());

        wire.push(&CONNACK_OK);
        client.connect(true).await.unwrap();
        let refused = client.publish("a", b"z", false, QoS::ExactlyOnce).await;
        assert_eq!(refused, Err(Error::Unsupported(Unsupported::ExactlyOnce)));
        assert!(refused.unwrap_err().is_validation());
        assert!(client.is_connected());

        wire.push(&[0x40, 0x05]);
        assert_eq!(
            client.publish("a", b"z", false, QoS::AtLeastOnce).await,
            Err(Error::Protocol(ProtocolError::InvalidPubackLength(5)))
        );
        assert!(!client.is_connected());
        assert_eq!(client.ping().await, Err(Error::NotConnected));
        assert_eq!(client.disconnect().await, Ok(()));
    });
}

#[test]
fn test_async_disconnect_closes_even_when_write_fails() {
    block_on(async {
        let wire = Wire::new();
        wire.push(&CONNACK_OK);
        let mut client: AsyncClient<'_, MockNetwork> =
            AsyncClient::new(MockNetwork::new(&wire), options());
        client.connect(true).await.unwrap();
        wire.fail_writes(true);

        assert_eq!(
            client.disconnect().await,
            Err(Error::Transport(NetworkError::WriteError))
        );
        assert!(wire.closed());
    });
}

#[test]
fn test_async_packet_ids_restart_on_reconnect() {
    block_on(async {
        let wire = Wire::new();
        wire.push(&CONNACK_OK);
        let mut client: AsyncClient<'_, MockNetwork> =
            AsyncClient::new(MockNetwork::new(&wire), options());
        client.connect(true).await.unwrap();
        wire.push(&[0x40, 0x02, 0x00, 0x01]);
        client.publish("a", b"z", false, QoS::AtLeastOnce).await.unwrap();
        client.disconnect().await.unwrap();

        wire.push(&CONNACK_OK);
        client.connect(true).await.unwrap();
        wire.clear_written();
        wire.push(&[0x40, 0x02, 0x00, 0x01]);
        client.publish("a", b"z", false, QoS::AtLeastOnce).await.unwrap();

        assert_eq!(&wire.written()[5..7], &[0x00, 0x01]);
        assert_eq!(client.session().last_packet_id(), 1);
    });
}

#[test]
fn test_async_read_timeout_is_reported_as_timeout() {
    block_on(async {
        let wire = Wire::new();
        wire.push(&CONNACK_OK);
        let mut client: AsyncClient<'_, MockNetwork> =
            AsyncClient::new(MockNetwork::new(&wire), options());
        client.connect(true).await.unwrap();
        wire.fail_reads(Some(NetworkError::Timeout));

        assert_eq!(
            client.dispatch().await,
            Err(Error::Transport(NetworkError::Timeout))
        );
        assert!(wire.closed());
    });
}
