use super::*;

fn envelope(kind: i64, id: i64, payload: Vec<Scalar>) -> Envelope {
	Envelope::new(kind, id, payload)
}

#[test]
fn test_connect_request_decodes_token() {
	let message = Message::try_from(envelope(
		kind::CONNECT_SESSION,
		11,
		vec![Scalar::Int(77), Scalar::from("dG9rZW4=")],
	))
	.unwrap();

	assert_eq!(
		message,
		Message::ConnectSession {
			id: 11,
			session_id: 77,
			token: b"token".to_vec(),
		}
	);
}

#[test]
fn test_invalid_base64_is_payload_error() {
	let err = Message::try_from(envelope(
		kind::SEND_PACKET,
		1,
		vec![Scalar::Int(5), Scalar::from("not base64!")],
	))
	.unwrap_err();

	assert_eq!(err, PayloadError::Base64 { kind: 104, index: 1 });
	assert_eq!(
		err.to_string(),
		"invalid payload for message type 104: element 1 is not valid base64"
	);
}

#[test]
fn test_wrong_arity_is_payload_error() {
	let err = Message::try_from(envelope(kind::SET_TICK_RATE, 2, vec![Scalar::Int(5)])).unwrap_err();

	assert_eq!(
		err,
		PayloadError::Arity {
			kind: 102,
			expected: 2,
			actual: 1,
		}
	);
}

#[test]
fn test_wrong_element_type_is_payload_error() {
	let err = Message::try_from(envelope(
		kind::DESTROY_SESSION,
		2,
		vec![Scalar::from("five")],
	))
	.unwrap_err();

	assert!(matches!(
		err,
		PayloadError::ElementType {
			kind: 107,
			index: 0,
			..
		}
	));
}

#[test]
fn test_unknown_type() {
	let err = Message::try_from(envelope(150, 3, vec![])).unwrap_err();
	assert_eq!(err, PayloadError::UnknownType(150));
	assert_eq!(err.to_string(), "unknown message type: 150");
	assert_eq!(err.kind(), 150);
}

#[test]
fn test_only_request_codes_are_requests() {
	for code in [101, 102, 103, 104, 106, 107, 109] {
		assert!(kind::is_request(code), "{code} should be a request");
	}
	for code in [105, 108, 110, 201, 202, 203, 204, 0, 150] {
		assert!(!kind::is_request(code), "{code} should not be a request");
	}
}

#[test]
fn test_events_carry_session_id_in_id_slot() {
	let changed = Message::SessionStateChanged {
		session_id: 4242,
		state: "connected".to_string(),
	};
	assert!(changed.is_event());
	assert_eq!(
		changed.into_envelope(),
		envelope(110, 4242, vec![Scalar::from("connected")])
	);

	let received = Message::PacketReceived {
		session_id: 4242,
		data: vec![1, 2, 3],
	};
	assert_eq!(
		received.into_envelope(),
		envelope(105, 4242, vec![Scalar::from("AQID")])
	);

	let destroyed = Message::SessionDestroyed { session_id: 4242 };
	assert_eq!(destroyed.into_envelope(), envelope(108, 4242, vec![]));
}

#[test]
fn test_replies_echo_correlation_id() {
	let created = Message::SessionCreated {
		id: 8,
		session_id: 99,
	};
	assert!(!created.is_event());
	assert_eq!(created.id(), 8);
	assert_eq!(created.into_envelope(), envelope(201, 8, vec![Scalar::Int(99)]));

	assert_eq!(Message::ok(5).into_envelope(), envelope(202, 5, vec![]));

	let version = Message::Success {
		id: 7,
		value: Some("0.1.0".to_string()),
	};
	assert_eq!(version.into_envelope(), envelope(202, 7, vec![Scalar::from("0.1.0")]));
}

#[test]
fn test_success_reply_optional_value() {
	let bare = Message::try_from(envelope(kind::SUCCESS, 1, vec![])).unwrap();
	assert_eq!(bare, Message::ok(1));

	let labelled = Message::try_from(envelope(kind::SUCCESS, 1, vec![Scalar::from("connected")])).unwrap();
	assert_eq!(
		labelled,
		Message::Success {
			id: 1,
			value: Some("connected".to_string()),
		}
	);

	let err = Message::try_from(envelope(
		kind::SUCCESS,
		1,
		vec![Scalar::from("a"), Scalar::from("b")],
	))
	.unwrap_err();
	assert!(matches!(err, PayloadError::Arity { expected: 1, actual: 2, .. }));
}

#[test]
fn test_request_survives_envelope_conversion() {
	let request = Message::SendPacket {
		id: 3,
		session_id: 12,
		data: vec![0xde, 0xad, 0xbe, 0xef],
	};
	let decoded = Message::try_from(request.clone().into_envelope()).unwrap();
	assert_eq!(decoded, request);
}
