//! Session library backed by the `netcode` crate's UDP client.
//!
//! The client is driven by elapsed time and reports both state changes and
//! received payloads through `next_event`. Each step advances the client by
//! the time since the previous step, then pulls every pending event so the
//! state and the inbound queue are current when the session actor looks.


use std::collections::VecDeque;
use std::io::Cursor;

use nchost_runtime::{LibraryError, SessionHandle, SessionLibrary, SessionState};
use netcode::{ClientEvent, ClientState, ConnectToken, NETCODE_MAX_PAYLOAD_SIZE, UdpClient};
use tracing::{debug, warn};

/// Events pulled per step. A stopped client reports `Disconnected` on every
/// call, so the pump needs a bound besides `None`.
const MAX_EVENTS_PER_STEP: usize = 256;

/// Opens one UDP netcode.io client per connect token.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetcodeLibrary;

impl SessionLibrary for NetcodeLibrary {
	fn open(&self, token: &[u8]) -> Result<Box<dyn SessionHandle>, LibraryError> {
		let token = read_token(token)?;
		let client = UdpClient::new(&token).map_err(|e| LibraryError::Open(format!("{e:?}")))?;
		Ok(Box::new(NetcodeHandle {
			client,
			time: 0.0,
			inbound: VecDeque::new(),
		}))
	}
}

/// Parses a connect token. The client dials the first listed server, so a
/// token without one is rejected here.
fn read_token(bytes: &[u8]) -> Result<ConnectToken, LibraryError> {
	let token = ConnectToken::read(&mut Cursor::new(bytes))
		.map_err(|e| LibraryError::InvalidToken(format!("{e:?}")))?;
	if token.hosts.get().next().is_none() {
		return Err(LibraryError::InvalidToken("no server addresses".to_string()));
	}
	Ok(token)
}

fn session_state(state: ClientState) -> SessionState {
	match state {
		ClientState::ConnectionTimedOut => SessionState::ConnectionTimedOut,
		ClientState::ConnectionResponseTimedOut => SessionState::ConnectionResponseTimedOut,
		ClientState::ConnectionRequestTimedOut => SessionState::ConnectionRequestTimedOut,
		ClientState::ConnectionDenied => SessionState::ConnectionDenied,
		ClientState::Disconnected => SessionState::Disconnected,
		ClientState::SendingConnectionRequest => SessionState::SendingConnectionRequest,
		ClientState::SendingConnectionResponse => SessionState::SendingConnectionResponse,
		ClientState::Connected => SessionState::Connected,
	}
}

/// The client accepts payloads of 1 to `NETCODE_MAX_PAYLOAD_SIZE - 1` bytes.
fn check_payload(packet: &[u8]) -> Result<(), LibraryError> {
	if packet.is_empty() {
		return Err(LibraryError::PacketRejected("empty packet".to_string()));
	}
	if packet.len() >= NETCODE_MAX_PAYLOAD_SIZE {
		return Err(LibraryError::PacketRejected(format!(
			"{} byte packet exceeds the {} byte limit",
			packet.len(),
			NETCODE_MAX_PAYLOAD_SIZE - 1
		)));
	}
	Ok(())
}

struct NetcodeHandle {
	client: UdpClient,
	/// Simulated time already handed to the client.
	time: f64,
	inbound: VecDeque<Vec<u8>>,
}

impl NetcodeHandle {
	fn pump(&mut self) {
		let mut payload = [0; NETCODE_MAX_PAYLOAD_SIZE];
		for _ in 0..MAX_EVENTS_PER_STEP {
			match self.client.next_event(&mut payload) {
				Ok(Some(ClientEvent::Packet(len))) => {
					if let Some(data) = payload.get(..len) {
						self.inbound.push_back(data.to_vec());
					}
				}
				Ok(Some(ClientEvent::NewState(state))) => {
					debug!(target: "nchost.netcode", state = ?state, "client state changed");
					if matches!(state, ClientState::Disconnected) {
						break;
					}
				}
				Ok(Some(ClientEvent::SentKeepAlive)) => {}
				Ok(None) => break,
				Err(err) => {
					warn!(target: "nchost.netcode", error = ?err, "client update failed");
					break;
				}
			}
		}
	}
}

impl SessionHandle for NetcodeHandle {
	fn step(&mut self, time: f64) {
		let elapsed = time - self.time;
		if elapsed > 0.0 {
			self.client.update(elapsed);
			self.time = time;
		}
		self.pump();
	}

	fn state(&self) -> SessionState {
		session_state(self.client.get_state())
	}

	fn send(&mut self, packet: &[u8]) -> Result<(), LibraryError> {
		check_payload(packet)?;
		self.client
			.send(packet)
			.map(|_| ())
			.map_err(|e| LibraryError::Send(format!("{e:?}")))
	}

	fn receive(&mut self) -> Result<Option<Vec<u8>>, LibraryError> {
		Ok(self.inbound.pop_front())
	}

	fn close(&mut self) {
		if let Err(e) = self.client.disconnect() {
			debug!(target: "nchost.netcode", error = ?e, "disconnect failed");
		}
	}
}
