//! In-memory session library for tests.
//!
//! [`FakeLibrary`] hands out handles whose state is driven from the test
//! through the matching [`FakeRemote`]. Each remote records every step, every
//! sent packet and whether the handle was closed.
//!
//! ```ignore
//! let library = Arc::new(FakeLibrary::connecting_after(2));
//! // ... drive a dispatcher with `library`
//! let remote = library.remote(0).unwrap();
//! remote.push_inbound(b"hello".to_vec());
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::library::{LibraryError, SessionHandle, SessionLibrary, SessionState};

/// Token that [`FakeLibrary::open`] refuses to parse.
pub const INVALID_TOKEN: &[u8] = b"invalid";

/// Session library that records the handles it opens.
#[derive(Default)]
pub struct FakeLibrary {
	remotes: Mutex<Vec<FakeRemote>>,
	connect_after: Option<usize>,
}

impl FakeLibrary {
	/// Handles stay in `sendingConnectionRequest` until the test moves them.
	pub fn new() -> Self {
		Self::default()
	}

	/// Handles become connected once they have been stepped `steps` times.
	pub fn connecting_after(steps: usize) -> Self {
		Self {
			remotes: Mutex::new(Vec::new()),
			connect_after: Some(steps),
		}
	}

	/// Remote for the `index`th handle opened, in open order.
	pub fn remote(&self, index: usize) -> Option<FakeRemote> {
		self.remotes.lock().get(index).cloned()
	}

	pub fn opened(&self) -> usize {
		self.remotes.lock().len()
	}
}

impl SessionLibrary for FakeLibrary {
	fn open(&self, token: &[u8]) -> Result<Box<dyn SessionHandle>, LibraryError> {
		if token == INVALID_TOKEN {
			return Err(LibraryError::InvalidToken("unparseable token".to_string()));
		}

		let remote = FakeRemote {
			inner: Arc::new(Mutex::new(RemoteState {
				state: SessionState::SendingConnectionRequest,
				token: token.to_vec(),
				connect_after: self.connect_after,
				..RemoteState::default()
			})),
		};
		self.remotes.lock().push(remote.clone());

		Ok(Box::new(FakeHandle { remote }))
	}
}

#[derive(Default)]
struct RemoteState {
	state: SessionState,
	token: Vec<u8>,
	connect_after: Option<usize>,
	steps: Vec<f64>,
	sent: Vec<Vec<u8>>,
	inbound: VecDeque<Vec<u8>>,
	send_failures: usize,
	max_packet: Option<usize>,
	closed: bool,
}

/// Test-side view of one opened handle.
#[derive(Clone)]
pub struct FakeRemote {
	inner: Arc<Mutex<RemoteState>>,
}

impl FakeRemote {
	pub fn set_state(&self, state: SessionState) {
		self.inner.lock().state = state;
	}

	/// Queues a packet the handle will return from `receive`.
	pub fn push_inbound(&self, packet: Vec<u8>) {
		self.inner.lock().inbound.push_back(packet);
	}

	/// The next `count` sends fail with a transient error.
	pub fn fail_next_sends(&self, count: usize) {
		self.inner.lock().send_failures = count;
	}

	/// Sends of packets larger than `len` are rejected outright.
	pub fn reject_larger_than(&self, len: usize) {
		self.inner.lock().max_packet = Some(len);
	}

	pub fn token(&self) -> Vec<u8> {
		self.inner.lock().token.clone()
	}

	pub fn sent(&self) -> Vec<Vec<u8>> {
		self.inner.lock().sent.clone()
	}

	/// Times passed to `step`, in call order.
	pub fn steps(&self) -> Vec<f64> {
		self.inner.lock().steps.clone()
	}

	pub fn is_closed(&self) -> bool {
		self.inner.lock().closed
	}
}

struct FakeHandle {
	remote: FakeRemote,
}

impl SessionHandle for FakeHandle {
	fn step(&mut self, time: f64) {
		let mut inner = self.remote.inner.lock();
		inner.steps.push(time);
		if inner.state == SessionState::SendingConnectionRequest
			&& inner.connect_after.is_some_and(|n| inner.steps.len() >= n)
		{
			inner.state = SessionState::Connected;
		}
	}

	fn state(&self) -> SessionState {
		self.remote.inner.lock().state
	}

	fn send(&mut self, packet: &[u8]) -> Result<(), LibraryError> {
		let mut inner = self.remote.inner.lock();
		if inner.max_packet.is_some_and(|max| packet.len() > max) {
			return Err(LibraryError::PacketRejected(format!(
				"{} byte packet is too large",
				packet.len()
			)));
		}
		if inner.send_failures > 0 {
			inner.send_failures -= 1;
			return Err(LibraryError::Send("socket busy".to_string()));
		}
		inner.sent.push(packet.to_vec());
		Ok(())
	}

	fn receive(&mut self) -> Result<Option<Vec<u8>>, LibraryError> {
		Ok(self.remote.inner.lock().inbound.pop_front())
	}

	fn close(&mut self) {
		self.remote.inner.lock().closed = true;
	}
}
