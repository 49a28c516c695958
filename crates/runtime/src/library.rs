//! Boundary to the external session state machine.
//!
//! The host never implements the secure session protocol itself. A
//! [`SessionLibrary`] parses connect tokens into [`SessionHandle`]s, and the
//! session actor drives each handle with simulated time.

use thiserror::Error;

/// Errors reported by a session library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
	/// The connect token could not be parsed.
	#[error("invalid connect token: {0}")]
	InvalidToken(String),

	/// The client for a valid token could not be created.
	#[error("failed to open client: {0}")]
	Open(String),

	/// The packet can never be sent (for example it is too large).
	#[error("packet rejected: {0}")]
	PacketRejected(String),

	/// The packet could not be sent right now.
	#[error("send failed: {0}")]
	Send(String),

	#[error("receive failed: {0}")]
	Receive(String),
}

/// Client state reported by the session library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
	ConnectTokenExpired,
	InvalidConnectToken,
	ConnectionTimedOut,
	ConnectionResponseTimedOut,
	ConnectionRequestTimedOut,
	ConnectionDenied,
	#[default]
	Disconnected,
	SendingConnectionRequest,
	SendingConnectionResponse,
	Connected,
	/// A state the adapter could not map.
	Unknown,
}

impl SessionState {
	/// Label sent to the extension in state replies and events.
	pub fn label(self) -> &'static str {
		match self {
			SessionState::Connected => "connected",
			SessionState::ConnectionDenied => "connectionDenied",
			SessionState::ConnectionRequestTimedOut => "connectionRequestTimeout",
			SessionState::ConnectionResponseTimedOut => "connectionResponseTimeout",
			SessionState::ConnectionTimedOut => "connectionTimedOut",
			SessionState::ConnectTokenExpired => "connectTokenExpired",
			SessionState::Disconnected => "disconnected",
			SessionState::InvalidConnectToken => "invalidConnectToken",
			SessionState::SendingConnectionRequest => "sendingConnectionRequest",
			SessionState::SendingConnectionResponse => "sendingConnectionResponse",
			SessionState::Unknown => "unknown",
		}
	}

	/// Returns true for states a handle never leaves on its own.
	///
	/// Handles that reach one of these are released so that a fresh connect
	/// token can start over.
	pub fn is_terminal(self) -> bool {
		matches!(
			self,
			SessionState::ConnectTokenExpired
				| SessionState::InvalidConnectToken
				| SessionState::ConnectionTimedOut
				| SessionState::ConnectionResponseTimedOut
				| SessionState::ConnectionRequestTimedOut
				| SessionState::ConnectionDenied
				| SessionState::Disconnected
		)
	}
}

/// One client connection owned by a session actor.
pub trait SessionHandle: Send {
	/// Advances the client to `time` seconds of simulated time.
	fn step(&mut self, time: f64);

	fn state(&self) -> SessionState;

	fn send(&mut self, packet: &[u8]) -> Result<(), LibraryError>;

	/// Returns the next pending inbound packet, or `None` when drained.
	fn receive(&mut self) -> Result<Option<Vec<u8>>, LibraryError>;

	fn close(&mut self);
}

/// Factory for session handles.
pub trait SessionLibrary: Send + Sync {
	/// Parses `token` and starts connecting.
	fn open(&self, token: &[u8]) -> Result<Box<dyn SessionHandle>, LibraryError>;
}
