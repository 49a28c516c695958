//! Typed protocol messages.
//!
//! Each type code maps to exactly one [`Message`] variant with a fixed
//! payload shape. Binary payloads (connect tokens and packets) travel as
//! standard base64 strings and are decoded here.

#[cfg(test)]
mod tests;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::envelope::{Envelope, Scalar};
use crate::error::PayloadError;

/// Identifier of a live session, allocated by the host.
pub type SessionId = i64;

/// Message type codes.
pub mod kind {
	pub const CREATE_SESSION: i64 = 101;
	pub const SET_TICK_RATE: i64 = 102;
	pub const CONNECT_SESSION: i64 = 103;
	pub const SEND_PACKET: i64 = 104;
	pub const PACKET_RECEIVED: i64 = 105;
	pub const GET_SESSION_STATE: i64 = 106;
	pub const DESTROY_SESSION: i64 = 107;
	pub const SESSION_DESTROYED: i64 = 108;
	pub const CHECK_PRESENCE: i64 = 109;
	pub const SESSION_STATE_CHANGED: i64 = 110;

	pub const SESSION_CREATED: i64 = 201;
	pub const SUCCESS: i64 = 202;
	pub const ERROR: i64 = 203;
	pub const INTERNAL_ERROR: i64 = 204;

	/// Returns true for codes the extension may send to the host.
	pub fn is_request(code: i64) -> bool {
		matches!(
			code,
			CREATE_SESSION
				| SET_TICK_RATE
				| CONNECT_SESSION
				| SEND_PACKET
				| GET_SESSION_STATE
				| DESTROY_SESSION
				| CHECK_PRESENCE
		)
	}
}

/// Every message the host reads or writes.
///
/// Requests and replies carry a correlation `id`. Events (`PacketReceived`,
/// `SessionDestroyed`, `SessionStateChanged`) put the session id in the same
/// slot instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
	CreateSession {
		id: i64,
	},
	SetTickRate {
		id: i64,
		session_id: SessionId,
		rate: i64,
	},
	ConnectSession {
		id: i64,
		session_id: SessionId,
		token: Vec<u8>,
	},
	SendPacket {
		id: i64,
		session_id: SessionId,
		data: Vec<u8>,
	},
	PacketReceived {
		session_id: SessionId,
		data: Vec<u8>,
	},
	GetSessionState {
		id: i64,
		session_id: SessionId,
	},
	DestroySession {
		id: i64,
		session_id: SessionId,
	},
	SessionDestroyed {
		session_id: SessionId,
	},
	CheckPresence {
		id: i64,
	},
	SessionStateChanged {
		session_id: SessionId,
		state: String,
	},
	SessionCreated {
		id: i64,
		session_id: SessionId,
	},
	/// Generic success reply, optionally carrying one string value.
	Success {
		id: i64,
		value: Option<String>,
	},
	Error {
		id: i64,
		message: String,
	},
	InternalError {
		id: i64,
		message: String,
	},
}

impl Message {
	/// Empty success reply.
	pub fn ok(id: i64) -> Self {
		Message::Success { id, value: None }
	}

	/// Type code written on the wire.
	pub fn kind(&self) -> i64 {
		match self {
			Message::CreateSession { .. } => kind::CREATE_SESSION,
			Message::SetTickRate { .. } => kind::SET_TICK_RATE,
			Message::ConnectSession { .. } => kind::CONNECT_SESSION,
			Message::SendPacket { .. } => kind::SEND_PACKET,
			Message::PacketReceived { .. } => kind::PACKET_RECEIVED,
			Message::GetSessionState { .. } => kind::GET_SESSION_STATE,
			Message::DestroySession { .. } => kind::DESTROY_SESSION,
			Message::SessionDestroyed { .. } => kind::SESSION_DESTROYED,
			Message::CheckPresence { .. } => kind::CHECK_PRESENCE,
			Message::SessionStateChanged { .. } => kind::SESSION_STATE_CHANGED,
			Message::SessionCreated { .. } => kind::SESSION_CREATED,
			Message::Success { .. } => kind::SUCCESS,
			Message::Error { .. } => kind::ERROR,
			Message::InternalError { .. } => kind::INTERNAL_ERROR,
		}
	}

	/// Value of the wire `id` slot: correlation id or, for events, session id.
	pub fn id(&self) -> i64 {
		match self {
			Message::CreateSession { id }
			| Message::SetTickRate { id, .. }
			| Message::ConnectSession { id, .. }
			| Message::SendPacket { id, .. }
			| Message::GetSessionState { id, .. }
			| Message::DestroySession { id, .. }
			| Message::CheckPresence { id }
			| Message::SessionCreated { id, .. }
			| Message::Success { id, .. }
			| Message::Error { id, .. }
			| Message::InternalError { id, .. } => *id,
			Message::PacketReceived { session_id, .. }
			| Message::SessionDestroyed { session_id }
			| Message::SessionStateChanged { session_id, .. } => *session_id,
		}
	}

	/// Returns true for unsolicited session events.
	pub fn is_event(&self) -> bool {
		matches!(
			self,
			Message::PacketReceived { .. }
				| Message::SessionDestroyed { .. }
				| Message::SessionStateChanged { .. }
		)
	}

	pub fn into_envelope(self) -> Envelope {
		let kind = self.kind();
		let id = self.id();
		let payload = match self {
			Message::CreateSession { .. }
			| Message::CheckPresence { .. }
			| Message::SessionDestroyed { .. } => vec![],
			Message::SetTickRate {
				session_id, rate, ..
			} => vec![Scalar::Int(session_id), Scalar::Int(rate)],
			Message::ConnectSession {
				session_id, token, ..
			} => vec![Scalar::Int(session_id), Scalar::Str(STANDARD.encode(token))],
			Message::SendPacket {
				session_id, data, ..
			} => vec![Scalar::Int(session_id), Scalar::Str(STANDARD.encode(data))],
			Message::PacketReceived { data, .. } => vec![Scalar::Str(STANDARD.encode(data))],
			Message::GetSessionState { session_id, .. }
			| Message::DestroySession { session_id, .. }
			| Message::SessionCreated { session_id, .. } => vec![Scalar::Int(session_id)],
			Message::SessionStateChanged { state, .. } => vec![Scalar::Str(state)],
			Message::Success { value, .. } => value.into_iter().map(Scalar::Str).collect(),
			Message::Error { message, .. } | Message::InternalError { message, .. } => {
				vec![Scalar::Str(message)]
			}
		};
		Envelope::new(kind, id, payload)
	}
}

impl TryFrom<Envelope> for Message {
	type Error = PayloadError;

	fn try_from(envelope: Envelope) -> Result<Self, PayloadError> {
		let Envelope {
			kind: code,
			id,
			payload,
		} = envelope;
		let fields = Fields {
			kind: code,
			payload,
		};

		let message = match code {
			kind::CREATE_SESSION => {
				fields.expect(0)?;
				Message::CreateSession { id }
			}
			kind::SET_TICK_RATE => {
				fields.expect(2)?;
				Message::SetTickRate {
					id,
					session_id: fields.int(0)?,
					rate: fields.int(1)?,
				}
			}
			kind::CONNECT_SESSION => {
				fields.expect(2)?;
				Message::ConnectSession {
					id,
					session_id: fields.int(0)?,
					token: fields.base64(1)?,
				}
			}
			kind::SEND_PACKET => {
				fields.expect(2)?;
				Message::SendPacket {
					id,
					session_id: fields.int(0)?,
					data: fields.base64(1)?,
				}
			}
			kind::PACKET_RECEIVED => {
				fields.expect(1)?;
				Message::PacketReceived {
					session_id: id,
					data: fields.base64(0)?,
				}
			}
			kind::GET_SESSION_STATE => {
				fields.expect(1)?;
				Message::GetSessionState {
					id,
					session_id: fields.int(0)?,
				}
			}
			kind::DESTROY_SESSION => {
				fields.expect(1)?;
				Message::DestroySession {
					id,
					session_id: fields.int(0)?,
				}
			}
			kind::SESSION_DESTROYED => {
				fields.expect(0)?;
				Message::SessionDestroyed { session_id: id }
			}
			kind::CHECK_PRESENCE => {
				fields.expect(0)?;
				Message::CheckPresence { id }
			}
			kind::SESSION_STATE_CHANGED => {
				fields.expect(1)?;
				Message::SessionStateChanged {
					session_id: id,
					state: fields.string(0)?,
				}
			}
			kind::SESSION_CREATED => {
				fields.expect(1)?;
				Message::SessionCreated {
					id,
					session_id: fields.int(0)?,
				}
			}
			kind::SUCCESS => {
				let value = match fields.payload.len() {
					0 => None,
					_ => {
						fields.expect(1)?;
						Some(fields.string(0)?)
					}
				};
				Message::Success { id, value }
			}
			kind::ERROR => {
				fields.expect(1)?;
				Message::Error {
					id,
					message: fields.string(0)?,
				}
			}
			kind::INTERNAL_ERROR => {
				fields.expect(1)?;
				Message::InternalError {
					id,
					message: fields.string(0)?,
				}
			}
			other => return Err(PayloadError::UnknownType(other)),
		};

		Ok(message)
	}
}

/// Payload accessor that reports errors against the message type.
struct Fields {
	kind: i64,
	payload: Vec<Scalar>,
}

impl Fields {
	fn expect(&self, expected: usize) -> Result<(), PayloadError> {
		if self.payload.len() == expected {
			Ok(())
		} else {
			Err(PayloadError::Arity {
				kind: self.kind,
				expected,
				actual: self.payload.len(),
			})
		}
	}

	fn int(&self, index: usize) -> Result<i64, PayloadError> {
		self.payload[index]
			.as_int()
			.ok_or(PayloadError::ElementType {
				kind: self.kind,
				index,
				expected: "an integer",
			})
	}

	fn string(&self, index: usize) -> Result<String, PayloadError> {
		self.payload[index]
			.as_str()
			.map(str::to_string)
			.ok_or(PayloadError::ElementType {
				kind: self.kind,
				index,
				expected: "a string",
			})
	}

	fn base64(&self, index: usize) -> Result<Vec<u8>, PayloadError> {
		let text = self.payload[index]
			.as_str()
			.ok_or(PayloadError::ElementType {
				kind: self.kind,
				index,
				expected: "a base64 string",
			})?;
		STANDARD.decode(text).map_err(|_| PayloadError::Base64 {
			kind: self.kind,
			index,
		})
	}
}
