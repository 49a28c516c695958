//! Error types for frame coding and payload validation.

use thiserror::Error;

/// Errors raised while moving frames across the byte stream.
///
/// Framing and decoding errors leave the stream in an unknown position, so
/// readers treat them as fatal.
#[derive(Debug, Error)]
pub enum CodecError {
	/// Short read, truncated frame, or an unusable length prefix.
	#[error("framing error: {0}")]
	Framing(String),

	/// The frame body is not a well-formed message array.
	#[error("decoding error: {0}")]
	Decoding(String),

	/// The message could not be turned into a frame.
	#[error("encoding error: {0}")]
	Encoding(String),

	/// Underlying stream failure.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

/// A well-formed envelope whose payload does not fit its message type.
///
/// The frame boundary is intact when this is raised, so the request can be
/// answered with an error reply instead of ending the stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
	#[error("unknown message type: {0}")]
	UnknownType(i64),

	#[error("invalid payload for message type {kind}: expected {expected} elements, got {actual}")]
	Arity {
		kind: i64,
		expected: usize,
		actual: usize,
	},

	#[error("invalid payload for message type {kind}: element {index} must be {expected}")]
	ElementType {
		kind: i64,
		index: usize,
		expected: &'static str,
	},

	#[error("invalid payload for message type {kind}: element {index} is not valid base64")]
	Base64 { kind: i64, index: usize },
}

impl PayloadError {
	/// Type code of the offending message.
	pub fn kind(&self) -> i64 {
		match self {
			PayloadError::UnknownType(kind)
			| PayloadError::Arity { kind, .. }
			| PayloadError::ElementType { kind, .. }
			| PayloadError::Base64 { kind, .. } => *kind,
		}
	}
}
