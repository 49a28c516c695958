//! Untyped frame content and its JSON encoding.


use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

use crate::error::CodecError;

/// Size of the little-endian length prefix in front of every frame body.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// A payload element. The protocol only carries integers and strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
	Int(i64),
	Str(String),
}

impl Scalar {
	/// Converts a JSON value, normalizing every number to an integer.
	///
	/// Fractional numbers are truncated toward zero. Returns `None` for
	/// arrays, objects, booleans and null.
	pub fn from_json(value: Value) -> Option<Self> {
		match value {
			Value::Number(number) => Some(Scalar::Int(normalize_number(&number))),
			Value::String(text) => Some(Scalar::Str(text)),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Scalar::Int(value) => Some(*value),
			Scalar::Str(_) => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Scalar::Str(value) => Some(value),
			Scalar::Int(_) => None,
		}
	}
}

impl From<i64> for Scalar {
	fn from(value: i64) -> Self {
		Scalar::Int(value)
	}
}

impl From<String> for Scalar {
	fn from(value: String) -> Self {
		Scalar::Str(value)
	}
}

impl From<&str> for Scalar {
	fn from(value: &str) -> Self {
		Scalar::Str(value.to_string())
	}
}

fn normalize_number(number: &Number) -> i64 {
	if let Some(value) = number.as_i64() {
		return value;
	}
	if let Some(value) = number.as_u64() {
		return i64::try_from(value).unwrap_or(i64::MAX);
	}
	// `as` truncates toward zero and saturates at the i64 bounds
	number.as_f64().unwrap_or_default() as i64
}

/// The `[type, id, ...payload]` array carried by one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
	/// Message type code.
	pub kind: i64,
	/// Correlation id for requests and replies, session id for events.
	pub id: i64,
	pub payload: Vec<Scalar>,
}

impl Envelope {
	pub fn new(kind: i64, id: i64, payload: Vec<Scalar>) -> Self {
		Self { kind, id, payload }
	}

	/// Parses a frame body (without its length prefix).
	pub fn decode(body: &[u8]) -> Result<Self, CodecError> {
		let value: Value = serde_json::from_slice(body)
			.map_err(|e| CodecError::Decoding(format!("malformed JSON: {e}")))?;

		let Value::Array(items) = value else {
			return Err(CodecError::Decoding(
				"message is not a JSON array".to_string(),
			));
		};

		if items.len() < 2 {
			return Err(CodecError::Decoding(format!(
				"message array has {} elements, expected at least 2",
				items.len()
			)));
		}

		let mut scalars = Vec::with_capacity(items.len());
		for (index, item) in items.into_iter().enumerate() {
			let scalar = Scalar::from_json(item).ok_or_else(|| {
				CodecError::Decoding(format!("element {index} is not an integer or string"))
			})?;
			scalars.push(scalar);
		}

		let mut scalars = scalars.into_iter();
		let kind = header_int(scalars.next(), "type")?;
		let id = header_int(scalars.next(), "id")?;

		Ok(Self {
			kind,
			id,
			payload: scalars.collect(),
		})
	}

	/// Serializes the envelope into a complete frame, length prefix included.
	///
	/// Fails when the JSON body is larger than `max_body` bytes.
	pub fn encode(&self, max_body: usize) -> Result<Vec<u8>, CodecError> {
		let body = serde_json::to_vec(self).map_err(|e| CodecError::Encoding(e.to_string()))?;

		if body.len() > max_body {
			return Err(CodecError::Encoding(format!(
				"message body of {} bytes exceeds the {max_body} byte limit",
				body.len()
			)));
		}

		let length = u32::try_from(body.len()).map_err(|_| {
			CodecError::Encoding(format!(
				"message body of {} bytes does not fit a length prefix",
				body.len()
			))
		})?;

		let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + body.len());
		frame.extend_from_slice(&length.to_le_bytes());
		frame.extend_from_slice(&body);
		Ok(frame)
	}
}

fn header_int(scalar: Option<Scalar>, field: &str) -> Result<i64, CodecError> {
	scalar
		.and_then(|s| s.as_int())
		.ok_or_else(|| CodecError::Decoding(format!("message {field} must be an integer")))
}

impl Serialize for Envelope {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut seq = serializer.serialize_seq(Some(2 + self.payload.len()))?;
		seq.serialize_element(&self.kind)?;
		seq.serialize_element(&self.id)?;
		for value in &self.payload {
			seq.serialize_element(value)?;
		}
		seq.end()
	}
}
