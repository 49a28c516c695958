//! Wire protocol for the netcode.io native-messaging host.
//!
//! Every message crossing stdin/stdout is a frame: a 4-byte little-endian
//! length followed by a JSON array `[type, id, ...payload]`.
//!
//! - [`Envelope`] is the untyped frame content, with payload elements
//!   normalized to [`Scalar`] integers and strings.
//! - [`Message`] is the closed set of typed messages, one variant per type
//!   code. Conversion from an envelope validates the payload shape.
//!
//! The `id` slot means different things by type: requests carry a caller
//! chosen correlation id that replies echo back, while unsolicited session
//! events carry the session id there instead.

pub mod envelope;
pub mod error;
pub mod message;

pub use envelope::{Envelope, LENGTH_PREFIX_SIZE, Scalar};
pub use error::{CodecError, PayloadError};
pub use message::{Message, SessionId, kind};

/// Version string reported in reply to a presence check.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Largest frame body accepted from the extension.
pub const DEFAULT_MAX_INBOUND_FRAME: usize = 64 * 1024 * 1024;

/// Largest frame body the browser accepts from a native host.
pub const DEFAULT_MAX_OUTBOUND_FRAME: usize = 1024 * 1024;
