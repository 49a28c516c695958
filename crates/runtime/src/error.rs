//! Error types for the host runtime.

use nchost_protocol::{CodecError, SessionId};
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the host runtime.
#[derive(Debug, Error)]
pub enum Error {
	/// Frame-level failure on the byte stream.
	#[error("Transport error: {0}")]
	Transport(#[from] CodecError),

	/// The session actor has already exited and no longer reads its mailbox.
	#[error("Session {0} is no longer running")]
	SessionClosed(SessionId),

	/// A dispatcher task panicked or was aborted.
	#[error("Dispatcher task failed: {0}")]
	TaskFailed(String),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}
