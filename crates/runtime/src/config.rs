//! Tunables shared by the dispatcher and its session actors.

use nchost_protocol::{DEFAULT_MAX_INBOUND_FRAME, DEFAULT_MAX_OUTBOUND_FRAME};

/// Tick rate a new session starts with.
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Highest tick rate a session accepts.
pub const MAX_TICK_RATE: u32 = 1000;

/// Configuration for a [`Dispatcher`](crate::Dispatcher) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
	/// Ticks per second for newly created sessions.
	pub tick_rate: u32,
	/// Commands a session mailbox holds before callers wait.
	pub mailbox_capacity: usize,
	/// Outbound messages queued for the writer before producers wait.
	pub output_capacity: usize,
	/// Largest accepted inbound frame body, in bytes.
	pub max_inbound_frame: usize,
	/// Largest outbound frame body, in bytes.
	pub max_outbound_frame: usize,
}

impl Default for DispatcherConfig {
	fn default() -> Self {
		Self {
			tick_rate: DEFAULT_TICK_RATE,
			mailbox_capacity: 1,
			output_capacity: 1,
			max_inbound_frame: DEFAULT_MAX_INBOUND_FRAME,
			max_outbound_frame: DEFAULT_MAX_OUTBOUND_FRAME,
		}
	}
}
