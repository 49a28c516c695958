//! Session actors.
//!
//! Every session runs as its own task that owns one client handle from the
//! [`SessionLibrary`]. The task is reachable only through its mailbox,
//! wrapped by [`SessionActor`], and reports back to the extension by pushing
//! messages onto the shared output channel.
//!
//! # Tick loop
//!
//! On every tick at the current rate, a connected handle is stepped with the
//! simulated time and its state compared against the last observed state.
//! A change produces exactly one `SessionStateChanged` event. While the
//! state is `connected`, queued outbound packets are flushed in order and all
//! inbound packets are drained into `PacketReceived` events.

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use nchost_protocol::{Message, SessionId};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::DispatcherConfig;
use crate::error::{Error, Result};
use crate::library::{LibraryError, SessionHandle, SessionLibrary, SessionState};

enum Command {
	Connect(Vec<u8>),
	SetTickRate(u32),
	SendData(Vec<u8>),
	QueryState(i64),
	Close,
}

/// Mailbox handle of a running session.
///
/// Every method waits until the session's mailbox accepts the command, so a
/// busy session slows its caller down instead of losing commands.
#[derive(Clone)]
pub struct SessionActor {
	id: SessionId,
	mailbox: mpsc::Sender<Command>,
}

impl SessionActor {
	/// Creates the mailbox handle and the task that serves it.
	///
	/// The caller is responsible for spawning [`SessionTask::run`].
	pub fn new(
		id: SessionId,
		library: Arc<dyn SessionLibrary>,
		output: mpsc::Sender<Message>,
		config: &DispatcherConfig,
	) -> (Self, SessionTask) {
		let (tx, rx) = mpsc::channel(config.mailbox_capacity.max(1));

		let actor = Self { id, mailbox: tx };
		let task = SessionTask {
			id,
			library,
			output,
			mailbox: rx,
			handle: None,
			state: SessionState::Disconnected,
			tick_rate: config.tick_rate.max(1),
			time: 0.0,
			pending: VecDeque::new(),
		};

		(actor, task)
	}

	pub fn id(&self) -> SessionId {
		self.id
	}

	/// Supplies a connect token. Ignored if the session already has a client.
	pub async fn connect(&self, token: Vec<u8>) -> Result<()> {
		self.deliver(Command::Connect(token)).await
	}

	pub async fn set_tick_rate(&self, rate: u32) -> Result<()> {
		self.deliver(Command::SetTickRate(rate)).await
	}

	/// Queues a packet for delivery once the session is connected.
	pub async fn send_data(&self, data: Vec<u8>) -> Result<()> {
		self.deliver(Command::SendData(data)).await
	}

	/// Asks the session to reply with its state label under `correlation_id`.
	pub async fn query_state(&self, correlation_id: i64) -> Result<()> {
		self.deliver(Command::QueryState(correlation_id)).await
	}

	/// Asks the session to shut down.
	pub async fn close(&self) -> Result<()> {
		self.deliver(Command::Close).await
	}

	/// Returns true once the session task has stopped reading its mailbox.
	pub fn is_closed(&self) -> bool {
		self.mailbox.is_closed()
	}

	async fn deliver(&self, command: Command) -> Result<()> {
		self.mailbox
			.send(command)
			.await
			.map_err(|_| Error::SessionClosed(self.id))
	}
}

/// The task side of a session. Owns all per-session state.
pub struct SessionTask {
	id: SessionId,
	library: Arc<dyn SessionLibrary>,
	output: mpsc::Sender<Message>,
	mailbox: mpsc::Receiver<Command>,
	handle: Option<Box<dyn SessionHandle>>,
	/// Last state observed from the handle.
	state: SessionState,
	/// Requested tick rate, applied at the next tick boundary.
	tick_rate: u32,
	/// Simulated seconds since the handle was opened.
	time: f64,
	pending: VecDeque<Vec<u8>>,
}

impl SessionTask {
	/// Serves the mailbox until closed, then returns the session id.
	pub async fn run(mut self) -> SessionId {
		let mut current_rate = self.tick_rate;
		let mut ticker = new_ticker(current_rate);

		debug!(
			target: "nchost.session",
			session_id = self.id,
			tick_rate = current_rate,
			"session started"
		);

		loop {
			tokio::select! {
				command = self.mailbox.recv() => {
					let Some(command) = command else { break };
					if self.handle_command(command).await.is_break() {
						break;
					}
				}
				_ = ticker.tick() => {
					if current_rate != self.tick_rate {
						current_rate = self.tick_rate;
						ticker = new_ticker(current_rate);
						debug!(target: "nchost.session", session_id = self.id, tick_rate = current_rate, "tick rate changed");
					}
					self.tick(current_rate).await;
				}
			}
		}

		if let Some(mut handle) = self.handle.take() {
			handle.close();
		}
		self.mailbox.close();

		debug!(
			target: "nchost.session",
			session_id = self.id,
			unsent = self.pending.len(),
			"session stopped"
		);

		self.id
	}

	async fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
		match command {
			Command::Connect(token) => self.connect(&token),
			Command::SetTickRate(rate) => self.tick_rate = rate.max(1),
			Command::SendData(data) => self.pending.push_back(data),
			Command::QueryState(correlation_id) => {
				let reply = Message::Success {
					id: correlation_id,
					value: Some(self.state_label().to_string()),
				};
				emit(&self.output, self.id, reply).await;
			}
			Command::Close => return ControlFlow::Break(()),
		}
		ControlFlow::Continue(())
	}

	fn connect(&mut self, token: &[u8]) {
		if self.handle.is_some() {
			debug!(
				target: "nchost.session",
				session_id = self.id,
				"connect ignored, session already has a client"
			);
			return;
		}

		match self.library.open(token) {
			Ok(handle) => {
				info!(target: "nchost.session", session_id = self.id, "connecting");
				self.handle = Some(handle);
				self.state = SessionState::Disconnected;
				self.time = 0.0;
			}
			Err(err) => {
				warn!(
					target: "nchost.session",
					session_id = self.id,
					error = %err,
					"failed to open session"
				);
			}
		}
	}

	async fn tick(&mut self, rate: u32) {
		let Some(handle) = self.handle.as_mut() else {
			return;
		};
		handle.step(self.time);
		let state = handle.state();

		if state != self.state {
			self.state = state;
			debug!(
				target: "nchost.session",
				session_id = self.id,
				state = state.label(),
				"state changed"
			);
			let event = Message::SessionStateChanged {
				session_id: self.id,
				state: state.label().to_string(),
			};
			emit(&self.output, self.id, event).await;

			if state.is_terminal() {
				self.release();
				return;
			}
		}

		if self.state == SessionState::Connected {
			let received = match self.handle.as_mut() {
				Some(handle) => {
					flush_pending(self.id, handle.as_mut(), &mut self.pending);
					drain_inbound(self.id, handle.as_mut())
				}
				None => Vec::new(),
			};
			for data in received {
				let event = Message::PacketReceived {
					session_id: self.id,
					data,
				};
				emit(&self.output, self.id, event).await;
			}
		}

		self.time += 1.0 / f64::from(rate);
	}

	/// Closes a client that reached a terminal state so a new token can be used.
	fn release(&mut self) {
		if let Some(mut handle) = self.handle.take() {
			handle.close();
			info!(
				target: "nchost.session",
				session_id = self.id,
				state = self.state.label(),
				"session client released"
			);
		}
	}

	fn state_label(&self) -> &'static str {
		match &self.handle {
			Some(handle) => handle.state().label(),
			None => self.state.label(),
		}
	}
}

async fn emit(output: &mpsc::Sender<Message>, session_id: SessionId, message: Message) {
	if output.send(message).await.is_err() {
		warn!(
			target: "nchost.session",
			session_id, "output channel closed, dropping message"
		);
	}
}

/// Sends queued packets in order, stopping at the first transient failure.
fn flush_pending(
	session_id: SessionId,
	handle: &mut dyn SessionHandle,
	pending: &mut VecDeque<Vec<u8>>,
) {
	while let Some(packet) = pending.front() {
		match handle.send(packet) {
			Ok(()) => {
				pending.pop_front();
			}
			Err(LibraryError::PacketRejected(reason)) => {
				warn!(
					target: "nchost.session",
					session_id,
					len = packet.len(),
					reason = %reason,
					"dropping rejected packet"
				);
				pending.pop_front();
			}
			Err(err) => {
				warn!(
					target: "nchost.session",
					session_id,
					error = %err,
					queued = pending.len(),
					"send failed, retrying next tick"
				);
				break;
			}
		}
	}
}

fn drain_inbound(session_id: SessionId, handle: &mut dyn SessionHandle) -> Vec<Vec<u8>> {
	let mut received = Vec::new();
	loop {
		match handle.receive() {
			Ok(Some(packet)) => received.push(packet),
			Ok(None) => break,
			Err(err) => {
				warn!(
					target: "nchost.session",
					session_id,
					error = %err,
					"receive failed"
				);
				break;
			}
		}
	}
	received
}

fn new_ticker(rate: u32) -> Interval {
	let period = Duration::from_secs_f64(1.0 / f64::from(rate.max(1)));
	let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
	ticker
}
