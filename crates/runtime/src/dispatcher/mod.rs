//! Request routing and dispatcher lifecycle.
//!
//! A running dispatcher is three tasks plus one task per session:
//!
//! ```text
//!  input ──► reader ──► router ──► session actors
//!                         │              │
//!                         ▼              ▼
//!                       output channel (bounded)
//!                              │
//!                              ▼
//!                           writer ──► output
//! ```
//!
//! The router owns the session registry and is the only task that creates or
//! destroys sessions. Every message bound for the extension, direct replies
//! and session events alike, passes through the single writer.
//!
//! Shutdown starts on cancellation or at the end of input. The router stops
//! reading, closes every session, waits for each session task to finish
//! (reporting each with a `SessionDestroyed` event) and drops its output
//! sender. The writer then drains what is queued and the run completes.


use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use nchost_protocol::{
	CodecError, Envelope, Message, PROTOCOL_VERSION, PayloadError, SessionId, kind,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{DispatcherConfig, MAX_TICK_RATE};
use crate::error::{Error, Result};
use crate::library::SessionLibrary;
use crate::session::{SessionActor, SessionTask};
use crate::transport::{FrameReader, FrameWriter};

/// Picks a session id that no live session uses.
///
/// `draw` is called until it yields an id for which `is_live` is false.
pub fn allocate_session_id(
	is_live: impl Fn(SessionId) -> bool,
	mut draw: impl FnMut() -> u32,
) -> SessionId {
	loop {
		let candidate = SessionId::from(draw());
		if !is_live(candidate) {
			return candidate;
		}
	}
}

/// A request that could not be carried out.
///
/// All variants are answered with an error reply. None of them end the run.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
	#[error("unexisting client id: {0}")]
	UnknownSession(SessionId),

	#[error("unknown message type: {0}")]
	UnknownType(i64),

	#[error(transparent)]
	InvalidPayload(#[from] PayloadError),

	#[error("invalid tick rate: {0}")]
	InvalidTickRate(i64),

	/// The session task could not take the command.
	#[error(transparent)]
	Actor(#[from] Error),
}

impl RouteError {
	/// Error reply for the request with correlation id `id`.
	pub fn into_reply(self, id: i64) -> Message {
		let message = self.to_string();
		match self {
			RouteError::Actor(_) => Message::InternalError { id, message },
			_ => Message::Error { id, message },
		}
	}
}

/// Serves one extension connection.
pub struct Dispatcher {
	library: Arc<dyn SessionLibrary>,
	config: DispatcherConfig,
}

impl Dispatcher {
	pub fn new(library: Arc<dyn SessionLibrary>, config: DispatcherConfig) -> Self {
		Self { library, config }
	}

	/// Spawns the reader, router and writer tasks.
	///
	/// The run ends when `cancel` fires or `input` reaches end of stream.
	pub fn start<R, W>(self, input: R, output: W, cancel: CancellationToken) -> DispatcherHandle
	where
		R: AsyncRead + Unpin + Send + 'static,
		W: AsyncWrite + Unpin + Send + 'static,
	{
		let (frames_tx, frames_rx) = mpsc::channel(1);
		let (output_tx, output_rx) = mpsc::channel(self.config.output_capacity.max(1));

		let reader = FrameReader::new(input, self.config.max_inbound_frame);
		let writer = FrameWriter::new(output, self.config.max_outbound_frame);

		let reader = tokio::spawn(read_loop(reader, frames_tx, cancel.clone()));
		let writer = tokio::spawn(write_loop(writer, output_rx));
		let router = Router::new(self.library, self.config, output_tx);

		let router_cancel = cancel.clone();
		let task = tokio::spawn(async move {
			router.run(frames_rx, router_cancel).await;

			let read = reader.await;
			let write = writer.await;
			finish(read, write)
		});

		DispatcherHandle { cancel, task }
	}
}

/// Handle to a running dispatcher.
pub struct DispatcherHandle {
	cancel: CancellationToken,
	task: JoinHandle<Result<()>>,
}

impl DispatcherHandle {
	/// Starts a graceful shutdown.
	pub fn shutdown(&self) {
		self.cancel.cancel();
	}

	/// Waits until every session has stopped and all output is written.
	///
	/// Returns the framing or decoding error that ended the input, if any.
	pub async fn wait(self) -> Result<()> {
		self.task.await.map_err(task_failed)?
	}
}

fn task_failed(err: JoinError) -> Error {
	Error::TaskFailed(err.to_string())
}

fn finish(
	read: std::result::Result<std::result::Result<(), CodecError>, JoinError>,
	write: std::result::Result<(), JoinError>,
) -> Result<()> {
	write.map_err(task_failed)?;
	read.map_err(task_failed)?.map_err(Error::from)
}

async fn read_loop<R>(
	mut reader: FrameReader<R>,
	frames: mpsc::Sender<Envelope>,
	cancel: CancellationToken,
) -> std::result::Result<(), CodecError>
where
	R: AsyncRead + Unpin,
{
	loop {
		let envelope = tokio::select! {
			_ = cancel.cancelled() => {
				debug!(target: "nchost.transport", "reader cancelled");
				return Ok(());
			}
			read = reader.read_envelope() => match read {
				Ok(Some(envelope)) => envelope,
				Ok(None) => {
					info!(target: "nchost.transport", "input closed");
					return Ok(());
				}
				Err(err) => {
					error!(target: "nchost.transport", error = %err, "unreadable input, stopping");
					return Err(err);
				}
			},
		};

		if frames.send(envelope).await.is_err() {
			return Ok(());
		}
	}
}

async fn write_loop<W>(mut writer: FrameWriter<W>, mut output: mpsc::Receiver<Message>)
where
	W: AsyncWrite + Unpin,
{
	while let Some(message) = output.recv().await {
		let (code, id) = (message.kind(), message.id());
		let Err(err) = writer.write_message(message).await else {
			continue;
		};

		warn!(target: "nchost.transport", kind = code, id, error = %err, "failed to write message");
		if code == kind::INTERNAL_ERROR {
			continue;
		}
		let fallback = Message::InternalError {
			id,
			message: err.to_string(),
		};
		if let Err(err) = writer.write_message(fallback).await {
			warn!(target: "nchost.transport", id, error = %err, "failed to write internal error");
		}
	}

	debug!(target: "nchost.transport", "writer drained");
}

struct Router {
	library: Arc<dyn SessionLibrary>,
	config: DispatcherConfig,
	output: mpsc::Sender<Message>,
	sessions: HashMap<SessionId, SessionActor>,
	tasks: JoinSet<SessionId>,
}

impl Router {
	fn new(
		library: Arc<dyn SessionLibrary>,
		config: DispatcherConfig,
		output: mpsc::Sender<Message>,
	) -> Self {
		Self {
			library,
			config,
			output,
			sessions: HashMap::new(),
			tasks: JoinSet::new(),
		}
	}

	async fn run(mut self, mut input: mpsc::Receiver<Envelope>, cancel: CancellationToken) {
		loop {
			tokio::select! {
				_ = cancel.cancelled() => {
					info!(target: "nchost.dispatch", "cancelled");
					break;
				}
				envelope = input.recv() => match envelope {
					Some(envelope) => self.route(envelope).await,
					None => break,
				},
				Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
					self.session_exited(joined).await;
				}
			}
		}

		// Unblocks a reader still waiting to hand over a frame
		drop(input);
		self.shutdown().await;
	}

	async fn route(&mut self, envelope: Envelope) {
		let (code, id) = (envelope.kind, envelope.id);
		match self.dispatch(envelope).await {
			Ok(Some(reply)) => emit(&self.output, reply).await,
			Ok(None) => {}
			Err(err) => {
				debug!(target: "nchost.dispatch", kind = code, id, error = %err, "request failed");
				emit(&self.output, err.into_reply(id)).await;
			}
		}
	}

	/// Handles one request. `Ok(None)` means the reply comes from a session.
	async fn dispatch(&mut self, envelope: Envelope) -> std::result::Result<Option<Message>, RouteError> {
		if !kind::is_request(envelope.kind) {
			return Err(RouteError::UnknownType(envelope.kind));
		}

		match Message::try_from(envelope)? {
			Message::CheckPresence { id } => Ok(Some(Message::Success {
				id,
				value: Some(PROTOCOL_VERSION.to_string()),
			})),
			Message::CreateSession { id } => {
				let session_id = self.create_session();
				Ok(Some(Message::SessionCreated { id, session_id }))
			}
			Message::SetTickRate {
				id,
				session_id,
				rate,
			} => {
				let actor = self.session(session_id)?;
				let rate = u32::try_from(rate)
					.ok()
					.filter(|rate| (1..=MAX_TICK_RATE).contains(rate))
					.ok_or(RouteError::InvalidTickRate(rate))?;
				actor.set_tick_rate(rate).await?;
				Ok(Some(Message::ok(id)))
			}
			Message::ConnectSession {
				id,
				session_id,
				token,
			} => {
				self.session(session_id)?.connect(token).await?;
				Ok(Some(Message::ok(id)))
			}
			Message::SendPacket {
				id,
				session_id,
				data,
			} => {
				self.session(session_id)?.send_data(data).await?;
				Ok(Some(Message::ok(id)))
			}
			Message::GetSessionState { id, session_id } => {
				self.session(session_id)?.query_state(id).await?;
				Ok(None)
			}
			Message::DestroySession { id, session_id } => {
				let actor = self
					.sessions
					.remove(&session_id)
					.ok_or(RouteError::UnknownSession(session_id))?;
				info!(target: "nchost.dispatch", session_id, "destroying session");
				if let Err(err) = actor.close().await {
					debug!(target: "nchost.dispatch", session_id, error = %err, "session already stopped");
				}
				Ok(Some(Message::ok(id)))
			}
			other => Err(RouteError::UnknownType(other.kind())),
		}
	}

	fn session(&self, session_id: SessionId) -> std::result::Result<SessionActor, RouteError> {
		self.sessions
			.get(&session_id)
			.cloned()
			.ok_or(RouteError::UnknownSession(session_id))
	}

	fn create_session(&mut self) -> SessionId {
		let sessions = &self.sessions;
		let session_id = allocate_session_id(|id| sessions.contains_key(&id), rand::random::<u32>);

		let (actor, task) = SessionActor::new(
			session_id,
			Arc::clone(&self.library),
			self.output.clone(),
			&self.config,
		);
		self.tasks.spawn(supervise(session_id, task));
		self.sessions.insert(session_id, actor);

		info!(
			target: "nchost.dispatch",
			session_id,
			live = self.sessions.len(),
			"session created"
		);
		session_id
	}

	async fn session_exited(&mut self, joined: std::result::Result<SessionId, JoinError>) {
		let session_id = match joined {
			Ok(session_id) => session_id,
			Err(err) => {
				error!(target: "nchost.dispatch", error = %err, "session task aborted");
				return;
			}
		};

		// A destroyed id may already belong to a newer session
		if self
			.sessions
			.get(&session_id)
			.is_some_and(SessionActor::is_closed)
		{
			self.sessions.remove(&session_id);
		}

		debug!(target: "nchost.dispatch", session_id, "session destroyed");
		emit(&self.output, Message::SessionDestroyed { session_id }).await;
	}

	async fn shutdown(mut self) {
		info!(
			target: "nchost.dispatch",
			live = self.sessions.len(),
			running = self.tasks.len(),
			"shutting down"
		);

		for (session_id, actor) in std::mem::take(&mut self.sessions) {
			if let Err(err) = actor.close().await {
				debug!(target: "nchost.dispatch", session_id, error = %err, "session already stopped");
			}
		}

		while let Some(joined) = self.tasks.join_next().await {
			self.session_exited(joined).await;
		}

		debug!(target: "nchost.dispatch", "all sessions stopped");
	}
}

/// Runs a session task, reporting its id even if it panics.
async fn supervise(session_id: SessionId, task: SessionTask) -> SessionId {
	match AssertUnwindSafe(task.run()).catch_unwind().await {
		Ok(session_id) => session_id,
		Err(_) => {
			error!(target: "nchost.dispatch", session_id, "session task panicked");
			session_id
		}
	}
}

async fn emit(output: &mpsc::Sender<Message>, message: Message) {
	if output.send(message).await.is_err() {
		warn!(target: "nchost.dispatch", "writer stopped, dropping message");
	}
}
