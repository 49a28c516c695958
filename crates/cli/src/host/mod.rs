//! Host mode: serve the protocol until the browser goes away.


use std::sync::Arc;

use anyhow::{Context, Result};
use nchost_runtime::{Dispatcher, DispatcherConfig, SessionLibrary};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Runs one dispatcher over `input`/`output` until end of input or `cancel`.
pub async fn serve<R, W>(
	library: Arc<dyn SessionLibrary>,
	config: DispatcherConfig,
	input: R,
	output: W,
	cancel: CancellationToken,
) -> Result<()>
where
	R: AsyncRead + Unpin + Send + 'static,
	W: AsyncWrite + Unpin + Send + 'static,
{
	let handle = Dispatcher::new(library, config).start(input, output, cancel);
	handle.wait().await.context("Host stopped on a protocol error")
}

/// Serves stdin/stdout, shutting down gracefully on termination signals.
pub async fn run_stdio(library: Arc<dyn SessionLibrary>, config: DispatcherConfig) -> Result<()> {
	let cancel = CancellationToken::new();
	let signals = tokio::spawn(cancel_on_signal(cancel.clone()));

	let result = serve(
		library,
		config,
		tokio::io::stdin(),
		tokio::io::stdout(),
		cancel.clone(),
	)
	.await;

	cancel.cancel();
	signals
		.await
		.context("Signal watcher failed")?
		.context("Failed to watch for signals")?;

	result
}

/// Cancels `cancel` on Ctrl+C or SIGTERM. Returns early if it is cancelled
/// elsewhere.
async fn cancel_on_signal(cancel: CancellationToken) -> Result<()> {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{SignalKind, signal};

		let mut sigterm =
			signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

		tokio::select! {
			_ = cancel.cancelled() => return Ok(()),
			_ = sigterm.recv() => {
				info!(target: "nchost.host", "received SIGTERM, shutting down");
			}
			_ = tokio::signal::ctrl_c() => {
				info!(target: "nchost.host", "received Ctrl+C, shutting down");
			}
		}
	}

	#[cfg(not(unix))]
	{
		tokio::select! {
			_ = cancel.cancelled() => return Ok(()),
			_ = tokio::signal::ctrl_c() => {
				info!(target: "nchost.host", "received Ctrl+C, shutting down");
			}
		}
	}

	cancel.cancel();
	Ok(())
}
