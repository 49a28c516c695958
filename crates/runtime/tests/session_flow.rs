//! End-to-end flow through a dispatcher over in-memory pipes.

use std::sync::Arc;

use nchost_runtime::testing::FakeLibrary;
use nchost_runtime::{Dispatcher, DispatcherConfig};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::sync::CancellationToken;

async fn send(input: &mut DuplexStream, value: Value) {
	let body = serde_json::to_vec(&value).unwrap();
	input
		.write_all(&(body.len() as u32).to_le_bytes())
		.await
		.unwrap();
	input.write_all(&body).await.unwrap();
}

async fn recv(output: &mut DuplexStream) -> Option<Value> {
	let mut len_buf = [0u8; 4];
	output.read_exact(&mut len_buf).await.ok()?;
	let mut body = vec![0u8; u32::from_le_bytes(len_buf) as usize];
	output.read_exact(&mut body).await.unwrap();
	Some(serde_json::from_slice(&body).unwrap())
}

#[tokio::test(start_paused = true)]
async fn session_lifecycle_over_pipes() {
	let library = Arc::new(FakeLibrary::connecting_after(2));
	let (mut input, host_input) = tokio::io::duplex(64 * 1024);
	let (host_output, mut output) = tokio::io::duplex(64 * 1024);
	let handle = Dispatcher::new(library.clone(), DispatcherConfig::default()).start(
		host_input,
		host_output,
		CancellationToken::new(),
	);

	send(&mut input, json!([109, 1])).await;
	assert_eq!(recv(&mut output).await, Some(json!([202, 1, "0.1.0"])));

	send(&mut input, json!([101, 2])).await;
	let created = recv(&mut output).await.unwrap();
	assert_eq!(created[0], 201);
	assert_eq!(created[1], 2);
	let session = created[2].as_i64().unwrap();

	// Queued before the session has a client, delivered once connected
	send(&mut input, json!([104, 3, session, "Zmlyc3Q="])).await;
	assert_eq!(recv(&mut output).await, Some(json!([202, 3])));

	send(&mut input, json!([103, 4, session, "dG9rZW4="])).await;
	assert_eq!(recv(&mut output).await, Some(json!([202, 4])));

	assert_eq!(
		recv(&mut output).await,
		Some(json!([110, session, "sendingConnectionRequest"]))
	);
	assert_eq!(
		recv(&mut output).await,
		Some(json!([110, session, "connected"]))
	);

	send(&mut input, json!([106, 5, session])).await;
	assert_eq!(recv(&mut output).await, Some(json!([202, 5, "connected"])));

	let remote = library.remote(0).unwrap();
	assert_eq!(remote.token(), b"token");
	assert_eq!(remote.sent(), vec![b"first".to_vec()]);

	remote.push_inbound(b"hi".to_vec());
	assert_eq!(recv(&mut output).await, Some(json!([105, session, "aGk="])));

	send(&mut input, json!([107, 6, session])).await;
	assert_eq!(recv(&mut output).await, Some(json!([202, 6])));
	assert_eq!(recv(&mut output).await, Some(json!([108, session])));
	assert!(remote.is_closed());

	input.shutdown().await.unwrap();
	assert_eq!(recv(&mut output).await, None);
	handle.wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancellation_waits_for_every_session() {
	let library = Arc::new(FakeLibrary::connecting_after(1));
	let (mut input, host_input) = tokio::io::duplex(64 * 1024);
	let (host_output, mut output) = tokio::io::duplex(64 * 1024);
	let cancel = CancellationToken::new();
	let handle = Dispatcher::new(library.clone(), DispatcherConfig::default()).start(
		host_input,
		host_output,
		cancel.clone(),
	);

	let mut sessions = Vec::new();
	for id in 1..=2 {
		send(&mut input, json!([101, id])).await;
		let created = recv(&mut output).await.unwrap();
		sessions.push(created[2].as_i64().unwrap());
	}

	cancel.cancel();

	let mut destroyed = Vec::new();
	while let Some(frame) = recv(&mut output).await {
		if frame[0] == 108 {
			destroyed.push(frame[1].as_i64().unwrap());
		}
	}
	destroyed.sort_unstable();
	sessions.sort_unstable();
	assert_eq!(destroyed, sessions);

	handle.wait().await.unwrap();
}
