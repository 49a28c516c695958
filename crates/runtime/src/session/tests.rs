use std::time::Duration;

use tokio::task::JoinHandle;

use super::*;
use crate::testing::{FakeLibrary, INVALID_TOKEN};

const SESSION: SessionId = 7;

fn spawn_session(
	library: Arc<FakeLibrary>,
	tick_rate: u32,
) -> (SessionActor, mpsc::Receiver<Message>, JoinHandle<SessionId>) {
	let (tx, rx) = mpsc::channel(16);
	let config = DispatcherConfig {
		tick_rate,
		..DispatcherConfig::default()
	};
	let (actor, task) = SessionActor::new(SESSION, library, tx, &config);
	(actor, rx, tokio::spawn(task.run()))
}

async fn next_state(output: &mut mpsc::Receiver<Message>) -> String {
	loop {
		match output.recv().await.expect("output closed") {
			Message::SessionStateChanged { session_id, state } => {
				assert_eq!(session_id, SESSION);
				return state;
			}
			_ => continue,
		}
	}
}

async fn query(actor: &SessionActor, output: &mut mpsc::Receiver<Message>) -> String {
	actor.query_state(99).await.unwrap();
	loop {
		match output.recv().await.expect("output closed") {
			Message::Success { id: 99, value } => return value.unwrap(),
			_ => continue,
		}
	}
}

#[tokio::test(start_paused = true)]
async fn test_state_before_connect_is_disconnected() {
	let library = Arc::new(FakeLibrary::new());
	let (actor, mut output, _task) = spawn_session(library.clone(), 60);

	actor.query_state(3).await.unwrap();
	assert_eq!(
		output.recv().await.unwrap(),
		Message::Success {
			id: 3,
			value: Some("disconnected".to_string()),
		}
	);
	assert_eq!(library.opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_state_changes_emitted_once_each() {
	let library = Arc::new(FakeLibrary::connecting_after(3));
	let (actor, mut output, _task) = spawn_session(library.clone(), 60);

	actor.connect(b"token".to_vec()).await.unwrap();

	assert_eq!(
		output.recv().await.unwrap(),
		Message::SessionStateChanged {
			session_id: SESSION,
			state: "sendingConnectionRequest".to_string(),
		}
	);
	assert_eq!(
		output.recv().await.unwrap(),
		Message::SessionStateChanged {
			session_id: SESSION,
			state: "connected".to_string(),
		}
	);

	// Steady state produces no further events
	tokio::time::sleep(Duration::from_secs(1)).await;
	assert!(output.try_recv().is_err());

	let remote = library.remote(0).unwrap();
	assert_eq!(remote.token(), b"token");
	assert!(remote.steps().len() > 3);
}

#[tokio::test(start_paused = true)]
async fn test_simulated_time_advances_by_tick_period() {
	let library = Arc::new(FakeLibrary::new());
	let (actor, mut output, _task) = spawn_session(library.clone(), 10);

	actor.connect(b"token".to_vec()).await.unwrap();
	next_state(&mut output).await;
	tokio::time::sleep(Duration::from_millis(350)).await;

	let steps = library.remote(0).unwrap().steps();
	assert!(steps.len() >= 3);
	assert_eq!(steps[0], 0.0);
	assert!((steps[1] - 0.1).abs() < 1e-9);
	assert!((steps[2] - 0.2).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_tick_rate_change_applies_at_next_tick() {
	let library = Arc::new(FakeLibrary::new());
	let (actor, mut output, _task) = spawn_session(library.clone(), 10);

	actor.connect(b"token".to_vec()).await.unwrap();
	next_state(&mut output).await;
	actor.set_tick_rate(2).await.unwrap();
	tokio::time::sleep(Duration::from_secs(2)).await;

	let steps = library.remote(0).unwrap().steps();
	assert!(steps.len() >= 3);
	assert!((steps[1] - 0.1).abs() < 1e-9);
	assert!((steps[2] - 0.6).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_packets_queued_until_connected_then_flushed_in_order() {
	let library = Arc::new(FakeLibrary::connecting_after(2));
	let (actor, mut output, _task) = spawn_session(library.clone(), 60);

	actor.send_data(b"first".to_vec()).await.unwrap();
	actor.send_data(b"second".to_vec()).await.unwrap();
	actor.connect(b"token".to_vec()).await.unwrap();

	assert_eq!(next_state(&mut output).await, "sendingConnectionRequest");
	assert!(library.remote(0).unwrap().sent().is_empty());

	assert_eq!(next_state(&mut output).await, "connected");
	assert_eq!(query(&actor, &mut output).await, "connected");

	assert_eq!(
		library.remote(0).unwrap().sent(),
		vec![b"first".to_vec(), b"second".to_vec()]
	);
}

#[tokio::test(start_paused = true)]
async fn test_inbound_packets_become_events_in_order() {
	let library = Arc::new(FakeLibrary::connecting_after(1));
	let (actor, mut output, _task) = spawn_session(library.clone(), 60);

	actor.connect(b"token".to_vec()).await.unwrap();
	assert_eq!(next_state(&mut output).await, "connected");

	let remote = library.remote(0).unwrap();
	remote.push_inbound(vec![1, 2, 3]);
	remote.push_inbound(vec![4]);

	assert_eq!(
		output.recv().await.unwrap(),
		Message::PacketReceived {
			session_id: SESSION,
			data: vec![1, 2, 3],
		}
	);
	assert_eq!(
		output.recv().await.unwrap(),
		Message::PacketReceived {
			session_id: SESSION,
			data: vec![4],
		}
	);
}

#[tokio::test(start_paused = true)]
async fn test_transient_send_failure_keeps_order() {
	let library = Arc::new(FakeLibrary::connecting_after(1));
	let (actor, mut output, _task) = spawn_session(library.clone(), 60);

	actor.connect(b"token".to_vec()).await.unwrap();
	assert_eq!(next_state(&mut output).await, "connected");

	let remote = library.remote(0).unwrap();
	remote.fail_next_sends(1);
	actor.send_data(b"a".to_vec()).await.unwrap();
	actor.send_data(b"b".to_vec()).await.unwrap();

	tokio::time::sleep(Duration::from_millis(100)).await;
	assert_eq!(remote.sent(), vec![b"a".to_vec(), b"b".to_vec()]);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_packet_is_dropped() {
	let library = Arc::new(FakeLibrary::connecting_after(1));
	let (actor, mut output, _task) = spawn_session(library.clone(), 60);

	actor.connect(b"token".to_vec()).await.unwrap();
	assert_eq!(next_state(&mut output).await, "connected");

	let remote = library.remote(0).unwrap();
	remote.reject_larger_than(4);
	actor.send_data(b"too long".to_vec()).await.unwrap();
	actor.send_data(b"ok".to_vec()).await.unwrap();

	tokio::time::sleep(Duration::from_millis(100)).await;
	assert_eq!(remote.sent(), vec![b"ok".to_vec()]);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_state_releases_client_and_allows_reconnect() {
	let library = Arc::new(FakeLibrary::new());
	let (actor, mut output, _task) = spawn_session(library.clone(), 60);

	actor.connect(b"token".to_vec()).await.unwrap();
	assert_eq!(next_state(&mut output).await, "sendingConnectionRequest");

	let first = library.remote(0).unwrap();
	first.set_state(SessionState::ConnectionTimedOut);
	assert_eq!(next_state(&mut output).await, "connectionTimedOut");
	assert_eq!(query(&actor, &mut output).await, "connectionTimedOut");
	assert!(first.is_closed());

	actor.connect(b"fresh".to_vec()).await.unwrap();
	assert_eq!(next_state(&mut output).await, "sendingConnectionRequest");
	assert_eq!(library.opened(), 2);
	assert_eq!(library.remote(1).unwrap().token(), b"fresh");
}

#[tokio::test(start_paused = true)]
async fn test_second_connect_ignored_while_client_live() {
	let library = Arc::new(FakeLibrary::new());
	let (actor, mut output, _task) = spawn_session(library.clone(), 60);

	actor.connect(b"token".to_vec()).await.unwrap();
	actor.connect(b"other".to_vec()).await.unwrap();
	assert_eq!(query(&actor, &mut output).await, "sendingConnectionRequest");

	assert_eq!(library.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_token_leaves_session_idle() {
	let library = Arc::new(FakeLibrary::new());
	let (actor, mut output, _task) = spawn_session(library.clone(), 60);

	actor.connect(INVALID_TOKEN.to_vec()).await.unwrap();
	tokio::time::sleep(Duration::from_millis(100)).await;

	assert_eq!(query(&actor, &mut output).await, "disconnected");
	assert_eq!(library.opened(), 0);
	assert!(output.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_close_releases_client_and_mailbox() {
	let library = Arc::new(FakeLibrary::new());
	let (actor, _output, task) = spawn_session(library.clone(), 60);

	actor.connect(b"token".to_vec()).await.unwrap();
	actor.close().await.unwrap();

	assert_eq!(task.await.unwrap(), SESSION);
	assert!(actor.is_closed());
	assert!(library.remote(0).unwrap().is_closed());

	let err = actor.send_data(b"late".to_vec()).await.unwrap_err();
	assert!(matches!(err, Error::SessionClosed(SESSION)));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_actor_stops_the_task() {
	let library = Arc::new(FakeLibrary::new());
	let (actor, _output, task) = spawn_session(library, 60);

	drop(actor);

	assert_eq!(task.await.unwrap(), SESSION);
}
