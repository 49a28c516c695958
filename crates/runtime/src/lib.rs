//! nchost runtime - session actors, frame transport and dispatcher
//!
//! This crate runs the host side of a native-messaging connection:
//!
//! - **Transport**: length-prefixed JSON frames over any async byte stream
//! - **Session actors**: one task per session, driving a client handle on a
//!   fixed tick
//! - **Dispatcher**: routes requests to sessions, allocates session ids and
//!   funnels every outbound message through a single writer
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │    nchost-cli    │  stdio, signals, installer
//! └────────┬─────────┘
//!          │ Dispatcher::start
//! ┌────────▼─────────┐
//! │  nchost-runtime  │  This crate
//! │  ┌────────────┐  │
//! │  │ Dispatcher │  │  Routing, registry, shutdown
//! │  └────────────┘  │
//! │  ┌────────────┐  │
//! │  │  Session   │  │  Tick loop per session
//! │  └────────────┘  │
//! │  ┌────────────┐  │
//! │  │ Transport  │  │  Frame reader/writer
//! │  └────────────┘  │
//! └────────┬─────────┘
//!          │ SessionLibrary
//! ┌────────▼─────────┐
//! │  session client  │  External secure session protocol
//! └──────────────────┘
//! ```
//!
//! # Decoupling via SessionLibrary
//!
//! Session actors only see the [`SessionLibrary`] and [`SessionHandle`]
//! traits, so the runtime can be exercised with the in-memory fake in
//! `testing` (enabled by the `testing` feature) and the binary chooses the
//! real client implementation.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod library;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

// Re-export key types at crate root
pub use config::{DEFAULT_TICK_RATE, DispatcherConfig, MAX_TICK_RATE};
pub use dispatcher::{Dispatcher, DispatcherHandle, RouteError, allocate_session_id};
pub use error::{Error, Result};
pub use library::{LibraryError, SessionHandle, SessionLibrary, SessionState};
pub use session::{SessionActor, SessionTask};
pub use transport::{FrameReader, FrameWriter};
