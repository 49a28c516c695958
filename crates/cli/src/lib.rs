//! Native-messaging host for netcode.io browser extensions.
//!
//! Started by a browser with caller arguments, the binary serves the framed
//! protocol on stdin/stdout. Started without arguments, it installs itself
//! and registers its manifests with Firefox and Chrome.

pub mod cli;
pub mod host;
pub mod install;
pub mod logging;
#[cfg(feature = "netcode")]
pub mod netcode;
