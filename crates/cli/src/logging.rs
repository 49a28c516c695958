
use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Installs the global subscriber. Logs always go to stderr since stdout
/// carries protocol frames.
pub fn init_logging(verbosity: u8) {
	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_ansi(std::io::stderr().is_terminal())
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}

/// Filter directives used when `RUST_LOG` is unset.
///
/// Host events are logged under the `nchost.*` targets (`nchost.session`,
/// `nchost.dispatch`, `nchost.transport`, `nchost.host`, `nchost.install`,
/// `nchost.netcode`). Directive targets match by prefix, so `nchost` covers
/// all of them as well as the `nchost_*` crate module paths.
pub fn default_filter(verbosity: u8) -> &'static str {
	// 0 = warnings only, browsers surface host stderr in their consoles
	// 1 (-v) = info for the host
	// 2+ (-vv) = debug for everything
	match verbosity {
		0 => "warn",
		1 => "warn,nchost=info",
		_ => "debug",
	}
}
