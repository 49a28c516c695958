
use clap::Parser;
use nchost_protocol::{DEFAULT_MAX_INBOUND_FRAME, DEFAULT_MAX_OUTBOUND_FRAME};
use nchost_runtime::{DEFAULT_TICK_RATE, DispatcherConfig, MAX_TICK_RATE};

/// Command line for the host binary.
///
/// Browsers start native hosts with their own positional arguments (the
/// calling extension's origin, or the manifest path and extension id). Any
/// such argument selects host mode; none selects the installer.
#[derive(Parser, Debug)]
#[command(name = "nchost")]
#[command(about = "netcode.io native-messaging host")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Tick rate for newly created sessions
	#[arg(
		long,
		value_name = "HZ",
		default_value_t = DEFAULT_TICK_RATE,
		value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_TICK_RATE)),
	)]
	pub tick_rate: u32,

	/// Largest accepted inbound frame body in bytes
	#[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_INBOUND_FRAME)]
	pub max_inbound_frame: usize,

	/// Largest outbound frame body in bytes
	#[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_OUTBOUND_FRAME)]
	pub max_outbound_frame: usize,

	/// Window handle Chrome passes on Windows
	#[arg(long, value_name = "HANDLE", hide = true)]
	pub parent_window: Option<String>,

	/// Arguments supplied by the browser
	#[arg(value_name = "CALLER", trailing_var_arg = true, allow_hyphen_values = true)]
	pub caller: Vec<String>,
}

impl Cli {
	/// True when started by hand rather than by a browser.
	pub fn is_install(&self) -> bool {
		self.caller.is_empty()
	}

	pub fn dispatcher_config(&self) -> DispatcherConfig {
		DispatcherConfig {
			tick_rate: self.tick_rate,
			max_inbound_frame: self.max_inbound_frame,
			max_outbound_frame: self.max_outbound_frame,
			..DispatcherConfig::default()
		}
	}
}
