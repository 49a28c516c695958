use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use nchost_cli::cli::Cli;
use nchost_cli::netcode::NetcodeLibrary;
use nchost_cli::{host, install, logging};
use nchost_protocol::PROTOCOL_VERSION;
use tracing::info;

fn main() -> ExitCode {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let result = if cli.is_install() {
		install_for_user()
	} else {
		run_host(&cli)
	};

	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("nchost: {err:#}");
			ExitCode::FAILURE
		}
	}
}

fn install_for_user() -> Result<()> {
	let installation = install::run()?;
	println!("Installed {}", installation.binary.display());
	println!("Firefox manifest: {}", installation.firefox_manifest.display());
	println!("Chrome manifest: {}", installation.chrome_manifest.display());
	Ok(())
}

fn run_host(cli: &Cli) -> Result<()> {
	info!(
		target: "nchost",
		version = PROTOCOL_VERSION,
		caller = ?cli.caller,
		"starting host"
	);

	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.context("Failed to start async runtime")?;

	let result = runtime.block_on(host::run_stdio(
		Arc::new(NetcodeLibrary),
		cli.dispatcher_config(),
	));

	// A pending stdin read can't be interrupted, so don't wait for it
	runtime.shutdown_background();

	result
}
