use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use vaultsync::blueprint;
use vaultsync::error::{LockError, SyncError};
use vaultsync::logging::{init_tracing, Tag};
use vaultsync::sync::SyncEngine;
use vaultsync::utils::shutdown_signal;

fn cli() -> Command {
	Command::new("vault-sync")
		.version(env!("CARGO_PKG_VERSION"))
		.author("Szilard Hajba <szilu@symbion.hu>")
		.about("Two-way sync between a project folder and its vault mirror")
		.arg(
			Arg::new("once")
				.long("once")
				.action(ArgAction::SetTrue)
				.help("Reconcile once and exit instead of watching"),
		)
		.arg(
			Arg::new("project")
				.short('p')
				.long("project")
				.value_name("DIR")
				.help("Project directory (default: current directory)"),
		)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.help("Blueprint file (default: <project>/VAULT-BLUEPRINT.md)"),
		)
}

#[tokio::main]
async fn main() -> ExitCode {
	init_tracing();
	let matches = cli().get_matches();

	let project = match matches.get_one::<String>("project") {
		Some(dir) => PathBuf::from(dir),
		None => match std::env::current_dir() {
			Ok(dir) => dir,
			Err(e) => {
				error!(tag = %Tag::Error, "Cannot determine current directory: {}", e);
				return ExitCode::FAILURE;
			}
		},
	};
	let config_file = matches.get_one::<String>("config").map(PathBuf::from);

	let config = match blueprint::load_config(&project, config_file.as_deref()) {
		Ok(config) => config,
		Err(e) => {
			error!(tag = %Tag::Error, "{}", e);
			return ExitCode::FAILURE;
		}
	};

	info!(tag = %Tag::Info, "Local:  {}", config.local_root().display());
	info!(tag = %Tag::Info, "Remote: {}", config.remote_root().display());

	let engine = SyncEngine::new(config);

	if matches.get_flag("once") {
		return match engine.run_once().await {
			// Per-file failures are logged by the pass and are not fatal
			Ok(_) => ExitCode::SUCCESS,
			Err(e) => {
				error!(tag = %Tag::Error, "{}", e);
				ExitCode::FAILURE
			}
		};
	}

	// Handlers go in before the lock is taken, so Ctrl+C always unwinds cleanly
	let shutdown = shutdown_signal();
	match engine.run_continuous(shutdown).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(SyncError::Lock(e @ LockError::Held { .. })) => {
			error!(tag = %Tag::Abort, "{}", e);
			ExitCode::FAILURE
		}
		Err(e) => {
			error!(tag = %Tag::Error, "{}", e);
			ExitCode::FAILURE
		}
	}
}


// vim: ts=4
