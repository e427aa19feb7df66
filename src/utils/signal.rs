//! Shutdown signal handling for continuous mode

use std::future::Future;
use tracing::{debug, warn};

/// Which signal asked us to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
	Interrupt,
	Terminate,
}

/// Install SIGINT/SIGTERM handlers now and return a future that resolves on
/// the first of them (Ctrl+C elsewhere).
///
/// Handlers are registered when this is called, not when the future is first
/// polled, so a signal arriving before anyone awaits it is not lost and does
/// not kill the process. Must be called from within a tokio runtime.
#[cfg(unix)]
pub fn shutdown_signal() -> impl Future<Output = ShutdownReason> + Send {
	use tokio::signal::unix::{signal, SignalKind};

	let sigterm = signal(SignalKind::terminate())
		.map_err(|e| warn!("Failed to setup SIGTERM handler: {}", e))
		.ok();
	let sigint = signal(SignalKind::interrupt())
		.map_err(|e| warn!("Failed to setup SIGINT handler: {}", e))
		.ok();

	async move {
		match (sigterm, sigint) {
			(Some(mut sigterm), Some(mut sigint)) => tokio::select! {
				_ = sigterm.recv() => {
					debug!("Received SIGTERM, shutting down...");
					ShutdownReason::Terminate
				}
				_ = sigint.recv() => {
					debug!("Received SIGINT, shutting down...");
					ShutdownReason::Interrupt
				}
			},
			(Some(mut sigterm), None) => {
				sigterm.recv().await;
				ShutdownReason::Terminate
			}
			(None, Some(mut sigint)) => {
				sigint.recv().await;
				ShutdownReason::Interrupt
			}
			(None, None) => ctrl_c().await,
		}
	}
}

#[cfg(not(unix))]
pub fn shutdown_signal() -> impl Future<Output = ShutdownReason> + Send {
	ctrl_c()
}

async fn ctrl_c() -> ShutdownReason {
	if let Err(e) = tokio::signal::ctrl_c().await {
		warn!("Failed to listen for Ctrl+C: {}", e);
		// Nothing left to wait on; keep running until killed
		std::future::pending::<()>().await;
	}
	debug!("Received Ctrl+C, shutting down...");
	ShutdownReason::Interrupt
}


// vim: ts=4
