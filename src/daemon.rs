//! Daemon lifecycle: owns the scheduler task and the periodic
//! config-refresh task, and coordinates shutdown.

use crate::config::SharedClientConfig;
use crate::error::TransportError;
use crate::logging::*;
use crate::scheduler::SyncScheduler;
use crate::transport::SyncTransport;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How often the server tuning config is re-fetched.
const CONFIG_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

pub struct SyncDaemon {
	scheduler: Arc<SyncScheduler>,
	transport: Arc<dyn SyncTransport>,
	client_config: SharedClientConfig,
	upload_tmp: PathBuf,
	cancel: CancellationToken,
	tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
	shutdown_started: AtomicBool,
}

impl SyncDaemon {
	pub fn new(
		scheduler: Arc<SyncScheduler>,
		transport: Arc<dyn SyncTransport>,
		client_config: SharedClientConfig,
		upload_tmp: PathBuf,
	) -> Self {
		SyncDaemon {
			scheduler,
			transport,
			client_config,
			upload_tmp,
			cancel: CancellationToken::new(),
			tasks: tokio::sync::Mutex::new(Vec::new()),
			shutdown_started: AtomicBool::new(false),
		}
	}

	/// Root cancellation handle; children of this token propagate
	/// shutdown into in-flight pipelines and on-demand syncs.
	pub fn cancel_token(&self) -> CancellationToken {
		self.cancel.child_token()
	}

	/// Spawn the scheduler loop and the hourly config-refresh loop.
	pub async fn start(&self) {
		let mut tasks = self.tasks.lock().await;

		let scheduler = Arc::clone(&self.scheduler);
		let scheduler_cancel = self.cancel.child_token();
		tasks.push(tokio::spawn(async move {
			scheduler.run(scheduler_cancel).await;
		}));

		let refresh_cancel = self.cancel.child_token();
		let scheduler = Arc::clone(&self.scheduler);
		let transport = Arc::clone(&self.transport);
		let client_config = self.client_config.clone();
		tasks.push(tokio::spawn(async move {
			refresh_loop(scheduler, transport, client_config, refresh_cancel).await;
		}));

		info!("daemon started");
	}

	/// Cancel everything, await both loops, clean the upload-temp
	/// directory. Safe to call more than once; only the first call does
	/// the work.
	pub async fn shutdown(&self) {
		if self.shutdown_started.swap(true, Ordering::AcqRel) {
			return;
		}

		info!("daemon shutting down");
		self.cancel.cancel();

		let mut tasks = self.tasks.lock().await;
		for task in tasks.drain(..) {
			if let Err(e) = task.await {
				warn!("daemon task ended abnormally: {}", e);
			}
		}

		clean_dir(&self.upload_tmp).await;
		info!("daemon shutdown complete");
	}
}

/// Fetch the tuning config once at startup and then hourly; a changed
/// config is pushed into the scheduler.
async fn refresh_loop(
	scheduler: Arc<SyncScheduler>,
	transport: Arc<dyn SyncTransport>,
	client_config: SharedClientConfig,
	cancel: CancellationToken,
) {
	refresh_once(&scheduler, &transport, &client_config).await;

	loop {
		tokio::select! {
			_ = tokio::time::sleep(CONFIG_REFRESH_INTERVAL) => {}
			_ = cancel.cancelled() => return,
		}
		refresh_once(&scheduler, &transport, &client_config).await;
	}
}

async fn refresh_once(
	scheduler: &Arc<SyncScheduler>,
	transport: &Arc<dyn SyncTransport>,
	client_config: &SharedClientConfig,
) {
	match transport.fetch_client_config().await {
		Ok(fetched) => {
			let current = client_config.get().await;
			if fetched != current {
				info!("client config changed on server, applying");
				scheduler.apply_config(fetched).await;
			}
		}
		Err(TransportError::NoAuth) => {
			debug!("config refresh skipped: no access token yet");
		}
		Err(e) => {
			warn!("config refresh failed: {}", e);
		}
	}
}

/// Remove everything inside `dir`, leaving the directory itself.
async fn clean_dir(dir: &PathBuf) {
	let mut entries = match tokio::fs::read_dir(dir).await {
		Ok(entries) => entries,
		Err(_) => return,
	};

	while let Ok(Some(entry)) = entries.next_entry().await {
		let path = entry.path();
		let removed = if path.is_dir() {
			tokio::fs::remove_dir_all(&path).await
		} else {
			tokio::fs::remove_file(&path).await
		};
		if let Err(e) = removed {
			warn!("failed to clean {}: {}", path.display(), e);
		}
	}
}

// vim: ts=4
