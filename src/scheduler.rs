//! Periodic sync scheduler: single-flight ticks over the registry and
//! the per-codebase scan → diff → package → upload pipeline.

use crate::config::{ClientConfig, SharedClientConfig, SharedSyncConfig};
use crate::error::SyncError;
use crate::exclusion::IgnoreMatcher;
use crate::logging::*;
use crate::package::{self, ArchiveSpec};
use crate::registry::CodebaseRegistry;
use crate::scanner;
use crate::transport::{default_retry_decider, RetryDecider, SyncTransport, UploadRequest};
use crate::types::{unix_now, CodebaseRecord, HashTree};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of the scheduler loop. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
	Idle,
	Running,
	Stopped,
}

/// RAII guard for the per-tick single-flight flag.
///
/// Acquiring fails when a tick is already in flight; dropping the guard
/// releases the flag whatever way the tick ended.
struct TickGuard<'a> {
	flag: &'a AtomicBool,
}

impl<'a> TickGuard<'a> {
	fn acquire(flag: &'a AtomicBool) -> Option<Self> {
		flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.is_ok()
			.then_some(TickGuard { flag })
	}
}

impl Drop for TickGuard<'_> {
	fn drop(&mut self) {
		self.flag.store(false, Ordering::Release);
	}
}

pub struct SyncScheduler {
	registry: Arc<CodebaseRegistry>,
	transport: Arc<dyn SyncTransport>,
	sync_config: SharedSyncConfig,
	client_config: SharedClientConfig,
	upload_tmp: PathBuf,
	retry_decider: RetryDecider,
	tick_running: AtomicBool,
	state: Mutex<SchedulerState>,
	reconfig: Notify,
}

impl SyncScheduler {
	pub fn new(
		registry: Arc<CodebaseRegistry>,
		transport: Arc<dyn SyncTransport>,
		sync_config: SharedSyncConfig,
		client_config: SharedClientConfig,
		upload_tmp: PathBuf,
	) -> Self {
		SyncScheduler {
			registry,
			transport,
			sync_config,
			client_config,
			upload_tmp,
			retry_decider: default_retry_decider(),
			tick_running: AtomicBool::new(false),
			state: Mutex::new(SchedulerState::Idle),
			reconfig: Notify::new(),
		}
	}

	/// Override the retry classification predicate.
	pub fn with_retry_decider(mut self, decider: RetryDecider) -> Self {
		self.retry_decider = decider;
		self
	}

	pub fn state(&self) -> SchedulerState {
		self.state.lock().map(|s| *s).unwrap_or(SchedulerState::Stopped)
	}

	fn set_state(&self, state: SchedulerState) {
		if let Ok(mut guard) = self.state.lock() {
			*guard = state;
		}
	}

	/// Drive ticks at the configured interval until `cancel` fires.
	///
	/// An interval change signalled through `apply_config` restarts the
	/// current wait without touching an in-flight tick; a tick that is
	/// still running when the next interval elapses is not queued, the
	/// new tick is dropped with a log entry.
	pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
		self.set_state(SchedulerState::Running);
		info!("sync scheduler started");

		loop {
			let interval = self.tick_interval().await;
			tokio::select! {
				_ = tokio::time::sleep(interval) => {}
				_ = self.reconfig.notified() => {
					debug!("tick interval reconfigured, restarting wait");
					continue;
				}
				_ = cancel.cancelled() => break,
			}

			self.tick(&cancel).await;
		}

		self.set_state(SchedulerState::Stopped);
		info!("sync scheduler stopped");
	}

	async fn tick_interval(&self) -> Duration {
		let minutes = self.client_config.get().await.interval_minutes.max(1);
		Duration::from_secs(minutes * 60)
	}

	/// One pass over the registry: expire stale registrations, run the
	/// pipeline for everything else.
	pub async fn tick(&self, cancel: &CancellationToken) {
		let _guard = match TickGuard::acquire(&self.tick_running) {
			Some(guard) => guard,
			None => {
				info!("previous tick still running, dropping this one");
				return;
			}
		};

		if self.sync_config.get().await.is_none() {
			warn!("no access token shared yet, skipping tick");
			return;
		}

		let config = self.client_config.get().await;
		let matcher = self.build_matcher(&config);
		let snapshot = self.registry.get_all().await;
		let now = unix_now();

		for (id, record) in snapshot {
			if cancel.is_cancelled() {
				return;
			}

			let expired = record.register_time == 0
				|| now.saturating_sub(record.register_time)
					> config.register_expire_minutes * 60;
			if expired {
				info!("codebase {} registration expired, removing", id);
				if let Err(e) = self.registry.delete(&id).await {
					error!("failed to remove expired codebase {}: {}", id, e);
				}
				continue;
			}

			if let Err(e) = self.sync_codebase(&record, &config, &matcher, cancel).await {
				error!("sync of {} failed: {}", id, e);
			}
		}
	}

	fn build_matcher(&self, config: &ClientConfig) -> IgnoreMatcher {
		match IgnoreMatcher::new(&config.ignore_patterns) {
			Ok(matcher) => matcher,
			Err(e) => {
				warn!("invalid server ignore patterns, using defaults: {}", e);
				IgnoreMatcher::with_defaults()
			}
		}
	}

	/// The per-codebase pipeline: scan, diff against the stored or
	/// remote tree, package, upload with retry, persist.
	///
	/// The temp archive is removed whether the upload succeeds or not.
	/// On upload failure the stored hash tree is left unchanged so the
	/// next tick retries the same delta.
	pub async fn sync_codebase(
		&self,
		record: &CodebaseRecord,
		config: &ClientConfig,
		matcher: &IgnoreMatcher,
		cancel: &CancellationToken,
	) -> Result<(), SyncError> {
		let root = PathBuf::from(&record.codebase_path);
		let local = scanner::scan(&root, matcher, config.max_file_size_bytes()).await?;
		let now = unix_now();

		let remote = self.remote_tree(record, config, now).await;
		let changes = scanner::diff(&local, &remote);

		if changes.is_empty() {
			let mut updated = record.clone();
			updated.last_sync = now;
			self.registry.save(&updated).await?;
			debug!("{} is up to date", record.codebase_id);
			return Ok(());
		}

		info!("{}: uploading {} change(s)", record.codebase_id, changes.len());

		let spec = ArchiveSpec {
			client_id: record.client_id.clone(),
			codebase_name: record.codebase_name.clone(),
			codebase_path: root,
			codebase_id: record.codebase_id.clone(),
		};
		let archive = package::build_archive(&spec, &changes, &self.upload_tmp).await?;

		let request = UploadRequest {
			client_id: record.client_id.clone(),
			codebase_path: record.codebase_path.clone(),
			codebase_name: record.codebase_name.clone(),
		};
		let uploaded = self.upload_with_retry(&archive, &request, config, cancel).await;

		if let Err(e) = tokio::fs::remove_file(&archive).await {
			warn!("failed to remove temp archive {}: {}", archive.display(), e);
		}
		uploaded?;

		let mut updated = record.clone();
		updated.hash_tree = local;
		updated.last_sync = unix_now();
		self.registry.save(&updated).await?;
		info!("{} synced, {} file(s) tracked", updated.codebase_id, updated.hash_tree.len());
		Ok(())
	}

	/// Diff base for a record: the stored tree when it is non-empty and
	/// fresh, the server's tree otherwise. A failed remote fetch
	/// degrades to an empty tree, which forces a full upload.
	async fn remote_tree(
		&self,
		record: &CodebaseRecord,
		config: &ClientConfig,
		now: u64,
	) -> HashTree {
		let stale = record.last_sync == 0
			|| now.saturating_sub(record.last_sync) > config.hash_tree_expire_hours * 3600;
		if !record.hash_tree.is_empty() && !stale {
			return record.hash_tree.clone();
		}

		match self.transport.fetch_remote_tree(&record.codebase_path).await {
			Ok(tree) => tree,
			Err(e) => {
				warn!(
					"remote tree fetch for {} failed, forcing full upload: {}",
					record.codebase_id, e
				);
				HashTree::new()
			}
		}
	}

	/// Upload with linear backoff: up to `max_retries` attempts, the
	/// delay before the k-th retry is `retry_delay_seconds × k`. The
	/// abort predicate short-circuits the whole loop; cancellation
	/// during a backoff sleep abandons the remaining attempts.
	async fn upload_with_retry(
		&self,
		archive: &std::path::Path,
		request: &UploadRequest,
		config: &ClientConfig,
		cancel: &CancellationToken,
	) -> Result<(), SyncError> {
		let attempts = config.max_retries.max(1);
		let mut last_err = None;

		for attempt in 1..=attempts {
			if attempt > 1 {
				let delay =
					Duration::from_secs(config.retry_delay_seconds * (attempt as u64 - 1));
				debug!("upload attempt {}/{} in {:?}", attempt, attempts, delay);
				tokio::select! {
					_ = tokio::time::sleep(delay) => {}
					_ = cancel.cancelled() => return Err(SyncError::Cancelled),
				}
			}

			let attempt_result = tokio::select! {
				result = self.transport.upload_archive(archive, request) => result,
				_ = cancel.cancelled() => return Err(SyncError::Cancelled),
			};

			match attempt_result {
				Ok(()) => return Ok(()),
				Err(e) => {
					if !(self.retry_decider)(&e) {
						error!("upload aborted without retry: {}", e);
						return Err(SyncError::Transport(e));
					}
					warn!("upload attempt {}/{} failed: {}", attempt, attempts, e);
					last_err = Some(e);
				}
			}
		}

		Err(last_err
			.map(SyncError::Transport)
			.unwrap_or(SyncError::Other { message: "upload failed".to_string() }))
	}

	/// On-demand sync of a specific record set under a deadline.
	///
	/// The deadline defaults to the tick interval. Per-codebase errors
	/// are logged and do not stop the remaining records; running past
	/// the deadline is reported as `DeadlineExceeded` with a timeout
	/// warning.
	pub async fn sync_now(
		&self,
		records: Vec<CodebaseRecord>,
		deadline: Option<Duration>,
		cancel: &CancellationToken,
	) -> Result<(), SyncError> {
		let config = self.client_config.get().await;
		let deadline = deadline.unwrap_or(Duration::from_secs(
			config.interval_minutes.max(1) * 60,
		));
		let matcher = self.build_matcher(&config);

		let work = async {
			for record in &records {
				if cancel.is_cancelled() {
					return Err(SyncError::Cancelled);
				}
				if let Err(e) = self.sync_codebase(record, &config, &matcher, cancel).await {
					error!("on-demand sync of {} failed: {}", record.codebase_id, e);
				}
			}
			Ok(())
		};

		match tokio::time::timeout(deadline, work).await {
			Ok(result) => result,
			Err(_) => {
				warn!("on-demand sync timed out after {:?}", deadline);
				Err(SyncError::DeadlineExceeded)
			}
		}
	}

	/// Apply a new tuning config. An interval change restarts the
	/// ticker wait; other parameters are picked up by the next tick.
	pub async fn apply_config(&self, new: ClientConfig) {
		let old = self.client_config.get().await;
		let interval_changed = old.interval_minutes != new.interval_minutes;
		self.client_config.replace(new).await;

		if interval_changed {
			info!("tick interval changed, restarting ticker");
			self.reconfig.notify_one();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_tick_guard_single_flight() {
		let flag = AtomicBool::new(false);

		let first = TickGuard::acquire(&flag);
		assert!(first.is_some());
		assert!(TickGuard::acquire(&flag).is_none());

		drop(first);
		assert!(TickGuard::acquire(&flag).is_some());
	}
}

// vim: ts=4
