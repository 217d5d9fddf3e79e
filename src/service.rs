//! Handler surface consumed by the external RPC layer.
//!
//! These are the operations the editor plugin drives: registration,
//! on-demand sync, unregistration, token sharing and version info. The
//! RPC plumbing itself lives outside the core; this module is the
//! contract it calls into.

use crate::config::{SharedSyncConfig, SyncConfig};
use crate::error::ServiceError;
use crate::logging::*;
use crate::registry::CodebaseRegistry;
use crate::scheduler::SyncScheduler;
use crate::types::{app_info, codebase_id, unix_now, AppInfo, CodebaseRecord};
use crate::workspace;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct SyncService {
	registry: Arc<CodebaseRegistry>,
	scheduler: Arc<SyncScheduler>,
	sync_config: SharedSyncConfig,
	cancel: CancellationToken,
}

impl SyncService {
	pub fn new(
		registry: Arc<CodebaseRegistry>,
		scheduler: Arc<SyncScheduler>,
		sync_config: SharedSyncConfig,
		cancel: CancellationToken,
	) -> Self {
		SyncService { registry, scheduler, sync_config, cancel }
	}

	/// Register a workspace: resolve its codebases, upsert records, and
	/// kick an on-demand sync for newly created ones when auth is
	/// already present.
	///
	/// Returns the codebase ids now registered for the workspace.
	pub async fn register_sync(
		&self,
		client_id: &str,
		workspace_path: &str,
		workspace_name: &str,
	) -> Result<Vec<String>, ServiceError> {
		validate_workspace_args(client_id, workspace_path, workspace_name)?;

		let codebases = resolve(workspace_path, workspace_name)?;
		let (all, fresh) = self.upsert_records(client_id, codebases).await?;

		info!(
			"registered workspace {} ({} codebase(s), {} new)",
			workspace_path,
			all.len(),
			fresh.len()
		);
		self.trigger_sync(fresh).await;

		Ok(all.into_iter().map(|r| r.codebase_id).collect())
	}

	/// Upsert the workspace's codebases and sync all of them on demand.
	///
	/// `file_paths` is accepted for interface compatibility; the
	/// pipeline always diffs the whole codebase, so the scan is the
	/// source of truth for what changed.
	pub async fn sync_codebase(
		&self,
		client_id: &str,
		workspace_path: &str,
		workspace_name: &str,
		file_paths: Option<Vec<String>>,
	) -> Result<(), ServiceError> {
		validate_workspace_args(client_id, workspace_path, workspace_name)?;
		if let Some(paths) = &file_paths {
			debug!("sync request mentions {} changed path(s)", paths.len());
		}

		let codebases = resolve(workspace_path, workspace_name)?;
		let (all, _fresh) = self.upsert_records(client_id, codebases).await?;

		self.trigger_sync(all).await;
		Ok(())
	}

	/// Remove every record the workspace resolves to.
	pub async fn unregister_sync(
		&self,
		client_id: &str,
		workspace_path: &str,
		workspace_name: &str,
	) -> Result<(), ServiceError> {
		validate_workspace_args(client_id, workspace_path, workspace_name)?;

		let codebases = resolve(workspace_path, workspace_name)?;
		for (path, name) in codebases {
			let id = codebase_id(&name, &path.display().to_string());
			self.registry.delete(&id).await?;
			info!("unregistered codebase {}", id);
		}
		Ok(())
	}

	/// Replace the process-wide auth triple.
	pub async fn share_access_token(
		&self,
		client_id: &str,
		server_endpoint: &str,
		token: &str,
	) -> Result<(), ServiceError> {
		if client_id.is_empty() || server_endpoint.is_empty() || token.is_empty() {
			return Err(ServiceError::InvalidArgument {
				message: "clientId, serverEndpoint and token are all required".to_string(),
			});
		}

		self.sync_config
			.set(SyncConfig {
				client_id: client_id.to_string(),
				server_url: server_endpoint.to_string(),
				token: token.to_string(),
			})
			.await;
		info!("access token shared for client {}", client_id);
		Ok(())
	}

	pub fn get_version(&self) -> AppInfo {
		app_info()
	}

	async fn upsert_records(
		&self,
		client_id: &str,
		codebases: Vec<(PathBuf, String)>,
	) -> Result<(Vec<CodebaseRecord>, Vec<CodebaseRecord>), ServiceError> {
		let now = unix_now();
		let mut all = Vec::with_capacity(codebases.len());
		let mut fresh = Vec::new();

		for (path, name) in codebases {
			let path_str = path.display().to_string();
			let id = codebase_id(&name, &path_str);

			match self.registry.get(&id).await {
				Some(mut existing) => {
					// Re-registration refreshes the expiry clock and the
					// owning client but keeps the synced tree.
					existing.register_time = now;
					existing.client_id = client_id.to_string();
					self.registry.save(&existing).await?;
					all.push(existing);
				}
				None => {
					let record = CodebaseRecord::new(client_id, &name, &path_str, now);
					self.registry.save(&record).await?;
					fresh.push(record.clone());
					all.push(record);
				}
			}
		}

		Ok((all, fresh))
	}

	/// Detached on-demand sync; a no-op without records or auth.
	async fn trigger_sync(&self, records: Vec<CodebaseRecord>) {
		if records.is_empty() {
			return;
		}
		if self.sync_config.get().await.is_none() {
			debug!("on-demand sync deferred: no access token yet");
			return;
		}

		let scheduler = Arc::clone(&self.scheduler);
		let cancel = self.cancel.child_token();
		tokio::spawn(async move {
			if let Err(e) = scheduler.sync_now(records, None, &cancel).await {
				warn!("on-demand sync failed: {}", e);
			}
		});
	}
}

fn validate_workspace_args(
	client_id: &str,
	workspace_path: &str,
	workspace_name: &str,
) -> Result<(), ServiceError> {
	if client_id.is_empty() {
		return Err(ServiceError::InvalidArgument { message: "clientId is required".to_string() });
	}
	if workspace_path.is_empty() {
		return Err(ServiceError::InvalidArgument {
			message: "workspacePath is required".to_string(),
		});
	}
	if workspace_name.is_empty() {
		return Err(ServiceError::InvalidArgument {
			message: "workspaceName is required".to_string(),
		});
	}
	Ok(())
}

fn resolve(
	workspace_path: &str,
	workspace_name: &str,
) -> Result<Vec<(PathBuf, String)>, ServiceError> {
	workspace::resolve_codebases(Path::new(workspace_path), workspace_name).map_err(|e| {
		ServiceError::Workspace { path: workspace_path.to_string(), source: e }
	})
}

// vim: ts=4
