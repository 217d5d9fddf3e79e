//! Process-wide configuration: the auth triple shared by the editor and
//! the tuning parameters fetched from the server.
//!
//! Both are modeled as small typed holders with atomic replacement behind
//! a read-write lock, passed into components by reference. This keeps them
//! injectable in tests instead of being true globals.

use crate::exclusion;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Auth triple shared by the editor plugin.
///
/// Absent until the editor calls `share_access_token`; the scheduler skips
/// ticks while it is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
	pub client_id: String,
	pub server_url: String,
	pub token: String,
}

/// Tuning parameters fetched from the server.
///
/// Read-mostly; replaced atomically by the daemon's refresh loop. Until
/// the first successful fetch the built-in defaults apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
	/// Registrations older than this are deleted on the next tick
	pub register_expire_minutes: u64,

	/// A stored hash tree older than this is bypassed in favor of a
	/// fresh remote fetch
	pub hash_tree_expire_hours: u64,

	/// Scheduler tick interval
	pub interval_minutes: u64,

	/// Files larger than this are excluded from the scan
	pub max_file_size_mb: u64,

	/// Upload attempts per sync, including the first
	pub max_retries: u32,

	/// Linear backoff unit between upload attempts
	pub retry_delay_seconds: u64,

	/// Ordered ignore patterns; first match wins
	pub ignore_patterns: Vec<String>,
}

impl Default for ClientConfig {
	fn default() -> Self {
		ClientConfig {
			register_expire_minutes: 1440,
			hash_tree_expire_hours: 24,
			interval_minutes: 5,
			max_file_size_mb: 10,
			max_retries: 3,
			retry_delay_seconds: 5,
			ignore_patterns: exclusion::default_ignore_patterns(),
		}
	}
}

impl ClientConfig {
	pub fn max_file_size_bytes(&self) -> u64 {
		self.max_file_size_mb * 1024 * 1024
	}
}

/// Shared holder for the auth triple.
#[derive(Clone, Default)]
pub struct SharedSyncConfig {
	inner: Arc<RwLock<Option<SyncConfig>>>,
}

impl SharedSyncConfig {
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of the current auth config, if any.
	pub async fn get(&self) -> Option<SyncConfig> {
		self.inner.read().await.clone()
	}

	/// Replace the auth config wholesale.
	pub async fn set(&self, config: SyncConfig) {
		*self.inner.write().await = Some(config);
	}
}

/// Shared holder for the server tuning config.
#[derive(Clone)]
pub struct SharedClientConfig {
	inner: Arc<RwLock<ClientConfig>>,
}

impl Default for SharedClientConfig {
	fn default() -> Self {
		SharedClientConfig { inner: Arc::new(RwLock::new(ClientConfig::default())) }
	}
}

impl SharedClientConfig {
	pub fn new(config: ClientConfig) -> Self {
		SharedClientConfig { inner: Arc::new(RwLock::new(config)) }
	}

	/// Snapshot of the current tuning config.
	pub async fn get(&self) -> ClientConfig {
		self.inner.read().await.clone()
	}

	/// Replace the tuning config wholesale.
	pub async fn replace(&self, config: ClientConfig) {
		*self.inner.write().await = config;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_client_config_defaults() {
		let config = ClientConfig::default();
		assert_eq!(config.interval_minutes, 5);
		assert_eq!(config.max_retries, 3);
		assert_eq!(config.max_file_size_bytes(), 10 * 1024 * 1024);
		assert!(!config.ignore_patterns.is_empty());
	}

	#[test]
	fn test_client_config_partial_json() {
		// The server may ship only a subset of fields
		let json = r#"{"intervalMinutes": 10, "maxRetries": 5}"#;
		let config: ClientConfig = serde_json::from_str(json).unwrap();
		assert_eq!(config.interval_minutes, 10);
		assert_eq!(config.max_retries, 5);
		assert_eq!(config.retry_delay_seconds, 5);
	}

	#[tokio::test]
	async fn test_shared_sync_config_replacement() {
		let shared = SharedSyncConfig::new();
		assert!(shared.get().await.is_none());

		shared
			.set(SyncConfig {
				client_id: "c".to_string(),
				server_url: "http://localhost".to_string(),
				token: "t".to_string(),
			})
			.await;

		let got = shared.get().await.unwrap();
		assert_eq!(got.client_id, "c");

		shared
			.set(SyncConfig {
				client_id: "c2".to_string(),
				server_url: "http://localhost".to_string(),
				token: "t2".to_string(),
			})
			.await;
		assert_eq!(shared.get().await.unwrap().client_id, "c2");
	}

	#[tokio::test]
	async fn test_shared_client_config_replacement() {
		let shared = SharedClientConfig::default();
		assert_eq!(shared.get().await.interval_minutes, 5);

		let mut updated = ClientConfig::default();
		updated.interval_minutes = 1;
		shared.replace(updated).await;
		assert_eq!(shared.get().await.interval_minutes, 1);
	}
}

// vim: ts=4
