//! Core data types shared across the sync pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Flat mapping from codebase-relative path to hex content hash.
///
/// Keys always use `/` separators, regardless of host platform. A BTreeMap
/// keeps iteration and serialization order stable across runs.
pub type HashTree = BTreeMap<String, String>;

/// Diff status of a single file between two hash trees.
///
/// The variant order is significant: diff results are sorted by
/// `(status, path)` and deletions sort first so that a reader of the
/// manifest sees removals before payload entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
	Delete,
	Modify,
	Add,
}

impl SyncStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			SyncStatus::Delete => "delete",
			SyncStatus::Modify => "modify",
			SyncStatus::Add => "add",
		}
	}
}

/// One entry of a hash-tree diff.
///
/// `hash` is the new content hash for adds and modifications and empty for
/// deletions. `path` is codebase-relative with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
	pub path: String,
	pub hash: String,
	pub status: SyncStatus,
}

impl FileStatus {
	pub fn new(path: impl Into<String>, hash: impl Into<String>, status: SyncStatus) -> Self {
		FileStatus { path: path.into(), hash: hash.into(), status }
	}
}

/// The unit of persistence and synchronization.
///
/// One record per registered codebase, mirrored to
/// `<cacheDir>/codebase/<codebase_id>` as pretty-printed JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodebaseRecord {
	/// Opaque client identifier supplied by the editor
	pub client_id: String,

	/// Display name of the codebase
	pub codebase_name: String,

	/// Absolute path of the codebase root
	pub codebase_path: String,

	/// Stable identifier, also the on-disk filename
	pub codebase_id: String,

	/// Last server-acknowledged hash tree; empty forces a full sync
	pub hash_tree: HashTree,

	/// Unix seconds of the last successful upload, 0 if never
	pub last_sync: u64,

	/// Unix seconds of (re-)registration; drives expiration
	pub register_time: u64,
}

impl Default for CodebaseRecord {
	fn default() -> Self {
		CodebaseRecord {
			client_id: String::new(),
			codebase_name: String::new(),
			codebase_path: String::new(),
			codebase_id: String::new(),
			hash_tree: HashTree::new(),
			last_sync: 0,
			register_time: 0,
		}
	}
}

impl CodebaseRecord {
	/// Create a fresh record with an empty hash tree.
	pub fn new(
		client_id: impl Into<String>,
		codebase_name: impl Into<String>,
		codebase_path: impl Into<String>,
		register_time: u64,
	) -> Self {
		let codebase_name = codebase_name.into();
		let codebase_path = codebase_path.into();
		let codebase_id = codebase_id(&codebase_name, &codebase_path);

		CodebaseRecord {
			client_id: client_id.into(),
			codebase_name,
			codebase_path,
			codebase_id,
			hash_tree: HashTree::new(),
			last_sync: 0,
			register_time,
		}
	}
}

/// Stable codebase identifier: `<name>_<lowerhex(md5(path))>`.
///
/// The md5 digest is over the absolute path, so the id survives restarts
/// and renames of nothing but the registration itself.
pub fn codebase_id(codebase_name: &str, codebase_path: &str) -> String {
	let digest = md5::compute(codebase_path.as_bytes());
	format!("{}_{:x}", codebase_name, digest)
}

/// JSON descriptor embedded in every upload archive.
///
/// `file_list` covers all diff entries including deletions; deletions have
/// no payload bytes in the archive, the manifest is their sole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveManifest {
	pub client_id: String,
	pub codebase_name: String,
	pub codebase_path: String,
	pub file_list: BTreeMap<String, SyncStatus>,
	/// Unix seconds at archive build time
	pub timestamp: u64,
}

/// Static application info served by the version handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
	pub name: String,
	pub version: String,
	pub os: String,
	pub arch: String,
}

/// Build the static app info from compile-time metadata.
pub fn app_info() -> AppInfo {
	AppInfo {
		name: env!("CARGO_PKG_NAME").to_string(),
		version: env!("CARGO_PKG_VERSION").to_string(),
		os: std::env::consts::OS.to_string(),
		arch: std::env::consts::ARCH.to_string(),
	}
}

/// Current time as Unix seconds.
pub fn unix_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_codebase_id_stable() {
		let a = codebase_id("proj", "/home/user/proj");
		let b = codebase_id("proj", "/home/user/proj");
		assert_eq!(a, b);
		assert!(a.starts_with("proj_"));
		// md5 hex digest is 32 chars
		assert_eq!(a.len(), "proj_".len() + 32);
	}

	#[test]
	fn test_codebase_id_differs_by_path() {
		let a = codebase_id("proj", "/home/user/proj");
		let b = codebase_id("proj", "/home/other/proj");
		assert_ne!(a, b);
	}

	#[test]
	fn test_status_ordering() {
		assert!(SyncStatus::Delete < SyncStatus::Modify);
		assert!(SyncStatus::Modify < SyncStatus::Add);
	}

	#[test]
	fn test_status_serde() {
		assert_eq!(serde_json::to_string(&SyncStatus::Add).unwrap(), "\"add\"");
		assert_eq!(serde_json::to_string(&SyncStatus::Delete).unwrap(), "\"delete\"");
		let s: SyncStatus = serde_json::from_str("\"modify\"").unwrap();
		assert_eq!(s, SyncStatus::Modify);
	}

	#[test]
	fn test_record_roundtrip() {
		let mut record = CodebaseRecord::new("client-1", "proj", "/home/user/proj", 1234);
		record.hash_tree.insert("src/main.rs".to_string(), "abc123".to_string());
		record.last_sync = 5678;

		let json = serde_json::to_string_pretty(&record).unwrap();
		let parsed: CodebaseRecord = serde_json::from_str(&json).unwrap();
		assert_eq!(record, parsed);
	}

	#[test]
	fn test_record_defaults_on_missing_fields() {
		// Older record files may lack fields added later
		let json = r#"{"clientId": "c", "codebaseName": "n", "codebasePath": "/p", "codebaseId": "n_x"}"#;
		let parsed: CodebaseRecord = serde_json::from_str(json).unwrap();
		assert_eq!(parsed.last_sync, 0);
		assert!(parsed.hash_tree.is_empty());
	}

	#[test]
	fn test_manifest_shape() {
		let mut file_list = BTreeMap::new();
		file_list.insert("a.go".to_string(), SyncStatus::Add);
		file_list.insert("b.go".to_string(), SyncStatus::Delete);

		let manifest = ArchiveManifest {
			client_id: "c".to_string(),
			codebase_name: "n".to_string(),
			codebase_path: "/p".to_string(),
			file_list,
			timestamp: 42,
		};

		let json = serde_json::to_value(&manifest).unwrap();
		assert_eq!(json["clientId"], "c");
		assert_eq!(json["fileList"]["a.go"], "add");
		assert_eq!(json["fileList"]["b.go"], "delete");
		assert_eq!(json["timestamp"], 42);
	}
}

// vim: ts=4
