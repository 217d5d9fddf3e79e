//! Codebase registry: a thread-safe in-memory map of codebase records
//! mirrored to one pretty-printed JSON file per record.
//!
//! Writes go to disk first and memory second, so a successful `save` is
//! durable and a failed one leaves memory untouched. Deletions remove the
//! file first and the memory entry unconditionally afterwards.

use crate::error::RegistryError;
use crate::logging::*;
use crate::types::CodebaseRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// On-disk subdirectory under the cache dir holding one file per record.
const CODEBASE_DIR: &str = "codebase";

pub struct CodebaseRegistry {
	dir: PathBuf,
	records: RwLock<BTreeMap<String, CodebaseRecord>>,
}

impl CodebaseRegistry {
	/// Open the registry under `<cache_dir>/codebase`, creating the
	/// directory if needed and loading every record file.
	///
	/// Files that fail to parse or whose `codebaseId` does not match
	/// their filename are skipped with an error log.
	pub async fn open(cache_dir: &Path) -> Result<Self, RegistryError> {
		let dir = cache_dir.join(CODEBASE_DIR);
		tokio::fs::create_dir_all(&dir).await.map_err(|e| RegistryError::LoadFailed {
			path: dir.display().to_string(),
			source: e,
		})?;

		let mut records = BTreeMap::new();
		let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
			RegistryError::LoadFailed { path: dir.display().to_string(), source: e }
		})?;

		loop {
			let entry = match entries.next_entry().await {
				Ok(Some(entry)) => entry,
				Ok(None) => break,
				Err(e) => {
					return Err(RegistryError::LoadFailed {
						path: dir.display().to_string(),
						source: e,
					})
				}
			};

			let path = entry.path();
			if !path.is_file() {
				continue;
			}
			let file_name = entry.file_name().to_string_lossy().to_string();

			match load_record(&path).await {
				Ok(record) if record.codebase_id == file_name => {
					records.insert(record.codebase_id.clone(), record);
				}
				Ok(record) => {
					error!(
						"skipping {}: codebaseId '{}' does not match filename",
						path.display(),
						record.codebase_id
					);
				}
				Err(e) => {
					error!("skipping {}: {}", path.display(), e);
				}
			}
		}

		info!("registry loaded {} codebase record(s) from {}", records.len(), dir.display());
		Ok(CodebaseRegistry { dir, records: RwLock::new(records) })
	}

	fn record_path(&self, id: &str) -> PathBuf {
		self.dir.join(id)
	}

	/// Look up a record: memory first, disk fallback memoized.
	pub async fn get(&self, id: &str) -> Option<CodebaseRecord> {
		if let Some(record) = self.records.read().await.get(id) {
			return Some(record.clone());
		}

		let path = self.record_path(id);
		match load_record(&path).await {
			Ok(record) if record.codebase_id == id => {
				let mut records = self.records.write().await;
				records.insert(record.codebase_id.clone(), record.clone());
				Some(record)
			}
			_ => None,
		}
	}

	/// Snapshot of all records, safe for iteration.
	///
	/// The snapshot is a deep clone: mutating a returned record has no
	/// effect until it goes back through `save`.
	pub async fn get_all(&self) -> BTreeMap<String, CodebaseRecord> {
		self.records.read().await.clone()
	}

	/// Number of records currently in memory.
	pub async fn len(&self) -> usize {
		self.records.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.records.read().await.is_empty()
	}

	/// Persist a record: pretty JSON to `<dir>/<codebaseId>`, then the
	/// in-memory map. A serialization or write failure leaves memory
	/// unchanged.
	pub async fn save(&self, record: &CodebaseRecord) -> Result<(), RegistryError> {
		let json = serde_json::to_vec_pretty(record).map_err(|e| RegistryError::Serialize {
			id: record.codebase_id.clone(),
			source: e,
		})?;

		let path = self.record_path(&record.codebase_id);
		tokio::fs::write(&path, json).await.map_err(|e| RegistryError::WriteFailed {
			path: path.display().to_string(),
			source: e,
		})?;

		let mut records = self.records.write().await;
		records.insert(record.codebase_id.clone(), record.clone());
		Ok(())
	}

	/// Delete a record: on-disk file first, memory second. A missing
	/// file is not an error; the memory entry is removed either way.
	pub async fn delete(&self, id: &str) -> Result<(), RegistryError> {
		let path = self.record_path(id);
		match tokio::fs::remove_file(&path).await {
			Ok(()) => {}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => {
				return Err(RegistryError::DeleteFailed {
					path: path.display().to_string(),
					source: e,
				})
			}
		}

		self.records.write().await.remove(id);
		Ok(())
	}
}

async fn load_record(path: &Path) -> Result<CodebaseRecord, String> {
	let contents = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
	serde_json::from_slice(&contents).map_err(|e| e.to_string())
}


// vim: ts=4
