//! Delta archive builder
//!
//! One compressed archive per sync tick: the bytes of every added or
//! modified file at its codebase-relative path, plus a single JSON
//! manifest entry covering all diff entries including deletions.
//! Deletions carry no payload bytes; the manifest is their sole record.

use crate::error::PackageError;
use crate::types::{ArchiveManifest, FileStatus, SyncStatus};
use chrono::Utc;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Manifest directory inside the archive. Server-side convention; the
/// literal name is part of the wire contract.
pub const MANIFEST_DIR: &str = ".shenma_sync";

/// Identity of the codebase an archive belongs to.
#[derive(Debug, Clone)]
pub struct ArchiveSpec {
	pub client_id: String,
	pub codebase_name: String,
	pub codebase_path: PathBuf,
	pub codebase_id: String,
}

/// Archive filename: `<codebaseId>-<millis>.zip`, unique across
/// concurrent invocations for the same codebase.
pub fn archive_file_name(codebase_id: &str, millis: u128) -> String {
	format!("{}-{}.zip", codebase_id, millis)
}

/// Manifest entry path: `.shenma_sync/<YYYYMMDDHHMMSS>` (UTC).
pub fn manifest_entry_name(timestamp: chrono::DateTime<Utc>) -> String {
	format!("{}/{}", MANIFEST_DIR, timestamp.format("%Y%m%d%H%M%S"))
}

/// Build the upload archive for one diff under `upload_tmp`.
///
/// Returns the path of the finished archive. On any error the partial
/// file is removed before the error is returned.
pub async fn build_archive(
	spec: &ArchiveSpec,
	changes: &[FileStatus],
	upload_tmp: &Path,
) -> Result<PathBuf, PackageError> {
	let now = Utc::now();
	let millis = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis())
		.unwrap_or(0);

	let archive_path = upload_tmp.join(archive_file_name(&spec.codebase_id, millis));

	let mut file_list = BTreeMap::new();
	let mut payload = Vec::new();
	for change in changes {
		file_list.insert(change.path.clone(), change.status);
		if change.status != SyncStatus::Delete {
			payload.push((change.path.clone(), spec.codebase_path.join(&change.path)));
		}
	}

	let manifest = ArchiveManifest {
		client_id: spec.client_id.clone(),
		codebase_name: spec.codebase_name.clone(),
		codebase_path: spec.codebase_path.display().to_string(),
		file_list,
		timestamp: now.timestamp().max(0) as u64,
	};
	let manifest_bytes =
		serde_json::to_vec_pretty(&manifest).map_err(|e| PackageError::Manifest { source: e })?;
	let manifest_name = manifest_entry_name(now);

	let path = archive_path.clone();
	let result = tokio::task::spawn_blocking(move || {
		let written = write_zip(&path, &payload, &manifest_name, &manifest_bytes);
		if written.is_err() {
			let _ = std::fs::remove_file(&path);
		}
		written
	})
	.await
	.map_err(|e| PackageError::WriteFailed {
		path: archive_path.display().to_string(),
		message: e.to_string(),
	})?;

	result.map(|_| archive_path)
}

fn write_zip(
	archive_path: &Path,
	payload: &[(String, PathBuf)],
	manifest_name: &str,
	manifest_bytes: &[u8],
) -> Result<(), PackageError> {
	let file = std::fs::File::create(archive_path).map_err(|e| PackageError::WriteFailed {
		path: archive_path.display().to_string(),
		message: e.to_string(),
	})?;

	let mut zip = ZipWriter::new(file);
	let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

	for (relpath, abs_path) in payload {
		let bytes = std::fs::read(abs_path).map_err(|e| PackageError::ReadFailed {
			path: abs_path.display().to_string(),
			source: e,
		})?;

		zip.start_file(relpath.as_str(), options).map_err(|e| PackageError::WriteFailed {
			path: archive_path.display().to_string(),
			message: e.to_string(),
		})?;
		zip.write_all(&bytes).map_err(|e| PackageError::WriteFailed {
			path: archive_path.display().to_string(),
			message: e.to_string(),
		})?;
	}

	zip.start_file(manifest_name, options).map_err(|e| PackageError::WriteFailed {
		path: archive_path.display().to_string(),
		message: e.to_string(),
	})?;
	zip.write_all(manifest_bytes).map_err(|e| PackageError::WriteFailed {
		path: archive_path.display().to_string(),
		message: e.to_string(),
	})?;

	zip.finish().map_err(|e| PackageError::WriteFailed {
		path: archive_path.display().to_string(),
		message: e.to_string(),
	})?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn test_archive_file_name() {
		let name = archive_file_name("proj_abc", 1700000000000);
		assert_eq!(name, "proj_abc-1700000000000.zip");
	}

	#[test]
	fn test_manifest_entry_name_format() {
		let ts = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 42).unwrap();
		assert_eq!(manifest_entry_name(ts), ".shenma_sync/20250307090542");
	}
}

// vim: ts=4
