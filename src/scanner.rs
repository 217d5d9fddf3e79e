//! Hash-tree scanner: walk a codebase, fingerprint its files, and diff
//! two fingerprint trees.

use crate::error::ScanError;
use crate::exclusion::{normalize_relpath, IgnoreMatcher};
use crate::logging::*;
use crate::types::{FileStatus, HashTree, SyncStatus};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::path::Path;

/// SHA-256 over the whole buffer, lowercase hex.
///
/// The algorithm is part of the wire contract with the server and must
/// not change without a server-side migration.
pub fn hash_bytes(buf: &[u8]) -> String {
	let mut hasher = Sha256::new();
	hasher.update(buf);
	hex::encode(hasher.finalize())
}

/// Walk `root` and produce its hash tree.
///
/// Directories matching the ignore set are pruned before descending.
/// Regular files only; oversized and unreadable files are skipped with a
/// log entry, so a previously-seen file that becomes unreadable shows up
/// as a deletion on the next diff. A missing or unreadable root is fatal
/// for this codebase's tick.
pub async fn scan(
	root: &Path,
	matcher: &IgnoreMatcher,
	max_file_size: u64,
) -> Result<HashTree, ScanError> {
	let root_meta = tokio::fs::metadata(root)
		.await
		.map_err(|_| ScanError::RootNotFound { path: root.display().to_string() })?;
	if !root_meta.is_dir() {
		return Err(ScanError::RootNotFound { path: root.display().to_string() });
	}

	let mut tree = HashTree::new();
	let mut pending = VecDeque::new();
	pending.push_back(root.to_path_buf());

	while let Some(dir) = pending.pop_front() {
		let mut entries = tokio::fs::read_dir(&dir)
			.await
			.map_err(|e| ScanError::Walk { path: dir.display().to_string(), source: e })?;

		let mut collected = Vec::new();
		loop {
			match entries.next_entry().await {
				Ok(Some(entry)) => collected.push(entry),
				Ok(None) => break,
				Err(e) => {
					return Err(ScanError::Walk { path: dir.display().to_string(), source: e })
				}
			}
		}
		// Sorted order keeps the walk deterministic across runs
		collected.sort_by_key(|e| e.file_name());

		for entry in collected {
			let path = entry.path();
			let relpath = match normalize_relpath(root, &path) {
				Some(rel) => rel,
				None => continue,
			};

			let file_type = match entry.file_type().await {
				Ok(ft) => ft,
				Err(e) => {
					warn!("skipping {}: {}", path.display(), e);
					continue;
				}
			};

			if file_type.is_dir() {
				if !matcher.matches(&relpath, true) {
					pending.push_back(path);
				}
				continue;
			}

			// Regular files only; symlinks and special files are not
			// part of the tree.
			if !file_type.is_file() {
				continue;
			}

			if matcher.matches(&relpath, false) {
				continue;
			}

			let metadata = match entry.metadata().await {
				Ok(m) => m,
				Err(e) => {
					warn!("skipping {}: {}", path.display(), e);
					continue;
				}
			};

			if metadata.len() > max_file_size {
				debug!(
					"skipping {} ({} bytes over the {} byte limit)",
					relpath,
					metadata.len(),
					max_file_size
				);
				continue;
			}

			match tokio::fs::read(&path).await {
				Ok(bytes) => {
					tree.insert(relpath, hash_bytes(&bytes));
				}
				Err(e) => {
					warn!("skipping unreadable {}: {}", relpath, e);
				}
			}
		}
	}

	Ok(tree)
}

/// Three-way set difference of two hash trees.
///
/// Entries present only locally are adds, entries present only remotely
/// are deletes, and shared keys with differing hashes are modifications.
/// Equal hashes are omitted. The result is sorted by `(status, path)`
/// with `delete < modify < add`, so the output is deterministic.
pub fn diff(local: &HashTree, remote: &HashTree) -> Vec<FileStatus> {
	let mut changes = Vec::new();

	for (path, hash) in local {
		match remote.get(path) {
			None => changes.push(FileStatus::new(path, hash, SyncStatus::Add)),
			Some(remote_hash) if remote_hash != hash => {
				changes.push(FileStatus::new(path, hash, SyncStatus::Modify));
			}
			Some(_) => {}
		}
	}

	for path in remote.keys() {
		if !local.contains_key(path) {
			changes.push(FileStatus::new(path, "", SyncStatus::Delete));
		}
	}

	changes.sort_by(|a, b| a.status.cmp(&b.status).then_with(|| a.path.cmp(&b.path)));
	changes
}


// vim: ts=4
