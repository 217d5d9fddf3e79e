//! Workspace resolver: map an editor workspace onto codebase roots by
//! git-repo sniffing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Resolve `(workspace_path, workspace_name)` into codebase roots.
///
/// Rules, applied top-down:
/// 1. The workspace itself is a git repository: the workspace is the
///    single codebase.
/// 2. Otherwise every immediate child with a `.git` directory is a
///    codebase, named after its basename.
/// 3. Otherwise the workspace itself is registered as a last resort.
///
/// Directory read errors surface to the caller unchanged.
pub fn resolve_codebases(
	workspace_path: &Path,
	workspace_name: &str,
) -> io::Result<Vec<(PathBuf, String)>> {
	if is_git_root(workspace_path) {
		return Ok(vec![(workspace_path.to_path_buf(), workspace_name.to_string())]);
	}

	let mut found = Vec::new();
	for entry in fs::read_dir(workspace_path)? {
		let entry = entry?;
		let path = entry.path();
		if path.is_dir() && is_git_root(&path) {
			let name = path
				.file_name()
				.map(|n| n.to_string_lossy().to_string())
				.unwrap_or_else(|| workspace_name.to_string());
			found.push((path, name));
		}
	}
	found.sort_by(|a, b| a.0.cmp(&b.0));

	if found.is_empty() {
		found.push((workspace_path.to_path_buf(), workspace_name.to_string()));
	}
	Ok(found)
}

fn is_git_root(path: &Path) -> bool {
	path.join(".git").is_dir()
}


// vim: ts=4
