//! Path normalization and ignore-pattern matching
//!
//! Patterns are applied in list order; the first match wins. Each pattern
//! is matched against the full relative path and against every path
//! segment, so `node_modules/` excludes the directory and its whole
//! subtree at any depth. A trailing `/` restricts a pattern to
//! directories; `.*` catches dotfiles and dotdirs.

use crate::error::ExclusionError;
use globset::{GlobBuilder, GlobMatcher};
use std::path::Path;

/// Matching is case-insensitive on Windows paths after normalization.
const CASE_INSENSITIVE: bool = cfg!(windows);

/// Normalize an absolute path under `root` to a forward-slash relpath.
///
/// Returns `None` for the root itself or for paths outside of `root`.
pub fn normalize_relpath(root: &Path, path: &Path) -> Option<String> {
	let stripped = path.strip_prefix(root).ok()?;
	let raw = stripped.to_string_lossy().replace('\\', "/");
	let trimmed = raw.trim_start_matches("./").trim_start_matches('/');

	if trimmed.is_empty() {
		None
	} else {
		Some(trimmed.to_string())
	}
}

/// One compiled ignore rule.
#[derive(Debug, Clone)]
struct IgnoreRule {
	/// Pattern as supplied, for diagnostics
	raw: String,

	/// Trailing `/` in the source pattern: directories only
	dir_only: bool,

	matcher: GlobMatcher,
}

/// Ordered ignore-pattern matcher.
///
/// Compiled once per tick from the active `ClientConfig` pattern list.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
	rules: Vec<IgnoreRule>,
}

impl IgnoreMatcher {
	/// Compile an ordered pattern list.
	pub fn new(patterns: &[String]) -> Result<Self, ExclusionError> {
		let mut rules = Vec::with_capacity(patterns.len());

		for pattern in patterns {
			let trimmed = pattern.trim();
			if trimmed.is_empty() {
				continue;
			}

			let dir_only = trimmed.ends_with('/');
			let body = trimmed.trim_end_matches('/');

			let glob = GlobBuilder::new(body)
				.literal_separator(true)
				.case_insensitive(CASE_INSENSITIVE)
				.build()
				.map_err(|e| ExclusionError::InvalidPattern {
					pattern: pattern.clone(),
					message: e.to_string(),
				})?;

			rules.push(IgnoreRule {
				raw: trimmed.to_string(),
				dir_only,
				matcher: glob.compile_matcher(),
			});
		}

		Ok(IgnoreMatcher { rules })
	}

	/// Matcher over the built-in default pattern set.
	pub fn with_defaults() -> Self {
		// The default set is static and known-good
		match Self::new(&default_ignore_patterns()) {
			Ok(matcher) => matcher,
			Err(_) => IgnoreMatcher { rules: Vec::new() },
		}
	}

	/// Check whether `relpath` is ignored. `is_dir` tells the matcher
	/// whether the final segment names a directory.
	pub fn matches(&self, relpath: &str, is_dir: bool) -> bool {
		if self.rules.is_empty() {
			return false;
		}

		let segments: Vec<&str> = relpath.split('/').filter(|s| !s.is_empty()).collect();

		for rule in &self.rules {
			if Self::rule_matches(rule, relpath, &segments, is_dir) {
				return true;
			}
		}

		false
	}

	fn rule_matches(rule: &IgnoreRule, relpath: &str, segments: &[&str], is_dir: bool) -> bool {
		// Full-path match
		if rule.matcher.is_match(relpath) && (!rule.dir_only || is_dir) {
			return true;
		}

		// Segment matches: every segment but the last is a parent
		// directory, which a directory pattern excludes together with
		// its subtree.
		for (i, segment) in segments.iter().enumerate() {
			if !rule.matcher.is_match(segment) {
				continue;
			}
			if i + 1 < segments.len() {
				return true;
			}
			if !rule.dir_only || is_dir {
				return true;
			}
		}

		false
	}

	/// Patterns currently in effect, in match order.
	pub fn patterns(&self) -> Vec<String> {
		self.rules.iter().map(|r| r.raw.clone()).collect()
	}
}

/// Built-in ignore set: VCS metadata, dependency and build output,
/// binaries and media. Server-supplied patterns replace this list.
pub fn default_ignore_patterns() -> Vec<String> {
	[
		// VCS and editor metadata; `.*` also covers .git, .idea, .vscode
		".*",
		// Dependency and build output
		"node_modules/",
		"target/",
		"build/",
		"dist/",
		"out/",
		"bin/",
		"obj/",
		"vendor/",
		"__pycache__/",
		// Compiled artifacts
		"*.exe",
		"*.dll",
		"*.so",
		"*.dylib",
		"*.o",
		"*.a",
		"*.class",
		"*.jar",
		"*.war",
		"*.pyc",
		// Archives
		"*.zip",
		"*.tar",
		"*.gz",
		"*.7z",
		"*.rar",
		// Media
		"*.png",
		"*.jpg",
		"*.jpeg",
		"*.gif",
		"*.bmp",
		"*.ico",
		"*.mp3",
		"*.mp4",
		"*.avi",
		"*.mov",
		"*.pdf",
		// Logs and scratch
		"*.log",
		"*.tmp",
		"*.swp",
		"*~",
	]
	.iter()
	.map(|s| s.to_string())
	.collect()
}


// vim: ts=4
