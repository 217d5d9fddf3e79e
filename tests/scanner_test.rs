/// Integration tests for the hash-tree scanner: walking real directory
/// fixtures under the ignore policy and diffing the resulting trees.
use codesync::exclusion::IgnoreMatcher;
use codesync::scanner::{diff, hash_bytes, scan};
use codesync::types::SyncStatus;
use std::fs;
use tempfile::TempDir;

const MAX_FILE_SIZE: u64 = 1024 * 1024;

fn write_fixture(root: &std::path::Path, rel: &str, contents: &[u8]) {
	let path = root.join(rel);
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).unwrap();
	}
	fs::write(path, contents).unwrap();
}

#[tokio::test]
async fn test_scan_collects_regular_files() {
	let tmp = TempDir::new().unwrap();
	write_fixture(tmp.path(), "src/main.rs", b"fn main() {}");
	write_fixture(tmp.path(), "README.md", b"# readme");
	write_fixture(tmp.path(), "src/nested/deep.rs", b"mod deep;");

	let matcher = IgnoreMatcher::with_defaults();
	let tree = scan(tmp.path(), &matcher, MAX_FILE_SIZE).await.unwrap();

	let keys: Vec<&str> = tree.keys().map(|k| k.as_str()).collect();
	assert_eq!(keys, vec!["README.md", "src/main.rs", "src/nested/deep.rs"]);
	assert_eq!(tree["src/main.rs"], hash_bytes(b"fn main() {}"));
}

#[tokio::test]
async fn test_scan_prunes_ignored_directories() {
	let tmp = TempDir::new().unwrap();
	write_fixture(tmp.path(), "src/lib.rs", b"pub fn f() {}");
	write_fixture(tmp.path(), ".git/config", b"[core]");
	write_fixture(tmp.path(), "node_modules/pkg/index.js", b"module.exports = 1;");
	write_fixture(tmp.path(), "target/debug/app.d", b"dep info");

	let matcher = IgnoreMatcher::with_defaults();
	let tree = scan(tmp.path(), &matcher, MAX_FILE_SIZE).await.unwrap();

	assert_eq!(tree.len(), 1);
	assert!(tree.contains_key("src/lib.rs"));
}

#[tokio::test]
async fn test_scan_skips_oversized_files() {
	let tmp = TempDir::new().unwrap();
	write_fixture(tmp.path(), "small.txt", b"ok");
	write_fixture(tmp.path(), "big.dat", &vec![0u8; 2048]);

	let matcher = IgnoreMatcher::with_defaults();
	let tree = scan(tmp.path(), &matcher, 1024).await.unwrap();

	assert_eq!(tree.len(), 1);
	assert!(tree.contains_key("small.txt"));
}

#[tokio::test]
async fn test_scan_missing_root_is_fatal() {
	let tmp = TempDir::new().unwrap();
	let gone = tmp.path().join("gone");

	let matcher = IgnoreMatcher::with_defaults();
	assert!(scan(&gone, &matcher, MAX_FILE_SIZE).await.is_err());
}

#[tokio::test]
async fn test_scan_forward_slash_keys() {
	let tmp = TempDir::new().unwrap();
	write_fixture(tmp.path(), "a/b/c.txt", b"abc");

	let matcher = IgnoreMatcher::with_defaults();
	let tree = scan(tmp.path(), &matcher, MAX_FILE_SIZE).await.unwrap();

	for key in tree.keys() {
		assert!(!key.contains('\\'), "key {} must use forward slashes", key);
	}
	assert!(tree.contains_key("a/b/c.txt"));
}

#[tokio::test]
async fn test_fresh_sync_diff_from_real_scan() {
	let tmp = TempDir::new().unwrap();
	write_fixture(tmp.path(), "a.go", b"package a");
	write_fixture(tmp.path(), "b.go", b"package b");

	let matcher = IgnoreMatcher::with_defaults();
	let local = scan(tmp.path(), &matcher, MAX_FILE_SIZE).await.unwrap();

	let changes = diff(&local, &Default::default());
	assert_eq!(changes.len(), 2);
	assert!(changes.iter().all(|c| c.status == SyncStatus::Add));
	assert_eq!(changes[0].path, "a.go");
	assert_eq!(changes[1].path, "b.go");
}

#[tokio::test]
async fn test_idempotent_rescan_diffs_empty() {
	let tmp = TempDir::new().unwrap();
	write_fixture(tmp.path(), "x.rs", b"const X: u8 = 1;");
	write_fixture(tmp.path(), "y.rs", b"const Y: u8 = 2;");

	let matcher = IgnoreMatcher::with_defaults();
	let first = scan(tmp.path(), &matcher, MAX_FILE_SIZE).await.unwrap();
	let second = scan(tmp.path(), &matcher, MAX_FILE_SIZE).await.unwrap();

	assert_eq!(first, second);
	assert!(diff(&second, &first).is_empty());
}

#[tokio::test]
async fn test_modification_detected_after_rewrite() {
	let tmp = TempDir::new().unwrap();
	write_fixture(tmp.path(), "a.go", b"v1");

	let matcher = IgnoreMatcher::with_defaults();
	let before = scan(tmp.path(), &matcher, MAX_FILE_SIZE).await.unwrap();

	write_fixture(tmp.path(), "a.go", b"v2");
	write_fixture(tmp.path(), "c.go", b"new");
	let after = scan(tmp.path(), &matcher, MAX_FILE_SIZE).await.unwrap();

	let changes = diff(&after, &before);
	assert_eq!(changes.len(), 2);
	assert_eq!(changes[0].path, "a.go");
	assert_eq!(changes[0].status, SyncStatus::Modify);
	assert_eq!(changes[1].path, "c.go");
	assert_eq!(changes[1].status, SyncStatus::Add);
}
