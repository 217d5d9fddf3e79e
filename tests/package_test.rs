/// Integration tests for the delta archive builder: payload layout,
/// manifest contents and cleanup on failure.
use codesync::package::{build_archive, ArchiveSpec, MANIFEST_DIR};
use codesync::types::{ArchiveManifest, FileStatus, SyncStatus};
use std::fs;
use std::io::Read;
use tempfile::TempDir;

fn spec(root: &std::path::Path) -> ArchiveSpec {
	ArchiveSpec {
		client_id: "client-1".to_string(),
		codebase_name: "proj".to_string(),
		codebase_path: root.to_path_buf(),
		codebase_id: "proj_abc".to_string(),
	}
}

fn entry_names(archive: &std::path::Path) -> Vec<String> {
	let file = fs::File::open(archive).unwrap();
	let zip = zip::ZipArchive::new(file).unwrap();
	zip.file_names().map(|n| n.to_string()).collect()
}

fn read_entry(archive: &std::path::Path, name: &str) -> Vec<u8> {
	let file = fs::File::open(archive).unwrap();
	let mut zip = zip::ZipArchive::new(file).unwrap();
	let mut entry = zip.by_name(name).unwrap();
	let mut buf = Vec::new();
	entry.read_to_end(&mut buf).unwrap();
	buf
}

#[tokio::test]
async fn test_archive_contains_payload_and_manifest() {
	let codebase = TempDir::new().unwrap();
	let upload_tmp = TempDir::new().unwrap();
	fs::write(codebase.path().join("a.go"), b"package a // v2").unwrap();
	fs::write(codebase.path().join("c.go"), b"package c").unwrap();

	// Mixed diff: b.go was deleted locally, a.go modified, c.go added
	let changes = vec![
		FileStatus::new("b.go", "", SyncStatus::Delete),
		FileStatus::new("a.go", "h1x", SyncStatus::Modify),
		FileStatus::new("c.go", "h3", SyncStatus::Add),
	];

	let archive = build_archive(&spec(codebase.path()), &changes, upload_tmp.path())
		.await
		.unwrap();

	let names = entry_names(&archive);
	assert_eq!(names.len(), 3);
	assert!(names.contains(&"a.go".to_string()));
	assert!(names.contains(&"c.go".to_string()));
	// Deletions carry no payload bytes
	assert!(!names.contains(&"b.go".to_string()));

	let manifest_name = names
		.iter()
		.find(|n| n.starts_with(MANIFEST_DIR))
		.expect("archive must contain a manifest entry");
	// `.shenma_sync/<YYYYMMDDHHMMSS>`
	let stamp = manifest_name.strip_prefix(".shenma_sync/").unwrap();
	assert_eq!(stamp.len(), 14);
	assert!(stamp.chars().all(|c| c.is_ascii_digit()));

	let manifest: ArchiveManifest =
		serde_json::from_slice(&read_entry(&archive, manifest_name)).unwrap();
	assert_eq!(manifest.client_id, "client-1");
	assert_eq!(manifest.codebase_name, "proj");
	assert_eq!(manifest.file_list.len(), 3);
	assert_eq!(manifest.file_list["b.go"], SyncStatus::Delete);
	assert_eq!(manifest.file_list["a.go"], SyncStatus::Modify);
	assert_eq!(manifest.file_list["c.go"], SyncStatus::Add);
	assert!(manifest.timestamp > 0);

	assert_eq!(read_entry(&archive, "a.go"), b"package a // v2");
}

#[tokio::test]
async fn test_archive_name_embeds_codebase_id() {
	let codebase = TempDir::new().unwrap();
	let upload_tmp = TempDir::new().unwrap();
	fs::write(codebase.path().join("f.rs"), b"fn f() {}").unwrap();

	let changes = vec![FileStatus::new("f.rs", "h", SyncStatus::Add)];
	let archive = build_archive(&spec(codebase.path()), &changes, upload_tmp.path())
		.await
		.unwrap();

	let name = archive.file_name().unwrap().to_string_lossy().to_string();
	assert!(name.starts_with("proj_abc-"));
	assert!(name.ends_with(".zip"));
}

#[tokio::test]
async fn test_delete_only_diff_still_produces_manifest() {
	let codebase = TempDir::new().unwrap();
	let upload_tmp = TempDir::new().unwrap();

	let changes = vec![FileStatus::new("gone.rs", "", SyncStatus::Delete)];
	let archive = build_archive(&spec(codebase.path()), &changes, upload_tmp.path())
		.await
		.unwrap();

	let names = entry_names(&archive);
	assert_eq!(names.len(), 1);
	assert!(names[0].starts_with(MANIFEST_DIR));

	let manifest: ArchiveManifest =
		serde_json::from_slice(&read_entry(&archive, &names[0])).unwrap();
	assert_eq!(manifest.file_list.len(), 1);
	assert_eq!(manifest.file_list["gone.rs"], SyncStatus::Delete);
}

#[tokio::test]
async fn test_partial_archive_removed_on_error() {
	let codebase = TempDir::new().unwrap();
	let upload_tmp = TempDir::new().unwrap();

	// Payload file vanished between scan and package
	let changes = vec![FileStatus::new("missing.rs", "h", SyncStatus::Add)];
	let result = build_archive(&spec(codebase.path()), &changes, upload_tmp.path()).await;
	assert!(result.is_err());

	let leftover: Vec<_> = fs::read_dir(upload_tmp.path()).unwrap().collect();
	assert!(leftover.is_empty(), "partial archive must be cleaned up");
}
