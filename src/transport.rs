//! Upload transport: the remote interface consumed by the scheduler and
//! its HTTP implementation.
//!
//! The trait is the seam for tests; `HttpTransport` talks to the real
//! indexing service with bearer auth and size-scaled upload timeouts.

use crate::config::{ClientConfig, SharedSyncConfig, SyncConfig};
use crate::error::TransportError;
use crate::types::HashTree;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const HASH_ENDPOINT: &str = "/codebase-indexer/api/v1/codebases/hash";
const UPLOAD_ENDPOINT: &str = "/codebase-indexer/api/v1/files/upload";
const CONFIG_ENDPOINT_BASE: &str = "/shenma/api/v1/config";
const CONFIG_ENDPOINT_FILE: &str = "codebase-indexer-config.json";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

const MIB: u64 = 1024 * 1024;
const UPLOAD_BASE_TIMEOUT_SECS: u64 = 60;
const UPLOAD_TIMEOUT_CAP_SECS: u64 = 600;

/// Form fields accompanying an archive upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
	pub client_id: String,
	pub codebase_path: String,
	pub codebase_name: String,
}

/// Remote operations the sync pipeline depends on.
#[async_trait]
pub trait SyncTransport: Send + Sync {
	/// Fetch the server-known hash tree for a codebase.
	async fn fetch_remote_tree(&self, codebase_path: &str) -> Result<HashTree, TransportError>;

	/// Ship one delta archive.
	async fn upload_archive(
		&self,
		archive: &Path,
		request: &UploadRequest,
	) -> Result<(), TransportError>;

	/// Fetch the server tuning config.
	async fn fetch_client_config(&self) -> Result<ClientConfig, TransportError>;
}

/// Retry classification predicate: `true` means the failure is worth
/// another attempt. Pluggable so the abort list is policy, not
/// hard-coded into the scheduler.
pub type RetryDecider = Arc<dyn Fn(&TransportError) -> bool + Send + Sync>;

/// Default classification: 401, 429 and 503 abort retries immediately,
/// as does missing auth. Everything else (network errors, timeouts,
/// other 5xx) is retryable.
pub fn default_retry_decider() -> RetryDecider {
	Arc::new(|err: &TransportError| match err {
		TransportError::Http { status, .. } => !matches!(status, 401 | 429 | 503),
		TransportError::NoAuth => false,
		_ => true,
	})
}

/// Write timeout for an upload of `size_bytes`: a base for archives up
/// to 10 MiB, plus 5 s per additional MiB, capped at 10 minutes.
pub fn upload_timeout(size_bytes: u64) -> Duration {
	if size_bytes <= 10 * MIB {
		return Duration::from_secs(UPLOAD_BASE_TIMEOUT_SECS);
	}
	let extra_mib = (size_bytes - 10 * MIB).div_ceil(MIB);
	let secs = (UPLOAD_BASE_TIMEOUT_SECS + extra_mib * 5).min(UPLOAD_TIMEOUT_CAP_SECS);
	Duration::from_secs(secs)
}

/// Standard response envelope of the indexing service.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
	#[serde(default)]
	code: i64,
	#[serde(default)]
	message: String,
	data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct HashTreeData {
	#[serde(default)]
	list: Vec<HashItem>,
}

#[derive(Debug, Deserialize)]
struct HashItem {
	path: String,
	hash: String,
}

fn join_url(base: &str, endpoint: &str) -> String {
	format!("{}{}", base.trim_end_matches('/'), endpoint)
}

fn truncate_body(body: &str) -> String {
	const LIMIT: usize = 256;
	if body.chars().count() > LIMIT {
		let short: String = body.chars().take(LIMIT).collect();
		format!("{}...", short)
	} else {
		body.to_string()
	}
}

/// HTTP implementation over a single shared reqwest client.
pub struct HttpTransport {
	http: reqwest::Client,
	auth: SharedSyncConfig,
	config_version: Option<String>,
}

impl HttpTransport {
	pub fn new(auth: SharedSyncConfig) -> Self {
		let http = reqwest::Client::builder()
			.connect_timeout(CONNECT_TIMEOUT)
			.build()
			.unwrap_or_else(|_| reqwest::Client::new());
		HttpTransport { http, auth, config_version: None }
	}

	/// Pin the tuning config to a published version instead of the
	/// latest (`.../config/<version>/codebase-indexer-config.json`).
	pub fn with_config_version(mut self, version: impl Into<String>) -> Self {
		self.config_version = Some(version.into());
		self
	}

	fn config_endpoint(&self) -> String {
		match &self.config_version {
			Some(version) => {
				format!("{}/{}/{}", CONFIG_ENDPOINT_BASE, version, CONFIG_ENDPOINT_FILE)
			}
			None => format!("{}/{}", CONFIG_ENDPOINT_BASE, CONFIG_ENDPOINT_FILE),
		}
	}

	async fn auth(&self) -> Result<SyncConfig, TransportError> {
		self.auth.get().await.ok_or(TransportError::NoAuth)
	}
}

#[async_trait]
impl SyncTransport for HttpTransport {
	async fn fetch_remote_tree(&self, codebase_path: &str) -> Result<HashTree, TransportError> {
		let auth = self.auth().await?;
		let url = join_url(&auth.server_url, HASH_ENDPOINT);

		let response = self
			.http
			.get(&url)
			.bearer_auth(&auth.token)
			.query(&[("clientId", auth.client_id.as_str()), ("codebasePath", codebase_path)])
			.timeout(READ_TIMEOUT)
			.send()
			.await?;

		let status = response.status();
		let body = response.text().await?;
		if !status.is_success() {
			return Err(TransportError::Http {
				status: status.as_u16(),
				message: truncate_body(&body),
			});
		}

		let envelope: ApiResponse<HashTreeData> = serde_json::from_str(&body)
			.map_err(|e| TransportError::Decode { message: e.to_string() })?;
		if envelope.code != 0 {
			return Err(TransportError::Api { code: envelope.code, message: envelope.message });
		}

		let mut tree = HashTree::new();
		for item in envelope.data.unwrap_or_default().list {
			tree.insert(item.path, item.hash);
		}
		Ok(tree)
	}

	async fn upload_archive(
		&self,
		archive: &Path,
		request: &UploadRequest,
	) -> Result<(), TransportError> {
		let auth = self.auth().await?;
		let url = join_url(&auth.server_url, UPLOAD_ENDPOINT);

		let file = tokio::fs::File::open(archive).await.map_err(|e| {
			TransportError::ArchiveRead { path: archive.display().to_string(), source: e }
		})?;
		let size = file
			.metadata()
			.await
			.map_err(|e| TransportError::ArchiveRead {
				path: archive.display().to_string(),
				source: e,
			})?
			.len();

		let file_name = archive
			.file_name()
			.map(|n| n.to_string_lossy().to_string())
			.unwrap_or_else(|| "archive.zip".to_string());

		let stream = tokio_util::io::ReaderStream::new(file);
		let part = reqwest::multipart::Part::stream_with_length(
			reqwest::Body::wrap_stream(stream),
			size,
		)
		.file_name(file_name);

		let form = reqwest::multipart::Form::new()
			.part("file", part)
			.text("clientId", request.client_id.clone())
			.text("codebasePath", request.codebase_path.clone())
			.text("codebaseName", request.codebase_name.clone());

		let response = self
			.http
			.post(&url)
			.bearer_auth(&auth.token)
			.multipart(form)
			.timeout(upload_timeout(size))
			.send()
			.await?;

		let status = response.status();
		let body = response.text().await.unwrap_or_default();
		if !status.is_success() {
			return Err(TransportError::Http {
				status: status.as_u16(),
				message: truncate_body(&body),
			});
		}

		// The upload endpoint answers with the standard envelope; a 2xx
		// with a non-zero business code is still a failure.
		if let Ok(envelope) = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body) {
			if envelope.code != 0 {
				return Err(TransportError::Api {
					code: envelope.code,
					message: envelope.message,
				});
			}
		}

		Ok(())
	}

	async fn fetch_client_config(&self) -> Result<ClientConfig, TransportError> {
		let auth = self.auth().await?;
		let url = join_url(&auth.server_url, &self.config_endpoint());

		let response =
			self.http.get(&url).bearer_auth(&auth.token).timeout(READ_TIMEOUT).send().await?;

		let status = response.status();
		let body = response.text().await?;
		if !status.is_success() {
			return Err(TransportError::Http {
				status: status.as_u16(),
				message: truncate_body(&body),
			});
		}

		serde_json::from_str(&body).map_err(|e| TransportError::Decode { message: e.to_string() })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_upload_timeout_scaling() {
		assert_eq!(upload_timeout(0), Duration::from_secs(60));
		assert_eq!(upload_timeout(10 * MIB), Duration::from_secs(60));
		// One byte over the base tier adds a full MiB step
		assert_eq!(upload_timeout(10 * MIB + 1), Duration::from_secs(65));
		assert_eq!(upload_timeout(12 * MIB), Duration::from_secs(70));
		// Capped at ten minutes
		assert_eq!(upload_timeout(10_000 * MIB), Duration::from_secs(600));
	}

	#[test]
	fn test_default_retry_decider() {
		let decider = default_retry_decider();

		for status in [401u16, 429, 503] {
			let err = TransportError::Http { status, message: String::new() };
			assert!(!decider(&err), "status {} must abort retries", status);
		}

		let err = TransportError::Http { status: 500, message: String::new() };
		assert!(decider(&err));
		let err = TransportError::Request { message: "connection reset".to_string(), timeout: false };
		assert!(decider(&err));
		let err = TransportError::Request { message: "timed out".to_string(), timeout: true };
		assert!(decider(&err));
		assert!(!decider(&TransportError::NoAuth));
	}

	#[test]
	fn test_join_url_trailing_slash() {
		assert_eq!(
			join_url("http://host:8080/", HASH_ENDPOINT),
			"http://host:8080/codebase-indexer/api/v1/codebases/hash"
		);
		assert_eq!(
			join_url("http://host:8080", UPLOAD_ENDPOINT),
			"http://host:8080/codebase-indexer/api/v1/files/upload"
		);
	}

	#[test]
	fn test_config_endpoint_version_segment() {
		let transport = HttpTransport::new(SharedSyncConfig::new());
		assert_eq!(
			transport.config_endpoint(),
			"/shenma/api/v1/config/codebase-indexer-config.json"
		);

		let pinned = HttpTransport::new(SharedSyncConfig::new()).with_config_version("v2");
		assert_eq!(
			pinned.config_endpoint(),
			"/shenma/api/v1/config/v2/codebase-indexer-config.json"
		);
	}

	#[test]
	fn test_envelope_decoding() {
		let body = r#"{
			"code": 0,
			"message": "ok",
			"data": {"list": [{"path": "a.go", "hash": "h1"}, {"path": "b.go", "hash": "h2"}]}
		}"#;
		let envelope: ApiResponse<HashTreeData> = serde_json::from_str(body).unwrap();
		assert_eq!(envelope.code, 0);
		let data = envelope.data.unwrap();
		assert_eq!(data.list.len(), 2);
		assert_eq!(data.list[0].path, "a.go");
	}

	#[test]
	fn test_envelope_missing_data() {
		let body = r#"{"code": 7, "message": "bad token"}"#;
		let envelope: ApiResponse<HashTreeData> = serde_json::from_str(body).unwrap();
		assert_eq!(envelope.code, 7);
		assert!(envelope.data.is_none());
	}
}

// vim: ts=4
