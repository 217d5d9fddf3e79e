//! Error types for codesync operations

use std::error::Error;
use std::fmt;
use std::io;

/// Main error type for the sync pipeline
///
/// This is the unified error type returned by the scheduler and the
/// per-codebase pipeline. It contains direct variants for cross-cutting
/// failures and nested variants for domain-specific errors.
#[derive(Debug)]
pub enum SyncError {
	/// Local scan failed
	Scan(ScanError),

	/// Archive build failed
	Package(PackageError),

	/// Remote call failed
	Transport(TransportError),

	/// Registry load/save failed
	Registry(RegistryError),

	/// Ignore pattern compilation failed
	Exclusion(ExclusionError),

	/// Operation was cancelled
	Cancelled,

	/// On-demand sync ran past its deadline
	DeadlineExceeded,

	/// I/O error
	Io(io::Error),

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Scan(e) => write!(f, "Scan error: {}", e),
			SyncError::Package(e) => write!(f, "Package error: {}", e),
			SyncError::Transport(e) => write!(f, "Transport error: {}", e),
			SyncError::Registry(e) => write!(f, "Registry error: {}", e),
			SyncError::Exclusion(e) => write!(f, "Exclusion error: {}", e),
			SyncError::Cancelled => write!(f, "Operation cancelled"),
			SyncError::DeadlineExceeded => write!(f, "Deadline exceeded"),
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<ScanError> for SyncError {
	fn from(e: ScanError) -> Self {
		SyncError::Scan(e)
	}
}

impl From<PackageError> for SyncError {
	fn from(e: PackageError) -> Self {
		SyncError::Package(e)
	}
}

impl From<TransportError> for SyncError {
	fn from(e: TransportError) -> Self {
		SyncError::Transport(e)
	}
}

impl From<RegistryError> for SyncError {
	fn from(e: RegistryError) -> Self {
		SyncError::Registry(e)
	}
}

impl From<ExclusionError> for SyncError {
	fn from(e: ExclusionError) -> Self {
		SyncError::Exclusion(e)
	}
}

impl From<String> for SyncError {
	fn from(message: String) -> Self {
		SyncError::Other { message }
	}
}

/// Ignore pattern errors
#[derive(Debug)]
pub enum ExclusionError {
	/// Failed to parse a glob pattern
	InvalidPattern { pattern: String, message: String },
}

impl fmt::Display for ExclusionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ExclusionError::InvalidPattern { pattern, message } => {
				write!(f, "Invalid ignore pattern '{}': {}", pattern, message)
			}
		}
	}
}

impl Error for ExclusionError {}

/// Hash-tree scan errors
///
/// Per-file problems (unreadable, oversized) are not errors: the scanner
/// skips and logs them. These variants are whole-scan failures that abort
/// the codebase's tick.
#[derive(Debug)]
pub enum ScanError {
	/// Scan root does not exist or is not a directory
	RootNotFound { path: String },

	/// Directory enumeration failed
	Walk { path: String, source: io::Error },
}

impl fmt::Display for ScanError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ScanError::RootNotFound { path } => {
				write!(f, "Scan root not found: {}", path)
			}
			ScanError::Walk { path, source } => {
				write!(f, "Failed to walk {}: {}", path, source)
			}
		}
	}
}

impl Error for ScanError {}

/// Archive build errors
#[derive(Debug)]
pub enum PackageError {
	/// Failed to read a payload file
	ReadFailed { path: String, source: io::Error },

	/// Failed to write the archive
	WriteFailed { path: String, message: String },

	/// Failed to encode the manifest
	Manifest { source: serde_json::Error },
}

impl fmt::Display for PackageError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PackageError::ReadFailed { path, source } => {
				write!(f, "Failed to read {}: {}", path, source)
			}
			PackageError::WriteFailed { path, message } => {
				write!(f, "Failed to write archive {}: {}", path, message)
			}
			PackageError::Manifest { source } => {
				write!(f, "Failed to encode manifest: {}", source)
			}
		}
	}
}

impl Error for PackageError {}

/// Remote transport errors
#[derive(Debug)]
pub enum TransportError {
	/// No access token has been shared yet
	NoAuth,

	/// Server URL could not be parsed
	InvalidUrl { url: String },

	/// Request failed before an HTTP status was received
	Request { message: String, timeout: bool },

	/// Server answered with a non-success HTTP status
	Http { status: u16, message: String },

	/// Server answered 2xx but the business code signals failure
	Api { code: i64, message: String },

	/// Response body could not be decoded
	Decode { message: String },

	/// Archive file could not be opened for upload
	ArchiveRead { path: String, source: io::Error },
}

impl TransportError {
	/// HTTP status of the failure, when one was received
	pub fn status(&self) -> Option<u16> {
		match self {
			TransportError::Http { status, .. } => Some(*status),
			_ => None,
		}
	}
}

impl fmt::Display for TransportError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransportError::NoAuth => write!(f, "No access token shared yet"),
			TransportError::InvalidUrl { url } => write!(f, "Invalid server URL: {}", url),
			TransportError::Request { message, timeout } => {
				if *timeout {
					write!(f, "Request timed out: {}", message)
				} else {
					write!(f, "Request failed: {}", message)
				}
			}
			TransportError::Http { status, message } => {
				write!(f, "HTTP {}: {}", status, message)
			}
			TransportError::Api { code, message } => {
				write!(f, "Server rejected request (code {}): {}", code, message)
			}
			TransportError::Decode { message } => {
				write!(f, "Failed to decode response: {}", message)
			}
			TransportError::ArchiveRead { path, source } => {
				write!(f, "Failed to read archive {}: {}", path, source)
			}
		}
	}
}

impl Error for TransportError {}

impl From<reqwest::Error> for TransportError {
	fn from(e: reqwest::Error) -> Self {
		TransportError::Request { message: e.to_string(), timeout: e.is_timeout() }
	}
}

/// Registry store errors
#[derive(Debug)]
pub enum RegistryError {
	/// Failed to serialize a record
	Serialize { id: String, source: serde_json::Error },

	/// Failed to write a record file
	WriteFailed { path: String, source: io::Error },

	/// Failed to delete a record file
	DeleteFailed { path: String, source: io::Error },

	/// Failed to enumerate the registry directory
	LoadFailed { path: String, source: io::Error },
}

impl fmt::Display for RegistryError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RegistryError::Serialize { id, source } => {
				write!(f, "Failed to serialize record {}: {}", id, source)
			}
			RegistryError::WriteFailed { path, source } => {
				write!(f, "Failed to write record {}: {}", path, source)
			}
			RegistryError::DeleteFailed { path, source } => {
				write!(f, "Failed to delete record {}: {}", path, source)
			}
			RegistryError::LoadFailed { path, source } => {
				write!(f, "Failed to load registry from {}: {}", path, source)
			}
		}
	}
}

impl Error for RegistryError {}

/// Handler-boundary errors
#[derive(Debug)]
pub enum ServiceError {
	/// A request parameter failed validation; no state was touched
	InvalidArgument { message: String },

	/// Workspace directory could not be read
	Workspace { path: String, source: io::Error },

	/// Registry mutation failed
	Registry(RegistryError),
}

impl fmt::Display for ServiceError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ServiceError::InvalidArgument { message } => {
				write!(f, "Invalid argument: {}", message)
			}
			ServiceError::Workspace { path, source } => {
				write!(f, "Failed to read workspace {}: {}", path, source)
			}
			ServiceError::Registry(e) => write!(f, "Registry error: {}", e),
		}
	}
}

impl Error for ServiceError {}

impl From<RegistryError> for ServiceError {
	fn from(e: RegistryError) -> Self {
		ServiceError::Registry(e)
	}
}

// vim: ts=4
