//! # codesync - Incremental Codebase Sync Agent
//!
//! codesync is a long-running local agent that keeps registered
//! codebases incrementally synchronized with a remote indexing service.
//! Editor plugins register workspaces; the agent periodically scans each
//! codebase, fingerprints its files, diffs the result against the
//! server-known tree and ships the delta as one compressed archive.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use codesync::config::{SharedClientConfig, SharedSyncConfig};
//! use codesync::registry::CodebaseRegistry;
//! use codesync::scheduler::SyncScheduler;
//! use codesync::transport::HttpTransport;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let sync_config = SharedSyncConfig::new();
//! let client_config = SharedClientConfig::default();
//! let registry = Arc::new(CodebaseRegistry::open("cache".as_ref()).await?);
//! let transport = Arc::new(HttpTransport::new(sync_config.clone()));
//! let scheduler = Arc::new(SyncScheduler::new(
//!     registry, transport, sync_config, client_config, "tmp".into(),
//! ));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod daemon;
pub mod error;
pub mod exclusion;
pub mod logging;
pub mod package;
pub mod registry;
pub mod scanner;
pub mod scheduler;
pub mod service;
pub mod transport;
pub mod types;
pub mod workspace;

// Re-export commonly used types and functions
pub use config::{ClientConfig, SharedClientConfig, SharedSyncConfig, SyncConfig};
pub use error::{
	ExclusionError, PackageError, RegistryError, ScanError, ServiceError, SyncError,
	TransportError,
};
pub use exclusion::IgnoreMatcher;
pub use registry::CodebaseRegistry;
pub use scheduler::{SchedulerState, SyncScheduler};
pub use service::SyncService;
pub use transport::{HttpTransport, RetryDecider, SyncTransport, UploadRequest};
pub use types::{ArchiveManifest, CodebaseRecord, FileStatus, HashTree, SyncStatus};

// vim: ts=4
