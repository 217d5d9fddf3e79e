use clap::{Arg, Command};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::{env, fs};

use codesync::config::{SharedClientConfig, SharedSyncConfig};
use codesync::daemon::SyncDaemon;
use codesync::logging::{self, info};
use codesync::registry::CodebaseRegistry;
use codesync::scheduler::SyncScheduler;
use codesync::transport::HttpTransport;

/// Directory layout under the agent root.
struct RootDirs {
	cache: PathBuf,
	upload_tmp: PathBuf,
}

fn default_root() -> PathBuf {
	match env::var("HOME") {
		Ok(home) => PathBuf::from(home).join(".codesync"),
		Err(_) => PathBuf::from(".codesync"),
	}
}

/// Create the directory tree the agent depends on. A failure here is
/// fatal and the process exits non-zero.
fn init_root_dirs(root: &PathBuf) -> std::io::Result<RootDirs> {
	let cache = root.join("cache");
	let upload_tmp = cache.join("upload_tmp").join("zip");

	fs::create_dir_all(root.join("logs"))?;
	fs::create_dir_all(cache.join("codebase"))?;
	fs::create_dir_all(&upload_tmp)?;

	Ok(RootDirs { cache, upload_tmp })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("codesync")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Keeps registered codebases synchronized with a remote indexing service")
		.arg(
			Arg::new("root")
				.short('d')
				.long("root")
				.value_name("DIR")
				.help("Agent root directory (default: ~/.codesync)"),
		)
		.get_matches();

	logging::init_tracing();

	let root = matches
		.get_one::<String>("root")
		.map(PathBuf::from)
		.unwrap_or_else(default_root);
	let dirs = init_root_dirs(&root)?;
	info!("codesync {} starting under {}", env!("CARGO_PKG_VERSION"), root.display());

	let sync_config = SharedSyncConfig::new();
	let client_config = SharedClientConfig::default();
	let registry = Arc::new(CodebaseRegistry::open(&dirs.cache).await?);
	let transport = Arc::new(HttpTransport::new(sync_config.clone()));

	let scheduler = Arc::new(SyncScheduler::new(
		Arc::clone(&registry),
		transport.clone(),
		sync_config.clone(),
		client_config.clone(),
		dirs.upload_tmp.clone(),
	));

	let daemon = SyncDaemon::new(scheduler, transport, client_config, dirs.upload_tmp);
	daemon.start().await;

	tokio::signal::ctrl_c().await?;
	daemon.shutdown().await;

	Ok(())
}

// vim: ts=4
