//! Loads the configuration store off the async runtime.
//!
//! Loading resolves every `master=` host name through the OS resolver, which
//! blocks.  The work is moved onto Tokio's blocking pool so runtime workers
//! stay free while DNS answers.

use std::path::PathBuf;

use pager_core::ConfigStore;
use tokio::task::JoinError;
use tracing::{error, info};

/// Loads `path` into `store`, falling back to defaults when the file is
/// rejected.  Without a path the store is reset to defaults.
///
/// # Errors
///
/// Returns the [`JoinError`] if the blocking task panicked or was cancelled.
pub async fn load_config(
    mut store: ConfigStore,
    path: Option<PathBuf>,
) -> Result<ConfigStore, JoinError> {
    tokio::task::spawn_blocking(move || {
        match &path {
            Some(path) => {
                info!("parameter: configfile {}", path.display());
                if let Err(e) = store.load(path) {
                    error!("{e}");
                    store.load_default(true);
                }
            }
            None => store.load_default(true),
        }
        store
    })
    .await
}
