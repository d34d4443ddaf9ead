use notify::{recommended_watcher, Event, EventKind, RecursiveMode, Watcher};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::manager::MockManager;

/// Reloads the route table whenever a file under the RAML folder changes.
/// Included files live next to the root document, so the whole folder is watched.
pub fn spawn_watcher(manager: MockManager) -> notify::Result<()> {
    let rt_handle = Handle::current();
    let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(100);

    let mut watcher = recommended_watcher(move |res| {
        let tx_clone = tx.clone();
        rt_handle.spawn(async move {
            if tx_clone.send(res).await.is_err() {
                info!("File watcher event channel closed");
            }
        });
    })?;
    watcher.watch(manager.root_folder(), RecursiveMode::Recursive)?;
    info!(folder = %manager.root_folder().display(), "Watching RAML files for changes...");

    tokio::spawn(async move {
        // The watcher stops when dropped.
        let _watcher = watcher;
        while let Some(res) = rx.recv().await {
            match res {
                Ok(event) if matches!(event.kind, EventKind::Access(_)) => {}
                Ok(event) => {
                    debug!(?event, "File change detected");
                    if let Err(err) = manager.reload() {
                        error!(error = %err, "RAML reload failed, keeping previous routes");
                    }
                }
                Err(err) => error!(error = ?err, "Watch error"),
            }
        }
    });
    Ok(())
}
