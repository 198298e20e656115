use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use docsync::EngineBuilder;
use docsync::EngineConfig;
use docsync::Error;
use docsync::FileKvStore;
use docsync::PersistenceError;
use docsync::Result;
use docsync::StateStore;
use docsync::SyncFault;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let config = EngineConfig::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&config.logging.log_dir)?;

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let kv = Arc::new(FileKvStore::new(&config.storage.data_dir)?);
    let watcher = kv.spawn_watcher(config.storage.poll_interval(), graceful_rx.clone());

    let builder = EngineBuilder::new(kv, config.sync.clone());
    let faults = builder.subscribe_faults();
    let engine = builder.build().await?;
    info!(boot = ?engine.boot_outcome(), "document loaded");

    let activity = tokio::spawn(log_activity(engine.store().clone(), faults, graceful_rx));

    info!("docsync started. Waiting for CTRL+C signal...");
    graceful_shutdown(graceful_tx).await?;

    // flushes pending writes
    engine.shutdown().await?;
    if let Err(e) = watcher.await {
        error!("file watcher stopped abnormally: {:?}", e);
    }
    if let Err(e) = activity.await {
        error!("activity logger stopped abnormally: {:?}", e);
    }

    info!("Shutdown completed");
    Ok(())
}

/// Logs a summary line per document revision and every published fault.
async fn log_activity(
    store: Arc<StateStore>,
    mut faults: broadcast::Receiver<SyncFault>,
    mut shutdown_signal: watch::Receiver<()>,
) {
    let mut changes = store.subscribe_changes();
    loop {
        tokio::select! {
            biased;
            _ = shutdown_signal.changed() => return,
            changed = changes.changed() => {
                if changed.is_err() {
                    return;
                }
                let revision = *changes.borrow_and_update();
                store.read(|doc| {
                    info!(
                        revision,
                        entries = doc.len(),
                        active = %doc.active_id(),
                        "document updated"
                    );
                });
            }
            fault = faults.recv() => {
                match fault {
                    Ok(fault) => warn!(%fault, "sync fault"),
                    Err(RecvError::Lagged(missed)) => warn!(missed, "sync faults dropped"),
                    Err(RecvError::Closed) => return,
                }
            }
        }
    }
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    info!("Shutdown server..");
    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {e}"))
    })?;
    Ok(())
}

fn init_observability(log_dir: &Path) -> Result<WorkerGuard> {
    let log_file = open_file_for_append(&log_dir.join("docsync.log"))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}

fn open_file_for_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| PersistenceError::PathError {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| {
            PersistenceError::PathError {
                path: path.to_path_buf(),
                source,
            }
            .into()
        })
}
