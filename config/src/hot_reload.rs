//! # Configuration Hot Reload
//!
//! Watches a configuration directory for changes so a caller can recompose.

use errors::ComposeError;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::debug;
use tracing::{error, info, warn};

/// Configuration reload event.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigReloadEvent {
    Ready,

    /// Configuration file changed
    Changed(PathBuf),

    /// Configuration file was removed
    Removed(PathBuf),

    /// Configuration file was created
    Created(PathBuf),

    /// Watcher error
    Error { path: PathBuf, error: String }
}

impl ConfigReloadEvent {
    /// File the event is about, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Ready => None,
            Self::Changed(path) | Self::Removed(path) | Self::Created(path) => Some(path),
            Self::Error { path, .. } => Some(path)
        }
    }
}

/// Whether `path` looks like a configuration file (editor swap files and
/// other noise are ignored).
pub fn is_config_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') || n.ends_with('~'));
    let known = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e, "yaml" | "yml" | "toml"));
    known && !hidden
}

/// Watch a configuration directory (recursively) and emit reload events.
///
/// ## Usage
/// ```rust,no_run
/// use config::{hot_reload::ConfigReloadEvent, watch_config};
/// use tokio::signal;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let (_tx, mut rx) = watch_config(std::path::Path::new("conf")).await?;
///
///     loop {
///         tokio::select! {
///             _ = signal::ctrl_c() => break,
///             Some(event) = rx.recv() => {
///                 if let ConfigReloadEvent::Changed(path) = event {
///                     println!("Config changed: {:?}", path);
///                 }
///             }
///         }
///     }
///
///     Ok(())
/// }
/// ```
///
/// ## Event Types
/// - `Ready`: the watcher is installed
/// - `Changed`: file content modified
/// - `Created`: new file created
/// - `Removed`: file deleted
/// - `Error`: the watcher could not be installed
pub async fn watch_config(
    config_dir: &Path
) -> Result<(Sender<ConfigReloadEvent>, Receiver<ConfigReloadEvent>), ComposeError> {
    let config_dir = config_dir.to_path_buf();

    if !config_dir.exists() {
        return Err(ComposeError::ConfigNotFound {
            name: config_dir.display().to_string(),
            search_path: "filesystem".to_string()
        });
    }

    let (tx, rx) = tokio::sync::mpsc::channel(100);
    let tx_task = tx.clone();
    let dir_task = config_dir.clone();

    tokio::spawn(async move {
        let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(100);
        let mut watcher = match RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            notify::Config::default()
        ) {
            Ok(w) => w,
            Err(e) => {
                let error_msg = format!("Failed to create file watcher: {}", e);
                error!("{}", error_msg);

                let _ = tx_task
                    .send(ConfigReloadEvent::Error {
                        path: dir_task,
                        error: error_msg
                    })
                    .await;

                return;
            }
        };

        if let Err(e) = watcher.watch(&config_dir, RecursiveMode::Recursive) {
            let error_msg = format!("Failed to watch config directory: {}", e);
            error!("{}", error_msg);

            let _ = tx_task
                .send(ConfigReloadEvent::Error {
                    path: dir_task,
                    error: error_msg
                })
                .await;

            return;
        }

        info!("Watching config directory: {:?}", config_dir);

        let _ = tx_task.send(ConfigReloadEvent::Ready).await;

        loop {
            tokio::select! {
                _ = tx_task.closed() => {
                    debug!("Receiver dropped, stopping watcher for {:?}", config_dir);
                    break;
                }
                event_result = event_rx.recv() => {
                    let Some(event_result) = event_result else {
                        break;
                    };

                    let event = match event_result {
                        Ok(event) => event,
                        Err(e) => {
                            warn!("Watch error: {}", e);
                            continue;
                        }
                    };

                    for path in event.paths.iter().filter(|p| is_config_file(p)) {
                        let reload_event = match event.kind {
                            EventKind::Create(_) => {
                                info!("Config file created: {:?}", path);
                                ConfigReloadEvent::Created(path.clone())
                            }
                            EventKind::Modify(_) => {
                                info!("Config file updated: {:?}", path);
                                ConfigReloadEvent::Changed(path.clone())
                            }
                            EventKind::Remove(_) => {
                                warn!("Config file removed: {:?}", path);
                                ConfigReloadEvent::Removed(path.clone())
                            }
                            _ => {
                                debug!("Ignoring event: {:?}", event.kind);
                                continue;
                            }
                        };

                        if let Err(e) = tx_task.send(reload_event).await {
                            error!("Failed to send config reload event: {}", e);
                            return;
                        }
                    }
                }
            }
        }
    });

    Ok((tx, rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tokio::time::Duration;

    async fn next_event(rx: &mut Receiver<ConfigReloadEvent>) -> ConfigReloadEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("Timeout waiting for event")
            .expect("No event received")
    }

    #[test]
    fn test_is_config_file() {
        assert!(is_config_file(Path::new("config/env/cube.yaml")));
        assert!(is_config_file(Path::new("config/overrides.toml")));
        assert!(!is_config_file(Path::new("config/env/.cube.yaml.swp")));
        assert!(!is_config_file(Path::new("config/env/cube.yaml~")));
        assert!(!is_config_file(Path::new("config/README.md")));
    }

    #[test]
    fn test_event_path() {
        let path = PathBuf::from("/config/main.yaml");
        assert_eq!(ConfigReloadEvent::Ready.path(), None);
        assert_eq!(
            ConfigReloadEvent::Changed(path.clone()).path(),
            Some(path.as_path())
        );
        assert_eq!(
            ConfigReloadEvent::Error {
                path: path.clone(),
                error: "boom".to_string()
            }
            .path(),
            Some(path.as_path())
        );
    }

    #[tokio::test]
    async fn test_watch_config_emits_change_in_subdirectory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let group_dir = temp_dir.path().join("env");
        fs::create_dir_all(&group_dir).unwrap();
        let option = group_dir.join("cube.yaml");
        fs::write(&option, "n_dim: 2\n").unwrap();

        let (_tx, mut rx) = watch_config(temp_dir.path()).await.unwrap();
        assert_eq!(next_event(&mut rx).await, ConfigReloadEvent::Ready);

        fs::write(&option, "n_dim: 3\n").unwrap();

        match next_event(&mut rx).await {
            ConfigReloadEvent::Changed(path) | ConfigReloadEvent::Created(path) => {
                assert_eq!(path.canonicalize().unwrap(), option.canonicalize().unwrap());
            }
            other => panic!("Expected Changed event, got {:?}", other)
        }
    }

    #[tokio::test]
    async fn test_watch_config_nonexistent_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = watch_config(&temp_dir.path().join("missing")).await;
        assert!(matches!(result, Err(ComposeError::ConfigNotFound { .. })));
    }

    #[tokio::test]
    async fn test_watch_config_stops_when_receiver_dropped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = watch_config(temp_dir.path()).await.unwrap();
        assert_eq!(next_event(&mut rx).await, ConfigReloadEvent::Ready);

        let task_sender = tx.downgrade();
        drop(tx);
        drop(rx);

        // The watcher task owns the last sender; it goes away once the task ends.
        tokio::time::timeout(Duration::from_secs(5), async {
            while task_sender.upgrade().is_some() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("Watcher task did not stop");
    }

    #[tokio::test]
    async fn test_watch_config_removed_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("main.yaml");
        fs::write(&config_path, "seed: 0\n").unwrap();

        let (_tx, mut rx) = watch_config(temp_dir.path()).await.unwrap();
        assert_eq!(next_event(&mut rx).await, ConfigReloadEvent::Ready);

        fs::remove_file(&config_path).unwrap();

        loop {
            match next_event(&mut rx).await {
                ConfigReloadEvent::Removed(path) => {
                    assert_eq!(path.file_name(), config_path.file_name());
                    break;
                }
                ConfigReloadEvent::Error { error, .. } => panic!("Watcher failed: {error}"),
                _ => continue
            }
        }
    }
}
