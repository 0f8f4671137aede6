//! Path manager implementation
//!
//! Owns the active paths, starts a supervisor for every path pulled from a
//! static source, and applies configuration reloads to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

use super::entry::{PathEntry, PathInfo, PathSource, ReadyState};
use super::event::PathEvent;
use crate::conf::{Conf, ConfStore, PathConf, PathError, PathMatch, SOURCE_REDIRECT};
use crate::error::{Error, Result};
use crate::logger::{self, LogLevel};
use crate::source::{
    medias_info, SetNotReadyReq, SetReadyReq, SourceError, SourceFactory, SourceParent,
    StaticSourceHandler, RETRY_PAUSE,
};
use crate::stats::{ManagerStats, SourceStatsSnapshot};

/// Capacity of the event channel
const EVENT_CAPACITY: usize = 256;

type PathMap = HashMap<String, PathEntry>;

/// State shared with the per-path sinks
struct Shared {
    paths: RwLock<PathMap>,
    events: broadcast::Sender<PathEvent>,
}

/// Registry of active paths
///
/// Thread-safe via `RwLock`; wrap in an `Arc` to share between request
/// handlers.
pub struct PathManager {
    /// Active configuration snapshot
    conf: ConfStore,

    /// Builds source implementations
    factory: Arc<dyn SourceFactory>,

    /// Pause between source attempts
    retry_pause: Duration,

    /// Activation counter
    next_id: AtomicU64,

    shared: Arc<Shared>,
}

impl PathManager {
    /// Create a manager serving `conf`
    pub fn new(conf: Conf, factory: Arc<dyn SourceFactory>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            conf: ConfStore::new(conf),
            factory,
            retry_pause: RETRY_PAUSE,
            next_id: AtomicU64::new(1),
            shared: Arc::new(Shared {
                paths: RwLock::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Override the pause between source attempts
    pub fn retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    /// Current configuration snapshot
    pub fn conf(&self) -> Arc<Conf> {
        self.conf.load()
    }

    /// Activate every path whose static source runs regardless of readers
    pub async fn start(&self) -> Result<()> {
        let snapshot = self.conf.load();

        for conf in snapshot.paths.iter().filter(|c| is_always_on(c)) {
            self.activate(&conf.name, "").await?;
        }

        tracing::info!(paths = snapshot.paths.len(), "Path manager started");
        Ok(())
    }

    /// Resolve a path name against the current configuration
    pub fn find_path_conf(&self, name: &str) -> std::result::Result<PathMatch, PathError> {
        self.conf.find_path_conf(name)
    }

    /// Activate a path, starting its static source if it has one
    ///
    /// Activating a path that is already active returns its current state.
    pub async fn activate(&self, name: &str, query: &str) -> Result<PathInfo> {
        let found = self.conf.find_path_conf(name)?;

        let mut paths = self.shared.paths.write().await;
        if let Some(entry) = paths.get(name) {
            return Ok(entry.info(name));
        }

        let entry = self.build_entry(name, found, query)?;
        let info = entry.info(name);
        paths.insert(name.to_string(), entry);

        Ok(info)
    }

    /// Deactivate a path, stopping its static source
    ///
    /// Returns `false` if the path was not active.
    pub async fn deactivate(&self, name: &str, reason: &str) -> bool {
        let entry = self.shared.paths.write().await.remove(name);

        match entry {
            Some(entry) => {
                self.close(name, entry, reason).await;
                true
            }
            None => false,
        }
    }

    /// Swap in a new configuration and bring active paths in line with it
    ///
    /// Paths whose entry disappeared are deactivated, paths whose source
    /// changed are restarted, other changes are handed to the running
    /// source. A change of the server-wide source options restarts every
    /// static source. Always-on paths new in `conf` are started.
    pub async fn reload(&self, conf: Conf) -> Result<()> {
        conf.validate()?;
        let previous = self.conf.replace(conf);
        let snapshot = self.conf.load();
        let options_changed = previous.source_options() != snapshot.source_options();

        let mut paths = self.shared.paths.write().await;
        let mut first_err: Option<Error> = None;

        let names: Vec<String> = paths.keys().cloned().collect();
        for name in names {
            let found = match snapshot.find_path_conf(&name) {
                Ok(found) => found,
                Err(_) => {
                    if let Some(entry) = paths.remove(&name) {
                        self.close(&name, entry, "removed from configuration").await;
                    }
                    continue;
                }
            };

            let Some(entry) = paths.get_mut(&name) else {
                continue;
            };

            let rebuild_source =
                options_changed && matches!(entry.source, PathSource::Static(_));

            if *entry.conf == *found.conf && !rebuild_source {
                continue;
            }

            if rebuild_source
                || entry.conf.name != found.conf.name
                || entry.conf.requires_source_restart(&found.conf)
            {
                if let Some(old) = paths.remove(&name) {
                    if let Err(err) = self.restart(&mut paths, &name, old, found).await {
                        first_err.get_or_insert(err);
                    }
                }
            } else {
                tracing::debug!(path = %name, "Path configuration reloaded");
                entry.conf = Arc::clone(&found.conf);
                if let PathSource::Static(running) = &mut entry.source {
                    running.reload_conf(found.conf);
                }
            }
        }

        for conf in snapshot.paths.iter().filter(|c| is_always_on(c)) {
            if paths.contains_key(&conf.name) {
                continue;
            }
            let found = PathMatch {
                conf: Arc::clone(conf),
                matches: None,
            };
            match self.build_entry(&conf.name, found, "") {
                Ok(entry) => {
                    paths.insert(conf.name.clone(), entry);
                }
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Readiness of an active path
    pub async fn ready_state(&self, name: &str) -> Option<ReadyState> {
        let paths = self.shared.paths.read().await;
        paths.get(name).map(|entry| entry.state.clone())
    }

    /// Snapshot of an active path
    pub async fn describe(&self, name: &str) -> Option<PathInfo> {
        let paths = self.shared.paths.read().await;
        paths.get(name).map(|entry| entry.info(name))
    }

    /// Counters of an active path's static source
    pub async fn source_stats(&self, name: &str) -> Option<SourceStatsSnapshot> {
        let paths = self.shared.paths.read().await;
        paths
            .get(name)
            .and_then(|entry| entry.running())
            .map(|running| running.stats().snapshot())
    }

    /// Aggregate counters
    pub async fn stats(&self) -> ManagerStats {
        let paths = self.shared.paths.read().await;
        ManagerStats {
            active_paths: paths.len(),
            ready_paths: paths.values().filter(|e| e.state.is_ready()).count(),
            static_sources: paths.values().filter(|e| e.running().is_some()).count(),
        }
    }

    /// Names of the active paths, sorted
    pub async fn path_names(&self) -> Vec<String> {
        let paths = self.shared.paths.read().await;
        let mut names: Vec<String> = paths.keys().cloned().collect();
        names.sort();
        names
    }

    /// Receive path lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<PathEvent> {
        self.shared.events.subscribe()
    }

    /// Deactivate every path
    pub async fn shutdown(&self) {
        let entries: Vec<(String, PathEntry)> = self.shared.paths.write().await.drain().collect();

        for (name, entry) in entries {
            self.close(&name, entry, "shutting down").await;
        }

        tracing::info!("Path manager stopped");
    }

    fn build_entry(&self, name: &str, found: PathMatch, query: &str) -> Result<PathEntry> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let conf = found.conf;

        let source = if conf.has_static_source() {
            let sink = PathSink {
                name: name.to_string(),
                id,
                shared: Arc::downgrade(&self.shared),
            };
            let handler = StaticSourceHandler::new(
                Arc::clone(&conf),
                found.matches.clone(),
                &self.conf.load().source_options(),
                self.factory.as_ref(),
                Arc::new(sink),
            )?
            .retry_pause(self.retry_pause);

            PathSource::Static(handler.start(conf.source_on_demand, query))
        } else if conf.source == SOURCE_REDIRECT {
            PathSource::Redirect(conf.source_redirect.clone())
        } else {
            PathSource::Publisher
        };

        tracing::info!(
            path = %name,
            conf = %conf.name,
            source = %conf.source,
            "Path activated"
        );

        Ok(PathEntry::new(id, conf, found.matches, query, source))
    }

    async fn restart(
        &self,
        paths: &mut RwLockWriteGuard<'_, PathMap>,
        name: &str,
        old: PathEntry,
        found: PathMatch,
    ) -> Result<()> {
        let was_ready = old.state.is_ready();
        if let PathSource::Static(running) = old.source {
            running.stop("configuration changed").await;
        }
        if was_ready {
            let _ = self.shared.events.send(PathEvent::NotReady {
                path: name.to_string(),
            });
        }

        match self.build_entry(name, found, &old.query) {
            Ok(entry) => {
                paths.insert(name.to_string(), entry);
                Ok(())
            }
            Err(err) => {
                tracing::error!(path = %name, error = %err, "Failed to restart path");
                let _ = self.shared.events.send(PathEvent::Removed {
                    path: name.to_string(),
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn close(&self, name: &str, entry: PathEntry, reason: &str) {
        if let PathSource::Static(running) = entry.source {
            running.stop(reason).await;
        }

        tracing::info!(path = %name, reason = reason, "Path deactivated");

        let _ = self.shared.events.send(PathEvent::Removed {
            path: name.to_string(),
            reason: reason.to_string(),
        });
    }
}

impl Drop for PathManager {
    fn drop(&mut self) {
        if let Ok(paths) = self.shared.paths.try_read() {
            if !paths.is_empty() {
                tracing::warn!(paths = paths.len(), "Path manager dropped without shutdown");
            }
        }
    }
}

/// Literal path whose static source starts at boot
fn is_always_on(conf: &PathConf) -> bool {
    !conf.is_pattern() && conf.has_static_source() && !conf.source_on_demand
}

/// Readiness receiver for one activation of a path
struct PathSink {
    name: String,
    id: u64,
    shared: Weak<Shared>,
}

impl PathSink {
    async fn lock<'a>(
        shared: &'a Shared,
        cancel: &CancellationToken,
    ) -> Option<RwLockWriteGuard<'a, PathMap>> {
        tokio::select! {
            guard = shared.paths.write() => Some(guard),
            _ = cancel.cancelled() => None,
        }
    }
}

#[async_trait]
impl SourceParent for PathSink {
    async fn on_source_ready(&self, cancel: &CancellationToken, req: SetReadyReq) {
        let Some(shared) = self.shared.upgrade() else {
            req.reply(Err(SourceError::Terminated));
            return;
        };
        let Some(mut paths) = Self::lock(&shared, cancel).await else {
            req.reply(Err(SourceError::Terminated));
            return;
        };

        match paths.get_mut(&self.name) {
            Some(entry) if entry.id == self.id => {
                tracing::info!(
                    path = %self.name,
                    tracks = %medias_info(&req.desc),
                    "Path ready"
                );
                entry.state = ReadyState::Ready(req.desc.clone());
                let _ = shared.events.send(PathEvent::Ready {
                    path: self.name.clone(),
                    medias: req.desc.clone(),
                });
                req.accept();
            }
            _ => req.reject(format!("path not found: {}", self.name)),
        }
    }

    async fn on_source_not_ready(&self, cancel: &CancellationToken, req: SetNotReadyReq) {
        let Some(shared) = self.shared.upgrade() else {
            req.ack();
            return;
        };
        let Some(mut paths) = Self::lock(&shared, cancel).await else {
            req.ack();
            return;
        };

        if let Some(entry) = paths.get_mut(&self.name) {
            if entry.id == self.id && entry.state.is_ready() {
                tracing::info!(path = %self.name, "Path not ready");
                entry.state = ReadyState::NotReady;
                let _ = shared.events.send(PathEvent::NotReady {
                    path: self.name.clone(),
                });
            }
        }
        req.ack();
    }

    fn log(&self, level: LogLevel, message: &str) {
        logger::log(level, &self.name, message);
    }
}
