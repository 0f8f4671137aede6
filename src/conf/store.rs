//! Hot-swappable configuration snapshot
//!
//! Readers load an `Arc<Conf>` and keep using it for as long as they need;
//! a reload replaces the whole snapshot atomically so nobody ever observes a
//! partially updated table.

use std::sync::Arc;

use arc_swap::ArcSwap;

use super::error::PathError;
use super::global::Conf;
use super::table::PathMatch;

/// Shared, atomically replaceable configuration
#[derive(Debug)]
pub struct ConfStore {
    current: ArcSwap<Conf>,
}

impl ConfStore {
    /// Create a store holding `conf`
    pub fn new(conf: Conf) -> Self {
        Self {
            current: ArcSwap::from_pointee(conf),
        }
    }

    /// Current snapshot
    pub fn load(&self) -> Arc<Conf> {
        self.current.load_full()
    }

    /// Replace the snapshot, returning the previous one
    pub fn replace(&self, conf: Conf) -> Arc<Conf> {
        let previous = self.current.swap(Arc::new(conf));
        tracing::debug!(paths = self.current.load().paths.len(), "Configuration replaced");
        previous
    }

    /// Resolve a path name against the current snapshot
    pub fn find_path_conf(&self, name: &str) -> Result<PathMatch, PathError> {
        self.current.load().find_path_conf(name)
    }
}

impl Default for ConfStore {
    fn default() -> Self {
        Self::new(Conf::default())
    }
}
