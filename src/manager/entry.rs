//! Path entry and state types
//!
//! This module defines the per-path state stored in the manager.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::conf::PathConf;
use crate::source::{MediaDescription, RunningSource, SourceDescribe};

/// Readiness of an active path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReadyState {
    /// No medias yet, or the source lost them
    #[default]
    NotReady,
    /// The source is streaming these medias
    Ready(MediaDescription),
}

impl ReadyState {
    /// Whether medias are available
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadyState::Ready(_))
    }

    /// Medias, when ready
    pub fn medias(&self) -> Option<&MediaDescription> {
        match self {
            ReadyState::Ready(desc) => Some(desc),
            ReadyState::NotReady => None,
        }
    }
}

/// Where an active path gets its media from
pub(crate) enum PathSource {
    /// Waits for a client to publish
    Publisher,
    /// Sends readers elsewhere
    Redirect(String),
    /// Pulled by a supervised static source
    Static(RunningSource),
}

/// Entry for a single active path
pub(crate) struct PathEntry {
    /// Distinguishes this activation from earlier ones under the same name
    pub id: u64,

    /// Configuration the path was activated with (updated on hot reload)
    pub conf: Arc<PathConf>,

    /// Capture groups of the pattern that matched
    pub matches: Option<Vec<String>>,

    /// Query string of the activating request
    pub query: String,

    /// Current readiness
    pub state: ReadyState,

    /// Media origin
    pub source: PathSource,

    /// When the path was activated
    pub activated_at: Instant,
}

impl PathEntry {
    pub fn new(
        id: u64,
        conf: Arc<PathConf>,
        matches: Option<Vec<String>>,
        query: &str,
        source: PathSource,
    ) -> Self {
        Self {
            id,
            conf,
            matches,
            query: query.to_string(),
            state: ReadyState::NotReady,
            source,
            activated_at: Instant::now(),
        }
    }

    /// Running supervisor, if the path has a static source
    pub fn running(&self) -> Option<&RunningSource> {
        match &self.source {
            PathSource::Static(running) => Some(running),
            _ => None,
        }
    }

    /// Public view of the entry
    pub fn info(&self, name: &str) -> PathInfo {
        let (source, redirect) = match &self.source {
            PathSource::Publisher => (None, None),
            PathSource::Redirect(target) => (None, Some(target.clone())),
            PathSource::Static(running) => (Some(running.describe()), None),
        };

        PathInfo {
            name: name.to_string(),
            conf_name: self.conf.name.clone(),
            source,
            redirect,
            ready: self.state.is_ready(),
            medias: self.state.medias().cloned(),
            query: self.query.clone(),
            uptime: self.activated_at.elapsed(),
        }
    }
}

/// Snapshot of an active path
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathInfo {
    /// Requested path name
    pub name: String,
    /// Name of the configuration entry that matched
    pub conf_name: String,
    /// Static source description, if any
    pub source: Option<SourceDescribe>,
    /// Redirect target, if the path redirects
    pub redirect: Option<String>,
    /// Whether medias are available
    pub ready: bool,
    /// Medias announced by the source
    pub medias: Option<MediaDescription>,
    /// Query string of the activating request
    pub query: String,
    /// Time since activation
    #[serde(skip)]
    pub uptime: Duration,
}
