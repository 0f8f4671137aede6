//! Path lifecycle notifications

use crate::source::MediaDescription;

/// Event broadcast by the path manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathEvent {
    /// The path's source announced medias and was accepted
    Ready {
        path: String,
        medias: MediaDescription,
    },
    /// The path's source lost its medias
    NotReady { path: String },
    /// The path was deactivated
    Removed { path: String, reason: String },
}

impl PathEvent {
    /// Name of the path the event is about
    pub fn path(&self) -> &str {
        match self {
            PathEvent::Ready { path, .. }
            | PathEvent::NotReady { path }
            | PathEvent::Removed { path, .. } => path,
        }
    }
}
