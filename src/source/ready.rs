//! Readiness handshake
//!
//! A source announces its medias with [`SourceReporter::set_ready`] and
//! waits for the path owner's verdict before streaming. Requests travel to
//! the supervisor loop over a rendezvous channel and carry a one-shot reply
//! slot that the owner consumes when answering.
//!
//! ```text
//!   StaticSource::run          supervisor loop            SourceParent
//!        │ set_ready(desc)            │                         │
//!        ├──── SetReadyReq ──────────►│ on_source_ready(req) ──►│
//!        │                            │                         │ req.accept()
//!        │◄──────────────── reply via oneshot ──────────────────┤
//! ```
//!
//! If the supervisor is cancelled at any point before the reply arrives the
//! source gets `Terminated` instead of waiting forever.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::error::SourceError;
use super::instance::SourceParent;
use super::media::{medias_info, MediaDescription};
use crate::logger::LogLevel;

/// Owner's answer to a readiness announcement
pub type SetReadyRes = Result<(), SourceError>;

/// Readiness announcement with its reply slot
#[derive(Debug)]
pub struct SetReadyReq {
    /// Medias the source is about to stream
    pub desc: MediaDescription,
    res: oneshot::Sender<SetReadyRes>,
}

impl SetReadyReq {
    pub(crate) fn new(desc: MediaDescription) -> (Self, oneshot::Receiver<SetReadyRes>) {
        let (res, rx) = oneshot::channel();
        (Self { desc, res }, rx)
    }

    /// Answer the announcement
    pub fn reply(self, res: SetReadyRes) {
        let _ = self.res.send(res);
    }

    /// Accept the medias
    pub fn accept(self) {
        self.reply(Ok(()));
    }

    /// Decline the medias
    pub fn reject(self, reason: impl Into<String>) {
        self.reply(Err(SourceError::Rejected(reason.into())));
    }
}

/// Loss-of-media notification with its acknowledgement slot
#[derive(Debug)]
pub struct SetNotReadyReq {
    res: oneshot::Sender<()>,
}

impl SetNotReadyReq {
    pub(crate) fn new() -> (Self, oneshot::Receiver<()>) {
        let (res, rx) = oneshot::channel();
        (Self { res }, rx)
    }

    /// Acknowledge the notification
    pub fn ack(self) {
        let _ = self.res.send(());
    }
}

/// Handle a running source uses to report readiness and log upward
#[derive(Clone)]
pub struct SourceReporter {
    ready_tx: mpsc::Sender<SetReadyReq>,
    not_ready_tx: mpsc::Sender<SetNotReadyReq>,
    cancel: CancellationToken,
    parent: Arc<dyn SourceParent>,
    kind: String,
}

impl SourceReporter {
    pub(crate) fn new(
        ready_tx: mpsc::Sender<SetReadyReq>,
        not_ready_tx: mpsc::Sender<SetNotReadyReq>,
        cancel: CancellationToken,
        parent: Arc<dyn SourceParent>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            ready_tx,
            not_ready_tx,
            cancel,
            parent,
            kind: kind.into(),
        }
    }

    /// Emit a log line through the path, tagged with the source type
    pub fn log(&self, level: LogLevel, message: &str) {
        self.parent
            .log(level, &format!("[{}] {}", self.kind, message));
    }

    /// Announce medias and wait for the owner's verdict
    pub async fn set_ready(&self, desc: MediaDescription) -> SetReadyRes {
        let info = medias_info(&desc);
        let (req, rx) = SetReadyReq::new(desc);

        tokio::select! {
            sent = self.ready_tx.send(req) => {
                if sent.is_err() {
                    return Err(SourceError::Terminated);
                }
            }
            _ = self.cancel.cancelled() => return Err(SourceError::Terminated),
        }

        // an answer that is already there wins over a concurrent stop
        let res = tokio::select! {
            biased;
            res = rx => res.unwrap_or(Err(SourceError::Terminated)),
            _ = self.cancel.cancelled() => Err(SourceError::Terminated),
        };

        if res.is_ok() {
            self.log(LogLevel::Info, &format!("ready: {}", info));
        }

        res
    }

    /// Report that the medias are gone and wait for acknowledgement
    ///
    /// Returns early once the supervisor is stopped.
    pub async fn set_not_ready(&self) {
        let (req, rx) = SetNotReadyReq::new();

        tokio::select! {
            sent = self.not_ready_tx.send(req) => {
                if sent.is_err() {
                    return;
                }
            }
            _ = self.cancel.cancelled() => return,
        }

        let acked = tokio::select! {
            biased;
            res = rx => res.is_ok(),
            _ = self.cancel.cancelled() => false,
        };

        if acked {
            self.log(LogLevel::Info, "not ready");
        }
    }

    /// Whether the supervisor has been stopped
    pub fn is_terminated(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for SourceReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceReporter")
            .field("kind", &self.kind)
            .field("terminated", &self.cancel.is_cancelled())
            .finish()
    }
}
