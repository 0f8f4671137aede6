//! Capabilities at the edges of the supervisor
//!
//! A [`StaticSource`] is the protocol client that actually pulls media; a
//! [`SourceParent`] is the path owner that learns when media is available
//! and receives the log lines of the source. The supervisor sits between
//! the two.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::SourceError;
use super::kind::SourceKind;
use super::ready::{SetNotReadyReq, SetReadyReq, SourceReporter};
use crate::conf::PathConf;
use crate::logger::LogLevel;

/// Server-wide settings every source is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOptions {
    /// Timeout of reads from the remote end
    pub read_timeout: Duration,
    /// Timeout of writes to the remote end
    pub write_timeout: Duration,
    /// Depth of the queue between the source and its readers
    pub write_queue_size: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            write_queue_size: 512,
        }
    }
}

/// Everything a single execution of a static source receives
pub struct RunParams {
    /// Cancelled when the execution must end
    pub cancel: CancellationToken,
    /// Source URL with placeholders substituted and credentials injected
    pub resolved_source: String,
    /// Path configuration at launch time
    pub conf: Arc<PathConf>,
    /// Configuration updates delivered while running
    pub reload: mpsc::Receiver<Arc<PathConf>>,
    /// Readiness handshake and log sink back to the path
    pub reporter: SourceReporter,
}

/// What a source reports about itself to the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDescribe {
    /// Source type name, e.g. `rtspSource`
    #[serde(rename = "type")]
    pub kind: String,
    /// Source identifier (empty when not applicable)
    pub id: String,
}

impl SourceDescribe {
    /// Description for a source kind without identifier
    pub fn of(kind: SourceKind) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            id: String::new(),
        }
    }
}

/// A protocol client that pulls a stream into the server
///
/// `run` is invoked once per attempt and should keep going until
/// `params.cancel` fires or the stream fails. Before streaming it must
/// announce its medias through `params.reporter.set_ready`, and it logs
/// through `params.reporter.log`.
#[async_trait]
pub trait StaticSource: Send + Sync + 'static {
    /// Pull the stream until cancelled or failed
    async fn run(&self, params: RunParams) -> Result<(), SourceError>;

    /// Describe the source for the control plane
    fn describe(&self) -> SourceDescribe;
}

/// Builds the source implementation for a kind of static source
pub trait SourceFactory: Send + Sync + 'static {
    /// Create the instance serving `conf`
    fn create(
        &self,
        kind: SourceKind,
        conf: &PathConf,
        options: &SourceOptions,
    ) -> Result<Arc<dyn StaticSource>, SourceError>;
}

/// Receives readiness transitions and log lines from a supervisor
///
/// Implementations take ownership of the request and must reply to it.
/// `cancel` fires when the supervisor is being stopped; implementations that
/// wait on anything should give up when it does.
#[async_trait]
pub trait SourceParent: Send + Sync + 'static {
    /// The source has media and wants to start streaming
    async fn on_source_ready(&self, cancel: &CancellationToken, req: SetReadyReq);

    /// The source lost its media
    async fn on_source_not_ready(&self, cancel: &CancellationToken, req: SetNotReadyReq);

    /// Emit a log line of the supervisor or its source
    fn log(&self, level: LogLevel, message: &str);
}
