//! Static sources
//!
//! A static source pulls a stream from an external address (an RTSP camera,
//! an RTMP server, an HLS playlist, ...) instead of waiting for a client to
//! publish it. This module defines the contract between a source
//! implementation and its path, and the supervisor that keeps it running.
//!
//! ```text
//!   PathConf ──► StaticSourceHandler ──start──► worker task
//!                                                  │
//!                         resolve_source($G1.., $MTX_QUERY, credentials)
//!                                                  │
//!                                                  ▼
//!                                     StaticSource::run(RunParams)
//!                                                  │ SourceReporter::set_ready
//!                                                  ▼
//!                                      SourceParent::on_source_ready
//! ```

pub mod error;
pub mod handler;
pub mod instance;
pub mod kind;
pub mod media;
pub mod ready;
pub mod resolve;

pub use error::SourceError;
pub use handler::{RunningSource, SourcePhase, StaticSourceHandler, RETRY_PAUSE};
pub use instance::{
    RunParams, SourceDescribe, SourceFactory, SourceOptions, SourceParent, StaticSource,
};
pub use kind::SourceKind;
pub use media::{medias_info, Media, MediaDescription, MediaType};
pub use ready::{SetNotReadyReq, SetReadyReq, SetReadyRes, SourceReporter};
pub use resolve::{resolve_source, QUERY_PLACEHOLDER};
