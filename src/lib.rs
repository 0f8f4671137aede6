//! pathmux: path configuration resolver and static source supervisor
//!
//! This library provides the routing core of a media server:
//! - Path configuration with defaults, validation and hot reload
//! - Name lookup across literal entries, `~` regex patterns and catch-alls
//! - Source templates with capture groups, query and credentials
//! - A supervisor that keeps pulled streams alive with a fixed retry pause
//! - A path manager that owns active paths and their readiness
//!
//! Protocol clients plug in through [`StaticSource`] and [`SourceFactory`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pathmux::{
//!     Conf, PathConf, PathManager, SourceError, SourceFactory, SourceKind, SourceOptions,
//!     StaticSource,
//! };
//!
//! struct NoClients;
//!
//! impl SourceFactory for NoClients {
//!     fn create(
//!         &self,
//!         kind: SourceKind,
//!         _conf: &PathConf,
//!         _options: &SourceOptions,
//!     ) -> Result<Arc<dyn StaticSource>, SourceError> {
//!         Err(SourceError::Unsupported(kind))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conf = Conf::load("pathmux.json")?;
//!     pathmux::logger::init(conf.log_level);
//!
//!     let manager = PathManager::new(conf, Arc::new(NoClients));
//!     manager.start().await?;
//!
//!     let info = manager.activate("cam1", "").await?;
//!     println!("{} served by entry {}", info.name, info.conf_name);
//!
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod conf;
pub mod error;
pub mod logger;
pub mod manager;
pub mod source;
pub mod stats;

// Re-export main types for convenience
pub use conf::{find_path_conf, Conf, ConfStore, PathConf, PathMatch, PathTable};
pub use error::{Error, Result};
pub use logger::LogLevel;
pub use manager::{PathEvent, PathInfo, PathManager, ReadyState};
pub use source::{
    resolve_source, MediaDescription, RunParams, RunningSource, SourceDescribe, SourceError,
    SourceFactory, SourceKind, SourceOptions, SourceParent, SourceReporter, StaticSource,
    StaticSourceHandler,
};
