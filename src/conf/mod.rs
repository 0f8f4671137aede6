//! Path configuration
//!
//! Everything needed to turn a configuration document into a validated,
//! ordered path table and to resolve requested path names against it.
//!
//! # Lookup precedence
//!
//! ```text
//!   requested name ──► validate grammar ──► exact entry?    ──► (conf, None)
//!                                              │ no
//!                                              ▼
//!                                        `~` patterns in     ──► (conf, captures)
//!                                        declaration order
//!                                              │ none
//!                                              ▼
//!                                        all / all_others    ──► (conf, [name])
//!                                              │ none
//!                                              ▼
//!                                        NotConfigured
//! ```
//!
//! The active configuration lives in a [`ConfStore`], which swaps whole
//! snapshots on reload.

pub mod duration;
pub mod error;
pub mod global;
pub mod name;
pub mod path;
pub mod store;
pub mod table;

pub use duration::StringDuration;
pub use error::{ConfError, NameError, PathError};
pub use global::Conf;
pub use name::{is_reserved, validate_path_name, RESERVED_NAMES};
pub use path::{PathConf, PathPattern, RtspRangeType, RtspTransport, SOURCE_PUBLISHER, SOURCE_REDIRECT};
pub use store::ConfStore;
pub use table::{find_path_conf, PathMatch, PathTable};
