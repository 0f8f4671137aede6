//! Active path management
//!
//! The manager keeps one entry per active path and acts as the owner every
//! static source supervisor reports readiness to.
//!
//! # Architecture
//!
//! ```text
//!                           PathManager
//!                ┌──────────────────────────────────┐
//!                │ conf: ConfStore (arc-swap)       │
//!                │ paths: HashMap<name, PathEntry { │
//!                │   conf, state,                   │
//!                │   source: Publisher              │
//!                │         | Redirect(target)       │
//!                │         | Static(RunningSource)  │
//!                │ }>                               │
//!                └───────────────┬──────────────────┘
//!                                │ PathSink (per activation)
//!          ┌─────────────────────┼─────────────────────┐
//!          ▼                     ▼                     ▼
//!   [supervisor cam]     [supervisor relay/x]   subscribe() ──► PathEvent
//! ```
//!
//! Each activation gets its own sink tagged with an id, so a supervisor
//! that outlives its entry (stopped during a reload) can never mark the
//! replacement entry ready.

pub mod entry;
pub mod event;
pub mod store;

pub use entry::{PathInfo, ReadyState};
pub use event::PathEvent;
pub use store::PathManager;
