//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Initialize stores/clients → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections
//!         → Drain background work (background.rs) → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Sweeper (sweeper.rs):
//!     Interval tick → Purge expired counters and cache entries
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listener
//! - Ordered shutdown: stop accept, drain requests, drain background tasks
//! - Background drain has a timeout: work still pending after it is abandoned

pub mod background;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod sweeper;

pub use background::BackgroundTasks;
pub use shutdown::{Shutdown, ShutdownSignal};
pub use sweeper::Sweeper;
