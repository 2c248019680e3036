//! # flowstash
//!
//! Persisted bookkeeping for multi-step flows that run across stateless
//! request/response cycles.
//!
//! ## Core Concepts
//!
//! - **Stash**: everything a flow needs to remember between requests, restored
//!   from and serialized to a single string
//! - **History**: distinct states visited so far, used for back navigation
//! - **Scheduled states**: states queued by sub-flows, run before the parent
//!   flow continues
//! - **Document**: path-addressed JSON storage for arbitrary user data
//!
//! ## Quick Start
//!
//! ```rust
//! use flowstash_core::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let mut stash = Stash::new();
//! stash.add_state_to_history("login", None, None)?;
//! stash.add_scheduled_states(["passcode", "success"])?;
//! stash.set("email", "user@example.com")?;
//!
//! let token = stash.to_json_string()?;
//!
//! // Next request
//! let mut stash: Stash = token.parse()?;
//! assert_eq!(stash.last_state_from_history()?.map(|e| e.state), Some("login".into()));
//! assert_eq!(stash.dequeue_next_scheduled_state()?, Some("passcode".into()));
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod error;
pub mod history;
pub mod path;
pub mod schedule;
pub mod stash;
pub mod state;

/// Convenient re-exports for common use.
pub mod prelude {
    pub use serde::{Deserialize, Serialize};
    pub use serde_json;

    pub use crate::{
        document::{Document, ValueKind},
        error::{DocumentError, MalformedHistory, Result, StashError},
        history::{HistoryEntry, HistoryLog},
        path::Path,
        schedule::ScheduledQueue,
        stash::{RESERVED_KEY, Stash, StashBuilder},
        state::StateName,
    };
}
