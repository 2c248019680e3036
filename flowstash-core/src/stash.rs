//! The stash: persisted bookkeeping of a flow across requests.
//!
//! A [`Stash`] is rebuilt from its string form at the start of every request,
//! mutated while the request is processed and serialized again at the end.
//! It holds two regions:
//!
//! - flow bookkeeping (state history and scheduled states), kept as typed
//!   values and persisted under the reserved top-level key `_`;
//! - arbitrary user data, addressed through [`Path`] expressions.
//!
//! The persisted layout is:
//!
//! ```json
//! {
//!   "_": {
//!     "state_history": [{ "s": "login", "u": "success", "n": 2 }],
//!     "scheduled_states": ["passcode", "success"]
//!   },
//!   "email": "user@example.com"
//! }
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::{
    document::{Document, ValueKind},
    error::{DocumentError, MalformedHistory, Result, StashError},
    history::{HistoryEntry, HistoryLog},
    path::Path,
    schedule::ScheduledQueue,
    state::StateName,
};

/// Top-level key under which flow bookkeeping is persisted.
pub const RESERVED_KEY: &str = "_";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Bookkeeping {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "HistoryLog::is_empty"
    )]
    state_history: HistoryLog,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "ScheduledQueue::is_empty"
    )]
    scheduled_states: ScheduledQueue,
    /// Keys under `_` this version does not know about, kept as-is.
    #[serde(flatten)]
    other: Map<String, Value>,
}

/// Reads an explicit `null` the same way as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Bookkeeping {
    fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| {
            StashError::parse(format!("invalid '{RESERVED_KEY}' namespace: {e}"))
        })
    }

    fn is_empty(&self) -> bool {
        self.state_history.is_empty() && self.scheduled_states.is_empty() && self.other.is_empty()
    }
}

/// Persisted state of one flow execution.
///
/// The stash owns all of its data; every mutation goes through `&mut self`.
/// Coordinating concurrent requests for the same flow is up to the caller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stash {
    bookkeeping: Bookkeeping,
    data: Document,
}

impl Stash {
    /// Create a new empty stash.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stash builder.
    pub fn builder() -> StashBuilder {
        StashBuilder::new()
    }

    /// Restore a stash from its string form.
    pub fn from_json_str(data: &str) -> Result<Self> {
        Self::from_document(Document::from_json_str(data)?)
    }

    /// Restore a stash from a parsed document.
    pub fn from_document(mut document: Document) -> Result<Self> {
        let bookkeeping = match document.take(RESERVED_KEY) {
            Some(value) => Bookkeeping::from_value(value)?,
            None => Bookkeeping::default(),
        };

        debug!(
            "Restored stash with {} history entries and {} scheduled states",
            bookkeeping.state_history.len(),
            bookkeeping.scheduled_states.len()
        );

        Ok(Self {
            bookkeeping,
            data: document,
        })
    }

    /// Merge bookkeeping and user data into a single JSON value.
    pub fn to_value(&self) -> Result<Value> {
        let mut map = self.data.as_map().clone();
        if !self.bookkeeping.is_empty() {
            let bookkeeping = serde_json::to_value(&self.bookkeeping).map_err(|e| {
                StashError::serialization("encode flow bookkeeping", DocumentError::Encode(e))
            })?;
            map.insert(RESERVED_KEY.to_owned(), bookkeeping);
        }
        Ok(Value::Object(map))
    }

    /// Serialize the stash to its string form.
    pub fn to_json_string(&self) -> Result<String> {
        let value = self.to_value()?;
        serde_json::to_string(&value)
            .map_err(|e| StashError::serialization("encode stash", DocumentError::Encode(e)))
    }

    // History

    /// Record that the flow entered `state`.
    ///
    /// Nothing is recorded if `state` is already the current state, so
    /// re-rendering a state after a failed submission does not grow the
    /// history. `unscheduled_state` and `scheduled_count` describe how the
    /// scheduled-state queue changed on entering `state`; a count of zero or
    /// less is not recorded.
    pub fn add_state_to_history(
        &mut self,
        state: impl Into<StateName>,
        unscheduled_state: Option<StateName>,
        scheduled_count: Option<i64>,
    ) -> Result<()> {
        let state = state.into();
        let added = self
            .bookkeeping
            .state_history
            .push(state.clone(), unscheduled_state, scheduled_count)
            .map_err(malformed)?;

        if added {
            debug!("Added state '{}' to history", state);
        } else {
            trace!("State '{}' is already current, history unchanged", state);
        }
        Ok(())
    }

    /// The current state and its scheduling metadata.
    ///
    /// An empty history yields `Ok(None)`.
    pub fn last_state_from_history(&self) -> Result<Option<HistoryEntry>> {
        self.bookkeeping.state_history.last().map_err(malformed)
    }

    /// Drop the current state from the history.
    ///
    /// Removing from an empty history does nothing.
    pub fn remove_last_state_from_history(&mut self) -> Result<()> {
        if self.bookkeeping.state_history.pop() {
            debug!("Removed last state from history");
        } else {
            trace!("History is empty, nothing to remove");
        }
        Ok(())
    }

    /// Step back over the current state, undoing its effect on the queue.
    ///
    /// Removes the current history entry, drops the `scheduled_count` states
    /// it put at the head of the queue and puts its `unscheduled_state` back
    /// in front. Returns the state that is current afterwards.
    pub fn revert_last_state(&mut self) -> Result<Option<StateName>> {
        let history = &self.bookkeeping.state_history;
        let Some(last) = history.last().map_err(malformed)? else {
            trace!("History is empty, nothing to revert");
            return Ok(None);
        };
        let previous = history.before_last().map_err(malformed)?;

        self.bookkeeping.state_history.pop();

        let count = last
            .scheduled_count
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        let dropped = (0..count)
            .map_while(|_| self.bookkeeping.scheduled_states.dequeue())
            .count();
        if dropped < count {
            warn!(
                "Expected {} scheduled states to revert, found {}",
                count, dropped
            );
        }

        if let Some(unscheduled) = last.unscheduled_state {
            self.bookkeeping.scheduled_states.schedule([unscheduled]);
        }

        let current = previous.map(|entry| entry.state);
        debug!(
            "Reverted state '{}', current state is now {:?}",
            last.state,
            current.as_ref().map(StateName::as_str)
        );
        Ok(current)
    }

    /// Number of history records.
    pub fn history_len(&self) -> usize {
        self.bookkeeping.state_history.len()
    }

    /// Well-formed history entries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = HistoryEntry> + '_ {
        self.bookkeeping.state_history.entries()
    }

    // Scheduled states

    /// Queue `names` to run before any previously scheduled state.
    pub fn add_scheduled_states<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<StateName>,
    {
        let added = self
            .bookkeeping
            .scheduled_states
            .schedule(names.into_iter().map(Into::into));
        debug!(
            "Scheduled {} states, {} queued in total",
            added,
            self.bookkeeping.scheduled_states.len()
        );
        Ok(())
    }

    /// Remove and return the next scheduled state.
    ///
    /// `Ok(None)` means the schedule is exhausted.
    pub fn dequeue_next_scheduled_state(&mut self) -> Result<Option<StateName>> {
        let next = self.bookkeeping.scheduled_states.dequeue();
        match &next {
            Some(state) => debug!("Dequeued scheduled state '{}'", state),
            None => trace!("No scheduled states left"),
        }
        Ok(next)
    }

    /// The next scheduled state, without removing it.
    pub fn peek_next_scheduled_state(&self) -> Option<&StateName> {
        self.bookkeeping.scheduled_states.peek()
    }

    /// Scheduled states in execution order.
    pub fn scheduled_states(&self) -> impl Iterator<Item = &StateName> {
        self.bookkeeping.scheduled_states.iter()
    }

    /// Number of scheduled states.
    pub fn scheduled_len(&self) -> usize {
        self.bookkeeping.scheduled_states.len()
    }

    // User data

    /// Get the raw user value at `path`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if is_reserved(path) {
            return None;
        }
        self.data.get(path)
    }

    /// Get the user value at `path` and deserialize it.
    pub fn get_as<T>(&self, path: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        if is_reserved(path) {
            return Ok(None);
        }
        self.data
            .get_as(path)
            .map_err(|e| StashError::serialization(format!("read '{path}'"), e))
    }

    /// Store a user value at `path`.
    pub fn set(&mut self, path: &str, value: impl Serialize) -> Result<()> {
        if is_reserved(path) {
            return Err(StashError::reserved_path(path));
        }
        let value = serde_json::to_value(value).map_err(|e| {
            StashError::serialization(format!("set '{path}'"), DocumentError::Encode(e))
        })?;
        if path.is_empty() && value.get(RESERVED_KEY).is_some() {
            return Err(StashError::reserved_path(RESERVED_KEY));
        }
        self.data
            .set_value(path, value)
            .map_err(|e| StashError::serialization(format!("set '{path}'"), e))
    }

    /// Remove the user value at `path` and return it.
    pub fn delete(&mut self, path: &str) -> Result<Option<Value>> {
        if is_reserved(path) {
            return Err(StashError::reserved_path(path));
        }
        self.data
            .delete(path)
            .map_err(|e| StashError::serialization(format!("delete '{path}'"), e))
    }

    /// Check whether a user value exists at `path`.
    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Shape of the user value at `path`.
    pub fn kind(&self, path: &str) -> Option<ValueKind> {
        self.get(path).map(ValueKind::of)
    }

    /// Length of the user array or object at `path`.
    pub fn len(&self, path: &str) -> Option<usize> {
        if is_reserved(path) {
            return None;
        }
        self.data.len(path)
    }

    /// User data, without the bookkeeping region.
    pub fn data(&self) -> &Document {
        &self.data
    }
}

impl FromStr for Stash {
    type Err = StashError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_json_str(s)
    }
}

fn is_reserved(path: &str) -> bool {
    Path::parse(path)
        .ok()
        .and_then(|p| p.first().map(|segment| segment.key() == RESERVED_KEY))
        .unwrap_or(false)
}

fn malformed(err: MalformedHistory) -> StashError {
    warn!("Stashed history is malformed: {}", err);
    StashError::MalformedHistory(err)
}

/// Builder for creating stashes with initial data.
#[derive(Debug, Default)]
pub struct StashBuilder {
    stash: Stash,
}

impl StashBuilder {
    /// Create a new stash builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a serialized stash instead of an empty one.
    pub fn from_json_str(data: &str) -> Result<Self> {
        Ok(Self {
            stash: Stash::from_json_str(data)?,
        })
    }

    /// Set user data.
    pub fn with_json(mut self, path: &str, value: impl Serialize) -> Result<Self> {
        self.stash.set(path, value)?;
        Ok(self)
    }

    /// Record a visited state.
    pub fn with_state(mut self, state: impl Into<StateName>) -> Result<Self> {
        self.stash.add_state_to_history(state, None, None)?;
        Ok(self)
    }

    /// Schedule states.
    pub fn with_scheduled_states<I, S>(mut self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<StateName>,
    {
        self.stash.add_scheduled_states(names)?;
        Ok(self)
    }

    /// Build the stash.
    pub fn build(self) -> Stash {
        self.stash
    }
}
