//! Ordered log of visited states.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::MalformedHistory, state::StateName};

/// One visited state.
///
/// The optional fields are only present when entering this state changed the
/// scheduled-state queue; they describe how to restore the queue when the
/// flow steps back over this entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryEntry {
    /// The visited state.
    #[serde(rename = "s")]
    pub state: StateName,
    /// State that was due next but got deferred in favor of a sub-flow.
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    pub unscheduled_state: Option<StateName>,
    /// Number of sub-flow states queued when this state was entered.
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub scheduled_count: Option<i64>,
}

impl HistoryEntry {
    /// Create an entry without scheduling metadata.
    pub fn new(state: impl Into<StateName>) -> Self {
        Self {
            state: state.into(),
            unscheduled_state: None,
            scheduled_count: None,
        }
    }

    /// Decode an arbitrary JSON value into an entry.
    ///
    /// Only a non-object value or a missing `s` field is malformed. Other
    /// field values are coerced: a non-string state becomes its JSON text (an
    /// empty name for `null`) and a count is read as an integer, truncating
    /// fractions and falling back to zero. `null` for `u` or `n` means the
    /// field is absent.
    pub fn from_value(value: &Value) -> Result<Self, MalformedHistory> {
        let Value::Object(map) = value else {
            return Err(MalformedHistory::NotAnObject);
        };

        let state = map
            .get("s")
            .map(coerce_state)
            .ok_or(MalformedHistory::MissingState)?;

        let unscheduled_state = map.get("u").filter(|u| !u.is_null()).map(coerce_state);
        let scheduled_count = map.get("n").filter(|n| !n.is_null()).map(coerce_count);

        Ok(Self {
            state,
            unscheduled_state,
            scheduled_count,
        })
    }
}

fn coerce_state(value: &Value) -> StateName {
    match value {
        Value::String(s) => StateName::from(s.as_str()),
        Value::Null => StateName::from(""),
        other => StateName::from(other.to_string()),
    }
}

fn coerce_count(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64))
            .unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

/// A stored history item.
///
/// Items that do not match the [`HistoryEntry`] layout exactly are kept as
/// raw JSON so they survive a round trip unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum HistoryRecord {
    Entry(HistoryEntry),
    Raw(Value),
}

impl HistoryRecord {
    fn decode(&self) -> Result<HistoryEntry, MalformedHistory> {
        match self {
            Self::Entry(entry) => Ok(entry.clone()),
            Self::Raw(value) => HistoryEntry::from_value(value),
        }
    }
}

/// Append-oriented log of distinct visited states, oldest first.
///
/// Adjacent entries never share the same state: re-entering the current state
/// does not add a record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLog {
    records: Vec<HistoryRecord>,
}

impl HistoryLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a visit to `state`.
    ///
    /// Returns `false` without changing the log when `state` is already the
    /// last entry. `scheduled_count` is only kept when it is greater than zero.
    pub fn push(
        &mut self,
        state: StateName,
        unscheduled_state: Option<StateName>,
        scheduled_count: Option<i64>,
    ) -> Result<bool, MalformedHistory> {
        if self.last()?.is_some_and(|last| last.state == state) {
            return Ok(false);
        }

        self.records.push(HistoryRecord::Entry(HistoryEntry {
            state,
            unscheduled_state,
            scheduled_count: scheduled_count.filter(|n| *n > 0),
        }));
        Ok(true)
    }

    /// The most recent entry, `None` if the log is empty.
    pub fn last(&self) -> Result<Option<HistoryEntry>, MalformedHistory> {
        self.records.last().map(HistoryRecord::decode).transpose()
    }

    /// The entry preceding the most recent one.
    pub fn before_last(&self) -> Result<Option<HistoryEntry>, MalformedHistory> {
        let index = match self.records.len().checked_sub(2) {
            Some(index) => index,
            None => return Ok(None),
        };
        self.records[index].decode().map(Some)
    }

    /// Remove the most recent entry. Returns `false` if the log was empty.
    pub fn pop(&mut self) -> bool {
        self.records.pop().is_some()
    }

    /// Number of records, including malformed ones.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Well-formed entries, oldest first. Malformed records are skipped.
    pub fn entries(&self) -> impl Iterator<Item = HistoryEntry> + '_ {
        self.records.iter().filter_map(|record| record.decode().ok())
    }
}
