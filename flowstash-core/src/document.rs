//! Path-addressed JSON document storage.

use std::fmt;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::trace;

use crate::{
    error::{DocumentError, DocumentResult},
    path::{ArrayPos, Path, Segment},
};

/// Shape of a value stored in a [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// JSON `null`
    Null,
    /// `true` or `false`
    Bool,
    /// Integer or floating point number
    Number,
    /// String
    String,
    /// Array
    Array,
    /// Object
    Object,
}

impl ValueKind {
    /// Classify a JSON value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Lowercase name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A JSON object addressed by [`Path`] expressions.
///
/// Reads of paths that do not exist yield `None` rather than an error. Writes
/// create missing intermediate containers: an array when the next segment is
/// an array position, an object otherwise. `null` along the way is treated
/// the same as a missing value.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Always a `Value::Object`.
    root: Value,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from its string form. The top level must be an object.
    pub fn from_json_str(data: &str) -> DocumentResult<Self> {
        let value: Value = serde_json::from_str(data).map_err(DocumentError::Parse)?;
        Self::from_value(value)
    }

    /// Wrap an existing JSON value. The value must be an object.
    pub fn from_value(value: Value) -> DocumentResult<Self> {
        if value.is_object() {
            Ok(Self { root: value })
        } else {
            Err(DocumentError::NotAnObject(ValueKind::of(&value).as_str()))
        }
    }

    /// Get the raw value at `path`.
    ///
    /// Returns `None` if the path is invalid or does not resolve.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let path = Path::parse(path).ok()?;
        lookup(&self.root, path.segments())
    }

    /// Get the value at `path` and deserialize it.
    pub fn get_as<T>(&self, path: &str) -> DocumentResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.get(path)
            .map(|value| T::deserialize(value))
            .transpose()
            .map_err(|source| DocumentError::Decode {
                path: path.to_owned(),
                source,
            })
    }

    /// Check whether `path` resolves to a value (including `null`).
    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Shape of the value at `path`.
    pub fn kind(&self, path: &str) -> Option<ValueKind> {
        self.get(path).map(ValueKind::of)
    }

    /// Number of elements of the array, or entries of the object, at `path`.
    ///
    /// Scalars and missing paths yield `None`.
    pub fn len(&self, path: &str) -> Option<usize> {
        match self.get(path)? {
            Value::Array(items) => Some(items.len()),
            Value::Object(map) => Some(map.len()),
            _ => None,
        }
    }

    /// Check if the document has no top-level entries.
    pub fn is_empty(&self) -> bool {
        self.as_map().is_empty()
    }

    /// Serialize `value` and store it at `path`.
    pub fn set(&mut self, path: &str, value: impl Serialize) -> DocumentResult<()> {
        let value = serde_json::to_value(value).map_err(DocumentError::Encode)?;
        self.set_value(path, value)
    }

    /// Store a raw JSON value at `path`.
    pub fn set_value(&mut self, path: &str, value: Value) -> DocumentResult<()> {
        let parsed = Path::parse(path)?;

        if parsed.is_root() {
            if !value.is_object() {
                return Err(DocumentError::NotAnObject(ValueKind::of(&value).as_str()));
            }
            self.root = value;
            return Ok(());
        }

        set_in(&mut self.root, parsed.segments(), value, &parsed)
    }

    /// Remove the value at `path` and return it.
    ///
    /// Deleting a path that does not resolve is a no-op. Removing an array
    /// element shifts the following elements down.
    pub fn delete(&mut self, path: &str) -> DocumentResult<Option<Value>> {
        let parsed = Path::parse(path)?;
        let Some((last, parents)) = parsed.segments().split_last() else {
            return Err(DocumentError::invalid_path(
                path,
                "cannot delete the document root",
            ));
        };

        let removed = match lookup_mut(&mut self.root, parents) {
            Some(Value::Object(map)) => map.remove(last.key()),
            Some(Value::Array(items)) => match last.array_pos() {
                Some(ArrayPos::At(index)) if index < items.len() => Some(items.remove(index)),
                Some(ArrayPos::Last) => items.pop(),
                _ => None,
            },
            _ => None,
        };

        if removed.is_none() {
            trace!("delete of '{}' matched nothing", path);
        }
        Ok(removed)
    }

    /// Remove a top-level entry by its literal key.
    pub fn take(&mut self, key: &str) -> Option<Value> {
        match &mut self.root {
            Value::Object(map) => map.remove(key),
            _ => None,
        }
    }

    /// Top-level entries.
    pub fn as_map(&self) -> &Map<String, Value> {
        match &self.root {
            Value::Object(map) => map,
            _ => unreachable!("document root is always an object"),
        }
    }

    /// Top-level keys.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.as_map().keys()
    }

    /// Borrow the whole document as a JSON value.
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Serialize the document to its string form.
    pub fn to_json_string(&self) -> DocumentResult<String> {
        serde_json::to_string(&self.root).map_err(DocumentError::Encode)
    }
}

fn lookup<'a>(mut current: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment.key())?,
            Value::Array(items) => match segment.array_pos()? {
                ArrayPos::At(index) => items.get(index)?,
                ArrayPos::Last => items.last()?,
            },
            _ => return None,
        };
    }
    Some(current)
}

fn lookup_mut<'a>(mut current: &'a mut Value, segments: &[Segment]) -> Option<&'a mut Value> {
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(segment.key())?,
            Value::Array(items) => match segment.array_pos()? {
                ArrayPos::At(index) => items.get_mut(index)?,
                ArrayPos::Last => items.last_mut()?,
            },
            _ => return None,
        };
    }
    Some(current)
}

/// Largest number of `null` elements a single write may pad an array with.
pub const MAX_ARRAY_GAP: usize = 1024;

// Existing values are only traversed, never changed, until the first missing
// segment. The missing part is checked as a whole and then built in one go,
// so a failed write leaves the document untouched.
fn set_in(target: &mut Value, segments: &[Segment], value: Value, path: &Path) -> DocumentResult<()> {
    let Some((segment, rest)) = segments.split_first() else {
        *target = value;
        return Ok(());
    };

    if target.is_null() {
        check_fresh(segments, path)?;
        *target = build_fresh(segments, value);
        return Ok(());
    }

    match target {
        Value::Object(map) => match map.get_mut(segment.key()) {
            Some(slot) => set_in(slot, rest, value, path),
            None => {
                check_fresh(rest, path)?;
                map.insert(segment.key().to_owned(), build_fresh(rest, value));
                Ok(())
            }
        },
        Value::Array(items) => {
            let index = match segment.array_pos() {
                Some(ArrayPos::At(index)) => index,
                Some(ArrayPos::Last) => items.len(),
                None => {
                    return Err(DocumentError::invalid_path(
                        path.as_str(),
                        format!(
                            "segment '{}' cannot index an array, use a position or -1",
                            segment.key()
                        ),
                    ));
                }
            };
            if index < items.len() {
                return set_in(&mut items[index], rest, value, path);
            }
            check_gap(index - items.len(), path)?;
            check_fresh(rest, path)?;
            items.resize(index, Value::Null);
            items.push(build_fresh(rest, value));
            Ok(())
        }
        _ => Err(DocumentError::path_conflict(path.as_str(), segment.key())),
    }
}

fn check_gap(gap: usize, path: &Path) -> DocumentResult<()> {
    if gap > MAX_ARRAY_GAP {
        return Err(DocumentError::invalid_path(
            path.as_str(),
            format!("array write would pad {gap} elements, limit is {MAX_ARRAY_GAP}"),
        ));
    }
    Ok(())
}

fn check_fresh(segments: &[Segment], path: &Path) -> DocumentResult<()> {
    for segment in segments {
        if let Some(ArrayPos::At(index)) = segment.array_pos() {
            check_gap(index, path)?;
        }
    }
    Ok(())
}

// Builds the container chain for a path that does not exist yet.
fn build_fresh(segments: &[Segment], value: Value) -> Value {
    let Some((segment, rest)) = segments.split_first() else {
        return value;
    };
    let inner = build_fresh(rest, value);
    match segment.array_pos() {
        Some(ArrayPos::At(index)) => {
            let mut items = vec![Value::Null; index];
            items.push(inner);
            Value::Array(items)
        }
        Some(ArrayPos::Last) => Value::Array(vec![inner]),
        None => {
            let mut map = Map::new();
            map.insert(segment.key().to_owned(), inner);
            Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Email {
        address: String,
        verified: bool,
    }

    #[test]
    fn test_get_nested() {
        let doc = Document::from_value(json!({
            "user": { "emails": [ { "address": "a@example.com" }, { "address": "b@example.com" } ] }
        }))
        .unwrap();

        assert_eq!(
            doc.get("user.emails.1.address"),
            Some(&json!("b@example.com"))
        );
        assert_eq!(
            doc.get("user.emails.-1.address"),
            Some(&json!("b@example.com"))
        );
        assert_eq!(doc.get("user.emails.2"), None);
        assert_eq!(doc.get("user.emails.x"), None);
        assert_eq!(doc.get("user.missing"), None);
        assert_eq!(doc.get("user.emails.0.address.deeper"), None);
        assert_eq!(doc.get("user..emails"), None);
    }

    #[test]
    fn test_set_creates_containers() {
        let mut doc = Document::new();
        doc.set("profile.name", "alice").unwrap();
        doc.set("profile.tags.-1", "admin").unwrap();
        doc.set("profile.tags.-1", "ops").unwrap();
        doc.set("matrix.2", 7).unwrap();

        assert_eq!(
            doc.as_value(),
            &json!({
                "profile": { "name": "alice", "tags": ["admin", "ops"] },
                "matrix": [null, null, 7]
            })
        );
    }

    #[test]
    fn test_numeric_segment_on_object_is_a_key() {
        let mut doc = Document::from_value(json!({ "codes": {} })).unwrap();
        doc.set("codes.404", "not found").unwrap();
        assert_eq!(doc.get("codes"), Some(&json!({ "404": "not found" })));
    }

    #[test]
    fn test_set_typed_and_read_back() {
        let mut doc = Document::new();
        let email = Email {
            address: "a@example.com".to_string(),
            verified: true,
        };
        doc.set("email", &email).unwrap();

        let back: Email = doc.get_as("email").unwrap().unwrap();
        assert_eq!(back, email);
        assert!(doc.get_as::<Email>("other").unwrap().is_none());

        let err = doc.get_as::<u32>("email.address").unwrap_err();
        assert!(matches!(err, DocumentError::Decode { .. }));
    }

    #[test]
    fn test_set_through_scalar_conflicts() {
        let mut doc = Document::new();
        doc.set("name", "alice").unwrap();

        let err = doc.set("name.first", "a").unwrap_err();
        assert!(matches!(err, DocumentError::PathConflict { ref segment, .. } if segment == "first"));
        assert_eq!(doc.get("name"), Some(&json!("alice")));
    }

    #[test]
    fn test_set_rejects_unsupported_array_positions() {
        let mut doc = Document::from_value(json!({ "list": [1, 2] })).unwrap();
        assert!(matches!(
            doc.set("list.-2", 0),
            Err(DocumentError::InvalidPath { .. })
        ));
        assert!(matches!(
            doc.set("list.name", 0),
            Err(DocumentError::InvalidPath { .. })
        ));
        assert_eq!(doc.get("list"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_set_rejects_huge_array_positions() {
        let mut doc = Document::from_value(json!({ "list": [1] })).unwrap();
        assert!(matches!(
            doc.set("list.18446744073709551615", 1),
            Err(DocumentError::InvalidPath { .. })
        ));
        assert!(matches!(
            doc.set("list.1000000000000", 1),
            Err(DocumentError::InvalidPath { .. })
        ));
        assert_eq!(doc.get("list"), Some(&json!([1])));

        // Nothing is created when a fresh path fails deeper down
        assert!(matches!(
            doc.set("fresh.child.5000", 1),
            Err(DocumentError::InvalidPath { .. })
        ));
        assert!(!doc.exists("fresh"));

        let edge = 1 + MAX_ARRAY_GAP;
        doc.set(&format!("list.{edge}"), 2).unwrap();
        assert_eq!(doc.len("list"), Some(edge + 1));
        assert_eq!(doc.get("list.-1"), Some(&json!(2)));
    }

    #[test]
    fn test_set_root() {
        let mut doc = Document::new();
        doc.set("", json!({ "a": 1 })).unwrap();
        assert_eq!(doc.get("a"), Some(&json!(1)));
        assert!(matches!(
            doc.set("", 5),
            Err(DocumentError::NotAnObject("number"))
        ));
    }

    #[test]
    fn test_delete() {
        let mut doc = Document::from_value(json!({
            "list": ["a", "b", "c"],
            "obj": { "k": 1 }
        }))
        .unwrap();

        assert_eq!(doc.delete("list.0").unwrap(), Some(json!("a")));
        assert_eq!(doc.get("list"), Some(&json!(["b", "c"])));
        assert_eq!(doc.delete("list.-1").unwrap(), Some(json!("c")));
        assert_eq!(doc.delete("obj.k").unwrap(), Some(json!(1)));
        assert_eq!(doc.get("obj"), Some(&json!({})));

        // Missing paths are a no-op
        assert_eq!(doc.delete("list.10").unwrap(), None);
        assert_eq!(doc.delete("nothing.here").unwrap(), None);
        assert!(doc.delete("").is_err());
    }

    #[test]
    fn test_delete_last_on_empty_array() {
        let mut doc = Document::from_value(json!({ "list": [] })).unwrap();
        assert_eq!(doc.delete("list.-1").unwrap(), None);
        assert_eq!(doc.get("list"), Some(&json!([])));
    }

    #[test]
    fn test_introspection() {
        let doc = Document::from_value(json!({
            "n": 1, "s": "x", "b": false, "z": null, "a": [1, 2, 3], "o": { "k": 1 }
        }))
        .unwrap();

        assert_eq!(doc.kind("n"), Some(ValueKind::Number));
        assert_eq!(doc.kind("s"), Some(ValueKind::String));
        assert_eq!(doc.kind("b"), Some(ValueKind::Bool));
        assert_eq!(doc.kind("z"), Some(ValueKind::Null));
        assert_eq!(doc.kind("a"), Some(ValueKind::Array));
        assert_eq!(doc.kind("o"), Some(ValueKind::Object));
        assert_eq!(doc.kind("missing"), None);

        assert!(doc.exists("z"));
        assert_eq!(doc.len("a"), Some(3));
        assert_eq!(doc.len("o"), Some(1));
        assert_eq!(doc.len("n"), None);
        assert_eq!(doc.len(""), Some(6));
    }

    #[test]
    fn test_string_round_trip() {
        let mut doc = Document::new();
        doc.set("a.b.-1", "x").unwrap();
        let encoded = doc.to_json_string().unwrap();
        assert_eq!(Document::from_json_str(&encoded).unwrap(), doc);
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(matches!(
            Document::from_json_str("[1, 2]"),
            Err(DocumentError::NotAnObject("array"))
        ));
        assert!(matches!(
            Document::from_json_str("{not json"),
            Err(DocumentError::Parse(_))
        ));
    }
}
