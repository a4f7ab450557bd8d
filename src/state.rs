//! Shared run state and the whole-field merge contract.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// A single state field value.
///
/// Fields carry one of a closed set of semantic types. Collections nest
/// [`Value`]s, so an ordered sequence of texts is `List(vec![Text, ..])`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Free-form text.
    Text(String),
    /// A numeric value (e.g. a confidence score in `[0.0, 1.0]`).
    Number(f64),
    /// A boolean flag.
    Bool(bool),
    /// An ordered sequence of values.
    List(Vec<Value>),
}

impl Value {
    /// Returns the text content, or `None` for any other variant.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the numeric content, or `None` for any other variant.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    /// Returns the boolean content, or `None` for any other variant.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Returns the sequence content, or `None` for any other variant.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items.into_iter().map(Value::Text).collect())
    }
}

impl From<Vec<&str>> for Value {
    fn from(items: Vec<&str>) -> Self {
        Value::List(items.into_iter().map(Value::from).collect())
    }
}

/// Error returned when one update declares the same field twice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Field '{0}' declared twice in one update")]
pub struct DuplicateField(pub String);

/// The fields a node wants to change, in declaration order.
///
/// An update is partial: fields it does not mention keep their prior value
/// when merged. Declaring the same field twice in one update is rejected at
/// merge time.
///
/// # Examples
///
/// ```
/// use meguru::Update;
///
/// let update = Update::new()
///     .set("error_type", "network")
///     .set("confidence", 0.8);
/// assert_eq!(update.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    entries: Vec<(String, Value)>,
}

impl Update {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field to the update.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((field.into(), value.into()));
        self
    }

    /// Returns the number of declared fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the update declares no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over the declared field names.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(field, _)| field.as_str())
    }
}

/// The key/value record shared by all nodes of a run.
///
/// A state is created once per run from caller-supplied initial values and
/// then mutated exactly once per node execution via [`State::apply`]. Unset
/// fields are absent and read as `None` through the typed accessors.
///
/// # Examples
///
/// ```
/// use meguru::State;
///
/// let state = State::new()
///     .with("error_log", "connection refused on :5432")
///     .with("confidence", 0.0);
///
/// assert_eq!(state.text("error_log"), Some("connection refused on :5432"));
/// assert_eq!(state.number("confidence"), Some(0.0));
/// assert_eq!(state.flag("approved"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    fields: HashMap<String, Value>,
}

impl State {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an initial field value, builder style.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Returns the value of a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns a text field as a string slice.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_text)
    }

    /// Returns a numeric field.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_number)
    }

    /// Returns a boolean field.
    pub fn flag(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    /// Returns a sequence field as a slice.
    pub fn list(&self, field: &str) -> Option<&[Value]> {
        self.get(field).and_then(Value::as_list)
    }

    /// Returns `true` if the field is set.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns an iterator over all set field names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Returns the number of set fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no fields are set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merges an update into the state, whole field by whole field.
    ///
    /// Fields not named by the update keep their prior value. If the update
    /// declares the same field twice, nothing is applied and the duplicated
    /// field is reported.
    pub fn apply(&mut self, update: Update) -> Result<(), DuplicateField> {
        let mut seen = HashSet::new();
        for (field, _) in &update.entries {
            if !seen.insert(field.as_str()) {
                return Err(DuplicateField(field.clone()));
            }
        }
        for (field, value) in update.entries {
            self.fields.insert(field, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let state = State::new()
            .with("summary", "broken pipe")
            .with("confidence", 0.7)
            .with("approved", true)
            .with("queries", vec!["a", "b"]);

        assert_eq!(state.text("summary"), Some("broken pipe"));
        assert_eq!(state.number("confidence"), Some(0.7));
        assert_eq!(state.flag("approved"), Some(true));
        assert_eq!(state.list("queries").map(<[Value]>::len), Some(2));

        // 型が一致しない場合は None
        assert_eq!(state.number("summary"), None);
        assert_eq!(state.text("missing"), None);
    }

    #[test]
    fn test_apply_preserves_untouched_fields() {
        let mut state = State::new().with("input", "raw").with("count", 1.0);

        let result = state.apply(Update::new().set("count", 2.0));
        assert!(result.is_ok());

        assert_eq!(state.number("count"), Some(2.0));
        assert_eq!(state.text("input"), Some("raw"));
    }

    #[test]
    fn test_apply_rejects_duplicate_field_atomically() {
        let mut state = State::new().with("count", 1.0);

        let update = Update::new().set("count", 2.0).set("count", 3.0);
        let result = state.apply(update);

        assert_eq!(result, Err(DuplicateField("count".to_string())));
        // Nothing from the rejected update lands in the state.
        assert_eq!(state.number("count"), Some(1.0));
    }

    #[test]
    fn test_update_fields_iterates_in_declaration_order() {
        let update = Update::new().set("b", 1.0).set("a", 2.0);
        let fields: Vec<&str> = update.fields().collect();
        assert_eq!(fields, vec!["b", "a"]);
        assert!(!update.is_empty());
    }

    #[test]
    fn test_state_serde_round_trip() {
        let state = State::new()
            .with("summary", "broken pipe")
            .with("confidence", 0.25)
            .with("approved", false)
            .with("findings", vec!["one", "two"]);

        let raw = serde_json::to_string(&state).unwrap();
        let restored: State = serde_json::from_str(&raw).unwrap();
        assert_eq!(restored, state);
    }
}
