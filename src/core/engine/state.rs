//! Run-scoped shared state.
//!
//! Each step alias owns at most one output document. Entries are written once
//! by the driver and then only read. Readers get typed accessors that keep
//! "nothing there" (`Ok(None)`) apart from "there, but the wrong shape"
//! (`state.type_mismatch`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedState {
    entries: IndexMap<String, Value>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output recorded for `alias`, if that step ran and produced one.
    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.entries.get(alias)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    /// Record `output` under `alias`. Fails if the alias already has an entry.
    pub fn merge(&mut self, alias: &str, output: Value) -> Result<()> {
        if self.entries.contains_key(alias) {
            return Err(Error::state_alias_exists(alias));
        }
        self.entries.insert(alias.to_string(), output);
        Ok(())
    }

    /// Output for `alias` as a key-value tree.
    ///
    /// `Ok(None)` when the alias has no entry; `state.type_mismatch` when the
    /// entry exists but is not an object.
    pub fn output_map(&self, alias: &str) -> Result<Option<&Map<String, Value>>> {
        match self.entries.get(alias) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(Error::state_type_mismatch(
                alias,
                None,
                "an object",
                describe(other),
            )),
        }
    }

    /// Raw field `key` of the output for `alias`, tolerating absence at either level.
    pub fn field(&self, alias: &str, key: &str) -> Result<Option<&Value>> {
        Ok(self.output_map(alias)?.and_then(|map| map.get(key)))
    }

    /// String field `key` of the output for `alias`.
    ///
    /// Absent alias or absent field is `Ok(None)`; a present field of any
    /// other type is `state.type_mismatch`.
    pub fn string_field(&self, alias: &str, key: &str) -> Result<Option<&str>> {
        match self.field(alias, key)? {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(Error::state_type_mismatch(
                alias,
                Some(key.to_string()),
                "a string",
                describe(other),
            )),
        }
    }

    /// Aliases in the order their outputs were merged.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
