//! Step registry.
//!
//! Built once at startup, then frozen. [`StepRegistry::install`] publishes a
//! registry process-wide; after that it is only ever read, so lookups take no
//! locks.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use jsonschema::Validator;
use serde_json::Value;

use crate::error::{Error, Result};

use super::runner::StepRunner;
use super::validation;

static INSTALLED: OnceLock<StepRegistry> = OnceLock::new();

pub struct RegistryEntry {
    runner: Arc<dyn StepRunner>,
    schema: Value,
    validator: Validator,
}

impl RegistryEntry {
    pub fn runner(&self) -> &dyn StepRunner {
        self.runner.as_ref()
    }

    /// The schema document the entry was registered with.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.runner.name())
            .field("schema", &self.schema)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct StepRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `runner` under its own name with its config schema.
    ///
    /// Fails if the name is taken or the schema does not compile.
    pub fn register(&mut self, runner: Arc<dyn StepRunner>, schema: Value) -> Result<()> {
        let name = runner.name().to_string();
        if self.entries.contains_key(&name) {
            return Err(Error::step_already_registered(name));
        }
        let validator = validation::compile_schema(&name, &schema)?;
        self.entries.insert(
            name,
            RegistryEntry {
                runner,
                schema,
                validator,
            },
        );
        Ok(())
    }

    pub fn lookup(&self, step_type: &str) -> Result<&RegistryEntry> {
        self.entries
            .get(step_type)
            .ok_or_else(|| Error::step_not_found(step_type, self.step_types()))
    }

    /// Registered type names, sorted.
    pub fn step_types(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze this registry as the process-wide one. Only the first call wins.
    pub fn install(self) -> Result<&'static StepRegistry> {
        let mut pending = Some(self);
        let installed = INSTALLED.get_or_init(|| pending.take().unwrap_or_default());
        if pending.is_some() {
            return Err(Error::internal_unexpected(
                "step registry is already installed",
            ));
        }
        Ok(installed)
    }
}
