use super::{ObjectDefinition, ObjectDefinitionBuilder};
use crate::config::EngineConfig;
use crate::core::{EngineError, Result};
use crate::storage::{self, StorageEngine};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{Level, event};

/// Every object definition of an application, by name.
///
/// Immutable once built; adding definitions returns a new registry that
/// shares the existing ones (copy-on-write), so clones are cheap and never
/// need a lock.
#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    definitions: Arc<IndexMap<String, Arc<ObjectDefinition>>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds definitions against the process-wide configuration.
    pub fn build(builders: Vec<ObjectDefinitionBuilder>) -> Result<Self> {
        Self::build_with_config(builders, Arc::clone(EngineConfig::global()))
    }

    pub fn build_with_config(builders: Vec<ObjectDefinitionBuilder>, config: Arc<EngineConfig>) -> Result<Self> {
        Self::new().with_definitions(builders, config)
    }

    /// Adds definitions - returns a NEW registry, this one is unchanged.
    ///
    /// New definitions may borrow columns from each other and from the
    /// definitions already registered.
    pub fn with_definitions(&self, builders: Vec<ObjectDefinitionBuilder>, config: Arc<EngineConfig>) -> Result<Self> {
        config.validate().map_err(EngineError::Composition)?;

        let mut frozen: IndexMap<String, ObjectDefinition> = IndexMap::new();
        for builder in builders {
            let name = builder.name().to_string();
            if frozen.contains_key(&name) || self.definitions.contains_key(&name) {
                return Err(EngineError::Composition(format!(
                    "Object '{}' defined twice",
                    name
                )));
            }
            frozen.insert(name, builder.freeze(Arc::clone(&config))?);
        }

        // Pass 3: external fields, against the whole frozen graph
        let mut resolved = Vec::new();
        for (name, definition) in &frozen {
            for (p, property) in definition.properties().iter().enumerate() {
                for (b, bucket) in property.buckets().iter().enumerate() {
                    let condition = bucket.condition();
                    let remote = frozen
                        .get(condition.remote_object())
                        .or_else(|| self.definitions.get(condition.remote_object()).map(|d| d.as_ref()))
                        .ok_or_else(|| EngineError::ObjectNotFound(condition.remote_object().to_string()))?;
                    if remote.schema().find_column_index(condition.remote_column()).is_none() {
                        return Err(EngineError::FieldNotFound(
                            condition.remote_column().to_string(),
                            remote.name().to_string(),
                        ));
                    }
                    for (f, external) in bucket.fields().iter().enumerate() {
                        let mut external = external.clone();
                        external.resolve(remote)?;
                        resolved.push((name.clone(), p, b, f, external));
                    }
                }
            }
        }
        for (name, p, b, f, external) in resolved {
            if let Some(definition) = frozen.get_mut(&name) {
                definition.properties[p].buckets_mut()[b].fields_mut()[f] = external;
            }
        }

        let mut definitions = (*self.definitions).clone();
        for (name, mut definition) in frozen {
            definition.wire_triggers()?;
            event!(
                Level::DEBUG,
                object = %name,
                columns = definition.schema().column_count(),
                triggers = definition.triggers().len(),
                "object definition registered"
            );
            definitions.insert(name, Arc::new(definition));
        }

        Ok(Self {
            definitions: Arc::new(definitions),
        })
    }

    pub fn get(&self, name: &str) -> Result<&Arc<ObjectDefinition>> {
        self.definitions
            .get(name)
            .ok_or_else(|| EngineError::ObjectNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.definitions.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ObjectDefinition>> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Creates every missing table, column and index in `storage`.
    ///
    /// Returns the number of schema objects created.
    pub fn provision(&self, storage: &mut dyn StorageEngine) -> Result<usize> {
        let mut created = 0;
        for definition in self.definitions.values() {
            created += storage::provision(storage, definition.schema())?;
        }
        Ok(created)
    }
}
