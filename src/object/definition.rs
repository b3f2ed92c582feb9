use super::{DisplayProfile, MultiFieldConstraint, ObjectId, ObjectInstance, Payload};
use crate::config::EngineConfig;
use crate::core::{EngineError, ID_COLUMN, Result, Row, TableSchema, Value};
use crate::element::ElementDefinition;
use crate::field::{FieldDefinition, FieldInstance};
use crate::property::PropertyDefinition;
use crate::query::{Query, QueryRow, ROOT_ALIAS};
use crate::storage::{QueryEngine, StorageEngine};
use crate::trigger::TriggerDefinition;
use indexmap::IndexMap;
use std::sync::Arc;

/// Where a named field lives inside a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Field(usize),
    Property { property: usize, field: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub slot: Slot,
    /// First column of the slot in the table row
    pub column: usize,
    pub column_count: usize,
    /// Indexes into [`ObjectDefinition::triggers`] fired on change
    pub triggers: Vec<usize>,
}

/// Immutable schema of one object type, shared by all its instances.
#[derive(Debug)]
pub struct ObjectDefinition {
    pub(crate) name: String,
    pub(crate) module: String,
    pub(crate) display_name: String,
    pub(crate) fields: Vec<FieldDefinition>,
    pub(crate) properties: Vec<PropertyDefinition>,
    pub(crate) schema: TableSchema,
    pub(crate) slots: IndexMap<String, SlotInfo>,
    pub(crate) externals: IndexMap<String, (usize, usize)>,
    pub(crate) triggers: Vec<TriggerDefinition>,
    pub(crate) profiles: Vec<DisplayProfile>,
    pub(crate) constraints: Vec<MultiFieldConstraint>,
    pub(crate) loader_aliases: IndexMap<String, String>,
    pub(crate) config: Arc<EngineConfig>,
}

impl ObjectDefinition {
    /// Also the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn properties(&self) -> &[PropertyDefinition] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn slots(&self) -> &IndexMap<String, SlotInfo> {
        &self.slots
    }

    pub fn triggers(&self) -> &[TriggerDefinition] {
        &self.triggers
    }

    pub fn constraints(&self) -> &[MultiFieldConstraint] {
        &self.constraints
    }

    pub fn loader_aliases(&self) -> &IndexMap<String, String> {
        &self.loader_aliases
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn profile(&self, name: &str) -> Option<&DisplayProfile> {
        self.profiles.iter().find(|p| p.name() == name)
    }

    pub fn slot(&self, name: &str) -> Result<&SlotInfo> {
        self.slots
            .get(name)
            .ok_or_else(|| EngineError::FieldNotFound(name.to_string(), self.name.clone()))
    }

    pub fn field_definition(&self, slot: Slot) -> &FieldDefinition {
        match slot {
            Slot::Field(index) => &self.fields[index],
            Slot::Property { property, field } => &self.properties[property].fields()[field],
        }
    }

    /// Field or property field by name.
    pub fn find_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.slots.get(name).map(|info| self.field_definition(info.slot))
    }

    /// `(property, position)` of an external field.
    pub fn external(&self, name: &str) -> Result<(usize, usize)> {
        self.externals
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::FieldNotFound(name.to_string(), self.name.clone()))
    }

    pub fn trigger_index(&self, name: &str) -> Option<usize> {
        self.triggers.iter().position(|t| t.name() == name)
    }

    fn blank_payload(&self) -> Payload {
        Payload {
            fields: self.fields.iter().map(|f| f.initiate_field_instance()).collect(),
            properties: self
                .properties
                .iter()
                .map(|p| p.initiate_property_instance())
                .collect(),
        }
    }

    /// Value a slot holds on a fresh instance.
    pub fn initial_slot_value(&self, slot: Slot) -> FieldInstance {
        match slot {
            Slot::Field(index) => self.fields[index].initiate_field_instance(),
            Slot::Property { property, field } => self.properties[property].initiate_field_slot(field),
        }
    }

    /// Fresh, unpersisted instance with every slot at its initial value.
    pub fn new_instance(self: &Arc<Self>) -> ObjectInstance {
        ObjectInstance::from_parts(Arc::clone(self), ObjectId::new(), false, self.blank_payload())
    }

    /// Rebuilds a persisted instance from a table row.
    pub fn hydrate(self: &Arc<Self>, row: &Row) -> Result<ObjectInstance> {
        if row.len() != self.schema.column_count() {
            return Err(EngineError::TypeMismatch(format!(
                "Row of '{}' has {} columns, expected {}",
                self.name,
                row.len(),
                self.schema.column_count()
            )));
        }
        let id = match row.first() {
            Some(Value::Text(id)) => ObjectId::parse(id)?,
            _ => {
                return Err(EngineError::TypeMismatch(format!(
                    "Row of '{}' has no id",
                    self.name
                )));
            }
        };

        let mut payload = self.blank_payload();
        for info in self.slots.values() {
            let values = &row[info.column..info.column + info.column_count];
            *payload.slot_mut(info.slot) =
                self.field_definition(info.slot)
                    .read_columns(values, &self.name, &self.config)?;
        }
        Ok(ObjectInstance::from_parts(Arc::clone(self), id, true, payload))
    }

    pub fn fetch(self: &Arc<Self>, storage: &dyn StorageEngine, id: &ObjectId) -> Result<Option<ObjectInstance>> {
        storage
            .fetch_row(&self.name, &id.to_string())?
            .map(|row| self.hydrate(&row))
            .transpose()
    }

    /// Query selecting every own column plus the external fields of all
    /// properties, with one alias list per property.
    pub fn build_query(&self) -> (Query, Vec<Vec<String>>) {
        let mut query = Query::new(self.name.clone());
        for column in self.schema.columns() {
            query.select(ROOT_ALIAS, &column.name);
        }
        let aliases = self
            .properties
            .iter()
            .map(|p| p.extend_query(&mut query))
            .collect();
        (query, aliases)
    }

    /// Loads an instance together with the values of its external fields.
    pub fn fetch_with_externals(
        self: &Arc<Self>,
        engine: &dyn QueryEngine,
        id: &ObjectId,
    ) -> Result<Option<ObjectInstance>> {
        let (query, aliases) = self.build_query();
        let query = query.filter_eq(ID_COLUMN, Value::Text(id.to_string()));
        let Some(row) = engine.run_query(&query)?.into_iter().next() else {
            return Ok(None);
        };
        self.hydrate_query_row(&row, &aliases).map(Some)
    }

    pub fn hydrate_query_row(self: &Arc<Self>, row: &QueryRow, aliases: &[Vec<String>]) -> Result<ObjectInstance> {
        let own: Row = self
            .schema
            .columns()
            .iter()
            .map(|c| row.get(ROOT_ALIAS, &c.name).clone())
            .collect();
        let mut instance = self.hydrate(&own)?;
        let payload = instance.payload_mut();
        for ((property, slot), aliases) in self
            .properties
            .iter()
            .zip(payload.properties.iter_mut())
            .zip(aliases)
        {
            property.read_external(slot, row, aliases);
        }
        Ok(instance)
    }
}
