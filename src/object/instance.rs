use super::{ObjectDefinition, Slot};
use crate::config::EngineConfig;
use crate::core::{EngineError, Result, Row, Value, ValidationFailure};
use crate::field::{FieldDefinition, FieldInstance};
use crate::property::PropertyInstance;
use crate::trigger::UnitOfWork;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of an object instance, assigned when it is created in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(text: &str) -> Result<Self> {
        Uuid::parse_str(text)
            .map(Self)
            .map_err(|e| EngineError::TypeMismatch(format!("Invalid object id '{}': {}", text, e)))
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Live values of one object, index-addressed through the definition's
/// slot map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub(crate) fields: Vec<FieldInstance>,
    pub(crate) properties: Vec<PropertyInstance>,
}

impl Payload {
    pub fn slot(&self, slot: Slot) -> &FieldInstance {
        match slot {
            Slot::Field(index) => &self.fields[index],
            Slot::Property { property, field } => &self.properties[property].fields[field],
        }
    }

    pub(crate) fn slot_mut(&mut self, slot: Slot) -> &mut FieldInstance {
        match slot {
            Slot::Field(index) => &mut self.fields[index],
            Slot::Property { property, field } => &mut self.properties[property].fields[field],
        }
    }

    pub fn properties(&self) -> &[PropertyInstance] {
        &self.properties
    }
}

/// One object: shared definition, identity and private payload.
#[derive(Debug, Clone)]
pub struct ObjectInstance {
    definition: Arc<ObjectDefinition>,
    id: ObjectId,
    persisted: bool,
    payload: Payload,
}

impl ObjectInstance {
    pub(crate) fn from_parts(
        definition: Arc<ObjectDefinition>,
        id: ObjectId,
        persisted: bool,
        payload: Payload,
    ) -> Self {
        Self {
            definition,
            id,
            persisted,
            payload,
        }
    }

    pub fn definition(&self) -> &Arc<ObjectDefinition> {
        &self.definition
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub(crate) fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    pub fn field_instance(&self, name: &str) -> Result<&FieldInstance> {
        let info = self.definition.slot(name)?;
        Ok(self.payload.slot(info.slot))
    }

    /// Readable value of a field, property field or external field.
    pub fn get(&self, name: &str) -> Result<Value> {
        if let Some(info) = self.definition.slots().get(name) {
            let field = self.definition.field_definition(info.slot);
            return field.value(self.payload.slot(info.slot), self.definition.config());
        }
        let (property, position) = self.definition.external(name)?;
        Ok(self.payload.properties[property].external[position].clone())
    }

    /// Writes a caller value; read-only fields refuse it.
    pub fn set_value(&mut self, uow: &mut UnitOfWork<'_>, name: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        self.write(uow, name, true, |field, slot, config| field.set_value(slot, value, config))
    }

    /// Writes a value computed by a trigger or loader, read-only or not.
    pub fn set_computed_value(
        &mut self,
        uow: &mut UnitOfWork<'_>,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<bool> {
        let value = value.into();
        self.write(uow, name, false, |field, slot, config| field.set_value(slot, value, config))
    }

    /// Selects exactly `codes` on a multi-value choice field.
    pub fn set_choices<'c>(
        &mut self,
        uow: &mut UnitOfWork<'_>,
        name: &str,
        codes: impl IntoIterator<Item = &'c str>,
    ) -> Result<bool> {
        self.write(uow, name, true, |field, slot, config| field.set_choices(slot, codes, config))
    }

    /// Applies `apply` to one slot and registers the slot's triggers when
    /// it reports a change.
    pub(crate) fn write<F>(&mut self, uow: &mut UnitOfWork<'_>, name: &str, caller: bool, apply: F) -> Result<bool>
    where
        F: FnOnce(&FieldDefinition, &mut FieldInstance, &EngineConfig) -> Result<bool>,
    {
        let definition = Arc::clone(&self.definition);
        let info = definition.slot(name)?;
        let field = definition.field_definition(info.slot);
        if caller && field.is_read_only() {
            return Err(EngineError::validation(name, ValidationFailure::ReadOnly));
        }

        let changed = apply(field, self.payload.slot_mut(info.slot), definition.config())?;
        if changed {
            for &trigger in &info.triggers {
                uow.register(self, trigger);
            }
        }
        Ok(changed)
    }

    pub fn verify_secret(&self, name: &str, candidate: &str) -> Result<bool> {
        let info = self.definition.slot(name)?;
        self.definition.field_definition(info.slot).verify_secret(
            self.payload.slot(info.slot),
            candidate,
            self.definition.config(),
        )
    }

    /// True when any lifecycle property sits on a final state.
    pub fn is_final(&self) -> bool {
        self.definition
            .properties()
            .iter()
            .zip(&self.payload.properties)
            .any(|(property, instance)| property.is_final(instance))
    }

    pub(crate) fn apply_insert_hooks(&mut self) {
        for (property, instance) in self
            .definition
            .properties()
            .iter()
            .zip(self.payload.properties.iter_mut())
        {
            property.on_insert(instance);
        }
    }

    pub fn check_mandatory(&self) -> Result<()> {
        for (name, info) in self.definition.slots() {
            let field = self.definition.field_definition(info.slot);
            if field.is_mandatory() && self.payload.slot(info.slot).is_blank() {
                return Err(EngineError::validation(name, ValidationFailure::Mandatory));
            }
        }
        Ok(())
    }

    pub fn check_constraints(&self) -> Result<()> {
        let separator = self.definition.config().multi_value_separator;
        for constraint in self.definition.constraints() {
            let mut owned = Vec::with_capacity(constraint.fields().len());
            for name in constraint.fields() {
                let value = match self.field_instance(name)? {
                    FieldInstance::Choice(code) => code.clone(),
                    FieldInstance::MultiChoice(codes) if codes.is_empty() => None,
                    FieldInstance::MultiChoice(codes) => Some(
                        crate::field::multi_choice::storage_string(codes, separator),
                    ),
                    _ => None,
                };
                owned.push(value);
            }
            let values: Vec<Option<&str>> = owned.iter().map(Option::as_deref).collect();
            constraint.check_combination(&values)?;
        }
        Ok(())
    }

    /// Flattens the payload into a row of the definition's table.
    pub fn to_row(&self) -> Row {
        let config = self.definition.config();
        let mut row = Row::with_capacity(self.definition.schema().column_count());
        row.push(Value::Text(self.id.to_string()));
        for info in self.definition.slots().values() {
            self.definition
                .field_definition(info.slot)
                .write_columns(self.payload.slot(info.slot), &mut row, config);
        }
        row
    }
}

impl PartialEq for ObjectInstance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.definition, &other.definition)
            && self.id == other.id
            && self.persisted == other.persisted
            && self.payload == other.payload
    }
}
