use super::{DisplayProfile, MultiFieldConstraint, ObjectDefinition, Slot, SlotInfo};
use crate::config::EngineConfig;
use crate::core::{Column, ColumnKind, EngineError, ID_COLUMN, IndexSchema, Result, TableSchema};
use crate::element::{ElementDefinition, is_valid_element_name};
use crate::field::{FieldDefinition, FieldKind};
use crate::property::PropertyDefinition;
use crate::trigger::TriggerDefinition;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Width of the textual object id column.
pub const ID_COLUMN_LEN: usize = 36;

/// Collects the declarations of one object type.
///
/// Nothing is validated until the registry freezes the builder; external
/// fields and trigger names are resolved only once every builder of the
/// registry is frozen.
#[derive(Debug)]
pub struct ObjectDefinitionBuilder {
    name: String,
    module: String,
    display_name: String,
    fields: Vec<FieldDefinition>,
    properties: Vec<PropertyDefinition>,
    triggers: Vec<TriggerDefinition>,
    profiles: Vec<DisplayProfile>,
    constraints: Vec<MultiFieldConstraint>,
    loader_aliases: IndexMap<String, String>,
}

impl ObjectDefinitionBuilder {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            module: module.into(),
            fields: Vec::new(),
            properties: Vec::new(),
            triggers: Vec::new(),
            profiles: Vec::new(),
            constraints: Vec::new(),
            loader_aliases: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }

    pub fn trigger(mut self, trigger: TriggerDefinition) -> Self {
        self.triggers.push(trigger);
        self
    }

    pub fn display_profile(mut self, profile: DisplayProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    pub fn constraint(mut self, constraint: MultiFieldConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Short loader column name for `path` (`field` or `property.field`).
    pub fn loader_alias(mut self, alias: impl Into<String>, path: impl Into<String>) -> Self {
        self.loader_aliases.insert(alias.into(), path.into());
        self
    }

    fn composition(&self, message: String) -> EngineError {
        EngineError::Composition(format!("Object '{}': {}", self.name, message))
    }

    /// Passes 1 and 2: own fields, then properties, into one table schema.
    pub(crate) fn freeze(self, config: Arc<EngineConfig>) -> Result<ObjectDefinition> {
        if !is_valid_element_name(&self.name) {
            return Err(self.composition("name must be lower snake case".to_string()));
        }

        let mut schema = TableSchema::new(self.name.clone());
        schema.add_column(Column::new(ID_COLUMN, ColumnKind::Text { max_len: ID_COLUMN_LEN }).not_null())?;
        schema.add_index(IndexSchema::new(format!("{}_id_idx", self.name), vec![ID_COLUMN.to_string()]).unique())?;

        let mut slots: IndexMap<String, SlotInfo> = IndexMap::new();
        let mut add_slot = |schema: &mut TableSchema, field: &FieldDefinition, slot: Slot| -> Result<()> {
            field.check(&config)?;
            if field.name() == ID_COLUMN || slots.contains_key(field.name()) {
                return Err(EngineError::Composition(format!(
                    "Object '{}': column '{}' declared twice",
                    self.name,
                    field.name()
                )));
            }
            let column = schema.column_count();
            for c in field.columns() {
                schema.add_column(c)?;
            }
            for index in field.indexes(&self.name) {
                schema.add_index(index)?;
            }
            slots.insert(
                field.name().to_string(),
                SlotInfo {
                    slot,
                    column,
                    column_count: field.column_count(),
                    triggers: Vec::new(),
                },
            );
            Ok(())
        };

        // Pass 1
        for (index, field) in self.fields.iter().enumerate() {
            add_slot(&mut schema, field, Slot::Field(index))?;
        }

        // Pass 2
        let mut property_names = HashSet::new();
        for (p, property) in self.properties.iter().enumerate() {
            property.check(&config)?;
            if !property_names.insert(property.name()) {
                return Err(self.composition(format!("property '{}' added twice", property.name())));
            }
            for (f, field) in property.fields().iter().enumerate() {
                add_slot(&mut schema, field, Slot::Property { property: p, field: f })?;
            }
        }
        drop(add_slot);

        let mut externals = IndexMap::new();
        for (p, property) in self.properties.iter().enumerate() {
            for bucket in property.buckets() {
                let local = bucket.condition().local_column();
                if schema.find_column_index(local).is_none() {
                    return Err(self.composition(format!(
                        "join of property '{}' uses unknown column '{}'",
                        property.name(),
                        local
                    )));
                }
            }
            for (position, external) in property.external_fields().enumerate() {
                if slots.contains_key(external.name()) || externals.contains_key(external.name()) {
                    return Err(self.composition(format!(
                        "external field '{}' clashes with another element",
                        external.name()
                    )));
                }
                externals.insert(external.name().to_string(), (p, position));
            }
        }

        let mut trigger_names = HashSet::new();
        for trigger in &self.triggers {
            if !trigger_names.insert(trigger.name()) {
                return Err(self.composition(format!("trigger '{}' added twice", trigger.name())));
            }
        }

        let mut profile_names = HashSet::new();
        for profile in &self.profiles {
            if !profile_names.insert(profile.name()) {
                return Err(self.composition(format!("display profile '{}' added twice", profile.name())));
            }
        }

        let definition = ObjectDefinition {
            name: self.name.clone(),
            module: self.module.clone(),
            display_name: self.display_name.clone(),
            fields: self.fields.clone(),
            properties: self.properties.clone(),
            schema,
            slots,
            externals,
            triggers: self.triggers.clone(),
            profiles: self.profiles.clone(),
            constraints: self.constraints.clone(),
            loader_aliases: IndexMap::new(),
            config,
        };

        for constraint in &self.constraints {
            check_constraint(&definition, constraint)?;
        }

        let mut loader_aliases = IndexMap::new();
        for (alias, path) in &self.loader_aliases {
            let column = definition.resolve_path(path)?;
            loader_aliases.insert(alias.clone(), column.to_string());
        }

        Ok(ObjectDefinition {
            loader_aliases,
            ..definition
        })
    }
}

fn check_constraint(definition: &ObjectDefinition, constraint: &MultiFieldConstraint) -> Result<()> {
    let fail = |message: String| {
        Err(EngineError::Composition(format!(
            "Constraint '{}' on '{}': {}",
            constraint.name(),
            definition.name(),
            message
        )))
    };

    let mut choices = Vec::new();
    for name in constraint.fields() {
        match definition.find_field(name).map(|f| f.kind()) {
            Some(FieldKind::Choice(choice)) => choices.push(Some(choice)),
            Some(FieldKind::MultiChoice(_)) => choices.push(None),
            Some(_) => return fail(format!("member '{}' is not a choice field", name)),
            None => return fail(format!("unknown member '{}'", name)),
        }
    }
    for row in constraint.rows() {
        if row.len() != choices.len() {
            return fail(format!("row has {} cells, expected {}", row.len(), choices.len()));
        }
        for (cell, choice) in row.iter().zip(&choices) {
            if let (Some(code), Some(choice)) = (cell, choice)
                && !choice.contains(code)
            {
                return fail(format!("unknown code '{}'", code));
            }
        }
    }
    Ok(())
}

impl ObjectDefinition {
    /// Resolves `field`, `property.field` or a loader alias to a slot name.
    pub fn resolve_path<'a>(&'a self, path: &'a str) -> Result<&'a str> {
        if let Some(column) = self.loader_aliases.get(path) {
            return Ok(column);
        }
        let name = match path.split_once('.') {
            Some((property, field)) => {
                let owner = self
                    .property(property)
                    .ok_or_else(|| EngineError::FieldNotFound(path.to_string(), self.name.clone()))?;
                owner
                    .find_field(field)
                    .ok_or_else(|| EngineError::FieldNotFound(path.to_string(), self.name.clone()))?;
                field
            }
            None => path,
        };
        self.slot(name)?;
        Ok(name)
    }

    /// Pass 3: maps trigger names of every slot to trigger indexes.
    pub(crate) fn wire_triggers(&mut self) -> Result<()> {
        let fields = &self.fields;
        let properties = &self.properties;
        let triggers = &self.triggers;
        for (name, info) in self.slots.iter_mut() {
            let names: Vec<&String> = match info.slot {
                Slot::Field(index) => fields[index].triggers().iter().collect(),
                Slot::Property { property, field } => properties[property].fields()[field]
                    .triggers()
                    .iter()
                    .chain(properties[property].triggers())
                    .collect(),
            };
            info.triggers.clear();
            for trigger in names {
                let index = triggers.iter().position(|t| t.name() == trigger.as_str()).ok_or_else(|| {
                    EngineError::Composition(format!(
                        "Object '{}': field '{}' fires unknown trigger '{}'",
                        self.name, name, trigger
                    ))
                })?;
                if !info.triggers.contains(&index) {
                    info.triggers.push(index);
                }
            }
        }
        Ok(())
    }
}
