use super::external::{ExternalFieldByJoinQuery, ExternalFieldDefinition, JoinQueryConditionDefinition};
use super::PropertyInstance;
use crate::choice::TransitionChoiceDefinition;
use crate::config::EngineConfig;
use crate::core::{Column, EngineError, IndexSchema, Result, Value};
use crate::element::{ElementDefinition, is_valid_element_name};
use crate::field::{FieldDefinition, FieldInstance};
use crate::object::DisplayProfile;
use crate::query::{Query, QueryRow};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

/// Built-in capability a property provides.
#[derive(Debug, Clone)]
pub enum PropertyKind {
    /// Object name shown in titles
    Named,
    /// Unique business number
    Numbered,
    /// Creation timestamp stamped at insert, plus creator
    CreationLog,
    /// Workflow state driven by a transition choice
    Lifecycle(Arc<TransitionChoiceDefinition>),
    /// Reference to a parent object, with columns borrowed from it
    LinkedToParent { parent: String },
    /// Caller-composed bundle
    Generic,
}

/// Column holding the parent id of a [`PropertyKind::LinkedToParent`].
pub const PARENT_COLUMN: &str = "parent_id";

/// A composable capability contributing columns to an object table.
#[derive(Debug, Clone)]
pub struct PropertyDefinition {
    name: String,
    display_name: String,
    kind: PropertyKind,
    fields: Vec<FieldDefinition>,
    buckets: Vec<ExternalFieldByJoinQuery>,
    legacy: bool,
    triggers: Vec<String>,
}

impl PropertyDefinition {
    pub fn generic(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::with_kind(name, display_name, PropertyKind::Generic)
    }

    fn with_kind(name: impl Into<String>, display_name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            kind,
            fields: Vec::new(),
            buckets: Vec::new(),
            legacy: false,
            triggers: Vec::new(),
        }
    }

    pub fn named() -> Self {
        Self::with_kind("named", "Name", PropertyKind::Named).field(
            FieldDefinition::text("name", "Name", 120)
                .mandatory()
                .searchable()
                .indexed()
                .in_title()
                .priority(900),
        )
    }

    pub fn numbered() -> Self {
        Self::with_kind("numbered", "Number", PropertyKind::Numbered).field(
            FieldDefinition::integer("number", "Number")
                .unique()
                .in_title()
                .priority(950),
        )
    }

    pub fn creation_log() -> Self {
        Self::with_kind("creation_log", "Creation", PropertyKind::CreationLog)
            .field(
                FieldDefinition::timestamp("created_on", "Created on")
                    .read_only()
                    .in_bottom_notes()
                    .priority(-900),
            )
            .field(
                FieldDefinition::text("created_by", "Created by", 64)
                    .read_only()
                    .in_bottom_notes()
                    .priority(-910),
            )
    }

    pub fn lifecycle(workflow: Arc<TransitionChoiceDefinition>) -> Self {
        let state = FieldDefinition::choice("state", "State", workflow.choice().clone())
            .mandatory()
            .indexed()
            .in_bottom_notes()
            .priority(-800);
        Self::with_kind("lifecycle", "Lifecycle", PropertyKind::Lifecycle(workflow)).field(state)
    }

    pub fn linked_to_parent(parent: impl Into<String>) -> Self {
        let parent = parent.into();
        Self::with_kind(
            "parent",
            "Parent",
            PropertyKind::LinkedToParent {
                parent: parent.clone(),
            },
        )
        .field(FieldDefinition::text(PARENT_COLUMN, "Parent", 36).indexed())
        .join(JoinQueryConditionDefinition::new(PARENT_COLUMN, parent))
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Declares a join condition without borrowing anything yet.
    pub fn join(mut self, condition: JoinQueryConditionDefinition) -> Self {
        self.bucket_mut(condition);
        self
    }

    /// Borrows a remote column, grouped with others sharing `condition`.
    pub fn external(mut self, condition: JoinQueryConditionDefinition, field: ExternalFieldDefinition) -> Self {
        self.bucket_mut(condition).push(field);
        self
    }

    /// Borrows a column of the parent object.
    ///
    /// Only meaningful on [`PropertyKind::LinkedToParent`]; other kinds are
    /// left untouched.
    pub fn borrow_from_parent(self, field: ExternalFieldDefinition) -> Self {
        match &self.kind {
            PropertyKind::LinkedToParent { parent } => {
                let condition = JoinQueryConditionDefinition::new(PARENT_COLUMN, parent.clone());
                self.external(condition, field)
            }
            _ => self,
        }
    }

    pub fn legacy(mut self) -> Self {
        self.legacy = true;
        self
    }

    pub fn on_change(mut self, trigger: impl Into<String>) -> Self {
        self.triggers.push(trigger.into());
        self
    }

    fn bucket_mut(&mut self, condition: JoinQueryConditionDefinition) -> &mut ExternalFieldByJoinQuery {
        let position = match self.buckets.iter().position(|b| b.condition() == &condition) {
            Some(position) => position,
            None => {
                self.buckets.push(ExternalFieldByJoinQuery::new(condition));
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[position]
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn buckets(&self) -> &[ExternalFieldByJoinQuery] {
        &self.buckets
    }

    pub(crate) fn buckets_mut(&mut self) -> &mut [ExternalFieldByJoinQuery] {
        &mut self.buckets
    }

    pub fn external_fields(&self) -> impl Iterator<Item = &ExternalFieldDefinition> {
        self.buckets.iter().flat_map(|b| b.fields())
    }

    /// Legacy properties stay stored and queryable but are never displayed.
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    pub fn find_field(&self, name: &str) -> Option<(usize, &FieldDefinition)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name() == name)
    }

    pub fn external_position(&self, name: &str) -> Option<usize> {
        self.external_fields().position(|f| f.name() == name)
    }

    pub fn check(&self, config: &EngineConfig) -> Result<()> {
        if !is_valid_element_name(&self.name) {
            return Err(EngineError::Composition(format!(
                "Property '{}': name must be lower snake case",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            field.check(config)?;
            if !seen.insert(field.name()) {
                return Err(EngineError::Composition(format!(
                    "Property '{}' declares '{}' twice",
                    self.name,
                    field.name()
                )));
            }
        }
        for external in self.external_fields() {
            external.check()?;
            if !seen.insert(external.name()) {
                return Err(EngineError::Composition(format!(
                    "Property '{}' declares '{}' twice",
                    self.name,
                    external.name()
                )));
            }
        }
        Ok(())
    }

    pub fn initiate_property_instance(&self) -> PropertyInstance {
        PropertyInstance {
            fields: (0..self.fields.len()).map(|i| self.initiate_field_slot(i)).collect(),
            external: vec![Value::Null; self.external_fields().count()],
        }
    }

    /// Initial value of own field `index`; a lifecycle state starts on
    /// the workflow's default working value.
    pub fn initiate_field_slot(&self, index: usize) -> FieldInstance {
        match &self.kind {
            PropertyKind::Lifecycle(workflow) if index == 0 => {
                FieldInstance::Choice(Some(workflow.default_working().to_string()))
            }
            _ => self.fields[index].initiate_field_instance(),
        }
    }

    /// Stamps insert-time values. Returns the indexes of fields written.
    pub(crate) fn on_insert(&self, instance: &mut PropertyInstance) -> Vec<usize> {
        let mut written = Vec::new();
        if let PropertyKind::CreationLog = self.kind
            && let Some(slot) = instance.fields.first_mut()
            && slot.is_blank()
        {
            *slot = FieldInstance::Timestamp(Some(Utc::now()));
            written.push(0);
        }
        written
    }

    /// Whether a lifecycle instance sits on a final state.
    pub fn is_final(&self, instance: &PropertyInstance) -> bool {
        match (&self.kind, instance.fields.first()) {
            (PropertyKind::Lifecycle(workflow), Some(FieldInstance::Choice(Some(code)))) => {
                workflow.is_final(code)
            }
            _ => false,
        }
    }

    /// Fields to display for this property under the active profiles.
    ///
    /// Own fields are always listed; each external field hidden by none of
    /// `profiles` is listed through a synthesized read-only definition.
    pub fn get_data_object_field_definition(&self, profiles: &[&DisplayProfile]) -> Vec<FieldDefinition> {
        let mut fields = self.fields.clone();
        fields.extend(
            self.external_fields()
                .filter(|f| !profiles.iter().any(|p| p.hides(f.name())))
                .map(ExternalFieldDefinition::to_field_definition),
        );
        fields
    }

    /// Adds this property's joins and selections; returns one alias per bucket.
    pub fn extend_query(&self, query: &mut Query) -> Vec<String> {
        self.buckets
            .iter()
            .map(|bucket| {
                let alias = query.ensure_join(bucket.condition().join_key());
                for field in bucket.fields() {
                    query.select(&alias, field.remote_field());
                }
                alias
            })
            .collect()
    }

    /// Copies joined values into the instance's external slots.
    pub fn read_external(&self, instance: &mut PropertyInstance, row: &QueryRow, aliases: &[String]) {
        let values = self
            .buckets
            .iter()
            .zip(aliases)
            .flat_map(|(bucket, alias)| {
                bucket
                    .fields()
                    .iter()
                    .map(move |f| row.get(alias, f.remote_field()).clone())
            });
        for (slot, value) in instance.external.iter_mut().zip(values) {
            *slot = value;
        }
    }
}

impl ElementDefinition for PropertyDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Vec<Column> {
        self.fields.iter().flat_map(|f| f.columns()).collect()
    }

    fn indexes(&self, table: &str) -> Vec<IndexSchema> {
        self.fields.iter().flat_map(|f| f.indexes(table)).collect()
    }

    fn triggers(&self) -> &[String] {
        &self.triggers
    }
}
