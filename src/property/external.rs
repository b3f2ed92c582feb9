use crate::choice::ChoiceDefinition;
use crate::core::{ColumnKind, EngineError, Result};
use crate::element::{ElementDefinition, is_valid_element_name};
use crate::field::{FieldDefinition, FieldKind};
use crate::object::ObjectDefinition;
use crate::query::JoinKey;
use std::sync::Arc;

/// Declared join from the owning table to another object's table.
///
/// Two conditions are the same join exactly when they compare equal, which
/// is what lets [`Query::ensure_join`](crate::query::Query::ensure_join)
/// collapse them onto one alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinQueryConditionDefinition {
    local_column: String,
    remote_object: String,
    remote_column: String,
}

impl JoinQueryConditionDefinition {
    /// Joins `local_column` to the remote object's `id`.
    pub fn new(local_column: impl Into<String>, remote_object: impl Into<String>) -> Self {
        Self {
            local_column: local_column.into(),
            remote_object: remote_object.into(),
            remote_column: crate::core::ID_COLUMN.to_string(),
        }
    }

    pub fn on(mut self, remote_column: impl Into<String>) -> Self {
        self.remote_column = remote_column.into();
        self
    }

    pub fn local_column(&self) -> &str {
        &self.local_column
    }

    pub fn remote_object(&self) -> &str {
        &self.remote_object
    }

    pub fn remote_column(&self) -> &str {
        &self.remote_column
    }

    pub fn join_key(&self) -> JoinKey {
        JoinKey {
            local_column: self.local_column.clone(),
            table: self.remote_object.clone(),
            remote_column: self.remote_column.clone(),
        }
    }
}

/// Display shape inferred from the borrowed column.
#[derive(Debug, Clone)]
pub enum ExternalFieldKind {
    /// Shown through the remote choice's display text
    Choice(Arc<ChoiceDefinition>),
    RichText { max_len: usize },
    /// Integer rendered as text but ordered numerically
    IntegerAsString,
    Plain { max_len: usize },
}

/// A column displayed on this object but stored on another one.
#[derive(Debug, Clone)]
pub struct ExternalFieldDefinition {
    name: String,
    display_name: String,
    remote_field: String,
    priority: i32,
    kind: Option<ExternalFieldKind>,
}

impl ExternalFieldDefinition {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        remote_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            remote_field: remote_field.into(),
            priority: 0,
            kind: None,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn remote_field(&self) -> &str {
        &self.remote_field
    }

    /// `None` until the owning registry resolved it.
    pub fn kind(&self) -> Option<&ExternalFieldKind> {
        self.kind.as_ref()
    }

    pub(crate) fn check(&self) -> Result<()> {
        if !is_valid_element_name(&self.name) {
            return Err(EngineError::Composition(format!(
                "External field '{}': name must be lower snake case",
                self.name
            )));
        }
        Ok(())
    }

    pub(crate) fn resolve(&mut self, remote: &ObjectDefinition) -> Result<()> {
        let field = remote.find_field(&self.remote_field).ok_or_else(|| {
            EngineError::FieldNotFound(self.remote_field.clone(), remote.name().to_string())
        })?;
        let width = match field.columns().first().map(|c| c.kind) {
            Some(ColumnKind::Text { max_len }) => max_len,
            _ => 64,
        };
        self.kind = Some(match field.kind() {
            FieldKind::Choice(choice) => ExternalFieldKind::Choice(choice.clone()),
            FieldKind::Text { rich: true, .. } => ExternalFieldKind::RichText { max_len: width },
            FieldKind::Integer => ExternalFieldKind::IntegerAsString,
            FieldKind::Encrypted { .. } => {
                return Err(EngineError::Composition(format!(
                    "External field '{}' cannot borrow encrypted '{}.{}'",
                    self.name,
                    remote.name(),
                    self.remote_field
                )));
            }
            _ => ExternalFieldKind::Plain { max_len: width },
        });
        Ok(())
    }

    /// Read-only field definition standing in for the borrowed column.
    pub fn to_field_definition(&self) -> FieldDefinition {
        let field = match &self.kind {
            Some(ExternalFieldKind::Choice(choice)) => {
                FieldDefinition::choice(self.name.clone(), self.display_name.clone(), choice.clone())
            }
            Some(ExternalFieldKind::RichText { max_len }) => {
                FieldDefinition::text(self.name.clone(), self.display_name.clone(), *max_len).rich_text()
            }
            Some(ExternalFieldKind::IntegerAsString) => {
                FieldDefinition::integer(self.name.clone(), self.display_name.clone())
            }
            Some(ExternalFieldKind::Plain { max_len }) => {
                FieldDefinition::text(self.name.clone(), self.display_name.clone(), *max_len)
            }
            None => FieldDefinition::text(self.name.clone(), self.display_name.clone(), 64),
        };
        field.read_only().priority(self.priority)
    }
}

/// External fields of one property sharing a join condition.
#[derive(Debug, Clone)]
pub struct ExternalFieldByJoinQuery {
    condition: JoinQueryConditionDefinition,
    fields: Vec<ExternalFieldDefinition>,
}

impl ExternalFieldByJoinQuery {
    pub fn new(condition: JoinQueryConditionDefinition) -> Self {
        Self {
            condition,
            fields: Vec::new(),
        }
    }

    pub fn condition(&self) -> &JoinQueryConditionDefinition {
        &self.condition
    }

    pub fn fields(&self) -> &[ExternalFieldDefinition] {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [ExternalFieldDefinition] {
        &mut self.fields
    }

    pub(crate) fn push(&mut self, field: ExternalFieldDefinition) {
        self.fields.push(field);
    }
}
