use super::ObjectInstance;
use crate::config::EngineConfig;
use crate::core::{EngineError, Result, Value};
use crate::element::ElementDefinition;
use crate::field::{EncryptionMode, FieldDefinition, FieldInstance, FieldKind};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;

/// Named set of elements hidden from display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayProfile {
    name: String,
    hidden: BTreeSet<String>,
}

impl DisplayProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hidden: BTreeSet::new(),
        }
    }

    pub fn hide(mut self, element: impl Into<String>) -> Self {
        self.hidden.insert(element.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hides(&self, element: &str) -> bool {
        self.hidden.contains(element)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceRef {
    pub code: String,
    pub display: String,
}

/// Typed content of a displayed element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ElementPayload {
    Empty,
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Timestamp(DateTime<Utc>),
    /// Byte length only
    Binary(usize),
    Choice(ChoiceRef),
    MultiChoice(Vec<ChoiceRef>),
}

/// Self-describing element handed to renderers and serializers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleDataElement {
    pub name: String,
    /// Owning property, `None` for the object's own fields
    pub property: Option<String>,
    pub display_name: String,
    pub priority: i32,
    pub payload: ElementPayload,
}

impl SimpleDataElement {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

pub fn to_json(elements: &[SimpleDataElement]) -> Result<String> {
    Ok(serde_json::to_string_pretty(elements)?)
}

fn choice_ref(field: &FieldDefinition, code: &str) -> ChoiceRef {
    let display = field
        .kind()
        .choice()
        .and_then(|c| c.parse_choice_value(code))
        .map(|v| v.display().to_string())
        .unwrap_or_else(|| code.to_string());
    ChoiceRef {
        code: code.to_string(),
        display,
    }
}

fn field_payload(field: &FieldDefinition, slot: &FieldInstance, config: &EngineConfig) -> Result<ElementPayload> {
    if slot.is_blank() {
        return Ok(ElementPayload::Empty);
    }
    Ok(match slot {
        FieldInstance::Encrypted(_) => match field.kind() {
            FieldKind::Encrypted {
                mode: EncryptionMode::Reversible,
                ..
            } => value_payload(field, field.value(slot, config)?),
            _ => ElementPayload::Empty,
        },
        FieldInstance::Choice(Some(code)) => ElementPayload::Choice(choice_ref(field, code)),
        FieldInstance::MultiChoice(codes) => {
            ElementPayload::MultiChoice(codes.iter().map(|c| choice_ref(field, c)).collect())
        }
        FieldInstance::Binary(Some(bytes)) => ElementPayload::Binary(bytes.len()),
        _ => value_payload(field, field.value(slot, config)?),
    })
}

fn value_payload(field: &FieldDefinition, value: Value) -> ElementPayload {
    match value {
        Value::Null => ElementPayload::Empty,
        Value::Integer(i) => ElementPayload::Integer(i),
        Value::Decimal(d) => ElementPayload::Decimal(d),
        Value::Timestamp(t) => ElementPayload::Timestamp(t),
        Value::Binary(b) => ElementPayload::Binary(b.len()),
        Value::Text(code) if field.kind().choice().is_some() => {
            ElementPayload::Choice(choice_ref(field, &code))
        }
        Value::Text(text) => ElementPayload::Text(text),
    }
}

impl ObjectInstance {
    /// One element per visible field and property field, highest priority
    /// first; ties keep declaration order.
    ///
    /// Legacy properties are skipped. One-way secrets are always empty.
    pub fn display_elements(&self, profiles: &[&str]) -> Result<Vec<SimpleDataElement>> {
        let definition = self.definition();
        let config = definition.config();
        let profiles = profiles
            .iter()
            .map(|name| {
                definition.profile(name).ok_or_else(|| {
                    EngineError::Composition(format!(
                        "Object '{}' has no display profile '{}'",
                        definition.name(),
                        name
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let hidden = |name: &str| profiles.iter().any(|p| p.hides(name));

        let mut elements = Vec::new();
        for (field, slot) in definition.fields().iter().zip(&self.payload().fields) {
            if hidden(field.name()) {
                continue;
            }
            elements.push(SimpleDataElement {
                name: field.name().to_string(),
                property: None,
                display_name: field.display_name().to_string(),
                priority: field.display_priority(),
                payload: field_payload(field, slot, config)?,
            });
        }

        for (property, instance) in definition.properties().iter().zip(&self.payload().properties) {
            if property.is_legacy() {
                continue;
            }
            for field in property.get_data_object_field_definition(&profiles) {
                let payload = if let Some((index, own)) = property.find_field(field.name()) {
                    field_payload(own, &instance.fields[index], config)?
                } else if let Some(position) = property.external_position(field.name()) {
                    value_payload(&field, instance.external[position].clone())
                } else {
                    ElementPayload::Empty
                };
                elements.push(SimpleDataElement {
                    name: field.name().to_string(),
                    property: Some(property.name().to_string()),
                    display_name: field.display_name().to_string(),
                    priority: field.display_priority(),
                    payload,
                });
            }
        }

        elements.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(elements)
    }
}
