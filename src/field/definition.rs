use super::decimal::fit_to_scale;
use super::encrypted::{self, EncryptionMode, ReversibleCipher, encrypted_column_len};
use super::multi_choice::{parse_storage_string, storage_string, storage_width};
use super::period::TIME_PERIOD_TEXT_LEN;
use super::text::{search_column_name, search_normalize};
use super::{FieldInstance, TimePeriod};
use crate::choice::ChoiceDefinition;
use crate::config::EngineConfig;
use crate::core::{Column, ColumnKind, EngineError, IndexSchema, Result, Row, ValidationFailure, Value};
use crate::element::{ElementDefinition, is_valid_element_name};
use crate::loader::LoaderMode;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{Level, event};

/// Display priority bounds.
pub const MIN_PRIORITY: i32 = -1000;
pub const MAX_PRIORITY: i32 = 1000;

/// Largest scale a stored decimal may declare.
pub const MAX_DECIMAL_SCALE: u32 = 28;

/// Primitive storage kind of a field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Text {
        max_len: usize,
        /// Mirror the value into a normalised `<name>_search` column
        searchable: bool,
        rich: bool,
    },
    Integer,
    Decimal {
        precision: u32,
        scale: u32,
    },
    Timestamp,
    TimePeriod,
    Encrypted {
        max_len: usize,
        mode: EncryptionMode,
    },
    Binary {
        max_len: Option<usize>,
    },
    Choice(Arc<ChoiceDefinition>),
    MultiChoice(Arc<ChoiceDefinition>),
}

impl FieldKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "TEXT",
            Self::Integer => "INTEGER",
            Self::Decimal { .. } => "DECIMAL",
            Self::Timestamp => "TIMESTAMP",
            Self::TimePeriod => "TIME PERIOD",
            Self::Encrypted { .. } => "ENCRYPTED TEXT",
            Self::Binary { .. } => "BINARY",
            Self::Choice(_) => "CHOICE",
            Self::MultiChoice(_) => "MULTIPLE CHOICE",
        }
    }

    pub fn choice(&self) -> Option<&Arc<ChoiceDefinition>> {
        match self {
            Self::Choice(choice) | Self::MultiChoice(choice) => Some(choice),
            _ => None,
        }
    }

    fn unset(&self) -> FieldInstance {
        match self {
            Self::Text { .. } => FieldInstance::Text(None),
            Self::Integer => FieldInstance::Integer(None),
            Self::Decimal { .. } => FieldInstance::Decimal(None),
            Self::Timestamp => FieldInstance::Timestamp(None),
            Self::TimePeriod => FieldInstance::TimePeriod(None),
            Self::Encrypted { .. } => FieldInstance::Encrypted(None),
            Self::Binary { .. } => FieldInstance::Binary(None),
            Self::Choice(_) => FieldInstance::Choice(None),
            Self::MultiChoice(_) => FieldInstance::MultiChoice(BTreeSet::new()),
        }
    }
}

/// A leaf attribute of an object type.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    name: String,
    display_name: String,
    tooltip: Option<String>,
    kind: FieldKind,
    read_only: bool,
    mandatory: bool,
    show_in_title: bool,
    show_in_bottom_notes: bool,
    priority: i32,
    column_width: Option<u32>,
    lenient: bool,
    indexed: bool,
    unique: bool,
    triggers: Vec<String>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            tooltip: None,
            kind,
            read_only: false,
            mandatory: false,
            show_in_title: false,
            show_in_bottom_notes: false,
            priority: 0,
            column_width: None,
            lenient: false,
            indexed: false,
            unique: false,
            triggers: Vec::new(),
        }
    }

    pub fn text(name: impl Into<String>, display_name: impl Into<String>, max_len: usize) -> Self {
        Self::new(
            name,
            display_name,
            FieldKind::Text {
                max_len,
                searchable: false,
                rich: false,
            },
        )
    }

    pub fn integer(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::new(name, display_name, FieldKind::Integer)
    }

    pub fn decimal(
        name: impl Into<String>,
        display_name: impl Into<String>,
        precision: u32,
        scale: u32,
    ) -> Self {
        Self::new(name, display_name, FieldKind::Decimal { precision, scale })
    }

    pub fn timestamp(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::new(name, display_name, FieldKind::Timestamp)
    }

    pub fn time_period(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::new(name, display_name, FieldKind::TimePeriod)
    }

    pub fn encrypted(
        name: impl Into<String>,
        display_name: impl Into<String>,
        max_len: usize,
        mode: EncryptionMode,
    ) -> Self {
        Self::new(name, display_name, FieldKind::Encrypted { max_len, mode })
    }

    pub fn binary(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::new(name, display_name, FieldKind::Binary { max_len: None })
    }

    pub fn choice(
        name: impl Into<String>,
        display_name: impl Into<String>,
        choice: Arc<ChoiceDefinition>,
    ) -> Self {
        Self::new(name, display_name, FieldKind::Choice(choice))
    }

    pub fn multi_choice(
        name: impl Into<String>,
        display_name: impl Into<String>,
        choice: Arc<ChoiceDefinition>,
    ) -> Self {
        Self::new(name, display_name, FieldKind::MultiChoice(choice))
    }

    // ========================================
    // Builder-style setters
    // ========================================

    pub fn tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn in_title(mut self) -> Self {
        self.show_in_title = true;
        self
    }

    pub fn in_bottom_notes(mut self) -> Self {
        self.show_in_bottom_notes = true;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn column_width(mut self, width: u32) -> Self {
        self.column_width = Some(width);
        self
    }

    /// Opts this column into lenient flat-file loading.
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.indexed = true;
        self.unique = true;
        self
    }

    /// Adds the normalised search column; no effect on non-text fields.
    pub fn searchable(mut self) -> Self {
        if let FieldKind::Text { searchable, .. } = &mut self.kind {
            *searchable = true;
        }
        self
    }

    pub fn rich_text(mut self) -> Self {
        if let FieldKind::Text { rich, .. } = &mut self.kind {
            *rich = true;
        }
        self
    }

    pub fn max_bytes(mut self, max: usize) -> Self {
        if let FieldKind::Binary { max_len } = &mut self.kind {
            *max_len = Some(max);
        }
        self
    }

    /// Registers a trigger, by name, fired whenever this field changes.
    pub fn on_change(mut self, trigger: impl Into<String>) -> Self {
        self.triggers.push(trigger.into());
        self
    }

    // ========================================
    // Accessors
    // ========================================

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn tooltip_text(&self) -> Option<&str> {
        self.tooltip.as_deref()
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn shows_in_title(&self) -> bool {
        self.show_in_title
    }

    pub fn shows_in_bottom_notes(&self) -> bool {
        self.show_in_bottom_notes
    }

    pub fn display_priority(&self) -> i32 {
        self.priority
    }

    pub fn preferred_width(&self) -> Option<u32> {
        self.column_width
    }

    pub fn loader_mode(&self, config: &EngineConfig) -> LoaderMode {
        if self.lenient {
            LoaderMode::Lenient
        } else {
            config.default_loader_mode
        }
    }

    /// Checks the declaration itself; run once while composing the object.
    pub fn check(&self, config: &EngineConfig) -> Result<()> {
        let fail = |message: String| {
            Err(EngineError::Composition(format!(
                "Field '{}': {}",
                self.name, message
            )))
        };

        if !is_valid_element_name(&self.name) {
            return fail("name must be lower snake case".to_string());
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return fail(format!(
                "priority {} outside {}..{}",
                self.priority, MIN_PRIORITY, MAX_PRIORITY
            ));
        }
        match &self.kind {
            FieldKind::Text { max_len, .. } | FieldKind::Encrypted { max_len, .. }
                if *max_len == 0 =>
            {
                fail("maximum length must be > 0".to_string())
            }
            FieldKind::Decimal { precision, scale }
                if *precision == 0 || scale > precision || *scale > MAX_DECIMAL_SCALE =>
            {
                fail(format!("invalid DECIMAL({},{})", precision, scale))
            }
            FieldKind::Encrypted {
                mode: EncryptionMode::Reversible,
                ..
            } if config.cipher.is_none() => {
                fail("reversible encryption needs a configured cipher".to_string())
            }
            FieldKind::MultiChoice(choice)
                if choice
                    .values()
                    .iter()
                    .any(|v| v.code().contains(config.multi_value_separator)) =>
            {
                fail(format!(
                    "choice '{}' has a code containing the separator '{}'",
                    choice.name(),
                    config.multi_value_separator
                ))
            }
            _ => Ok(()),
        }
    }

    /// Blank slot for a new payload; single choices start on their default.
    pub fn initiate_field_instance(&self) -> FieldInstance {
        match &self.kind {
            FieldKind::Choice(choice) => {
                FieldInstance::Choice(choice.default_value().map(|v| v.code().to_string()))
            }
            kind => kind.unset(),
        }
    }

    /// Validates and writes `value`, returning whether the slot changed.
    ///
    /// On error the slot is left untouched.
    pub fn set_value(
        &self,
        instance: &mut FieldInstance,
        value: Value,
        config: &EngineConfig,
    ) -> Result<bool> {
        match self.prepare(instance, value, config)? {
            Some(next) => {
                *instance = next;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Selects exactly `codes` on a multi-value choice.
    pub fn set_choices<'a>(
        &self,
        instance: &mut FieldInstance,
        codes: impl IntoIterator<Item = &'a str>,
        config: &EngineConfig,
    ) -> Result<bool> {
        let codes: BTreeSet<String> = codes.into_iter().map(str::to_string).collect();
        let stored = storage_string(&codes, config.multi_value_separator);
        self.set_value(instance, Value::Text(stored), config)
    }

    /// Canonical storage string of a multi-value choice slot.
    pub fn storage_string(&self, instance: &FieldInstance, config: &EngineConfig) -> Option<String> {
        instance
            .as_choices()
            .map(|codes| storage_string(codes, config.multi_value_separator))
    }

    /// Replaces a multi-value choice from its storage string.
    pub fn load_new_storage_string(
        &self,
        instance: &mut FieldInstance,
        stored: &str,
        config: &EngineConfig,
    ) -> Result<bool> {
        self.set_value(instance, Value::Text(stored.to_string()), config)
    }

    fn prepare(
        &self,
        current: &FieldInstance,
        value: Value,
        config: &EngineConfig,
    ) -> Result<Option<FieldInstance>> {
        let next = match (&self.kind, value) {
            (FieldKind::Choice(choice), Value::Null) if choice.is_restricted() => {
                // Clearing a restricted choice would reopen the whole graph.
                if let Some(from) = current.as_choice() {
                    return Err(EngineError::InvalidTransition {
                        field: self.name.clone(),
                        from: from.to_string(),
                        to: "<empty>".to_string(),
                    });
                }
                return Ok(None);
            }
            (kind, Value::Null) => kind.unset(),
            (FieldKind::Text { max_len, .. }, Value::Text(text)) => {
                self.check_len(text.chars().count(), *max_len)?;
                FieldInstance::Text(Some(text))
            }
            (FieldKind::Integer, Value::Integer(i)) => FieldInstance::Integer(Some(i)),
            (FieldKind::Decimal { precision, scale }, Value::Decimal(d)) => {
                FieldInstance::Decimal(Some(fit_to_scale(&self.name, d, *precision, *scale)?))
            }
            (FieldKind::Decimal { precision, scale }, Value::Integer(i)) => FieldInstance::Decimal(
                Some(fit_to_scale(&self.name, Decimal::from(i), *precision, *scale)?),
            ),
            (FieldKind::Timestamp, Value::Timestamp(t)) => FieldInstance::Timestamp(Some(t)),
            (FieldKind::TimePeriod, Value::Text(text)) => {
                let period: TimePeriod = text.parse().map_err(|_| {
                    EngineError::validation(&self.name, ValidationFailure::TimePeriod(text.clone()))
                })?;
                FieldInstance::TimePeriod(Some(period))
            }
            (FieldKind::Encrypted { max_len, mode }, Value::Text(plain)) => {
                self.check_len(plain.chars().count(), *max_len)?;
                if let Some(stored) = current.stored_secret()
                    && self.secret_matches(stored, &plain, *mode, config)?
                {
                    return Ok(None);
                }
                let stored = match mode {
                    EncryptionMode::OneWay => encrypted::hash_one_way(&plain, config.bcrypt_cost)?,
                    EncryptionMode::Reversible => self.cipher(config)?.encrypt(&plain)?,
                };
                let width = encrypted_column_len(*max_len, *mode);
                if stored.len() > width {
                    return Err(EngineError::Composition(format!(
                        "Field '{}' produced {} stored characters, its column holds {}",
                        self.name,
                        stored.len(),
                        width
                    )));
                }
                FieldInstance::Encrypted(Some(stored))
            }
            (FieldKind::Binary { max_len }, Value::Binary(bytes)) => {
                if let Some(max) = max_len {
                    self.check_len(bytes.len(), *max)?;
                }
                FieldInstance::Binary(Some(bytes))
            }
            (FieldKind::Choice(choice), Value::Text(code)) => {
                self.check_choice(choice, current.as_choice(), &code)?;
                FieldInstance::Choice(Some(code))
            }
            (FieldKind::MultiChoice(choice), Value::Text(stored)) => {
                let codes = parse_storage_string(&stored, config.multi_value_separator);
                let previous = current.as_choices();
                for code in &codes {
                    let known = choice.parse_choice_value(code).ok_or_else(|| {
                        EngineError::validation(&self.name, ValidationFailure::UnknownChoice(code.clone()))
                    })?;
                    let kept = previous.is_some_and(|p| p.contains(code));
                    if !known.is_active() && !kept {
                        return Err(EngineError::validation(
                            &self.name,
                            ValidationFailure::InactiveChoice(code.clone()),
                        ));
                    }
                }
                FieldInstance::MultiChoice(codes)
            }
            (kind, other) => {
                return Err(EngineError::validation(
                    &self.name,
                    ValidationFailure::WrongType {
                        expected: kind.kind_name(),
                        actual: other.type_name(),
                    },
                ));
            }
        };

        if &next == current {
            Ok(None)
        } else {
            Ok(Some(next))
        }
    }

    fn check_len(&self, len: usize, max: usize) -> Result<()> {
        if len > max {
            return Err(EngineError::validation(
                &self.name,
                ValidationFailure::TooLong { len, max },
            ));
        }
        Ok(())
    }

    fn check_choice(&self, choice: &ChoiceDefinition, from: Option<&str>, to: &str) -> Result<()> {
        let value = choice.parse_choice_value(to).ok_or_else(|| {
            EngineError::validation(&self.name, ValidationFailure::UnknownChoice(to.to_string()))
        })?;
        if from == Some(to) {
            return Ok(());
        }
        if !value.is_active() {
            return Err(EngineError::validation(
                &self.name,
                ValidationFailure::InactiveChoice(to.to_string()),
            ));
        }
        if let Some(from) = from
            && !choice.is_authorized_transition(from, to)
        {
            return Err(EngineError::InvalidTransition {
                field: self.name.clone(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    fn cipher<'c>(&self, config: &'c EngineConfig) -> Result<&'c dyn ReversibleCipher> {
        config.cipher.as_deref().ok_or_else(|| {
            EngineError::Composition(format!(
                "Field '{}' is reversibly encrypted but no cipher is configured",
                self.name
            ))
        })
    }

    fn secret_matches(
        &self,
        stored: &str,
        plain: &str,
        mode: EncryptionMode,
        config: &EngineConfig,
    ) -> Result<bool> {
        Ok(match mode {
            EncryptionMode::OneWay => encrypted::verify_one_way(plain, stored),
            EncryptionMode::Reversible => self.cipher(config)?.decrypt(stored)? == plain,
        })
    }

    /// Checks a clear candidate against an encrypted slot.
    pub fn verify_secret(
        &self,
        instance: &FieldInstance,
        candidate: &str,
        config: &EngineConfig,
    ) -> Result<bool> {
        match (&self.kind, instance.stored_secret()) {
            (FieldKind::Encrypted { mode, .. }, Some(stored)) => {
                self.secret_matches(stored, candidate, *mode, config)
            }
            _ => Ok(false),
        }
    }

    /// Readable value of the slot. One-way secrets read as `Null`.
    pub fn value(&self, instance: &FieldInstance, config: &EngineConfig) -> Result<Value> {
        Ok(match instance {
            FieldInstance::Text(v) => Value::from(v.clone()),
            FieldInstance::Integer(v) => Value::from(*v),
            FieldInstance::Decimal(v) => Value::from(*v),
            FieldInstance::Timestamp(v) => Value::from(*v),
            FieldInstance::TimePeriod(v) => Value::from(v.map(|p| p.to_string())),
            FieldInstance::Encrypted(None) => Value::Null,
            FieldInstance::Encrypted(Some(stored)) => match &self.kind {
                FieldKind::Encrypted {
                    mode: EncryptionMode::Reversible,
                    ..
                } => Value::Text(self.cipher(config)?.decrypt(stored)?),
                _ => Value::Null,
            },
            FieldInstance::Binary(v) => Value::from(v.clone()),
            FieldInstance::Choice(v) => Value::from(v.clone()),
            FieldInstance::MultiChoice(codes) if codes.is_empty() => Value::Null,
            FieldInstance::MultiChoice(codes) => {
                Value::Text(storage_string(codes, config.multi_value_separator))
            }
        })
    }

    /// Appends this field's column values to a storage row.
    pub fn write_columns(&self, instance: &FieldInstance, row: &mut Row, config: &EngineConfig) {
        match instance {
            FieldInstance::Text(v) => {
                row.push(Value::from(v.clone()));
                if let FieldKind::Text {
                    searchable: true, ..
                } = self.kind
                {
                    row.push(Value::from(v.as_deref().map(search_normalize)));
                }
            }
            FieldInstance::Integer(v) => row.push(Value::from(*v)),
            FieldInstance::Decimal(v) => row.push(Value::from(*v)),
            FieldInstance::Timestamp(v) => row.push(Value::from(*v)),
            FieldInstance::TimePeriod(v) => row.push(Value::from(v.map(|p| p.to_string()))),
            FieldInstance::Encrypted(v) => row.push(Value::from(v.clone())),
            FieldInstance::Binary(v) => row.push(Value::from(v.clone())),
            FieldInstance::Choice(v) => row.push(Value::from(v.clone())),
            FieldInstance::MultiChoice(codes) if codes.is_empty() => row.push(Value::Null),
            FieldInstance::MultiChoice(codes) => row.push(Value::Text(storage_string(
                codes,
                config.multi_value_separator,
            ))),
        }
    }

    /// Rebuilds a slot from its stored columns.
    ///
    /// Persisted data is trusted over current definitions: unknown choice
    /// codes and unreadable periods are logged and coerced to unset instead
    /// of failing the whole object load.
    pub fn read_columns(
        &self,
        values: &[Value],
        object: &str,
        config: &EngineConfig,
    ) -> Result<FieldInstance> {
        let stored = values.first().cloned().unwrap_or(Value::Null);
        let mismatch = |stored: &Value| {
            EngineError::TypeMismatch(format!(
                "Column '{}' of '{}' holds {}, expected {}",
                self.name,
                object,
                stored.type_name(),
                self.kind.kind_name()
            ))
        };

        let instance = match (&self.kind, stored) {
            (kind, Value::Null) => kind.unset(),
            (FieldKind::Text { .. }, Value::Text(t)) => FieldInstance::Text(Some(t)),
            (FieldKind::Integer, Value::Integer(i)) => FieldInstance::Integer(Some(i)),
            (FieldKind::Decimal { scale, .. }, Value::Decimal(mut d)) => {
                d.rescale(*scale);
                FieldInstance::Decimal(Some(d))
            }
            (FieldKind::Timestamp, Value::Timestamp(t)) => FieldInstance::Timestamp(Some(t)),
            (FieldKind::TimePeriod, Value::Text(t)) => match t.parse::<TimePeriod>() {
                Ok(period) => FieldInstance::TimePeriod(Some(period)),
                Err(err) => {
                    event!(Level::WARN, object = %object, field = %self.name, error = %err, "unreadable time period coerced to unset");
                    FieldInstance::TimePeriod(None)
                }
            },
            (FieldKind::Encrypted { .. }, Value::Text(t)) => FieldInstance::Encrypted(Some(t)),
            (FieldKind::Binary { .. }, Value::Binary(b)) => FieldInstance::Binary(Some(b)),
            (FieldKind::Choice(choice), Value::Text(code)) => {
                if choice.contains(&code) {
                    FieldInstance::Choice(Some(code))
                } else {
                    event!(Level::WARN, object = %object, field = %self.name, code = %code, "invalid stored choice code coerced to unset");
                    FieldInstance::Choice(None)
                }
            }
            (FieldKind::MultiChoice(choice), Value::Text(stored)) => {
                let mut codes = parse_storage_string(&stored, config.multi_value_separator);
                codes.retain(|code| {
                    let known = choice.contains(code);
                    if !known {
                        event!(Level::WARN, object = %object, field = %self.name, code = %code, "invalid stored choice code dropped");
                    }
                    known
                });
                FieldInstance::MultiChoice(codes)
            }
            (_, other) => return Err(mismatch(&other)),
        };
        Ok(instance)
    }

    fn main_column_kind(&self) -> ColumnKind {
        match &self.kind {
            FieldKind::Text { max_len, .. } => ColumnKind::Text { max_len: *max_len },
            FieldKind::Integer => ColumnKind::Integer,
            FieldKind::Decimal { precision, scale } => ColumnKind::Decimal {
                precision: *precision,
                scale: *scale,
            },
            FieldKind::Timestamp => ColumnKind::Timestamp,
            FieldKind::TimePeriod => ColumnKind::Text {
                max_len: TIME_PERIOD_TEXT_LEN,
            },
            FieldKind::Encrypted { max_len, mode } => ColumnKind::Text {
                max_len: encrypted_column_len(*max_len, *mode),
            },
            FieldKind::Binary { max_len } => ColumnKind::Binary { max_len: *max_len },
            FieldKind::Choice(choice) => ColumnKind::Text {
                max_len: choice.max_code_len(),
            },
            FieldKind::MultiChoice(choice) => ColumnKind::Text {
                max_len: storage_width(choice.values().iter().map(|v| v.code())).max(1),
            },
        }
    }
}

impl ElementDefinition for FieldDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Vec<Column> {
        let mut main = Column::new(self.name.clone(), self.main_column_kind());
        if self.mandatory {
            main = main.not_null();
        }
        let mut columns = vec![main];
        if let FieldKind::Text {
            max_len,
            searchable: true,
            ..
        } = self.kind
        {
            columns.push(Column::new(
                search_column_name(&self.name),
                ColumnKind::Text { max_len },
            ));
        }
        columns
    }

    fn indexes(&self, table: &str) -> Vec<IndexSchema> {
        if !self.indexed {
            return Vec::new();
        }
        let column = match self.kind {
            FieldKind::Text {
                searchable: true, ..
            } if !self.unique => search_column_name(&self.name),
            _ => self.name.clone(),
        };
        let index = IndexSchema::new(format!("{}_{}_idx", table, self.name), vec![column]);
        vec![if self.unique { index.unique() } else { index }]
    }

    fn triggers(&self) -> &[String] {
        &self.triggers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::ChoiceValue;
    use std::str::FromStr;

    fn config() -> EngineConfig {
        EngineConfig::new().bcrypt_cost(crate::config::MIN_BCRYPT_COST)
    }

    fn status_choice(restricted: bool) -> Arc<ChoiceDefinition> {
        let mut builder = ChoiceDefinition::builder("status", 4);
        builder
            .add_choice_value_as_default(ChoiceValue::new("NEW", "New"))
            .unwrap()
            .add_choice_value(ChoiceValue::new("OPEN", "Open"))
            .unwrap()
            .add_choice_value(ChoiceValue::new("DONE", "Done"))
            .unwrap()
            .add_choice_value(ChoiceValue::new("OLD", "Old").inactive())
            .unwrap();
        if restricted {
            builder.add_transition("NEW", "OPEN").unwrap();
            builder.add_transition("OPEN", "DONE").unwrap();
        }
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn test_text_length() {
        let field = FieldDefinition::text("name", "Name", 5);
        let mut slot = field.initiate_field_instance();
        assert!(field.set_value(&mut slot, "abcde".into(), &config()).unwrap());
        let err = field.set_value(&mut slot, "abcdef".into(), &config()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation {
                failure: ValidationFailure::TooLong { len: 6, max: 5 },
                ..
            }
        ));
        assert_eq!(slot.as_text(), Some("abcde"));
    }

    #[test]
    fn test_unchanged_value_reports_no_change() {
        let field = FieldDefinition::decimal("total", "Total", 5, 2);
        let mut slot = field.initiate_field_instance();
        let v = Decimal::from_str("12.5").unwrap();
        assert!(field.set_value(&mut slot, v.into(), &config()).unwrap());
        let same = Decimal::from_str("12.50").unwrap();
        assert!(!field.set_value(&mut slot, same.into(), &config()).unwrap());
    }

    #[test]
    fn test_searchable_text_writes_mirror_column() {
        let field = FieldDefinition::text("name", "Name", 40).searchable();
        assert_eq!(field.columns().len(), 2);
        let mut slot = field.initiate_field_instance();
        field.set_value(&mut slot, "ACME Corp.".into(), &config()).unwrap();
        let mut row = Row::new();
        field.write_columns(&slot, &mut row, &config());
        assert_eq!(row, vec![Value::from("ACME Corp."), Value::from("acme corp")]);
    }

    #[test]
    fn test_choice_default_and_transitions() {
        let field = FieldDefinition::choice("status", "Status", status_choice(true));
        let mut slot = field.initiate_field_instance();
        assert_eq!(slot.as_choice(), Some("NEW"));

        let err = field.set_value(&mut slot, "DONE".into(), &config()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        assert!(field.set_value(&mut slot, "OPEN".into(), &config()).unwrap());
        assert!(field.set_value(&mut slot, "DONE".into(), &config()).unwrap());
    }

    #[test]
    fn test_restricted_choice_cannot_be_cleared() {
        let field = FieldDefinition::choice("status", "Status", status_choice(true));
        let mut slot = field.initiate_field_instance();

        // 1. Clearing would let the next write skip the graph
        let err = field.set_value(&mut slot, Value::Null, &config()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition { ref from, .. } if from == "NEW"
        ));
        assert_eq!(slot.as_choice(), Some("NEW"));
        assert!(field.set_value(&mut slot, "DONE".into(), &config()).is_err());

        // 2. Unrestricted choices still clear
        let free = FieldDefinition::choice("status", "Status", status_choice(false));
        let mut slot = free.initiate_field_instance();
        assert!(free.set_value(&mut slot, Value::Null, &config()).unwrap());
        assert_eq!(slot.as_choice(), None);
    }

    #[test]
    fn test_choice_rejects_unknown_and_inactive() {
        let field = FieldDefinition::choice("status", "Status", status_choice(false));
        let mut slot = field.initiate_field_instance();
        assert!(field.set_value(&mut slot, "NOPE".into(), &config()).is_err());
        assert!(field.set_value(&mut slot, "OLD".into(), &config()).is_err());
        assert_eq!(slot.as_choice(), Some("NEW"));
    }

    #[test]
    fn test_hydration_coerces_invalid_choice() {
        let field = FieldDefinition::choice("status", "Status", status_choice(false));
        let slot = field
            .read_columns(&[Value::from("GONE")], "ticket", &config())
            .unwrap();
        assert_eq!(slot, FieldInstance::Choice(None));
    }

    #[test]
    fn test_one_way_secret_is_unreadable() {
        let field = FieldDefinition::encrypted("pin", "PIN", 8, EncryptionMode::OneWay);
        let mut slot = field.initiate_field_instance();
        assert!(field.set_value(&mut slot, "1234".into(), &config()).unwrap());
        assert_eq!(field.value(&slot, &config()).unwrap(), Value::Null);
        assert!(field.verify_secret(&slot, "1234", &config()).unwrap());
        assert!(!field.set_value(&mut slot, "1234".into(), &config()).unwrap());
    }

    #[test]
    fn test_reversible_without_cipher_is_composition_error() {
        let field = FieldDefinition::encrypted("iban", "IBAN", 34, EncryptionMode::Reversible);
        assert!(matches!(field.check(&config()), Err(EngineError::Composition(_))));
    }

    #[test]
    fn test_priority_bounds() {
        let field = FieldDefinition::integer("qty", "Quantity").priority(1001);
        assert!(field.check(&config()).is_err());
        let field = FieldDefinition::integer("qty", "Quantity").priority(-1000);
        assert!(field.check(&config()).is_ok());
    }

    #[test]
    fn test_wrong_type() {
        let field = FieldDefinition::integer("qty", "Quantity");
        let mut slot = field.initiate_field_instance();
        let err = field.set_value(&mut slot, "ten".into(), &config()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation {
                failure: ValidationFailure::WrongType { .. },
                ..
            }
        ));
    }
}
