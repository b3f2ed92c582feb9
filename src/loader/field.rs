use super::{LoaderCell, LoaderFieldSample};
use crate::choice::ChoiceDefinition;
use crate::config::EngineConfig;
use crate::core::{Result, Value};
use crate::element::ElementDefinition;
use crate::field::decimal::equal_at_scale;
use crate::field::multi_choice::storage_string;
use crate::field::{EncryptionMode, FieldDefinition, FieldInstance, FieldKind};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeSet;
use std::str::FromStr;

type CellResult<T> = std::result::Result<T, String>;

impl FieldDefinition {
    /// Converts a raw cell into a value `set_value` accepts.
    ///
    /// Choice cells may hold either the storage code or the display text.
    /// The error is a human readable reason; callers attach field, object
    /// and raw value.
    pub fn parse_cell(&self, cell: &LoaderCell, config: &EngineConfig) -> CellResult<Value> {
        if cell.is_blank() {
            return Ok(Value::Null);
        }

        match (self.kind(), cell) {
            (FieldKind::Text { .. } | FieldKind::Encrypted { .. }, LoaderCell::Text(text)) => {
                Ok(Value::Text(text.clone()))
            }
            (FieldKind::Text { .. } | FieldKind::Encrypted { .. }, other) => {
                Ok(Value::Text(other.to_string()))
            }

            (FieldKind::Integer, LoaderCell::Integer(i)) => Ok(Value::Integer(*i)),
            (FieldKind::Integer, LoaderCell::Decimal(d)) if d.fract().is_zero() => d
                .to_i64()
                .map(Value::Integer)
                .ok_or_else(|| format!("{} is out of INTEGER range", d)),
            (FieldKind::Integer, LoaderCell::Text(text)) => text
                .trim()
                .parse()
                .map(Value::Integer)
                .map_err(|_| "not an integer".to_string()),

            (FieldKind::Decimal { .. }, LoaderCell::Decimal(d)) => Ok(Value::Decimal(*d)),
            (FieldKind::Decimal { .. }, LoaderCell::Integer(i)) => Ok(Value::Decimal(Decimal::from(*i))),
            (FieldKind::Decimal { .. }, LoaderCell::Text(text)) => Decimal::from_str(text.trim())
                .map(Value::Decimal)
                .map_err(|e| format!("not a decimal: {}", e)),

            (FieldKind::Timestamp, LoaderCell::Timestamp(t)) => Ok(Value::Timestamp(*t)),
            (FieldKind::Timestamp, LoaderCell::Text(text)) => {
                parse_timestamp(text.trim()).map(Value::Timestamp)
            }

            (FieldKind::TimePeriod, LoaderCell::Text(text)) => Ok(Value::Text(text.trim().to_string())),
            (FieldKind::TimePeriod, LoaderCell::Integer(year)) => Ok(Value::Text(year.to_string())),

            (FieldKind::Choice(choice), cell) => {
                resolve_choice(choice, cell.to_string().trim()).map(Value::Text)
            }
            (FieldKind::MultiChoice(choice), cell) => {
                let separator = config.multi_value_separator;
                let mut codes = BTreeSet::new();
                for part in cell.to_string().split(separator).map(str::trim) {
                    if !part.is_empty() {
                        codes.insert(resolve_choice(choice, part)?);
                    }
                }
                Ok(Value::Text(storage_string(&codes, separator)))
            }

            (FieldKind::Binary { .. }, _) => Err("binary content cannot be loaded from a cell".to_string()),
            (kind, _) => Err(format!("cell does not hold a {} value", kind.kind_name())),
        }
    }

    /// True when a parsed cell already matches the slot under loader
    /// equality: timestamps within the configured tolerance, decimals at
    /// the declared scale and blank one-way secrets. Everything else is
    /// left to `set_value`.
    pub fn matches_loaded(&self, instance: &FieldInstance, value: &Value, config: &EngineConfig) -> bool {
        match (self.kind(), instance, value) {
            (FieldKind::Timestamp, FieldInstance::Timestamp(Some(current)), Value::Timestamp(loaded)) => {
                match config.date_tolerance {
                    Some(tolerance) => (*current - *loaded)
                        .abs()
                        .to_std()
                        .is_ok_and(|drift| drift <= tolerance),
                    None => current == loaded,
                }
            }
            (FieldKind::Decimal { scale, .. }, FieldInstance::Decimal(Some(current)), Value::Decimal(loaded)) => {
                equal_at_scale(current, loaded, *scale)
            }
            // One-way secrets export empty, so an empty cell leaves the hash alone
            (
                FieldKind::Encrypted {
                    mode: EncryptionMode::OneWay,
                    ..
                },
                _,
                Value::Null,
            ) => true,
            _ => false,
        }
    }

    /// Cell content for export, and whether the cell needs a number or
    /// date format to read back identically.
    ///
    /// One-way secrets and binary content export as empty cells.
    pub fn format_cell(&self, instance: &FieldInstance, config: &EngineConfig) -> Result<(LoaderCell, bool)> {
        if matches!(instance, FieldInstance::Binary(_)) {
            return Ok((LoaderCell::Empty, false));
        }
        let cell = match self.value(instance, config)? {
            Value::Null | Value::Binary(_) => (LoaderCell::Empty, false),
            Value::Text(text) => (LoaderCell::Text(text), false),
            Value::Integer(i) => (LoaderCell::Integer(i), false),
            Value::Decimal(d) => (LoaderCell::Decimal(d), true),
            Value::Timestamp(t) => (LoaderCell::Timestamp(t), true),
        };
        Ok(cell)
    }

    pub fn loader_field_sample(&self, path: &str, config: &EngineConfig) -> LoaderFieldSample {
        let separator = config.multi_value_separator;
        let mut constraints = Vec::new();
        let example = match self.kind() {
            FieldKind::Text { max_len, .. } => {
                constraints.push(format!("at most {} characters", max_len));
                "Some text".to_string()
            }
            FieldKind::Integer => "42".to_string(),
            FieldKind::Decimal { precision, scale } => {
                constraints.push(format!("DECIMAL({},{})", precision, scale));
                let mut example = Decimal::new(1234, 2).normalize();
                example.rescale(*scale);
                example.to_string()
            }
            FieldKind::Timestamp => {
                constraints.push("RFC 3339 or YYYY-MM-DD".to_string());
                "2024-01-31T12:00:00Z".to_string()
            }
            FieldKind::TimePeriod => {
                constraints.push("YYYY, YYYYQn, YYYYMmm or YYYYWww".to_string());
                "2024Q1".to_string()
            }
            FieldKind::Encrypted { max_len, mode } => {
                constraints.push(format!("at most {} characters", max_len));
                if *mode == EncryptionMode::OneWay {
                    constraints.push("write only".to_string());
                }
                "secret".to_string()
            }
            FieldKind::Binary { .. } => {
                constraints.push("not loadable".to_string());
                String::new()
            }
            FieldKind::Choice(choice) => {
                constraints.push(format!("one of: {}", active_codes(choice).join(", ")));
                active_codes(choice).first().cloned().unwrap_or_default()
            }
            FieldKind::MultiChoice(choice) => {
                constraints.push(format!(
                    "any of: {} separated by '{}'",
                    active_codes(choice).join(", "),
                    separator
                ));
                active_codes(choice)
                    .into_iter()
                    .take(2)
                    .collect::<Vec<_>>()
                    .join(&separator.to_string())
            }
        };
        if self.is_read_only() {
            constraints.push("read only".to_string());
        }

        LoaderFieldSample {
            name: if path.is_empty() { self.name().to_string() } else { path.to_string() },
            optional: !self.is_mandatory(),
            example,
            constraints,
        }
    }
}

fn active_codes(choice: &ChoiceDefinition) -> Vec<String> {
    choice.active_values().map(|v| v.code().to_string()).collect()
}

fn resolve_choice(choice: &ChoiceDefinition, raw: &str) -> CellResult<String> {
    choice
        .parse_choice_value(raw)
        .or_else(|| choice.lookup_by_display_value(raw))
        .map(|v| v.code().to_string())
        .ok_or_else(|| format!("'{}' is not a value of '{}'", raw, choice.name()))
}

fn parse_timestamp(text: &str) -> CellResult<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(t.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| format!("'{}' is not a date", text))
}
