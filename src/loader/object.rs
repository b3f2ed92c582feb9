use super::{LoaderCell, LoaderFieldSample, LoaderMode};
use crate::core::{EngineError, Result, Value};
use crate::element::ElementDefinition;
use crate::object::{ObjectDefinition, ObjectInstance, Slot};
use crate::trigger::UnitOfWork;
use log::warn;
use std::sync::Arc;

impl ObjectInstance {
    /// Loads one cell into the column at `path` (`field`, `property.field`
    /// or a loader alias) and reports whether the payload changed.
    ///
    /// Loads go through the computed path: read-only columns accept them
    /// and changed slots fire their triggers.
    pub fn load(&mut self, uow: &mut UnitOfWork<'_>, path: &str, cell: &LoaderCell) -> Result<bool> {
        let definition = Arc::clone(self.definition());
        let name = definition.resolve_path(path)?;
        let info = definition.slot(name)?;
        let field = definition.field_definition(info.slot);
        let config = definition.config();

        let message = match field.parse_cell(cell, config) {
            Ok(value) => {
                if field.matches_loaded(self.payload().slot(info.slot), &value, config) {
                    return Ok(false);
                }
                match self.write(uow, name, false, |f, slot, c| f.set_value(slot, value, c)) {
                    Ok(changed) => return Ok(changed),
                    Err(
                        err @ (EngineError::Validation { .. }
                        | EngineError::InvalidTransition { .. }),
                    ) => err.to_string(),
                    Err(err) => return Err(err),
                }
            }
            Err(message) => message,
        };

        match field.loader_mode(config) {
            LoaderMode::Strict => Err(EngineError::Load {
                field: name.to_string(),
                object: definition.name().to_string(),
                raw: cell.to_string(),
                message,
            }),
            LoaderMode::Lenient => {
                warn!(
                    "Lenient load of '{}' on '{}' ignored '{}': {}",
                    name,
                    definition.name(),
                    cell,
                    message
                );
                let fallback = definition.initial_slot_value(info.slot);
                self.write(uow, name, false, |_, slot, _| {
                    if *slot == fallback {
                        return Ok(false);
                    }
                    *slot = fallback;
                    Ok(true)
                })
            }
        }
    }

    /// Loads a whole flat-file row, then checks multi-field constraints.
    ///
    /// Returns how many columns changed.
    pub fn load_row(&mut self, uow: &mut UnitOfWork<'_>, cells: &[(&str, LoaderCell)]) -> Result<usize> {
        let mut changed = 0;
        for (path, cell) in cells {
            if self.load(uow, path, cell)? {
                changed += 1;
            }
        }
        self.check_constraints()?;
        Ok(changed)
    }

    /// Cell content of the column at `path`, and whether it needs a number
    /// or date format. External fields export their borrowed value.
    pub fn put_content_in_cell(&self, path: &str) -> Result<(LoaderCell, bool)> {
        let definition = self.definition();
        match definition.resolve_path(path) {
            Ok(name) => {
                let info = definition.slot(name)?;
                definition
                    .field_definition(info.slot)
                    .format_cell(self.payload().slot(info.slot), definition.config())
            }
            Err(err) => match definition.external(path) {
                Ok(_) => Ok(cell_from_value(self.get(path)?)),
                Err(_) => Err(err),
            },
        }
    }
}

fn cell_from_value(value: Value) -> (LoaderCell, bool) {
    match value {
        Value::Null | Value::Binary(_) => (LoaderCell::Empty, false),
        Value::Text(text) => (LoaderCell::Text(text), false),
        Value::Integer(i) => (LoaderCell::Integer(i), false),
        Value::Decimal(d) => (LoaderCell::Decimal(d), true),
        Value::Timestamp(t) => (LoaderCell::Timestamp(t), true),
    }
}

impl ObjectDefinition {
    /// One sample per stored column, in row order.
    pub fn loader_samples(&self) -> Vec<LoaderFieldSample> {
        self.slots()
            .iter()
            .map(|(name, info)| {
                let path = match info.slot {
                    Slot::Field(_) => name.clone(),
                    Slot::Property { property, .. } => {
                        format!("{}.{}", self.properties()[property].name(), name)
                    }
                };
                self.field_definition(info.slot)
                    .loader_field_sample(&path, self.config())
            })
            .collect()
    }
}

/// Loader documentation as pretty JSON.
pub fn samples_to_json(samples: &[LoaderFieldSample]) -> Result<String> {
    Ok(serde_json::to_string_pretty(samples)?)
}
