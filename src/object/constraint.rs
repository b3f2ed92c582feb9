use crate::core::{EngineError, Result};

/// Allow-list over the joint values of several choice fields.
///
/// Each permitted row holds one cell per member field; an empty cell
/// matches any value of that field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiFieldConstraint {
    name: String,
    fields: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl MultiFieldConstraint {
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Adds a permitted combination; `""` is a wildcard cell.
    pub fn permit<'a>(mut self, row: impl IntoIterator<Item = &'a str>) -> Self {
        self.rows.push(
            row.into_iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect(),
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    /// Passes when at least one permitted row matches `values`, given in
    /// member order.
    pub fn check_combination(&self, values: &[Option<&str>]) -> Result<()> {
        let matches = |row: &Vec<Option<String>>| {
            row.iter()
                .zip(values)
                .all(|(cell, value)| match cell {
                    None => true,
                    Some(cell) => *value == Some(cell.as_str()),
                })
        };
        if self.rows.iter().any(matches) {
            return Ok(());
        }

        let values = self
            .fields
            .iter()
            .zip(values)
            .map(|(field, value)| format!("{}={}", field, value.unwrap_or("<empty>")))
            .collect::<Vec<_>>()
            .join(", ");
        Err(EngineError::CombinationNotPermitted {
            constraint: self.name.clone(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraint() -> MultiFieldConstraint {
        MultiFieldConstraint::new("vehicle", ["kind", "fuel"])
            .permit(["CAR", "PETROL"])
            .permit(["CAR", "DIESEL"])
            .permit(["BIKE", ""])
    }

    #[test]
    fn test_exact_row_matches() {
        assert!(constraint().check_combination(&[Some("CAR"), Some("DIESEL")]).is_ok());
    }

    #[test]
    fn test_wildcard_cell() {
        let c = constraint();
        assert!(c.check_combination(&[Some("BIKE"), Some("PETROL")]).is_ok());
        assert!(c.check_combination(&[Some("BIKE"), None]).is_ok());
    }

    #[test]
    fn test_no_match_lists_values() {
        let err = constraint()
            .check_combination(&[Some("CAR"), None])
            .unwrap_err();
        match err {
            EngineError::CombinationNotPermitted { constraint, values } => {
                assert_eq!(constraint, "vehicle");
                assert_eq!(values, "kind=CAR, fuel=<empty>");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
