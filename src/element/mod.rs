//! Shape shared by field and property definitions.
//!
//! A definition only describes storage: the columns it contributes, the
//! indexes over them and the triggers fired when it changes. Live values
//! never sit on a definition, they are created per payload through the
//! definition's `initiate_*_instance` factory.

use crate::core::{Column, IndexSchema};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ELEMENT_NAME: Regex = Regex::new(r"^[a-z][a-z0-9_]*$").expect("static regex");
}

/// Longest element or column name accepted by the engine.
pub const MAX_ELEMENT_NAME_LEN: usize = 48;

pub trait ElementDefinition: Send + Sync {
    /// Name unique among the elements of one object definition.
    fn name(&self) -> &str;

    /// Stored columns, in row order.
    fn columns(&self) -> Vec<Column>;

    /// Storage indexes over this element's own columns.
    fn indexes(&self, table: &str) -> Vec<IndexSchema>;

    /// Names of the triggers fired when one of the element's values changes.
    fn triggers(&self) -> &[String];

    fn column_count(&self) -> usize {
        self.columns().len()
    }
}

/// Lower snake case, starting with a letter.
pub fn is_valid_element_name(name: &str) -> bool {
    name.len() <= MAX_ELEMENT_NAME_LEN && ELEMENT_NAME.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_names() {
        assert!(is_valid_element_name("amount"));
        assert!(is_valid_element_name("created_on2"));
        assert!(!is_valid_element_name("Amount"));
        assert!(!is_valid_element_name("2nd"));
        assert!(!is_valid_element_name("with space"));
        assert!(!is_valid_element_name(&"x".repeat(49)));
    }
}
