use lazy_static::lazy_static;
use regex::Regex;

/// Suffix of the secondary column mirroring a searchable text field.
pub const SEARCH_COLUMN_SUFFIX: &str = "_search";

lazy_static! {
    static ref NON_SEARCHABLE: Regex = Regex::new(r"[^\p{L}\p{N}]+").expect("static regex");
}

/// Lower-cases the text and collapses every run of punctuation or
/// whitespace into a single space.
pub fn search_normalize(text: &str) -> String {
    NON_SEARCHABLE
        .replace_all(&text.to_lowercase(), " ")
        .trim()
        .to_string()
}

pub fn search_column_name(field: &str) -> String {
    format!("{}{}", field, SEARCH_COLUMN_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_normalize() {
        assert_eq!(search_normalize("  ACME-Corp., Ltd "), "acme corp ltd");
        assert_eq!(search_normalize("Élan #42"), "élan 42");
        assert_eq!(search_normalize("---"), "");
    }
}
