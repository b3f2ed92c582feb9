use std::collections::BTreeSet;

/// Canonical storage form of a multi-value choice: sorted codes joined by
/// the separator. Two sets holding the same codes always produce the same
/// string, whatever order they were selected in.
pub fn storage_string(codes: &BTreeSet<String>, separator: char) -> String {
    let mut out = String::new();
    for (idx, code) in codes.iter().enumerate() {
        if idx > 0 {
            out.push(separator);
        }
        out.push_str(code);
    }
    out
}

pub fn parse_storage_string(stored: &str, separator: char) -> BTreeSet<String> {
    stored
        .split(separator)
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}

/// Widest storage string a set drawn from `codes` can produce.
pub fn storage_width<'a>(codes: impl Iterator<Item = &'a str>) -> usize {
    let (count, total) = codes.fold((0usize, 0usize), |(count, total), code| {
        (count + 1, total + code.len())
    });
    total + count.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_independent() {
        let a: BTreeSet<String> = ["RED", "BLU", "GRN"].iter().map(|s| s.to_string()).collect();
        let b: BTreeSet<String> = ["GRN", "RED", "BLU"].iter().map(|s| s.to_string()).collect();
        assert_eq!(storage_string(&a, '|'), "BLU|GRN|RED");
        assert_eq!(storage_string(&a, '|'), storage_string(&b, '|'));
        assert_eq!(parse_storage_string("BLU|GRN|RED", '|'), a);
    }

    #[test]
    fn test_empty_segments_ignored() {
        assert!(parse_storage_string("", '|').is_empty());
        assert_eq!(parse_storage_string("|A||B|", '|').len(), 2);
    }

    #[test]
    fn test_width() {
        assert_eq!(storage_width(["AA", "BBB", "C"].into_iter()), 8);
        assert_eq!(storage_width(std::iter::empty()), 0);
    }
}
