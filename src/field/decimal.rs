use crate::core::{EngineError, Result, ValidationFailure};
use rust_decimal::Decimal;

/// Fits `value` into a DECIMAL(precision, scale) column.
///
/// Trailing zeros are stripped before the checks, so `1.500` fits a scale
/// of 2; the result is always re-padded to exactly `scale` places.
pub fn fit_to_scale(field: &str, value: Decimal, precision: u32, scale: u32) -> Result<Decimal> {
    let normalized = value.normalize();

    if normalized.scale() > scale {
        return Err(EngineError::validation(
            field,
            ValidationFailure::Scale {
                value: value.to_string(),
                scale,
            },
        ));
    }

    let integer_digits = precision.saturating_sub(scale);
    if count_integer_digits(&normalized) > integer_digits {
        return Err(EngineError::validation(
            field,
            ValidationFailure::Precision {
                value: value.to_string(),
                precision,
                integer_digits,
            },
        ));
    }

    let mut fitted = normalized;
    fitted.rescale(scale);
    Ok(fitted)
}

fn count_integer_digits(value: &Decimal) -> u32 {
    let integer_part = value.abs().trunc();
    if integer_part.is_zero() {
        0
    } else {
        integer_part.to_string().len() as u32
    }
}

/// Equality at the declared scale; unscaled input compares as if fitted.
///
/// A value needing more than `scale` places never compares equal, so it
/// still reaches the scale check.
pub fn equal_at_scale(a: &Decimal, b: &Decimal, scale: u32) -> bool {
    a.normalize().scale() <= scale && b.normalize().scale() <= scale && a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_pads_to_scale() {
        let fitted = fit_to_scale("total", dec("123.4"), 5, 2).unwrap();
        assert_eq!(fitted.to_string(), "123.40");
        assert_eq!(fitted.scale(), 2);
    }

    #[test]
    fn test_scale_overflow_echoes_value() {
        let err = fit_to_scale("total", dec("123.456"), 5, 2).unwrap_err();
        assert!(err.to_string().contains("123.456"));
        assert!(matches!(
            err,
            EngineError::Validation {
                failure: ValidationFailure::Scale { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_precision_overflow() {
        let err = fit_to_scale("total", dec("1234.5"), 5, 2).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation {
                failure: ValidationFailure::Precision { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_equal_at_scale() {
        assert!(equal_at_scale(&dec("12.50"), &dec("12.5"), 2));
        assert!(equal_at_scale(&dec("12.50"), &dec("12.5000"), 2));
        assert!(!equal_at_scale(&dec("12.34"), &dec("12.345"), 2));
        assert!(!equal_at_scale(&dec("12.34"), &dec("12.35"), 2));
    }

    #[test]
    fn test_trailing_zeros_are_not_counted() {
        let fitted = fit_to_scale("total", dec("12.5000"), 5, 2).unwrap();
        assert_eq!(fitted.to_string(), "12.50");
        let negative = fit_to_scale("total", dec("-999.99"), 5, 2).unwrap();
        assert_eq!(negative.to_string(), "-999.99");
    }
}
