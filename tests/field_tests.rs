use pretty_assertions::assert_eq;
use propmapdb::choice::{ChoiceDefinition, ChoiceValue};
use propmapdb::field::{EncryptionMode, FieldDefinition, FieldInstance, ReversibleCipher};
use propmapdb::{EngineConfig, EngineError, ValidationFailure, Value};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

fn config() -> EngineConfig {
    EngineConfig::new().bcrypt_cost(4)
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn colours() -> Arc<ChoiceDefinition> {
    let mut builder = ChoiceDefinition::builder("colour", 3);
    builder
        .add_choice_value(ChoiceValue::new("RED", "Red"))
        .unwrap()
        .add_choice_value(ChoiceValue::new("GRN", "Green"))
        .unwrap()
        .add_choice_value(ChoiceValue::new("BLU", "Blue"))
        .unwrap()
        .add_choice_value(ChoiceValue::new("GRY", "Grey").inactive())
        .unwrap();
    Arc::new(builder.build().unwrap())
}

/// Reverses the text behind a fixed marker.
#[derive(Debug)]
struct MirrorCipher;

impl ReversibleCipher for MirrorCipher {
    fn encrypt(&self, plain: &str) -> propmapdb::Result<String> {
        Ok(format!("enc:{}", plain.chars().rev().collect::<String>()))
    }

    fn decrypt(&self, stored: &str) -> propmapdb::Result<String> {
        stored
            .strip_prefix("enc:")
            .map(|s| s.chars().rev().collect())
            .ok_or_else(|| EngineError::TypeMismatch("not encrypted".to_string()))
    }
}

#[test]
fn test_decimal_is_padded_to_scale() {
    let field = FieldDefinition::decimal("amount", "Amount", 5, 2);
    let mut slot = field.initiate_field_instance();

    assert!(field.set_value(&mut slot, dec("123.4").into(), &config()).unwrap());
    assert_eq!(slot.as_decimal().unwrap().to_string(), "123.40");
}

#[test]
fn test_decimal_scale_violation_names_the_value() {
    let field = FieldDefinition::decimal("amount", "Amount", 5, 2);
    let mut slot = field.initiate_field_instance();
    field.set_value(&mut slot, dec("1.00").into(), &config()).unwrap();

    let err = field.set_value(&mut slot, dec("123.456").into(), &config()).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation {
            failure: ValidationFailure::Scale { scale: 2, .. },
            ..
        }
    ));
    assert!(err.to_string().contains("123.456"));

    // Rejected writes leave the slot alone
    assert_eq!(slot.as_decimal(), Some(dec("1.00")));
}

#[test]
fn test_decimal_precision_violation() {
    let field = FieldDefinition::decimal("amount", "Amount", 5, 2);
    let mut slot = field.initiate_field_instance();
    let err = field.set_value(&mut slot, dec("1234.5").into(), &config()).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation {
            failure: ValidationFailure::Precision { integer_digits: 3, .. },
            ..
        }
    ));
}

#[test]
fn test_multi_choice_canonical_round_trip() {
    let field = FieldDefinition::multi_choice("colours", "Colours", colours());
    let config = config();

    let mut first = field.initiate_field_instance();
    field.set_choices(&mut first, ["RED", "BLU", "GRN"], &config).unwrap();
    let mut second = field.initiate_field_instance();
    field.set_choices(&mut second, ["GRN", "RED", "BLU"], &config).unwrap();

    let stored = field.storage_string(&first, &config).unwrap();
    assert_eq!(stored, "BLU|GRN|RED");
    assert_eq!(field.storage_string(&second, &config).unwrap(), stored);

    let mut reloaded = field.initiate_field_instance();
    assert!(field.load_new_storage_string(&mut reloaded, &stored, &config).unwrap());
    assert_eq!(reloaded, first);

    // Loading the same string again is not a change
    assert!(!field.load_new_storage_string(&mut reloaded, "RED|GRN|BLU", &config).unwrap());
}

#[test]
fn test_multi_choice_keeps_selected_inactive_codes() {
    let field = FieldDefinition::multi_choice("colours", "Colours", colours());
    let config = config();

    // An inactive code cannot be newly selected
    let mut slot = field.initiate_field_instance();
    assert!(field.set_choices(&mut slot, ["GRY"], &config).is_err());

    // but survives when it was already there
    let mut slot = FieldInstance::MultiChoice(BTreeSet::from(["GRY".to_string()]));
    assert!(field.set_choices(&mut slot, ["GRY", "RED"], &config).unwrap());
    assert!(field.set_choices(&mut slot, ["NOPE"], &config).is_err());
}

#[test]
fn test_empty_multi_choice_reads_null() {
    let field = FieldDefinition::multi_choice("colours", "Colours", colours());
    let slot = field.initiate_field_instance();
    assert_eq!(field.value(&slot, &config()).unwrap(), Value::Null);
}

#[test]
fn test_one_way_secret() {
    let field = FieldDefinition::encrypted("pin", "PIN", 8, EncryptionMode::OneWay);
    let config = config();
    let mut slot = field.initiate_field_instance();

    assert!(field.set_value(&mut slot, "4711".into(), &config).unwrap());
    assert_eq!(field.value(&slot, &config).unwrap(), Value::Null);
    assert!(field.verify_secret(&slot, "4711", &config).unwrap());
    assert!(!field.verify_secret(&slot, "0000", &config).unwrap());

    // Same clear value: verified against the hash, no rewrite
    assert!(!field.set_value(&mut slot, "4711".into(), &config).unwrap());
    assert!(field.set_value(&mut slot, "0815".into(), &config).unwrap());
}

#[test]
fn test_reversible_secret_with_cipher() {
    let field = FieldDefinition::encrypted("iban", "IBAN", 34, EncryptionMode::Reversible);
    let config = config().cipher(Arc::new(MirrorCipher));
    field.check(&config).unwrap();

    let mut slot = field.initiate_field_instance();
    field.set_value(&mut slot, "DE44".into(), &config).unwrap();
    assert_eq!(slot, FieldInstance::Encrypted(Some("enc:44ED".to_string())));
    assert_eq!(field.value(&slot, &config).unwrap(), Value::from("DE44"));
}

#[test]
fn test_text_and_type_validation() {
    let field = FieldDefinition::text("code", "Code", 3);
    let mut slot = field.initiate_field_instance();

    assert!(field.set_value(&mut slot, "abcd".into(), &config()).is_err());
    let err = field.set_value(&mut slot, Value::Integer(7), &config()).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation {
            failure: ValidationFailure::WrongType { expected: "TEXT", actual: "INTEGER" },
            ..
        }
    ));

    field.set_value(&mut slot, "abc".into(), &config()).unwrap();
    assert!(field.set_value(&mut slot, Value::Null, &config()).unwrap());
    assert!(slot.is_blank());
}

#[test]
fn test_time_period_field() {
    let field = FieldDefinition::time_period("period", "Period");
    let mut slot = field.initiate_field_instance();
    field.set_value(&mut slot, "2024Q3".into(), &config()).unwrap();
    assert_eq!(field.value(&slot, &config()).unwrap(), Value::from("2024Q3"));
    assert!(field.set_value(&mut slot, "2024Q9".into(), &config()).is_err());
}
