use pretty_assertions::assert_eq;
use propmapdb::choice::{ChoiceDefinition, ChoiceValue, TransitionChoiceDefinition};
use propmapdb::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

fn config() -> Arc<EngineConfig> {
    Arc::new(EngineConfig::new().bcrypt_cost(4))
}

fn ticket_workflow() -> Arc<TransitionChoiceDefinition> {
    let mut builder = ChoiceDefinition::builder("ticket_state", 4);
    builder
        .add_choice_value(ChoiceValue::new("NEW", "New"))
        .unwrap()
        .add_choice_value(ChoiceValue::new("WORK", "In progress"))
        .unwrap()
        .add_choice_value(ChoiceValue::new("DONE", "Done"))
        .unwrap();
    builder.add_transition("NEW", "WORK").unwrap();
    builder.add_transition("WORK", "DONE").unwrap();
    builder
        .final_value("DONE")
        .default_working("NEW")
        .default_final("DONE");
    Arc::new(builder.build_workflow().unwrap())
}

fn customer() -> ObjectDefinitionBuilder {
    ObjectDefinitionBuilder::new("customer", "crm")
        .display_name("Customer")
        .field(FieldDefinition::text("city", "City", 40).searchable().indexed().priority(10))
        .field(FieldDefinition::decimal("credit_limit", "Credit limit", 9, 2).priority(5))
        .property(PropertyDefinition::named())
        .property(PropertyDefinition::numbered())
        .property(PropertyDefinition::creation_log())
}

fn registry(builders: Vec<ObjectDefinitionBuilder>) -> DefinitionRegistry {
    DefinitionRegistry::build_with_config(builders, config()).unwrap()
}

#[test]
fn test_schema_layout() {
    let registry = registry(vec![customer()]);
    let customer = registry.get("customer").unwrap();

    let columns: Vec<&str> = customer.schema().columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        columns,
        vec![
            "id",
            "city",
            "city_search",
            "credit_limit",
            "name",
            "name_search",
            "number",
            "created_on",
            "created_by",
        ]
    );

    let indexes: Vec<(&str, bool)> = customer
        .schema()
        .indexes()
        .iter()
        .map(|i| (i.name.as_str(), i.unique))
        .collect();
    assert_eq!(
        indexes,
        vec![
            ("customer_id_idx", true),
            ("customer_city_idx", false),
            ("customer_name_idx", false),
            ("customer_number_idx", true),
        ]
    );
}

#[test]
fn test_duplicate_column_is_composition_error() {
    let builder = customer().field(FieldDefinition::text("name", "Name", 10));
    let err = DefinitionRegistry::build_with_config(vec![builder], config()).unwrap_err();
    assert!(matches!(err, EngineError::Composition(_)));
    assert!(err.is_programming_error());
}

#[test]
fn test_unknown_trigger_is_composition_error() {
    let builder = ObjectDefinitionBuilder::new("note", "crm")
        .field(FieldDefinition::text("body", "Body", 200).on_change("reindex"));
    let err = DefinitionRegistry::build_with_config(vec![builder], config()).unwrap_err();
    assert!(err.to_string().contains("reindex"));
}

#[test]
fn test_registry_is_copy_on_write() {
    let first = registry(vec![customer()]);
    let second = first
        .with_definitions(
            vec![ObjectDefinitionBuilder::new("note", "crm").field(FieldDefinition::text("body", "Body", 200))],
            config(),
        )
        .unwrap();

    assert_eq!(first.names(), vec!["customer"]);
    assert_eq!(second.names(), vec!["customer", "note"]);
    assert!(Arc::ptr_eq(first.get("customer").unwrap(), second.get("customer").unwrap()));

    // Names stay unique across the chain
    assert!(second.with_definitions(vec![customer()], config()).is_err());
}

#[test]
fn test_insert_and_fetch_round_trip() {
    let registry = registry(vec![customer()]);
    let mut storage = InMemoryStorage::new();
    registry.provision(&mut storage).unwrap();
    let definition = Arc::clone(registry.get("customer").unwrap());
    let engine_config = EngineConfig::new();

    let mut acme = definition.new_instance();
    UnitOfWork::run(&mut storage, &engine_config, |uow| {
        acme.set_value(uow, "name", "ACME Corp.")?;
        acme.set_value(uow, "number", 1001i64)?;
        acme.set_value(uow, "city", "Lyon")?;
        acme.set_value(uow, "credit_limit", Decimal::new(25, 1))?;
        uow.insert(&mut acme)
    })
    .unwrap();
    assert!(acme.is_persisted());

    let row = storage.fetch_row("customer", &acme.id().to_string()).unwrap().unwrap();
    assert_eq!(row[5], Value::from("acme corp"));

    let stored = definition.fetch(&storage, &acme.id()).unwrap().unwrap();
    assert_eq!(stored.id(), acme.id());
    assert_eq!(stored.get("name").unwrap(), Value::from("ACME Corp."));
    assert_eq!(stored.get("number").unwrap(), Value::Integer(1001));
    assert_eq!(
        stored.field_instance("credit_limit").unwrap().as_decimal().unwrap().to_string(),
        "2.50"
    );
    // Stamped at insert
    assert!(!stored.get("created_on").unwrap().is_null());
    assert!(stored.is_persisted());
}

#[test]
fn test_unique_number_rejected_by_storage() {
    let registry = registry(vec![customer()]);
    let mut storage = InMemoryStorage::new();
    registry.provision(&mut storage).unwrap();
    let definition = registry.get("customer").unwrap();
    let engine_config = EngineConfig::new();

    let mut first = definition.new_instance();
    let mut second = definition.new_instance();
    let result = UnitOfWork::run(&mut storage, &engine_config, |uow| {
        first.set_value(uow, "name", "First")?;
        first.set_value(uow, "number", 7i64)?;
        second.set_value(uow, "name", "Second")?;
        second.set_value(uow, "number", 7i64)?;
        uow.insert(&mut first)?;
        uow.insert(&mut second)
    });

    assert!(matches!(result, Err(EngineError::Storage(_))));
    assert_eq!(storage.row_count("customer").unwrap(), 1);
}

#[test]
fn test_mandatory_field_blocks_insert() {
    let registry = registry(vec![customer()]);
    let mut storage = InMemoryStorage::new();
    registry.provision(&mut storage).unwrap();
    let mut nameless = registry.get("customer").unwrap().new_instance();
    let engine_config = EngineConfig::new();

    let err = UnitOfWork::run(&mut storage, &engine_config, |uow| uow.insert(&mut nameless)).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation {
            ref field,
            failure: ValidationFailure::Mandatory,
        } if field == "name"
    ));
    assert_eq!(storage.row_count("customer").unwrap(), 0);
    assert!(!nameless.is_persisted());
}

#[test]
fn test_read_only_field_refuses_caller_writes() {
    let registry = registry(vec![customer()]);
    let mut storage = InMemoryStorage::new();
    let mut acme = registry.get("customer").unwrap().new_instance();
    let engine_config = EngineConfig::new();
    let mut uow = UnitOfWork::new(&mut storage, &engine_config);

    let err = acme.set_value(&mut uow, "created_by", "mallory").unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation {
            failure: ValidationFailure::ReadOnly,
            ..
        }
    ));
    assert!(acme.set_computed_value(&mut uow, "created_by", "importer").unwrap());
    assert_eq!(acme.get("created_by").unwrap(), Value::from("importer"));
}

#[test]
fn test_failed_write_leaves_payload_unchanged() {
    let registry = registry(vec![customer()]);
    let mut storage = InMemoryStorage::new();
    let mut acme = registry.get("customer").unwrap().new_instance();
    let engine_config = EngineConfig::new();
    let mut uow = UnitOfWork::new(&mut storage, &engine_config);

    acme.set_value(&mut uow, "city", "Lyon").unwrap();
    let before = acme.payload().clone();
    assert!(acme.set_value(&mut uow, "city", "x".repeat(41)).is_err());
    assert!(acme.set_value(&mut uow, "nowhere", "x").is_err());
    assert_eq!(acme.payload(), &before);
}

#[test]
fn test_lifecycle_property() {
    let builder = ObjectDefinitionBuilder::new("ticket", "helpdesk")
        .field(FieldDefinition::text("subject", "Subject", 80))
        .property(PropertyDefinition::lifecycle(ticket_workflow()));
    let registry = registry(vec![builder]);
    let mut storage = InMemoryStorage::new();
    let engine_config = EngineConfig::new();
    let mut ticket = registry.get("ticket").unwrap().new_instance();
    let mut uow = UnitOfWork::new(&mut storage, &engine_config);

    // 1. Starts on the default working state
    assert_eq!(ticket.get("state").unwrap(), Value::from("NEW"));
    assert!(!ticket.is_final());

    // 2. Only authorised moves
    let err = ticket.set_value(&mut uow, "state", "DONE").unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
    ticket.set_value(&mut uow, "state", "WORK").unwrap();
    ticket.set_value(&mut uow, "state", "DONE").unwrap();
    assert!(ticket.is_final());
}

#[test]
fn test_lifecycle_state_cannot_be_cleared_to_skip_transitions() {
    let builder = ObjectDefinitionBuilder::new("ticket", "helpdesk")
        .property(PropertyDefinition::lifecycle(ticket_workflow()));
    let registry = registry(vec![builder]);
    let mut storage = InMemoryStorage::new();
    let engine_config = EngineConfig::new();
    let mut ticket = registry.get("ticket").unwrap().new_instance();
    let mut uow = UnitOfWork::new(&mut storage, &engine_config);

    let err = ticket.set_value(&mut uow, "state", Value::Null).unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { ref from, .. } if from == "NEW"));
    assert_eq!(ticket.get("state").unwrap(), Value::from("NEW"));

    // The graph still applies afterwards
    assert!(ticket.set_value(&mut uow, "state", "DONE").is_err());
    assert!(!ticket.is_final());
}

#[test]
fn test_display_order_profiles_and_legacy() {
    let person = ObjectDefinitionBuilder::new("person", "crm")
        .field(FieldDefinition::text("full_name", "Full name", 80));
    let task = ObjectDefinitionBuilder::new("task", "crm")
        .field(FieldDefinition::text("title", "Title", 80).priority(100))
        .field(FieldDefinition::text("notes", "Notes", 400).priority(-5))
        .property(
            PropertyDefinition::generic("old", "Old")
                .field(FieldDefinition::text("old_code", "Old code", 8).priority(500))
                .legacy(),
        )
        .property(
            PropertyDefinition::generic("assignment", "Assignment")
                .field(FieldDefinition::text("assignee_id", "Assignee", 36).priority(20))
                .external(
                    JoinQueryConditionDefinition::new("assignee_id", "person"),
                    ExternalFieldDefinition::new("assignee_name", "Assignee name", "full_name").priority(50),
                ),
        )
        .display_profile(DisplayProfile::new("compact").hide("assignee_name"));
    let registry = registry(vec![person, task]);
    let task = registry.get("task").unwrap().new_instance();

    let names = |profiles: &[&str]| -> Vec<String> {
        task.display_elements(profiles)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect()
    };
    assert_eq!(names(&[]), vec!["title", "assignee_name", "assignee_id", "notes"]);
    assert_eq!(names(&["compact"]), vec!["title", "assignee_id", "notes"]);
    assert!(task.display_elements(&["wide"]).is_err());

    let elements = task.display_elements(&[]).unwrap();
    assert_eq!(elements[1].property.as_deref(), Some("assignment"));
    assert_eq!(elements[0].property, None);
    assert!(propmapdb::object::display::to_json(&elements).unwrap().contains("\"assignee_name\""));
}

#[test]
fn test_display_payloads() {
    let builder = ObjectDefinitionBuilder::new("account", "crm")
        .field(FieldDefinition::text("login", "Login", 20).priority(10))
        .field(FieldDefinition::encrypted("password", "Password", 32, EncryptionMode::OneWay))
        .property(PropertyDefinition::lifecycle(ticket_workflow()));
    let registry = registry(vec![builder]);
    let mut storage = InMemoryStorage::new();
    let engine_config = EngineConfig::new();
    let mut account = registry.get("account").unwrap().new_instance();
    let mut uow = UnitOfWork::new(&mut storage, &engine_config);
    account.set_value(&mut uow, "login", "jdoe").unwrap();
    account.set_value(&mut uow, "password", "hunter2").unwrap();

    let elements = account.display_elements(&[]).unwrap();
    let payload = |name: &str| elements.iter().find(|e| e.name == name).unwrap().payload.clone();
    assert_eq!(payload("login"), ElementPayload::Text("jdoe".to_string()));
    assert_eq!(payload("password"), ElementPayload::Empty);
    assert_eq!(
        payload("state"),
        ElementPayload::Choice(ChoiceRef {
            code: "NEW".to_string(),
            display: "New".to_string(),
        })
    );
    assert!(account.verify_secret("password", "hunter2").unwrap());
}

#[test]
fn test_provision_adds_new_columns() {
    let mut storage = InMemoryStorage::new();
    let v1 = registry(vec![
        ObjectDefinitionBuilder::new("note", "crm").field(FieldDefinition::text("body", "Body", 200)),
    ]);
    assert_eq!(v1.provision(&mut storage).unwrap(), 1);

    let v2 = registry(vec![
        ObjectDefinitionBuilder::new("note", "crm")
            .field(FieldDefinition::text("body", "Body", 200))
            .field(FieldDefinition::text("tag", "Tag", 20).indexed()),
    ]);
    // one column plus its index
    assert_eq!(v2.provision(&mut storage).unwrap(), 2);
    assert_eq!(v2.provision(&mut storage).unwrap(), 0);
    assert!(storage.column_exists("note", "tag"));
}

#[test]
fn test_delete_removes_row() {
    let registry = registry(vec![customer()]);
    let mut storage = InMemoryStorage::new();
    registry.provision(&mut storage).unwrap();
    let definition = registry.get("customer").unwrap();
    let engine_config = EngineConfig::new();

    let mut rows = vec![definition.new_instance(), definition.new_instance()];
    UnitOfWork::run(&mut storage, &engine_config, |uow| {
        for (i, row) in rows.iter_mut().enumerate() {
            row.set_value(uow, "name", format!("Customer {}", i))?;
        }
        uow.insert_batch(&mut rows)
    })
    .unwrap();
    assert_eq!(storage.row_count("customer").unwrap(), 2);

    UnitOfWork::run(&mut storage, &engine_config, |uow| uow.delete(&rows[0])).unwrap();
    assert_eq!(storage.row_count("customer").unwrap(), 1);
    assert!(definition.fetch(&storage, &rows[0].id()).unwrap().is_none());
}
