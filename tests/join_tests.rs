use pretty_assertions::assert_eq;
use propmapdb::prelude::*;
use std::sync::Arc;

fn country() -> ObjectDefinitionBuilder {
    ObjectDefinitionBuilder::new("country", "geo")
        .field(FieldDefinition::text("code", "Code", 2).unique())
        .field(FieldDefinition::text("label", "Label", 40))
        .field(FieldDefinition::text("region", "Region", 20))
}

fn customer() -> ObjectDefinitionBuilder {
    let home = || JoinQueryConditionDefinition::new("country_id", "country");
    let billing = || JoinQueryConditionDefinition::new("billing_country_id", "country");
    ObjectDefinitionBuilder::new("customer", "crm")
        .property(PropertyDefinition::named())
        .property(
            PropertyDefinition::generic("address", "Address")
                .field(FieldDefinition::text("country_id", "Country", 36).indexed())
                .external(home(), ExternalFieldDefinition::new("country_label", "Country", "label"))
                .external(home(), ExternalFieldDefinition::new("country_region", "Region", "region")),
        )
        .property(
            PropertyDefinition::generic("billing", "Billing")
                .field(FieldDefinition::text("billing_country_id", "Billing country", 36))
                .external(billing(), ExternalFieldDefinition::new("billing_label", "Billing country", "label")),
        )
        .property(
            PropertyDefinition::generic("shipping", "Shipping")
                .external(home(), ExternalFieldDefinition::new("shipping_region", "Shipping region", "region")),
        )
}

fn registry() -> DefinitionRegistry {
    DefinitionRegistry::build_with_config(vec![country(), customer()], Arc::new(EngineConfig::new())).unwrap()
}

#[test]
fn test_fields_sharing_a_condition_share_one_bucket() {
    let registry = registry();
    let customer = registry.get("customer").unwrap();
    let address = customer.property("address").unwrap();

    assert_eq!(address.buckets().len(), 1);
    assert_eq!(address.buckets()[0].fields().len(), 2);
}

#[test]
fn test_one_join_per_distinct_condition() {
    let registry = registry();
    let customer = registry.get("customer").unwrap();
    let (query, aliases) = customer.build_query();

    // address and shipping join on the same key, billing on another
    assert_eq!(query.joins().len(), 2);
    query.validate().unwrap();
    assert_eq!(aliases[0], Vec::<String>::new());
    assert_eq!(aliases[1].len(), 1);
    assert_eq!(aliases[1], aliases[3]);
    assert_ne!(aliases[1], aliases[2]);
}

#[test]
fn test_unknown_remote_object() {
    let orphan = ObjectDefinitionBuilder::new("order", "sales").property(
        PropertyDefinition::generic("owner", "Owner")
            .field(FieldDefinition::text("owner_id", "Owner", 36))
            .external(
                JoinQueryConditionDefinition::new("owner_id", "person"),
                ExternalFieldDefinition::new("owner_name", "Owner", "name"),
            ),
    );
    let err = DefinitionRegistry::build_with_config(vec![orphan], Arc::new(EngineConfig::new())).unwrap_err();
    assert!(matches!(err, EngineError::ObjectNotFound(ref name) if name == "person"));
}

#[test]
fn test_unknown_join_column_is_composition_error() {
    let broken = ObjectDefinitionBuilder::new("order", "sales").property(
        PropertyDefinition::generic("owner", "Owner").external(
            JoinQueryConditionDefinition::new("owner_id", "country"),
            ExternalFieldDefinition::new("owner_country", "Country", "label"),
        ),
    );
    let err = DefinitionRegistry::build_with_config(vec![country(), broken], Arc::new(EngineConfig::new()))
        .unwrap_err();
    assert!(matches!(err, EngineError::Composition(_)));
}

#[test]
fn test_fetch_with_externals() {
    let registry = registry();
    let mut storage = InMemoryStorage::new();
    registry.provision(&mut storage).unwrap();
    let config = EngineConfig::new();

    let mut france = registry.get("country").unwrap().new_instance();
    let mut linked = registry.get("customer").unwrap().new_instance();
    let mut unlinked = registry.get("customer").unwrap().new_instance();

    UnitOfWork::run(&mut storage, &config, |uow| {
        france.set_value(uow, "code", "FR")?;
        france.set_value(uow, "label", "France")?;
        france.set_value(uow, "region", "Europe")?;
        uow.insert(&mut france)?;

        linked.set_value(uow, "name", "Linked")?;
        linked.set_value(uow, "country_id", france.id().to_string())?;
        uow.insert(&mut linked)?;

        unlinked.set_value(uow, "name", "Unlinked")?;
        uow.insert(&mut unlinked)
    })
    .unwrap();

    let definition = registry.get("customer").unwrap();

    // 1. Joined values are read through the aliases
    let loaded = definition.fetch_with_externals(&storage, &linked.id()).unwrap().unwrap();
    assert_eq!(loaded.get("country_label").unwrap(), Value::from("France"));
    assert_eq!(loaded.get("country_region").unwrap(), Value::from("Europe"));
    assert_eq!(loaded.get("shipping_region").unwrap(), Value::from("Europe"));
    assert_eq!(loaded.get("billing_label").unwrap(), Value::Null);
    assert_eq!(loaded.get("name").unwrap(), Value::from("Linked"));

    // 2. Missing parent rows read as NULL
    let loaded = definition.fetch_with_externals(&storage, &unlinked.id()).unwrap().unwrap();
    assert_eq!(loaded.get("country_label").unwrap(), Value::Null);

    // 3. Plain fetch leaves external fields empty
    let plain = definition.fetch(&storage, &linked.id()).unwrap().unwrap();
    assert_eq!(plain.get("country_label").unwrap(), Value::Null);

    // 4. Unknown ids
    assert!(definition.fetch_with_externals(&storage, &ObjectId::new()).unwrap().is_none());
}

#[test]
fn test_linked_to_parent_borrows_parent_columns() {
    let parent = ObjectDefinitionBuilder::new("project", "pm").property(PropertyDefinition::named());
    let child = ObjectDefinitionBuilder::new("milestone", "pm")
        .field(FieldDefinition::text("title", "Title", 80))
        .property(
            PropertyDefinition::linked_to_parent("project")
                .borrow_from_parent(ExternalFieldDefinition::new("project_name", "Project", "name")),
        );
    let registry = DefinitionRegistry::build_with_config(vec![parent, child], Arc::new(EngineConfig::new())).unwrap();
    let mut storage = InMemoryStorage::new();
    registry.provision(&mut storage).unwrap();
    let config = EngineConfig::new();

    let mut project = registry.get("project").unwrap().new_instance();
    let mut milestone = registry.get("milestone").unwrap().new_instance();
    UnitOfWork::run(&mut storage, &config, |uow| {
        project.set_value(uow, "name", "Apollo")?;
        uow.insert(&mut project)?;
        milestone.set_value(uow, "title", "Launch")?;
        milestone.set_value(uow, "parent_id", project.id().to_string())?;
        uow.insert(&mut milestone)
    })
    .unwrap();

    let definition = registry.get("milestone").unwrap();
    let (query, _) = definition.build_query();
    assert_eq!(query.joins().len(), 1);

    let loaded = definition.fetch_with_externals(&storage, &milestone.id()).unwrap().unwrap();
    assert_eq!(loaded.get("project_name").unwrap(), Value::from("Apollo"));
}
