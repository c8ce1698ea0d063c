//! Mapping onto and over existing targets

mod common;

use common::*;
use datafold_mapper::Value;

fn existing_person() -> Value {
    person(7, "Original", address("Old Street", "Old Town"))
}

#[test]
fn test_overwrite_nulls_absent_members() {
    let mapper = mapper();
    let target = existing_person();
    let source = object("PersonName", [("Name", "Dylan".into())]);

    let result = mapper
        .map_over(&source, &target)
        .expect("Failed to map over person");

    assert!(result.same_as(&target), "overwrite should update the existing instance");
    assert_eq!(field(&result, "Name"), Value::from("Dylan"));
    assert_eq!(field(&result, "Address"), Value::Null);
    assert_eq!(field(&result, "Id"), Value::Int(0));
    assert_eq!(field(&result, "Title"), title("Unknown", 0));
}

#[test]
fn test_merge_preserves_untouched_members() {
    let mapper = mapper();
    let target = existing_person();
    let original_address = field(&target, "Address");
    let source = object("PersonIdName", [("Id", Value::Int(8)), ("Name", "Merged".into())]);

    let result = mapper.map_onto(&source, &target).expect("Failed to merge person");

    assert!(result.same_as(&target));
    assert_eq!(field(&result, "Id"), Value::Int(8));
    assert_eq!(field(&result, "Name"), Value::from("Merged"));
    assert!(field(&result, "Address").same_as(&original_address));
    assert_eq!(field(&result, "Title"), title("Mr", 1));
}

#[test]
fn test_merge_keeps_values_for_null_sources() {
    let mapper = mapper();
    let target = existing_person();
    let source = object("PersonIdName", [("Id", Value::Int(9)), ("Name", Value::Null)]);

    let result = mapper.map_onto(&source, &target).unwrap();

    assert_eq!(field(&result, "Name"), Value::from("Original"));
    assert_eq!(field(&result, "Id"), Value::Int(9));
}

#[test]
fn test_merge_maps_nested_objects_in_place() {
    let mapper = mapper();
    let target = existing_person();
    let original_address = field(&target, "Address");
    let source = person(7, "Original", object("Address", [("Line1", "New Street".into())]));

    mapper.map_onto(&source, &target).unwrap();

    let address = field(&target, "Address");
    assert!(address.same_as(&original_address), "nested target should be reused");
    assert_eq!(field(&address, "Line1"), Value::from("New Street"));
    assert_eq!(field(&address, "Line2"), Value::from("Old Town"));
}

#[test]
fn test_overwrite_maps_nested_objects_in_place() {
    let mapper = mapper();
    let target = existing_person();
    let original_address = field(&target, "Address");
    let source = person(7, "Original", object("Address", [("Line1", "New Street".into())]));

    mapper.map_over(&source, &target).unwrap();

    let address = field(&target, "Address");
    assert!(address.same_as(&original_address));
    assert_eq!(field(&address, "Line1"), Value::from("New Street"));
    assert_eq!(field(&address, "Line2"), Value::Null);
}

#[test]
fn test_merge_creates_missing_nested_objects() {
    let mapper = mapper();
    let target = person(7, "Original", Value::Null);
    let source = person(7, "Original", address("Fresh Street", "New Town"));

    mapper.map_onto(&source, &target).unwrap();

    let address = field(&target, "Address");
    assert_eq!(type_of(&address), "Address");
    assert_eq!(field(&address, "Line1"), Value::from("Fresh Street"));
}

#[test]
fn test_null_source_leaves_existing_target() {
    let mapper = mapper();
    let target = existing_person();

    let merged = mapper.map_onto(&Value::Null, &target).unwrap();
    let overwritten = mapper.map_over(&Value::Null, &target).unwrap();

    assert!(merged.same_as(&target));
    assert!(overwritten.same_as(&target));
    assert_eq!(field(&target, "Name"), Value::from("Original"));
}

#[test]
fn test_existing_target_must_be_an_object() {
    let mapper = mapper();
    let source = object("PersonName", [("Name", "Dylan".into())]);

    let error = mapper.map_onto(&source, &Value::from("not an object")).unwrap_err();

    assert!(error.is_configuration(), "{}", error);
}

#[test]
fn test_shared_source_merges_into_each_existing_target() {
    let mapper = mapper();
    let billing = object("AddressViewModel", [("Line1", "Bill St".into()), ("Line2", "B".into())]);
    let shipping = object("AddressViewModel", [("Line1", "Ship St".into()), ("Line2", "S".into())]);
    let target = object("DeliveryDto", [("Billing", billing.clone()), ("Shipping", shipping.clone())]);
    let shared = address("1 Shared Way", "Town");
    let source = object("Delivery", [("Billing", shared.clone()), ("Shipping", shared)]);

    mapper.map_onto(&source, &target).expect("Failed to merge delivery");

    let merged_billing = field(&target, "Billing");
    let merged_shipping = field(&target, "Shipping");
    assert!(merged_billing.same_as(&billing));
    assert!(merged_shipping.same_as(&shipping));
    assert_eq!(field(&billing, "Line1"), Value::from("1 Shared Way"));
    assert_eq!(field(&shipping, "Line1"), Value::from("1 Shared Way"));
}
