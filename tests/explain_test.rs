//! Plan rendering

mod common;

use common::*;
use datafold_mapper::{CallbackEvent, RuleSet};

#[test]
fn test_explains_matched_and_flattened_members() {
    let mapper = mapper();

    let plan = mapper
        .explain_plan("Person", "PersonViewModel", RuleSet::CreateNew)
        .expect("Failed to explain plan");

    assert!(plan.starts_with("Map Person -> PersonViewModel (CreateNew)"), "{}", plan);
    assert!(plan.contains("Name <- source.Name"), "{}", plan);
    assert!(plan.contains("AddressLine1 <- source.Address.Line1"), "{}", plan);
    assert!(plan.contains("Address <- source.Address => AddressViewModel"), "{}", plan);
    assert!(plan.contains("Line2 <- source.Line2"), "{}", plan);
}

#[test]
fn test_explains_skipped_and_ignored_members() {
    let mapper = mapper();
    mapper
        .when_mapping()
        .from("PersonName")
        .to("PersonViewModel")
        .ignore(&["AddressLine1"])
        .unwrap();

    let plan = mapper
        .explain_plan("PersonName", "PersonViewModel", RuleSet::CreateNew)
        .unwrap();

    assert!(plan.contains("// No data source for Id"), "{}", plan);
    assert!(plan.contains("// AddressLine1 is ignored"), "{}", plan);
}

#[test]
fn test_explains_recursive_functions() {
    let mapper = mapper();

    let plan = mapper
        .explain_plan("Category", "CategoryDto", RuleSet::CreateNew)
        .unwrap();

    assert!(plan.contains("Function #0: Category -> CategoryDto (CreateNew)"), "{}", plan);
    assert!(plan.contains("(function #0)"), "{}", plan);
}

#[test]
fn test_explains_configured_rules() {
    let mapper = mapper();
    let configure = mapper.when_mapping().from("Person").to("PersonViewModel");
    configure.map("upper(source.Name)").unwrap().to("Name").unwrap();
    configure
        .after(CallbackEvent::ObjectMapping)
        .call(|_| Ok(()))
        .unwrap();

    let plan = mapper
        .explain_plan("Person", "PersonViewModel", RuleSet::CreateNew)
        .unwrap();

    assert!(plan.contains("Name <- upper(source.Name) (rule #0)"), "{}", plan);
    assert!(plan.contains("// after mapping: callback (rule #1)"), "{}", plan);
}

#[test]
fn test_explains_read_only_members_and_merge_policy() {
    let mapper = mapper();

    let plan = mapper
        .explain_plan("Order", "Ledger", RuleSet::Merge)
        .unwrap();

    assert!(plan.contains("// Ledger.Total is read-only"), "{}", plan);
    assert!(plan.contains("Id <- source.Id [unless null]"), "{}", plan);
    assert!(plan.contains("[in place]"), "{}", plan);
    assert!(plan.contains("by Id = Id"), "{}", plan);
}

#[test]
fn test_explanation_is_cached_with_the_mapper() {
    let mapper = mapper();

    let compiled = mapper
        .compiled("Person", "PersonViewModel", RuleSet::CreateNew)
        .unwrap();
    let plan = mapper
        .explain_plan("Person", "PersonViewModel", RuleSet::CreateNew)
        .unwrap();

    assert_eq!(compiled.explain(), plan);
    assert_eq!(mapper.cached_mapper_count().unwrap(), 1);
}
