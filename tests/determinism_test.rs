//! Recompiling the same mapping gives the same plan and output

mod common;

use common::*;
use datafold_mapper::{RuleSet, Value};

#[test]
fn test_recompiled_plans_render_identically() {
    let mapper = mapper();
    mapper
        .when_mapping()
        .from("Person")
        .to("PersonViewModel")
        .map("source.Title + ' ' + source.Name")
        .unwrap()
        .to("Name")
        .unwrap();

    let first = mapper
        .explain_plan("Person", "PersonViewModel", RuleSet::CreateNew)
        .unwrap();
    mapper.reset().unwrap();
    assert_eq!(mapper.cached_mapper_count().unwrap(), 0);
    let second = mapper
        .explain_plan("Person", "PersonViewModel", RuleSet::CreateNew)
        .unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_independent_mappers_agree() {
    let source = person(4, "Dee", address("4 Privet Drive", "Little Whinging"));

    let left = mapper().map_to_new(&source, "PersonViewModel").unwrap();
    let right = mapper().map_to_new(&source, "PersonViewModel").unwrap();

    for member in ["Id", "Title", "Name", "AddressLine1"] {
        assert_eq!(field(&left, member), field(&right, member));
    }
    assert_eq!(
        field(&field(&left, "Address"), "Line2"),
        Value::from("Little Whinging")
    );
    assert_eq!(
        mapper()
            .explain_plan("Category", "CategoryDto", RuleSet::Overwrite)
            .unwrap(),
        mapper()
            .explain_plan("Category", "CategoryDto", RuleSet::Overwrite)
            .unwrap()
    );
}
