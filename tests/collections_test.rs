//! Collection mapping: identity reconciliation, merging and read-only targets

mod common;

use common::*;
use datafold_mapper::Value;

fn order(type_name: &str, items_type: &str, elements: Vec<Value>) -> Value {
    object(type_name, [("Id", Value::Int(1)), ("Items", list(items_type, elements))])
}

fn product(type_name: &str, id: &str, price: f64) -> Value {
    object(type_name, [("ProductId", id.into()), ("Price", Value::Float(price))])
}

#[test]
fn test_merge_reconciles_elements_by_identity() {
    let mapper = mapper();
    let target = order(
        "OrderDto",
        "OrderItemDtoList",
        vec![
            order_item("OrderItemDto", 1, "Tea", 1),
            order_item("OrderItemDto", 2, "Cake", 1),
            order_item("OrderItemDto", 3, "Scone", 1),
        ],
    );
    let target_list = field(&target, "Items");
    let existing = items(&target_list);
    let source = order(
        "Order",
        "OrderItemList",
        vec![
            order_item("OrderItem", 2, "Cake", 1),
            order_item("OrderItem", 3, "Scone", 4),
            order_item("OrderItem", 4, "Jam", 2),
        ],
    );

    mapper.map_onto(&source, &target).expect("Failed to merge order");

    let list_after = field(&target, "Items");
    assert!(list_after.same_as(&target_list), "list should be updated in place");

    let merged = items(&list_after);
    let ids: Vec<Value> = merged.iter().map(|item| field(item, "Id")).collect();
    assert_eq!(ids, vec![Value::Int(2), Value::Int(3), Value::Int(4)]);
    assert!(merged[0].same_as(&existing[1]));
    assert!(merged[1].same_as(&existing[2]));
    assert_eq!(field(&merged[1], "Quantity"), Value::Int(4));
    assert_eq!(type_of(&merged[2]), "OrderItemDto");
}

#[test]
fn test_overwrite_rebuilds_simple_collections() {
    let mapper = mapper();
    let target = object("TaggedDto", [("Tags", list("StringList", vec!["old".into()]))]);
    let source = object("Tagged", [("Tags", list("StringList", vec!["a".into(), "b".into()]))]);

    mapper.map_over(&source, &target).unwrap();

    assert_eq!(items(&field(&target, "Tags")), vec![Value::from("a"), Value::from("b")]);
}

#[test]
fn test_merge_appends_new_simple_values() {
    let mapper = mapper();
    let target = object(
        "TaggedDto",
        [("Tags", list("StringList", vec!["a".into(), "b".into()]))],
    );
    let source = object(
        "Tagged",
        [("Tags", list("StringList", vec!["b".into(), "c".into()]))],
    );

    mapper.map_onto(&source, &target).unwrap();

    assert_eq!(
        items(&field(&target, "Tags")),
        vec![Value::from("a"), Value::from("b"), Value::from("c")]
    );
}

#[test]
fn test_create_new_builds_a_new_list() {
    let mapper = mapper();
    let source_items = list("StringList", vec!["x".into()]);
    let source = object("Tagged", [("Tags", source_items.clone())]);

    let result = mapper.map_to_new(&source, "TaggedDto").unwrap();

    let tags = field(&result, "Tags");
    assert!(!tags.same_as(&source_items));
    assert_eq!(items(&tags), vec![Value::from("x")]);
}

#[test]
fn test_array_members_are_replaced() {
    let mapper = mapper();
    let original = list("OrderItemDtoArray", vec![order_item("OrderItemDto", 1, "Tea", 1)]);
    let first = items(&original)[0].clone();
    let target = object("OrderSummary", [("Id", Value::Int(1)), ("Items", original.clone())]);
    let source = order(
        "Order",
        "OrderItemList",
        vec![
            order_item("OrderItem", 1, "Tea", 3),
            order_item("OrderItem", 2, "Cake", 1),
        ],
    );

    mapper.map_onto(&source, &target).unwrap();

    let replaced = field(&target, "Items");
    assert!(!replaced.same_as(&original), "arrays cannot grow in place");
    assert_eq!(type_of(&replaced), "OrderItemDtoArray");
    let elements = items(&replaced);
    assert_eq!(elements.len(), 2);
    assert!(elements[0].same_as(&first));
    assert_eq!(field(&elements[0], "Quantity"), Value::Int(3));
    assert_eq!(items(&original).len(), 1);
}

#[test]
fn test_read_only_collections_update_matched_items_only() {
    let mapper = mapper();
    let sequence = list(
        "OrderItemDtoSequence",
        vec![
            order_item("OrderItemDto", 1, "Tea", 1),
            order_item("OrderItemDto", 2, "Cake", 1),
        ],
    );
    let ledger = object(
        "Ledger",
        [("Id", Value::Int(1)), ("Total", Value::Int(10)), ("Items", sequence.clone())],
    );
    let source = order(
        "Order",
        "OrderItemList",
        vec![
            order_item("OrderItem", 2, "Cake", 5),
            order_item("OrderItem", 3, "Jam", 1),
        ],
    );

    mapper.map_onto(&source, &ledger).unwrap();

    let after = field(&ledger, "Items");
    assert!(after.same_as(&sequence));
    let elements = items(&after);
    assert_eq!(elements.len(), 2, "nothing is added or removed");
    assert_eq!(field(&elements[1], "Quantity"), Value::Int(5));
    assert_eq!(field(&elements[0], "Quantity"), Value::Int(1));
    assert_eq!(field(&ledger, "Total"), Value::Int(10));
}

#[test]
fn test_root_collections_map_element_by_element() {
    let mapper = mapper();
    let source = list(
        "OrderItemList",
        vec![
            order_item("OrderItem", 1, "Tea", 1),
            order_item("OrderItem", 2, "Cake", 2),
        ],
    );

    let result = mapper.map_to_new(&source, "OrderItemDtoList").unwrap();

    assert_eq!(type_of(&result), "OrderItemDtoList");
    let elements = items(&result);
    assert_eq!(elements.len(), 2);
    assert_eq!(type_of(&elements[0]), "OrderItemDto");
    assert_eq!(field(&elements[1], "Quantity"), Value::Int(2));
}

#[test]
fn test_configured_identifiers_match_elements() {
    let mapper = mapper();
    let existing = product("ProductDto", "p-1", 1.0);
    let target = object("BasketDto", [("Products", list("ProductDtoList", vec![existing.clone()]))]);
    let source = object(
        "Basket",
        [(
            "Products",
            list(
                "ProductList",
                vec![product("Product", "p-1", 2.5), product("Product", "p-2", 4.0)],
            ),
        )],
    );

    mapper
        .when_mapping()
        .identify("ProductDto", "ProductId")
        .expect("Failed to configure identifier");
    mapper.map_onto(&source, &target).unwrap();

    let products = items(&field(&target, "Products"));
    assert_eq!(products.len(), 2);
    assert!(products[0].same_as(&existing));
    assert_eq!(field(&products[0], "Price"), Value::Float(2.5));
    assert_eq!(field(&products[1], "ProductId"), Value::from("p-2"));
}

#[test]
fn test_unidentified_elements_are_appended_on_merge() {
    let mapper = mapper();
    let target = object(
        "BasketDto",
        [("Products", list("ProductDtoList", vec![product("ProductDto", "p-1", 1.0)]))],
    );
    let source = object(
        "Basket",
        [("Products", list("ProductList", vec![product("Product", "p-1", 2.5)]))],
    );

    mapper.map_onto(&source, &target).unwrap();

    assert_eq!(items(&field(&target, "Products")).len(), 2);
}
