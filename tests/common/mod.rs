//! Shared fixtures for the mapper integration tests
//!
//! The catalog models people with addresses, a customer hierarchy, products
//! with a derived "mega" variant, a self-referencing category tree and orders
//! with identifiable items.

#![allow(dead_code)]

use datafold_mapper::types::EnumValue;
use datafold_mapper::{ListRef, Mapper, MemberDef, ObjectRef, TypeCatalog, TypeDef, Value};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    catalog
        .register(TypeDef::enumeration("Title", &["Unknown", "Mr", "Mrs", "Ms", "Dr"]))
        // People
        .register(TypeDef::complex("Address").member("Line1", "string").member("Line2", "string"))
        .register(
            TypeDef::complex("AddressViewModel")
                .member("Line1", "string")
                .member("Line2", "string"),
        )
        .register(
            TypeDef::complex("Person")
                .member("Id", "int")
                .member("Title", "Title")
                .member("Name", "string")
                .member("Address", "Address"),
        )
        .register(TypeDef::complex("Customer").extends("Person").member("Discount", "double"))
        .register(TypeDef::complex("MysteryCustomer").extends("Customer").member("Mystery", "string"))
        .register(
            TypeDef::complex("PersonViewModel")
                .member("Id", "int")
                .member("Title", "string")
                .member("Name", "string")
                .member("AddressLine1", "string")
                .member("Address", "AddressViewModel"),
        )
        .register(
            TypeDef::complex("CustomerViewModel")
                .extends("PersonViewModel")
                .member("Discount", "double"),
        )
        .register(
            TypeDef::complex("MysteryCustomerViewModel")
                .extends("CustomerViewModel")
                .member("Mystery", "string"),
        )
        .register(
            TypeDef::complex("PersonDto")
                .member("Id", "string")
                .member("Name", "string")
                .member("AddressLine1", "string")
                .member("AddressLine2", "string"),
        )
        .register(TypeDef::complex("PersonName").member("Name", "string"))
        .register(TypeDef::complex("PersonIdName").member("Id", "int").member("Name", "string"))
        .register(TypeDef::complex("LowerCasePerson").member("name", "string"))
        .register(
            TypeDef::complex("Delivery")
                .member("Billing", "Address")
                .member("Shipping", "Address"),
        )
        .register(
            TypeDef::complex("DeliveryDto")
                .member("Billing", "AddressViewModel")
                .member("Shipping", "AddressViewModel"),
        )
        // Products
        .register(TypeDef::complex("Product").member("ProductId", "string").member("Price", "double"))
        .register(TypeDef::complex("MegaProduct").extends("Product").member("HowMega", "double"))
        .register(TypeDef::complex("ProductDto").member("ProductId", "string").member("Price", "double"))
        .register(TypeDef::complex("ProductDtoMega").extends("ProductDto").member("HowMega", "double"))
        .register(TypeDef::list("ProductList", "Product"))
        .register(TypeDef::list("ProductDtoList", "ProductDto"))
        .register(TypeDef::complex("Basket").member("Products", "ProductList"))
        .register(TypeDef::complex("BasketDto").member("Products", "ProductDtoList"))
        // Recursive categories
        .register(
            TypeDef::complex("Category")
                .member("Name", "string")
                .member("Parent", "Category")
                .member("Children", "CategoryList"),
        )
        .register(TypeDef::list("CategoryList", "Category"))
        .register(
            TypeDef::complex("CategoryDto")
                .member("Name", "string")
                .member("Parent", "CategoryDto")
                .member("Children", "CategoryDtoList"),
        )
        .register(TypeDef::list("CategoryDtoList", "CategoryDto"))
        // Orders
        .register(
            TypeDef::complex("OrderItem")
                .member("Id", "int")
                .member("Name", "string")
                .member("Quantity", "int"),
        )
        .register(
            TypeDef::complex("OrderItemDto")
                .member("Id", "int")
                .member("Name", "string")
                .member("Quantity", "int"),
        )
        .register(TypeDef::list("OrderItemList", "OrderItem"))
        .register(TypeDef::list("OrderItemDtoList", "OrderItemDto"))
        .register(TypeDef::array("OrderItemDtoArray", "OrderItemDto"))
        .register(TypeDef::read_only_collection("OrderItemDtoSequence", "OrderItemDto"))
        .register(TypeDef::complex("Order").member("Id", "int").member("Items", "OrderItemList"))
        .register(TypeDef::complex("OrderDto").member("Id", "int").member("Items", "OrderItemDtoList"))
        .register(
            TypeDef::complex("OrderSummary")
                .member("Id", "int")
                .member("Items", "OrderItemDtoArray"),
        )
        .register(
            TypeDef::complex("Ledger")
                .member("Id", "int")
                .member_def(MemberDef::new("Total", "int").read_only())
                .member_def(MemberDef::new("Items", "OrderItemDtoSequence").read_only().initialized()),
        )
        // Simple collections
        .register(TypeDef::list("StringList", "string"))
        .register(TypeDef::complex("Tagged").member("Tags", "StringList"))
        .register(TypeDef::complex("TaggedDto").member("Tags", "StringList"))
        // Polymorphic members
        .register(TypeDef::complex("Animal").abstract_type().member("Name", "string"))
        .register(TypeDef::complex("Dog").extends("Animal").member("Breed", "string"))
        .register(TypeDef::complex("Owner").member("Pet", "Animal"))
        .register(TypeDef::complex("AnimalDto").member("Name", "string"))
        .register(TypeDef::complex("OwnerDto").member("Pet", "AnimalDto"))
        // Map-like sources
        .register(TypeDef::dictionary("StringDictionary", "string"));
    catalog
}

pub fn mapper() -> Mapper {
    init_logging();
    Mapper::new(catalog())
}

pub fn object<const N: usize>(type_name: &str, fields: [(&str, Value); N]) -> Value {
    Value::Object(ObjectRef::with_fields(type_name, fields))
}

pub fn list(type_name: &str, items: Vec<Value>) -> Value {
    Value::List(ListRef::new(type_name, items))
}

pub fn title(name: &str, ordinal: i64) -> Value {
    Value::Enum(EnumValue {
        type_name: "Title".into(),
        name: name.to_string(),
        ordinal,
    })
}

pub fn address(line1: &str, line2: &str) -> Value {
    object("Address", [("Line1", line1.into()), ("Line2", line2.into())])
}

pub fn person(id: i64, name: &str, address: Value) -> Value {
    object(
        "Person",
        [
            ("Id", Value::Int(id)),
            ("Title", title("Mr", 1)),
            ("Name", name.into()),
            ("Address", address),
        ],
    )
}

pub fn order_item(type_name: &str, id: i64, name: &str, quantity: i64) -> Value {
    object(
        type_name,
        [
            ("Id", Value::Int(id)),
            ("Name", name.into()),
            ("Quantity", Value::Int(quantity)),
        ],
    )
}

/// Reads a field of an object value.
pub fn field(value: &Value, name: &str) -> Value {
    value
        .as_object()
        .unwrap_or_else(|| panic!("expected an object, got {}", value.kind_name()))
        .get(name)
}

pub fn items(value: &Value) -> Vec<Value> {
    value
        .as_list()
        .unwrap_or_else(|| panic!("expected a list, got {}", value.kind_name()))
        .items()
}

pub fn type_of(value: &Value) -> String {
    value
        .runtime_type()
        .map(|type_name| type_name.to_string())
        .unwrap_or_else(|| value.kind_name())
}
