//! Type registrations.
//!
//! The catalog stands in for runtime reflection: it knows each type's shape,
//! its members and base type, whether it can be constructed, and how to
//! create instances and default values.

use super::value::{EnumValue, ListRef, ObjectRef, Value};
use super::TypeName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kinds of simple (leaf) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimpleKind {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Enum,
}

impl SimpleKind {
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            SimpleKind::Byte | SimpleKind::Short | SimpleKind::Int | SimpleKind::Long
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral() || matches!(self, SimpleKind::Float | SimpleKind::Double)
    }

    /// Inclusive range of values representable by an integral kind.
    pub fn integral_range(&self) -> Option<(i64, i64)> {
        match self {
            SimpleKind::Byte => Some((0, i64::from(u8::MAX))),
            SimpleKind::Short => Some((i64::from(i16::MIN), i64::from(i16::MAX))),
            SimpleKind::Int => Some((i64::from(i32::MIN), i64::from(i32::MAX))),
            SimpleKind::Long => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

/// How a collection type can be changed in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
    /// Growable list, updated in place
    List,
    /// Fixed-size array, replaced when its contents change
    Array,
    /// Read-only view, replaced when its contents change
    ReadOnly,
}

impl CollectionKind {
    pub fn supports_mutation(&self) -> bool {
        matches!(self, CollectionKind::List)
    }
}

/// A member declared on a complex type.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDef {
    pub name: String,
    pub type_name: TypeName,
    pub readable: bool,
    pub writable: bool,
    /// Set by construction, so an existing value is always present
    pub initialized: bool,
}

impl MemberDef {
    pub fn new(name: impl Into<String>, type_name: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            readable: true,
            writable: true,
            initialized: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    pub fn initialized(mut self) -> Self {
        self.initialized = true;
        self
    }

    pub fn get(&self, object: &ObjectRef) -> Value {
        object.get(&self.name)
    }

    pub fn set(&self, object: &ObjectRef, value: Value) {
        object.set(self.name.clone(), value);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeShape {
    Simple {
        kind: SimpleKind,
        nullable: bool,
        /// Named members of an enum, with their ordinals
        variants: Vec<(String, i64)>,
    },
    Complex {
        members: Vec<MemberDef>,
        base: Option<TypeName>,
        is_abstract: bool,
        constructible: bool,
    },
    Enumerable {
        element: TypeName,
        kind: CollectionKind,
    },
    /// String-keyed bag of values; classified as complex
    Dictionary { value: TypeName },
}

/// A type registration.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub name: TypeName,
    pub shape: TypeShape,
}

impl TypeDef {
    pub fn simple(name: impl Into<TypeName>, kind: SimpleKind) -> Self {
        Self {
            name: name.into(),
            shape: TypeShape::Simple {
                kind,
                nullable: false,
                variants: Vec::new(),
            },
        }
    }

    /// An enum whose members take ordinals in declaration order.
    pub fn enumeration(name: impl Into<TypeName>, names: &[&str]) -> Self {
        let variants = names
            .iter()
            .enumerate()
            .map(|(ordinal, name)| (name.to_string(), ordinal as i64))
            .collect();
        Self::enumeration_with_ordinals(name, variants)
    }

    pub fn enumeration_with_ordinals(name: impl Into<TypeName>, variants: Vec<(String, i64)>) -> Self {
        Self {
            name: name.into(),
            shape: TypeShape::Simple {
                kind: SimpleKind::Enum,
                nullable: false,
                variants,
            },
        }
    }

    pub fn complex(name: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            shape: TypeShape::Complex {
                members: Vec::new(),
                base: None,
                is_abstract: false,
                constructible: true,
            },
        }
    }

    pub fn list(name: impl Into<TypeName>, element: impl Into<TypeName>) -> Self {
        Self::collection(name, element, CollectionKind::List)
    }

    pub fn array(name: impl Into<TypeName>, element: impl Into<TypeName>) -> Self {
        Self::collection(name, element, CollectionKind::Array)
    }

    pub fn read_only_collection(name: impl Into<TypeName>, element: impl Into<TypeName>) -> Self {
        Self::collection(name, element, CollectionKind::ReadOnly)
    }

    pub fn collection(name: impl Into<TypeName>, element: impl Into<TypeName>, kind: CollectionKind) -> Self {
        Self {
            name: name.into(),
            shape: TypeShape::Enumerable {
                element: element.into(),
                kind,
            },
        }
    }

    pub fn dictionary(name: impl Into<TypeName>, value: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            shape: TypeShape::Dictionary { value: value.into() },
        }
    }

    /// Adds a readable, writable member to a complex type.
    pub fn member(self, name: impl Into<String>, type_name: impl Into<TypeName>) -> Self {
        self.member_def(MemberDef::new(name, type_name))
    }

    pub fn member_def(mut self, member: MemberDef) -> Self {
        if let TypeShape::Complex { members, .. } = &mut self.shape {
            members.retain(|existing| existing.name != member.name);
            members.push(member);
        }
        self
    }

    pub fn extends(mut self, base_type: impl Into<TypeName>) -> Self {
        if let TypeShape::Complex { base, .. } = &mut self.shape {
            *base = Some(base_type.into());
        }
        self
    }

    pub fn abstract_type(mut self) -> Self {
        if let TypeShape::Complex {
            is_abstract,
            constructible,
            ..
        } = &mut self.shape
        {
            *is_abstract = true;
            *constructible = false;
        }
        self
    }

    pub fn without_constructor(mut self) -> Self {
        if let TypeShape::Complex { constructible, .. } = &mut self.shape {
            *constructible = false;
        }
        self
    }
}

/// Member discovery over registered types.
pub trait MemberDiscovery: Send + Sync {
    /// All members of a type, inherited members first.
    fn members_of(&self, type_name: &TypeName) -> Vec<MemberDef>;

    fn readable_members_of(&self, type_name: &TypeName) -> Vec<MemberDef> {
        self.members_of(type_name)
            .into_iter()
            .filter(|member| member.readable)
            .collect()
    }

    fn writable_members_of(&self, type_name: &TypeName) -> Vec<MemberDef> {
        self.members_of(type_name)
            .into_iter()
            .filter(|member| member.writable)
            .collect()
    }
}

/// Registry of every type the mapper can see.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    types: HashMap<TypeName, TypeDef>,
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

const BUILTIN_SIMPLE_TYPES: &[(&str, SimpleKind)] = &[
    ("bool", SimpleKind::Bool),
    ("byte", SimpleKind::Byte),
    ("short", SimpleKind::Short),
    ("int", SimpleKind::Int),
    ("long", SimpleKind::Long),
    ("float", SimpleKind::Float),
    ("double", SimpleKind::Double),
    ("char", SimpleKind::Char),
    ("string", SimpleKind::String),
];

impl TypeCatalog {
    /// Creates a catalog with the built-in simple types and their nullable forms.
    pub fn new() -> Self {
        let mut catalog = Self {
            types: HashMap::new(),
        };
        for (name, kind) in BUILTIN_SIMPLE_TYPES {
            catalog.register(TypeDef::simple(*name, *kind));
        }
        catalog
    }

    /// Registers a type, replacing any previous registration with the same name.
    ///
    /// Simple types also get a nullable counterpart named `T?`.
    pub fn register(&mut self, def: TypeDef) -> &mut Self {
        if let TypeShape::Simple {
            kind,
            nullable: false,
            variants,
        } = &def.shape
        {
            let nullable_name = def.name.nullable();
            let nullable = TypeDef {
                name: nullable_name.clone(),
                shape: TypeShape::Simple {
                    kind: *kind,
                    nullable: true,
                    variants: variants.clone(),
                },
            };
            self.types.insert(nullable_name, nullable);
        }
        self.types.insert(def.name.clone(), def);
        self
    }

    pub fn get(&self, type_name: &(impl AsRef<str> + ?Sized)) -> Option<&TypeDef> {
        self.types.get(type_name.as_ref())
    }

    pub fn contains(&self, type_name: &(impl AsRef<str> + ?Sized)) -> bool {
        self.types.contains_key(type_name.as_ref())
    }

    /// Registered type names in sorted order.
    pub fn type_names(&self) -> Vec<TypeName> {
        let mut names: Vec<TypeName> = self.types.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn base_of(&self, type_name: &(impl AsRef<str> + ?Sized)) -> Option<&TypeName> {
        match self.get(type_name).map(|def| &def.shape) {
            Some(TypeShape::Complex { base, .. }) => base.as_ref(),
            _ => None,
        }
    }

    /// The type followed by its ancestors, nearest first.
    pub fn base_chain(&self, type_name: &TypeName) -> Vec<TypeName> {
        let mut chain = vec![type_name.clone()];
        let mut current = self.base_of(type_name).cloned();
        while let Some(base) = current {
            if chain.contains(&base) {
                break;
            }
            current = self.base_of(&base).cloned();
            chain.push(base);
        }
        chain
    }

    /// Number of ancestors above a type.
    pub fn inheritance_depth(&self, type_name: &TypeName) -> usize {
        self.base_chain(type_name).len() - 1
    }

    /// Whether a value of `derived` can be used where `base` is expected.
    pub fn is_assignable(&self, base: &TypeName, derived: &TypeName) -> bool {
        if base == derived {
            return true;
        }
        if base.is_nullable() && &base.underlying() == derived {
            return true;
        }
        self.base_chain(derived).iter().any(|ancestor| ancestor == base)
    }

    /// Every registered type deriving from `type_name`, most derived first.
    pub fn derived_types_of(&self, type_name: &TypeName) -> Vec<TypeName> {
        let mut derived: Vec<TypeName> = self
            .types
            .keys()
            .filter(|candidate| *candidate != type_name && self.is_assignable(type_name, candidate))
            .cloned()
            .collect();
        derived.sort_by(|a, b| {
            self.inheritance_depth(b)
                .cmp(&self.inheritance_depth(a))
                .then_with(|| a.cmp(b))
        });
        derived
    }

    /// Creates an instance with every member at its default, or `None` when
    /// the type cannot be constructed.
    ///
    /// Members flagged as initialized get an empty collection or a fresh
    /// nested instance.
    pub fn construct(&self, type_name: &TypeName) -> Option<ObjectRef> {
        match self.get(type_name).map(|def| &def.shape) {
            Some(TypeShape::Complex {
                constructible: true,
                is_abstract: false,
                ..
            }) => {
                let object = ObjectRef::new(type_name.clone());
                for member in self.members_of(type_name) {
                    let value = if member.initialized {
                        self.initial_value(type_name, &member.type_name)
                    } else {
                        self.default_value(&member.type_name)
                    };
                    object.set(member.name, value);
                }
                Some(object)
            }
            Some(TypeShape::Dictionary { .. }) => Some(ObjectRef::new(type_name.clone())),
            _ => None,
        }
    }

    fn initial_value(&self, owner: &TypeName, member_type: &TypeName) -> Value {
        match self.get(member_type).map(|def| &def.shape) {
            Some(TypeShape::Enumerable { .. }) => Value::List(self.new_collection(member_type, Vec::new())),
            Some(TypeShape::Complex { .. }) if member_type != owner => self
                .construct(member_type)
                .map(Value::Object)
                .unwrap_or(Value::Null),
            _ => self.default_value(member_type),
        }
    }

    pub fn new_collection(&self, type_name: &TypeName, items: Vec<Value>) -> ListRef {
        ListRef::new(type_name.clone(), items)
    }

    /// The value a member of this type holds before anything is assigned.
    pub fn default_value(&self, type_name: &TypeName) -> Value {
        match self.get(type_name).map(|def| &def.shape) {
            Some(TypeShape::Simple {
                kind,
                nullable: false,
                variants,
            }) => default_for_kind(type_name, *kind, variants),
            _ => Value::Null,
        }
    }

    pub fn enum_value(&self, type_name: &TypeName, name: &str) -> Option<Value> {
        match self.get(type_name).map(|def| &def.shape) {
            Some(TypeShape::Simple {
                kind: SimpleKind::Enum,
                variants,
                ..
            }) => variants
                .iter()
                .find(|(variant, _)| variant == name)
                .map(|(variant, ordinal)| {
                    Value::Enum(EnumValue {
                        type_name: type_name.underlying(),
                        name: variant.clone(),
                        ordinal: *ordinal,
                    })
                }),
            _ => None,
        }
    }
}

pub(crate) fn default_for_kind(type_name: &TypeName, kind: SimpleKind, variants: &[(String, i64)]) -> Value {
    match kind {
        SimpleKind::Bool => Value::Bool(false),
        SimpleKind::Byte | SimpleKind::Short | SimpleKind::Int | SimpleKind::Long => Value::Int(0),
        SimpleKind::Float | SimpleKind::Double => Value::Float(0.0),
        SimpleKind::Char => Value::Char('\0'),
        SimpleKind::String => Value::Null,
        SimpleKind::Enum => variants
            .iter()
            .find(|(_, ordinal)| *ordinal == 0)
            .or_else(|| variants.first())
            .map(|(name, ordinal)| {
                Value::Enum(EnumValue {
                    type_name: type_name.underlying(),
                    name: name.clone(),
                    ordinal: *ordinal,
                })
            })
            .unwrap_or(Value::Null),
    }
}

impl MemberDiscovery for TypeCatalog {
    fn members_of(&self, type_name: &TypeName) -> Vec<MemberDef> {
        let mut members: Vec<MemberDef> = Vec::new();
        for ancestor in self.base_chain(type_name).iter().rev() {
            if let Some(TypeShape::Complex { members: own, .. }) = self.get(ancestor).map(|def| &def.shape) {
                for member in own {
                    match members.iter_mut().find(|existing| existing.name == member.name) {
                        Some(existing) => *existing = member.clone(),
                        None => members.push(member.clone()),
                    }
                }
            }
        }
        members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> TypeCatalog {
        let mut catalog = TypeCatalog::new();
        catalog
            .register(TypeDef::complex("Person").member("Id", "int").member("Name", "string"))
            .register(TypeDef::complex("Customer").extends("Person").member("Discount", "double"))
            .register(
                TypeDef::complex("MysteryCustomer")
                    .extends("Customer")
                    .member("Report", "string"),
            )
            .register(TypeDef::complex("Shape").abstract_type())
            .register(TypeDef::enumeration("Title", &["Mr", "Mrs", "Dr"]));
        catalog
    }

    #[test]
    fn test_inherited_members_come_first() {
        let catalog = catalog();
        let names: Vec<String> = catalog
            .members_of(&TypeName::new("MysteryCustomer"))
            .into_iter()
            .map(|member| member.name)
            .collect();
        assert_eq!(names, vec!["Id", "Name", "Discount", "Report"]);
    }

    #[test]
    fn test_assignability_follows_base_chain() {
        let catalog = catalog();
        let person = TypeName::new("Person");
        let mystery = TypeName::new("MysteryCustomer");

        assert!(catalog.is_assignable(&person, &mystery));
        assert!(!catalog.is_assignable(&mystery, &person));
        assert!(catalog.is_assignable(&TypeName::new("int?"), &TypeName::new("int")));
    }

    #[test]
    fn test_derived_types_are_most_derived_first() {
        let catalog = catalog();
        assert_eq!(
            catalog.derived_types_of(&TypeName::new("Person")),
            vec![TypeName::new("MysteryCustomer"), TypeName::new("Customer")]
        );
    }

    #[test]
    fn test_abstract_types_cannot_be_constructed() {
        let catalog = catalog();
        assert!(catalog.construct(&TypeName::new("Shape")).is_none());
        assert!(catalog.construct(&TypeName::new("Person")).is_some());
    }

    #[test]
    fn test_constructed_instances_hold_defaults() {
        let mut catalog = catalog();
        catalog
            .register(TypeDef::list("List<string>", "string"))
            .register(
                TypeDef::complex("Team")
                    .member("Size", "int")
                    .member_def(MemberDef::new("Tags", "List<string>").initialized())
                    .member("Lead", "Person"),
            );

        let team = catalog.construct(&TypeName::new("Team")).unwrap();
        assert_eq!(team.get("Size"), Value::Int(0));
        assert!(team.get("Lead").is_null());
        assert_eq!(team.get("Tags").as_list().map(|tags| tags.len()), Some(0));
    }

    #[test]
    fn test_defaults_follow_nullability() {
        let catalog = catalog();
        assert_eq!(catalog.default_value(&TypeName::new("int")), Value::Int(0));
        assert_eq!(catalog.default_value(&TypeName::new("int?")), Value::Null);
        assert_eq!(
            catalog.default_value(&TypeName::new("Title")),
            catalog.enum_value(&TypeName::new("Title"), "Mr").unwrap()
        );
    }

    #[test]
    fn test_lookups_accept_type_names_and_strs() {
        let catalog = catalog();
        let customer = TypeName::new("Customer");

        assert!(catalog.contains(&customer));
        assert!(catalog.contains("Customer"));
        assert!(!catalog.contains("Missing"));
        assert_eq!(catalog.get(&customer).map(|def| def.name.clone()), Some(customer.clone()));
        assert_eq!(catalog.base_of(&customer), Some(&TypeName::new("Person")));
        assert_eq!(catalog.base_of("Customer"), catalog.base_of(&customer));
        assert_eq!(
            catalog.base_chain(&TypeName::new("MysteryCustomer")),
            vec![TypeName::new("MysteryCustomer"), customer, TypeName::new("Person")]
        );
        assert!(catalog.construct(&TypeName::new("MysteryCustomer")).is_some());
    }
}
