//! Cached type descriptors.
//!
//! Every type is classified as exactly one of simple, complex or enumerable.
//! Dictionaries count as complex.

use super::catalog::{CollectionKind, MemberDef, MemberDiscovery, SimpleKind, TypeCatalog, TypeShape};
use super::member::{Member, QualifiedMember};
use super::value::Value;
use super::TypeName;
use crate::error::{MapperError, MapperResult};
use log::trace;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    Simple,
    Complex,
    Enumerable,
}

/// Classified view of a registered type.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub name: TypeName,
    pub category: TypeCategory,
    pub simple_kind: Option<SimpleKind>,
    pub nullable: bool,
    pub variants: Vec<(String, i64)>,
    pub element_type: Option<TypeName>,
    pub collection_kind: Option<CollectionKind>,
    pub is_dictionary: bool,
    pub is_abstract: bool,
    pub constructible: bool,
    pub base: Option<TypeName>,
    pub members: Vec<MemberDef>,
}

impl TypeDescriptor {
    fn from_shape(name: &TypeName, shape: &TypeShape, members: Vec<MemberDef>) -> Self {
        let mut descriptor = Self {
            name: name.clone(),
            category: TypeCategory::Complex,
            simple_kind: None,
            nullable: false,
            variants: Vec::new(),
            element_type: None,
            collection_kind: None,
            is_dictionary: false,
            is_abstract: false,
            constructible: false,
            base: None,
            members: Vec::new(),
        };
        match shape {
            TypeShape::Simple {
                kind,
                nullable,
                variants,
            } => {
                descriptor.category = TypeCategory::Simple;
                descriptor.simple_kind = Some(*kind);
                descriptor.nullable = *nullable;
                descriptor.variants = variants.clone();
            }
            TypeShape::Complex {
                base,
                is_abstract,
                constructible,
                ..
            } => {
                descriptor.base = base.clone();
                descriptor.is_abstract = *is_abstract;
                descriptor.constructible = *constructible && !*is_abstract;
                descriptor.members = members;
            }
            TypeShape::Enumerable { element, kind } => {
                descriptor.category = TypeCategory::Enumerable;
                descriptor.element_type = Some(element.clone());
                descriptor.collection_kind = Some(*kind);
            }
            TypeShape::Dictionary { value } => {
                descriptor.is_dictionary = true;
                descriptor.constructible = true;
                descriptor.element_type = Some(value.clone());
            }
        }
        descriptor
    }

    pub fn is_simple(&self) -> bool {
        self.category == TypeCategory::Simple
    }

    pub fn is_complex(&self) -> bool {
        self.category == TypeCategory::Complex
    }

    pub fn is_enumerable(&self) -> bool {
        self.category == TypeCategory::Enumerable
    }

    pub fn is_enum(&self) -> bool {
        self.simple_kind == Some(SimpleKind::Enum)
    }

    pub fn member(&self, name: &str) -> Option<&MemberDef> {
        self.members.iter().find(|member| member.name == name)
    }

    pub fn member_ignore_case(&self, name: &str) -> Option<&MemberDef> {
        self.member(name).or_else(|| {
            self.members
                .iter()
                .find(|member| member.name.eq_ignore_ascii_case(name))
        })
    }

    pub fn readable_members(&self) -> impl Iterator<Item = &MemberDef> {
        self.members.iter().filter(|member| member.readable)
    }

    /// Value of this type before anything is assigned.
    pub fn default_value(&self) -> Value {
        match self.simple_kind {
            Some(kind) if !self.nullable => super::catalog::default_for_kind(&self.name, kind, &self.variants),
            _ => Value::Null,
        }
    }

    /// Whether null is a legitimate value of this type.
    pub fn accepts_null(&self) -> bool {
        !self.is_simple() || self.nullable || self.simple_kind == Some(SimpleKind::String)
    }
}

/// Descriptor cache over a [`TypeCatalog`].
#[derive(Debug)]
pub struct MemberModel {
    catalog: Arc<TypeCatalog>,
    descriptors: RwLock<HashMap<TypeName, Arc<TypeDescriptor>>>,
}

impl MemberModel {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            catalog,
            descriptors: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    pub fn shared_catalog(&self) -> Arc<TypeCatalog> {
        Arc::clone(&self.catalog)
    }

    /// Describes a registered type.
    pub fn describe(&self, type_name: &TypeName) -> MapperResult<Arc<TypeDescriptor>> {
        if let Some(found) = self
            .descriptors
            .read()
            .map_err(|_| MapperError::internal("descriptor cache lock poisoned"))?
            .get(type_name)
        {
            return Ok(Arc::clone(found));
        }

        let def = self
            .catalog
            .get(type_name)
            .ok_or_else(|| MapperError::unknown_type(type_name.as_str()))?;
        let members = match def.shape {
            TypeShape::Complex { .. } => self.catalog.members_of(type_name),
            _ => Vec::new(),
        };
        let descriptor = Arc::new(TypeDescriptor::from_shape(type_name, &def.shape, members));
        trace!("Described type {} as {:?}", type_name, descriptor.category);

        let mut descriptors = self
            .descriptors
            .write()
            .map_err(|_| MapperError::internal("descriptor cache lock poisoned"))?;
        Ok(Arc::clone(
            descriptors.entry(type_name.clone()).or_insert(descriptor),
        ))
    }

    pub fn describe_name(&self, type_name: &str) -> MapperResult<Arc<TypeDescriptor>> {
        self.describe(&TypeName::new(type_name))
    }

    /// Builds the qualified member for `root.names[0].names[1]...`.
    pub fn member_path_for(&self, root: &TypeName, names: &[&str]) -> MapperResult<QualifiedMember> {
        let mut path = QualifiedMember::root(root.clone());
        let mut current = self.describe(root)?;
        for name in names {
            let def = current.member(name).cloned().ok_or_else(|| {
                MapperError::configuration(format!("Member '{}' does not exist on type {}", name, current.name))
            })?;
            let member_type = self.describe(&def.type_name)?;
            path = path.append(Member::from_def(&def, &current.name, member_type.category));
            current = member_type;
        }
        Ok(path)
    }

    /// Follows a chain of member names from a root type, returning the type at the end.
    pub fn resolve_path(&self, root: &TypeName, names: &[String]) -> MapperResult<Option<Arc<TypeDescriptor>>> {
        let mut current = self.describe(root)?;
        for name in names {
            if current.is_dictionary {
                let Some(value_type) = current.element_type.clone() else {
                    return Ok(None);
                };
                current = self.describe(&value_type)?;
                continue;
            }
            let Some(member) = current.member(name) else {
                return Ok(None);
            };
            let member_type = member.type_name.clone();
            current = self.describe(&member_type)?;
        }
        Ok(Some(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDef;

    fn model() -> MemberModel {
        let mut catalog = TypeCatalog::new();
        catalog
            .register(TypeDef::complex("Address").member("Line1", "string"))
            .register(TypeDef::complex("Person").member("Name", "string").member("Address", "Address"))
            .register(TypeDef::list("List<Person>", "Person"))
            .register(TypeDef::dictionary("Bag", "string"));
        MemberModel::new(Arc::new(catalog))
    }

    #[test]
    fn test_classification_is_total() {
        let model = model();
        assert!(model.describe_name("int").unwrap().is_simple());
        assert!(model.describe_name("Person").unwrap().is_complex());
        assert!(model.describe_name("List<Person>").unwrap().is_enumerable());

        let bag = model.describe_name("Bag").unwrap();
        assert!(bag.is_complex());
        assert!(bag.is_dictionary);
    }

    #[test]
    fn test_unknown_types_are_reported() {
        let error = model().describe_name("Nope").unwrap_err();
        assert!(matches!(error, MapperError::UnknownType { .. }));
    }

    #[test]
    fn test_paths_resolve_through_members() {
        let model = model();
        let resolved = model
            .resolve_path(&TypeName::new("Person"), &["Address".to_string(), "Line1".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(resolved.name, TypeName::new("string"));
        assert!(model
            .resolve_path(&TypeName::new("Person"), &["Missing".to_string()])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_member_paths_are_qualified() {
        let model = model();
        let path = model
            .member_path_for(&TypeName::new("Person"), &["Address", "Line1"])
            .unwrap();
        assert_eq!(path.path(), "Address.Line1");
        assert_eq!(path.type_name(), &TypeName::new("string"));
        assert!(model
            .member_path_for(&TypeName::new("Person"), &["Nickname"])
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn test_descriptors_are_cached() {
        let model = model();
        let first = model.describe_name("Person").unwrap();
        let second = model.describe_name("Person").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
