//! Member chains.

use super::catalog::{MemberDef, TypeCatalog};
use super::descriptor::TypeCategory;
use super::TypeName;
use std::fmt;

/// One step in a member chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    pub name: String,
    pub type_name: TypeName,
    pub declaring_type: TypeName,
    pub category: TypeCategory,
    pub readable: bool,
    pub writable: bool,
}

impl Member {
    pub fn from_def(def: &MemberDef, declaring_type: &TypeName, category: TypeCategory) -> Self {
        Self {
            name: def.name.clone(),
            type_name: def.type_name.clone(),
            declaring_type: declaring_type.clone(),
            category,
            readable: def.readable,
            writable: def.writable,
        }
    }
}

/// A chain of members from a root type to a leaf, e.g. `Person.Address.Line1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedMember {
    root_type: TypeName,
    members: Vec<Member>,
}

impl QualifiedMember {
    /// The empty chain standing for the root object itself.
    pub fn root(root_type: impl Into<TypeName>) -> Self {
        Self {
            root_type: root_type.into(),
            members: Vec::new(),
        }
    }

    pub fn append(&self, member: Member) -> Self {
        let mut members = self.members.clone();
        members.push(member);
        Self {
            root_type: self.root_type.clone(),
            members,
        }
    }

    pub fn root_type(&self) -> &TypeName {
        &self.root_type
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn leaf(&self) -> Option<&Member> {
        self.members.last()
    }

    pub fn is_root(&self) -> bool {
        self.members.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.members.len()
    }

    /// Type at the end of the chain.
    pub fn type_name(&self) -> &TypeName {
        self.leaf()
            .map(|member| &member.type_name)
            .unwrap_or(&self.root_type)
    }

    /// Leaf member name, or the root type name for an empty chain.
    pub fn name(&self) -> &str {
        self.leaf()
            .map(|member| member.name.as_str())
            .unwrap_or_else(|| self.root_type.as_str())
    }

    pub fn names(&self) -> Vec<String> {
        self.members.iter().map(|member| member.name.clone()).collect()
    }

    /// Dotted path below the root, e.g. `Address.Line1`.
    pub fn path(&self) -> String {
        self.names().join(".")
    }

    /// Member names run together, the form flattened members are named by.
    pub fn flattened_name(&self) -> String {
        self.names().concat()
    }

    /// Stable identity used in plan text and cache diagnostics.
    pub fn signature(&self) -> String {
        format!("{}:{}:{}", self.root_type, self.path(), self.type_name())
    }

    /// Whether both chains end in the same member of compatible declaring types.
    pub fn matches(&self, other: &QualifiedMember, catalog: &TypeCatalog) -> bool {
        match (self.leaf(), other.leaf()) {
            (Some(a), Some(b)) => {
                a.name == b.name
                    && a.type_name == b.type_name
                    && (catalog.is_assignable(&a.declaring_type, &b.declaring_type)
                        || catalog.is_assignable(&b.declaring_type, &a.declaring_type))
            }
            (None, None) => self.root_type == other.root_type,
            _ => false,
        }
    }

    /// Whether this chain is a prefix of `other`.
    pub fn could_match(&self, other: &QualifiedMember) -> bool {
        self.members.len() <= other.members.len()
            && self
                .members
                .iter()
                .zip(&other.members)
                .all(|(a, b)| a.name == b.name)
    }

    /// Re-roots this chain at `ancestor`, if `ancestor` is one of its prefixes.
    pub fn relative_to(&self, ancestor: &QualifiedMember) -> Option<QualifiedMember> {
        if !ancestor.could_match(self) {
            return None;
        }
        Some(QualifiedMember {
            root_type: ancestor.type_name().clone(),
            members: self.members[ancestor.members.len()..].to_vec(),
        })
    }
}

impl fmt::Display for QualifiedMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.members.is_empty() {
            write!(f, "{}", self.root_type)
        } else {
            write!(f, "{}.{}", self.root_type, self.path())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str, type_name: &str, declaring: &str, category: TypeCategory) -> Member {
        Member::from_def(
            &MemberDef::new(name, type_name),
            &TypeName::new(declaring),
            category,
        )
    }

    fn address_line() -> QualifiedMember {
        QualifiedMember::root("Person")
            .append(member("Address", "Address", "Person", TypeCategory::Complex))
            .append(member("Line1", "string", "Address", TypeCategory::Simple))
    }

    #[test]
    fn test_paths_and_names() {
        let line = address_line();
        assert_eq!(line.path(), "Address.Line1");
        assert_eq!(line.flattened_name(), "AddressLine1");
        assert_eq!(line.name(), "Line1");
        assert_eq!(line.signature(), "Person:Address.Line1:string");
        assert_eq!(line.to_string(), "Person.Address.Line1");
    }

    #[test]
    fn test_relative_paths_reroot_at_ancestor() {
        let line = address_line();
        let address = QualifiedMember::root("Person").append(member(
            "Address",
            "Address",
            "Person",
            TypeCategory::Complex,
        ));

        assert!(address.could_match(&line));
        let relative = line.relative_to(&address).unwrap();
        assert_eq!(relative.root_type(), &TypeName::new("Address"));
        assert_eq!(relative.path(), "Line1");
        assert!(line.relative_to(&QualifiedMember::root("Person").append(member(
            "Name",
            "string",
            "Person",
            TypeCategory::Simple
        )))
        .is_none());
    }

    #[test]
    fn test_matching_accepts_related_declaring_types() {
        let mut catalog = TypeCatalog::new();
        catalog
            .register(crate::types::TypeDef::complex("Person").member("Name", "string"))
            .register(crate::types::TypeDef::complex("Customer").extends("Person"));

        let on_person = QualifiedMember::root("Person").append(member("Name", "string", "Person", TypeCategory::Simple));
        let on_customer =
            QualifiedMember::root("Customer").append(member("Name", "string", "Customer", TypeCategory::Simple));
        assert!(on_person.matches(&on_customer, &catalog));
    }
}
