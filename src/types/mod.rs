//! # Type model
//!
//! Without runtime reflection the mapper learns about types from a
//! [`TypeCatalog`]: every mappable type is registered with its shape, and
//! [`MemberModel`] turns those registrations into cached descriptors used by
//! the plan builder.
//!
//! ## Components
//!
//! * `value` - Runtime values, including shared object and list references
//! * `catalog` - Type registrations, inheritance and construction
//! * `descriptor` - Classified, cached type descriptors
//! * `member` - Member chains rooted at a mapped type

pub mod catalog;
pub mod descriptor;
pub mod member;
pub mod value;

pub use catalog::{
    CollectionKind, MemberDef, MemberDiscovery, SimpleKind, TypeCatalog, TypeDef, TypeShape,
};
pub use descriptor::{MemberModel, TypeCategory, TypeDescriptor};
pub use member::{Member, QualifiedMember};
pub use value::{EnumValue, ListRef, ObjectRef, Value};

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Name of a registered type, cheap to clone and usable as a map key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TypeName(Arc<str>);

impl TypeName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The nullable counterpart of a simple type, e.g. `int?`.
    pub fn nullable(&self) -> TypeName {
        if self.is_nullable() {
            self.clone()
        } else {
            TypeName::new(format!("{}?", self.0))
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.0.ends_with('?')
    }

    /// Strips a trailing `?`, returning the underlying type name.
    pub fn underlying(&self) -> TypeName {
        match self.0.strip_suffix('?') {
            Some(inner) => TypeName::new(inner),
            None => self.clone(),
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl Borrow<str> for TypeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TypeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        TypeName::new(name)
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        TypeName::new(name)
    }
}

impl From<&TypeName> for TypeName {
    fn from(name: &TypeName) -> Self {
        name.clone()
    }
}

impl From<TypeName> for String {
    fn from(name: TypeName) -> Self {
        name.0.to_string()
    }
}
