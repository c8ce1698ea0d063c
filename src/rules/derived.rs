//! Derived type pairs.
//!
//! A pair says that when the declared source type is mapped to the declared
//! target type and the runtime source is the derived source type, the derived
//! target type is created instead. Pairs are configured explicitly or inferred
//! from naming: if `Person` maps to `PersonViewModel`, a `Customer` source maps
//! to `CustomerViewModel` when that type exists and derives from
//! `PersonViewModel`.

use super::rule::RuleSet;
use crate::expr::Expression;
use crate::types::{TypeCatalog, TypeName};

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedTypePair {
    pub declared_source: TypeName,
    pub declared_target: TypeName,
    pub derived_source: TypeName,
    pub derived_target: TypeName,
    pub condition: Option<Expression>,
    pub rule_set: Option<RuleSet>,
    /// False for pairs inferred from naming
    pub configured: bool,
}

impl DerivedTypePair {
    pub fn is_same_pair(&self, source: &TypeName, target: &TypeName) -> bool {
        &self.derived_source == source && &self.derived_target == target
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NamingAffix {
    Prefix(String),
    Suffix(String),
}

impl NamingAffix {
    fn apply(&self, name: &str) -> String {
        match self {
            NamingAffix::Prefix(prefix) => format!("{}{}", prefix, name),
            NamingAffix::Suffix(suffix) => format!("{}{}", name, suffix),
        }
    }
}

/// How target type names decorate source type names, e.g. a `ViewModel` suffix.
fn naming_affix(source: &str, target: &str) -> Option<NamingAffix> {
    if let Some(suffix) = target.strip_prefix(source) {
        return Some(NamingAffix::Suffix(suffix.to_string()));
    }
    target
        .strip_suffix(source)
        .map(|prefix| NamingAffix::Prefix(prefix.to_string()))
}

/// Derived pairs implied by naming, most derived source first.
pub fn infer_pairs(catalog: &TypeCatalog, source: &TypeName, target: &TypeName) -> Vec<DerivedTypePair> {
    let Some(affix) = naming_affix(source.as_str(), target.as_str()) else {
        return Vec::new();
    };

    catalog
        .derived_types_of(source)
        .into_iter()
        .filter_map(|derived_source| {
            let derived_target = TypeName::new(affix.apply(derived_source.as_str()));
            if &derived_target == target || !catalog.contains(derived_target.as_str()) {
                return None;
            }
            if !catalog.is_assignable(target, &derived_target) {
                return None;
            }
            Some(DerivedTypePair {
                declared_source: source.clone(),
                declared_target: target.clone(),
                derived_source,
                derived_target,
                condition: None,
                rule_set: None,
                configured: false,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDef;

    fn catalog() -> TypeCatalog {
        let mut catalog = TypeCatalog::new();
        catalog
            .register(TypeDef::complex("Person"))
            .register(TypeDef::complex("Customer").extends("Person"))
            .register(TypeDef::complex("MysteryCustomer").extends("Customer"))
            .register(TypeDef::complex("PersonViewModel"))
            .register(TypeDef::complex("CustomerViewModel").extends("PersonViewModel"))
            .register(TypeDef::complex("MysteryCustomerViewModel").extends("CustomerViewModel"))
            .register(TypeDef::complex("DtoPerson"))
            .register(TypeDef::complex("DtoCustomer"));
        catalog
    }

    #[test]
    fn test_suffix_naming_infers_pairs() {
        let pairs = infer_pairs(&catalog(), &TypeName::new("Person"), &TypeName::new("PersonViewModel"));
        let names: Vec<(String, String)> = pairs
            .iter()
            .map(|pair| (pair.derived_source.to_string(), pair.derived_target.to_string()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("MysteryCustomer".to_string(), "MysteryCustomerViewModel".to_string()),
                ("Customer".to_string(), "CustomerViewModel".to_string()),
            ]
        );
        assert!(pairs.iter().all(|pair| !pair.configured));
    }

    #[test]
    fn test_unrelated_targets_are_not_inferred() {
        // DtoCustomer exists but does not derive from DtoPerson.
        let pairs = infer_pairs(&catalog(), &TypeName::new("Person"), &TypeName::new("DtoPerson"));
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_same_type_mappings_keep_runtime_type() {
        let pairs = infer_pairs(&catalog(), &TypeName::new("Customer"), &TypeName::new("Customer"));
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].derived_target, TypeName::new("MysteryCustomer"));
    }
}
