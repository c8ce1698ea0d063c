//! Rule registry.
//!
//! Rules are validated when registered so that conflicts, unreachable rules
//! and invalid derived pairs are reported at configuration time rather than
//! while mapping.

use super::derived::{infer_pairs, DerivedTypePair};
use super::rule::{CallbackEvent, CallbackTiming, ConfiguredRule, ErrorStrategy, RuleAction, RuleScope, RuleSet};
use crate::error::{MapperError, MapperResult};
use crate::types::{MemberDiscovery, TypeCatalog, TypeName, TypeShape};
use log::debug;
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug)]
pub struct RuleRegistry {
    catalog: Arc<TypeCatalog>,
    rules: Vec<Arc<ConfiguredRule>>,
}

impl RuleRegistry {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            catalog,
            rules: Vec::new(),
        }
    }

    pub fn rules(&self) -> &[Arc<ConfiguredRule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Validates and stores a rule, returning its registration id.
    pub fn register(&mut self, mut rule: ConfiguredRule) -> MapperResult<usize> {
        self.validate(&rule)?;
        rule.id = self.rules.len();
        debug!(
            "Registered {} rule #{} for {} {}",
            rule.action.label(),
            rule.id,
            rule.scope,
            rule.member_path()
        );
        let id = rule.id;
        self.rules.push(Arc::new(rule));
        Ok(id)
    }

    fn validate(&self, rule: &ConfiguredRule) -> MapperResult<()> {
        if let Some(condition) = &rule.scope.condition {
            if condition.contains_type_test() {
                return Err(MapperError::configuration(format!(
                    "Instead of type testing in condition '{}', configure for a more specific source or target type.",
                    condition
                )));
            }
        }
        for type_name in [&rule.scope.source_type, &rule.scope.target_type].into_iter().flatten() {
            if !self.catalog.contains(type_name.as_str()) {
                return Err(MapperError::unknown_type(type_name.as_str()));
            }
        }

        match &rule.action {
            RuleAction::DataSource(_) | RuleAction::Ignore => self.validate_member_rule(rule),
            RuleAction::DerivedPair { source, target } => self.validate_derived_pair(rule, source, target),
            RuleAction::Identifier(member) => self.validate_identifier(rule, member),
            RuleAction::Callback {
                event: CallbackEvent::MemberPopulation,
                ..
            } => match (&rule.target_member, &rule.scope.target_type) {
                (Some(path), Some(target)) => self.validate_member_path(target, path),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn validate_member_rule(&self, rule: &ConfiguredRule) -> MapperResult<()> {
        let path = match &rule.target_member {
            Some(path) if !path.is_empty() => path,
            _ => {
                return Err(MapperError::configuration(format!(
                    "A {} rule requires a target member",
                    rule.action.label()
                )))
            }
        };
        if let Some(target) = &rule.scope.target_type {
            self.validate_member_path(target, path)?;
        }

        for existing in &self.rules {
            if existing.conflicts_with(rule) {
                return Err(MapperError::configuration(conflict_message(existing, rule)));
            }
            if existing.shadows(rule) {
                return Err(MapperError::configuration(format!(
                    "Member '{}' already has an unconditional {} for {}; a conditional rule registered after it would never apply",
                    rule.member_path(),
                    existing.action.label(),
                    existing.scope
                )));
            }
        }
        Ok(())
    }

    fn validate_member_path(&self, target: &TypeName, path: &[String]) -> MapperResult<()> {
        let mut current = target.clone();
        for name in path {
            match self.catalog.get(current.as_str()).map(|def| &def.shape) {
                Some(TypeShape::Dictionary { .. }) => return Ok(()),
                Some(TypeShape::Complex { .. }) => {}
                _ => {
                    return Err(MapperError::configuration(format!(
                        "Target member '{}' does not exist on type {}",
                        path.join("."),
                        target
                    )))
                }
            }
            let member = self
                .catalog
                .members_of(&current)
                .into_iter()
                .find(|member| &member.name == name)
                .ok_or_else(|| {
                    MapperError::configuration(format!(
                        "Target member '{}' does not exist on type {}",
                        path.join("."),
                        target
                    ))
                })?;
            current = member.type_name;
        }
        Ok(())
    }

    fn validate_derived_pair(&self, rule: &ConfiguredRule, derived_source: &TypeName, derived_target: &TypeName) -> MapperResult<()> {
        let (Some(source), Some(target)) = (&rule.scope.source_type, &rule.scope.target_type) else {
            return Err(MapperError::configuration(
                "Derived type pairs require both a source and a target type",
            ));
        };
        for type_name in [derived_source, derived_target] {
            if !self.catalog.contains(type_name.as_str()) {
                return Err(MapperError::unknown_type(type_name.as_str()));
            }
        }
        if derived_source == source && rule.scope.condition.is_none() {
            return Err(MapperError::configuration("A derived source type must be specified."));
        }
        if derived_target == target {
            return Err(MapperError::configuration("A derived target type must be specified."));
        }
        if !self.catalog.is_assignable(source, derived_source) {
            return Err(MapperError::configuration(format!(
                "{} is not derived from {}",
                derived_source, source
            )));
        }
        if !self.catalog.is_assignable(target, derived_target) {
            return Err(MapperError::configuration(format!(
                "{} is not derived from {}",
                derived_target, target
            )));
        }

        if rule.scope.condition.is_none()
            && infer_pairs(&self.catalog, source, target)
                .iter()
                .any(|pair| pair.is_same_pair(derived_source, derived_target))
        {
            return Err(MapperError::configuration(format!(
                "{} is automatically mapped to {} when mapping {} to {} and does not need to be configured.",
                derived_source, derived_target, source, target
            )));
        }

        for existing in &self.rules {
            if let RuleAction::DerivedPair { source: other, .. } = &existing.action {
                if other == derived_source
                    && existing.scope.same_types(&rule.scope)
                    && existing.scope.rule_sets_overlap(&rule.scope)
                    && existing.scope.condition == rule.scope.condition
                {
                    return Err(MapperError::configuration(format!(
                        "A derived type pair for {} is already configured for {}",
                        derived_source, existing.scope
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_identifier(&self, rule: &ConfiguredRule, member: &str) -> MapperResult<()> {
        let Some(target) = &rule.scope.target_type else {
            return Err(MapperError::configuration("An identifier must be configured for a specific type"));
        };
        let exists = self
            .catalog
            .members_of(target)
            .iter()
            .any(|candidate| candidate.name == member && candidate.readable);
        if !exists {
            return Err(MapperError::configuration(format!(
                "Identifier member '{}' does not exist on type {}",
                member, target
            )));
        }
        Ok(())
    }

    fn by_specificity(&self, a: &ConfiguredRule, b: &ConfiguredRule) -> Ordering {
        b.scope
            .specificity(&self.catalog)
            .cmp(&a.scope.specificity(&self.catalog))
            .then(a.id.cmp(&b.id))
    }

    /// Data source and ignore rules for a member, in the order they are tried.
    ///
    /// The list ends at the first unconditional rule.
    pub fn member_rules(&self, source: &TypeName, target: &TypeName, rule_set: RuleSet, member: &[String]) -> Vec<Arc<ConfiguredRule>> {
        let mut matching: Vec<Arc<ConfiguredRule>> = self
            .rules
            .iter()
            .filter(|rule| {
                rule.is_member_rule()
                    && rule.targets_member(member)
                    && rule.scope.covers(source, target, rule_set, &self.catalog)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| self.by_specificity(a, b));
        if let Some(position) = matching.iter().position(|rule| rule.scope.condition.is_none()) {
            matching.truncate(position + 1);
        }
        matching
    }

    /// Whether a member rule or member callback targets a member nested below `prefix`.
    pub fn has_rules_below(&self, source: &TypeName, target: &TypeName, rule_set: RuleSet, prefix: &[String]) -> bool {
        self.rules.iter().any(|rule| {
            let member_level = rule.is_member_rule()
                || matches!(
                    rule.action,
                    RuleAction::Callback {
                        event: CallbackEvent::MemberPopulation,
                        ..
                    }
                );
            member_level
                && rule
                    .target_member
                    .as_deref()
                    .map(|path| path.len() > prefix.len() && path.starts_with(prefix))
                    .unwrap_or(false)
                && rule.scope.covers(source, target, rule_set, &self.catalog)
        })
    }

    /// Callback rules for an event, in registration order.
    ///
    /// Member callbacks registered without a member apply to every member.
    pub fn callbacks(
        &self,
        source: &TypeName,
        target: &TypeName,
        rule_set: RuleSet,
        event: CallbackEvent,
        timing: CallbackTiming,
        member: Option<&[String]>,
    ) -> Vec<Arc<ConfiguredRule>> {
        self.rules
            .iter()
            .filter(|rule| match &rule.action {
                RuleAction::Callback {
                    event: rule_event,
                    timing: rule_timing,
                    ..
                } => *rule_event == event && *rule_timing == timing,
                _ => false,
            })
            .filter(|rule| match (member, &rule.target_member) {
                (_, None) => true,
                (Some(path), Some(own)) => own.as_slice() == path,
                (None, Some(_)) => false,
            })
            .filter(|rule| rule.scope.covers(source, target, rule_set, &self.catalog))
            .cloned()
            .collect()
    }

    /// Derived pairs applying to a mapping: configured pairs, then inferred ones,
    /// most derived source first.
    pub fn derived_pairs(&self, source: &TypeName, target: &TypeName, rule_set: RuleSet) -> Vec<DerivedTypePair> {
        let mut pairs: Vec<DerivedTypePair> = self
            .rules
            .iter()
            .filter_map(|rule| match &rule.action {
                RuleAction::DerivedPair {
                    source: derived_source,
                    target: derived_target,
                } if rule.scope.covers(source, target, rule_set, &self.catalog)
                    && self.catalog.is_assignable(source, derived_source)
                    && self.catalog.is_assignable(target, derived_target) =>
                {
                    Some(DerivedTypePair {
                        declared_source: rule.scope.source_type.clone().unwrap_or_else(|| source.clone()),
                        declared_target: rule.scope.target_type.clone().unwrap_or_else(|| target.clone()),
                        derived_source: derived_source.clone(),
                        derived_target: derived_target.clone(),
                        condition: rule.scope.condition.clone(),
                        rule_set: rule.scope.rule_set,
                        configured: true,
                    })
                }
                _ => None,
            })
            .collect();

        for inferred in infer_pairs(&self.catalog, source, target) {
            let overridden = pairs
                .iter()
                .any(|pair| pair.derived_source == inferred.derived_source && pair.condition.is_none());
            if !overridden {
                pairs.push(inferred);
            }
        }

        pairs.retain(|pair| !pair.is_same_pair(source, target));
        pairs.sort_by(|a, b| {
            self.catalog
                .inheritance_depth(&b.derived_source)
                .cmp(&self.catalog.inheritance_depth(&a.derived_source))
                .then(a.condition.is_none().cmp(&b.condition.is_none()))
        });
        pairs
    }

    /// Configured identifier member for a type.
    pub fn identifier_for(&self, type_name: &TypeName) -> Option<String> {
        self.rules
            .iter()
            .filter_map(|rule| match (&rule.action, &rule.scope.target_type) {
                (RuleAction::Identifier(member), Some(target)) if self.catalog.is_assignable(target, type_name) => {
                    Some((rule, member))
                }
                _ => None,
            })
            .min_by(|(a, _), (b, _)| self.by_specificity(a, b))
            .map(|(_, member)| member.clone())
    }

    fn most_specific<'a>(&'a self, source: &TypeName, target: &TypeName, rule_set: RuleSet, accept: impl Fn(&'a RuleAction) -> bool) -> Option<&'a Arc<ConfiguredRule>> {
        self.rules
            .iter()
            .filter(|rule| accept(&rule.action) && rule.scope.covers(source, target, rule_set, &self.catalog))
            .min_by(|a, b| {
                b.scope
                    .specificity(&self.catalog)
                    .cmp(&a.scope.specificity(&self.catalog))
                    .then(b.id.cmp(&a.id))
            })
    }

    /// Object tracking override for a mapping; the latest most specific rule wins.
    pub fn object_tracking(&self, source: &TypeName, target: &TypeName, rule_set: RuleSet) -> Option<bool> {
        self.most_specific(source, target, rule_set, |action| matches!(action, RuleAction::ObjectTracking(_)))
            .and_then(|rule| match rule.action {
                RuleAction::ObjectTracking(enabled) => Some(enabled),
                _ => None,
            })
    }

    /// Error strategy for a mapping; the latest most specific rule wins.
    pub fn error_strategy(&self, source: &TypeName, target: &TypeName, rule_set: RuleSet) -> Option<ErrorStrategy> {
        self.most_specific(source, target, rule_set, |action| matches!(action, RuleAction::ErrorHandling(_)))
            .and_then(|rule| match &rule.action {
                RuleAction::ErrorHandling(strategy) => Some(strategy.clone()),
                _ => None,
            })
    }

    /// Rules whose scope is exactly these types, for diagnostics.
    pub fn rules_for_scope(&self, scope: &RuleScope) -> Vec<Arc<ConfiguredRule>> {
        self.rules
            .iter()
            .filter(|rule| rule.scope.same_types(scope))
            .cloned()
            .collect()
    }
}

fn conflict_message(existing: &ConfiguredRule, new: &ConfiguredRule) -> String {
    let member = new.member_path();
    match (&existing.action, &new.action) {
        (RuleAction::Ignore, RuleAction::Ignore) => {
            format!("Member '{}' has already been ignored for {}", member, existing.scope)
        }
        (RuleAction::Ignore, _) => format!(
            "Member '{}' has been ignored for {} and cannot also have a data source",
            member, existing.scope
        ),
        (_, RuleAction::Ignore) => format!(
            "Member '{}' has a configured data source for {} and cannot be ignored",
            member, existing.scope
        ),
        _ => format!(
            "Member '{}' already has a configured data source for {}",
            member, existing.scope
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expression;
    use crate::types::TypeDef;

    fn catalog() -> Arc<TypeCatalog> {
        let mut catalog = TypeCatalog::new();
        catalog
            .register(TypeDef::complex("Person").member("Id", "int").member("Name", "string"))
            .register(TypeDef::complex("Customer").extends("Person").member("Discount", "double"))
            .register(TypeDef::complex("PersonViewModel").member("Id", "int").member("Name", "string"))
            .register(TypeDef::complex("CustomerViewModel").extends("PersonViewModel"))
            .register(TypeDef::complex("Product").member("ProductId", "string"))
            .register(TypeDef::complex("MegaProduct").extends("Product"))
            .register(TypeDef::complex("ProductDto").member("ProductId", "string"))
            .register(TypeDef::complex("ProductDtoMega").extends("ProductDto"));
        Arc::new(catalog)
    }

    fn scope(source: &str, target: &str) -> RuleScope {
        RuleScope {
            source_type: Some(TypeName::new(source)),
            target_type: Some(TypeName::new(target)),
            ..Default::default()
        }
    }

    fn data_source(scope: RuleScope, member: &str, expr: &str) -> ConfiguredRule {
        ConfiguredRule::new(
            scope,
            Some(vec![member.to_string()]),
            RuleAction::DataSource(parse_expression(expr).unwrap()),
        )
    }

    fn derived(scope: RuleScope, source: &str, target: &str) -> ConfiguredRule {
        ConfiguredRule::new(
            scope,
            None,
            RuleAction::DerivedPair {
                source: TypeName::new(source),
                target: TypeName::new(target),
            },
        )
    }

    #[test]
    fn test_duplicate_data_source_conflicts() {
        let mut registry = RuleRegistry::new(catalog());
        registry
            .register(data_source(scope("Person", "PersonViewModel"), "Name", "source.Id"))
            .unwrap();
        let error = registry
            .register(data_source(scope("Person", "PersonViewModel"), "Name", "\"x\""))
            .unwrap_err();
        assert!(error.to_string().contains("already has a configured data source"));
    }

    #[test]
    fn test_conditional_after_unconditional_is_unreachable() {
        let mut registry = RuleRegistry::new(catalog());
        registry
            .register(data_source(scope("Person", "PersonViewModel"), "Name", "source.Id"))
            .unwrap();
        let mut conditional = scope("Person", "PersonViewModel");
        conditional.condition = Some(parse_expression("source.Id > 2").unwrap());
        let error = registry
            .register(data_source(conditional, "Name", "\"x\""))
            .unwrap_err();
        assert!(error.to_string().contains("would never apply"));
    }

    #[test]
    fn test_type_tests_in_conditions_are_rejected() {
        let mut registry = RuleRegistry::new(catalog());
        let mut conditional = scope("Person", "PersonViewModel");
        conditional.condition = Some(parse_expression("source is Customer").unwrap());
        let error = registry
            .register(data_source(conditional, "Name", "\"x\""))
            .unwrap_err();
        assert!(error.to_string().contains("Instead of type testing"));
    }

    #[test]
    fn test_unknown_target_member() {
        let mut registry = RuleRegistry::new(catalog());
        let error = registry
            .register(data_source(scope("Person", "PersonViewModel"), "Nmae", "source.Name"))
            .unwrap_err();
        assert!(error.to_string().contains("does not exist on type PersonViewModel"));
    }

    #[test]
    fn test_member_rules_order_and_stop_at_unconditional() {
        let mut registry = RuleRegistry::new(catalog());
        let mut conditional = scope("Person", "PersonViewModel");
        conditional.condition = Some(parse_expression("source.Id > 2").unwrap());
        registry.register(data_source(conditional, "Name", "\"big\"")).unwrap();
        registry
            .register(data_source(scope("Person", "PersonViewModel"), "Name", "\"general\""))
            .unwrap();
        registry
            .register(data_source(scope("Customer", "PersonViewModel"), "Name", "\"customer\""))
            .unwrap();

        let for_person = registry.member_rules(
            &TypeName::new("Person"),
            &TypeName::new("PersonViewModel"),
            RuleSet::CreateNew,
            &["Name".to_string()],
        );
        assert_eq!(for_person.iter().map(|rule| rule.id).collect::<Vec<_>>(), vec![0, 1]);

        let for_customer = registry.member_rules(
            &TypeName::new("Customer"),
            &TypeName::new("PersonViewModel"),
            RuleSet::CreateNew,
            &["Name".to_string()],
        );
        assert_eq!(for_customer.iter().map(|rule| rule.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_derived_pair_validation() {
        let mut registry = RuleRegistry::new(catalog());

        let same_source = registry
            .register(derived(scope("Person", "PersonViewModel"), "Person", "CustomerViewModel"))
            .unwrap_err();
        assert_eq!(
            same_source.to_string(),
            "Configuration error: A derived source type must be specified."
        );

        let same_target = registry
            .register(derived(scope("Person", "PersonViewModel"), "Customer", "PersonViewModel"))
            .unwrap_err();
        assert_eq!(
            same_target.to_string(),
            "Configuration error: A derived target type must be specified."
        );

        let redundant = registry
            .register(derived(scope("Person", "PersonViewModel"), "Customer", "CustomerViewModel"))
            .unwrap_err();
        assert_eq!(
            redundant.to_string(),
            "Configuration error: Customer is automatically mapped to CustomerViewModel when mapping \
             Person to PersonViewModel and does not need to be configured."
        );

        registry
            .register(derived(scope("Product", "ProductDto"), "MegaProduct", "ProductDtoMega"))
            .unwrap();
        let pairs = registry.derived_pairs(
            &TypeName::new("Product"),
            &TypeName::new("ProductDto"),
            RuleSet::CreateNew,
        );
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].configured);
    }

    #[test]
    fn test_latest_tracking_rule_wins() {
        let mut registry = RuleRegistry::new(catalog());
        registry
            .register(ConfiguredRule::new(RuleScope::default(), None, RuleAction::ObjectTracking(false)))
            .unwrap();
        registry
            .register(ConfiguredRule::new(
                scope("Person", "PersonViewModel"),
                None,
                RuleAction::ObjectTracking(true),
            ))
            .unwrap();

        let person = TypeName::new("Person");
        assert_eq!(
            registry.object_tracking(&person, &TypeName::new("PersonViewModel"), RuleSet::Merge),
            Some(true)
        );
        assert_eq!(
            registry.object_tracking(&person, &TypeName::new("Person"), RuleSet::Merge),
            Some(false)
        );
    }

    #[test]
    fn test_identifier_rules() {
        let mut registry = RuleRegistry::new(catalog());
        let product = RuleScope {
            target_type: Some(TypeName::new("Product")),
            ..Default::default()
        };
        registry
            .register(ConfiguredRule::new(product.clone(), None, RuleAction::Identifier("ProductId".into())))
            .unwrap();
        assert_eq!(
            registry.identifier_for(&TypeName::new("MegaProduct")),
            Some("ProductId".to_string())
        );
        assert!(registry
            .register(ConfiguredRule::new(product, None, RuleAction::Identifier("Code".into())))
            .is_err());
    }

    #[test]
    fn test_rules_below_a_member_path() {
        let mut registry = RuleRegistry::new(catalog());
        registry
            .register(data_source(scope("Person", "PersonViewModel"), "Name", "source.Id"))
            .unwrap();
        let person = TypeName::new("Person");
        let view_model = TypeName::new("PersonViewModel");

        assert!(registry.has_rules_below(&person, &view_model, RuleSet::CreateNew, &[]));
        assert!(!registry.has_rules_below(&person, &view_model, RuleSet::CreateNew, &["Name".to_string()]));
        assert!(!registry.has_rules_below(
            &TypeName::new("Product"),
            &TypeName::new("ProductDto"),
            RuleSet::CreateNew,
            &[]
        ));
    }
}
