//! Configured rules and their scopes.

use crate::error::MapperError;
use crate::expr::Expression;
use crate::types::{TypeCatalog, TypeName, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How the target of a mapping is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleSet {
    /// Build a fresh target graph
    CreateNew,
    /// Fill only unset target members
    Merge,
    /// Replace every target member, nulling those with no source
    Overwrite,
}

impl RuleSet {
    pub const ALL: [RuleSet; 3] = [RuleSet::CreateNew, RuleSet::Merge, RuleSet::Overwrite];

    pub fn name(&self) -> &'static str {
        match self {
            RuleSet::CreateNew => "CreateNew",
            RuleSet::Merge => "Merge",
            RuleSet::Overwrite => "Overwrite",
        }
    }

    /// Whether the root target is an existing, populated instance.
    pub fn has_existing_target(&self) -> bool {
        !matches!(self, RuleSet::CreateNew)
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a rule applies: source type, target type, rule set and an optional condition.
///
/// Unset parts match anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleScope {
    pub source_type: Option<TypeName>,
    pub target_type: Option<TypeName>,
    pub rule_set: Option<RuleSet>,
    pub condition: Option<Expression>,
}

impl RuleScope {
    pub fn applies_to_rule_set(&self, rule_set: RuleSet) -> bool {
        self.rule_set.map(|own| own == rule_set).unwrap_or(true)
    }

    /// Whether a mapping from `source` to `target` falls inside this scope.
    ///
    /// The source must be assignable to the configured source type; the
    /// target may be related in either direction.
    pub fn covers_types(&self, source: &TypeName, target: &TypeName, catalog: &TypeCatalog) -> bool {
        let source_ok = self
            .source_type
            .as_ref()
            .map(|own| catalog.is_assignable(own, source))
            .unwrap_or(true);
        let target_ok = self
            .target_type
            .as_ref()
            .map(|own| catalog.is_assignable(own, target) || catalog.is_assignable(target, own))
            .unwrap_or(true);
        source_ok && target_ok
    }

    pub fn covers(&self, source: &TypeName, target: &TypeName, rule_set: RuleSet, catalog: &TypeCatalog) -> bool {
        self.applies_to_rule_set(rule_set) && self.covers_types(source, target, catalog)
    }

    pub fn same_types(&self, other: &RuleScope) -> bool {
        self.source_type == other.source_type && self.target_type == other.target_type
    }

    pub fn rule_sets_overlap(&self, other: &RuleScope) -> bool {
        match (self.rule_set, other.rule_set) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Sort key: rules for more derived types win.
    pub fn specificity(&self, catalog: &TypeCatalog) -> (usize, usize) {
        let depth = |ty: &Option<TypeName>| ty.as_ref().map(|ty| catalog.inheritance_depth(ty) + 1).unwrap_or(0);
        (depth(&self.source_type), depth(&self.target_type))
    }
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let describe = |ty: &Option<TypeName>, any: &'static str| {
            ty.as_ref().map(|ty| ty.to_string()).unwrap_or_else(|| any.to_string())
        };
        write!(
            f,
            "{} -> {}",
            describe(&self.source_type, "any source"),
            describe(&self.target_type, "any target")
        )?;
        if let Some(rule_set) = self.rule_set {
            write!(f, " ({})", rule_set)?;
        }
        if let Some(condition) = &self.condition {
            write!(f, " when {}", condition)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackTiming {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackEvent {
    ObjectCreation,
    ObjectMapping,
    MemberPopulation,
}

impl fmt::Display for CallbackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackEvent::ObjectCreation => write!(f, "creating"),
            CallbackEvent::ObjectMapping => write!(f, "mapping"),
            CallbackEvent::MemberPopulation => write!(f, "populating"),
        }
    }
}

/// What a callback sees.
#[derive(Debug, Clone)]
pub struct CallbackContext {
    pub source: Value,
    /// The target instance; null before creation
    pub target: Value,
    pub source_type: TypeName,
    pub target_type: TypeName,
    pub rule_set: RuleSet,
    /// Member being populated, for member callbacks
    pub member: Option<String>,
    /// Element index inside a collection
    pub index: Option<usize>,
}

pub type MappingCallback = Arc<dyn Fn(&CallbackContext) -> Result<(), String> + Send + Sync>;

pub type ErrorCallback = Arc<dyn Fn(&MapperError) + Send + Sync>;

/// What happens when a member population fails.
#[derive(Clone)]
pub enum ErrorStrategy {
    /// Leave the member at its default and carry on
    Swallow,
    /// Report the wrapped error, then carry on as with `Swallow`
    Callback(ErrorCallback),
}

impl fmt::Debug for ErrorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorStrategy::Swallow => write!(f, "Swallow"),
            ErrorStrategy::Callback(_) => write!(f, "Callback(..)"),
        }
    }
}

#[derive(Clone)]
pub enum RuleAction {
    /// Populate the member from an expression (constants are literals)
    DataSource(Expression),
    Ignore,
    Callback {
        timing: CallbackTiming,
        event: CallbackEvent,
        callback: MappingCallback,
    },
    /// Map the scope's source type as `source` to `target` when the runtime type allows
    DerivedPair { source: TypeName, target: TypeName },
    ObjectTracking(bool),
    /// Member that identifies instances of the scope's target type
    Identifier(String),
    ErrorHandling(ErrorStrategy),
}

impl RuleAction {
    pub fn label(&self) -> &'static str {
        match self {
            RuleAction::DataSource(_) => "data source",
            RuleAction::Ignore => "ignore",
            RuleAction::Callback { .. } => "callback",
            RuleAction::DerivedPair { .. } => "derived type pair",
            RuleAction::ObjectTracking(_) => "object tracking",
            RuleAction::Identifier(_) => "identifier",
            RuleAction::ErrorHandling(_) => "error handling",
        }
    }
}

impl fmt::Debug for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::DataSource(expr) => write!(f, "DataSource({})", expr),
            RuleAction::Ignore => write!(f, "Ignore"),
            RuleAction::Callback { timing, event, .. } => write!(f, "Callback({:?} {:?})", timing, event),
            RuleAction::DerivedPair { source, target } => write!(f, "DerivedPair({} -> {})", source, target),
            RuleAction::ObjectTracking(enabled) => write!(f, "ObjectTracking({})", enabled),
            RuleAction::Identifier(member) => write!(f, "Identifier({})", member),
            RuleAction::ErrorHandling(strategy) => write!(f, "ErrorHandling({:?})", strategy),
        }
    }
}

/// A user rule. `id` is assigned at registration and orders ties.
#[derive(Debug, Clone)]
pub struct ConfiguredRule {
    pub id: usize,
    pub scope: RuleScope,
    /// Member path relative to the scope's target type
    pub target_member: Option<Vec<String>>,
    pub action: RuleAction,
}

impl ConfiguredRule {
    pub fn new(scope: RuleScope, target_member: Option<Vec<String>>, action: RuleAction) -> Self {
        Self {
            id: 0,
            scope,
            target_member,
            action,
        }
    }

    /// Data source and ignore rules decide what populates a member.
    pub fn is_member_rule(&self) -> bool {
        matches!(self.action, RuleAction::DataSource(_) | RuleAction::Ignore)
    }

    pub fn targets_member(&self, path: &[String]) -> bool {
        self.target_member.as_deref() == Some(path)
    }

    pub fn member_path(&self) -> String {
        self.target_member
            .as_ref()
            .map(|path| path.join("."))
            .unwrap_or_default()
    }

    /// Same member, same types, overlapping rule sets and equal conditions.
    pub fn conflicts_with(&self, other: &ConfiguredRule) -> bool {
        self.is_member_rule()
            && other.is_member_rule()
            && self.target_member == other.target_member
            && self.scope.same_types(&other.scope)
            && self.scope.rule_sets_overlap(&other.scope)
            && self.scope.condition == other.scope.condition
    }

    /// An earlier unconditional rule for the same member makes a later conditional one dead.
    pub fn shadows(&self, later: &ConfiguredRule) -> bool {
        self.is_member_rule()
            && later.is_member_rule()
            && self.scope.condition.is_none()
            && later.scope.condition.is_some()
            && self.target_member == later.target_member
            && self.scope.same_types(&later.scope)
            && (self.scope.rule_set.is_none() || self.scope.rule_set == later.scope.rule_set)
    }
}
