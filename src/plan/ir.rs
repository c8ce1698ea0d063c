//! Intermediate representation of a compiled mapping.
//!
//! A [`MappingPlan`] is a tree of [`ObjectPlan`]s and [`CollectionPlan`]s
//! whose leaves are [`ValueNode`]s. Recursive types are hoisted into the
//! plan's function table and referenced by index, and objects whose runtime
//! type is only known while mapping go through the dispatch table.

use crate::expr::Expression;
use crate::rules::{CallbackEvent, CallbackTiming, ErrorStrategy, MappingCallback, RuleSet};
use crate::types::{CollectionKind, QualifiedMember, TypeDescriptor, TypeName, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Cache key of a compiled mapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapperKey {
    pub source_type: TypeName,
    pub target_type: TypeName,
    pub rule_set: RuleSet,
}

impl MapperKey {
    pub fn new(source_type: impl Into<TypeName>, target_type: impl Into<TypeName>, rule_set: RuleSet) -> Self {
        Self {
            source_type: source_type.into(),
            target_type: target_type.into(),
            rule_set,
        }
    }
}

impl fmt::Display for MapperKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.source_type, self.target_type, self.rule_set)
    }
}

/// Which object of a frame a read starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRoot {
    Source,
    Target,
}

/// A condition evaluated in the frame `scope` levels above the current one.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub expr: Expression,
    pub scope: usize,
}

/// Produces one value while a plan runs.
#[derive(Debug, Clone)]
pub enum ValueNode {
    Constant(Value),
    /// A type's default value, written when a member has no source
    Default { type_name: TypeName, value: Value },
    Read {
        root: ReadRoot,
        path: Vec<String>,
        scope: usize,
    },
    /// A member-level binding evaluated once before the branches
    Local(String),
    Expression { expr: Expression, scope: usize },
    Convert {
        value: Box<ValueNode>,
        to: Arc<TypeDescriptor>,
    },
    Map(MapNode),
    Collection {
        source: Box<ValueNode>,
        existing: Option<Box<ValueNode>>,
        plan: Box<CollectionPlan>,
    },
}

impl ValueNode {
    pub fn read_source(path: Vec<String>) -> Self {
        ValueNode::Read {
            root: ReadRoot::Source,
            path,
            scope: 0,
        }
    }

    pub fn read_target(path: Vec<String>) -> Self {
        ValueNode::Read {
            root: ReadRoot::Target,
            path,
            scope: 0,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ValueNode::Default { .. })
    }
}

/// Maps a complex value.
#[derive(Debug, Clone)]
pub struct MapNode {
    pub source: Box<ValueNode>,
    /// Current value of the target member, mapped onto when usable
    pub existing: Option<Box<ValueNode>>,
    pub target: MappingTarget,
    /// The member cannot be assigned, so only an existing instance is populated
    pub reuse_only: bool,
}

/// Where the mapping logic for an object lives.
#[derive(Debug, Clone)]
pub enum MappingTarget {
    Inline(Box<ObjectPlan>),
    /// Entry in the plan's function table
    Function { id: usize, key: MapperKey },
    /// Resolved from the source's runtime type while mapping
    Dynamic {
        target_type: TypeName,
        rule_set: RuleSet,
        /// Runtime source types compiled for this call site only
        local_dispatch: BTreeMap<TypeName, usize>,
    },
}

/// A user callback and its optional condition.
#[derive(Clone)]
pub struct CallbackNode {
    pub rule_id: usize,
    pub timing: CallbackTiming,
    pub event: CallbackEvent,
    pub condition: Option<Condition>,
    pub callback: MappingCallback,
}

impl fmt::Debug for CallbackNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackNode")
            .field("rule_id", &self.rule_id)
            .field("timing", &self.timing)
            .field("event", &self.event)
            .field("condition", &self.condition)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectCallbacks {
    pub before_creation: Vec<CallbackNode>,
    pub after_creation: Vec<CallbackNode>,
    pub before_mapping: Vec<CallbackNode>,
    pub after_mapping: Vec<CallbackNode>,
}

/// Redirects mapping to a more derived pair when the runtime source allows it.
#[derive(Debug, Clone)]
pub struct DerivedBranch {
    pub source_type: TypeName,
    pub target_type: TypeName,
    pub condition: Option<Condition>,
    pub target: MappingTarget,
}

/// How one (source type, target type) pair is mapped.
#[derive(Debug, Clone)]
pub struct ObjectPlan {
    pub key: MapperKey,
    pub target: QualifiedMember,
    pub derived: Vec<DerivedBranch>,
    pub tracking: bool,
    pub callbacks: ObjectCallbacks,
    pub members: Vec<MemberPopulation>,
    pub error_strategy: Option<ErrorStrategy>,
}

impl ObjectPlan {
    /// Whether any member gets a value from somewhere other than a default.
    pub fn populates_anything(&self) -> bool {
        self.members.iter().any(|member| match member {
            MemberPopulation::Populate(write) => write
                .branches
                .iter()
                .any(|branch| branch.value.as_ref().map(|value| !value.is_default()).unwrap_or(false)),
            MemberPopulation::Skipped { .. } => false,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoDataSource,
    Ignored,
    ReadOnly,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoDataSource => write!(f, "no data source"),
            SkipReason::Ignored => write!(f, "ignored"),
            SkipReason::ReadOnly => write!(f, "read-only"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum MemberPopulation {
    Skipped { member: QualifiedMember, reason: SkipReason },
    Populate(MemberWrite),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    Always,
    UnlessNull,
    /// Read-only member populated in place
    Never,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub value: ValueNode,
}

#[derive(Debug, Clone)]
pub struct SourceBranch {
    pub condition: Option<Condition>,
    /// `None` leaves the member untouched
    pub value: Option<ValueNode>,
    pub description: String,
}

/// Populates one target member from the first branch whose condition holds.
#[derive(Debug, Clone)]
pub struct MemberWrite {
    pub member: QualifiedMember,
    pub name: String,
    pub member_type: Arc<TypeDescriptor>,
    pub bindings: Vec<Binding>,
    pub branches: Vec<SourceBranch>,
    pub policy: WritePolicy,
    pub before: Vec<CallbackNode>,
    pub after: Vec<CallbackNode>,
}

/// Identity members used to match source elements with existing target elements.
#[derive(Debug, Clone)]
pub struct IdentityPlan {
    pub source_member: String,
    pub target_member: String,
    pub key_type: Arc<TypeDescriptor>,
}

#[derive(Debug, Clone)]
pub enum ElementPlan {
    Simple(Arc<TypeDescriptor>),
    Complex(MappingTarget),
}

#[derive(Debug, Clone)]
pub struct CollectionPlan {
    pub source_type: TypeName,
    pub target_type: TypeName,
    pub target_kind: CollectionKind,
    pub rule_set: RuleSet,
    pub element: ElementPlan,
    pub identity: Option<IdentityPlan>,
    /// The owning member can be assigned a new collection
    pub replaceable: bool,
}

#[derive(Debug, Clone)]
pub enum PlanRoot {
    Object(MappingTarget),
    Collection(CollectionPlan),
}

/// The complete compiled mapping for one key.
#[derive(Debug, Clone)]
pub struct MappingPlan {
    pub key: MapperKey,
    pub root: PlanRoot,
    pub functions: Vec<ObjectPlan>,
    pub dispatch: BTreeMap<MapperKey, usize>,
    /// Build-time observations such as unconstructible types
    pub notes: Vec<String>,
}

impl MappingPlan {
    pub fn function(&self, id: usize) -> Option<&ObjectPlan> {
        self.functions.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_order_and_display() {
        let first = MapperKey::new("Person", "PersonViewModel", RuleSet::CreateNew);
        let second = MapperKey::new("Person", "PersonViewModel", RuleSet::Merge);
        assert!(first < second);
        assert_eq!(first.to_string(), "Person -> PersonViewModel (CreateNew)");
    }
}
