//! # Mapping plans
//!
//! The plan compiler turns a (source type, target type, rule set) key into a
//! [`MappingPlan`]: an explicit tree describing how every target member is
//! populated, which nested objects are inlined, which are hoisted into
//! reusable functions and how collections are reconciled.
//!
//! ## Components
//!
//! * `ir` - Plan node types
//! * `matcher` - Source member matching, including flattened names
//! * `data_source` - Ordered data source chains for one target member
//! * `reconcile` - Identity-keyed collection diffs
//! * `builder` - Assembles the plan for a key
//! * `explain` - Renders a plan as text

pub mod builder;
pub mod data_source;
pub mod explain;
pub mod ir;
pub mod matcher;
pub mod reconcile;

pub use builder::PlanBuilder;
pub use explain::explain;
pub use ir::{
    CollectionPlan, ElementPlan, MapperKey, MappingPlan, MappingTarget, MemberPopulation, ObjectPlan, PlanRoot,
    SkipReason, ValueNode, WritePolicy,
};
pub use reconcile::{reconcile, CollectionDiff, IdentityKey};
