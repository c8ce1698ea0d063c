//! # Mapping rules
//!
//! Rules customise how members are populated for a (source type, target
//! type, rule set) scope, optionally only when a condition holds.
//!
//! ## Components
//!
//! * `rule` - Rule scopes, actions and callback types
//! * `derived` - Derived type pairs, configured and inferred
//! * `registry` - Validated rule storage and lookup
//! * `configurator` - Fluent registration surface

pub mod configurator;
pub mod derived;
pub mod registry;
pub mod rule;

pub use configurator::{CallbackSelector, MappingConfigurator, MemberTargetSelector};
pub use derived::{infer_pairs, DerivedTypePair};
pub use registry::RuleRegistry;
pub use rule::{
    CallbackContext, CallbackEvent, CallbackTiming, ConfiguredRule, ErrorCallback, ErrorStrategy, MappingCallback,
    RuleAction, RuleScope, RuleSet,
};
