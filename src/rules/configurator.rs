//! Fluent rule configuration.
//!
//! Every method ends in a single [`Mapper::register`] call; the configurator
//! only assembles the [`ConfiguredRule`].
//!
//! ```ignore
//! mapper
//!     .when_mapping()
//!     .from("Person")
//!     .to("PersonViewModel")
//!     .map("source.Title + ' ' + source.Name")?
//!     .to("Name")?;
//! ```

use super::rule::{
    CallbackContext, CallbackEvent, CallbackTiming, ConfiguredRule, ErrorStrategy, RuleAction, RuleScope, RuleSet,
};
use crate::error::{MapperError, MapperResult};
use crate::expr::{parse_expression, Expression};
use crate::mapper::Mapper;
use crate::types::{TypeName, Value};
use std::sync::Arc;

fn member_path(member: &str) -> Vec<String> {
    member.split('.').map(|name| name.trim().to_string()).collect()
}

/// Scope being configured: source type, target type, rule set and condition.
#[derive(Clone)]
pub struct MappingConfigurator<'a> {
    mapper: &'a Mapper,
    scope: RuleScope,
}

impl<'a> MappingConfigurator<'a> {
    pub(crate) fn new(mapper: &'a Mapper) -> Self {
        Self {
            mapper,
            scope: RuleScope::default(),
        }
    }

    pub fn scope(&self) -> &RuleScope {
        &self.scope
    }

    pub fn from(mut self, source_type: impl Into<TypeName>) -> Self {
        self.scope.source_type = Some(source_type.into());
        self
    }

    /// Targets `target_type` in every rule set.
    pub fn to(mut self, target_type: impl Into<TypeName>) -> Self {
        self.scope.target_type = Some(target_type.into());
        self
    }

    pub fn to_new(self, target_type: impl Into<TypeName>) -> Self {
        self.to(target_type).in_rule_set(RuleSet::CreateNew)
    }

    pub fn on_to(self, target_type: impl Into<TypeName>) -> Self {
        self.to(target_type).in_rule_set(RuleSet::Merge)
    }

    pub fn over(self, target_type: impl Into<TypeName>) -> Self {
        self.to(target_type).in_rule_set(RuleSet::Overwrite)
    }

    pub fn in_rule_set(mut self, rule_set: RuleSet) -> Self {
        self.scope.rule_set = Some(rule_set);
        self
    }

    /// Restricts following rules to mappings where `condition` holds.
    pub fn when(mut self, condition: &str) -> MapperResult<Self> {
        self.scope.condition = Some(parse_expression(condition)?);
        Ok(self)
    }

    fn register(&self, target_member: Option<Vec<String>>, action: RuleAction) -> MapperResult<usize> {
        self.mapper
            .register(ConfiguredRule::new(self.scope.clone(), target_member, action))
    }

    /// Starts a data source rule from an expression over `source`, `target` and `index`.
    pub fn map(&self, expression: &str) -> MapperResult<MemberTargetSelector<'a>> {
        Ok(self.map_expression(parse_expression(expression)?))
    }

    pub fn map_constant(&self, value: impl Into<Value>) -> MemberTargetSelector<'a> {
        self.map_expression(Expression::literal(value))
    }

    pub fn map_expression(&self, expression: Expression) -> MemberTargetSelector<'a> {
        MemberTargetSelector {
            configurator: self.clone(),
            expression,
        }
    }

    /// Ignores each member, returning the rule ids.
    pub fn ignore(&self, members: &[&str]) -> MapperResult<Vec<usize>> {
        members
            .iter()
            .map(|member| self.register(Some(member_path(member)), RuleAction::Ignore))
            .collect()
    }

    /// Maps `derived_source` instances to `derived_target` within this scope.
    pub fn map_derived(
        &self,
        derived_source: impl Into<TypeName>,
        derived_target: impl Into<TypeName>,
    ) -> MapperResult<usize> {
        self.register(
            None,
            RuleAction::DerivedPair {
                source: derived_source.into(),
                target: derived_target.into(),
            },
        )
    }

    /// Declares the member identifying instances of `type_name` in collections.
    pub fn identify(&self, type_name: impl Into<TypeName>, member: &str) -> MapperResult<usize> {
        let scope = RuleScope {
            target_type: Some(type_name.into()),
            ..RuleScope::default()
        };
        self.mapper.register(ConfiguredRule::new(
            scope,
            None,
            RuleAction::Identifier(member.to_string()),
        ))
    }

    pub fn track_objects(&self, enabled: bool) -> MapperResult<usize> {
        self.register(None, RuleAction::ObjectTracking(enabled))
    }

    pub fn on_error(&self, strategy: ErrorStrategy) -> MapperResult<usize> {
        self.register(None, RuleAction::ErrorHandling(strategy))
    }

    pub fn swallow_errors(&self) -> MapperResult<usize> {
        self.on_error(ErrorStrategy::Swallow)
    }

    pub fn pass_errors_to<F>(&self, callback: F) -> MapperResult<usize>
    where
        F: Fn(&MapperError) + Send + Sync + 'static,
    {
        self.on_error(ErrorStrategy::Callback(Arc::new(callback)))
    }

    /// Callback before creating or mapping target objects.
    pub fn before(&self, event: CallbackEvent) -> CallbackSelector<'a> {
        self.callback(CallbackTiming::Before, event, None)
    }

    pub fn after(&self, event: CallbackEvent) -> CallbackSelector<'a> {
        self.callback(CallbackTiming::After, event, None)
    }

    pub fn before_member(&self, member: &str) -> CallbackSelector<'a> {
        self.callback(
            CallbackTiming::Before,
            CallbackEvent::MemberPopulation,
            Some(member_path(member)),
        )
    }

    pub fn after_member(&self, member: &str) -> CallbackSelector<'a> {
        self.callback(
            CallbackTiming::After,
            CallbackEvent::MemberPopulation,
            Some(member_path(member)),
        )
    }

    fn callback(&self, timing: CallbackTiming, event: CallbackEvent, member: Option<Vec<String>>) -> CallbackSelector<'a> {
        CallbackSelector {
            configurator: self.clone(),
            timing,
            event,
            member,
        }
    }
}

/// A data source waiting for its target member.
pub struct MemberTargetSelector<'a> {
    configurator: MappingConfigurator<'a>,
    expression: Expression,
}

impl MemberTargetSelector<'_> {
    /// Registers the rule for a member path such as `Address.Line1`.
    pub fn to(self, member: &str) -> MapperResult<usize> {
        self.configurator
            .register(Some(member_path(member)), RuleAction::DataSource(self.expression))
    }
}

/// A callback waiting for its function.
pub struct CallbackSelector<'a> {
    configurator: MappingConfigurator<'a>,
    timing: CallbackTiming,
    event: CallbackEvent,
    member: Option<Vec<String>>,
}

impl CallbackSelector<'_> {
    pub fn call<F>(self, callback: F) -> MapperResult<usize>
    where
        F: Fn(&CallbackContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.configurator.register(
            self.member,
            RuleAction::Callback {
                timing: self.timing,
                event: self.event,
                callback: Arc::new(callback),
            },
        )
    }
}
