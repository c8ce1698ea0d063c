//! Tree-walking plan evaluator.
//!
//! Each mapped object gets a [`Frame`] holding its source and target. Frames
//! link to the frame of the object that contains them, matching the scope
//! chain the plan was built with, so a node's `scope` says how many frames up
//! it reads from.

use super::session::MappingSession;
use super::MapperRuntime;
use crate::error::{MapperError, MapperResult};
use crate::expr::{Interpreter, VariableScope};
use crate::plan::ir::{
    CallbackNode, CollectionPlan, Condition, ElementPlan, MapperKey, MappingPlan, MappingTarget, MemberPopulation,
    MemberWrite, ObjectPlan, PlanRoot, ReadRoot, ValueNode, WritePolicy,
};
use crate::plan::reconcile::{reconcile, IdentityKey};
use crate::rules::{CallbackContext, ErrorStrategy, RuleSet};
use crate::types::{ListRef, TypeDescriptor, TypeName, Value};
use log::{debug, trace, warn};
use std::collections::{BTreeMap, HashSet};

/// Source and target of one object being mapped.
pub struct Frame<'a> {
    pub source: Value,
    pub target: Value,
    pub index: Option<usize>,
    pub parent: Option<&'a Frame<'a>>,
}

impl<'a> Frame<'a> {
    fn ancestor(&self, depth: usize) -> MapperResult<&Frame<'a>> {
        let mut current = self;
        for _ in 0..depth {
            current = current
                .parent
                .ok_or_else(|| MapperError::internal("Plan refers to a frame outside the current mapping"))?;
        }
        Ok(current)
    }

    /// Index of the closest enclosing collection element.
    fn nearest_index(&self) -> Option<usize> {
        self.index.or_else(|| self.parent.and_then(|parent| parent.nearest_index()))
    }
}

/// Variables visible to expressions evaluated in a frame.
struct FrameScope<'a> {
    frame: &'a Frame<'a>,
    bindings: &'a [(String, Value)],
}

impl VariableScope for FrameScope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some((_, value)) = self.bindings.iter().find(|(bound, _)| bound == name) {
            return Some(value.clone());
        }
        match name {
            "source" => Some(self.frame.source.clone()),
            "target" => Some(self.frame.target.clone()),
            "index" => Some(
                self.frame
                    .nearest_index()
                    .map(|index| Value::Int(index as i64))
                    .unwrap_or(Value::Null),
            ),
            _ => None,
        }
    }
}

fn read_path(start: &Value, path: &[String]) -> Value {
    let mut current = start.clone();
    for name in path {
        current = match &current {
            Value::Object(object) => object.get(name),
            _ => return Value::Null,
        };
    }
    current
}

/// Runs one plan against one source within a session.
pub struct Evaluator<'r> {
    plan: &'r MappingPlan,
    runtime: &'r dyn MapperRuntime,
    session: &'r mut MappingSession,
}

impl<'r> Evaluator<'r> {
    pub fn new(plan: &'r MappingPlan, runtime: &'r dyn MapperRuntime, session: &'r mut MappingSession) -> Self {
        Self { plan, runtime, session }
    }

    /// Maps `source`, onto `existing` when given.
    pub fn run(&mut self, source: Value, existing: Option<Value>) -> MapperResult<Value> {
        let plan = self.plan;
        match &plan.root {
            PlanRoot::Object(target) => self.map_target(target, source, existing, false, None, None),
            PlanRoot::Collection(collection) => self.map_collection(collection, source, existing, None),
        }
    }

    fn map_target(
        &mut self,
        target: &MappingTarget,
        source: Value,
        existing: Option<Value>,
        reuse_only: bool,
        parent: Option<&Frame<'_>>,
        index: Option<usize>,
    ) -> MapperResult<Value> {
        let plan = self.plan;
        match target {
            MappingTarget::Inline(object) => self.map_object(object, source, existing, reuse_only, parent, index),
            MappingTarget::Function { id, key } => {
                let function = plan
                    .function(*id)
                    .ok_or_else(|| MapperError::internal(format!("Missing mapping function #{} for {}", id, key)))?;
                self.map_object(function, source, existing, reuse_only, parent, index)
            }
            MappingTarget::Dynamic {
                target_type,
                rule_set,
                local_dispatch,
            } => self.map_dynamic(target_type, *rule_set, local_dispatch, source, existing, reuse_only, parent, index),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn map_dynamic(
        &mut self,
        target_type: &TypeName,
        rule_set: RuleSet,
        local_dispatch: &BTreeMap<TypeName, usize>,
        source: Value,
        existing: Option<Value>,
        reuse_only: bool,
        parent: Option<&Frame<'_>>,
        index: Option<usize>,
    ) -> MapperResult<Value> {
        let runtime_type = match &source {
            Value::Null => return Ok(Value::Null),
            Value::Object(object) => object.type_name(),
            other => {
                return Err(MapperError::internal(format!(
                    "Cannot map a {} value to {}",
                    other.kind_name(),
                    target_type
                )))
            }
        };
        if self.runtime.model().describe(&runtime_type)?.is_abstract {
            return Err(MapperError::configuration(format!(
                "Cannot map an instance of abstract type {}",
                runtime_type
            )));
        }

        let local = local_dispatch.get(&runtime_type);
        let key = MapperKey::new(runtime_type, target_type.clone(), rule_set);
        let plan = self.plan;
        if let Some(id) = local.or_else(|| plan.dispatch.get(&key)) {
            trace!("Dispatching {} to function #{}", key, id);
            let function = plan
                .function(*id)
                .ok_or_else(|| MapperError::internal(format!("Missing mapping function #{} for {}", id, key)))?;
            return self.map_object(function, source, existing, reuse_only, parent, index);
        }

        debug!("No compiled dispatch entry for {}; using its own mapper", key);
        let compiled = self.runtime.compiled_for(&key)?;
        let mut nested = Evaluator {
            plan: compiled.plan(),
            runtime: self.runtime,
            session: &mut *self.session,
        };
        match &compiled.plan().root {
            PlanRoot::Object(target) => nested.map_target(target, source, existing, reuse_only, parent, index),
            PlanRoot::Collection(_) => Err(MapperError::internal(format!("{} is not an object mapping", key))),
        }
    }

    fn map_object(
        &mut self,
        object: &ObjectPlan,
        source: Value,
        existing: Option<Value>,
        reuse_only: bool,
        parent: Option<&Frame<'_>>,
        index: Option<usize>,
    ) -> MapperResult<Value> {
        let source_object = match &source {
            Value::Null => return Ok(Value::Null),
            Value::Object(source_object) => source_object.clone(),
            other => {
                return Err(MapperError::internal(format!(
                    "Cannot map a {} value as {}",
                    other.kind_name(),
                    object.key.source_type
                )))
            }
        };
        let catalog = self.runtime.model().catalog();
        let runtime_type = source_object.type_name();
        let existing = existing.filter(|value| !value.is_null());
        let mut frame = Frame {
            source,
            target: existing.clone().unwrap_or(Value::Null),
            index,
            parent,
        };

        for branch in &object.derived {
            if !catalog.is_assignable(&branch.source_type, &runtime_type) {
                continue;
            }
            if let Some(condition) = &branch.condition {
                let holds = self
                    .condition_holds(condition, &frame, &[])
                    .map_err(|error| error.in_mapping(&object.key.source_type, &object.key.target_type, ""))?;
                if !holds {
                    continue;
                }
            }
            trace!(
                "Mapping {} as {} -> {}",
                runtime_type,
                branch.source_type,
                branch.target_type
            );
            let derived_existing = existing.clone().filter(|value| {
                value
                    .runtime_type()
                    .map(|existing_type| catalog.is_assignable(&branch.target_type, &existing_type))
                    .unwrap_or(false)
            });
            return self.map_target(&branch.target, frame.source, derived_existing, reuse_only, parent, index);
        }

        let target_type = &object.key.target_type;
        let usable = existing.filter(|value| {
            value
                .runtime_type()
                .map(|existing_type| catalog.is_assignable(target_type, &existing_type))
                .unwrap_or(false)
        });
        match usable {
            Some(value) => {
                if object.tracking && self.session.populated(&source_object, &value) {
                    return Ok(value);
                }
                frame.target = value;
            }
            None if reuse_only => return Ok(Value::Null),
            None => {
                if object.tracking {
                    if let Some(done) = self.session.tracked(&source_object, target_type) {
                        return Ok(done);
                    }
                }
                frame.target = Value::Null;
                self.run_callbacks(&object.callbacks.before_creation, object, &frame, None)?;
                let Some(created) = catalog.construct(target_type) else {
                    warn!("Unable to construct {}; leaving it unmapped", target_type);
                    return Ok(Value::Null);
                };
                frame.target = Value::Object(created);
                self.run_callbacks(&object.callbacks.after_creation, object, &frame, None)?;
            }
        }

        if object.tracking {
            self.session.track(&source_object, target_type, frame.target.clone());
        }

        self.run_callbacks(&object.callbacks.before_mapping, object, &frame, None)?;
        for member in &object.members {
            if let MemberPopulation::Populate(write) = member {
                self.populate(object, write, &frame)?;
            }
        }
        self.run_callbacks(&object.callbacks.after_mapping, object, &frame, None)?;
        Ok(frame.target)
    }

    fn populate(&mut self, object: &ObjectPlan, write: &MemberWrite, frame: &Frame<'_>) -> MapperResult<()> {
        self.run_callbacks(&write.before, object, frame, Some(&write.name))?;
        match self.resolve_member(write, frame) {
            Ok(Some(value)) => write_member(write, frame, value),
            Ok(None) => {}
            Err(error) => {
                let wrapped = error.in_mapping(&object.key.source_type, &object.key.target_type, &write.name);
                let Some(strategy) = &object.error_strategy else {
                    return Err(wrapped);
                };
                if let ErrorStrategy::Callback(callback) = strategy {
                    callback(&wrapped);
                }
                debug!("Recovered from mapping error: {}", wrapped);
                write_member(write, frame, write.member_type.default_value());
            }
        }
        self.run_callbacks(&write.after, object, frame, Some(&write.name))
    }

    fn resolve_member(&mut self, write: &MemberWrite, frame: &Frame<'_>) -> MapperResult<Option<Value>> {
        let mut bindings: Vec<(String, Value)> = Vec::with_capacity(write.bindings.len());
        for binding in &write.bindings {
            let value = self.evaluate(&binding.value, frame, &bindings)?;
            bindings.push((binding.name.clone(), value));
        }

        for branch in &write.branches {
            if let Some(condition) = &branch.condition {
                if !self.condition_holds(condition, frame, &bindings)? {
                    continue;
                }
            }
            return match &branch.value {
                Some(value) => self.evaluate(value, frame, &bindings).map(Some),
                None => Ok(None),
            };
        }
        Ok(None)
    }

    fn condition_holds(&self, condition: &Condition, frame: &Frame<'_>, bindings: &[(String, Value)]) -> MapperResult<bool> {
        let frame = frame.ancestor(condition.scope)?;
        let scope = FrameScope { frame, bindings };
        Ok(Interpreter::new(&scope)
            .with_catalog(self.runtime.model().catalog())
            .evaluate_condition(&condition.expr)?)
    }

    fn evaluate(&mut self, node: &ValueNode, frame: &Frame<'_>, bindings: &[(String, Value)]) -> MapperResult<Value> {
        match node {
            ValueNode::Constant(value) => Ok(value.clone()),
            ValueNode::Default { value, .. } => Ok(value.clone()),
            ValueNode::Read { root, path, scope } => {
                let frame = frame.ancestor(*scope)?;
                let start = match root {
                    ReadRoot::Source => &frame.source,
                    ReadRoot::Target => &frame.target,
                };
                Ok(read_path(start, path))
            }
            ValueNode::Local(name) => bindings
                .iter()
                .find(|(bound, _)| bound == name)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| MapperError::internal(format!("Unbound plan local {}", name))),
            ValueNode::Expression { expr, scope } => {
                let frame = frame.ancestor(*scope)?;
                let variables = FrameScope { frame, bindings };
                Ok(Interpreter::new(&variables)
                    .with_catalog(self.runtime.model().catalog())
                    .evaluate(expr)?)
            }
            ValueNode::Convert { value, to } => {
                let value = self.evaluate(value, frame, bindings)?;
                Ok(if value.is_null() {
                    Value::Null
                } else {
                    self.runtime.converter().convert(&value, to)
                })
            }
            ValueNode::Map(node) => {
                let source = self.evaluate(&node.source, frame, bindings)?;
                let existing = match &node.existing {
                    Some(existing) => Some(self.evaluate(existing, frame, bindings)?),
                    None => None,
                };
                self.map_target(&node.target, source, existing, node.reuse_only, Some(frame), None)
            }
            ValueNode::Collection { source, existing, plan } => {
                let source = self.evaluate(source, frame, bindings)?;
                let existing = match existing {
                    Some(existing) => Some(self.evaluate(existing, frame, bindings)?),
                    None => None,
                };
                self.map_collection(plan, source, existing, Some(frame))
            }
        }
    }

    fn run_callbacks(
        &self,
        callbacks: &[CallbackNode],
        object: &ObjectPlan,
        frame: &Frame<'_>,
        member: Option<&str>,
    ) -> MapperResult<()> {
        for node in callbacks {
            let label = member
                .map(str::to_string)
                .unwrap_or_else(|| format!("({:?} {})", node.timing, node.event).to_lowercase());
            if let Some(condition) = &node.condition {
                let holds = self
                    .condition_holds(condition, frame, &[])
                    .map_err(|error| error.in_mapping(&object.key.source_type, &object.key.target_type, &label))?;
                if !holds {
                    continue;
                }
            }
            let context = CallbackContext {
                source: frame.source.clone(),
                target: frame.target.clone(),
                source_type: object.key.source_type.clone(),
                target_type: object.key.target_type.clone(),
                rule_set: object.key.rule_set,
                member: member.map(str::to_string),
                index: frame.nearest_index(),
            };
            (node.callback)(&context).map_err(|message| {
                MapperError::callback(message).in_mapping(&object.key.source_type, &object.key.target_type, &label)
            })?;
        }
        Ok(())
    }

    fn map_collection(
        &mut self,
        plan: &CollectionPlan,
        source: Value,
        existing: Option<Value>,
        parent: Option<&Frame<'_>>,
    ) -> MapperResult<Value> {
        let items = match &source {
            Value::Null => return Ok(Value::Null),
            Value::List(list) => list.items(),
            other => {
                return Err(MapperError::internal(format!(
                    "Cannot map a {} value as {}",
                    other.kind_name(),
                    plan.source_type
                )))
            }
        };
        let existing = existing.as_ref().and_then(Value::as_list).cloned();
        let existing = match (plan.rule_set, existing) {
            // A constructor-initialised collection on a member that cannot be assigned.
            (RuleSet::CreateNew, Some(list)) if !plan.replaceable => Some(list),
            (RuleSet::CreateNew, _) => None,
            (_, list) => list,
        };

        let Some(list) = existing else {
            let mapped = self.map_all(plan, &items, parent)?;
            return Ok(Value::List(ListRef::new(plan.target_type.clone(), mapped)));
        };

        let mutable = plan.target_kind.supports_mutation();
        let can_grow = mutable || plan.replaceable;
        let current = list.items();
        let result = if plan.rule_set == RuleSet::CreateNew {
            self.map_all(plan, &items, parent)?
        } else if let Some(identity) = &plan.identity {
            let converter = self.runtime.converter();
            let source_keys: Vec<Option<IdentityKey>> = items
                .iter()
                .map(|item| identity_key(item, &identity.source_member, Some(identity.key_type.as_ref()), converter))
                .collect();
            let target_keys: Vec<Option<IdentityKey>> = current
                .iter()
                .map(|item| identity_key(item, &identity.target_member, None, converter))
                .collect();
            let diff = reconcile(&source_keys, &target_keys);

            let mut updated = current.clone();
            for (source_index, target_index) in &diff.matched {
                updated[*target_index] = self.map_element(
                    plan,
                    items[*source_index].clone(),
                    Some(current[*target_index].clone()),
                    *source_index,
                    parent,
                )?;
            }
            let absent: HashSet<usize> = if can_grow {
                diff.absent_items.iter().copied().collect()
            } else {
                HashSet::new()
            };
            let mut result: Vec<Value> = updated
                .into_iter()
                .enumerate()
                .filter(|(index, _)| !absent.contains(index))
                .map(|(_, value)| value)
                .collect();
            if can_grow {
                for source_index in &diff.new_items {
                    result.push(self.map_element(plan, items[*source_index].clone(), None, *source_index, parent)?);
                }
            } else if !diff.new_items.is_empty() {
                debug!(
                    "{} new element(s) not added to read-only {}",
                    diff.new_items.len(),
                    plan.target_type
                );
            }
            result
        } else if plan.rule_set == RuleSet::Overwrite {
            self.map_all(plan, &items, parent)?
        } else {
            let mut result = current.clone();
            for (index, item) in items.iter().enumerate() {
                let mapped = self.map_element(plan, item.clone(), None, index, parent)?;
                let duplicate = matches!(plan.element, ElementPlan::Simple(_)) && result.contains(&mapped);
                if !duplicate {
                    result.push(mapped);
                }
            }
            result
        };

        if mutable {
            list.replace_items(result);
            Ok(Value::List(list))
        } else if plan.replaceable {
            Ok(Value::List(ListRef::new(plan.target_type.clone(), result)))
        } else {
            debug!(
                "{} cannot be changed in place; only matched elements were updated",
                plan.target_type
            );
            Ok(Value::List(list))
        }
    }

    fn map_all(&mut self, plan: &CollectionPlan, items: &[Value], parent: Option<&Frame<'_>>) -> MapperResult<Vec<Value>> {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| self.map_element(plan, item.clone(), None, index, parent))
            .collect()
    }

    fn map_element(
        &mut self,
        plan: &CollectionPlan,
        item: Value,
        existing: Option<Value>,
        index: usize,
        parent: Option<&Frame<'_>>,
    ) -> MapperResult<Value> {
        match &plan.element {
            ElementPlan::Simple(element) => Ok(if item.is_null() {
                Value::Null
            } else {
                self.runtime.converter().convert(&item, element)
            }),
            ElementPlan::Complex(target) => self.map_target(target, item, existing, false, parent, Some(index)),
        }
    }
}

fn identity_key(
    item: &Value,
    member: &str,
    key_type: Option<&TypeDescriptor>,
    converter: &dyn crate::convert::ValueConverter,
) -> Option<IdentityKey> {
    let value = item.as_object()?.get(member);
    let value = match key_type {
        Some(key_type) if !value.is_null() => converter.convert(&value, key_type),
        _ => value,
    };
    IdentityKey::from_value(&value)
}

fn write_member(write: &MemberWrite, frame: &Frame<'_>, value: Value) {
    if write.policy == WritePolicy::Never {
        return;
    }
    let Some(target) = frame.target.as_object() else {
        return;
    };
    let value = if value.is_null() {
        if write.policy == WritePolicy::UnlessNull {
            return;
        }
        if write.member_type.accepts_null() {
            Value::Null
        } else {
            write.member_type.default_value()
        }
    } else {
        value
    };
    target.set(write.name.clone(), value);
}
