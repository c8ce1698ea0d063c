//! Mapping plan builder.
//!
//! Walks the target type's members once per key, asking the data source
//! resolver how each member is populated. Non-recursive nested objects are
//! inlined; recursive ones, derived pairs and runtime-dispatched sources are
//! compiled into the plan's function table. A function is built from the
//! root of its pair unless rules of an enclosing level reach into it, in
//! which case it keeps those levels and is only shared with call sites
//! nested the same way.

use super::ir::{
    CallbackNode, CollectionPlan, Condition, DerivedBranch, ElementPlan, IdentityPlan, MapperKey, MappingPlan,
    MappingTarget, MemberPopulation, MemberWrite, ObjectCallbacks, ObjectPlan, PlanRoot, SkipReason, SourceBranch,
    ValueNode, WritePolicy,
};
use crate::config::MapperConfig;
use crate::convert::ValueConverter;
use crate::error::{MapperError, MapperResult};
use crate::rules::{CallbackEvent, CallbackTiming, ConfiguredRule, RuleAction, RuleRegistry, RuleSet};
use crate::types::{
    CollectionKind, Member, MemberDef, MemberModel, QualifiedMember, TypeCategory, TypeDescriptor, TypeName,
};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Where the builder is while walking a plan.
///
/// Each inline object or collection element is one scope; at run time each
/// becomes one evaluation frame.
#[derive(Debug)]
pub(crate) struct Scope<'s> {
    pub parent: Option<&'s Scope<'s>>,
    pub source_type: TypeName,
    pub target_type: TypeName,
    /// Member of the parent target this scope populates
    pub target_member: Option<String>,
    /// Member names prefixed to flattened source names when unflattening
    pub naming_path: Vec<String>,
    pub target_path: QualifiedMember,
}

impl<'s> Scope<'s> {
    pub fn root(source_type: &TypeName, target_type: &TypeName) -> Scope<'static> {
        Scope {
            parent: None,
            source_type: source_type.clone(),
            target_type: target_type.clone(),
            target_member: None,
            naming_path: Vec::new(),
            target_path: QualifiedMember::root(target_type.clone()),
        }
    }

    pub fn child(&'s self, source_type: &TypeName, target_type: &TypeName, member: Option<&Member>, naming_path: Vec<String>) -> Scope<'s> {
        Scope {
            parent: Some(self),
            source_type: source_type.clone(),
            target_type: target_type.clone(),
            target_member: member.map(|member| member.name.clone()),
            naming_path,
            target_path: match member {
                Some(member) => self.target_path.append(member.clone()),
                None => QualifiedMember::root(target_type.clone()),
            },
        }
    }

    pub fn key(&self, rule_set: RuleSet) -> MapperKey {
        MapperKey::new(self.source_type.clone(), self.target_type.clone(), rule_set)
    }

    /// Levels whose rules can target `name`, innermost first, with the member
    /// path relative to each level's target type.
    pub fn rule_paths(&self, name: &str) -> Vec<(usize, &Scope<'s>, Vec<String>)> {
        let mut levels = vec![(0, self, vec![name.to_string()])];
        let mut current: &Scope<'s> = self;
        let mut path = vec![name.to_string()];
        let mut depth = 0;
        while let (Some(member), Some(parent)) = (&current.target_member, current.parent) {
            path.insert(0, member.clone());
            depth += 1;
            levels.push((depth, parent, path.clone()));
            current = parent;
        }
        levels
    }

    /// The same position in the plan, mapping another pair.
    pub fn with_types(&self, source_type: &TypeName, target_type: &TypeName) -> Scope<'s> {
        Scope {
            parent: self.parent,
            source_type: source_type.clone(),
            target_type: target_type.clone(),
            target_member: self.target_member.clone(),
            naming_path: self.naming_path.clone(),
            target_path: if self.target_path.is_root() {
                QualifiedMember::root(target_type.clone())
            } else {
                self.target_path.clone()
            },
        }
    }

    /// Display form of a member of this scope's target.
    pub fn member_label(&self, name: &str) -> String {
        if self.target_path.is_root() {
            format!("{}.{}", self.target_type, name)
        } else {
            format!("{}.{}.{}", self.target_path.root_type(), self.target_path.path(), name)
        }
    }
}

/// Enclosing levels whose rules reach below a scope, innermost first, with
/// the path from each level down to the scope's member.
type RuleContext = Vec<(TypeName, TypeName, Vec<String>)>;

/// Builds one [`MappingPlan`].
pub struct PlanBuilder<'a> {
    pub(super) model: &'a MemberModel,
    pub(super) converter: &'a dyn ValueConverter,
    pub(super) registry: &'a RuleRegistry,
    pub(super) config: &'a MapperConfig,
    pub(super) rule_set: RuleSet,
    functions: Vec<Option<ObjectPlan>>,
    function_ids: HashMap<(MapperKey, RuleContext), usize>,
    dispatch: BTreeMap<MapperKey, usize>,
    pub(super) inline_stack: Vec<MapperKey>,
    pub(super) notes: Vec<String>,
    recursive: HashMap<TypeName, bool>,
    pub(super) next_binding: usize,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(
        model: &'a MemberModel,
        converter: &'a dyn ValueConverter,
        registry: &'a RuleRegistry,
        config: &'a MapperConfig,
        rule_set: RuleSet,
    ) -> Self {
        Self {
            model,
            converter,
            registry,
            config,
            rule_set,
            functions: Vec::new(),
            function_ids: HashMap::new(),
            dispatch: BTreeMap::new(),
            inline_stack: Vec::new(),
            notes: Vec::new(),
            recursive: HashMap::new(),
            next_binding: 0,
        }
    }

    /// Builds the plan for mapping `source_type` to `target_type`.
    pub fn build(mut self, source_type: &TypeName, target_type: &TypeName) -> MapperResult<MappingPlan> {
        let key = MapperKey::new(source_type.clone(), target_type.clone(), self.rule_set);
        debug!("Building mapping plan for {}", key);

        let source = self.model.describe(source_type)?;
        let target = self.model.describe(target_type)?;
        let root = if source.is_enumerable() && target.is_enumerable() {
            PlanRoot::Collection(self.collection_plan(None, &source, &target, true, "")?)
        } else if source.is_complex() && target.is_complex() {
            PlanRoot::Object(self.mapping_target(None, None, source_type, target_type)?)
        } else {
            return Err(MapperError::UnconvertibleType {
                source_type: source_type.clone(),
                target_type: target_type.clone(),
                member: String::new(),
            });
        };

        let functions = self
            .functions
            .into_iter()
            .enumerate()
            .map(|(id, function)| {
                function.ok_or_else(|| MapperError::internal(format!("Mapping function #{} was never built", id)))
            })
            .collect::<MapperResult<Vec<_>>>()?;

        info!(
            "Built mapping plan for {} with {} function(s) and {} dispatch entr(ies)",
            key,
            functions.len(),
            self.dispatch.len()
        );
        Ok(MappingPlan {
            key,
            root,
            functions,
            dispatch: self.dispatch,
            notes: self.notes,
        })
    }

    pub(super) fn note(&mut self, note: String) {
        if !self.notes.contains(&note) {
            debug!("Plan note: {}", note);
            self.notes.push(note);
        }
    }

    /// Decides how a nested (source type, target type) pair is mapped.
    pub(super) fn mapping_target(
        &mut self,
        parent: Option<&Scope<'_>>,
        member: Option<&Member>,
        source_type: &TypeName,
        target_type: &TypeName,
    ) -> MapperResult<MappingTarget> {
        let scope = match parent {
            Some(parent) => parent.child(source_type, target_type, member, Vec::new()),
            None => Scope::root(source_type, target_type),
        };
        let key = scope.key(self.rule_set);
        if self.model.describe(source_type)?.is_abstract {
            return self.dynamic_target(&scope);
        }
        if self.is_recursive(target_type)? || self.inline_stack.contains(&key) {
            let id = self.function_for(&scope)?;
            return Ok(MappingTarget::Function { id, key });
        }
        Ok(MappingTarget::Inline(Box::new(self.object_plan(&scope)?)))
    }

    /// Enclosing levels of `scope` with data source, ignore or member callback
    /// rules for members below it.
    fn rule_context(&self, scope: &Scope<'_>) -> RuleContext {
        let (Some(parent), Some(member)) = (scope.parent, &scope.target_member) else {
            return Vec::new();
        };
        let levels = parent.rule_paths(member);
        let reach = levels.iter().rposition(|(_, level, path)| {
            self.registry
                .has_rules_below(&level.source_type, &level.target_type, self.rule_set, path)
        });
        match reach {
            Some(last) => levels[..=last]
                .iter()
                .map(|(_, level, path)| (level.source_type.clone(), level.target_type.clone(), path.clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Reserves a function slot for the pair `scope` maps, building it on first request.
    fn function_for(&mut self, scope: &Scope<'_>) -> MapperResult<usize> {
        let key = scope.key(self.rule_set);
        let context = self.rule_context(scope);
        let slot = (key, context);
        if let Some(id) = self.function_ids.get(&slot) {
            return Ok(*id);
        }
        let id = self.functions.len();
        self.functions.push(None);
        self.function_ids.insert(slot.clone(), id);
        let (key, context) = slot;

        let saved = std::mem::take(&mut self.inline_stack);
        let plan = if context.is_empty() {
            debug!("Compiling {} as mapping function #{}", key, id);
            self.object_plan(&Scope::root(&key.source_type, &key.target_type))
        } else {
            debug!(
                "Compiling {} as mapping function #{} within {} enclosing level(s)",
                key,
                id,
                context.len()
            );
            self.object_plan(scope)
        };
        self.inline_stack = saved;
        self.functions[id] = Some(plan?);
        Ok(id)
    }

    /// Dispatch on the runtime source type, pre-compiling every concrete derived type.
    ///
    /// Functions built within enclosing rules stay local to the call site.
    fn dynamic_target(&mut self, scope: &Scope<'_>) -> MapperResult<MappingTarget> {
        let within_rules = !self.rule_context(scope).is_empty();
        let mut local_dispatch = BTreeMap::new();
        for derived in self.model.catalog().derived_types_of(&scope.source_type) {
            let descriptor = self.model.describe(&derived)?;
            if descriptor.is_abstract || !descriptor.is_complex() {
                continue;
            }
            let branch = scope.with_types(&derived, &scope.target_type);
            let id = self.function_for(&branch)?;
            if within_rules {
                local_dispatch.insert(derived, id);
            } else {
                self.dispatch.insert(branch.key(self.rule_set), id);
            }
        }
        Ok(MappingTarget::Dynamic {
            target_type: scope.target_type.clone(),
            rule_set: self.rule_set,
            local_dispatch,
        })
    }

    /// Whether a type can reach itself through its complex and element members.
    fn is_recursive(&mut self, type_name: &TypeName) -> MapperResult<bool> {
        if let Some(known) = self.recursive.get(type_name) {
            return Ok(*known);
        }
        let mut seen = HashSet::new();
        let mut pending = self.referenced_types(type_name)?;
        let mut found = false;
        while let Some(next) = pending.pop() {
            if &next == type_name {
                found = true;
                break;
            }
            if seen.insert(next.clone()) {
                pending.extend(self.referenced_types(&next)?);
            }
        }
        self.recursive.insert(type_name.clone(), found);
        Ok(found)
    }

    fn referenced_types(&self, type_name: &TypeName) -> MapperResult<Vec<TypeName>> {
        let descriptor = self.model.describe(type_name)?;
        Ok(match descriptor.category {
            TypeCategory::Simple => Vec::new(),
            TypeCategory::Enumerable => descriptor.element_type.iter().cloned().collect(),
            TypeCategory::Complex => descriptor
                .members
                .iter()
                .map(|member| member.type_name.clone())
                .chain(descriptor.element_type.iter().cloned())
                .collect(),
        })
    }

    pub(super) fn object_plan(&mut self, scope: &Scope<'_>) -> MapperResult<ObjectPlan> {
        let key = scope.key(self.rule_set);
        self.inline_stack.push(key.clone());
        let plan = self.build_object(scope, key);
        self.inline_stack.pop();
        plan
    }

    fn build_object(&mut self, scope: &Scope<'_>, key: MapperKey) -> MapperResult<ObjectPlan> {
        let target = self.model.describe(&scope.target_type)?;
        if !target.constructible {
            self.note(format!(
                "{} cannot be constructed; existing instances are reused",
                scope.target_type
            ));
        }

        let derived = self.derived_branches(scope)?;
        let tracking = self
            .registry
            .object_tracking(&scope.source_type, &scope.target_type, self.rule_set)
            .unwrap_or(self.config.tracking.object_tracking);
        let callbacks = ObjectCallbacks {
            before_creation: self.callbacks(scope, CallbackEvent::ObjectCreation, CallbackTiming::Before),
            after_creation: self.callbacks(scope, CallbackEvent::ObjectCreation, CallbackTiming::After),
            before_mapping: self.callbacks(scope, CallbackEvent::ObjectMapping, CallbackTiming::Before),
            after_mapping: self.callbacks(scope, CallbackEvent::ObjectMapping, CallbackTiming::After),
        };

        let mut members = Vec::with_capacity(target.members.len());
        for member in &target.members {
            members.push(self.member_population(scope, member)?);
        }

        Ok(ObjectPlan {
            key,
            target: scope.target_path.clone(),
            derived,
            tracking,
            callbacks,
            members,
            error_strategy: self
                .registry
                .error_strategy(&scope.source_type, &scope.target_type, self.rule_set),
        })
    }

    fn derived_branches(&mut self, scope: &Scope<'_>) -> MapperResult<Vec<DerivedBranch>> {
        if !self.model.describe(&scope.source_type)?.is_complex() {
            return Ok(Vec::new());
        }
        let mut branches = Vec::new();
        for pair in self
            .registry
            .derived_pairs(&scope.source_type, &scope.target_type, self.rule_set)
        {
            let branch = scope.with_types(&pair.derived_source, &pair.derived_target);
            let key = branch.key(self.rule_set);
            let id = self.function_for(&branch)?;
            branches.push(DerivedBranch {
                source_type: pair.derived_source,
                target_type: pair.derived_target,
                condition: pair.condition.map(|expr| Condition { expr, scope: 0 }),
                target: MappingTarget::Function { id, key },
            });
        }
        Ok(branches)
    }

    fn callbacks(&self, scope: &Scope<'_>, event: CallbackEvent, timing: CallbackTiming) -> Vec<CallbackNode> {
        self.registry
            .callbacks(&scope.source_type, &scope.target_type, self.rule_set, event, timing, None)
            .iter()
            .filter_map(|rule| callback_node(rule, event, timing, 0))
            .collect()
    }

    /// Callbacks for one member: its own level's, then those enclosing levels
    /// registered for its nested path.
    fn member_callbacks(&self, scope: &Scope<'_>, name: &str, timing: CallbackTiming) -> Vec<CallbackNode> {
        let event = CallbackEvent::MemberPopulation;
        let mut nodes = Vec::new();
        for (depth, level, path) in scope.rule_paths(name) {
            let rules = self.registry.callbacks(
                &level.source_type,
                &level.target_type,
                self.rule_set,
                event,
                timing,
                Some(path.as_slice()),
            );
            nodes.extend(
                rules
                    .iter()
                    .filter(|rule| depth == 0 || rule.target_member.is_some())
                    .filter_map(|rule| callback_node(rule, event, timing, depth)),
            );
        }
        nodes
    }

    fn member_population(&mut self, scope: &Scope<'_>, def: &MemberDef) -> MapperResult<MemberPopulation> {
        let member_type = self.model.describe(&def.type_name)?;
        let member = Member::from_def(def, &scope.target_type, member_type.category);
        let qualified = scope.target_path.append(member.clone());

        if !def.writable && (member_type.is_simple() || !def.readable) {
            self.note(format!("{} is read-only", scope.member_label(&def.name)));
            return Ok(MemberPopulation::Skipped {
                member: qualified,
                reason: SkipReason::ReadOnly,
            });
        }

        let mut sources = self.find_data_sources(scope, &member, def, &member_type)?;
        if sources.ignored {
            return Ok(MemberPopulation::Skipped {
                member: qualified,
                reason: SkipReason::Ignored,
            });
        }

        let overwrites = self.rule_set == RuleSet::Overwrite && def.writable;
        if !sources.has_source() {
            debug!("No data source for {}", scope.member_label(&def.name));
            if !overwrites {
                return Ok(MemberPopulation::Skipped {
                    member: qualified,
                    reason: SkipReason::NoDataSource,
                });
            }
        }
        if overwrites && !sources.is_terminated() {
            sources.branches.push(SourceBranch {
                condition: None,
                value: Some(ValueNode::Default {
                    type_name: member_type.name.clone(),
                    value: member_type.default_value(),
                }),
                description: format!("default({})", member_type.name),
            });
        }

        let policy = if !def.writable {
            WritePolicy::Never
        } else if self.rule_set == RuleSet::Merge {
            WritePolicy::UnlessNull
        } else {
            WritePolicy::Always
        };
        Ok(MemberPopulation::Populate(MemberWrite {
            member: qualified,
            name: def.name.clone(),
            member_type,
            bindings: sources.bindings,
            branches: sources.branches,
            policy,
            before: self.member_callbacks(scope, &def.name, CallbackTiming::Before),
            after: self.member_callbacks(scope, &def.name, CallbackTiming::After),
        }))
    }

    /// Current value of a target member, when mapping may reuse it.
    pub(super) fn existing_read(&self, def: &MemberDef) -> Option<Box<ValueNode>> {
        let reusable = self.rule_set.has_existing_target() || def.initialized || !def.writable;
        (def.readable && reusable).then(|| Box::new(ValueNode::read_target(vec![def.name.clone()])))
    }

    pub(super) fn collection_plan(
        &mut self,
        parent: Option<&Scope<'_>>,
        source: &TypeDescriptor,
        target: &TypeDescriptor,
        replaceable: bool,
        member: &str,
    ) -> MapperResult<CollectionPlan> {
        let unconvertible = || MapperError::UnconvertibleType {
            source_type: source.name.clone(),
            target_type: target.name.clone(),
            member: member.to_string(),
        };
        let (Some(source_element), Some(target_element)) = (&source.element_type, &target.element_type) else {
            return Err(unconvertible());
        };
        let source_element = self.model.describe(source_element)?;
        let target_element = self.model.describe(target_element)?;

        let (element, identity) = match (source_element.category, target_element.category) {
            (TypeCategory::Simple, TypeCategory::Simple) => {
                self.converter
                    .ensure_convertible(&source_element, &target_element, member)?;
                (ElementPlan::Simple(Arc::clone(&target_element)), None)
            }
            (TypeCategory::Complex, TypeCategory::Complex) => {
                let target = self.mapping_target(parent, None, &source_element.name, &target_element.name)?;
                (ElementPlan::Complex(target), self.identity_plan(&source_element, &target_element)?)
            }
            _ => return Err(unconvertible()),
        };

        Ok(CollectionPlan {
            source_type: source.name.clone(),
            target_type: target.name.clone(),
            target_kind: target.collection_kind.unwrap_or(CollectionKind::ReadOnly),
            rule_set: self.rule_set,
            element,
            identity,
            replaceable,
        })
    }

    fn identity_plan(&self, source: &TypeDescriptor, target: &TypeDescriptor) -> MapperResult<Option<IdentityPlan>> {
        let (Some(source_member), Some(target_member)) = (self.identifier_of(source), self.identifier_of(target)) else {
            return Ok(None);
        };
        let Some(key_member) = target.member(&target_member) else {
            return Ok(None);
        };
        let key_type = self.model.describe(&key_member.type_name)?;
        if !key_type.is_simple() {
            return Ok(None);
        }
        Ok(Some(IdentityPlan {
            source_member,
            target_member,
            key_type,
        }))
    }

    /// Configured identifier, else the first conventional name the type has.
    fn identifier_of(&self, descriptor: &TypeDescriptor) -> Option<String> {
        self.registry.identifier_for(&descriptor.name).or_else(|| {
            self.config
                .matching
                .identifier_candidates(descriptor.name.as_str())
                .into_iter()
                .find(|candidate| {
                    descriptor
                        .member(candidate)
                        .map(|member| member.readable)
                        .unwrap_or(false)
                })
        })
    }
}

fn callback_node(rule: &ConfiguredRule, event: CallbackEvent, timing: CallbackTiming, depth: usize) -> Option<CallbackNode> {
    match &rule.action {
        RuleAction::Callback { callback, .. } => Some(CallbackNode {
            rule_id: rule.id,
            timing,
            event,
            condition: rule.scope.condition.clone().map(|expr| Condition { expr, scope: depth }),
            callback: Arc::clone(callback),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::DefaultConverter;
    use crate::expr::parse_expression;
    use crate::rules::RuleScope;
    use crate::types::{TypeCatalog, TypeDef};

    fn model() -> MemberModel {
        let mut catalog = TypeCatalog::new();
        catalog
            .register(TypeDef::complex("Node").member("Name", "string").member("Next", "Node"))
            .register(TypeDef::complex("NodeDto").member("Name", "string").member("Next", "NodeDto"))
            .register(TypeDef::complex("Account").member("Id", "int").member("Owner", "Node"))
            .register(
                TypeDef::complex("AccountView")
                    .member("Id", "int")
                    .member_def(MemberDef::new("Balance", "double").read_only())
                    .member("Owner", "NodeDto"),
            );
        MemberModel::new(Arc::new(catalog))
    }

    fn build(model: &MemberModel, source: &str, target: &str, rule_set: RuleSet) -> MapperResult<MappingPlan> {
        let registry = RuleRegistry::new(model.shared_catalog());
        let config = MapperConfig::default();
        PlanBuilder::new(model, &DefaultConverter, &registry, &config, rule_set)
            .build(&TypeName::new(source), &TypeName::new(target))
    }

    #[test]
    fn test_recursive_targets_become_functions() {
        let model = model();
        let plan = build(&model, "Node", "NodeDto", RuleSet::CreateNew).unwrap();

        assert_eq!(plan.functions.len(), 1);
        assert!(matches!(plan.root, PlanRoot::Object(MappingTarget::Function { id: 0, .. })));
        let next = plan.functions[0]
            .members
            .iter()
            .find_map(|member| match member {
                MemberPopulation::Populate(write) if write.name == "Next" => Some(write),
                _ => None,
            })
            .expect("Next should be populated");
        assert!(matches!(
            next.branches[0].value,
            Some(ValueNode::Map(ref node)) if matches!(node.target, MappingTarget::Function { id: 0, .. })
        ));
    }

    #[test]
    fn test_non_recursive_members_are_inlined() {
        let model = model();
        let plan = build(&model, "Account", "AccountView", RuleSet::Merge).unwrap();

        let PlanRoot::Object(MappingTarget::Inline(root)) = &plan.root else {
            panic!("expected an inline root, got {:?}", plan.root);
        };
        assert_eq!(root.members.len(), 3);
        assert!(matches!(
            &root.members[1],
            MemberPopulation::Skipped { reason: SkipReason::ReadOnly, .. }
        ));
        assert!(plan.notes.contains(&"AccountView.Balance is read-only".to_string()));
        // Owner maps Node -> NodeDto, which is recursive
        assert_eq!(plan.functions.len(), 1);
    }

    fn population<'p>(plan: &'p ObjectPlan, name: &str) -> &'p MemberWrite {
        plan.members
            .iter()
            .find_map(|member| match member {
                MemberPopulation::Populate(write) if write.name == name => Some(write),
                _ => None,
            })
            .unwrap_or_else(|| panic!("{} should be populated", name))
    }

    #[test]
    fn test_enclosing_rules_get_their_own_function() {
        let model = model();
        let mut registry = RuleRegistry::new(model.shared_catalog());
        registry
            .register(ConfiguredRule::new(
                RuleScope {
                    source_type: Some(TypeName::new("Node")),
                    target_type: Some(TypeName::new("NodeDto")),
                    ..Default::default()
                },
                Some(vec!["Next".to_string(), "Name".to_string()]),
                RuleAction::DataSource(parse_expression("upper(source.Next.Name)").unwrap()),
            ))
            .unwrap();
        let config = MapperConfig::default();

        let plan = PlanBuilder::new(&model, &DefaultConverter, &registry, &config, RuleSet::CreateNew)
            .build(&TypeName::new("Node"), &TypeName::new("NodeDto"))
            .unwrap();

        assert_eq!(plan.functions.len(), 2);
        assert!(plan.functions.iter().all(|function| function.key == plan.key));
        assert!(!population(&plan.functions[0], "Name").branches[0].description.contains("rule #0"));
        assert!(population(&plan.functions[1], "Name").branches[0].description.contains("rule #0"));
        for function in &plan.functions {
            let next = population(function, "Next");
            assert!(matches!(
                next.branches[0].value,
                Some(ValueNode::Map(ref node)) if matches!(node.target, MappingTarget::Function { id: 1, .. })
            ));
        }
    }

    #[test]
    fn test_simple_roots_are_unconvertible() {
        let model = model();
        let error = build(&model, "Node", "string", RuleSet::CreateNew).unwrap_err();
        assert!(matches!(error, MapperError::UnconvertibleType { .. }));
    }

    #[test]
    fn test_unknown_types_fail_the_build() {
        let model = model();
        let error = build(&model, "Node", "Missing", RuleSet::CreateNew).unwrap_err();
        assert!(matches!(error, MapperError::UnknownType { .. }));
    }
}
