//! Data source resolution.
//!
//! For one target member, produces the ordered branches the evaluator tries:
//! configured rules (innermost scope first, stopping at the first
//! unconditional one), then the best matching source member, then an object
//! unflattened from the current source. The plan builder appends the
//! overwrite default.
//!
//! Simple members of a dictionary source read the dictionary entry and
//! nothing else; only ignore rules are consulted before it.

use super::builder::{PlanBuilder, Scope};
use super::ir::{Binding, Condition, MapNode, MappingTarget, SourceBranch, ValueNode};
use super::matcher::find_source_member;
use crate::error::{MapperError, MapperResult};
use crate::expr::Expression;
use crate::rules::RuleAction;
use crate::types::{Member, MemberDef, TypeCategory, TypeDescriptor, TypeName};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The candidate sources for one member.
#[derive(Debug, Default)]
pub(crate) struct DataSourceSet {
    pub bindings: Vec<Binding>,
    pub branches: Vec<SourceBranch>,
    /// An unconditional ignore rule applies
    pub ignored: bool,
}

impl DataSourceSet {
    /// An unconditional branch ends the chain; nothing after it can apply.
    pub fn is_terminated(&self) -> bool {
        self.branches.last().map(|branch| branch.condition.is_none()).unwrap_or(false)
    }

    /// Whether some branch produces a value other than a default.
    pub fn has_source(&self) -> bool {
        self.branches
            .iter()
            .any(|branch| branch.value.as_ref().map(|value| !value.is_default()).unwrap_or(false))
    }
}

impl PlanBuilder<'_> {
    pub(super) fn find_data_sources(
        &mut self,
        scope: &Scope<'_>,
        member: &Member,
        def: &MemberDef,
        member_type: &Arc<TypeDescriptor>,
    ) -> MapperResult<DataSourceSet> {
        let mut set = DataSourceSet::default();
        let mut configured_reads: Vec<Expression> = Vec::new();
        let source = self.model.describe(&scope.source_type)?;
        let from_dictionary = source.is_dictionary && member_type.is_simple();

        'levels: for (depth, level, path) in scope.rule_paths(&member.name) {
            for rule in self
                .registry
                .member_rules(&level.source_type, &level.target_type, self.rule_set, &path)
            {
                let condition = rule.scope.condition.clone().map(|expr| Condition { expr, scope: depth });
                match &rule.action {
                    RuleAction::Ignore => {
                        if condition.is_none() && set.branches.is_empty() {
                            set.ignored = true;
                            return Ok(set);
                        }
                        set.branches.push(SourceBranch {
                            condition,
                            value: None,
                            description: format!("ignored (rule #{})", rule.id),
                        });
                    }
                    RuleAction::DataSource(_) if from_dictionary => continue,
                    RuleAction::DataSource(expr) => {
                        let node = match expr {
                            Expression::Literal(value) => ValueNode::Constant(value.clone()),
                            _ => ValueNode::Expression {
                                expr: expr.clone(),
                                scope: depth,
                            },
                        };
                        let (condition, node) = self.hoist_binding(&mut set, condition, node, expr);
                        let value = self.configured_value(scope, level, expr, node, member, def, member_type)?;
                        if depth == 0 {
                            configured_reads.push(expr.clone());
                        }
                        set.branches.push(SourceBranch {
                            condition,
                            value: Some(value),
                            description: format!("{} (rule #{})", expr, rule.id),
                        });
                    }
                    _ => {}
                }
                if set.is_terminated() {
                    break 'levels;
                }
            }
        }
        if set.is_terminated() {
            return Ok(set);
        }
        if from_dictionary {
            set.branches.push(self.dictionary_branch(scope, member, member_type));
            return Ok(set);
        }

        if !source.is_dictionary {
            let wanted = format!("{}{}", scope.naming_path.concat(), member.name);
            let found = find_source_member(
                self.model,
                &scope.source_type,
                &wanted,
                self.config.matching.case_insensitive,
                self.config.matching.max_flattening_depth,
            )?;
            if let Some(found) = found {
                let read = Expression::member_path("source", &found.path);
                if !configured_reads.contains(&read) {
                    let label = scope.member_label(&member.name);
                    if let Some(value) = self.matched_value(scope, member, def, member_type, &found.path, &found.type_name, &label)? {
                        set.branches.push(SourceBranch {
                            condition: None,
                            value: Some(value),
                            description: read.to_string(),
                        });
                    }
                }
            }
        }
        if set.is_terminated() {
            return Ok(set);
        }

        if member_type.is_complex() && !member_type.is_dictionary {
            if let Some(value) = self.unflattened_value(scope, member, def, member_type)? {
                set.branches.push(SourceBranch {
                    condition: None,
                    value: Some(value),
                    description: format!("unflattened from {}", scope.source_type),
                });
            }
        }
        Ok(set)
    }

    /// Evaluates a configured value once when its condition repeats it.
    fn hoist_binding(
        &mut self,
        set: &mut DataSourceSet,
        condition: Option<Condition>,
        node: ValueNode,
        expr: &Expression,
    ) -> (Option<Condition>, ValueNode) {
        let Some(condition) = condition else {
            return (None, node);
        };
        let hoistable = !matches!(expr, Expression::Literal(_) | Expression::Variable(_))
            && condition.expr.contains(expr);
        if !hoistable {
            return (Some(condition), node);
        }

        let name = format!("${}", self.next_binding);
        self.next_binding += 1;
        set.bindings.push(Binding {
            name: name.clone(),
            value: node,
        });
        let rewritten = Condition {
            expr: condition.expr.replace(expr, &Expression::variable(name.clone())),
            scope: condition.scope,
        };
        (Some(rewritten), ValueNode::Local(name))
    }

    /// Static type of a plain member read in a configured expression.
    fn static_type(&self, level: &Scope<'_>, expr: &Expression) -> MapperResult<Option<Arc<TypeDescriptor>>> {
        match expr.as_member_path() {
            Some(("source", names)) => self.model.resolve_path(&level.source_type, &names),
            Some(("target", names)) => self.model.resolve_path(&level.target_type, &names),
            _ => Ok(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn configured_value(
        &mut self,
        scope: &Scope<'_>,
        level: &Scope<'_>,
        expr: &Expression,
        node: ValueNode,
        member: &Member,
        def: &MemberDef,
        member_type: &Arc<TypeDescriptor>,
    ) -> MapperResult<ValueNode> {
        let label = scope.member_label(&member.name);
        let static_type = self.static_type(level, expr)?;
        let unconvertible = |from: &TypeDescriptor| MapperError::UnconvertibleType {
            source_type: from.name.clone(),
            target_type: member_type.name.clone(),
            member: label.clone(),
        };

        match member_type.category {
            TypeCategory::Simple => {
                if let Some(from) = &static_type {
                    if !from.is_simple() {
                        return Err(unconvertible(from));
                    }
                    self.converter.ensure_convertible(from, member_type, &label)?;
                }
                Ok(ValueNode::Convert {
                    value: Box::new(node),
                    to: Arc::clone(member_type),
                })
            }
            TypeCategory::Complex => match static_type {
                Some(from) if from.is_complex() => self.map_node(scope, member, def, node, &from.name, member_type),
                Some(from) => Err(unconvertible(&from)),
                None => Ok(ValueNode::Map(MapNode {
                    source: Box::new(node),
                    existing: self.existing_read(def),
                    target: MappingTarget::Dynamic {
                        target_type: member_type.name.clone(),
                        rule_set: self.rule_set,
                        local_dispatch: BTreeMap::new(),
                    },
                    reuse_only: !def.writable,
                })),
            },
            TypeCategory::Enumerable => match static_type {
                Some(from) if from.is_enumerable() => self.collection_node(scope, def, node, &from, member_type, &label),
                Some(from) => Err(unconvertible(&from)),
                None => Err(MapperError::configuration(format!(
                    "Data source '{}' for collection member {} must be a member path",
                    expr, label
                ))),
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn matched_value(
        &mut self,
        scope: &Scope<'_>,
        member: &Member,
        def: &MemberDef,
        member_type: &Arc<TypeDescriptor>,
        path: &[String],
        source_type: &TypeName,
        label: &str,
    ) -> MapperResult<Option<ValueNode>> {
        let source_member = self.model.describe(source_type)?;
        let read = ValueNode::read_source(path.to_vec());
        match (source_member.category, member_type.category) {
            (TypeCategory::Simple, TypeCategory::Simple) => {
                self.converter.ensure_convertible(&source_member, member_type, label)?;
                if source_member.name == member_type.name {
                    return Ok(Some(read));
                }
                Ok(Some(ValueNode::Convert {
                    value: Box::new(read),
                    to: Arc::clone(member_type),
                }))
            }
            (TypeCategory::Complex, TypeCategory::Complex) => {
                self.map_node(scope, member, def, read, source_type, member_type).map(Some)
            }
            (TypeCategory::Enumerable, TypeCategory::Enumerable) => self
                .collection_node(scope, def, read, &source_member, member_type, label)
                .map(Some),
            _ => Ok(None),
        }
    }

    fn map_node(
        &mut self,
        scope: &Scope<'_>,
        member: &Member,
        def: &MemberDef,
        source: ValueNode,
        source_type: &TypeName,
        member_type: &TypeDescriptor,
    ) -> MapperResult<ValueNode> {
        let target = self.mapping_target(Some(scope), Some(member), source_type, &member_type.name)?;
        Ok(ValueNode::Map(MapNode {
            source: Box::new(source),
            existing: self.existing_read(def),
            target,
            reuse_only: !def.writable,
        }))
    }

    fn collection_node(
        &mut self,
        scope: &Scope<'_>,
        def: &MemberDef,
        source: ValueNode,
        source_type: &TypeDescriptor,
        member_type: &TypeDescriptor,
        label: &str,
    ) -> MapperResult<ValueNode> {
        let plan = self.collection_plan(Some(scope), source_type, member_type, def.writable, label)?;
        Ok(ValueNode::Collection {
            source: Box::new(source),
            existing: self.existing_read(def),
            plan: Box::new(plan),
        })
    }

    /// `entry(source, "AddressLine1", "Address.Line1")` for dictionary sources.
    fn dictionary_branch(&self, scope: &Scope<'_>, member: &Member, member_type: &Arc<TypeDescriptor>) -> SourceBranch {
        let flattened = format!("{}{}", scope.naming_path.concat(), member.name);
        let mut args = vec![Expression::variable("source"), Expression::literal(flattened)];
        if !scope.naming_path.is_empty() {
            args.push(Expression::literal(format!(
                "{}.{}",
                scope.naming_path.join("."),
                member.name
            )));
        }
        let lookup = Expression::FunctionCall {
            name: "entry".to_string(),
            args,
        };
        SourceBranch {
            condition: None,
            description: lookup.to_string(),
            value: Some(ValueNode::Convert {
                value: Box::new(ValueNode::Expression { expr: lookup, scope: 0 }),
                to: Arc::clone(member_type),
            }),
        }
    }

    /// Maps a nested target object from the current source, e.g. `Address.Line1`
    /// from `AddressLine1`. Only kept when it populates something.
    fn unflattened_value(
        &mut self,
        scope: &Scope<'_>,
        member: &Member,
        def: &MemberDef,
        member_type: &TypeDescriptor,
    ) -> MapperResult<Option<ValueNode>> {
        if scope.naming_path.len() + 1 >= self.config.matching.max_flattening_depth
            || self
                .inline_stack
                .iter()
                .any(|key| key.target_type == member_type.name)
            || !(member_type.constructible || def.readable)
        {
            return Ok(None);
        }

        let mut naming_path = scope.naming_path.clone();
        naming_path.push(member.name.clone());
        let child = scope.child(&scope.source_type, &member_type.name, Some(member), naming_path);

        let notes = self.notes.len();
        let mut plan = self.object_plan(&child)?;
        if !plan.populates_anything() {
            self.notes.truncate(notes);
            return Ok(None);
        }
        // Two members unflattened from one source are distinct objects.
        plan.tracking = false;

        Ok(Some(ValueNode::Map(MapNode {
            source: Box::new(ValueNode::read_source(Vec::new())),
            existing: self.existing_read(def),
            target: MappingTarget::Inline(Box::new(plan)),
            reuse_only: !def.writable,
        })))
    }
}
