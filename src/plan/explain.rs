//! Human-readable rendering of a compiled plan.

use super::ir::{
    CallbackNode, CollectionPlan, ElementPlan, MappingPlan, MappingTarget, MemberPopulation, MemberWrite, ObjectPlan,
    PlanRoot, ReadRoot, SkipReason, SourceBranch, ValueNode, WritePolicy,
};
use crate::expr::Expression;
use std::fmt::Write;

const INDENT: &str = "  ";

/// Renders a plan as indented text, one line per member decision.
pub fn explain(plan: &MappingPlan) -> String {
    let mut out = String::new();
    line(&mut out, 0, &format!("Map {}", plan.key));
    match &plan.root {
        PlanRoot::Object(target) => render_target(&mut out, 1, target),
        PlanRoot::Collection(collection) => render_collection(&mut out, 1, collection),
    }

    for (id, function) in plan.functions.iter().enumerate() {
        line(&mut out, 0, &format!("Function #{}: {}", id, function.key));
        render_object(&mut out, 1, function);
    }

    if !plan.dispatch.is_empty() {
        line(&mut out, 0, "Dispatch:");
        for (key, id) in &plan.dispatch {
            line(
                &mut out,
                1,
                &format!("{} -> {} => function #{}", key.source_type, key.target_type, id),
            );
        }
    }

    for note in &plan.notes {
        line(&mut out, 0, &format!("// {}", note));
    }
    out
}

fn line(out: &mut String, depth: usize, text: &str) {
    let _ = writeln!(out, "{}{}", INDENT.repeat(depth), text);
}

fn render_target(out: &mut String, depth: usize, target: &MappingTarget) {
    match target {
        MappingTarget::Inline(plan) => render_object(out, depth, plan),
        MappingTarget::Function { id, key } => line(out, depth, &format!("call function #{} ({})", id, key)),
        MappingTarget::Dynamic {
            target_type,
            local_dispatch,
            ..
        } => {
            line(out, depth, &format!("dispatch on runtime source type to {}", target_type));
            for (source_type, id) in local_dispatch {
                line(out, depth + 1, &format!("{} => function #{}", source_type, id));
            }
        }
    }
}

fn render_object(out: &mut String, depth: usize, plan: &ObjectPlan) {
    for branch in &plan.derived {
        let condition = branch
            .condition
            .as_ref()
            .map(|condition| format!(" and {}", condition.expr))
            .unwrap_or_default();
        let target = match &branch.target {
            MappingTarget::Function { id, .. } => format!("function #{}", id),
            _ => "runtime dispatch".to_string(),
        };
        line(
            out,
            depth,
            &format!(
                "if source is {}{} => {} as {}",
                branch.source_type, condition, target, branch.target_type
            ),
        );
    }
    if !plan.tracking {
        line(out, depth, "// object tracking disabled");
    }
    render_callbacks(out, depth, "before creating", &plan.callbacks.before_creation);
    render_callbacks(out, depth, "after creating", &plan.callbacks.after_creation);
    render_callbacks(out, depth, "before mapping", &plan.callbacks.before_mapping);

    for member in &plan.members {
        match member {
            MemberPopulation::Skipped { member, reason } => {
                let text = match reason {
                    SkipReason::NoDataSource => format!("// No data source for {}", member.path()),
                    SkipReason::Ignored => format!("// {} is ignored", member.path()),
                    SkipReason::ReadOnly => format!("// {} is read-only", member.path()),
                };
                line(out, depth, &text);
            }
            MemberPopulation::Populate(write) => render_write(out, depth, write),
        }
    }

    render_callbacks(out, depth, "after mapping", &plan.callbacks.after_mapping);
}

fn render_callbacks(out: &mut String, depth: usize, label: &str, callbacks: &[CallbackNode]) {
    for callback in callbacks {
        let condition = callback
            .condition
            .as_ref()
            .map(|condition| format!(" when {}", condition.expr))
            .unwrap_or_default();
        line(
            out,
            depth,
            &format!("// {}: callback (rule #{}){}", label, callback.rule_id, condition),
        );
    }
}

fn render_write(out: &mut String, depth: usize, write: &MemberWrite) {
    render_callbacks(out, depth, &format!("before {}", write.name), &write.before);
    let suffix = match write.policy {
        WritePolicy::Always => "",
        WritePolicy::UnlessNull => " [unless null]",
        WritePolicy::Never => " [in place]",
    };

    match write.branches.as_slice() {
        [only] if only.condition.is_none() => {
            line(out, depth, &format!("{} <- {}{}", write.name, describe_branch(only), suffix));
            render_nested(out, depth + 1, only);
        }
        branches => {
            line(out, depth, &format!("{}:{}", write.name, suffix));
            for binding in &write.bindings {
                line(
                    out,
                    depth + 1,
                    &format!("let {} = {}", binding.name, describe(&binding.value)),
                );
            }
            for branch in branches {
                let guard = match &branch.condition {
                    Some(condition) => format!("if {}", condition.expr),
                    None => "else".to_string(),
                };
                line(out, depth + 1, &format!("{} <- {}", guard, describe_branch(branch)));
                render_nested(out, depth + 2, branch);
            }
        }
    }
    render_callbacks(out, depth, &format!("after {}", write.name), &write.after);
}

fn describe_branch(branch: &SourceBranch) -> String {
    match &branch.value {
        None => "(unchanged)".to_string(),
        Some(value) => match mapping_summary(value) {
            Some(summary) => format!("{} {}", branch.description, summary),
            None => branch.description.clone(),
        },
    }
}

fn mapping_summary(value: &ValueNode) -> Option<String> {
    match value {
        ValueNode::Map(node) => Some(match &node.target {
            MappingTarget::Inline(plan) => format!("=> {}", plan.key.target_type),
            MappingTarget::Function { id, key } => format!("=> {} (function #{})", key.target_type, id),
            MappingTarget::Dynamic { target_type, .. } => format!("=> {} (runtime dispatch)", target_type),
        }),
        ValueNode::Collection { plan, .. } => {
            let identity = plan
                .identity
                .as_ref()
                .map(|identity| format!(" by {} = {}", identity.source_member, identity.target_member))
                .unwrap_or_default();
            Some(format!("=> {}{}", plan.target_type, identity))
        }
        ValueNode::Convert { value, .. } => mapping_summary(value),
        _ => None,
    }
}

fn render_nested(out: &mut String, depth: usize, branch: &SourceBranch) {
    match &branch.value {
        Some(ValueNode::Map(node)) => {
            if let MappingTarget::Inline(plan) = &node.target {
                render_object(out, depth, plan);
            }
        }
        Some(ValueNode::Collection { plan, .. }) => render_collection(out, depth, plan),
        _ => {}
    }
}

fn render_collection(out: &mut String, depth: usize, plan: &CollectionPlan) {
    match &plan.element {
        ElementPlan::Simple(element) => line(out, depth, &format!("each element as {}", element.name)),
        ElementPlan::Complex(target) => {
            line(out, depth, &format!("each {} element:", plan.source_type));
            render_target(out, depth + 1, target);
        }
    }
}

/// Text for a value node, used for bindings.
pub fn describe(value: &ValueNode) -> String {
    match value {
        ValueNode::Constant(value) => Expression::Literal(value.clone()).to_string(),
        ValueNode::Default { type_name, .. } => format!("default({})", type_name),
        ValueNode::Read { root, path, scope } => {
            let mut text = match root {
                ReadRoot::Source => "source".to_string(),
                ReadRoot::Target => "target".to_string(),
            };
            if *scope > 0 {
                let _ = write!(text, "^{}", scope);
            }
            for name in path {
                let _ = write!(text, ".{}", name);
            }
            text
        }
        ValueNode::Local(name) => name.clone(),
        ValueNode::Expression { expr, scope } if *scope > 0 => format!("{} (outer {})", expr, scope),
        ValueNode::Expression { expr, .. } => expr.to_string(),
        ValueNode::Convert { value, to } => format!("{} as {}", describe(value), to.name),
        ValueNode::Map(node) => format!("map {}", describe(&node.source)),
        ValueNode::Collection { source, plan, .. } => format!("map {} to {}", describe(source), plan.target_type),
    }
}
