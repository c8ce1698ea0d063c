//! Per-call mapping state.

use crate::rules::RuleSet;
use crate::types::{ObjectRef, TypeName, Value};
use std::collections::{HashMap, HashSet};

/// Identity map for one top-level mapping call.
///
/// Records which target was produced for each (source instance, target type)
/// so shared references stay shared and cycles terminate. Sources are held
/// until the session ends so their addresses cannot be reused. Existing
/// targets are recorded per source as well, since one source may be mapped
/// onto several of them.
#[derive(Debug)]
pub struct MappingSession {
    rule_set: RuleSet,
    mapped: HashMap<(usize, TypeName), (ObjectRef, Value)>,
    populated: HashSet<(usize, usize)>,
}

impl MappingSession {
    pub fn new(rule_set: RuleSet) -> Self {
        Self {
            rule_set,
            mapped: HashMap::new(),
            populated: HashSet::new(),
        }
    }

    pub fn rule_set(&self) -> RuleSet {
        self.rule_set
    }

    pub fn tracked(&self, source: &ObjectRef, target_type: &TypeName) -> Option<Value> {
        self.mapped
            .get(&(source.identity(), target_type.clone()))
            .map(|(_, target)| target.clone())
    }

    /// Whether `source` has already been mapped onto this existing `target`.
    pub fn populated(&self, source: &ObjectRef, target: &Value) -> bool {
        match target {
            Value::Object(object) => self.populated.contains(&(source.identity(), object.identity())),
            _ => false,
        }
    }

    pub fn track(&mut self, source: &ObjectRef, target_type: &TypeName, target: Value) {
        if let Value::Object(object) = &target {
            self.populated.insert((source.identity(), object.identity()));
        }
        self.mapped
            .insert((source.identity(), target_type.clone()), (source.clone(), target));
    }

    pub fn tracked_count(&self) -> usize {
        self.mapped.len()
    }
}
