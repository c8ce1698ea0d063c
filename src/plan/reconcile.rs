//! Collection reconciliation.
//!
//! Matches source elements to existing target elements by identity key in a
//! single pass over each side.

use crate::types::Value;
use std::collections::{HashMap, VecDeque};

/// Hashable form of an identifier value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Char(char),
    Str(String),
}

impl IdentityKey {
    /// Null, objects and lists cannot identify an element.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(IdentityKey::Bool(*b)),
            Value::Int(i) => Some(IdentityKey::Int(*i)),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(IdentityKey::Int(*f as i64)),
            Value::Float(f) => Some(IdentityKey::Float(f.to_bits())),
            Value::Char(c) => Some(IdentityKey::Char(*c)),
            Value::Str(s) => Some(IdentityKey::Str(s.clone())),
            Value::Enum(e) => Some(IdentityKey::Str(e.name.clone())),
            Value::Null | Value::Object(_) | Value::List(_) => None,
        }
    }
}

/// Result of matching a source sequence against a target collection.
///
/// Indexes refer to the inputs of [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionDiff {
    /// (source index, target index), in source order
    pub matched: Vec<(usize, usize)>,
    pub new_items: Vec<usize>,
    pub absent_items: Vec<usize>,
}

impl CollectionDiff {
    /// Everything is new; used when there is nothing to reconcile against.
    pub fn rebuild(source_len: usize) -> Self {
        Self {
            matched: Vec::new(),
            new_items: (0..source_len).collect(),
            absent_items: Vec::new(),
        }
    }
}

/// Joins source and target keys.
///
/// Duplicate target keys are consumed in order, so two source elements with
/// the same key match two distinct target elements. Elements without a key
/// never match.
pub fn reconcile(source_keys: &[Option<IdentityKey>], target_keys: &[Option<IdentityKey>]) -> CollectionDiff {
    let mut by_key: HashMap<&IdentityKey, VecDeque<usize>> = HashMap::with_capacity(target_keys.len());
    for (index, key) in target_keys.iter().enumerate() {
        if let Some(key) = key {
            by_key.entry(key).or_default().push_back(index);
        }
    }

    let mut diff = CollectionDiff::default();
    let mut claimed = vec![false; target_keys.len()];
    for (source_index, key) in source_keys.iter().enumerate() {
        let target_index = key
            .as_ref()
            .and_then(|key| by_key.get_mut(key))
            .and_then(|indexes| indexes.pop_front());
        match target_index {
            Some(target_index) => {
                claimed[target_index] = true;
                diff.matched.push((source_index, target_index));
            }
            None => diff.new_items.push(source_index),
        }
    }

    diff.absent_items = claimed
        .iter()
        .enumerate()
        .filter(|(_, claimed)| !**claimed)
        .map(|(index, _)| index)
        .collect();
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(values: &[i64]) -> Vec<Option<IdentityKey>> {
        values.iter().map(|value| Some(IdentityKey::Int(*value))).collect()
    }

    #[test]
    fn test_join_on_identity() {
        let diff = reconcile(&keys(&[3, 1, 4]), &keys(&[1, 2, 3]));
        assert_eq!(diff.matched, vec![(0, 2), (1, 0)]);
        assert_eq!(diff.new_items, vec![2]);
        assert_eq!(diff.absent_items, vec![1]);
    }

    #[test]
    fn test_duplicate_keys_match_once_each() {
        let diff = reconcile(&keys(&[1, 1, 1]), &keys(&[1, 1]));
        assert_eq!(diff.matched, vec![(0, 0), (1, 1)]);
        assert_eq!(diff.new_items, vec![2]);
        assert!(diff.absent_items.is_empty());
    }

    #[test]
    fn test_missing_keys_never_match() {
        let diff = reconcile(&[None, Some(IdentityKey::Int(1))], &[None, Some(IdentityKey::Int(1))]);
        assert_eq!(diff.matched, vec![(1, 1)]);
        assert_eq!(diff.new_items, vec![0]);
        assert_eq!(diff.absent_items, vec![0]);
    }

    #[test]
    fn test_whole_floats_key_like_ints() {
        assert_eq!(IdentityKey::from_value(&Value::Float(2.0)), Some(IdentityKey::Int(2)));
        assert_eq!(IdentityKey::from_value(&Value::Null), None);
    }

    #[test]
    fn test_rebuild() {
        assert_eq!(CollectionDiff::rebuild(2).new_items, vec![0, 1]);
    }
}
