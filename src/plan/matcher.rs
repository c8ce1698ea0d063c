//! Source member matching.
//!
//! A target member is matched to the source member whose name, or whose
//! path of names run together, equals the wanted name. `AddressLine1` finds
//! `Address.Line1`. Exact matches beat case-insensitive ones and shorter
//! paths beat longer ones.

use crate::error::MapperResult;
use crate::types::{MemberModel, TypeName};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberMatch {
    pub path: Vec<String>,
    pub type_name: TypeName,
    pub exact: bool,
}

impl MemberMatch {
    fn rank(&self) -> (u8, usize) {
        (if self.exact { 0 } else { 1 }, self.path.len())
    }
}

/// Finds the best readable source member for `wanted`.
pub fn find_source_member(
    model: &MemberModel,
    source_type: &TypeName,
    wanted: &str,
    case_insensitive: bool,
    max_depth: usize,
) -> MapperResult<Option<MemberMatch>> {
    let wanted_lower = wanted.to_lowercase();
    let mut best: Option<MemberMatch> = None;
    let mut queue: VecDeque<(TypeName, Vec<String>, String)> = VecDeque::new();
    queue.push_back((source_type.clone(), Vec::new(), String::new()));

    while let Some((type_name, path, prefix)) = queue.pop_front() {
        let descriptor = model.describe(&type_name)?;
        if !descriptor.is_complex() || descriptor.is_dictionary {
            continue;
        }
        for member in descriptor.readable_members() {
            let joined = format!("{}{}", prefix, member.name);
            let mut member_path = path.clone();
            member_path.push(member.name.clone());

            let exact = joined == wanted;
            if exact || (case_insensitive && joined.eq_ignore_ascii_case(wanted)) {
                let candidate = MemberMatch {
                    path: member_path.clone(),
                    type_name: member.type_name.clone(),
                    exact,
                };
                if best.as_ref().map(|current| candidate.rank() < current.rank()).unwrap_or(true) {
                    best = Some(candidate);
                }
                continue;
            }

            let joined_lower = joined.to_lowercase();
            let could_extend = member_path.len() < max_depth
                && joined.len() < wanted.len()
                && if case_insensitive {
                    wanted_lower.starts_with(&joined_lower)
                } else {
                    wanted.starts_with(&joined)
                };
            if could_extend {
                queue.push_back((member.type_name.clone(), member_path, joined));
            }
        }
    }

    Ok(best)
}
