//! Plan execution.
//!
//! A compiled [`MappingPlan`](crate::plan::MappingPlan) is run by the
//! [`Evaluator`] inside a [`MappingSession`] that lives for exactly one
//! top-level mapping call.

pub mod evaluator;
pub mod session;

pub use evaluator::{Evaluator, Frame};
pub use session::MappingSession;

use crate::cache::CompiledMapper;
use crate::convert::ValueConverter;
use crate::error::MapperResult;
use crate::plan::MapperKey;
use crate::types::MemberModel;
use std::sync::Arc;

/// What the evaluator needs from the mapper that owns the plan.
pub trait MapperRuntime: Send + Sync {
    fn model(&self) -> &MemberModel;

    fn converter(&self) -> &dyn ValueConverter;

    /// The compiled mapper for a key, compiling it on first use.
    ///
    /// Used when a runtime source type has no entry in the running plan's
    /// dispatch table.
    fn compiled_for(&self, key: &MapperKey) -> MapperResult<Arc<CompiledMapper>>;
}
