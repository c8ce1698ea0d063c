//! Compiled mapper cache.
//!
//! One [`CompiledMapper`] is retained per [`MapperKey`]. Each key owns a
//! `OnceCell`, so concurrent requests for the same key wait for a single build
//! while requests for other keys proceed.

use crate::error::{MapperError, MapperResult};
use crate::exec::{Evaluator, MapperRuntime, MappingSession};
use crate::plan::{explain, MapperKey, MappingPlan};
use crate::types::Value;
use log::{debug, info};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The executable mapping for one key.
#[derive(Debug)]
pub struct CompiledMapper {
    key: MapperKey,
    plan: MappingPlan,
    explanation: String,
}

impl CompiledMapper {
    pub fn new(plan: MappingPlan) -> Self {
        let explanation = explain(&plan);
        Self {
            key: plan.key.clone(),
            plan,
            explanation,
        }
    }

    pub fn key(&self) -> &MapperKey {
        &self.key
    }

    pub fn plan(&self) -> &MappingPlan {
        &self.plan
    }

    /// Text rendering of the plan this mapper runs.
    pub fn explain(&self) -> &str {
        &self.explanation
    }

    /// Runs the plan with a fresh object-tracking session.
    ///
    /// Errors are reported against this mapper's types unless a nested
    /// mapping already attached its own location.
    pub fn execute(&self, runtime: &dyn MapperRuntime, source: Value, existing: Option<Value>) -> MapperResult<Value> {
        let mut session = MappingSession::new(self.key.rule_set);
        let result = Evaluator::new(&self.plan, runtime, &mut session).run(source, existing);
        debug!(
            "Mapped {} with {} tracked object(s)",
            self.key,
            session.tracked_count()
        );
        result.map_err(|error| error.in_mapping(&self.key.source_type, &self.key.target_type, ""))
    }
}

type Slot = Arc<OnceCell<Arc<CompiledMapper>>>;

/// Per-context cache of compiled mappers.
#[derive(Debug, Default)]
pub struct MapperCache {
    entries: RwLock<HashMap<MapperKey, Slot>>,
}

impl MapperCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mapper for `key`, building it with `build` on first use.
    ///
    /// A failed build leaves the slot empty so a later request retries.
    pub fn get_or_compile<F>(&self, key: &MapperKey, build: F) -> MapperResult<Arc<CompiledMapper>>
    where
        F: FnOnce() -> MapperResult<MappingPlan>,
    {
        let slot = self.slot(key)?;
        if let Some(compiled) = slot.get() {
            debug!("Cache hit for {}", key);
            return Ok(Arc::clone(compiled));
        }

        let compiled = slot.get_or_try_init(|| {
            info!("Compiling mapper for {}", key);
            build().map(|plan| Arc::new(CompiledMapper::new(plan)))
        })?;
        Ok(Arc::clone(compiled))
    }

    pub fn get(&self, key: &MapperKey) -> MapperResult<Option<Arc<CompiledMapper>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| MapperError::internal("mapper cache lock poisoned"))?;
        Ok(entries.get(key).and_then(|slot| slot.get().cloned()))
    }

    /// Number of keys with a compiled mapper.
    pub fn len(&self) -> MapperResult<usize> {
        let entries = self
            .entries
            .read()
            .map_err(|_| MapperError::internal("mapper cache lock poisoned"))?;
        Ok(entries.values().filter(|slot| slot.get().is_some()).count())
    }

    pub fn is_empty(&self) -> MapperResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drops every compiled mapper.
    ///
    /// Builds already in progress finish into slots that are no longer
    /// reachable from the cache.
    pub fn reset(&self) -> MapperResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| MapperError::internal("mapper cache lock poisoned"))?;
        if !entries.is_empty() {
            info!("Clearing {} cached mapper(s)", entries.len());
        }
        entries.clear();
        Ok(())
    }

    fn slot(&self, key: &MapperKey) -> MapperResult<Slot> {
        {
            let entries = self
                .entries
                .read()
                .map_err(|_| MapperError::internal("mapper cache lock poisoned"))?;
            if let Some(slot) = entries.get(key) {
                return Ok(Arc::clone(slot));
            }
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| MapperError::internal("mapper cache lock poisoned"))?;
        Ok(Arc::clone(entries.entry(key.clone()).or_default()))
    }
}
