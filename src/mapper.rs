//! The mapping context.
//!
//! A [`Mapper`] owns a type catalog, its rules and the compiled mapper cache.
//! Independent mappers never share compiled plans or configuration.

use crate::cache::{CompiledMapper, MapperCache};
use crate::config::MapperConfig;
use crate::convert::{DefaultConverter, ValueConverter};
use crate::error::{MapperError, MapperResult};
use crate::exec::MapperRuntime;
use crate::plan::{explain, MapperKey, PlanBuilder};
use crate::rules::{ConfiguredRule, MappingConfigurator, RuleRegistry, RuleSet};
use crate::types::{MemberModel, TypeCatalog, TypeName, Value};
use log::{debug, info};
use std::sync::{Arc, RwLock};

struct MapperContext {
    model: MemberModel,
    converter: Box<dyn ValueConverter>,
    registry: RwLock<RuleRegistry>,
    cache: MapperCache,
    config: MapperConfig,
}

impl MapperContext {
    fn compile(&self, key: &MapperKey) -> MapperResult<Arc<CompiledMapper>> {
        self.cache.get_or_compile(key, || {
            let registry = self
                .registry
                .read()
                .map_err(|_| MapperError::internal("rule registry lock poisoned"))?;
            let plan = PlanBuilder::new(&self.model, self.converter.as_ref(), &registry, &self.config, key.rule_set)
                .build(&key.source_type, &key.target_type)?;
            if self.config.logging.log_plans {
                info!("Mapping plan for {}:\n{}", key, explain(&plan));
            }
            Ok(plan)
        })
    }
}

impl MapperRuntime for MapperContext {
    fn model(&self) -> &MemberModel {
        &self.model
    }

    fn converter(&self) -> &dyn ValueConverter {
        self.converter.as_ref()
    }

    fn compiled_for(&self, key: &MapperKey) -> MapperResult<Arc<CompiledMapper>> {
        self.compile(key)
    }
}

/// Maps values between catalog types.
///
/// Cloning is cheap and clones share rules and compiled mappers.
#[derive(Clone)]
pub struct Mapper {
    inner: Arc<MapperContext>,
}

impl Mapper {
    pub fn new(catalog: TypeCatalog) -> Self {
        Self::with_parts(Arc::new(catalog), MapperConfig::default(), Box::new(DefaultConverter))
    }

    /// Creates a mapper after validating `config`.
    pub fn with_config(catalog: TypeCatalog, config: MapperConfig) -> MapperResult<Self> {
        config.validate()?;
        Ok(Self::with_parts(Arc::new(catalog), config, Box::new(DefaultConverter)))
    }

    /// Creates a mapper with a custom value converter.
    pub fn with_parts(catalog: Arc<TypeCatalog>, config: MapperConfig, converter: Box<dyn ValueConverter>) -> Self {
        Self {
            inner: Arc::new(MapperContext {
                model: MemberModel::new(Arc::clone(&catalog)),
                converter,
                registry: RwLock::new(RuleRegistry::new(catalog)),
                cache: MapperCache::new(),
                config,
            }),
        }
    }

    pub fn catalog(&self) -> &TypeCatalog {
        self.inner.model.catalog()
    }

    pub fn model(&self) -> &MemberModel {
        &self.inner.model
    }

    pub fn config(&self) -> &MapperConfig {
        &self.inner.config
    }

    /// Starts configuring rules.
    pub fn when_mapping(&self) -> MappingConfigurator<'_> {
        MappingConfigurator::new(self)
    }

    /// Validates and stores a rule, then drops every compiled mapper.
    pub fn register(&self, rule: ConfiguredRule) -> MapperResult<usize> {
        let id = self
            .inner
            .registry
            .write()
            .map_err(|_| MapperError::internal("rule registry lock poisoned"))?
            .register(rule)?;
        self.inner.cache.reset()?;
        Ok(id)
    }

    /// Number of registered rules.
    pub fn rule_count(&self) -> MapperResult<usize> {
        Ok(self
            .inner
            .registry
            .read()
            .map_err(|_| MapperError::internal("rule registry lock poisoned"))?
            .len())
    }

    /// Maps `source` to a new instance of `target_type`.
    pub fn map_to_new(&self, source: &Value, target_type: impl Into<TypeName>) -> MapperResult<Value> {
        let Some(source_type) = source.runtime_type() else {
            return self.null_or_simple(source);
        };
        self.map_to_new_from(source, source_type, target_type)
    }

    /// Maps `source` to a new instance, planning for a declared source type.
    ///
    /// Runtime subtypes of `declared_type` are dispatched through the
    /// declared plan's derived type pairs.
    pub fn map_to_new_from(
        &self,
        source: &Value,
        declared_type: impl Into<TypeName>,
        target_type: impl Into<TypeName>,
    ) -> MapperResult<Value> {
        if source.is_null() {
            return Ok(Value::Null);
        }
        let key = MapperKey::new(declared_type, target_type, RuleSet::CreateNew);
        self.run(&key, source, None)
    }

    /// Maps `source` onto `existing`, writing only values the source provides.
    pub fn map_onto(&self, source: &Value, existing: &Value) -> MapperResult<Value> {
        self.map_existing(source, existing, RuleSet::Merge)
    }

    /// Maps `source` over `existing`, resetting members the source does not provide.
    pub fn map_over(&self, source: &Value, existing: &Value) -> MapperResult<Value> {
        self.map_existing(source, existing, RuleSet::Overwrite)
    }

    fn map_existing(&self, source: &Value, existing: &Value, rule_set: RuleSet) -> MapperResult<Value> {
        let Some(source_type) = source.runtime_type() else {
            return match source {
                Value::Null => Ok(existing.clone()),
                other => self.null_or_simple(other),
            };
        };
        let target_type = existing.runtime_type().ok_or_else(|| {
            MapperError::configuration(format!(
                "Cannot map {} onto a {} value; an existing object or collection is required",
                source_type,
                existing.kind_name()
            ))
        })?;
        let key = MapperKey::new(source_type, target_type, rule_set);
        self.run(&key, source, Some(existing.clone()))
    }

    fn null_or_simple(&self, source: &Value) -> MapperResult<Value> {
        match source {
            Value::Null => Ok(Value::Null),
            other => Err(MapperError::configuration(format!(
                "Only objects and collections can be mapped; got a {} value",
                other.kind_name()
            ))),
        }
    }

    fn run(&self, key: &MapperKey, source: &Value, existing: Option<Value>) -> MapperResult<Value> {
        let compiled = self.inner.compile(key)?;
        debug!("Executing mapper for {}", key);
        compiled.execute(self.inner.as_ref(), source.clone(), existing)
    }

    /// The compiled mapper for a key, compiling it if needed.
    pub fn compiled(
        &self,
        source_type: impl Into<TypeName>,
        target_type: impl Into<TypeName>,
        rule_set: RuleSet,
    ) -> MapperResult<Arc<CompiledMapper>> {
        self.inner
            .compile(&MapperKey::new(source_type, target_type, rule_set))
    }

    /// Text rendering of the compiled plan for a key.
    pub fn explain_plan(
        &self,
        source_type: impl Into<TypeName>,
        target_type: impl Into<TypeName>,
        rule_set: RuleSet,
    ) -> MapperResult<String> {
        Ok(self.compiled(source_type, target_type, rule_set)?.explain().to_string())
    }

    /// Drops every compiled mapper; rules are kept.
    pub fn reset(&self) -> MapperResult<()> {
        self.inner.cache.reset()
    }

    pub fn cached_mapper_count(&self) -> MapperResult<usize> {
        self.inner.cache.len()
    }
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjectRef, TypeDef};

    fn catalog() -> TypeCatalog {
        let mut catalog = TypeCatalog::new();
        catalog
            .register(TypeDef::complex("Person").member("Name", "string"))
            .register(TypeDef::complex("PersonDto").member("Name", "string"));
        catalog
    }

    #[test]
    fn test_mapper_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Mapper>();
    }

    #[test]
    fn test_null_sources() {
        let mapper = Mapper::new(catalog());
        assert_eq!(mapper.map_to_new(&Value::Null, "PersonDto").unwrap(), Value::Null);

        let existing = Value::Object(ObjectRef::with_fields("PersonDto", [("Name", "Kim")]));
        let result = mapper.map_onto(&Value::Null, &existing).unwrap();
        assert!(result.same_as(&existing));
        assert_eq!(mapper.cached_mapper_count().unwrap(), 0);
    }

    #[test]
    fn test_simple_values_are_rejected() {
        let mapper = Mapper::new(catalog());
        let error = mapper.map_to_new(&Value::Int(3), "PersonDto").unwrap_err();
        assert!(error.is_configuration());
    }

    #[test]
    fn test_clones_share_the_cache() {
        let mapper = Mapper::new(catalog());
        let clone = mapper.clone();
        let source = Value::Object(ObjectRef::with_fields("Person", [("Name", "Ana")]));

        mapper.map_to_new(&source, "PersonDto").unwrap();
        assert_eq!(clone.cached_mapper_count().unwrap(), 1);

        clone.reset().unwrap();
        assert_eq!(mapper.cached_mapper_count().unwrap(), 0);
    }
}
