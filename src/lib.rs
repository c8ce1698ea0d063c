//! # DataFold Mapper
//!
//! Convention-based object-graph mapping. Given a source value and a target
//! type (or an existing target), the mapper matches members by name, converts
//! simple values, maps nested objects and reconciles collections, with no
//! per-type mapping code.
//!
//! ## Core Components
//!
//! * `types` - Type catalog, runtime values and member descriptors
//! * `convert` - Simple value conversion
//! * `expr` - Expression language for configured data sources and conditions
//! * `rules` - Rule registry and fluent configuration
//! * `plan` - Mapping plan compiler and plan rendering
//! * `exec` - Plan evaluation
//! * `cache` - Compiled mapper cache
//! * `config` - Mapper configuration loading
//! * `logging` - Logger setup
//! * `error` - Error types
//!
//! ## Architecture
//!
//! Every (source type, target type, rule set) key is compiled once into a
//! [`plan::MappingPlan`]: member-by-member data source chains, inlined nested
//! objects, mapping functions for recursive types and a dispatch table for
//! derived types. Compiled plans are cached per [`Mapper`] and run by a
//! tree-walking evaluator with a fresh identity map per call, so shared
//! source references stay shared and cyclic graphs terminate.
//!
//! ```ignore
//! let mapper = Mapper::new(catalog);
//! let view = mapper.map_to_new(&person, "PersonViewModel")?;
//! println!("{}", mapper.explain_plan("Person", "PersonViewModel", RuleSet::CreateNew)?);
//! ```

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod exec;
pub mod expr;
pub mod logging;
pub mod mapper;
pub mod plan;
pub mod rules;
pub mod types;

// Re-export main types for convenience
pub use cache::{CompiledMapper, MapperCache};
pub use config::MapperConfig;
pub use convert::{DefaultConverter, ValueConverter};
pub use error::{ExpressionError, MapperError, MapperResult};
pub use logging::{init_logging, LoggingConfig};
pub use mapper::Mapper;
pub use plan::{explain, MapperKey, MappingPlan};
pub use rules::{
    CallbackContext, CallbackEvent, CallbackTiming, ConfiguredRule, ErrorStrategy, MappingConfigurator, RuleAction,
    RuleScope, RuleSet,
};
pub use types::{
    CollectionKind, ListRef, MemberDef, MemberModel, ObjectRef, TypeCatalog, TypeDef, TypeName, Value,
};
