//! # Mapping expressions
//!
//! Configured data sources and conditions are written in a small expression
//! language, parsed once at configuration time and evaluated by the plan
//! evaluator.
//!
//! ## Components
//!
//! * `ast` - Expression tree
//! * `parser` - PEST grammar and tree builder
//! * `interpreter` - Evaluation against `source`, `target` and `index`
//! * `builtins` - Built-in functions

pub mod ast;
pub mod builtins;
pub mod interpreter;
pub mod parser;

pub use ast::{Expression, Operator, UnaryOperator};
pub use interpreter::{truthy, Interpreter, VariableScope};
pub use parser::{parse_expression, ExpressionParser};
