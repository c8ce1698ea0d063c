//! Error types for the mapper.
//!
//! Configuration problems surface when a rule is registered, unconvertible or
//! unknown types surface when a plan is compiled, and failures raised while a
//! compiled plan runs are wrapped with the mapping and member they happened in.

use crate::types::TypeName;
use std::fmt;
use thiserror::Error;

/// Result type for mapper operations.
pub type MapperResult<T> = Result<T, MapperError>;

/// Errors raised by configuration, plan compilation or plan execution.
#[derive(Debug, Error, Clone)]
pub enum MapperError {
    /// Invalid, conflicting or unreachable configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A data source can never be converted to the member it populates
    #[error("Unable to convert {source_type} to {target_type} for member '{member}'")]
    UnconvertibleType {
        source_type: TypeName,
        target_type: TypeName,
        member: String,
    },

    /// A type name that is not registered in the catalog
    #[error("Unknown type: {type_name}")]
    UnknownType { type_name: String },

    /// Parsing or evaluating a configured expression failed
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// A user callback reported a failure
    #[error("Callback failed: {message}")]
    Callback { message: String },

    /// Failure while running a compiled plan, tagged with where it happened
    #[error("An exception was thrown mapping {source_type} -> {target_type}.{member}: {cause}")]
    MappingExecution {
        source_type: TypeName,
        target_type: TypeName,
        member: String,
        cause: Box<MapperError>,
    },

    /// Configuration file could not be read or parsed
    #[error("Unable to load configuration: {message}")]
    ConfigLoad { message: String },

    /// Broken internal invariant
    #[error("Internal mapper error: {message}")]
    Internal { message: String },
}

impl MapperError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback {
            message: message.into(),
        }
    }

    /// Wraps the error with the mapping it was raised in.
    ///
    /// Errors that are already wrapped pass through unchanged so the innermost
    /// location is the one reported.
    pub fn in_mapping(self, source_type: &TypeName, target_type: &TypeName, member: &str) -> Self {
        match self {
            wrapped @ MapperError::MappingExecution { .. } => wrapped,
            other => MapperError::MappingExecution {
                source_type: source_type.clone(),
                target_type: target_type.clone(),
                member: member.to_string(),
                cause: Box::new(other),
            },
        }
    }

    /// Returns the innermost error for wrapped execution failures.
    pub fn root_cause(&self) -> &MapperError {
        match self {
            MapperError::MappingExecution { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, MapperError::Configuration { .. })
    }
}

/// Errors produced by the expression parser and interpreter.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Expression parse error: {message}")]
    Parse { message: String },

    #[error("Unknown variable: {name}")]
    UnknownVariable { name: String },

    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("Cannot access field '{field}' on {value_kind}")]
    FieldAccess { field: String, value_kind: String },

    #[error("Type error: {message}")]
    Type { message: String },

    #[error("Function '{name}' failed: {message}")]
    Function { name: String, message: String },
}

impl ExpressionError {
    pub fn parse(message: impl fmt::Display) -> Self {
        Self::Parse {
            message: message.to_string(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping_keeps_innermost_location() {
        let person = TypeName::new("Person");
        let dto = TypeName::new("PersonDto");
        let address = TypeName::new("Address");

        let inner = MapperError::callback("boom").in_mapping(&address, &address, "Line1");
        let outer = inner.in_mapping(&person, &dto, "Address");

        match &outer {
            MapperError::MappingExecution {
                source_type,
                member,
                ..
            } => {
                assert_eq!(source_type, &address);
                assert_eq!(member, "Line1");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(outer.root_cause(), MapperError::Callback { .. }));
    }

    #[test]
    fn test_execution_message_names_the_mapping() {
        let error = MapperError::callback("boom").in_mapping(
            &TypeName::new("Person"),
            &TypeName::new("PersonDto"),
            "Name",
        );
        assert_eq!(
            error.to_string(),
            "An exception was thrown mapping Person -> PersonDto.Name: Callback failed: boom"
        );
    }
}
