//! Interpreter for mapping expressions.
//!
//! Evaluates an AST against a [`VariableScope`] supplying `source`, `target`,
//! `index` and any member-level bindings.

use super::ast::{Expression, Operator, UnaryOperator};
use super::builtins::builtin;
use crate::convert::to_display_string;
use crate::error::ExpressionError;
use crate::types::{TypeCatalog, TypeName, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Supplies values for free variables.
pub trait VariableScope {
    fn lookup(&self, name: &str) -> Option<Value>;
}

impl VariableScope for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Interpreter for mapping expressions.
pub struct Interpreter<'a> {
    scope: &'a dyn VariableScope,
    /// `let` bindings, innermost last
    locals: Vec<(String, Value)>,
    catalog: Option<&'a TypeCatalog>,
}

impl<'a> Interpreter<'a> {
    pub fn new(scope: &'a dyn VariableScope) -> Self {
        Self {
            scope,
            locals: Vec::new(),
            catalog: None,
        }
    }

    /// Uses the catalog for `is` tests against base types.
    pub fn with_catalog(mut self, catalog: &'a TypeCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Evaluates an expression.
    pub fn evaluate(&mut self, expr: &Expression) -> Result<Value, ExpressionError> {
        match expr {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Variable(name) => self.evaluate_variable(name),
            Expression::FieldAccess { object, field } => self.evaluate_field_access(object, field),
            Expression::BinaryOp { left, operator, right } => self.evaluate_binary_op(left, *operator, right),
            Expression::UnaryOp { operator, expr } => self.evaluate_unary_op(*operator, expr),
            Expression::FunctionCall { name, args } => self.evaluate_function_call(name, args),
            Expression::IfElse {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate_condition(condition)? {
                    self.evaluate(then_branch)
                } else if let Some(else_expr) = else_branch {
                    self.evaluate(else_expr)
                } else {
                    Ok(Value::Null)
                }
            }
            Expression::LetBinding { name, value, body } => {
                let bound = self.evaluate(value)?;
                self.locals.push((name.clone(), bound));
                let result = self.evaluate(body);
                self.locals.pop();
                result
            }
            Expression::TypeTest { expr, type_name } => {
                let value = self.evaluate(expr)?;
                Ok(Value::Bool(self.is_instance(&value, type_name)))
            }
        }
    }

    /// Evaluates an expression used as a condition; null counts as false.
    pub fn evaluate_condition(&mut self, expr: &Expression) -> Result<bool, ExpressionError> {
        let value = self.evaluate(expr)?;
        truthy(&value)
    }

    fn evaluate_variable(&self, name: &str) -> Result<Value, ExpressionError> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(local, _)| local == name) {
            return Ok(value.clone());
        }
        self.scope
            .lookup(name)
            .ok_or_else(|| ExpressionError::UnknownVariable { name: name.to_string() })
    }

    fn evaluate_field_access(&mut self, object: &Expression, field: &str) -> Result<Value, ExpressionError> {
        match self.evaluate(object)? {
            Value::Null => Ok(Value::Null),
            Value::Object(object) => Ok(object.get_ignore_case(field).unwrap_or(Value::Null)),
            Value::List(list) if field == "Count" || field == "Length" => Ok(Value::Int(list.len() as i64)),
            Value::Str(s) if field == "Length" => Ok(Value::Int(s.chars().count() as i64)),
            other => Err(ExpressionError::FieldAccess {
                field: field.to_string(),
                value_kind: other.kind_name(),
            }),
        }
    }

    fn evaluate_binary_op(&mut self, left: &Expression, operator: Operator, right: &Expression) -> Result<Value, ExpressionError> {
        // Logical operators short-circuit.
        match operator {
            Operator::And => {
                if !self.evaluate_condition(left)? {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(self.evaluate_condition(right)?));
            }
            Operator::Or => {
                if self.evaluate_condition(left)? {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(self.evaluate_condition(right)?));
            }
            _ => {}
        }

        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        match operator {
            Operator::Add => add(&left_val, &right_val),
            Operator::Subtract => arithmetic(&left_val, &right_val, operator),
            Operator::Multiply => arithmetic(&left_val, &right_val, operator),
            Operator::Divide => divide(&left_val, &right_val),
            Operator::Power => power(&left_val, &right_val),
            Operator::Equal => Ok(Value::Bool(equal(&left_val, &right_val))),
            Operator::NotEqual => Ok(Value::Bool(!equal(&left_val, &right_val))),
            Operator::LessThan => Ok(Value::Bool(compare(&left_val, &right_val) == Some(Ordering::Less))),
            Operator::LessThanOrEqual => Ok(Value::Bool(matches!(
                compare(&left_val, &right_val),
                Some(Ordering::Less | Ordering::Equal)
            ))),
            Operator::GreaterThan => Ok(Value::Bool(compare(&left_val, &right_val) == Some(Ordering::Greater))),
            Operator::GreaterThanOrEqual => Ok(Value::Bool(matches!(
                compare(&left_val, &right_val),
                Some(Ordering::Greater | Ordering::Equal)
            ))),
            Operator::And | Operator::Or => Err(ExpressionError::type_error("unreachable logical operator")),
        }
    }

    fn evaluate_unary_op(&mut self, operator: UnaryOperator, expr: &Expression) -> Result<Value, ExpressionError> {
        let val = self.evaluate(expr)?;

        match (operator, val) {
            (UnaryOperator::Negate, Value::Int(i)) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| ExpressionError::type_error("integer overflow in negation")),
            (UnaryOperator::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
            (UnaryOperator::Negate, Value::Null) => Ok(Value::Null),
            (UnaryOperator::Negate, other) => Err(ExpressionError::type_error(format!(
                "cannot negate a {} value",
                other.kind_name()
            ))),
            (UnaryOperator::Not, other) => Ok(Value::Bool(!truthy(&other)?)),
        }
    }

    fn evaluate_function_call(&mut self, name: &str, args: &[Expression]) -> Result<Value, ExpressionError> {
        let function = builtin(name).ok_or_else(|| ExpressionError::UnknownFunction { name: name.to_string() })?;

        let mut evaluated_args = Vec::with_capacity(args.len());
        for arg in args {
            evaluated_args.push(self.evaluate(arg)?);
        }

        function(evaluated_args).map_err(|message| ExpressionError::Function {
            name: name.to_string(),
            message,
        })
    }

    fn is_instance(&self, value: &Value, type_name: &TypeName) -> bool {
        let simple_match = |names: &[&str]| names.contains(&type_name.underlying().as_str());
        match value {
            Value::Null => false,
            Value::Bool(_) => simple_match(&["bool"]),
            Value::Int(_) => simple_match(&["byte", "short", "int", "long"]),
            Value::Float(_) => simple_match(&["float", "double"]),
            Value::Char(_) => simple_match(&["char"]),
            Value::Str(_) => simple_match(&["string"]),
            other => match other.runtime_type() {
                Some(runtime) => match self.catalog {
                    Some(catalog) => catalog.is_assignable(type_name, &runtime),
                    None => &runtime == type_name,
                },
                None => false,
            },
        }
    }
}

/// Boolean value of a condition result; null counts as false.
pub fn truthy(value: &Value) -> Result<bool, ExpressionError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(ExpressionError::type_error(format!(
            "condition must be a boolean, found {}",
            other.kind_name()
        ))),
    }
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_))
}

fn add(left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    match (left, right) {
        (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!(
            "{}{}",
            to_display_string(left),
            to_display_string(right)
        ))),
        _ => arithmetic(left, right, Operator::Add),
    }
}

fn arithmetic(left: &Value, right: &Value, operator: Operator) -> Result<Value, ExpressionError> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => {
            let result = match operator {
                Operator::Add => a.checked_add(*b),
                Operator::Subtract => a.checked_sub(*b),
                Operator::Multiply => a.checked_mul(*b),
                _ => None,
            };
            result
                .map(Value::Int)
                .ok_or_else(|| ExpressionError::type_error(format!("integer overflow in {} {} {}", a, operator, b)))
        }
        (a, b) if is_number(a) && is_number(b) => {
            let (a, b) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
            Ok(Value::Float(match operator {
                Operator::Add => a + b,
                Operator::Subtract => a - b,
                _ => a * b,
            }))
        }
        (a, b) => Err(ExpressionError::type_error(format!(
            "cannot apply {} to {} and {}",
            operator,
            a.kind_name(),
            b.kind_name()
        ))),
    }
}

fn divide(left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (_, Value::Int(0)) => Err(ExpressionError::type_error("division by zero")),
        (Value::Int(a), Value::Int(b)) if a.checked_rem(*b) == Some(0) => Ok(Value::Int(a / b)),
        (a, b) if is_number(a) && is_number(b) => {
            let divisor = b.as_f64().unwrap_or_default();
            if divisor == 0.0 {
                return Err(ExpressionError::type_error("division by zero"));
            }
            Ok(Value::Float(a.as_f64().unwrap_or_default() / divisor))
        }
        (a, b) => Err(ExpressionError::type_error(format!(
            "cannot divide {} by {}",
            a.kind_name(),
            b.kind_name()
        ))),
    }
}

fn power(left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(base), Value::Int(exponent)) if (0..=i64::from(u32::MAX)).contains(exponent) => base
            .checked_pow(*exponent as u32)
            .map(Value::Int)
            .ok_or_else(|| ExpressionError::type_error("integer overflow in power")),
        (a, b) if is_number(a) && is_number(b) => Ok(Value::Float(
            a.as_f64().unwrap_or_default().powf(b.as_f64().unwrap_or_default()),
        )),
        (a, b) => Err(ExpressionError::type_error(format!(
            "cannot raise {} to {}",
            a.kind_name(),
            b.kind_name()
        ))),
    }
}

/// Equality across simple kinds; enums compare with strings by name and with numbers by ordinal.
pub fn equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (a, b) if is_number(a) && is_number(b) => a.as_f64() == b.as_f64(),
        (Value::Enum(e), Value::Str(s)) | (Value::Str(s), Value::Enum(e)) => e.name.eq_ignore_ascii_case(s),
        (Value::Enum(e), Value::Int(i)) | (Value::Int(i), Value::Enum(e)) => e.ordinal == *i,
        (Value::Enum(a), Value::Enum(b)) if a.type_name != b.type_name => a.name == b.name,
        (Value::Char(c), Value::Str(s)) | (Value::Str(s), Value::Char(c)) => {
            let mut chars = s.chars();
            chars.next() == Some(*c) && chars.next().is_none()
        }
        (a, b) => a == b,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (a, b) if is_number(a) && is_number(b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
        (Value::Enum(a), Value::Enum(b)) => Some(a.ordinal.cmp(&b.ordinal)),
        (Value::Enum(e), Value::Int(i)) => Some(e.ordinal.cmp(i)),
        (Value::Int(i), Value::Enum(e)) => Some(i.cmp(&e.ordinal)),
        _ => None,
    }
}
