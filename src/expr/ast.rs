//! Abstract syntax tree for mapping expressions.
//!
//! Expressions read from three variables: `source`, `target` and `index`.
//! Field access is null-propagating, so `source.Address.Line1` is null when
//! `Address` is.

use crate::types::{TypeName, Value};
use std::fmt;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Addition, or concatenation when either side is a string (+)
    Add,
    /// Subtraction (-)
    Subtract,
    /// Multiplication (*)
    Multiply,
    /// Division (/)
    Divide,
    /// Power (^)
    Power,
    /// Equality (==)
    Equal,
    /// Inequality (!=)
    NotEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal (<=)
    LessThanOrEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal (>=)
    GreaterThanOrEqual,
    /// Logical AND (&&)
    And,
    /// Logical OR (||)
    Or,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Power => "^",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::And => "&&",
            Operator::Or => "||",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Negation (-)
    Negate,
    /// Logical NOT (!)
    Not,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Not => write!(f, "!"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),

    Variable(String),

    /// Null-propagating member read (e.g., source.Address)
    FieldAccess {
        object: Box<Expression>,
        field: String,
    },

    BinaryOp {
        left: Box<Expression>,
        operator: Operator,
        right: Box<Expression>,
    },

    UnaryOp {
        operator: UnaryOperator,
        expr: Box<Expression>,
    },

    /// Built-in function call (e.g., concat(a, b))
    FunctionCall { name: String, args: Vec<Expression> },

    /// Conditional (e.g., if a > b then a else b)
    IfElse {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Option<Box<Expression>>,
    },

    /// Local binding (e.g., let x = a + b; x * 2)
    LetBinding {
        name: String,
        value: Box<Expression>,
        body: Box<Expression>,
    },

    /// Runtime type test (e.g., source is Customer)
    TypeTest {
        expr: Box<Expression>,
        type_name: TypeName,
    },
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    /// Builds `root.a.b.c` from a variable and member names.
    pub fn member_path(root: &str, names: &[String]) -> Self {
        names.iter().fold(Expression::variable(root), |object, field| Expression::FieldAccess {
            object: Box::new(object),
            field: field.clone(),
        })
    }

    pub fn not(expr: Expression) -> Self {
        Expression::UnaryOp {
            operator: UnaryOperator::Not,
            expr: Box::new(expr),
        }
    }

    /// Splits a plain member read into its root variable and member names.
    pub fn as_member_path(&self) -> Option<(&str, Vec<String>)> {
        match self {
            Expression::Variable(name) => Some((name.as_str(), Vec::new())),
            Expression::FieldAccess { object, field } => {
                let (root, mut names) = object.as_member_path()?;
                names.push(field.clone());
                Some((root, names))
            }
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expression::Literal(_))
    }

    pub fn contains_type_test(&self) -> bool {
        self.any(&|expr| matches!(expr, Expression::TypeTest { .. }))
    }

    /// Whether `other` occurs anywhere inside this expression, including itself.
    pub fn contains(&self, other: &Expression) -> bool {
        self.any(&|expr| expr == other)
    }

    /// Replaces every occurrence of `pattern` with `replacement`.
    pub fn replace(&self, pattern: &Expression, replacement: &Expression) -> Expression {
        if self == pattern {
            return replacement.clone();
        }
        let swap = |expr: &Expression| Box::new(expr.replace(pattern, replacement));
        match self {
            Expression::Literal(_) | Expression::Variable(_) => self.clone(),
            Expression::FieldAccess { object, field } => Expression::FieldAccess {
                object: swap(object),
                field: field.clone(),
            },
            Expression::BinaryOp { left, operator, right } => Expression::BinaryOp {
                left: swap(left),
                operator: *operator,
                right: swap(right),
            },
            Expression::UnaryOp { operator, expr } => Expression::UnaryOp {
                operator: *operator,
                expr: swap(expr),
            },
            Expression::FunctionCall { name, args } => Expression::FunctionCall {
                name: name.clone(),
                args: args.iter().map(|arg| arg.replace(pattern, replacement)).collect(),
            },
            Expression::IfElse {
                condition,
                then_branch,
                else_branch,
            } => Expression::IfElse {
                condition: swap(condition),
                then_branch: swap(then_branch),
                else_branch: else_branch.as_ref().map(|expr| swap(expr)),
            },
            Expression::LetBinding { name, value, body } => Expression::LetBinding {
                name: name.clone(),
                value: swap(value),
                body: swap(body),
            },
            Expression::TypeTest { expr, type_name } => Expression::TypeTest {
                expr: swap(expr),
                type_name: type_name.clone(),
            },
        }
    }

    fn any(&self, predicate: &dyn Fn(&Expression) -> bool) -> bool {
        if predicate(self) {
            return true;
        }
        match self {
            Expression::Literal(_) | Expression::Variable(_) => false,
            Expression::FieldAccess { object, .. } => object.any(predicate),
            Expression::BinaryOp { left, right, .. } => left.any(predicate) || right.any(predicate),
            Expression::UnaryOp { expr, .. } => expr.any(predicate),
            Expression::FunctionCall { args, .. } => args.iter().any(|arg| arg.any(predicate)),
            Expression::IfElse {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.any(predicate)
                    || then_branch.any(predicate)
                    || else_branch.as_ref().map(|expr| expr.any(predicate)).unwrap_or(false)
            }
            Expression::LetBinding { value, body, .. } => value.any(predicate) || body.any(predicate),
            Expression::TypeTest { expr, .. } => expr.any(predicate),
        }
    }
}

fn fmt_literal(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::Str(s) => write!(f, "\"{}\"", s),
        Value::Char(c) => write!(f, "'{}'", c),
        Value::Float(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{:.1}", n),
        other => write!(f, "{}", other),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => fmt_literal(value, f),
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::FieldAccess { object, field } => write!(f, "{}.{}", object, field),
            Expression::BinaryOp { left, operator, right } => write!(f, "({} {} {})", left, operator, right),
            Expression::UnaryOp { operator, expr } => write!(f, "{}({})", operator, expr),
            Expression::FunctionCall { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expression::IfElse {
                condition,
                then_branch,
                else_branch,
            } => {
                write!(f, "if {} then {}", condition, then_branch)?;
                if let Some(else_expr) = else_branch {
                    write!(f, " else {}", else_expr)?;
                }
                Ok(())
            }
            Expression::LetBinding { name, value, body } => write!(f, "let {} = {}; {}", name, value, body),
            Expression::TypeTest { expr, type_name } => write!(f, "{} is {}", expr, type_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_paths_round_trip() {
        let names = vec!["Address".to_string(), "Line1".to_string()];
        let expr = Expression::member_path("source", &names);

        assert_eq!(expr.to_string(), "source.Address.Line1");
        assert_eq!(expr.as_member_path(), Some(("source", names)));
    }

    #[test]
    fn test_replace_swaps_every_occurrence() {
        let discount = Expression::member_path("source", &["Discount".to_string()]);
        let expr = Expression::BinaryOp {
            left: Box::new(discount.clone()),
            operator: Operator::NotEqual,
            right: Box::new(Expression::literal(Value::Null)),
        };

        let replaced = expr.replace(&discount, &Expression::variable("bound"));
        assert_eq!(replaced.to_string(), "(bound != null)");
        assert!(expr.contains(&discount));
        assert!(!replaced.contains(&discount));
    }
}
