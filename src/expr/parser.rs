//! PEST parser for mapping expressions.
//!
//! Converts expression text into an [`Expression`] tree.

use super::ast::{Expression, Operator, UnaryOperator};
use crate::error::ExpressionError;
use crate::types::{TypeName, Value};
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "expr/expression.pest"]
pub struct ExpressionParser;

/// Parses expression text.
pub fn parse_expression(input: &str) -> Result<Expression, ExpressionError> {
    ExpressionParser::new().parse_expression(input)
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>, context: &str) -> Result<Pair<'i, Rule>, ExpressionError> {
    pairs
        .next()
        .ok_or_else(|| ExpressionError::parse(format!("Incomplete {}", context)))
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_let | Rule::kw_if | Rule::kw_then | Rule::kw_else | Rule::kw_is
    )
}

impl Default for ExpressionParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses the input into an expression AST.
    pub fn parse_expression(&self, input: &str) -> Result<Expression, ExpressionError> {
        let mut pairs = Self::parse(Rule::complete_expr, input).map_err(ExpressionError::parse)?;
        let complete = next_pair(&mut pairs, "expression")?;
        self.build_ast(complete)
    }

    fn build_ast(&self, pair: Pair<Rule>) -> Result<Expression, ExpressionError> {
        match pair.as_rule() {
            Rule::complete_expr | Rule::expr => {
                let mut inner = pair.into_inner();
                let first = next_pair(&mut inner, "expression")?;
                self.build_ast(first)
            }
            Rule::let_expr => self.parse_let_expr(pair),
            Rule::if_expr => self.parse_if_expr(pair),
            Rule::logic_expr => self.parse_binary_level(pair, Rule::logic_op),
            Rule::comp_expr => self.parse_comp_expr(pair),
            Rule::add_expr => self.parse_binary_level(pair, Rule::add_op),
            Rule::mul_expr => self.parse_binary_level(pair, Rule::mul_op),
            Rule::pow_expr => self.parse_binary_level(pair, Rule::pow_op),
            Rule::unary_expr => self.parse_unary_expr(pair),
            Rule::atom => self.parse_atom(pair),
            other => Err(ExpressionError::parse(format!("Unexpected rule: {:?}", other))),
        }
    }

    /// Sub-expressions of a rule, skipping keyword tokens.
    fn sub_expressions<'i>(&self, pair: Pair<'i, Rule>) -> impl Iterator<Item = Pair<'i, Rule>> {
        pair.into_inner().filter(|inner| !is_keyword(inner.as_rule()))
    }

    fn parse_let_expr(&self, pair: Pair<Rule>) -> Result<Expression, ExpressionError> {
        let mut parts = self.sub_expressions(pair);
        let name = parts
            .next()
            .ok_or_else(|| ExpressionError::parse("let binding without a name"))?
            .as_str()
            .to_string();
        let value = parts
            .next()
            .ok_or_else(|| ExpressionError::parse("let binding without a value"))?;
        let body = parts
            .next()
            .ok_or_else(|| ExpressionError::parse("let binding without a body"))?;
        Ok(Expression::LetBinding {
            name,
            value: Box::new(self.build_ast(value)?),
            body: Box::new(self.build_ast(body)?),
        })
    }

    fn parse_if_expr(&self, pair: Pair<Rule>) -> Result<Expression, ExpressionError> {
        let mut parts = self.sub_expressions(pair);
        let condition = parts
            .next()
            .ok_or_else(|| ExpressionError::parse("if without a condition"))?;
        let then_branch = parts
            .next()
            .ok_or_else(|| ExpressionError::parse("if without a then branch"))?;
        let else_branch = match parts.next() {
            Some(else_pair) => Some(Box::new(self.build_ast(else_pair)?)),
            None => None,
        };
        Ok(Expression::IfElse {
            condition: Box::new(self.build_ast(condition)?),
            then_branch: Box::new(self.build_ast(then_branch)?),
            else_branch,
        })
    }

    /// Parses a left-associative chain of operands separated by `op_rule` tokens.
    fn parse_binary_level(&self, pair: Pair<Rule>, op_rule: Rule) -> Result<Expression, ExpressionError> {
        let mut pairs = pair.into_inner();
        let first = next_pair(&mut pairs, "operand")?;
        let mut expr = self.build_ast(first)?;

        while let Some(op_pair) = pairs.next() {
            if op_pair.as_rule() != op_rule {
                return Err(ExpressionError::parse(format!(
                    "Expected operator, found '{}'",
                    op_pair.as_str()
                )));
            }
            let operator = operator_for(op_pair.as_str())?;
            let right_pair = next_pair(&mut pairs, "binary operation")?;
            let right = self.build_ast(right_pair)?;

            expr = Expression::BinaryOp {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn parse_comp_expr(&self, pair: Pair<Rule>) -> Result<Expression, ExpressionError> {
        let is_type_test = pair
            .clone()
            .into_inner()
            .next()
            .map(|first| first.as_rule() == Rule::type_test)
            .unwrap_or(false);
        if !is_type_test {
            return self.parse_binary_level(pair, Rule::comp_op);
        }

        let mut pairs = pair.into_inner();
        let type_test = next_pair(&mut pairs, "type test")?;
        let mut parts = self.sub_expressions(type_test);
        let operand = parts
            .next()
            .ok_or_else(|| ExpressionError::parse("type test without an operand"))?;
        let type_name = parts
            .next()
            .ok_or_else(|| ExpressionError::parse("type test without a type"))?;
        Ok(Expression::TypeTest {
            expr: Box::new(self.build_ast(operand)?),
            type_name: TypeName::new(type_name.as_str()),
        })
    }

    fn parse_unary_expr(&self, pair: Pair<Rule>) -> Result<Expression, ExpressionError> {
        let mut operators = Vec::new();
        let mut operand = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::unary_op => operators.push(match inner.as_str() {
                    "-" => UnaryOperator::Negate,
                    "!" => UnaryOperator::Not,
                    other => return Err(ExpressionError::parse(format!("Unknown unary operator: {}", other))),
                }),
                _ => operand = Some(self.build_ast(inner)?),
            }
        }
        let mut expr = operand.ok_or_else(|| ExpressionError::parse("unary operator without an operand"))?;

        // Operators apply innermost first.
        for operator in operators.into_iter().rev() {
            expr = match (operator, expr) {
                (UnaryOperator::Negate, Expression::Literal(Value::Int(i))) => Expression::Literal(Value::Int(-i)),
                (UnaryOperator::Negate, Expression::Literal(Value::Float(f))) => Expression::Literal(Value::Float(-f)),
                (operator, expr) => Expression::UnaryOp {
                    operator,
                    expr: Box::new(expr),
                },
            };
        }
        Ok(expr)
    }

    fn parse_atom(&self, pair: Pair<Rule>) -> Result<Expression, ExpressionError> {
        let mut inner = pair.into_inner();
        let atom = next_pair(&mut inner, "atom")?;

        match atom.as_rule() {
            Rule::number => parse_number(atom.as_str()),
            Rule::string => {
                let raw = atom.as_str();
                Ok(Expression::Literal(Value::Str(raw[1..raw.len() - 1].to_string())))
            }
            Rule::boolean => Ok(Expression::Literal(Value::Bool(atom.as_str() == "true"))),
            Rule::null => Ok(Expression::Literal(Value::Null)),
            Rule::function_call => self.parse_function_call(atom),
            Rule::field_access => self.parse_field_access(atom),
            Rule::identifier => Ok(Expression::Variable(atom.as_str().to_string())),
            Rule::expr => self.build_ast(atom),
            other => Err(ExpressionError::parse(format!("Unexpected atom: {:?}", other))),
        }
    }

    fn parse_field_access(&self, pair: Pair<Rule>) -> Result<Expression, ExpressionError> {
        let mut inner = pair.into_inner();
        let root = next_pair(&mut inner, "field access")?;
        let mut expr = Expression::Variable(root.as_str().to_string());

        for field in inner {
            expr = Expression::FieldAccess {
                object: Box::new(expr),
                field: field.as_str().to_string(),
            };
        }

        Ok(expr)
    }

    fn parse_function_call(&self, pair: Pair<Rule>) -> Result<Expression, ExpressionError> {
        let mut inner = pair.into_inner();
        let name = next_pair(&mut inner, "function call")?.as_str().to_string();
        let args = inner
            .map(|arg| self.build_ast(arg))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Expression::FunctionCall { name, args })
    }
}

fn operator_for(symbol: &str) -> Result<Operator, ExpressionError> {
    Ok(match symbol {
        "+" => Operator::Add,
        "-" => Operator::Subtract,
        "*" => Operator::Multiply,
        "/" => Operator::Divide,
        "^" => Operator::Power,
        "==" => Operator::Equal,
        "!=" => Operator::NotEqual,
        "<" => Operator::LessThan,
        "<=" => Operator::LessThanOrEqual,
        ">" => Operator::GreaterThan,
        ">=" => Operator::GreaterThanOrEqual,
        "&&" => Operator::And,
        "||" => Operator::Or,
        other => return Err(ExpressionError::parse(format!("Unknown operator: {}", other))),
    })
}

fn parse_number(text: &str) -> Result<Expression, ExpressionError> {
    if text.contains('.') {
        text.parse::<f64>()
            .map(|n| Expression::Literal(Value::Float(n)))
            .map_err(|e| ExpressionError::parse(format!("Invalid number '{}': {}", text, e)))
    } else {
        text.parse::<i64>()
            .map(|n| Expression::Literal(Value::Int(n)))
            .map_err(|e| ExpressionError::parse(format!("Invalid number '{}': {}", text, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Expression {
        parse_expression(input).unwrap()
    }

    #[test]
    fn test_parse_member_access() {
        assert_eq!(parse("source.Address.Line1").to_string(), "source.Address.Line1");
        assert_eq!(parse("index"), Expression::variable("index"));
    }

    #[test]
    fn test_parse_precedence() {
        assert_eq!(parse("1 + 2 * 3").to_string(), "(1 + (2 * 3))");
        assert_eq!(parse("(1 + 2) * 3").to_string(), "((1 + 2) * 3)");
        assert_eq!(
            parse("source.Age >= 18 && source.Name != null").to_string(),
            "((source.Age >= 18) && (source.Name != null))"
        );
    }

    #[test]
    fn test_parse_string_concatenation() {
        assert_eq!(
            parse("source.Title + \" \" + source.Name").to_string(),
            "((source.Title + \" \") + source.Name)"
        );
    }

    #[test]
    fn test_parse_functions_and_unary() {
        assert_eq!(parse("max(-1, source.Count)").to_string(), "max(-1, source.Count)");
        assert_eq!(parse("!source.Active").to_string(), "!(source.Active)");
    }

    #[test]
    fn test_parse_if_and_let() {
        assert_eq!(
            parse("if source.Count > 0 then \"some\" else \"none\"").to_string(),
            "if (source.Count > 0) then \"some\" else \"none\""
        );
        assert_eq!(parse("let x = 2; x * x").to_string(), "let x = 2; (x * x)");
    }

    #[test]
    fn test_parse_type_test() {
        let expr = parse("source is Customer");
        assert!(expr.contains_type_test());
        assert_eq!(expr.to_string(), "source is Customer");
    }

    #[test]
    fn test_identifiers_may_start_with_keywords() {
        assert_eq!(parse("source.isActive").to_string(), "source.isActive");
        assert_eq!(parse("iffy"), Expression::variable("iffy"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_expression("1 +"), Err(ExpressionError::Parse { .. })));
        assert!(parse_expression("source.").is_err());
    }
}
