use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::convert::to_display_string;
use crate::types::Value;

/// Type for function implementations in the interpreter
pub type BuiltinFunction = Box<dyn Fn(Vec<Value>) -> Result<Value, String> + Send + Sync>;

static BUILTINS: Lazy<HashMap<String, BuiltinFunction>> = Lazy::new(builtin_functions);

/// Looks up a built-in function by name.
pub fn builtin(name: &str) -> Option<&'static BuiltinFunction> {
    BUILTINS.get(name)
}

fn number(args: &[Value], index: usize, function: &str) -> Result<f64, String> {
    args[index]
        .as_f64()
        .ok_or_else(|| format!("{}() requires numeric arguments", function))
}

fn all_ints(args: &[Value]) -> bool {
    args.iter().all(|arg| matches!(arg, Value::Int(_)))
}

fn numeric_result(value: f64, ints: bool) -> Value {
    if ints {
        Value::Int(value as i64)
    } else {
        Value::Float(value)
    }
}

fn arity(args: &[Value], expected: usize, function: &str) -> Result<(), String> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(format!(
            "{}() requires exactly {} argument{}",
            function,
            expected,
            if expected == 1 { "" } else { "s" }
        ))
    }
}

fn text(args: &[Value], function: &str) -> Result<Option<String>, String> {
    match &args[0] {
        Value::Null => Ok(None),
        Value::Str(s) => Ok(Some(s.clone())),
        _ => Err(format!("{}() requires a string argument", function)),
    }
}

/// Returns the default set of built-in functions for the interpreter.
pub fn builtin_functions() -> HashMap<String, BuiltinFunction> {
    let mut functions: HashMap<String, BuiltinFunction> = HashMap::new();

    // Math functions
    functions.insert(
        "min".to_string(),
        Box::new(|args| {
            arity(&args, 2, "min")?;
            let (a, b) = (number(&args, 0, "min")?, number(&args, 1, "min")?);
            Ok(numeric_result(a.min(b), all_ints(&args)))
        }),
    );

    functions.insert(
        "max".to_string(),
        Box::new(|args| {
            arity(&args, 2, "max")?;
            let (a, b) = (number(&args, 0, "max")?, number(&args, 1, "max")?);
            Ok(numeric_result(a.max(b), all_ints(&args)))
        }),
    );

    functions.insert(
        "clamp".to_string(),
        Box::new(|args| {
            arity(&args, 3, "clamp")?;
            let value = number(&args, 0, "clamp")?;
            let min = number(&args, 1, "clamp")?;
            let max = number(&args, 2, "clamp")?;
            Ok(numeric_result(value.max(min).min(max), all_ints(&args)))
        }),
    );

    functions.insert(
        "abs".to_string(),
        Box::new(|args| {
            arity(&args, 1, "abs")?;
            match &args[0] {
                Value::Int(i) => i
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| "abs() overflowed".to_string()),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                Value::Null => Ok(Value::Null),
                _ => Err("abs() requires a numeric argument".to_string()),
            }
        }),
    );

    functions.insert(
        "round".to_string(),
        Box::new(|args| {
            if args.is_empty() || args.len() > 2 {
                return Err("round() requires 1 or 2 arguments".to_string());
            }
            if args[0].is_null() {
                return Ok(Value::Null);
            }
            let value = number(&args, 0, "round")?;
            let places = match args.get(1) {
                Some(Value::Int(places)) => *places,
                Some(_) => return Err("round() places must be an integer".to_string()),
                None => 0,
            };
            let factor = 10f64.powi(places as i32);
            Ok(Value::Float((value * factor).round() / factor))
        }),
    );

    // String functions
    functions.insert(
        "concat".to_string(),
        Box::new(|args| {
            let mut result = String::new();
            for arg in &args {
                result.push_str(&to_display_string(arg));
            }
            Ok(Value::Str(result))
        }),
    );

    functions.insert(
        "upper".to_string(),
        Box::new(|args| {
            arity(&args, 1, "upper")?;
            Ok(text(&args, "upper")?.map(|s| Value::Str(s.to_uppercase())).unwrap_or(Value::Null))
        }),
    );

    functions.insert(
        "lower".to_string(),
        Box::new(|args| {
            arity(&args, 1, "lower")?;
            Ok(text(&args, "lower")?.map(|s| Value::Str(s.to_lowercase())).unwrap_or(Value::Null))
        }),
    );

    functions.insert(
        "trim".to_string(),
        Box::new(|args| {
            arity(&args, 1, "trim")?;
            Ok(text(&args, "trim")?
                .map(|s| Value::Str(s.trim().to_string()))
                .unwrap_or(Value::Null))
        }),
    );

    functions.insert(
        "len".to_string(),
        Box::new(|args| {
            arity(&args, 1, "len")?;
            match &args[0] {
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::List(list) => Ok(Value::Int(list.len() as i64)),
                Value::Null => Ok(Value::Int(0)),
                _ => Err("len() requires a string or a collection".to_string()),
            }
        }),
    );

    functions.insert(
        "string".to_string(),
        Box::new(|args| {
            arity(&args, 1, "string")?;
            Ok(match &args[0] {
                Value::Null => Value::Null,
                other => Value::Str(to_display_string(other)),
            })
        }),
    );

    // Null handling
    functions.insert(
        "coalesce".to_string(),
        Box::new(|args| Ok(args.into_iter().find(|arg| !arg.is_null()).unwrap_or(Value::Null))),
    );

    // Keyed lookup on dictionary-like objects: the first key present wins.
    functions.insert(
        "entry".to_string(),
        Box::new(|args| {
            let Some((bag, keys)) = args.split_first() else {
                return Err("entry() requires an object and at least one key".to_string());
            };
            let object = match bag {
                Value::Object(object) => object,
                Value::Null => return Ok(Value::Null),
                _ => return Err("entry() requires an object".to_string()),
            };
            for key in keys {
                let Value::Str(key) = key else {
                    return Err("entry() keys must be strings".to_string());
                };
                if let Some(found) = object.get_ignore_case(key) {
                    return Ok(found);
                }
            }
            Ok(Value::Null)
        }),
    );

    functions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectRef;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, String> {
        builtin(name).ok_or("missing builtin")?(args)
    }

    #[test]
    fn test_math_keeps_integers_integral() {
        assert_eq!(call("max", vec![Value::Int(2), Value::Int(5)]), Ok(Value::Int(5)));
        assert_eq!(call("min", vec![Value::Int(2), Value::Float(0.5)]), Ok(Value::Float(0.5)));
        assert_eq!(
            call("clamp", vec![Value::Int(12), Value::Int(0), Value::Int(10)]),
            Ok(Value::Int(10))
        );
        assert_eq!(call("round", vec![Value::Float(2.346), Value::Int(2)]), Ok(Value::Float(2.35)));
    }

    #[test]
    fn test_strings_and_nulls() {
        assert_eq!(
            call("concat", vec![Value::from("a"), Value::Int(1), Value::Null]),
            Ok(Value::from("a1"))
        );
        assert_eq!(call("upper", vec![Value::Null]), Ok(Value::Null));
        assert_eq!(
            call("coalesce", vec![Value::Null, Value::from("x")]),
            Ok(Value::from("x"))
        );
        assert!(call("min", vec![Value::from("a"), Value::Int(1)]).is_err());
    }

    #[test]
    fn test_entry_tries_keys_in_order() {
        let bag = ObjectRef::with_fields("Bag", [("addressline1", "Main St")]);
        let found = call(
            "entry",
            vec![
                Value::Object(bag),
                Value::from("Address.Line1"),
                Value::from("AddressLine1"),
            ],
        );
        assert_eq!(found, Ok(Value::from("Main St")));
    }
}
