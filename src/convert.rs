//! Simple-value conversion.
//!
//! The plan builder asks [`ValueConverter::can_convert`] when it compiles a
//! data source, and the evaluator calls [`ValueConverter::convert`] on every
//! simple value it writes. Values that cannot be converted at runtime become
//! the target type's fallback: null for nullable targets and strings, the
//! default value otherwise.

use crate::error::{MapperError, MapperResult};
use crate::types::{EnumValue, SimpleKind, TypeDescriptor, Value};

/// Converts simple values between descriptor types.
pub trait ValueConverter: Send + Sync {
    fn can_convert(&self, from: &TypeDescriptor, to: &TypeDescriptor) -> bool;

    fn convert(&self, value: &Value, to: &TypeDescriptor) -> Value;

    /// Fails with [`MapperError::UnconvertibleType`] when no conversion exists.
    fn ensure_convertible(&self, from: &TypeDescriptor, to: &TypeDescriptor, member: &str) -> MapperResult<()> {
        if self.can_convert(from, to) {
            Ok(())
        } else {
            Err(MapperError::UnconvertibleType {
                source_type: from.name.clone(),
                target_type: to.name.clone(),
                member: member.to_string(),
            })
        }
    }
}

/// Built-in conversions between numbers, strings, characters, booleans and enums.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConverter;

impl ValueConverter for DefaultConverter {
    fn can_convert(&self, from: &TypeDescriptor, to: &TypeDescriptor) -> bool {
        let (Some(from_kind), Some(to_kind)) = (from.simple_kind, to.simple_kind) else {
            return false;
        };
        match (from_kind, to_kind) {
            (SimpleKind::Bool, SimpleKind::Enum) | (SimpleKind::Enum, SimpleKind::Bool) => false,
            (SimpleKind::Bool, SimpleKind::Char) | (SimpleKind::Char, SimpleKind::Bool) => false,
            _ => true,
        }
    }

    fn convert(&self, value: &Value, to: &TypeDescriptor) -> Value {
        let Some(kind) = to.simple_kind else {
            return value.clone();
        };
        if value.is_null() {
            return to.default_value();
        }
        let converted = match kind {
            SimpleKind::Bool => to_bool(value).map(Value::Bool),
            SimpleKind::Byte | SimpleKind::Short | SimpleKind::Int | SimpleKind::Long => to_i64(value)
                .filter(|number| {
                    kind.integral_range()
                        .map(|(min, max)| (min..=max).contains(number))
                        .unwrap_or(true)
                })
                .map(Value::Int),
            SimpleKind::Float | SimpleKind::Double => to_f64(value).map(Value::Float),
            SimpleKind::Char => to_char(value).map(Value::Char),
            SimpleKind::String => Some(Value::Str(to_display_string(value))),
            SimpleKind::Enum => to_enum(value, to),
        };
        converted.unwrap_or_else(|| fallback(to))
    }
}

fn fallback(to: &TypeDescriptor) -> Value {
    if to.accepts_null() {
        Value::Null
    } else {
        to.default_value()
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Int(i) => Some(*i != 0),
        Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn whole_number(number: f64) -> Option<i64> {
    if number.is_finite() && number.fract() == 0.0 && number >= i64::MIN as f64 && number <= i64::MAX as f64 {
        Some(number as i64)
    } else {
        None
    }
}

fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(f) => whole_number(*f),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Char(c) => c.to_digit(10).map(i64::from),
        Value::Enum(e) => Some(e.ordinal),
        Value::Str(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(whole_number))
        }
        _ => None,
    }
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Char(c) => c.to_digit(10).map(f64::from),
        Value::Enum(e) => Some(e.ordinal as f64),
        Value::Str(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn to_char(value: &Value) -> Option<char> {
    match value {
        Value::Char(c) => Some(*c),
        Value::Str(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        }
        Value::Int(i) if (0..=9).contains(i) => char::from_digit(*i as u32, 10),
        _ => None,
    }
}

pub(crate) fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Enum(e) => e.name.clone(),
        other => other.to_string(),
    }
}

fn to_enum(value: &Value, to: &TypeDescriptor) -> Option<Value> {
    let by_name = |name: &str| {
        to.variants
            .iter()
            .find(|(variant, _)| variant == name)
            .or_else(|| {
                to.variants
                    .iter()
                    .find(|(variant, _)| variant.eq_ignore_ascii_case(name))
            })
    };
    let by_ordinal = |ordinal: i64| to.variants.iter().find(|(_, value)| *value == ordinal);

    let variant = match value {
        Value::Enum(e) => by_name(&e.name),
        Value::Str(s) => {
            let trimmed = s.trim();
            by_name(trimmed).or_else(|| trimmed.parse::<i64>().ok().and_then(by_ordinal))
        }
        other => to_i64(other).and_then(by_ordinal),
    }?;

    Some(Value::Enum(EnumValue {
        type_name: to.name.underlying(),
        name: variant.0.clone(),
        ordinal: variant.1,
    }))
}
