//! Runtime values.
//!
//! Simple values are held inline. Objects and lists are shared references so
//! one instance can appear at several places in a graph; equality on them is
//! reference identity.

use super::TypeName;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A named enum member together with its ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub type_name: TypeName,
    pub name: String,
    pub ordinal: i64,
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    Enum(EnumValue),
    Object(ObjectRef),
    List(ListRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Type name carried by object and list values.
    pub fn runtime_type(&self) -> Option<TypeName> {
        match self {
            Value::Object(object) => Some(object.type_name()),
            Value::List(list) => Some(list.type_name()),
            Value::Enum(e) => Some(e.type_name.clone()),
            _ => None,
        }
    }

    /// Short description of the value's kind, used in error messages.
    pub fn kind_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Char(_) => "char".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::Enum(e) => e.type_name.to_string(),
            Value::Object(o) => o.type_name().to_string(),
            Value::List(l) => l.type_name().to_string(),
        }
    }

    /// Reference identity for objects and lists, structural equality otherwise.
    pub fn same_as(&self, other: &Value) -> bool {
        self == other
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.same_instance(b),
            (Value::List(a), Value::List(b)) => a.same_instance(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::Char(c) => write!(f, "{}", c),
            Value::Str(s) => write!(f, "{}", s),
            Value::Enum(e) => write!(f, "{}", e.name),
            Value::Object(o) => write!(f, "<{}>", o.type_name()),
            Value::List(l) => write!(f, "<{}; {} items>", l.type_name(), l.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl From<ListRef> for Value {
    fn from(list: ListRef) -> Self {
        Value::List(list)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Field storage behind an [`ObjectRef`].
#[derive(Debug)]
pub struct ObjectData {
    type_name: TypeName,
    fields: HashMap<String, Value>,
}

/// Shared, mutable object instance.
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<ObjectData>>);

impl ObjectRef {
    pub fn new(type_name: impl Into<TypeName>) -> Self {
        Self(Arc::new(RwLock::new(ObjectData {
            type_name: type_name.into(),
            fields: HashMap::new(),
        })))
    }

    pub fn with_fields<K, V>(type_name: impl Into<TypeName>, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let object = Self::new(type_name);
        {
            let mut data = object.write();
            for (name, value) in fields {
                data.fields.insert(name.into(), value.into());
            }
        }
        object
    }

    fn read(&self) -> RwLockReadGuard<'_, ObjectData> {
        self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ObjectData> {
        self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn type_name(&self) -> TypeName {
        self.read().type_name.clone()
    }

    /// Reads a field; absent fields read as null.
    pub fn get(&self, name: &str) -> Value {
        self.read().fields.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Reads a field by exact name, falling back to a case-insensitive match.
    pub fn get_ignore_case(&self, name: &str) -> Option<Value> {
        let data = self.read();
        if let Some(value) = data.fields.get(name) {
            return Some(value.clone());
        }
        let mut names: Vec<&String> = data
            .fields
            .keys()
            .filter(|key| key.eq_ignore_ascii_case(name))
            .collect();
        names.sort();
        names.first().and_then(|key| data.fields.get(*key)).cloned()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.read().fields.contains_key(name)
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.write().fields.insert(name.into(), value.into());
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().fields.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn same_instance(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address-based identity, stable while the instance is alive.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Field values are not printed: graphs may be cyclic.
        write!(f, "ObjectRef({}@{:#x})", self.type_name(), self.identity())
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_instance(other)
    }
}

/// Item storage behind a [`ListRef`].
#[derive(Debug)]
pub struct ListData {
    type_name: TypeName,
    items: Vec<Value>,
}

/// Shared, mutable list instance.
#[derive(Clone)]
pub struct ListRef(Arc<RwLock<ListData>>);

impl ListRef {
    pub fn new(type_name: impl Into<TypeName>, items: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(ListData {
            type_name: type_name.into(),
            items,
        })))
    }

    fn read(&self) -> RwLockReadGuard<'_, ListData> {
        self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ListData> {
        self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn type_name(&self) -> TypeName {
        self.read().type_name.clone()
    }

    /// Snapshot of the current items.
    pub fn items(&self) -> Vec<Value> {
        self.read().items.clone()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.read().items.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.write().items.push(value.into());
    }

    /// Replaces the contents while keeping this list instance.
    pub fn replace_items(&self, items: Vec<Value>) {
        self.write().items = items;
    }

    pub fn same_instance(&self, other: &ListRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListRef({}; {} items)", self.type_name(), self.len())
    }
}

impl PartialEq for ListRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_instance(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objects_compare_by_reference() {
        let a = ObjectRef::with_fields("Person", [("Name", "Ann")]);
        let b = ObjectRef::with_fields("Person", [("Name", "Ann")]);

        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn test_absent_fields_read_as_null() {
        let person = ObjectRef::new("Person");
        assert!(person.get("Name").is_null());
        assert!(!person.has_field("Name"));
    }

    #[test]
    fn test_case_insensitive_lookup_prefers_exact_name() {
        let row = ObjectRef::with_fields("Row", [("name", "lower"), ("Name", "exact")]);
        assert_eq!(row.get_ignore_case("Name"), Some(Value::from("exact")));
        assert_eq!(row.get_ignore_case("NAME"), Some(Value::from("exact")));
    }

    #[test]
    fn test_replacing_items_keeps_list_instance() {
        let list = ListRef::new("List<int>", vec![Value::Int(1)]);
        let alias = list.clone();
        list.replace_items(vec![Value::Int(2), Value::Int(3)]);

        assert!(alias.same_instance(&list));
        assert_eq!(alias.items(), vec![Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_self_referencing_object_debug_does_not_recurse() {
        let node = ObjectRef::new("Node");
        node.set("Next", node.clone());
        assert!(format!("{:?}", Value::Object(node)).contains("ObjectRef(Node@"));
    }
}
