use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

use crate::observable::{ObservableMap, ObservableRef, ObservableValue};

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(PlainList),
    Object(PlainObject),
    Map(ObservableMap),
    Observable(ObservableRef),
    Function(Function),
    Native(NativeRef),
}

pub type NativeRef = Rc<dyn NativeObject>;

pub trait NativeObject {
    fn type_name(&self) -> &'static str;

    fn get_key(&self, key: &str) -> Option<Value>;

    fn set_key(&self, _key: &str, _value: Value) -> bool {
        false
    }

    fn has_key(&self, key: &str) -> bool {
        self.get_key(key).is_some()
    }

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Object(PlainObject::from_entries(entries))
    }

    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Self::List(PlainList::new(values.into_iter().collect()))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            Self::List(_)
                | Self::Object(_)
                | Self::Map(_)
                | Self::Observable(_)
                | Self::Function(_)
                | Self::Native(_)
        )
    }

    pub fn is_map_like(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Map(_) | Self::List(_))
    }

    pub fn is_value_like(&self) -> bool {
        matches!(self, Self::Observable(_))
    }

    pub fn is_observable_like(&self) -> bool {
        matches!(self, Self::Map(_) | Self::Observable(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ObservableMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_observable(&self) -> Option<&ObservableRef> {
        match self {
            Self::Observable(observable) => Some(observable),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_native<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Native(native) => native.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Object(_) => "object",
            Self::Map(_) => "map",
            Self::Observable(_) => "observable",
            Self::Function(_) => "function",
            Self::Native(native) => native.type_name(),
        }
    }

    pub fn identity(&self) -> Option<usize> {
        match self {
            Self::List(list) => Some(Rc::as_ptr(&list.0) as *const () as usize),
            Self::Object(object) => Some(Rc::as_ptr(&object.0) as *const () as usize),
            Self::Map(map) => Some(map.id()),
            Self::Observable(observable) => Some(observable.observable_id()),
            Self::Function(function) => Some(Rc::as_ptr(&function.0) as *const () as usize),
            Self::Native(native) => Some(Rc::as_ptr(native) as *const () as usize),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Undefined | Self::Null => JsonValue::Null,
            Self::Bool(value) => JsonValue::Bool(*value),
            Self::Number(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
                JsonValue::from(*value as i64)
            }
            Self::Number(value) => JsonNumber::from_f64(*value)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::String(value) => JsonValue::String(value.clone()),
            Self::List(list) => JsonValue::Array(list.snapshot().iter().map(Self::to_json).collect()),
            Self::Object(object) => JsonValue::Object(
                object
                    .snapshot()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect::<JsonMap<_, _>>(),
            ),
            Self::Map(map) => JsonValue::Object(
                map.snapshot()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect::<JsonMap<_, _>>(),
            ),
            Self::Observable(observable) => observable.peek_value().to_json(),
            Self::Function(function) => JsonValue::String(format!("[function {}]", function.name())),
            Self::Native(native) => JsonValue::String(format!("[{}]", native.type_name())),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(left), Self::Bool(right)) => left == right,
            (Self::Number(left), Self::Number(right)) => left == right,
            (Self::String(left), Self::String(right)) => left == right,
            _ => match (self.identity(), other.identity()) {
                (Some(left), Some(right)) => left == right,
                _ => false,
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{}", value),
            Self::Number(value) => write!(f, "{}", value),
            Self::String(value) => write!(f, "{:?}", value),
            Self::Function(function) => write!(f, "[function {}]", function.name()),
            Self::Native(native) => write!(f, "[{}]", native.type_name()),
            Self::Observable(observable) => write!(f, "[observable {}]", observable.observable_name()),
            Self::List(_) | Self::Object(_) | Self::Map(_) => {
                write!(f, "{}", self.to_json())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<ObservableMap> for Value {
    fn from(value: ObservableMap) -> Self {
        Self::Map(value)
    }
}

impl From<ObservableValue> for Value {
    fn from(value: ObservableValue) -> Self {
        Self::Observable(Rc::new(value))
    }
}

impl From<PlainObject> for Value {
    fn from(value: PlainObject) -> Self {
        Self::Object(value)
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Self::Function(value)
    }
}

#[derive(Clone, Default)]
pub struct PlainObject(Rc<RefCell<BTreeMap<String, Value>>>);

impl PlainObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self(Rc::new(RefCell::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.0.borrow_mut().insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.0.borrow().clone()
    }
}

#[derive(Clone, Default)]
pub struct PlainList(Rc<RefCell<Vec<Value>>>);

impl PlainList {
    pub fn new(values: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(values)))
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn set(&self, index: usize, value: Value) {
        let mut values = self.0.borrow_mut();
        if index >= values.len() {
            values.resize(index + 1, Value::Undefined);
        }
        values[index] = value;
    }

    pub fn replace(&self, values: Vec<Value>) {
        *self.0.borrow_mut() = values;
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }
}

type Callable = dyn Fn(&Value, &[Value]) -> Value;

#[derive(Clone)]
pub struct Function(Rc<FunctionInner>);

struct FunctionInner {
    name: String,
    call: Rc<Callable>,
    bound_this: Option<Value>,
}

impl Function {
    pub fn new(name: impl Into<String>, call: impl Fn(&Value, &[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(FunctionInner {
            name: name.into(),
            call: Rc::new(call),
            bound_this: None,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_bound(&self) -> bool {
        self.0.bound_this.is_some()
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Value {
        let this = self.0.bound_this.as_ref().unwrap_or(this);
        (self.0.call)(this, args)
    }

    pub fn bind(&self, this: Value) -> Self {
        if self.is_bound() {
            return self.clone();
        }
        Self(Rc::new(FunctionInner {
            name: self.0.name.clone(),
            call: Rc::clone(&self.0.call),
            bound_this: Some(this),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_identity_for_containers() {
        let object = PlainObject::new();
        let left = Value::Object(object.clone());
        let right = Value::Object(object);
        assert_eq!(left, right);
        assert_ne!(Value::object([("a", Value::from(1))]), Value::object([("a", Value::from(1))]));
        assert_eq!(Value::from("x"), Value::string("x"));
        assert_ne!(Value::Undefined, Value::Null);
    }

    #[test]
    fn bound_function_keeps_first_this() {
        let who = Function::new("who", |this, _| this.clone());
        let bound = who.bind(Value::from("first")).bind(Value::from("second"));
        assert_eq!(bound.call(&Value::Undefined, &[]), Value::from("first"));
        assert_eq!(who.call(&Value::from(3), &[]), Value::from(3));
    }

    #[test]
    fn to_json_renders_nested_containers() {
        let value = Value::object([
            ("name", Value::from("Justin")),
            ("tags", Value::list([Value::from(1), Value::from(1.5), Value::Null])),
        ]);
        assert_eq!(
            value.to_json(),
            serde_json::json!({"name": "Justin", "tags": [1, 1.5, null]})
        );
    }

    #[test]
    fn plain_list_set_grows() {
        let list = PlainList::new(Vec::new());
        list.set(2, Value::from(true));
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(0), Some(Value::Undefined));
    }
}
