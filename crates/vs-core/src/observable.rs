use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::queue::{self, Queue};
use crate::recorder::{self, Dependency};
use crate::value::Value;

pub type ChangeHandler = Rc<dyn Fn(&Value, &Value)>;

pub type ObservableRef = Rc<dyn ValueObservable>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    pub fn next() -> Self {
        thread_local! {
            static NEXT: Cell<u64> = const { Cell::new(1) };
        }
        NEXT.with(|next| {
            let id = next.get();
            next.set(id + 1);
            HandlerId(id)
        })
    }
}

pub trait ValueObservable {
    fn get_value(&self) -> Value;

    fn peek_value(&self) -> Value {
        recorder::ignore(|| self.get_value())
    }

    fn set_value(&self, value: Value) -> bool;

    fn on_value(&self, handler: ChangeHandler, queue: Queue) -> HandlerId;

    fn off_value(&self, id: HandlerId);

    fn observable_id(&self) -> usize;

    fn observable_name(&self) -> String {
        format!("observable#{}", self.observable_id())
    }
}

#[derive(Default)]
pub struct Handlers {
    entries: RefCell<Vec<(HandlerId, Queue, ChangeHandler)>>,
}

impl Handlers {
    pub fn add(&self, handler: ChangeHandler, queue: Queue) -> HandlerId {
        let id = HandlerId::next();
        self.entries.borrow_mut().push((id, queue, handler));
        id
    }

    pub fn remove(&self, id: HandlerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn dispatch(&self, new_value: &Value, old_value: &Value) {
        let entries = self.entries.borrow().clone();
        if entries.is_empty() {
            return;
        }
        queue::batch(|| {
            for (_, queue, handler) in entries {
                let new_value = new_value.clone();
                let old_value = old_value.clone();
                queue::enqueue(queue, move || handler(&new_value, &old_value));
            }
        });
    }
}

#[derive(Clone, Default)]
pub struct ObservableMap(Rc<MapInner>);

#[derive(Default)]
struct MapInner {
    entries: RefCell<BTreeMap<String, Value>>,
    handlers: RefCell<HashMap<String, Rc<Handlers>>>,
}

impl ObservableMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let map = Self::new();
        map.0.entries.borrow_mut().extend(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value)),
        );
        map
    }

    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn get(&self, key: &str) -> Value {
        recorder::add(Dependency::key(self, key));
        self.peek(key)
    }

    pub fn peek(&self, key: &str) -> Value {
        self.0
            .entries
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_key(&self, key: &str) -> bool {
        recorder::add(Dependency::key(self, key));
        self.0.entries.borrow().contains_key(key)
    }

    pub fn set(&self, key: &str, value: Value) {
        let old = self
            .0
            .entries
            .borrow_mut()
            .insert(key.to_string(), value.clone());
        let old = old.unwrap_or_default();
        if old != value {
            self.dispatch(key, &value, &old);
        }
    }

    pub fn delete(&self, key: &str) -> Option<Value> {
        let old = self.0.entries.borrow_mut().remove(key);
        if let Some(old) = &old {
            if !old.is_undefined() {
                self.dispatch(key, &Value::Undefined, old);
            }
        }
        old
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.entries.borrow().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.0.entries.borrow().clone()
    }

    pub fn update_deep(&self, source: &Value) {
        let Some(entries) = map_like_entries(source) else {
            return;
        };
        queue::batch(|| {
            for key in self.keys() {
                if !entries.contains_key(&key) {
                    self.delete(&key);
                }
            }
            for (key, value) in entries {
                match (self.peek(&key), &value) {
                    (Value::Map(existing), incoming) if map_like_entries(incoming).is_some() => {
                        existing.update_deep(incoming);
                    }
                    _ => self.set(&key, value),
                }
            }
        });
    }

    pub fn on_key(&self, key: &str, handler: ChangeHandler, queue: Queue) -> HandlerId {
        let handlers = Rc::clone(
            self.0
                .handlers
                .borrow_mut()
                .entry(key.to_string())
                .or_default(),
        );
        handlers.add(handler, queue)
    }

    pub fn off_key(&self, key: &str, id: HandlerId) {
        let mut handlers = self.0.handlers.borrow_mut();
        if let Some(key_handlers) = handlers.get(key) {
            key_handlers.remove(id);
            if key_handlers.is_empty() {
                handlers.remove(key);
            }
        }
    }

    pub fn handler_count(&self, key: &str) -> usize {
        self.0
            .handlers
            .borrow()
            .get(key)
            .map(|handlers| handlers.len())
            .unwrap_or(0)
    }

    pub fn total_handler_count(&self) -> usize {
        self.0
            .handlers
            .borrow()
            .values()
            .map(|handlers| handlers.len())
            .sum()
    }

    fn dispatch(&self, key: &str, new_value: &Value, old_value: &Value) {
        let handlers = self.0.handlers.borrow().get(key).cloned();
        if let Some(handlers) = handlers {
            handlers.dispatch(new_value, old_value);
        }
    }
}

pub(crate) fn map_like_entries(value: &Value) -> Option<BTreeMap<String, Value>> {
    match value {
        Value::Object(object) => Some(object.snapshot()),
        Value::Map(map) => Some(map.snapshot()),
        _ => None,
    }
}

impl fmt::Debug for ObservableMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObservableMap#{}", self.id())
    }
}

#[derive(Clone, Default)]
pub struct ObservableValue(Rc<ValueInner>);

#[derive(Default)]
struct ValueInner {
    value: RefCell<Value>,
    handlers: Handlers,
}

impl ObservableValue {
    pub fn new(value: Value) -> Self {
        Self(Rc::new(ValueInner {
            value: RefCell::new(value),
            handlers: Handlers::default(),
        }))
    }

    pub fn get(&self) -> Value {
        recorder::add(Dependency::Value(Rc::new(self.clone())));
        self.0.value.borrow().clone()
    }

    pub fn set(&self, value: Value) {
        let old = self.0.value.replace(value.clone());
        if old != value {
            self.0.handlers.dispatch(&value, &old);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.0.handlers.len()
    }

    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

impl fmt::Debug for ObservableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.observable_name())
    }
}

impl ValueObservable for ObservableValue {
    fn get_value(&self) -> Value {
        self.get()
    }

    fn set_value(&self, value: Value) -> bool {
        self.set(value);
        true
    }

    fn on_value(&self, handler: ChangeHandler, queue: Queue) -> HandlerId {
        self.0.handlers.add(handler, queue)
    }

    fn off_value(&self, id: HandlerId) {
        self.0.handlers.remove(id);
    }

    fn observable_id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    fn observable_name(&self) -> String {
        format!("ObservableValue#{}", self.observable_id())
    }
}
