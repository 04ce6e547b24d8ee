use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use vs_core::key::{self, KeyRead};
use vs_core::observation::temporarily_bind;
use vs_core::{
    recorder, ChangeHandler, Dependency, HandlerId, Handlers, ObservableMap, ObservableRef,
    Observation, Queue, ScopeError, Value, ValueObservable,
};

use crate::options::ScopeOptions;
use crate::scope::{Scope, WeakScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDataState {
    Unresolved,
    Slow,
    Fast,
}

#[derive(Default)]
struct Resolution {
    scope: WeakScope,
    root: Option<Value>,
    reads: Vec<KeyRead>,
    set_root: Option<Value>,
    this_arg: Option<Value>,
    parent_has_key: bool,
}

/// The state lives in the starting node's cache and only points back at the
/// node weakly; a handle keeps the node alive.
#[derive(Clone)]
pub struct ScopeKeyData {
    scope: Scope,
    inner: Rc<KeyDataInner>,
}

pub(crate) struct KeyDataInner {
    this: Weak<KeyDataInner>,
    starting_scope: WeakScope,
    key: String,
    options: ScopeOptions,
    observation: Observation,
    state: Cell<KeyDataState>,
    bound: Cell<bool>,
    value: RefCell<Value>,
    handlers: Handlers,
    observation_handler: Cell<Option<HandlerId>>,
    resolution: RefCell<Resolution>,
}

impl ScopeKeyData {
    pub fn new(scope: Scope, key: &str, options: ScopeOptions) -> Self {
        let name = key.to_string();
        let starting_scope = scope.downgrade();
        let inner = Rc::new_cyclic(|this: &Weak<KeyDataInner>| {
            let reader = this.clone();
            let observation = Observation::new(format!("ScopeKeyData{{{{{}}}}}.read", name), move || {
                ScopeKeyData::upgrade(&reader)
                    .map(|data| data.read())
                    .unwrap_or_default()
            });
            KeyDataInner {
                this: this.clone(),
                starting_scope,
                key: name,
                options,
                observation,
                state: Cell::new(KeyDataState::Unresolved),
                bound: Cell::new(false),
                value: RefCell::new(Value::Undefined),
                handlers: Handlers::default(),
                observation_handler: Cell::new(None),
                resolution: RefCell::new(Resolution::default()),
            }
        });
        Self { scope, inner }
    }

    pub(crate) fn from_inner(scope: Scope, inner: Rc<KeyDataInner>) -> Self {
        Self { scope, inner }
    }

    pub(crate) fn inner(&self) -> &Rc<KeyDataInner> {
        &self.inner
    }

    fn upgrade(inner: &Weak<KeyDataInner>) -> Option<Self> {
        let inner = inner.upgrade()?;
        let scope = inner.starting_scope.upgrade()?;
        Some(Self { scope, inner })
    }

    pub fn ptr_eq(&self, other: &ScopeKeyData) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn starting_scope(&self) -> &Scope {
        &self.scope
    }

    pub fn observation(&self) -> &Observation {
        &self.inner.observation
    }

    pub fn state(&self) -> KeyDataState {
        self.inner.state.get()
    }

    pub fn is_fast_path(&self) -> bool {
        self.state() == KeyDataState::Fast
    }

    pub fn is_bound(&self) -> bool {
        self.inner.bound.get()
    }

    pub fn handler_count(&self) -> usize {
        self.inner.handlers.len()
    }

    pub fn scope(&self) -> Option<Scope> {
        self.inner.resolution.borrow().scope.upgrade()
    }

    pub fn root(&self) -> Option<Value> {
        self.inner.resolution.borrow().root.clone()
    }

    pub fn reads(&self) -> Vec<KeyRead> {
        self.inner.resolution.borrow().reads.clone()
    }

    pub fn set_root(&self) -> Option<Value> {
        self.inner.resolution.borrow().set_root.clone()
    }

    pub fn this_arg(&self) -> Option<Value> {
        self.inner.resolution.borrow().this_arg.clone()
    }

    pub fn parent_has_key(&self) -> bool {
        self.inner.resolution.borrow().parent_has_key
    }

    pub fn to_ref(&self) -> ObservableRef {
        Rc::new(self.clone())
    }

    pub fn to_value(&self) -> Value {
        Value::Observable(self.to_ref())
    }

    fn read(&self) -> Value {
        let known = {
            let resolution = self.inner.resolution.borrow();
            resolution
                .root
                .clone()
                .map(|root| (root, resolution.reads.clone()))
        };
        if let Some((root, reads)) = known {
            let data = key::read(&root, &reads, &self.inner.options.read);
            self.inner.resolution.borrow_mut().this_arg = Some(data.parent);
            return data.value;
        }

        let data = self.scope.read(&self.inner.key, &self.inner.options);
        *self.inner.resolution.borrow_mut() = Resolution {
            scope: data.scope.as_ref().map(Scope::downgrade).unwrap_or_default(),
            root: data.root_observe,
            reads: data.reads,
            set_root: data.set_root,
            this_arg: data.this_arg,
            parent_has_key: data.parent_has_key,
        };
        if self.state() == KeyDataState::Unresolved {
            self.inner.state.set(KeyDataState::Slow);
        }
        data.value
    }

    pub fn get(&self) -> Value {
        if recorder::is_recording() {
            recorder::add(Dependency::Value(self.to_ref()));
            if !self.is_bound() {
                temporarily_bind(self.to_ref());
            }
        }
        if self.is_bound() {
            self.inner.value.borrow().clone()
        } else {
            self.inner.observation.get()
        }
    }

    pub fn try_set(&self, value: Value) -> Result<(), ScopeError> {
        let target = {
            let resolution = self.inner.resolution.borrow();
            resolution
                .root
                .clone()
                .or_else(|| resolution.set_root.clone())
                .map(|root| (root, resolution.reads.clone()))
        };
        match target {
            Some((root, reads)) => key::write(&root, &reads, value, &self.inner.options.read),
            None => self
                .scope
                .try_set(&self.inner.key, value, &self.inner.options)
                .map(|_| ()),
        }
    }

    pub fn set(&self, value: Value) {
        if let Err(error) = self.try_set(value) {
            log::error!("{}", error);
        }
    }

    fn dispatch(&self, new_value: Value) {
        let old_value = self.inner.value.replace(new_value.clone());
        self.inner.handlers.dispatch(&new_value, &old_value);
    }

    fn on_bound(&self) {
        self.inner.bound.set(true);
        let weak = self.inner.this.clone();
        let handler: ChangeHandler = Rc::new(move |new_value: &Value, _: &Value| {
            if let Some(data) = ScopeKeyData::upgrade(&weak) {
                data.dispatch(new_value.clone());
            }
        });
        let id = self.inner.observation.on_value(handler, Queue::Notify);
        self.inner.observation_handler.set(Some(id));
        if let Some(root) = self.fast_path_root() {
            self.to_fast_path(root);
        }
        let value = self.inner.observation.peek_value();
        *self.inner.value.borrow_mut() = value;
    }

    fn on_unbound(&self) {
        self.inner.bound.set(false);
        if let Some(id) = self.inner.observation_handler.take() {
            self.inner.observation.off_value(id);
        }
        self.to_slow_path();
    }

    fn fast_path_root(&self) -> Option<ObservableMap> {
        recorder::ignore(|| {
            let resolution = self.inner.resolution.borrow();
            let [read] = resolution.reads.as_slice() else {
                return None;
            };
            let root = match resolution.root.as_ref()? {
                Value::Observable(observable) => observable.peek_value(),
                other => other.clone(),
            };
            match root {
                Value::Map(map) if !map.peek(&read.key).is_function() => Some(map),
                _ => None,
            }
        })
    }

    fn to_fast_path(&self, root: ObservableMap) {
        log::debug!("{} switching to the fast path", self.inner.key);
        self.inner.state.set(KeyDataState::Fast);
        let root_id = root.id();
        let weak = self.inner.this.clone();
        self.inner
            .observation
            .set_interceptor(Some(Rc::new(move |dependency: &Dependency, new_value: &Value| {
                if dependency.source_id() == root_id && !new_value.is_function() {
                    return true;
                }
                if let Some(data) = ScopeKeyData::upgrade(&weak) {
                    data.to_slow_path();
                }
                false
            })));
    }

    pub fn to_slow_path(&self) {
        self.inner.observation.set_interceptor(None);
        if self.state() == KeyDataState::Fast {
            log::debug!("{} reverting to the slow path", self.inner.key);
            self.inner.state.set(KeyDataState::Slow);
        }
    }
}

impl ValueObservable for ScopeKeyData {
    fn get_value(&self) -> Value {
        self.get()
    }

    fn set_value(&self, value: Value) -> bool {
        match self.try_set(value) {
            Ok(()) => true,
            Err(error) => {
                log::error!("{}", error);
                false
            }
        }
    }

    fn on_value(&self, handler: ChangeHandler, queue: Queue) -> HandlerId {
        let id = self.inner.handlers.add(handler, queue);
        if !self.is_bound() {
            self.on_bound();
        }
        id
    }

    fn off_value(&self, id: HandlerId) {
        self.inner.handlers.remove(id);
        if self.inner.handlers.is_empty() && self.is_bound() {
            self.on_unbound();
        }
    }

    fn observable_id(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    fn observable_name(&self) -> String {
        format!("ScopeKeyData{{{{{}}}}}", self.inner.key)
    }
}
