use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::observable::{ChangeHandler, HandlerId, Handlers, ObservableRef, ValueObservable};
use crate::queue::{self, Queue};
use crate::recorder::{self, Dependency};
use crate::value::Value;

/// Consulted on every dependency change while installed. Returning `true`
/// means the notified value is the observation's next value and no
/// re-derivation is needed.
pub type Interceptor = Rc<dyn Fn(&Dependency, &Value) -> bool>;

type Getter = Box<dyn Fn() -> Value>;
type Setter = Box<dyn Fn(Value)>;

#[derive(Clone)]
pub struct Observation(Rc<ObservationInner>);

struct ObservationInner {
    name: String,
    getter: Getter,
    setter: Option<Setter>,
    value: RefCell<Value>,
    bound: Cell<bool>,
    pending: Cell<bool>,
    bindings: RefCell<Vec<(Dependency, HandlerId)>>,
    handlers: Handlers,
    interceptor: RefCell<Option<Interceptor>>,
    intercepted_value: RefCell<Option<Value>>,
}

thread_local! {
    static TEMPORARILY_BOUND: RefCell<Vec<(ObservableRef, HandlerId)>> =
        const { RefCell::new(Vec::new()) };
}

/// Keeps `observable` bound until the outermost derivation finishes, so a
/// value read during a recording stays stable for the rest of it.
pub fn temporarily_bind(observable: ObservableRef) {
    let id = observable.on_value(Rc::new(|_: &Value, _: &Value| {}), Queue::Notify);
    TEMPORARILY_BOUND.with(|bound| bound.borrow_mut().push((observable, id)));
}

pub fn release_temporary_bindings() {
    let released = TEMPORARILY_BOUND.with(|bound| std::mem::take(&mut *bound.borrow_mut()));
    for (observable, id) in released {
        observable.off_value(id);
    }
}

impl Observation {
    pub fn new(name: impl Into<String>, getter: impl Fn() -> Value + 'static) -> Self {
        Self::build(name.into(), Box::new(getter), None)
    }

    pub fn with_setter(
        name: impl Into<String>,
        getter: impl Fn() -> Value + 'static,
        setter: impl Fn(Value) + 'static,
    ) -> Self {
        Self::build(name.into(), Box::new(getter), Some(Box::new(setter)))
    }

    fn build(name: String, getter: Getter, setter: Option<Setter>) -> Self {
        Self(Rc::new(ObservationInner {
            name,
            getter,
            setter,
            value: RefCell::new(Value::Undefined),
            bound: Cell::new(false),
            pending: Cell::new(false),
            bindings: RefCell::new(Vec::new()),
            handlers: Handlers::default(),
            interceptor: RefCell::new(None),
            intercepted_value: RefCell::new(None),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn to_ref(&self) -> ObservableRef {
        Rc::new(self.clone())
    }

    pub fn to_value(&self) -> Value {
        Value::Observable(self.to_ref())
    }

    pub fn is_bound(&self) -> bool {
        self.0.bound.get()
    }

    pub fn handler_count(&self) -> usize {
        self.0.handlers.len()
    }

    pub fn dependencies(&self) -> Vec<Dependency> {
        self.0
            .bindings
            .borrow()
            .iter()
            .map(|(dependency, _)| dependency.clone())
            .collect()
    }

    pub fn get(&self) -> Value {
        if recorder::is_recording() {
            recorder::add(Dependency::Value(self.to_ref()));
            if !self.is_bound() {
                temporarily_bind(self.to_ref());
            }
        }
        if self.is_bound() {
            if self.0.pending.get() {
                self.update();
            }
            self.0.value.borrow().clone()
        } else {
            (self.0.getter)()
        }
    }

    pub fn set(&self, value: Value) -> bool {
        match &self.0.setter {
            Some(setter) => {
                setter(value);
                true
            }
            None => false,
        }
    }

    pub fn set_interceptor(&self, interceptor: Option<Interceptor>) {
        *self.0.interceptor.borrow_mut() = interceptor;
        if self.0.interceptor.borrow().is_none() {
            self.0.intercepted_value.borrow_mut().take();
        }
    }

    pub fn has_interceptor(&self) -> bool {
        self.0.interceptor.borrow().is_some()
    }

    fn bind(&self) {
        self.0.bound.set(true);
        let value = self.derive();
        *self.0.value.borrow_mut() = value;
    }

    fn unbind(&self) {
        self.0.bound.set(false);
        self.0.pending.set(false);
        self.0.intercepted_value.borrow_mut().take();
        let bindings = std::mem::take(&mut *self.0.bindings.borrow_mut());
        for (dependency, id) in bindings {
            dependency.unsubscribe(id);
        }
    }

    fn derive(&self) -> Value {
        let recording = recorder::start();
        let value = (self.0.getter)();
        let dependencies = recording.stop();
        if self.is_bound() {
            self.rebind(dependencies);
        }
        if recorder::depth() == 0 {
            release_temporary_bindings();
        }
        value
    }

    /// New subscriptions are made before the old ones are dropped.
    fn rebind(&self, dependencies: Vec<Dependency>) {
        let previous = std::mem::take(&mut *self.0.bindings.borrow_mut());
        let mut bindings = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            let weak: Weak<ObservationInner> = Rc::downgrade(&self.0);
            let source = dependency.clone();
            let handler: ChangeHandler = Rc::new(move |new_value: &Value, _: &Value| {
                if let Some(inner) = weak.upgrade() {
                    Observation(inner).dependency_change(&source, new_value);
                }
            });
            let id = dependency.subscribe(handler, Queue::Notify);
            bindings.push((dependency, id));
        }
        *self.0.bindings.borrow_mut() = bindings;
        for (dependency, id) in previous {
            dependency.unsubscribe(id);
        }
    }

    fn dependency_change(&self, dependency: &Dependency, new_value: &Value) {
        if !self.is_bound() {
            return;
        }
        let interceptor = self.0.interceptor.borrow().clone();
        if let Some(interceptor) = interceptor {
            let accepted = interceptor(dependency, new_value);
            *self.0.intercepted_value.borrow_mut() = if accepted && self.has_interceptor() {
                Some(new_value.clone())
            } else {
                None
            };
        }
        if self.0.pending.replace(true) {
            return;
        }
        let weak = Rc::downgrade(&self.0);
        queue::enqueue(Queue::Derive, move || {
            if let Some(inner) = weak.upgrade() {
                Observation(inner).update();
            }
        });
    }

    fn update(&self) {
        if !self.0.pending.replace(false) || !self.is_bound() {
            return;
        }
        let old_value = self.0.value.borrow().clone();
        let intercepted = if self.has_interceptor() {
            self.0.intercepted_value.borrow_mut().take()
        } else {
            None
        };
        let new_value = match intercepted {
            Some(value) => value,
            None => self.derive(),
        };
        *self.0.value.borrow_mut() = new_value.clone();
        if old_value != new_value {
            self.0.handlers.dispatch(&new_value, &old_value);
        }
    }
}

impl ValueObservable for Observation {
    fn get_value(&self) -> Value {
        self.get()
    }

    fn set_value(&self, value: Value) -> bool {
        self.set(value)
    }

    fn on_value(&self, handler: ChangeHandler, queue: Queue) -> HandlerId {
        let id = self.0.handlers.add(handler, queue);
        if !self.is_bound() {
            self.bind();
        }
        id
    }

    fn off_value(&self, id: HandlerId) {
        self.0.handlers.remove(id);
        if self.0.handlers.is_empty() && self.is_bound() {
            self.unbind();
        }
    }

    fn observable_id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    fn observable_name(&self) -> String {
        format!("Observation<{}>", self.0.name)
    }
}
