use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use vs_core::{NativeObject, ObservableMap, PlainObject, Value};

#[derive(Default)]
pub struct TemplateContext {
    pub vars: ObservableMap,
    pub non_observable_vars: PlainObject,
    pub helpers: ObservableMap,
    pub partials: ObservableMap,
    pub tags: ObservableMap,
    filename: RefCell<Value>,
    line_number: RefCell<Value>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_value(self) -> Value {
        Value::Native(Rc::new(self))
    }

    pub fn from_value(value: &Value) -> Option<Rc<TemplateContext>> {
        match value {
            Value::Native(native) if native.as_any().is::<TemplateContext>() => {
                Rc::clone(native).into_any().downcast::<TemplateContext>().ok()
            }
            _ => None,
        }
    }

    pub fn filename(&self) -> Value {
        self.filename.borrow().clone()
    }

    pub fn set_filename(&self, filename: Value) {
        *self.filename.borrow_mut() = filename;
    }

    pub fn line_number(&self) -> Value {
        self.line_number.borrow().clone()
    }

    pub fn set_line_number(&self, line_number: Value) {
        *self.line_number.borrow_mut() = line_number;
    }
}

impl NativeObject for TemplateContext {
    fn type_name(&self) -> &'static str {
        "TemplateContext"
    }

    fn get_key(&self, key: &str) -> Option<Value> {
        match key {
            "vars" => Some(Value::Map(self.vars.clone())),
            "nonObservableVars" => Some(Value::Object(self.non_observable_vars.clone())),
            "helpers" => Some(Value::Map(self.helpers.clone())),
            "partials" => Some(Value::Map(self.partials.clone())),
            "tags" => Some(Value::Map(self.tags.clone())),
            "filename" => Some(self.filename()),
            "lineNumber" => Some(self.line_number()),
            _ => None,
        }
    }

    fn set_key(&self, key: &str, value: Value) -> bool {
        match key {
            "filename" => self.set_filename(value),
            "lineNumber" => self.set_line_number(value),
            _ => return false,
        }
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

#[cfg(test)]
mod template_context_tests {
    use super::*;

    #[test]
    fn round_trips_through_value() {
        let context = TemplateContext::new();
        context.vars.set("count", Value::from(1));
        let value = context.into_value();

        let restored = TemplateContext::from_value(&value).expect("template context should downcast");
        assert_eq!(restored.vars.peek("count"), Value::from(1));
        assert!(TemplateContext::from_value(&Value::Null).is_none());
    }

    #[test]
    fn only_location_keys_are_writable() {
        let context = TemplateContext::new();
        assert!(context.set_key("filename", Value::from("view.stache")));
        assert!(!context.set_key("vars", Value::Null));
        assert_eq!(context.get_key("filename"), Some(Value::from("view.stache")));
    }
}
