use vs_core::{Function, ObservableMap, Value};

thread_local! {
    static GLOBAL_HELPERS: ObservableMap = ObservableMap::new();
}

pub struct HelperRegistry;

impl HelperRegistry {
    pub fn register(name: &str, helper: Function) {
        GLOBAL_HELPERS.with(|helpers| helpers.set(name, Value::Function(helper)));
    }

    pub fn register_value(name: &str, value: Value) {
        GLOBAL_HELPERS.with(|helpers| helpers.set(name, value));
    }

    pub fn unregister(name: &str) -> Option<Value> {
        GLOBAL_HELPERS.with(|helpers| helpers.delete(name))
    }

    pub fn lookup(name: &str) -> Option<Value> {
        GLOBAL_HELPERS.with(|helpers| {
            let value = helpers.peek(name);
            (!value.is_undefined()).then_some(value)
        })
    }

    pub fn map() -> ObservableMap {
        GLOBAL_HELPERS.with(ObservableMap::clone)
    }

    pub fn to_value() -> Value {
        Value::Map(Self::map())
    }
}
