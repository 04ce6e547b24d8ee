use vs_core::{Function, Value};

use super::Scope;
use crate::helpers::HelperRegistry;
use crate::options::ScopeOptions;

const SPECIAL_KEYWORDS: [&str; 7] = [
    "index",
    "key",
    "element",
    "event",
    "viewModel",
    "arguments",
    "helperOptions",
];

impl Scope {
    pub(super) fn namespace_key(&self, key: &str) -> Option<Value> {
        if SPECIAL_KEYWORDS.contains(&key) {
            return Some(self.read_from_special_context(key).value);
        }
        let value = match key {
            "vm" => self.get_view_model().unwrap_or_default(),
            "top" => self.get_top().unwrap_or_default(),
            "root" => {
                log::warn!("`scope.root` is deprecated. Use either `scope.top` or `scope.vm` instead.");
                self.get_root()
            }
            "filename" => self.filename(),
            "lineNumber" => self.line_number(),
            "templateContext" => self.get_template_context().context().clone(),
            "helpers" => HelperRegistry::to_value(),
            "set" | "get" | "peek" | "find" => Value::Function(self.method(key)),
            _ => return None,
        };
        Some(value)
    }

    pub(super) fn set_namespace_key(&self, key: &str, value: Value) -> bool {
        match key {
            "filename" => self.set_filename(value),
            "lineNumber" => self.set_line_number(value),
            _ => return false,
        }
        true
    }

    fn method(&self, name: &str) -> Function {
        let scope = self.clone();
        let method = name.to_string();
        Function::new(name, move |_, args| {
            let Some(key) = args.first().and_then(Value::as_str) else {
                return Value::Undefined;
            };
            match method.as_str() {
                "set" => {
                    scope.set(key, args.get(1).cloned().unwrap_or_default(), &ScopeOptions::default());
                    Value::Undefined
                }
                "peek" => scope.peek(key),
                "find" => scope.find(key),
                _ => scope.get(key),
            }
        })
        .bind(self.to_value())
    }
}
