use crate::error::ScopeError;
use crate::recorder;
use crate::value::Value;

/// One segment of a key path. `at` marks a segment reached through `@`,
/// whose value is returned as-is instead of being called or unwrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRead {
    pub key: String,
    pub at: bool,
}

impl KeyRead {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            at: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// The value is about to be passed somewhere, so a function found at
    /// the end of the path is returned instead of called.
    pub is_argument: bool,
    pub proxy_methods: bool,
    pub read_compute: bool,
    pub args: Vec<Value>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            is_argument: false,
            proxy_methods: true,
            read_compute: true,
            args: Vec::new(),
        }
    }
}

impl ReadOptions {
    pub fn argument() -> Self {
        Self {
            is_argument: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyReadResult {
    pub value: Value,
    pub parent: Value,
    pub parent_has_key: bool,
    pub found_last_parent: bool,
    pub found_observable: Option<(Value, usize)>,
    /// Set when an intermediate segment came back nullish: the object it was
    /// read from and its index.
    pub early_exit: Option<(Value, usize)>,
}

/// Splits a key on unescaped `.` and `@`. A leading `@` applies to the
/// first segment and `\.` keeps a literal dot.
pub fn reads(key: &str) -> Vec<KeyRead> {
    let mut result = Vec::new();
    let mut chars = key.chars().peekable();
    let mut at = false;
    if chars.peek() == Some(&'@') {
        chars.next();
        at = true;
    }
    let mut current = String::new();
    let mut previous = None;
    for character in chars {
        if character == '.' || character == '@' {
            if previous == Some('\\') {
                current.pop();
                current.push('.');
            } else {
                result.push(KeyRead {
                    key: std::mem::take(&mut current),
                    at,
                });
                at = character == '@';
            }
        } else {
            current.push(character);
        }
        previous = Some(character);
    }
    result.push(KeyRead { key: current, at });
    result
}

pub fn read(parent: &Value, reads: &[KeyRead], options: &ReadOptions) -> KeyReadResult {
    let trap = recorder::trap();
    let mut found = None;
    let mut current = read_value(parent.clone(), 0, reads, options, &Value::Undefined, &trap, &mut found);

    let mut result = KeyReadResult::default();
    let mut previous = Value::Undefined;
    for (index, segment) in reads.iter().enumerate() {
        previous = current;
        current = get_property(&previous, &segment.key);
        if found.is_none() && trap.count() > 0 {
            found = Some((previous.clone(), index));
        }
        current = read_value(current, index + 1, reads, options, &previous, &trap, &mut found);
        if index + 1 < reads.len() && current.is_nullish() {
            result.early_exit = Some((previous.clone(), index));
            result.parent = previous;
            result.found_observable = found;
            recorder::add_many(trap.finish());
            return result;
        }
    }

    if let Some(last) = reads.last() {
        result.parent_has_key = has_key(&previous, &last.key);
        result.found_last_parent = true;
    }
    result.value = current;
    result.parent = previous;
    result.found_observable = found;
    recorder::add_many(trap.finish());
    result
}

fn is_at(index: usize, reads: &[KeyRead]) -> bool {
    index > 0 && reads.get(index - 1).map(|read| read.at).unwrap_or(false)
}

fn read_value(
    mut value: Value,
    index: usize,
    reads: &[KeyRead],
    options: &ReadOptions,
    parent: &Value,
    trap: &recorder::Trap,
    found: &mut Option<(Value, usize)>,
) -> Value {
    let at_end = index == reads.len();
    loop {
        match &value {
            Value::Observable(observable) => {
                if is_at(index, reads) || (at_end && !options.read_compute) {
                    return value;
                }
                let unwrapped = observable.get_value();
                if found.is_none() && trap.count() > 0 {
                    *found = Some((value.clone(), index));
                }
                value = unwrapped;
            }
            Value::Function(function) if index > 0 => {
                if is_at(index, reads) {
                    return if at_end && options.proxy_methods {
                        Value::Function(function.bind(parent.clone()))
                    } else {
                        value
                    };
                }
                if at_end && options.is_argument {
                    return if options.proxy_methods {
                        Value::Function(function.bind(parent.clone()))
                    } else {
                        value
                    };
                }
                value = function.call(parent, &options.args);
            }
            _ => return value,
        }
    }
}

fn get_property(object: &Value, key: &str) -> Value {
    match object {
        Value::Map(map) => map.get(key),
        Value::Object(object) => object.get(key).unwrap_or_default(),
        Value::List(list) => {
            if key == "length" {
                Value::from(list.len() as f64)
            } else {
                key.parse::<usize>()
                    .ok()
                    .and_then(|index| list.get(index))
                    .unwrap_or_default()
            }
        }
        Value::String(value) if key == "length" => Value::from(value.chars().count() as f64),
        Value::Native(native) => native.get_key(key).unwrap_or_default(),
        Value::Observable(observable) if key == "value" => observable.get_value(),
        Value::Function(function) if key == "name" => Value::from(function.name()),
        _ => Value::Undefined,
    }
}

pub fn has_key(object: &Value, key: &str) -> bool {
    match object {
        Value::Map(map) => recorder::ignore(|| map.has_key(key)),
        Value::Object(object) => object.has_key(key),
        Value::List(list) => {
            key == "length"
                || key
                    .parse::<usize>()
                    .map(|index| index < list.len())
                    .unwrap_or(false)
        }
        Value::String(_) => key == "length",
        Value::Native(native) => native.has_key(key),
        Value::Observable(_) => key == "value",
        _ => false,
    }
}

pub fn write(
    parent: &Value,
    reads: &[KeyRead],
    value: Value,
    options: &ReadOptions,
) -> Result<(), ScopeError> {
    let Some((last, path)) = reads.split_last() else {
        return match parent {
            Value::Observable(observable) if observable.set_value(value.clone()) => Ok(()),
            _ => Err(ScopeError::NotSettable {
                key: String::new(),
                target: parent.type_name().to_string(),
            }),
        };
    };
    let target = if path.is_empty() {
        parent.clone()
    } else {
        read(parent, path, options).value
    };
    write_key(&target, &last.key, value)
}

pub fn write_key(target: &Value, key: &str, value: Value) -> Result<(), ScopeError> {
    let existing = recorder::ignore(|| peek_property(target, key));
    if let Value::Observable(observable) = &existing {
        return if observable.set_value(value) {
            Ok(())
        } else {
            Err(ScopeError::NotSettable {
                key: key.to_string(),
                target: observable.observable_name(),
            })
        };
    }

    let target = match target {
        Value::Observable(observable) => observable.peek_value(),
        other => other.clone(),
    };
    match &target {
        Value::Map(map) => {
            map.set(key, value);
            Ok(())
        }
        Value::Object(object) => {
            match (&existing, &value) {
                _ if existing == value => {}
                (Value::Map(existing), Value::Object(_)) => existing.update_deep(&value),
                (Value::Object(existing), Value::Object(incoming)) => {
                    for stale in existing.keys() {
                        existing.remove(&stale);
                    }
                    for (name, entry) in incoming.snapshot() {
                        existing.insert(name, entry);
                    }
                }
                _ => object.insert(key, value),
            }
            Ok(())
        }
        Value::List(list) => match key.parse::<usize>() {
            Ok(index) => {
                list.set(index, value);
                Ok(())
            }
            Err(_) => Err(ScopeError::WriteFailed {
                key: key.to_string(),
                target: "list".to_string(),
            }),
        },
        Value::Native(native) => {
            if native.set_key(key, value) {
                Ok(())
            } else {
                Err(ScopeError::NotSettable {
                    key: key.to_string(),
                    target: native.type_name().to_string(),
                })
            }
        }
        other => Err(ScopeError::WriteFailed {
            key: key.to_string(),
            target: other.type_name().to_string(),
        }),
    }
}

fn peek_property(object: &Value, key: &str) -> Value {
    match object {
        Value::Map(map) => map.peek(key),
        Value::Observable(observable) => match observable.peek_value() {
            Value::Observable(_) => Value::Undefined,
            inner => peek_property(&inner, key),
        },
        other => get_property(other, key),
    }
}
