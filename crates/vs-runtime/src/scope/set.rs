use vs_core::key::{self, KeyRead};
use vs_core::{recorder, ObservableMap, ReadOptions, ScopeError, Value};

use super::Scope;
use crate::keys::KeyInfo;
use crate::options::ScopeOptions;

#[derive(Debug, Clone)]
pub enum SetPlan {
    Delegate { scope: Scope, key: String },
    Write { parent: Value, key: String },
    SetValue { target: Value },
    SetKeyValue { parent: ObservableMap, key: String },
    UpdateDeep {
        parent: Value,
        key: String,
        warning: String,
    },
}

impl SetPlan {
    pub fn how(&self) -> &'static str {
        match self {
            Self::Delegate { .. } => "set",
            Self::Write { .. } => "write",
            Self::SetValue { .. } => "setValue",
            Self::SetKeyValue { .. } => "setKeyValue",
            Self::UpdateDeep { .. } => "updateDeep",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOutcome {
    pub how: &'static str,
    pub warning: Option<String>,
}

impl Scope {
    pub fn plan_set(&self, key: &str, options: &ScopeOptions) -> Result<SetPlan, ScopeError> {
        let info = KeyInfo::classify(key);
        if info.is_legacy_var {
            return self.plan_set(&format!("scope.{}", info.remaining_key), options);
        }

        let owner = self.context_owner();
        if info.is_current_context {
            let owner = owner.ok_or_else(|| no_context(key))?;
            return Ok(SetPlan::SetValue {
                target: owner.context().clone(),
            });
        }
        if info.is_parent_context {
            let target = owner
                .and_then(|owner| owner.context_ancestor(info.parent_hops))
                .ok_or_else(|| no_context(key))?;
            return Ok(SetPlan::SetValue {
                target: target.context().clone(),
            });
        }
        if info.is_in_parent_context && !info.remaining_key.contains('.') {
            let parent = owner
                .and_then(|owner| owner.context_ancestor(1))
                .ok_or_else(|| no_context(key))?;
            let key = if info.parent_hops == 1 {
                format!("./{}", info.remaining_key)
            } else {
                format!("{}{}", "../".repeat(info.parent_hops - 1), info.remaining_key)
            };
            return Ok(SetPlan::Delegate { scope: parent, key });
        }
        if info.is_plain() && is_single_segment(key) {
            if let Some(frame) = self.variable_frame_with(key) {
                return Ok(SetPlan::Write {
                    parent: frame.context().clone(),
                    key: key.to_string(),
                });
            }
        }

        let (context_path, prop) = split_context_path(key);
        let context = self.read(context_path, options).value;
        if context.is_undefined() {
            return Err(ScopeError::undefined_target(key, context_path));
        }

        let existing = raw_property(&context, prop);
        if !context.is_observable_like() && existing.is_observable_like() {
            if existing.is_map_like() {
                return Ok(SetPlan::UpdateDeep {
                    parent: context,
                    key: prop.to_string(),
                    warning: format!(
                        "Merging data into \"{}\" because its parent is non-observable",
                        prop
                    ),
                });
            }
            return Ok(SetPlan::SetValue { target: existing });
        }
        if let Value::Map(map) = &context {
            if !existing.is_value_like() {
                return Ok(SetPlan::SetKeyValue {
                    parent: map.clone(),
                    key: prop.to_string(),
                });
            }
        }
        Ok(SetPlan::Write {
            parent: context,
            key: prop.to_string(),
        })
    }

    pub fn set(&self, key: &str, value: Value, options: &ScopeOptions) {
        if let Err(error) = self.try_set(key, value, options) {
            log::error!("{}", error);
        }
    }

    pub fn try_set(
        &self,
        key: &str,
        value: Value,
        options: &ScopeOptions,
    ) -> Result<SetOutcome, ScopeError> {
        let plan = self.plan_set(key, options)?;
        let how = plan.how();
        let warning = match plan {
            SetPlan::Delegate { scope, key } => return scope.try_set(&key, value, options),
            SetPlan::Write { parent, key } => {
                key::write_key(&parent, &key, value)?;
                None
            }
            SetPlan::SetValue { target } => {
                let written = match &target {
                    Value::Observable(observable) => observable.set_value(value),
                    _ => false,
                };
                if !written {
                    return Err(ScopeError::NotSettable {
                        key: key.to_string(),
                        target: target.type_name().to_string(),
                    });
                }
                None
            }
            SetPlan::SetKeyValue { parent, key } => {
                parent.set(&key, value);
                None
            }
            SetPlan::UpdateDeep {
                parent,
                key,
                warning,
            } => {
                log::warn!("{}", warning);
                match raw_property(&parent, &key) {
                    Value::Map(target) if value.is_map_like() && !matches!(value, Value::List(_)) => {
                        target.update_deep(&value)
                    }
                    _ => key::write_key(&parent, &key, value)?,
                }
                Some(warning)
            }
        };
        Ok(SetOutcome { how, warning })
    }

    fn context_owner(&self) -> Option<Scope> {
        self.get_scope(|scope| !scope.skips_context_paths())
    }

    /// The nearest variable frame that already holds `key`, looking only
    /// below the nearest normal context.
    fn variable_frame_with(&self, key: &str) -> Option<Scope> {
        for scope in self.chain() {
            if scope.meta().variable {
                if key::has_key(scope.context(), key) {
                    return Some(scope);
                }
            } else if !scope.is_special() {
                return None;
            }
        }
        None
    }
}

fn no_context(key: &str) -> ScopeError {
    ScopeError::NoContextAvailable {
        key: key.to_string(),
    }
}

fn is_single_segment(key: &str) -> bool {
    !key.is_empty() && !key.contains(['.', '@', '/'])
}

fn split_context_path(key: &str) -> (&str, &str) {
    let dot = key.rfind('.');
    let slash = key.rfind('/');
    match (slash, dot) {
        (Some(slash), dot) if dot.map_or(true, |dot| slash > dot) => (&key[..slash], &key[slash + 1..]),
        (_, Some(dot)) => (&key[..dot], &key[dot + 1..]),
        _ => (".", key),
    }
}

fn raw_property(context: &Value, prop: &str) -> Value {
    let options = ReadOptions {
        is_argument: true,
        proxy_methods: false,
        read_compute: false,
        ..ReadOptions::default()
    };
    recorder::ignore(|| key::read(context, &[KeyRead::new(prop)], &options).value)
}
