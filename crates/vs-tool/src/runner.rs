use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use vs_core::{ChangeHandler, HandlerId, Queue, Value, ValueObservable};
use vs_runtime::{HelperRegistry, KeyDataState, Scope, ScopeKeyData, ScopeMeta, ScopeOptions};

use crate::encoding::{decode_value, encode_value};
use crate::source::read_test_case;
use crate::{ExpectedEvent, TestCase, TestStep, VsToolError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub observed_events: Vec<ExpectedEvent>,
    pub steps: usize,
}

pub fn build_scope(case: &TestCase) -> Result<Scope, VsToolError> {
    let mut frames = case.chain.iter();
    let first = frames.next().ok_or(VsToolError::EmptyChain)?;
    let mut scope = Scope::new(decode_value(&first.context), None, frame_meta(first));
    if first.template_context {
        scope.get_template_context();
    }
    for frame in frames {
        if frame.template_context {
            scope = scope.add_template_context();
        }
        scope = scope.add_with(decode_value(&frame.context), frame_meta(frame));
    }
    Ok(scope)
}

fn frame_meta(frame: &crate::FrameSpec) -> ScopeMeta {
    ScopeMeta {
        special: frame.special,
        not_context: frame.not_context,
        view_model: frame.view_model,
        variable: frame.variable,
    }
}

fn state_name(state: KeyDataState) -> &'static str {
    match state {
        KeyDataState::Unresolved => "unresolved",
        KeyDataState::Slow => "slow",
        KeyDataState::Fast => "fast",
    }
}

struct HelperGuard(Vec<String>);

impl HelperGuard {
    fn register(helpers: &BTreeMap<String, serde_json::Value>) -> Self {
        for (name, value) in helpers {
            HelperRegistry::register_value(name, decode_value(value));
        }
        Self(helpers.keys().cloned().collect())
    }
}

impl Drop for HelperGuard {
    fn drop(&mut self) {
        for name in &self.0 {
            HelperRegistry::unregister(name);
        }
    }
}

pub fn run_case(case: &TestCase) -> Result<RunReport, VsToolError> {
    let _helpers = HelperGuard::register(&case.helpers);
    let scope = build_scope(case)?;
    let events: Rc<RefCell<Vec<ExpectedEvent>>> = Rc::new(RefCell::new(Vec::new()));
    let mut bindings: BTreeMap<String, (ScopeKeyData, HandlerId)> = BTreeMap::new();

    for (step_index, step) in case.steps.iter().enumerate() {
        log::debug!("step {} {}", step_index, step.kind_name());
        match step {
            TestStep::Get { key, whole_chain } => {
                let value = if *whole_chain {
                    scope.find(key)
                } else {
                    scope.get(key)
                };
                events.borrow_mut().push(ExpectedEvent::Value {
                    key: key.clone(),
                    value: encode_value(&value),
                });
            }
            TestStep::Set { key, value } => {
                let event = match scope.try_set(key, decode_value(value), &ScopeOptions::default()) {
                    Ok(outcome) => ExpectedEvent::Set {
                        key: key.clone(),
                        how: outcome.how.to_string(),
                        warning: outcome.warning,
                    },
                    Err(error) => ExpectedEvent::Error {
                        key: key.clone(),
                        code: error.code().to_string(),
                    },
                };
                events.borrow_mut().push(event);
            }
            TestStep::Bind { key } => {
                if bindings.contains_key(key) {
                    return Err(VsToolError::AlreadyBound {
                        step_index,
                        key: key.clone(),
                    });
                }
                let data = scope.compute_data(key, ScopeOptions::default());
                let sink = Rc::clone(&events);
                let name = key.clone();
                let handler: ChangeHandler = Rc::new(move |new_value: &Value, _: &Value| {
                    sink.borrow_mut().push(ExpectedEvent::Change {
                        key: name.clone(),
                        value: encode_value(new_value),
                    });
                });
                let id = data.on_value(handler, Queue::Mutate);
                bindings.insert(key.clone(), (data, id));
            }
            TestStep::Unbind { key } => {
                let (data, id) = bindings.remove(key).ok_or_else(|| VsToolError::NotBound {
                    step_index,
                    key: key.clone(),
                })?;
                data.off_value(id);
            }
            TestStep::State { key } => {
                let state = match bindings.get(key) {
                    Some((data, _)) => data.state(),
                    None => scope.compute_data(key, ScopeOptions::default()).state(),
                };
                events.borrow_mut().push(ExpectedEvent::State {
                    key: key.clone(),
                    state: state_name(state).to_string(),
                });
            }
        }
    }

    for (data, id) in bindings.into_values() {
        data.off_value(id);
    }
    let observed_events = events.borrow().clone();
    Ok(RunReport {
        observed_events,
        steps: case.steps.len(),
    })
}

pub fn assert_case(case_path: &Path) -> Result<(), VsToolError> {
    let case = read_test_case(case_path)?;
    let report = run_case(&case)?;

    if report.observed_events.len() != case.expected_events.len() {
        let observed = serde_json::to_string_pretty(&report.observed_events)
            .map_err(VsToolError::EventSerialize)?;
        return Err(VsToolError::EventCountMismatch {
            expected: case.expected_events.len(),
            actual: report.observed_events.len(),
            observed,
        });
    }

    for (index, (expected, actual)) in case
        .expected_events
        .iter()
        .zip(report.observed_events.iter())
        .enumerate()
    {
        if expected != actual {
            let expected = serde_json::to_string(expected).map_err(VsToolError::EventSerialize)?;
            let actual = serde_json::to_string(actual).map_err(VsToolError::EventSerialize)?;
            return Err(VsToolError::EventMismatch {
                index,
                expected,
                actual,
            });
        }
    }

    Ok(())
}
