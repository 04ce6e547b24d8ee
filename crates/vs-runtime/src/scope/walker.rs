use vs_core::key::{self, KeyRead};
use vs_core::{recorder, Dependency, ReadOptions, Value};

use super::Scope;
use crate::helpers::HelperRegistry;
use crate::template_context::TemplateContext;

#[derive(Debug, Clone, Default)]
pub struct ScopeRead {
    pub value: Value,
    pub scope: Option<Scope>,
    pub root_observe: Option<Value>,
    pub reads: Vec<KeyRead>,
    pub this_arg: Option<Value>,
    pub parent_has_key: bool,
    pub set_root: Option<Value>,
    pub no_context_available: bool,
}

impl ScopeRead {
    pub(crate) fn found(value: Value, scope: Scope) -> Self {
        Self {
            value,
            scope: Some(scope),
            ..Self::default()
        }
    }

    pub(crate) fn no_context() -> Self {
        Self {
            no_context_available: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    ParentContext { hops: usize },
    Lookup { current_scope_only: bool },
    Special,
}

impl Traversal {
    pub fn should_skip(&self, scope: &Scope) -> bool {
        match self {
            Self::ParentContext { .. } => scope.skips_context_paths(),
            Self::Lookup { .. } => scope.meta().special || scope.is_template_context(),
            Self::Special => !scope.meta().special,
        }
    }

    /// `index` counts the frames not skipped before `scope`; `previous` is
    /// the frame directly below `scope` when it was visited.
    pub fn should_exit(&self, index: usize, scope: &Scope, previous: Option<&Scope>) -> bool {
        match self {
            Self::ParentContext { hops } => index > *hops,
            Self::Lookup { current_scope_only } => {
                *current_scope_only
                    && previous.is_some_and(|previous| !previous.meta().variable)
                    && !scope.is_special()
            }
            Self::Special => false,
        }
    }

    pub fn should_read(&self, index: usize) -> bool {
        match self {
            Self::ParentContext { hops } => index == *hops,
            Self::Lookup { .. } | Self::Special => true,
        }
    }

    pub fn looks_for_helpers(&self) -> bool {
        matches!(self, Self::Lookup { .. })
    }
}

#[derive(Default)]
struct SetTarget {
    depth: Option<usize>,
    root: Option<Value>,
    reads: Vec<KeyRead>,
}

impl Scope {
    pub fn walk(&self, reads: &[KeyRead], options: &ReadOptions, traversal: Traversal) -> ScopeRead {
        let recording = recorder::is_recording();
        let mut undefined_observes: Vec<Dependency> = Vec::new();
        let mut set_target = SetTarget::default();
        let mut visited = 0;
        let mut previous: Option<Scope> = None;
        let mut current = Some(self.clone());

        while let Some(scope) = current {
            current = scope.parent();
            if traversal.should_skip(&scope) {
                previous = None;
                continue;
            }
            let index = visited;
            visited += 1;
            if traversal.should_exit(index, &scope, previous.as_ref()) {
                break;
            }
            previous = Some(scope.clone());
            let context = scope.context();
            if !traversal.should_read(index) || !context.is_object_like() {
                continue;
            }

            log::trace!("reading {:?} from {:?}", reads, scope);
            let trap = recorder::trap();
            let data = key::read(context, reads, options);
            let observes = trap.finish();

            let mut observed: Option<(Value, Vec<KeyRead>)> = None;
            if let Some((root, index)) = &data.found_observable {
                observed = Some((root.clone(), reads[*index..].to_vec()));
            }
            if let Some((parent, index)) = &data.early_exit {
                set_target.consider(&scope, parent, *index, reads, observed.as_ref());
            }

            if !data.value.is_undefined() || data.parent_has_key {
                let (root_observe, root_reads) = if observes.is_empty() && recording {
                    (Some(data.parent.clone()), reads[reads.len().saturating_sub(1)..].to_vec())
                } else {
                    recorder::add_many(observes);
                    match observed {
                        Some((root, root_reads)) => (Some(root), root_reads),
                        None => (None, Vec::new()),
                    }
                };
                let this_arg = if reads.len() > 1 {
                    Some(data.parent.clone())
                } else if matches!(traversal, Traversal::ParentContext { hops } if hops > 0) {
                    Some(context.clone())
                } else {
                    None
                };
                return ScopeRead {
                    value: data.value,
                    scope: Some(scope),
                    root_observe,
                    reads: root_reads,
                    this_arg,
                    parent_has_key: data.parent_has_key,
                    set_root: None,
                    no_context_available: false,
                };
            }
            undefined_observes.extend(observes);
        }

        if let Traversal::ParentContext { hops } = traversal {
            if visited <= hops {
                recorder::add_many(undefined_observes);
                return ScopeRead::no_context();
            }
        }

        if traversal.looks_for_helpers() {
            if let Some(helper) = self.helper_read(reads) {
                return helper;
            }
        }

        recorder::add_many(undefined_observes);
        ScopeRead {
            set_root: set_target.root,
            reads: set_target.reads,
            ..ScopeRead::default()
        }
    }

    fn helper_read(&self, reads: &[KeyRead]) -> Option<ScopeRead> {
        let options = ReadOptions {
            proxy_methods: false,
            ..ReadOptions::default()
        };
        let mut sources: Vec<Value> = self
            .chain()
            .iter()
            .filter_map(|scope| TemplateContext::from_value(scope.context()))
            .map(|context| Value::Map(context.helpers.clone()))
            .collect();
        sources.push(HelperRegistry::to_value());

        sources.into_iter().find_map(|helpers| {
            let data = key::read(&helpers, reads, &options);
            (!data.value.is_undefined()).then(|| ScopeRead {
                value: data.value,
                parent_has_key: data.parent_has_key,
                this_arg: (reads.len() > 1).then_some(data.parent),
                ..ScopeRead::default()
            })
        })
    }
}

impl SetTarget {
    fn consider(
        &mut self,
        scope: &Scope,
        parent: &Value,
        index: usize,
        reads: &[KeyRead],
        observed: Option<&(Value, Vec<KeyRead>)>,
    ) {
        let name = &reads[index].key;
        let update = if scope.meta().variable && index == 0 {
            key::has_key(parent, name)
        } else {
            match self.depth {
                None => true,
                Some(depth) => {
                    index > depth
                        || (index == depth && parent.is_object_like() && key::has_key(parent, name))
                }
            }
        };
        if update {
            let (root, reads) = match observed {
                Some((root, reads)) => (Some(root.clone()), reads.clone()),
                None => (None, Vec::new()),
            };
            self.root = root;
            self.reads = reads;
            self.depth = Some(index);
        }
    }
}
