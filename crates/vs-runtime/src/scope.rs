use std::any::Any;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use vs_core::key::{self, KeyRead};
use vs_core::{recorder, NativeObject, ObservableMap, ReadOptions, Value};

use crate::cache::{self, KeyDataCache};
use crate::key_data::ScopeKeyData;
use crate::keys::KeyInfo;
use crate::options::{ScopeMeta, ScopeOptions};
use crate::template_context::TemplateContext;

mod namespace;
mod set;
mod walker;

#[cfg(test)]
mod tests;

pub use set::{SetOutcome, SetPlan};
pub use walker::{ScopeRead, Traversal};

#[derive(Clone)]
pub struct Scope(Rc<ScopeNode>);

#[derive(Clone, Default)]
pub(crate) struct WeakScope(Weak<ScopeNode>);

impl WeakScope {
    pub(crate) fn upgrade(&self) -> Option<Scope> {
        self.0.upgrade().map(Scope)
    }
}

pub(crate) struct ScopeNode {
    this: Weak<ScopeNode>,
    context: Value,
    parent: Option<Scope>,
    meta: ScopeMeta,
    backfill: OnceCell<Scope>,
    cache: KeyDataCache,
}

impl Scope {
    pub fn new(context: Value, parent: Option<Scope>, meta: ScopeMeta) -> Self {
        Self(Rc::new_cyclic(|this| ScopeNode {
            this: this.clone(),
            context,
            parent,
            meta,
            backfill: OnceCell::new(),
            cache: KeyDataCache::default(),
        }))
    }

    pub fn from_context(context: Value) -> Self {
        Self::new(context, None, ScopeMeta::default())
    }

    pub fn add(&self, context: Value) -> Scope {
        self.add_with(context, ScopeMeta::default())
    }

    /// Pushes a child frame, or returns this node when `context` is the one
    /// it already holds.
    pub fn add_with(&self, context: Value, meta: ScopeMeta) -> Scope {
        if context == self.0.context {
            return self.clone();
        }
        Scope::new(context, Some(self.clone()), meta)
    }

    pub fn add_let_context(&self, values: Value) -> Scope {
        let frame = ObservableMap::new();
        match &values {
            Value::Object(object) => {
                for (name, value) in object.snapshot() {
                    frame.set(&name, value);
                }
            }
            Value::Map(map) => {
                for (name, value) in map.snapshot() {
                    frame.set(&name, value);
                }
            }
            _ => {}
        }
        self.add_with(Value::Map(frame), ScopeMeta::variable())
    }

    pub fn add_template_context(&self) -> Scope {
        self.add(TemplateContext::new().into_value())
    }

    pub fn context(&self) -> &Value {
        &self.0.context
    }

    pub fn meta(&self) -> ScopeMeta {
        self.0.meta
    }

    pub fn parent(&self) -> Option<Scope> {
        self.0
            .parent
            .clone()
            .or_else(|| self.0.backfill.get().cloned())
    }

    pub(crate) fn downgrade(&self) -> WeakScope {
        WeakScope(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub(crate) fn cache(&self) -> &KeyDataCache {
        &self.0.cache
    }

    pub fn to_value(&self) -> Value {
        let native: Rc<dyn NativeObject> = self.0.clone();
        Value::Native(native)
    }

    pub fn from_value(value: &Value) -> Option<Scope> {
        match value {
            Value::Native(native) if native.as_any().is::<ScopeNode>() => Rc::clone(native)
                .into_any()
                .downcast::<ScopeNode>()
                .ok()
                .map(Scope),
            _ => None,
        }
    }

    pub fn is_template_context(&self) -> bool {
        self.0.context.as_native::<TemplateContext>().is_some()
    }

    pub fn is_special(&self) -> bool {
        self.0.meta.not_context || self.0.meta.special || self.is_template_context()
    }

    pub(crate) fn skips_context_paths(&self) -> bool {
        self.is_special() || self.0.meta.variable
    }

    pub fn read(&self, key: &str, options: &ScopeOptions) -> ScopeRead {
        let info = KeyInfo::classify(key);
        if info.is_legacy_var {
            log::warn!(
                "`{}` is deprecated, use `scope.{}` instead",
                key,
                info.remaining_key
            );
        }

        if info.is_context_based() && self.skips_context_paths() {
            return match self.parent() {
                Some(parent) => parent.read(key, options),
                None => ScopeRead::no_context(),
            };
        }
        if self.is_template_context() {
            return self
                .parent()
                .map(|parent| parent.read(key, options))
                .unwrap_or_default();
        }

        if info.is_scope {
            return ScopeRead::found(self.to_value(), self.clone());
        }
        if info.is_in_scope {
            return self.read_from_namespace(&info.remaining_key, &options.read);
        }
        if info.is_current_context {
            let value = key::read(&self.0.context, &[], &options.read).value;
            return ScopeRead::found(value, self.clone());
        }
        if info.is_parent_context {
            return match self.context_ancestor(info.parent_hops) {
                Some(target) => {
                    let value = key::read(target.context(), &[], &options.read).value;
                    ScopeRead::found(value, target)
                }
                None => ScopeRead::no_context(),
            };
        }

        let reads = key::reads(&info.remaining_key);
        let traversal = if info.is_in_current_context || info.is_in_parent_context {
            Traversal::ParentContext {
                hops: info.parent_hops,
            }
        } else if options.special {
            Traversal::Special
        } else {
            Traversal::Lookup {
                current_scope_only: options.current_scope_only,
            }
        };
        self.walk(&reads, &options.read, traversal)
    }

    fn context_ancestor(&self, hops: usize) -> Option<Scope> {
        let mut current = self.clone();
        for _ in 0..hops {
            current = current.parent()?;
            while current.skips_context_paths() {
                current = current.parent()?;
            }
        }
        Some(current)
    }

    fn read_from_namespace(&self, remaining_key: &str, options: &ReadOptions) -> ScopeRead {
        let reads = key::reads(remaining_key);
        let mut data = key::read(&self.to_value(), &reads, options);
        if data.value.is_undefined() && !data.parent_has_key {
            data = key::read(&self.template_context_value(), &reads, options);
        }
        ScopeRead {
            this_arg: (reads.len() > 1).then(|| data.parent.clone()),
            value: data.value,
            parent_has_key: data.parent_has_key,
            scope: Some(self.clone()),
            ..ScopeRead::default()
        }
    }

    pub fn get(&self, key: &str) -> Value {
        self.read(key, &ScopeOptions::argument()).value
    }

    pub fn get_with(&self, key: &str, options: &ScopeOptions) -> Value {
        self.read(key, options).value
    }

    pub fn peek(&self, key: &str) -> Value {
        recorder::ignore(|| self.get(key))
    }

    pub fn peek_with(&self, key: &str, options: &ScopeOptions) -> Value {
        recorder::ignore(|| self.get_with(key, options))
    }

    pub fn find(&self, key: &str) -> Value {
        self.get_with(key, &ScopeOptions::argument().whole_chain())
    }

    pub fn find_with(&self, key: &str, options: &ScopeOptions) -> Value {
        let options = options.clone().whole_chain();
        self.get_with(key, &options)
    }

    pub fn has_key(&self, key: &str) -> bool {
        let reads = key::reads(key);
        let options = ReadOptions::default();
        let data = match reads.split_first() {
            Some((first, rest)) if first.key == "scope" => key::read(&self.to_value(), rest, &options),
            _ => key::read(&self.0.context, &reads, &options),
        };
        data.found_last_parent && data.parent_has_key
    }

    pub fn read_from_special_context(&self, key: &str) -> ScopeRead {
        self.walk(&[KeyRead::new(key)], &ReadOptions::default(), Traversal::Special)
    }

    pub fn read_from_template_context(&self, key: &str, options: &ReadOptions) -> ScopeRead {
        let reads = key::reads(key);
        let data = key::read(&self.template_context_value(), &reads, options);
        ScopeRead {
            value: data.value,
            parent_has_key: data.parent_has_key,
            this_arg: (reads.len() > 1).then_some(data.parent),
            ..ScopeRead::default()
        }
    }

    pub fn compute_data(&self, key: &str, options: ScopeOptions) -> ScopeKeyData {
        cache::compute_data(self, key, options)
    }

    pub fn compute(&self, key: &str) -> Value {
        self.compute_data(key, ScopeOptions::default()).to_value()
    }

    pub fn get_scope(&self, tester: impl Fn(&Scope) -> bool) -> Option<Scope> {
        let mut current = Some(self.clone());
        while let Some(scope) = current {
            if tester(&scope) {
                return Some(scope);
            }
            current = scope.parent();
        }
        None
    }

    pub fn get_context(&self, tester: impl Fn(&Scope) -> bool) -> Option<Value> {
        self.get_scope(tester).map(|scope| scope.0.context.clone())
    }

    pub fn chain(&self) -> Vec<Scope> {
        let mut chain = Vec::new();
        let mut current = Some(self.clone());
        while let Some(scope) = current {
            current = scope.parent();
            chain.push(scope);
        }
        chain
    }

    /// The nearest template-context node. When the chain has none, one is
    /// spliced in below the outermost node.
    pub fn get_template_context(&self) -> Scope {
        if let Some(found) = self.get_scope(Scope::is_template_context) {
            return found;
        }
        let tail = self.chain().pop().unwrap_or_else(|| self.clone());
        let created = Scope::from_context(TemplateContext::new().into_value());
        tail.0.backfill.get_or_init(|| created).clone()
    }

    pub fn template_context(&self) -> Rc<TemplateContext> {
        let node = self.get_template_context();
        TemplateContext::from_value(node.context()).unwrap_or_else(|| Rc::new(TemplateContext::new()))
    }

    fn template_context_value(&self) -> Value {
        self.get_template_context().0.context.clone()
    }

    pub fn get_root(&self) -> Value {
        let chain = self.chain();
        let mut nodes = chain.iter().rev();
        match nodes.next() {
            Some(last) if last.is_template_context() => nodes
                .next()
                .map(|child| child.0.context.clone())
                .unwrap_or_else(|| last.0.context.clone()),
            Some(last) => last.0.context.clone(),
            None => Value::Undefined,
        }
    }

    pub fn get_view_model(&self) -> Option<Value> {
        self.get_context(|scope| scope.0.meta.view_model)
    }

    pub fn get_top(&self) -> Option<Value> {
        self.chain()
            .into_iter()
            .filter(|scope| scope.0.meta.view_model)
            .last()
            .map(|scope| scope.0.context.clone())
    }

    pub fn filename(&self) -> Value {
        self.read_from_template_context("filename", &ReadOptions::default())
            .value
    }

    pub fn set_filename(&self, filename: Value) {
        self.template_context().set_filename(filename);
    }

    pub fn line_number(&self) -> Value {
        self.read_from_template_context("lineNumber", &ReadOptions::default())
            .value
    }

    pub fn set_line_number(&self, line_number: Value) {
        self.template_context().set_line_number(line_number);
    }

    pub fn clone_from_ref(&self) -> Scope {
        let mut contexts = Vec::new();
        let mut base = None;
        for scope in self.chain() {
            if scope.is_template_context() {
                base = scope.parent();
                break;
            }
            contexts.push(scope.0.context.clone());
        }
        match base {
            Some(base) => contexts
                .into_iter()
                .rev()
                .fold(base, |parent, context| parent.add(context)),
            None => self.clone(),
        }
    }

    pub fn get_paths_for_key(&self, key: &str) -> BTreeMap<String, Value> {
        let mut parts: Vec<String> = key::reads(key).into_iter().map(|read| read.key).collect();
        if let Some(index) = parts.iter().position(|part| part == "scope") {
            let end = (index + 2).min(parts.len());
            parts.drain(index..end);
        }
        let normalized = parts.join(".");
        let mut paths = BTreeMap::new();

        let mut record = |prefix: &str, owner: Value| {
            if let Some(is_function) = key_definition(&owner, &normalized) {
                let suffix = if is_function { "()" } else { "" };
                paths.insert(format!("{}{}{}", prefix, normalized, suffix), owner);
            }
        };
        if let Some(vm) = self.get_view_model() {
            record("scope.vm.", vm);
        }
        if let Some(top) = self.get_top() {
            record("scope.top.", top);
        }
        let mut prefix = String::new();
        for scope in self.chain() {
            if !scope.is_special() {
                record(&prefix, scope.0.context.clone());
                prefix.push_str("../");
            }
        }
        paths
    }

    pub fn log_chain(&self) {
        for (depth, scope) in self.chain().iter().enumerate() {
            log::debug!("{}{:?}", " ".repeat(depth), scope);
        }
    }
}

fn key_definition(owner: &Value, key: &str) -> Option<bool> {
    if !owner.is_object_like() || !key::has_key(owner, key) {
        return None;
    }
    let options = ReadOptions {
        is_argument: true,
        proxy_methods: false,
        ..ReadOptions::default()
    };
    let value = recorder::ignore(|| key::read(owner, &[KeyRead::new(key)], &options).value);
    Some(value.is_function())
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({}", self.0.context.type_name())?;
        if self.0.meta != ScopeMeta::default() {
            write!(f, ", {:?}", self.0.meta)?;
        }
        write!(f, ")")
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl NativeObject for ScopeNode {
    fn type_name(&self) -> &'static str {
        "Scope"
    }

    fn get_key(&self, key: &str) -> Option<Value> {
        self.this.upgrade().and_then(|node| Scope(node).namespace_key(key))
    }

    fn set_key(&self, key: &str, value: Value) -> bool {
        self.this
            .upgrade()
            .map(|node| Scope(node).set_namespace_key(key, value))
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}
