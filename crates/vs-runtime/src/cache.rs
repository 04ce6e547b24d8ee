use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::key_data::{KeyDataInner, ScopeKeyData};
use crate::options::ScopeOptions;
use crate::scope::Scope;

#[derive(Default)]
pub(crate) struct KeyDataCache {
    entries: RefCell<HashMap<String, Rc<KeyDataInner>>>,
}

impl KeyDataCache {
    fn lookup(&self, key: &str) -> Option<Rc<KeyDataInner>> {
        self.entries.borrow().get(key).cloned()
    }

    fn insert(&self, key: &str, data: &ScopeKeyData) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), Rc::clone(data.inner()));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

pub fn compute_data(scope: &Scope, key: &str, options: ScopeOptions) -> ScopeKeyData {
    if let Some(existing) = scope.cache().lookup(key) {
        return ScopeKeyData::from_inner(scope.clone(), existing);
    }
    let data = ScopeKeyData::new(scope.clone(), key, options);
    scope.cache().insert(key, &data);
    data
}
