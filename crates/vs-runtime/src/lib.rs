mod cache;
mod helpers;
mod key_data;
mod keys;
mod options;
mod scope;
mod template_context;

pub use cache::compute_data;
pub use helpers::HelperRegistry;
pub use key_data::{KeyDataState, ScopeKeyData};
pub use keys::{KeyInfo, THIS_KEY};
pub use options::{ScopeMeta, ScopeOptions};
pub use scope::{Scope, ScopeRead, SetOutcome, SetPlan, Traversal};
pub use template_context::TemplateContext;
