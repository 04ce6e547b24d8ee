pub mod error;
pub mod key;
pub mod observable;
pub mod observation;
pub mod queue;
pub mod recorder;
pub mod value;

pub use error::ScopeError;
pub use key::{KeyRead, KeyReadResult, ReadOptions};
pub use observable::{
    ChangeHandler, HandlerId, Handlers, ObservableMap, ObservableRef, ObservableValue,
    ValueObservable,
};
pub use observation::{Interceptor, Observation};
pub use queue::Queue;
pub use recorder::Dependency;
pub use value::*;
