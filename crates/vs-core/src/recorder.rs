use std::cell::RefCell;
use std::fmt;

use crate::observable::{ChangeHandler, HandlerId, ObservableMap, ObservableRef};
use crate::queue::Queue;

#[derive(Clone)]
pub enum Dependency {
    Key { map: ObservableMap, key: String },
    Value(ObservableRef),
}

impl Dependency {
    pub fn key(map: &ObservableMap, key: &str) -> Self {
        Self::Key {
            map: map.clone(),
            key: key.to_string(),
        }
    }

    pub fn source_id(&self) -> usize {
        match self {
            Self::Key { map, .. } => map.id(),
            Self::Value(observable) => observable.observable_id(),
        }
    }

    pub fn same_as(&self, other: &Dependency) -> bool {
        match (self, other) {
            (Self::Key { map, key }, Self::Key { map: other_map, key: other_key }) => {
                map.id() == other_map.id() && key == other_key
            }
            (Self::Value(left), Self::Value(right)) => {
                left.observable_id() == right.observable_id()
            }
            _ => false,
        }
    }

    pub fn subscribe(&self, handler: ChangeHandler, queue: Queue) -> HandlerId {
        match self {
            Self::Key { map, key } => map.on_key(key, handler, queue),
            Self::Value(observable) => observable.on_value(handler, queue),
        }
    }

    pub fn unsubscribe(&self, id: HandlerId) {
        match self {
            Self::Key { map, key } => map.off_key(key, id),
            Self::Value(observable) => observable.off_value(id),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Key { map, key } => format!("map#{}.{}", map.id(), key),
            Self::Value(observable) => observable.observable_name(),
        }
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Record,
    Trap,
    Ignore,
}

struct Frame {
    kind: FrameKind,
    dependencies: Vec<Dependency>,
}

thread_local! {
    static STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

fn push(kind: FrameKind) -> usize {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(Frame {
            kind,
            dependencies: Vec::new(),
        });
        stack.len() - 1
    })
}

fn pop(depth: usize) -> Vec<Dependency> {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.len() <= depth {
            return Vec::new();
        }
        let mut frames = stack.split_off(depth);
        frames.swap_remove(0).dependencies
    })
}

pub struct Recording {
    depth: usize,
    open: bool,
}

impl Recording {
    pub fn stop(mut self) -> Vec<Dependency> {
        self.open = false;
        pop(self.depth)
    }
}

impl Drop for Recording {
    fn drop(&mut self) {
        if self.open {
            pop(self.depth);
        }
    }
}

pub struct Trap {
    depth: usize,
    open: bool,
}

impl Trap {
    pub fn count(&self) -> usize {
        STACK.with(|stack| {
            stack
                .borrow()
                .get(self.depth)
                .map(|frame| frame.dependencies.len())
                .unwrap_or(0)
        })
    }

    pub fn finish(mut self) -> Vec<Dependency> {
        self.open = false;
        pop(self.depth)
    }
}

impl Drop for Trap {
    fn drop(&mut self) {
        if self.open {
            pop(self.depth);
        }
    }
}

struct IgnoreGuard {
    depth: usize,
}

impl Drop for IgnoreGuard {
    fn drop(&mut self) {
        pop(self.depth);
    }
}

pub fn start() -> Recording {
    Recording {
        depth: push(FrameKind::Record),
        open: true,
    }
}

pub fn trap() -> Trap {
    Trap {
        depth: push(FrameKind::Trap),
        open: true,
    }
}

pub fn ignore<T>(f: impl FnOnce() -> T) -> T {
    let _guard = IgnoreGuard {
        depth: push(FrameKind::Ignore),
    };
    f()
}

/// Whether a read made now would reach a recording. Traps are transparent:
/// the nearest frame that is not a trap decides.
pub fn is_recording() -> bool {
    STACK.with(|stack| {
        stack
            .borrow()
            .iter()
            .rev()
            .find(|frame| frame.kind != FrameKind::Trap)
            .map(|frame| frame.kind == FrameKind::Record)
            .unwrap_or(false)
    })
}

pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}

pub fn add(dependency: Dependency) {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let Some(frame) = stack.last_mut() else {
            return;
        };
        if frame.kind == FrameKind::Ignore {
            return;
        }
        if !frame
            .dependencies
            .iter()
            .any(|existing| existing.same_as(&dependency))
        {
            frame.dependencies.push(dependency);
        }
    });
}

pub fn add_many(dependencies: impl IntoIterator<Item = Dependency>) {
    for dependency in dependencies {
        add(dependency);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn trap_hides_reads_from_outer_recording() {
        let map = ObservableMap::from_entries([("a", Value::from(1)), ("b", Value::from(2))]);
        let recording = start();
        let trap = trap();
        map.get("a");
        assert_eq!(trap.count(), 1);
        let trapped = trap.finish();
        map.get("b");
        let recorded = recording.stop();

        assert_eq!(trapped.len(), 1);
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].same_as(&Dependency::key(&map, "b")));
    }

    #[test]
    fn ignore_suppresses_recording() {
        let map = ObservableMap::from_entries([("a", Value::from(1))]);
        let recording = start();
        assert!(is_recording());
        ignore(|| {
            assert!(!is_recording());
            map.get("a");
        });
        assert!(recording.stop().is_empty());
        assert!(!is_recording());
    }

    #[test]
    fn a_trap_alone_is_not_a_recording() {
        let outer = trap();
        assert!(!is_recording());
        let recording = start();
        let inner = trap();
        assert!(is_recording());
        drop(inner);
        drop(recording);
        drop(outer);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn duplicate_dependencies_are_recorded_once() {
        let map = ObservableMap::new();
        let recording = start();
        map.get("a");
        map.get("a");
        assert_eq!(recording.stop().len(), 1);
    }

    #[test]
    fn dropped_recording_pops_its_frame() {
        {
            let _recording = start();
            assert_eq!(depth(), 1);
        }
        assert_eq!(depth(), 0);
    }
}
