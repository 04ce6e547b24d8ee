use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// Queues are drained in this order; a task that enqueues more work sends the
/// scheduler back to the highest non-empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Queue {
    Notify,
    Derive,
    Mutate,
}

type Task = Box<dyn FnOnce()>;

#[derive(Default)]
struct Scheduler {
    notify: VecDeque<Task>,
    derive: VecDeque<Task>,
    mutate: VecDeque<Task>,
}

impl Scheduler {
    fn next(&mut self) -> Option<Task> {
        self.notify
            .pop_front()
            .or_else(|| self.derive.pop_front())
            .or_else(|| self.mutate.pop_front())
    }
}

thread_local! {
    static SCHEDULER: RefCell<Scheduler> = RefCell::new(Scheduler::default());
    static BATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
    static BATCH_NUMBER: Cell<u64> = const { Cell::new(0) };
}

pub fn enqueue(queue: Queue, task: impl FnOnce() + 'static) {
    SCHEDULER.with(|scheduler| {
        let mut scheduler = scheduler.borrow_mut();
        let target = match queue {
            Queue::Notify => &mut scheduler.notify,
            Queue::Derive => &mut scheduler.derive,
            Queue::Mutate => &mut scheduler.mutate,
        };
        target.push_back(Box::new(task));
    });
    if BATCH_DEPTH.with(Cell::get) == 0 {
        flush();
    }
}

pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    struct Depth;
    impl Drop for Depth {
        fn drop(&mut self) {
            let remaining = BATCH_DEPTH.with(|depth| {
                let next = depth.get().saturating_sub(1);
                depth.set(next);
                next
            });
            if remaining == 0 {
                flush();
            }
        }
    }

    let opened = BATCH_DEPTH.with(|depth| {
        depth.set(depth.get() + 1);
        depth.get() == 1
    });
    if opened {
        BATCH_NUMBER.with(|number| number.set(number.get() + 1));
    }
    let _depth = Depth;
    f()
}

pub fn batch_number() -> u64 {
    BATCH_NUMBER.with(Cell::get)
}

pub fn is_flushing() -> bool {
    FLUSHING.with(Cell::get)
}

pub fn flush() {
    if FLUSHING.with(|flushing| flushing.replace(true)) {
        return;
    }
    while let Some(task) = SCHEDULER.with(|scheduler| scheduler.borrow_mut().next()) {
        task();
    }
    FLUSHING.with(|flushing| flushing.set(false));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn batch_defers_and_orders_by_queue() {
        let log = Rc::new(RefCell::new(Vec::new()));
        batch(|| {
            for (queue, name) in [
                (Queue::Mutate, "mutate"),
                (Queue::Derive, "derive"),
                (Queue::Notify, "notify"),
            ] {
                let log = Rc::clone(&log);
                enqueue(queue, move || log.borrow_mut().push(name));
            }
            assert!(log.borrow().is_empty());
        });
        assert_eq!(*log.borrow(), vec!["notify", "derive", "mutate"]);
    }

    #[test]
    fn tasks_enqueued_while_flushing_run_in_priority_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner = Rc::clone(&log);
        batch(|| {
            let log = Rc::clone(&log);
            enqueue(Queue::Mutate, move || log.borrow_mut().push("late mutate"));
            enqueue(Queue::Derive, move || {
                inner.borrow_mut().push("derive");
                let again = Rc::clone(&inner);
                enqueue(Queue::Notify, move || again.borrow_mut().push("notify"));
            });
        });
        assert_eq!(*log.borrow(), vec!["derive", "notify", "late mutate"]);
    }

    #[test]
    fn batch_number_increments_per_outer_batch() {
        let before = batch_number();
        batch(|| batch(|| ()));
        assert_eq!(batch_number(), before + 1);
    }
}
