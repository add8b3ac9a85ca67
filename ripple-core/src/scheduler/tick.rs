//! Deferred execution ("next tick").
//!
//! Callbacks registered with [`next_tick`] are collected and drained in one
//! host task. The host decides when that task runs: [`ManualTickHost`]
//! keeps it until [`drain_ticks`] is called, [`TokioTickHost`] spawns it on
//! the current `LocalSet`.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tokio::sync::oneshot;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Runs deferred tasks after the current synchronous work completes.
pub trait TickHost {
    fn schedule(&self, task: Task);

    /// Run every task the host is holding. Hosts driven by an event loop
    /// have nothing to drain.
    fn drain(&self) -> usize {
        0
    }
}

/// Holds tasks until they are drained explicitly. The default host.
#[derive(Default)]
pub struct ManualTickHost {
    tasks: RefCell<VecDeque<Task>>,
}

impl ManualTickHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }
}

impl TickHost for ManualTickHost {
    fn schedule(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }

    fn drain(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.tasks.borrow_mut().pop_front();
            let Some(task) = task else {
                return ran;
            };
            task();
            ran += 1;
        }
    }
}

/// Spawns tasks with [`tokio::task::spawn_local`].
///
/// Only usable from inside a [`tokio::task::LocalSet`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTickHost;

impl TickHost for TokioTickHost {
    fn schedule(&self, task: Task) {
        tokio::task::spawn_local(async move { task() });
    }
}

thread_local! {
    static HOST: RefCell<Rc<dyn TickHost>> = RefCell::new(Rc::new(ManualTickHost::new()));
    static CALLBACKS: RefCell<Vec<Task>> = const { RefCell::new(Vec::new()) };
    static PENDING: Cell<bool> = const { Cell::new(false) };
}

/// Install the tick host for the current thread.
pub fn set_tick_host(host: impl TickHost + 'static) {
    HOST.with(|h| *h.borrow_mut() = Rc::new(host));
}

fn current_host() -> Rc<dyn TickHost> {
    HOST.with(|h| Rc::clone(&h.borrow()))
}

/// Run `callback` on the next tick, after every callback registered before
/// it.
pub fn next_tick(callback: impl FnOnce() + 'static) {
    CALLBACKS.with(|callbacks| callbacks.borrow_mut().push(Box::new(callback)));
    if !PENDING.with(|pending| pending.replace(true)) {
        current_host().schedule(Box::new(flush_callbacks));
    }
}

fn flush_callbacks() {
    PENDING.with(|pending| pending.set(false));
    let callbacks = CALLBACKS.with(|callbacks| std::mem::take(&mut *callbacks.borrow_mut()));
    tracing::trace!(count = callbacks.len(), "running next-tick callbacks");
    for callback in callbacks {
        callback();
    }
}

/// Drain the current host, returning the number of host tasks run.
pub fn drain_ticks() -> usize {
    current_host().drain()
}

/// Whether callbacks are waiting for the next tick.
pub fn has_pending_ticks() -> bool {
    PENDING.with(Cell::get)
}

/// Resolve after the callbacks queued so far (including a pending flush)
/// have run.
pub async fn tick() {
    let (tx, rx) = oneshot::channel();
    next_tick(move || {
        let _ = tx.send(());
    });
    let _ = rx.await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_run_in_order_on_drain() {
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            next_tick(move || log.borrow_mut().push(i));
        }

        assert!(has_pending_ticks());
        assert!(log.borrow().is_empty());

        assert_eq!(drain_ticks(), 1);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(!has_pending_ticks());
    }

    #[test]
    fn callbacks_queued_while_draining_run_in_a_later_tick() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        next_tick(move || {
            l.borrow_mut().push("outer");
            let l = l.clone();
            next_tick(move || l.borrow_mut().push("inner"));
        });

        assert_eq!(drain_ticks(), 2);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }

    #[tokio::test]
    async fn tokio_host_runs_callbacks_on_the_local_set() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                set_tick_host(TokioTickHost);
                let ran = Rc::new(Cell::new(false));
                let r = ran.clone();
                next_tick(move || r.set(true));

                tick().await;
                assert!(ran.get());
                set_tick_host(ManualTickHost::new());
            })
            .await;
    }
}
