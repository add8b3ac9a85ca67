//! The subscriber queue and its flush.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::tick::next_tick;
use crate::config::with_config;
use crate::error::{handle_error, warn, ReactiveError};
use crate::reactive::{Subscriber, SubscriberId};
use crate::scope::Hook;

/// Where the queue is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing queued.
    Idle,
    /// Subscribers queued, flush scheduled.
    Waiting,
    Flushing,
}

#[derive(Default)]
struct SchedulerQueue {
    queue: Vec<Rc<Subscriber>>,
    has: HashSet<SubscriberId>,
    circular: HashMap<SubscriberId, usize>,
    aborted: HashSet<SubscriberId>,
    waiting: bool,
    flushing: bool,
    index: usize,
}

impl SchedulerQueue {
    /// Add a subscriber. Returns true if a flush needs to be scheduled.
    fn push(&mut self, subscriber: Rc<Subscriber>) -> bool {
        let id = subscriber.id();
        if self.aborted.contains(&id) || !self.has.insert(id) {
            return false;
        }

        if !self.flushing {
            self.queue.push(subscriber);
        } else {
            // Already past its position: it runs next. Otherwise keep id order.
            let mut i = self.queue.len();
            while i > self.index + 1 && self.queue[i - 1].id() > id {
                i -= 1;
            }
            self.queue.insert(i, subscriber);
        }

        !std::mem::replace(&mut self.waiting, true)
    }

    /// Record that `id` queued itself again while running. Returns true
    /// once it exceeds `max` and gets aborted for the rest of the flush.
    fn check_circular(&mut self, id: SubscriberId, max: usize) -> bool {
        if !self.has.contains(&id) {
            return false;
        }
        let count = self.circular.entry(id).or_insert(0);
        *count += 1;
        if *count <= max {
            return false;
        }
        self.has.remove(&id);
        self.aborted.insert(id);
        true
    }

    fn reset(&mut self) -> Vec<Rc<Subscriber>> {
        let queue = std::mem::take(&mut self.queue);
        self.has.clear();
        self.circular.clear();
        self.aborted.clear();
        self.waiting = false;
        self.flushing = false;
        self.index = 0;
        queue
    }
}

thread_local! {
    static QUEUE: RefCell<SchedulerQueue> = RefCell::new(SchedulerQueue::default());
}

/// Queue a subscriber for the next flush. A subscriber already queued and
/// not yet run is not queued again.
pub fn queue_subscriber(subscriber: Rc<Subscriber>) {
    let id = subscriber.id();
    if !QUEUE.with(|q| q.borrow_mut().push(subscriber)) {
        return;
    }

    tracing::debug!(first = id.raw(), "scheduling flush");
    if with_config(|c| c.async_flush) {
        next_tick(flush_scheduler_queue);
    } else {
        flush_scheduler_queue();
    }
}

/// Run every queued subscriber in ascending id order, then fire the
/// `Updated` hooks of the scopes that re-rendered.
pub fn flush_scheduler_queue() {
    let max_updates = with_config(|c| c.max_update_count);
    let pending = QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        q.flushing = true;
        q.index = 0;
        q.queue.sort_by_key(|subscriber| subscriber.id());
        q.queue.len()
    });
    tracing::debug!(pending, "flushing subscriber queue");

    loop {
        let next = QUEUE.with(|q| {
            let q = q.borrow();
            q.queue.get(q.index).cloned().map(|s| (q.aborted.contains(&s.id()), s))
        });
        let Some((aborted, subscriber)) = next else {
            break;
        };

        if !aborted {
            run_queued(&subscriber, max_updates);
        }
        QUEUE.with(|q| q.borrow_mut().index += 1);
    }

    let flushed = QUEUE.with(|q| q.borrow_mut().reset());
    tracing::debug!(ran = flushed.len(), "flush complete");
    call_updated_hooks(&flushed);
}

fn run_queued(subscriber: &Rc<Subscriber>, max_updates: usize) {
    let id = subscriber.id();
    if let Some(before) = subscriber.before_hook() {
        before();
    }
    QUEUE.with(|q| q.borrow_mut().has.remove(&id));

    if let Err(err) = subscriber.run() {
        handle_error(&err, &format!("flush of {}", subscriber.describe()));
    }

    if QUEUE.with(|q| q.borrow_mut().check_circular(id, max_updates)) {
        warn(ReactiveError::InfiniteLoop(subscriber.describe()));
    }
}

fn call_updated_hooks(queue: &[Rc<Subscriber>]) {
    for subscriber in queue.iter().rev() {
        let Some(scope) = subscriber.owner() else {
            continue;
        };
        if scope.render_subscriber_id() == Some(subscriber.id())
            && scope.is_mounted()
            && !scope.is_destroyed()
        {
            scope.call_hook(Hook::Updated);
        }
    }
}

pub fn scheduler_state() -> SchedulerState {
    QUEUE.with(|q| {
        let q = q.borrow();
        if q.flushing {
            SchedulerState::Flushing
        } else if q.waiting {
            SchedulerState::Waiting
        } else {
            SchedulerState::Idle
        }
    })
}

/// Subscribers queued and not yet run.
pub fn pending_count() -> usize {
    QUEUE.with(|q| {
        let q = q.borrow();
        if q.flushing {
            q.queue.len().saturating_sub(q.index + 1)
        } else {
            q.queue.len()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::observer::Value;
    use crate::reactive::{Expr, Signal, SubscriberOptions};
    use crate::scheduler::drain_ticks;
    use std::cell::Cell;

    fn counting(signal: &Signal) -> (Rc<Subscriber>, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let (s, r) = (signal.clone(), runs.clone());
        let subscriber = Subscriber::new(
            None,
            Expr::func(move || {
                r.set(r.get() + 1);
                Ok(s.get())
            }),
            None,
            SubscriberOptions::default(),
        )
        .unwrap();
        (subscriber, runs)
    }

    #[test]
    fn queue_deduplicates_until_run() {
        let signal = Signal::new(0);
        let (_subscriber, runs) = counting(&signal);

        signal.set(1);
        signal.set(2);
        assert_eq!(scheduler_state(), SchedulerState::Waiting);
        assert_eq!(pending_count(), 1);

        drain_ticks();
        assert_eq!(runs.get(), 2);
        assert_eq!(scheduler_state(), SchedulerState::Idle);
    }

    #[test]
    fn flush_runs_in_ascending_id_order() {
        let signal = Signal::new(0);
        let order = Rc::new(RefCell::new(Vec::new()));
        let subscribers: Vec<_> = (0..3)
            .map(|_| {
                let (s, o) = (signal.clone(), order.clone());
                let cell = Rc::new(Cell::new(None));
                let c = cell.clone();
                let subscriber = Subscriber::new(
                    None,
                    Expr::func(move || {
                        if let Some(id) = c.get() {
                            o.borrow_mut().push(id);
                        }
                        Ok(s.get())
                    }),
                    None,
                    SubscriberOptions::default(),
                )
                .unwrap();
                cell.set(Some(subscriber.id()));
                subscriber
            })
            .collect();

        for subscriber in subscribers.iter().rev() {
            queue_subscriber(Rc::clone(subscriber));
        }
        drain_ticks();

        let ids: Vec<_> = subscribers.iter().map(|s| s.id()).collect();
        assert_eq!(*order.borrow(), ids);
    }

    #[test]
    fn self_requeueing_subscriber_is_aborted_and_flush_continues() {
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let w = warnings.clone();
        config::configure(|c| {
            c.warn_handler = Some(Rc::new(move |err: &ReactiveError| w.borrow_mut().push(err.clone())))
        });

        let signal = Signal::new(0);
        let runs = Rc::new(Cell::new(0));
        let (s, writer, r) = (signal.clone(), signal.clone(), runs.clone());
        let looping = Subscriber::new(
            None,
            Expr::func(move || Ok(s.get())),
            Some(Rc::new(move |new: &Value, _: &Value| {
                r.set(r.get() + 1);
                writer.set(new.as_f64().unwrap_or(0.0) + 1.0);
                Ok(())
            })),
            SubscriberOptions::default(),
        )
        .unwrap();

        let other = Signal::new(0);
        let (_unrelated, unrelated_runs) = counting(&other);

        signal.set(1);
        other.set(1);
        drain_ticks();

        assert_eq!(runs.get(), 101);
        assert_eq!(unrelated_runs.get(), 2);
        assert_eq!(
            *warnings.borrow(),
            vec![ReactiveError::InfiniteLoop(looping.describe())]
        );
        assert_eq!(scheduler_state(), SchedulerState::Idle);
        config::reset();
    }
}
