//! Update Scheduler
//!
//! Changes are not applied to subscribers one by one. A notified subscriber
//! is queued, and the queue is flushed once on the next tick, so a
//! subscriber runs at most once per flush no matter how many of its
//! dependencies changed.
//!
//! # Algorithm
//!
//! 1. `queue_subscriber` skips subscribers already waiting in the queue.
//!    The first queued subscriber schedules a flush with [`next_tick`]
//!    (or flushes immediately when `Config::async_flush` is off).
//! 2. The flush sorts the queue by subscriber id, so owners update before
//!    the things they own and user watches run before render functions
//!    created after them.
//! 3. Subscribers queued during the flush are inserted by scanning back
//!    from the tail, keeping id order for the part not yet run.
//! 4. A subscriber that keeps queueing itself is aborted for the rest of
//!    the flush after `Config::max_update_count` re-entries.
//! 5. After the pass the `Updated` hooks of re-rendered scopes fire,
//!    children before parents.

mod queue;
mod tick;

pub use queue::{flush_scheduler_queue, pending_count, queue_subscriber, scheduler_state, SchedulerState};
pub use tick::{
    drain_ticks, has_pending_ticks, next_tick, set_tick_host, tick, ManualTickHost, Task, TickHost,
    TokioTickHost,
};
