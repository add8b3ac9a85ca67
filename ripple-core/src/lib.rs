//! Ripple Core
//!
//! This crate provides the dependency-tracking core of the Ripple reactive
//! runtime. It implements:
//!
//! - Reactive containers (maps and lists whose reads and writes are tracked)
//! - Subscribers that re-evaluate when what they read changes
//! - A batching scheduler that runs each subscriber at most once per tick
//! - Scopes that own state, computed values, watches and a render function
//!
//! Everything is thread-confined: state lives in `Rc`/`RefCell`, and the
//! runtime singletons are per thread.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `observer`: the value model, reactive containers and their fields
//! - `reactive`: dependency nodes, subscribers and the tracking context
//! - `scheduler`: the subscriber queue and the next-tick host
//! - `scope`: owners of root state and subscribers
//! - `config` / `error`: per-thread settings and error reporting
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::{drain_ticks, Scope, Value, WatchOptions};
//! use serde_json::json;
//!
//! let scope = Scope::new("counter");
//! let data = scope.init_data(Value::from_json(&json!({"count": 0})));
//!
//! scope.watch("count", |new, old| {
//!     println!("count: {old:?} -> {new:?}");
//!     Ok(())
//! }, WatchOptions::default())?;
//!
//! data.insert("count", 1);
//! data.insert("count", 2);
//! drain_ticks(); // prints once: "count: Number(0) -> Number(2)"
//! ```

pub mod config;
pub mod error;
pub mod observer;
pub mod reactive;
pub mod scheduler;
pub mod scope;

pub use config::{configure, with_config, Config};
pub use error::{handle_error, warn, ReactiveError};
pub use observer::{
    define_reactive, delete_field, observe, set_field, should_observe, toggle_observing, Key,
    Observer, ReactiveList, ReactiveMap, Value,
};
pub use reactive::{
    create_subscriber, untrack, watch, Computed, Dep, Effect, Expr, Signal, Subscriber,
    SubscriberOptions, WatchHandle, WatchOptions,
};
pub use scheduler::{drain_ticks, next_tick, set_tick_host, tick, ManualTickHost, TokioTickHost};
pub use scope::{Hook, Scope};
