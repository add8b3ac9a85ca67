//! Dependency Tracking
//!
//! This module implements the tracking half of the reactive system:
//! dependency nodes, subscribers, and the context that connects them.
//!
//! # Concepts
//!
//! ## Dependency Nodes
//!
//! A [`Dep`] belongs to one reactive field (or one reactive container). When
//! the field is read during an evaluation, the node links itself with the
//! evaluating subscriber. When the field changes, the node notifies every
//! linked subscriber.
//!
//! ## Subscribers
//!
//! A [`Subscriber`] evaluates an expression inside a [`ReactiveContext`]
//! and remembers what it read. Render functions, computed values and
//! explicit watches are all subscribers with different mode flags.
//! [`Computed`], [`Effect`] and [`watch`] are the ownerless conveniences
//! built on top of it.
//!
//! ## Signals
//!
//! A [`Signal`] is a single reactive field that lives outside any map.
//!
//! # Implementation Notes
//!
//! Nodes hold subscriber ids, subscribers hold node handles, and a
//! thread-local [`Runtime`] resolves ids back to subscribers. The
//! subscriber side can therefore release every subscription on its own,
//! and neither side keeps the other alive.

mod computed;
mod context;
mod dep;
mod effect;
mod expr;
mod runtime;
mod signal;
mod subscriber;
mod traverse;
mod watch;

pub use computed::{Computed, ComputedSetter};
pub use context::{untrack, ReactiveContext};
pub use dep::{Dep, DepId};
pub use effect::Effect;
pub use expr::{Expr, Getter};
pub use runtime::Runtime;
pub use signal::Signal;
pub use subscriber::{Callback, Subscriber, SubscriberId, SubscriberOptions};
pub use traverse::traverse;
pub use watch::{create_subscriber, watch, WatchHandle, WatchOptions};
