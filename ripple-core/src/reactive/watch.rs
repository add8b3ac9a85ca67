//! Explicit watches and the handle returned for every created subscriber.

use std::rc::Rc;

use super::context::ReactiveContext;
use super::{Callback, Expr, Subscriber, SubscriberId, SubscriberOptions};
use crate::error::{handle_error, ReactiveError};
use crate::observer::Value;
use crate::scope::Scope;

/// Owns a subscriber on behalf of the caller; `dispose` tears it down.
///
/// Dropping the handle does not dispose the subscriber if an owning scope
/// still holds it.
#[derive(Clone, Debug)]
pub struct WatchHandle {
    subscriber: Rc<Subscriber>,
}

impl WatchHandle {
    pub fn id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    /// Last value the watched expression evaluated to.
    pub fn value(&self) -> Value {
        self.subscriber.value()
    }

    pub fn subscriber(&self) -> &Rc<Subscriber> {
        &self.subscriber
    }

    pub fn dispose(&self) {
        self.subscriber.teardown();
    }
}

/// Options of an explicit watch.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    pub deep: bool,
    /// Fire the callback once, untracked, right after creation.
    pub immediate: bool,
    pub sync: bool,
}

/// Construct a subscriber and, unless it is lazy, evaluate it.
pub fn create_subscriber(
    owner: Option<&Scope>,
    expr: impl Into<Expr>,
    callback: Option<Callback>,
    options: SubscriberOptions,
) -> Result<WatchHandle, ReactiveError> {
    let subscriber = Subscriber::new(owner, expr.into(), callback, options)?;
    Ok(WatchHandle { subscriber })
}

/// Watch an expression and call `callback(new, old)` when it changes.
///
/// Watches are user subscribers: errors from the expression or the callback
/// are reported and never returned, so creation only fails for other kinds
/// of subscriber.
pub fn watch<F>(
    owner: Option<&Scope>,
    expr: impl Into<Expr>,
    callback: F,
    options: WatchOptions,
) -> Result<WatchHandle, ReactiveError>
where
    F: Fn(&Value, &Value) -> Result<(), ReactiveError> + 'static,
{
    let callback: Callback = Rc::new(callback);
    let subscriber_options = SubscriberOptions {
        deep: options.deep,
        user: true,
        sync: options.sync,
        ..SubscriberOptions::default()
    };
    let handle = create_subscriber(owner, expr, Some(callback.clone()), subscriber_options)?;

    if options.immediate {
        let _ctx = ReactiveContext::untracked();
        if let Err(err) = callback(&handle.value(), &Value::Null) {
            let info = format!(
                "callback for immediate watcher \"{}\"",
                handle.subscriber.expression()
            );
            handle_error(&err, &info);
        }
    }

    Ok(handle)
}
