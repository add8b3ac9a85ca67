//! Runtime Configuration
//!
//! The reactive core keeps one [`Config`] per thread, matching the
//! thread-confined runtime: every reactive value and subscriber lives on the
//! thread that created it, so configuration is scoped the same way.
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::config;
//!
//! // Flush synchronously after every mutation (deterministic tests).
//! config::configure(|c| c.async_flush = false);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::ReactiveError;

/// Maximum number of times a subscriber may re-queue itself in one flush.
pub const MAX_UPDATE_COUNT: usize = 100;

/// Receives errors raised by user getters and callbacks.
pub type ErrorHandler = Rc<dyn Fn(&ReactiveError, &str)>;

/// Receives warnings about recoverable API misuse.
pub type WarnHandler = Rc<dyn Fn(&ReactiveError)>;

/// Per-thread settings of the reactive runtime.
#[derive(Clone)]
pub struct Config {
    /// Defer flushes to the next tick. When false, every queued update
    /// flushes immediately and notifications run in subscriber-id order.
    pub async_flush: bool,

    /// Re-entry threshold for infinite update loop detection.
    pub max_update_count: usize,

    /// Sink for errors raised by user code. Defaults to `tracing::error!`.
    pub error_handler: Option<ErrorHandler>,

    /// Sink for warnings. Defaults to `tracing::warn!`.
    pub warn_handler: Option<WarnHandler>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            async_flush: true,
            max_update_count: MAX_UPDATE_COUNT,
            error_handler: None,
            warn_handler: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("async_flush", &self.async_flush)
            .field("max_update_count", &self.max_update_count)
            .field("error_handler", &self.error_handler.is_some())
            .field("warn_handler", &self.warn_handler.is_some())
            .finish()
    }
}

thread_local! {
    static CONFIG: RefCell<Config> = RefCell::new(Config::default());
}

/// Mutate the current thread's configuration.
pub fn configure(f: impl FnOnce(&mut Config)) {
    CONFIG.with(|config| f(&mut config.borrow_mut()));
}

/// Read the current thread's configuration.
///
/// Handlers must be cloned out before they are invoked, since the
/// configuration stays borrowed for the duration of `f`.
pub fn with_config<R>(f: impl FnOnce(&Config) -> R) -> R {
    CONFIG.with(|config| f(&config.borrow()))
}

/// Restore the defaults.
pub fn reset() {
    configure(|c| *c = Config::default());
}
