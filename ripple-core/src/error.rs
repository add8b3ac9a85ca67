//! Error taxonomy and the two reporting channels.
//!
//! Nothing in the reactive core is fatal. Failures either propagate to a
//! synchronous caller as a [`ReactiveError`] or are routed through
//! [`handle_error`] / [`warn`], which call the handlers installed in
//! [`Config`](crate::config::Config) and otherwise fall back to `tracing`.

use thiserror::Error;

use crate::config;

/// Errors produced by (or reported from) the reactive core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactiveError {
    /// Raised by a subscriber getter or callback.
    #[error("{0}")]
    Eval(String),

    #[error("failed watching path \"{0}\": only simple dot-delimited paths are supported")]
    InvalidPath(String),

    #[error("cannot {0} a reactive property on a primitive or missing value")]
    PrimitiveTarget(&'static str),

    #[error("avoid adding or removing reactive properties on a root state container at runtime")]
    RootMutation,

    #[error("avoid replacing the root state container of scope \"{0}\"")]
    RootReplacement(String),

    #[error("avoid mutating prop \"{0}\" directly, it is overwritten whenever the owner re-renders")]
    PropMutation(String),

    #[error("prop \"{0}\" is not declared on this scope")]
    UnknownProp(String),

    #[error("computed value \"{0}\" was assigned to but it has no setter")]
    ComputedWithoutSetter(String),

    #[error("cannot mutate a frozen container")]
    Frozen,

    #[error("root state of scope \"{0}\" must be a map")]
    NonMapData(String),

    #[error("you may have an infinite update loop in {0}")]
    InfiniteLoop(String),
}

impl ReactiveError {
    /// Shorthand for user code raising an evaluation error.
    pub fn eval(message: impl Into<String>) -> Self {
        Self::Eval(message.into())
    }
}

/// Report an error raised by user code.
///
/// `info` names where the error happened, e.g. `getter for watcher "a.b"`.
pub fn handle_error(err: &ReactiveError, info: &str) {
    match config::with_config(|c| c.error_handler.clone()) {
        Some(handler) => handler(err, info),
        None => tracing::error!(error = %err, info, "error in reactive callback"),
    }
}

/// Report a recoverable misuse of the reactive API.
pub fn warn(err: ReactiveError) {
    match config::with_config(|c| c.warn_handler.clone()) {
        Some(handler) => handler(&err),
        None => tracing::warn!("{err}"),
    }
}
