//! Subscriber expressions: a closure, or a dot-delimited path read off an
//! owning scope or an explicit root value.

use std::fmt;
use std::rc::Rc;

use crate::error::{self, ReactiveError};
use crate::observer::Value;
use crate::scope::WeakScope;

/// The function a subscriber evaluates.
pub type Getter = Rc<dyn Fn() -> Result<Value, ReactiveError>>;

/// What a subscriber evaluates.
#[derive(Clone)]
pub enum Expr {
    Func(Getter),
    /// Resolved against the owning scope: the first segment names a
    /// computed value, a prop or a data field.
    Path(String),
    /// Resolved against the given value.
    PathOn(Value, String),
}

impl Expr {
    pub fn func(f: impl Fn() -> Result<Value, ReactiveError> + 'static) -> Self {
        Self::Func(Rc::new(f))
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    pub fn path_on(root: impl Into<Value>, path: impl Into<String>) -> Self {
        Self::PathOn(root.into(), path.into())
    }

    /// Text used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::Func(_) => "<function>".to_string(),
            Self::Path(path) | Self::PathOn(_, path) => path.clone(),
        }
    }

    /// Turn the expression into a getter.
    ///
    /// Malformed paths degrade to a getter that always yields `Null`, after
    /// a warning, so one bad definition cannot take the graph down.
    pub(crate) fn into_getter(self, owner: Option<WeakScope>) -> Getter {
        match self {
            Self::Func(getter) => getter,
            Self::Path(path) => match parse_path(&path) {
                Some(segments) => Rc::new(move || {
                    let Some(scope) = owner.as_ref().and_then(WeakScope::upgrade) else {
                        return Ok(Value::Null);
                    };
                    let (first, rest) = match segments.split_first() {
                        Some(split) => split,
                        None => return Ok(Value::Null),
                    };
                    let root = scope.resolve(first)?;
                    Ok(walk(root, rest))
                }),
                None => invalid(path),
            },
            Self::PathOn(root, path) => match parse_path(&path) {
                Some(segments) => Rc::new(move || Ok(walk(root.clone(), &segments))),
                None => invalid(path),
            },
        }
    }
}

fn invalid(path: String) -> Getter {
    error::warn(ReactiveError::InvalidPath(path));
    Rc::new(|| Ok(Value::Null))
}

fn walk(mut current: Value, segments: &[String]) -> Value {
    for segment in segments {
        if current.is_null() {
            break;
        }
        current = current.get_key(segment);
    }
    current
}

impl From<&str> for Expr {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for Expr {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({})", self.describe())
    }
}

/// Split a simple path into segments, or `None` if it contains anything
/// other than word characters, `$` and `.`.
pub(crate) fn parse_path(path: &str) -> Option<Vec<String>> {
    let valid = path
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.');
    valid.then(|| path.split('.').map(str::to_string).collect())
}
