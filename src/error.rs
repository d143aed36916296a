// src/error.rs

//! Error types for the deployment engine
//!
//! A single crate-wide `Error` enum keeps error handling uniform across the
//! engines. Most variants carry a rendered message; the variants that
//! downstream code needs to inspect (locks, conditions, exit codes,
//! cancellation) carry structured data instead.

use std::fmt;
use thiserror::Error;

use crate::model::{ConditionId, LockId};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while invoking a deployment.
#[derive(Error, Debug)]
pub enum Error {
    /// The deployment document contains invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A resource reference could not be resolved (unknown, undefined or
    /// cyclic).
    #[error("{0}")]
    Resolution(String),

    /// A condition could not be evaluated.
    #[error(transparent)]
    Condition(Box<ConditionError>),

    /// A flow could not run to completion.
    #[error("{0}")]
    Flow(String),

    /// A lock could not be acquired.
    #[error(transparent)]
    Lock(LockError),

    /// A package download failed.
    #[error("{0}")]
    Download(String),

    /// An archive extraction failed.
    #[error("{0}")]
    Extraction(String),

    /// A command could not be invoked.
    #[error("{0}")]
    Command(String),

    /// A command exited with a code that is interpreted as a failure.
    #[error("{}", format_exit_code(.code, .name, .description))]
    CommandExit {
        code: i32,
        name: Option<String>,
        description: Option<String>,
    },

    /// Expected application changes did not take effect.
    #[error("{0}")]
    AppChanges(String),

    /// An I/O failure outside of any more specific category.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An HTTP transport failure.
    #[error("http request failed: {0}")]
    Http(String),

    /// The invocation was cancelled.
    #[error("the operation was cancelled")]
    Cancelled,

    /// An event handler failed to record an event.
    #[error("{0}")]
    Handler(String),

    /// The host platform does not provide a required facility.
    #[error("unsupported on this host: {0}")]
    Unsupported(String),

    /// A join of several errors collected from continued actions.
    #[error("{}", format_multiple(.0))]
    Multiple(Vec<Error>),
}

impl Error {
    /// Joins the given errors into a single error.
    ///
    /// Returns `None` when the list is empty and unwraps singleton lists.
    pub fn join(mut errs: Vec<Error>) -> Option<Error> {
        match errs.len() {
            0 => None,
            1 => Some(errs.remove(0)),
            _ => Some(Error::Multiple(errs)),
        }
    }

    /// Returns true if the error is, or contains, a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Multiple(errs) => errs.iter().any(Error::is_cancelled),
            _ => false,
        }
    }
}

impl From<ConditionError> for Error {
    fn from(err: ConditionError) -> Self {
        Error::Condition(Box::new(err))
    }
}

impl From<LockError> for Error {
    fn from(err: LockError) -> Self {
        Error::Lock(err)
    }
}

fn format_multiple(errs: &[Error]) -> String {
    errs.iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_exit_code(code: &i32, name: &Option<String>, description: &Option<String>) -> String {
    let mut out = format!("exit status {code}");
    if let Some(name) = name {
        out.push_str(": ");
        out.push_str(name);
    }
    if let Some(description) = description {
        out.push_str(": ");
        out.push_str(description);
    }
    out
}

/// The element of a condition that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionElement {
    /// The condition itself.
    Itself,
    /// The indexed member of the condition's `any` list.
    Any(usize),
    /// The indexed member of the condition's `all` list.
    All(usize),
}

/// An error produced while evaluating or validating a condition.
///
/// It carries enough context to point at the failing subcondition within a
/// compound condition tree.
#[derive(Debug)]
pub struct ConditionError {
    pub id: ConditionId,
    pub label: String,
    pub condition_type: String,
    pub element: ConditionElement,
    pub source: Box<Error>,
}

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        let mut write_part = |f: &mut fmt::Formatter<'_>, part: &str| -> fmt::Result {
            if wrote {
                f.write_str(" - ")?;
            }
            wrote = true;
            f.write_str(part)
        };

        match (self.id.as_str(), self.label.as_str()) {
            ("", "") => {}
            (id, "") => write_part(f, id)?,
            ("", label) => write_part(f, label)?,
            (id, label) => write_part(f, &format!("{id} ({label})"))?,
        }

        match self.element {
            ConditionElement::Any(i) => write_part(f, &format!("Any [{i}]"))?,
            ConditionElement::All(i) => write_part(f, &format!("All [{i}]"))?,
            ConditionElement::Itself => {
                if !self.condition_type.is_empty() {
                    write_part(f, &self.condition_type)?;
                }
            }
        }

        write_part(f, &self.source.to_string())
    }
}

impl std::error::Error for ConditionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// An error produced when a lock cannot be acquired.
///
/// The configured conflict message, if any, becomes part of the rendered
/// error so that operators see the guidance from the deployment document.
#[derive(Debug, Clone)]
pub struct LockError {
    pub lock: LockId,
    pub conflict_message: String,
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflict_message.is_empty() {
            write!(f, "failed to acquire \"{}\" lock", self.lock)
        } else {
            write!(
                f,
                "failed to acquire \"{}\" lock: {}",
                self.lock, self.conflict_message
            )
        }
    }
}

impl std::error::Error for LockError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_empty() {
        assert!(Error::join(Vec::new()).is_none());
    }

    #[test]
    fn test_join_singleton_unwraps() {
        let err = Error::join(vec![Error::Cancelled]).unwrap();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_join_multiple_renders_all() {
        let err = Error::join(vec![
            Error::Download("transport failed".to_string()),
            Error::Cancelled,
        ])
        .unwrap();
        let message = err.to_string();
        assert!(message.contains("transport failed"));
        assert!(message.contains("cancelled"));
    }

    #[test]
    fn test_is_cancelled_through_join() {
        let err = Error::join(vec![
            Error::Download("transport failed".to_string()),
            Error::Cancelled,
        ])
        .unwrap();
        assert!(err.is_cancelled());
        assert!(!Error::Download("x".to_string()).is_cancelled());
    }

    #[test]
    fn test_lock_error_message() {
        let err = LockError {
            lock: "setup".into(),
            conflict_message: String::new(),
        };
        assert_eq!(err.to_string(), "failed to acquire \"setup\" lock");

        let err = LockError {
            lock: "setup".into(),
            conflict_message: "another deployment is running".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to acquire \"setup\" lock: another deployment is running"
        );
    }

    #[test]
    fn test_condition_error_path() {
        let inner = ConditionError {
            id: "inner".into(),
            label: String::new(),
            condition_type: "resource.mutex:exists".to_string(),
            element: ConditionElement::Itself,
            source: Box::new(Error::Resolution(
                "the \"m\" mutex is not defined in the deployment".to_string(),
            )),
        };
        let outer = ConditionError {
            id: "outer".into(),
            label: "Outer".to_string(),
            condition_type: String::new(),
            element: ConditionElement::All(1),
            source: Box::new(inner.into()),
        };
        let message = outer.to_string();
        assert!(message.starts_with("outer (Outer) - All [1]"));
        assert!(message.contains("inner"));
        assert!(message.contains("not defined"));
    }
}
