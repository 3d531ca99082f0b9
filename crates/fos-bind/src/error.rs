//! Error types
//!
//! Everything a running application reports goes through [`BindingError`]
//! wrapped in a [`Diagnostic`]. Registration and start-up misuse get their
//! own enums because they are returned to the caller instead.

use fos_dom::NodeId;

/// Recoverable runtime errors, reported through the diagnostic channel
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindingError {
    #[error("Invalid action descriptor `{descriptor}`: {reason}")]
    InvalidActionSyntax { descriptor: String, reason: String },

    #[error("Invalid value for `{attribute}` ({raw:?}): {reason}")]
    ValueDecode { attribute: String, raw: String, reason: String },

    #[error("Missing target element \"{name}\" for \"{identifier}\" controller")]
    MissingTarget { identifier: String, name: String },

    #[error("Target \"{name}\" is not declared by \"{identifier}\" controller")]
    UndeclaredTarget { identifier: String, name: String },

    #[error("Value \"{key}\" is not declared by \"{identifier}\" controller")]
    UndeclaredValue { identifier: String, key: String },

    #[error("Class \"{name}\" is not declared by \"{identifier}\" controller")]
    UndeclaredClass { identifier: String, name: String },

    #[error("Value \"{key}\" of \"{identifier}\" expects {expected}")]
    ValueTypeMismatch { identifier: String, key: String, expected: &'static str },

    #[error("Value \"{key}\" of \"{identifier}\" must be a finite number")]
    NonFiniteNumber { identifier: String, key: String },

    #[error("Action references undefined method \"{method}\" on \"{identifier}\" controller")]
    UnknownMethod { identifier: String, method: String },

    #[error("Error in {hook} hook of \"{identifier}\" controller: {message}")]
    LifecycleHook { identifier: String, hook: &'static str, message: String },

    #[error("Error invoking action \"{identifier}#{method}\": {message}")]
    ActionHandler { identifier: String, method: String, message: String },
}

impl BindingError {
    /// Severity the error is reported with
    pub fn severity(&self) -> Severity {
        match self {
            Self::InvalidActionSyntax { .. } | Self::ValueDecode { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A reported error together with where it happened
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub element: Option<NodeId>,
    pub error: BindingError,
}

/// Diagnostic queue drained by the host
#[derive(Debug, Default)]
pub(crate) struct Reporter {
    queue: Vec<Diagnostic>,
}

impl Reporter {
    pub(crate) fn report(&mut self, element: Option<NodeId>, error: BindingError) {
        let severity = error.severity();
        match severity {
            Severity::Warning => tracing::warn!(?element, "{}", error),
            Severity::Error => tracing::error!(?element, "{}", error),
        }
        self.queue.push(Diagnostic { severity, element, error });
    }

    pub(crate) fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.queue)
    }
}

/// Errors detected while registering a behavior
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Invalid controller identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Invalid {kind} name {name:?}")]
    InvalidName { kind: &'static str, name: String },

    #[error("Duplicate {kind} declaration {name:?}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Default for value {key:?} is not a {expected}")]
    DefaultTypeMismatch { key: String, expected: &'static str },
}

/// Errors from application start-up
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplicationError {
    #[error("Application already started")]
    AlreadyStarted,

    #[error("Root node {0:?} is not connected to the document")]
    RootNotConnected(NodeId),
}
