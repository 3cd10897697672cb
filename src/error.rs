// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Error types.
//!
//! Two conditions describe the transaction lifecycle itself:
//!
//! - [`TransactionError::OperationInvalid`] is a local programming error, such as acting on a
//!   scope that has already been exited or that is not the current scope. It is reported at the
//!   point of misuse and never retried.
//! - [`TransactionError::Rejected`] is the cancellation of a transaction, either explicit (via
//!   [`TransactionScope::reject`](crate::TransactionScope::reject)) or automatic (a concurrency
//!   conflict or a failed validation). It carries the original [`RejectReason`].
//!
//! The remaining variants are raised by the typed-container contract when a write does not fit
//! the declared shape of its target.

use crate::{ContainerId, types::ValueKind};
use std::{convert::Infallible, error::Error, rc::Rc};
use thiserror::Error;

/// Result type for transaction and container operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Errors surfaced by scopes, transactions and typed containers.
#[derive(Debug, Clone, Error)]
pub enum TransactionError {
    /// The caller violated the scope or transaction lifecycle.
    #[error("invalid operation: {message}")]
    OperationInvalid {
        /// Description of the misuse.
        message: String,
    },

    /// The transaction has been rejected.
    #[error("transaction rejected: {reason}")]
    Rejected {
        /// Why the transaction was rejected.
        #[source]
        reason: RejectReason,
    },

    /// No container with the given identifier exists in the context.
    #[error("container {container} not found")]
    ContainerNotFound {
        /// The missing container.
        container: ContainerId,
    },

    /// The container's type does not declare the property.
    #[error("property `{property}` is not declared by type `{type_name}`")]
    PropertyNotFound {
        /// Name of the declaring type.
        type_name: String,
        /// The undeclared property.
        property: String,
    },

    /// The value does not match the declared value kind.
    #[error("`{target}` expects {expected} values")]
    TypeMismatch {
        /// Property name, or the list container for element writes.
        target: String,
        /// The declared kind.
        expected: ValueKind,
    },

    /// A list index is outside of the list bounds.
    #[error("index {index} out of range for list {container} of length {len}")]
    IndexOutOfRange {
        /// The list container.
        container: ContainerId,
        /// The offending index.
        index: usize,
        /// Ambient length of the list.
        len: usize,
    },

    /// The element is not contained in the list.
    #[error("element not found in list {container}")]
    ElementNotFound {
        /// The list container.
        container: ContainerId,
    },

    /// The container is of the wrong kind for the operation.
    #[error("container {container} is not a {expected}")]
    WrongContainerKind {
        /// The container operated on.
        container: ContainerId,
        /// The kind the operation requires (`complex` or `list`).
        expected: &'static str,
    },
}

impl TransactionError {
    /// Creates an invalid operation error.
    pub fn operation_invalid(message: impl Into<String>) -> Self {
        Self::OperationInvalid {
            message: message.into(),
        }
    }

    /// Creates a rejection error.
    pub fn rejected(reason: RejectReason) -> Self {
        Self::Rejected { reason }
    }

    /// Returns `true` for [`TransactionError::OperationInvalid`].
    pub fn is_operation_invalid(&self) -> bool {
        matches!(self, Self::OperationInvalid { .. })
    }

    /// Returns the rejection reason, if this is a [`TransactionError::Rejected`].
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Rejected { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Why a transaction was rejected.
#[derive(Debug, Clone, Error)]
pub enum RejectReason {
    /// Rejected without a specific reason.
    #[error("transaction was cancelled")]
    Cancelled,

    /// Rejected with a free-form message.
    #[error("{0}")]
    Message(String),

    /// Another transaction committed a change to a container this transaction had touched.
    #[error("container {container} was changed by a concurrently committed transaction")]
    Conflict {
        /// The container whose committed state moved.
        container: ContainerId,
    },

    /// Rejected because of an arbitrary error, for example a failed validation.
    #[error("{0}")]
    Error(Rc<dyn Error>),
}

impl RejectReason {
    /// Creates a reason from a free-form message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wraps an arbitrary error.
    pub fn error(error: impl Error + 'static) -> Self {
        Self::Error(Rc::new(error))
    }

    /// Returns `true` if the reason is a concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<TransactionError> for RejectReason {
    fn from(error: TransactionError) -> Self {
        match error {
            // unwrap nested rejections so the original reason survives
            TransactionError::Rejected { reason } => reason,
            other => Self::Error(Rc::new(other)),
        }
    }
}

impl From<Infallible> for RejectReason {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_rejection_keeps_original_reason() {
        let inner = TransactionError::rejected(RejectReason::message("boom"));
        let reason = RejectReason::from(inner);
        assert!(matches!(reason, RejectReason::Message(ref m) if m == "boom"));
    }

    #[test]
    fn other_errors_are_wrapped() {
        let reason = RejectReason::from(TransactionError::operation_invalid("nope"));
        assert_eq!(reason.to_string(), "invalid operation: nope");
    }

    #[test]
    fn rejected_display_includes_reason() {
        let err = TransactionError::rejected(RejectReason::Conflict {
            container: ContainerId::new(7),
        });
        assert_eq!(
            err.to_string(),
            "transaction rejected: container #7 was changed by a concurrently committed transaction"
        );
        assert!(err.reject_reason().is_some_and(RejectReason::is_conflict));
    }
}
