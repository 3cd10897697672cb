// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Observe and validate changes before they are committed.
//!
//! Sentinels are types that can be used to inspect the changes a transaction is about to apply.
//! They are useful for validating that the changes conform to a schema, or simply to observe the
//! changes for any other purpose (for example, logging, metrics, etc).
//!
//! A sentinel is passed to [`TransactionScope::accept_with`](crate::TransactionScope::accept_with).
//! It sees every change of the transaction, in the order in which the changes are applied, after
//! the will-commit validators have run and before anything is applied. An error from the
//! sentinel rejects the transaction, leaving committed state untouched.
//!
//! If `Error = Infallible`, the Sentinel is referred to as an Observer. If it can produce an
//! error, it may be referred to as a Validator.

use crate::{ContainerId, RejectReason, change::Change};
use std::convert::Infallible;

/// Observes and optionally stops a change from being committed.
pub trait Sentinel {
    /// The error that vetoes the commit. It becomes the reason of the rejection.
    type Error: Into<RejectReason>;

    /// Observe and validate a change to `container`.
    #[expect(unused_variables)]
    fn will_apply(&mut self, container: ContainerId, change: &Change) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A Sentinel that does nothing.
///
/// This is what [`TransactionScope::accept`](crate::TransactionScope::accept) uses. Using it
/// helps the compiler optimise the observation loop away.
pub struct DummySentinel;

impl Sentinel for DummySentinel {
    type Error = Infallible;
}
