// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Context, Transaction, TransactionState};
use crate::{
    RejectReason,
    error::{TransactionError, TransactionResult},
    sentinel::{DummySentinel, Sentinel},
};
use std::{cell::Cell, fmt, rc::Rc};

/// Identifies a scope within its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

/// Options for [`TransactionScope::exit_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitOptions {
    /// Exit quietly, even if the scope is not the current one or has already been exited.
    pub sloppy: bool,
}

/// Controls which transaction is current.
///
/// Scopes form a stack: the most recently entered scope that has not been exited is the
/// current scope, and its transaction is the current transaction. A scope without a
/// transaction (see [`TransactionScope::committed`]) makes reads see committed state only.
///
/// Scopes should be exited in reverse order of entry. Exiting out of order still works, but is
/// logged as a warning unless the exit is sloppy. Dropping a scope exits it sloppily.
pub struct TransactionScope {
    ctx: Context,
    id: ScopeId,
    transaction: Option<Transaction>,
    is_root: bool,
    inside: Rc<Cell<bool>>,
}

impl fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionScope")
            .field("id", &self.id)
            .field("transaction", &self.transaction)
            .field("is_root", &self.is_root)
            .field("inside", &self.inside.get())
            .finish()
    }
}

impl TransactionScope {
    /// Enters a scope of `transaction`, or a committed scope when `None`.
    ///
    /// Fails if the transaction is already committed or rejected, and rejects it if another
    /// transaction has committed changes to a container it had touched.
    pub fn new(ctx: &Context, transaction: Option<&Transaction>) -> TransactionResult<Self> {
        let is_root = match transaction {
            Some(txn) if !txn.context().same(ctx) => {
                return Err(TransactionError::operation_invalid(
                    "transaction belongs to another context",
                ));
            }
            Some(txn) => txn.scope_enter()?,
            None => false,
        };
        let inside = Rc::new(Cell::new(true));
        let id = ctx.push_frame(
            transaction.map(|txn| Rc::clone(txn.data())),
            Rc::clone(&inside),
        );
        tracing::trace!(
            scope = %id,
            txn = ?transaction.map(Transaction::id),
            is_root,
            "scope entered"
        );
        Ok(Self {
            ctx: ctx.clone(),
            id,
            transaction: transaction.cloned(),
            is_root,
            inside,
        })
    }

    /// Enters a scope in which no transaction is current.
    pub fn committed(ctx: &Context) -> Self {
        let inside = Rc::new(Cell::new(true));
        let id = ctx.push_frame(None, Rc::clone(&inside));
        tracing::trace!(scope = %id, "committed scope entered");
        Self {
            ctx: ctx.clone(),
            id,
            transaction: None,
            is_root: false,
            inside,
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn transaction(&self) -> Option<Transaction> {
        self.transaction.clone()
    }

    /// Whether this is the first scope entered for its transaction.
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Whether the scope has not been exited yet.
    pub fn is_inside(&self) -> bool {
        self.inside.get()
    }

    /// Whether the scope is on top of the scope stack.
    pub fn is_current(&self) -> bool {
        self.inside.get() && self.ctx.current_scope() == Some(self.id)
    }

    /// Whether accepting this scope commits its transaction.
    pub fn can_commit(&self) -> bool {
        self.is_current() && self.is_root && self.transaction.is_some()
    }

    fn assert_inside_and_current(&self) -> TransactionResult<()> {
        if !self.inside.get() {
            return Err(TransactionError::operation_invalid(format!(
                "scope {} has already been exited",
                self.id
            )));
        }
        if !self.is_current() {
            return Err(TransactionError::operation_invalid(format!(
                "scope {} is not the current scope",
                self.id
            )));
        }
        Ok(())
    }

    /// Runs `f` within the scope and exits the scope afterwards.
    ///
    /// If `f` fails while the scope is still current, the transaction is rejected with the
    /// failure as reason, and the failure is returned. If `f` succeeds although the transaction
    /// has been rejected in the meantime, the rejection is returned.
    pub fn using<R>(self, f: impl FnOnce(&Self) -> TransactionResult<R>) -> TransactionResult<R> {
        let result = match f(&self) {
            Err(error) => {
                if self.is_current()
                    && let Some(txn) = &self.transaction
                    && !txn.state().is_terminal()
                {
                    let _ = txn.reject_error(Some(RejectReason::from(error.clone())));
                }
                Err(error)
            }
            Ok(value) => match &self.transaction {
                Some(txn) if txn.state() == TransactionState::Rejected => Err(
                    TransactionError::rejected(txn.error().unwrap_or(RejectReason::Cancelled)),
                ),
                _ => Ok(value),
            },
        };
        self.dispose();
        result
    }

    /// Accepts the scope.
    ///
    /// The root scope commits its transaction; any other scope just exits.
    pub fn accept(&self) -> TransactionResult<()> {
        self.accept_with(&mut DummySentinel)
    }

    /// Like [`accept`](Self::accept), letting `sentinel` observe and veto every change before
    /// it is applied.
    pub fn accept_with<S>(&self, sentinel: &mut S) -> TransactionResult<()>
    where
        S: Sentinel,
    {
        self.assert_inside_and_current()?;
        match &self.transaction {
            Some(txn) if self.is_root => {
                let result = txn.execute(sentinel);
                self.exit();
                result
            }
            _ => {
                self.exit_with(ExitOptions { sloppy: true });
                Ok(())
            }
        }
    }

    /// Runs the will-commit validators of the transaction without committing.
    pub fn accept_will(&self) -> TransactionResult<()> {
        self.assert_inside_and_current()?;
        match &self.transaction {
            Some(txn) => txn.execute_will(),
            None => Ok(()),
        }
    }

    /// Rejects the transaction and exits the scope.
    ///
    /// This always returns the rejection error.
    pub fn reject(&self, reason: Option<RejectReason>) -> TransactionResult<()> {
        self.assert_inside_and_current()?;
        let error = match &self.transaction {
            Some(txn) => txn.reject_error(reason),
            None => TransactionError::rejected(reason.unwrap_or(RejectReason::Cancelled)),
        };
        self.exit();
        Err(error)
    }

    pub fn exit(&self) {
        self.exit_with(ExitOptions::default());
    }

    /// Exits the scope, removing it from the scope stack.
    pub fn exit_with(&self, options: ExitOptions) {
        if !options.sloppy {
            if !self.inside.get() {
                tracing::warn!(scope = %self.id, "exiting a scope that has already been exited");
            } else if !self.is_current() {
                tracing::warn!(scope = %self.id, "exiting a scope that is not the current scope");
            }
        }
        if self.inside.replace(false) {
            if let Some(txn) = &self.transaction {
                txn.scope_exit();
            }
            self.ctx.remove_frame(self.id);
            tracing::trace!(scope = %self.id, "scope exited");
        }
    }

    /// Exits sloppily. Safe to call any number of times.
    pub fn dispose(&self) {
        self.exit_with(ExitOptions { sloppy: true });
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        self.dispose();
    }
}
