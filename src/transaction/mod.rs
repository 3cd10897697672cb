// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Ambient transactions.
//!
//! A [`Transaction`] collects the changes made to containers while it is the *current*
//! transaction of a [`Context`]. Which transaction is current is controlled by
//! [`TransactionScope`]s: entering a scope pushes it on the context's scope stack, exiting it pops
//! it again. Reads through the context see the uncommitted changes of the current transaction,
//! reads outside of any transaction see committed state only.
//!
//! # Example
//!
//! ```
//! use ambit::{ComplexType, Context, ValueKind};
//! use std::rc::Rc;
//!
//! let ctx = Context::new();
//! let person = Rc::new(ComplexType::new("Person").property("name", ValueKind::Simple));
//! let alice = ctx.create_complex(&person, [("name", "Alice")])?;
//!
//! let scope = ctx.enter()?;
//! ctx.set(alice, "name", "Alicia")?;
//!
//! // the current transaction sees its own change...
//! assert_eq!(ctx.get(alice, "name")?, "Alicia".into());
//! // ...committed state does not, until the root scope accepts
//! assert_eq!(ctx.committed_value(alice, "name")?, "Alice".into());
//!
//! scope.accept()?;
//! assert_eq!(ctx.committed_value(alice, "name")?, "Alicia".into());
//! # Ok::<(), ambit::TransactionError>(())
//! ```
//!
//! # Nesting
//!
//! Entering a scope while a transaction is current joins that transaction. Only the *root* scope,
//! the one that created the transaction, can commit it; accepting a nested scope simply exits it.
//! Rejecting at any level rejects the whole transaction.
//!
//! # Lifecycle
//!
//! ```text
//! Open ──accept (root)──> Executing ──> Committed
//!   │                         │
//!   └──────reject─────────────┴──────> Rejected
//! ```
//!
//! Committed and rejected transactions are final. Dropping a scope without accepting it leaves
//! its transaction open but no longer current, so none of its changes reach committed state.
//!
//! # Optimistic concurrency
//!
//! Several transactions may be open at once, as long as only one is current at any time. Every
//! changeset remembers the committed version of its container when it was created. If another
//! transaction commits a change to that container in the meantime, the transaction is rejected
//! with [`RejectReason::Conflict`] the next time one of its scopes is entered, or at the latest
//! when it is about to be committed.

mod context;
pub use context::Context;
mod data;
pub(crate) use data::TxnData;
mod scope;
pub use scope::{ExitOptions, ScopeId, TransactionScope};

use crate::{
    ContainerId, RejectReason,
    change::Change,
    changeset::{ChangeKey, Changeset},
    error::{TransactionError, TransactionResult},
    sentinel::Sentinel,
};
use std::{cell::RefCell, fmt, mem, rc::Rc};

/// Identifies a transaction within its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Changes can be recorded.
    Open,
    /// The commit protocol is running.
    Executing,
    /// All changes have been applied to committed state.
    Committed,
    /// The transaction was cancelled and its changes discarded.
    Rejected,
}

impl TransactionState {
    /// Returns `true` for the final states.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Rejected)
    }
}

/// A handle to a transaction.
///
/// Handles are cheap to clone and compare equal when they refer to the same transaction.
#[derive(Clone)]
pub struct Transaction {
    ctx: Context,
    data: Rc<RefCell<TxnData>>,
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for Transaction {}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.borrow();
        f.debug_struct("Transaction")
            .field("id", &data.id)
            .field("state", &data.state)
            .field("changesets", &data.changesets.len())
            .finish()
    }
}

impl Transaction {
    /// Creates a new, open transaction. It becomes current once one of its scopes is entered.
    pub fn new(ctx: &Context) -> Self {
        let id = ctx.next_transaction_id();
        Self {
            ctx: ctx.clone(),
            data: Rc::new(RefCell::new(TxnData::new(id))),
        }
    }

    pub(crate) fn from_data(ctx: Context, data: Rc<RefCell<TxnData>>) -> Self {
        Self { ctx, data }
    }

    pub(crate) fn data(&self) -> &Rc<RefCell<TxnData>> {
        &self.data
    }

    /// Enters a scope of the current transaction, or of a new transaction if there is none.
    pub fn enter(ctx: &Context) -> TransactionResult<TransactionScope> {
        let txn = ctx
            .current_transaction()
            .unwrap_or_else(|| Transaction::new(ctx));
        TransactionScope::new(ctx, Some(&txn))
    }

    /// Enters a new, nested scope of this transaction.
    pub fn enter_scope(&self) -> TransactionResult<TransactionScope> {
        TransactionScope::new(&self.ctx, Some(self))
    }

    pub fn id(&self) -> TransactionId {
        self.data.borrow().id
    }

    pub fn state(&self) -> TransactionState {
        self.data.borrow().state
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Whether this is the current transaction of its context.
    pub fn is_current(&self) -> bool {
        self.ctx.current_transaction().as_ref() == Some(self)
    }

    /// Number of scopes of this transaction that have not been exited yet.
    pub fn scope_count(&self) -> usize {
        self.data.borrow().scope_count
    }

    /// The reason of the rejection, once rejected.
    pub fn error(&self) -> Option<RejectReason> {
        self.data.borrow().error.clone()
    }

    /// Registers a changeset for `container`, if there is none yet, and returns a snapshot of
    /// it.
    ///
    /// Registration fixes the container's position in the commit order. The snapshot does not
    /// track later changes; see [`Changeset`].
    pub fn ensure_changeset(&self, container: ContainerId) -> TransactionResult<Changeset> {
        let inner = self.ctx.inner().borrow();
        let mut data = self.data.borrow_mut();
        data.ensure_open()?;
        let changeset = data.ensure_changeset(&inner.store, container)?.clone();
        Ok(changeset)
    }

    /// A snapshot of the changeset of `container`, if this transaction has touched it.
    pub fn changeset(&self, container: ContainerId) -> Option<Changeset> {
        self.data.borrow().changeset(container).cloned()
    }

    /// Number of changesets, including emptied ones.
    pub fn changeset_count(&self) -> usize {
        self.data.borrow().changesets.len()
    }

    /// Containers touched by this transaction, in registration order.
    pub fn containers(&self) -> Vec<ContainerId> {
        self.data.borrow().changesets.keys().copied().collect()
    }

    pub fn get_change(&self, container: ContainerId, key: impl Into<ChangeKey>) -> Option<Change> {
        self.data
            .borrow()
            .changeset(container)
            .and_then(|changeset| changeset.get_change(&key.into()))
    }

    /// Discards every pending change of `container`.
    ///
    /// Ambient reads revert to committed values and speculative references are reversed. The
    /// changeset itself stays registered, but empty.
    pub fn clear_changes(&self, container: ContainerId) -> TransactionResult<()> {
        let mut data = self.data.borrow_mut();
        data.ensure_open()?;
        data.clear_changes(container);
        Ok(())
    }

    /// Registers a validator that runs before the transaction commits.
    ///
    /// An error vetoes the commit and rejects the transaction with that reason.
    pub fn add_will_commit<F>(&self, validator: F)
    where
        F: FnMut(&Transaction) -> Result<(), RejectReason> + 'static,
    {
        self.data.borrow_mut().validators.push(Box::new(validator));
    }

    /// Rejects the transaction.
    ///
    /// This always returns an error: the new rejection, or the original one if the transaction
    /// had already been rejected. Rejecting a committed transaction is an invalid operation.
    pub fn reject(&self, reason: Option<RejectReason>) -> TransactionResult<()> {
        Err(self.reject_error(reason))
    }

    pub(crate) fn reject_error(&self, reason: Option<RejectReason>) -> TransactionError {
        let mut data = self.data.borrow_mut();
        match data.state {
            TransactionState::Committed => {
                TransactionError::operation_invalid("cannot reject a committed transaction")
            }
            TransactionState::Rejected => TransactionError::rejected(data.rejection()),
            TransactionState::Open | TransactionState::Executing => {
                let reason = reason.unwrap_or(RejectReason::Cancelled);
                tracing::debug!(
                    txn = %data.id,
                    changesets = data.changesets.len(),
                    %reason,
                    "transaction rejected"
                );
                data.mark_rejected(reason.clone());
                TransactionError::rejected(reason)
            }
        }
    }

    /// Registers a new scope. Returns whether the scope is the root scope.
    pub(crate) fn scope_enter(&self) -> TransactionResult<bool> {
        let inner = self.ctx.inner().borrow();
        let mut data = self.data.borrow_mut();
        if data.state.is_terminal() {
            return Err(TransactionError::operation_invalid(format!(
                "transaction {} is already {}",
                data.id,
                if data.state == TransactionState::Committed {
                    "committed"
                } else {
                    "rejected"
                }
            )));
        }
        if let Some(container) = data.conflict(&inner.store) {
            tracing::warn!(txn = %data.id, %container, "conflict detected on scope entry");
            let reason = RejectReason::Conflict { container };
            data.mark_rejected(reason.clone());
            return Err(TransactionError::rejected(reason));
        }
        let is_root = data.scope_count == 0;
        data.scope_count += 1;
        Ok(is_root)
    }

    pub(crate) fn scope_exit(&self) {
        let mut data = self.data.borrow_mut();
        data.scope_count = data.scope_count.saturating_sub(1);
    }

    /// Runs the will-commit validators and leaves the transaction open.
    pub(crate) fn execute_will(&self) -> TransactionResult<()> {
        self.run_validators()?;
        self.data.borrow_mut().state = TransactionState::Open;
        Ok(())
    }

    /// Runs the will-commit validators. On success the transaction stays `Executing`.
    ///
    /// Validators are called without any borrow of the transaction held, so they are free to
    /// read ambient values or to reject the transaction themselves.
    fn run_validators(&self) -> TransactionResult<()> {
        {
            let mut data = self.data.borrow_mut();
            data.ensure_open()?;
            data.state = TransactionState::Executing;
        }
        let mut validators = mem::take(&mut self.data.borrow_mut().validators);
        let mut veto = None;
        for validator in &mut validators {
            if let Err(reason) = validator(self) {
                veto = Some(reason);
                break;
            }
        }

        let mut data = self.data.borrow_mut();
        if data.state == TransactionState::Rejected {
            return Err(TransactionError::rejected(data.rejection()));
        }
        // keep validators registered by validators
        validators.append(&mut data.validators);
        data.validators = validators;
        drop(data);

        match veto {
            Some(reason) => self.reject(Some(reason)),
            None => Ok(()),
        }
    }

    /// Commits the transaction: validate, observe, re-check for conflicts, apply.
    ///
    /// The transaction stays `Executing` from the validators until it is committed, so nothing
    /// can be recorded after the sentinel has seen the changes.
    pub(crate) fn execute<S>(&self, sentinel: &mut S) -> TransactionResult<()>
    where
        S: Sentinel,
    {
        self.run_validators()?;

        let changes: Vec<(ContainerId, Change)> = self
            .data
            .borrow()
            .changesets
            .values()
            .flat_map(|changeset| {
                let container = changeset.container();
                changeset.changes().into_iter().map(move |c| (container, c))
            })
            .collect();
        for (container, change) in &changes {
            if let Err(error) = sentinel.will_apply(*container, change) {
                return self.reject(Some(error.into()));
            }
        }
        {
            let data = self.data.borrow();
            if data.state == TransactionState::Rejected {
                return Err(TransactionError::rejected(data.rejection()));
            }
        }

        let conflict = {
            let inner = self.ctx.inner().borrow();
            self.data.borrow().conflict(&inner.store)
        };
        if let Some(container) = conflict {
            tracing::warn!(txn = %self.id(), %container, "conflict detected on commit");
            return self.reject(Some(RejectReason::Conflict { container }));
        }

        let (id, changesets, references) = {
            let mut data = self.data.borrow_mut();
            (
                data.id,
                mem::take(&mut data.changesets),
                mem::take(&mut data.references),
            )
        };

        let mut inner = self.ctx.inner().borrow_mut();
        let store = &mut inner.store;
        let version = store.next_commit();
        let mut applied = 0;
        for changeset in changesets.values().filter(|c| !c.is_empty()) {
            let state = store.container_mut(changeset.container())?;
            changeset.apply(&mut state.data)?;
            state.version = version;
            applied += 1;
        }
        if !references.is_empty() {
            store.references_mut().apply(references);
        }
        drop(inner);

        self.data.borrow_mut().state = TransactionState::Committed;
        tracing::debug!(txn = %id, changesets = applied, version, "transaction committed");
        Ok(())
    }
}
