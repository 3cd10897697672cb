// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Mutable state of a single transaction.
//!
//! [`TxnData`] is plain data: changesets, speculative references and lifecycle state. It never
//! touches the store mutably; the commit protocol in [`Transaction`](super::Transaction) is the
//! only place where its changes become committed state.

use super::{Transaction, TransactionId, TransactionState};
use crate::{
    ContainerId, OrderedMap, RejectReason, Value, ValueKind,
    change::ListChange,
    changeset::Changeset,
    error::{TransactionError, TransactionResult},
    references::ReferenceDelta,
    resolve::resolve_value,
    store::Store,
};
use indexmap::map::Entry;
use std::fmt;

/// A will-commit validator; returning an error vetoes the commit.
pub(crate) type WillCommit = Box<dyn FnMut(&Transaction) -> Result<(), RejectReason>>;

pub(crate) struct TxnData {
    pub(crate) id: TransactionId,
    pub(crate) state: TransactionState,
    pub(crate) scope_count: usize,
    pub(crate) changesets: OrderedMap<ContainerId, Changeset>,
    pub(crate) references: ReferenceDelta,
    pub(crate) error: Option<RejectReason>,
    pub(crate) validators: Vec<WillCommit>,
}

impl fmt::Debug for TxnData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxnData")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("scope_count", &self.scope_count)
            .field("changesets", &self.changesets)
            .field("error", &self.error)
            .field("validators", &self.validators.len())
            .finish_non_exhaustive()
    }
}

impl TxnData {
    pub(crate) fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TransactionState::Open,
            scope_count: 0,
            changesets: crate::create_ordered_map(),
            references: ReferenceDelta::default(),
            error: None,
            validators: Vec::new(),
        }
    }

    pub(crate) fn changeset(&self, container: ContainerId) -> Option<&Changeset> {
        self.changesets.get(&container)
    }

    pub(crate) fn references(&self) -> &ReferenceDelta {
        &self.references
    }

    /// The error to report for an attempt to record changes, if any.
    pub(crate) fn ensure_open(&self) -> TransactionResult<()> {
        match self.state {
            TransactionState::Open => Ok(()),
            TransactionState::Executing => Err(TransactionError::operation_invalid(
                "transaction is executing",
            )),
            TransactionState::Committed => Err(TransactionError::operation_invalid(
                "transaction is already committed",
            )),
            TransactionState::Rejected => Err(TransactionError::rejected(self.rejection())),
        }
    }

    pub(crate) fn rejection(&self) -> RejectReason {
        self.error.clone().unwrap_or(RejectReason::Cancelled)
    }

    /// The first container whose committed state moved since this transaction touched it.
    pub(crate) fn conflict(&self, store: &Store) -> Option<ContainerId> {
        // a vanished container counts as a conflict too
        self.changesets
            .values()
            .find(|changeset| changeset.is_stale(store).unwrap_or(true))
            .map(Changeset::container)
    }

    /// Moves the transaction into the rejected state, dropping all of its changes.
    pub(crate) fn mark_rejected(&mut self, reason: RejectReason) {
        self.state = TransactionState::Rejected;
        self.error = Some(reason);
        self.changesets.clear();
        self.references = ReferenceDelta::default();
        self.validators.clear();
    }

    pub(crate) fn ensure_changeset(
        &mut self,
        store: &Store,
        container: ContainerId,
    ) -> TransactionResult<&mut Changeset> {
        Ok(match self.changesets.entry(container) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(Changeset::for_container(store, container)?),
        })
    }

    /// Records a write of `value` to `property`.
    ///
    /// Writing the ambient value again is a no-op and creates no changeset.
    pub(crate) fn record_replace(
        &mut self,
        store: &Store,
        container: ContainerId,
        property: &str,
        value: Value,
    ) -> TransactionResult<()> {
        self.ensure_open()?;
        let (ty, _) = store.complex(container)?;
        ty.check(property, &value)?;
        store.check_element(&value)?;

        if resolve_value(store, container, property, Some(self))? == value {
            return Ok(());
        }
        let committed = store.value(container, property)?;

        self.ensure_changeset(store, container)?;
        let Self {
            changesets,
            references,
            ..
        } = self;
        match changesets.get_mut(&container) {
            Some(Changeset::Complex(changeset)) => {
                changeset.set_replace(property, committed, value, references);
                Ok(())
            }
            _ => Err(TransactionError::WrongContainerKind {
                container,
                expected: "complex",
            }),
        }
    }

    /// Records a list edit.
    ///
    /// `build` sees the list's element kind and its ambient elements, and returns the change to
    /// record, or `None` when the edit would not change anything.
    pub(crate) fn record_list_change(
        &mut self,
        store: &Store,
        list: ContainerId,
        build: impl FnOnce(ValueKind, &[Value]) -> TransactionResult<Option<ListChange>>,
    ) -> TransactionResult<()> {
        self.ensure_open()?;
        let (kind, committed) = store.list(list)?;
        let change = match self.changesets.get(&list) {
            Some(Changeset::List(changeset)) => build(kind, changeset.elements())?,
            _ => build(kind, committed)?,
        };
        let Some(change) = change else {
            return Ok(());
        };

        self.ensure_changeset(store, list)?;
        let Self {
            changesets,
            references,
            ..
        } = self;
        match changesets.get_mut(&list) {
            Some(Changeset::List(changeset)) => {
                changeset.push(change, references);
                Ok(())
            }
            _ => Err(TransactionError::WrongContainerKind {
                container: list,
                expected: "list",
            }),
        }
    }

    pub(crate) fn clear_changes(&mut self, container: ContainerId) {
        let Self {
            changesets,
            references,
            ..
        } = self;
        if let Some(changeset) = changesets.get_mut(&container) {
            changeset.clear_changes(references);
        }
    }
}
