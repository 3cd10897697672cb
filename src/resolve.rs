// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Ambient value resolution.
//!
//! Reads inside a transaction see that transaction's uncommitted changes; reads outside of one
//! (or inside a committed scope) see committed state only. These functions make the fallback
//! explicit: they take the store and the transaction to consult, if any.

use crate::{
    ContainerId, Reference, Value,
    changeset::Changeset,
    error::TransactionResult,
    store::Store,
    transaction::TxnData,
};

/// The ambient value of `property`: the transaction's pending value for it, or the committed
/// value.
pub(crate) fn resolve_value(
    store: &Store,
    container: ContainerId,
    property: &str,
    txn: Option<&TxnData>,
) -> TransactionResult<Value> {
    if let Some(Changeset::Complex(changeset)) = txn.and_then(|t| t.changeset(container))
        && let Some(change) = changeset.get_change(property)
    {
        return Ok(change.value().clone());
    }
    store.value(container, property)
}

/// The ambient elements of a list.
pub(crate) fn resolve_elements(
    store: &Store,
    list: ContainerId,
    txn: Option<&TxnData>,
) -> TransactionResult<Vec<Value>> {
    let (_, committed) = store.list(list)?;
    match txn.and_then(|t| t.changeset(list)) {
        Some(Changeset::List(changeset)) => Ok(changeset.elements().to_vec()),
        _ => Ok(committed.to_vec()),
    }
}

/// The ambient references held on `element`.
pub(crate) fn resolve_references(
    store: &Store,
    element: ContainerId,
    txn: Option<&TxnData>,
) -> Vec<Reference> {
    let committed = store.references().get(element);
    match txn {
        Some(txn) => txn.references().resolve(element, committed),
        None => committed.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComplexType, ValueKind, transaction::TransactionId};
    use std::rc::Rc;

    #[test]
    fn falls_back_to_committed_state() {
        let mut store = Store::default();
        let ty = Rc::new(ComplexType::new("Derived").property("x", ValueKind::Simple));
        let id = store.insert_complex(ty, [("x".into(), "0".into())]).unwrap();

        assert_eq!(resolve_value(&store, id, "x", None).unwrap(), "0".into());

        let mut txn = TxnData::new(TransactionId::new(1));
        assert_eq!(resolve_value(&store, id, "x", Some(&txn)).unwrap(), "0".into());

        txn.record_replace(&store, id, "x", "1".into()).unwrap();
        assert_eq!(resolve_value(&store, id, "x", Some(&txn)).unwrap(), "1".into());
        assert_eq!(resolve_value(&store, id, "x", None).unwrap(), "0".into());
    }

    #[test]
    fn list_reads_use_the_projection() {
        let mut store = Store::default();
        let list = store
            .insert_list(ValueKind::Simple, vec![1.into(), 2.into()])
            .unwrap();
        let mut txn = TxnData::new(TransactionId::new(1));
        txn.record_list_change(&store, list, |_, _| {
            Ok(Some(crate::change::ListChange::Clear))
        })
        .unwrap();

        assert!(resolve_elements(&store, list, Some(&txn)).unwrap().is_empty());
        assert_eq!(resolve_elements(&store, list, None).unwrap().len(), 2);
    }
}
