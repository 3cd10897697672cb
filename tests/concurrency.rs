//! Tests for optimistic concurrency between transactions of one context.
//!
//! Only one transaction is current at a time, but several may be open. A transaction whose
//! containers were changed by another commit is rejected with a conflict.

use ambit::{
    Context, RejectReason, Transaction, TransactionScope, TransactionState, ValueKind,
    complex_type, props,
};

/// Opens a transaction, lets `f` record changes in it, and leaves it open but not current.
fn open_transaction(ctx: &Context, f: impl FnOnce()) -> Transaction {
    let scope = ctx.enter().unwrap();
    f();
    let txn = scope.transaction().unwrap();
    scope.exit();
    txn
}

#[test]
fn conflict_on_scope_entry() {
    let ctx = Context::new();
    let ty = complex_type!("Derived" { "x": Simple });
    let id = ctx.create_complex(&ty, props! { "x" => "0" }).unwrap();

    let first = open_transaction(&ctx, || ctx.set(id, "x", "first").unwrap());
    ctx.set(id, "x", "second").unwrap();

    let err = TransactionScope::new(&ctx, Some(&first)).unwrap_err();
    assert!(matches!(
        err.reject_reason(),
        Some(RejectReason::Conflict { container }) if *container == id
    ));
    assert_eq!(first.state(), TransactionState::Rejected);
    assert_eq!(ctx.scope_depth(), 0);
    assert_eq!(ctx.committed_value(id, "x").unwrap(), "second".into());
}

#[test]
fn conflict_on_commit() {
    let ctx = Context::new();
    let ty = complex_type!("Derived" { "x": Simple });
    let id = ctx.create_complex(&ty, props! { "x" => "0" }).unwrap();

    let scope = ctx.enter().unwrap();
    ctx.set(id, "x", "outer").unwrap();
    {
        // hide the outer transaction and commit a competing change
        let _committed = TransactionScope::committed(&ctx);
        ctx.set(id, "x", "competing").unwrap();
    }

    let txn = scope.transaction().unwrap();
    let err = scope.accept().unwrap_err();
    assert!(err.reject_reason().is_some_and(RejectReason::is_conflict));
    assert_eq!(txn.state(), TransactionState::Rejected);
    assert_eq!(ctx.committed_value(id, "x").unwrap(), "competing".into());
}

#[test]
fn disjoint_transactions_both_commit() {
    let ctx = Context::new();
    let ty = complex_type!("Derived" { "x": Simple });
    let a = ctx.create_complex(&ty, props! {}).unwrap();
    let b = ctx.create_complex(&ty, props! {}).unwrap();

    let first = open_transaction(&ctx, || ctx.set(a, "x", "a").unwrap());
    let second = open_transaction(&ctx, || ctx.set(b, "x", "b").unwrap());

    second.enter_scope().unwrap().accept().unwrap();
    first.enter_scope().unwrap().accept().unwrap();

    assert_eq!(ctx.committed_value(a, "x").unwrap(), "a".into());
    assert_eq!(ctx.committed_value(b, "x").unwrap(), "b".into());
    assert_eq!(ctx.commit_count(), 2);
}

#[test]
fn list_edits_conflict_too() {
    let ctx = Context::new();
    let list = ctx.create_list(ValueKind::Simple, [1, 2, 3]).unwrap();

    let first = open_transaction(&ctx, || ctx.remove_at(list, 0).unwrap());
    ctx.clear(list).unwrap();

    assert!(first.enter_scope().is_err());
    assert!(ctx.elements(list).unwrap().is_empty());
}

#[test]
fn reading_does_not_conflict() {
    let ctx = Context::new();
    let ty = complex_type!("Derived" { "x": Simple });
    let id = ctx.create_complex(&ty, props! { "x" => "0" }).unwrap();

    let reader = open_transaction(&ctx, || {
        assert_eq!(ctx.get(id, "x").unwrap(), "0".into());
    });
    ctx.set(id, "x", "1").unwrap();

    let scope = reader.enter_scope().unwrap();
    assert_eq!(ctx.get(id, "x").unwrap(), "1".into());
    scope.accept().unwrap();
    assert_eq!(reader.state(), TransactionState::Committed);
}
