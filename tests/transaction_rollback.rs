//! Tests for transaction rollback behavior.
//!
//! When a transaction is rejected, or its scope is dropped without accepting it, none of its
//! changes may reach committed state, and committed references must stay as they were.

use ambit::{
    Context, Reference, RejectReason, TransactionError, TransactionState, Value, ValueKind,
    complex_type, props,
};

#[test]
fn reject_reverts_ambient_values() {
    let ctx = Context::new();
    let ty = complex_type!("Derived" { "x": Simple });
    let id = ctx.create_complex(&ty, props! { "x" => "0" }).unwrap();

    let scope = ctx.enter().unwrap();
    let txn = scope.transaction().unwrap();
    ctx.set(id, "x", "1").unwrap();
    assert_eq!(ctx.get(id, "x").unwrap(), "1".into());

    let err = scope.reject(None).unwrap_err();
    assert!(matches!(err.reject_reason(), Some(RejectReason::Cancelled)));
    assert_eq!(txn.state(), TransactionState::Rejected);
    assert_eq!(ctx.get(id, "x").unwrap(), "0".into());
    assert_eq!(ctx.commit_count(), 0);
}

#[test]
fn reject_keeps_the_reason() {
    let ctx = Context::new();
    let scope = ctx.enter().unwrap();
    let txn = scope.transaction().unwrap();

    let err = scope
        .reject(Some(RejectReason::message("changed my mind")))
        .unwrap_err();
    assert_eq!(err.to_string(), "transaction rejected: changed my mind");
    assert!(matches!(txn.error(), Some(RejectReason::Message(m)) if m == "changed my mind"));
}

#[test]
fn dropping_a_scope_commits_nothing() {
    let ctx = Context::new();
    let ty = complex_type!("Derived" { "x": Simple });
    let id = ctx.create_complex(&ty, props! { "x" => "0" }).unwrap();
    let list = ctx.create_list(ValueKind::Simple, ["a"]).unwrap();

    let txn = {
        let scope = ctx.enter().unwrap();
        ctx.set(id, "x", "1").unwrap();
        ctx.push(list, "b").unwrap();
        scope.transaction().unwrap()
    };

    assert_eq!(ctx.scope_depth(), 0);
    assert_eq!(txn.state(), TransactionState::Open);
    assert_eq!(ctx.get(id, "x").unwrap(), "0".into());
    assert_eq!(ctx.elements(list).unwrap(), [Value::from("a")]);
}

#[test]
fn reentering_an_abandoned_transaction_restores_its_view() {
    let ctx = Context::new();
    let ty = complex_type!("Derived" { "x": Simple });
    let id = ctx.create_complex(&ty, props! { "x" => "0" }).unwrap();

    let txn = {
        let scope = ctx.enter().unwrap();
        ctx.set(id, "x", "1").unwrap();
        scope.transaction().unwrap()
    };
    assert_eq!(ctx.get(id, "x").unwrap(), "0".into());

    let scope = txn.enter_scope().unwrap();
    assert!(scope.is_root());
    assert_eq!(ctx.get(id, "x").unwrap(), "1".into());
    scope.accept().unwrap();
    assert_eq!(ctx.committed_value(id, "x").unwrap(), "1".into());
}

#[test]
fn clear_changes_round_trips() {
    let ctx = Context::new();
    let ty = complex_type!("Derived" { "x": Simple, "y": Element });
    let elem1 = ctx.create_complex(&ty, props! {}).unwrap();
    let elem2 = ctx.create_complex(&ty, props! {}).unwrap();
    let target = ctx
        .create_complex(&ty, props! { "x" => "0", "y" => elem1 })
        .unwrap();

    let scope = ctx.enter().unwrap();
    let txn = scope.transaction().unwrap();
    ctx.set(target, "x", "1").unwrap();
    ctx.set(target, "y", elem2).unwrap();
    txn.clear_changes(target).unwrap();

    assert_eq!(ctx.get(target, "x").unwrap(), "0".into());
    assert_eq!(ctx.get(target, "y").unwrap(), elem1.into());
    assert_eq!(
        ctx.references(elem1).unwrap(),
        [Reference::property(target, "y")]
    );
    assert!(ctx.references(elem2).unwrap().is_empty());

    // the emptied changeset commits nothing
    scope.accept().unwrap();
    assert_eq!(txn.state(), TransactionState::Committed);
    assert_eq!(ctx.committed_value(target, "x").unwrap(), "0".into());
}

#[test]
fn rejected_list_edits_leave_committed_references() {
    let ctx = Context::new();
    let leaf = complex_type!("Leaf" {});
    let a = ctx.create_complex(&leaf, props! {}).unwrap();
    let b = ctx.create_complex(&leaf, props! {}).unwrap();
    let list = ctx.create_list(ValueKind::Element, [a, b]).unwrap();

    let scope = ctx.enter().unwrap();
    ctx.remove(list, a).unwrap();
    ctx.clear(list).unwrap();
    assert!(ctx.references(b).unwrap().is_empty());
    let _ = scope.reject(None);

    assert_eq!(ctx.elements(list).unwrap(), [Value::from(a), Value::from(b)]);
    assert_eq!(ctx.references(a).unwrap(), [Reference::list(list)]);
    assert_eq!(ctx.references(b).unwrap(), [Reference::list(list)]);
}

#[test]
fn using_rejects_on_failure() {
    let ctx = Context::new();
    let ty = complex_type!("Derived" { "x": Simple });
    let id = ctx.create_complex(&ty, props! { "x" => "0" }).unwrap();

    let scope = ctx.enter().unwrap();
    let txn = scope.transaction().unwrap();
    let err = scope
        .using(|_| {
            ctx.set(id, "x", "1")?;
            ctx.set(id, "missing", "1")
        })
        .unwrap_err();

    assert!(matches!(err, TransactionError::PropertyNotFound { .. }));
    assert_eq!(txn.state(), TransactionState::Rejected);
    assert!(matches!(
        txn.error(),
        Some(RejectReason::Error(e)) if e.to_string().contains("missing")
    ));
    assert_eq!(ctx.get(id, "x").unwrap(), "0".into());
    assert_eq!(ctx.scope_depth(), 0);
}

#[test]
fn using_reports_rejections_it_did_not_see() {
    let ctx = Context::new();
    let scope = ctx.enter().unwrap();
    let txn = scope.transaction().unwrap();

    let result = scope.using(|_| {
        // swallow the rejection of a nested scope
        let nested = ctx.enter()?;
        let _ = nested.reject(Some(RejectReason::message("nested")));
        Ok(42)
    });

    let err = result.unwrap_err();
    assert!(matches!(err.reject_reason(), Some(RejectReason::Message(m)) if m == "nested"));
    assert_eq!(txn.state(), TransactionState::Rejected);
}

#[test]
fn using_does_not_reject_when_not_current() {
    let ctx = Context::new();
    let scope = ctx.enter().unwrap();
    let txn = scope.transaction().unwrap();

    let err = scope
        .using(|scope| {
            scope.exit();
            Err::<(), _>(TransactionError::operation_invalid("late failure"))
        })
        .unwrap_err();

    assert!(err.is_operation_invalid());
    assert_eq!(txn.state(), TransactionState::Open);
}

#[test]
fn rejected_transactions_cannot_be_entered_or_written() {
    let ctx = Context::new();
    let ty = complex_type!("Derived" { "x": Simple });
    let id = ctx.create_complex(&ty, props! {}).unwrap();

    let scope = ctx.enter().unwrap();
    let txn = scope.transaction().unwrap();
    let nested = ctx.enter().unwrap();
    let _ = nested.reject(None);

    // the outer scope is current again, but its transaction is final
    let err = ctx.set(id, "x", "1").unwrap_err();
    assert!(err.reject_reason().is_some());
    assert!(txn.enter_scope().unwrap_err().is_operation_invalid());
    assert!(scope.accept().is_err());
}
