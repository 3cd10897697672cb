use ambit::{
    Change, ChangeKey, Changeset, Context, ContainerId, Reference, TransactionError, Value,
    ValueKind, complex_type, props,
};
use std::rc::Rc;

struct Fixture {
    ctx: Context,
    target: ContainerId,
    elem1: ContainerId,
    elem2: ContainerId,
    elem3: ContainerId,
}

/// A complex whose `y` property holds `elem1`, and two more candidate elements.
fn fixture() -> Fixture {
    let ctx = Context::new();
    let derived = complex_type!("Derived" { "x": Simple, "y": Element });
    let elem1 = ctx.create_complex(&derived, props! { "x" => "1" }).unwrap();
    let elem2 = ctx.create_complex(&derived, props! { "x" => "2" }).unwrap();
    let elem3 = ctx.create_complex(&derived, props! { "x" => "3" }).unwrap();
    let target = ctx
        .create_complex(&derived, props! { "x" => "0", "y" => elem1 })
        .unwrap();
    Fixture {
        ctx,
        target,
        elem1,
        elem2,
        elem3,
    }
}

fn held_by_y(f: &Fixture) -> Vec<Reference> {
    vec![Reference::property(f.target, "y")]
}

#[test]
fn replace_is_visible_only_within_the_transaction() {
    let f = fixture();
    let scope = f.ctx.enter().unwrap();
    f.ctx.set(f.target, "x", "1").unwrap();
    assert_eq!(f.ctx.get(f.target, "x").unwrap(), "1".into());

    let txn = scope.transaction().unwrap();
    let Some(Change::Replace(replace)) = txn.get_change(f.target, "x") else {
        panic!("expected a replace change");
    };
    assert_eq!(replace.property(), "x");
    assert_eq!(replace.original(), &Value::from("0"));
    assert_eq!(replace.value(), &Value::from("1"));

    scope.exit();
    assert_eq!(f.ctx.get(f.target, "x").unwrap(), "0".into());
}

#[test]
fn setting_twice_keeps_one_change() {
    let f = fixture();
    let scope = f.ctx.enter().unwrap();
    let txn = scope.transaction().unwrap();
    f.ctx.set(f.target, "x", "1").unwrap();
    f.ctx.set(f.target, "x", "2").unwrap();

    let changeset = txn.changeset(f.target).unwrap();
    assert_eq!(changeset.len(), 1);
    assert_eq!(f.ctx.get(f.target, "x").unwrap(), "2".into());

    scope.accept().unwrap();
    assert_eq!(f.ctx.committed_value(f.target, "x").unwrap(), "2".into());
}

#[test]
fn references_follow_replacements() {
    let f = fixture();
    let scope = f.ctx.enter().unwrap();
    f.ctx.set(f.target, "y", f.elem2).unwrap();

    assert!(f.ctx.references(f.elem1).unwrap().is_empty());
    assert_eq!(f.ctx.references(f.elem2).unwrap(), held_by_y(&f));

    scope.accept().unwrap();
    assert!(f.ctx.references(f.elem1).unwrap().is_empty());
    assert_eq!(f.ctx.references(f.elem2).unwrap(), held_by_y(&f));
}

#[test]
fn reassigning_the_original_restores_its_reference() {
    let f = fixture();
    let scope = f.ctx.enter().unwrap();
    f.ctx.set(f.target, "y", f.elem2).unwrap();
    f.ctx.set(f.target, "y", f.elem3).unwrap();

    assert!(f.ctx.references(f.elem1).unwrap().is_empty());
    assert!(f.ctx.references(f.elem2).unwrap().is_empty());
    assert_eq!(f.ctx.references(f.elem3).unwrap(), held_by_y(&f));

    f.ctx.set(f.target, "y", f.elem1).unwrap();
    assert_eq!(f.ctx.references(f.elem1).unwrap(), held_by_y(&f));
    assert!(f.ctx.references(f.elem2).unwrap().is_empty());
    assert!(f.ctx.references(f.elem3).unwrap().is_empty());

    scope.accept().unwrap();
    assert_eq!(f.ctx.references(f.elem1).unwrap(), held_by_y(&f));
    assert!(f.ctx.references(f.elem3).unwrap().is_empty());
}

#[test]
fn rejecting_restores_references() {
    let f = fixture();
    let scope = f.ctx.enter().unwrap();
    f.ctx.set(f.target, "y", Value::Null).unwrap();
    assert!(f.ctx.references(f.elem1).unwrap().is_empty());

    let _ = scope.reject(None);
    assert_eq!(f.ctx.references(f.elem1).unwrap(), held_by_y(&f));
}

#[test]
fn write_validation() {
    let f = fixture();
    let list = f.ctx.create_list(ValueKind::Simple, [1]).unwrap();

    assert!(matches!(
        f.ctx.set(f.target, "nope", 1),
        Err(TransactionError::PropertyNotFound { .. })
    ));
    assert!(matches!(
        f.ctx.set(f.target, "y", "not an element"),
        Err(TransactionError::TypeMismatch {
            expected: ValueKind::Element,
            ..
        })
    ));
    assert!(matches!(
        f.ctx.set(f.target, "y", ContainerId::new(999)),
        Err(TransactionError::ContainerNotFound { .. })
    ));
    assert!(matches!(
        f.ctx.set(list, "x", 1),
        Err(TransactionError::WrongContainerKind {
            expected: "complex",
            ..
        })
    ));
    assert!(matches!(
        f.ctx.push(f.target, 1),
        Err(TransactionError::WrongContainerKind {
            expected: "list",
            ..
        })
    ));
    assert!(matches!(
        f.ctx.references(ContainerId::new(999)),
        Err(TransactionError::ContainerNotFound { .. })
    ));
    assert_eq!(f.ctx.commit_count(), 0);
}

#[test]
fn list_changesets_log_every_edit() {
    let ctx = Context::new();
    let list = ctx
        .create_list(ValueKind::Simple, ["a", "b", "c", "d", "e"])
        .unwrap();
    let scope = ctx.enter().unwrap();
    let txn = scope.transaction().unwrap();

    ctx.move_element(list, 3, 1).unwrap();
    ctx.remove_at(list, 0).unwrap();
    ctx.insert(list, 0, "z").unwrap();

    let Some(Changeset::List(changeset)) = txn.changeset(list) else {
        panic!("expected a list changeset");
    };
    assert_eq!(changeset.len(), 3);
    let kinds: Vec<_> = changeset
        .changes()
        .map(|change| Change::from(change.clone()).kind().as_str())
        .collect();
    assert_eq!(kinds, ["move", "remove", "add"]);
    assert!(matches!(
        txn.get_change(list, ChangeKey::Position(1)),
        Some(Change::Remove(remove)) if remove.index == 0 && remove.element == "a".into()
    ));

    scope.accept().unwrap();
    let expected: Vec<Value> = ["z", "d", "b", "c", "e"].into_iter().map(Value::from).collect();
    assert_eq!(ctx.elements(list).unwrap(), expected);
}

#[test]
fn ensure_changeset_registers_in_order() {
    let f = fixture();
    let scope = f.ctx.enter().unwrap();
    let txn = scope.transaction().unwrap();

    let changeset = txn.ensure_changeset(f.elem2).unwrap();
    assert!(changeset.is_empty());
    assert_eq!(changeset.container(), f.elem2);
    f.ctx.set(f.target, "x", "1").unwrap();
    f.ctx.set(f.elem2, "x", "9").unwrap();

    assert_eq!(txn.containers(), [f.elem2, f.target]);
    assert_eq!(txn.changeset(f.elem2).unwrap().len(), 1);
    // the earlier snapshot does not follow later writes
    assert!(changeset.is_empty());
}

#[test]
fn implicit_transactions_commit_each_write() {
    let f = fixture();
    f.ctx.set(f.target, "x", "1").unwrap();
    f.ctx.set(f.target, "y", f.elem2).unwrap();

    assert_eq!(f.ctx.commit_count(), 2);
    assert_eq!(f.ctx.committed_value(f.target, "x").unwrap(), "1".into());
    assert_eq!(f.ctx.references(f.elem2).unwrap(), held_by_y(&f));
    assert!(f.ctx.current_transaction().is_none());
}

#[test]
fn types_are_shared_between_containers() {
    let ctx = Context::new();
    let ty = complex_type!("Shared" { "x": Any });
    let a = ctx.create_complex(&ty, props! { "x" => true }).unwrap();
    let b = ctx.create_complex(&ty, props! { "x" => 1 }).unwrap();
    assert_eq!(Rc::strong_count(&ty), 3);
    assert_eq!(ctx.get(a, "x").unwrap(), true.into());
    assert_eq!(ctx.get(b, "x").unwrap(), Value::Number(1.0));
}
