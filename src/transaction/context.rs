// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{ScopeId, Transaction, TransactionId, TransactionScope, TxnData};
use crate::{
    ComplexType, ContainerId, Reference, Value, ValueKind,
    change::{Add, ListChange, Move, Remove},
    error::{TransactionError, TransactionResult},
    resolve::{resolve_elements, resolve_references, resolve_value},
    store::Store,
};
use std::{
    cell::{Cell, RefCell},
    mem,
    rc::Rc,
};

/// The state shared by every transaction and scope of one object model: the committed
/// containers and the stack of entered scopes.
///
/// A context is cheap to clone; clones share the same state. Contexts are not [`Send`], every
/// thread (or test) works with its own.
///
/// All reads through a context are *ambient*: they see the uncommitted changes of the current
/// transaction. Writes outside of any transaction run in an implicit transaction that is
/// committed right away.
#[derive(Debug, Clone, Default)]
pub struct Context {
    inner: Rc<RefCell<ContextInner>>,
}

#[derive(Debug, Default)]
pub(crate) struct ContextInner {
    pub(crate) store: Store,
    frames: Vec<ScopeFrame>,
    next_scope: u64,
    next_transaction: u64,
}

/// An entered scope. Committed scopes carry no transaction.
#[derive(Debug)]
struct ScopeFrame {
    id: ScopeId,
    txn: Option<Rc<RefCell<TxnData>>>,
    inside: Rc<Cell<bool>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inner(&self) -> &Rc<RefCell<ContextInner>> {
        &self.inner
    }

    pub(crate) fn same(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn next_transaction_id(&self) -> TransactionId {
        let mut inner = self.inner.borrow_mut();
        inner.next_transaction += 1;
        TransactionId::new(inner.next_transaction)
    }

    pub(crate) fn push_frame(
        &self,
        txn: Option<Rc<RefCell<TxnData>>>,
        inside: Rc<Cell<bool>>,
    ) -> ScopeId {
        let mut inner = self.inner.borrow_mut();
        inner.next_scope += 1;
        let id = ScopeId::new(inner.next_scope);
        inner.frames.push(ScopeFrame { id, txn, inside });
        id
    }

    /// Removes the frame of scope `id`, wherever it is on the stack.
    pub(crate) fn remove_frame(&self, id: ScopeId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(i) = inner.frames.iter().rposition(|frame| frame.id == id) {
            inner.frames.remove(i);
        }
    }

    /// The scope on top of the stack.
    pub fn current_scope(&self) -> Option<ScopeId> {
        self.inner.borrow().frames.last().map(|frame| frame.id)
    }

    /// Number of entered scopes.
    pub fn scope_depth(&self) -> usize {
        self.inner.borrow().frames.len()
    }

    fn current_data(&self) -> Option<Rc<RefCell<TxnData>>> {
        self.inner
            .borrow()
            .frames
            .last()
            .and_then(|frame| frame.txn.clone())
    }

    /// The transaction of the current scope. `None` outside of any scope and inside committed
    /// scopes.
    pub fn current_transaction(&self) -> Option<Transaction> {
        self.current_data()
            .map(|data| Transaction::from_data(self.clone(), data))
    }

    /// Enters a scope of the current transaction, or of a new one if there is none.
    pub fn enter(&self) -> TransactionResult<TransactionScope> {
        Transaction::enter(self)
    }

    /// Exits every entered scope.
    ///
    /// Transactions keep their changes and state, but none of them is current afterwards. An
    /// open transaction can be entered again with
    /// [`Transaction::enter_scope`], which gives it a new root scope.
    pub fn reset(&self) {
        let frames = mem::take(&mut self.inner.borrow_mut().frames);
        if !frames.is_empty() {
            tracing::debug!(scopes = frames.len(), "resetting scope stack");
        }
        for frame in frames.into_iter().rev() {
            frame.inside.set(false);
            if let Some(txn) = frame.txn {
                let mut data = txn.borrow_mut();
                data.scope_count = data.scope_count.saturating_sub(1);
            }
        }
    }

    /// Number of commits applied so far.
    pub fn commit_count(&self) -> u64 {
        self.inner.borrow().store.commit_count()
    }

    /// Runs `f` against committed state and the current transaction, if any.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&Store, Option<&TxnData>) -> R) -> R {
        let data = self.current_data();
        let inner = self.inner.borrow();
        let txn = data.as_ref().map(|data| data.borrow());
        f(&inner.store, txn.as_deref())
    }

    /// Records changes into the current transaction, or into an implicit one.
    fn record(
        &self,
        f: impl FnOnce(&mut TxnData, &Store) -> TransactionResult<()>,
    ) -> TransactionResult<()> {
        match self.current_data() {
            Some(data) => {
                let inner = self.inner.borrow();
                let mut data = data.borrow_mut();
                f(&mut data, &inner.store)
            }
            None => {
                tracing::trace!("recording into an implicit transaction");
                self.enter()?.using(|scope| {
                    self.record(f)?;
                    scope.accept()
                })
            }
        }
    }

    /// Creates a complex with committed initial values.
    ///
    /// Construction is not a change: the values are committed immediately, whatever transaction
    /// is current.
    pub fn create_complex<K, V>(
        &self,
        ty: &Rc<ComplexType>,
        initial: impl IntoIterator<Item = (K, V)>,
    ) -> TransactionResult<ContainerId>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let id = self.inner.borrow_mut().store.insert_complex(
            Rc::clone(ty),
            initial.into_iter().map(|(k, v)| (k.into(), v.into())),
        )?;
        tracing::trace!(container = %id, ty = ty.name(), "complex created");
        Ok(id)
    }

    /// Creates a list with committed initial elements.
    pub fn create_list<V>(
        &self,
        kind: ValueKind,
        elements: impl IntoIterator<Item = V>,
    ) -> TransactionResult<ContainerId>
    where
        V: Into<Value>,
    {
        let id = self
            .inner
            .borrow_mut()
            .store
            .insert_list(kind, elements.into_iter().map(Into::into).collect())?;
        tracing::trace!(container = %id, %kind, "list created");
        Ok(id)
    }

    /// The ambient value of a property.
    pub fn get(&self, container: ContainerId, property: &str) -> TransactionResult<Value> {
        self.read(|store, txn| resolve_value(store, container, property, txn))
    }

    /// The committed value of a property, ignoring the current transaction.
    pub fn committed_value(
        &self,
        container: ContainerId,
        property: &str,
    ) -> TransactionResult<Value> {
        self.inner.borrow().store.value(container, property)
    }

    /// The ambient elements of a list.
    pub fn elements(&self, list: ContainerId) -> TransactionResult<Vec<Value>> {
        self.read(|store, txn| resolve_elements(store, list, txn))
    }

    /// The ambient length of a list.
    pub fn len(&self, list: ContainerId) -> TransactionResult<usize> {
        Ok(self.elements(list)?.len())
    }

    /// The ambient references held on `element`.
    pub fn references(&self, element: ContainerId) -> TransactionResult<Vec<Reference>> {
        self.read(|store, txn| {
            if !store.contains(element) {
                return Err(TransactionError::ContainerNotFound { container: element });
            }
            Ok(resolve_references(store, element, txn))
        })
    }

    /// Sets a property of a complex.
    pub fn set(
        &self,
        container: ContainerId,
        property: &str,
        value: impl Into<Value>,
    ) -> TransactionResult<()> {
        let value = value.into();
        self.record(|txn, store| txn.record_replace(store, container, property, value))
    }

    /// Inserts `element` at `index`; `index` may equal the length of the list.
    pub fn insert(
        &self,
        list: ContainerId,
        index: usize,
        element: impl Into<Value>,
    ) -> TransactionResult<()> {
        let element = element.into();
        self.record(|txn, store| {
            txn.record_list_change(store, list, |kind, elements| {
                kind.check(list, &element)?;
                store.check_element(&element)?;
                if index > elements.len() {
                    return Err(TransactionError::IndexOutOfRange {
                        container: list,
                        index,
                        len: elements.len(),
                    });
                }
                Ok(Some(ListChange::Add(Add { element, index })))
            })
        })
    }

    /// Appends `element` to a list.
    pub fn push(&self, list: ContainerId, element: impl Into<Value>) -> TransactionResult<()> {
        let index = self.len(list)?;
        self.insert(list, index, element)
    }

    /// Removes the first occurrence of `element`.
    pub fn remove(&self, list: ContainerId, element: impl Into<Value>) -> TransactionResult<()> {
        let element = element.into();
        self.record(|txn, store| {
            txn.record_list_change(store, list, |_, elements| {
                let index = elements
                    .iter()
                    .position(|e| *e == element)
                    .ok_or(TransactionError::ElementNotFound { container: list })?;
                Ok(Some(ListChange::Remove(Remove { element, index })))
            })
        })
    }

    /// Removes the element at `index`.
    pub fn remove_at(&self, list: ContainerId, index: usize) -> TransactionResult<()> {
        self.record(|txn, store| {
            txn.record_list_change(store, list, |_, elements| {
                let element = elements
                    .get(index)
                    .ok_or(TransactionError::IndexOutOfRange {
                        container: list,
                        index,
                        len: elements.len(),
                    })?
                    .clone();
                Ok(Some(ListChange::Remove(Remove { element, index })))
            })
        })
    }

    /// Moves the element at `index_old` so that it ends up at `index_new`.
    ///
    /// See [`Move`] for how the indices are interpreted.
    pub fn move_element(
        &self,
        list: ContainerId,
        index_old: usize,
        index_new: usize,
    ) -> TransactionResult<()> {
        self.record(|txn, store| {
            txn.record_list_change(store, list, |_, elements| {
                let len = elements.len();
                for index in [index_old, index_new] {
                    if index >= len {
                        return Err(TransactionError::IndexOutOfRange {
                            container: list,
                            index,
                            len,
                        });
                    }
                }
                if index_old == index_new {
                    return Ok(None);
                }
                Ok(Some(ListChange::Move(Move {
                    element: elements[index_old].clone(),
                    index_old,
                    index_new,
                })))
            })
        })
    }

    /// Removes every element of a list.
    pub fn clear(&self, list: ContainerId) -> TransactionResult<()> {
        self.record(|txn, store| {
            txn.record_list_change(store, list, |_, elements| {
                Ok((!elements.is_empty()).then_some(ListChange::Clear))
            })
        })
    }
}
