// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Per-container collections of pending changes.
//!
//! A transaction owns at most one [`Changeset`] per container it has touched. Complex changesets
//! hold one [`Replace`] per property; list changesets hold an ordered log of [`ListChange`]s
//! together with the ambient projection of the list. Both keep their changes in registration
//! order, which is the order in which a commit applies them.

use crate::{
    ContainerId, OrderedMap, Reference, Value,
    change::{Change, ListChange, Replace},
    error::{TransactionError, TransactionResult},
    references::ReferenceDelta,
    store::{ContainerData, Store},
};

/// Key of a change within its changeset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeKey {
    /// A property of a complex.
    Property(String),
    /// A position in the change log of a list.
    Position(usize),
}

impl From<&str> for ChangeKey {
    fn from(property: &str) -> Self {
        ChangeKey::Property(property.to_string())
    }
}

impl From<String> for ChangeKey {
    fn from(property: String) -> Self {
        ChangeKey::Property(property)
    }
}

impl From<usize> for ChangeKey {
    fn from(position: usize) -> Self {
        ChangeKey::Position(position)
    }
}

/// Pending property replacements of a complex.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexChangeset {
    container: ContainerId,
    base_version: u64,
    changes: OrderedMap<String, Replace>,
}

impl ComplexChangeset {
    pub(crate) fn new(container: ContainerId, base_version: u64) -> Self {
        Self {
            container,
            base_version,
            changes: crate::create_ordered_map(),
        }
    }

    pub fn get_change(&self, property: &str) -> Option<&Replace> {
        self.changes.get(property)
    }

    /// Iterates over the changes in registration order.
    pub fn changes(&self) -> impl Iterator<Item = &Replace> {
        self.changes.values()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Records that `property` now holds `value`.
    ///
    /// A property has at most one change: writing it again updates the existing change in place,
    /// keeping its registration position and its original value.
    pub(crate) fn set_replace(
        &mut self,
        property: &str,
        committed: Value,
        value: Value,
        refs: &mut ReferenceDelta,
    ) {
        let reference = Reference::property(self.container, property);
        match self.changes.get_mut(property) {
            Some(existing) => {
                refs.transfer(&reference, &existing.value, &value);
                existing.value = value;
            }
            None => {
                refs.transfer(&reference, &committed, &value);
                self.changes.insert(
                    property.to_string(),
                    Replace {
                        property: property.to_string(),
                        original: committed,
                        value,
                    },
                );
            }
        }
    }

    pub(crate) fn clear_changes(&mut self, refs: &mut ReferenceDelta) {
        for change in self.changes.values() {
            let reference = Reference::property(self.container, change.property.as_str());
            refs.transfer(&reference, &change.value, &change.original);
        }
        self.changes.clear();
    }

    fn apply(&self, values: &mut OrderedMap<String, Value>) {
        for change in self.changes.values() {
            values.insert(change.property.clone(), change.value.clone());
        }
    }
}

/// Pending edits of a list, with the list's ambient projection.
#[derive(Debug, Clone, PartialEq)]
pub struct ListChangeset {
    container: ContainerId,
    base_version: u64,
    base: Vec<Value>,
    projected: Vec<Value>,
    changes: Vec<ListChange>,
}

impl ListChangeset {
    pub(crate) fn new(container: ContainerId, base_version: u64, base: Vec<Value>) -> Self {
        Self {
            container,
            base_version,
            projected: base.clone(),
            base,
            changes: Vec::new(),
        }
    }

    /// The ambient elements: the committed elements with every change applied.
    pub fn elements(&self) -> &[Value] {
        &self.projected
    }

    pub fn get_change(&self, position: usize) -> Option<&ListChange> {
        self.changes.get(position)
    }

    /// Iterates over the changes in registration order.
    pub fn changes(&self) -> impl Iterator<Item = &ListChange> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Appends a change to the log and applies it to the projection.
    pub(crate) fn push(&mut self, change: ListChange, refs: &mut ReferenceDelta) {
        let reference = Reference::list(self.container);
        match &change {
            ListChange::Add(add) => {
                if let Some(element) = add.element.as_element() {
                    refs.add(element, reference);
                }
            }
            ListChange::Remove(remove) => {
                if let Some(element) = remove.element.as_element() {
                    refs.remove(element, reference);
                }
            }
            ListChange::Move(_) => {}
            ListChange::Clear => {
                for element in self.projected.iter().filter_map(Value::as_element) {
                    refs.remove(element, reference.clone());
                }
            }
        }
        change.apply(&mut self.projected);
        self.changes.push(change);
    }

    pub(crate) fn clear_changes(&mut self, refs: &mut ReferenceDelta) {
        let reference = Reference::list(self.container);
        for element in self.projected.iter().filter_map(Value::as_element) {
            refs.remove(element, reference.clone());
        }
        for element in self.base.iter().filter_map(Value::as_element) {
            refs.add(element, reference.clone());
        }
        self.projected = self.base.clone();
        self.changes.clear();
    }

    fn apply(&self, elements: &mut Vec<Value>) {
        for change in &self.changes {
            change.apply(elements);
        }
    }
}

/// The pending changes of one container within one transaction.
///
/// Changesets handed out by [`Transaction`](crate::Transaction) are read-only snapshots taken
/// at the time of the call. Record changes through the [`Context`](crate::Context) write methods
/// and discard them with [`Transaction::clear_changes`](crate::Transaction::clear_changes);
/// neither is reflected in a snapshot taken earlier.
#[derive(Debug, Clone, PartialEq)]
pub enum Changeset {
    Complex(ComplexChangeset),
    List(ListChangeset),
}

impl Changeset {
    /// Creates an empty changeset matching the kind of the container's committed state.
    pub(crate) fn for_container(store: &Store, container: ContainerId) -> TransactionResult<Self> {
        let state = store.container(container)?;
        Ok(match &state.data {
            ContainerData::Complex { .. } => {
                Changeset::Complex(ComplexChangeset::new(container, state.version))
            }
            ContainerData::List { elements, .. } => Changeset::List(ListChangeset::new(
                container,
                state.version,
                elements.clone(),
            )),
        })
    }

    pub fn container(&self) -> ContainerId {
        match self {
            Changeset::Complex(c) => c.container,
            Changeset::List(l) => l.container,
        }
    }

    /// The committed version of the container when this changeset was created.
    pub fn base_version(&self) -> u64 {
        match self {
            Changeset::Complex(c) => c.base_version,
            Changeset::List(l) => l.base_version,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Changeset::Complex(c) => c.len(),
            Changeset::List(l) => l.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a change by key. Property keys address complex changesets, positions address
    /// list changesets.
    pub fn get_change(&self, key: &ChangeKey) -> Option<Change> {
        match (self, key) {
            (Changeset::Complex(c), ChangeKey::Property(p)) => {
                c.get_change(p).cloned().map(Change::Replace)
            }
            (Changeset::List(l), ChangeKey::Position(i)) => {
                l.get_change(*i).cloned().map(Change::from)
            }
            _ => None,
        }
    }

    /// All changes, in registration order.
    pub fn changes(&self) -> Vec<Change> {
        match self {
            Changeset::Complex(c) => c.changes().cloned().map(Change::Replace).collect(),
            Changeset::List(l) => l.changes().cloned().map(Change::from).collect(),
        }
    }

    /// Discards every change, reversing their speculative references.
    pub(crate) fn clear_changes(&mut self, refs: &mut ReferenceDelta) {
        match self {
            Changeset::Complex(c) => c.clear_changes(refs),
            Changeset::List(l) => l.clear_changes(refs),
        }
    }

    /// Whether a commit of another transaction has changed the container since this changeset
    /// was created.
    pub(crate) fn is_stale(&self, store: &Store) -> TransactionResult<bool> {
        Ok(store.version(self.container())? != self.base_version())
    }

    /// Applies the changes, in registration order, to the committed data of the container.
    pub(crate) fn apply(&self, data: &mut ContainerData) -> TransactionResult<()> {
        match (self, data) {
            (Changeset::Complex(c), ContainerData::Complex { values, .. }) => c.apply(values),
            (Changeset::List(l), ContainerData::List { elements, .. }) => l.apply(elements),
            (Changeset::Complex(c), ContainerData::List { .. }) => {
                return Err(TransactionError::WrongContainerKind {
                    container: c.container,
                    expected: "complex",
                });
            }
            (Changeset::List(l), ContainerData::Complex { .. }) => {
                return Err(TransactionError::WrongContainerKind {
                    container: l.container,
                    expected: "list",
                });
            }
        }
        Ok(())
    }
}
