// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Primitive changes.
//!
//! A change is an immutable description of a single mutation. Property writes on complexes are
//! described by [`Replace`]; list edits by [`ListChange`]. Both know how to apply themselves to a
//! committed state, and list changes also drive the ambient projection of a list while the
//! transaction is still open.

use crate::Value;

/// The kind of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Replace,
    Add,
    Remove,
    Move,
    Clear,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Replace => "replace",
            ChangeKind::Add => "add",
            ChangeKind::Remove => "remove",
            ChangeKind::Move => "move",
            ChangeKind::Clear => "clear",
        }
    }
}

/// Any primitive change.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum Change {
    Replace(Replace),
    Add(Add),
    Remove(Remove),
    Move(Move),
    Clear,
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Replace(_) => ChangeKind::Replace,
            Change::Add(_) => ChangeKind::Add,
            Change::Remove(_) => ChangeKind::Remove,
            Change::Move(_) => ChangeKind::Move,
            Change::Clear => ChangeKind::Clear,
        }
    }
}

impl From<ListChange> for Change {
    fn from(change: ListChange) -> Self {
        match change {
            ListChange::Add(c) => Change::Add(c),
            ListChange::Remove(c) => Change::Remove(c),
            ListChange::Move(c) => Change::Move(c),
            ListChange::Clear => Change::Clear,
        }
    }
}

/// Replaces the value of a complex property.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct Replace {
    pub(crate) property: String,
    pub(crate) original: Value,
    pub(crate) value: Value,
}

impl Replace {
    pub fn property(&self) -> &str {
        &self.property
    }

    /// The committed value at the time the change was first recorded.
    pub fn original(&self) -> &Value {
        &self.original
    }

    /// The new value.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Inserts `element` at `index`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct Add {
    pub element: Value,
    pub index: usize,
}

/// Removes `element`, found at `index` when the change was recorded.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct Remove {
    pub element: Value,
    pub index: usize,
}

/// Relocates `element` from `index_old` to `index_new`.
///
/// `index_new` addresses the sequence *after* the element has been taken out:
///
/// ```text
/// to behind its position          to ahead of its position
///     v-----+                         +-----v
/// a b c d e F                     a b C d e f
/// a b F c d e                     a b d e f C
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct Move {
    pub element: Value,
    pub index_old: usize,
    pub index_new: usize,
}

/// A change that can be part of a list changeset.
#[derive(Debug, Clone, PartialEq)]
pub enum ListChange {
    Add(Add),
    Remove(Remove),
    Move(Move),
    Clear,
}

impl ListChange {
    /// Applies the change to `elements`.
    ///
    /// Indices are validated when the change is recorded against the same sequence, so they are
    /// always in bounds here.
    pub(crate) fn apply(&self, elements: &mut Vec<Value>) {
        match self {
            ListChange::Add(Add { element, index }) => elements.insert(*index, element.clone()),
            ListChange::Remove(Remove { index, .. }) => {
                elements.remove(*index);
            }
            ListChange::Move(Move {
                index_old,
                index_new,
                ..
            }) => {
                let element = elements.remove(*index_old);
                elements.insert(*index_new, element);
            }
            ListChange::Clear => elements.clear(),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ListChange::Add(_) => ChangeKind::Add,
            ListChange::Remove(_) => ChangeKind::Remove,
            ListChange::Move(_) => ChangeKind::Move,
            ListChange::Clear => ChangeKind::Clear,
        }
    }
}
