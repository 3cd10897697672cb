// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Backward references from elements to the containers holding them.
//!
//! Every element (a container held by another container) knows which `(container, property)`
//! slots hold it. The committed references live in the [`Store`](crate::store::Store); the
//! speculative additions and removals of an open transaction live in its [`ReferenceDelta`].
//! Since the delta is plain data owned by the transaction, discarding the transaction is all it
//! takes to restore the committed references.

use crate::{AmbitRandomState, ContainerId, Value, create_map};
use smallvec::SmallVec;
use std::collections::HashMap;

/// An edge from a container slot to the element it holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct Reference {
    /// The holding container.
    pub container: ContainerId,
    /// The holding property, or `None` when the container is a list.
    pub property: Option<String>,
}

impl Reference {
    /// A reference from a complex property.
    pub fn property(container: ContainerId, property: impl Into<String>) -> Self {
        Self {
            container,
            property: Some(property.into()),
        }
    }

    /// A reference from a list slot.
    pub fn list(container: ContainerId) -> Self {
        Self {
            container,
            property: None,
        }
    }
}

/// Most elements are held by one or two containers.
pub(crate) type ReferenceList = SmallVec<[Reference; 2]>;

/// Removes one occurrence of `reference`, returning whether it was present.
fn remove_one(list: &mut ReferenceList, reference: &Reference) -> bool {
    match list.iter().position(|r| r == reference) {
        Some(i) => {
            list.remove(i);
            true
        }
        None => false,
    }
}

/// Committed backward index: element → references.
#[derive(Debug, Clone)]
pub(crate) struct ReferenceIndex {
    entries: HashMap<ContainerId, ReferenceList, AmbitRandomState>,
}

impl Default for ReferenceIndex {
    fn default() -> Self {
        Self {
            entries: create_map(),
        }
    }
}

impl ReferenceIndex {
    pub(crate) fn get(&self, element: ContainerId) -> &[Reference] {
        self.entries.get(&element).map_or(&[][..], |list| list.as_slice())
    }

    pub(crate) fn add(&mut self, element: ContainerId, reference: Reference) {
        self.entries.entry(element).or_default().push(reference);
    }

    pub(crate) fn remove(&mut self, element: ContainerId, reference: &Reference) {
        if let Some(list) = self.entries.get_mut(&element) {
            remove_one(list, reference);
            if list.is_empty() {
                self.entries.remove(&element);
            }
        }
    }

    /// Makes the speculative adjustments of `delta` permanent.
    pub(crate) fn apply(&mut self, delta: ReferenceDelta) {
        for (element, adjust) in delta.entries {
            for reference in &adjust.removed {
                self.remove(element, reference);
            }
            for reference in adjust.added {
                self.add(element, reference);
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Adjustment {
    added: ReferenceList,
    removed: ReferenceList,
}

/// Speculative reference changes made by one transaction.
///
/// Adding a reference that is pending removal cancels the removal, and removing a reference that
/// is pending addition cancels the addition. This keeps the delta minimal no matter how often a
/// slot is reassigned, and makes re-assigning an original value restore its original reference.
#[derive(Debug, Clone)]
pub(crate) struct ReferenceDelta {
    entries: HashMap<ContainerId, Adjustment, AmbitRandomState>,
}

impl Default for ReferenceDelta {
    fn default() -> Self {
        Self {
            entries: create_map(),
        }
    }
}

impl ReferenceDelta {
    pub(crate) fn add(&mut self, element: ContainerId, reference: Reference) {
        let adjust = self.entries.entry(element).or_default();
        if !remove_one(&mut adjust.removed, &reference) {
            adjust.added.push(reference);
        }
        self.prune(element);
    }

    pub(crate) fn remove(&mut self, element: ContainerId, reference: Reference) {
        let adjust = self.entries.entry(element).or_default();
        if !remove_one(&mut adjust.added, &reference) {
            adjust.removed.push(reference);
        }
        self.prune(element);
    }

    /// Moves `reference` from the element held in `from` to the element held in `to`.
    ///
    /// Simple values hold no references, so only element values are touched.
    pub(crate) fn transfer(&mut self, reference: &Reference, from: &Value, to: &Value) {
        if from == to {
            return;
        }
        if let Some(old) = from.as_element() {
            self.remove(old, reference.clone());
        }
        if let Some(new) = to.as_element() {
            self.add(new, reference.clone());
        }
    }

    fn prune(&mut self, element: ContainerId) {
        if self
            .entries
            .get(&element)
            .is_some_and(|a| a.added.is_empty() && a.removed.is_empty())
        {
            self.entries.remove(&element);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves the ambient references of `element` on top of its committed references.
    pub(crate) fn resolve(&self, element: ContainerId, committed: &[Reference]) -> Vec<Reference> {
        let mut refs: ReferenceList = committed.iter().cloned().collect();
        if let Some(adjust) = self.entries.get(&element) {
            for reference in &adjust.removed {
                remove_one(&mut refs, reference);
            }
            refs.extend(adjust.added.iter().cloned());
        }
        refs.into_vec()
    }
}
