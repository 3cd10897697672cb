// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Committed container state.
//!
//! The store only ever holds committed state. Uncommitted edits live in the changesets of their
//! transaction and are layered on top by the resolver functions in [`crate::resolve`].

use crate::{
    AmbitRandomState, ComplexType, ContainerId, OrderedMap, Reference, Value, ValueKind,
    create_map,
    error::{TransactionError, TransactionResult},
    references::ReferenceIndex,
};
use std::{collections::HashMap, rc::Rc};

/// The committed data of a container.
#[derive(Debug, Clone)]
pub(crate) enum ContainerData {
    Complex {
        ty: Rc<ComplexType>,
        values: OrderedMap<String, Value>,
    },
    List {
        kind: ValueKind,
        elements: Vec<Value>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct ContainerState {
    pub(crate) data: ContainerData,
    /// Commit number of the last commit that changed this container; 0 when never changed.
    pub(crate) version: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct Store {
    containers: HashMap<ContainerId, ContainerState, AmbitRandomState>,
    references: ReferenceIndex,
    next_id: u64,
    commits: u64,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            containers: create_map(),
            references: ReferenceIndex::default(),
            next_id: 1,
            commits: 0,
        }
    }
}

impl Store {
    fn allocate(&mut self) -> ContainerId {
        let id = ContainerId::new(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn check_element(&self, value: &Value) -> TransactionResult<()> {
        match value.as_element() {
            Some(element) if !self.containers.contains_key(&element) => {
                Err(TransactionError::ContainerNotFound { container: element })
            }
            _ => Ok(()),
        }
    }

    /// Creates a complex with committed initial values. Undeclared properties are rejected and
    /// declared properties without an initial value start out as [`Value::Null`].
    pub(crate) fn insert_complex(
        &mut self,
        ty: Rc<ComplexType>,
        initial: impl IntoIterator<Item = (String, Value)>,
    ) -> TransactionResult<ContainerId> {
        let mut values: OrderedMap<String, Value> = ty
            .properties()
            .map(|p| (p.name().to_string(), Value::Null))
            .collect();
        for (property, value) in initial {
            ty.check(&property, &value)?;
            self.check_element(&value)?;
            values.insert(property, value);
        }

        let id = self.allocate();
        for (property, value) in &values {
            if let Some(element) = value.as_element() {
                self.references
                    .add(element, Reference::property(id, property.as_str()));
            }
        }
        self.containers.insert(
            id,
            ContainerState {
                data: ContainerData::Complex { ty, values },
                version: 0,
            },
        );
        Ok(id)
    }

    /// Creates a list with committed initial elements.
    pub(crate) fn insert_list(
        &mut self,
        kind: ValueKind,
        elements: Vec<Value>,
    ) -> TransactionResult<ContainerId> {
        let id = self.allocate();
        for element in &elements {
            kind.check(id, element)?;
            self.check_element(element)?;
        }
        for element in elements.iter().filter_map(Value::as_element) {
            self.references.add(element, Reference::list(id));
        }
        self.containers.insert(
            id,
            ContainerState {
                data: ContainerData::List { kind, elements },
                version: 0,
            },
        );
        Ok(id)
    }

    pub(crate) fn container(&self, id: ContainerId) -> TransactionResult<&ContainerState> {
        self.containers
            .get(&id)
            .ok_or(TransactionError::ContainerNotFound { container: id })
    }

    pub(crate) fn container_mut(
        &mut self,
        id: ContainerId,
    ) -> TransactionResult<&mut ContainerState> {
        self.containers
            .get_mut(&id)
            .ok_or(TransactionError::ContainerNotFound { container: id })
    }

    pub(crate) fn contains(&self, id: ContainerId) -> bool {
        self.containers.contains_key(&id)
    }

    pub(crate) fn complex(
        &self,
        id: ContainerId,
    ) -> TransactionResult<(&Rc<ComplexType>, &OrderedMap<String, Value>)> {
        match &self.container(id)?.data {
            ContainerData::Complex { ty, values } => Ok((ty, values)),
            ContainerData::List { .. } => Err(TransactionError::WrongContainerKind {
                container: id,
                expected: "complex",
            }),
        }
    }

    pub(crate) fn list(&self, id: ContainerId) -> TransactionResult<(ValueKind, &[Value])> {
        match &self.container(id)?.data {
            ContainerData::List { kind, elements } => Ok((*kind, elements)),
            ContainerData::Complex { .. } => Err(TransactionError::WrongContainerKind {
                container: id,
                expected: "list",
            }),
        }
    }

    /// Committed value of a declared property.
    pub(crate) fn value(&self, id: ContainerId, property: &str) -> TransactionResult<Value> {
        let (ty, values) = self.complex(id)?;
        match values.get(property) {
            Some(value) => Ok(value.clone()),
            None => Err(TransactionError::PropertyNotFound {
                type_name: ty.name().to_string(),
                property: property.to_string(),
            }),
        }
    }

    pub(crate) fn version(&self, id: ContainerId) -> TransactionResult<u64> {
        Ok(self.container(id)?.version)
    }

    pub(crate) fn references(&self) -> &ReferenceIndex {
        &self.references
    }

    pub(crate) fn references_mut(&mut self) -> &mut ReferenceIndex {
        &mut self.references
    }

    /// Starts a new commit, returning the version that containers touched by it receive.
    pub(crate) fn next_commit(&mut self) -> u64 {
        self.commits += 1;
        self.commits
    }

    pub(crate) fn commit_count(&self) -> u64 {
        self.commits
    }
}
