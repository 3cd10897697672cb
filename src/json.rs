// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! JSON representation
//!
//! Complexes render as objects with one field per declared property, lists as arrays. Element
//! values are rendered inline. An element that is already being rendered further up (a cycle)
//! renders as a reference object instead:
//!
//! ```json
//! {
//!   "name": "root",
//!   "parent": { "$ref": "#1" }
//! }
//! ```
//!
//! Rendering is ambient: inside a transaction, the JSON includes its uncommitted changes.
use crate::{
    ContainerId, Context, Value,
    error::TransactionResult,
    resolve::{resolve_elements, resolve_value},
    store::{ContainerData, Store},
    transaction::TxnData,
};

/// Converts an atomic [`Value`] to a [`serde_json::Value`].
///
/// Element values have no standalone JSON form; they render as a reference object.
impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => (*b).into(),
            Value::Number(n) => (*n).into(),
            Value::String(s) => s.as_str().into(),
            Value::Element(id) => reference(*id),
        }
    }
}

fn reference(id: ContainerId) -> serde_json::Value {
    serde_json::json!({ "$ref": id.to_string() })
}

impl Context {
    /// Renders the ambient state of `container`, and every element it holds, as JSON.
    pub fn to_json(&self, container: ContainerId) -> TransactionResult<serde_json::Value> {
        self.read(|store, txn| render(store, txn, container, &mut Vec::new()))
    }
}

fn render(
    store: &Store,
    txn: Option<&TxnData>,
    container: ContainerId,
    path: &mut Vec<ContainerId>,
) -> TransactionResult<serde_json::Value> {
    if path.contains(&container) {
        return Ok(reference(container));
    }
    path.push(container);
    let json = match &store.container(container)?.data {
        ContainerData::Complex { ty, .. } => {
            let mut obj = serde_json::Map::new();
            for property in ty.properties() {
                let value = resolve_value(store, container, property.name(), txn)?;
                obj.insert(
                    property.name().to_string(),
                    render_value(store, txn, &value, path)?,
                );
            }
            serde_json::Value::Object(obj)
        }
        ContainerData::List { .. } => serde_json::Value::Array(
            resolve_elements(store, container, txn)?
                .iter()
                .map(|element| render_value(store, txn, element, path))
                .collect::<TransactionResult<_>>()?,
        ),
    };
    path.pop();
    Ok(json)
}

fn render_value(
    store: &Store,
    txn: Option<&TxnData>,
    value: &Value,
    path: &mut Vec<ContainerId>,
) -> TransactionResult<serde_json::Value> {
    match value {
        Value::Element(id) => render(store, txn, *id, path),
        atom => Ok(atom.into()),
    }
}
