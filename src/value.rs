// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Values held by containers.

use std::fmt;

/// Identity of a container (a complex or a list) within a [`Context`](crate::Context).
///
/// Identifiers are allocated by the context and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct ContainerId(u64);

impl ContainerId {
    /// Creates an identifier from its raw representation.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw representation.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A value stored in a complex property or a list slot.
///
/// Simple values are atoms and compare structurally. [`Value::Element`] refers to another
/// container and compares by identity, which is what list removal and reference tracking rely on.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum Value {
    /// The absence of a value.
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// A reference to another container.
    Element(ContainerId),
}

impl Value {
    /// Returns the referenced container, if this is an element value.
    pub fn as_element(&self) -> Option<ContainerId> {
        match self {
            Value::Element(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the string, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A short name describing the kind of value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Element(_) => "element",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<ContainerId> for Value {
    fn from(value: ContainerId) -> Self {
        Value::Element(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(any(test, feature = "arbitrary"))]
impl quickcheck::Arbitrary for Value {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        // elements are left out: they only make sense for containers of a live context
        match u8::arbitrary(g) % 4 {
            0 => Value::Null,
            1 => Value::Bool(bool::arbitrary(g)),
            2 => Value::Number(f64::from(i32::arbitrary(g))),
            _ => Value::String(String::arbitrary(g)),
        }
    }
}
