// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Declarations of container types.
//!
//! This is the small slice of a type system that the transaction engine needs: complex types
//! declare their properties and the kind of value each property accepts, and lists declare the
//! kind of their elements. Writes are validated against these declarations before a change is
//! recorded.

use crate::{
    OrderedMap, Value,
    error::{TransactionError, TransactionResult},
};
use std::fmt;

/// The kind of value a property or list slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum ValueKind {
    /// Any value.
    Any,
    /// Atoms only: booleans, numbers and strings.
    Simple,
    /// References to other containers. Holding one registers a [`Reference`](crate::Reference).
    Element,
}

impl ValueKind {
    /// Checks whether `value` is acceptable. `Null` is accepted by every kind.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (ValueKind::Any, _) => true,
            (ValueKind::Element, v) => v.as_element().is_some(),
            (ValueKind::Simple, v) => v.as_element().is_none(),
        }
    }

    pub(crate) fn check(self, target: impl fmt::Display, value: &Value) -> TransactionResult<()> {
        if self.accepts(value) {
            Ok(())
        } else {
            Err(TransactionError::TypeMismatch {
                target: target.to_string(),
                expected: self,
            })
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Any => "any",
            ValueKind::Simple => "simple",
            ValueKind::Element => "element",
        })
    }
}

/// Declaration of a single property of a [`ComplexType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyType {
    name: String,
    kind: ValueKind,
}

impl PropertyType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

/// The declared shape of a complex container.
///
/// Property declaration order is preserved and is the order in which fresh instances lay out
/// their values.
///
/// # Example
///
/// ```
/// use ambit::{ComplexType, ValueKind};
///
/// let point = ComplexType::new("Point")
///     .property("x", ValueKind::Simple)
///     .property("y", ValueKind::Simple);
/// assert_eq!(point.properties().count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexType {
    name: String,
    properties: OrderedMap<String, PropertyType>,
}

impl ComplexType {
    /// Creates a type without properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: crate::create_ordered_map(),
        }
    }

    /// Declares a property. Re-declaring a name overrides its kind.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        let name = name.into();
        self.properties
            .insert(name.clone(), PropertyType { name, kind });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a property declaration.
    pub fn get(&self, name: &str) -> Option<&PropertyType> {
        self.properties.get(name)
    }

    /// Iterates over the declared properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &PropertyType> {
        self.properties.values()
    }

    /// Checks that `property` is declared and accepts `value`.
    pub(crate) fn check(&self, property: &str, value: &Value) -> TransactionResult<()> {
        let declared = self
            .get(property)
            .ok_or_else(|| TransactionError::PropertyNotFound {
                type_name: self.name.clone(),
                property: property.to_string(),
            })?;
        declared.kind.check(property, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContainerId;

    fn complex_of_complex() -> ComplexType {
        ComplexType::new("ComplexOfComplex")
            .property("x", ValueKind::Simple)
            .property("y", ValueKind::Element)
    }

    #[test]
    fn null_is_always_accepted() {
        for kind in [ValueKind::Any, ValueKind::Simple, ValueKind::Element] {
            assert!(kind.accepts(&Value::Null));
        }
    }

    #[test]
    fn element_kind_rejects_atoms() {
        let ty = complex_of_complex();
        assert!(ty.check("y", &Value::Element(ContainerId::new(1))).is_ok());
        assert!(matches!(
            ty.check("y", &Value::from("nope")),
            Err(TransactionError::TypeMismatch { expected: ValueKind::Element, .. })
        ));
        assert!(matches!(
            ty.check("x", &Value::Element(ContainerId::new(1))),
            Err(TransactionError::TypeMismatch { expected: ValueKind::Simple, .. })
        ));
    }

    #[test]
    fn undeclared_property() {
        let err = complex_of_complex().check("z", &Value::Null).unwrap_err();
        assert_eq!(
            err.to_string(),
            "property `z` is not declared by type `ComplexOfComplex`"
        );
    }

    #[test]
    fn declaration_order_is_kept() {
        let names: Vec<_> = complex_of_complex()
            .properties()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, ["x", "y"]);
    }

    #[test]
    fn properties_use_the_crate_hasher() {
        use std::hash::BuildHasher;

        crate::enable_determinism();
        let ty = complex_of_complex();
        let expected = crate::AmbitRandomState::default();
        assert_eq!(ty.properties.hasher().hash_one("x"), expected.hash_one("x"));
    }
}
