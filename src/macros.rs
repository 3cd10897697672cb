// (c) Copyright 2025 Helsing GmbH. All rights reserved.
/// Convenience macro for the initial property values of a complex.
///
/// Expands to a `Vec<(String, Value)>`, which also gives `props! {}` a concrete type.
///
/// ```rust
/// # use ambit::{props, ComplexType, Context, ValueKind};
/// # use std::rc::Rc;
/// let ctx = Context::new();
/// let ty = Rc::new(
///     ComplexType::new("Point")
///         .property("x", ValueKind::Simple)
///         .property("y", ValueKind::Simple),
/// );
/// let point = ctx.create_complex(&ty, props! { "x" => 1.0, "y" => 2.0 })?;
/// let origin = ctx.create_complex(&ty, props! {})?;
/// # Ok::<(), ambit::TransactionError>(())
/// ```
#[macro_export]
macro_rules! props {
    () => {
        ::std::vec::Vec::<(::std::string::String, $crate::Value)>::new()
    };
    ($($k:expr => $v:expr),+ $(,)?) => {
        ::std::vec![
            $( (::std::string::String::from($k), $crate::Value::from($v)) ),+
        ]
    };
}

/// Convenience macro for declaring a [`ComplexType`](crate::ComplexType).
///
/// Property kinds name a [`ValueKind`](crate::ValueKind) variant. The type is wrapped in an
/// `Rc`, ready to be passed to [`Context::create_complex`](crate::Context::create_complex).
///
/// ```rust
/// # use ambit::complex_type;
/// let ty = complex_type!("Derived" { "x": Simple, "y": Element });
/// assert_eq!(ty.properties().count(), 2);
/// ```
#[macro_export]
macro_rules! complex_type {
    ($name:literal { $($prop:literal : $kind:ident),* $(,)? }) => {
        ::std::rc::Rc::new(
            $crate::ComplexType::new($name)
                $( .property($prop, $crate::ValueKind::$kind) )*
        )
    };
}
