// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Ambit: Ambient Transactions for Typed Object Models
//!
//! This crate provides the change-tracking engine of a typed object model. Containers (records
//! with declared properties, called *complexes*, and ordered *lists*) are mutated under an
//! **ambient transaction**, and every read sees the uncommitted changes of that transaction.
//! When the transaction is accepted, its changes become the new committed state at once; when it
//! is rejected, they vanish as if they had never been made.
//!
//! ## Core Concepts
//!
//! - [`Context`]: The shared state of one object model: the committed containers and the stack
//!   of entered scopes. Every operation goes through a context.
//! - [`Transaction`]: The unit of work. It owns one [`Changeset`] per container it has touched.
//! - [`TransactionScope`]: Controls which transaction is *current*. Scopes nest strictly; only
//!   the root scope of a transaction may commit it.
//! - [`Change`]: A single primitive mutation: a property replacement, or a list add, remove,
//!   move or clear.
//! - [`Reference`]: A backward edge from an element (a container held by another container) to
//!   the slot holding it. References are kept in sync with changes, speculatively while a
//!   transaction is open.
//!
//! ## Getting Started
//!
//! ```rust
//! use ambit::{complex_type, props, Context, Reference};
//!
//! let ctx = Context::new();
//! let node = complex_type!("Node" { "label": Simple, "child": Element });
//! let leaf = ctx.create_complex(&node, props! { "label" => "leaf" })?;
//! let root = ctx.create_complex(&node, props! { "label" => "root" })?;
//!
//! // 1. OPEN A TRANSACTION
//! let scope = ctx.enter()?;
//! ctx.set(root, "child", leaf)?;
//!
//! // 2. AMBIENT READS
//! // Inside the transaction, the change and its reference are visible...
//! assert_eq!(ctx.get(root, "child")?, leaf.into());
//! assert_eq!(ctx.references(leaf)?, [Reference::property(root, "child")]);
//! // ...but committed state is untouched.
//! assert!(ctx.committed_value(root, "child")?.is_null());
//!
//! // 3. COMMIT
//! scope.accept()?;
//! assert_eq!(ctx.committed_value(root, "child")?, leaf.into());
//! # Ok::<(), ambit::TransactionError>(())
//! ```
//!
//! Writes made while no transaction is current run in an implicit transaction that commits
//! immediately. See the [`transaction`] module documentation for nesting, rejection and
//! optimistic concurrency.
//!
//! ## Validation and Observation
//!
//! Transactions accept will-commit validators ([`Transaction::add_will_commit`]) that may veto
//! a commit. The [`Sentinel`](crate::sentinel::Sentinel) trait additionally lets callers observe
//! or validate every single change right before it is applied.
//!
//! ## Features
//!
//! - `json`: Enables rendering containers as `serde_json::Value`. This feature is enabled by
//!   default.
//! - `serde`: Provides `serde` support for values, identifiers, references and changes.
//! - `arbitrary`: Implements `quickcheck::Arbitrary` for [`Value`], useful for property-based
//!   testing.
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

use ahash::RandomState;
use std::{
    hash::BuildHasher,
    sync::atomic::{AtomicBool, Ordering},
};

// Use a constant seed for hashing to make performance benchmarks have less variance.
pub(crate) const DETERMINISTIC_HASHER: RandomState = RandomState::with_seeds(48, 1516, 23, 42);

pub mod change;
pub use change::{Add, Change, ChangeKind, Move, Remove, Replace};
pub mod changeset;
pub use changeset::{ChangeKey, Changeset};
pub mod error;
pub use error::{RejectReason, TransactionError, TransactionResult};
mod references;
pub use references::Reference;
mod resolve;
mod store;
/// Ambient transactions, scopes and the context they live in.
///
/// See [`transaction`] module documentation for details and examples.
pub mod transaction;
pub use transaction::{
    Context, ExitOptions, ScopeId, Transaction, TransactionId, TransactionScope, TransactionState,
};
pub mod types;
pub use types::{ComplexType, PropertyType, ValueKind};
pub mod value;
pub use value::{ContainerId, Value};
#[cfg(feature = "json")]
mod json;
/// Macros usable for tests and initialization
pub mod macros;
pub mod sentinel;

static ENABLE_DETERMINISM: AtomicBool = AtomicBool::new(false);

/// Makes all data structures behave deterministically.
///
/// This should only be enabled for testing, as it increases the odds of DoS
/// scenarios.
#[doc(hidden)]
pub fn enable_determinism() {
    ENABLE_DETERMINISM.store(true, Ordering::Release);
}

/// Checks if determinism is enabled.
///
/// Should be used internally and for testing.
#[doc(hidden)]
pub fn determinism_enabled() -> bool {
    ENABLE_DETERMINISM.load(Ordering::Acquire)
}

/// Create a random state for a hashmap.
/// If `enable_determinism` has been used, this will return a deterministic
/// decidedly non-random RandomState, useful in tests.
#[inline]
fn make_random_state() -> RandomState {
    if determinism_enabled() {
        DETERMINISTIC_HASHER
    } else {
        RandomState::new()
    }
}

fn create_map<K, V>() -> std::collections::HashMap<K, V, AmbitRandomState> {
    std::collections::HashMap::with_hasher(AmbitRandomState::default())
}

/// An insertion-ordered map hashed with [`AmbitRandomState`].
pub(crate) type OrderedMap<K, V> = indexmap::IndexMap<K, V, AmbitRandomState>;

fn create_ordered_map<K, V>() -> OrderedMap<K, V> {
    OrderedMap::with_hasher(AmbitRandomState::default())
}

/// A small wrapper around the ahash RandomState, so that tests can switch every map of the
/// crate to a deterministic hasher.
#[derive(Clone)]
pub struct AmbitRandomState {
    inner: RandomState,
}

impl Default for AmbitRandomState {
    #[inline]
    fn default() -> Self {
        Self {
            inner: make_random_state(),
        }
    }
}

impl BuildHasher for AmbitRandomState {
    type Hasher = <RandomState as BuildHasher>::Hasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        self.inner.build_hasher()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determinism_fixes_the_hasher() {
        enable_determinism();
        let a = AmbitRandomState::default();
        let b = AmbitRandomState::default();
        assert_eq!(a.hash_one("ambit"), b.hash_one("ambit"));
    }
}
