//! Counterpart id resolution.
//!
//! # Responsibility
//! - Confirm every requested counterpart id names a live entity.
//!
//! # Invariants
//! - Input ids are treated as a set; duplicates never cause a mismatch.
//! - On mismatch every unresolved id is reported, sorted ascending.
//! - Resolution has no side effects.

use crate::model::entity::{Entity, EntityKind};
use crate::repo::entity_repo::EntityStore;
use crate::service::association_engine::{AssociationError, AssociationResult};
use std::collections::BTreeSet;

/// De-duplicates caller-provided ids.
pub fn dedup_ids(ids: &[i64]) -> BTreeSet<i64> {
    ids.iter().copied().collect()
}

/// Resolves counterpart ids against an entity store.
pub struct LinkValidator<'store, S: EntityStore> {
    store: &'store S,
}

impl<'store, S: EntityStore> LinkValidator<'store, S> {
    pub fn new(store: &'store S) -> Self {
        Self { store }
    }

    /// Returns the live entities for `ids`, ordered by id.
    ///
    /// # Errors
    /// - `ValidationFailed` when any id is unknown or archived.
    pub fn resolve(&self, kind: EntityKind, ids: &BTreeSet<i64>) -> AssociationResult<Vec<Entity>> {
        let resolved = self.store.get_many(kind, ids)?;
        if resolved.len() == ids.len() {
            return Ok(resolved);
        }

        let found: BTreeSet<i64> = resolved.iter().map(Entity::id).collect();
        let missing = ids.difference(&found).copied().collect();
        Err(AssociationError::ValidationFailed { kind, missing })
    }
}
