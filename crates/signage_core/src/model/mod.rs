//! Domain model for scheduled content, sites and their links.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Describe both many-to-many relations with one direction-based scheme.
//!
//! # Invariants
//! - Entities are identified by storage-assigned integer ids.
//! - Links never outlive either endpoint.

pub mod entity;
pub mod link;
