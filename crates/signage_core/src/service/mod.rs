//! Core use-case services.
//!
//! # Responsibility
//! - Validate counterpart ids and mutate link sets atomically.
//! - Project link state back into read models.
//! - Keep callers decoupled from SQL and transaction handling.

pub mod association_engine;
pub mod catalog_service;
pub mod link_validator;
pub mod projection;
