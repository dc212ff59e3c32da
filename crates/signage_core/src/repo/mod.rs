//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes validate model fields before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `UniqueViolation`)
//!   in addition to DB transport errors.
//! - Repositories borrow a plain `Connection`, so they run unchanged inside
//!   a `UnitOfWork`.

use crate::db::DbError;
use crate::model::entity::{EntityKind, ModelValidationError};
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod entity_repo;
pub mod link_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Upper bound on ids bound into one `IN (...)` list. Kept well under
/// SQLite's host-parameter limit so callers can pass id sets of any size.
pub(crate) const MAX_BOUND_IDS: usize = 500;

/// Generic repository error for entity and link persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(ModelValidationError),
    Db(DbError),
    NotFound { kind: EntityKind, id: i64 },
    /// A storage-level unique index rejected the write.
    UniqueViolation(&'static str),
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::UniqueViolation(index) => write!(f, "unique constraint violated: {index}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Returns whether `err` is a UNIQUE / PRIMARY KEY constraint rejection.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
        }
        _ => false,
    }
}

pub(crate) fn ensure_tables_ready(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    for &table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

pub(crate) fn parse_flag(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

/// Splits an ascending id set into bind-value batches of `MAX_BOUND_IDS`.
pub(crate) fn id_batches(ids: &BTreeSet<i64>) -> Vec<Vec<Value>> {
    let values: Vec<Value> = ids.iter().map(|id| Value::Integer(*id)).collect();
    values
        .chunks(MAX_BOUND_IDS)
        .map(<[Value]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{id_batches, MAX_BOUND_IDS};
    use rusqlite::types::Value;
    use std::collections::BTreeSet;

    #[test]
    fn id_batches_keep_ascending_order_and_cap_size() {
        let ids: BTreeSet<i64> = (1..=(MAX_BOUND_IDS as i64 * 2 + 1)).rev().collect();

        let batches = id_batches(&ids);

        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|batch| batch.len() <= MAX_BOUND_IDS));
        assert_eq!(batches[0][0], Value::Integer(1));
        assert_eq!(batches[2], vec![Value::Integer(MAX_BOUND_IDS as i64 * 2 + 1)]);
    }

    #[test]
    fn empty_id_set_has_no_batches() {
        assert!(id_batches(&BTreeSet::new()).is_empty());
    }
}
