//! Single-row compare-and-swap update

use stockade_domain::{StockadeError, Version};
use thiserror::Error;
use tracing::debug;

use crate::store::{Session, Statement, StoreError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OccError {
    #[error("{key} not found")]
    NotFound { key: String },

    /// The conditional update matched no row: the version moved on, or the
    /// statement's extra guard (e.g. a quantity floor) rejected it.
    #[error("{key} was not updated at expected version {expected}")]
    Conflict { key: String, expected: Version },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<OccError> for StockadeError {
    fn from(err: OccError) -> Self {
        match err {
            OccError::NotFound { key } => StockadeError::NotFound(key),
            OccError::Conflict { .. } => StockadeError::version_conflict(err.to_string()),
            OccError::Store(store) => store.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccOptions {
    /// Commit on success and roll back on failure. Off when the caller owns
    /// the transaction, e.g. inside a batch.
    pub commit: bool,
    /// Version token supplied by the client instead of the stored one.
    pub expected_version_override: Option<Version>,
}

impl Default for OccOptions {
    fn default() -> Self {
        Self { commit: true, expected_version_override: None }
    }
}

impl OccOptions {
    pub fn in_transaction() -> Self {
        Self { commit: false, expected_version_override: None }
    }

    #[must_use]
    pub fn expect_version(mut self, version: Option<Version>) -> Self {
        self.expected_version_override = version;
        self
    }
}

/// Versions involved in a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccCommit {
    pub expected: Version,
    pub version: Version,
}

/// Read the current version, build a conditional update for it and apply it.
///
/// `read_version` must return one row with a `version` column (NULL reads
/// as 0) or no row when the record is absent. `build_update` receives the
/// expected version and must produce an UPDATE whose predicate matches only
/// that version and which sets `version = expected + 1`.
///
/// No locks are taken and nothing is retried; a `Conflict` is for the caller
/// to act on.
///
/// # Errors
/// - `OccError::NotFound` when `read_version` returns no row
/// - `OccError::Conflict` when the update affects anything but exactly one row
/// - `OccError::Store` for session failures
pub fn occ_execute<S, B>(
    session: &mut S,
    key: &str,
    read_version: &Statement,
    build_update: B,
    options: OccOptions,
) -> Result<OccCommit, OccError>
where
    S: Session + ?Sized,
    B: FnOnce(Version) -> Statement,
{
    let Some(row) = session.query_row(read_version)? else {
        if options.commit {
            session.rollback()?;
        }
        return Err(OccError::NotFound { key: key.to_string() });
    };

    let current = Version::from_column(row.get_opt_i64("version")?);
    let expected = options.expected_version_override.unwrap_or(current);
    let update = build_update(expected);

    let affected = session.execute(&update)?;
    if affected == 1 {
        if options.commit {
            session.commit()?;
        }
        return Ok(OccCommit { expected, version: expected.next() });
    }

    debug!(
        key,
        statement = update.label,
        expected = expected.get(),
        current = current.get(),
        affected,
        "Conditional update rejected"
    );
    if options.commit {
        session.rollback()?;
    }
    Err(OccError::Conflict { key: key.to_string(), expected })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::store::{Row, SqlValue};

    /// Replays canned responses and records what the executor did.
    #[derive(Default)]
    struct ScriptedSession {
        rows: VecDeque<Option<Row>>,
        affected: VecDeque<usize>,
        executed: Vec<Statement>,
        commits: usize,
        rollbacks: usize,
    }

    impl Session for ScriptedSession {
        fn query(&mut self, _statement: &Statement) -> Result<Vec<Row>, StoreError> {
            Ok(self.rows.pop_front().flatten().into_iter().collect())
        }

        fn execute(&mut self, statement: &Statement) -> Result<usize, StoreError> {
            self.executed.push(statement.clone());
            Ok(self.affected.pop_front().unwrap_or(0))
        }

        fn commit(&mut self) -> Result<(), StoreError> {
            self.commits += 1;
            Ok(())
        }

        fn rollback(&mut self) -> Result<(), StoreError> {
            self.rollbacks += 1;
            Ok(())
        }
    }

    fn read() -> Statement {
        Statement::new("test.read_version", "SELECT version FROM t WHERE id = :id").bind(":id", 1_i64)
    }

    fn update(expected: Version) -> Statement {
        Statement::new("test.update", "UPDATE t SET version = :new_version")
            .bind(":expected_version", expected.get())
            .bind(":new_version", expected.next().get())
    }

    #[test]
    fn test_success_bumps_version_and_commits() {
        let mut session = ScriptedSession::default();
        session.rows.push_back(Some(Row::new().with("version", 3_i64)));
        session.affected.push_back(1);

        let commit =
            occ_execute(&mut session, "item 1", &read(), update, OccOptions::default()).unwrap();

        assert_eq!(commit, OccCommit { expected: Version(3), version: Version(4) });
        assert_eq!(session.commits, 1);
        assert_eq!(session.executed[0].param(":new_version"), Some(&SqlValue::Integer(4)));
    }

    #[test]
    fn test_null_version_reads_as_zero() {
        let mut session = ScriptedSession::default();
        session.rows.push_back(Some(Row::new().with("version", SqlValue::Null)));
        session.affected.push_back(1);

        let commit =
            occ_execute(&mut session, "item 1", &read(), update, OccOptions::default()).unwrap();
        assert_eq!(commit.version, Version(1));
    }

    #[test]
    fn test_missing_row_is_not_found() {
        let mut session = ScriptedSession::default();
        session.rows.push_back(None);

        let err = occ_execute(&mut session, "item 9", &read(), update, OccOptions::default())
            .unwrap_err();
        assert_eq!(err, OccError::NotFound { key: "item 9".into() });
        assert!(session.executed.is_empty());
    }

    #[test]
    fn test_zero_rows_is_conflict_and_rolls_back() {
        let mut session = ScriptedSession::default();
        session.rows.push_back(Some(Row::new().with("version", 5_i64)));
        session.affected.push_back(0);

        let err = occ_execute(&mut session, "item 1", &read(), update, OccOptions::default())
            .unwrap_err();
        assert_eq!(err, OccError::Conflict { key: "item 1".into(), expected: Version(5) });
        assert_eq!(session.rollbacks, 1);
        assert_eq!(session.commits, 0);
    }

    /// Validates a client-supplied version token is used instead of the
    /// stored one, and that the caller's transaction is left alone.
    #[test]
    fn test_override_in_caller_transaction() {
        let mut session = ScriptedSession::default();
        session.rows.push_back(Some(Row::new().with("version", 7_i64)));
        session.affected.push_back(0);

        let options = OccOptions::in_transaction().expect_version(Some(Version(6)));
        let err = occ_execute(&mut session, "item 1", &read(), update, options).unwrap_err();

        assert_eq!(err, OccError::Conflict { key: "item 1".into(), expected: Version(6) });
        assert_eq!(session.executed[0].param(":expected_version"), Some(&SqlValue::Integer(6)));
        assert_eq!(session.rollbacks, 0);
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let err: StockadeError =
            OccError::Conflict { key: "product 3".into(), expected: Version(1) }.into();
        assert_eq!(err.status_code(), 409);
    }
}
