//! Structured error types for hierarchy, dependency and baseline operations.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Referenced node, edge or baseline does not exist.
    NotFound,
    /// Self-reference, cycle or malformed input.
    Validation,
    /// Move into own subtree, duplicate edge, duplicate baseline number.
    Conflict,

    // Infrastructure
    DatabaseError,
    InternalError,
}

/// Structured error surfaced by every public store operation.
#[derive(Debug, Serialize)]
pub struct PlanError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl PlanError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn not_found(kind: &str, id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found: {}", kind, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::Validation, reason).with_field(field)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn move_into_own_subtree(kind: &str, node_id: i64, target_id: i64) -> Self {
        let message = if node_id == target_id {
            format!("cannot move {} {} under itself", kind, node_id)
        } else {
            format!(
                "cannot move {} {} under its own descendant {}",
                kind, node_id, target_id
            )
        };
        Self::conflict(message)
    }

    pub fn self_dependency(task_id: i64) -> Self {
        Self::validation(format!("task {} cannot depend on itself", task_id))
    }

    pub fn duplicate_dependency(predecessor_id: i64, successor_id: i64) -> Self {
        Self::conflict(format!(
            "dependency {} -> {} already exists",
            predecessor_id, successor_id
        ))
    }

    pub fn dependency_cycle(predecessor_id: i64, successor_id: i64) -> Self {
        Self::validation(format!(
            "adding dependency {} -> {} would create a cycle",
            predecessor_id, successor_id
        ))
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }

    pub fn is_validation(&self) -> bool {
        self.code == ErrorCode::Validation
    }

    pub fn is_conflict(&self) -> bool {
        self.code == ErrorCode::Conflict
    }
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PlanError {}

impl From<rusqlite::Error> for PlanError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ffi;

        match &err {
            rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
                match e.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        PlanError::conflict("uniqueness constraint violated").with_details(err.to_string())
                    }
                    _ => PlanError::validation("constraint violation").with_details(err.to_string()),
                }
            }
            _ => PlanError::database(&err),
        }
    }
}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for PlanError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<PlanError>() {
            Ok(plan_err) => plan_err,
            Err(err) => match err.downcast::<rusqlite::Error>() {
                Ok(sql_err) => PlanError::from(sql_err),
                Err(err) => PlanError::internal(err),
            },
        }
    }
}

/// Result type for store operations.
pub type PlanResult<T> = std::result::Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anyhow_roundtrip_keeps_code() {
        let err: anyhow::Error = PlanError::not_found("task", 7).into();
        let back = PlanError::from(err);
        assert_eq!(back.code, ErrorCode::NotFound);
        assert_eq!(back.message, "task not found: 7");
    }

    #[test]
    fn test_plain_anyhow_becomes_internal() {
        let back = PlanError::from(anyhow::anyhow!("boom"));
        assert_eq!(back.code, ErrorCode::InternalError);
        assert_eq!(back.to_string(), "boom");
    }

    #[test]
    fn test_sql_errors_map_to_database() {
        let err: anyhow::Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(PlanError::from(err).code, ErrorCode::DatabaseError);
    }

    #[test]
    fn test_constraint_violations_by_kind() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (
                 id INTEGER PRIMARY KEY,
                 parent_id INTEGER NOT NULL REFERENCES parent(id),
                 code TEXT UNIQUE,
                 qty INTEGER CHECK (qty >= 0)
             );
             INSERT INTO parent (id) VALUES (1);
             INSERT INTO child (id, parent_id, code, qty) VALUES (1, 1, 'a', 0);",
        )
        .unwrap();
        let code_of = |sql: &str| PlanError::from(conn.execute(sql, []).unwrap_err()).code;

        assert_eq!(code_of("INSERT INTO child (id, parent_id) VALUES (1, 1)"), ErrorCode::Conflict);
        assert_eq!(code_of("INSERT INTO child (parent_id, code) VALUES (1, 'a')"), ErrorCode::Conflict);
        assert_eq!(code_of("INSERT INTO child (parent_id) VALUES (99)"), ErrorCode::Validation);
        assert_eq!(code_of("INSERT INTO child (parent_id, qty) VALUES (1, -1)"), ErrorCode::Validation);
        assert_eq!(code_of("INSERT INTO child (parent_id) VALUES (NULL)"), ErrorCode::Validation);
    }

    #[test]
    fn test_move_messages() {
        assert_eq!(
            PlanError::move_into_own_subtree("task", 4, 9).message,
            "cannot move task 4 under its own descendant 9"
        );
        assert_eq!(
            PlanError::move_into_own_subtree("department", 3, 3).message,
            "cannot move department 3 under itself"
        );
    }

    #[test]
    fn test_serialize_code() {
        let err = PlanError::invalid_value("lag_days", "lag out of range");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "VALIDATION");
        assert_eq!(json["field"], "lag_days");
        assert!(json.get("details").is_none());
    }
}
