//! crates/simricare_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete document store, browser storage, or clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::{
    Account, AccountCredentials, AssignmentAction, AssignmentFilter, ChatMessage, DailyRecord,
    DailyRecordFilter, DailyRecordPatch, FieldFilter, LogEntry, StoredDocument, TestAssignment,
    TestResult, UserPreferences, UserProfile, UserProfilePatch, UserRole, UserTest,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, storage).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl From<serde_json::Error> for PortError {
    fn from(e: serde_json::Error) -> Self {
        PortError::Unexpected(format!("serialization failed: {e}"))
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Infrastructure Ports (Traits)
//=========================================================================================

/// A Firestore-like store of schemaless JSON documents grouped by collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a document. With `id` set this is an upsert ("set"), otherwise
    /// a fresh id is generated ("add").
    async fn insert(
        &self,
        collection: &str,
        id: Option<&str>,
        data: Value,
    ) -> PortResult<StoredDocument>;

    async fn get(&self, collection: &str, id: &str) -> PortResult<StoredDocument>;

    /// Shallow-merges `patch` into an existing document.
    async fn update(&self, collection: &str, id: &str, patch: Value)
        -> PortResult<StoredDocument>;

    async fn delete(&self, collection: &str, id: &str) -> PortResult<()>;

    /// Returns every document matching all `filters`, in insertion order.
    async fn query(&self, collection: &str, filters: &[FieldFilter])
        -> PortResult<Vec<StoredDocument>>;
}

/// Browser-style synchronous key/value persistence (`localStorage`).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> PortResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> PortResult<()>;
    fn remove(&self, key: &str) -> PortResult<()>;
    fn keys(&self) -> PortResult<Vec<String>>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Reports whether the host currently has connectivity.
pub trait NetworkStatus: Send + Sync {
    fn is_online(&self) -> bool;
}

//=========================================================================================
// Collection Repositories (Traits)
//=========================================================================================

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn save_message(&self, message: ChatMessage) -> PortResult<ChatMessage>;

    async fn messages_in_room(&self, room_id: &str) -> PortResult<Vec<ChatMessage>>;

    /// Messages the user sent or received, oldest first.
    async fn messages_for_user(&self, user_id: &str) -> PortResult<Vec<ChatMessage>>;

    async fn mark_read(&self, message_id: &str) -> PortResult<ChatMessage>;
}

#[async_trait]
pub trait DailyRecordRepository: Send + Sync {
    async fn save_record(&self, record: DailyRecord) -> PortResult<DailyRecord>;

    async fn find_records(&self, filter: &DailyRecordFilter) -> PortResult<Vec<DailyRecord>>;

    async fn update_record(
        &self,
        record_id: &str,
        patch: DailyRecordPatch,
        now: DateTime<Utc>,
    ) -> PortResult<DailyRecord>;
}

#[async_trait]
pub trait TestAssignmentRepository: Send + Sync {
    /// Stores a new assignment. Fails with `Conflict` when the same client,
    /// counselor and test type already have an open assignment.
    async fn assign(&self, assignment: TestAssignment) -> PortResult<TestAssignment>;

    async fn find_assignments(&self, filter: &AssignmentFilter)
        -> PortResult<Vec<TestAssignment>>;

    /// Applies a status action. Fails with `Invalid` on an illegal transition.
    async fn apply_action(
        &self,
        assignment_id: &str,
        action: AssignmentAction,
        now: DateTime<Utc>,
    ) -> PortResult<TestAssignment>;
}

#[async_trait]
pub trait TestResultRepository: Send + Sync {
    async fn save_result(&self, result: TestResult) -> PortResult<TestResult>;

    async fn results_for_user(&self, user_id: &str) -> PortResult<Vec<TestResult>>;
}

#[async_trait]
pub trait LogRepository: Send + Sync {
    async fn append_log(&self, entry: LogEntry) -> PortResult<LogEntry>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create_account(
        &self,
        email: &str,
        name: Option<&str>,
        hashed_password: &str,
    ) -> PortResult<Account>;

    async fn get_account_by_email(&self, email: &str) -> PortResult<AccountCredentials>;

    async fn get_account(&self, account_id: &str) -> PortResult<Account>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        account_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a live session to its account id.
    async fn validate_auth_session(&self, session_id: &str, now: DateTime<Utc>)
        -> PortResult<String>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

/// Sample user data served by the admin and profile endpoints.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_users(&self) -> PortResult<Vec<UserProfile>>;

    async fn get_user(&self, user_id: &str) -> PortResult<UserProfile>;

    async fn update_user(&self, user_id: &str, patch: UserProfilePatch)
        -> PortResult<UserProfile>;

    async fn set_role(&self, user_id: &str, role: UserRole) -> PortResult<UserProfile>;

    async fn preferences(&self, user_id: &str) -> PortResult<UserPreferences>;

    async fn save_preferences(&self, preferences: UserPreferences)
        -> PortResult<UserPreferences>;

    async fn tests_for_user(&self, user_id: &str) -> PortResult<Vec<UserTest>>;
}
