//! crates/simricare_core/src/domain.rs
//!
//! Defines the core records of the counseling platform.
//! Records serialize with camelCase field names, matching the documents
//! stored in the collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

//=========================================================================================
// Collection Names
//=========================================================================================

pub mod collections {
    pub const CHAT_MESSAGES: &str = "chatMessages";
    pub const DAILY_RECORDS: &str = "dailyRecords";
    pub const TEST_ASSIGNMENTS: &str = "testAssignments";
    pub const TEST_RESULTS: &str = "testResults";
    pub const LOGS: &str = "logs";
    pub const USERS: &str = "users";
    pub const AUTH_SESSIONS: &str = "authSessions";
}

//=========================================================================================
// Generic Documents
//=========================================================================================

/// A schemaless document as held by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: String,
    pub collection: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An equality filter on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether `data` carries `value` under `field`.
    pub fn matches(&self, data: &Value) -> bool {
        data.get(&self.field) == Some(&self.value)
    }
}

/// Generates a fresh document id.
pub fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string()
}

//=========================================================================================
// Offline Queue
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

/// A write attempted while offline, waiting to be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedOperation {
    pub fn create(collection: impl Into<String>, payload: Value, now: DateTime<Utc>) -> Self {
        Self::new(OperationKind::Create, collection.into(), None, payload, now)
    }

    pub fn update(
        collection: impl Into<String>,
        document_id: impl Into<String>,
        payload: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(
            OperationKind::Update,
            collection.into(),
            Some(document_id.into()),
            payload,
            now,
        )
    }

    pub fn delete(
        collection: impl Into<String>,
        document_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(
            OperationKind::Delete,
            collection.into(),
            Some(document_id.into()),
            Value::Null,
            now,
        )
    }

    fn new(
        kind: OperationKind,
        collection: String,
        document_id: Option<String>,
        payload: Value,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_document_id(),
            kind,
            collection,
            document_id,
            payload,
            enqueued_at,
        }
    }
}

//=========================================================================================
// Roles and Accounts
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Counselor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Counselor => "counselor",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(UserRole::User),
            "counselor" => Some(UserRole::Counselor),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

// Represents a signed-up account - used throughout app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub account: Account,
    pub hashed_password: String,
}

// Represents a login session (bearer token / cookie)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub id: String,
    pub account_id: String,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Chat
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub timestamp: DateTime<Utc>,
}

/// Two participants always share the same room id, whichever one sends.
pub fn chat_room_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}_{b}")
    } else {
        format!("{b}_{a}")
    }
}

//=========================================================================================
// Daily Records
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecord {
    pub id: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counselor_id: Option<String>,
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller may change on an existing daily record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyRecordPatch {
    pub mood: Option<String>,
    pub content: Option<String>,
    pub notes: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyRecordFilter {
    pub date: Option<String>,
    pub client_id: Option<String>,
    pub counselor_id: Option<String>,
}

//=========================================================================================
// Test Assignments and Results
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl AssignmentStatus {
    /// An open assignment blocks a duplicate for the same client and test.
    pub fn is_open(&self) -> bool {
        matches!(self, AssignmentStatus::Assigned | AssignmentStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "assigned" => Some(AssignmentStatus::Assigned),
            "in_progress" => Some(AssignmentStatus::InProgress),
            "completed" => Some(AssignmentStatus::Completed),
            "cancelled" => Some(AssignmentStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentAction {
    Start,
    Complete,
    Cancel,
}

impl AssignmentAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "start" => Some(AssignmentAction::Start),
            "complete" => Some(AssignmentAction::Complete),
            "cancel" => Some(AssignmentAction::Cancel),
            _ => None,
        }
    }

    /// The status reached by applying this action, if the transition is legal.
    pub fn apply(&self, from: AssignmentStatus) -> Option<AssignmentStatus> {
        use AssignmentStatus::*;
        match (self, from) {
            (AssignmentAction::Start, Assigned) => Some(InProgress),
            (AssignmentAction::Complete, Assigned | InProgress) => Some(Completed),
            (AssignmentAction::Cancel, Assigned | InProgress) => Some(Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAssignment {
    pub id: String,
    pub client_id: String,
    pub counselor_id: String,
    pub test_type: String,
    pub status: AssignmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub assigned_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentFilter {
    pub client_id: Option<String>,
    pub counselor_id: Option<String>,
    pub status: Option<AssignmentStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub user_id: String,
    pub test_type: String,
    pub result: Value,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Logs
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub context: Value,
    pub received_at: DateTime<Utc>,
}

//=========================================================================================
// Sample Directory Records
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfilePatch {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub user_id: String,
    pub language: String,
    pub theme: String,
    pub email_notifications: bool,
    pub push_notifications: bool,
}

impl UserPreferences {
    pub fn defaults_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            language: "ko".to_string(),
            theme: "light".to_string(),
            email_notifications: true,
            push_notifications: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTest {
    pub id: String,
    pub user_id: String,
    pub test_type: String,
    pub title: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
    pub taken_at: DateTime<Utc>,
}
