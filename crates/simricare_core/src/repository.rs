//! crates/simricare_core/src/repository.rs
//!
//! Typed collection repositories implemented on top of any `DocumentStore`.
//! Records are stored without their `id` field, which lives in the document key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::domain::{
    collections, new_document_id, Account, AccountCredentials, AssignmentAction,
    AssignmentFilter, AssignmentStatus, AuthSession, ChatMessage, DailyRecord, DailyRecordFilter,
    DailyRecordPatch, FieldFilter, LogEntry, StoredDocument, TestAssignment, TestResult,
};
use crate::ports::{
    AccountRepository, ChatRepository, DailyRecordRepository, DocumentStore, LogRepository,
    PortError, PortResult, TestAssignmentRepository, TestResultRepository,
};

/// Every collection repository, backed by one shared document store.
#[derive(Clone)]
pub struct DocumentRepositories {
    store: Arc<dyn DocumentStore>,
}

impl DocumentRepositories {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }
}

fn to_data<T: Serialize>(record: &T) -> PortResult<Value> {
    let mut value = serde_json::to_value(record)?;
    if let Value::Object(map) = &mut value {
        map.remove("id");
    }
    Ok(value)
}

fn from_document<T: DeserializeOwned>(doc: StoredDocument) -> PortResult<T> {
    let mut data = doc.data;
    match &mut data {
        Value::Object(map) => {
            map.insert("id".to_string(), Value::String(doc.id));
        }
        _ => {
            return Err(PortError::Unexpected(format!(
                "document {}/{} is not an object",
                doc.collection, doc.id
            )))
        }
    }
    Ok(serde_json::from_value(data)?)
}

fn from_documents<T: DeserializeOwned>(docs: Vec<StoredDocument>) -> PortResult<Vec<T>> {
    docs.into_iter().map(from_document).collect()
}

//=========================================================================================
// Chat Messages
//=========================================================================================

#[async_trait]
impl ChatRepository for DocumentRepositories {
    async fn save_message(&self, message: ChatMessage) -> PortResult<ChatMessage> {
        let doc = self
            .store
            .insert(collections::CHAT_MESSAGES, Some(&message.id), to_data(&message)?)
            .await?;
        from_document(doc)
    }

    async fn messages_in_room(&self, room_id: &str) -> PortResult<Vec<ChatMessage>> {
        let docs = self
            .store
            .query(
                collections::CHAT_MESSAGES,
                &[FieldFilter::eq("roomId", room_id)],
            )
            .await?;
        let mut messages: Vec<ChatMessage> = from_documents(docs)?;
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn messages_for_user(&self, user_id: &str) -> PortResult<Vec<ChatMessage>> {
        let sent = self
            .store
            .query(
                collections::CHAT_MESSAGES,
                &[FieldFilter::eq("senderId", user_id)],
            )
            .await?;
        let received = self
            .store
            .query(
                collections::CHAT_MESSAGES,
                &[FieldFilter::eq("receiverId", user_id)],
            )
            .await?;

        let mut messages: Vec<ChatMessage> = from_documents(sent)?;
        for message in from_documents::<ChatMessage>(received)? {
            // Messages to oneself show up in both queries.
            if !messages.iter().any(|m| m.id == message.id) {
                messages.push(message);
            }
        }
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn mark_read(&self, message_id: &str) -> PortResult<ChatMessage> {
        let doc = self
            .store
            .update(collections::CHAT_MESSAGES, message_id, json!({ "read": true }))
            .await?;
        from_document(doc)
    }
}

//=========================================================================================
// Daily Records
//=========================================================================================

#[async_trait]
impl DailyRecordRepository for DocumentRepositories {
    async fn save_record(&self, record: DailyRecord) -> PortResult<DailyRecord> {
        let doc = self
            .store
            .insert(collections::DAILY_RECORDS, Some(&record.id), to_data(&record)?)
            .await?;
        from_document(doc)
    }

    async fn find_records(&self, filter: &DailyRecordFilter) -> PortResult<Vec<DailyRecord>> {
        let mut filters = Vec::new();
        if let Some(date) = &filter.date {
            filters.push(FieldFilter::eq("date", date.as_str()));
        }
        if let Some(client_id) = &filter.client_id {
            filters.push(FieldFilter::eq("clientId", client_id.as_str()));
        }
        if let Some(counselor_id) = &filter.counselor_id {
            filters.push(FieldFilter::eq("counselorId", counselor_id.as_str()));
        }

        let docs = self.store.query(collections::DAILY_RECORDS, &filters).await?;
        let mut records: Vec<DailyRecord> = from_documents(docs)?;
        // Newest day first, then newest entry within a day.
        records.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(records)
    }

    async fn update_record(
        &self,
        record_id: &str,
        patch: DailyRecordPatch,
        now: DateTime<Utc>,
    ) -> PortResult<DailyRecord> {
        let mut fields = Map::new();
        if let Some(mood) = patch.mood {
            fields.insert("mood".to_string(), Value::String(mood));
        }
        if let Some(content) = patch.content {
            fields.insert("content".to_string(), Value::String(content));
        }
        if let Some(notes) = patch.notes {
            fields.insert("notes".to_string(), Value::String(notes));
        }
        if let Some(date) = patch.date {
            fields.insert("date".to_string(), Value::String(date));
        }
        fields.insert("updatedAt".to_string(), serde_json::to_value(now)?);

        let doc = self
            .store
            .update(collections::DAILY_RECORDS, record_id, Value::Object(fields))
            .await?;
        from_document(doc)
    }
}

//=========================================================================================
// Test Assignments
//=========================================================================================

#[async_trait]
impl TestAssignmentRepository for DocumentRepositories {
    async fn assign(&self, assignment: TestAssignment) -> PortResult<TestAssignment> {
        let existing = self
            .store
            .query(
                collections::TEST_ASSIGNMENTS,
                &[
                    FieldFilter::eq("clientId", assignment.client_id.as_str()),
                    FieldFilter::eq("counselorId", assignment.counselor_id.as_str()),
                    FieldFilter::eq("testType", assignment.test_type.as_str()),
                ],
            )
            .await?;
        let existing: Vec<TestAssignment> = from_documents(existing)?;
        if let Some(open) = existing.iter().find(|a| a.status.is_open()) {
            debug!(assignment_id = %open.id, "duplicate test assignment rejected");
            return Err(PortError::Conflict(format!(
                "test '{}' is already assigned to client {} ({})",
                assignment.test_type,
                assignment.client_id,
                open.status.as_str()
            )));
        }

        let doc = self
            .store
            .insert(
                collections::TEST_ASSIGNMENTS,
                Some(&assignment.id),
                to_data(&assignment)?,
            )
            .await?;
        from_document(doc)
    }

    async fn find_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> PortResult<Vec<TestAssignment>> {
        let mut filters = Vec::new();
        if let Some(client_id) = &filter.client_id {
            filters.push(FieldFilter::eq("clientId", client_id.as_str()));
        }
        if let Some(counselor_id) = &filter.counselor_id {
            filters.push(FieldFilter::eq("counselorId", counselor_id.as_str()));
        }
        if let Some(status) = filter.status {
            filters.push(FieldFilter::eq("status", status.as_str()));
        }

        let docs = self
            .store
            .query(collections::TEST_ASSIGNMENTS, &filters)
            .await?;
        let mut assignments: Vec<TestAssignment> = from_documents(docs)?;
        assignments.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));
        Ok(assignments)
    }

    async fn apply_action(
        &self,
        assignment_id: &str,
        action: AssignmentAction,
        now: DateTime<Utc>,
    ) -> PortResult<TestAssignment> {
        let doc = self
            .store
            .get(collections::TEST_ASSIGNMENTS, assignment_id)
            .await?;
        let current: TestAssignment = from_document(doc)?;

        let next = action.apply(current.status).ok_or_else(|| {
            PortError::Invalid(format!(
                "cannot {:?} an assignment that is {}",
                action,
                current.status.as_str()
            ))
        })?;

        let mut patch = json!({ "status": next.as_str() });
        match next {
            AssignmentStatus::InProgress => patch["startedAt"] = serde_json::to_value(now)?,
            AssignmentStatus::Completed => patch["completedAt"] = serde_json::to_value(now)?,
            _ => {}
        }

        let doc = self
            .store
            .update(collections::TEST_ASSIGNMENTS, assignment_id, patch)
            .await?;
        from_document(doc)
    }
}

//=========================================================================================
// Test Results and Logs
//=========================================================================================

#[async_trait]
impl TestResultRepository for DocumentRepositories {
    async fn save_result(&self, result: TestResult) -> PortResult<TestResult> {
        let doc = self
            .store
            .insert(collections::TEST_RESULTS, Some(&result.id), to_data(&result)?)
            .await?;
        from_document(doc)
    }

    async fn results_for_user(&self, user_id: &str) -> PortResult<Vec<TestResult>> {
        let docs = self
            .store
            .query(
                collections::TEST_RESULTS,
                &[FieldFilter::eq("userId", user_id)],
            )
            .await?;
        let mut results: Vec<TestResult> = from_documents(docs)?;
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(results)
    }
}

#[async_trait]
impl LogRepository for DocumentRepositories {
    async fn append_log(&self, entry: LogEntry) -> PortResult<LogEntry> {
        let doc = self
            .store
            .insert(collections::LOGS, Some(&entry.id), to_data(&entry)?)
            .await?;
        from_document(doc)
    }
}

//=========================================================================================
// Accounts and Auth Sessions
//=========================================================================================

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[async_trait]
impl AccountRepository for DocumentRepositories {
    async fn create_account(
        &self,
        email: &str,
        name: Option<&str>,
        hashed_password: &str,
    ) -> PortResult<Account> {
        let email = normalize_email(email);
        let existing = self
            .store
            .query(collections::USERS, &[FieldFilter::eq("email", email.as_str())])
            .await?;
        if !existing.is_empty() {
            return Err(PortError::Conflict(format!("email {email} is already registered")));
        }

        let account = Account {
            id: new_document_id(),
            email,
            name: name.map(str::to_string),
            created_at: Utc::now(),
        };
        let mut data = to_data(&account)?;
        data["hashedPassword"] = Value::String(hashed_password.to_string());

        let doc = self
            .store
            .insert(collections::USERS, Some(&account.id), data)
            .await?;
        from_document(doc)
    }

    async fn get_account_by_email(&self, email: &str) -> PortResult<AccountCredentials> {
        let email = normalize_email(email);
        let doc = self
            .store
            .query(collections::USERS, &[FieldFilter::eq("email", email.as_str())])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PortError::NotFound(format!("Account {email} not found")))?;

        let hashed_password = doc
            .data
            .get("hashedPassword")
            .and_then(Value::as_str)
            .ok_or_else(|| PortError::Unexpected(format!("account {} has no password", doc.id)))?
            .to_string();

        Ok(AccountCredentials {
            account: from_document(doc)?,
            hashed_password,
        })
    }

    async fn get_account(&self, account_id: &str) -> PortResult<Account> {
        let doc = self.store.get(collections::USERS, account_id).await?;
        from_document(doc)
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        account_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let session = AuthSession {
            id: session_id.to_string(),
            account_id: account_id.to_string(),
            expires_at,
        };
        self.store
            .insert(collections::AUTH_SESSIONS, Some(session_id), to_data(&session)?)
            .await?;
        Ok(())
    }

    async fn validate_auth_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> PortResult<String> {
        let doc = match self.store.get(collections::AUTH_SESSIONS, session_id).await {
            Ok(doc) => doc,
            Err(PortError::NotFound(_)) => return Err(PortError::Unauthorized),
            Err(e) => return Err(e),
        };
        let session: AuthSession = from_document(doc)?;

        if session.expires_at <= now {
            debug!(account_id = %session.account_id, "auth session expired");
            self.store
                .delete(collections::AUTH_SESSIONS, session_id)
                .await?;
            return Err(PortError::Unauthorized);
        }
        Ok(session.account_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.store
            .delete(collections::AUTH_SESSIONS, session_id)
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// Minimal in-process document store for exercising the repositories.
    #[derive(Default)]
    pub(crate) struct FakeStore {
        docs: Mutex<Vec<StoredDocument>>,
        pub(crate) fail_on: Mutex<HashMap<String, usize>>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl FakeStore {
        pub(crate) async fn fail_collection(&self, collection: &str, times: usize) {
            self.fail_on.lock().await.insert(collection.to_string(), times);
        }

        async fn check(&self, op: &str, collection: &str) -> PortResult<()> {
            self.calls.lock().await.push(format!("{op}:{collection}"));
            let mut fail_on = self.fail_on.lock().await;
            if let Some(left) = fail_on.get_mut(collection) {
                if *left > 0 {
                    *left -= 1;
                    return Err(PortError::Unexpected("store unavailable".to_string()));
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentStore for FakeStore {
        async fn insert(
            &self,
            collection: &str,
            id: Option<&str>,
            data: Value,
        ) -> PortResult<StoredDocument> {
            self.check("insert", collection).await?;
            let now = Utc::now();
            let doc = StoredDocument {
                id: id.map(str::to_string).unwrap_or_else(new_document_id),
                collection: collection.to_string(),
                data,
                created_at: now,
                updated_at: now,
            };
            let mut docs = self.docs.lock().await;
            docs.retain(|d| !(d.collection == doc.collection && d.id == doc.id));
            docs.push(doc.clone());
            Ok(doc)
        }

        async fn get(&self, collection: &str, id: &str) -> PortResult<StoredDocument> {
            self.check("get", collection).await?;
            self.docs
                .lock()
                .await
                .iter()
                .find(|d| d.collection == collection && d.id == id)
                .cloned()
                .ok_or_else(|| PortError::NotFound(format!("{collection}/{id}")))
        }

        async fn update(
            &self,
            collection: &str,
            id: &str,
            patch: Value,
        ) -> PortResult<StoredDocument> {
            self.check("update", collection).await?;
            let mut docs = self.docs.lock().await;
            let doc = docs
                .iter_mut()
                .find(|d| d.collection == collection && d.id == id)
                .ok_or_else(|| PortError::NotFound(format!("{collection}/{id}")))?;
            if let (Value::Object(target), Value::Object(fields)) = (&mut doc.data, patch) {
                for (k, v) in fields {
                    target.insert(k, v);
                }
            }
            Ok(doc.clone())
        }

        async fn delete(&self, collection: &str, id: &str) -> PortResult<()> {
            self.check("delete", collection).await?;
            self.docs
                .lock()
                .await
                .retain(|d| !(d.collection == collection && d.id == id));
            Ok(())
        }

        async fn query(
            &self,
            collection: &str,
            filters: &[FieldFilter],
        ) -> PortResult<Vec<StoredDocument>> {
            self.check("query", collection).await?;
            Ok(self
                .docs
                .lock()
                .await
                .iter()
                .filter(|d| d.collection == collection)
                .filter(|d| filters.iter().all(|f| f.matches(&d.data)))
                .cloned()
                .collect())
        }
    }

    fn repos() -> DocumentRepositories {
        DocumentRepositories::new(Arc::new(FakeStore::default()))
    }

    fn assignment(client: &str, test_type: &str) -> TestAssignment {
        TestAssignment {
            id: new_document_id(),
            client_id: client.to_string(),
            counselor_id: "counselor-1".to_string(),
            test_type: test_type.to_string(),
            status: AssignmentStatus::Assigned,
            due_date: None,
            notes: None,
            assigned_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn duplicate_open_assignment_is_a_conflict() {
        let repos = repos();
        repos.assign(assignment("client-1", "mbti")).await.unwrap();

        let err = repos.assign(assignment("client-1", "mbti")).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));

        // A different test type for the same client is fine.
        repos.assign(assignment("client-1", "stress")).await.unwrap();
    }

    #[tokio::test]
    async fn finished_assignment_can_be_reassigned() {
        let repos = repos();
        let first = repos.assign(assignment("client-2", "mbti")).await.unwrap();
        repos
            .apply_action(&first.id, AssignmentAction::Cancel, Utc::now())
            .await
            .unwrap();

        repos.assign(assignment("client-2", "mbti")).await.unwrap();
        let all = repos
            .find_assignments(&AssignmentFilter {
                client_id: Some("client-2".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn apply_action_records_timestamps_and_rejects_illegal_moves() {
        let repos = repos();
        let created = repos.assign(assignment("client-3", "mbti")).await.unwrap();

        let started = repos
            .apply_action(&created.id, AssignmentAction::Start, Utc::now())
            .await
            .unwrap();
        assert_eq!(started.status, AssignmentStatus::InProgress);
        assert!(started.started_at.is_some());

        let done = repos
            .apply_action(&created.id, AssignmentAction::Complete, Utc::now())
            .await
            .unwrap();
        assert_eq!(done.status, AssignmentStatus::Completed);
        assert!(done.completed_at.is_some());

        let err = repos
            .apply_action(&created.id, AssignmentAction::Start, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Invalid(_)));
    }

    #[tokio::test]
    async fn messages_for_user_merges_both_directions_in_time_order() {
        let repos = repos();
        let base = Utc::now();
        for (i, (from, to)) in [("a", "b"), ("b", "a"), ("c", "d")].iter().enumerate() {
            repos
                .save_message(ChatMessage {
                    id: format!("m{i}"),
                    room_id: crate::domain::chat_room_id(from, to),
                    sender_id: from.to_string(),
                    receiver_id: to.to_string(),
                    message: format!("hello {i}"),
                    read: false,
                    timestamp: base + Duration::seconds(i as i64),
                })
                .await
                .unwrap();
        }

        let for_a = repos.messages_for_user("a").await.unwrap();
        let ids: Vec<_> = for_a.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m0", "m1"]);

        let read = repos.mark_read("m1").await.unwrap();
        assert!(read.read);
    }

    #[tokio::test]
    async fn daily_record_filters_and_updates() {
        let repos = repos();
        let now = Utc::now();
        for (id, date, client) in [("r1", "2024-03-01", "c1"), ("r2", "2024-03-02", "c1"), ("r3", "2024-03-02", "c2")] {
            repos
                .save_record(DailyRecord {
                    id: id.to_string(),
                    client_id: client.to_string(),
                    counselor_id: Some("k1".to_string()),
                    date: date.to_string(),
                    mood: None,
                    content: "오늘의 기록".to_string(),
                    notes: None,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }

        let c1 = repos
            .find_records(&DailyRecordFilter {
                client_id: Some("c1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(c1.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["r2", "r1"]);

        let updated = repos
            .update_record(
                "r1",
                DailyRecordPatch {
                    mood: Some("calm".to_string()),
                    ..Default::default()
                },
                now + Duration::minutes(5),
            )
            .await
            .unwrap();
        assert_eq!(updated.mood.as_deref(), Some("calm"));
        assert_eq!(updated.updated_at, now + Duration::minutes(5));

        let err = repos
            .update_record("missing", DailyRecordPatch::default(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn expired_auth_sessions_are_rejected_and_removed() {
        let repos = repos();
        let account = repos
            .create_account("Someone@Example.com", None, "hash")
            .await
            .unwrap();
        assert_eq!(account.email, "someone@example.com");

        let now = Utc::now();
        repos
            .create_auth_session("live", &account.id, now + Duration::days(30))
            .await
            .unwrap();
        repos
            .create_auth_session("stale", &account.id, now - Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(repos.validate_auth_session("live", now).await.unwrap(), account.id);
        assert!(matches!(
            repos.validate_auth_session("stale", now).await,
            Err(PortError::Unauthorized)
        ));
        assert!(matches!(
            repos.validate_auth_session("nope", now).await,
            Err(PortError::Unauthorized)
        ));

        let creds = repos.get_account_by_email("someone@example.com").await.unwrap();
        assert_eq!(creds.hashed_password, "hash");
        assert!(matches!(
            repos.create_account("someone@example.com", None, "x").await,
            Err(PortError::Conflict(_))
        ));
    }
}
