//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use simricare_core::ports::{
    AccountRepository, ChatRepository, Clock, DailyRecordRepository, DocumentStore,
    LogRepository, SystemClock, TestAssignmentRepository, TestResultRepository, UserDirectory,
};
use simricare_core::{DocumentRepositories, UserRole};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub chat: Arc<dyn ChatRepository>,
    pub daily_records: Arc<dyn DailyRecordRepository>,
    pub assignments: Arc<dyn TestAssignmentRepository>,
    pub results: Arc<dyn TestResultRepository>,
    pub logs: Arc<dyn LogRepository>,
    pub accounts: Arc<dyn AccountRepository>,
    pub directory: Arc<dyn UserDirectory>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wires every collection repository to one document store.
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn DocumentStore>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self::with_clock(config, store, directory, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: Arc<Config>,
        store: Arc<dyn DocumentStore>,
        directory: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let repos = Arc::new(DocumentRepositories::new(store));
        Self {
            config,
            chat: repos.clone(),
            daily_records: repos.clone(),
            assignments: repos.clone(),
            results: repos.clone(),
            logs: repos.clone(),
            accounts: repos,
            directory,
            clock,
        }
    }
}

//=========================================================================================
// AuthUser (Specific to One Authenticated Request)
//=========================================================================================

/// The signed-in caller, inserted into request extensions by `require_auth`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    #[schema(value_type = String)]
    pub role: UserRole,
}
