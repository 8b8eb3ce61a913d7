pub mod domain;
pub mod format;
pub mod local_storage;
pub mod offline_queue;
pub mod ports;
pub mod repository;
pub mod roles;
pub mod sync_status;

pub use domain::{
    Account, AccountCredentials, AssignmentAction, AssignmentStatus, AuthSession, ChatMessage,
    DailyRecord, LogEntry, OperationKind, QueuedOperation, StoredDocument, TestAssignment,
    TestResult, UserPreferences, UserProfile, UserRole, UserTest,
};
pub use ports::{
    AccountRepository, ChatRepository, Clock, DailyRecordRepository, DocumentStore,
    KeyValueStore, LogRepository, NetworkStatus, PortError, PortResult, SystemClock,
    TestAssignmentRepository, TestResultRepository, UserDirectory,
};
pub use repository::DocumentRepositories;
pub use roles::RolePolicy;
