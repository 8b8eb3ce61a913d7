pub mod auth;
pub mod chat;
pub mod common;
pub mod daily_records;
pub mod functions;
pub mod health;
pub mod jwt;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod test_assignments;
pub mod test_results;
pub mod users;

// Re-export the router and middleware to make them easily accessible
// to the binary that builds the web server.
pub use middleware::require_auth;
pub use rest::{router, ApiDoc};
