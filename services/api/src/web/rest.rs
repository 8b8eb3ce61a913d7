//! services/api/src/web/rest.rs
//!
//! Assembles the REST router and the master definition of the OpenAPI
//! document.

use axum::{
    middleware as axum_middleware,
    routing::{any, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::web::{
    auth, chat, daily_records, functions, health,
    middleware::require_auth,
    state::{self, AppState},
    test_assignments, test_results, users,
};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::session_handler,
        chat::send_message_handler,
        chat::list_messages_handler,
        chat::mark_read_handler,
        daily_records::create_record_handler,
        daily_records::list_records_handler,
        daily_records::update_record_handler,
        test_assignments::assign_test_handler,
        test_assignments::list_assignments_handler,
        test_assignments::update_assignment_handler,
        test_results::list_results_handler,
        test_results::save_result_handler,
        users::list_users_handler,
        users::get_user_handler,
        users::update_user_handler,
        users::update_role_handler,
        users::get_preferences_handler,
        users::update_preferences_handler,
        users::list_user_tests_handler,
        functions::echo_handler,
        functions::process_logs_handler,
    ),
    components(
        schemas(
            health::HealthResponse,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            state::AuthUser,
            chat::SendMessageRequest,
            daily_records::CreateDailyRecordRequest,
            daily_records::UpdateDailyRecordRequest,
            test_assignments::AssignTestRequest,
            test_assignments::UpdateAssignmentRequest,
            test_results::SaveResultRequest,
            users::UpdateUserRequest,
            users::UpdateRoleRequest,
            users::UpdatePreferencesRequest,
            functions::ProcessLogsRequest,
            functions::LogInput,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Simri Care API", description = "Counseling platform endpoints: tests, records, chat and users.")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

//=========================================================================================
// Router
//=========================================================================================

/// Every API route, with tracing. CORS and Swagger UI are added by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_handler))
        .route("/api/auth/signup", post(auth::signup_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/logout", post(auth::logout_handler))
        .route(
            "/api/chat",
            post(chat::send_message_handler).get(chat::list_messages_handler),
        )
        .route("/api/chat/{id}/read", put(chat::mark_read_handler))
        .route(
            "/api/daily-records",
            post(daily_records::create_record_handler)
                .get(daily_records::list_records_handler)
                .put(daily_records::update_record_handler),
        )
        .route(
            "/api/test-assignments",
            post(test_assignments::assign_test_handler)
                .get(test_assignments::list_assignments_handler)
                .put(test_assignments::update_assignment_handler),
        )
        .route("/api/users", get(users::list_users_handler))
        .route(
            "/api/users/{id}",
            get(users::get_user_handler).put(users::update_user_handler),
        )
        .route("/api/users/{id}/role", put(users::update_role_handler))
        .route(
            "/api/user-preferences",
            get(users::get_preferences_handler).put(users::update_preferences_handler),
        )
        .route("/api/user-tests", get(users::list_user_tests_handler))
        .route("/functions/api", any(functions::echo_handler))
        .route("/functions/process-logs", post(functions::process_logs_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/auth/session", get(auth::session_handler))
        .route(
            "/api/test-results",
            get(test_results::list_results_handler).post(test_results::save_result_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
