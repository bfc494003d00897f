pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::allocation::handlers as allocation;
use crate::auth::handlers as auth;
use crate::sessions::handlers as sessions;
use crate::state::AppState;
use crate::students::handlers as students;
use crate::subjects::handlers as subjects;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/auth/login", post(auth::handle_login))
        .route("/api/auth/register", post(auth::handle_register))
        // Student surface
        .route(
            "/api/me",
            get(students::handle_me).put(students::handle_update_me),
        )
        .route(
            "/api/me/preferences",
            get(students::handle_get_my_preferences).post(students::handle_upsert_preferences),
        )
        .route("/api/me/allotment", get(students::handle_my_allotment))
        .route(
            "/api/subjects/available",
            get(subjects::handle_available_subjects),
        )
        // Coordinator surface
        .route(
            "/api/subjects",
            get(subjects::handle_list_subjects).post(subjects::handle_create_subject),
        )
        .route("/api/subjects/:id", patch(subjects::handle_update_subject))
        .route(
            "/api/subjects/:id/roster",
            get(subjects::handle_subject_roster),
        )
        .route("/api/students/import", post(students::handle_import_students))
        .route("/api/allocation/run", post(allocation::handle_run))
        .route("/api/allocation/reassign", post(allocation::handle_reassign))
        // Admin surface
        .route(
            "/api/sessions",
            get(sessions::handle_list_sessions).post(sessions::handle_create_session),
        )
        .route(
            "/api/sessions/:id/flags",
            patch(sessions::handle_set_session_flags),
        )
        .route("/api/analytics", get(sessions::handle_analytics))
        .route("/api/audit", get(sessions::handle_list_audit))
        .with_state(state)
}
