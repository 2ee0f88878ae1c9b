// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, exams, kiosk, profile, results},
    state::AppState,
    utils::jwt::{auth_middleware, staff_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, exams, kiosk, results, profile).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, session registry).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // The kiosk and student-facing listings. Role is resolved once,
    // here, from the typed claims; handlers never re-query it.
    let student_routes = Router::new()
        .route("/exams/available", get(exams::available_exams))
        .route("/kiosk/start", post(kiosk::start))
        .route("/kiosk/{id}", get(kiosk::view).delete(kiosk::abandon))
        .route("/kiosk/{id}/acknowledge", post(kiosk::acknowledge))
        .route("/kiosk/{id}/fullscreen", post(kiosk::fullscreen))
        .route("/kiosk/{id}/answer", post(kiosk::answer))
        .route("/kiosk/{id}/activity", post(kiosk::activity))
        .route("/kiosk/{id}/presence", post(kiosk::presence))
        .route("/kiosk/{id}/submit", post(kiosk::submit))
        .route("/results/mine", get(results::my_results))
        .route("/review/{exam_id}", get(results::review))
        .layer(middleware::from_fn(student_middleware));

    let staff_routes = Router::new()
        .route("/exams", post(exams::create_exam).get(exams::list_exams))
        .route("/exams/{id}/active", put(exams::set_active))
        .route("/exams/{id}", delete(exams::delete_exam))
        .route("/results", get(results::exam_results))
        .route("/results/export", get(results::export_results))
        .layer(middleware::from_fn(staff_middleware));

    let profile_routes = Router::new()
        .route("/profile", get(profile::get_me).put(profile::update_me));

    let protected_routes = Router::new()
        .merge(student_routes)
        .merge(staff_routes)
        .merge(profile_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", protected_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
