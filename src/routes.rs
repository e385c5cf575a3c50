// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::MAX_UPLOAD_BYTES,
    handlers::{admin, assessment, auth, materials, profile},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, users, tests, materials, admin).
/// * Applies global middleware (Trace, CORS) and rate limits the auth routes.
/// * Injects global state (Database Pool, Config).
///
/// The auth rate limiter keys on the peer address, so the router must be
/// served with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let governor_conf = GovernorConfigBuilder::default()
        .per_millisecond(state.config.rate_limit_replenish_ms)
        .burst_size(state.config.rate_limit_burst)
        .finish()
        .expect("rate limit period and burst size must be non-zero");

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(GovernorLayer::new(governor_conf));

    let user_routes = Router::new()
        .route("/me", get(profile::get_me))
        .route("/me/results", get(profile::list_my_results))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let test_routes = Router::new()
        .route("/{id}/leaderboard", get(assessment::get_leaderboard))
        // Protected test-taking routes
        .merge(
            Router::new()
                .route("/user-tests", get(assessment::list_user_tests))
                .route("/check-eligibility/{id}", get(assessment::check_eligibility))
                .route("/start/{id}", post(assessment::start_test))
                .route("/timer/{id}", get(assessment::get_timer))
                .route("/violation/{id}", post(assessment::record_violation))
                .route("/submit/{id}", post(assessment::submit_test))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let material_routes = Router::new()
        .route("/", get(materials::list_materials))
        .route("/{id}", get(materials::get_material));

    let admin_routes = Router::new()
        .route("/tests", post(admin::create_test))
        .route("/tests/{id}", delete(admin::delete_test))
        .route("/tests/{id}/publish", put(admin::set_published))
        .route(
            "/tests/{id}/questions",
            get(admin::list_questions)
                .post(admin::upload_questions)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/tests/{id}/results", get(admin::list_test_results))
        .route("/tests/{id}/uploads", get(admin::list_uploads))
        .route("/uploads/{id}/grade", put(admin::grade_upload))
        .route("/materials", post(admin::create_material))
        .route("/materials/{id}", delete(admin::delete_material))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/tests", test_routes)
        .nest("/api/materials", material_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
