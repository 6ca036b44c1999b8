use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod admin_actions;
pub mod applications;
pub mod auth;
pub mod documents;
pub mod health;
pub mod internships;
pub mod interviews;
pub mod profile;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/session", get(auth::session));

    let applications_routes = Router::new()
        .route(
            "/",
            get(applications::list_my_applications).post(applications::submit_application),
        )
        .route("/admin", get(applications::list_applications_for_admin))
        .route("/:id", get(applications::get_application))
        .route("/:id/transition", post(applications::transition_application))
        .route("/:id/withdraw", post(applications::withdraw_application))
        .route("/:id/interview", get(applications::get_application_interview))
        .route(
            "/:id/internship",
            get(applications::get_application_internship),
        );

    let interviews_routes = Router::new()
        .route("/", post(interviews::schedule_interview))
        .route(
            "/:id",
            patch(interviews::update_interview).delete(interviews::cancel_interview),
        );

    let internships_routes = Router::new()
        .route("/", post(internships::offer_internship))
        .route("/active", get(internships::list_active_internships))
        .route("/:id", get(internships::get_internship))
        .route("/:id/signed-offer", post(internships::upload_signed_offer))
        .route("/:id/status", patch(internships::update_internship_status));

    let documents_routes = Router::new()
        .route(
            "/",
            get(documents::list_my_documents).post(documents::upload_document),
        )
        .route("/:id", delete(documents::delete_document))
        .route("/:id/download", get(documents::download_document));

    let profile_routes = Router::new().route(
        "/",
        get(profile::get_profile).patch(profile::update_profile),
    );

    let admin_routes = Router::new().route("/actions", get(admin_actions::list_admin_actions));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/applications", applications_routes)
        .nest("/api/interviews", interviews_routes)
        .nest("/api/internships", internships_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/profile", profile_routes)
        .nest("/api/admin", admin_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 32))
}
