pub mod api;
pub mod app_state;
pub mod config;
pub mod db;
pub mod middleware;
pub mod realtime;
pub mod utils;
pub mod workflow;

use axum::middleware::from_fn;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::auth::AuthDoc;
use crate::app_state::AppState;
use crate::db::queries::attendance::AttendanceDoc;
use crate::db::queries::notification::NotificationDoc;
use crate::db::queries::requests::RequestDoc;
use crate::db::queries::team::TeamDoc;
use crate::middleware::auth::jwt_middleware;

/// Assemble the full application router. Everything except auth, health and
/// the WebSocket upgrade sits behind the JWT middleware.
pub fn build_router(state: AppState) -> Router {
    let merged_doc = AuthDoc::openapi()
        .merge_from(RequestDoc::openapi())
        .merge_from(NotificationDoc::openapi())
        .merge_from(TeamDoc::openapi())
        .merge_from(AttendanceDoc::openapi());

    let public_routes = Router::new()
        .merge(api::auth::auth_routes())
        .merge(api::health::health_routes())
        .merge(api::ws::ws_routes());

    let private_routes = Router::new()
        .merge(api::auth::secure_auth_routes())
        .merge(api::requests::request_routes())
        .merge(api::notification::notification_routes())
        .merge(api::team::team_routes())
        .merge(api::attendance::attendance_routes())
        .route_layer(from_fn(jwt_middleware));

    Router::new()
        .merge(public_routes)
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
