//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.

use axum::http::header::{HeaderValue, CACHE_CONTROL};
use axum::routing::get;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the API router.
///
/// Handlers use `State<ApiContext>`; every response is marked `no-store`
/// since it carries patient data.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(ctx: ApiContext) -> Router {
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/prescription",
            get(endpoints::prescriptions::list).post(endpoints::prescriptions::create),
        )
        .route("/prescription/:uuid", get(endpoints::prescriptions::show))
        .route(
            "/patient/:puuid/prescription",
            get(endpoints::prescriptions::list_for_patient),
        )
        .route(
            "/patient/:puuid/prescription/:uuid",
            get(endpoints::prescriptions::show_for_patient)
                .put(endpoints::prescriptions::update)
                .delete(endpoints::prescriptions::remove),
        )
        .with_state(ctx);

    Router::new()
        .nest("/api", routes)
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
}
