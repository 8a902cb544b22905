use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue},
    middleware,
    response::Response,
    routing::{get, post},
    Router,
};

async fn cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/proxy", get(handlers::proxy).options(handlers::preflight))
        .route("/api/analyze", post(handlers::analyze).options(handlers::preflight))
        .route("/api/config", get(handlers::public_config).options(handlers::preflight))
        .route(
            "/api/supabase-config",
            get(handlers::public_config).options(handlers::preflight),
        )
        .route("/api/ranking", get(handlers::ranking).options(handlers::preflight))
        .route("/api/favorites", get(handlers::favorites).options(handlers::preflight))
        .route(
            "/api/channels/:id/report",
            get(handlers::channel_report).options(handlers::preflight),
        )
        .route(
            "/api/videos/:id/insight",
            get(handlers::video_insight).options(handlers::preflight),
        )
        .route(
            "/api/videos/:id/thumbnail-insight",
            get(handlers::thumbnail_insight).options(handlers::preflight),
        )
        .layer(middleware::map_response(cors_headers));

    Router::new()
        .route("/", get(handlers::index))
        .route("/robots.txt", get(handlers::robots))
        .route("/sitemap.xml", get(handlers::sitemap))
        .merge(api)
        .with_state(state)
}
