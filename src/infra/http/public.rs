use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, StatusCode, Uri, header::CACHE_CONTROL},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{application::error::HttpError, application::home::HomeCache, store::Bindings};

use super::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub home: Arc<HomeCache>,
    /// Environment bindings handed to every request.
    pub env: Bindings,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/api/home", get(home))
        .route("/_health", get(health))
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn home(State(state): State<HttpState>) -> Response {
    let payload = state.home.get_home(Some(&state.env)).await;
    let mut response = Json(payload).into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn not_found(uri: Uri) -> HttpError {
    HttpError::new(
        "infra::http::public::not_found",
        StatusCode::NOT_FOUND,
        "Not found",
        format!("no route for `{}`", uri.path()),
    )
}
