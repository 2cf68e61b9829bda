use axum::{
    Router,
    routing::{get, post},
};
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{AppState, middleware::log_errors, routes};

// 用户相关的路由
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(routes::user::save_user))
        .route(
            "/users/{user_id}",
            get(routes::user::get_user).delete(routes::user::delete_user),
        )
        .route("/users/{user_id}/segments", get(routes::user::get_user_segments))
        .route(
            "/users/{user_id}/configure-segments",
            post(routes::user::configure_segments),
        )
}

// 分段相关的路由
fn segment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/segments",
            post(routes::segment::save_segment).get(routes::segment::get_segments),
        )
        .route(
            "/segments/{slug}",
            get(routes::segment::get_segment).delete(routes::segment::delete_segment),
        )
        // 不放在 /segments 下，任何 slug 都必须能访问
        .route("/expire-segments", post(routes::segment::expire_segments))
}

// 创建主路由
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(user_routes())
        .merge(segment_routes())
        .route("/health", get(routes::health::health));

    // axum 不允许在根路径 nest
    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    let router = router
        .layer(axum::middleware::from_fn(log_errors))
        .layer(TimeoutLayer::new(state.config.http_timeout()))
        .layer(TraceLayer::new_for_http());

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    router.with_state(state)
}
