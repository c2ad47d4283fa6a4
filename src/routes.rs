use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    handler::{
        course::course_handler, lesson::lesson_handler, module::module_handler,
        subscription::subscription_handler,
    },
};

async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn create_router(app_state: AppState) -> Router {
    // Handlers register full paths, so their routers merge side by side
    let api_route = Router::new()
        .route("/healthcheck", get(healthcheck))
        .merge(module_handler(app_state.clone()))
        .merge(course_handler(app_state.clone()))
        .merge(lesson_handler(app_state.clone()))
        .merge(subscription_handler(app_state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    Router::new().nest("/api", api_route)
}
