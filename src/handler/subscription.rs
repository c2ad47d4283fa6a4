use crate::AppState;
use crate::db::SubscriptionExt;
use crate::dtos::{
    PageQuery, Paginated, ToggleResponseDto, ToggleSubscriptionDto, UpdateSubscriptionDto,
};
use crate::error::{ErrorMessage, HttpError};
use crate::middleware::{JWTAuthMiddleware, auth};
use crate::models::User;
use crate::policy::{Action, Rule, authorize, subscription_rule};
use crate::subscriptions;
use axum::Extension;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, put};
use axum::{Router, middleware};
use tracing::instrument;
use uuid::Uuid;

/// Router for subscription endpoints; every route requires a token
pub fn subscription_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/subscription/", get(get_subscriptions))
        // GET lists like /subscription/, POST toggles {"module": id}
        .route(
            "/subscription/create",
            get(get_subscriptions).post(toggle_subscription),
        )
        .route("/subscription/update/{subscription_id}", put(update_subscription))
        .route("/subscription/retrieve/{subscription_id}", get(get_subscription))
        .route("/subscription/delete/{subscription_id}", delete(delete_subscription))
        .route_layer(middleware::from_fn_with_state(app_state, auth))
}

/// Subscriber filter for single-row lookups: admins see every row
///
/// Rows outside the scope read as missing, so foreign ids answer 404.
fn lookup_scope(user: &User) -> Option<Uuid> {
    if Rule::Admin.allows(Some(user), None) {
        None
    } else {
        Some(user.id)
    }
}

/// The caller's own subscriptions, paginated
///
/// Always scoped to the caller, admins included.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn get_subscriptions(
    Query(params): Query<PageQuery>,
    OriginalUri(uri): OriginalUri,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let page = params.resolve(app_state.env.page_size)?;

    let subscriptions = app_state
        .db_client
        .get_subscriptions(jwt.user.id, page)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting subscriptions: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .get_subscription_count(jwt.user.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting subscription count: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(Paginated::new(subscriptions, total, page, uri.path())?))
}

/// Toggle the caller's subscription to a module, cascading to its course
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn toggle_subscription(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<ToggleSubscriptionDto>,
) -> Result<impl IntoResponse, HttpError> {
    authorize(&subscription_rule(Action::Create), Some(&jwt.user), None)?;

    let message =
        subscriptions::toggle_module_subscription(&app_state.db_client, Some(&jwt.user), body.module)
            .await?;

    Ok(Json(ToggleResponseDto { message }))
}

#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn get_subscription(
    Path(subscription_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let subscription = app_state
        .db_client
        .get_subscription(subscription_id, lookup_scope(&jwt.user))
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting subscription: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::SubscriptionNotFound.to_string()))?;

    authorize(
        &subscription_rule(Action::Read),
        Some(&jwt.user),
        subscription.subscriber_id,
    )?;

    Ok(Json(subscription))
}

/// Replace kind and references of one subscription
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn update_subscription(
    Path(subscription_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<UpdateSubscriptionDto>,
) -> Result<impl IntoResponse, HttpError> {
    let subscription = subscriptions::update_subscription(
        &app_state.db_client,
        subscription_id,
        lookup_scope(&jwt.user),
        body.subscription_type,
        body.module,
        body.course,
    )
    .await?;

    tracing::info!(subscription_id, "update_subscription successful");
    Ok(Json(subscription))
}

#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_subscription(
    Path(subscription_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .db_client
        .delete_subscription(subscription_id, lookup_scope(&jwt.user))
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                HttpError::not_found(ErrorMessage::SubscriptionNotFound.to_string())
            }
            e => {
                tracing::error!("DB error, deleting subscription: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    tracing::info!(subscription_id, "delete_subscription successful");
    Ok(StatusCode::NO_CONTENT)
}
