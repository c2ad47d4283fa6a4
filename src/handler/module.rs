use crate::AppState;
use crate::db::ModuleExt;
use crate::dtos::{CreateModuleDto, PageQuery, Paginated, UpdateModuleDto};
use crate::error::{ErrorMessage, HttpError};
use crate::middleware::{JWTAuthMiddleware, auth};
use crate::policy::{Action, authorize, catalog_rule};
use axum::Extension;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, patch, post};
use axum::{Router, middleware};
use tracing::instrument;
use validator::Validate;

/// Router for module endpoints
pub fn module_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        // GET /modules/?page=1&page_size=10 - List modules (public)
        .route("/modules/", get(get_modules))
        // GET /modules/{module_id}/ - Retrieve a module (public)
        .route("/modules/{module_id}/", get(get_module))
        .route(
            "/modules/create/",
            post(create_module)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        // PATCH /modules/update/{module_id}/ - Partial update, notifies subscribers
        .route(
            "/modules/update/{module_id}/",
            patch(update_module)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/modules/delete/{module_id}/",
            delete(delete_module).route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

#[instrument(skip(app_state))]
pub async fn get_modules(
    Query(params): Query<PageQuery>,
    OriginalUri(uri): OriginalUri,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let page = params.resolve(app_state.env.page_size).map_err(|e| {
        tracing::error!("Invalid get_modules input: {}", e.message);
        e
    })?;

    let modules = app_state.db_client.get_modules(page).await.map_err(|e| {
        tracing::error!("DB error, getting modules: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let total = app_state.db_client.get_module_count().await.map_err(|e| {
        tracing::error!("DB error, getting module count: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    Ok(Json(Paginated::new(modules, total, page, uri.path())?))
}

#[instrument(skip(app_state))]
pub async fn get_module(
    Path(module_id): Path<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let module = app_state
        .db_client
        .get_module(module_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting module: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ModuleNotFound.to_string()))?;

    Ok(Json(module))
}

/// Create a module owned by the caller
///
/// Moderators curate; they cannot create.
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn create_module(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<CreateModuleDto>,
) -> Result<impl IntoResponse, HttpError> {
    authorize(&catalog_rule(Action::Create), Some(&jwt.user), None)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid create_module input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let module = app_state
        .db_client
        .create_module(jwt.user.id, &body.title, &body.description, body.price)
        .await
        .map_err(|e| {
            tracing::error!("DB error, creating module: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!(module_id = module.id, "create_module successful");
    Ok((StatusCode::CREATED, Json(module)))
}

/// Partial update
///
/// Once the row is stored, subscribers are notified in the background; the
/// response never waits for email delivery.
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn update_module(
    Path(module_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<UpdateModuleDto>,
) -> Result<impl IntoResponse, HttpError> {
    let existing = app_state
        .db_client
        .get_module(module_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting module: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ModuleNotFound.to_string()))?;

    authorize(&catalog_rule(Action::Update), Some(&jwt.user), existing.owner_id)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid update_module input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let module = app_state
        .db_client
        .update_module(module_id, &body)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating module: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ModuleNotFound.to_string()))?;

    // The outbox row is already committed; this only spares the worker a poll
    app_state.worker_signal.wake();

    tracing::info!(module_id, "update_module successful");
    Ok(Json(module))
}

#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_module(
    Path(module_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let existing = app_state
        .db_client
        .get_module(module_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting module: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ModuleNotFound.to_string()))?;

    authorize(&catalog_rule(Action::Delete), Some(&jwt.user), existing.owner_id)?;

    app_state
        .db_client
        .delete_module(module_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => HttpError::not_found(ErrorMessage::ModuleNotFound.to_string()),
            e => {
                tracing::error!("DB error, deleting module: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    tracing::info!(module_id, "delete_module successful");
    Ok(StatusCode::NO_CONTENT)
}
