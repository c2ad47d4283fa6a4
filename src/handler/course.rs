use crate::AppState;
use crate::db::{CourseExt, ModuleExt};
use crate::dtos::{CreateCourseDto, PageQuery, Paginated, UpdateCourseDto};
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

/// Router for course endpoints
pub fn course_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/course/", get(get_courses))
        .route("/course/retrieve/{course_id}", get(get_course))
        .route(
            "/course/create/",
            post(create_course)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/course/update/{course_id}",
            patch(update_course)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/course/delete/{course_id}",
            delete(delete_course).route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

/// Check that `module_id` exists and has no course other than `course_id`
///
/// A module has at most one course; attaching a second one is a conflict.
async fn ensure_module_free(
    app_state: &AppState,
    module_id: i64,
    course_id: Option<i64>,
) -> Result<(), HttpError> {
    app_state
        .db_client
        .get_module(module_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting module: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ModuleNotFound.to_string()))?;

    let attached = app_state
        .db_client
        .get_module_course(module_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting module course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    match attached {
        Some(course) if Some(course.id) != course_id => Err(HttpError::unique_constraint_violation(
            ErrorMessage::CourseAlreadyAttached.to_string(),
        )),
        _ => Ok(()),
    }
}

#[instrument(skip(app_state))]
pub async fn get_courses(
    Query(params): Query<PageQuery>,
    OriginalUri(uri): OriginalUri,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let page = params.resolve(app_state.env.page_size)?;

    let courses = app_state.db_client.get_courses(page).await.map_err(|e| {
        tracing::error!("DB error, getting courses: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let total = app_state.db_client.get_course_count().await.map_err(|e| {
        tracing::error!("DB error, getting course count: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    Ok(Json(Paginated::new(courses, total, page, uri.path())?))
}

#[instrument(skip(app_state))]
pub async fn get_course(
    Path(course_id): Path<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let course = app_state
        .db_client
        .get_course(course_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::CourseNotFound.to_string()))?;

    Ok(Json(course))
}

#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn create_course(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<CreateCourseDto>,
) -> Result<impl IntoResponse, HttpError> {
    authorize(&catalog_rule(Action::Create), Some(&jwt.user), None)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid create_course input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    if let Some(module_id) = body.module {
        ensure_module_free(&app_state, module_id, None).await?;
    }

    // The unique index on module_id still catches a concurrent attach
    let course = app_state
        .db_client
        .create_course(jwt.user.id, &body)
        .await
        .map_err(|e| HttpError::from_db("creating course", e, ErrorMessage::CourseAlreadyAttached))?;

    tracing::info!(course_id = course.id, "create_course successful");
    Ok((StatusCode::CREATED, Json(course)))
}

#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn update_course(
    Path(course_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<UpdateCourseDto>,
) -> Result<impl IntoResponse, HttpError> {
    let existing = app_state
        .db_client
        .get_course(course_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::CourseNotFound.to_string()))?;

    authorize(&catalog_rule(Action::Update), Some(&jwt.user), existing.owner_id)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid update_course input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    if let Some(module_id) = body.module {
        ensure_module_free(&app_state, module_id, Some(course_id)).await?;
    }

    let course = app_state
        .db_client
        .update_course(course_id, &body)
        .await
        .map_err(|e| HttpError::from_db("updating course", e, ErrorMessage::CourseAlreadyAttached))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::CourseNotFound.to_string()))?;

    tracing::info!(course_id, "update_course successful");
    Ok(Json(course))
}

#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_course(
    Path(course_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let existing = app_state
        .db_client
        .get_course(course_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::CourseNotFound.to_string()))?;

    authorize(&catalog_rule(Action::Delete), Some(&jwt.user), existing.owner_id)?;

    app_state
        .db_client
        .delete_course(course_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => HttpError::not_found(ErrorMessage::CourseNotFound.to_string()),
            e => {
                tracing::error!("DB error, deleting course: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    tracing::info!(course_id, "delete_course successful");
    Ok(StatusCode::NO_CONTENT)
}
