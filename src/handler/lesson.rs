use crate::AppState;
use crate::db::{CourseExt, LessonExt};
use crate::dtos::{CreateLessonDto, PageQuery, Paginated, UpdateLessonDto};
use crate::error::{ErrorMessage, HttpError};
use crate::middleware::{JWTAuthMiddleware, auth};
use crate::policy::{Action, authorize, catalog_rule};
use crate::validators::validate_video_host;
use axum::Extension;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, patch, post};
use axum::{Router, middleware};
use tracing::instrument;
use validator::Validate;

/// Router for lesson endpoints, same shape as courses
pub fn lesson_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/lesson/", get(get_lessons))
        .route("/lesson/retrieve/{lesson_id}", get(get_lesson))
        .route(
            "/lesson/create/",
            post(create_lesson)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/lesson/update/{lesson_id}",
            patch(update_lesson)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/lesson/delete/{lesson_id}",
            delete(delete_lesson).route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

/// Checks shared by create and update: parent course and video host
async fn check_lesson_refs(
    app_state: &AppState,
    course_id: Option<i64>,
    video: Option<&str>,
) -> Result<(), HttpError> {
    if let Some(video) = video {
        validate_video_host(video, &app_state.env.video_allowed_hosts)?;
    }

    if let Some(course_id) = course_id {
        app_state
            .db_client
            .get_course(course_id)
            .await
            .map_err(|e| {
                tracing::error!("DB error, getting course: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            })?
            .ok_or_else(|| HttpError::not_found(ErrorMessage::CourseNotFound.to_string()))?;
    }

    Ok(())
}

#[instrument(skip(app_state))]
pub async fn get_lessons(
    Query(params): Query<PageQuery>,
    OriginalUri(uri): OriginalUri,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let page = params.resolve(app_state.env.page_size)?;

    let lessons = app_state.db_client.get_lessons(page).await.map_err(|e| {
        tracing::error!("DB error, getting lessons: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let total = app_state.db_client.get_lesson_count().await.map_err(|e| {
        tracing::error!("DB error, getting lesson count: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    Ok(Json(Paginated::new(lessons, total, page, uri.path())?))
}

#[instrument(skip(app_state))]
pub async fn get_lesson(
    Path(lesson_id): Path<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let lesson = app_state
        .db_client
        .get_lesson(lesson_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting lesson: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::LessonNotFound.to_string()))?;

    Ok(Json(lesson))
}

#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn create_lesson(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<CreateLessonDto>,
) -> Result<impl IntoResponse, HttpError> {
    authorize(&catalog_rule(Action::Create), Some(&jwt.user), None)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid create_lesson input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    check_lesson_refs(&app_state, body.course, body.video.as_deref()).await?;

    let lesson = app_state
        .db_client
        .create_lesson(jwt.user.id, &body)
        .await
        .map_err(|e| {
            tracing::error!("DB error, creating lesson: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!(lesson_id = lesson.id, "create_lesson successful");
    Ok((StatusCode::CREATED, Json(lesson)))
}

#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn update_lesson(
    Path(lesson_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<UpdateLessonDto>,
) -> Result<impl IntoResponse, HttpError> {
    let existing = app_state
        .db_client
        .get_lesson(lesson_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting lesson: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::LessonNotFound.to_string()))?;

    authorize(&catalog_rule(Action::Update), Some(&jwt.user), existing.owner_id)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid update_lesson input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    check_lesson_refs(&app_state, body.course, body.video.as_deref()).await?;

    let lesson = app_state
        .db_client
        .update_lesson(lesson_id, &body)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating lesson: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::LessonNotFound.to_string()))?;

    tracing::info!(lesson_id, "update_lesson successful");
    Ok(Json(lesson))
}

#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_lesson(
    Path(lesson_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let existing = app_state
        .db_client
        .get_lesson(lesson_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting lesson: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::LessonNotFound.to_string()))?;

    authorize(&catalog_rule(Action::Delete), Some(&jwt.user), existing.owner_id)?;

    app_state
        .db_client
        .delete_lesson(lesson_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => HttpError::not_found(ErrorMessage::LessonNotFound.to_string()),
            e => {
                tracing::error!("DB error, deleting lesson: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    tracing::info!(lesson_id, "delete_lesson successful");
    Ok(StatusCode::NO_CONTENT)
}
