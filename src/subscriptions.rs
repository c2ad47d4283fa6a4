use crate::{
    db::{CourseExt, ModuleExt, SubscriptionExt},
    dtos::ToggleResult,
    error::{ErrorMessage, HttpError},
    models::{Subscription, SubscriptionTarget, SubscriptionType, Toggled, User},
};

pub const MODULE_ADDED: &str = "module subscription added";
pub const MODULE_REMOVED: &str = "module subscription removed";
pub const COURSE_ADDED: &str = "course subscription added";
pub const COURSE_REMOVED: &str = "course subscription removed";

fn db_error(context: &str, err: sqlx::Error) -> HttpError {
    tracing::error!("DB error, {}: {}", context, err);
    HttpError::server_error(ErrorMessage::ServerError.to_string())
}

/// Flip the caller's subscription to a module and cascade to its course
///
/// The module row and the course row are toggled independently: a caller who
/// was subscribed to only one of them ends up subscribed to only the other.
/// Both flips commit together or not at all. Calling twice restores the
/// original state.
pub async fn toggle_module_subscription<R>(
    repo: &R,
    subscriber: Option<&User>,
    module_id: Option<i64>,
) -> Result<ToggleResult, HttpError>
where
    R: ModuleExt + CourseExt + SubscriptionExt,
{
    let subscriber = subscriber
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()))?;
    let module_id =
        module_id.ok_or_else(|| HttpError::not_found(ErrorMessage::ModuleNotFound.to_string()))?;

    let module = repo
        .get_module(module_id)
        .await
        .map_err(|e| db_error("loading module for toggle", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ModuleNotFound.to_string()))?;

    let course = repo
        .get_module_course(module.id)
        .await
        .map_err(|e| db_error("loading module course", e))?;

    let mut targets = vec![SubscriptionTarget::Module(module.id)];
    if let Some(course) = &course {
        targets.push(SubscriptionTarget::Course(course.id));
    }

    let toggled = repo
        .toggle_subscriptions(subscriber.id, &targets)
        .await
        .map_err(|e| db_error("toggling subscriptions", e))?;

    let mut module_status = MODULE_ADDED;
    let mut course_status = None;
    for (target, toggled) in targets.iter().zip(toggled) {
        match (target, toggled) {
            (SubscriptionTarget::Module(_), Toggled::Added) => module_status = MODULE_ADDED,
            (SubscriptionTarget::Module(_), Toggled::Removed) => module_status = MODULE_REMOVED,
            (SubscriptionTarget::Course(_), Toggled::Added) => course_status = Some(COURSE_ADDED),
            (SubscriptionTarget::Course(_), Toggled::Removed) => {
                course_status = Some(COURSE_REMOVED)
            }
        }
    }

    tracing::info!(
        subscriber = %subscriber.id,
        module_id = module.id,
        module = module_status,
        course = course_status.unwrap_or("-"),
        "subscription toggled"
    );

    Ok(ToggleResult {
        module: module_status.to_string(),
        course: course_status.map(str::to_string),
    })
}

/// Change the kind and references of a subscription the caller can see
///
/// `scope` is the subscriber filter for the lookup (`None` for admins).
/// The reference matching `kind` is mandatory; both references must exist.
pub async fn update_subscription<R>(
    repo: &R,
    subscription_id: i64,
    scope: Option<uuid::Uuid>,
    kind: SubscriptionType,
    module_ref: Option<i64>,
    course_ref: Option<i64>,
) -> Result<Subscription, HttpError>
where
    R: ModuleExt + CourseExt + SubscriptionExt,
{
    match kind {
        SubscriptionType::Module if module_ref.is_none() => {
            return Err(HttpError::bad_request(ErrorMessage::ModuleRequired.to_string()));
        }
        SubscriptionType::Course if course_ref.is_none() => {
            return Err(HttpError::bad_request(ErrorMessage::CourseRequired.to_string()));
        }
        _ => {}
    }

    repo.get_subscription(subscription_id, scope)
        .await
        .map_err(|e| db_error("loading subscription", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::SubscriptionNotFound.to_string()))?;

    if let Some(module_id) = module_ref {
        repo.get_module(module_id)
            .await
            .map_err(|e| db_error("loading module", e))?
            .ok_or_else(|| HttpError::not_found(ErrorMessage::ModuleNotFound.to_string()))?;
    }
    if let Some(course_id) = course_ref {
        repo.get_course(course_id)
            .await
            .map_err(|e| db_error("loading course", e))?
            .ok_or_else(|| HttpError::not_found(ErrorMessage::CourseNotFound.to_string()))?;
    }

    repo.update_subscription(subscription_id, scope, kind, module_ref, course_ref)
        .await
        .map_err(|e| {
            HttpError::from_db("updating subscription", e, ErrorMessage::SubscriptionExists)
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::SubscriptionNotFound.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::UserRole;
    use axum::http::StatusCode;
    use chrono::Utc;
    use uuid::Uuid;

    fn subscriber() -> User {
        User {
            id: Uuid::new_v4(),
            username: "student".to_string(),
            email: "student@example.com".to_string(),
            role: UserRole::User,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn toggle_twice_adds_then_removes() {
        let store = MemoryStore::new();
        let module = store.insert_module("Rust basics");
        let user = subscriber();

        let first = toggle_module_subscription(&store, Some(&user), Some(module.id))
            .await
            .unwrap();
        assert_eq!(
            first,
            ToggleResult {
                module: MODULE_ADDED.to_string(),
                course: None
            }
        );
        assert_eq!(store.count_for(user.id, SubscriptionTarget::Module(module.id)), 1);

        let second = toggle_module_subscription(&store, Some(&user), Some(module.id))
            .await
            .unwrap();
        assert_eq!(second.module, MODULE_REMOVED);
        assert_eq!(second.course, None);
        assert_eq!(store.count_for(user.id, SubscriptionTarget::Module(module.id)), 0);
    }

    #[tokio::test]
    async fn toggle_cascades_to_the_module_course() {
        let store = MemoryStore::new();
        let module = store.insert_module("Async Rust");
        let course = store.insert_course("Tokio in depth", Some(module.id));
        let user = subscriber();

        let added = toggle_module_subscription(&store, Some(&user), Some(module.id))
            .await
            .unwrap();
        assert_eq!(added.module, MODULE_ADDED);
        assert_eq!(added.course.as_deref(), Some(COURSE_ADDED));
        assert_eq!(store.count_for(user.id, SubscriptionTarget::Module(module.id)), 1);
        assert_eq!(store.count_for(user.id, SubscriptionTarget::Course(course.id)), 1);

        let removed = toggle_module_subscription(&store, Some(&user), Some(module.id))
            .await
            .unwrap();
        assert_eq!(removed.course.as_deref(), Some(COURSE_REMOVED));
        assert!(store.all_subscriptions().is_empty());
    }

    #[tokio::test]
    async fn toggle_does_not_reconcile_prior_inconsistency() {
        let store = MemoryStore::new();
        let module = store.insert_module("Macros");
        let course = store.insert_course("Proc macros", Some(module.id));
        let user = subscriber();
        store.insert_subscription(user.id, SubscriptionType::Course, None, Some(course.id));

        let result = toggle_module_subscription(&store, Some(&user), Some(module.id))
            .await
            .unwrap();
        assert_eq!(result.module, MODULE_ADDED);
        assert_eq!(result.course.as_deref(), Some(COURSE_REMOVED));
        assert_eq!(store.count_for(user.id, SubscriptionTarget::Module(module.id)), 1);
        assert_eq!(store.count_for(user.id, SubscriptionTarget::Course(course.id)), 0);
    }

    #[tokio::test]
    async fn toggle_is_per_subscriber() {
        let store = MemoryStore::new();
        let module = store.insert_module("Ownership");
        let alice = subscriber();
        let bob = subscriber();

        toggle_module_subscription(&store, Some(&alice), Some(module.id))
            .await
            .unwrap();
        let bob_result = toggle_module_subscription(&store, Some(&bob), Some(module.id))
            .await
            .unwrap();

        assert_eq!(bob_result.module, MODULE_ADDED);
        assert_eq!(store.count_for(alice.id, SubscriptionTarget::Module(module.id)), 1);
        assert_eq!(store.count_for(bob.id, SubscriptionTarget::Module(module.id)), 1);
    }

    #[tokio::test]
    async fn anonymous_toggle_is_unauthorized_and_writes_nothing() {
        let store = MemoryStore::new();
        let module = store.insert_module("Lifetimes");

        let err = toggle_module_subscription(&store, None, Some(module.id))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert!(store.all_subscriptions().is_empty());
    }

    #[tokio::test]
    async fn unknown_or_missing_module_is_not_found() {
        let store = MemoryStore::new();
        let user = subscriber();

        let unknown = toggle_module_subscription(&store, Some(&user), Some(404))
            .await
            .unwrap_err();
        assert_eq!(unknown.status, StatusCode::NOT_FOUND);

        let missing = toggle_module_subscription(&store, Some(&user), None)
            .await
            .unwrap_err();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        assert!(store.all_subscriptions().is_empty());
    }

    #[tokio::test]
    async fn module_kind_without_module_is_rejected() {
        let store = MemoryStore::new();
        let user = subscriber();
        let course = store.insert_course("Traits", None);
        let subscription =
            store.insert_subscription(user.id, SubscriptionType::Course, None, Some(course.id));

        let err = update_subscription(
            &store,
            subscription.id,
            Some(user.id),
            SubscriptionType::Module,
            None,
            Some(course.id),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("для подписки на модуль необходимо указать модуль"));
    }

    #[tokio::test]
    async fn course_kind_without_course_is_rejected() {
        let store = MemoryStore::new();
        let user = subscriber();
        let module = store.insert_module("Generics");
        let subscription =
            store.insert_subscription(user.id, SubscriptionType::Module, Some(module.id), None);

        let err = update_subscription(
            &store,
            subscription.id,
            Some(user.id),
            SubscriptionType::Course,
            Some(module.id),
            None,
        )
        .await
        .unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("для подписки на курс необходимо указать курс"));
    }

    #[tokio::test]
    async fn update_persists_kind_and_references() {
        let store = MemoryStore::new();
        let user = subscriber();
        let module = store.insert_module("Iterators");
        let course = store.insert_course("Closures", None);
        let subscription = store.insert_subscription(
            user.id,
            SubscriptionType::Course,
            Some(module.id),
            Some(course.id),
        );

        let updated = update_subscription(
            &store,
            subscription.id,
            Some(user.id),
            SubscriptionType::Module,
            Some(module.id),
            None,
        )
        .await
        .unwrap();

        assert_eq!(updated.subscription_type, SubscriptionType::Module);
        assert_eq!(updated.module_id, Some(module.id));
        assert_eq!(updated.course_id, None);
    }

    #[tokio::test]
    async fn update_of_foreign_subscription_is_not_found() {
        let store = MemoryStore::new();
        let owner = subscriber();
        let intruder = subscriber();
        let module = store.insert_module("Smart pointers");
        let subscription =
            store.insert_subscription(owner.id, SubscriptionType::Module, Some(module.id), None);

        let err = update_subscription(
            &store,
            subscription.id,
            Some(intruder.id),
            SubscriptionType::Module,
            Some(module.id),
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, ErrorMessage::SubscriptionNotFound.to_string());
    }

    #[tokio::test]
    async fn update_with_unknown_reference_is_not_found() {
        let store = MemoryStore::new();
        let user = subscriber();
        let module = store.insert_module("Error handling");
        let subscription =
            store.insert_subscription(user.id, SubscriptionType::Module, Some(module.id), None);

        let err = update_subscription(
            &store,
            subscription.id,
            Some(user.id),
            SubscriptionType::Course,
            None,
            Some(9999),
        )
        .await
        .unwrap_err();
        assert_eq!(err.message, ErrorMessage::CourseNotFound.to_string());
    }

    #[tokio::test]
    async fn toggle_finds_a_row_whose_kind_was_changed() {
        let store = MemoryStore::new();
        let module = store.insert_module("Channels");
        let course = store.insert_course("mpsc", None);
        let user = subscriber();

        toggle_module_subscription(&store, Some(&user), Some(module.id))
            .await
            .unwrap();
        let row = store.all_subscriptions()[0].clone();
        update_subscription(
            &store,
            row.id,
            Some(user.id),
            SubscriptionType::Course,
            Some(module.id),
            Some(course.id),
        )
        .await
        .unwrap();

        let again = toggle_module_subscription(&store, Some(&user), Some(module.id))
            .await
            .unwrap();
        assert_eq!(again.module, MODULE_REMOVED);
        assert!(store
            .all_subscriptions()
            .iter()
            .all(|s| s.module_id != Some(module.id)));
    }

    #[tokio::test]
    async fn failed_course_toggle_leaves_module_row_untouched() {
        let store = MemoryStore::new();
        let module = store.insert_module("Atomics");
        let course = store.insert_course("Memory ordering", Some(module.id));
        let user = subscriber();
        store.fail_toggles_on(SubscriptionTarget::Course(course.id));

        let err = toggle_module_subscription(&store, Some(&user), Some(module.id))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(store.all_subscriptions().is_empty());
    }

    #[tokio::test]
    async fn scope_is_enforced_by_the_store_update() {
        let store = MemoryStore::new();
        let owner = subscriber();
        let module = store.insert_module("Slices");
        let subscription =
            store.insert_subscription(owner.id, SubscriptionType::Module, Some(module.id), None);

        let foreign = store
            .update_subscription(
                subscription.id,
                Some(Uuid::new_v4()),
                SubscriptionType::Course,
                None,
                None,
            )
            .await
            .unwrap();

        assert!(foreign.is_none());
        assert_eq!(store.all_subscriptions()[0], subscription);
    }

    #[tokio::test]
    async fn listing_never_shows_other_subscribers() {
        let store = MemoryStore::new();
        let module = store.insert_module("Testing");
        let alice = subscriber();
        let bob = subscriber();
        toggle_module_subscription(&store, Some(&alice), Some(module.id))
            .await
            .unwrap();
        toggle_module_subscription(&store, Some(&bob), Some(module.id))
            .await
            .unwrap();

        let page = crate::dtos::Page { number: 1, size: 10 };
        let listed = store.get_subscriptions(alice.id, page).await.unwrap();

        assert_eq!(listed.len(), 1);
        assert!(listed.iter().all(|s| s.subscriber_id == Some(alice.id)));
        assert_eq!(store.get_subscription_count(bob.id).await.unwrap(), 1);
    }
}
