//! In-memory implementation of the repository traits for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::{CourseExt, ModuleExt, NotificationExt, SubscriptionExt};
use crate::dtos::{CreateCourseDto, Page, UpdateCourseDto, UpdateModuleDto};
use crate::models::{
    Course, DEFAULT_COURSE_PRICE, DEFAULT_MODULE_PRICE, Module, PendingNotification, Subscription,
    SubscriptionTarget, SubscriptionType, Toggled,
};

struct OutboxRow {
    notification: PendingNotification,
    available_at: Instant,
}

#[derive(Default)]
struct State {
    next_id: i64,
    modules: Vec<Module>,
    courses: Vec<Course>,
    subscriptions: Vec<Subscription>,
    emails: HashMap<Uuid, String>,
    outbox: Vec<OutboxRow>,
    // Injected failures
    failing_target: Option<SubscriptionTarget>,
    failing_email_lookup: bool,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Clones share the same state
#[derive(Default, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

fn window<T: Clone>(rows: &[T], page: Page) -> Vec<T> {
    rows.iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .cloned()
        .collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user_email(&self, user_id: Uuid, email: &str) {
        let mut state = self.state.lock().unwrap();
        state.emails.insert(user_id, email.to_string());
    }

    pub fn insert_module(&self, title: &str) -> Module {
        let mut state = self.state.lock().unwrap();
        let module = Module {
            id: state.next_id(),
            title: title.to_string(),
            description: format!("{} description", title),
            price: DEFAULT_MODULE_PRICE,
            owner_id: None,
        };
        state.modules.push(module.clone());
        module
    }

    pub fn insert_course(&self, title: &str, module_id: Option<i64>) -> Course {
        let mut state = self.state.lock().unwrap();
        let course = Course {
            id: state.next_id(),
            module_id,
            title: title.to_string(),
            preview: None,
            description: format!("{} description", title),
            price: DEFAULT_COURSE_PRICE,
            owner_id: None,
        };
        state.courses.push(course.clone());
        course
    }

    pub fn insert_subscription(
        &self,
        subscriber_id: Uuid,
        kind: SubscriptionType,
        module_id: Option<i64>,
        course_id: Option<i64>,
    ) -> Subscription {
        let mut state = self.state.lock().unwrap();
        let subscription = Subscription {
            id: state.next_id(),
            subscriber_id: Some(subscriber_id),
            subscription_type: kind,
            module_id,
            course_id,
        };
        state.subscriptions.push(subscription.clone());
        subscription
    }

    /// Rows keyed the same way the toggle keys them
    pub fn count_for(&self, subscriber_id: Uuid, target: SubscriptionTarget) -> usize {
        let state = self.state.lock().unwrap();
        state
            .subscriptions
            .iter()
            .filter(|s| matches_target(s, subscriber_id, target))
            .count()
    }

    pub fn all_subscriptions(&self) -> Vec<Subscription> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    /// Make every toggle that touches `target` fail
    pub fn fail_toggles_on(&self, target: SubscriptionTarget) {
        self.state.lock().unwrap().failing_target = Some(target);
    }

    pub fn fail_email_lookups(&self, failing: bool) {
        self.state.lock().unwrap().failing_email_lookup = failing;
    }

    pub fn enqueue_notification(&self, module_id: i64) -> i64 {
        let mut state = self.state.lock().unwrap();
        push_notification(&mut state, module_id)
    }

    /// Every row of the outbox, leased or not
    pub fn outbox(&self) -> Vec<PendingNotification> {
        let state = self.state.lock().unwrap();
        state.outbox.iter().map(|row| row.notification.clone()).collect()
    }
}

fn push_notification(state: &mut State, module_id: i64) -> i64 {
    let id = state.next_id();
    state.outbox.push(OutboxRow {
        notification: PendingNotification {
            id,
            module_id,
            attempts: 0,
        },
        available_at: Instant::now(),
    });
    id
}

fn matches_target(s: &Subscription, subscriber_id: Uuid, target: SubscriptionTarget) -> bool {
    s.subscriber_id == Some(subscriber_id)
        && match target {
            SubscriptionTarget::Module(id) => s.module_id == Some(id),
            SubscriptionTarget::Course(id) => s.course_id == Some(id),
        }
}

impl ModuleExt for MemoryStore {
    async fn get_module(&self, module_id: i64) -> Result<Option<Module>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.modules.iter().find(|m| m.id == module_id).cloned())
    }

    async fn get_modules(&self, page: Page) -> Result<Vec<Module>, sqlx::Error> {
        Ok(window(&self.state.lock().unwrap().modules, page))
    }

    async fn get_module_count(&self) -> Result<i64, sqlx::Error> {
        Ok(self.state.lock().unwrap().modules.len() as i64)
    }

    async fn create_module(
        &self,
        owner_id: Uuid,
        title: &str,
        description: &str,
        price: Option<i32>,
    ) -> Result<Module, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let module = Module {
            id: state.next_id(),
            title: title.to_string(),
            description: description.to_string(),
            price: price.unwrap_or(DEFAULT_MODULE_PRICE),
            owner_id: Some(owner_id),
        };
        state.modules.push(module.clone());
        Ok(module)
    }

    async fn update_module(
        &self,
        module_id: i64,
        changes: &UpdateModuleDto,
    ) -> Result<Option<Module>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let Some(module) = state.modules.iter_mut().find(|m| m.id == module_id) else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            module.title = title.clone();
        }
        if let Some(description) = &changes.description {
            module.description = description.clone();
        }
        if let Some(price) = changes.price {
            module.price = price;
        }
        let module = module.clone();
        push_notification(&mut state, module_id);
        Ok(Some(module))
    }

    async fn delete_module(&self, module_id: i64) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let before = state.modules.len();
        state.modules.retain(|m| m.id != module_id);
        if state.modules.len() == before {
            return Err(sqlx::Error::RowNotFound);
        }
        let orphaned: Vec<i64> = state
            .courses
            .iter()
            .filter(|c| c.module_id == Some(module_id))
            .map(|c| c.id)
            .collect();
        state.courses.retain(|c| c.module_id != Some(module_id));
        state.subscriptions.retain(|s| {
            s.module_id != Some(module_id)
                && !s.course_id.is_some_and(|id| orphaned.contains(&id))
        });
        Ok(())
    }
}

impl CourseExt for MemoryStore {
    async fn get_course(&self, course_id: i64) -> Result<Option<Course>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.courses.iter().find(|c| c.id == course_id).cloned())
    }

    async fn get_module_course(&self, module_id: i64) -> Result<Option<Course>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .courses
            .iter()
            .find(|c| c.module_id == Some(module_id))
            .cloned())
    }

    async fn get_courses(&self, page: Page) -> Result<Vec<Course>, sqlx::Error> {
        Ok(window(&self.state.lock().unwrap().courses, page))
    }

    async fn get_course_count(&self) -> Result<i64, sqlx::Error> {
        Ok(self.state.lock().unwrap().courses.len() as i64)
    }

    async fn create_course(
        &self,
        owner_id: Uuid,
        input: &CreateCourseDto,
    ) -> Result<Course, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let course = Course {
            id: state.next_id(),
            module_id: input.module,
            title: input.title.clone(),
            preview: input.preview.clone(),
            description: input.description.clone(),
            price: input.price.unwrap_or(DEFAULT_COURSE_PRICE),
            owner_id: Some(owner_id),
        };
        state.courses.push(course.clone());
        Ok(course)
    }

    async fn update_course(
        &self,
        course_id: i64,
        changes: &UpdateCourseDto,
    ) -> Result<Option<Course>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let Some(course) = state.courses.iter_mut().find(|c| c.id == course_id) else {
            return Ok(None);
        };
        if changes.module.is_some() {
            course.module_id = changes.module;
        }
        if let Some(title) = &changes.title {
            course.title = title.clone();
        }
        if let Some(preview) = &changes.preview {
            course.preview = Some(preview.clone());
        }
        if let Some(description) = &changes.description {
            course.description = description.clone();
        }
        if let Some(price) = changes.price {
            course.price = price;
        }
        Ok(Some(course.clone()))
    }

    async fn delete_course(&self, course_id: i64) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let before = state.courses.len();
        state.courses.retain(|c| c.id != course_id);
        if state.courses.len() == before {
            return Err(sqlx::Error::RowNotFound);
        }
        state.subscriptions.retain(|s| s.course_id != Some(course_id));
        Ok(())
    }
}

impl SubscriptionExt for MemoryStore {
    async fn get_subscriptions(
        &self,
        subscriber_id: Uuid,
        page: Page,
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        let own: Vec<Subscription> = state
            .subscriptions
            .iter()
            .filter(|s| s.subscriber_id == Some(subscriber_id))
            .cloned()
            .collect();
        Ok(window(&own, page))
    }

    async fn get_subscription_count(&self, subscriber_id: Uuid) -> Result<i64, sqlx::Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.subscriber_id == Some(subscriber_id))
            .count() as i64)
    }

    async fn get_subscription(
        &self,
        subscription_id: i64,
        scope: Option<Uuid>,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .subscriptions
            .iter()
            .find(|s| s.id == subscription_id && (scope.is_none() || s.subscriber_id == scope))
            .cloned())
    }

    async fn toggle_subscriptions(
        &self,
        subscriber_id: Uuid,
        targets: &[SubscriptionTarget],
    ) -> Result<Vec<Toggled>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        // Work on a copy so a failure part-way leaves the store untouched
        let mut rows = state.subscriptions.clone();
        let mut next_id = state.next_id;
        let mut toggled = Vec::with_capacity(targets.len());

        for target in targets {
            if state.failing_target == Some(*target) {
                return Err(sqlx::Error::PoolTimedOut);
            }
            let before = rows.len();
            rows.retain(|s| !matches_target(s, subscriber_id, *target));
            if rows.len() < before {
                toggled.push(Toggled::Removed);
                continue;
            }

            let (module_id, course_id) = match target {
                SubscriptionTarget::Module(id) => (Some(*id), None),
                SubscriptionTarget::Course(id) => (None, Some(*id)),
            };
            next_id += 1;
            rows.push(Subscription {
                id: next_id,
                subscriber_id: Some(subscriber_id),
                subscription_type: target.kind(),
                module_id,
                course_id,
            });
            toggled.push(Toggled::Added);
        }

        state.subscriptions = rows;
        state.next_id = next_id;
        Ok(toggled)
    }

    async fn update_subscription(
        &self,
        subscription_id: i64,
        scope: Option<Uuid>,
        kind: SubscriptionType,
        module_id: Option<i64>,
        course_id: Option<i64>,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let Some(subscription) = state
            .subscriptions
            .iter_mut()
            .find(|s| s.id == subscription_id && (scope.is_none() || s.subscriber_id == scope))
        else {
            return Ok(None);
        };
        subscription.subscription_type = kind;
        subscription.module_id = module_id;
        subscription.course_id = course_id;
        Ok(Some(subscription.clone()))
    }

    async fn delete_subscription(
        &self,
        subscription_id: i64,
        scope: Option<Uuid>,
    ) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let before = state.subscriptions.len();
        state
            .subscriptions
            .retain(|s| !(s.id == subscription_id && (scope.is_none() || s.subscriber_id == scope)));
        if state.subscriptions.len() == before {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    async fn get_module_subscriber_emails(&self, module_id: i64) -> Result<Vec<String>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        if state.failing_email_lookup {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let mut emails: Vec<String> = state
            .subscriptions
            .iter()
            .filter(|s| s.module_id == Some(module_id))
            .filter_map(|s| s.subscriber_id.and_then(|id| state.emails.get(&id).cloned()))
            .collect();
        emails.sort();
        emails.dedup();
        Ok(emails)
    }
}

impl NotificationExt for MemoryStore {
    async fn claim_notifications(
        &self,
        limit: i64,
        lease: Duration,
    ) -> Result<Vec<PendingNotification>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        let mut claimed = Vec::new();
        for row in state
            .outbox
            .iter_mut()
            .filter(|row| row.available_at <= now)
            .take(limit as usize)
        {
            row.notification.attempts += 1;
            row.available_at = now + lease;
            claimed.push(row.notification.clone());
        }
        Ok(claimed)
    }

    async fn complete_notification(&self, notification_id: i64) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        state.outbox.retain(|row| row.notification.id != notification_id);
        Ok(())
    }

    async fn retry_notification(
        &self,
        notification_id: i64,
        delay: Duration,
    ) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state
            .outbox
            .iter_mut()
            .find(|row| row.notification.id == notification_id)
        {
            row.available_at = Instant::now() + delay;
        }
        Ok(())
    }
}
