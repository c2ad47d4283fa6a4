use super::DBClient;
use crate::dtos::Page;
use crate::models::{Subscription, SubscriptionTarget, SubscriptionType, Toggled};
use sqlx::PgConnection;
use uuid::Uuid;

const SUBSCRIPTION_COLUMNS: &str = "id, subscriber_id, subscription_type, module_id, course_id";

/// Subscription database operations trait
///
/// `scope` arguments restrict a lookup to one subscriber's rows;
/// `None` means unrestricted (admins).
pub trait SubscriptionExt {
    async fn get_subscriptions(
        &self,
        subscriber_id: Uuid,
        page: Page,
    ) -> Result<Vec<Subscription>, sqlx::Error>;

    async fn get_subscription_count(&self, subscriber_id: Uuid) -> Result<i64, sqlx::Error>;

    async fn get_subscription(
        &self,
        subscription_id: i64,
        scope: Option<Uuid>,
    ) -> Result<Option<Subscription>, sqlx::Error>;

    /// Flip every target in one transaction
    ///
    /// Each target's row is deleted if it exists and created otherwise. The
    /// result has one entry per target, in order; on error nothing changes.
    async fn toggle_subscriptions(
        &self,
        subscriber_id: Uuid,
        targets: &[SubscriptionTarget],
    ) -> Result<Vec<Toggled>, sqlx::Error>;

    /// `None` if the row is gone or outside `scope`
    async fn update_subscription(
        &self,
        subscription_id: i64,
        scope: Option<Uuid>,
        kind: SubscriptionType,
        module_id: Option<i64>,
        course_id: Option<i64>,
    ) -> Result<Option<Subscription>, sqlx::Error>;

    async fn delete_subscription(
        &self,
        subscription_id: i64,
        scope: Option<Uuid>,
    ) -> Result<(), sqlx::Error>;

    /// Distinct email addresses of everyone subscribed to a module
    async fn get_module_subscriber_emails(&self, module_id: i64) -> Result<Vec<String>, sqlx::Error>;
}

impl SubscriptionExt for DBClient {
    async fn get_subscriptions(
        &self,
        subscriber_id: Uuid,
        page: Page,
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM subscriptions
            WHERE subscriber_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
            SUBSCRIPTION_COLUMNS
        );
        let subscriptions = sqlx::query_as::<_, Subscription>(&query)
            .bind(subscriber_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(subscriptions)
    }

    async fn get_subscription_count(&self, subscriber_id: Uuid) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = $1",
        )
        .bind(subscriber_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn get_subscription(
        &self,
        subscription_id: i64,
        scope: Option<Uuid>,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        // A NULL scope disables the subscriber filter
        let query = format!(
            "SELECT {} FROM subscriptions WHERE id = $1 AND ($2::uuid IS NULL OR subscriber_id = $2)",
            SUBSCRIPTION_COLUMNS
        );
        let subscription = sqlx::query_as::<_, Subscription>(&query)
            .bind(subscription_id)
            .bind(scope)
            .fetch_optional(&self.pool)
            .await?;

        Ok(subscription)
    }

    async fn toggle_subscriptions(
        &self,
        subscriber_id: Uuid,
        targets: &[SubscriptionTarget],
    ) -> Result<Vec<Toggled>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let mut toggled = Vec::with_capacity(targets.len());
        for target in targets {
            toggled.push(toggle_in(&mut *tx, subscriber_id, *target).await?);
        }

        tx.commit().await?;
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
        let query = format!(
            r#"
            UPDATE subscriptions
            SET subscription_type = $1, module_id = $2, course_id = $3
            WHERE id = $4 AND ($5::uuid IS NULL OR subscriber_id = $5)
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        );
        let subscription = sqlx::query_as::<_, Subscription>(&query)
            .bind(kind)
            .bind(module_id)
            .bind(course_id)
            .bind(subscription_id)
            .bind(scope)
            .fetch_optional(&self.pool)
            .await?;

        Ok(subscription)
    }

    async fn delete_subscription(
        &self,
        subscription_id: i64,
        scope: Option<Uuid>,
    ) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM subscriptions WHERE id = $1 AND ($2::uuid IS NULL OR subscriber_id = $2)",
        )
        .bind(subscription_id)
        .bind(scope)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn get_module_subscriber_emails(&self, module_id: i64) -> Result<Vec<String>, sqlx::Error> {
        let emails = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT u.email
            FROM subscriptions s
            INNER JOIN users u ON s.subscriber_id = u.id
            WHERE s.module_id = $1
            "#,
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(emails)
    }
}

/// Toggle one target inside an open transaction
///
/// The key is (subscriber, reference) whatever the row's kind, matching the
/// partial unique indexes. A concurrent insert that wins the race turns ours
/// into a no-op, which reads as "already subscribed".
async fn toggle_in(
    conn: &mut PgConnection,
    subscriber_id: Uuid,
    target: SubscriptionTarget,
) -> Result<Toggled, sqlx::Error> {
    let (column, target_id) = match target {
        SubscriptionTarget::Module(id) => ("module_id", id),
        SubscriptionTarget::Course(id) => ("course_id", id),
    };

    let delete = format!("DELETE FROM subscriptions WHERE subscriber_id = $1 AND {column} = $2");
    let deleted = sqlx::query(&delete)
        .bind(subscriber_id)
        .bind(target_id)
        .execute(&mut *conn)
        .await?;

    if deleted.rows_affected() > 0 {
        return Ok(Toggled::Removed);
    }

    let insert = format!(
        r#"
        INSERT INTO subscriptions (subscriber_id, subscription_type, {column})
        VALUES ($1, $2, $3)
        ON CONFLICT (subscriber_id, {column}) WHERE {column} IS NOT NULL DO NOTHING
        "#
    );
    sqlx::query(&insert)
        .bind(subscriber_id)
        .bind(target.kind())
        .bind(target_id)
        .execute(&mut *conn)
        .await?;

    Ok(Toggled::Added)
}
