use std::time::Duration;

use super::DBClient;
use crate::models::PendingNotification;

/// Outbox of module-update notifications
///
/// Rows are inserted by `ModuleExt::update_module` and survive restarts until
/// the worker completes them.
pub trait NotificationExt {
    /// Claim up to `limit` due rows and hide them from other workers for `lease`
    ///
    /// A worker that dies mid-delivery leaves its rows to be claimed again once
    /// the lease runs out.
    async fn claim_notifications(
        &self,
        limit: i64,
        lease: Duration,
    ) -> Result<Vec<PendingNotification>, sqlx::Error>;

    async fn complete_notification(&self, notification_id: i64) -> Result<(), sqlx::Error>;

    /// Make a claimed row due again after `delay`
    async fn retry_notification(
        &self,
        notification_id: i64,
        delay: Duration,
    ) -> Result<(), sqlx::Error>;
}

impl NotificationExt for DBClient {
    async fn claim_notifications(
        &self,
        limit: i64,
        lease: Duration,
    ) -> Result<Vec<PendingNotification>, sqlx::Error> {
        let claimed = sqlx::query_as::<_, PendingNotification>(
            r#"
            UPDATE notification_outbox
            SET attempts = attempts + 1,
                available_at = NOW() + make_interval(secs => $2)
            WHERE id IN (
                SELECT id
                FROM notification_outbox
                WHERE available_at <= NOW()
                ORDER BY id
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, module_id, attempts
            "#,
        )
        .bind(limit)
        .bind(lease.as_secs_f64())
        .fetch_all(&self.pool)
        .await?;

        Ok(claimed)
    }

    async fn complete_notification(&self, notification_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM notification_outbox WHERE id = $1")
            .bind(notification_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn retry_notification(
        &self,
        notification_id: i64,
        delay: Duration,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE notification_outbox SET available_at = NOW() + make_interval(secs => $2) WHERE id = $1",
        )
        .bind(notification_id)
        .bind(delay.as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
