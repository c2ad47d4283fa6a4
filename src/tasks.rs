use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::{
    db::{ModuleExt, NotificationExt, SubscriptionExt},
    mail::{mails::send_module_update_email, sendmail::Mailer},
};

/// Wake-up handle for the notification worker
///
/// The work itself lives in the outbox table; handlers only nudge the worker
/// so it does not wait for its next poll.
#[derive(Debug, Clone, Default)]
pub struct WorkerSignal {
    notify: Arc<Notify>,
}

impl WorkerSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never blocks; a wake-up sent while the worker is busy is kept for its next wait
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    async fn woken(&self) {
        self.notify.notified().await;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Send attempts per recipient within one delivery
    pub max_attempts: u32,
    pub backoff: Duration, // Multiplied by the attempt number
    /// Deliveries of one outbox row before it is dropped
    pub max_deliveries: i32,
    pub lease: Duration,
    pub poll_interval: Duration,
    pub batch_size: i64,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub sent: usize,
    pub failed: usize,
}

/// Email each subscriber of a module about an update
///
/// Recipients are independent: one that keeps failing after
/// `settings.max_attempts` is counted and skipped.
pub async fn notify_module_update<R, M>(
    repo: &R,
    mailer: &M,
    module_id: i64,
    settings: WorkerSettings,
) -> Result<NotifyReport, sqlx::Error>
where
    R: ModuleExt + SubscriptionExt,
    M: Mailer,
{
    let mut report = NotifyReport::default();

    let Some(module) = repo.get_module(module_id).await? else {
        tracing::warn!(module_id, "module deleted before notification, skipping");
        return Ok(report);
    };

    let recipients = repo.get_module_subscriber_emails(module_id).await?;

    for email in recipients {
        let mut attempt = 1;
        loop {
            match send_module_update_email(mailer, &email, &module.title).await {
                Ok(()) => {
                    report.sent += 1;
                    break;
                }
                Err(e) if attempt < settings.max_attempts => {
                    tracing::warn!(module_id, %email, attempt, "module update email failed, retrying: {}", e);
                    tokio::time::sleep(settings.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(module_id, %email, attempt, "module update email failed: {}", e);
                    report.failed += 1;
                    break;
                }
            }
        }
    }

    Ok(report)
}

/// Deliver every due row of the outbox once
///
/// A delivery that fails on the database is rescheduled with a growing delay
/// and dropped after `settings.max_deliveries`. Rows are removed only after
/// their delivery finished, so a crash mid-way means a second delivery.
pub async fn process_due_notifications<R, M>(
    repo: &R,
    mailer: &M,
    settings: WorkerSettings,
) -> Result<usize, sqlx::Error>
where
    R: ModuleExt + SubscriptionExt + NotificationExt,
    M: Mailer,
{
    let claimed = repo
        .claim_notifications(settings.batch_size, settings.lease)
        .await?;
    let count = claimed.len();

    for pending in claimed {
        let module_id = pending.module_id;
        match notify_module_update(repo, mailer, module_id, settings).await {
            Ok(report) => {
                tracing::info!(
                    module_id,
                    sent = report.sent,
                    failed = report.failed,
                    "module update notification finished"
                );
                repo.complete_notification(pending.id).await?;
            }
            Err(e) if pending.attempts < settings.max_deliveries => {
                tracing::warn!(
                    module_id,
                    attempt = pending.attempts,
                    "DB error, notifying subscribers, will retry: {}",
                    e
                );
                let delay = settings.backoff * pending.attempts.max(1) as u32;
                repo.retry_notification(pending.id, delay).await?;
            }
            Err(e) => {
                tracing::error!(
                    module_id,
                    attempt = pending.attempts,
                    "DB error, notifying subscribers, giving up: {}",
                    e
                );
                repo.complete_notification(pending.id).await?;
            }
        }
    }

    Ok(count)
}

/// Poll the outbox forever, waking early when signalled
///
/// Meant to be `tokio::spawn`ed with concrete repository and mailer types.
pub async fn run_worker<R, M>(repo: R, mailer: M, signal: WorkerSignal, settings: WorkerSettings)
where
    R: ModuleExt + SubscriptionExt + NotificationExt,
    M: Mailer,
{
    loop {
        loop {
            match process_due_notifications(&repo, &mailer, settings).await {
                Ok(count) if count as i64 >= settings.batch_size => continue,
                Ok(_) => break,
                Err(e) => {
                    tracing::error!("DB error, polling notification outbox: {}", e);
                    break;
                }
            }
        }

        tokio::select! {
            _ = signal.woken() => {}
            _ = tokio::time::sleep(settings.poll_interval) => {}
        }
    }
}
