use sqlx::{Pool, Postgres};

mod user;
pub use user::UserExt;

mod module;
pub use module::ModuleExt;

mod course;
pub use course::CourseExt;

mod lesson;
pub use lesson::LessonExt;

mod subscription;
pub use subscription::SubscriptionExt;

mod notification;
pub use notification::NotificationExt;

#[cfg(test)]
pub mod memory;

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }

    /// Apply the embedded migrations under `./migrations`
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[cfg(test)]
pub(crate) async fn insert_test_user(pool: &Pool<Postgres>, username: &str) -> uuid::Uuid {
    sqlx::query_scalar::<_, uuid::Uuid>(
        "INSERT INTO users (username, email) VALUES ($1, $2) RETURNING id",
    )
    .bind(username)
    .bind(format!("{}@example.com", username))
    .fetch_one(pool)
    .await
    .unwrap()
}
