use super::DBClient;
use crate::models::User;
use uuid::Uuid;

/// User lookups for the auth middleware
///
/// Accounts are written by the identity service; this side only reads them.
pub trait UserExt {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error>;
}

impl UserExt for DBClient {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        // fetch_optional returns Option<T>, fetch_one returns T, fetch_all returns Vec<T>
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, username, email, role, created_at FROM users WHERE id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
