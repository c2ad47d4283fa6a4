use super::DBClient;
use crate::dtos::{Page, UpdateModuleDto};
use crate::models::{DEFAULT_MODULE_PRICE, Module};
use uuid::Uuid;

/// Module database operations trait
pub trait ModuleExt {
    async fn get_module(&self, module_id: i64) -> Result<Option<Module>, sqlx::Error>;

    /// Modules ordered by id, one page at a time
    async fn get_modules(&self, page: Page) -> Result<Vec<Module>, sqlx::Error>;

    async fn get_module_count(&self) -> Result<i64, sqlx::Error>;

    async fn create_module(
        &self,
        owner_id: Uuid,
        title: &str,
        description: &str,
        price: Option<i32>,
    ) -> Result<Module, sqlx::Error>;

    /// Apply the present fields of `changes`; `None` if the module is gone
    ///
    /// A successful update also queues a subscriber notification in the same
    /// transaction.
    async fn update_module(
        &self,
        module_id: i64,
        changes: &UpdateModuleDto,
    ) -> Result<Option<Module>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // COALESCE keeps the stored value for every field left out of the PATCH body
        let module = sqlx::query_as::<_, Module>(
            r#"
            UPDATE modules
            SET title = COALESCE($1, title),
                description = COALESCE($2, description),
                price = COALESCE($3, price)
            WHERE id = $4
            RETURNING id, title, description, price, owner_id
            "#,
        )
        .bind(changes.title.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.price)
        .bind(module_id)
        .fetch_optional(&mut *tx)
        .await?;

        if module.is_some() {
            sqlx::query("INSERT INTO notification_outbox (module_id) VALUES ($1)")
                .bind(module_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(module)
    }

    async fn delete_module(&self, module_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM modules WHERE id = $1")
            .bind(module_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
