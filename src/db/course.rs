use super::DBClient;
use crate::dtos::{CreateCourseDto, Page, UpdateCourseDto};
use crate::models::{Course, DEFAULT_COURSE_PRICE};
use uuid::Uuid;

const COURSE_COLUMNS: &str = "id, module_id, title, preview, description, price, owner_id";

/// Course database operations trait
pub trait CourseExt {
    async fn get_course(&self, course_id: i64) -> Result<Option<Course>, sqlx::Error>;

    /// The course a module subscription cascades to, if the module has one
    async fn get_module_course(&self, module_id: i64) -> Result<Option<Course>, sqlx::Error>;

    async fn get_courses(&self, page: Page) -> Result<Vec<Course>, sqlx::Error>;

    async fn get_course_count(&self) -> Result<i64, sqlx::Error>;

    async fn create_course(
        &self,
        owner_id: Uuid,
        input: &CreateCourseDto,
    ) -> Result<Course, sqlx::Error>;

    async fn update_course(
        &self,
        course_id: i64,
        changes: &UpdateCourseDto,
    ) -> Result<Option<Course>, sqlx::Error>;

    /// Delete a course together with its lessons and subscriptions
    async fn delete_course(&self, course_id: i64) -> Result<(), sqlx::Error>;
}

impl CourseExt for DBClient {
    async fn get_course(&self, course_id: i64) -> Result<Option<Course>, sqlx::Error> {
        let query = format!("SELECT {} FROM courses WHERE id = $1", COURSE_COLUMNS);
        let course = sqlx::query_as::<_, Course>(&query)
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(course)
    }

    async fn get_module_course(&self, module_id: i64) -> Result<Option<Course>, sqlx::Error> {
        // module_id is unique on courses, so at most one row comes back
        let query = format!("SELECT {} FROM courses WHERE module_id = $1", COURSE_COLUMNS);
        let course = sqlx::query_as::<_, Course>(&query)
            .bind(module_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(course)
    }

    async fn get_courses(&self, page: Page) -> Result<Vec<Course>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM courses ORDER BY id LIMIT $1 OFFSET $2",
            COURSE_COLUMNS
        );
        let courses = sqlx::query_as::<_, Course>(&query)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(courses)
    }

    async fn get_course_count(&self) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn create_course(
        &self,
        owner_id: Uuid,
        input: &CreateCourseDto,
    ) -> Result<Course, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO courses (module_id, title, preview, description, price, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            COURSE_COLUMNS
        );
        let course = sqlx::query_as::<_, Course>(&query)
            .bind(input.module)
            .bind(&input.title)
            .bind(input.preview.as_deref())
            .bind(&input.description)
            .bind(input.price.unwrap_or(DEFAULT_COURSE_PRICE))
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(course)
    }

    async fn update_course(
        &self,
        course_id: i64,
        changes: &UpdateCourseDto,
    ) -> Result<Option<Course>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE courses
            SET module_id = COALESCE($1, module_id),
                title = COALESCE($2, title),
                preview = COALESCE($3, preview),
                description = COALESCE($4, description),
                price = COALESCE($5, price)
            WHERE id = $6
            RETURNING {}
            "#,
            COURSE_COLUMNS
        );
        let course = sqlx::query_as::<_, Course>(&query)
            .bind(changes.module)
            .bind(changes.title.as_deref())
            .bind(changes.preview.as_deref())
            .bind(changes.description.as_deref())
            .bind(changes.price)
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(course)
    }

    async fn delete_course(&self, course_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(course_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
