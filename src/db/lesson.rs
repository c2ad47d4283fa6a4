use super::DBClient;
use crate::dtos::{CreateLessonDto, Page, UpdateLessonDto};
use crate::models::Lesson;
use uuid::Uuid;

const LESSON_COLUMNS: &str = "id, course_id, title, description, preview, video, owner_id";

/// Lesson database operations trait
pub trait LessonExt {
    async fn get_lesson(&self, lesson_id: i64) -> Result<Option<Lesson>, sqlx::Error>;

    async fn get_lessons(&self, page: Page) -> Result<Vec<Lesson>, sqlx::Error>;

    async fn get_lesson_count(&self) -> Result<i64, sqlx::Error>;

    async fn create_lesson(
        &self,
        owner_id: Uuid,
        input: &CreateLessonDto,
    ) -> Result<Lesson, sqlx::Error>;

    async fn update_lesson(
        &self,
        lesson_id: i64,
        changes: &UpdateLessonDto,
    ) -> Result<Option<Lesson>, sqlx::Error>;

    async fn delete_lesson(&self, lesson_id: i64) -> Result<(), sqlx::Error>;
}

impl LessonExt for DBClient {
    async fn get_lesson(&self, lesson_id: i64) -> Result<Option<Lesson>, sqlx::Error> {
        let query = format!("SELECT {} FROM lessons WHERE id = $1", LESSON_COLUMNS);
        let lesson = sqlx::query_as::<_, Lesson>(&query)
            .bind(lesson_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(lesson)
    }

    async fn get_lessons(&self, page: Page) -> Result<Vec<Lesson>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM lessons ORDER BY id LIMIT $1 OFFSET $2",
            LESSON_COLUMNS
        );
        let lessons = sqlx::query_as::<_, Lesson>(&query)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(lessons)
    }

    async fn get_lesson_count(&self) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM lessons")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn create_lesson(
        &self,
        owner_id: Uuid,
        input: &CreateLessonDto,
    ) -> Result<Lesson, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO lessons (course_id, title, description, preview, video, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            LESSON_COLUMNS
        );
        let lesson = sqlx::query_as::<_, Lesson>(&query)
            .bind(input.course)
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.preview.as_deref())
            .bind(input.video.as_deref())
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(lesson)
    }

    async fn update_lesson(
        &self,
        lesson_id: i64,
        changes: &UpdateLessonDto,
    ) -> Result<Option<Lesson>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE lessons
            SET course_id = COALESCE($1, course_id),
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                preview = COALESCE($4, preview),
                video = COALESCE($5, video)
            WHERE id = $6
            RETURNING {}
            "#,
            LESSON_COLUMNS
        );
        let lesson = sqlx::query_as::<_, Lesson>(&query)
            .bind(changes.course)
            .bind(changes.title.as_deref())
            .bind(changes.description.as_deref())
            .bind(changes.preview.as_deref())
            .bind(changes.video.as_deref())
            .bind(lesson_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(lesson)
    }

    async fn delete_lesson(&self, lesson_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(lesson_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
