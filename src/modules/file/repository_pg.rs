use chrono::{DateTime, Utc};
use futures_util::{stream::BoxStream, StreamExt, TryStreamExt};
use uuid::Uuid;

use crate::{
    api::error,
    modules::file::{
        model::NewFile,
        repository::{ExpiryCursor, FileRepository},
        schema::FileEntity,
    },
};

/// Name of the `UNIQUE (code)` constraint in the `files` table.
const CODE_CONSTRAINT: &str = "files_code_key";

#[derive(Clone)]
pub struct FilePgRepository {
    pool: sqlx::PgPool,
}

impl FilePgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FileRepository for FilePgRepository {
    async fn insert(&self, file: &NewFile) -> Result<FileEntity, error::SystemError> {
        let id = Uuid::new_v7(uuid::Timestamp::now(uuid::NoContext));
        let entity = sqlx::query_as::<_, FileEntity>(
            r#"
            INSERT INTO files (id, code, extension, original_name, content_type, content_handle, size, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&file.code)
        .bind(&file.extension)
        .bind(&file.original_name)
        .bind(&file.content_type)
        .bind(file.content_handle)
        .bind(file.size)
        .bind(file.uploaded_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match error::SystemError::from(e) {
            error::SystemError::Conflict(Some(meta))
                if meta.constraint.as_deref() == Some(CODE_CONSTRAINT) =>
            {
                error::SystemError::DuplicateCode(file.code.clone())
            }
            other => other,
        })?;

        Ok(entity)
    }

    async fn find_by_code(
        &self,
        code: &str,
        extension: Option<&str>,
    ) -> Result<Option<FileEntity>, error::SystemError> {
        let file = sqlx::query_as::<_, FileEntity>(
            r#"
            SELECT * FROM files
            WHERE code = $1 AND ($2::text IS NULL OR extension = $2)
            "#,
        )
        .bind(code)
        .bind(extension)
        .fetch_optional(&self.pool)
        .await?;

        Ok(file)
    }

    async fn find_by_id(&self, file_id: &Uuid) -> Result<Option<FileEntity>, error::SystemError> {
        let file = sqlx::query_as::<_, FileEntity>(
            r#"
            SELECT * FROM files WHERE id = $1
            "#,
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(file)
    }

    fn list(
        &self,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> BoxStream<'_, Result<FileEntity, error::SystemError>> {
        sqlx::query_as::<_, FileEntity>(
            r#"
            SELECT * FROM files
            WHERE ($1::timestamptz IS NULL OR uploaded_at < $1)
            ORDER BY uploaded_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(before)
        .bind(limit)
        .fetch(&self.pool)
        .map_err(error::SystemError::from)
        .boxed()
    }

    async fn find_expired(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<ExpiryCursor>,
        limit: i64,
    ) -> Result<Vec<FileEntity>, error::SystemError> {
        let (after_at, after_id) = after.unzip();
        let files = sqlx::query_as::<_, FileEntity>(
            r#"
            SELECT * FROM files
            WHERE uploaded_at < $1
              AND ($2::timestamptz IS NULL OR (uploaded_at, id) > ($2, $3::uuid))
            ORDER BY uploaded_at ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(cutoff)
        .bind(after_at)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(files)
    }

    async fn delete_by_id(&self, file_id: &Uuid) -> Result<bool, error::SystemError> {
        let result = sqlx::query(
            r#"
            DELETE FROM files WHERE id = $1
            "#,
        )
        .bind(file_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, error::SystemError> {
        let result = sqlx::query(
            r#"
            DELETE FROM files WHERE uploaded_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), error::SystemError> {
        sqlx::query("SELECT 1 FROM files LIMIT 1").execute(&self.pool).await?;
        Ok(())
    }
}
