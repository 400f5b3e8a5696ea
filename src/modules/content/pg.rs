use crate::modules::content::{ContentError, ContentHandle, ContentResult, ContentStore};

/// Blobs as `bytea` rows in `file_blobs`, next to the record table.
#[derive(Clone)]
pub struct PgContentStore {
    pool: sqlx::PgPool,
}

impl PgContentStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ContentStore for PgContentStore {
    async fn put(&self, bytes: Vec<u8>) -> ContentResult<ContentHandle> {
        let handle = ContentHandle::generate();
        sqlx::query(
            r#"
            INSERT INTO file_blobs (handle, data, size)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(handle)
        .bind(&bytes)
        .bind(bytes.len() as i64)
        .execute(&self.pool)
        .await?;

        Ok(handle)
    }

    async fn get(&self, handle: &ContentHandle) -> ContentResult<Vec<u8>> {
        let data: Option<Vec<u8>> = sqlx::query_scalar(
            r#"
            SELECT data FROM file_blobs WHERE handle = $1
            "#,
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        data.ok_or(ContentError::NotFound(*handle))
    }

    async fn delete(&self, handle: &ContentHandle) -> ContentResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM file_blobs WHERE handle = $1
            "#,
        )
        .bind(handle)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> ContentResult<()> {
        sqlx::query("SELECT 1 FROM file_blobs LIMIT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL pointing at a Postgres server"]
    async fn test_blob_lifecycle(pool: sqlx::PgPool) {
        let store = PgContentStore::new(pool);
        store.ping().await.unwrap();

        let handle = store.put(b"\x00\x01binary\xff".to_vec()).await.unwrap();
        assert_eq!(store.get(&handle).await.unwrap(), b"\x00\x01binary\xff");

        assert!(store.delete(&handle).await.unwrap());
        assert!(!store.delete(&handle).await.unwrap());
        assert!(matches!(store.get(&handle).await, Err(ContentError::NotFound(h)) if h == handle));
    }
}
