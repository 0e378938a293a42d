//! Chunked binary store for product images.
//!
//! Each file is one `image_files` row plus `image_chunks` rows numbered from
//! zero, every chunk `chunk_size` bytes except possibly the last. Reads stream
//! chunk by chunk so a download never holds the whole file in memory.

use futures::{Stream, stream};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult, models::ImageFile};

/// Same default chunk size as GridFS.
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

pub fn chunk_count(length: usize, chunk_size: usize) -> usize {
    length.div_ceil(chunk_size)
}

#[derive(Debug)]
pub struct NewFile<'a> {
    pub filename: &'a str,
    pub content_type: &'a str,
    pub uploaded_by: Option<Uuid>,
    pub data: &'a [u8],
}

#[derive(Clone)]
pub struct BlobStore {
    pool: DbPool,
    chunk_size: usize,
}

impl BlobStore {
    pub fn new(pool: DbPool) -> Self {
        Self::with_chunk_size(pool, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(pool: DbPool, chunk_size: usize) -> Self {
        Self {
            pool,
            chunk_size: chunk_size.max(1),
        }
    }

    pub async fn put(&self, file: NewFile<'_>) -> AppResult<ImageFile> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let meta = sqlx::query_as::<_, ImageFile>(
            r#"
            INSERT INTO image_files (id, filename, content_type, length, chunk_size, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(file.filename)
        .bind(file.content_type)
        .bind(file.data.len() as i64)
        .bind(self.chunk_size as i32)
        .bind(file.uploaded_by)
        .fetch_one(&mut *tx)
        .await?;

        for (n, chunk) in file.data.chunks(self.chunk_size).enumerate() {
            sqlx::query("INSERT INTO image_chunks (file_id, n, data) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(n as i32)
                .bind(chunk)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            file_id = %id,
            length = file.data.len(),
            chunks = chunk_count(file.data.len(), self.chunk_size),
            "stored file"
        );
        Ok(meta)
    }

    pub async fn metadata(&self, id: Uuid) -> AppResult<Option<ImageFile>> {
        let meta = sqlx::query_as::<_, ImageFile>("SELECT * FROM image_files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(meta)
    }

    pub async fn list(&self, limit: i64, offset: i64) -> AppResult<(Vec<ImageFile>, i64)> {
        let files = sqlx::query_as::<_, ImageFile>(
            "SELECT * FROM image_files ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM image_files")
            .fetch_one(&self.pool)
            .await?;

        Ok((files, total.0))
    }

    /// Chunks of `file` in order, fetched lazily.
    pub fn stream(
        &self,
        file: &ImageFile,
    ) -> impl Stream<Item = Result<Vec<u8>, sqlx::Error>> + Send + 'static {
        let pool = self.pool.clone();
        let file_id = file.id;
        let total = chunk_count(file.length.max(0) as usize, file.chunk_size.max(1) as usize) as i32;

        stream::try_unfold(0_i32, move |n| {
            let pool = pool.clone();
            async move {
                if n >= total {
                    return Ok(None);
                }
                let (data,): (Vec<u8>,) =
                    sqlx::query_as("SELECT data FROM image_chunks WHERE file_id = $1 AND n = $2")
                        .bind(file_id)
                        .bind(n)
                        .fetch_one(&pool)
                        .await?;
                Ok(Some((data, n + 1)))
            }
        })
    }

    pub async fn read_all(&self, id: Uuid) -> AppResult<Option<Vec<u8>>> {
        if self.metadata(id).await?.is_none() {
            return Ok(None);
        }
        let rows: Vec<(Vec<u8>,)> =
            sqlx::query_as("SELECT data FROM image_chunks WHERE file_id = $1 ORDER BY n")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        Ok(Some(rows.into_iter().flat_map(|(data,)| data).collect()))
    }

    /// Returns false when no such file existed. Chunks go with the file.
    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut conn = self.pool.acquire().await?;
        Self::delete_in(&mut conn, id).await
    }

    /// `delete` on a caller-owned connection, usually an open transaction.
    pub async fn delete_in(conn: &mut PgConnection, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM image_files WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
