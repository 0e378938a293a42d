use futures::TryStreamExt;
use medstore_api::{
    blob_store::{BlobStore, DEFAULT_CHUNK_SIZE, NewFile, chunk_count},
    db::{create_pool, run_migrations},
};

#[test]
fn chunk_count_is_ceiling_division() {
    assert_eq!(DEFAULT_CHUNK_SIZE, 261_120);
    assert_eq!(chunk_count(0, DEFAULT_CHUNK_SIZE), 0);
    assert_eq!(chunk_count(1, DEFAULT_CHUNK_SIZE), 1);
    assert_eq!(chunk_count(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_SIZE), 1);
    assert_eq!(chunk_count(DEFAULT_CHUNK_SIZE + 1, DEFAULT_CHUNK_SIZE), 2);
    assert_eq!(chunk_count(5 * 1024 * 1024, DEFAULT_CHUNK_SIZE), 21);
}

#[tokio::test]
async fn stored_chunks_reassemble_to_the_original() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run blob store tests.");
            return Ok(());
        }
    };

    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;
    let store = BlobStore::with_chunk_size(pool.clone(), 7);

    let data: Vec<u8> = (0..=255u8).cycle().take(100).collect();
    let file = store
        .put(NewFile {
            filename: "pattern.bin",
            content_type: "image/png",
            uploaded_by: None,
            data: &data,
        })
        .await?;
    assert_eq!(file.length, 100);
    assert_eq!(file.chunk_size, 7);

    let (stored_chunks,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM image_chunks WHERE file_id = $1")
            .bind(file.id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(stored_chunks as usize, chunk_count(100, 7));

    let streamed: Vec<Vec<u8>> = store.stream(&file).try_collect().await?;
    assert_eq!(streamed.len(), 15);
    assert!(streamed[..14].iter().all(|c| c.len() == 7));
    assert_eq!(streamed.concat(), data);
    assert_eq!(store.read_all(file.id).await?, Some(data));

    assert!(store.delete(file.id).await?);
    assert!(!store.delete(file.id).await?);
    assert!(store.metadata(file.id).await?.is_none());
    let (orphans,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM image_chunks WHERE file_id = $1")
            .bind(file.id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(orphans, 0);
    Ok(())
}
