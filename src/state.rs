use std::sync::Arc;

use crate::{
    blob_store::BlobStore,
    config::AppConfig,
    db::{DbPool, OrmConn, orm_from_pool},
    notify::Notifier,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub notifier: Notifier,
    pub blobs: BlobStore,
}

impl AppState {
    pub fn new(pool: DbPool, config: AppConfig) -> Self {
        let orm = orm_from_pool(&pool);
        Self {
            blobs: BlobStore::new(pool.clone()),
            pool,
            orm,
            config: Arc::new(config),
            notifier: Notifier::new(256),
        }
    }
}
