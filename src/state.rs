use std::sync::Arc;

use diesel::pg::PgConnection;
use tokio::task;

use crate::{
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    /// Runs `f` with a pooled connection on the blocking thread pool.
    pub async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut PgConnection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| AppError::internal(format!("database pool error: {err}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|err| AppError::internal(format!("database task failed: {err}")))?
    }
}
