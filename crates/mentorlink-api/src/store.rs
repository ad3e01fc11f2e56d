use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use mentorlink_db::Database;

use crate::error::ApiError;

/// Async front for the blocking [`Database`]: every call runs on the
/// blocking pool and is bounded by a timeout.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
    timeout: Duration,
}

impl Store {
    pub fn new(db: Arc<Database>, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    pub async fn call<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let task = tokio::task::spawn_blocking(move || f(&db));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result.map_err(ApiError::Internal),
            Ok(Err(e)) => {
                error!("spawn_blocking join error: {}", e);
                Err(ApiError::Internal(e.into()))
            }
            Err(_) => {
                warn!("Database call exceeded {:?}", self.timeout);
                Err(ApiError::Unavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_calls_surface_as_unavailable() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = Store::new(db, Duration::from_millis(10));

        let result = store
            .call(|_| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ApiError::Unavailable)));
    }

    #[tokio::test]
    async fn storage_errors_become_internal() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = Store::new(db, Duration::from_secs(5));

        let result: Result<(), _> = store.call(|_| Err(anyhow::anyhow!("boom"))).await;
        assert!(matches!(result, Err(ApiError::Internal(_))));
    }
}
