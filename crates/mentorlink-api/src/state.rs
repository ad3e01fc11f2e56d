use std::sync::Arc;
use std::time::Duration;

use mentorlink_db::Database;

use crate::service::MessagingService;
use crate::store::Store;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Store,
    pub messaging: MessagingService,
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, jwt_secret: String, db_timeout: Duration) -> AppState {
        let store = Store::new(db, db_timeout);
        Arc::new(Self {
            messaging: MessagingService::new(store.clone()),
            store,
            jwt_secret,
        })
    }
}
