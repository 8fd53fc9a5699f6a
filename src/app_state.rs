use sqlx::SqlitePool;

use crate::realtime::ConnectionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub registry: ConnectionRegistry,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            registry: ConnectionRegistry::default(),
        }
    }
}
