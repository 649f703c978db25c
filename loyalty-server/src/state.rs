//! Application state shared across all request handlers.

use sqlx::PgPool;

/// Cloneable handle for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
}

impl AppState {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}
