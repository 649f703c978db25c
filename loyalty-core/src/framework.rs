use sqlx::PgPool;

/// Executes query objects against the connection pool through
/// [`kanau::processor::Processor`] implementations.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
