/// Database layer for Agencyhub
///
/// Connection pooling and schema migrations. Entity queries live next to
/// their types in the `models` module.
///
/// # Example
///
/// ```no_run
/// use agencyhub_shared::db::pool::{create_pool, DatabaseConfig};
/// use agencyhub_shared::db::migrations::run_migrations;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig::new(std::env::var("DATABASE_URL")?)).await?;
///     run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;

/// Returns true when the error is a PostgreSQL unique violation (SQLSTATE 23505),
/// optionally restricted to a named constraint.
pub fn is_unique_violation(err: &sqlx::Error, constraint: Option<&str>) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505")
                && constraint.map_or(true, |name| db_err.constraint() == Some(name))
        }
        _ => false,
    }
}
