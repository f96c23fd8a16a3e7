//! Database migration command.
//!
//! ```bash
//! emporium migrate
//! ```
//!
//! Applies every pending migration in `crates/api/migrations/` to the
//! database named by `DATABASE_URL`. The migrations are embedded at build
//! time.

use super::{CommandError, connect};

/// Run the API database migrations.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a migration
/// fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
