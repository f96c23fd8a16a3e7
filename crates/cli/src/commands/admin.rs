//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin account
//! emporium admin create -e admin@example.com -n "Admin Name" -p 'long passphrase'
//!
//! # Give an existing account the admin role
//! emporium admin promote -e shopper@example.com
//! ```
//!
//! Registration over HTTP always creates plain users, so this is the only way
//! to obtain an admin.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use emporium_api::db::{PgStore, UserStore};
use emporium_api::services::auth::AuthService;
use emporium_core::{Email, Role, UserId};

use super::{CommandError, connect};

/// Create a new admin user.
///
/// The password is hashed with the same routine the API uses at
/// registration, so the account can log in over HTTP.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns `CommandError::Auth` for missing fields, an invalid email, a
/// short password or a taken email.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<UserId, CommandError> {
    let store = PgStore::new(connect().await?);

    tracing::info!("Creating admin user: {}", email);

    let user = AuthService::new(&store)
        .create_account(name, email, password, Role::Admin)
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );

    Ok(user.id)
}

/// Promote an existing user to admin.
///
/// # Errors
///
/// Returns `CommandError::UserNotFound` if no account has this email.
pub async fn promote(email: &str) -> Result<UserId, CommandError> {
    let email = Email::parse(email).map_err(|_| CommandError::InvalidEmail(email.to_owned()))?;
    let store = PgStore::new(connect().await?);

    let user = store
        .set_user_role(&email, Role::Admin)
        .await?
        .ok_or_else(|| CommandError::UserNotFound(email.to_string()))?;

    tracing::info!("User {} ({}) is now an admin", user.email, user.id);
    Ok(user.id)
}
