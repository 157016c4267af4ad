use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CatalogError, Result, StorageContext};

/// Hash a password with a fresh random salt. The PHC string carries the salt
/// and parameters, so it is the only thing stored.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| CatalogError::PasswordHash(err.to_string()))
}

fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|err| CatalogError::PasswordHash(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn user_exists(conn: &Connection, username: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )
    .context("failed to look up user")
}

/// Insert a login. Usernames are unique; a duplicate is a validation error.
pub fn create_user(conn: &Connection, username: &str, password: &str) -> Result<i64> {
    let username = username.trim();
    if username.is_empty() {
        return Err(CatalogError::validation("username", "is required"));
    }
    if password.is_empty() {
        return Err(CatalogError::validation("password", "is required"));
    }
    if user_exists(conn, username)? {
        return Err(CatalogError::validation(
            "username",
            format!("\"{username}\" is already taken"),
        ));
    }

    let password_hash = hash_password(password)?;
    conn.execute(
        "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
        params![username, password_hash],
    )
    .context("failed to insert user")?;
    Ok(conn.last_insert_rowid())
}

/// Check a username/password pair. Unknown users are simply rejected.
pub fn verify_credentials(conn: &Connection, username: &str, password: &str) -> Result<bool> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT password_hash FROM users WHERE username = ?1",
            [username.trim()],
            |row| row.get(0),
        )
        .optional()
        .context("failed to load credentials")?;

    match stored {
        Some(hash) => verify_password(password, &hash),
        None => Ok(false),
    }
}
