use anyhow::{Context, Result};

/// Hash a plain-text password with bcrypt on the blocking pool.
pub async fn hash(password: String, cost: u32) -> Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("password hashing task panicked")?
        .context("failed to hash password")
}

/// Check a plain-text password against a stored bcrypt hash.
///
/// A malformed stored hash counts as a mismatch.
pub async fn verify(password: String, password_hash: String) -> Result<bool> {
    let matches = tokio::task::spawn_blocking(move || {
        bcrypt::verify(password, &password_hash).unwrap_or(false)
    })
    .await
    .context("password verification task panicked")?;
    Ok(matches)
}
