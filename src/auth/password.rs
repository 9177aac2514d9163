use crate::error::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password with bcrypt on the blocking pool.
pub async fn hash_password(plain: &str, cost: u32) -> Result<String, AppError> {
    let plain = plain.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
        .map_err(AppError::from)
}

/// Verify a password against a stored bcrypt hash.
///
/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(plain: &str, hash: &str) -> Result<bool, AppError> {
    let plain = plain.to_string();
    let hash = hash.to_string();
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?;
    Ok(verified.unwrap_or(false))
}

pub fn validate_password(plain: &str) -> Result<(), AppError> {
    if plain.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::ValidationError(format!(
            "Passwort muss mindestens {} Zeichen lang sein",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("geheim123", 4).await.unwrap();
        assert!(verify_password("geheim123", &hash).await.unwrap());
        assert!(!verify_password("falsch", &hash).await.unwrap());
        assert!(!verify_password("geheim123", "not-a-hash").await.unwrap());
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("kurz").is_err());
        assert!(validate_password("lang genug").is_ok());
    }
}
