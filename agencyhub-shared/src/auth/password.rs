/// Password hashing with Argon2id
///
/// Hashes are stored as PHC strings, so the parameters used at hashing time
/// travel with the hash and verification keeps working if they change.
///
/// # Parameters
///
/// - **Memory**: 19 MiB
/// - **Iterations**: 2
/// - **Parallelism**: 1
///
/// # Example
///
/// ```
/// use agencyhub_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Agency#2024")?;
/// assert!(verify_password("Agency#2024", &hash)?);
/// assert!(!verify_password("agency#2024", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// The stored value is not a PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(19 * 1024, 2, 1, Some(32))
        .map_err(|e| PasswordError::HashError(format!("invalid parameters: {e}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes `password` with a fresh random salt
///
/// # Returns
///
/// A PHC string such as `$argon2id$v=19$m=19456,t=2,p=1$...`
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

/// Checks `password` against a stored hash in constant time
///
/// # Returns
///
/// `Ok(true)` on a match and `Ok(false)` on a mismatch.
///
/// # Errors
///
/// Returns `PasswordError::InvalidHash` if `hash` cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// Minimum strength rules for new passwords
///
/// At least 8 characters with an uppercase letter, a lowercase letter,
/// a digit and a symbol.
///
/// # Example
///
/// ```
/// use agencyhub_shared::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("Studio!2024").is_ok());
/// assert!(validate_password_strength("Sh0rt!").is_err());
/// assert!(validate_password_strength("NoSymbol2024").is_err());
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    let rules: [(fn(char) -> bool, &str); 4] = [
        (char::is_uppercase, "an uppercase letter"),
        (char::is_lowercase, "a lowercase letter"),
        (char::is_numeric, "a digit"),
        (|c: char| !c.is_alphanumeric(), "a special character"),
    ];

    for (check, what) in rules {
        if !password.chars().any(check) {
            return Err(format!("Password must contain at least {what}"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id_phc_string() {
        let hash = hash_password("Campaign!42").expect("Hash should succeed");
        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(hash.contains("m=19456,t=2,p=1"));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let first = hash_password("Campaign!42").unwrap();
        let second = hash_password("Campaign!42").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("Campaign!42", &first).unwrap());
        assert!(verify_password("Campaign!42", &second).unwrap());
    }

    #[test]
    fn test_wrong_password_is_false_not_error() {
        let hash = hash_password("Campaign!42").unwrap();
        assert!(!verify_password("campaign!42", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = verify_password("anything", "not-a-phc-string");
        assert!(matches!(result, Err(PasswordError::InvalidHash(_))));
    }

    #[test]
    fn test_password_strength_rules() {
        assert!(validate_password_strength("Studio!2024").is_ok());

        let cases = [
            ("S!1a", "at least 8 characters"),
            ("studio!2024", "uppercase"),
            ("STUDIO!2024", "lowercase"),
            ("Studio!!!!", "digit"),
            ("Studio2024", "special character"),
        ];
        for (password, expected) in cases {
            let err = validate_password_strength(password).unwrap_err();
            assert!(err.contains(expected), "{password}: {err}");
        }
    }

    #[test]
    fn test_unicode_length_counts_characters() {
        // 8 characters, more than 8 bytes
        assert!(validate_password_strength("Ünïcø!1a").is_ok());
    }
}
