use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, TryRngCore};

use crate::{
    error::{AppError, AppResult},
    models::{user::canonical_username, NewUser, User},
    repository::Repository,
};

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MIN_PASSWORD_LENGTH: usize = 8;

const SALT_LENGTH: usize = 16;

/// Hashes a password with Argon2id and a random salt (PHC string format)
pub fn hash_password(password: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; SALT_LENGTH];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|e| AppError::Internal(format!("Failed to generate salt: {}", e)))?;

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("Failed to encode salt: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Checks `password` against a stored hash; malformed hashes never verify
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Canonicalises a username and checks its length
pub fn validate_username(username: &str) -> AppResult<String> {
    let username = canonical_username(username);
    if username.chars().count() < MIN_USERNAME_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_LENGTH
        )));
    }
    Ok(username)
}

/// Password policy: minimum length with upper-case, lower-case and a digit
pub fn validate_password(password: &str) -> AppResult<()> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LENGTH;
    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if long_enough && has_upper && has_lower && has_digit {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "Password must be at least {} characters and contain an upper-case letter, \
             a lower-case letter and a digit",
            MIN_PASSWORD_LENGTH
        )))
    }
}

/// Registers a new user after validating the credentials
pub async fn register(repo: &dyn Repository, username: &str, password: &str) -> AppResult<User> {
    let username = validate_username(username)?;
    validate_password(password)?;

    if repo.get_user(&username).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Username '{}' is already taken",
            username
        )));
    }

    let user = repo
        .add_user(NewUser::new(&username, hash_password(password)?))
        .await?;

    tracing::info!(username = %user.username, "Registered user");
    Ok(user)
}

pub async fn get_user(repo: &dyn Repository, username: &str) -> AppResult<User> {
    repo.get_user(username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", canonical_username(username))))
}

/// Verifies a username/password pair
///
/// Unknown usernames and wrong passwords are reported as different
/// `Unauthorized` errors.
pub async fn authenticate(repo: &dyn Repository, username: &str, password: &str) -> AppResult<User> {
    let user = repo
        .get_user(username)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown username".to_string()))?;

    if !verify_password(password, &user.password_hash) {
        tracing::debug!(username = %user.username, "Rejected password");
        return Err(AppError::Unauthorized("Incorrect password".to_string()));
    }

    Ok(user)
}

pub async fn change_password(
    repo: &dyn Repository,
    username: &str,
    current_password: &str,
    new_password: &str,
) -> AppResult<()> {
    if current_password == new_password {
        return Err(AppError::InvalidInput(
            "New password must differ from the current one".to_string(),
        ));
    }

    let user = authenticate(repo, username, current_password).await?;
    validate_password(new_password)?;

    repo.change_password(&user.username, hash_password(new_password)?)
        .await?;

    tracing::info!(username = %user.username, "Changed password");
    Ok(())
}

pub async fn change_username(
    repo: &dyn Repository,
    username: &str,
    new_username: &str,
) -> AppResult<User> {
    let new_username = validate_username(new_username)?;
    let user = repo.change_username(username, &new_username).await?;

    tracing::info!(from = %canonical_username(username), to = %user.username, "Changed username");
    Ok(user)
}

/// Deletes an account once the password is confirmed
pub async fn delete_account(repo: &dyn Repository, username: &str, password: &str) -> AppResult<()> {
    let user = authenticate(repo, username, password).await?;
    repo.delete_user(&user.username).await?;

    tracing::info!(username = %user.username, "Deleted account");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;
    use crate::repository::{MemoryRepository, MockRepository};

    const PASSWORD: &str = "Abcdefg1";

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password(PASSWORD).unwrap();
        assert_ne!(hash, PASSWORD);
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(PASSWORD, &hash));
        assert!(!verify_password("abcdefg1", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password(PASSWORD).unwrap(), hash_password(PASSWORD).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password(PASSWORD, "not-a-hash"));
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password("Abcdefg1").is_ok());
        assert!(validate_password("Abcdef1").is_err());
        assert!(validate_password("abcdefg1").is_err());
        assert!(validate_password("ABCDEFG1").is_err());
        assert!(validate_password("Abcdefgh").is_err());
    }

    #[test]
    fn test_username_validation() {
        assert_eq!(validate_username("  Dave ").unwrap(), "dave");
        assert!(validate_username(" ab ").is_err());
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let repo = MemoryRepository::new();
        let user = register(&repo, "Pmccartney", PASSWORD).await.unwrap();
        assert_eq!(user.username, "pmccartney");

        let authenticated = authenticate(&repo, "PMcCartney", PASSWORD).await.unwrap();
        assert_eq!(authenticated.id, user.id);
    }

    #[tokio::test]
    async fn test_register_taken_username() {
        let repo = MemoryRepository::new();
        register(&repo, "pmccartney", PASSWORD).await.unwrap();

        let result = register(&repo, " PMCCARTNEY", PASSWORD).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let mut repo = MockRepository::new();
        repo.expect_add_user().never();

        let result = register(&repo, "pmccartney", "abc").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_authenticate_distinguishes_failures() {
        let repo = MemoryRepository::new();
        register(&repo, "pmccartney", PASSWORD).await.unwrap();

        match authenticate(&repo, "jlennon", PASSWORD).await {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "Unknown username"),
            other => panic!("unexpected result: {:?}", other.map(|u| u.username)),
        }
        match authenticate(&repo, "pmccartney", "Wrongpass1").await {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "Incorrect password"),
            other => panic!("unexpected result: {:?}", other.map(|u| u.username)),
        }
    }

    #[tokio::test]
    async fn test_get_unknown_user() {
        let mut repo = MockRepository::new();
        repo.expect_get_user().returning(|_| Ok(None));

        assert!(matches!(get_user(&repo, "nobody").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_change_password() {
        let repo = MemoryRepository::new();
        register(&repo, "pmccartney", PASSWORD).await.unwrap();

        let same = change_password(&repo, "pmccartney", PASSWORD, PASSWORD).await;
        assert!(matches!(same, Err(AppError::InvalidInput(_))));

        let wrong = change_password(&repo, "pmccartney", "Wrongpass1", "Newpass12").await;
        assert!(matches!(wrong, Err(AppError::Unauthorized(_))));

        change_password(&repo, "pmccartney", PASSWORD, "Newpass12").await.unwrap();
        assert!(authenticate(&repo, "pmccartney", "Newpass12").await.is_ok());
        assert!(authenticate(&repo, "pmccartney", PASSWORD).await.is_err());
    }

    #[tokio::test]
    async fn test_change_username_validates() {
        let mut repo = MockRepository::new();
        repo.expect_change_username().never();

        let result = change_username(&repo, "pmccartney", "pm").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_change_username_canonicalises() {
        let mut repo = MockRepository::new();
        repo.expect_change_username()
            .withf(|old, new| old == "pmccartney" && new == "macca")
            .returning(|_, new| Ok(NewUser::new(new, String::new()).into_user(UserId(1))));

        let user = change_username(&repo, "pmccartney", " Macca ").await.unwrap();
        assert_eq!(user.username, "macca");
    }

    #[tokio::test]
    async fn test_delete_account_requires_password() {
        let repo = MemoryRepository::new();
        register(&repo, "pmccartney", PASSWORD).await.unwrap();

        assert!(delete_account(&repo, "pmccartney", "Wrongpass1").await.is_err());
        delete_account(&repo, "pmccartney", PASSWORD).await.unwrap();
        assert!(repo.get_user("pmccartney").await.unwrap().is_none());
    }
}
