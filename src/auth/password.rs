use bcrypt::{hash, verify};

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy)]
pub struct PasswordService {
    cost: u32,
}

impl Default for PasswordService {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordService {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        hash(password, self.cost)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        verify(password, hash)
            .map_err(|e| AppError::Auth(format!("Failed to verify password: {}", e)))
    }

    pub fn validate_password_strength(password: &str) -> Result<()> {
        if password.len() < 8 {
            return Err(AppError::Validation("Password must be at least 8 characters long".to_string()));
        }

        let has_letter = password.chars().any(|c| c.is_alphabetic());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());

        if !has_letter || !has_digit {
            return Err(AppError::Validation("Password must contain letters and digits".to_string()));
        }

        Ok(())
    }

    pub fn validate_username(username: &str) -> Result<()> {
        let valid_chars = username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');

        if !(3..=50).contains(&username.len()) || !valid_chars {
            return Err(AppError::Validation(
                "Username must be 3-50 characters of letters, digits, '.', '_' or '-'".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing_and_verification() {
        let service = PasswordService::new(4);
        let password = "TestPassword123";
        let hash = service.hash_password(password).unwrap();

        assert_ne!(hash, password);
        assert!(service.verify_password(password, &hash).unwrap());
        assert!(!service.verify_password("wrong_password1", &hash).unwrap());
    }

    #[test]
    fn test_password_strength_validation() {
        assert!(PasswordService::validate_password_strength("password123").is_ok());
        assert!(PasswordService::validate_password_strength("weak1").is_err());
        assert!(PasswordService::validate_password_strength("nodigitsatall").is_err());
        assert!(PasswordService::validate_password_strength("1234567890").is_err());
    }

    #[test]
    fn test_username_validation() {
        assert!(PasswordService::validate_username("alice_01").is_ok());
        assert!(PasswordService::validate_username("al").is_err());
        assert!(PasswordService::validate_username("bad name").is_err());
    }
}
