//! Validation helpers for DTOs.

use validator::ValidationError;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;

/// Validates that a username is 3 to 32 ASCII alphanumerics, `_` or `-`.
///
/// # Examples
///
/// ```ignore
/// validate_username("ada_l")   // Ok
/// validate_username("ab")      // Err - too short
/// validate_username("ada l")   // Err - space
/// ```
pub fn validate_username(name: &str) -> Result<(), ValidationError> {
    let len = name.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        let mut err = ValidationError::new("username_length");
        err.message = Some(
            format!("Username must be between {USERNAME_MIN} and {USERNAME_MAX} characters (got {len})")
                .into(),
        );
        return Err(err);
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        let mut err = ValidationError::new("username_format");
        err.message =
            Some("Username may only contain letters, digits, underscores and dashes".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_usual_names() {
        assert!(validate_username("ada").is_ok());
        assert!(validate_username("grace_hopper-42").is_ok());
        assert!(validate_username(&"x".repeat(32)).is_ok());
    }

    #[test]
    fn rejects_bad_length() {
        assert!(validate_username("").is_err());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }

    #[test]
    fn rejects_bad_characters() {
        assert!(validate_username("ada lovelace").is_err());
        assert!(validate_username("ada!").is_err());
        assert!(validate_username("adé").is_err());
    }
}
