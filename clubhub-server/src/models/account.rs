//! Account credentials validation
//!
//! Account names: 3-64 characters of `[A-Za-z0-9_]`.
//! Passwords: 6-72 characters (bcrypt only reads the first 72 bytes).

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

const MIN_ACCOUNT_LEN: usize = 3;
const MAX_ACCOUNT_LEN: usize = 64;
const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 72;

static ACCOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("invalid account regex"));

/// Validated login name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Account(String);

impl Account {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "account" });
        }
        if s.len() < MIN_ACCOUNT_LEN {
            return Err(ValidationError::TooShort {
                field: "account",
                min: MIN_ACCOUNT_LEN,
            });
        }
        if s.len() > MAX_ACCOUNT_LEN {
            return Err(ValidationError::TooLong {
                field: "account",
                max: MAX_ACCOUNT_LEN,
            });
        }
        if !ACCOUNT_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "account",
                reason: "only letters, digits and underscores are allowed",
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Account {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validated plaintext password, only ever handed to the hasher
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "password" });
        }
        if s.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::TooShort {
                field: "password",
                min: MIN_PASSWORD_LEN,
            });
        }
        if s.len() > MAX_PASSWORD_LEN {
            return Err(ValidationError::TooLong {
                field: "password",
                max: MAX_PASSWORD_LEN,
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_accounts() {
        assert!(Account::new("alice").is_ok());
        assert!(Account::new("stu_2024").is_ok());
        assert_eq!(Account::new("  bob  ").unwrap().as_str(), "bob");
    }

    #[test]
    fn rejects_bad_accounts() {
        assert!(matches!(
            Account::new("ab").unwrap_err(),
            ValidationError::TooShort { .. }
        ));
        assert!(matches!(
            Account::new("has space").unwrap_err(),
            ValidationError::InvalidFormat { .. }
        ));
        assert!(matches!(
            Account::new(&"a".repeat(65)).unwrap_err(),
            ValidationError::TooLong { max: 64, .. }
        ));
        assert!(matches!(
            Account::new("").unwrap_err(),
            ValidationError::Empty { .. }
        ));
    }

    #[test]
    fn password_bounds() {
        assert!(Password::new("12345").is_err());
        assert!(Password::new("123456").is_ok());
        assert!(Password::new(&"p".repeat(72)).is_ok());
        assert!(Password::new(&"p".repeat(73)).is_err());
    }

    #[test]
    fn password_debug_is_masked() {
        let p = Password::new("hunter22").unwrap();
        assert_eq!(format!("{:?}", p), "Password(***)");
    }
}
