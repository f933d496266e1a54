//! Account input rules shared by registration and login.
//!
//! Values are normalized here (trimmed, email lowercased) so persistence only
//! ever sees canonical forms and uniqueness constraints stay meaningful.

use super::error::DomainError;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 64;
pub const PASSWORD_MIN_LEN: usize = 8;
const EMAIL_MAX_LEN: usize = 254;

/// Registration input after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl NewAccount {
    pub fn parse(
        username: &str,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> Result<Self, DomainError> {
        let username = normalize_username(username)?;
        let email = normalize_email(email)?;

        if password.chars().count() < PASSWORD_MIN_LEN {
            return Err(DomainError::validation(
                "password",
                format!("must be at least {PASSWORD_MIN_LEN} characters"),
            ));
        }
        if password != confirm {
            return Err(DomainError::validation("confirm", "passwords do not match"));
        }

        Ok(Self {
            username,
            email,
            password: password.to_string(),
        })
    }
}

pub fn normalize_username(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(DomainError::validation(
            "username",
            format!("must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"),
        ));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(DomainError::validation(
            "username",
            "may only contain letters, digits, `_`, `-` and `.`",
        ));
    }
    Ok(trimmed.to_string())
}

pub fn normalize_email(raw: &str) -> Result<String, DomainError> {
    let email = raw.trim().to_ascii_lowercase();
    if email.is_empty() || email.len() > EMAIL_MAX_LEN {
        return Err(DomainError::validation("email", "must be a valid address"));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(DomainError::validation("email", "must contain `@`"));
    };
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(DomainError::validation("email", "must be a valid address"));
    }

    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_fields() {
        let account = NewAccount::parse("  alice ", " Alice@Example.COM ", "hunter2hunter2", "hunter2hunter2")
            .expect("valid account");
        assert_eq!(account.username, "alice");
        assert_eq!(account.email, "alice@example.com");
    }

    #[test]
    fn rejects_short_password() {
        let err = NewAccount::parse("alice", "alice@example.com", "short", "short").unwrap_err();
        assert_eq!(err.field(), Some("password"));
    }

    #[test]
    fn rejects_mismatched_confirmation() {
        let err = NewAccount::parse("alice", "alice@example.com", "longenough", "different")
            .unwrap_err();
        assert_eq!(err.field(), Some("confirm"));
    }

    #[test]
    fn rejects_malformed_emails() {
        for email in ["", "alice", "alice@", "@example.com", "a@b", "a@@b.com", "a b@c.com"] {
            assert!(normalize_email(email).is_err(), "{email} should be rejected");
        }
    }

    #[test]
    fn rejects_usernames_with_spaces() {
        assert!(normalize_username("al ice").is_err());
        assert!(normalize_username("al").is_err());
        assert_eq!(normalize_username("shop.keeper-1").unwrap(), "shop.keeper-1");
    }
}
