//! Shared domain enumerations aligned with persisted database enums.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Admin,
    Delivery,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Admin => "admin",
            UserRole::Delivery => "delivery",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UserRole::Customer => "Customer",
            UserRole::Admin => "Administrator",
            UserRole::Delivery => "Delivery staff",
        }
    }

    /// Whether a principal holding `self` may access pages gated on `required`.
    ///
    /// Administrators pass every role gate.
    pub fn satisfies(self, required: UserRole) -> bool {
        self == required || self == UserRole::Admin
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(UserRole::Customer),
            "admin" => Ok(UserRole::Admin),
            "delivery" => Ok(UserRole::Delivery),
            other => Err(DomainError::validation(
                "role",
                format!("unknown role `{other}`"),
            )),
        }
    }
}
