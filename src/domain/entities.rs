//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::types::UserRole;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    /// Free-form profile attributes stored as JSON text.
    pub profile: String,
    pub created_at: OffsetDateTime,
}

impl UserRecord {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}
