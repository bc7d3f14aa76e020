//! The session token this crate only ever reads, never mints or verifies.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub user_id: String,
}

impl SessionToken {
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_expired_compares_against_expires_at() {
        let token = SessionToken {
            token: "t".into(),
            expires_at: OffsetDateTime::UNIX_EPOCH + time::Duration::minutes(10),
            created_at: OffsetDateTime::UNIX_EPOCH,
            user_id: "u_1".into(),
        };
        assert!(!token.is_expired(OffsetDateTime::UNIX_EPOCH + time::Duration::minutes(5)));
        assert!(token.is_expired(OffsetDateTime::UNIX_EPOCH + time::Duration::minutes(10)));
        assert!(token.is_expired(OffsetDateTime::UNIX_EPOCH + time::Duration::minutes(20)));
    }
}
