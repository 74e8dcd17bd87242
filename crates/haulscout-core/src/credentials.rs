use crate::crypto::Cipher;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Marketplace session material as the scan pipeline needs it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredentials {
    pub email: String,
    pub cookie: String,
    pub csrf_token: String,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("email", &self.email)
            .field("cookie", &"<redacted>")
            .field("csrf_token", &"<redacted>")
            .finish()
    }
}

/// Stored credential row. Every secret field holds an encrypted blob.
#[derive(Debug, Clone, FromRow)]
pub struct Credentials {
    pub user_id: String,
    pub email_enc: String,
    pub session_cookie_enc: String,
    pub csrf_token_enc: String,
    pub is_valid: bool,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credentials {
    pub fn seal(user_id: impl Into<String>, session: &SessionCredentials, cipher: &Cipher) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            user_id: user_id.into(),
            email_enc: cipher.encrypt(&session.email)?,
            session_cookie_enc: cipher.encrypt(&session.cookie)?,
            csrf_token_enc: cipher.encrypt(&session.csrf_token)?,
            is_valid: true,
            last_validated_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn open(&self, cipher: &Cipher) -> Result<SessionCredentials> {
        Ok(SessionCredentials {
            email: cipher.decrypt(&self.email_enc)?,
            cookie: cipher.decrypt(&self.session_cookie_enc)?,
            csrf_token: cipher.decrypt(&self.csrf_token_enc)?,
        })
    }
}
