use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessCodeId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRole {
    Client,
    Admin,
}

impl AccessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "client" => Some(Self::Client),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Single-use, time-limited login credential. Mutated only by the
/// consume operation; the used flag never resets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCode {
    pub id: AccessCodeId,
    pub code: String,
    pub email: String,
    pub holder_name: String,
    pub role: AccessRole,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Used-state and expiry are independent checks; the used flag is
    /// reported first so a consumed code never masquerades as expired.
    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<(), AccessCodeError> {
        if self.used {
            return Err(AccessCodeError::AlreadyUsed);
        }
        if self.is_expired(now) {
            return Err(AccessCodeError::Expired);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AccessCodeError {
    #[error("access code was not found")]
    NotFound,
    #[error("access code has already been used")]
    AlreadyUsed,
    #[error("access code has expired")]
    Expired,
}

impl AccessCodeError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound => "That access code is not recognized. Check the code and try again.",
            Self::AlreadyUsed => "That access code has already been used and cannot be reused.",
            Self::Expired => "That access code has expired. Ask for a new invitation.",
        }
    }
}
