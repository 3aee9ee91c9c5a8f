use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::domain::access_code::{AccessCode, AccessCodeError, AccessCodeId, AccessRole};
use crate::errors::{DomainError, EngineError};
use crate::store::{AccessCodeStore, CasOutcome};

/// Uppercase letters and digits, matching what operators read out over
/// the phone.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const DEFAULT_CODE_LENGTH: u32 = 8;
pub const DEFAULT_EXPIRY_DAYS: u32 = 7;

/// Issues, validates and consumes the one-time credentials that gate
/// client login. Consumption is a conditional update at the storage
/// boundary; the loser of a concurrent pair is told it lost.
pub struct AccessCodeIssuer {
    codes: Arc<dyn AccessCodeStore>,
    code_length: u32,
    expiry_days: u32,
}

impl AccessCodeIssuer {
    pub fn new(codes: Arc<dyn AccessCodeStore>, code_length: u32, expiry_days: u32) -> Self {
        Self { codes, code_length, expiry_days }
    }

    pub fn with_defaults(codes: Arc<dyn AccessCodeStore>) -> Self {
        Self::new(codes, DEFAULT_CODE_LENGTH, DEFAULT_EXPIRY_DAYS)
    }

    pub async fn issue(
        &self,
        email: &str,
        holder_name: &str,
        role: &str,
    ) -> Result<AccessCode, EngineError> {
        validate_email(email)?;
        if holder_name.trim().is_empty() {
            return Err(EngineError::validation("holder name must not be empty"));
        }
        let Some(role) = AccessRole::parse(role) else {
            return Err(EngineError::validation(format!(
                "unrecognized access role `{role}` (expected client|admin)"
            )));
        };

        let now = Utc::now();
        let code = AccessCode {
            id: AccessCodeId(Uuid::new_v4().to_string()),
            code: generate_code(self.code_length),
            email: email.trim().to_string(),
            holder_name: holder_name.trim().to_string(),
            role,
            used: false,
            used_at: None,
            created_at: now,
            expires_at: now + Duration::days(i64::from(self.expiry_days)),
        };

        self.codes.insert(code.clone()).await?;
        Ok(code)
    }

    /// Looks the code up and reports not-found, already-used and expired
    /// as three distinct outcomes so login can show a specific message.
    pub async fn validate(&self, code: &str) -> Result<AccessCode, EngineError> {
        let Some(record) = self.codes.find_by_code(code.trim()).await? else {
            return Err(AccessCodeError::NotFound.into());
        };
        record.check_usable(Utc::now())?;
        Ok(record)
    }

    /// Burns the code. The second of two concurrent consumers gets
    /// `AlreadyUsed` and no state change — rejection, not silent success.
    pub async fn consume(&self, id: &AccessCodeId) -> Result<(), EngineError> {
        match self.codes.mark_used(id, Utc::now()).await? {
            CasOutcome::Applied => Ok(()),
            CasOutcome::Lost => Err(AccessCodeError::AlreadyUsed.into()),
            CasOutcome::Missing => Err(AccessCodeError::NotFound.into()),
        }
    }

    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, EngineError> {
        Ok(self.codes.delete_expired(now).await?)
    }
}

fn generate_code(length: u32) -> String {
    let mut rng = rand::thread_rng();
    (0..length).map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char).collect()
}

pub fn validate_email(email: &str) -> Result<(), DomainError> {
    let email = email.trim();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        })
        .unwrap_or(false);

    if valid {
        Ok(())
    } else {
        Err(DomainError::Validation(format!("`{email}` is not a valid email address")))
    }
}
