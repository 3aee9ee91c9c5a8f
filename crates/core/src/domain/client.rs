use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::access_code::AccessCodeId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Archived,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Identity record for a prospective client. Owned by the operator;
/// immutable once archived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub client_code: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub access_code_id: Option<AccessCodeId>,
    pub status: ClientStatus,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn is_archived(&self) -> bool {
        self.status == ClientStatus::Archived
    }
}

#[cfg(test)]
mod tests {
    use super::ClientStatus;

    #[test]
    fn client_status_round_trips_from_storage_encoding() {
        for status in [ClientStatus::Active, ClientStatus::Archived] {
            assert_eq!(ClientStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn unknown_client_status_is_rejected() {
        assert_eq!(ClientStatus::parse("pending"), None);
    }
}
