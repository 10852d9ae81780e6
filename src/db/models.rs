use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One panel account as stored.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub salt: String,
    pub server_name: Option<String>,
    pub server_url: Option<String>,
    pub api_key: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Account shape returned by the API. Never carries hash or salt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(rename = "type")]
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<AccountRow> for AccountInfo {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            server_name: row.server_name,
            server_url: row.server_url,
            api_key: row.api_key,
            role: row.role,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_info_hides_secrets() {
        let row = AccountRow {
            id: Uuid::new_v4(),
            email: "op@example.com".to_string(),
            name: "Operadora".to_string(),
            password_hash: "deadbeef".to_string(),
            salt: "sal".to_string(),
            server_name: Some("Servidor 1".to_string()),
            server_url: Some("http://emby:8096".to_string()),
            api_key: Some("k".to_string()),
            role: "admin".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&AccountInfo::from(row)).unwrap();
        assert!(!json.contains("deadbeef"));
        assert!(!json.contains("salt"));
        assert!(json.contains("\"type\":\"admin\""));
    }
}
