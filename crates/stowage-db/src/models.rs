//! Database row types — these map directly to SQLite rows.
//! Distinct from the stowage-types API models so the handlers can never
//! accidentally serialize a password digest or a token secret.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use uuid::Uuid;

use stowage_types::models::{ApiToken, StoredFile, User};

#[derive(Debug)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub active: bool,
    pub plan: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct TokenRow {
    pub id: String,
    pub user_id: Option<i64>,
    pub name: String,
    pub secret: String,
    pub permissions: String,
    pub created_at: String,
    pub last_used: Option<String>,
}

pub struct FileRow {
    pub id: String,
    pub user_id: Option<i64>,
    pub hash: String,
    pub size: i64,
    pub pinned_at: String,
    pub unpinned_at: Option<String>,
    pub metadata: Option<String>,
}

/// Parse sqlite's `datetime('now')` format into a UTC timestamp.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("bad timestamp in database: {s}"))?;
    Ok(Utc.from_utc_datetime(&naive))
}

impl UserRow {
    pub fn into_model(self) -> Result<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            active: self.active,
            plan: self.plan.parse().map_err(anyhow::Error::msg)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

impl TokenRow {
    pub fn into_model(self) -> Result<ApiToken> {
        Ok(ApiToken {
            id: Uuid::parse_str(&self.id)?,
            name: self.name,
            permissions: self.permissions.parse().map_err(anyhow::Error::msg)?,
            created_at: parse_timestamp(&self.created_at)?,
            last_used: self.last_used.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

impl FileRow {
    pub fn into_model(self) -> Result<StoredFile> {
        let metadata = match self.metadata.as_deref() {
            Some(raw) => serde_json::from_str(raw).context("bad file metadata in database")?,
            None => serde_json::Value::Null,
        };

        Ok(StoredFile {
            id: Uuid::parse_str(&self.id)?,
            hash: self.hash,
            size: self.size,
            pinned_at: parse_timestamp(&self.pinned_at)?,
            unpinned_at: self
                .unpinned_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            metadata,
        })
    }
}
