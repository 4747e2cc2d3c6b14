use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-user tier governing the upload quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plan {
    Free,
    Premium,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::Free => write!(f, "Free"),
            Plan::Premium => write!(f, "Premium"),
        }
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Free" => Ok(Plan::Free),
            "Premium" => Ok(Plan::Premium),
            other => Err(format!("unknown plan: {other}")),
        }
    }
}

/// Per-plan upload size limits in bytes. `None` means unlimited.
///
/// Premium defaults to unlimited, but that is an explicit configured value
/// rather than a missing check.
#[derive(Debug, Clone, Copy)]
pub struct PlanQuotas {
    pub free: u64,
    pub premium: Option<u64>,
}

/// 50 MiB default limit for the Free plan.
pub const DEFAULT_FREE_PLAN_LIMIT: u64 = 50 * 1024 * 1024;

impl Default for PlanQuotas {
    fn default() -> Self {
        Self {
            free: DEFAULT_FREE_PLAN_LIMIT,
            premium: None,
        }
    }
}

impl PlanQuotas {
    pub fn limit_for(&self, plan: Plan) -> Option<u64> {
        match plan {
            Plan::Free => Some(self.free),
            Plan::Premium => self.premium,
        }
    }
}

/// Permission level of an API token, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permissions {
    Read,
    Write,
    ReadWrite,
}

impl Permissions {
    /// Whether this token's level covers the level a route requires.
    pub fn allows(&self, required: Permissions) -> bool {
        match self {
            Permissions::ReadWrite => true,
            level => *level == required,
        }
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permissions::Read => write!(f, "Read"),
            Permissions::Write => write!(f, "Write"),
            Permissions::ReadWrite => write!(f, "ReadWrite"),
        }
    }
}

impl FromStr for Permissions {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Read" => Ok(Permissions::Read),
            "Write" => Ok(Permissions::Write),
            "ReadWrite" => Ok(Permissions::ReadWrite),
            other => Err(format!("unknown permission level: {other}")),
        }
    }
}

/// An account as exposed to clients. The password digest never leaves the
/// database layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub active: bool,
    pub plan: Plan,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted, revocable API credential. The secret is excluded here; it is
/// only ever returned through [`crate::api::TokenSecretResponse`] at creation
/// or reset time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: Uuid,
    pub name: String,
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

/// Metadata record for one uploaded file. `hash` identifies the blob in the
/// content-addressed store; byte-identical uploads share a hash but each
/// upload gets its own record scoped to its uploader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: Uuid,
    pub hash: String,
    pub size: i64,
    pub pinned_at: DateTime<Utc>,
    pub unpinned_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_cover_required_levels() {
        assert!(Permissions::ReadWrite.allows(Permissions::Read));
        assert!(Permissions::ReadWrite.allows(Permissions::Write));
        assert!(Permissions::Read.allows(Permissions::Read));
        assert!(!Permissions::Read.allows(Permissions::Write));
        assert!(Permissions::Write.allows(Permissions::Write));
        assert!(!Permissions::Write.allows(Permissions::Read));
    }

    #[test]
    fn plan_quotas_default_premium_is_unlimited() {
        let quotas = PlanQuotas::default();
        assert_eq!(quotas.limit_for(Plan::Free), Some(DEFAULT_FREE_PLAN_LIMIT));
        assert_eq!(quotas.limit_for(Plan::Premium), None);
    }

    #[test]
    fn plan_round_trips_through_strings() {
        for plan in [Plan::Free, Plan::Premium] {
            assert_eq!(plan.to_string().parse::<Plan>().unwrap(), plan);
        }
        assert!("Gold".parse::<Plan>().is_err());
    }
}
