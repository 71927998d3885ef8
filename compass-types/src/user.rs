use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::errors::RoleParseError;

/// The authenticated principal as reported by the identity backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
}

/// Coarse-grained authorization label. Declaration order is priority order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RoleTag {
    Admin,
    Partner,
    Standard,
}

impl RoleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleTag::Admin => "admin",
            RoleTag::Partner => "partner",
            RoleTag::Standard => "standard",
        }
    }
}

impl fmt::Display for RoleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleTag {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(RoleTag::Admin),
            "partner" => Ok(RoleTag::Partner),
            "standard" => Ok(RoleTag::Standard),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

/// Every role row held by one principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoleSet {
    tags: BTreeSet<RoleTag>,
}

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: RoleTag) -> bool {
        self.tags.insert(tag)
    }

    pub fn contains(&self, tag: RoleTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RoleTag> + '_ {
        self.tags.iter().copied()
    }

    pub fn is_admin(&self) -> bool {
        self.contains(RoleTag::Admin)
    }

    /// Independent of `is_admin`: a user may hold both rows.
    pub fn is_partner(&self) -> bool {
        self.contains(RoleTag::Partner)
    }

    /// admin > partner > standard; no rows at all means standard.
    pub fn effective_role(&self) -> RoleTag {
        self.tags.first().copied().unwrap_or(RoleTag::Standard)
    }
}

impl FromIterator<RoleTag> for RoleSet {
    fn from_iter<I: IntoIterator<Item = RoleTag>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}

/// Body of `GET /api/session`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionInfo {
    pub identity: Identity,
    pub roles: Vec<RoleTag>,
    pub effective_role: RoleTag,
    pub is_admin: bool,
    pub is_partner: bool,
}

impl SessionInfo {
    pub fn new(identity: Identity, roles: &RoleSet) -> Self {
        Self {
            identity,
            roles: roles.iter().collect(),
            effective_role: roles.effective_role(),
            is_admin: roles.is_admin(),
            is_partner: roles.is_partner(),
        }
    }
}

/// A row of the admin user list: profile fields plus assigned roles.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: String, // ISO 8601 string
    pub roles: Vec<RoleTag>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_role_priority() {
        let empty = RoleSet::new();
        assert_eq!(empty.effective_role(), RoleTag::Standard);
        assert!(!empty.is_admin());
        assert!(!empty.is_partner());

        let both: RoleSet = [RoleTag::Standard, RoleTag::Partner, RoleTag::Admin]
            .into_iter()
            .collect();
        assert_eq!(both.effective_role(), RoleTag::Admin);
        assert!(both.is_admin());
        assert!(both.is_partner());

        let partner: RoleSet = [RoleTag::Partner].into_iter().collect();
        assert_eq!(partner.effective_role(), RoleTag::Partner);
        assert!(!partner.is_admin());
    }

    #[test]
    fn test_role_tag_parsing() {
        assert_eq!("admin".parse::<RoleTag>().unwrap(), RoleTag::Admin);
        assert_eq!(" Partner ".parse::<RoleTag>().unwrap(), RoleTag::Partner);
        assert!("owner".parse::<RoleTag>().is_err());
        assert_eq!(serde_json::to_string(&RoleTag::Standard).unwrap(), "\"standard\"");
    }
}
