use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::GroupRef;

/// Permission identifiers consumed by the access-control engine. The
/// upstream resolver normalizes whatever shape its identity provider emits
/// into this flat set of strings before it reaches us.
pub mod permissions {
    pub const CREATE_CUSTOM_SLUG: &str = "create-custom-slug";
    pub const MANAGE_ALL_LINKS: &str = "manage-all-links";
    pub const MANAGE_BLACKLIST: &str = "manage-blacklist";
}

/// One group the principal belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMembership {
    pub id: String,
    pub domain: String,
    /// Display name, carried through to links bound at creation time.
    #[serde(default)]
    pub name: Option<String>,
}

/// The authenticated actor behind a request. Never persisted; produced by
/// the upstream principal resolver and consumed as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    #[serde(default)]
    pub permissions: HashSet<String>,
    #[serde(default)]
    pub groups: Vec<GroupMembership>,
}

impl Principal {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            permissions: HashSet::new(),
            groups: Vec::new(),
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Exact (id, domain) membership match; the display name never
    /// participates in authorization.
    pub fn member_of(&self, group: &GroupRef) -> bool {
        self.groups
            .iter()
            .any(|m| m.id == group.id && m.domain == group.domain)
    }

    /// The full membership record for a group, used to denormalize the
    /// display name onto a link at bind time.
    pub fn membership(&self, group: &GroupRef) -> Option<&GroupMembership> {
        self.groups
            .iter()
            .find(|m| m.id == group.id && m.domain == group.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, domain: &str) -> GroupMembership {
        GroupMembership {
            id: id.to_string(),
            domain: domain.to_string(),
            name: None,
        }
    }

    #[test]
    fn membership_matches_on_id_and_domain() {
        let mut p = Principal::new("u1");
        p.groups.push(member("dev", "example.org"));

        assert!(p.member_of(&GroupRef {
            id: "dev".to_string(),
            domain: "example.org".to_string(),
        }));
        assert!(!p.member_of(&GroupRef {
            id: "dev".to_string(),
            domain: "other.org".to_string(),
        }));
    }
}
