//! Access-control engine: pure decision functions over a principal and a
//! link. No I/O happens here; every call site (create, update, delete,
//! list, management reads) goes through the same predicates so the
//! owner-or-group logic cannot drift between paths.

use crate::models::{permissions, GroupRef, Link, Principal};
use crate::storage::ListFilter;

/// What a principal is attempting.
#[derive(Debug, Clone)]
pub enum LinkAction<'a> {
    Create {
        group: Option<&'a GroupRef>,
        custom_slug: bool,
    },
    Read,
    Update {
        /// A group binding the request switches the link to, when it
        /// differs from the current one.
        new_group: Option<&'a GroupRef>,
    },
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Ownership and group membership are independently sufficient, never
/// required jointly. This is the single eligibility predicate behind
/// update, delete, management reads and the list filter.
pub fn can_manage(principal: &Principal, link: &Link) -> bool {
    if principal.user_id == link.owner {
        return true;
    }
    match link.group_binding() {
        Some(group) => principal.member_of(&group),
        None => false,
    }
}

/// Decide whether `principal` may perform `action`. `link` carries the
/// current persisted state and must be present for everything but create.
pub fn authorize(principal: &Principal, action: &LinkAction<'_>, link: Option<&Link>) -> Decision {
    match action {
        LinkAction::Create { group, custom_slug } => {
            if *custom_slug && !principal.has_permission(permissions::CREATE_CUSTOM_SLUG) {
                return Decision::Deny("custom slugs require permission".to_string());
            }
            if let Some(group) = group {
                if !principal.member_of(group) {
                    return Decision::Deny("not a member of target group".to_string());
                }
            }
            Decision::Allow
        }
        LinkAction::Read | LinkAction::Delete => {
            if principal.has_permission(permissions::MANAGE_ALL_LINKS) {
                return Decision::Allow;
            }
            match link {
                Some(link) if can_manage(principal, link) => Decision::Allow,
                Some(_) => Decision::Deny("not the owner or a group member".to_string()),
                None => Decision::Deny("no link to authorize against".to_string()),
            }
        }
        LinkAction::Update { new_group } => {
            if principal.has_permission(permissions::MANAGE_ALL_LINKS) {
                return Decision::Allow;
            }
            // Changing into a group requires membership in that group even
            // when the principal owns the link.
            if let Some(new_group) = new_group {
                if !principal.member_of(new_group) {
                    return Decision::Deny("not a member of target group".to_string());
                }
            }
            match link {
                Some(link) if can_manage(principal, link) => Decision::Allow,
                Some(_) => Decision::Deny("not the owner or a group member".to_string()),
                None => Decision::Deny("no link to authorize against".to_string()),
            }
        }
    }
}

/// Translate the eligibility predicate into a storage filter for list. A
/// record passes the filter exactly when `can_manage` accepts it.
pub fn list_filter(principal: &Principal) -> ListFilter {
    if principal.has_permission(permissions::MANAGE_ALL_LINKS) {
        return ListFilter::All;
    }
    ListFilter::OwnerOrGroups {
        owner: principal.user_id.clone(),
        groups: principal
            .groups
            .iter()
            .map(|m| (m.id.clone(), m.domain.clone()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GroupMembership;

    fn link(owner: &str, group: Option<(&str, &str)>) -> Link {
        Link {
            id: 1,
            slug: "aaab".to_string(),
            destination: "https://example.com".to_string(),
            owner: owner.to_string(),
            group_id: group.map(|(id, _)| id.to_string()),
            group_domain: group.map(|(_, d)| d.to_string()),
            group_name: None,
            description: None,
            created_at: 0,
            expires_at: None,
            clicks: 0,
        }
    }

    fn principal(user: &str, perms: &[&str], groups: &[(&str, &str)]) -> Principal {
        let mut p = Principal::new(user);
        p.permissions = perms.iter().map(|s| s.to_string()).collect();
        p.groups = groups
            .iter()
            .map(|(id, d)| GroupMembership {
                id: id.to_string(),
                domain: d.to_string(),
                name: None,
            })
            .collect();
        p
    }

    #[test]
    fn owner_may_update_ungrouped_link() {
        let l = link("u1", None);
        let owner = principal("u1", &[], &[]);
        let stranger = principal("u2", &[], &[]);

        assert!(authorize(&owner, &LinkAction::Update { new_group: None }, Some(&l)).is_allowed());
        assert!(
            !authorize(&stranger, &LinkAction::Update { new_group: None }, Some(&l)).is_allowed()
        );
    }

    #[test]
    fn group_member_co_manages_bound_link() {
        let l = link("u1", Some(("dev", "example.org")));
        let member = principal("u2", &[], &[("dev", "example.org")]);
        let wrong_domain = principal("u2", &[], &[("dev", "other.org")]);

        assert!(authorize(&member, &LinkAction::Update { new_group: None }, Some(&l)).is_allowed());
        assert!(authorize(&member, &LinkAction::Delete, Some(&l)).is_allowed());
        assert!(!authorize(&wrong_domain, &LinkAction::Delete, Some(&l)).is_allowed());
    }

    #[test]
    fn manage_all_bypasses_ownership() {
        let l = link("u1", None);
        let admin = principal("root", &["manage-all-links"], &[]);

        assert!(authorize(&admin, &LinkAction::Read, Some(&l)).is_allowed());
        assert!(authorize(&admin, &LinkAction::Delete, Some(&l)).is_allowed());
        assert!(matches!(list_filter(&admin), ListFilter::All));
    }

    #[test]
    fn create_into_foreign_group_denied() {
        let target = GroupRef {
            id: "dev".to_string(),
            domain: "example.org".to_string(),
        };
        let outsider = principal("u1", &[], &[]);
        let member = principal("u1", &[], &[("dev", "example.org")]);

        let action = LinkAction::Create {
            group: Some(&target),
            custom_slug: false,
        };
        assert_eq!(
            authorize(&outsider, &action, None),
            Decision::Deny("not a member of target group".to_string())
        );
        assert!(authorize(&member, &action, None).is_allowed());
    }

    #[test]
    fn custom_slug_requires_permission() {
        let action = LinkAction::Create {
            group: None,
            custom_slug: true,
        };
        assert!(!authorize(&principal("u1", &[], &[]), &action, None).is_allowed());
        assert!(
            authorize(&principal("u1", &["create-custom-slug"], &[]), &action, None).is_allowed()
        );
    }

    #[test]
    fn rebinding_requires_membership_in_new_group_even_for_owner() {
        let l = link("u1", None);
        let owner = principal("u1", &[], &[]);
        let target = GroupRef {
            id: "dev".to_string(),
            domain: "example.org".to_string(),
        };

        let action = LinkAction::Update {
            new_group: Some(&target),
        };
        assert!(!authorize(&owner, &action, Some(&l)).is_allowed());

        let owner_in_group = principal("u1", &[], &[("dev", "example.org")]);
        assert!(authorize(&owner_in_group, &action, Some(&l)).is_allowed());
    }

    #[test]
    fn list_filter_mirrors_can_manage() {
        let p = principal("u1", &[], &[("dev", "example.org")]);
        let eligible_own = link("u1", None);
        let eligible_group = link("u9", Some(("dev", "example.org")));
        let ineligible = link("u9", Some(("ops", "example.org")));

        assert!(can_manage(&p, &eligible_own));
        assert!(can_manage(&p, &eligible_group));
        assert!(!can_manage(&p, &ineligible));

        match list_filter(&p) {
            ListFilter::OwnerOrGroups { owner, groups } => {
                assert_eq!(owner, "u1");
                assert_eq!(groups, vec![("dev".to_string(), "example.org".to_string())]);
            }
            ListFilter::All => panic!("expected scoped filter"),
        }
    }
}
