//! Link lifecycle manager: orchestrates slug minting, the blacklist guard
//! and the access-control engine around the storage gateway. Every mutation
//! of a link goes through here.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::authz::{self, Decision, LinkAction};
use crate::blacklist::BlacklistService;
use crate::error::{LinkError, LinkResult};
use crate::models::{
    CreateLinkRequest, GroupRef, Link, LinkChanges, NewLink, Principal, UpdateLinkRequest,
};
use crate::slug;
use crate::storage::{SlugSpec, Storage};

pub struct LinkService {
    storage: Arc<dyn Storage>,
    blacklist: Arc<BlacklistService>,
}

impl LinkService {
    pub fn new(storage: Arc<dyn Storage>, blacklist: Arc<BlacklistService>) -> Self {
        Self { storage, blacklist }
    }

    /// Create a link. Generated slugs come from the codec over the
    /// storage-assigned id; custom slugs are validated here and serialized
    /// by the storage uniqueness constraint.
    pub async fn create(&self, principal: &Principal, req: CreateLinkRequest) -> LinkResult<Link> {
        validate_destination(&req.destination)?;

        if self.blacklist.is_blocked(&req.destination).await? {
            return Err(LinkError::Forbidden("destination is blacklisted".to_string()));
        }

        if let Some(custom) = &req.slug {
            if !slug::is_valid_custom(custom) {
                return Err(LinkError::Validation(
                    "slug must be lowercase alphanumeric or hyphen".to_string(),
                ));
            }
            if slug::is_generated_form(custom) {
                return Err(LinkError::Validation(
                    "slug is reserved for generated links".to_string(),
                ));
            }
        }

        let action = LinkAction::Create {
            group: req.group.as_ref(),
            custom_slug: req.slug.is_some(),
        };
        if let Decision::Deny(reason) = authz::authorize(principal, &action, None) {
            return Err(LinkError::Forbidden(reason));
        }

        // Denormalize the display name from the principal's membership.
        let group_name = req
            .group
            .as_ref()
            .and_then(|g| principal.membership(g))
            .and_then(|m| m.name.clone());

        let new_link = NewLink {
            destination: req.destination,
            owner: principal.user_id.clone(),
            group_id: req.group.as_ref().map(|g| g.id.clone()),
            group_domain: req.group.as_ref().map(|g| g.domain.clone()),
            group_name,
            description: req.description,
            created_at: Utc::now().timestamp(),
            expires_at: req.expires_at,
        };

        let spec = match &req.slug {
            Some(custom) => SlugSpec::Custom(custom),
            None => SlugSpec::Generated,
        };

        let link = self.storage.insert_link(&new_link, spec).await?;
        info!(slug = %link.slug, owner = %link.owner, "created link");
        Ok(link)
    }

    /// Partial update. Authorization runs against the current persisted
    /// state; a changed group binding is re-validated against the
    /// principal's memberships.
    pub async fn update(
        &self,
        principal: &Principal,
        slug: &str,
        req: UpdateLinkRequest,
    ) -> LinkResult<Link> {
        if req.is_empty() {
            return Err(LinkError::Validation(
                "at least one field must be supplied".to_string(),
            ));
        }

        let current = self
            .storage
            .find_by_slug(slug)
            .await?
            .ok_or(LinkError::NotFound)?;

        // Only a binding that differs from the current one counts as a
        // change for authorization purposes.
        let requested_group: Option<&Option<GroupRef>> = req.group.as_ref();
        let new_group = match requested_group {
            Some(Some(target)) if current.group_binding().as_ref() != Some(target) => Some(target),
            _ => None,
        };

        let action = LinkAction::Update { new_group };
        if let Decision::Deny(reason) = authz::authorize(principal, &action, Some(&current)) {
            return Err(LinkError::Forbidden(reason));
        }

        if let Some(destination) = &req.destination {
            validate_destination(destination)?;
            if self.blacklist.is_blocked(destination).await? {
                return Err(LinkError::Forbidden("destination is blacklisted".to_string()));
            }
        }

        let (group_id, group_domain, group_name) = match requested_group {
            // Binding untouched: keep what is persisted.
            None => (
                current.group_id.clone(),
                current.group_domain.clone(),
                current.group_name.clone(),
            ),
            // Explicitly cleared.
            Some(None) => (None, None, None),
            Some(Some(target)) => {
                let name = principal
                    .membership(target)
                    .and_then(|m| m.name.clone())
                    .or_else(|| current.group_name.clone());
                (Some(target.id.clone()), Some(target.domain.clone()), name)
            }
        };

        let changes = LinkChanges {
            destination: req.destination.unwrap_or_else(|| current.destination.clone()),
            group_id,
            group_domain,
            group_name,
            description: match req.description {
                Some(value) => value,
                None => current.description.clone(),
            },
            expires_at: match req.expires_at {
                Some(value) => value,
                None => current.expires_at,
            },
        };

        let updated = self
            .storage
            .update_link(current.id, &changes)
            .await?
            .ok_or(LinkError::NotFound)?;

        info!(slug = %updated.slug, "updated link");
        Ok(updated)
    }

    pub async fn delete(&self, principal: &Principal, slug: &str) -> LinkResult<()> {
        let current = self
            .storage
            .find_by_slug(slug)
            .await?
            .ok_or(LinkError::NotFound)?;

        if let Decision::Deny(reason) = authz::authorize(principal, &LinkAction::Delete, Some(&current)) {
            return Err(LinkError::Forbidden(reason));
        }

        if !self.storage.delete_link(current.id).await? {
            return Err(LinkError::NotFound);
        }

        info!(slug = %slug, "deleted link");
        Ok(())
    }

    /// Links the principal may manage, newest first.
    pub async fn list(&self, principal: &Principal) -> LinkResult<Vec<Link>> {
        let filter = authz::list_filter(principal);
        Ok(self.storage.list_links(&filter).await?)
    }

    /// Management read: same eligibility as update/delete.
    pub async fn get(&self, principal: &Principal, slug: &str) -> LinkResult<Link> {
        let link = self
            .storage
            .find_by_slug(slug)
            .await?
            .ok_or(LinkError::NotFound)?;

        if let Decision::Deny(reason) = authz::authorize(principal, &LinkAction::Read, Some(&link)) {
            return Err(LinkError::Forbidden(reason));
        }

        Ok(link)
    }

    /// Public redirect resolution; expired links are gone. No principal
    /// involved.
    pub async fn resolve(&self, slug: &str) -> LinkResult<Link> {
        let link = self
            .storage
            .find_by_slug(slug)
            .await?
            .ok_or(LinkError::NotFound)?;

        if let Some(expires_at) = link.expires_at {
            if expires_at < Utc::now().timestamp() {
                return Err(LinkError::NotFound);
            }
        }

        Ok(link)
    }

    /// Append a click for a resolved link. Failures here must not break the
    /// redirect, so callers log rather than propagate.
    pub async fn record_click(&self, link_id: i64, lang: Option<&str>) -> LinkResult<()> {
        self.storage
            .record_click(link_id, Utc::now().timestamp(), lang)
            .await?;
        Ok(())
    }
}

/// A destination must be non-empty and more than a bare scheme.
fn validate_destination(destination: &str) -> LinkResult<()> {
    let trimmed = destination.trim();
    if trimmed.is_empty() {
        return Err(LinkError::Validation("destination must not be empty".to_string()));
    }
    let rest = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    if rest.is_empty() {
        return Err(LinkError::Validation(
            "destination must not be a bare scheme".to_string(),
        ));
    }
    Ok(())
}
