use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

/// A shortened link. `id`, `slug`, `owner` and `created_at` are immutable
/// once persisted; `clicks` only moves through click recording.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: i64,
    pub slug: String,
    pub destination: String,
    pub owner: String,
    pub group_id: Option<String>,
    pub group_domain: Option<String>,
    /// Denormalized display name, purely presentational.
    pub group_name: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub clicks: i64,
}

impl Link {
    /// The link's authorization subject beyond its owner, if any.
    pub fn group_binding(&self) -> Option<GroupRef> {
        match (&self.group_id, &self.group_domain) {
            (Some(id), Some(domain)) => Some(GroupRef {
                id: id.clone(),
                domain: domain.clone(),
            }),
            _ => None,
        }
    }
}

/// Identifies an organizational group: a link bound to one is co-managed by
/// every member whose (id, domain) pair matches exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: String,
    pub domain: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub destination: String,
    pub slug: Option<String>,
    pub group: Option<GroupRef>,
    pub description: Option<String>,
    pub expires_at: Option<i64>,
}

/// Partial update. `description`, `expires_at` and `group` distinguish
/// "absent" from "present but null" so callers can clear them.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateLinkRequest {
    pub destination: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub expires_at: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub group: Option<Option<GroupRef>>,
}

impl UpdateLinkRequest {
    pub fn is_empty(&self) -> bool {
        self.destination.is_none()
            && self.description.is_none()
            && self.expires_at.is_none()
            && self.group.is_none()
    }
}

fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Fields of a link to be inserted; the slug is decided separately.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub destination: String,
    pub owner: String,
    pub group_id: Option<String>,
    pub group_domain: Option<String>,
    pub group_name: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
}

/// Fully merged mutable fields written back by an update. The lifecycle
/// manager merges the request into the current record before persisting.
#[derive(Debug, Clone)]
pub struct LinkChanges {
    pub destination: String,
    pub group_id: Option<String>,
    pub group_domain: Option<String>,
    pub group_name: Option<String>,
    pub description: Option<String>,
    pub expires_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_distinguishes_absent_from_null() {
        let absent: UpdateLinkRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert!(absent.expires_at.is_none());
        assert!(absent.is_empty());

        let cleared: UpdateLinkRequest = serde_json::from_str(r#"{"expires_at": null}"#).unwrap();
        assert_eq!(cleared.expires_at, Some(None));
        assert!(!cleared.is_empty());

        let set: UpdateLinkRequest = serde_json::from_str(r#"{"expires_at": 42}"#).unwrap();
        assert_eq!(set.expires_at, Some(Some(42)));

        let desc_cleared: UpdateLinkRequest =
            serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(desc_cleared.description, Some(None));
        assert!(!desc_cleared.is_empty());
    }

    #[test]
    fn group_binding_requires_both_fields() {
        let link = Link {
            id: 1,
            slug: "aaab".to_string(),
            destination: "https://example.com".to_string(),
            owner: "u1".to_string(),
            group_id: Some("g1".to_string()),
            group_domain: None,
            group_name: None,
            description: None,
            created_at: 0,
            expires_at: None,
            clicks: 0,
        };
        assert!(link.group_binding().is_none());
    }
}
