use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Link, LinkChanges, NewLink};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("slug already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// How the slug of a freshly inserted link is decided.
#[derive(Debug, Clone)]
pub enum SlugSpec<'a> {
    /// Caller-provided slug; the unique constraint serializes races, a
    /// rejected insert surfaces as `StorageError::Conflict`.
    Custom(&'a str),
    /// Encode the storage-assigned id. Insert and slug assignment run in
    /// one transaction so no reader ever observes a slugless row.
    Generated,
}

/// Which links a list call may return.
#[derive(Debug, Clone)]
pub enum ListFilter {
    /// `manage-all-links`: no restriction.
    All,
    /// Owner match OR an exact (group id, group domain) binding match,
    /// the same predicate `authz::can_manage` applies per record.
    OwnerOrGroups {
        owner: String,
        groups: Vec<(String, String)>,
    },
}

/// One aggregated click bucket: (bucket start unix seconds, count).
pub type ClickBucket = (i64, i64);

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, indexes).
    async fn init(&self) -> Result<()>;

    /// Insert a new link, minting its slug per `spec`.
    async fn insert_link(&self, link: &NewLink, spec: SlugSpec<'_>) -> StorageResult<Link>;

    /// Persist the merged mutable fields. `None` when the link vanished.
    async fn update_link(&self, id: i64, changes: &LinkChanges) -> Result<Option<Link>>;

    /// Physically remove a link; click events cascade.
    async fn delete_link(&self, id: i64) -> Result<bool>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Link>>;

    /// Matching links, newest-created-first, then expiry ascending with
    /// never-expiring rows last.
    async fn list_links(&self, filter: &ListFilter) -> Result<Vec<Link>>;

    /// Append a click event and bump the link counter atomically.
    async fn record_click(&self, link_id: i64, timestamp: i64, lang: Option<&str>) -> Result<()>;

    /// Click counts grouped into `bucket_secs`-wide UTC buckets, optionally
    /// restricted to `[range.0, range.1)`, ordered by bucket start.
    async fn click_buckets(
        &self,
        link_id: i64,
        bucket_secs: i64,
        range: Option<(i64, i64)>,
    ) -> Result<Vec<ClickBucket>>;

    /// Click counts per language tag over all history; `None` groups the
    /// events that carried no tag.
    async fn language_counts(&self, link_id: i64) -> Result<Vec<(Option<String>, i64)>>;

    async fn blacklist_contains(&self, host: &str) -> Result<bool>;

    async fn blacklist_add(&self, host: &str) -> Result<()>;

    async fn blacklist_remove(&self, host: &str) -> Result<bool>;

    async fn blacklist_all(&self) -> Result<Vec<String>>;

    /// Remove every link whose expiry has passed, returning their slugs.
    /// Skips authorization: the precondition is time, not identity.
    async fn delete_expired(&self, now: i64) -> Result<Vec<String>>;
}
