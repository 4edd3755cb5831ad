//! Blacklist guard: rejects destinations whose hostname, or any parent
//! domain of it, is on the blacklist. Entries are bare hostnames;
//! `blocked.com` blocks every `*.blocked.com`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use moka::future::Cache;
use tracing::debug;
use url::Url;

use crate::storage::Storage;

/// Extract the lowercased hostname of a destination, without a leading
/// `www.` label. Returns `None` for anything that does not parse as a URL
/// with a host; the guard fails open on those, and malformed destinations
/// are rejected separately by the lifecycle validation.
pub fn host_of(destination: &str) -> Option<String> {
    let url = Url::parse(destination).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        return None;
    }
    Some(host.to_string())
}

/// All domain suffixes of `host`, most specific first:
/// `a.b.example.com` -> `a.b.example.com`, `b.example.com`, `example.com`.
fn suffixes(host: &str) -> impl Iterator<Item = &str> {
    std::iter::once(host).chain(
        host.char_indices()
            .filter(|&(_, c)| c == '.')
            .map(|(i, _)| &host[i + 1..])
            .filter(|s| s.contains('.')),
    )
}

/// Normalize a blacklist entry the way `host_of` normalizes lookups.
pub fn normalize_entry(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    // Accept either a bare hostname or a full URL.
    if trimmed.contains("://") {
        return host_of(trimmed);
    }
    let host = trimmed.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() || host.contains('/') {
        return None;
    }
    Some(host.to_string())
}

/// Storage-backed guard with a TTL-bounded cache. The cache is scoped to
/// this service and invalidated on every mutation, never a process-global
/// map populated once.
pub struct BlacklistService {
    storage: Arc<dyn Storage>,
    cache: Cache<String, bool>,
}

impl BlacklistService {
    pub fn new(storage: Arc<dyn Storage>, cache_ttl: Duration, cache_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(cache_capacity)
            .time_to_live(cache_ttl)
            .build();
        Self { storage, cache }
    }

    /// Whether `destination` resolves to a forbidden host. Never errors for
    /// a syntactically valid URL; unparseable input is not blacklisted.
    pub async fn is_blocked(&self, destination: &str) -> Result<bool> {
        let Some(host) = host_of(destination) else {
            return Ok(false);
        };

        for candidate in suffixes(&host) {
            if self.contains(candidate).await? {
                debug!(host = %host, matched = %candidate, "destination is blacklisted");
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn contains(&self, host: &str) -> Result<bool> {
        if let Some(hit) = self.cache.get(host).await {
            return Ok(hit);
        }
        let present = self.storage.blacklist_contains(host).await?;
        self.cache.insert(host.to_string(), present).await;
        Ok(present)
    }

    pub async fn add(&self, raw: &str) -> Result<Option<String>> {
        let Some(host) = normalize_entry(raw) else {
            return Ok(None);
        };
        self.storage.blacklist_add(&host).await?;
        self.cache.invalidate_all();
        Ok(Some(host))
    }

    pub async fn remove(&self, raw: &str) -> Result<bool> {
        let Some(host) = normalize_entry(raw) else {
            return Ok(false);
        };
        let removed = self.storage.blacklist_remove(&host).await?;
        if removed {
            self.cache.invalidate_all();
        }
        Ok(removed)
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        self.storage.blacklist_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_extraction_normalizes() {
        assert_eq!(
            host_of("http://WWW.Example.COM/path?q=1"),
            Some("example.com".to_string())
        );
        assert_eq!(
            host_of("https://sub.example.com"),
            Some("sub.example.com".to_string())
        );
        assert_eq!(host_of("not a url"), None);
        assert_eq!(host_of("mailto:a@b.c"), None);
    }

    #[test]
    fn suffix_enumeration_most_specific_first() {
        let all: Vec<&str> = suffixes("a.b.example.com").collect();
        assert_eq!(all, vec!["a.b.example.com", "b.example.com", "example.com"]);

        let bare: Vec<&str> = suffixes("example.com").collect();
        assert_eq!(bare, vec!["example.com"]);
    }

    #[test]
    fn entry_normalization() {
        assert_eq!(normalize_entry(" Blocked.COM "), Some("blocked.com".to_string()));
        assert_eq!(normalize_entry("www.blocked.com"), Some("blocked.com".to_string()));
        assert_eq!(
            normalize_entry("https://www.blocked.com/ads"),
            Some("blocked.com".to_string())
        );
        assert_eq!(normalize_entry(""), None);
        assert_eq!(normalize_entry("bad/entry"), None);
    }
}
