//! Sites the user wants blocked while focusing.
//!
//! Entries are stored as normalized hosts so `https://www.YouTube.com/feed`
//! and `youtube.com` are the same entry.

use std::collections::BTreeSet;

use url::Url;

use crate::error::ValidationError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockedSites {
    hosts: BTreeSet<String>,
}

impl BlockedSites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored entries, dropping any that no longer normalize.
    pub fn from_stored<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = entries
            .into_iter()
            .filter_map(|e| match normalize(e.as_ref()) {
                Ok(host) => Some(host),
                Err(err) => {
                    tracing::warn!("dropping stored blocked site: {err}");
                    None
                }
            })
            .collect();
        Self { hosts }
    }

    /// Returns the normalized host and whether it was newly added.
    pub fn add(&mut self, input: &str) -> Result<(String, bool), ValidationError> {
        let host = normalize(input)?;
        let added = self.hosts.insert(host.clone());
        Ok((host, added))
    }

    /// Returns whether an entry was removed.
    pub fn remove(&mut self, input: &str) -> Result<bool, ValidationError> {
        let host = normalize(input)?;
        Ok(self.hosts.remove(&host))
    }

    /// Whether `input` (a URL or host) is blocked. Subdomains of a blocked
    /// host are blocked too.
    pub fn is_blocked(&self, input: &str) -> bool {
        let Ok(host) = normalize(input) else {
            return false;
        };
        self.hosts
            .iter()
            .any(|blocked| host == *blocked || host.ends_with(&format!(".{blocked}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.hosts.iter().cloned().collect()
    }
}

/// Lowercase host without a leading `www.`; the scheme is optional.
pub fn normalize(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    let invalid = |message: &str| ValidationError::InvalidUrl {
        input: input.to_string(),
        message: message.to_string(),
    };
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;
    let host = url.host_str().ok_or_else(|| invalid("no host"))?;
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.is_empty() {
        return Err(invalid("no host"));
    }
    Ok(host)
}
