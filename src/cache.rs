use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::fs;
use tracing::debug;

use crate::constants::SSO_CACHE_FILE_SUFFIX;

/// Session token written by the AWS CLI after a completed `aws sso login`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub region: String,
}

/// Shape of one SSO cache file, before timestamp conversion.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCacheRecord {
    access_token: String,
    expires_at: String,
    region: String,
}

impl SessionToken {
    /// Leniently parse one cache file's contents. Anything malformed yields
    /// `None`; a corrupt file must never abort a scan.
    fn parse(content: &str) -> Option<Self> {
        let raw: RawCacheRecord = serde_json::from_str(content).ok()?;
        let expires_at = parse_expiry(&raw.expires_at)?;

        Some(Self {
            access_token: raw.access_token,
            expires_at,
            region: raw.region,
        })
    }

    /// A token is usable only while its expiry is strictly in the future.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Older AWS CLI releases wrote expiry timestamps with a literal `UTC`
/// suffix in place of an RFC 3339 offset. Only the first occurrence is
/// substituted.
fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = raw.replacen("UTC", "Z", 1);
    DateTime::parse_from_rfc3339(&normalized)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Scan an SSO cache directory and return the token with the latest expiry.
///
/// An unreadable or empty directory yields `None` rather than an error, as
/// does a directory containing only unparseable files. Filenames are visited
/// in lexicographic order with a strictly-greater comparison, so an exact
/// expiry tie resolves to the lexicographically earliest file on every run.
pub async fn find_latest_token(cache_dir: &Path) -> Option<SessionToken> {
    let mut entries = match fs::read_dir(cache_dir).await {
        Ok(entries) => entries,
        Err(err) => {
            debug!("Unable to list SSO cache directory {}: {err}", cache_dir.display());
            return None;
        }
    };

    let mut names: Vec<String> = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    names.sort();

    let mut latest: Option<SessionToken> = None;
    for name in names {
        if !name.ends_with(SSO_CACHE_FILE_SUFFIX) {
            continue;
        }

        let Ok(content) = fs::read_to_string(cache_dir.join(&name)).await else {
            continue;
        };
        let Some(token) = SessionToken::parse(&content) else {
            debug!("Skipping unparseable SSO cache file: {name}");
            continue;
        };

        match &latest {
            Some(current) if token.expires_at <= current.expires_at => {}
            _ => latest = Some(token),
        }
    }

    latest
}
