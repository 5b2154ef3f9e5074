//! URL value objects for signed download/view links.

use crate::error::{StorageError, StorageResult};

/// A validated base URL that signed paths are appended to.
///
/// Joining strips each segment's leading slash and never touches the query
/// until one is explicitly supplied, so `http://host:3000/` joined with
/// `["download", "/l", "f"]` yields `http://host:3000/download/l/f`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBase {
    base: String,
}

impl UrlBase {
    pub fn parse(url: impl Into<String>) -> StorageResult<Self> {
        let url = url.into();
        let scheme_ok = url
            .split_once("://")
            .map(|(scheme, rest)| {
                !scheme.is_empty()
                    && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+')
                    && !rest.is_empty()
            })
            .unwrap_or(false);

        if !scheme_ok {
            return Err(StorageError::InvalidUrl(url));
        }

        Ok(Self { base: url })
    }

    pub fn join(&self, segments: &[&str], query: Option<&str>) -> String {
        let mut out = self.base.trim_end_matches('/').to_string();

        for segment in segments {
            let segment = segment.trim_start_matches('/');
            out.push('/');
            out.push_str(segment);
        }

        if let Some(query) = query {
            out.push('?');
            out.push_str(query);
        }

        out
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }
}

/// Pair of signed URLs issued for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedFileUrl {
    pub download: String,
    pub view: String,
}
