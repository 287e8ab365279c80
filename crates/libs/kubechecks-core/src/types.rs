//! Small newtypes shared across the core crate: canonicalized clone URLs and
//! the ordered check-result state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A Git clone URL, normalized so that ssh/https variants, trailing
/// `.git`, and case differences in the host all key to the same value.
///
/// Canonicalization is the basis of Repo Manager's `(url, ref)` cache key
/// (§4.1) and of the Application Index's per-repo-URL indexing (§4.2), so
/// any two spellings of "the same repo" must collide here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CloneUrl(String);

impl CloneUrl {
    /// Parses and canonicalizes a clone URL.
    ///
    /// Recognizes two shapes:
    /// - `scp`-style SSH (`git@host:owner/repo.git`)
    /// - `scheme://host/path` (`https://`, `ssh://`, `git://`)
    ///
    /// Canonical form is always `host/path` lowercased, with a trailing
    /// `.git` stripped and no leading slash.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidCloneUrl("empty clone url".to_string()));
        }

        let (host, path) = if let Some((host, path)) = split_scp_scheme(raw) {
            (host, path)
        } else if let Some(idx) = raw.find("://") {
            let rest = &raw[idx + 3..];
            // Strip an optional `user@` prefix from the authority.
            let rest = rest.split_once('@').map_or(rest, |(_, after)| after);
            rest.split_once('/')
                .map(|(h, p)| (h, p))
                .ok_or_else(|| Error::InvalidCloneUrl(raw.to_string()))?
        } else {
            return Err(Error::InvalidCloneUrl(raw.to_string()));
        };

        let path = path.strip_suffix(".git").unwrap_or(path);
        let path = path.trim_matches('/');
        if host.is_empty() || path.is_empty() {
            return Err(Error::InvalidCloneUrl(raw.to_string()));
        }

        Ok(CloneUrl(format!("{}/{}", host, path).to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CloneUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Finds the `user@host:path` split points of an scp-style SSH URL, mirroring
/// how `git` itself recognizes the shorthand. Returns `(host, path)` with the
/// separator characters already stripped.
fn split_scp_scheme(url: &str) -> Option<(&str, &str)> {
    if url.contains("://") {
        return None;
    }
    let at = url.find('@')?;
    let colon = url[at..].find(':')? + at;
    if colon <= at {
        return None;
    }
    let host = &url[at + 1..colon];
    let path = &url[colon + 1..];
    Some((host, path))
}

/// Resolves the canonical ref key for a clone request. Per §4.1, an empty
/// ref or the literal `"HEAD"` both mean "the remote default branch" and
/// must collide on the same cache entry once the default is resolved.
pub fn is_default_ref(r#ref: &str) -> bool {
    r#ref.is_empty() || r#ref.eq_ignore_ascii_case("head")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_and_ssh_variants_canonicalize_equal() {
        let a = CloneUrl::parse("https://github.com/acme/widgets.git").unwrap();
        let b = CloneUrl::parse("git@github.com:acme/widgets.git").unwrap();
        let c = CloneUrl::parse("ssh://git@GitHub.com/acme/widgets").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.as_str(), "github.com/acme/widgets");
    }

    #[test]
    fn trailing_slash_and_case_are_normalized() {
        let a = CloneUrl::parse("https://GitHub.com/Acme/Widgets/").unwrap();
        assert_eq!(a.as_str(), "github.com/acme/widgets");
    }

    #[test]
    fn rejects_empty_and_hostless_input() {
        assert!(CloneUrl::parse("").is_err());
        assert!(CloneUrl::parse("not-a-url").is_err());
    }

    #[test]
    fn default_ref_recognition() {
        assert!(is_default_ref(""));
        assert!(is_default_ref("HEAD"));
        assert!(is_default_ref("head"));
        assert!(!is_default_ref("main"));
    }
}
