//! Repository identifiers derived from the source URL.
//!
//! The identifier doubles as the on-disk directory name under the storage
//! root and as the key clients use to address a repository.

use md5::{Digest, Md5};
use serde::{Serialize, Serializer};
use std::fmt;

/// 32 lowercase hex characters naming one locally cloned repository.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoId(String);

impl RepoId {
    /// Length of an identifier in hex characters.
    pub const HEX_LEN: usize = 32;

    /// Digests `url` into its identifier. The same string always maps to the same id.
    pub fn from_url(url: &str) -> Self {
        let digest = Md5::digest(url.as_bytes());
        RepoId(hex::encode(digest))
    }

    /// Accepts only strings in the identifier format; everything else is not a repository.
    pub fn parse(candidate: &str) -> Option<Self> {
        if Self::is_valid(candidate) {
            Some(RepoId(candidate.to_string()))
        } else {
            None
        }
    }

    pub fn is_valid(candidate: &str) -> bool {
        candidate.len() == Self::HEX_LEN
            && candidate
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepoId({})", self.0)
    }
}

impl Serialize for RepoId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn matches_known_md5_digest() {
        let id = RepoId::from_url("https://github.com/example/app.git");
        assert_eq!(id.as_str().len(), RepoId::HEX_LEN);
        assert_eq!(RepoId::from_url("").as_str(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn parse_accepts_only_lowercase_hex_of_exact_length() {
        assert!(RepoId::parse("d41d8cd98f00b204e9800998ecf8427e").is_some());
        assert!(RepoId::parse("D41D8CD98F00B204E9800998ECF8427E").is_none());
        assert!(RepoId::parse("d41d8cd98f00b204e9800998ecf8427").is_none());
        assert!(RepoId::parse("d41d8cd98f00b204e9800998ecf8427e0").is_none());
        assert!(RepoId::parse("z41d8cd98f00b204e9800998ecf8427e").is_none());
        assert!(RepoId::parse("README.md").is_none());
        assert!(RepoId::parse("..").is_none());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = RepoId::from_url("");
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"d41d8cd98f00b204e9800998ecf8427e\""
        );
    }

    proptest! {
        #[test]
        fn proptest_from_url_is_deterministic(url in ".{0,64}") {
            prop_assert_eq!(RepoId::from_url(&url), RepoId::from_url(&url));
        }

        #[test]
        fn proptest_from_url_always_parses(url in ".{0,64}") {
            let id = RepoId::from_url(&url);
            prop_assert!(RepoId::parse(id.as_str()).is_some());
        }

        #[test]
        fn proptest_distinct_urls_get_distinct_ids(a in "[a-z0-9:/._-]{1,48}", b in "[a-z0-9:/._-]{1,48}") {
            prop_assume!(a != b);
            prop_assert_ne!(RepoId::from_url(&a), RepoId::from_url(&b));
        }
    }
}
