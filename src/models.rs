use crate::identifier::RepoId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Dir,
}

/// One entry of a repository's working copy.
///
/// Files carry an `address` (serialized as `url`); directories carry
/// `children`, keyed by base name and unordered.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Node {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    pub size: u64,
    #[serde(rename = "url", skip_serializing_if = "Option::is_none", default)]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub children: Option<HashMap<String, Node>>,
}

impl Node {
    pub fn file(name: String, size: u64, address: String) -> Self {
        Node {
            kind: NodeKind::File,
            name,
            size,
            address: Some(address),
            children: None,
        }
    }

    pub fn dir(name: String, size: u64) -> Self {
        Node {
            kind: NodeKind::Dir,
            name,
            size,
            address: None,
            children: Some(HashMap::new()),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.as_ref().and_then(|c| c.get(name))
    }

    /// Looks up a descendant by `/`-separated path relative to this node.
    pub fn descendant(&self, path: &str) -> Option<&Node> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Repository {
    pub id: RepoId,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Node>,
}

impl Repository {
    pub fn new(id: RepoId, url: &str) -> Self {
        let url = url.trim();
        Repository {
            id,
            name: display_name(url),
            url: url.to_string(),
            files: None,
        }
    }
}

/// Trailing path segment of `url` with any `.git` suffix removed.
pub fn display_name(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed
        .rsplit(|c: char| c == '/' || c == ':')
        .next()
        .unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

#[derive(Deserialize, Debug)]
pub struct CreateRepository {
    pub url: Option<String>,
}
