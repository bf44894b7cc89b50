use crate::error::{AppError, Result};
use crate::identifier::RepoId;
use crate::models::Node;
use ignore::WalkBuilder;
use log::{debug, warn};
use path_clean::PathClean;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

/// Metadata directory of the source-control provider; never listed or addressable.
pub const VCS_DIR: &str = ".git";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Skip,
    File,
    Directory,
}

/// Classifies an entry by its path relative to the repository root.
///
/// Any path with a `.git` segment is skipped, so the whole metadata subtree
/// goes with its top directory.
pub fn classify(relative: &Path, is_dir: bool) -> EntryKind {
    if relative.components().any(|c| c.as_os_str() == VCS_DIR) {
        EntryKind::Skip
    } else if is_dir {
        EntryKind::Directory
    } else {
        EntryKind::File
    }
}

pub fn file_address(repo_id: &RepoId, relative: &Path) -> String {
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("repositories/{}/files/{}", repo_id, joined)
}

/// Maps a client-supplied file path onto an existing regular file in the working copy.
///
/// Paths that leave the working copy lexically, point into `.git`, or pass
/// through a symlink anywhere below `repo_root` are not addressable and
/// resolve to `NotFound`. Components are checked with `symlink_metadata`, so
/// nothing outside the working copy is ever reached.
pub fn resolve_in_repo(repo_root: &Path, requested: &str) -> Result<PathBuf> {
    let not_found = || AppError::not_found(format!("file {}", requested));
    let cleaned = PathBuf::from(requested).clean();
    let escapes = cleaned
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if cleaned.as_os_str().is_empty()
        || escapes
        || classify(&cleaned, false) == EntryKind::Skip
    {
        return Err(not_found());
    }

    let mut current = repo_root.to_path_buf();
    let mut components = cleaned.components().peekable();
    while let Some(component) = components.next() {
        current.push(component);
        let meta = match fs::symlink_metadata(&current) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let is_last = components.peek().is_none();
        let expected = if is_last { meta.is_file() } else { meta.is_dir() };
        if !expected {
            return Err(not_found());
        }
    }
    Ok(current)
}

/// Entries that could never be resolved back through an address: symlinks,
/// and names that are not valid UTF-8.
fn is_addressable(entry: &ignore::DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    if entry.path_is_symlink() {
        debug!("Leaving symlink {} out of the tree", entry.path().display());
        return false;
    }
    if entry.file_name().to_str().is_none() {
        warn!("Leaving non-UTF-8 name {} out of the tree", entry.path().display());
        return false;
    }
    true
}

struct Slot {
    node: Node,
    parent: usize,
}

/// Walks `root` pre-order and returns its tree, rooted at a directory node.
///
/// Nodes are collected into an arena indexed by relative path while walking,
/// then folded into the nested structure. Any error aborts the whole build.
pub fn build_tree(root: &Path, repo_id: &RepoId) -> Result<Node> {
    debug!("Building file tree for directory: {}", root.display());
    let start_time = Instant::now();

    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(AppError::not_found(format!("directory {}", root.display()))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(AppError::not_found(format!("directory {}", root.display())))
        }
        Err(e) => return Err(e.into()),
    }

    let filter_root = root.to_path_buf();
    let mut builder = WalkBuilder::new(root);
    builder.standard_filters(false).follow_links(false);
    builder.filter_entry(move |entry| {
        let relative = entry.path().strip_prefix(&filter_root).unwrap_or(entry.path());
        let is_dir = entry.file_type().map_or(false, |ft| ft.is_dir());
        classify(relative, is_dir) != EntryKind::Skip && is_addressable(entry)
    });

    let mut arena: Vec<Slot> = Vec::new();
    let mut dirs: HashMap<PathBuf, usize> = HashMap::new();

    for result in builder.build() {
        let entry = result?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let is_dir = entry.file_type().map_or(false, |ft| ft.is_dir());
        let size = entry.metadata()?.len();
        let name = entry.file_name().to_string_lossy().into_owned();

        if arena.is_empty() {
            arena.push(Slot {
                node: Node::dir(name, size),
                parent: 0,
            });
            dirs.insert(PathBuf::new(), 0);
            continue;
        }

        let node = match classify(relative, is_dir) {
            EntryKind::Skip => continue,
            EntryKind::Directory => Node::dir(name, size),
            EntryKind::File => Node::file(name, size, file_address(repo_id, relative)),
        };

        let parent = relative
            .parent()
            .and_then(|p| dirs.get(p))
            .copied();
        let Some(parent) = parent else {
            debug!("No parent recorded for {}, leaving it out", relative.display());
            continue;
        };

        let slot = arena.len();
        if node.is_dir() {
            dirs.insert(relative.to_path_buf(), slot);
        }
        arena.push(Slot { node, parent });
    }

    // Parents always precede their children, so folding from the back
    // attaches every node before its parent is taken.
    while arena.len() > 1 {
        let Some(Slot { node, parent }) = arena.pop() else {
            break;
        };
        if let Some(children) = arena[parent].node.children.as_mut() {
            children.insert(node.name.clone(), node);
        }
    }

    let root_node = arena
        .pop()
        .map(|slot| slot.node)
        .ok_or_else(|| AppError::not_found(format!("directory {}", root.display())))?;

    debug!(
        "Built file tree for '{}' in {:.2?}.",
        root.display(),
        start_time.elapsed()
    );
    Ok(root_node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeKind;
    use tempfile::TempDir;

    fn sample_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"0123456789").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.txt"), b"hello").unwrap();
        fs::create_dir_all(dir.path().join(".git/refs")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), b"ref: refs/heads/main\n").unwrap();
        dir
    }

    fn assert_no_vcs(node: &Node) {
        assert_ne!(node.name, VCS_DIR);
        if let Some(children) = &node.children {
            children.values().for_each(assert_no_vcs);
        }
    }

    #[test]
    fn classify_skips_vcs_segments_anywhere() {
        assert_eq!(classify(Path::new(".git"), true), EntryKind::Skip);
        assert_eq!(classify(Path::new(".git/HEAD"), false), EntryKind::Skip);
        assert_eq!(classify(Path::new("vendor/lib/.git/config"), false), EntryKind::Skip);
    }

    #[test]
    fn classify_keeps_lookalike_names() {
        assert_eq!(classify(Path::new(".gitignore"), false), EntryKind::File);
        assert_eq!(classify(Path::new(".github"), true), EntryKind::Directory);
        assert_eq!(classify(Path::new("src/git.rs"), false), EntryKind::File);
    }

    #[test]
    fn builds_tree_with_addresses() {
        let dir = sample_repo();
        let id = RepoId::from_url("https://example.com/app.git");
        let tree = build_tree(dir.path(), &id).unwrap();

        assert_eq!(tree.kind, NodeKind::Dir);
        let a = tree.child("a.txt").unwrap();
        assert_eq!(a.kind, NodeKind::File);
        assert_eq!(a.size, 10);
        assert_eq!(a.address.as_deref(), Some(format!("repositories/{}/files/a.txt", id).as_str()));

        let sub = tree.child("sub").unwrap();
        assert_eq!(sub.kind, NodeKind::Dir);
        assert!(sub.address.is_none());
        let b = sub.child("b.txt").unwrap();
        assert_eq!(b.size, 5);
        assert_eq!(b.address.as_deref(), Some(format!("repositories/{}/files/sub/b.txt", id).as_str()));

        assert_eq!(tree.children.as_ref().unwrap().len(), 2);
        assert_no_vcs(&tree);
    }

    #[test]
    fn lists_hidden_and_ignored_files() {
        let dir = sample_repo();
        fs::write(dir.path().join(".gitignore"), b"*.log\n").unwrap();
        fs::write(dir.path().join("debug.log"), b"x").unwrap();
        let tree = build_tree(dir.path(), &RepoId::from_url("u")).unwrap();
        assert!(tree.child(".gitignore").is_some());
        assert!(tree.child("debug.log").is_some());
    }

    #[test]
    fn rebuilding_unchanged_tree_is_identical() {
        let dir = sample_repo();
        fs::create_dir_all(dir.path().join("deep/er/still")).unwrap();
        fs::write(dir.path().join("deep/er/still/c.txt"), b"abc").unwrap();
        let id = RepoId::from_url("u");
        let first = build_tree(dir.path(), &id).unwrap();
        let second = build_tree(dir.path(), &id).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.descendant("deep/er/still/c.txt").map(|n| n.size), Some(3));
    }

    #[test]
    fn missing_root_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = build_tree(&dir.path().join("gone"), &RepoId::from_url("u")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn resolve_rejects_escapes_and_metadata() {
        let dir = sample_repo();
        let root = dir.path();
        assert_eq!(resolve_in_repo(root, "sub/b.txt").unwrap(), root.join("sub/b.txt"));
        assert_eq!(resolve_in_repo(root, "sub/../a.txt").unwrap(), root.join("a.txt"));
        assert!(resolve_in_repo(root, "../other/secret").is_err());
        assert!(resolve_in_repo(root, "sub/../../x").is_err());
        assert!(resolve_in_repo(root, "/etc/passwd").is_err());
        assert!(resolve_in_repo(root, ".git/HEAD").is_err());
        assert!(resolve_in_repo(root, "").is_err());
    }

    #[test]
    fn resolve_requires_existing_regular_file() {
        let dir = sample_repo();
        let root = dir.path();
        assert!(matches!(resolve_in_repo(root, "missing.txt"), Err(AppError::NotFound(_))));
        assert!(matches!(resolve_in_repo(root, "sub"), Err(AppError::NotFound(_))));
        assert!(matches!(resolve_in_repo(root, "a.txt/nested"), Err(AppError::NotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_neither_listed_nor_resolved() {
        use std::os::unix::fs::symlink;

        let dir = sample_repo();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), b"outside").unwrap();
        symlink(outside.path(), dir.path().join("link")).unwrap();
        symlink(outside.path().join("secret.txt"), dir.path().join("alias.txt")).unwrap();
        symlink(dir.path().join("a.txt"), dir.path().join("inner.txt")).unwrap();

        let tree = build_tree(dir.path(), &RepoId::from_url("u")).unwrap();
        assert!(tree.child("link").is_none());
        assert!(tree.child("alias.txt").is_none());
        assert!(tree.child("inner.txt").is_none());
        assert!(tree.child("a.txt").is_some());

        for path in ["link/secret.txt", "link", "alias.txt", "inner.txt"] {
            assert!(
                matches!(resolve_in_repo(dir.path(), path), Err(AppError::NotFound(_))),
                "{}",
                path
            );
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_left_out() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = sample_repo();
        fs::write(dir.path().join(OsStr::from_bytes(b"bad\xffname")), b"x").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"bad\xfename")), b"y").unwrap();
        fs::create_dir(dir.path().join(OsStr::from_bytes(b"dir\xff"))).unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"dir\xff/inner.txt")), b"z").unwrap();

        let tree = build_tree(dir.path(), &RepoId::from_url("u")).unwrap();
        let mut names: Vec<_> = tree.children.as_ref().unwrap().keys().cloned().collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "sub"]);
    }
}
