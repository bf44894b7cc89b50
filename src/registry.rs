//! Locally cloned repositories, discovered from the storage root on every call.
//!
//! Nothing is cached between calls: each operation resolves the repository
//! directory afresh and rebuilds the tree when it returns one.

use crate::error::{AppError, Result};
use crate::file_system::{build_tree, resolve_in_repo};
use crate::identifier::RepoId;
use crate::models::Repository;
use crate::providers::{BuildProvider, LaunchProvider, ProviderOutput, SourceControl};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

const XCODE_PROJECT_SUFFIX: &str = ".xcodeproj";

#[derive(Clone)]
pub struct Registry {
    root: PathBuf,
    scm: Arc<dyn SourceControl>,
    builder: Arc<dyn BuildProvider>,
    launcher: Arc<dyn LaunchProvider>,
}

impl Registry {
    pub fn new(
        root: impl Into<PathBuf>,
        scm: Arc<dyn SourceControl>,
        builder: Arc<dyn BuildProvider>,
        launcher: Arc<dyn LaunchProvider>,
    ) -> Self {
        Registry {
            root: root.into(),
            scm,
            builder,
            launcher,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of an existing repository; malformed or absent ids are `NotFound`.
    ///
    /// Only real directories count, never symlinks, matching what `list` reports.
    pub fn repo_dir(&self, id: &str) -> Result<(RepoId, PathBuf)> {
        let repo_id =
            RepoId::parse(id).ok_or_else(|| AppError::not_found(format!("repository {}", id)))?;
        let dir = self.root.join(repo_id.as_str());
        let is_dir = fs::symlink_metadata(&dir).map_or(false, |meta| meta.is_dir());
        if !is_dir {
            return Err(AppError::not_found(format!("repository {}", id)));
        }
        Ok((repo_id, dir))
    }

    fn load(&self, id: RepoId, dir: &Path) -> Result<Repository> {
        let url = self.scm.remote_url(dir)?;
        let mut repo = Repository::new(id, &url);
        repo.files = Some(build_tree(dir, &repo.id)?);
        Ok(repo)
    }

    pub fn create(&self, url: &str) -> Result<Repository> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::Validation("url is required".to_string()));
        }

        let id = RepoId::from_url(url);
        let dir = self.root.join(id.as_str());
        if fs::symlink_metadata(&dir).is_ok() {
            return Err(AppError::Conflict(id.to_string()));
        }

        self.scm.clone_repo(url, &dir)?;
        info!("Cloned {} as {}", url, id);

        let mut repo = Repository::new(id, url);
        repo.files = Some(build_tree(&dir, &repo.id)?);
        Ok(repo)
    }

    /// Every directory under the root named like an identifier, fully loaded.
    /// One unreadable repository fails the whole listing.
    pub fn list(&self) -> Result<Vec<Repository>> {
        let start_time = Instant::now();
        let mut repos = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(RepoId::parse) else {
                continue;
            };
            repos.push(self.load(id, &entry.path())?);
        }

        repos.sort_by(|a, b| natord::compare(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));
        debug!(
            "Listed {} repositories in {:.2?}.",
            repos.len(),
            start_time.elapsed()
        );
        Ok(repos)
    }

    pub fn open(&self, id: &str) -> Result<Repository> {
        let (repo_id, dir) = self.repo_dir(id)?;
        self.load(repo_id, &dir)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let (repo_id, dir) = self.repo_dir(id)?;
        fs::remove_dir_all(&dir)?;
        info!("Deleted repository {}", repo_id);
        Ok(())
    }

    pub fn build(&self, id: &str) -> Result<ProviderOutput> {
        let (_, dir) = self.repo_dir(id)?;
        self.builder.build(&dir)
    }

    pub fn launch(&self, id: &str) -> Result<ProviderOutput> {
        let (_, dir) = self.repo_dir(id)?;
        let app_name = find_app_name(&dir)?;
        self.launcher.launch(&dir, &app_name)
    }

    /// Existing regular file addressed by `path` inside repository `id`.
    pub fn file_path(&self, id: &str, path: &str) -> Result<PathBuf> {
        let (_, dir) = self.repo_dir(id)?;
        resolve_in_repo(&dir, path)
    }

    pub fn read_file(&self, id: &str, path: &str) -> Result<Vec<u8>> {
        let file = self.file_path(id, path)?;
        Ok(fs::read(file)?)
    }

    /// Replaces the contents of an existing file, keeping its permissions.
    pub fn write_file(&self, id: &str, path: &str, contents: &[u8]) -> Result<()> {
        let file = self.file_path(id, path)?;
        let permissions = fs::metadata(&file)?.permissions();
        fs::write(&file, contents)?;
        fs::set_permissions(&file, permissions)?;
        debug!("Wrote {} bytes to {}", contents.len(), file.display());
        Ok(())
    }
}

fn find_app_name(dir: &Path) -> Result<String> {
    let mut projects = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if let Some(app) = name.strip_suffix(XCODE_PROJECT_SUFFIX) {
            projects.push(app.to_string());
        }
    }
    projects.sort_by(|a, b| natord::compare(a, b));
    projects
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Validation("no Xcode project found in repository".to_string()))
}
