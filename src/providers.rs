//! External collaborators driven as subprocesses: source control, build and launch.

use crate::error::{AppError, Result};
use log::{debug, info};
use std::path::Path;
use std::process::{Command, Output};

/// Combined stdout and stderr of a provider run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOutput {
    pub success: bool,
    pub output: Vec<u8>,
}

impl From<Output> for ProviderOutput {
    fn from(out: Output) -> Self {
        let mut output = out.stdout;
        output.extend_from_slice(&out.stderr);
        ProviderOutput {
            success: out.status.success(),
            output,
        }
    }
}

pub trait SourceControl: Send + Sync {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    /// The URL the working copy at `path` was cloned from, already trimmed.
    fn remote_url(&self, path: &Path) -> Result<String>;
}

pub trait BuildProvider: Send + Sync {
    fn build(&self, path: &Path) -> Result<ProviderOutput>;
}

pub trait LaunchProvider: Send + Sync {
    fn launch(&self, path: &Path, app_name: &str) -> Result<ProviderOutput>;
}

fn run(provider: &'static str, command: &mut Command) -> Result<Output> {
    debug!("Running {:?}", command);
    command
        .output()
        .map_err(|e| AppError::provider(provider, format!("could not start: {}", e)))
}

fn require_success(provider: &'static str, output: Output) -> Result<Output> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(AppError::provider(
            provider,
            format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ))
    }
}

pub struct GitCli {
    program: String,
}

impl GitCli {
    pub fn new(program: impl Into<String>) -> Self {
        GitCli {
            program: program.into(),
        }
    }
}

impl SourceControl for GitCli {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        info!("Cloning {} into {}", url, dest.display());
        let output = run(
            "git clone",
            Command::new(&self.program)
                .arg("clone")
                .arg("--recursive")
                .arg(url)
                .arg(dest),
        )?;
        require_success("git clone", output)?;
        Ok(())
    }

    fn remote_url(&self, path: &Path) -> Result<String> {
        let output = run(
            "git config",
            Command::new(&self.program)
                .args(["config", "--get", "remote.origin.url"])
                .current_dir(path),
        )?;
        let output = require_success("git config", output)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

pub struct XcodeBuild {
    program: String,
}

impl XcodeBuild {
    pub fn new(program: impl Into<String>) -> Self {
        XcodeBuild {
            program: program.into(),
        }
    }
}

impl BuildProvider for XcodeBuild {
    fn build(&self, path: &Path) -> Result<ProviderOutput> {
        let output = run(
            "xcodebuild",
            Command::new(&self.program)
                .args(["-arch", "i386", "-sdk", "iphonesimulator"])
                .current_dir(path),
        )?;
        Ok(output.into())
    }
}

pub struct IosSim {
    program: String,
}

impl IosSim {
    pub fn new(program: impl Into<String>) -> Self {
        IosSim {
            program: program.into(),
        }
    }
}

impl LaunchProvider for IosSim {
    fn launch(&self, path: &Path, app_name: &str) -> Result<ProviderOutput> {
        let bundle = format!("build/Release-iphonesimulator/{}.app", app_name);
        let output = run(
            "ios-sim",
            Command::new(&self.program)
                .arg("launch")
                .arg(bundle)
                .current_dir(path),
        )?;
        Ok(output.into())
    }
}
