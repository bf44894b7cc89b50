use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("invalid value for {key}: {value:?} ({reason})")]
pub struct ConfigError {
    key: &'static str,
    value: String,
    reason: String,
}

/// Process settings, read from the environment (and `.env`, loaded by `main`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage_root: PathBuf,
    pub assets_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub git_bin: String,
    pub xcodebuild_bin: String,
    pub ios_sim_bin: String,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: 3000,
            storage_root: PathBuf::from("."),
            assets_dir: PathBuf::from("."),
            max_upload_bytes: 32 * 1024 * 1024,
            git_bin: "git".to_string(),
            xcodebuild_bin: "xcodebuild".to_string(),
            ios_sim_bin: "ios-sim".to_string(),
            cert_path: None,
            key_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        Ok(Config {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT", defaults.port)?,
            storage_root: lookup("STORAGE_ROOT").map(PathBuf::from).unwrap_or(defaults.storage_root),
            assets_dir: lookup("ASSETS_DIR").map(PathBuf::from).unwrap_or(defaults.assets_dir),
            max_upload_bytes: parse(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            git_bin: lookup("GIT_BIN").unwrap_or(defaults.git_bin),
            xcodebuild_bin: lookup("XCODEBUILD_BIN").unwrap_or(defaults.xcodebuild_bin),
            ios_sim_bin: lookup("IOS_SIM_BIN").unwrap_or(defaults.ios_sim_bin),
            cert_path: lookup("CERT_PATH").map(PathBuf::from),
            key_path: lookup("KEY_PATH").map(PathBuf::from),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
