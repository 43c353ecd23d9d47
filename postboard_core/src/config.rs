use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};

use crate::error::StartupError;

static DATA_DIR_NAME: &str = "postboard";
static DB_NAME: &str = "postboard.sqlite";
static CONFIG_FILE_NAME: &str = "config.json";
static DATA_DIR_ENV: &str = "POSTBOARD_DATA_DIR";

// For now this directory structure should be like
// data_dir_path
// |- postboard
//    |- postboard.sqlite
//    |- config.json

fn default_listen_address() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_page_size() -> u64 {
    10
}

fn default_index_cache_ttl_secs() -> u64 {
    20
}

fn default_login_path() -> String {
    "/auth/login/".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PostboardConfig {
    pub database_path: PathBuf,

    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Number of posts on one feed page.
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// How long a rendered index page is served from the page cache.
    #[serde(default = "default_index_cache_ttl_secs")]
    pub index_cache_ttl_secs: u64,

    /// Where unauthenticated requests to protected pages are sent.
    ///
    /// `serde(default)` keeps older config.json files loadable.
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

impl PostboardConfig {
    /// Creates a config with default settings and the database inside `data_dir`
    pub fn new(data_dir: &Path) -> Self {
        PostboardConfig {
            database_path: data_dir.join(DB_NAME),
            listen_address: default_listen_address(),
            page_size: default_page_size(),
            index_cache_ttl_secs: default_index_cache_ttl_secs(),
            login_path: default_login_path(),
        }
    }
}

/// Resolves the directory holding the database and config file.
///
/// `POSTBOARD_DATA_DIR` wins over the platform data directory.
pub fn data_dir() -> Result<PathBuf, StartupError> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    dirs::data_dir()
        .map(|dir| dir.join(DATA_DIR_NAME))
        .ok_or(StartupError::NoDataDir)
}

/// Gets the existing config or initializes a new one if it doesn't exist
pub async fn get_or_init() -> Result<PostboardConfig, StartupError> {
    load_or_init_in(&data_dir()?).await
}

pub async fn load_or_init_in(dir: &Path) -> Result<PostboardConfig, StartupError> {
    let config_path = dir.join(CONFIG_FILE_NAME);

    fs::create_dir_all(dir).await?;

    if config_path.exists() {
        let mut file = fs::File::open(&config_path).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;

        let mut config: PostboardConfig = serde_json::from_str(&contents)?;
        if config.page_size == 0 {
            warn!("page_size of 0 in config, using {}", default_page_size());
            config.page_size = default_page_size();
        }
        info!(path = %config_path.display(), "loaded config");
        Ok(config)
    } else {
        let config = PostboardConfig::new(dir);

        let json = serde_json::to_string_pretty(&config)?;
        let mut file = fs::File::create(&config_path).await?;
        file.write_all(json.as_bytes()).await?;

        info!(path = %config_path.display(), "wrote default config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("postboard-{}-{}", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_first_run_writes_defaults() {
        let dir = scratch_dir("first-run");
        let _ = std::fs::remove_dir_all(&dir);

        let config = load_or_init_in(&dir).await.unwrap();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.index_cache_ttl_secs, 20);
        assert_eq!(config.database_path, dir.join(DB_NAME));
        assert!(dir.join(CONFIG_FILE_NAME).exists());

        let again = load_or_init_in(&dir).await.unwrap();
        assert_eq!(again.database_path, config.database_path);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_old_config_gets_defaults() {
        let dir = scratch_dir("old-config");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(CONFIG_FILE_NAME),
            r#"{ "database_path": "/tmp/somewhere.sqlite", "page_size": 0 }"#,
        )
        .unwrap();

        let config = load_or_init_in(&dir).await.unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/somewhere.sqlite"));
        assert_eq!(config.page_size, 10);
        assert_eq!(config.login_path, "/auth/login/");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
