use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: String,
    pub database_path: String,
    pub db_max_connections: u32,
    pub blob_dir: String,
    pub jwt_secret: Option<String>,
    pub allowed_origins: Vec<String>,
    pub max_upload_size: usize,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            database_path: "./filevault.sqlite3".to_string(),
            db_max_connections: 8,
            blob_dir: "./blobs".to_string(),
            jwt_secret: None,
            allowed_origins: Vec::new(),
            max_upload_size: 500 * 1024 * 1024,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl Config {
    /// Reads `path`, writing a default config there first if it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
        } else {
            let default_config = Config::default();
            let toml_string = toml::to_string_pretty(&default_config)
                .context("failed to serialize default config")?;
            std::fs::write(path, toml_string)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(default_config)
        }
    }

    pub fn from_env_config() -> anyhow::Result<Self> {
        let path = std::env::var("FILEVAULT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));
        let mut final_cfg = Self::load(&path)?;
        final_cfg.apply_env(|k| std::env::var(k).ok());

        if final_cfg.jwt_secret.is_none() {
            log::warn!("no jwt_secret configured, generated an ephemeral one");
            final_cfg.jwt_secret = Some(uuid::Uuid::new_v4().to_string());
        }
        final_cfg.validate()?;
        std::fs::create_dir_all(&final_cfg.blob_dir)
            .with_context(|| format!("create blob dir {}", final_cfg.blob_dir))?;
        Ok(final_cfg)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("FILEVAULT_LISTEN") {
            self.listen = v;
        }
        if let Some(v) = var("FILEVAULT_DATABASE") {
            self.database_path = v;
        }
        if let Some(v) = var("FILEVAULT_BLOB_DIR") {
            self.blob_dir = v;
        }
        if let Some(v) = var("FILEVAULT_JWT_SECRET") {
            self.jwt_secret = Some(v);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.db_max_connections == 0 {
            anyhow::bail!("db_max_connections must be positive");
        }
        if self.max_page_size == 0 {
            anyhow::bail!("max_page_size must be positive");
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            anyhow::bail!("default_page_size must be within 1..={}", self.max_page_size);
        }
        Ok(())
    }

    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.as_deref().unwrap_or_default().as_bytes()
    }
}
