use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::collection::{LayoutMode, DEFAULT_ITEMS_PER_LOAD};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "NeuralNotes";
const APP_NAME: &str = "neuralnotes";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const CONFIG_ENV: &str = "NEURALNOTES_CONFIG";
pub const TOKEN_ENV: &str = "NEURALNOTES_TOKEN";
pub const MAX_PREVIEW_LINES: u16 = 40;

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            self.write_default_config(&default_cfg)?;
            default_cfg.post_load();
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load();
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub cache_dir: PathBuf,
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let cache_dir = project_dirs.cache_dir().to_path_buf();
        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_dirs.data_local_dir().join("state"));

        Ok(Self::with_dirs(config_file, cache_dir, state_dir))
    }

    /// Paths rooted under a single directory; used for explicit `--config`
    /// files and in tests.
    pub fn rooted(config_file: PathBuf, root: &Path) -> Self {
        Self::with_dirs(config_file, root.join("cache"), root.join("state"))
    }

    fn with_dirs(config_file: PathBuf, cache_dir: PathBuf, state_dir: PathBuf) -> Self {
        let config_dir = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let log_dir = state_dir.join("logs");
        Self {
            config_dir,
            config_file,
            cache_dir,
            state_dir,
            log_dir,
        }
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(format!("{APP_NAME}.log"))
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.cache_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiOptions,
    pub view: ViewOptions,
}

impl AppConfig {
    fn post_load(&mut self) {
        self.api.normalize();
        self.view.normalize();
    }

    /// Applies the token from the environment, if set, over the file value.
    pub fn apply_env(&mut self) {
        if let Ok(token) = env::var(TOKEN_ENV) {
            self.api.set_token(token);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiOptions {
    pub base_url: String,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout_secs: 10,
            token: None,
        }
    }
}

impl ApiOptions {
    fn normalize(&mut self) {
        if self.base_url.trim().is_empty() {
            tracing::warn!("empty api.base_url in config, using {DEFAULT_BASE_URL}");
            self.base_url = DEFAULT_BASE_URL.to_owned();
        }
        if self.timeout_secs == 0 {
            tracing::warn!("api.timeout_secs must be positive, using 1");
            self.timeout_secs = 1;
        }
        if let Some(token) = self.token.take() {
            self.set_token(token);
        }
    }

    pub fn set_token(&mut self, token: String) {
        let trimmed = token.trim();
        self.token = (!trimmed.is_empty()).then(|| trimmed.to_owned());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ViewOptions {
    pub default_layout: LayoutMode,
    pub items_per_load: usize,
    /// Content lines shown on a grid card.
    pub preview_lines: u16,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            default_layout: LayoutMode::Grid,
            items_per_load: DEFAULT_ITEMS_PER_LOAD,
            preview_lines: 3,
        }
    }
}

impl ViewOptions {
    fn normalize(&mut self) {
        if self.items_per_load == 0 {
            tracing::warn!("view.items_per_load must be at least 1, clamping");
            self.items_per_load = 1;
        }
        if self.preview_lines == 0 {
            self.preview_lines = 1;
        } else if self.preview_lines > MAX_PREVIEW_LINES {
            tracing::warn!(
                "view.preview_lines {} exceeds {MAX_PREVIEW_LINES}, clamping",
                self.preview_lines
            );
            self.preview_lines = MAX_PREVIEW_LINES;
        }
    }
}
