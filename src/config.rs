use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::render::{CacheKeying, DEFAULT_CAPACITY};

const DEFAULT_ENV_PREFIX: &str = "BLOG_TUI";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8787".into()
}

fn default_user_agent() -> String {
    format!("blog-tui/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn toggle(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_row_height")]
    pub row_height: usize,
    #[serde(default = "default_buffer_rows")]
    pub buffer_rows: usize,
    #[serde(default = "default_toast_ttl", with = "humantime_serde")]
    pub toast_ttl: Duration,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            row_height: default_row_height(),
            buffer_rows: default_buffer_rows(),
            toast_ttl: default_toast_ttl(),
        }
    }
}

fn default_row_height() -> usize {
    3
}

fn default_buffer_rows() -> usize {
    5
}

fn default_toast_ttl() -> Duration {
    Duration::from_millis(3500)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_render_capacity")]
    pub render_capacity: usize,
    #[serde(default)]
    pub keying: CacheKeying,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            render_capacity: default_render_capacity(),
            keying: CacheKeying::default(),
        }
    }
}

fn default_render_capacity() -> usize {
    DEFAULT_CAPACITY
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("blog-tui").join("blog-tui.log"))
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = apply_env(cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.api.base_url.is_empty() {
        base.api.base_url = other.api.base_url;
    }
    if !other.api.user_agent.is_empty() {
        base.api.user_agent = other.api.user_agent;
    }
    if !other.api.timeout.is_zero() {
        base.api.timeout = other.api.timeout;
    }

    base.ui.theme = other.ui.theme;
    if other.ui.row_height != 0 {
        base.ui.row_height = other.ui.row_height;
    }
    base.ui.buffer_rows = other.ui.buffer_rows;
    if !other.ui.toast_ttl.is_zero() {
        base.ui.toast_ttl = other.ui.toast_ttl;
    }

    if other.cache.render_capacity != 0 {
        base.cache.render_capacity = other.cache.render_capacity;
    }
    base.cache.keying = other.cache.keying;

    if !other.logging.level.is_empty() {
        base.logging.level = other.logging.level;
    }
    if other.logging.file.is_some() {
        base.logging.file = other.logging.file;
    }

    base
}

/// Environment overrides are applied field by field on top of `cfg`, so a
/// variable only ever replaces the value it names.
fn apply_env(mut cfg: Config, prefix: &str) -> Config {
    for (key, value) in load_env(prefix) {
        apply_env_value(&mut cfg, &key, value);
    }
    cfg
}

fn load_env(prefix: &str) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    map
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "ui.theme" => {
            if let Some(theme) = Theme::parse(&value) {
                cfg.ui.theme = theme;
            }
        }
        "ui.row_height" => {
            if let Ok(parsed) = value.parse::<usize>() {
                if parsed > 0 {
                    cfg.ui.row_height = parsed;
                }
            }
        }
        "ui.buffer_rows" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.ui.buffer_rows = parsed;
            }
        }
        "ui.toast_ttl" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.ui.toast_ttl = duration;
            }
        }
        "cache.render_capacity" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.cache.render_capacity = parsed;
            }
        }
        "cache.keying" => match value.trim().to_ascii_lowercase().as_str() {
            "content_hash" => cfg.cache.keying = CacheKeying::ContentHash,
            "identifier" => cfg.cache.keying = CacheKeying::Identifier,
            _ => {}
        },
        "logging.level" => cfg.logging.level = value,
        "logging.file" => cfg.logging.file = Some(PathBuf::from(value)),
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("blog-tui").join("config.yaml"))
}

/// Persists the palette toggle, keeping every other setting in the file.
pub fn save_theme(path: Option<PathBuf>, theme: Theme) -> Result<PathBuf> {
    let path = if let Some(path) = path {
        path
    } else {
        default_config_path().context("config: unable to determine default config path")?
    };

    let mut cfg = if path.exists() {
        read_config_file(&path)?
    } else {
        Config::default()
    };
    cfg.ui.theme = theme;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("config: failed to create directory {}", parent.display()))?;
    }

    let contents = serde_yaml::to_string(&cfg).context("config: failed to serialize config")?;
    fs::write(&path, contents)
        .with_context(|| format!("config: failed to write file {}", path.display()))?;

    Ok(path)
}
