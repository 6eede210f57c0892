use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "SecretKeeper";
const APP_NAME: &str = "secretkeeper";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load();
            self.write_default_config(&default_cfg)?;
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
    pub data_dir: PathBuf,
    pub drafts_dir: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("SECRETKEEPER_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("SECRETKEEPER_DATA").ok().map(PathBuf::from);

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

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));
        let drafts_dir = state_dir.join("drafts");
        let log_dir = state_dir.join("logs");

        Ok(Self {
            config_dir,
            config_file,
            data_dir: data_root,
            drafts_dir,
            log_dir,
            state_dir,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.drafts_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub remote: RemoteOptions,
    pub auto_save: AutoSaveConfig,
    pub display: DisplayOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            remote: RemoteOptions::default(),
            auto_save: AutoSaveConfig::default(),
            display: DisplayOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self) {
        // The anon key is public by design but still nicer kept out of the
        // config file; the environment wins when both are set.
        if let Ok(key) = env::var("SECRETKEEPER_ANON_KEY") {
            if !key.is_empty() {
                self.remote.anon_key = key;
            }
        }
        if let Ok(url) = env::var("SECRETKEEPER_REMOTE_URL") {
            if !url.is_empty() {
                self.remote.base_url = url;
            }
        }
    }
}

/// Endpoint settings for the hosted notes service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteOptions {
    pub base_url: String,
    pub anon_key: String,
    pub request_timeout_ms: u64,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            anon_key: String::new(),
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    pub enabled: bool,
    /// Quiet period after the last edit before an automatic save fires.
    pub idle_secs: u64,
    /// How long the "saved" confirmation stays visible.
    pub saved_display_secs: u64,
    /// How long a save failure stays visible before reverting to unsaved.
    pub error_display_secs: u64,
    /// Keep a local fallback copy of unsaved edits between invocations.
    pub fallback_drafts: bool,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_secs: 30,
            saved_display_secs: 2,
            error_display_secs: 3,
            fallback_drafts: true,
        }
    }
}

impl AutoSaveConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn saved_display(&self) -> Duration {
        Duration::from_secs(self.saved_display_secs)
    }

    pub fn error_display(&self) -> Duration {
        Duration::from_secs(self.error_display_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    pub recent_limit: usize,
    pub preview_lines: usize,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            recent_limit: 10,
            preview_lines: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_windows() {
        let cfg = AutoSaveConfig::default();
        assert_eq!(cfg.idle_interval(), Duration::from_secs(30));
        assert_eq!(cfg.saved_display(), Duration::from_secs(2));
        assert_eq!(cfg.error_display(), Duration::from_secs(3));
        assert!(cfg.enabled);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [remote]
            base_url = "https://example.supabase.co"

            [auto_save]
            idle_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.remote.base_url, "https://example.supabase.co");
        assert_eq!(cfg.remote.request_timeout_ms, 10_000);
        assert_eq!(cfg.auto_save.idle_secs, 5);
        assert!(cfg.auto_save.fallback_drafts);
    }
}
