//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::infra::backend::{ConfigService, FALLBACK_API_URL};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".repo2md/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub heartbeat: Heartbeat,
    #[serde(default)]
    pub export: Export,
    #[serde(default)]
    pub keybindings: Keybindings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    /// Server that hands out the API base URL through `GET /config`.
    #[serde(default = "Backend::default_origin")]
    pub origin: String,
    /// Fixed API base URL; skips discovery when set.
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default = "Backend::default_discover")]
    pub discover: bool,
    #[serde(default = "Backend::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Backend {
    fn default_origin() -> String {
        FALLBACK_API_URL.to_owned()
    }

    fn default_discover() -> bool {
        true
    }

    fn default_timeout_secs() -> u64 {
        300
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            origin: Self::default_origin(),
            api_base_url: None,
            discover: Self::default_discover(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    #[serde(default = "Heartbeat::default_enabled")]
    pub enabled: bool,
    #[serde(default = "Heartbeat::default_interval_secs")]
    pub interval_secs: u64,
}

impl Heartbeat {
    fn default_enabled() -> bool {
        true
    }

    fn default_interval_secs() -> u64 {
        30
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            interval_secs: Self::default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    output_dir: Option<PathBuf>,
    #[serde(default)]
    copy_to_clipboard: Option<bool>,
}

impl Export {
    fn default_mode() -> &'static str {
        "inline"
    }

    fn default_output_dir() -> PathBuf {
        PathBuf::from(".")
    }

    fn default_copy_to_clipboard() -> bool {
        false
    }

    pub fn mode(&self) -> &str {
        self.mode.as_deref().unwrap_or(Self::default_mode())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(Self::default_output_dir)
    }

    pub fn copy_to_clipboard(&self) -> bool {
        self.copy_to_clipboard
            .unwrap_or_else(Self::default_copy_to_clipboard)
    }
}

impl Default for Export {
    fn default() -> Self {
        Self {
            mode: Some(Self::default_mode().to_owned()),
            output_dir: Some(Self::default_output_dir()),
            copy_to_clipboard: Some(Self::default_copy_to_clipboard()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keybindings {
    #[serde(default = "Keybindings::default_up")]
    pub up: String,
    #[serde(default = "Keybindings::default_down")]
    pub down: String,
    #[serde(default = "Keybindings::default_toggle")]
    pub toggle: String,
    #[serde(default = "Keybindings::default_select_all")]
    pub select_all: String,
    #[serde(default = "Keybindings::default_preview")]
    pub preview: String,
    #[serde(default = "Keybindings::default_download")]
    pub download: String,
    #[serde(default = "Keybindings::default_switch_pane")]
    pub switch_pane: String,
}

impl Keybindings {
    fn default_up() -> String {
        "k".into()
    }

    fn default_down() -> String {
        "j".into()
    }

    fn default_toggle() -> String {
        "space".into()
    }

    fn default_select_all() -> String {
        "a".into()
    }

    fn default_preview() -> String {
        "p".into()
    }

    fn default_download() -> String {
        "d".into()
    }

    fn default_switch_pane() -> String {
        "tab".into()
    }
}

impl Default for Keybindings {
    fn default() -> Self {
        Self {
            up: Self::default_up(),
            down: Self::default_down(),
            toggle: Self::default_toggle(),
            select_all: Self::default_select_all(),
            preview: Self::default_preview(),
            download: Self::default_download(),
            switch_pane: Self::default_switch_pane(),
        }
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    api_url: Option<String>,
    export_mode: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            api_url: env::var("REPO2MD_API_URL").ok(),
            export_mode: env::var("REPO2MD_EXPORT_MODE").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(api_url: &str, export_mode: &str) -> Self {
        Self {
            api_url: Some(api_url.to_owned()),
            export_mode: Some(export_mode.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            backend: merge_backend(self.backend, other.backend),
            heartbeat: merge_heartbeat(self.heartbeat, other.heartbeat),
            export: merge_export(self.export, other.export),
            keybindings: merge_keybindings(self.keybindings, other.keybindings),
        }
    }

    /// Resolve the API base URL: explicit setting first, then discovery, then the fallback.
    pub async fn resolve_api_base_url<C: ConfigService>(&self, discovery: &C) -> String {
        if let Some(url) = self.backend.api_base_url.as_deref().filter(|url| !url.is_empty()) {
            return url.to_owned();
        }
        if !self.backend.discover {
            return self.backend.origin.clone();
        }
        match discovery.api_base_url().await {
            Ok(url) => {
                tracing::info!(%url, "loaded API base URL");
                url
            }
            Err(err) => {
                tracing::warn!(error = %err, fallback = FALLBACK_API_URL, "config fetch failed");
                FALLBACK_API_URL.to_owned()
            }
        }
    }
}

fn merge_backend(base: Backend, overlay: Backend) -> Backend {
    Backend {
        origin: if overlay.origin != Backend::default_origin() {
            overlay.origin
        } else {
            base.origin
        },
        api_base_url: overlay.api_base_url.or(base.api_base_url),
        discover: overlay.discover && base.discover,
        timeout_secs: if overlay.timeout_secs != Backend::default_timeout_secs() {
            overlay.timeout_secs
        } else {
            base.timeout_secs
        },
    }
}

fn merge_heartbeat(base: Heartbeat, overlay: Heartbeat) -> Heartbeat {
    Heartbeat {
        enabled: overlay.enabled && base.enabled,
        interval_secs: if overlay.interval_secs != Heartbeat::default_interval_secs() {
            overlay.interval_secs
        } else {
            base.interval_secs
        },
    }
}

fn merge_export(mut base: Export, overlay: Export) -> Export {
    if let Some(value) = overlay.mode {
        base.mode = Some(value);
    }
    if let Some(value) = overlay.output_dir {
        base.output_dir = Some(value);
    }
    if let Some(value) = overlay.copy_to_clipboard {
        base.copy_to_clipboard = Some(value);
    }
    base
}

fn merge_keybindings(base: Keybindings, overlay: Keybindings) -> Keybindings {
    Keybindings {
        up: choose_keybinding(base.up, overlay.up, Keybindings::default_up),
        down: choose_keybinding(base.down, overlay.down, Keybindings::default_down),
        toggle: choose_keybinding(base.toggle, overlay.toggle, Keybindings::default_toggle),
        select_all: choose_keybinding(
            base.select_all,
            overlay.select_all,
            Keybindings::default_select_all,
        ),
        preview: choose_keybinding(base.preview, overlay.preview, Keybindings::default_preview),
        download: choose_keybinding(
            base.download,
            overlay.download,
            Keybindings::default_download,
        ),
        switch_pane: choose_keybinding(
            base.switch_pane,
            overlay.switch_pane,
            Keybindings::default_switch_pane,
        ),
    }
}

fn choose_keybinding(base: String, overlay: String, default_fn: fn() -> String) -> String {
    if overlay != default_fn() {
        overlay
    } else {
        base
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("repo2md/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(api_url) = env.api_url.filter(|url| !url.trim().is_empty()) {
        config.backend.api_base_url = Some(api_url);
    }
    if let Some(mode) = env.export_mode {
        config.export.mode = Some(mode);
    }
    config
}
