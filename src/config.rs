use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Theme the workspace starts with. Runtime changes are not saved.
    pub theme: String,
    pub show_notes: bool,
    pub notes_width: u16,
    pub wrap: bool,
    pub tab_width: usize,
    pub log_enabled: bool,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: "Light".to_string(),
            show_notes: true,
            notes_width: 28,
            wrap: true,
            tab_width: 4,
            log_enabled: true,
            log_level: "info".to_string(),
            log_dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PartialConfig {
    theme: Option<String>,
    show_notes: Option<bool>,
    notes_width: Option<u16>,
    wrap: Option<bool>,
    tab_width: Option<usize>,
    log_enabled: Option<bool>,
    log_level: Option<String>,
    log_dir: Option<PathBuf>,
}

impl PartialConfig {
    /// Fills missing keys from defaults; the flag reports whether any were missing.
    fn apply_defaults(self) -> (Config, bool) {
        let defaults = Config::default();
        let mut changed = false;

        let theme = match self.theme {
            Some(v) => v,
            None => {
                changed = true;
                defaults.theme
            }
        };
        let show_notes = match self.show_notes {
            Some(v) => v,
            None => {
                changed = true;
                defaults.show_notes
            }
        };
        let notes_width = match self.notes_width {
            Some(v) => v,
            None => {
                changed = true;
                defaults.notes_width
            }
        };
        let wrap = match self.wrap {
            Some(v) => v,
            None => {
                changed = true;
                defaults.wrap
            }
        };
        let tab_width = match self.tab_width {
            Some(v) => v,
            None => {
                changed = true;
                defaults.tab_width
            }
        };
        let log_enabled = match self.log_enabled {
            Some(v) => v,
            None => {
                changed = true;
                defaults.log_enabled
            }
        };
        let log_level = match self.log_level {
            Some(v) => v,
            None => {
                changed = true;
                defaults.log_level
            }
        };
        let log_dir = match self.log_dir {
            Some(v) => Some(v),
            None => {
                changed = defaults.log_dir.is_some() || changed;
                defaults.log_dir
            }
        };

        (
            Config {
                theme,
                show_notes,
                notes_width,
                wrap,
                tab_width,
                log_enabled,
                log_level,
                log_dir,
            },
            changed,
        )
    }
}

impl Config {
    /// Directory to log into, or `None` when logging is switched off.
    pub fn effective_log_dir(&self) -> Option<PathBuf> {
        if !self.log_enabled {
            return None;
        }
        self.log_dir.clone().or_else(default_log_dir)
    }
}

pub fn default_log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("notemark").join("logs"))
}

pub fn config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join("notemark").join("config.toml"))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

/// Reads `path`, creating it with defaults if absent and back-filling missing keys.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        write_config_to(path, &cfg)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let partial: PartialConfig = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let (cfg, changed) = partial.apply_defaults();
    if changed {
        write_config_to(path, &cfg)?;
    }
    Ok(cfg)
}

pub fn write_config_to(path: &Path, cfg: &Config) -> Result<()> {
    ensure_parent_dir(path)?;
    let text = toml::to_string_pretty(cfg).context("Failed to serialize config")?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Makes sure a config file exists at `path` without parsing it, so a broken
/// file can still be opened for repair.
pub fn ensure_config_file(path: &Path) -> Result<()> {
    if !path.exists() {
        write_config_to(path, &Config::default())?;
    }
    Ok(())
}

pub fn open_config_in_editor() -> Result<()> {
    let path = config_path()?;
    ensure_config_file(&path)?;

    let editor = env::var("EDITOR").unwrap_or_else(|_| "nvim".to_string());
    let mut parts = match shell_words::split(&editor) {
        Ok(p) if !p.is_empty() => p,
        _ => vec![editor],
    };
    let cmd = parts.remove(0);
    let status = Command::new(cmd)
        .args(parts)
        .arg(&path)
        .status()
        .with_context(|| format!("Failed to launch editor for {}", path.display()))?;
    if !status.success() {
        anyhow::bail!("Editor exited with status {}", status);
    }
    Ok(())
}
