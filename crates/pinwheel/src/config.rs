use crate::events::AppEvent;
use crate::interruption::QuietWindows;
use crate::layout::LayoutSettings;
use crate::spin::{DEFAULT_CYCLE_SPAN, DEFAULT_MIN_CYCLES, DEFAULT_SPIN_DURATION, SpinTuning};
use async_channel::Sender;
use directories::ProjectDirs;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpinSettings {
    pub min_cycles: u32,
    pub cycle_span: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "duration_ms")]
    pub duration: Duration,
}

impl Default for SpinSettings {
    fn default() -> Self {
        Self {
            min_cycles: DEFAULT_MIN_CYCLES,
            cycle_span: DEFAULT_CYCLE_SPAN,
            duration: DEFAULT_SPIN_DURATION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    pub data_dir: Option<PathBuf>,
    pub socket_path: Option<PathBuf>,
    pub spin: SpinSettings,
    pub interruption: QuietWindows,
    pub layout: LayoutSettings,
}

impl Settings {
    pub fn spin_tuning(&self) -> SpinTuning {
        SpinTuning {
            min_cycles: self.spin.min_cycles,
            cycle_span: self.spin.cycle_span.max(1),
            duration: self.spin.duration,
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf, SettingsError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().to_path_buf()),
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        self.socket_path
            .clone()
            .unwrap_or_else(spinctl::protocol::default_socket_path)
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to determine config directory")]
    ConfigDirNotFound,
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn project_dirs() -> Result<ProjectDirs, SettingsError> {
    ProjectDirs::from("org", "pinwheel", "pinwheel").ok_or(SettingsError::ConfigDirNotFound)
}

pub fn get_config_path() -> Result<PathBuf, SettingsError> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("PINWHEEL")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

pub fn load_settings() -> Result<Settings, SettingsError> {
    let config_path = get_config_path()?;

    let s = config::Config::builder()
        .add_source(config::File::from(config_path).required(false))
        .add_source(environment())
        .build()?;

    Ok(s.try_deserialize()?)
}

/// Settings from a toml string, still subject to environment overrides.
pub fn settings_from_str(toml: &str) -> Result<Settings, SettingsError> {
    let s = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .add_source(environment())
        .build()?;
    Ok(s.try_deserialize()?)
}

pub fn load_or_default() -> Settings {
    match load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Using default settings: {}", e);
            Settings::default()
        }
    }
}

pub fn write_default_config() -> Result<PathBuf, SettingsError> {
    let path = get_config_path()?;
    write_default_config_at(&path)?;
    Ok(path)
}

/// Writes the commented default settings to `path` unless a file is already there.
pub fn write_default_config_at(path: &Path) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    if !path.exists() {
        fs_err::write(path, DEFAULT_CONFIG)?;
    }
    Ok(())
}

const DEFAULT_CONFIG: &str = include_str!("default_config.toml");

pub async fn run_async_watcher(tx: Sender<AppEvent>) {
    let config_path = match get_config_path() {
        Ok(p) => p,
        Err(e) => {
            log::error!("Settings watcher error: {}", e);
            return;
        }
    };
    let config_dir = match config_path.parent() {
        Some(p) => p.to_path_buf(),
        None => return,
    };

    if let Err(e) = fs_err::create_dir_all(&config_dir) {
        log::error!("Failed to create config directory for watching: {}", e);
        return;
    }

    let (bridge_tx, bridge_rx) = async_channel::unbounded();

    let mut watcher = match RecommendedWatcher::new(
        move |res| {
            let _ = bridge_tx.send_blocking(res);
        },
        notify::Config::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            log::error!("Failed to create watcher: {}", SettingsError::from(e));
            return;
        }
    };

    if let Err(e) = watcher.watch(&config_dir, RecursiveMode::NonRecursive) {
        log::error!("Failed to watch config directory: {}", e);
        return;
    }

    while let Ok(res) = bridge_rx.recv().await {
        match res {
            Ok(event) => {
                let meaningful_event = matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                );

                if meaningful_event
                    && event.paths.iter().any(|p| p == &config_path)
                    && tx.send(AppEvent::SettingsReload).await.is_err()
                {
                    break;
                }
            }
            Err(e) => log::error!("Watch error: {}", e),
        }
    }
}
