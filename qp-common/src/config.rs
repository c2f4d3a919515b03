//! Configuration loading and root folder resolution
//!
//! Every pipeline stage works inside a single root folder holding the working
//! question store, the manifest tree and the production export. The root is
//! resolved with the following priority:
//! 1. Command-line argument (highest priority)
//! 2. `QP_ROOT_FOLDER`, then `QP_ROOT` environment variables
//! 3. TOML config file `root_folder`
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or malformed TOML file is never fatal; it is reported and the
//! compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Working store database file name inside the root folder
pub const WORKING_DB_FILE: &str = "quiz.db";

/// Manifest tree directory inside the root folder
pub const MANIFEST_DIR: &str = "manifests";

/// Default production store location relative to the root folder
pub const PRODUCTION_DB_FILE: &str = "production/quiz_production.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for all pipeline data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Production store location (absolute, or relative to the root folder)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Compiled defaults used when no configuration is available
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was built for
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("quizpipe"))
        .unwrap_or_else(|| PathBuf::from("./quizpipe_data"))
}

/// Candidate config file locations, most specific first
fn config_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("quizpipe").join("config.toml"));
    }
    if cfg!(unix) {
        candidates.push(PathBuf::from("/etc/quizpipe/config.toml"));
    }
    candidates
}

/// Locate the first existing config file
pub fn find_config_file() -> Option<PathBuf> {
    config_file_candidates().into_iter().find(|p| p.exists())
}

/// Load a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the TOML config from its standard location, falling back to defaults
pub fn load_or_default() -> TomlConfig {
    match find_config_file() {
        Some(path) => match load_toml_config(&path) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{} - using defaults", e);
                TomlConfig::default()
            }
        },
        None => TomlConfig::default(),
    }
}

/// Write a TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, target: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = target.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, target)?;

    Ok(())
}

/// Resolves the root folder for a pipeline stage
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml: Option<TomlConfig>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml: None,
        }
    }

    /// Command-line override (priority 1)
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Use an already-loaded TOML config instead of searching for one
    pub fn with_toml(mut self, config: TomlConfig) -> Self {
        self.toml = Some(config);
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        for var in ["QP_ROOT_FOLDER", "QP_ROOT"] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    debug!(module = %self.module_name, "Root folder from {}", var);
                    return PathBuf::from(path);
                }
            }
        }

        let toml = match &self.toml {
            Some(config) => config.clone(),
            None => load_or_default(),
        };
        if let Some(path) = toml.root_folder {
            debug!(module = %self.module_name, "Root folder from TOML config");
            return path;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and derives the paths inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
    production_override: Option<PathBuf>,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self {
            root_folder,
            production_override: None,
        }
    }

    /// Apply the `production_path` setting from TOML
    pub fn with_production_path(mut self, path: Option<PathBuf>) -> Self {
        self.production_override = path;
        self
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder).map_err(|e| {
            Error::Config(format!(
                "Failed to create root folder {}: {}",
                self.root_folder.display(),
                e
            ))
        })
    }

    /// Working question store
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(WORKING_DB_FILE)
    }

    /// Root of the manifest tree
    pub fn manifest_root(&self) -> PathBuf {
        self.root_folder.join(MANIFEST_DIR)
    }

    /// Production store location
    pub fn production_path(&self) -> PathBuf {
        match &self.production_override {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.root_folder.join(path),
            None => self.root_folder.join(PRODUCTION_DB_FILE),
        }
    }
}
