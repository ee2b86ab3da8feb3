use crate::translate::TranslateOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "linqc.toml";

fn default_module() -> String {
    "s".to_string()
}

fn default_crate_path() -> String {
    "linq_core".to_string()
}

/// `linqc.toml` settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Module holding the generated symbol constants
    #[serde(default = "default_module")]
    pub module: String,
    /// Crate path that exports `Symbol`
    #[serde(default = "default_crate_path")]
    pub crate_path: String,
    /// Where translated files are written; stdout when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            module: default_module(),
            crate_path: default_crate_path(),
            output_dir: None,
        }
    }
}

impl Config {
    /// Load settings
    ///
    /// An explicit `path` must exist; otherwise `linqc.toml` in the working
    /// directory is read if present, else defaults are used.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(Path::new(p)),
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from_path(&default_path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    /// Read and parse one TOML file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Write settings as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Translator options, with CLI overrides applied
    pub fn translate_options(&self, module: Option<&str>) -> TranslateOptions {
        TranslateOptions {
            module: module.unwrap_or(&self.module).to_string(),
            crate_path: self.crate_path.clone(),
        }
    }
}
