//! App configuration, stored as YAML alongside the cache/output directory.
//!
//! Grounded on `examples/dataO1-Mesh/crates/mesh-cue/src/config.rs`'s
//! `load_config`/`save_config` pattern (serde_yaml, default-on-missing,
//! warn-and-default-on-parse-failure).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Root configuration for the external collaborators and cache layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisCommands,
    pub separation: SeparationCommands,
    /// Directory `FsStemStore` scans for cached stems and writes new ones to.
    pub stem_cache_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis: AnalysisCommands::default(),
            separation: SeparationCommands::default(),
            stem_cache_dir: default_cache_dir(),
            output_dir: PathBuf::from("output"),
        }
    }
}

/// External analyzer commands (spec.md §6/§9): each prints one JSON value to
/// stdout for a given track path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisCommands {
    pub bpm_cmd: String,
    pub key_cmd: String,
    pub choruses_cmd: String,
    pub verses_cmd: String,
}

impl Default for AnalysisCommands {
    fn default() -> Self {
        Self {
            bpm_cmd: String::from("seamix-bpm"),
            key_cmd: String::from("seamix-key"),
            choruses_cmd: String::from("seamix-choruses"),
            verses_cmd: String::from("seamix-verses"),
        }
    }
}

/// External source-separation command (spec.md §6), a `demucs`-compatible CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationCommands {
    pub cmd: String,
}

impl Default for SeparationCommands {
    fn default() -> Self {
        Self {
            cmd: String::from("demucs"),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("seamix")
        .join("stems")
}

/// Default config file path: `~/.config/seamix/config.yaml` (or the
/// platform equivalent via `dirs::config_dir`).
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("seamix")
        .join("config.yaml")
}

/// Loads config from `path`, falling back to defaults if missing or invalid.
pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        log::info!("no config file at {}, using defaults", path.display());
        return Config::default();
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("failed to parse config at {}: {e}, using defaults", path.display());
                Config::default()
            }
        },
        Err(e) => {
            log::warn!("failed to read config at {}: {e}, using defaults", path.display());
            Config::default()
        }
    }
}

/// Saves config as YAML, creating parent directories as needed.
pub fn save_config(config: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_commands() {
        let config = Config::default();
        assert_eq!(config.analysis.bpm_cmd, "seamix-bpm");
        assert_eq!(config.separation.cmd, "demucs");
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = load_config(Path::new("/nonexistent/seamix-config.yaml"));
        assert_eq!(config.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn yaml_roundtrip_preserves_commands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = Config::default();
        config.analysis.bpm_cmd = String::from("custom-bpm");
        save_config(&config, &path).unwrap();

        let loaded = load_config(&path);
        assert_eq!(loaded.analysis.bpm_cmd, "custom-bpm");
    }
}
