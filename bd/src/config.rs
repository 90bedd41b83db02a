//! BranchDeck configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main BranchDeck configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Git defaults
    pub git: GitConfig,

    /// Which backend real branches route through
    pub tracking: TrackingConfig,

    /// Worktree slot pool
    pub pool: PoolConfig,

    /// Submission pipeline behavior
    pub submit: SubmitConfig,

    /// Hosting platform settings
    pub github: GithubConfig,

    /// Log level when not given on the command line
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Trunk override; detected from the repository when unset
    pub trunk: Option<String>,
}

/// Backend selection happens once at startup; the pipeline never checks
/// the mode per call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    #[default]
    Plain,
    Stacked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub mode: TrackingMode,

    /// Stack tool executable, used only in stacked mode
    pub tool: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            mode: TrackingMode::Plain,
            tool: "gt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of slots
    pub size: usize,

    /// Directory holding the slot worktrees
    pub dir: Option<PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { size: 4, dir: None }
    }
}

impl PoolConfig {
    /// Configured directory, or the per-user default
    pub fn resolve_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("branchdeck")
                .join("slots")
        })
    }
}

/// When a push may overwrite the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForcePush {
    /// Source-parity asymmetry: stacked submit forces, plain forces only on
    /// an explicit flag
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitConfig {
    /// Create PRs as drafts to gate CI until content is final
    pub draft: bool,

    pub force_push: ForcePush,

    /// Byte cap on the diff fed to description synthesis
    pub max_diff_bytes: usize,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            draft: true,
            force_push: ForcePush::Auto,
            max_diff_bytes: 60_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// `owner/repo` holding work items, when not this repository
    pub plans_repo: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.pool.size == 0 {
            return Err(eyre::eyre!("pool.size must be at least 1"));
        }
        if self.tracking.mode == TrackingMode::Stacked && self.tracking.tool.trim().is_empty() {
            return Err(eyre::eyre!("tracking.tool must be set when tracking.mode is stacked"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .branchdeck.yml
        let local_config = PathBuf::from(".branchdeck.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/branchdeck/branchdeck.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("branchdeck").join("branchdeck.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Peek at just the log level, before logging is initialized
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(p) => p.clone(),
            None => {
                let local = PathBuf::from(".branchdeck.yml");
                if local.exists() {
                    local
                } else {
                    dirs::config_dir()?.join("branchdeck").join("branchdeck.yml")
                }
            }
        };

        let content = fs::read_to_string(path).ok()?;
        let value: serde_yaml::Value = serde_yaml::from_str(&content).ok()?;
        value.get("log_level")?.as_str().map(str::to_string)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.tracking.mode, TrackingMode::Plain);
        assert_eq!(config.tracking.tool, "gt");
        assert_eq!(config.pool.size, 4);
        assert!(config.submit.draft);
        assert_eq!(config.submit.force_push, ForcePush::Auto);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_yaml_overlays_defaults() {
        let config: Config = serde_yaml::from_str("tracking:\n  mode: stacked\npool:\n  size: 8\n").unwrap();
        assert_eq!(config.tracking.mode, TrackingMode::Stacked);
        assert_eq!(config.pool.size, 8);
        // Untouched sections keep defaults
        assert!(config.submit.draft);
        assert_eq!(config.tracking.tool, "gt");
    }

    #[test]
    fn test_validate_rejects_empty_pool() {
        let config: Config = serde_yaml::from_str("pool:\n  size: 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_stack_tool() {
        let config: Config = serde_yaml::from_str("tracking:\n  mode: stacked\n  tool: \"\"\n").unwrap();
        assert!(config.validate().is_err());
    }
}
