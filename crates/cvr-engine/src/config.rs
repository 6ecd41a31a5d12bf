use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub project: ProjectConfig,
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Image root; tilde-expanded, relative paths resolve against the
    /// data root.
    pub root: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Optional auto-report confidence floor. Absent means any non-empty
    /// detection list produces an incident, matching the observed
    /// behavior of the camera nodes.
    #[serde(default)]
    pub min_confidence: Option<f64>,
}

impl Config {
    pub fn default_for_root(project_id: &str) -> Self {
        Self {
            project: ProjectConfig {
                id: project_id.to_string(),
            },
            artifacts: ArtifactsConfig {
                root: ".cvr/images".to_string(),
            },
            bridge: BridgeConfig::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| "parse cvr.toml")?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn artifact_root(&self, data_root: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(&self.artifacts.root).to_string();
        let path = PathBuf::from(expanded);
        if path.is_absolute() {
            path
        } else {
            data_root.join(path)
        }
    }

    pub fn config_path(data_root: &Path) -> PathBuf {
        data_root.join(".cvr").join("cvr.toml")
    }

    pub fn db_path(data_root: &Path) -> PathBuf {
        data_root.join(".cvr").join("cvr.db")
    }
}
