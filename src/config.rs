//! Bridge configuration: argument defaults and the permission policy per kind.
//!
//! Stored as pretty JSON. A missing file means "all defaults".

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{Capability, Encoding, OperationKind};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read bridge config: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse bridge config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    #[serde(default = "default_file_name")]
    pub default_file_name: String,
    #[serde(default = "default_save_mime_type")]
    pub default_save_mime_type: String,
    #[serde(default = "default_open_mime_type")]
    pub default_open_mime_type: String,
    #[serde(default)]
    pub default_encoding: Encoding,
    /// Capability checked before the create-document picker
    #[serde(default = "default_save_capability")]
    pub save_capability: Option<Capability>,
    /// Capability checked before the open-document picker (none by default)
    #[serde(default)]
    pub open_capability: Option<Capability>,
}

fn default_file_name() -> String {
    "backup.json".to_string()
}

fn default_save_mime_type() -> String {
    "application/json".to_string()
}

fn default_open_mime_type() -> String {
    "application/octet-stream".to_string()
}

fn default_save_capability() -> Option<Capability> {
    Some(Capability::WriteStorage)
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_file_name: default_file_name(),
            default_save_mime_type: default_save_mime_type(),
            default_open_mime_type: default_open_mime_type(),
            default_encoding: Encoding::default(),
            save_capability: default_save_capability(),
            open_capability: None,
        }
    }
}

impl BridgeConfig {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Capability that must be granted before dispatching `kind`
    pub fn capability_for(&self, kind: OperationKind) -> Option<Capability> {
        match kind {
            OperationKind::Save => self.save_capability,
            OperationKind::Open => self.open_capability,
        }
    }
}
