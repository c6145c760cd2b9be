use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Engine-wide settings.
///
/// Every field has a default, so an empty JSON object is a valid configuration file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Prefix prepended to imported names that collide (merge) or to every imported name (rename).
    pub merge_prefix: String,
    /// Convert legacy basic selectors to simple selectors right after a document is loaded.
    pub auto_convert_legacy_selectors: bool,
    /// Name of the renderer whose callbacks drive scene settings and AOV collections.
    pub renderer: String,
    /// Emit a warning when sibling overrides in one collection target the same attribute.
    pub warn_on_sibling_conflicts: bool,
    /// Maximum number of commands kept on the undo stack.
    pub undo_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            merge_prefix: default_merge_prefix(),
            auto_convert_legacy_selectors: false,
            renderer: default_renderer(),
            warn_on_sibling_conflicts: true,
            undo_depth: 256,
        }
    }
}

fn default_merge_prefix() -> String {
    "imported_".to_string()
}

fn default_renderer() -> String {
    "default".to_string()
}

impl EngineConfig {
    /// Parse a configuration from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> RenderSetupResult<Self> {
        let cfg: Self = serde_json::from_reader(r)
            .map_err(|e| RenderSetupError::serde(format!("parse engine config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a configuration from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> RenderSetupResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            RenderSetupError::serde(format!("open engine config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> RenderSetupResult<()> {
        if self.renderer.trim().is_empty() {
            return Err(RenderSetupError::structural("renderer must be non-empty"));
        }
        if self.undo_depth == 0 {
            return Err(RenderSetupError::structural("undoDepth must be > 0"));
        }
        if self
            .merge_prefix
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '_'))
        {
            return Err(RenderSetupError::structural(
                "mergePrefix may only contain [A-Za-z0-9_]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
