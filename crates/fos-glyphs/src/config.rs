//! Pipeline configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::atlas::{ATLAS_SIZE, BITMAP_PADDING};
use crate::{GlyphError, Result};

/// Settings shared by every font resource of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Edge length of each font atlas in pixels
    pub atlas_size: u32,
    /// Padding around glyphs in color bitmap atlases
    pub bitmap_padding: u32,
    /// Directory bundled font paths are relative to
    pub content_root: PathBuf,
    /// Rasterize different font resources on worker threads
    pub parallel: bool,
    /// Scan installed fonts when a descriptor asks for a system font
    pub load_system_fonts: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            atlas_size: ATLAS_SIZE,
            bitmap_padding: BITMAP_PADDING,
            content_root: PathBuf::from("."),
            parallel: true,
            load_system_fonts: true,
        }
    }
}

impl PipelineConfig {
    /// Config rooted at a content directory, everything else default
    pub fn with_content_root(content_root: impl Into<PathBuf>) -> Self {
        Self { content_root: content_root.into(), ..Default::default() }
    }

    /// Read a JSON config file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| GlyphError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.atlas_size == 0 || self.atlas_size > 16384 {
            return Err(GlyphError::Config(format!("atlas_size {} out of range", self.atlas_size)));
        }
        if self.bitmap_padding * 2 >= self.atlas_size {
            return Err(GlyphError::Config(format!(
                "bitmap_padding {} leaves no room in a {} atlas",
                self.bitmap_padding, self.atlas_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.atlas_size, 2048);
        assert_eq!(config.bitmap_padding, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config: PipelineConfig = serde_json::from_str(r#"{"atlas_size": 512, "parallel": false}"#).unwrap();
        assert_eq!(config.atlas_size, 512);
        assert!(!config.parallel);
        assert_eq!(config.bitmap_padding, 8);
    }

    #[test]
    fn test_validation() {
        let config = PipelineConfig { atlas_size: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(GlyphError::Config(_))));

        let config = PipelineConfig { atlas_size: 16, bitmap_padding: 8, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
