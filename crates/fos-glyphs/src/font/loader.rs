//! Font file and system font loading

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{FontDescriptor, FontHandle, FontMetadata, GlyphSource, check_font_extension};
use crate::atlas::TextureKind;
use crate::{GlyphError, Result};

/// A font opened for a resource: its glyph source and the atlas kind it needs
#[derive(Clone)]
pub struct OpenedFont {
    pub source: Arc<dyn GlyphSource>,
    pub kind: TextureKind,
}

impl OpenedFont {
    /// Pick the atlas kind from the source's color capability
    pub fn new(source: Arc<dyn GlyphSource>) -> Self {
        let kind = if source.has_color_glyphs() { TextureKind::Bitmap } else { TextureKind::Sdf };
        Self { source, kind }
    }

    pub fn with_kind(source: Arc<dyn GlyphSource>, kind: TextureKind) -> Self {
        Self { source, kind }
    }
}

impl std::fmt::Debug for OpenedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedFont").field("kind", &self.kind).finish_non_exhaustive()
    }
}

/// Turns descriptors into opened fonts; the registry's only path to file I/O
pub trait FontOpener {
    fn open(&mut self, descriptor: &FontDescriptor) -> Result<OpenedFont>;
}

/// Opens bundled fonts under a content root and installed fonts via fontdb
pub struct FontLoader {
    content_root: PathBuf,
    system: fontdb::Database,
    system_loaded: bool,
    allow_system: bool,
}

impl FontLoader {
    /// Loader for fonts under `content_root`, scanning system fonts on first use
    pub fn new(content_root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: content_root.into(),
            system: fontdb::Database::new(),
            system_loaded: false,
            allow_system: cfg!(feature = "system-fonts"),
        }
    }

    /// Loader that resolves system fonts against a prepared database only
    pub fn with_database(content_root: impl Into<PathBuf>, database: fontdb::Database) -> Self {
        Self {
            content_root: content_root.into(),
            system: database,
            system_loaded: true,
            allow_system: true,
        }
    }

    /// Never scan installed fonts; system descriptors then fail to resolve
    pub fn without_system_fonts(mut self) -> Self {
        self.allow_system = false;
        self
    }

    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    fn open_bundled(&self, descriptor: &FontDescriptor) -> Result<FontHandle> {
        let path = self.content_root.join(&descriptor.content_path);
        check_font_extension(&path)?;
        if !path.is_file() {
            return Err(GlyphError::FontFileNotFound(path));
        }

        let data = std::fs::read(&path)?;
        let index = collection_index(&data, descriptor);
        tracing::debug!("Read {} ({} bytes, face {})", path.display(), data.len(), index);
        FontHandle::from_bytes(data, index)
    }

    fn open_system(&mut self, descriptor: &FontDescriptor) -> Result<FontHandle> {
        let unresolved = || GlyphError::SystemFontUnresolved {
            family: descriptor.family.clone(),
            subfamily: descriptor.subfamily.clone(),
        };
        if !self.allow_system {
            return Err(unresolved());
        }
        if !self.system_loaded {
            self.system.load_system_fonts();
            self.system_loaded = true;
            tracing::info!("Scanned {} system font faces", self.system.len());
        }

        let families = [fontdb::Family::Name(&descriptor.family)];
        let query = fontdb::Query {
            families: &families,
            weight: fontdb::Weight(descriptor.weight.value()),
            stretch: percent_to_stretch(descriptor.width),
            style: if descriptor.is_italic { fontdb::Style::Italic } else { fontdb::Style::Normal },
        };
        // fontdb answers with the nearest style; only a face that carries the
        // requested subfamily name resolves the descriptor
        let nearest = self.system.query(&query);
        let same_family = self
            .system
            .faces()
            .filter(|face| face.families.iter().any(|(name, _)| name.eq_ignore_ascii_case(&descriptor.family)))
            .map(|face| face.id);
        let (data, index) = nearest
            .into_iter()
            .chain(same_family)
            .find_map(|id| self.named_face(id, descriptor))
            .ok_or_else(unresolved)?;
        FontHandle::from_bytes(data, index)
    }

    /// Bytes and index of a system face answering to the descriptor's names
    fn named_face(&self, id: fontdb::ID, descriptor: &FontDescriptor) -> Option<(Vec<u8>, u32)> {
        self.system
            .with_face_data(id, |data, index| {
                FontMetadata::read(data, index)
                    .is_ok_and(|metadata| metadata.matches(&descriptor.family, &descriptor.subfamily))
                    .then(|| (data.to_vec(), index))
            })
            .flatten()
    }
}

impl FontOpener for FontLoader {
    fn open(&mut self, descriptor: &FontDescriptor) -> Result<OpenedFont> {
        let handle = if descriptor.use_system_font {
            self.open_system(descriptor)?
        } else {
            self.open_bundled(descriptor)?
        };
        Ok(OpenedFont::new(Arc::new(handle)))
    }
}

/// Face of a collection answering to the descriptor's names, 0 otherwise
fn collection_index(data: &[u8], descriptor: &FontDescriptor) -> u32 {
    let Some(count) = ttf_parser::fonts_in_collection(data) else { return 0 };
    (0..count)
        .find(|&index| {
            FontMetadata::read(data, index)
                .is_ok_and(|metadata| metadata.matches(&descriptor.family, &descriptor.subfamily))
        })
        .unwrap_or(0)
}

/// Nearest fontdb stretch for a width in percent
fn percent_to_stretch(width: f32) -> fontdb::Stretch {
    use fontdb::Stretch::*;
    const STEPS: [(f32, fontdb::Stretch); 9] = [
        (50.0, UltraCondensed),
        (62.5, ExtraCondensed),
        (75.0, Condensed),
        (87.5, SemiCondensed),
        (100.0, Normal),
        (112.5, SemiExpanded),
        (125.0, Expanded),
        (150.0, ExtraExpanded),
        (200.0, UltraExpanded),
    ];
    STEPS
        .iter()
        .min_by(|a, b| (a.0 - width).abs().total_cmp(&(b.0 - width).abs()))
        .map(|&(_, stretch)| stretch)
        .unwrap_or(Normal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fos-glyphs-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_file() {
        let mut loader = FontLoader::new(scratch_dir("missing"));
        let err = loader.open(&FontDescriptor::bundled("nope.ttf", "Nope")).unwrap_err();
        assert!(matches!(err, GlyphError::FontFileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = scratch_dir("ext");
        std::fs::write(dir.join("font.woff"), b"wOFF").unwrap();
        let mut loader = FontLoader::new(&dir);
        let err = loader.open(&FontDescriptor::bundled("font.woff", "X")).unwrap_err();
        assert!(matches!(err, GlyphError::UnsupportedFontFileExtension(_)));
    }

    #[test]
    fn test_corrupt_file() {
        let dir = scratch_dir("corrupt");
        std::fs::write(dir.join("bad.ttf"), b"definitely not a font").unwrap();
        let mut loader = FontLoader::new(&dir);
        let err = loader.open(&FontDescriptor::bundled("bad.ttf", "Bad")).unwrap_err();
        assert!(matches!(err, GlyphError::FontParsing(_)));
    }

    #[test]
    fn test_system_font_unresolved() {
        let mut loader = FontLoader::with_database(".", fontdb::Database::new());
        let err = loader.open(&FontDescriptor::system("No Such Family", "Regular")).unwrap_err();
        assert!(matches!(err, GlyphError::SystemFontUnresolved { .. }));

        let mut loader = FontLoader::new(".").without_system_fonts();
        assert!(loader.open(&FontDescriptor::system("Anything", "Bold")).is_err());
    }

    #[test]
    fn test_percent_to_stretch() {
        assert_eq!(percent_to_stretch(100.0), fontdb::Stretch::Normal);
        assert_eq!(percent_to_stretch(70.0), fontdb::Stretch::Condensed);
        assert_eq!(percent_to_stretch(180.0), fontdb::Stretch::UltraExpanded);
    }
}
