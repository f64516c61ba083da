//! Current-state snapshot of the active font.
//!
//! Rebuilt wholesale from the resolved face on every load or reload and
//! read-only in between, so callers never observe a partially updated
//! view. The SFNT table directory is validated lazily on first query and
//! memoized for the lifetime of the snapshot.

use std::sync::{Arc, OnceLock};

use ttf_parser::{name_id, GlyphId, PlatformId};

use crate::face::CachedFace;
use crate::sfnt::{self, NamedInstanceInfo, PaletteInfo, SfntTableInfo, VariationAxisInfo};

/// Outline flavor of the active font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontType {
    /// CFF or CFF2 charstrings.
    Cff,
    /// TrueType `glyf` outlines.
    TrueType,
    /// No scalable outlines (bitmap-only or unknown flavor).
    Other,
}

/// One cmap subtable descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharMapInfo {
    pub index: u16,
    pub platform_id: u16,
    pub encoding_id: u16,
    pub is_unicode: bool,
}

/// One SFNT name-table record. `value` is `None` for encodings the parser
/// cannot decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfntNameInfo {
    pub name_id: u16,
    pub platform_id: u16,
    pub encoding_id: u16,
    pub language_id: u16,
    pub value: Option<String>,
}

/// Immutable metadata snapshot of the loaded face.
pub struct FontInfo {
    font_index: usize,
    face_index: u32,
    named_instance_index: u16,

    family_name: String,
    style_name: String,
    postscript_name: Option<String>,
    glyph_count: u16,
    face_count: u32,
    units_per_em: u16,

    font_type: FontType,
    is_fixed_width: bool,
    is_tricky: bool,
    is_bitmap_only: bool,
    has_embedded_bitmaps: bool,
    has_color_layers: bool,
    has_glyph_names: bool,

    charmaps: Vec<CharMapInfo>,
    names: Vec<SfntNameInfo>,
    axes: Vec<VariationAxisInfo>,
    named_instances: Vec<NamedInstanceInfo>,
    palettes: Vec<PaletteInfo>,
    fixed_sizes: Vec<u16>,

    data: Arc<Vec<u8>>,
    tables: OnceLock<Vec<SfntTableInfo>>,
}

impl FontInfo {
    /// Build a snapshot from a resolved face.
    pub fn from_face(face: &CachedFace, font_index: usize) -> Self {
        let parser = face.parser();
        let data = Arc::clone(face.data());
        let face_index = face.face_index();

        let mut names = Vec::new();
        for name in parser.names() {
            names.push(SfntNameInfo {
                name_id: name.name_id,
                platform_id: platform_code(name.platform_id),
                encoding_id: name.encoding_id,
                language_id: name.language_id,
                value: name.to_string(),
            });
        }

        let family_name = name_value(&names, name_id::TYPOGRAPHIC_FAMILY)
            .or_else(|| name_value(&names, name_id::FAMILY))
            .unwrap_or_default();
        let style_name = name_value(&names, name_id::TYPOGRAPHIC_SUBFAMILY)
            .or_else(|| name_value(&names, name_id::SUBFAMILY))
            .unwrap_or_default();
        let postscript_name = name_value(&names, name_id::POST_SCRIPT_NAME);

        let tables = parser.tables();
        let font_type = if tables.cff.is_some() || tables.cff2.is_some() {
            FontType::Cff
        } else if tables.glyf.is_some() {
            FontType::TrueType
        } else {
            FontType::Other
        };

        let glyph_count = parser.number_of_glyphs();
        let has_glyph_names = (0..glyph_count.min(16))
            .any(|g| parser.glyph_name(GlyphId(g)).is_some());

        let mut charmaps = Vec::new();
        if let Some(cmap) = tables.cmap {
            for (index, subtable) in cmap.subtables.into_iter().enumerate() {
                charmaps.push(CharMapInfo {
                    index: index as u16,
                    platform_id: platform_code(subtable.platform_id),
                    encoding_id: subtable.encoding_id,
                    is_unicode: subtable.is_unicode(),
                });
            }
        }

        let (axes, named_instances) = sfnt::variation_info(&data, face_index);
        let palettes = sfnt::palette_infos(&data, face_index);
        let fixed_sizes = sfnt::strike_sizes(&data, face_index);

        let scalable = face.is_scalable();
        let has_embedded_bitmaps = !fixed_sizes.is_empty();

        Self {
            font_index,
            face_index,
            named_instance_index: face.named_instance_index(),
            family_name,
            style_name,
            postscript_name,
            glyph_count,
            face_count: sfnt::face_count(&data),
            units_per_em: parser.units_per_em(),
            font_type,
            is_fixed_width: parser.is_monospaced(),
            is_tricky: sfnt::is_tricky_family(
                &name_value(&names, name_id::FAMILY).unwrap_or_default(),
            ),
            is_bitmap_only: !scalable && has_embedded_bitmaps,
            has_embedded_bitmaps,
            has_color_layers: tables.colr.is_some()
                || tables.sbix.is_some()
                || tables.cbdt.is_some()
                || tables.svg.is_some(),
            has_glyph_names,
            charmaps,
            names,
            axes,
            named_instances,
            palettes,
            fixed_sizes,
            data,
            tables: OnceLock::new(),
        }
    }

    pub fn font_index(&self) -> usize {
        self.font_index
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    pub fn named_instance_index(&self) -> u16 {
        self.named_instance_index
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn style_name(&self) -> &str {
        &self.style_name
    }

    pub fn postscript_name(&self) -> Option<&str> {
        self.postscript_name.as_deref()
    }

    pub fn glyph_count(&self) -> u16 {
        self.glyph_count
    }

    /// Number of faces in the backing container (1 for non-collections).
    pub fn face_count(&self) -> u32 {
        self.face_count
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn font_type(&self) -> FontType {
        self.font_type
    }

    pub fn is_fixed_width(&self) -> bool {
        self.is_fixed_width
    }

    /// Whether the family needs the native hinter bytecode to render
    /// acceptably.
    pub fn is_tricky(&self) -> bool {
        self.is_tricky
    }

    /// No scalable outlines; only fixed strikes can render.
    pub fn is_bitmap_only(&self) -> bool {
        self.is_bitmap_only
    }

    pub fn has_embedded_bitmaps(&self) -> bool {
        self.has_embedded_bitmaps
    }

    pub fn has_color_layers(&self) -> bool {
        self.has_color_layers
    }

    pub fn has_glyph_names(&self) -> bool {
        self.has_glyph_names
    }

    pub fn charmaps(&self) -> &[CharMapInfo] {
        &self.charmaps
    }

    /// Index of the first unicode charmap, if any.
    pub fn first_unicode_charmap(&self) -> Option<u16> {
        self.charmaps.iter().find(|c| c.is_unicode).map(|c| c.index)
    }

    pub fn sfnt_names(&self) -> &[SfntNameInfo] {
        &self.names
    }

    /// SFNT table directory with per-table checksum validity, parsed on
    /// first call and memoized.
    pub fn sfnt_tables(&self) -> &[SfntTableInfo] {
        self.tables
            .get_or_init(|| sfnt::table_directory(&self.data, self.face_index))
    }

    pub fn variation_axes(&self) -> &[VariationAxisInfo] {
        &self.axes
    }

    pub fn named_instances(&self) -> &[NamedInstanceInfo] {
        &self.named_instances
    }

    /// Display name of named instance `n` (1-based, matching the triplet
    /// convention).
    pub fn named_instance_name(&self, n: u16) -> Option<String> {
        let instance = self.named_instances.get(n.checked_sub(1)? as usize)?;
        name_value(&self.names, instance.name_id)
    }

    pub fn palettes(&self) -> &[PaletteInfo] {
        &self.palettes
    }

    /// Display name of a palette, when CPAL labels one.
    pub fn palette_name(&self, palette_index: u16) -> Option<String> {
        let palette = self
            .palettes
            .iter()
            .find(|p| p.index == palette_index)?;
        name_value(&self.names, palette.name_id?)
    }

    /// Fixed strike sizes in pixels-per-em, ascending.
    pub fn fixed_sizes(&self) -> &[u16] {
        &self.fixed_sizes
    }
}

impl std::fmt::Debug for FontInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontInfo")
            .field("family_name", &self.family_name)
            .field("style_name", &self.style_name)
            .field("glyph_count", &self.glyph_count)
            .field("font_type", &self.font_type)
            .finish()
    }
}

fn platform_code(platform: PlatformId) -> u16 {
    match platform {
        PlatformId::Unicode => 0,
        PlatformId::Macintosh => 1,
        PlatformId::Iso => 2,
        PlatformId::Windows => 3,
        PlatformId::Custom => 4,
    }
}

/// First decodable record for a name id, preferring Windows/Unicode
/// platforms over Macintosh.
fn name_value(names: &[SfntNameInfo], id: u16) -> Option<String> {
    names
        .iter()
        .filter(|n| n.name_id == id && n.value.is_some())
        .min_by_key(|n| match n.platform_id {
            3 => 0,
            0 => 1,
            _ => 2,
        })
        .and_then(|n| n.value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name_id: u16, platform_id: u16, value: &str) -> SfntNameInfo {
        SfntNameInfo {
            name_id,
            platform_id,
            encoding_id: 1,
            language_id: 0x409,
            value: Some(value.to_string()),
        }
    }

    #[test]
    fn name_lookup_prefers_windows_platform() {
        let names = vec![
            record(name_id::FAMILY, 1, "Mac Family"),
            record(name_id::FAMILY, 3, "Win Family"),
        ];
        assert_eq!(
            name_value(&names, name_id::FAMILY).as_deref(),
            Some("Win Family")
        );
    }

    #[test]
    fn name_lookup_skips_undecodable_records() {
        let names = vec![
            SfntNameInfo {
                name_id: name_id::FAMILY,
                platform_id: 3,
                encoding_id: 1,
                language_id: 0x409,
                value: None,
            },
            record(name_id::FAMILY, 1, "Fallback"),
        ];
        assert_eq!(
            name_value(&names, name_id::FAMILY).as_deref(),
            Some("Fallback")
        );
    }
}
