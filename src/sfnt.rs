//! Minimal raw SFNT/TTC helpers.
//!
//! Covers the few tables the higher-level parsers do not expose in the
//! shape this engine needs: the table directory itself (with lazy
//! checksum validation), `fvar` named instances, `CPAL` palettes, and
//! the bitmap strike size lists. All readers are bounds-checked and
//! return `None`/empty on malformed data instead of panicking.

/// One entry of a face's table directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfntTableInfo {
    /// Four-byte table tag, e.g. `glyf`.
    pub tag: [u8; 4],
    pub offset: u32,
    pub length: u32,
    /// Whether the stored checksum matches the table bytes.
    pub valid: bool,
}

impl SfntTableInfo {
    pub fn tag_string(&self) -> String {
        self.tag.iter().map(|&b| b as char).collect()
    }
}

/// A variation axis from `fvar`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariationAxisInfo {
    pub tag: [u8; 4],
    pub minimum: f32,
    pub default: f32,
    pub maximum: f32,
    pub hidden: bool,
    /// `name` table id for the axis name.
    pub name_id: u16,
}

impl VariationAxisInfo {
    pub fn tag_string(&self) -> String {
        self.tag.iter().map(|&b| b as char).collect()
    }
}

/// A named instance from `fvar`: a predefined coordinate set presented as
/// a distinct static face.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedInstanceInfo {
    /// `name` table id for the subfamily name (e.g. "Bold").
    pub name_id: u16,
    /// User-space design coordinates, one per axis in axis order.
    pub coordinates: Vec<f32>,
}

/// Palette descriptor from `CPAL`.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteInfo {
    pub index: u16,
    /// `name` table id for the palette label, when the font provides one.
    pub name_id: Option<u16>,
}

fn u16_at(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn u32_at(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn fixed_at(data: &[u8], offset: usize) -> Option<f32> {
    Some(u32_at(data, offset)? as i32 as f32 / 65536.0)
}

/// Number of faces in the font data (1 unless it is a TTC).
pub fn face_count(data: &[u8]) -> u32 {
    if data.get(0..4) == Some(b"ttcf") {
        u32_at(data, 8).unwrap_or(0)
    } else if data.len() >= 12 {
        1
    } else {
        0
    }
}

/// Byte offset of the face's SFNT header inside the font data.
pub fn face_offset(data: &[u8], face_index: u32) -> Option<usize> {
    if data.get(0..4) == Some(b"ttcf") {
        if face_index >= face_count(data) {
            return None;
        }
        Some(u32_at(data, 12 + 4 * face_index as usize)? as usize)
    } else if face_index == 0 && data.len() >= 12 {
        Some(0)
    } else {
        None
    }
}

/// Walk the face's table directory. Checksums are verified here, which is
/// the "lazy" step: callers memoize the result per font.
pub fn table_directory(data: &[u8], face_index: u32) -> Vec<SfntTableInfo> {
    let Some(base) = face_offset(data, face_index) else {
        return Vec::new();
    };
    let Some(num_tables) = u16_at(data, base + 4) else {
        return Vec::new();
    };
    let mut tables = Vec::with_capacity(num_tables as usize);
    for i in 0..num_tables as usize {
        let rec = base + 12 + 16 * i;
        let (Some(tag), Some(checksum), Some(offset), Some(length)) = (
            data.get(rec..rec + 4),
            u32_at(data, rec + 4),
            u32_at(data, rec + 8),
            u32_at(data, rec + 12),
        ) else {
            break;
        };
        let tag: [u8; 4] = [tag[0], tag[1], tag[2], tag[3]];
        let valid = table_checksum(data, &tag, offset, length) == Some(checksum);
        tables.push(SfntTableInfo {
            tag,
            offset,
            length,
            valid,
        });
    }
    tables
}

/// Sum of big-endian u32 words over the (zero-padded) table. The `head`
/// table's checkSumAdjustment field is excluded per the OpenType checksum
/// rules.
fn table_checksum(data: &[u8], tag: &[u8; 4], offset: u32, length: u32) -> Option<u32> {
    let start = offset as usize;
    let end = start.checked_add(length as usize)?;
    let bytes = data.get(start..end)?;
    let mut sum = 0u32;
    for (i, chunk) in bytes.chunks(4).enumerate() {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        let mut value = u32::from_be_bytes(word);
        if tag == b"head" && i == 2 {
            // word 2 is checkSumAdjustment
            value = 0;
        }
        sum = sum.wrapping_add(value);
    }
    Some(sum)
}

/// Raw bytes of a table, if present.
pub fn table_slice<'a>(data: &'a [u8], face_index: u32, tag: &[u8; 4]) -> Option<&'a [u8]> {
    let base = face_offset(data, face_index)?;
    let num_tables = u16_at(data, base + 4)?;
    for i in 0..num_tables as usize {
        let rec = base + 12 + 16 * i;
        if data.get(rec..rec + 4)? == tag {
            let offset = u32_at(data, rec + 8)? as usize;
            let length = u32_at(data, rec + 12)? as usize;
            return data.get(offset..offset.checked_add(length)?);
        }
    }
    None
}

pub fn has_table(data: &[u8], face_index: u32, tag: &[u8; 4]) -> bool {
    table_slice(data, face_index, tag).is_some()
}

/// Parse `fvar` into axis descriptors and the named-instance list.
pub fn variation_info(
    data: &[u8],
    face_index: u32,
) -> (Vec<VariationAxisInfo>, Vec<NamedInstanceInfo>) {
    let Some(fvar) = table_slice(data, face_index, b"fvar") else {
        return (Vec::new(), Vec::new());
    };
    let parse = || -> Option<(Vec<VariationAxisInfo>, Vec<NamedInstanceInfo>)> {
        let axes_offset = u16_at(fvar, 4)? as usize;
        let axis_count = u16_at(fvar, 8)? as usize;
        let axis_size = u16_at(fvar, 10)? as usize;
        let instance_count = u16_at(fvar, 12)? as usize;
        let instance_size = u16_at(fvar, 14)? as usize;
        if axis_size < 20 || instance_size < 4 + 4 * axis_count {
            return None;
        }
        let mut axes = Vec::with_capacity(axis_count);
        for i in 0..axis_count {
            let rec = axes_offset + i * axis_size;
            let tag = fvar.get(rec..rec + 4)?;
            axes.push(VariationAxisInfo {
                tag: [tag[0], tag[1], tag[2], tag[3]],
                minimum: fixed_at(fvar, rec + 4)?,
                default: fixed_at(fvar, rec + 8)?,
                maximum: fixed_at(fvar, rec + 12)?,
                hidden: u16_at(fvar, rec + 16)? & 0x0001 != 0,
                name_id: u16_at(fvar, rec + 18)?,
            });
        }
        let instances_offset = axes_offset + axis_count * axis_size;
        let mut instances = Vec::with_capacity(instance_count);
        for i in 0..instance_count {
            let rec = instances_offset + i * instance_size;
            let name_id = u16_at(fvar, rec)?;
            let mut coordinates = Vec::with_capacity(axis_count);
            for a in 0..axis_count {
                coordinates.push(fixed_at(fvar, rec + 4 + 4 * a)?);
            }
            instances.push(NamedInstanceInfo {
                name_id,
                coordinates,
            });
        }
        Some((axes, instances))
    };
    parse().unwrap_or_default()
}

/// Parse `CPAL` palette descriptors.
pub fn palette_infos(data: &[u8], face_index: u32) -> Vec<PaletteInfo> {
    let Some(cpal) = table_slice(data, face_index, b"CPAL") else {
        return Vec::new();
    };
    let parse = || -> Option<Vec<PaletteInfo>> {
        let version = u16_at(cpal, 0)?;
        let num_palettes = u16_at(cpal, 4)?;
        // Version 1 appends palette label name ids after the color record
        // indices block.
        let labels_offset = if version >= 1 {
            let after_indices = 12 + 2 * num_palettes as usize;
            let off = u32_at(cpal, after_indices + 4)? as usize;
            (off != 0).then_some(off)
        } else {
            None
        };
        let mut palettes = Vec::with_capacity(num_palettes as usize);
        for i in 0..num_palettes {
            let name_id = labels_offset
                .and_then(|off| u16_at(cpal, off + 2 * i as usize))
                .filter(|&id| id != 0xFFFF);
            palettes.push(PaletteInfo { index: i, name_id });
        }
        Some(palettes)
    };
    parse().unwrap_or_default()
}

/// Resolve the RGBA colors of one palette.
pub fn palette_colors(data: &[u8], face_index: u32, palette: u16) -> Vec<[u8; 4]> {
    let Some(cpal) = table_slice(data, face_index, b"CPAL") else {
        return Vec::new();
    };
    let parse = || -> Option<Vec<[u8; 4]>> {
        let entries = u16_at(cpal, 2)? as usize;
        let num_palettes = u16_at(cpal, 4)?;
        if palette >= num_palettes {
            return None;
        }
        let records_offset = u32_at(cpal, 8)? as usize;
        let first = u16_at(cpal, 12 + 2 * palette as usize)? as usize;
        let mut colors = Vec::with_capacity(entries);
        for i in 0..entries {
            let rec = records_offset + 4 * (first + i);
            let bgra = cpal.get(rec..rec + 4)?;
            colors.push([bgra[2], bgra[1], bgra[0], bgra[3]]);
        }
        Some(colors)
    };
    parse().unwrap_or_default()
}

/// Fixed bitmap strike sizes (ppem) from `EBLC`/`CBLC`/`bloc`/`sbix`,
/// sorted and deduplicated.
pub fn strike_sizes(data: &[u8], face_index: u32) -> Vec<u16> {
    let mut sizes = Vec::new();
    for tag in [b"EBLC", b"CBLC", b"bloc"] {
        if let Some(table) = table_slice(data, face_index, tag) {
            if let Some(num_sizes) = u32_at(table, 4) {
                for i in 0..num_sizes as usize {
                    // bitmapSize records are 48 bytes; ppemY lives at +45.
                    if let Some(&ppem) = table.get(8 + 48 * i + 45) {
                        sizes.push(ppem as u16);
                    }
                }
            }
        }
    }
    if let Some(sbix) = table_slice(data, face_index, b"sbix") {
        if let Some(num_strikes) = u32_at(sbix, 4) {
            for i in 0..num_strikes as usize {
                if let Some(offset) = u32_at(sbix, 8 + 4 * i) {
                    if let Some(ppem) = u16_at(sbix, offset as usize) {
                        sizes.push(ppem);
                    }
                }
            }
        }
    }
    sizes.sort_unstable();
    sizes.dedup();
    sizes
}

/// Known "tricky" families: fonts whose hinting bytecode must run for
/// correct rendering, so native hinting cannot be disabled for them.
const TRICKY_FAMILIES: &[&str] = &[
    "cpop",
    "DFGirl-W6-WIN-BF",
    "DFGothic-EB",
    "DFGyoSho-Lt",
    "DFHei",
    "DFHSGothic-W5",
    "DFHSMincho-W3",
    "DFHSMincho-W7",
    "DFKaiSho-SB",
    "DFKaiShu",
    "DFKai-SB",
    "DFMing",
    "DLC",
    "DLCHayMedium",
    "DLCHayBold",
    "HuaTianKaiTi",
    "HuaTianSongTi",
    "Ming(for ISO10646)",
    "MingLiU",
    "MingMedium",
    "PMingLiU",
    "MingLi43",
];

/// Whether the family name is on the known-tricky list.
pub fn is_tricky_family(family: &str) -> bool {
    TRICKY_FAMILIES
        .iter()
        .any(|t| family == *t || family.starts_with(t))
}
