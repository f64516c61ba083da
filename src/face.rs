//! Resident face objects.
//!
//! A [`CachedFace`] owns the font bytes and carries both parser views the
//! engine needs: a swash `FontRef` for rasterization/charmap work and a
//! `ttf_parser::Face` for metadata introspection. Faces are opened by the
//! face requester on cache misses and may be dropped and rebuilt by the
//! cache manager at any time; opening is deterministic, so a rebuilt face
//! is equivalent to the evicted one.

use std::sync::Arc;

use swash::FontRef;
use ttf_parser::Face;

use crate::error::FontOpenError;
use crate::settings::AxisCoord;
use crate::sfnt;

/// A font face resident in the cache, optionally pinned to a named
/// variation instance.
pub struct CachedFace {
    /// Raw font data bytes (TTF/OTF/TTC).
    data: Arc<Vec<u8>>,
    /// Swash font reference for glyph operations.
    font_ref: FontRef<'static>,
    /// ttf-parser view for metadata, cmap and outline queries.
    face: Face<'static>,
    face_index: u32,
    named_instance_index: u16,
    /// Design coordinates of the selected named instance (empty for the
    /// default instance).
    instance_coords: Vec<AxisCoord>,
}

impl CachedFace {
    /// Open a face (and named instance) from font bytes.
    ///
    /// `named_instance_index` 0 selects the default instance; `n > 0`
    /// selects fvar instance `n - 1`.
    pub fn open(
        data: Arc<Vec<u8>>,
        face_index: u32,
        named_instance_index: u16,
    ) -> Result<Self, FontOpenError> {
        let face_count = sfnt::face_count(&data);
        if face_index >= face_count.max(1) {
            return Err(FontOpenError::FaceIndexOutOfRange {
                face_index,
                face_count,
            });
        }

        // SAFETY: the transmuted slice only lives as long as the Arc it
        // was taken from, and both parser views are stored next to that
        // Arc and dropped together with it. No reference to the views
        // escapes this struct with the 'static lifetime.
        let bytes: &'static [u8] = unsafe { std::mem::transmute(data.as_slice()) };

        let font_ref = FontRef::from_index(bytes, face_index as usize)
            .ok_or_else(|| FontOpenError::Parse("unrecognized font container".into()))?;
        let mut face =
            Face::parse(bytes, face_index).map_err(|e| FontOpenError::Parse(e.to_string()))?;

        let mut instance_coords = Vec::new();
        if named_instance_index > 0 {
            let (axes, instances) = sfnt::variation_info(&data, face_index);
            let instance = instances
                .get(named_instance_index as usize - 1)
                .ok_or(FontOpenError::InstanceIndexOutOfRange {
                    instance_index: named_instance_index,
                    instance_count: instances.len() as u16,
                })?;
            for (axis, &value) in axes.iter().zip(&instance.coordinates) {
                let _ = face.set_variation(ttf_parser::Tag::from_bytes(&axis.tag), value);
                instance_coords.push(AxisCoord {
                    tag: axis.tag,
                    value,
                });
            }
        }

        Ok(Self {
            data,
            font_ref,
            face,
            face_index,
            named_instance_index,
            instance_coords,
        })
    }

    pub fn data(&self) -> &Arc<Vec<u8>> {
        &self.data
    }

    /// Swash view for scaling and charmap lookups.
    pub fn swash(&self) -> FontRef<'static> {
        self.font_ref
    }

    /// ttf-parser view for metadata queries.
    pub fn parser(&self) -> &Face<'static> {
        &self.face
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    pub fn named_instance_index(&self) -> u16 {
        self.named_instance_index
    }

    pub fn instance_coords(&self) -> &[AxisCoord] {
        &self.instance_coords
    }

    pub fn glyph_count(&self) -> u16 {
        self.face.number_of_glyphs()
    }

    /// Whether the face has scalable outlines (as opposed to bitmap-only
    /// strikes).
    pub fn is_scalable(&self) -> bool {
        let t = self.face.tables();
        t.glyf.is_some() || t.cff.is_some() || t.cff2.is_some()
    }
}

impl std::fmt::Debug for CachedFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedFace")
            .field("data_len", &self.data.len())
            .field("face_index", &self.face_index)
            .field("named_instance_index", &self.named_instance_index)
            .finish()
    }
}
