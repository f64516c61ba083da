//! Bounded-memory cache layer.
//!
//! Resident faces and size metrics are entry-capped; glyph images and
//! embedded bitmaps share a byte budget; charmap lookups are cached as
//! plain entries. Every miss is resolved through the [`FaceRequester`],
//! which must be deterministic: the same opaque id always reconstructs an
//! equivalent face, so eviction is transparent to callers.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::error::{FontOpenError, GlyphLoadError};
use crate::face::CachedFace;
use crate::face_id::OpaqueFaceId;
use crate::render::{GlyphImage, Rasterizer};
use crate::settings::{AxisCoord, ImageTypeKey, Scaler};

/// Resolves an opaque face id back to an openable face. Invoked
/// synchronously on cache misses, including misses caused by eviction.
pub trait FaceRequester {
    fn request_face(&self, id: OpaqueFaceId) -> Result<CachedFace, FontOpenError>;
}

/// Cache capacity configuration.
#[derive(Debug, Clone, Copy)]
pub struct CacheLimits {
    /// Max resident faces.
    pub max_faces: usize,
    /// Max resident size objects.
    pub max_sizes: usize,
    /// Byte budget shared by glyph images and embedded bitmaps.
    pub max_bytes: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_faces: 16,
            max_sizes: 64,
            max_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Metrics of a face at a concrete pixel size.
#[derive(Debug, Clone, Copy)]
pub struct SizeMetrics {
    pub x_ppem: f32,
    pub y_ppem: f32,
    pub units_per_em: u16,
    pub ascender: f32,
    pub descender: f32,
    pub height: f32,
    pub max_advance: f32,
}

impl SizeMetrics {
    fn for_face(face: &CachedFace, px: f32) -> Self {
        let parser = face.parser();
        let upem = parser.units_per_em();
        let scale = if upem > 0 { px / upem as f32 } else { 0.0 };
        let line_gap = parser.line_gap() as f32;
        let ascender = parser.ascender() as f32;
        let descender = parser.descender() as f32;
        Self {
            x_ppem: px,
            y_ppem: px,
            units_per_em: upem,
            ascender: ascender * scale,
            descender: descender * scale,
            height: (ascender - descender + line_gap) * scale,
            max_advance: parser.global_bounding_box().width() as f32 * scale,
        }
    }
}

/// Hit/miss counters and resident footprint, for diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub image_bytes: usize,
    pub face_count: usize,
    pub size_count: usize,
    pub image_count: usize,
}

type ImageKey = (ImageTypeKey, u16);
type CmapKey = (OpaqueFaceId, Option<u16>, u32);

/// Owns every resident cache object. Callers receive `Arc` handles; an
/// evicted entry stays alive for holders of outstanding handles but is
/// regenerated on the next lookup.
pub struct CacheManager {
    limits: CacheLimits,
    faces: LruCache<OpaqueFaceId, Arc<CachedFace>>,
    sizes: LruCache<Scaler, Arc<SizeMetrics>>,
    // Byte-budgeted together; entry counts are unbounded.
    images: LruCache<ImageKey, Arc<GlyphImage>>,
    sbits: LruCache<ImageKey, Arc<GlyphImage>>,
    cmap: LruCache<CmapKey, u16>,
    image_bytes: usize,
    hits: u64,
    misses: u64,
}

impl CacheManager {
    pub fn new(limits: CacheLimits) -> Self {
        let faces_cap = NonZeroUsize::new(limits.max_faces.max(1)).unwrap_or(NonZeroUsize::MIN);
        let sizes_cap = NonZeroUsize::new(limits.max_sizes.max(1)).unwrap_or(NonZeroUsize::MIN);
        let cmap_cap = NonZeroUsize::new(4096).unwrap_or(NonZeroUsize::MIN);
        Self {
            limits,
            faces: LruCache::new(faces_cap),
            sizes: LruCache::new(sizes_cap),
            images: LruCache::unbounded(),
            sbits: LruCache::unbounded(),
            cmap: LruCache::new(cmap_cap),
            image_bytes: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Resident face for an opaque id, opening it through the requester on
    /// a miss.
    pub fn face(
        &mut self,
        id: OpaqueFaceId,
        requester: &dyn FaceRequester,
    ) -> Result<Arc<CachedFace>, FontOpenError> {
        if let Some(face) = self.faces.get(&id) {
            self.hits += 1;
            return Ok(Arc::clone(face));
        }
        self.misses += 1;
        let face = Arc::new(requester.request_face(id)?);
        log::debug!(
            "face cache miss for id {}, opened face with {} glyphs",
            id.0,
            face.glyph_count()
        );
        self.faces.put(id, Arc::clone(&face));
        Ok(face)
    }

    /// Resident size object for a scaler. `Ok(None)` means the face has no
    /// usable rendering at this size: it is bitmap-only and the pixel size
    /// matches no fixed strike.
    pub fn size(
        &mut self,
        scaler: &Scaler,
        requester: &dyn FaceRequester,
    ) -> Result<Option<Arc<SizeMetrics>>, FontOpenError> {
        if let Some(metrics) = self.sizes.get(scaler) {
            self.hits += 1;
            return Ok(Some(Arc::clone(metrics)));
        }
        self.misses += 1;
        let face = self.face(scaler.face_id, requester)?;
        let px = scaler.height_px();
        if !face.is_scalable() {
            let strikes = crate::sfnt::strike_sizes(face.data(), face.face_index());
            let ppem = px.round() as u16;
            if !strikes.contains(&ppem) {
                return Ok(None);
            }
        }
        let metrics = Arc::new(SizeMetrics::for_face(&face, px));
        self.sizes.put(*scaler, Arc::clone(&metrics));
        Ok(Some(metrics))
    }

    /// Cached glyph image, rasterizing on a miss. `Ok(None)` means the
    /// face produced nothing for this glyph.
    pub fn glyph_image(
        &mut self,
        key: &ImageTypeKey,
        glyph_index: u16,
        design_coords: &[AxisCoord],
        rasterizer: &mut Rasterizer,
        requester: &dyn FaceRequester,
    ) -> Result<Option<Arc<GlyphImage>>, GlyphLoadError> {
        let cache_key = (*key, glyph_index);
        if let Some(image) = self.images.get(&cache_key) {
            self.hits += 1;
            return Ok(Some(Arc::clone(image)));
        }
        self.misses += 1;
        let face = self.face(key.scaler.face_id, requester)?;
        let Some(image) = rasterizer.rasterize(&face, key, design_coords, glyph_index) else {
            return Ok(None);
        };
        let image = Arc::new(image);
        self.insert_image(cache_key, Arc::clone(&image), false);
        Ok(Some(image))
    }

    /// Cached embedded-bitmap image: like [`glyph_image`](Self::glyph_image)
    /// but forcing the embedded-bitmap source regardless of the key's
    /// outline preference.
    pub fn bitmap_glyph(
        &mut self,
        key: &ImageTypeKey,
        glyph_index: u16,
        rasterizer: &mut Rasterizer,
        requester: &dyn FaceRequester,
    ) -> Result<Option<Arc<GlyphImage>>, GlyphLoadError> {
        let mut sbit_key = *key;
        sbit_key.load_flags.prefer_embedded_bitmaps = true;
        let cache_key = (sbit_key, glyph_index);
        if let Some(image) = self.sbits.get(&cache_key) {
            self.hits += 1;
            return Ok(Some(Arc::clone(image)));
        }
        self.misses += 1;
        let face = self.face(key.scaler.face_id, requester)?;
        let Some(image) = rasterizer.rasterize(&face, &sbit_key, &[], glyph_index) else {
            return Ok(None);
        };
        let image = Arc::new(image);
        self.insert_image(cache_key, Arc::clone(&image), true);
        Ok(Some(image))
    }

    /// Cached character-to-glyph lookup. `cmap_index` selects a specific
    /// cmap subtable; `None` uses the face's default unicode charmap.
    /// Returns 0 for unmapped codes (also cached).
    pub fn glyph_index_for_char(
        &mut self,
        id: OpaqueFaceId,
        cmap_index: Option<u16>,
        code: u32,
        requester: &dyn FaceRequester,
    ) -> Result<u16, FontOpenError> {
        let cache_key = (id, cmap_index, code);
        if let Some(&glyph) = self.cmap.get(&cache_key) {
            self.hits += 1;
            return Ok(glyph);
        }
        self.misses += 1;
        let face = self.face(id, requester)?;
        let glyph = match cmap_index {
            Some(i) => face
                .parser()
                .tables()
                .cmap
                .and_then(|cmap| cmap.subtables.get(i))
                .and_then(|sub| sub.glyph_index(code))
                .map(|g| g.0)
                .unwrap_or(0),
            None => face.swash().charmap().map(code),
        };
        self.cmap.put(cache_key, glyph);
        Ok(glyph)
    }

    /// Drop every resident object. Registry identity survives; the next
    /// lookup regenerates through the requester.
    pub fn reset(&mut self) {
        self.faces.clear();
        self.sizes.clear();
        self.images.clear();
        self.sbits.clear();
        self.cmap.clear();
        self.image_bytes = 0;
        log::debug!("cache reset");
    }

    /// Evict everything belonging to one face id. Used on font removal and
    /// on face-local invalidation (stem darkening, design coordinates).
    pub fn remove_face_entries(&mut self, id: OpaqueFaceId) {
        self.faces.pop(&id);

        let stale_sizes: Vec<Scaler> = self
            .sizes
            .iter()
            .map(|(k, _)| *k)
            .filter(|k| k.face_id == id)
            .collect();
        for key in stale_sizes {
            self.sizes.pop(&key);
        }

        let stale_images: Vec<ImageKey> = self
            .images
            .iter()
            .map(|(k, _)| *k)
            .filter(|(k, _)| k.scaler.face_id == id)
            .collect();
        for key in stale_images {
            if let Some(image) = self.images.pop(&key) {
                self.image_bytes = self.image_bytes.saturating_sub(image.memory_footprint());
            }
        }

        let stale_sbits: Vec<ImageKey> = self
            .sbits
            .iter()
            .map(|(k, _)| *k)
            .filter(|(k, _)| k.scaler.face_id == id)
            .collect();
        for key in stale_sbits {
            if let Some(image) = self.sbits.pop(&key) {
                self.image_bytes = self.image_bytes.saturating_sub(image.memory_footprint());
            }
        }

        let stale_cmap: Vec<CmapKey> = self
            .cmap
            .iter()
            .map(|(k, _)| *k)
            .filter(|(face, _, _)| *face == id)
            .collect();
        for key in stale_cmap {
            self.cmap.pop(&key);
        }
    }

    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            image_bytes: self.image_bytes,
            face_count: self.faces.len(),
            size_count: self.sizes.len(),
            image_count: self.images.len() + self.sbits.len(),
        }
    }

    fn insert_image(&mut self, key: ImageKey, image: Arc<GlyphImage>, sbit: bool) {
        self.image_bytes += image.memory_footprint();
        if sbit {
            self.sbits.put(key, image);
        } else {
            self.images.put(key, image);
        }
        self.enforce_byte_budget();
    }

    // Evicts oldest images first, alternating pools so one pool cannot
    // starve the other.
    fn enforce_byte_budget(&mut self) {
        while self.image_bytes > self.limits.max_bytes {
            let victim = if self.images.len() >= self.sbits.len() {
                self.images.pop_lru().or_else(|| self.sbits.pop_lru())
            } else {
                self.sbits.pop_lru().or_else(|| self.images.pop_lru())
            };
            let Some((_, image)) = victim else {
                break;
            };
            self.image_bytes = self.image_bytes.saturating_sub(image.memory_footprint());
        }
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("limits", &self.limits)
            .field("faces", &self.faces.len())
            .field("sizes", &self.sizes.len())
            .field("images", &self.images.len())
            .field("sbits", &self.sbits.len())
            .field("image_bytes", &self.image_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::PixelFormat;
    use crate::settings::{LoadFlags, RenderMode};

    struct FailingRequester;

    impl FaceRequester for FailingRequester {
        fn request_face(&self, id: OpaqueFaceId) -> Result<CachedFace, FontOpenError> {
            Err(FontOpenError::UnknownFaceId(id.0))
        }
    }

    fn test_image(bytes: usize) -> Arc<GlyphImage> {
        Arc::new(GlyphImage {
            glyph_index: 0,
            width: 1,
            height: 1,
            left: 0,
            top: 0,
            format: PixelFormat::Gray,
            pixels: vec![0u8; bytes],
        })
    }

    fn test_key(face: u64, glyph: u16) -> ImageKey {
        let scaler = Scaler {
            face_id: OpaqueFaceId(face),
            width: 20 * 64,
            height: 20 * 64,
            dpi: 96,
        };
        (
            ImageTypeKey {
                scaler,
                load_flags: LoadFlags::default(),
                render_mode: RenderMode::Gray,
                coords_digest: 0,
            },
            glyph,
        )
    }

    #[test]
    fn coordinate_digest_separates_image_slots() {
        let mut cache = CacheManager::new(CacheLimits::default());
        let (key, glyph) = test_key(0, 1);
        cache.insert_image((key, glyph), test_image(64), false);
        let mut varied = key;
        varied.coords_digest = 1;
        // An image rendered under one coordinate set must never satisfy a
        // lookup for another, even for the same face and glyph.
        assert!(cache.images.contains(&(key, glyph)));
        assert!(!cache.images.contains(&(varied, glyph)));
    }

    #[test]
    fn face_miss_propagates_requester_error() {
        let mut cache = CacheManager::new(CacheLimits::default());
        let err = cache.face(OpaqueFaceId(7), &FailingRequester).unwrap_err();
        assert!(matches!(err, FontOpenError::UnknownFaceId(7)));
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn byte_budget_evicts_oldest_images() {
        let mut cache = CacheManager::new(CacheLimits {
            max_bytes: 4096,
            ..CacheLimits::default()
        });
        let per_image = test_image(1024).memory_footprint();
        let fits = 4096 / per_image;
        for glyph in 0..(fits + 2) as u16 {
            cache.insert_image(test_key(0, glyph), test_image(1024), false);
        }
        let stats = cache.stats();
        assert!(stats.image_bytes <= 4096);
        assert!(stats.image_count <= fits);
        // The first-inserted image was the eviction victim.
        assert!(!cache.images.contains(&test_key(0, 0)));
        assert!(cache.images.contains(&test_key(0, (fits + 1) as u16)));
    }

    #[test]
    fn remove_face_entries_is_selective() {
        let mut cache = CacheManager::new(CacheLimits::default());
        cache.insert_image(test_key(0, 1), test_image(64), false);
        cache.insert_image(test_key(1, 1), test_image(64), false);
        cache.insert_image(test_key(0, 2), test_image(64), true);
        cache.cmap.put((OpaqueFaceId(0), None, 65), 5);
        cache.cmap.put((OpaqueFaceId(1), None, 65), 9);

        cache.remove_face_entries(OpaqueFaceId(0));

        assert!(!cache.images.contains(&test_key(0, 1)));
        assert!(cache.images.contains(&test_key(1, 1)));
        assert!(!cache.sbits.contains(&test_key(0, 2)));
        assert_eq!(cache.cmap.len(), 1);
        let expected = test_image(64).memory_footprint();
        assert_eq!(cache.stats().image_bytes, expected);
    }

    #[test]
    fn reset_clears_everything_and_byte_count() {
        let mut cache = CacheManager::new(CacheLimits::default());
        cache.insert_image(test_key(0, 1), test_image(64), false);
        cache.insert_image(test_key(0, 2), test_image(64), true);
        cache.cmap.put((OpaqueFaceId(0), None, 65), 5);
        cache.reset();
        let stats = cache.stats();
        assert_eq!(stats.image_count, 0);
        assert_eq!(stats.image_bytes, 0);
        assert_eq!(cache.cmap.len(), 0);
    }
}
