//! The engine: one object owning the registry, the font files, the cache
//! and the rendering context.
//!
//! Single-threaded and synchronous by design; every operation completes
//! on the caller's thread. Construct exactly one per consumer and
//! serialize access externally. Handles returned from glyph loads must
//! not be retained across a settings update, reload or font removal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{CacheLimits, CacheManager, FaceRequester, SizeMetrics};
use crate::error::{FontOpenError, GlyphLoadError};
use crate::face::CachedFace;
use crate::face_id::{FaceId, FaceIdRegistry, OpaqueFaceId};
use crate::font_files::FontFileManager;
use crate::font_info::FontInfo;
use crate::render::{outline_into_slot, GlyphImage, GlyphSlot, Rasterizer};
use crate::settings::{
    EngineDefaults, ImageTypeKey, Invalidation, RenderSettings, Scaler,
};
use crate::sfnt;

/// Requester handed to the cache: resolves an opaque id back to its
/// triplet and opens the face from the byte source. Deterministic, so a
/// rematerialized face is equivalent to the evicted one.
struct EngineRequester<'a> {
    registry: &'a FaceIdRegistry,
    files: &'a FontFileManager,
}

impl FaceRequester for EngineRequester<'_> {
    fn request_face(&self, id: OpaqueFaceId) -> Result<CachedFace, FontOpenError> {
        let triplet = self
            .registry
            .reverse_lookup(id)
            .ok_or(FontOpenError::UnknownFaceId(id.0))?;
        let data = self.files.data(triplet.font_index)?;
        CachedFace::open(data, triplet.face_index, triplet.named_instance_index)
    }
}

/// Everything tied to the currently loaded face. Replaced atomically on
/// every load/reload; partial updates are never observable.
struct CurrentFont {
    triplet: FaceId,
    id: OpaqueFaceId,
    info: FontInfo,
    palette: Vec<[u8; 4]>,
    palette_index: u16,
    scaler: Scaler,
    image_key: ImageTypeKey,
    /// `None` means valid-but-not-render-ready (no usable size).
    size: Option<Arc<SizeMetrics>>,
    /// Settings generation this state was derived from.
    generation: u64,
}

/// The font engine.
pub struct Engine {
    registry: FaceIdRegistry,
    files: FontFileManager,
    cache: CacheManager,
    rasterizer: Rasterizer,
    settings: RenderSettings,
    defaults: EngineDefaults,
    current: Option<CurrentFont>,
    slot: GlyphSlot,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_limits(CacheLimits::default())
    }

    pub fn with_limits(limits: CacheLimits) -> Self {
        let defaults = EngineDefaults::query();
        Self {
            registry: FaceIdRegistry::new(),
            files: FontFileManager::new(),
            cache: CacheManager::new(limits),
            rasterizer: Rasterizer::new(),
            settings: RenderSettings::with_defaults(&defaults),
            defaults,
            current: None,
            slot: GlyphSlot::default(),
        }
    }

    /// Version string of the rendering stack, for display only.
    pub fn library_version() -> &'static str {
        concat!("swash scaler (", env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"), ")")
    }

    /// The rendering library's compiled-in defaults.
    pub fn engine_defaults(&self) -> EngineDefaults {
        self.defaults
    }

    // ---- font file management ----

    /// Open a font file from disk; returns its font index.
    pub fn open_font_file(&mut self, path: &Path) -> anyhow::Result<usize> {
        self.files.open_file(path)
    }

    /// Open many font files; failures are logged and skipped. Returns the
    /// number opened.
    pub fn open_font_files(&mut self, paths: &[PathBuf]) -> usize {
        self.files.open_files(paths)
    }

    /// Open font bytes already in memory; returns the font index.
    pub fn open_font_memory(&mut self, data: Vec<u8>, label: &str) -> usize {
        self.files.open_memory(data, label)
    }

    /// Locate a family through the system font database and open it.
    pub fn open_system_family(&mut self, family: &str) -> anyhow::Result<usize> {
        self.files.open_system_family(family)
    }

    /// Close a font. Its index is retired, its cache entries are dropped,
    /// and if it was the active font the engine becomes unloaded. Opaque
    /// ids issued for it stay registered; later lookups through them fail
    /// cleanly in the requester.
    pub fn remove_font(&mut self, font_index: usize) -> bool {
        if !self.files.remove(font_index) {
            return false;
        }
        for id in self.registry.ids_for_font(font_index) {
            self.cache.remove_face_entries(id);
        }
        if self
            .current
            .as_ref()
            .is_some_and(|c| c.triplet.font_index == font_index)
        {
            self.current = None;
        }
        true
    }

    /// Number of fonts currently open.
    pub fn font_count(&self) -> usize {
        self.files.open_count()
    }

    pub fn is_font_open(&self, font_index: usize) -> bool {
        self.files.is_open(font_index)
    }

    /// Display label of an open font.
    pub fn font_label(&self, font_index: usize) -> Option<&str> {
        self.files.get(font_index).map(|f| f.label())
    }

    pub fn font_path(&self, font_index: usize) -> Option<&Path> {
        self.files.get(font_index).and_then(|f| f.path())
    }

    /// Poll every open file for on-disk changes and re-read the changed
    /// ones. Resident caches referencing stale bytes are dropped and the
    /// active font reloaded. Returns true if anything changed.
    pub fn refresh_changed_files(&mut self) -> bool {
        let mut changed = false;
        for index in 0..self.files.index_limit() {
            match self.files.reload_if_changed(index) {
                Ok(true) => changed = true,
                Ok(false) => {}
                Err(e) => log::warn!("reload of font {index} failed: {e:#}"),
            }
        }
        if changed {
            self.cache.reset();
            self.reload_current();
        }
        changed
    }

    // ---- font loading ----

    /// Load a face by triplet, atomically replacing the current-state
    /// view. Returns the face's glyph count. On failure the current state
    /// is cleared and the engine reports unloaded.
    pub fn load_font(
        &mut self,
        font_index: usize,
        face_index: u32,
        named_instance_index: u16,
    ) -> Result<u16, FontOpenError> {
        let triplet = FaceId::new(font_index, face_index, named_instance_index);
        let id = self.registry.get_or_create(triplet);
        let requester = EngineRequester {
            registry: &self.registry,
            files: &self.files,
        };
        let face = match self.cache.face(id, &requester) {
            Ok(face) => face,
            Err(e) => {
                log::warn!("load of font {font_index} face {face_index} failed: {e}");
                self.current = None;
                return Err(e);
            }
        };

        let info = FontInfo::from_face(&face, font_index);
        let palette_index = self.settings.palette_index();
        let palette = sfnt::palette_colors(face.data(), face_index, palette_index);

        let scaler = self.settings.scaler(id);
        let image_key = self.settings.image_type_key(id);
        let size = match self.cache.size(&scaler, &requester) {
            Ok(size) => size,
            Err(e) => {
                self.current = None;
                return Err(e);
            }
        };
        if size.is_none() {
            log::info!(
                "font '{}' has no usable size at {:.1}px (fixed sizes: {:?})",
                info.family_name(),
                scaler.height_px(),
                info.fixed_sizes()
            );
        }

        let glyph_count = info.glyph_count();
        self.current = Some(CurrentFont {
            triplet,
            id,
            info,
            palette,
            palette_index,
            scaler,
            image_key,
            size,
            generation: self.settings.generation(),
        });
        Ok(glyph_count)
    }

    /// Re-derive the face and current state for the same triplet. Used
    /// when a face-local property changed without changing which font is
    /// selected. A no-op returning 0 when nothing is loaded.
    pub fn reload_font(&mut self) -> Result<u16, FontOpenError> {
        let Some(triplet) = self.current.as_ref().map(|c| c.triplet) else {
            return Ok(0);
        };
        self.load_font(
            triplet.font_index,
            triplet.face_index,
            triplet.named_instance_index,
        )
    }

    /// Recompute the resolved palette colors for the active font and the
    /// current palette index.
    pub fn load_palette(&mut self) {
        let Some((font_index, face_index)) = self
            .current
            .as_ref()
            .map(|c| (c.triplet.font_index, c.triplet.face_index))
        else {
            return;
        };
        let Ok(data) = self.files.data(font_index) else {
            return;
        };
        let palette_index = self.settings.palette_index();
        if let Some(cur) = self.current.as_mut() {
            cur.palette = sfnt::palette_colors(&data, face_index, palette_index);
            cur.palette_index = palette_index;
        }
    }

    // ---- reconciliation ----

    /// Push pending settings changes into the caches. The sole
    /// reconciliation point: call after any setting mutation and before
    /// the next glyph load.
    pub fn update(&mut self) {
        match self.settings.take_pending() {
            Invalidation::FullReset => {
                self.cache.reset();
                self.reload_current();
            }
            Invalidation::Reload => {
                // Face-local change: drop the face and its derived
                // entries, keep the rest of the cache warm.
                if let Some(id) = self.current.as_ref().map(|c| c.id) {
                    self.cache.remove_face_entries(id);
                }
                self.reload_current();
            }
            Invalidation::None => self.refresh_derived(),
        }
    }

    /// Drop every resident cache object. Identity and current-state
    /// survive; subsequent loads regenerate transparently.
    pub fn reset_cache(&mut self) {
        self.cache.reset();
    }

    /// Restore every setting to the rendering library's defaults and
    /// flush the caches.
    pub fn load_defaults(&mut self) {
        self.settings = RenderSettings::with_defaults(&self.defaults);
        self.cache.reset();
        self.reload_current();
    }

    fn reload_current(&mut self) {
        if self.current.is_some() {
            if let Err(e) = self.reload_font() {
                log::warn!("reload of current font failed: {e}");
            }
        }
    }

    /// Recompute scaler/key/size/palette from settings without dropping
    /// cache state.
    fn refresh_derived(&mut self) {
        let Some((id, triplet)) = self.current.as_ref().map(|c| (c.id, c.triplet)) else {
            return;
        };
        let requester = EngineRequester {
            registry: &self.registry,
            files: &self.files,
        };
        let scaler = self.settings.scaler(id);
        let size = match self.cache.size(&scaler, &requester) {
            Ok(size) => size,
            Err(e) => {
                log::warn!("size resolution failed: {e}");
                None
            }
        };
        let image_key = self.settings.image_type_key(id);
        let palette_index = self.settings.palette_index();
        let generation = self.settings.generation();
        let palette = if self
            .current
            .as_ref()
            .is_some_and(|c| c.palette_index != palette_index)
        {
            self.files
                .data(triplet.font_index)
                .map(|data| sfnt::palette_colors(&data, triplet.face_index, palette_index))
                .ok()
        } else {
            None
        };
        if let Some(cur) = self.current.as_mut() {
            cur.scaler = scaler;
            cur.image_key = image_key;
            cur.size = size;
            cur.generation = generation;
            if let Some(palette) = palette {
                cur.palette = palette;
                cur.palette_index = palette_index;
            }
        }
    }

    // ---- glyph loading ----

    /// Load a glyph image through the cache, re-resolving the size
    /// context first. Returns `None` when no font is loaded, the size is
    /// unusable, or the glyph produced no image.
    pub fn load_glyph(&mut self, glyph_index: u16) -> Option<Arc<GlyphImage>> {
        if !self.glyph_index_in_range(glyph_index) {
            return None;
        }
        if self.stale() {
            log::debug!("glyph load with unreconciled settings; call update() first");
        }
        match self.glyph_image_checked(glyph_index, true) {
            Ok(image) => Some(image),
            Err(e) => {
                log_glyph_error(glyph_index, &e);
                None
            }
        }
    }

    /// Fast path for callers certain that size and settings are unchanged
    /// since the last `update()`: skips size re-resolution. The returned
    /// `Arc` is the cache-node handle; dropping it releases the node.
    pub fn load_glyph_without_update(&mut self, glyph_index: u16) -> Option<Arc<GlyphImage>> {
        if !self.glyph_index_in_range(glyph_index) {
            return None;
        }
        match self.glyph_image_checked(glyph_index, false) {
            Ok(image) => Some(image),
            Err(e) => {
                log_glyph_error(glyph_index, &e);
                None
            }
        }
    }

    /// Load an embedded bitmap strike for a glyph through the
    /// bitmap-specific cache pool.
    pub fn load_embedded_bitmap(&mut self, glyph_index: u16) -> Option<Arc<GlyphImage>> {
        if !self.glyph_index_in_range(glyph_index) {
            return None;
        }
        let key = self.current.as_ref()?.image_key;
        let requester = EngineRequester {
            registry: &self.registry,
            files: &self.files,
        };
        match self
            .cache
            .bitmap_glyph(&key, glyph_index, &mut self.rasterizer, &requester)
        {
            Ok(Some(image)) => Some(image),
            Ok(None) => {
                log_glyph_error(glyph_index, &GlyphLoadError::NoImage(glyph_index));
                None
            }
            Err(e) => {
                log_glyph_error(glyph_index, &e);
                None
            }
        }
    }

    /// Out-of-range glyph indices are a caller contract violation:
    /// asserted in debug builds, folded to a `None` load in release.
    fn glyph_index_in_range(&self, glyph_index: u16) -> bool {
        let Some(glyph_count) = self.current.as_ref().map(|c| c.info.glyph_count()) else {
            return false;
        };
        debug_assert!(
            glyph_index < glyph_count,
            "glyph index {glyph_index} out of range (count {glyph_count})"
        );
        glyph_index < glyph_count
    }

    /// Typed core of the cached glyph paths; the public loaders fold
    /// these errors to `None`. `resolve_size` re-resolves the size
    /// context through the cache; the fast path instead trusts the
    /// residency recorded at the last reconciliation.
    fn glyph_image_checked(
        &mut self,
        glyph_index: u16,
        resolve_size: bool,
    ) -> Result<Arc<GlyphImage>, GlyphLoadError> {
        let (key, has_size) = {
            let cur = self.current.as_ref().ok_or(GlyphLoadError::NoSizeContext)?;
            (cur.image_key, cur.size.is_some())
        };
        let requester = EngineRequester {
            registry: &self.registry,
            files: &self.files,
        };
        if resolve_size {
            if self.cache.size(&key.scaler, &requester)?.is_none() {
                return Err(GlyphLoadError::NoSizeContext);
            }
        } else if !has_size {
            return Err(GlyphLoadError::NoSizeContext);
        }
        self.cache
            .glyph_image(
                &key,
                glyph_index,
                self.settings.design_coords(),
                &mut self.rasterizer,
                &requester,
            )?
            .ok_or(GlyphLoadError::NoImage(glyph_index))
    }

    /// Bypass the cache entirely and extract the glyph outline into the
    /// engine's single shared slot, for transient raw-segment inspection.
    /// `no_scale` yields unscaled font-unit coordinates. The slot is
    /// overwritten by every call.
    pub fn load_glyph_into_slot_without_cache(
        &mut self,
        glyph_index: u16,
        no_scale: bool,
    ) -> Option<&GlyphSlot> {
        let (triplet, px) = {
            let cur = self.current.as_ref()?;
            (cur.triplet, cur.scaler.height_px())
        };
        let data = self.files.data(triplet.font_index).ok()?;
        // Fresh parse on purpose: this path is uncached by definition and
        // must reflect the exact current variation coordinates.
        let mut face = ttf_parser::Face::parse(&data, triplet.face_index).ok()?;
        if triplet.named_instance_index > 0 {
            let (axes, instances) = sfnt::variation_info(&data, triplet.face_index);
            if let Some(instance) = instances.get(triplet.named_instance_index as usize - 1) {
                for (axis, &value) in axes.iter().zip(&instance.coordinates) {
                    let _ = face.set_variation(ttf_parser::Tag::from_bytes(&axis.tag), value);
                }
            }
        }
        for coord in self.settings.design_coords() {
            let _ = face.set_variation(ttf_parser::Tag::from_bytes(&coord.tag), coord.value);
        }
        let upem = face.units_per_em();
        let scale = if no_scale || upem == 0 {
            1.0
        } else {
            px / upem as f32
        };
        let slot = outline_into_slot(&face, glyph_index, scale, no_scale)?;
        self.slot = slot;
        Some(&self.slot)
    }

    // ---- state predicates ----

    /// A font is loaded (metadata queries work). Weaker than
    /// [`render_ready`](Self::render_ready).
    pub fn font_valid(&self) -> bool {
        self.current.is_some()
    }

    /// Glyphs can actually be rasterized at the current size. Bitmap-only
    /// fonts are render-ready only when the pixel size matches one of
    /// their fixed strikes.
    pub fn render_ready(&self) -> bool {
        self.current.as_ref().is_some_and(|c| c.size.is_some())
    }

    /// True when settings changed since the last reconciliation.
    pub fn stale(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|c| c.generation != self.settings.generation())
    }

    // ---- current-state queries ----

    /// Metadata snapshot of the active font.
    pub fn font_info(&self) -> Option<&FontInfo> {
        self.current.as_ref().map(|c| &c.info)
    }

    pub fn current_font_index(&self) -> Option<usize> {
        self.current.as_ref().map(|c| c.triplet.font_index)
    }

    pub fn current_face_index(&self) -> Option<u32> {
        self.current.as_ref().map(|c| c.triplet.face_index)
    }

    pub fn current_named_instance_index(&self) -> Option<u16> {
        self.current.as_ref().map(|c| c.triplet.named_instance_index)
    }

    /// Resolved RGBA colors of the active palette.
    pub fn current_palette(&self) -> &[[u8; 4]] {
        self.current.as_ref().map_or(&[], |c| c.palette.as_slice())
    }

    /// Metrics of the active size, when render-ready.
    pub fn size_metrics(&self) -> Option<SizeMetrics> {
        self.current.as_ref()?.size.as_deref().copied()
    }

    /// PostScript-style name of a glyph in the active font.
    pub fn glyph_name(&mut self, glyph_index: u16) -> Option<String> {
        let id = self.current.as_ref()?.id;
        let requester = EngineRequester {
            registry: &self.registry,
            files: &self.files,
        };
        let face = self.cache.face(id, &requester).ok()?;
        face.parser()
            .glyph_name(ttf_parser::GlyphId(glyph_index))
            .map(str::to_string)
    }

    /// Character code to glyph index through the cached charmap.
    /// `charmap_index` selects a specific cmap subtable; `None` uses the
    /// default unicode charmap. 0 means unmapped.
    pub fn glyph_index_from_char_code(&mut self, code: u32, charmap_index: Option<u16>) -> u16 {
        let Some(id) = self.current.as_ref().map(|c| c.id) else {
            return 0;
        };
        let requester = EngineRequester {
            registry: &self.registry,
            files: &self.files,
        };
        match self
            .cache
            .glyph_index_for_char(id, charmap_index, code, &requester)
        {
            Ok(glyph) => glyph,
            Err(e) => {
                log::warn!("charmap lookup failed: {e}");
                0
            }
        }
    }

    // ---- per-font queries (no load required) ----

    /// Number of faces in an open font file (TTC-aware).
    pub fn number_of_faces(&self, font_index: usize) -> Option<u32> {
        let data = self.files.data(font_index).ok()?;
        Some(sfnt::face_count(&data))
    }

    /// Number of named variation instances of a face. 0 for non-variable
    /// faces.
    pub fn number_of_named_instances(&self, font_index: usize, face_index: u32) -> Option<u16> {
        let data = self.files.data(font_index).ok()?;
        let (_, instances) = sfnt::variation_info(&data, face_index);
        Some(instances.len() as u16)
    }

    /// Display name of named instance `n` (1-based) of a face.
    pub fn named_instance_name(
        &self,
        font_index: usize,
        face_index: u32,
        n: u16,
    ) -> Option<String> {
        let data = self.files.data(font_index).ok()?;
        let (_, instances) = sfnt::variation_info(&data, face_index);
        let instance = instances.get(n.checked_sub(1)? as usize)?;
        let face = ttf_parser::Face::parse(&data, face_index).ok()?;
        let mut best: Option<(u8, String)> = None;
        for name in face.names() {
            if name.name_id != instance.name_id {
                continue;
            }
            let Some(value) = name.to_string() else {
                continue;
            };
            let rank = match name.platform_id {
                ttf_parser::PlatformId::Windows => 0,
                ttf_parser::PlatformId::Unicode => 1,
                _ => 2,
            };
            if best.as_ref().map_or(true, |(r, _)| rank < *r) {
                best = Some((rank, value));
            }
        }
        best.map(|(_, v)| v)
    }

    // ---- settings and diagnostics ----

    /// Read access to the settings controller.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Mutable access to the settings controller. Mutations record their
    /// invalidation requirement; call [`update`](Self::update) afterwards
    /// to reconcile.
    pub fn settings_mut(&mut self) -> &mut RenderSettings {
        &mut self.settings
    }

    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.stats()
    }

    pub fn cache_limits(&self) -> CacheLimits {
        self.cache.limits()
    }

    /// Number of opaque face ids ever issued.
    pub fn registered_face_count(&self) -> usize {
        self.registry.len()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache-chain failures are worth a warning; a glyph that simply has
/// nothing to render (or no usable size) is routine.
fn log_glyph_error(glyph_index: u16, err: &GlyphLoadError) {
    match err {
        GlyphLoadError::FaceUnavailable(_) => {
            log::warn!("glyph {glyph_index} load failed: {err}");
        }
        _ => log::debug!("glyph {glyph_index} not loaded: {err}"),
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("fonts", &self.files.open_count())
            .field("registered_faces", &self.registry.len())
            .field("font_valid", &self.font_valid())
            .field("render_ready", &self.render_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_of_unparseable_font_clears_state() {
        let mut engine = Engine::new();
        let idx = engine.open_font_memory(vec![0u8; 64], "junk");
        let err = engine.load_font(idx, 0, 0).unwrap_err();
        assert!(matches!(err, FontOpenError::Parse(_)));
        assert!(!engine.font_valid());
        assert!(!engine.render_ready());
    }

    #[test]
    fn load_of_unknown_font_index_fails() {
        let mut engine = Engine::new();
        assert!(matches!(
            engine.load_font(42, 0, 0),
            Err(FontOpenError::UnknownFont(42))
        ));
    }

    #[test]
    fn remove_unknown_font_is_a_noop() {
        let mut engine = Engine::new();
        assert!(!engine.remove_font(0));
    }

    #[test]
    fn glyph_loads_without_a_font_return_none() {
        let mut engine = Engine::new();
        assert!(engine.load_glyph_without_update(0).is_none());
        assert!(engine
            .load_glyph_into_slot_without_cache(0, false)
            .is_none());
        assert_eq!(engine.glyph_index_from_char_code('A' as u32, None), 0);
    }

    #[test]
    fn update_and_reload_without_a_font_do_not_panic() {
        let mut engine = Engine::new();
        engine.settings_mut().set_anti_aliasing(false);
        engine.update();
        assert_eq!(engine.reload_font().unwrap(), 0);
        engine.load_defaults();
        assert!(!engine.font_valid());
    }

    #[test]
    fn removed_font_ids_stay_registered() {
        let mut engine = Engine::new();
        let idx = engine.open_font_memory(vec![0u8; 64], "junk");
        let _ = engine.load_font(idx, 0, 0);
        let registered = engine.registered_face_count();
        assert_eq!(registered, 1);
        engine.remove_font(idx);
        assert_eq!(engine.registered_face_count(), registered);
    }

    #[test]
    fn library_version_is_populated() {
        assert!(Engine::library_version().contains("swash"));
    }

    /// Assemble a minimal SFNT from raw tables, directory sorted by tag.
    fn build_sfnt(tables: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
        let num = tables.len() as u16;
        let mut font = Vec::new();
        font.extend_from_slice(&0x00010000u32.to_be_bytes());
        font.extend_from_slice(&num.to_be_bytes());
        font.extend_from_slice(&[0; 6]);
        let mut offset = 12 + 16 * tables.len() as u32;
        for (tag, body) in tables {
            font.extend_from_slice(tag);
            font.extend_from_slice(&0u32.to_be_bytes()); // checksum unused here
            font.extend_from_slice(&offset.to_be_bytes());
            font.extend_from_slice(&(body.len() as u32).to_be_bytes());
            offset += (body.len() as u32 + 3) & !3;
        }
        for (_, body) in tables {
            font.extend_from_slice(body);
            while font.len() % 4 != 0 {
                font.push(0);
            }
        }
        font
    }

    fn head_table() -> Vec<u8> {
        let mut head = Vec::new();
        head.extend_from_slice(&0x00010000u32.to_be_bytes()); // version
        head.extend_from_slice(&0u32.to_be_bytes()); // fontRevision
        head.extend_from_slice(&0u32.to_be_bytes()); // checkSumAdjustment
        head.extend_from_slice(&0x5F0F3CF5u32.to_be_bytes()); // magic
        head.extend_from_slice(&0u16.to_be_bytes()); // flags
        head.extend_from_slice(&1000u16.to_be_bytes()); // unitsPerEm
        head.extend_from_slice(&[0; 16]); // created + modified
        head.extend_from_slice(&[0; 8]); // bbox
        head.extend_from_slice(&0u16.to_be_bytes()); // macStyle
        head.extend_from_slice(&8u16.to_be_bytes()); // lowestRecPPEM
        head.extend_from_slice(&2i16.to_be_bytes()); // fontDirectionHint
        head.extend_from_slice(&0i16.to_be_bytes()); // indexToLocFormat
        head.extend_from_slice(&0i16.to_be_bytes()); // glyphDataFormat
        head
    }

    fn hhea_table() -> Vec<u8> {
        let mut hhea = Vec::new();
        hhea.extend_from_slice(&0x00010000u32.to_be_bytes());
        hhea.extend_from_slice(&800i16.to_be_bytes()); // ascender
        hhea.extend_from_slice(&(-200i16).to_be_bytes()); // descender
        hhea.extend_from_slice(&0i16.to_be_bytes()); // lineGap
        hhea.extend_from_slice(&500u16.to_be_bytes()); // advanceWidthMax
        hhea.extend_from_slice(&[0; 6]); // min bearings, extent
        hhea.extend_from_slice(&1i16.to_be_bytes()); // caretSlopeRise
        hhea.extend_from_slice(&[0; 12]); // slope run, offset, reserved
        hhea.extend_from_slice(&0i16.to_be_bytes()); // metricDataFormat
        hhea.extend_from_slice(&1u16.to_be_bytes()); // numberOfHMetrics
        hhea
    }

    fn maxp_table() -> Vec<u8> {
        let mut maxp = Vec::new();
        maxp.extend_from_slice(&0x00005000u32.to_be_bytes());
        maxp.extend_from_slice(&1u16.to_be_bytes()); // numGlyphs
        maxp
    }

    /// A parseable variable font skeleton with one "Bold" named instance.
    fn variable_test_font() -> Vec<u8> {
        // One Windows/UTF-16BE record: name id 257 = "Bold".
        let bold_utf16: Vec<u8> = "Bold".encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        let mut name = Vec::new();
        name.extend_from_slice(&0u16.to_be_bytes()); // format
        name.extend_from_slice(&1u16.to_be_bytes()); // count
        name.extend_from_slice(&18u16.to_be_bytes()); // stringOffset
        name.extend_from_slice(&3u16.to_be_bytes()); // platform: Windows
        name.extend_from_slice(&1u16.to_be_bytes()); // encoding: UTF-16BE
        name.extend_from_slice(&0x409u16.to_be_bytes()); // language
        name.extend_from_slice(&257u16.to_be_bytes()); // name id
        name.extend_from_slice(&(bold_utf16.len() as u16).to_be_bytes());
        name.extend_from_slice(&0u16.to_be_bytes()); // string offset
        name.extend_from_slice(&bold_utf16);

        let mut fvar = Vec::new();
        fvar.extend_from_slice(&1u16.to_be_bytes()); // major
        fvar.extend_from_slice(&0u16.to_be_bytes()); // minor
        fvar.extend_from_slice(&16u16.to_be_bytes()); // axesArrayOffset
        fvar.extend_from_slice(&0u16.to_be_bytes()); // reserved
        fvar.extend_from_slice(&1u16.to_be_bytes()); // axisCount
        fvar.extend_from_slice(&20u16.to_be_bytes()); // axisSize
        fvar.extend_from_slice(&1u16.to_be_bytes()); // instanceCount
        fvar.extend_from_slice(&8u16.to_be_bytes()); // instanceSize
        fvar.extend_from_slice(b"wght");
        for v in [100.0f32, 400.0, 900.0] {
            fvar.extend_from_slice(&(((v * 65536.0) as i32) as u32).to_be_bytes());
        }
        fvar.extend_from_slice(&0u16.to_be_bytes()); // axis flags
        fvar.extend_from_slice(&256u16.to_be_bytes()); // axis name id
        fvar.extend_from_slice(&257u16.to_be_bytes()); // instance name id
        fvar.extend_from_slice(&0u16.to_be_bytes()); // instance flags
        fvar.extend_from_slice(&(((700.0f32 * 65536.0) as i32) as u32).to_be_bytes());

        build_sfnt(&[
            (*b"fvar", fvar),
            (*b"head", head_table()),
            (*b"hhea", hhea_table()),
            (*b"maxp", maxp_table()),
            (*b"name", name),
        ])
    }

    /// A strike list and no outline tables: glyphs exist but can only
    /// render at the one fixed ppem.
    fn bitmap_only_test_font() -> Vec<u8> {
        let mut eblc = Vec::new();
        eblc.extend_from_slice(&0x00020000u32.to_be_bytes()); // version
        eblc.extend_from_slice(&1u32.to_be_bytes()); // numSizes
        let mut record = [0u8; 48];
        record[44] = 16; // ppemX
        record[45] = 16; // ppemY
        eblc.extend_from_slice(&record);
        build_sfnt(&[
            (*b"EBLC", eblc),
            (*b"head", head_table()),
            (*b"hhea", hhea_table()),
            (*b"maxp", maxp_table()),
        ])
    }

    #[test]
    fn bitmap_only_font_becomes_render_ready_at_strike_size() {
        let mut engine = Engine::new();
        let idx = engine.open_font_memory(bitmap_only_test_font(), "bitmap");
        engine.load_font(idx, 0, 0).unwrap();

        assert!(engine.font_valid());
        assert!(
            !engine.render_ready(),
            "default size matches no fixed strike"
        );
        let info = engine.font_info().unwrap();
        assert!(info.is_bitmap_only());
        assert_eq!(info.fixed_sizes(), &[16]);

        engine.settings_mut().set_size_by_pixel(16.0);
        engine.update();
        assert!(engine.render_ready());

        engine.settings_mut().set_size_by_pixel(17.0);
        engine.update();
        assert!(!engine.render_ready());
    }

    #[test]
    fn glyph_load_errors_fold_to_none() {
        let mut engine = Engine::new();
        let idx = engine.open_font_memory(bitmap_only_test_font(), "bitmap");
        engine.load_font(idx, 0, 0).unwrap();

        // No strike matches the default size.
        assert!(matches!(
            engine.glyph_image_checked(0, true),
            Err(GlyphLoadError::NoSizeContext)
        ));
        assert!(engine.load_glyph(0).is_none());
        assert!(engine.load_glyph_without_update(0).is_none());

        engine.settings_mut().set_size_by_pixel(16.0);
        engine.update();
        // Usable size, but nothing behind the glyph to materialize.
        assert!(matches!(
            engine.glyph_image_checked(0, true),
            Err(GlyphLoadError::NoImage(0))
        ));
        assert!(engine.load_glyph(0).is_none());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_embedded_bitmap_is_a_contract_violation() {
        let mut engine = Engine::new();
        let idx = engine.open_font_memory(bitmap_only_test_font(), "bitmap");
        engine.load_font(idx, 0, 0).unwrap();
        engine.load_embedded_bitmap(5);
    }

    #[test]
    fn named_instance_queries_resolve_without_loading() {
        let mut engine = Engine::new();
        let idx = engine.open_font_memory(variable_test_font(), "var");
        assert_eq!(engine.number_of_faces(idx), Some(1));
        assert_eq!(engine.number_of_named_instances(idx, 0), Some(1));
        assert_eq!(
            engine.named_instance_name(idx, 0, 1).as_deref(),
            Some("Bold")
        );
        assert_eq!(engine.named_instance_name(idx, 0, 2), None);
        assert_eq!(engine.named_instance_name(idx, 0, 0), None);
    }
}
