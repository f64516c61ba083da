//! Rendering settings and the cache keys derived from them.
//!
//! Every knob has a backing field, including the ones that historically
//! poked rendering-library global state directly (LCD filter, hinting
//! engine, interpreter version, stem darkening, design coordinates).
//! Mutations never touch the rendering subsystem themselves: each setter
//! records the invalidation level it requires and bumps a generation
//! counter, and `Engine::update()` is the single reconciliation point
//! that pushes the pending changes into the caches.

use crate::face_id::OpaqueFaceId;

/// How a glyph bitmap is ultimately rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// 1-bit style coverage (thresholded alpha).
    Mono,
    /// 8-bit grayscale anti-aliasing.
    Gray,
    /// Horizontal RGB sub-pixel anti-aliasing.
    Lcd,
    /// Vertical sub-pixel anti-aliasing.
    LcdVertical,
}

/// Anti-aliasing target requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AaTarget {
    Normal,
    /// Light hinting: keep outlines faithful, hint vertically only.
    Light,
    Lcd,
    LcdVertical,
}

/// LCD color-fringe filter. A global rendering-library property: changing
/// it invalidates bytes the cache assumes immutable, hence a full reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LcdFilter {
    None,
    Default,
    Light,
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CffHintingEngine {
    Freetype,
    Adobe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtInterpreterVersion {
    V35,
    V38,
    V40,
}

/// The rendering library's compiled-in defaults, queried once at engine
/// construction and immutable thereafter. swash ships a single hinting
/// pipeline, so these mirror its fixed behavior.
#[derive(Debug, Clone, Copy)]
pub struct EngineDefaults {
    pub cff_hinting_engine: CffHintingEngine,
    pub tt_interpreter_version: TtInterpreterVersion,
    pub stem_darkening: bool,
}

impl EngineDefaults {
    pub fn query() -> Self {
        Self {
            cff_hinting_engine: CffHintingEngine::Adobe,
            tt_interpreter_version: TtInterpreterVersion::V40,
            stem_darkening: false,
        }
    }
}

/// Rendering-affecting load options folded into the glyph image key, so a
/// settings change can never surface a stale bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LoadFlags {
    pub hinting: bool,
    pub auto_hinting: bool,
    pub light_hinting: bool,
    pub hint_horizontal: bool,
    pub hint_vertical: bool,
    pub hint_blue_zones: bool,
    pub prefer_embedded_bitmaps: bool,
    pub color_layers: bool,
    pub palette_index: u16,
    pub stem_darkening: bool,
    pub lcd_subpixel_positioning: bool,
}

/// Requested rendering size: face, pixel dimensions in 26.6 fixed point,
/// and resolution. Recomputed whenever DPI or point/pixel size changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scaler {
    pub face_id: OpaqueFaceId,
    /// Pixel width in 26.6 fixed point.
    pub width: u32,
    /// Pixel height in 26.6 fixed point.
    pub height: u32,
    pub dpi: u16,
}

impl Scaler {
    /// Pixel height as a float.
    pub fn height_px(&self) -> f32 {
        self.height as f32 / 64.0
    }
}

/// Cache key space for glyph images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageTypeKey {
    pub scaler: Scaler,
    pub load_flags: LoadFlags,
    pub render_mode: RenderMode,
    /// Digest of the active variation design coordinates. Coordinates
    /// reach the rasterizer, so they must reach the key: a cached image
    /// for one coordinate set can never satisfy a lookup for another,
    /// even across face switches.
    pub coords_digest: u64,
}

/// How much resident state a setting change invalidates. Levels are
/// ordered; `Engine::update()` consumes the highest pending level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Invalidation {
    /// Key space absorbs the change; nothing to drop.
    #[default]
    None,
    /// Re-open the current face and purge its cached images.
    Reload,
    /// Drop every resident object.
    FullReset,
}

/// A variation-axis design coordinate override.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCoord {
    pub tag: [u8; 4],
    pub value: f32,
}

/// All rendering-affecting knobs.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    dpi: u32,
    using_pixel_size: bool,
    point_size: f64,
    pixel_size: f64,

    hinting: bool,
    auto_hinting: bool,
    hint_horizontal: bool,
    hint_vertical: bool,
    hint_blue_zones: bool,
    show_segments: bool,

    anti_aliasing: bool,
    aa_target: AaTarget,
    lcd_filter: LcdFilter,
    lcd_subpixel_positioning: bool,

    embedded_bitmaps: bool,
    color_layers: bool,
    palette_index: u16,

    cff_hinting_engine: CffHintingEngine,
    tt_interpreter_version: TtInterpreterVersion,
    stem_darkening: bool,

    design_coords: Vec<AxisCoord>,

    generation: u64,
    pending: Invalidation,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::with_defaults(&EngineDefaults::query())
    }
}

impl RenderSettings {
    pub fn with_defaults(defaults: &EngineDefaults) -> Self {
        Self {
            dpi: 96,
            using_pixel_size: false,
            point_size: 20.0,
            pixel_size: 20.0 * 96.0 / 72.0,
            hinting: false,
            auto_hinting: false,
            hint_horizontal: false,
            hint_vertical: false,
            hint_blue_zones: false,
            show_segments: false,
            anti_aliasing: true,
            aa_target: AaTarget::Normal,
            lcd_filter: LcdFilter::Default,
            lcd_subpixel_positioning: false,
            embedded_bitmaps: false,
            color_layers: false,
            palette_index: 0,
            cff_hinting_engine: defaults.cff_hinting_engine,
            tt_interpreter_version: defaults.tt_interpreter_version,
            stem_darkening: defaults.stem_darkening,
            design_coords: Vec::new(),
            generation: 0,
            pending: Invalidation::None,
        }
    }

    fn touch(&mut self, level: Invalidation) {
        self.generation += 1;
        self.pending = self.pending.max(level);
    }

    /// Monotonic counter bumped by every mutation; the engine compares it
    /// against the generation it last reconciled.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Highest invalidation level required since the last `take_pending`,
    /// which clears it.
    pub fn take_pending(&mut self) -> Invalidation {
        std::mem::take(&mut self.pending)
    }

    // ---- size ----

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn set_dpi(&mut self, dpi: u32) {
        self.dpi = dpi.max(1);
        // Size mode decides which of point/pixel is authoritative.
        if self.using_pixel_size {
            self.point_size = self.pixel_size * 72.0 / self.dpi as f64;
        } else {
            self.pixel_size = self.point_size * self.dpi as f64 / 72.0;
        }
        self.touch(Invalidation::None);
    }

    pub fn point_size(&self) -> f64 {
        self.point_size
    }

    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    pub fn using_pixel_size(&self) -> bool {
        self.using_pixel_size
    }

    pub fn set_size_by_point(&mut self, point_size: f64) {
        self.point_size = point_size.max(0.0);
        self.pixel_size = self.point_size * self.dpi as f64 / 72.0;
        self.using_pixel_size = false;
        self.touch(Invalidation::None);
    }

    pub fn set_size_by_pixel(&mut self, pixel_size: f64) {
        self.pixel_size = pixel_size.max(0.0);
        self.point_size = self.pixel_size * 72.0 / self.dpi as f64;
        self.using_pixel_size = true;
        self.touch(Invalidation::None);
    }

    // ---- hinting ----

    pub fn hinting(&self) -> bool {
        self.hinting
    }

    pub fn set_hinting(&mut self, hinting: bool) {
        self.hinting = hinting;
        self.touch(Invalidation::None);
    }

    pub fn auto_hinting(&self) -> bool {
        self.auto_hinting
    }

    pub fn set_auto_hinting(&mut self, auto: bool) {
        self.auto_hinting = auto;
        self.touch(Invalidation::None);
    }

    pub fn set_horizontal_hinting(&mut self, on: bool) {
        self.hint_horizontal = on;
        self.touch(Invalidation::None);
    }

    pub fn set_vertical_hinting(&mut self, on: bool) {
        self.hint_vertical = on;
        self.touch(Invalidation::None);
    }

    pub fn set_blue_zone_hinting(&mut self, on: bool) {
        self.hint_blue_zones = on;
        self.touch(Invalidation::None);
    }

    pub fn show_segments(&self) -> bool {
        self.show_segments
    }

    pub fn set_show_segments(&mut self, on: bool) {
        self.show_segments = on;
        self.touch(Invalidation::None);
    }

    // ---- anti-aliasing ----

    pub fn anti_aliasing(&self) -> bool {
        self.anti_aliasing
    }

    pub fn set_anti_aliasing(&mut self, enabled: bool) {
        self.anti_aliasing = enabled;
        self.touch(Invalidation::None);
    }

    pub fn aa_target(&self) -> AaTarget {
        self.aa_target
    }

    pub fn set_aa_target(&mut self, target: AaTarget) {
        self.aa_target = target;
        self.touch(Invalidation::None);
    }

    pub fn lcd_filter(&self) -> LcdFilter {
        self.lcd_filter
    }

    pub fn set_lcd_filter(&mut self, filter: LcdFilter) {
        self.lcd_filter = filter;
        self.touch(Invalidation::FullReset);
    }

    pub fn lcd_subpixel_positioning(&self) -> bool {
        self.lcd_subpixel_positioning
    }

    pub fn set_lcd_subpixel_positioning(&mut self, on: bool) {
        self.lcd_subpixel_positioning = on;
        self.touch(Invalidation::None);
    }

    // ---- bitmaps and color ----

    pub fn embedded_bitmaps(&self) -> bool {
        self.embedded_bitmaps
    }

    pub fn set_embedded_bitmaps(&mut self, enabled: bool) {
        self.embedded_bitmaps = enabled;
        self.touch(Invalidation::None);
    }

    pub fn color_layers(&self) -> bool {
        self.color_layers
    }

    pub fn set_color_layers(&mut self, enabled: bool) {
        self.color_layers = enabled;
        self.touch(Invalidation::None);
    }

    pub fn palette_index(&self) -> u16 {
        self.palette_index
    }

    pub fn set_palette_index(&mut self, index: u16) {
        self.palette_index = index;
        self.touch(Invalidation::None);
    }

    // ---- engine selection ----

    pub fn cff_hinting_engine(&self) -> CffHintingEngine {
        self.cff_hinting_engine
    }

    pub fn set_cff_hinting_engine(&mut self, engine: CffHintingEngine) {
        self.cff_hinting_engine = engine;
        self.touch(Invalidation::FullReset);
    }

    pub fn tt_interpreter_version(&self) -> TtInterpreterVersion {
        self.tt_interpreter_version
    }

    pub fn set_tt_interpreter_version(&mut self, version: TtInterpreterVersion) {
        self.tt_interpreter_version = version;
        self.touch(Invalidation::FullReset);
    }

    pub fn stem_darkening(&self) -> bool {
        self.stem_darkening
    }

    pub fn set_stem_darkening(&mut self, darkening: bool) {
        self.stem_darkening = darkening;
        self.touch(Invalidation::Reload);
    }

    // ---- variations ----

    pub fn design_coords(&self) -> &[AxisCoord] {
        &self.design_coords
    }

    pub fn set_design_coords(&mut self, coords: Vec<AxisCoord>) {
        self.design_coords = coords;
        self.touch(Invalidation::Reload);
    }

    // ---- clamped effective values ----
    //
    // Inconsistent combinations are never surfaced: queries clamp to the
    // nearest valid combination.

    /// Stem darkening only applies with the Adobe CFF engine.
    pub fn effective_stem_darkening(&self) -> bool {
        self.stem_darkening && self.cff_hinting_engine == CffHintingEngine::Adobe
    }

    /// Interpreter v38 is the sub-pixel interpreter; without an LCD target
    /// it clamps to v40.
    pub fn effective_tt_interpreter_version(&self) -> TtInterpreterVersion {
        match (self.tt_interpreter_version, self.aa_target) {
            (TtInterpreterVersion::V38, AaTarget::Lcd | AaTarget::LcdVertical) => {
                TtInterpreterVersion::V38
            }
            (TtInterpreterVersion::V38, _) => TtInterpreterVersion::V40,
            (v, _) => v,
        }
    }

    // ---- derived keys ----

    pub fn render_mode(&self) -> RenderMode {
        if !self.anti_aliasing {
            return RenderMode::Mono;
        }
        match self.aa_target {
            AaTarget::Normal | AaTarget::Light => RenderMode::Gray,
            AaTarget::Lcd => RenderMode::Lcd,
            AaTarget::LcdVertical => RenderMode::LcdVertical,
        }
    }

    pub fn load_flags(&self) -> LoadFlags {
        LoadFlags {
            hinting: self.hinting,
            auto_hinting: self.auto_hinting,
            light_hinting: self.aa_target == AaTarget::Light,
            hint_horizontal: self.hint_horizontal,
            hint_vertical: self.hint_vertical,
            hint_blue_zones: self.hint_blue_zones,
            prefer_embedded_bitmaps: self.embedded_bitmaps,
            color_layers: self.color_layers,
            palette_index: self.palette_index,
            stem_darkening: self.effective_stem_darkening(),
            lcd_subpixel_positioning: self.lcd_subpixel_positioning,
        }
    }

    pub fn scaler(&self, face_id: OpaqueFaceId) -> Scaler {
        let fixed = (self.pixel_size * 64.0).round().max(0.0) as u32;
        Scaler {
            face_id,
            width: fixed,
            height: fixed,
            dpi: self.dpi.min(u16::MAX as u32) as u16,
        }
    }

    pub fn image_type_key(&self, face_id: OpaqueFaceId) -> ImageTypeKey {
        ImageTypeKey {
            scaler: self.scaler(face_id),
            load_flags: self.load_flags(),
            render_mode: self.render_mode(),
            coords_digest: coords_digest(&self.design_coords),
        }
    }
}

/// Order-sensitive digest of a coordinate list, using the bit patterns of
/// the values so equal coordinate sets always digest equally.
fn coords_digest(coords: &[AxisCoord]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for coord in coords {
        coord.tag.hash(&mut hasher);
        coord.value.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}
