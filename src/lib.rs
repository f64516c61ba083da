//! Font face and glyph caching engine.
//!
//! This crate provides:
//! - Font file management with stable font indices and system font discovery
//! - An append-only registry mapping (font, face, named instance) triplets
//!   to stable opaque ids
//! - A bounded-memory LRU cache over resident faces, sizes, glyph images,
//!   embedded bitmaps and charmap lookups, with transparent regeneration
//!   on eviction
//! - A settings controller deriving the active scaler and image-type key,
//!   with explicit invalidation via `Engine::update()`
//! - Glyph materialization through swash, plus an uncached outline slot
//!   path for raw segment inspection
//!
//! # Architecture
//!
//! The [`Engine`] is the single entry point. It owns the registry, the
//! font byte sources, the cache manager and the rendering context, and it
//! keeps a read-only current-state snapshot ([`FontInfo`]) of the active
//! font that is atomically replaced on every load or reload. All
//! operations are synchronous and single-threaded; callers serialize
//! access externally.

pub mod cache;
pub mod engine;
pub mod error;
pub mod face;
pub mod face_id;
pub mod font_files;
pub mod font_info;
pub mod render;
pub mod settings;
pub mod sfnt;

// Re-export main public types
pub use cache::{CacheLimits, CacheManager, CacheStats, FaceRequester, SizeMetrics};
pub use engine::Engine;
pub use error::{FontOpenError, GlyphLoadError};
pub use face::CachedFace;
pub use face_id::{FaceId, FaceIdRegistry, OpaqueFaceId};
pub use font_files::{FontFile, FontFileManager};
pub use font_info::{CharMapInfo, FontInfo, FontType, SfntNameInfo};
pub use render::{GlyphImage, GlyphSlot, OutlineCommand, PixelFormat, Rasterizer};
pub use settings::{
    AaTarget, AxisCoord, CffHintingEngine, EngineDefaults, ImageTypeKey, Invalidation, LcdFilter,
    LoadFlags, RenderMode, RenderSettings, Scaler, TtInterpreterVersion,
};
pub use sfnt::{NamedInstanceInfo, PaletteInfo, SfntTableInfo, VariationAxisInfo};
