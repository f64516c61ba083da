//! Typed error types for the engine boundary.
//!
//! Callers at the crate boundary match on specific variants instead of
//! opaque `anyhow` strings. Cache misses are *not* errors: they regenerate
//! transparently and only show up as latency.

use thiserror::Error;

/// A font (or one of its faces/instances) could not be opened.
///
/// Surfaces as a failed load with the current-state view cleared. The
/// engine never panics on these paths.
#[derive(Debug, Error)]
pub enum FontOpenError {
    /// The font index does not name an open font file.
    #[error("no open font at index {0}")]
    UnknownFont(usize),

    /// The font file was removed from the manager and its slot retired.
    #[error("font at index {0} has been removed")]
    FontRemoved(usize),

    /// The byte source could not be read from disk.
    #[error("failed to read font file '{path}': {source}")]
    FileRead {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The face index is outside the collection's face count.
    #[error("face index {face_index} out of range (collection has {face_count} faces)")]
    FaceIndexOutOfRange { face_index: u32, face_count: u32 },

    /// The named-instance index is outside the face's instance list.
    #[error("named instance {instance_index} out of range ({instance_count} instances)")]
    InstanceIndexOutOfRange {
        instance_index: u16,
        instance_count: u16,
    },

    /// The bytes are not a parseable font.
    #[error("font data is not parseable: {0}")]
    Parse(String),

    /// A cache lookup referenced an opaque id the registry never issued.
    /// Indicates internal misuse, reported rather than panicking.
    #[error("opaque face id {0} is not registered")]
    UnknownFaceId(u64),
}

/// A glyph could not be materialized.
///
/// Per the engine's contract these collapse to a `None` glyph result at
/// the public surface; the typed form exists for logging and for callers
/// of the lower-level cache API.
#[derive(Debug, Error)]
pub enum GlyphLoadError {
    /// No face/size context is active (nothing loaded, or size invalid).
    #[error("no valid size context for glyph load")]
    NoSizeContext,

    /// The rendering library produced no image for the glyph.
    #[error("glyph {0} produced no image")]
    NoImage(u16),

    /// The face could not be rematerialized for the load.
    #[error(transparent)]
    FaceUnavailable(#[from] FontOpenError),
}
