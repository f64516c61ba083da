//! Glyph materialization.
//!
//! Turns a resident face plus an image-type key into a concrete
//! [`GlyphImage`] via swash, and extracts raw outlines for the uncached
//! glyph-slot path. The engine owns a single [`Rasterizer`]; its scale
//! context is the reusable rendering-library handle.

use swash::scale::image::Content;
use swash::scale::{Render, ScaleContext, Source, StrikeWith};
use swash::zeno::Format;

use crate::face::CachedFace;
use crate::settings::{AxisCoord, ImageTypeKey, RenderMode};

/// Embolden strength (in pixels) applied when stem darkening is active.
const STEM_DARKENING_STRENGTH: f32 = 0.25;

/// Pixel interpretation of a produced glyph bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Thresholded coverage, fully opaque or fully transparent.
    Mono,
    /// Grayscale coverage in the alpha channel.
    Gray,
    /// Sub-pixel coverage collapsed to alpha (LCD rendering).
    Lcd,
    /// Premade color pixels (color layers / embedded color bitmaps).
    Color,
}

/// A rasterized glyph bitmap plus placement, always stored as RGBA.
#[derive(Debug, Clone)]
pub struct GlyphImage {
    pub glyph_index: u16,
    pub width: u32,
    pub height: u32,
    /// Horizontal bearing in pixels.
    pub left: i32,
    /// Vertical bearing in pixels.
    pub top: i32,
    pub format: PixelFormat,
    /// RGBA pixel data, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl GlyphImage {
    /// Bytes this image counts against the cache budget.
    pub fn memory_footprint(&self) -> usize {
        std::mem::size_of::<Self>() + self.pixels.len()
    }
}

/// One point of a slot outline, in pixels (or font units for unscaled
/// loads).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlinePoint {
    pub x: f32,
    pub y: f32,
}

/// One segment of a slot outline.
#[derive(Debug, Clone, PartialEq)]
pub enum OutlineCommand {
    MoveTo(OutlinePoint),
    LineTo(OutlinePoint),
    QuadTo(OutlinePoint, OutlinePoint),
    CurveTo(OutlinePoint, OutlinePoint, OutlinePoint),
    Close,
}

/// The engine's single mutable glyph slot: a transient, allocation-light
/// view of one glyph outline for raw segment display. Overwritten by
/// every uncached load.
#[derive(Debug, Clone, Default)]
pub struct GlyphSlot {
    pub glyph_index: u16,
    /// True when coordinates are unscaled font units.
    pub font_units: bool,
    pub commands: Vec<OutlineCommand>,
    pub advance: f32,
}

/// Rasterizes glyphs through a persistent swash scale context.
pub struct Rasterizer {
    context: ScaleContext,
}

impl Rasterizer {
    pub fn new() -> Self {
        Self {
            context: ScaleContext::new(),
        }
    }

    /// Materialize a glyph bitmap for the given key. `design_coords`
    /// override the face's named-instance coordinates when present.
    /// Returns `None` when the face has nothing to render for the glyph.
    pub fn rasterize(
        &mut self,
        face: &CachedFace,
        key: &ImageTypeKey,
        design_coords: &[AxisCoord],
        glyph_index: u16,
    ) -> Option<GlyphImage> {
        let flags = &key.load_flags;
        let coords = if design_coords.is_empty() {
            face.instance_coords()
        } else {
            design_coords
        };
        let variations = coords
            .iter()
            .map(|c| swash::Setting {
                tag: u32::from_be_bytes(c.tag),
                value: c.value,
            })
            .collect::<Vec<_>>();

        let mut scaler = self
            .context
            .builder(face.swash())
            .size(key.scaler.height_px())
            .hint(flags.hinting || flags.auto_hinting)
            .variations(variations)
            .build();

        // Source priority mirrors the key: color layers first when
        // enabled, then embedded bitmaps when preferred, then outlines.
        let mut sources: Vec<Source> = Vec::with_capacity(4);
        if flags.color_layers {
            sources.push(Source::ColorOutline(flags.palette_index));
            sources.push(Source::ColorBitmap(StrikeWith::BestFit));
        }
        if flags.prefer_embedded_bitmaps {
            sources.push(Source::Bitmap(StrikeWith::BestFit));
        }
        sources.push(Source::Outline);

        let render_format = match key.render_mode {
            RenderMode::Mono | RenderMode::Gray => Format::Alpha,
            RenderMode::Lcd | RenderMode::LcdVertical => Format::Subpixel,
        };

        let mut render = Render::new(&sources);
        render.format(render_format);
        if flags.stem_darkening {
            render.embolden(STEM_DARKENING_STRENGTH);
        }
        let image = render.render(&mut scaler, glyph_index)?;

        let (format, pixels) = match image.content {
            Content::Color => (PixelFormat::Color, image.data.clone()),
            Content::Mask => {
                let mono = key.render_mode == RenderMode::Mono;
                let mut pixels = Vec::with_capacity(image.data.len() * 4);
                for &mask in &image.data {
                    // Threshold the coverage for crisp mono edges.
                    let alpha = if mono {
                        if mask > 127 { 255 } else { 0 }
                    } else {
                        mask
                    };
                    pixels.extend_from_slice(&[255, 255, 255, alpha]);
                }
                let format = if mono {
                    PixelFormat::Mono
                } else {
                    PixelFormat::Gray
                };
                (format, pixels)
            }
            Content::SubpixelMask => (PixelFormat::Lcd, subpixel_mask_to_rgba(&image)),
        };

        Some(GlyphImage {
            glyph_index,
            width: image.placement.width,
            height: image.placement.height,
            left: image.placement.left,
            top: image.placement.top,
            format,
            pixels,
        })
    }
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a swash subpixel mask into an RGBA alpha mask.
/// Some swash builds emit 3 bytes/pixel (RGB), others 4 bytes/pixel
/// (RGBA). Alpha is derived from RGB luminance; the packed alpha is
/// ignored since some builds zero it.
fn subpixel_mask_to_rgba(image: &swash::scale::image::Image) -> Vec<u8> {
    let width = image.placement.width as usize;
    let height = image.placement.height as usize;
    let mut pixels = Vec::with_capacity(width * height * 4);

    let stride = if width > 0 && height > 0 {
        image.data.len() / (width * height)
    } else {
        0
    };

    match stride {
        3 | 4 => {
            for chunk in image.data.chunks_exact(stride) {
                let r = chunk[0];
                let g = chunk[1];
                let b = chunk[2];
                let alpha = ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8;
                pixels.extend_from_slice(&[255, 255, 255, alpha]);
            }
        }
        _ => {
            // Treat as opaque white to avoid invisibility if the layout
            // ever changes.
            pixels.resize(width * height * 4, 255);
        }
    }

    pixels
}

struct SlotBuilder {
    scale: f32,
    commands: Vec<OutlineCommand>,
}

impl SlotBuilder {
    fn point(&self, x: f32, y: f32) -> OutlinePoint {
        OutlinePoint {
            x: x * self.scale,
            y: y * self.scale,
        }
    }
}

impl ttf_parser::OutlineBuilder for SlotBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.point(x, y);
        self.commands.push(OutlineCommand::MoveTo(p));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.point(x, y);
        self.commands.push(OutlineCommand::LineTo(p));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let c = self.point(x1, y1);
        let p = self.point(x, y);
        self.commands.push(OutlineCommand::QuadTo(c, p));
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let c1 = self.point(x1, y1);
        let c2 = self.point(x2, y2);
        let p = self.point(x, y);
        self.commands.push(OutlineCommand::CurveTo(c1, c2, p));
    }

    fn close(&mut self) {
        self.commands.push(OutlineCommand::Close);
    }
}

/// Extract a glyph outline into slot form. `scale` converts font units to
/// pixels; pass 1.0 for unscaled font-unit output. Returns `None` for
/// glyphs without an outline (e.g. bitmap-only faces).
pub fn outline_into_slot(
    face: &ttf_parser::Face<'_>,
    glyph_index: u16,
    scale: f32,
    font_units: bool,
) -> Option<GlyphSlot> {
    let glyph = ttf_parser::GlyphId(glyph_index);
    let mut builder = SlotBuilder {
        scale,
        commands: Vec::new(),
    };
    face.outline_glyph(glyph, &mut builder)?;
    let advance = face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale;
    Some(GlyphSlot {
        glyph_index,
        font_units,
        commands: builder.commands,
        advance,
    })
}
