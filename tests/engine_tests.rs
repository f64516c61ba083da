//! Integration tests for the glyphscope engine.
//!
//! These exercise the full load/update/glyph pipeline against a real
//! font discovered through the system font database. On systems without
//! any usable font the tests log a skip and pass vacuously.

use glyphscope_engine::{Engine, PixelFormat};

/// First parseable scalable system font, if any.
fn system_font_bytes() -> Option<Vec<u8>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    for face in db.faces() {
        let bytes = match &face.source {
            fontdb::Source::File(path) => match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(_) => continue,
            },
            fontdb::Source::Binary(data) => data.as_ref().as_ref().to_vec(),
            _ => continue,
        };
        if let Ok(parsed) = ttf_parser::Face::parse(&bytes, face.index) {
            let tables = parsed.tables();
            if (tables.glyf.is_some() || tables.cff.is_some()) && face.index == 0 {
                return Some(bytes);
            }
        }
    }
    None
}

fn engine_with_system_font() -> Option<(Engine, usize)> {
    let Some(bytes) = system_font_bytes() else {
        eprintln!("skipping: no system fonts available");
        return None;
    };
    let mut engine = Engine::new();
    let idx = engine.open_font_memory(bytes, "system");
    Some((engine, idx))
}

#[test]
fn load_font_reports_glyph_count_and_indices() {
    let Some((mut engine, idx)) = engine_with_system_font() else {
        return;
    };
    let glyph_count = engine.load_font(idx, 0, 0).expect("load should succeed");
    assert!(glyph_count > 0);
    assert!(engine.font_valid());
    assert!(engine.render_ready(), "scalable font should be render-ready");
    assert_eq!(engine.current_font_index(), Some(idx));
    assert_eq!(engine.current_face_index(), Some(0));
    let info = engine.font_info().unwrap();
    assert_eq!(info.glyph_count(), glyph_count);
    assert!(!info.family_name().is_empty());
}

#[test]
fn reload_reproduces_identical_state() {
    let Some((mut engine, idx)) = engine_with_system_font() else {
        return;
    };
    engine.load_font(idx, 0, 0).unwrap();
    let family = engine.font_info().unwrap().family_name().to_string();
    let glyphs = engine.font_info().unwrap().glyph_count();
    let charmaps = engine.font_info().unwrap().charmaps().to_vec();

    engine.reload_font().unwrap();

    let info = engine.font_info().unwrap();
    assert_eq!(info.family_name(), family);
    assert_eq!(info.glyph_count(), glyphs);
    assert_eq!(info.charmaps(), charmaps.as_slice());
}

#[test]
fn aa_toggle_changes_pixel_format_after_update() {
    let Some((mut engine, idx)) = engine_with_system_font() else {
        return;
    };
    engine.load_font(idx, 0, 0).unwrap();
    let glyph = engine.glyph_index_from_char_code('A' as u32, None);
    if glyph == 0 {
        eprintln!("skipping: font has no 'A'");
        return;
    }

    let image = engine.load_glyph(glyph).expect("glyph should render");
    assert_eq!(image.format, PixelFormat::Gray);

    engine.settings_mut().set_anti_aliasing(false);
    engine.update();
    let mono = engine.load_glyph(glyph).expect("glyph should render");
    assert_eq!(mono.format, PixelFormat::Mono);
    // Thresholded output is strictly bilevel.
    assert!(mono.pixels.chunks(4).all(|p| p[3] == 0 || p[3] == 255));
}

#[test]
fn cache_reset_is_transparent() {
    let Some((mut engine, idx)) = engine_with_system_font() else {
        return;
    };
    engine.load_font(idx, 0, 0).unwrap();
    let glyph = engine.glyph_index_from_char_code('g' as u32, None);
    if glyph == 0 {
        eprintln!("skipping: font has no 'g'");
        return;
    }

    let before = engine.load_glyph(glyph).expect("glyph should render");
    engine.reset_cache();
    let after = engine.load_glyph(glyph).expect("glyph should render");

    assert_eq!(before.width, after.width);
    assert_eq!(before.height, after.height);
    assert_eq!(before.left, after.left);
    assert_eq!(before.top, after.top);
    assert_eq!(before.pixels, after.pixels);
}

#[test]
fn repeated_loads_hit_the_cache() {
    let Some((mut engine, idx)) = engine_with_system_font() else {
        return;
    };
    engine.load_font(idx, 0, 0).unwrap();
    let glyph = engine.glyph_index_from_char_code('m' as u32, None);
    if glyph == 0 {
        return;
    }
    engine.load_glyph(glyph);
    let misses = engine.cache_stats().misses;
    engine.load_glyph(glyph);
    engine.load_glyph_without_update(glyph);
    assert_eq!(engine.cache_stats().misses, misses, "no new misses");
    assert!(engine.cache_stats().hits > 0);
}

#[test]
fn removing_active_font_unloads_engine() {
    let Some((mut engine, idx)) = engine_with_system_font() else {
        return;
    };
    engine.load_font(idx, 0, 0).unwrap();
    assert!(engine.font_valid());

    assert!(engine.remove_font(idx));
    assert!(!engine.font_valid());
    assert!(!engine.render_ready());
    // Reloading the removed font must fail cleanly, not crash.
    assert!(engine.load_font(idx, 0, 0).is_err());
}

#[test]
fn slot_path_yields_outline_segments() {
    let Some((mut engine, idx)) = engine_with_system_font() else {
        return;
    };
    engine.load_font(idx, 0, 0).unwrap();
    let glyph = engine.glyph_index_from_char_code('O' as u32, None);
    if glyph == 0 {
        return;
    }

    let scaled_max = {
        let slot = engine
            .load_glyph_into_slot_without_cache(glyph, false)
            .expect("outline should exist");
        assert!(!slot.commands.is_empty());
        assert!(!slot.font_units);
        slot_extent(slot)
    };

    let slot = engine
        .load_glyph_into_slot_without_cache(glyph, true)
        .expect("outline should exist");
    assert!(slot.font_units);
    // Font-unit coordinates are far larger than 20px-scaled ones.
    assert!(slot_extent(slot) > scaled_max);
}

fn slot_extent(slot: &glyphscope_engine::GlyphSlot) -> f32 {
    use glyphscope_engine::OutlineCommand;
    let mut max = 0.0f32;
    for cmd in &slot.commands {
        let points: &[_] = match cmd {
            OutlineCommand::MoveTo(p) | OutlineCommand::LineTo(p) => std::slice::from_ref(p),
            OutlineCommand::QuadTo(_, p) => std::slice::from_ref(p),
            OutlineCommand::CurveTo(_, _, p) => std::slice::from_ref(p),
            OutlineCommand::Close => &[],
        };
        for p in points {
            max = max.max(p.x.abs()).max(p.y.abs());
        }
    }
    max
}

#[test]
fn size_metrics_scale_with_pixel_size() {
    let Some((mut engine, idx)) = engine_with_system_font() else {
        return;
    };
    engine.load_font(idx, 0, 0).unwrap();
    let small = engine.size_metrics().expect("render-ready");
    engine.settings_mut().set_size_by_pixel(small.y_ppem as f64 * 2.0);
    engine.update();
    let large = engine.size_metrics().expect("still render-ready");
    assert!(large.ascender > small.ascender);
    assert_eq!(large.units_per_em, small.units_per_em);
}

#[test]
fn sfnt_table_directory_is_nonempty_and_valid() {
    let Some((mut engine, idx)) = engine_with_system_font() else {
        return;
    };
    engine.load_font(idx, 0, 0).unwrap();
    let info = engine.font_info().unwrap();
    let tables = info.sfnt_tables();
    assert!(!tables.is_empty());
    assert!(tables.iter().any(|t| {
        let tag = t.tag_string();
        tag == "glyf" || tag == "CFF " || tag == "CFF2"
    }));
}
