//! End-to-end drawing scenarios and invariants
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use super::*;
use crate::brush::BrushFamily;
use crate::fill::BucketOptions;
use crate::history::SelectionOp;
use crate::input::DeviceKind;
use crate::layer::Rect;
use crate::timelapse::PngMemorySink;

const RED: [u8; 4] = [255, 0, 0, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];

fn config() -> EngineConfig {
    EngineConfig {
        paper_size: 64,
        ..EngineConfig::default()
    }
}

fn canvas(width: u32, height: u32) -> Canvas {
    Canvas::new(width, height, 72, Color::WHITE, config()).unwrap()
}

fn brush(family: BrushFamily, size: f32) -> BrushDescriptor {
    BrushDescriptor {
        size,
        opacity: 1.0,
        ..BrushDescriptor::for_family(family)
    }
}

/// Press at the first point, move through the rest, release at the last.
fn stroke(canvas: &mut Canvas, points: &[(f32, f32)]) {
    let (x, y) = points[0];
    canvas.on_press(Point::new(x, y), 1.0, 0.0, DeviceKind::Mouse);
    for &(x, y) in &points[1..] {
        canvas.on_move(Point::new(x, y), 1.0, 0.0);
    }
    let (x, y) = points[points.len() - 1];
    canvas.on_release(Point::new(x, y));
}

fn image(canvas: &Canvas, index: usize) -> PixelBuffer {
    canvas.stack().layers()[index].image.clone()
}

#[test]
fn test_inking_line() {
    let mut canvas = canvas(100, 100);
    canvas.set_brush(brush(BrushFamily::Inking, 4.0));
    canvas.set_color(Color::BLACK);
    stroke(&mut canvas, &[(10.0, 10.0), (90.0, 10.0)]);

    let layer = image(&canvas, 1);
    assert_eq!(layer.pixel(50, 10), [0, 0, 0, 255]);
    for x in 12..=88 {
        assert_eq!(layer.pixel(x, 10)[3], 255, "gap at x = {}", x);
    }
    assert_eq!(layer.pixel(50, 4), [0, 0, 0, 0]);
    assert_eq!(layer.pixel(50, 16), [0, 0, 0, 0]);
    assert_eq!(canvas.history().undo_len(), 1);
}

#[test]
fn test_eraser_preserves_underlayer() {
    let mut canvas = canvas(40, 40);
    canvas.stack.layer_mut(1).unwrap().image.fill_premultiplied(RED);
    let upper = canvas.add_layer();
    {
        let image = &mut canvas.stack.layer_mut(upper).unwrap().image;
        for y in 10..20 {
            for x in 10..20 {
                image.put_pixel(x, y, [0, 0, 0, 255]);
            }
        }
    }
    let lower_before = image(&canvas, 1);

    canvas.set_brush(brush(BrushFamily::Eraser, 12.0));
    stroke(&mut canvas, &[(4.0, 15.0), (26.0, 15.0)]);

    let erased = image(&canvas, upper);
    for x in 10..20 {
        assert_eq!(erased.pixel(x, 15), [0, 0, 0, 0]);
    }
    for y in 12..18 {
        assert_eq!(erased.pixel(15, y), [0, 0, 0, 0]);
    }
    assert_eq!(image(&canvas, 1), lower_before);
}

#[test]
fn test_clipping_group_keeps_base_alpha() {
    let mut canvas = canvas(100, 100);
    canvas.toggle_visibility(0).unwrap();
    {
        let base = &mut canvas.stack.layer_mut(1).unwrap().image;
        for y in 0..100u32 {
            for x in 0..100u32 {
                let d = ((x as f32 + 0.5 - 50.0).powi(2) + (y as f32 + 0.5 - 50.0).powi(2)).sqrt();
                let a = ((30.0 - d).clamp(0.0, 1.0) * 255.0).round() as u8;
                base.put_pixel(x, y, [0, a, 0, a]);
            }
        }
    }
    let clip = canvas.add_layer();
    canvas.stack.layer_mut(clip).unwrap().image.fill_premultiplied([0, 0, 255, 255]);
    canvas.toggle_clipping(clip).unwrap();

    let base = image(&canvas, 1);
    let out = canvas.composite();
    let mut edge_pixels = 0;
    for y in 0..100 {
        for x in 0..100 {
            let a = base.pixel(x, y)[3];
            let px = out.pixel(x, y);
            assert_eq!(px[3], a);
            assert!(px[0] <= 1 && px[1] <= 1, "non-blue at ({}, {})", x, y);
            assert!(px[2].abs_diff(a) <= 1);
            if a > 0 && a < 255 {
                edge_pixels += 1;
            }
        }
    }
    assert!(edge_pixels > 0);
}

#[test]
fn test_undo_limit() {
    let mut canvas = canvas(60, 60);
    canvas.set_undo_limit(3);
    canvas.set_brush(brush(BrushFamily::Inking, 4.0));

    let mut states = vec![image(&canvas, 1)];
    for i in 0..5 {
        let y = 10.0 + i as f32 * 10.0;
        stroke(&mut canvas, &[(5.0, y), (55.0, y)]);
        states.push(image(&canvas, 1));
    }
    assert_eq!(canvas.history().undo_len(), 3);

    for _ in 0..3 {
        assert!(canvas.undo().unwrap().is_some());
    }
    assert_eq!(image(&canvas, 1), states[2]);
    assert_eq!(canvas.undo().unwrap(), None);
    assert_eq!(canvas.undo().unwrap(), None);
    assert_eq!(image(&canvas, 1), states[2]);

    while canvas.redo().unwrap().is_some() {}
    assert_eq!(image(&canvas, 1), states[5]);
}

#[test]
fn test_bucket_fill_inside_selection() {
    let mut canvas = canvas(100, 100);
    canvas.select_rect(Rect::new(20, 20, 80, 80), SelectionOp::Replace);
    let changed = canvas.apply_bucket_fill(50.0, 50.0, Color::rgb(255, 0, 0), BucketOptions::default());
    assert_eq!(changed, 60 * 60);

    let out = canvas.composite();
    for y in 0..100 {
        for x in 0..100 {
            let inside = (20..80).contains(&x) && (20..80).contains(&y);
            assert_eq!(out.pixel(x, y), if inside { RED } else { WHITE }, "({}, {})", x, y);
        }
    }
    assert_eq!(canvas.history().undo_len(), 1);
}

#[test]
fn test_watercolor_tiles_with_paper() {
    let mut canvas = canvas(160, 160);
    canvas.set_brush(brush(BrushFamily::Watercolor, 40.0));
    canvas.set_color(Color::rgb(30, 90, 200));
    stroke(&mut canvas, &[(32.5, 32.5)]);
    stroke(&mut canvas, &[(96.5, 96.5)]);

    let layer = image(&canvas, 1);
    assert!(layer.has_coverage());
    for dy in -30..30i32 {
        for dx in -30..30i32 {
            let (x, y) = ((32 + dx) as u32, (32 + dy) as u32);
            assert_eq!(layer.pixel(x, y), layer.pixel(x + 64, y + 64), "({}, {})", dx, dy);
        }
    }
}

#[test]
fn test_every_family_keeps_premultiplied_pixels() {
    let mut canvas = canvas(80, 80);
    canvas.stack.layer_mut(1).unwrap().image.fill_premultiplied([40, 20, 10, 128]);
    let families = [
        BrushFamily::Pencil,
        BrushFamily::Inking,
        BrushFamily::Airbrush,
        BrushFamily::Watercolor,
        BrushFamily::Oil,
        BrushFamily::Acrylic,
        BrushFamily::Eraser,
    ];
    for (i, family) in families.into_iter().enumerate() {
        canvas.set_brush(brush(family, 16.0));
        canvas.set_color(Color::rgb(200, (i * 30) as u8, 60));
        let y = 8.0 + i as f32 * 10.0;
        stroke(&mut canvas, &[(5.0, y), (40.0, y + 3.0), (75.0, y)]);
    }
    for layer in canvas.stack().layers() {
        assert!(layer.image.is_premultiplied(), "{}", layer.name);
    }
    assert_eq!(canvas.history().undo_len(), families.len());
}

#[test]
fn test_undo_redo_is_identity() {
    let mut canvas = canvas(50, 50);
    canvas.set_brush(brush(BrushFamily::Airbrush, 20.0));
    stroke(&mut canvas, &[(10.0, 10.0), (40.0, 30.0)]);
    let painted = image(&canvas, 1);

    assert_eq!(canvas.undo().unwrap(), Some(1));
    assert!(!image(&canvas, 1).has_coverage());
    assert_eq!(canvas.redo().unwrap(), Some(1));
    assert_eq!(image(&canvas, 1), painted);
}

#[test]
fn test_stroke_outside_canvas_leaves_no_frame() {
    let mut canvas = canvas(50, 50);
    stroke(&mut canvas, &[(-60.0, -60.0), (-90.0, -40.0), (-200.0, -10.0)]);
    assert!(!image(&canvas, 1).has_coverage());
    assert_eq!(canvas.history().undo_len(), 0);
    assert!(!canvas.is_stroking());
}

#[test]
fn test_locked_or_hidden_layer_ignores_strokes() {
    let mut canvas = canvas(50, 50);
    canvas.toggle_lock(1).unwrap();
    stroke(&mut canvas, &[(10.0, 10.0), (40.0, 40.0)]);
    assert!(!canvas.is_stroking());
    assert!(!image(&canvas, 1).has_coverage());

    canvas.toggle_lock(1).unwrap();
    canvas.toggle_visibility(1).unwrap();
    stroke(&mut canvas, &[(10.0, 10.0), (40.0, 40.0)]);
    assert!(!image(&canvas, 1).has_coverage());
    assert_eq!(canvas.history().undo_len(), 0);
}

#[test]
fn test_alpha_lock_never_adds_alpha() {
    let mut canvas = canvas(50, 50);
    {
        let image = &mut canvas.stack.layer_mut(1).unwrap().image;
        for y in 20..30 {
            for x in 0..50 {
                image.put_pixel(x, y, [0, 0, 200, 200]);
            }
        }
    }
    canvas.toggle_alpha_lock(1).unwrap();
    let before = image(&canvas, 1);

    for family in [BrushFamily::Inking, BrushFamily::Watercolor, BrushFamily::Oil, BrushFamily::Eraser] {
        canvas.set_brush(brush(family, 18.0));
        canvas.set_color(Color::rgb(255, 255, 0));
        stroke(&mut canvas, &[(5.0, 25.0), (45.0, 25.0)]);
    }
    canvas.fill_layer(1).unwrap();
    canvas.apply_lasso_fill(
        &[Point::new(0.0, 0.0), Point::new(50.0, 0.0), Point::new(50.0, 50.0), Point::new(0.0, 50.0)],
        Color::rgb(0, 255, 0),
    );
    assert_eq!(canvas.clear_layer(1).unwrap(), 0);

    let after = image(&canvas, 1);
    for y in 0..50 {
        for x in 0..50 {
            assert_eq!(after.pixel(x, y)[3], before.pixel(x, y)[3], "({}, {})", x, y);
        }
    }
    assert_ne!(after, before);
}

#[test]
fn test_selection_gates_strokes() {
    let mut canvas = canvas(60, 60);
    canvas.select_rect(Rect::new(20, 0, 40, 60), SelectionOp::Replace);
    canvas.set_brush(brush(BrushFamily::Inking, 10.0));
    stroke(&mut canvas, &[(5.0, 30.0), (55.0, 30.0)]);

    let layer = image(&canvas, 1);
    for y in 0..60 {
        for x in 0..60 {
            if canvas.selection().value(x, y) == 0 {
                assert_eq!(layer.pixel(x, y), [0, 0, 0, 0], "({}, {})", x, y);
            }
        }
    }
    assert_eq!(layer.pixel(30, 30)[3], 255);
}

#[test]
fn test_blocked_stroke_keeps_redo() {
    let mut canvas = canvas(100, 100);
    canvas.set_brush(brush(BrushFamily::Inking, 6.0));
    stroke(&mut canvas, &[(10.0, 50.0), (90.0, 50.0)]);
    canvas.undo().unwrap();
    assert_eq!(canvas.history().redo_len(), 1);

    // every dab lands outside the selection
    canvas.select_rect(Rect::new(40, 40, 60, 60), SelectionOp::Replace);
    let before = image(&canvas, 1);
    stroke(&mut canvas, &[(10.0, 20.0), (90.0, 20.0)]);
    assert_eq!(image(&canvas, 1), before);
    assert_eq!(canvas.history().undo_len(), 0);
    assert_eq!(canvas.history().redo_len(), 1);

    // alpha lock on an empty layer blocks every write too
    canvas.clear_selection();
    canvas.toggle_alpha_lock(1).unwrap();
    stroke(&mut canvas, &[(10.0, 20.0), (90.0, 20.0)]);
    assert_eq!(canvas.history().undo_len(), 0);
    assert_eq!(canvas.history().redo_len(), 1);
}

#[test]
fn test_flatten_matches_composite() {
    let mut canvas = canvas(64, 64);
    canvas.set_color(Color::rgb(200, 40, 40));
    canvas.set_brush(brush(BrushFamily::Airbrush, 24.0));
    stroke(&mut canvas, &[(10.0, 10.0), (50.0, 50.0)]);
    let second = canvas.add_layer();
    canvas.set_layer_opacity(second, 0.6).unwrap();
    canvas.set_color(Color::rgb(20, 40, 220));
    canvas.set_brush(brush(BrushFamily::Inking, 12.0));
    stroke(&mut canvas, &[(50.0, 10.0), (10.0, 50.0)]);

    let before = canvas.composite();
    canvas.flatten();
    assert_eq!(canvas.stack().len(), 2);
    assert!(canvas.stack().layers()[0].is_background());
    assert_eq!(canvas.stack().active_index(), Some(1));
    assert_eq!(canvas.history().undo_len(), 0);

    let after = canvas.composite();
    for (a, b) in before.as_raw().iter().zip(after.as_raw()) {
        assert!(a.abs_diff(*b) <= 1);
    }
}

#[test]
fn test_merge_down() {
    let mut canvas = canvas(20, 20);
    canvas.stack.layer_mut(1).unwrap().image.fill_premultiplied(RED);
    let upper = canvas.add_layer();
    canvas.stack.layer_mut(upper).unwrap().image.put_pixel(5, 5, [0, 0, 255, 255]);
    canvas.set_layer_opacity(upper, 0.5).unwrap();

    let merged = canvas.merge_down(upper).unwrap();
    assert_eq!(merged, 1);
    assert_eq!(canvas.stack().len(), 2);
    let px = canvas.stack().layers()[1].image.pixel(5, 5);
    assert_eq!(px[3], 255);
    assert!(px[0].abs_diff(128) <= 1 && px[2].abs_diff(128) <= 1);
    assert_eq!(canvas.stack().layers()[1].image.pixel(0, 0), RED);

    assert!(canvas.merge_down(0).is_err());
    let group = canvas.add_group();
    assert!(canvas.merge_down(group).is_err());
}

#[test]
fn test_structural_ops_remap_history() {
    let mut canvas = canvas(30, 30);
    stroke(&mut canvas, &[(5.0, 5.0), (25.0, 5.0)]);
    canvas.set_active_layer(0).unwrap();
    let added = canvas.add_layer();
    assert_eq!(added, 1);
    // the painted layer moved up to index 2
    assert_eq!(canvas.undo().unwrap(), Some(2));
    assert!(!image(&canvas, 2).has_coverage());

    canvas.redo().unwrap();
    canvas.remove_layer(2).unwrap();
    assert_eq!(canvas.undo().unwrap(), None);
    assert!(canvas.remove_layer(0).is_err());
}

#[test]
fn test_clear_and_fill_respect_selection() {
    let mut canvas = canvas(20, 20);
    canvas.set_color(Color::rgb(0, 128, 0));
    canvas.select_rect(Rect::new(0, 0, 10, 20), SelectionOp::Replace);
    assert_eq!(canvas.fill_layer(1).unwrap(), 200);
    assert_eq!(image(&canvas, 1).pixel(5, 5), [0, 128, 0, 255]);
    assert_eq!(image(&canvas, 1).pixel(15, 5), [0, 0, 0, 0]);

    canvas.select_rect(Rect::new(0, 0, 5, 20), SelectionOp::Replace);
    assert_eq!(canvas.clear_layer(1).unwrap(), 100);
    assert_eq!(image(&canvas, 1).pixel(2, 2), [0, 0, 0, 0]);
    assert_eq!(image(&canvas, 1).pixel(7, 2), [0, 128, 0, 255]);
    assert_eq!(canvas.history().undo_len(), 2);
    assert!(matches!(canvas.fill_layer(0), Err(EngineError::LayerLocked(0))));
}

#[test]
fn test_sample_color() {
    let mut canvas = canvas(20, 20);
    canvas.stack.layer_mut(1).unwrap().image.put_pixel(3, 4, [0, 0, 128, 128]);
    assert_eq!(canvas.sample_color(3.5, 4.5, SampleMode::CurrentLayer), Some(Color::rgba(0, 0, 255, 128)));
    assert_eq!(canvas.sample_color(0.0, 0.0, SampleMode::CurrentLayer), Some(Color::TRANSPARENT));
    assert_eq!(canvas.sample_color(0.0, 0.0, SampleMode::Composite), Some(Color::WHITE));
    assert_eq!(canvas.sample_color(-1.0, 0.0, SampleMode::Composite), None);
    assert_eq!(canvas.sample_color(0.0, 20.0, SampleMode::CurrentLayer), None);
}

#[test]
fn test_wand_and_lasso_selection() {
    let mut canvas = canvas(20, 20);
    canvas.stack.layer_mut(1).unwrap().image.put_pixel(0, 0, RED);
    canvas.select_wand(10.0, 10.0, 0, SelectionOp::Replace).unwrap();
    assert_eq!(canvas.selection().value(0, 0), 0);
    assert_eq!(canvas.selection().value(19, 19), 255);
    assert!(canvas.select_wand(25.0, 0.0, 0, SelectionOp::Replace).is_err());

    assert!(!canvas.select_lasso(&[Point::new(1.0, 1.0), Point::new(5.0, 5.0)], SelectionOp::Replace));
    canvas.invert_selection();
    assert_eq!(canvas.selection().value(0, 0), 255);
    canvas.clear_selection();
    assert!(!canvas.selection().is_active());
}

#[test]
fn test_viewport_mapping_for_strokes() {
    let mut canvas = canvas(40, 40);
    canvas.set_view(Point::new(100.0, 50.0), 2.0);
    canvas.set_brush(brush(BrushFamily::Inking, 4.0));
    // viewport (120, 70) is canvas (10, 10)
    stroke(&mut canvas, &[(120.0, 70.0)]);
    assert!(image(&canvas, 1).pixel(10, 10)[3] > 200);
    assert_eq!(canvas.canvas_to_viewport(Point::new(10.0, 10.0)), Point::new(120.0, 70.0));

    let frame = canvas.paint(200, 200);
    assert_eq!(frame.dimensions(), (200, 200));
}

#[test]
fn test_resize_and_background_color() {
    let mut canvas = canvas(20, 20);
    canvas.select_rect(Rect::new(0, 0, 5, 5), SelectionOp::Replace);
    canvas.resize_canvas(30, 10).unwrap();
    assert_eq!((canvas.width(), canvas.height()), (30, 10));
    assert!(!canvas.selection().is_active());
    assert_eq!(canvas.stack().layers()[0].image.pixel(29, 9), WHITE);
    assert!(canvas.resize_canvas(0, 10).is_err());

    canvas.set_background_color(Color::rgb(0, 0, 0)).unwrap();
    assert_eq!(canvas.stack().layers()[0].image.pixel(0, 0), [0, 0, 0, 255]);
    canvas.undo().unwrap();
    assert_eq!(canvas.stack().layers()[0].image.pixel(0, 0), WHITE);
}

#[test]
fn test_project_round_trip() {
    let mut canvas = canvas(32, 24);
    canvas.set_brush(brush(BrushFamily::Pencil, 6.0));
    stroke(&mut canvas, &[(2.0, 2.0), (30.0, 20.0)]);
    let group = canvas.add_group();
    canvas.rename_layer(group, "Inks").unwrap();
    let inner = canvas.add_layer();
    canvas.set_blend_mode(inner, "multiply").unwrap();
    canvas.set_private(inner, true).unwrap();

    let json = canvas.to_project_data().unwrap().to_json().unwrap();
    let data = ProjectData::from_json(&json).unwrap();
    let restored = Canvas::from_project_data(&data, config()).unwrap();

    assert_eq!(restored.width(), 32);
    assert_eq!(restored.stack().len(), canvas.stack().len());
    assert_eq!(restored.stack().active_index(), canvas.stack().active_index());
    for (a, b) in canvas.stack().layers().iter().zip(restored.stack().layers()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.depth, b.depth);
        assert_eq!(a.blend, b.blend);
        assert_eq!(a.private, b.private);
        assert_eq!(a.image, b.image);
    }
}

#[test]
fn test_drying_tick() {
    let mut canvas = canvas(40, 40);
    canvas.set_brush(brush(BrushFamily::Watercolor, 16.0));
    stroke(&mut canvas, &[(10.0, 20.0), (30.0, 20.0)]);
    assert!(!canvas.wet_maps().is_dry());

    assert!(!canvas.tick(Duration::from_millis(100)));
    assert!(canvas.tick(Duration::from_secs(3)));
    canvas.tick(Duration::from_secs(3600));
    assert!(canvas.wet_maps().is_dry());
    assert!(!canvas.tick(Duration::from_secs(3)));
}

#[test]
fn test_timelapse_frame_per_stroke() {
    let sink = PngMemorySink::new();
    let frames = sink.frames();
    let mut canvas = canvas(40, 40);
    canvas.attach_timelapse(TimelapseRecorder::spawn(sink, 16).unwrap());

    stroke(&mut canvas, &[(5.0, 5.0), (35.0, 35.0)]);
    stroke(&mut canvas, &[(-50.0, -50.0)]);
    stroke(&mut canvas, &[(35.0, 5.0), (5.0, 35.0)]);

    let mut recorder = canvas.detach_timelapse().unwrap();
    recorder.shutdown();
    assert_eq!(recorder.frames_submitted(), 2);
    assert_eq!(frames.lock().len(), 2);
}

#[test]
fn test_new_canvas_rejects_bad_dimensions() {
    assert!(matches!(
        Canvas::new(0, 10, 72, Color::WHITE, config()),
        Err(EngineError::InvalidDimensions { width: 0, height: 10 })
    ));
    assert!(Canvas::new(16385, 10, 72, Color::WHITE, config()).is_err());
}
