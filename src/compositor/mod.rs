//! Compositor - back-to-front layer blending, clipping groups and the
//! viewport painter.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::brush::{render_stamp, Dab};
use crate::input::Point;
use crate::layer::pixel::{from_f32, to_f32};
use crate::layer::{blend_pixel, blend_premul, blend_row, BlendMode, LayerStack, PixelBuffer, Rect};

const CHECKER_LIGHT: [u8; 4] = [255, 255, 255, 255];
const CHECKER_DARK: [u8; 4] = [204, 204, 204, 255];
const WORKSPACE: [u8; 4] = [48, 48, 48, 255];
const BORDER: [u8; 4] = [128, 128, 128, 255];

/// Canvas-to-viewport mapping: `screen = canvas · zoom + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub offset: Point,
    pub zoom: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            offset: Point::default(),
            zoom: 1.0,
        }
    }
}

impl ViewTransform {
    pub fn new(offset: Point, zoom: f32) -> Self {
        let zoom = if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 };
        Self { offset, zoom }
    }

    pub fn to_screen(&self, p: Point) -> Point {
        Point::new(p.x * self.zoom + self.offset.x, p.y * self.zoom + self.offset.y)
    }

    pub fn to_canvas(&self, p: Point) -> Point {
        Point::new((p.x - self.offset.x) / self.zoom, (p.y - self.offset.y) / self.zoom)
    }
}

/// Brush outline drawn at the pointer while hovering.
#[derive(Debug, Clone, Copy)]
pub struct GhostCursor<'a> {
    pub stamp: &'a PixelBuffer,
    /// Size the stamp was synthesized at
    pub base_size: f32,
    /// Canvas-space position
    pub position: Point,
    /// Canvas-space diameter
    pub size: f32,
    pub opacity: f32,
}

/// Source-atop variant of a blend mode: the result keeps the backdrop alpha.
#[inline]
pub(crate) fn blend_atop(mode: BlendMode, dst: [f32; 4], src: [f32; 4]) -> [f32; 4] {
    let (sa, da) = (src[3], dst[3]);
    if sa <= 0.0 || da <= 0.0 {
        return dst;
    }
    let b = blend_premul(mode, dst, src);
    let mut out = [0.0, 0.0, 0.0, da];
    for c in 0..3 {
        out[c] = (b[c] - src[c] * (1.0 - da)).clamp(0.0, da);
    }
    out
}

#[inline]
fn checker(x: f32, y: f32, tile: f32) -> [u8; 4] {
    let cx = (x / tile).floor() as i64;
    let cy = (y / tile).floor() as i64;
    if (cx + cy).rem_euclid(2) == 0 {
        CHECKER_LIGHT
    } else {
        CHECKER_DARK
    }
}

/// Owns the scratch buffers reused across frames.
#[derive(Debug, Default)]
pub struct Compositor {
    /// Clipping-group accumulator, grown to the largest canvas seen
    group: Vec<u8>,
    canvas: PixelBuffer,
    checker_tile: u32,
}

impl Compositor {
    pub fn new(checker_tile: u32) -> Self {
        Self {
            group: Vec::new(),
            canvas: PixelBuffer::default(),
            checker_tile: checker_tile.max(1),
        }
    }

    pub fn set_checker_tile(&mut self, tile: u32) {
        self.checker_tile = tile.max(1);
    }

    /// Blend the whole stack bottom-up in canvas space.
    ///
    /// With `skip_private`, layers flagged private are left out.
    pub fn composite(&mut self, stack: &LayerStack, skip_private: bool) -> &PixelBuffer {
        let (width, height) = (stack.width(), stack.height());
        if self.canvas.dimensions() != (width, height) {
            self.canvas = PixelBuffer::new(width, height);
        } else {
            self.canvas.clear();
        }
        let len = width as usize * height as usize * 4;
        if len == 0 {
            return &self.canvas;
        }
        let row_len = width as usize * 4;
        if self.group.len() < len {
            self.group.resize(len, 0);
        }

        let layers = stack.layers();
        let drawable = |i: usize| {
            let layer = &layers[i];
            !layer.is_group()
                && layer.image.dimensions() == (width, height)
                && stack.is_effectively_visible(i)
                && !(skip_private && layer.private)
        };

        let mut i = 0;
        while i < layers.len() {
            let layer = &layers[i];
            if layer.is_group() {
                i += 1;
                continue;
            }
            // a clipped layer reaching here has no base and draws as a normal layer
            let chain_end = if layer.clipped {
                i + 1
            } else {
                layers[i + 1..]
                    .iter()
                    .position(|l| !l.clipped || l.is_group() || l.depth != layer.depth)
                    .map_or(layers.len(), |p| i + 1 + p)
            };

            if !drawable(i) {
                i = chain_end;
                continue;
            }
            let opacity = layer.opacity * stack.group_opacity(i);

            if chain_end == i + 1 {
                self.canvas
                    .as_raw_mut()
                    .par_chunks_mut(row_len)
                    .zip(layer.image.as_raw().par_chunks(row_len))
                    .for_each(|(dst, src)| blend_row(layer.blend, dst, src, opacity));
                i = chain_end;
                continue;
            }

            // clipping group: base into G, clipped layers atop G, G into canvas
            let group = &mut self.group[..len];
            group.fill(0);
            group
                .par_chunks_mut(row_len)
                .zip(layer.image.as_raw().par_chunks(row_len))
                .for_each(|(dst, src)| blend_row(BlendMode::Normal, dst, src, opacity));

            for c in i + 1..chain_end {
                if !drawable(c) {
                    continue;
                }
                let clip = &layers[c];
                let clip_opacity = (clip.opacity * stack.group_opacity(c)).clamp(0.0, 1.0);
                group
                    .par_chunks_mut(row_len)
                    .zip(clip.image.as_raw().par_chunks(row_len))
                    .for_each(|(dst, src)| {
                        for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                            if s[3] == 0 || d[3] == 0 {
                                continue;
                            }
                            let s = to_f32([s[0], s[1], s[2], s[3]]).map(|v| v * clip_opacity);
                            let out = blend_atop(clip.blend, to_f32([d[0], d[1], d[2], d[3]]), s);
                            d.copy_from_slice(&from_f32(out));
                        }
                    });
            }

            let group = &self.group[..len];
            self.canvas
                .as_raw_mut()
                .par_chunks_mut(row_len)
                .zip(group.par_chunks(row_len))
                .for_each(|(dst, src)| blend_row(layer.blend, dst, src, 1.0));
            i = chain_end;
        }
        &self.canvas
    }

    /// Render the stack into a `viewport_width × viewport_height` frame.
    ///
    /// Nearest-neighbor sampling through `view`; a checkerboard shows through
    /// when the background is hidden. The canvas gets a 1-pixel border and
    /// the ghost cursor, if any, is drawn on top.
    pub fn paint(
        &mut self,
        stack: &LayerStack,
        view: &ViewTransform,
        viewport_width: u32,
        viewport_height: u32,
        ghost: Option<GhostCursor<'_>>,
    ) -> PixelBuffer {
        let show_checker = !(stack.has_background() && stack.is_effectively_visible(0));
        let tile = self.checker_tile as f32;
        let (width, height) = (stack.width() as f32, stack.height() as f32);
        let view = *view;
        let canvas = self.composite(stack, false);

        let mut frame = PixelBuffer::filled(viewport_width, viewport_height, WORKSPACE);
        let row_len = viewport_width as usize * 4;
        if row_len == 0 {
            return frame;
        }
        frame
            .as_raw_mut()
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(sy, row)| {
                for (sx, px) in row.chunks_exact_mut(4).enumerate() {
                    let p = view.to_canvas(Point::new(sx as f32 + 0.5, sy as f32 + 0.5));
                    if p.x < 0.0 || p.y < 0.0 || p.x >= width || p.y >= height {
                        continue;
                    }
                    let src = canvas.pixel(p.x as u32, p.y as u32);
                    let base = if show_checker {
                        checker(p.x, p.y, tile)
                    } else {
                        [0, 0, 0, 0]
                    };
                    let out = blend_pixel(BlendMode::Normal, base, src, 1.0);
                    px.copy_from_slice(&out);
                }
            });

        draw_border(&mut frame, &view, width, height);

        if let Some(ghost) = ghost {
            let center = view.to_screen(ghost.position);
            let dab = Dab {
                x: center.x,
                y: center.y,
                size: ghost.size * view.zoom,
                angle: 0.0,
                opacity: ghost.opacity,
                pressure: 1.0,
            };
            if let Some(patch) = render_stamp(ghost.stamp, ghost.base_size, &dab, frame.bounds()) {
                for (x, y, src) in patch.iter() {
                    if src[3] <= 0.0 {
                        continue;
                    }
                    let (x, y) = (x as u32, y as u32);
                    let out = blend_premul(BlendMode::Normal, to_f32(frame.pixel(x, y)), src);
                    frame.put_pixel(x, y, from_f32(out));
                }
            }
        }
        frame
    }
}

/// One-pixel frame just outside the canvas rectangle.
fn draw_border(frame: &mut PixelBuffer, view: &ViewTransform, width: f32, height: f32) {
    let top_left = view.to_screen(Point::new(0.0, 0.0));
    let bottom_right = view.to_screen(Point::new(width, height));
    let outer = Rect::new(
        top_left.x.floor() as i32 - 1,
        top_left.y.floor() as i32 - 1,
        bottom_right.x.ceil() as i32 + 1,
        bottom_right.y.ceil() as i32 + 1,
    );
    let bounds = frame.bounds();
    let mut put = |x: i32, y: i32| {
        if bounds.contains(x, y) {
            frame.put_pixel(x as u32, y as u32, BORDER);
        }
    };
    for x in outer.left..outer.right {
        put(x, outer.top);
        put(x, outer.bottom - 1);
    }
    for y in outer.top..outer.bottom {
        put(outer.left, y);
        put(outer.right - 1, y);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::layer::Color;

    fn stack_with_red_square() -> LayerStack {
        let mut stack = LayerStack::new(10, 10, Color::WHITE);
        let layer = stack.get_mut(1).unwrap();
        for y in 2..5 {
            for x in 2..5 {
                layer.image.put_pixel(x, y, [255, 0, 0, 255]);
            }
        }
        stack
    }

    #[test]
    fn test_view_transform_round_trip() {
        let view = ViewTransform::new(Point::new(10.0, -4.0), 2.0);
        let p = Point::new(3.0, 7.5);
        let back = view.to_canvas(view.to_screen(p));
        assert!((back.x - p.x).abs() < 1e-5 && (back.y - p.y).abs() < 1e-5);
        assert_eq!(ViewTransform::new(Point::default(), 0.0).zoom, 1.0);
    }

    #[test]
    fn test_composite_source_over() {
        let mut stack = stack_with_red_square();
        let mut compositor = Compositor::new(20);
        let out = compositor.composite(&stack, false);
        assert_eq!(out.pixel(3, 3), [255, 0, 0, 255]);
        assert_eq!(out.pixel(0, 0), [255, 255, 255, 255]);

        stack.set_opacity(1, 0.5).unwrap();
        let out = compositor.composite(&stack, false);
        let px = out.pixel(3, 3);
        assert_eq!(px[3], 255);
        assert!((px[1] as i32 - 128).abs() <= 1);
    }

    #[test]
    fn test_private_layers_skipped() {
        let mut stack = stack_with_red_square();
        stack.set_private(1, true).unwrap();
        let mut compositor = Compositor::new(20);
        assert_eq!(compositor.composite(&stack, true).pixel(3, 3), [255, 255, 255, 255]);
        assert_eq!(compositor.composite(&stack, false).pixel(3, 3), [255, 0, 0, 255]);
    }

    #[test]
    fn test_clipped_layer_keeps_base_alpha() {
        let mut stack = LayerStack::new(4, 1, Color::WHITE);
        stack.toggle_visibility(0).unwrap();
        {
            let base = stack.get_mut(1).unwrap();
            base.image.put_pixel(0, 0, [0, 0, 0, 255]);
            base.image.put_pixel(1, 0, [0, 0, 0, 128]);
        }
        let top = stack.add_layer();
        stack.get_mut(top).unwrap().image.fill(Color::rgb(0, 0, 255));
        stack.toggle_clipping(top).unwrap();

        let mut compositor = Compositor::new(20);
        let out = compositor.composite(&stack, false);
        assert_eq!(out.pixel(0, 0), [0, 0, 255, 255]);
        assert_eq!(out.pixel(1, 0)[3], 128);
        assert_eq!(out.pixel(1, 0)[2], 128);
        assert_eq!(out.pixel(2, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_hidden_group_hides_children() {
        let mut stack = LayerStack::new(4, 4, Color::WHITE);
        let group = stack.add_group();
        let child = stack.add_layer();
        stack.get_mut(child).unwrap().image.fill(Color::BLACK);
        let mut compositor = Compositor::new(20);
        assert_eq!(compositor.composite(&stack, false).pixel(0, 0), [0, 0, 0, 255]);
        stack.toggle_visibility(group).unwrap();
        assert_eq!(compositor.composite(&stack, false).pixel(0, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn test_clip_chain_inside_group_and_orphans() {
        const BLUE: [u8; 4] = [0, 0, 255, 255];
        let mut stack = LayerStack::new(10, 10, Color::WHITE);
        let group = stack.add_group();
        let base = stack.add_layer();
        stack.get_mut(base).unwrap().image.put_pixel(5, 5, [0, 0, 0, 255]);
        let clip = stack.add_layer();
        stack.get_mut(clip).unwrap().image.fill(Color::rgb(0, 0, 255));
        stack.toggle_clipping(clip).unwrap();

        let mut compositor = Compositor::new(20);
        let out = compositor.composite(&stack, false);
        assert_eq!(out.pixel(5, 5), BLUE);
        assert_eq!(out.pixel(0, 0), [255, 255, 255, 255]);

        // with its base gone the clipped layer still shows
        stack.remove_layer(base).unwrap();
        assert!(stack.layers()[group + 1].clipped);
        let out = compositor.composite(&stack, false);
        assert_eq!(out.pixel(5, 5), BLUE);
        assert_eq!(out.pixel(0, 0), BLUE);
    }

    #[test]
    fn test_paint_zoom_border_and_checker() {
        let mut stack = LayerStack::new(4, 4, Color::WHITE);
        stack.get_mut(1).unwrap().image.put_pixel(0, 0, [0, 0, 0, 255]);
        let mut compositor = Compositor::new(2);
        let view = ViewTransform::new(Point::new(2.0, 2.0), 2.0);
        let frame = compositor.paint(&stack, &view, 16, 16, None);
        assert_eq!(frame.pixel(2, 2), [0, 0, 0, 255]);
        assert_eq!(frame.pixel(3, 3), [0, 0, 0, 255]);
        assert_eq!(frame.pixel(4, 4), [255, 255, 255, 255]);
        assert_eq!(frame.pixel(1, 5), BORDER);
        assert_eq!(frame.pixel(15, 15), WORKSPACE);

        stack.toggle_visibility(0).unwrap();
        let frame = compositor.paint(&stack, &view, 16, 16, None);
        // canvas (2.25, 0.25) lies in the second checker tile
        assert_eq!(frame.pixel(6, 2), CHECKER_DARK);
        assert_eq!(frame.pixel(4, 4), CHECKER_LIGHT);
    }

    #[test]
    fn test_ghost_cursor_drawn() {
        let stack = LayerStack::new(20, 20, Color::WHITE);
        // extent of an 8px stamp
        let stamp = PixelBuffer::filled(10, 10, [0, 0, 0, 255]);
        let ghost = GhostCursor {
            stamp: &stamp,
            base_size: 8.0,
            position: Point::new(10.0, 10.0),
            size: 8.0,
            opacity: 0.5,
        };
        let mut compositor = Compositor::new(20);
        let frame = compositor.paint(&stack, &ViewTransform::default(), 20, 20, Some(ghost));
        let px = frame.pixel(10, 10);
        assert!(px[0] < 200 && px[0] > 60);
        assert_eq!(frame.pixel(0, 0), [255, 255, 255, 255]);
    }
}
