//! Stroke engine - walks the line between smoothed samples at brush spacing
//! and lays one dab per step through the family's write strategy.

use std::f32::consts::TAU;
use std::time::{Duration, Instant};

use image::GrayImage;

use super::dab::{render_ellipse, render_stamp, Dab, DabPatch, DabTarget, DabWrite};
use super::dynamics::{FamilyDynamics, StrokeRng};
use super::tips::MAX_STAMP_SIZE;
use super::{BrushDescriptor, BrushFamily, StampCache, TipLibrary};
use crate::history::StrokeCapture;
use crate::input::{Point, StrokeSample};
use crate::layer::pixel::{lerp_f32, straight_rgb, to_f32, Color};
use crate::layer::{BlendMode, PixelBuffer, Rect};
use crate::mixing::{flow_mask, mix_saturated, rms_mix, RmsParams, WetMaps};
use crate::pattern::noise::{blur, hash2, Edge};
use crate::pattern::PaperTexture;

/// Ink dabs up to this diameter are drawn straight from the ellipse.
pub const SMALL_INK_SIZE: f32 = 8.0;

const TAPER_STEPS: usize = 3;
/// Segments with more steps than this get tapered ends.
const TAPER_MIN_STEPS: usize = 8;

const PAINT_LOAD_DECAY: f32 = 0.99;
const MIN_PAINT_LOAD: f32 = 0.1;
/// Share of the picked-up color mixed into an oil dab.
const PICKUP_MIX: f32 = 0.35;
/// Opacity factor of the tinted dab laid on top of a wet blend.
const WET_TINT: f32 = 0.35;

/// Everything a stroke writes into or reads from, borrowed for one call.
pub struct StrokeContext<'a> {
    pub image: &'a mut PixelBuffer,
    pub alpha_lock: bool,
    pub selection: Option<&'a GrayImage>,
    pub paper: &'a PaperTexture,
    pub wet: Option<&'a mut WetMaps>,
    pub cache: &'a mut StampCache,
    pub tips: &'a TipLibrary,
    pub brush: &'a BrushDescriptor,
    pub color: Color,
    pub capture: &'a mut StrokeCapture,
}

/// Outcome of a press or segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStats {
    /// Dabs placed (including fully clipped ones)
    pub dabs: usize,
    /// The segment ran out of its time budget
    pub aborted: bool,
    /// Union of the touched pixel rectangles
    pub dirty: Rect,
}

impl Default for StrokeStats {
    fn default() -> Self {
        Self {
            dabs: 0,
            aborted: false,
            dirty: Rect::empty(),
        }
    }
}

impl StrokeStats {
    pub fn merge(&mut self, other: &StrokeStats) {
        self.dabs += other.dabs;
        self.aborted |= other.aborted;
        self.dirty.union(&other.dirty);
    }
}

/// Pressure factor for step `i` of `steps`: the first and last three steps
/// of long segments ramp from 0.925 to 1.
#[inline]
fn taper(i: usize, steps: usize) -> f32 {
    if steps <= TAPER_MIN_STEPS {
        return 1.0;
    }
    let k = i.min(steps - 1 - i);
    if k < TAPER_STEPS {
        0.9 + 0.1 * (k + 1) as f32 / (TAPER_STEPS + 1) as f32
    } else {
        1.0
    }
}

#[derive(Debug)]
pub struct StrokeEngine {
    budget: Duration,
    residue: f32,
    last: Option<StrokeSample>,
    paint_load: f32,
    tangent: f32,
    rng: StrokeRng,
    dynamics: FamilyDynamics,
}

impl StrokeEngine {
    pub fn new(budget_ms: u64) -> Self {
        Self {
            budget: Duration::from_millis(budget_ms.max(1)),
            residue: 0.0,
            last: None,
            paint_load: 1.0,
            tangent: 0.0,
            rng: StrokeRng::default(),
            dynamics: FamilyDynamics::default(),
        }
    }

    pub fn set_budget(&mut self, budget_ms: u64) {
        self.budget = Duration::from_millis(budget_ms.max(1));
    }

    /// Distance travelled since the last dab.
    pub fn residue(&self) -> f32 {
        self.residue
    }

    pub fn paint_load(&self) -> f32 {
        self.paint_load
    }

    pub fn is_stroking(&self) -> bool {
        self.last.is_some()
    }

    /// Dab step for `width`: `max(floor, width · spacing)` with the family floor.
    pub fn spacing(brush: &BrushDescriptor, width: f32, tips: &TipLibrary) -> f32 {
        let fraction = match brush.family {
            BrushFamily::Imported => brush
                .custom_tip
                .as_deref()
                .or(Some(brush.name.as_str()))
                .and_then(|name| tips.get(name))
                .map_or(brush.spacing, |tip| tip.spacing),
            _ => brush.spacing,
        };
        let nominal = width * fraction;
        let floor = if brush.family == BrushFamily::Inking {
            1.0
        } else if brush.is_wet() {
            (0.08 * width).max(2.0)
        } else if brush.family.is_oil() {
            (0.02 * width).max(1.0)
        } else {
            nominal.max(0.5)
        };
        nominal.max(floor)
    }

    /// Most dabs a single segment may place for a brush `width`.
    pub fn dab_cap(width: f32) -> usize {
        if width <= 50.0 {
            300
        } else if width > 300.0 {
            15
        } else {
            (300.0 - (width - 50.0) / 250.0 * 285.0) as usize
        }
    }

    /// Start a stroke: reseed jitter, reset residue and place the press dab.
    pub fn begin(&mut self, ctx: &mut StrokeContext<'_>, sample: StrokeSample) -> StrokeStats {
        self.rng.reseed(ctx.brush.seed());
        self.dynamics = FamilyDynamics::for_family(ctx.brush.family);
        self.residue = 0.0;
        self.paint_load = 1.0;
        self.tangent = ctx.brush.angle.to_radians();
        self.last = Some(sample);

        let mut stats = StrokeStats::default();
        self.place(ctx, sample.position, sample.pressure, sample.rotation, &mut stats);
        stats
    }

    /// Continue the stroke to `sample`.
    pub fn stroke_to(&mut self, ctx: &mut StrokeContext<'_>, sample: StrokeSample) -> StrokeStats {
        let Some(from) = self.last else {
            return self.begin(ctx, sample);
        };
        let stats = self.stroke_segment(ctx, from, sample);
        self.last = Some(sample);
        stats
    }

    /// Walk `from -> to` placing dabs every spacing step, carrying the residue.
    ///
    /// A zero-length segment places nothing. When the wall-clock budget runs
    /// out the remaining dabs are dropped but the residue is kept as if the
    /// whole segment had been walked.
    pub fn stroke_segment(
        &mut self,
        ctx: &mut StrokeContext<'_>,
        from: StrokeSample,
        to: StrokeSample,
    ) -> StrokeStats {
        let mut stats = StrokeStats::default();
        let d = from.position.distance(to.position);
        if !d.is_finite() || d <= 0.0 {
            return stats;
        }
        let width = ctx.brush.size.max(1.0);
        let s = Self::spacing(ctx.brush, width, ctx.tips);
        let total = self.residue + d;
        if total < s {
            self.residue = total;
            return stats;
        }

        let nominal = (total / s).floor() as usize;
        let first = s - self.residue;
        let last = first + (nominal - 1) as f32 * s;
        self.residue = total - nominal as f32 * s;
        self.tangent = (to.position.y - from.position.y).atan2(to.position.x - from.position.x);

        let steps = nominal.min(Self::dab_cap(width));
        let start = Instant::now();
        for i in 0..steps {
            let dist = if steps == nominal {
                first + i as f32 * s
            } else if steps == 1 {
                last
            } else {
                // capped: spread the dabs evenly over the same span
                first + (last - first) * i as f32 / (steps - 1) as f32
            };
            let sample = from.lerp(to, (dist / d).clamp(0.0, 1.0));
            let pressure = sample.pressure * taper(i, steps);
            self.place(ctx, sample.position, pressure, sample.rotation, &mut stats);

            if i + 1 < steps && start.elapsed() > self.budget {
                stats.aborted = true;
                tracing::debug!(
                    "Segment budget of {:?} exceeded after {}/{} dabs",
                    self.budget,
                    i + 1,
                    steps
                );
                break;
            }
        }
        stats
    }

    /// Finish the stroke; the residue is dropped.
    pub fn end(&mut self) {
        self.last = None;
        self.residue = 0.0;
    }

    /// Apply dynamics and jitter, then lay one dab.
    fn place(
        &mut self,
        ctx: &mut StrokeContext<'_>,
        position: Point,
        pressure: f32,
        rotation_deg: f32,
        stats: &mut StrokeStats,
    ) {
        let brush = ctx.brush;
        let dynamics = self.dynamics;

        let mut size = dynamics.size(brush.size.max(1.0), pressure);
        if dynamics.size_jitter > 0.0 {
            size = (size * (1.0 + self.rng.symmetric(dynamics.size_jitter))).max(1.0);
        }
        let mut opacity = dynamics.opacity(brush.opacity, pressure);
        if dynamics.opacity_jitter > 0.0 {
            opacity = (opacity * (1.0 + self.rng.symmetric(dynamics.opacity_jitter))).clamp(0.0, 1.0);
        }
        if brush.family.is_oil() {
            opacity *= self.paint_load;
        }

        let mut center = position;
        if dynamics.scatter > 0.0 {
            let along = self.rng.symmetric(dynamics.scatter) * size;
            let across = self.rng.symmetric(dynamics.scatter) * size;
            let (sin, cos) = self.tangent.sin_cos();
            center.x += along * cos - across * sin;
            center.y += along * sin + across * cos;
        }

        let angle = if dynamics.random_rotation {
            self.rng.unit() * TAU
        } else if dynamics.follow_tangent || brush.dynamic_angle {
            self.tangent + self.rng.symmetric(dynamics.rotation_jitter_deg).to_radians()
        } else {
            (brush.angle + rotation_deg + self.rng.symmetric(dynamics.rotation_jitter_deg)).to_radians()
        };

        let dab = Dab {
            x: center.x,
            y: center.y,
            size,
            angle,
            opacity,
            pressure,
        };
        if let Some(rect) = self.apply_dab(ctx, &dab) {
            stats.dirty.union(&rect);
        }
        stats.dabs += 1;

        if brush.family.is_oil() {
            self.paint_load = (self.paint_load * PAINT_LOAD_DECAY).max(MIN_PAINT_LOAD);
        }
    }

    /// Render and write one dab. Returns the touched rectangle, or `None`
    /// when no pixel changed.
    fn apply_dab(&mut self, ctx: &mut StrokeContext<'_>, dab: &Dab) -> Option<Rect> {
        let brush = ctx.brush;
        let bounds = ctx.image.bounds();
        // rendered at full strength; each strategy applies the dab opacity
        let shape = Dab { opacity: 1.0, ..*dab };
        let mut patch = if brush.family == BrushFamily::Inking && dab.size <= SMALL_INK_SIZE {
            render_ellipse(ctx.color, brush.roundness, &shape, bounds)?
        } else {
            let stamp = ctx.cache.get(brush, ctx.color, ctx.tips);
            render_stamp(&stamp, brush.size.clamp(1.0, MAX_STAMP_SIZE), &shape, bounds)?
        };
        if !patch.has_coverage() {
            return None;
        }
        ctx.capture.ensure(ctx.image);
        let rect = patch.rect();

        let changed = match brush.family {
            BrushFamily::Eraser => {
                scale_patch(&mut patch, dab.opacity);
                let mut target = DabTarget::new(ctx.image, ctx.alpha_lock, ctx.selection);
                target.write_patch(&patch, DabWrite::Erase)
            }
            _ if brush.is_wet() => self.wet_dab(ctx, &patch, dab),
            BrushFamily::Pencil => {
                let grain = brush.grain;
                let paper = ctx.paper;
                let opacity = dab.opacity;
                patch.map(|x, y, p| {
                    let tooth = (1.0 - grain) + grain * paper.sample(x as i64, y as i64);
                    let k = opacity * tooth;
                    [p[0] * k, p[1] * k, p[2] * k, p[3] * k]
                });
                let mode = match brush.blend {
                    BlendMode::Normal => BlendMode::Multiply,
                    other => other,
                };
                let mut target = DabTarget::new(ctx.image, ctx.alpha_lock, ctx.selection);
                target.write_patch(&patch, DabWrite::Over(mode))
            }
            BrushFamily::Oil | BrushFamily::Acrylic => {
                let shift = pickup_shift(ctx.image, dab, ctx.color);
                let opacity = dab.opacity;
                patch.map(|_, _, p| {
                    if p[3] <= 0.0 {
                        return p;
                    }
                    let s = straight_rgb(p);
                    let a = p[3] * opacity;
                    [
                        (s[0] + shift[0]).clamp(0.0, 1.0) * a,
                        (s[1] + shift[1]).clamp(0.0, 1.0) * a,
                        (s[2] + shift[2]).clamp(0.0, 1.0) * a,
                        a,
                    ]
                });
                let mut target = DabTarget::new(ctx.image, ctx.alpha_lock, ctx.selection);
                target.write_patch(&patch, DabWrite::Over(brush.blend))
            }
            _ => {
                scale_patch(&mut patch, dab.opacity);
                let mut target = DabTarget::new(ctx.image, ctx.alpha_lock, ctx.selection);
                target.write_patch(&patch, DabWrite::Over(brush.blend))
            }
        };
        if changed == 0 {
            return None;
        }
        ctx.capture.mark_changed();
        Some(rect)
    }

    /// Blur the area under the dab, mask it by the stamp alpha and, unless
    /// the brush only blends, lay an RMS-mixed tint on top.
    fn wet_dab(&mut self, ctx: &mut StrokeContext<'_>, patch: &DabPatch, dab: &Dab) -> usize {
        let brush = ctx.brush;
        let rect = patch.rect();
        let wetness = ctx.wet.as_deref().map_or(0.0, |w| w.max_wetness(rect));
        let sigma = 1.0 + brush.diffusion * 2.0 + wetness * 2.0;
        let radius = (sigma * 3.0).ceil() as i32;
        let outer = Rect::new(
            rect.left - radius,
            rect.top - radius,
            rect.right + radius,
            rect.bottom + radius,
        )
        .intersect(&ctx.image.bounds());
        let (ow, oh) = (outer.width() as usize, outer.height() as usize);

        let mut planes: [Vec<f32>; 4] = Default::default();
        for plane in planes.iter_mut() {
            plane.reserve(ow * oh);
        }
        for y in outer.top..outer.bottom {
            for x in outer.left..outer.right {
                let px = to_f32(ctx.image.pixel(x as u32, y as u32));
                for (plane, v) in planes.iter_mut().zip(px) {
                    plane.push(v);
                }
            }
        }
        let blurred = planes.map(|plane| blur(&plane, ow, oh, sigma, Edge::Clamp));

        let period = ctx.paper.size() as i64;
        let seed = brush.seed();
        let color_rgb = ctx.color.rgb_f32();
        let params = RmsParams {
            opacity: WET_TINT * dab.opacity,
            pressure: dab.pressure,
            granulation: brush.granulation,
            diffusion: brush.diffusion,
        };
        let paper = ctx.paper;
        let mut wet = ctx.wet.as_deref_mut();
        let mut target = DabTarget::new(ctx.image, ctx.alpha_lock, ctx.selection);
        let mut changed = 0;
        for (x, y, p) in patch.iter() {
            let m = p[3];
            if m <= 0.0 {
                continue;
            }
            let i = (y - outer.top) as usize * ow + (x - outer.left) as usize;
            let soft = [blurred[0][i], blurred[1][i], blurred[2][i], blurred[3][i]];
            let mut new = lerp_f32(target.read(x, y), soft, m);
            if !brush.blend_only {
                let (xi, yi) = (x as i64, y as i64);
                let noise = hash2(xi.rem_euclid(period), yi.rem_euclid(period), seed);
                let flow = flow_mask(paper.sample(xi, yi), noise, brush.granulation);
                new = rms_mix(new, color_rgb, m, flow, &params);
            }
            if target.write(x, y, new, DabWrite::Replace) {
                changed += 1;
                if let Some(maps) = wet.as_deref_mut() {
                    maps.deposit(x, y, m * 0.5, m * dab.opacity * WET_TINT);
                }
            }
        }
        changed
    }
}

impl Default for StrokeEngine {
    fn default() -> Self {
        Self::new(100)
    }
}

fn scale_patch(patch: &mut DabPatch, opacity: f32) {
    if opacity >= 1.0 {
        return;
    }
    patch.map(|_, _, p| [p[0] * opacity, p[1] * opacity, p[2] * opacity, p[3] * opacity]);
}

/// Color offset from mixing the paint under the dab center into the brush color.
fn pickup_shift(image: &PixelBuffer, dab: &Dab, color: Color) -> [f32; 3] {
    let cx = dab.x.floor() as i64;
    let cy = dab.y.floor() as i64;
    let mut sum = [0.0f32; 4];
    let mut n = 0.0;
    for y in cy - 1..=cy + 1 {
        for x in cx - 1..=cx + 1 {
            if let Some(px) = image.get(x, y) {
                let p = to_f32(px);
                for c in 0..4 {
                    sum[c] += p[c];
                }
                n += 1.0;
            }
        }
    }
    if n == 0.0 {
        return [0.0; 3];
    }
    let avg = sum.map(|v| v / n);
    if avg[3] <= 0.0 {
        return [0.0; 3];
    }
    let base = color.rgb_f32();
    let mixed = mix_saturated(base, straight_rgb(avg), PICKUP_MIX * avg[3]);
    [mixed[0] - base[0], mixed[1] - base[1], mixed[2] - base[2]]
}
