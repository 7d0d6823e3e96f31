use super::{EvalContext, EvalMode};
use crate::config::FastAbortParams;
use crate::consts::{DEFAULT_SPOT_RAY_COUNT, FAILURE_PENALTY, MM_TO_UM};
use crate::error::{ApertureBlock, EvalResult, FaultKind};
use crate::merit::operand::SpotVariant;
use crate::merit::params::{count, field_row, keyword, resolve_wavelength};
use crate::merit::Operand;
use crate::optics::raytrace::{aim_ray, FieldPoint, SurfaceHit, TraceOptions};
use crate::surface::{SurfaceRow, SurfaceType};
use crate::system::{ResolvedSystem, SpotPattern};
use serde::Serialize;
use std::f64::consts::TAU;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotMetric {
    Rms,
    Diameter,
}

impl SpotMetric {
    pub fn parse(word: &str) -> Self {
        match word {
            "diameter" | "dia" | "d" | "geo" => SpotMetric::Diameter,
            _ => SpotMetric::Rms,
        }
    }
}

/// A normalized pupil coordinate. The chief sample sits at the centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PupilPoint {
    pub px: f64,
    pub py: f64,
    pub chief: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotReport {
    pub surface: usize,
    pub pattern: SpotPattern,
    pub rays_traced: usize,
    pub hits: usize,
    pub rms_x_um: f64,
    pub rms_y_um: f64,
    pub rms_um: f64,
    pub diameter_um: f64,
    pub aborted: bool,
}

impl SpotReport {
    pub fn value(&self, metric: SpotMetric) -> f64 {
        match metric {
            SpotMetric::Rms => self.rms_um,
            SpotMetric::Diameter => self.diameter_um,
        }
    }
}

/// Everything that selects what a spot operand traces.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotRequest {
    pub wavelength_um: f64,
    pub field: FieldPoint,
    pub pattern: SpotPattern,
    pub ray_count: usize,
    pub ring_count: usize,
    pub surface: usize,
}

pub fn evaluate(ctx: &mut EvalContext, op: &Operand, variant: SpotVariant) -> EvalResult<f64> {
    let sys = ctx.system(&op.config_id)?;
    let request = build_request(ctx, op, variant, &sys)?;
    let metric = SpotMetric::parse(&keyword(&op.param3));

    match trace_spot(ctx, &sys, &request)? {
        SpotOutcome::Report(report) => {
            debug!(
                surface = report.surface,
                hits = report.hits,
                rms_um = report.rms_um,
                "spot traced"
            );
            Ok(report.value(metric))
        }
        SpotOutcome::Failed { last_block, aborted } => {
            debug!(aborted, "spot produced no usable hits");
            Ok(failure_value(ctx, last_block))
        }
    }
}

fn failure_value(ctx: &EvalContext, last_block: Option<ApertureBlock>) -> f64 {
    match ctx.mode {
        EvalMode::Display => ctx.failure_penalty(),
        EvalMode::Fast => bounded_penalty(ctx.config.spot.spot_penalty_base, last_block),
    }
}

/// `base·(1 + hitRadius/apertureLimit)` for aperture blocks, `base` otherwise.
pub fn bounded_penalty(base: f64, last_block: Option<ApertureBlock>) -> f64 {
    let v = match last_block {
        Some(b) => base * (1.0 + b.overshoot_ratio()),
        None => base,
    };
    v.min(FAILURE_PENALTY)
}

pub fn build_request(
    ctx: &EvalContext,
    op: &Operand,
    variant: SpotVariant,
    sys: &ResolvedSystem,
) -> EvalResult<SpotRequest> {
    let live = sys.live_spot.as_ref();
    let stored = sys.spot_settings.as_ref();

    let wavelength_um = match variant {
        SpotVariant::Current => sys.wavelength_primary,
        _ => resolve_wavelength(
            &op.param1,
            &sys.source,
            ctx.config.eval.default_wavelength_um,
        ),
    };
    let field = field_row(&op.param2, &sys.object)?
        .map(|row| row.field_point())
        .unwrap_or(FieldPoint::ON_AXIS);

    let pattern = match variant {
        SpotVariant::Annular => SpotPattern::Annular,
        SpotVariant::Rect => SpotPattern::Grid,
        SpotVariant::Current => {
            let chosen = live
                .and_then(|l| l.pattern)
                .or_else(|| stored.and_then(|s| s.pattern))
                .or_else(|| ctx.last_spot_pattern.get())
                .unwrap_or_default();
            ctx.last_spot_pattern.set(Some(chosen));
            chosen
        }
    };

    let ray_count = match count(&op.param4, 0, "ray count")? {
        0 => ctx
            .config
            .spot
            .spot_ray_count
            .or_else(|| live.and_then(|l| l.ray_count))
            .or_else(|| stored.and_then(|s| s.ray_count))
            .unwrap_or(DEFAULT_SPOT_RAY_COUNT),
        n => n,
    };
    let ring_count = live
        .and_then(|l| l.ring_count)
        .or_else(|| stored.and_then(|s| s.ring_count))
        .unwrap_or(ctx.config.spot.spot_ring_count)
        .max(1);

    let surface_id = live
        .and_then(|l| l.surface_id)
        .or_else(|| stored.and_then(|s| s.surface_id));
    let by_provenance = stored.and_then(|s| {
        let block = s.surface_block_id.as_deref()?;
        let role = s.surface_role?;
        sys.rows.iter().position(|r| r.provenance.matches(block, role))
    });
    let surface = target_surface(&sys.rows, by_provenance, surface_id);

    Ok(SpotRequest {
        wavelength_um,
        field,
        pattern,
        ray_count,
        ring_count,
        surface,
    })
}

fn is_spot_candidate(row: &SurfaceRow) -> bool {
    !row.is_object() && row.surf_type != SurfaceType::CoordinateTransform
}

/// Provenance match first, then a row id, then the last traceable surface.
pub fn target_surface(rows: &[SurfaceRow], by_provenance: Option<usize>, id: Option<usize>) -> usize {
    let image = rows.len().saturating_sub(1);
    if let Some(i) = by_provenance.filter(|&i| i > 0 && i <= image) {
        return i;
    }
    if let Some(i) = id
        .and_then(|id| id.checked_sub(1))
        .filter(|&i| rows.get(i).map(is_spot_candidate).unwrap_or(false))
    {
        return i;
    }
    rows.iter().rposition(is_spot_candidate).unwrap_or(image)
}

/// Centre plus `rings` concentric rings; ring `k` gets rays in proportion to `k`.
pub fn annular_samples(ray_count: usize, rings: usize) -> Vec<PupilPoint> {
    let mut out = vec![PupilPoint {
        px: 0.0,
        py: 0.0,
        chief: true,
    }];
    if ray_count <= 1 || rings == 0 {
        return out;
    }
    let remaining = ray_count - 1;
    let weight_sum = rings * (rings + 1) / 2;
    for k in 1..=rings {
        let n = ((remaining * k) as f64 / weight_sum as f64).round().max(1.0) as usize;
        let r = k as f64 / rings as f64;
        out.extend((0..n).map(|i| {
            let a = TAU * i as f64 / n as f64;
            PupilPoint {
                px: r * a.cos(),
                py: r * a.sin(),
                chief: false,
            }
        }));
    }
    out
}

/// Square grid with an odd side so the centre is sampled, masked to the unit circle.
pub fn grid_samples(ray_count: usize) -> Vec<PupilPoint> {
    if ray_count <= 1 {
        return vec![PupilPoint {
            px: 0.0,
            py: 0.0,
            chief: true,
        }];
    }
    // Enough points that the disk keeps about `ray_count` of them.
    let mut side = ((ray_count as f64) * 4.0 / std::f64::consts::PI).sqrt().ceil() as usize;
    if side % 2 == 0 {
        side += 1;
    }
    let side = side.max(3);
    let half = (side / 2) as f64;
    let mut out = Vec::with_capacity(side * side);
    for iy in 0..side {
        for ix in 0..side {
            let px = (ix as f64 - half) / half;
            let py = (iy as f64 - half) / half;
            if px * px + py * py <= 1.0 + 1e-12 {
                out.push(PupilPoint {
                    px,
                    py,
                    chief: ix as f64 == half && iy as f64 == half,
                });
            }
        }
    }
    out
}

enum Attempt {
    Hit,
    Miss,
    Blocked,
}

/// Decides when a fast-mode spot trace is hopeless.
struct AbortMonitor<'a> {
    params: &'a FastAbortParams,
    attempts: usize,
    hits: usize,
    miss_streak: usize,
    block_streak: usize,
}

impl<'a> AbortMonitor<'a> {
    fn new(params: &'a FastAbortParams) -> Self {
        Self {
            params,
            attempts: 0,
            hits: 0,
            miss_streak: 0,
            block_streak: 0,
        }
    }

    /// Records one ray; `true` means stop tracing.
    fn record(&mut self, attempt: Attempt) -> bool {
        self.attempts += 1;
        match attempt {
            Attempt::Hit => {
                self.hits += 1;
                self.miss_streak = 0;
                self.block_streak = 0;
            }
            Attempt::Miss => {
                self.miss_streak += 1;
                self.block_streak = 0;
            }
            Attempt::Blocked => {
                self.miss_streak += 1;
                self.block_streak += 1;
            }
        }

        let p = self.params;
        if self.attempts < p.abort_min_attempts {
            return false;
        }
        let hit_rate = self.hits as f64 / self.attempts as f64;
        if (hit_rate < p.abort_min_hit_rate && self.hits <= p.abort_max_hits)
            || self.miss_streak >= p.abort_miss_streak
            || self.block_streak >= p.abort_block_streak
        {
            return true;
        }
        // Past the cap a healthy rate still aborts if the hits stay too few.
        self.attempts >= p.abort_cap_attempts && self.hits <= p.abort_max_hits
    }
}

pub enum SpotOutcome {
    Report(SpotReport),
    Failed {
        last_block: Option<ApertureBlock>,
        aborted: bool,
    },
}

pub fn trace_spot(
    ctx: &mut EvalContext,
    sys: &ResolvedSystem,
    request: &SpotRequest,
) -> EvalResult<SpotOutcome> {
    let prepared = ctx.prepared(sys, request.wavelength_um)?;
    let metrics = ctx.primary(sys, request.wavelength_um)?;
    let samples = match request.pattern {
        SpotPattern::Annular => annular_samples(request.ray_count, request.ring_count),
        SpotPattern::Grid => grid_samples(request.ray_count),
    };
    let opts = TraceOptions {
        clip_apertures: true,
        stop_at: Some(request.surface),
    };

    let mut monitor = AbortMonitor::new(&ctx.config.abort);
    let mut hits: Vec<(SurfaceHit, bool)> = Vec::with_capacity(samples.len());
    let mut last_block = None;
    let mut aborted = false;

    for p in &samples {
        let traced = aim_ray(
            &prepared,
            request.field,
            metrics.enpp,
            metrics.ep_radius(),
            p.px,
            p.py,
        )
        .and_then(|ray| ctx.tracer.trace(&prepared, &ray, &opts));

        let attempt = match traced {
            Ok(path) => match path.last() {
                Some(hit) if hit.surface == request.surface => {
                    hits.push((*hit, p.chief));
                    Attempt::Hit
                }
                _ => Attempt::Miss,
            },
            Err(e) if e.kind == FaultKind::PhysicalApertureBlock => {
                last_block = e.aperture.or(last_block);
                Attempt::Blocked
            }
            Err(e) if e.kind == FaultKind::UnresolvableField => return Err(e),
            Err(_) => Attempt::Miss,
        };

        if ctx.mode == EvalMode::Fast && monitor.record(attempt) {
            aborted = true;
            break;
        }
    }

    if hits.is_empty() || aborted {
        return Ok(SpotOutcome::Failed {
            last_block,
            aborted,
        });
    }
    Ok(SpotOutcome::Report(summarize(
        &hits,
        request,
        samples.len(),
    )))
}

fn summarize(hits: &[(SurfaceHit, bool)], request: &SpotRequest, traced: usize) -> SpotReport {
    let n = hits.len() as f64;
    let cx = hits.iter().map(|(h, _)| h.local.x).sum::<f64>() / n;
    let cy = hits.iter().map(|(h, _)| h.local.y).sum::<f64>() / n;

    let chief = hits
        .iter()
        .find(|(_, is_chief)| *is_chief)
        .or_else(|| {
            hits.iter().min_by(|(a, _), (b, _)| {
                let da = (a.local.x - cx).hypot(a.local.y - cy);
                let db = (b.local.x - cx).hypot(b.local.y - cy);
                da.total_cmp(&db)
            })
        })
        .map(|(h, _)| (h.local.x, h.local.y))
        .unwrap_or((cx, cy));

    let (mut sx, mut sy, mut max_r) = (0.0, 0.0, 0.0f64);
    for (h, _) in hits {
        let dx = (h.local.x - chief.0) * MM_TO_UM;
        let dy = (h.local.y - chief.1) * MM_TO_UM;
        sx += dx * dx;
        sy += dy * dy;
        max_r = max_r.max(dx.hypot(dy));
    }
    let rms_x_um = (sx / n).sqrt();
    let rms_y_um = (sy / n).sqrt();

    SpotReport {
        surface: request.surface,
        pattern: request.pattern,
        rays_traced: traced,
        hits: hits.len(),
        rms_x_um,
        rms_y_um,
        rms_um: rms_x_um.hypot(rms_y_um),
        diameter_um: 2.0 * max_r,
        aborted: false,
    }
}
