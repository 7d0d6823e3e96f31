use super::EvalContext;
use crate::error::{EvalFault, EvalResult};
use crate::merit::cache::EvalCache;
use crate::merit::params::resolve_wavelength;
use crate::merit::Operand;
use crate::optics::paraxial::PrimaryMetrics;
use crate::optics::raytrace::{aim_ray, FieldPoint, RayTracer, TraceOptions};
use crate::optics::PreparedSystem;

const BISECTION_STEPS: usize = 48;

/// `|y_edge| + margin - semidia` on one surface, worst case over every
/// field and both meridional stop edges.
pub fn evaluate(ctx: &mut EvalContext, op: &Operand) -> EvalResult<f64> {
    let sys = ctx.system(&op.config_id)?;
    let surface = op
        .param1
        .as_index()
        .map(|id| id - 1)
        .ok_or_else(|| EvalFault::invalid_input(format!("surface id '{}'", op.param1)))?;
    let wavelength = resolve_wavelength(
        &op.param2,
        &sys.source,
        ctx.config.eval.default_wavelength_um,
    );
    let margin = op.param3.as_number().unwrap_or(0.0);

    let prepared = ctx.prepared(&sys, wavelength)?;
    if prepared.stop.is_none() {
        return Ok(0.0);
    }
    if surface == 0 || surface >= prepared.len() {
        return Err(EvalFault::invalid_input(format!(
            "surface {surface} is outside the system"
        )));
    }
    let Some(semidia) = prepared.surfaces[surface].semidia else {
        return Ok(0.0);
    };

    let metrics = ctx.primary(&sys, wavelength)?;
    let fields: Vec<FieldPoint> = if sys.object.is_empty() {
        vec![FieldPoint::ON_AXIS]
    } else {
        sys.object.iter().map(|row| row.field_point()).collect()
    };
    let tracer = ctx.tracer;
    let key = EvalCache::key(
        "clrh",
        &sys.key,
        &format!("{}:{surface}", EvalCache::wavelength_key(wavelength)),
    );
    let edge = ctx.cache.memo(key, || {
        edge_height(&prepared, &metrics, tracer, &fields, surface)
    })?;
    Ok(edge + margin - semidia)
}

/// Largest ray height on `surface` for rays through the stop edges.
pub fn edge_height(
    sys: &PreparedSystem,
    metrics: &PrimaryMetrics,
    tracer: &dyn RayTracer,
    fields: &[FieldPoint],
    surface: usize,
) -> EvalResult<f64> {
    let stop = sys.stop_index();
    let stop_edge = sys.stop_semidia();
    let free = TraceOptions::default();

    let mut worst: Option<f64> = None;
    for &field in fields {
        for sign in [1.0, -1.0] {
            let y_at_stop = |py: f64| -> Option<f64> {
                let ray = aim_ray(sys, field, metrics.enpp, metrics.ep_radius(), 0.0, py).ok()?;
                let hits = tracer
                    .trace(
                        sys,
                        &ray,
                        &TraceOptions {
                            clip_apertures: false,
                            stop_at: Some(stop),
                        },
                    )
                    .ok()?;
                hits.last().map(|h| h.local.y)
            };
            let py = solve_pupil(&y_at_stop, sign * stop_edge, sign).unwrap_or(sign);

            let Ok(ray) = aim_ray(sys, field, metrics.enpp, metrics.ep_radius(), 0.0, py) else {
                continue;
            };
            let Ok(hits) = tracer.trace(sys, &ray, &free) else {
                continue;
            };
            if let Some(hit) = hits.iter().find(|h| h.surface == surface) {
                let r = hit.radius();
                worst = Some(worst.map_or(r, |w| w.max(r)));
            }
        }
    }
    worst.ok_or_else(|| EvalFault::ray_trace_failed(format!("no edge ray reached surface {surface}")))
}

/// Pupil coordinate whose ray meets the stop at `target`, by bracketing and bisection.
fn solve_pupil(y_at_stop: &dyn Fn(f64) -> Option<f64>, target: f64, sign: f64) -> Option<f64> {
    let g = |p: f64| y_at_stop(p).map(|y| y - target);
    let mut lo = 0.0;
    let mut g_lo = g(lo)?;
    let mut hi = sign;
    let mut g_hi = g(hi)?;
    let mut expansions = 0;
    while g_lo.signum() == g_hi.signum() {
        if expansions == 3 {
            return None;
        }
        lo = hi;
        g_lo = g_hi;
        hi *= 2.0;
        g_hi = g(hi)?;
        expansions += 1;
    }
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        let g_mid = g(mid)?;
        if g_mid == 0.0 {
            return Some(mid);
        }
        if g_mid.signum() == g_lo.signum() {
            lo = mid;
            g_lo = g_mid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi))
}
