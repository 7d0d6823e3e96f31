use super::EvalContext;
use crate::consts::{MIN_LA_POINTS, MM_TO_UM};
use crate::error::{EvalFault, EvalResult};
use crate::merit::cache::EvalCache;
use crate::merit::params::resolve_wavelength;
use crate::merit::Operand;
use crate::optics::paraxial::PrimaryMetrics;
use crate::optics::raytrace::{aim_ray, FieldPoint, RayTracer, TraceOptions};
use crate::optics::PreparedSystem;

/// Area-weighted RMS of the axial crossing distance from the paraxial image, in µm.
/// Needs at least two meridional rays that reach the last surface.
pub fn evaluate(ctx: &mut EvalContext, op: &Operand) -> EvalResult<f64> {
    let sys = ctx.system(&op.config_id)?;
    let wavelength = resolve_wavelength(
        &op.param1,
        &sys.source,
        ctx.config.eval.default_wavelength_um,
    );
    let prepared = ctx.prepared(&sys, wavelength)?;
    let metrics = ctx.primary(&sys, wavelength)?;
    let samples = ctx.config.eval.la_samples;
    let tracer = ctx.tracer;

    let key = EvalCache::key(
        "la",
        &sys.key,
        &format!("{}:{samples}", EvalCache::wavelength_key(wavelength)),
    );
    ctx.cache
        .memo(key, || la_rms_um(&prepared, &metrics, tracer, samples))
}

pub fn la_rms_um(
    sys: &PreparedSystem,
    metrics: &PrimaryMetrics,
    tracer: &dyn RayTracer,
    samples: usize,
) -> EvalResult<f64> {
    let paraxial_focus = EvalFault::require_finite(metrics.imd, "paraxial image distance")?;
    let last = sys.last_surface();
    let opts = TraceOptions {
        clip_apertures: true,
        stop_at: Some(last),
    };
    if samples < MIN_LA_POINTS {
        return Err(EvalFault::invalid_input(format!(
            "{samples} longitudinal samples, need at least {MIN_LA_POINTS}"
        )));
    }
    let dr = 1.0 / samples as f64;

    let (mut acc, mut weight, mut finite) = (0.0, 0.0, 0usize);
    for i in 0..samples {
        let rho = (i as f64 + 0.5) * dr;
        let Ok(ray) = aim_ray(
            sys,
            FieldPoint::ON_AXIS,
            metrics.enpp,
            metrics.ep_radius(),
            0.0,
            rho,
        ) else {
            continue;
        };
        let Ok(path) = tracer.trace(sys, &ray, &opts) else {
            continue;
        };
        let Some(hit) = path.last() else {
            continue;
        };
        if hit.dir.y.abs() < 1e-15 {
            continue;
        }
        let crossing = hit.local.z - hit.local.y * hit.dir.z / hit.dir.y;
        let la = crossing - paraxial_focus;
        if !la.is_finite() {
            continue;
        }
        let w = 2.0 * rho * dr;
        acc += w * la * la;
        weight += w;
        finite += 1;
    }

    if finite < MIN_LA_POINTS {
        return Err(EvalFault::ray_trace_failed(format!(
            "{finite} meridional rays reached the last surface, need {MIN_LA_POINTS}"
        )));
    }
    Ok((acc / weight).sqrt() * MM_TO_UM)
}
