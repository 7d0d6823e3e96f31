use super::EvalContext;
use crate::error::{EvalFault, EvalResult};
use crate::merit::params::resolve_wavelength;
use crate::merit::Operand;
use crate::optics::paraxial::PrimaryMetric;

pub fn evaluate(ctx: &mut EvalContext, op: &Operand, metric: PrimaryMetric) -> EvalResult<f64> {
    let sys = ctx.system(&op.config_id)?;
    let wavelength = resolve_wavelength(
        &op.param1,
        &sys.source,
        ctx.config.eval.default_wavelength_um,
    );
    let metrics = ctx.primary(&sys, wavelength)?;
    EvalFault::require_finite(metrics.get(metric), &metric.to_string())
}
