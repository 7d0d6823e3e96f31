pub mod clearance;
pub mod effl;
pub mod longitudinal;
pub mod primary;
pub mod seidel;
pub mod spot;
pub mod zernike;

use super::cache::EvalCache;
use super::operand::{OperandFamily, OperandKind};
use super::Operand;
use crate::config::Config;
use crate::error::EvalResult;
use crate::optics::glass::GlassCatalog;
use crate::optics::paraxial::PrimaryMetrics;
use crate::optics::raytrace::RayTracer;
use crate::optics::wavefront::CancelToken;
use crate::optics::PreparedSystem;
use crate::system::{ResolvedSystem, Resolver, SpotPattern};
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, warn};

use self::zernike::ExternalZernikeFit;

/// Display mode traces every spot ray; fast mode may abort early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    Display,
    Fast,
}

/// What a kernel may touch during one batch.
pub struct EvalContext<'a> {
    pub resolver: &'a Resolver<'a>,
    pub cache: &'a mut EvalCache,
    pub config: &'a Config,
    pub tracer: &'a dyn RayTracer,
    pub glasses: &'a GlassCatalog,
    pub mode: EvalMode,
    pub external_fits: &'a [ExternalZernikeFit],
    pub cancel: &'a CancelToken,
    pub last_spot_pattern: &'a Cell<Option<SpotPattern>>,
}

impl EvalContext<'_> {
    pub fn system(&mut self, config_ref: &str) -> EvalResult<Rc<ResolvedSystem>> {
        let key = EvalCache::key("system", &self.resolver.key_for(config_ref), "");
        let resolver = self.resolver;
        self.cache
            .memo(key, || resolver.resolve(config_ref).map(Rc::new))
    }

    pub fn prepared(
        &mut self,
        sys: &ResolvedSystem,
        wavelength_um: f64,
    ) -> EvalResult<Rc<PreparedSystem>> {
        let key = EvalCache::key("prepared", &sys.key, &EvalCache::wavelength_key(wavelength_um));
        let glasses = self.glasses;
        self.cache.memo(key, || {
            PreparedSystem::from_rows_with(&sys.rows, wavelength_um, glasses).map(Rc::new)
        })
    }

    pub fn primary(&mut self, sys: &ResolvedSystem, wavelength_um: f64) -> EvalResult<PrimaryMetrics> {
        let prepared = self.prepared(sys, wavelength_um)?;
        let key = EvalCache::key("primary", &sys.key, &EvalCache::wavelength_key(wavelength_um));
        self.cache.memo(key, || Ok(PrimaryMetrics::compute(&prepared)))
    }

    pub fn failure_penalty(&self) -> f64 {
        self.config.eval.failure_penalty
    }
}

/// Evaluates one operand. Always finite: failures become penalties.
pub fn evaluate(ctx: &mut EvalContext, op: &Operand) -> f64 {
    let Some(kind) = OperandKind::parse(&op.operand) else {
        warn!(operand = %op.operand, "unknown operand");
        return ctx.failure_penalty();
    };

    let result = match kind.family() {
        OperandFamily::Primary(metric) => primary::evaluate(ctx, op, metric),
        OperandFamily::Effl => effl::evaluate(ctx, op),
        OperandFamily::Seidel(term) => seidel::evaluate(ctx, op, term),
        OperandFamily::Spot(variant) => spot::evaluate(ctx, op, variant),
        OperandFamily::LongitudinalRms => longitudinal::evaluate(ctx, op),
        OperandFamily::Zernike => zernike::evaluate(ctx, op),
        OperandFamily::Clearance => clearance::evaluate(ctx, op),
        OperandFamily::Deprecated => Ok(0.0),
    };

    match result {
        Ok(v) if v.is_finite() => {
            debug!(operand = %kind, config = %op.config_id, value = v, "evaluated");
            v
        }
        Ok(v) => {
            debug!(operand = %kind, value = v, "non-finite value replaced by penalty");
            ctx.failure_penalty()
        }
        Err(e) => {
            debug!(operand = %kind, error = %e, "operand failed");
            ctx.failure_penalty()
        }
    }
}
