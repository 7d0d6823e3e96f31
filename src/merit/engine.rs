use super::cache::EvalCache;
use super::kernels::{self, EvalContext, EvalMode};
use super::params;
use super::types::{MeritBreakdown, MeritTerm};
use super::{ExternalZernikeFit, Operand};
use crate::config::Config;
use crate::consts::CURRENT_CONFIG;
use crate::error::{EvalResult, LfResult};
use crate::optics::glass::GlassCatalog;
use crate::optics::psf::{self, Psf, PsfSampling};
use crate::optics::raytrace::{RayTracer, SequentialTracer};
use crate::optics::wavefront::CancelToken;
use crate::optics::PreparedSystem;
use crate::system::{LiveTables, Resolver, SpotPattern, SystemConfigurations};
use crate::value::Value;
use std::cell::Cell;
use tracing::info;
use typed_builder::TypedBuilder;

/// The snapshot a batch evaluates against.
#[derive(Debug, Clone, Copy)]
pub struct EvalInput<'a> {
    pub systems: &'a SystemConfigurations,
    pub live: Option<&'a LiveTables>,
}

impl<'a> EvalInput<'a> {
    pub fn new(systems: &'a SystemConfigurations) -> Self {
        Self {
            systems,
            live: None,
        }
    }

    pub fn with_live(mut self, live: &'a LiveTables) -> Self {
        self.live = Some(live);
        self
    }
}

/// One diffraction PSF, addressed like a merit operand.
#[derive(Debug, Clone, PartialEq)]
pub struct PsfRequest {
    pub config_id: String,
    /// 1-based object row.
    pub field: usize,
    /// Same convention as an operand's λ parameter.
    pub wavelength: Value,
    pub sampling: PsfSampling,
}

impl Default for PsfRequest {
    fn default() -> Self {
        Self {
            config_id: CURRENT_CONFIG.to_string(),
            field: 1,
            wavelength: Value::Auto,
            sampling: PsfSampling::default(),
        }
    }
}

#[derive(TypedBuilder)]
pub struct MeritEngine {
    #[builder(default)]
    pub config: Config,
    #[builder(default = Box::new(SequentialTracer) as Box<dyn RayTracer>)]
    tracer: Box<dyn RayTracer>,
    /// Glasses consulted before the built-in table.
    #[builder(default)]
    pub glasses: GlassCatalog,
    #[builder(default)]
    pub external_fits: Vec<ExternalZernikeFit>,
    #[builder(default)]
    pub cancel: CancelToken,
    /// Pattern last used by a `SPOT_SIZE_CURRENT` evaluation; survives batches.
    #[builder(default, setter(skip))]
    last_spot_pattern: Cell<Option<SpotPattern>>,
}

impl Default for MeritEngine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MeritEngine {
    /// Does not read `config.eval.glass_catalog`; see `from_config`.
    pub fn new(config: Config) -> Self {
        Self::builder().config(config).build()
    }

    /// Validates the settings and loads the AGF catalog they name.
    pub fn from_config(config: Config) -> LfResult<Self> {
        config.validate()?;
        let glasses = match &config.eval.glass_catalog {
            Some(path) => {
                let catalog = GlassCatalog::load_agf(path)?;
                info!(path = %path.display(), glasses = catalog.len(), "glass catalog loaded");
                catalog
            }
            None => GlassCatalog::new(),
        };
        Ok(Self::builder().config(config).glasses(glasses).build())
    }

    pub fn last_spot_pattern(&self) -> Option<SpotPattern> {
        self.last_spot_pattern.get()
    }

    /// Full evaluation: writes `value` and `contribution` back onto each operand row.
    pub fn calculate_merit(&self, input: &EvalInput, operands: &mut [Operand]) -> MeritBreakdown {
        let breakdown = self.run_batch(input, operands, EvalMode::Display);
        for (op, term) in operands.iter_mut().zip(&breakdown.terms) {
            op.value = Some(term.value);
            op.contribution = Some(term.contribution);
        }
        breakdown
    }

    /// Total merit only. Spot kernels may abort early.
    pub fn calculate_merit_value_only(&self, input: &EvalInput, operands: &[Operand]) -> f64 {
        self.run_batch(input, operands, EvalMode::Fast).total
    }

    pub fn calculate_merit_breakdown_only(
        &self,
        input: &EvalInput,
        operands: &[Operand],
    ) -> MeritBreakdown {
        self.run_batch(input, operands, EvalMode::Fast)
    }

    /// `√w·e` per operand, in declaration order.
    pub fn residuals(&self, input: &EvalInput, operands: &[Operand]) -> Vec<f64> {
        self.run_batch(input, operands, EvalMode::Fast).residuals()
    }

    /// Traces the pupil and transforms it; honours the engine's cancel token.
    pub fn psf(&self, input: &EvalInput, request: &PsfRequest) -> EvalResult<Psf> {
        let resolver = Resolver::new(input.systems, input.live);
        let sys = resolver.resolve(&request.config_id)?;
        let wavelength = params::resolve_wavelength(
            &request.wavelength,
            &sys.source,
            self.config.eval.default_wavelength_um,
        );
        let field = sys.field(request.field)?;
        let prepared = PreparedSystem::from_rows_with(&sys.rows, wavelength, &self.glasses)?;
        let psf = psf::compute_psf(
            &prepared,
            self.tracer.as_ref(),
            field,
            request.sampling,
            &self.cancel,
        )?;
        info!(
            config = %sys.config_id,
            field = request.field,
            wavelength,
            strehl = psf.strehl(),
            "psf computed"
        );
        Ok(psf)
    }

    fn run_batch(&self, input: &EvalInput, operands: &[Operand], mode: EvalMode) -> MeritBreakdown {
        let resolver = Resolver::new(input.systems, input.live);
        let mut cache = EvalCache::new();

        let terms: Vec<MeritTerm> = {
            let mut ctx = EvalContext {
                resolver: &resolver,
                cache: &mut cache,
                config: &self.config,
                tracer: self.tracer.as_ref(),
                glasses: &self.glasses,
                mode,
                external_fits: &self.external_fits,
                cancel: &self.cancel,
                last_spot_pattern: &self.last_spot_pattern,
            };
            operands
                .iter()
                .enumerate()
                .map(|(i, op)| {
                    let value = kernels::evaluate(&mut ctx, op);
                    MeritTerm::new(
                        i,
                        &op.operand,
                        &op.config_id,
                        value,
                        params::target(op),
                        params::weight(op),
                    )
                })
                .collect()
        };

        let breakdown = MeritBreakdown::from_terms(terms, cache.hits(), cache.misses());
        info!(
            operands = operands.len(),
            total = breakdown.total,
            cache_hits = breakdown.cache_hits,
            cache_misses = breakdown.cache_misses,
            ?mode,
            "merit batch done"
        );
        breakdown
    }
}
