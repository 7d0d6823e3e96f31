use super::EvalContext;
use crate::error::{EvalFault, EvalResult};
use crate::merit::cache::EvalCache;
use crate::merit::params::{count, keyword, resolve_wavelength, row_index};
use crate::merit::Operand;
use crate::optics::wavefront::{self, noll_to_osa, ZernikeFit};
use crate::system::{ResolvedSystem, Resolver};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// A fit produced outside the engine, keyed by OSA/ANSI index.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalZernikeFit {
    #[serde(default)]
    pub config_id: String,
    /// 1-based field row.
    #[serde(default = "first_field")]
    pub field: usize,
    pub wavelength_um: f64,
    pub coeffs_waves: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coeffs_um: Option<Vec<f64>>,
}

fn first_field() -> usize {
    1
}

impl ExternalZernikeFit {
    fn matches(&self, sys: &ResolvedSystem, field: usize, wavelength_um: f64) -> bool {
        let same_config = if Resolver::is_current(&self.config_id) {
            sys.key == crate::consts::ACTIVE_KEY
        } else {
            self.config_id.trim() == sys.config_id
        };
        same_config && self.field == field && (self.wavelength_um - wavelength_um).abs() < 1e-6
    }

    fn term(&self, noll: usize, um: bool) -> Option<f64> {
        let osa = noll_to_osa(noll)?;
        if um {
            if let Some(v) = self.coeffs_um.as_ref().and_then(|c| c.get(osa)) {
                return Some(*v);
            }
            return self.coeffs_waves.get(osa).map(|w| w * self.wavelength_um);
        }
        self.coeffs_waves.get(osa).copied()
    }

    /// RMS over Noll terms 4 and up.
    fn rms(&self, um: bool) -> f64 {
        let len = self.coeffs_waves.len().max(self.coeffs_um.as_ref().map_or(0, Vec::len));
        (4..)
            .map_while(|j| noll_to_osa(j).filter(|&osa| osa < len).map(|_| j))
            .filter_map(|j| self.term(j, um))
            .map(|c| c * c)
            .sum::<f64>()
            .sqrt()
    }
}

pub fn evaluate(ctx: &mut EvalContext, op: &Operand) -> EvalResult<f64> {
    let sys = ctx.system(&op.config_id)?;
    let wavelength = resolve_wavelength(
        &op.param1,
        &sys.source,
        ctx.config.eval.default_wavelength_um,
    );
    let field_index = row_index(&op.param2, "field")?;
    let um = matches!(keyword(&op.param3).as_str(), "um" | "µm" | "micron" | "microns");
    let grid = count(&op.param4, ctx.config.zernike.zernike_grid, "grid size")?;
    let noll = count(&op.param5, 0, "noll index")?;

    if let Some(ext) = ctx
        .external_fits
        .iter()
        .find(|f| f.matches(&sys, field_index, wavelength))
    {
        return if noll == 0 {
            Ok(ext.rms(um))
        } else {
            ext.term(noll, um)
                .ok_or_else(|| EvalFault::invalid_input(format!("term {noll} not in external fit")))
        };
    }

    let fit = fit(ctx, &sys, wavelength, field_index, grid)?;
    if noll == 0 {
        let rms = fit.rms_waves();
        return Ok(if um { rms * fit.wavelength_um } else { rms });
    }
    let waves = fit
        .coefficient_waves(noll)
        .ok_or_else(|| EvalFault::invalid_input(format!("term {noll} beyond fitted order")))?;
    Ok(if um {
        fit.coeffs_um.get(noll - 1).copied().unwrap_or(waves * fit.wavelength_um)
    } else {
        waves
    })
}

fn fit(
    ctx: &mut EvalContext,
    sys: &ResolvedSystem,
    wavelength: f64,
    field_index: usize,
    grid: usize,
) -> EvalResult<Rc<ZernikeFit>> {
    let field = sys.field(field_index)?;
    let prepared = ctx.prepared(sys, wavelength)?;
    let max_noll = ctx.config.zernike.zernike_max_noll;
    let tracer = ctx.tracer;
    let cancel = ctx.cancel;

    let key = EvalCache::key(
        "zernike",
        &sys.key,
        &EvalCache::digest(&[
            EvalCache::wavelength_key(wavelength),
            field_index.to_string(),
            grid.to_string(),
            max_noll.to_string(),
        ]),
    );
    ctx.cache.memo(key, || {
        wavefront::fit_wavefront(&prepared, tracer, field, grid, max_noll, cancel).map(Rc::new)
    })
}
