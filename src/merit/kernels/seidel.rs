use super::EvalContext;
use crate::consts::{C_LINE_UM, F_LINE_UM};
use crate::error::{EvalFault, EvalResult};
use crate::merit::cache::EvalCache;
use crate::merit::params::{count, resolve_wavelength, seidel_modes};
use crate::merit::Operand;
use crate::optics::seidel::{self, SeidelInput, SeidelMode, SeidelResult, SeidelTerm};
use crate::system::{ResolvedSystem, SourceRow};
use itertools::{Itertools, MinMaxResult};
use std::rc::Rc;

pub fn evaluate(ctx: &mut EvalContext, op: &Operand, term: SeidelTerm) -> EvalResult<f64> {
    let sys = ctx.system(&op.config_id)?;
    let chromatic = matches!(term, SeidelTerm::Lca | SeidelTerm::Tca);
    let wavelength = if chromatic {
        sys.wavelength_primary
    } else {
        resolve_wavelength(
            &op.param1,
            &sys.source,
            ctx.config.eval.default_wavelength_um,
        )
    };
    let modes = seidel_modes(&op.param2)?;
    let surface = count(&op.param3, 0, "surface")?;
    let reference_fl = op
        .param4
        .as_number()
        .filter(|f| *f != 0.0)
        .or(sys.reference_focal_length);

    let mut values = Vec::with_capacity(modes.len());
    for mode in &modes {
        let result = seidel_sums(ctx, &sys, wavelength, *mode, reference_fl)?;
        let v = result.value(term, surface).ok_or_else(|| {
            EvalFault::invalid_input(format!("surface {surface} is outside the system"))
        })?;
        values.push(v);
    }

    Ok(match values.as_slice() {
        [single] => *single,
        many => many.iter().map(|v| v * v).sum::<f64>().sqrt(),
    })
}

/// Shortest and longest source wavelengths, else F and C.
pub fn chromatic_pair(source: &[SourceRow]) -> (f64, f64) {
    match source
        .iter()
        .filter_map(SourceRow::valid_wavelength)
        .minmax_by(|a, b| a.total_cmp(b))
    {
        MinMaxResult::MinMax(short, long) if long > short => (short, long),
        _ => (F_LINE_UM, C_LINE_UM),
    }
}

pub fn seidel_sums(
    ctx: &mut EvalContext,
    sys: &ResolvedSystem,
    wavelength: f64,
    mode: SeidelMode,
    reference_fl: Option<f64>,
) -> EvalResult<Rc<SeidelResult>> {
    let prepared = ctx.prepared(sys, wavelength)?;
    let (short, long) = chromatic_pair(&sys.source);
    let short_sys = ctx.prepared(sys, short)?;
    let long_sys = ctx.prepared(sys, long)?;
    let dispersion: Vec<f64> = short_sys
        .surfaces
        .iter()
        .zip(&long_sys.surfaces)
        .map(|(s, l)| s.index - l.index)
        .collect();

    let field = sys
        .object
        .iter()
        .max_by(|a, b| a.magnitude().total_cmp(&b.magnitude()))
        .map(|row| (row.kind(), row.magnitude()));

    let key = EvalCache::key(
        "seidel",
        &sys.key,
        &format!(
            "{}:{mode}:{}",
            EvalCache::wavelength_key(wavelength),
            reference_fl.map(|f| format!("{f:.9}")).unwrap_or_default()
        ),
    );
    ctx.cache.memo(key, || {
        seidel::compute(&SeidelInput {
            system: &prepared,
            dispersion: &dispersion,
            field,
            mode,
            reference_fl,
        })
        .map(Rc::new)
    })
}
