use super::EvalContext;
use crate::error::{EvalFault, EvalResult};
use crate::merit::cache::EvalCache;
use crate::merit::params::resolve_wavelength;
use crate::merit::Operand;
use crate::optics::paraxial::PrimaryMetrics;
use crate::optics::PreparedSystem;
use crate::surface::{SurfaceRow, SurfaceType};
use crate::value::Value;

/// Focal length of the rows emitted by one block, or of the whole system
/// when no block is named.
pub fn evaluate(ctx: &mut EvalContext, op: &Operand) -> EvalResult<f64> {
    let sys = ctx.system(&op.config_id)?;
    let wavelength = resolve_wavelength(
        &op.param1,
        &sys.source,
        ctx.config.eval.default_wavelength_um,
    );
    let block_id = op.param2.to_string().trim().to_string();
    if block_id.is_empty() {
        return Ok(ctx.primary(&sys, wavelength)?.efl);
    }

    let use_object_distance = ctx.config.eval.effl_use_object_distance;
    let key = EvalCache::key(
        "effl",
        &sys.key,
        &format!(
            "{}:{block_id}:{use_object_distance}",
            EvalCache::wavelength_key(wavelength)
        ),
    );
    let rows = &sys.rows;
    let glasses = ctx.glasses;
    ctx.cache.memo(key, || {
        let sub = subsystem_rows(rows, &block_id, use_object_distance)?;
        let prepared = PreparedSystem::from_rows_with(&sub, wavelength, glasses)?;
        let efl = PrimaryMetrics::compute(&prepared).efl;
        EvalFault::require_finite(efl, "subsystem focal length")
    })
}

/// Object row, the block's rows, and a flat image row.
pub fn subsystem_rows(
    rows: &[SurfaceRow],
    block_id: &str,
    use_object_distance: bool,
) -> EvalResult<Vec<SurfaceRow>> {
    let first = rows
        .iter()
        .position(|r| r.provenance.block_id.as_deref() == Some(block_id))
        .ok_or_else(|| EvalFault::invalid_input(format!("no rows for block '{block_id}'")))?;
    let last = rows
        .iter()
        .rposition(|r| r.provenance.block_id.as_deref() == Some(block_id))
        .unwrap_or(first);
    if first == 0 || last + 1 >= rows.len() {
        return Err(EvalFault::invalid_input(format!(
            "block '{block_id}' has no power of its own"
        )));
    }

    let before = &rows[first - 1];
    let mut object = SurfaceRow::blank(1);
    object.material = before.material.clone();
    object.thickness = if use_object_distance {
        before.thickness.clone()
    } else {
        Value::Inf
    };

    let mut sub = Vec::with_capacity(last - first + 3);
    sub.push(object);
    sub.extend(rows[first..=last].iter().cloned());
    let mut image = SurfaceRow::blank(sub.len() + 1);
    image.surf_type = SurfaceType::Image;
    image.radius = Value::Inf;
    sub.push(image);

    for (i, row) in sub.iter_mut().enumerate() {
        row.id = i + 1;
    }
    Ok(sub)
}
