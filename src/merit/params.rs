use super::Operand;
use crate::error::{EvalFault, EvalResult};
use crate::optics::seidel::SeidelMode;
use crate::system::{primary_wavelength, ObjectRow, SourceRow};
use crate::value::Value;
use tracing::warn;

/// Resolves a λ parameter.
///
/// Blank is the primary wavelength. A positive integer is a 1-based row of
/// the source table (out of range falls back to primary). Any other positive
/// number is a wavelength in µm, so `0.4861` is a literal and `2` is a row.
pub fn resolve_wavelength(param: &Value, source: &[SourceRow], fallback_um: f64) -> f64 {
    match param {
        Value::Auto => primary_wavelength(source),
        Value::Number(v) if v.is_finite() && *v >= 1.0 && v.fract() == 0.0 => {
            let index = *v as usize;
            match source.get(index - 1).and_then(SourceRow::valid_wavelength) {
                Some(w) => w,
                None => {
                    warn!(index, rows = source.len(), "wavelength index out of range, using primary");
                    primary_wavelength(source)
                }
            }
        }
        Value::Number(v) if v.is_finite() && *v > 0.0 => *v,
        other => {
            warn!(param = %other, "unusable wavelength parameter");
            fallback_um
        }
    }
}

pub fn target(op: &Operand) -> f64 {
    op.target.as_number().unwrap_or(0.0)
}

pub fn weight(op: &Operand) -> f64 {
    op.weight.as_number().unwrap_or(1.0)
}

/// A 1-based row reference; blank means the first row.
pub fn row_index(param: &Value, what: &str) -> EvalResult<usize> {
    match param {
        Value::Auto => Ok(1),
        other => other
            .as_index()
            .ok_or_else(|| EvalFault::invalid_input(format!("{what} '{other}' is not a row number"))),
    }
}

/// A non-negative integer; blank means `default`.
pub fn count(param: &Value, default: usize, what: &str) -> EvalResult<usize> {
    match param {
        Value::Auto => Ok(default),
        other => match other.as_number() {
            Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(v as usize),
            _ => Err(EvalFault::invalid_input(format!("{what} '{other}' is not a count"))),
        },
    }
}

/// Field row selected by a 1-based parameter. An empty object table means on-axis.
pub fn field_row<'a>(param: &Value, object: &'a [ObjectRow]) -> EvalResult<Option<&'a ObjectRow>> {
    let index = row_index(param, "field")?;
    if object.is_empty() && index == 1 {
        return Ok(None);
    }
    object
        .get(index - 1)
        .map(Some)
        .ok_or_else(|| {
            EvalFault::unresolvable_field(format!(
                "field {index} not in object table of {} rows",
                object.len()
            ))
        })
}

/// Seidel mode list. `"0,1"` asks for the root-sum-square of both.
pub fn seidel_modes(param: &Value) -> EvalResult<Vec<SeidelMode>> {
    let raw = match param {
        Value::Auto => return Ok(vec![SeidelMode::Imaging]),
        Value::Number(v) => v.to_string(),
        Value::Text(s) => s.clone(),
        Value::Inf => return Err(EvalFault::invalid_input("seidel mode cannot be INF")),
    };
    let modes = raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            SeidelMode::from_code(s)
                .ok_or_else(|| EvalFault::invalid_input(format!("unknown seidel mode '{s}'")))
        })
        .collect::<EvalResult<Vec<_>>>()?;
    if modes.is_empty() {
        Ok(vec![SeidelMode::Imaging])
    } else {
        Ok(modes)
    }
}

/// Lower-cased text content of a parameter, empty when blank.
pub fn keyword(param: &Value) -> String {
    param.to_string().trim().to_ascii_lowercase()
}
