use super::paraxial::{trace, ParaxialRay, PrimaryMetrics};
use super::PreparedSystem;
use crate::error::{EvalFault, EvalResult};
use crate::surface::SurfaceType;
use crate::system::FieldKind;
use std::ops::{Add, Mul};
use strum::Display;

/// `0` evaluates the system as given, `1` with the object at infinity and
/// the sums scaled by a reference focal length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SeidelMode {
    Imaging,
    Afocal,
}

impl SeidelMode {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().parse::<f64>().ok()? as i64 {
            0 => Some(SeidelMode::Imaging),
            1 => Some(SeidelMode::Afocal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SeidelTerm {
    Sph,
    Coma,
    Asti,
    Fcur,
    Dist,
    Lca,
    Tca,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeidelCoefficients {
    pub sph: f64,
    pub coma: f64,
    pub asti: f64,
    pub fcur: f64,
    pub dist: f64,
    pub lca: f64,
    pub tca: f64,
}

impl SeidelCoefficients {
    pub fn get(&self, term: SeidelTerm) -> f64 {
        match term {
            SeidelTerm::Sph => self.sph,
            SeidelTerm::Coma => self.coma,
            SeidelTerm::Asti => self.asti,
            SeidelTerm::Fcur => self.fcur,
            SeidelTerm::Dist => self.dist,
            SeidelTerm::Lca => self.lca,
            SeidelTerm::Tca => self.tca,
        }
    }
}

impl Add for SeidelCoefficients {
    type Output = Self;

    fn add(self, o: Self) -> Self {
        Self {
            sph: self.sph + o.sph,
            coma: self.coma + o.coma,
            asti: self.asti + o.asti,
            fcur: self.fcur + o.fcur,
            dist: self.dist + o.dist,
            lca: self.lca + o.lca,
            tca: self.tca + o.tca,
        }
    }
}

impl Mul<f64> for SeidelCoefficients {
    type Output = Self;

    fn mul(self, k: f64) -> Self {
        Self {
            sph: self.sph * k,
            coma: self.coma * k,
            asti: self.asti * k,
            fcur: self.fcur * k,
            dist: self.dist * k,
            lca: self.lca * k,
            tca: self.tca * k,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeidelSurface {
    /// Surface number (row index).
    pub surface: usize,
    pub coefficients: SeidelCoefficients,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeidelResult {
    pub mode: SeidelMode,
    pub surfaces: Vec<SeidelSurface>,
    pub total: SeidelCoefficients,
    pub surface_count: usize,
}

impl SeidelResult {
    /// `surface == 0` is the total. Surfaces without power contribute 0;
    /// `None` when the number is outside the system.
    pub fn value(&self, term: SeidelTerm, surface: usize) -> Option<f64> {
        if surface == 0 {
            return Some(self.total.get(term));
        }
        if surface >= self.surface_count {
            return None;
        }
        Some(
            self.surfaces
                .iter()
                .find(|s| s.surface == surface)
                .map(|s| s.coefficients.get(term))
                .unwrap_or(0.0),
        )
    }
}

pub struct SeidelInput<'a> {
    pub system: &'a PreparedSystem,
    /// `n(short) − n(long)` of the medium after each surface.
    pub dispersion: &'a [f64],
    /// Largest field, as kind and magnitude.
    pub field: Option<(FieldKind, f64)>,
    pub mode: SeidelMode,
    pub reference_fl: Option<f64>,
}

/// Welford surface contributions with conic and fourth-order aspheric terms.
pub fn compute(input: &SeidelInput) -> EvalResult<SeidelResult> {
    let sys = match input.mode {
        SeidelMode::Imaging => input.system.clone(),
        SeidelMode::Afocal => input.system.with_object_at_infinity(),
    };
    if input.dispersion.len() != sys.len() {
        return Err(EvalFault::invalid_input("dispersion table does not match system"));
    }

    let metrics = PrimaryMetrics::compute(&sys);
    let ep = EvalFault::require_finite(metrics.ep_radius(), "entrance pupil radius")?;
    let enpp = EvalFault::require_finite(metrics.enpp, "entrance pupil position")?;
    let objd = sys.object_distance();

    let marginal = if sys.object_at_infinity() {
        trace(&sys, ep, 0.0)
    } else {
        let u0 = ep / (objd + enpp);
        trace(&sys, u0 * objd, u0)
    };

    let chief = match input.field {
        None => ParaxialRay {
            y: vec![0.0; sys.len()],
            w: vec![0.0; sys.len()],
        },
        Some((FieldKind::Angle, deg)) => {
            let u0 = deg.to_radians().tan();
            trace(&sys, -u0 * enpp, u0)
        }
        Some((FieldKind::Height, h)) => {
            if sys.object_at_infinity() {
                return Err(EvalFault::unresolvable_field(
                    "object height field with object at infinity",
                ));
            }
            let u0 = -h / (objd + enpp);
            trace(&sys, -u0 * enpp, u0)
        }
    };

    let lagrange = chief.w[0] * marginal.y[1] - marginal.w[0] * chief.y[1];

    let mut surfaces = Vec::new();
    let mut total = SeidelCoefficients::default();
    for i in 1..=sys.last_surface() {
        let s = &sys.surfaces[i];
        if !s.has_power() {
            continue;
        }
        let n = sys.index_before(i);
        let n1 = s.index;
        let c = s.paraxial_curvature();
        let y = marginal.y[i];
        let yb = chief.y[i];

        let a = n * y * c + marginal.w[i - 1];
        let ab = n * yb * c + chief.w[i - 1];
        let du = marginal.w[i] / (n1 * n1) - marginal.w[i - 1] / (n * n);

        let mut k = SeidelCoefficients {
            sph: -a * a * y * du,
            coma: -a * ab * y * du,
            asti: -ab * ab * y * du,
            fcur: -lagrange * lagrange * c * (1.0 / n1 - 1.0 / n),
            ..Default::default()
        };
        k.dist = if a.abs() > 1e-15 {
            ab / a * (k.asti + k.fcur)
        } else {
            0.0
        };

        let quartic = s.conic * s.curvature.powi(3) / 8.0
            + if s.kind == SurfaceType::AsphericEven {
                s.coefs[1]
            } else {
                0.0
            };
        if quartic != 0.0 && y != 0.0 {
            let d1 = 8.0 * (n1 - n) * quartic * y.powi(4);
            let ratio = yb / y;
            k.sph += d1;
            k.coma += d1 * ratio;
            k.asti += d1 * ratio * ratio;
            k.dist += d1 * ratio.powi(3);
        }

        let dd = input.dispersion[i] / n1 - input.dispersion[i - 1] / n;
        k.lca = a * y * dd;
        k.tca = ab * y * dd;

        total = total + k;
        surfaces.push(SeidelSurface {
            surface: i,
            coefficients: k,
        });
    }

    if input.mode == SeidelMode::Afocal {
        let reference = input
            .reference_fl
            .filter(|f| f.is_finite() && *f != 0.0)
            .or_else(|| Some(metrics.efl.abs()).filter(|f| f.is_finite() && *f > 0.0))
            .unwrap_or(1.0);
        let scale = 1.0 / reference;
        total = total * scale;
        for s in &mut surfaces {
            s.coefficients = s.coefficients * scale;
        }
    }

    Ok(SeidelResult {
        mode: input.mode,
        surfaces,
        total,
        surface_count: sys.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optics::PreparedSurface;

    fn mirror(conic: f64) -> PreparedSystem {
        let plane = |kind, thickness, index| PreparedSurface {
            kind,
            curvature: 0.0,
            conic: 0.0,
            coefs: [0.0; 10],
            thickness,
            index,
            semidia: None,
        };
        PreparedSystem {
            surfaces: vec![
                plane(SurfaceType::Spherical, f64::INFINITY, 1.0),
                PreparedSurface {
                    kind: SurfaceType::Stop,
                    curvature: -1.0 / 200.0,
                    conic,
                    coefs: [0.0; 10],
                    thickness: -100.0,
                    index: -1.0,
                    semidia: Some(10.0),
                },
                plane(SurfaceType::Image, 0.0, -1.0),
            ],
            stop: Some(1),
            wavelength_um: 0.5875618,
        }
    }

    #[test]
    fn test_paraboloid_has_no_spherical_aberration() {
        let sys = mirror(-1.0);
        let input = SeidelInput {
            system: &sys,
            dispersion: &[0.0; 3],
            field: None,
            mode: SeidelMode::Imaging,
            reference_fl: None,
        };
        let result = compute(&input).unwrap();
        assert!(result.total.sph.abs() < 1e-12, "{}", result.total.sph);

        let sphere = mirror(0.0);
        let input = SeidelInput {
            system: &sphere,
            ..input
        };
        assert!(compute(&input).unwrap().total.sph.abs() > 1e-6);
    }

    #[test]
    fn test_surface_sum_equals_total() {
        let sys = mirror(0.0);
        let input = SeidelInput {
            system: &sys,
            dispersion: &[0.0; 3],
            field: Some((FieldKind::Angle, 1.0)),
            mode: SeidelMode::Imaging,
            reference_fl: None,
        };
        let r = compute(&input).unwrap();
        let sum: f64 = r.surfaces.iter().map(|s| s.coefficients.coma).sum();
        assert!((sum - r.total.coma).abs() < 1e-15);
        assert_eq!(r.value(SeidelTerm::Coma, 0), Some(r.total.coma));
        assert_eq!(r.value(SeidelTerm::Coma, 7), None);
    }
}
