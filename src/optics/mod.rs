pub mod glass;
pub mod paraxial;
pub mod psf;
pub mod raytrace;
pub mod seidel;
pub mod wavefront;

use crate::consts::{COEF_COUNT, DEFAULT_STOP_SEMIDIA};
use crate::error::{EvalFault, EvalResult};
use crate::surface::{SurfaceRow, SurfaceType};
use crate::value::Value;
use glass::GlassCatalog;

/// A surface row reduced to numbers for one wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSurface {
    pub kind: SurfaceType,
    pub curvature: f64,
    pub conic: f64,
    pub coefs: [f64; COEF_COUNT],
    /// Distance to the next vertex.
    pub thickness: f64,
    /// Medium after this surface.
    pub index: f64,
    pub semidia: Option<f64>,
}

impl PreparedSurface {
    pub fn has_power(&self) -> bool {
        !matches!(self.kind, SurfaceType::CoordinateTransform | SurfaceType::Image)
    }

    /// Curvature seen by a paraxial ray, including the r² term of an even asphere.
    pub fn paraxial_curvature(&self) -> f64 {
        match self.kind {
            SurfaceType::AsphericEven => self.curvature + 2.0 * self.coefs[0],
            _ => self.curvature,
        }
    }

    pub fn decenter(&self) -> (f64, f64) {
        (self.coefs[0], self.coefs[1])
    }

    pub fn tilt_deg(&self) -> (f64, f64) {
        (self.coefs[2], self.coefs[3])
    }

    fn has_polynomial(&self) -> bool {
        self.kind.is_aspheric() && self.coefs.iter().any(|c| *c != 0.0)
    }

    pub fn is_plane(&self) -> bool {
        self.curvature == 0.0 && !self.has_polynomial()
    }

    /// Sphere or plane: solvable in closed form.
    pub fn is_spherical(&self) -> bool {
        !self.has_polynomial() && (self.conic == 0.0 || self.curvature == 0.0)
    }

    /// Surface height z at radial distance r; `None` past the conic's rim.
    pub fn sag(&self, r: f64) -> Option<f64> {
        let c = self.curvature;
        let r2 = r * r;
        let base = if c == 0.0 {
            0.0
        } else {
            let arg = 1.0 - (1.0 + self.conic) * c * c * r2;
            if arg < 0.0 {
                return None;
            }
            c * r2 / (1.0 + arg.sqrt())
        };
        Some(base + self.polynomial(r))
    }

    /// dz/dr.
    pub fn sag_slope(&self, r: f64) -> Option<f64> {
        let c = self.curvature;
        let base = if c == 0.0 {
            0.0
        } else {
            let arg = 1.0 - (1.0 + self.conic) * c * c * r * r;
            if arg <= 0.0 {
                return None;
            }
            c * r / arg.sqrt()
        };
        Some(base + self.polynomial_slope(r))
    }

    fn polynomial(&self, r: f64) -> f64 {
        match self.kind {
            SurfaceType::AsphericEven => self
                .coefs
                .iter()
                .enumerate()
                .map(|(i, a)| a * r.powi(2 * (i as i32 + 1)))
                .sum(),
            SurfaceType::AsphericOdd => self
                .coefs
                .iter()
                .enumerate()
                .map(|(i, a)| a * r.powi(2 * (i as i32 + 1) + 1))
                .sum(),
            _ => 0.0,
        }
    }

    fn polynomial_slope(&self, r: f64) -> f64 {
        match self.kind {
            SurfaceType::AsphericEven => self
                .coefs
                .iter()
                .enumerate()
                .map(|(i, a)| {
                    let p = 2 * (i as i32 + 1);
                    a * p as f64 * r.powi(p - 1)
                })
                .sum(),
            SurfaceType::AsphericOdd => self
                .coefs
                .iter()
                .enumerate()
                .map(|(i, a)| {
                    let p = 2 * (i as i32 + 1) + 1;
                    a * p as f64 * r.powi(p - 1)
                })
                .sum(),
            _ => 0.0,
        }
    }
}

/// A sequential system ready for tracing at one wavelength.
/// Index 0 is the object, the last entry the image surface.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSystem {
    pub surfaces: Vec<PreparedSurface>,
    pub stop: Option<usize>,
    pub wavelength_um: f64,
}

impl PreparedSystem {
    pub fn from_rows(rows: &[SurfaceRow], wavelength_um: f64) -> EvalResult<Self> {
        Self::from_rows_with(rows, wavelength_um, &GlassCatalog::new())
    }

    /// As `from_rows`, resolving glass names through `glasses` first.
    pub fn from_rows_with(
        rows: &[SurfaceRow],
        wavelength_um: f64,
        glasses: &GlassCatalog,
    ) -> EvalResult<Self> {
        if rows.len() < 3 {
            return Err(EvalFault::no_data("system needs an object, a surface and an image"));
        }
        let last = rows.len() - 1;
        let mut surfaces: Vec<PreparedSurface> = Vec::with_capacity(rows.len());

        for (i, row) in rows.iter().enumerate() {
            let thickness = match (&row.thickness, i) {
                (Value::Inf, 0) | (Value::Auto, 0) => f64::INFINITY,
                (Value::Number(t), _) if t.is_finite() => *t,
                (Value::Auto, _) => 0.0,
                (other, _) => {
                    return Err(EvalFault::invalid_input(format!(
                        "surface {i} thickness '{other}' is not usable"
                    )))
                }
            };

            let previous_index = surfaces.last().map(|s| s.index).unwrap_or(1.0);
            let index = if i == last
                || (row.surf_type.is_coordinate_transform() && row.material.is_auto())
            {
                previous_index
            } else {
                glasses.refractive_index(&row.material, wavelength_um)?
            };

            let curvature = match &row.radius {
                Value::Number(r) if *r != 0.0 && r.is_finite() => 1.0 / r,
                Value::Text(s) => {
                    return Err(EvalFault::invalid_input(format!(
                        "surface {i} radius '{s}' is not numeric"
                    )))
                }
                _ => 0.0,
            };

            let mut coefs = [0.0; COEF_COUNT];
            for (slot, v) in coefs.iter_mut().zip(&row.coefs) {
                *slot = v.number_or(0.0);
            }

            surfaces.push(PreparedSurface {
                kind: row.surf_type,
                curvature,
                conic: row.conic.number_or(0.0),
                coefs,
                thickness,
                index,
                semidia: row.semidia.as_number().filter(|s| *s > 0.0),
            });
        }

        let stop = (1..last).find(|&i| surfaces[i].kind == SurfaceType::Stop);
        Ok(Self {
            surfaces,
            stop,
            wavelength_um,
        })
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn image(&self) -> usize {
        self.surfaces.len() - 1
    }

    /// Last surface before the image.
    pub fn last_surface(&self) -> usize {
        self.surfaces.len() - 2
    }

    pub fn object_distance(&self) -> f64 {
        self.surfaces[0].thickness
    }

    pub fn object_at_infinity(&self) -> bool {
        !self.object_distance().is_finite()
    }

    pub fn index_before(&self, i: usize) -> f64 {
        if i == 0 {
            self.surfaces[0].index
        } else {
            self.surfaces[i - 1].index
        }
    }

    pub fn stop_index(&self) -> usize {
        self.stop.unwrap_or(1)
    }

    pub fn stop_semidia(&self) -> f64 {
        self.surfaces[self.stop_index()]
            .semidia
            .unwrap_or(DEFAULT_STOP_SEMIDIA)
    }

    pub fn with_object_at_infinity(&self) -> Self {
        let mut out = self.clone();
        out.surfaces[0].thickness = f64::INFINITY;
        out
    }
}
