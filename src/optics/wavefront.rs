use super::paraxial::PrimaryMetrics;
use super::raytrace::{aim_ray, FieldPoint, RayTracer, SurfaceHit, TraceOptions};
use super::PreparedSystem;
use crate::consts::{MIN_ZERNIKE_SAMPLES, MM_TO_UM};
use crate::error::{EvalFault, EvalResult, FaultKind};
use nalgebra::{DMatrix, DVector, Vector3};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Shared flag polled by long-running fits.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> EvalResult<()> {
        if self.is_cancelled() {
            Err(EvalFault::cancelled())
        } else {
            Ok(())
        }
    }
}

/// Radial order and azimuthal frequency for a Noll-style index.
/// `n` satisfies `n(n+1)/2 < j <= (n+1)(n+2)/2`; `m` runs `-n, -n+2, .. n`.
pub fn noll_to_nm(j: usize) -> Option<(usize, i32)> {
    if j == 0 {
        return None;
    }
    let mut n = 0usize;
    while (n + 1) * (n + 2) / 2 < j {
        n += 1;
    }
    let k = j - n * (n + 1) / 2 - 1;
    let m = -(n as i32) + 2 * k as i32;
    Some((n, m))
}

/// OSA/ANSI single index for the same polynomial.
pub fn noll_to_osa(j: usize) -> Option<usize> {
    let (n, m) = noll_to_nm(j)?;
    Some(((n * (n + 2)) as i32 + m) as usize / 2)
}

fn radial(n: usize, m: usize, rho: f64) -> f64 {
    if (n - m) % 2 == 1 {
        return 0.0;
    }
    let factorial = |k: usize| (1..=k).map(|v| v as f64).product::<f64>();
    (0..=(n - m) / 2)
        .map(|s| {
            let sign = if s % 2 == 0 { 1.0 } else { -1.0 };
            sign * factorial(n - s)
                / (factorial(s) * factorial((n + m) / 2 - s) * factorial((n - m) / 2 - s))
                * rho.powi((n - 2 * s) as i32)
        })
        .sum()
}

/// Unit-RMS Zernike polynomial over the unit disk.
pub fn zernike(j: usize, rho: f64, theta: f64) -> f64 {
    let Some((n, m)) = noll_to_nm(j) else {
        return 0.0;
    };
    let am = m.unsigned_abs() as usize;
    let r = radial(n, am, rho);
    if m == 0 {
        ((n + 1) as f64).sqrt() * r
    } else {
        let norm = (2.0 * (n + 1) as f64).sqrt();
        if m > 0 {
            norm * r * (am as f64 * theta).cos()
        } else {
            norm * r * (am as f64 * theta).sin()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PupilSample {
    pub rho: f64,
    pub theta: f64,
    pub opd_waves: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZernikeFit {
    pub wavelength_um: f64,
    /// Index `j - 1` holds term `j`.
    pub coeffs_waves: Vec<f64>,
    pub coeffs_um: Vec<f64>,
    pub residual_rms_waves: f64,
    pub sample_count: usize,
}

impl ZernikeFit {
    pub fn fit(samples: &[PupilSample], max_noll: usize, wavelength_um: f64) -> EvalResult<Self> {
        if samples.len() < MIN_ZERNIKE_SAMPLES {
            return Err(EvalFault::no_data(format!(
                "only {} pupil samples, need {MIN_ZERNIKE_SAMPLES}",
                samples.len()
            )));
        }
        let terms = max_noll.clamp(1, samples.len());
        let a = DMatrix::from_fn(samples.len(), terms, |row, col| {
            zernike(col + 1, samples[row].rho, samples[row].theta)
        });
        let b = DVector::from_iterator(samples.len(), samples.iter().map(|s| s.opd_waves));

        let svd = a.clone().svd(true, true);
        let x = svd
            .solve(&b, 1e-12)
            .map_err(|e| EvalFault::numeric_unstable(format!("zernike fit: {e}")))?;

        let residual = &a * &x - &b;
        let residual_rms_waves = (residual.norm_squared() / samples.len() as f64).sqrt();
        let coeffs_waves: Vec<f64> = x.iter().copied().collect();
        if coeffs_waves.iter().any(|c| !c.is_finite()) {
            return Err(EvalFault::numeric_unstable("zernike fit produced non-finite terms"));
        }
        let coeffs_um = coeffs_waves.iter().map(|c| c * wavelength_um).collect();

        Ok(Self {
            wavelength_um,
            coeffs_waves,
            coeffs_um,
            residual_rms_waves,
            sample_count: samples.len(),
        })
    }

    pub fn coefficient_waves(&self, noll: usize) -> Option<f64> {
        noll.checked_sub(1)
            .and_then(|i| self.coeffs_waves.get(i))
            .copied()
    }

    /// RMS wavefront error without piston and tilt (terms 1-3).
    pub fn rms_waves(&self) -> f64 {
        self.coeffs_waves
            .iter()
            .skip(3)
            .map(|c| c * c)
            .sum::<f64>()
            .sqrt()
    }
}

/// Where the wavefront is compared: a sphere centred on the chief image
/// point through the exit-pupil centre, or a plane for telecentric space.
enum Reference {
    Sphere { centre: Vector3<f64>, radius: f64 },
    Plane { point: Vector3<f64>, normal: Vector3<f64> },
}

impl Reference {
    /// Path from the last surface to the reference, along the traced ray.
    fn distance(&self, hit: &SurfaceHit) -> EvalResult<f64> {
        match self {
            Reference::Sphere { centre, radius } => {
                let pc = hit.local - centre;
                let b = hit.dir.dot(&pc);
                let disc = b * b - (pc.norm_squared() - radius * radius);
                if disc < 0.0 {
                    return Err(EvalFault::ray_trace_failed("ray misses reference sphere"));
                }
                Ok(-b - disc.sqrt())
            }
            Reference::Plane { point, normal } => {
                let denom = normal.dot(&hit.dir);
                if denom.abs() < 1e-15 {
                    return Err(EvalFault::ray_trace_failed("ray parallel to reference plane"));
                }
                Ok(normal.dot(&(point - hit.local)) / denom)
            }
        }
    }
}

/// Optical path differences over a square pupil grid with a circular mask.
pub fn sample_opd(
    sys: &PreparedSystem,
    tracer: &dyn RayTracer,
    field: FieldPoint,
    grid: usize,
    cancel: &CancelToken,
) -> EvalResult<Vec<PupilSample>> {
    let metrics = PrimaryMetrics::compute(sys);
    let enpp = metrics.enpp;
    let ep = metrics.ep_radius();
    let last = sys.last_surface();
    let n_img = sys.surfaces[last].index;
    let to_last = TraceOptions {
        clip_apertures: true,
        stop_at: Some(last),
    };

    let chief_ray = aim_ray(sys, field, enpp, ep, 0.0, 0.0)?;
    let chief = tracer.trace(sys, &chief_ray, &TraceOptions::default())?;
    let (chief_last, chief_image) = match chief.as_slice() {
        [.., l, i] => (*l, *i),
        _ => return Err(EvalFault::ray_trace_failed("chief ray produced no hits")),
    };

    // Image point expressed in the frame of the last surface.
    let image_point = chief_image.local + Vector3::new(0.0, 0.0, sys.surfaces[last].thickness);
    let reference = if metrics.bexp.is_finite() {
        let pupil = Vector3::new(0.0, 0.0, metrics.bexp);
        Reference::Sphere {
            centre: image_point,
            radius: (image_point - pupil).norm(),
        }
    } else {
        Reference::Plane {
            point: image_point,
            normal: chief_last.dir,
        }
    };
    let chief_opl = chief_last.opl + n_img * reference.distance(&chief_last)?;
    let wavelength_mm = sys.wavelength_um / MM_TO_UM;

    let grid = grid.max(2);
    let mut samples = Vec::with_capacity(grid * grid);
    for iy in 0..grid {
        cancel.check()?;
        let py = -1.0 + (2 * iy + 1) as f64 / grid as f64;
        for ix in 0..grid {
            let px = -1.0 + (2 * ix + 1) as f64 / grid as f64;
            let rho = px.hypot(py);
            if rho > 1.0 {
                continue;
            }
            let traced = aim_ray(sys, field, enpp, ep, px, py)
                .and_then(|ray| tracer.trace(sys, &ray, &to_last))
                .and_then(|hits| {
                    let hit = hits
                        .last()
                        .copied()
                        .ok_or_else(|| EvalFault::ray_trace_failed("no hits"))?;
                    Ok(hit.opl + n_img * reference.distance(&hit)?)
                });
            match traced {
                Ok(opl) => samples.push(PupilSample {
                    rho,
                    theta: py.atan2(px),
                    opd_waves: (opl - chief_opl) / wavelength_mm,
                }),
                Err(e) if e.kind == FaultKind::Cancelled => return Err(e),
                Err(_) => continue,
            }
        }
    }
    debug!(grid, samples = samples.len(), "sampled wavefront");
    Ok(samples)
}

/// Samples the pupil and fits Zernike terms `1..=max_noll`.
pub fn fit_wavefront(
    sys: &PreparedSystem,
    tracer: &dyn RayTracer,
    field: FieldPoint,
    grid: usize,
    max_noll: usize,
    cancel: &CancelToken,
) -> EvalResult<ZernikeFit> {
    let samples = sample_opd(sys, tracer, field, grid, cancel)?;
    cancel.check()?;
    ZernikeFit::fit(&samples, max_noll, sys.wavelength_um)
}
