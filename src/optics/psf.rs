use super::raytrace::{FieldPoint, RayTracer};
use super::wavefront::{sample_opd, CancelToken, PupilSample};
use super::PreparedSystem;
use crate::error::{EvalFault, EvalResult};
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;
use std::f64::consts::TAU;
use tracing::debug;

/// Pupil sampling and zero padding for an FFT PSF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsfSampling {
    /// Pupil cells across the diameter.
    pub pupil_grid: usize,
    /// Transform size as a multiple of the pupil grid, rounded up to a power of two.
    pub padding: usize,
}

impl Default for PsfSampling {
    fn default() -> Self {
        Self {
            pupil_grid: 32,
            padding: 4,
        }
    }
}

impl PsfSampling {
    pub fn transform_size(&self) -> usize {
        (self.pupil_grid * self.padding.max(1)).next_power_of_two()
    }
}

/// Intensity point spread function on a square grid.
///
/// Row-major, `size × size`, with the zero-frequency pixel at
/// `(size / 2, size / 2)`. Normalized so an unaberrated pupil of the same
/// shape peaks at 1, which makes the centre value the Strehl ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct Psf {
    pub size: usize,
    pub pupil_grid: usize,
    pub wavelength_um: f64,
    pub intensity: Vec<f64>,
}

impl Psf {
    /// Builds the pupil `exp(-i·2π·W)` from wavefront samples and transforms it.
    pub fn from_samples(
        samples: &[PupilSample],
        sampling: PsfSampling,
        wavelength_um: f64,
    ) -> EvalResult<Self> {
        let grid = sampling.pupil_grid;
        if grid < 2 {
            return Err(EvalFault::invalid_input(format!("pupil grid {grid} is too small")));
        }
        let n = sampling.transform_size();
        let mut field = vec![Complex64::new(0.0, 0.0); n * n];
        let mut filled = 0usize;

        for s in samples.iter().filter(|s| s.opd_waves.is_finite()) {
            let (Some(ix), Some(iy)) = (
                pupil_cell(s.rho * s.theta.cos(), grid),
                pupil_cell(s.rho * s.theta.sin(), grid),
            ) else {
                continue;
            };
            let cell = &mut field[iy * n + ix];
            if cell.norm_sqr() == 0.0 {
                filled += 1;
            }
            *cell = Complex64::from_polar(1.0, -TAU * s.opd_waves);
        }
        if filled == 0 {
            return Err(EvalFault::no_data("no pupil samples for PSF"));
        }

        fft_2d(&mut field, n);

        let norm = (filled * filled) as f64;
        let mut intensity = vec![0.0; n * n];
        let half = n / 2;
        for (i, v) in field.iter().enumerate() {
            let (row, col) = (i / n, i % n);
            intensity[((row + half) % n) * n + (col + half) % n] = v.norm_sqr() / norm;
        }

        debug!(grid, size = n, pupil_cells = filled, "computed PSF");
        Ok(Self {
            size: n,
            pupil_grid: grid,
            wavelength_um,
            intensity,
        })
    }

    pub fn at(&self, x: usize, y: usize) -> f64 {
        self.intensity[y * self.size + x]
    }

    pub fn strehl(&self) -> f64 {
        self.at(self.size / 2, self.size / 2)
    }

    pub fn peak(&self) -> f64 {
        self.intensity.iter().copied().fold(0.0, f64::max)
    }

    pub fn total_energy(&self) -> f64 {
        self.intensity.iter().sum()
    }

    /// Fraction of the energy within `radius` pixels of the centre.
    pub fn encircled_energy(&self, radius: f64) -> f64 {
        self.encircled_energy_curve(&[radius])[0]
    }

    pub fn encircled_energy_curve(&self, radii: &[f64]) -> Vec<f64> {
        let total = self.total_energy();
        if total <= 0.0 {
            return vec![0.0; radii.len()];
        }
        let c = (self.size / 2) as f64;
        let mut sums = vec![0.0; radii.len()];
        for (i, v) in self.intensity.iter().enumerate() {
            let dx = (i % self.size) as f64 - c;
            let dy = (i / self.size) as f64 - c;
            let r = dx.hypot(dy);
            for (sum, limit) in sums.iter_mut().zip(radii) {
                if r <= *limit {
                    *sum += v;
                }
            }
        }
        sums.into_iter().map(|s| s / total).collect()
    }

    /// Image-plane pixel pitch in µm for the given working F-number.
    pub fn pixel_pitch_um(&self, working_fno: f64) -> f64 {
        self.wavelength_um * working_fno * self.pupil_grid as f64 / self.size as f64
    }
}

/// Cell index of a normalized pupil coordinate on the `sample_opd` grid.
fn pupil_cell(p: f64, grid: usize) -> Option<usize> {
    let k = (((p + 1.0) * grid as f64 - 1.0) / 2.0).round();
    (k >= 0.0 && k < grid as f64).then_some(k as usize)
}

fn fft_2d(data: &mut [Complex64], n: usize) {
    let fft = FftPlanner::new().plan_fft_forward(n);
    // Rows, then columns through a transpose.
    fft.process(data);
    transpose(data, n);
    fft.process(data);
    transpose(data, n);
}

fn transpose(data: &mut [Complex64], n: usize) {
    for r in 0..n {
        for c in (r + 1)..n {
            data.swap(r * n + c, c * n + r);
        }
    }
}

/// Samples the wavefront at `field` and returns its PSF.
pub fn compute_psf(
    sys: &PreparedSystem,
    tracer: &dyn RayTracer,
    field: FieldPoint,
    sampling: PsfSampling,
    cancel: &CancelToken,
) -> EvalResult<Psf> {
    let samples = sample_opd(sys, tracer, field, sampling.pupil_grid, cancel)?;
    cancel.check()?;
    Psf::from_samples(&samples, sampling, sys.wavelength_um)
}
