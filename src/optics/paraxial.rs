use super::PreparedSystem;
use crate::consts::PARAXIAL_EPS;
use strum::{Display, EnumIter};

/// Heights and reduced angles (n·u) of a paraxial ray, indexed by surface.
/// `w[i]` is the angle after refraction at surface `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParaxialRay {
    pub y: Vec<f64>,
    pub w: Vec<f64>,
}

impl ParaxialRay {
    pub fn combine(a: &ParaxialRay, ka: f64, b: &ParaxialRay, kb: f64) -> ParaxialRay {
        ParaxialRay {
            y: a.y.iter().zip(&b.y).map(|(ya, yb)| ka * ya + kb * yb).collect(),
            w: a.w.iter().zip(&b.w).map(|(wa, wb)| ka * wa + kb * wb).collect(),
        }
    }
}

/// y-ω trace. `y1` is the height on surface 1, `u0` the object-space slope.
pub fn trace(sys: &PreparedSystem, y1: f64, u0: f64) -> ParaxialRay {
    let n = sys.len();
    let mut y = vec![0.0; n];
    let mut w = vec![0.0; n];

    w[0] = sys.surfaces[0].index * u0;
    y[0] = if sys.object_at_infinity() {
        y1
    } else {
        y1 - u0 * sys.object_distance()
    };

    for i in 1..n {
        let prev = &sys.surfaces[i - 1];
        y[i] = if i == 1 {
            y1
        } else {
            y[i - 1] + prev.thickness * w[i - 1] / prev.index
        };
        let s = &sys.surfaces[i];
        let power = if s.has_power() {
            (s.index - prev.index) * s.paraxial_curvature()
        } else {
            0.0
        };
        w[i] = w[i - 1] - y[i] * power;
    }

    ParaxialRay { y, w }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PrimaryMetric {
    Fl,
    Efl,
    Bfl,
    Imd,
    Objd,
    Tsl,
    Bexp,
    Expd,
    Expp,
    Enpd,
    Enpp,
    Enpm,
    Pmag,
    FnoObj,
    FnoImg,
    FnoWrk,
    NaObj,
    NaImg,
}

/// First-order properties of a system at one wavelength. Fields may be
/// non-finite (afocal systems, objects at infinity); callers decide.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PrimaryMetrics {
    pub efl: f64,
    pub fl: f64,
    pub bfl: f64,
    pub imd: f64,
    pub objd: f64,
    pub tsl: f64,
    /// Exit pupil position measured from the last surface.
    pub bexp: f64,
    pub expd: f64,
    /// Exit pupil position measured from the image plane.
    pub expp: f64,
    pub enpd: f64,
    /// Entrance pupil position measured from surface 1.
    pub enpp: f64,
    pub enpm: f64,
    pub pmag: f64,
    pub fno_obj: f64,
    pub fno_img: f64,
    pub fno_wrk: f64,
    pub na_obj: f64,
    pub na_img: f64,
}

impl PrimaryMetrics {
    pub fn compute(sys: &PreparedSystem) -> Self {
        let last = sys.last_surface();
        let n_img = sys.surfaces[last].index;
        let stop = sys.stop_index();
        let stop_semi = sys.stop_semidia();

        // Ray A: axial at infinity. Ray B: through the vertex of surface 1.
        let a = trace(sys, 1.0, 0.0);
        let b = trace(sys, 0.0, 1.0);

        let efl = -1.0 / a.w[last];
        let fl = n_img * efl;
        let bfl = -a.y[last] * n_img / a.w[last];

        let ya_s = a.y[stop];
        let yb_s = b.y[stop];

        // Chief ray = alpha·A + B crosses the axis at the stop.
        let alpha = -yb_s / ya_s;
        let enpp = -alpha;
        let ep_radius = (stop_semi / ya_s).abs();
        let enpd = 2.0 * ep_radius;
        let enpm = ep_radius / stop_semi;

        let chief = ParaxialRay::combine(&a, alpha, &b, 1.0);
        let bexp = if chief.w[last].abs() < PARAXIAL_EPS {
            f64::INFINITY
        } else {
            -chief.y[last] * n_img / chief.w[last]
        };
        let expp = bexp - sys.surfaces[last].thickness;

        // Image-space-parallel ray through the stop edge gives the exit pupil size.
        let det = ya_s * b.w[last] - yb_s * a.w[last];
        let expd = if det.abs() < PARAXIAL_EPS {
            f64::INFINITY
        } else {
            let p = stop_semi * b.w[last] / det;
            let q = -stop_semi * a.w[last] / det;
            2.0 * (p * a.y[last] + q * b.y[last]).abs()
        };

        let objd = sys.object_distance();
        let marginal = if sys.object_at_infinity() {
            trace(sys, ep_radius, 0.0)
        } else {
            let u0 = ep_radius / (objd + enpp);
            trace(sys, u0 * objd, u0)
        };
        let w0 = marginal.w[0];
        let wk = marginal.w[last];
        let imd = -marginal.y[last] * n_img / wk;

        let tsl: f64 = sys.surfaces[1..=last].iter().map(|s| s.thickness).sum();

        let (pmag, na_obj, fno_obj) = if sys.object_at_infinity() {
            (0.0, 0.0, f64::INFINITY)
        } else {
            (w0 / wk, w0.abs(), 1.0 / (2.0 * w0.abs()))
        };

        Self {
            efl,
            fl,
            bfl,
            imd,
            objd,
            tsl,
            bexp,
            expd,
            expp,
            enpd,
            enpp,
            enpm,
            pmag,
            fno_obj,
            fno_img: efl.abs() / enpd,
            fno_wrk: 1.0 / (2.0 * wk.abs()),
            na_obj,
            na_img: wk.abs(),
        }
    }

    pub fn get(&self, metric: PrimaryMetric) -> f64 {
        match metric {
            PrimaryMetric::Fl => self.fl,
            PrimaryMetric::Efl => self.efl,
            PrimaryMetric::Bfl => self.bfl,
            PrimaryMetric::Imd => self.imd,
            PrimaryMetric::Objd => self.objd,
            PrimaryMetric::Tsl => self.tsl,
            PrimaryMetric::Bexp => self.bexp,
            PrimaryMetric::Expd => self.expd,
            PrimaryMetric::Expp => self.expp,
            PrimaryMetric::Enpd => self.enpd,
            PrimaryMetric::Enpp => self.enpp,
            PrimaryMetric::Enpm => self.enpm,
            PrimaryMetric::Pmag => self.pmag,
            PrimaryMetric::FnoObj => self.fno_obj,
            PrimaryMetric::FnoImg => self.fno_img,
            PrimaryMetric::FnoWrk => self.fno_wrk,
            PrimaryMetric::NaObj => self.na_obj,
            PrimaryMetric::NaImg => self.na_img,
        }
    }

    pub fn ep_radius(&self) -> f64 {
        self.enpd / 2.0
    }
}
