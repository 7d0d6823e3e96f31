use super::{PreparedSurface, PreparedSystem};
use crate::error::{EvalFault, EvalResult};
use crate::surface::SurfaceType;
use nalgebra::{Rotation3, Vector3};

const NEWTON_ITERATIONS: usize = 40;
const NEWTON_TOLERANCE: f64 = 1e-12;
const APERTURE_SLACK: f64 = 1e-9;

/// A ray in the frame of surface 1 (vertex at the origin, z along the axis).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub pos: Vector3<f64>,
    /// Unit direction.
    pub dir: Vector3<f64>,
    /// Optical path already travelled when the trace starts.
    pub opl: f64,
}

/// Where a ray crossed a surface, in that surface's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    pub surface: usize,
    pub local: Vector3<f64>,
    /// Direction after refraction.
    pub dir: Vector3<f64>,
    /// Accumulated optical path up to this surface.
    pub opl: f64,
}

impl SurfaceHit {
    pub fn radius(&self) -> f64 {
        self.local.x.hypot(self.local.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TraceOptions {
    /// Fail with an aperture block when a hit exceeds a surface's semi-diameter.
    pub clip_apertures: bool,
    /// Last surface to trace; the image surface when `None`.
    pub stop_at: Option<usize>,
}

pub trait RayTracer {
    fn trace(
        &self,
        sys: &PreparedSystem,
        ray: &Ray,
        opts: &TraceOptions,
    ) -> EvalResult<Vec<SurfaceHit>>;
}

/// Straightforward sequential tracer: one intersection and refraction per surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialTracer;

impl RayTracer for SequentialTracer {
    fn trace(
        &self,
        sys: &PreparedSystem,
        ray: &Ray,
        opts: &TraceOptions,
    ) -> EvalResult<Vec<SurfaceHit>> {
        let end = opts.stop_at.unwrap_or(sys.image()).min(sys.image());
        let mut pos = ray.pos;
        let mut dir = ray.dir;
        let mut opl = ray.opl;
        let mut hits = Vec::with_capacity(end);

        for i in 1..=end {
            if i > 1 {
                pos.z -= sys.surfaces[i - 1].thickness;
            }
            let s = &sys.surfaces[i];
            let n_before = sys.index_before(i);

            if s.kind == SurfaceType::CoordinateTransform {
                let t = plane_distance(&pos, &dir, i)?;
                pos += dir * t;
                opl += n_before * t;
                let (dx, dy) = s.decenter();
                let (tx, ty) = s.tilt_deg();
                let rot = Rotation3::from_euler_angles(tx.to_radians(), ty.to_radians(), 0.0);
                let inv = rot.inverse();
                pos = inv * (pos - Vector3::new(dx, dy, 0.0));
                dir = inv * dir;
                hits.push(SurfaceHit {
                    surface: i,
                    local: pos,
                    dir,
                    opl,
                });
                continue;
            }

            let t = intersect(s, &pos, &dir, i)?;
            pos += dir * t;
            opl += n_before * t;

            let r = pos.x.hypot(pos.y);
            if opts.clip_apertures {
                if let Some(limit) = s.semidia {
                    if r > limit + APERTURE_SLACK {
                        return Err(EvalFault::aperture_block(i, r, limit));
                    }
                }
            }

            if s.index != n_before {
                dir = refract(s, &pos, &dir, n_before, s.index, i)?;
            }
            hits.push(SurfaceHit {
                surface: i,
                local: pos,
                dir,
                opl,
            });
        }
        Ok(hits)
    }
}

fn plane_distance(pos: &Vector3<f64>, dir: &Vector3<f64>, surface: usize) -> EvalResult<f64> {
    if dir.z.abs() < 1e-15 {
        return Err(EvalFault::ray_trace_failed(format!(
            "ray parallel to surface {surface}"
        )));
    }
    Ok(-pos.z / dir.z)
}

fn intersect(
    s: &PreparedSurface,
    pos: &Vector3<f64>,
    dir: &Vector3<f64>,
    surface: usize,
) -> EvalResult<f64> {
    if s.is_plane() {
        return plane_distance(pos, dir, surface);
    }
    let sphere = sphere_distance(s.curvature, pos, dir);
    if s.is_spherical() {
        return sphere.ok_or_else(|| {
            EvalFault::ray_trace_failed(format!("ray misses surface {surface}"))
        });
    }

    let mut guesses = Vec::with_capacity(3);
    guesses.extend(sphere);
    if dir.z.abs() > 1e-15 {
        guesses.push(-pos.z / dir.z);
    }
    guesses.push(0.0);

    guesses
        .into_iter()
        .find_map(|t0| newton(s, pos, dir, t0))
        .ok_or_else(|| {
            EvalFault::ray_trace_failed(format!("no intersection with aspheric surface {surface}"))
        })
}

/// Closed-form root nearest the vertex for a sphere of curvature `c`.
fn sphere_distance(c: f64, pos: &Vector3<f64>, dir: &Vector3<f64>) -> Option<f64> {
    let b = c * pos.dot(dir) - dir.z;
    let cq = c * pos.dot(pos) - 2.0 * pos.z;
    if c == 0.0 {
        return (b != 0.0).then(|| -cq / (2.0 * b));
    }
    let disc = b * b - c * cq;
    if disc < 0.0 {
        return None;
    }
    let denom = -b - b.signum() * disc.sqrt();
    if denom == 0.0 {
        return None;
    }
    Some(cq / denom)
}

fn newton(s: &PreparedSurface, pos: &Vector3<f64>, dir: &Vector3<f64>, t0: f64) -> Option<f64> {
    let mut t = t0;
    for _ in 0..NEWTON_ITERATIONS {
        let p = pos + dir * t;
        let r = p.x.hypot(p.y);
        let g = p.z - s.sag(r)?;
        if g.abs() < NEWTON_TOLERANCE {
            return Some(t);
        }
        let radial = if r > 0.0 {
            (p.x * dir.x + p.y * dir.y) / r
        } else {
            0.0
        };
        let dg = dir.z - s.sag_slope(r)? * radial;
        if dg.abs() < 1e-15 {
            return None;
        }
        t -= g / dg;
        if !t.is_finite() {
            return None;
        }
    }
    None
}

fn refract(
    s: &PreparedSurface,
    pos: &Vector3<f64>,
    dir: &Vector3<f64>,
    n1: f64,
    n2: f64,
    surface: usize,
) -> EvalResult<Vector3<f64>> {
    let r = pos.x.hypot(pos.y);
    let slope = s.sag_slope(r).ok_or_else(|| {
        EvalFault::ray_trace_failed(format!("surface {surface} undefined at r = {r:.4}"))
    })?;
    let (ux, uy) = if r > 0.0 { (pos.x / r, pos.y / r) } else { (0.0, 0.0) };
    let mut normal = Vector3::new(-slope * ux, -slope * uy, 1.0).normalize();

    let mut cos_i = normal.dot(dir);
    if cos_i < 0.0 {
        normal = -normal;
        cos_i = -cos_i;
    }
    let mu = n1 / n2;
    let k = 1.0 - mu * mu * (1.0 - cos_i * cos_i);
    if k < 0.0 {
        return Err(EvalFault::ray_trace_failed(format!(
            "total internal reflection at surface {surface}"
        )));
    }
    Ok((dir * mu + normal * (k.sqrt() - mu * cos_i)).normalize())
}

/// A field point as it appears in the object table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldPoint {
    /// Degrees.
    Angle { x: f64, y: f64 },
    /// Object height in mm.
    Height { x: f64, y: f64 },
}

impl FieldPoint {
    pub const ON_AXIS: FieldPoint = FieldPoint::Angle { x: 0.0, y: 0.0 };
}

/// Paraxially aims a ray at normalized pupil coordinates `(px, py)` on the
/// entrance pupil of radius `ep_radius` located at `enpp` behind surface 1.
pub fn aim_ray(
    sys: &PreparedSystem,
    field: FieldPoint,
    enpp: f64,
    ep_radius: f64,
    px: f64,
    py: f64,
) -> EvalResult<Ray> {
    let enpp = EvalFault::require_finite(enpp, "entrance pupil position")?;
    let ep_radius = EvalFault::require_finite(ep_radius, "entrance pupil radius")?;
    let target = Vector3::new(px * ep_radius, py * ep_radius, enpp);
    let n0 = sys.surfaces[0].index;

    if sys.object_at_infinity() {
        let (ax, ay) = match field {
            FieldPoint::Angle { x, y } => (x, y),
            FieldPoint::Height { .. } => {
                return Err(EvalFault::unresolvable_field(
                    "object height field with object at infinity",
                ))
            }
        };
        let dir = Vector3::new(ax.to_radians().tan(), ay.to_radians().tan(), 1.0).normalize();
        let z0 = enpp.min(0.0) - 1.0;
        let pos = target - dir * ((enpp - z0) / dir.z);
        return Ok(Ray {
            pos,
            dir,
            opl: n0 * dir.dot(&pos),
        });
    }

    let d = sys.object_distance();
    let object = match field {
        FieldPoint::Angle { x, y } => Vector3::new(
            -(d + enpp) * x.to_radians().tan(),
            -(d + enpp) * y.to_radians().tan(),
            -d,
        ),
        FieldPoint::Height { x, y } => Vector3::new(x, y, -d),
    };
    let delta = target - object;
    if delta.norm() == 0.0 {
        return Err(EvalFault::ray_trace_failed("object point lies on the pupil"));
    }
    Ok(Ray {
        pos: object,
        dir: delta.normalize(),
        opl: 0.0,
    })
}
