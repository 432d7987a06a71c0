use super::RayRng;
use nalgebra::Vector3;
use rand::Rng;
use std::f64::consts::{FRAC_PI_2, PI};

/// Two unit vectors completing `w` to a right-handed orthonormal basis.
pub fn orthonormal_basis(w: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let helper = if w.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let u = (helper - w * w.dot(&helper)).normalize();
    let v = w.cross(&u);
    (u, v)
}

/// Restricts a direction to the simulation plane in 2D.
#[inline]
pub fn project_to_dimension(direction: Vector3<f64>, dim: usize) -> Option<Vector3<f64>> {
    if dim == 2 {
        let planar = Vector3::new(direction.x, direction.y, 0.0);
        let norm = planar.norm();
        (norm > 1e-12).then(|| planar / norm)
    } else {
        Some(direction)
    }
}

pub fn specular(direction: &Vector3<f64>, normal: &Vector3<f64>) -> Vector3<f64> {
    direction - normal * (2.0 * direction.dot(normal))
}

/// Cosine-weighted direction in the hemisphere around `normal`.
pub fn diffuse(normal: &Vector3<f64>, dim: usize, rng: &mut RayRng) -> Vector3<f64> {
    let (u, v) = orthonormal_basis(normal);
    loop {
        let r1: f64 = rng.r#gen();
        let r2: f64 = rng.r#gen();
        let radius = r1.sqrt();
        let phi = 2.0 * PI * r2;
        let local = u * (radius * phi.cos()) + v * (radius * phi.sin()) + normal * (1.0 - r1).sqrt();
        if let Some(direction) = project_to_dimension(local, dim) {
            if direction.dot(normal) > 0.0 {
                return direction;
            }
        }
    }
}

/// Cosine-weighted direction inside a cone of half angle `cone_angle` around the specular
/// reflection. Directions pointing into the surface are resampled.
pub fn coned_cosine(
    direction: &Vector3<f64>,
    normal: &Vector3<f64>,
    cone_angle: f64,
    dim: usize,
    rng: &mut RayRng,
) -> Vector3<f64> {
    const MAX_ATTEMPTS: usize = 100;

    let mirrored = specular(direction, normal).normalize();
    let (u, v) = orthonormal_basis(&mirrored);
    for _ in 0..MAX_ATTEMPTS {
        let theta = sample_cone_angle(cone_angle, rng);
        let phi = 2.0 * PI * rng.r#gen::<f64>();
        let candidate =
            mirrored * theta.cos() + (u * phi.cos() + v * phi.sin()) * theta.sin();
        if let Some(candidate) = project_to_dimension(candidate, dim) {
            if candidate.dot(normal) > 0.0 {
                return candidate;
            }
        }
    }
    project_to_dimension(mirrored, dim).unwrap_or(*normal)
}

fn sample_cone_angle(cone_angle: f64, rng: &mut RayRng) -> f64 {
    loop {
        let u = rng.r#gen::<f64>().sqrt();
        let sqrt_1m_u = (1.0 - u).sqrt();
        let angle = cone_angle * sqrt_1m_u;
        if rng.r#gen::<f64>() * angle * u <= (FRAC_PI_2 * sqrt_1m_u).cos() * angle.sin() {
            return angle;
        }
    }
}
