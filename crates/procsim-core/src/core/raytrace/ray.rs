use nalgebra::{Point3, Vector3};

/// Rays starting closer than this to a disk plane do not hit it again.
pub const RAY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point3<f64>,
    /// Unit direction.
    pub direction: Vector3<f64>,
    inv_direction: Vector3<f64>,
    sign: [usize; 3],
}

impl Ray {
    /// Creates a ray; the direction is normalized.
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        let direction = direction.normalize();
        let inv_direction = direction.map(|c| 1.0 / c);
        let sign = [
            usize::from(inv_direction.x < 0.0),
            usize::from(inv_direction.y < 0.0),
            usize::from(inv_direction.z < 0.0),
        ];
        Self {
            origin,
            direction,
            inv_direction,
            sign,
        }
    }

    #[inline]
    pub fn at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }

    /// Slab test. Returns the entry and exit parameters, clamped to `t >= 0`.
    #[inline]
    pub fn intersect_aabb(&self, aabb: &Aabb) -> Option<(f64, f64)> {
        let bounds = [aabb.min, aabb.max];
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;
        for axis in 0..3 {
            let near = (bounds[self.sign[axis]][axis] - self.origin[axis]) * self.inv_direction[axis];
            let far =
                (bounds[1 - self.sign[axis]][axis] - self.origin[axis]) * self.inv_direction[axis];
            // NaN (a flat axis the ray travels inside) leaves the interval unchanged.
            t_min = t_min.max(near);
            t_max = t_max.min(far);
        }
        if t_max >= t_min && t_max >= 0.0 {
            Some((t_min.max(0.0), t_max))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn around_disk(center: &Point3<f64>, radius: f64) -> Self {
        let r = Vector3::repeat(radius);
        Self {
            min: center - r,
            max: center + r,
        }
    }

    pub fn include(&mut self, other: &Aabb) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    pub fn centroid(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn longest_axis(&self) -> usize {
        let extent = self.max - self.min;
        extent.imax()
    }
}

/// A surface disk: centre, outward unit normal and radius.
#[derive(Debug, Clone, Copy)]
pub struct Disk {
    pub center: Point3<f64>,
    pub normal: Vector3<f64>,
    pub radius: f64,
}

impl Disk {
    /// Front-facing intersection parameter. Rays travelling along the normal pass through.
    #[inline]
    pub fn intersect(&self, ray: &Ray) -> Option<f64> {
        let denom = ray.direction.dot(&self.normal);
        if denom >= -1e-12 {
            return None;
        }
        let t = (self.center - ray.origin).dot(&self.normal) / denom;
        if t <= RAY_EPSILON {
            return None;
        }
        let offset = ray.at(t) - self.center;
        (offset.norm_squared() <= self.radius * self.radius).then_some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb {
            min: Point3::new(0.0, 0.0, 0.0),
            max: Point3::new(1.0, 1.0, 1.0),
        }
    }

    #[test]
    fn slab_test_reports_entry_and_exit() {
        let ray = Ray::new(Point3::new(-5.0, 0.5, 0.5), Vector3::new(2.0, 0.0, 0.0));
        let (t_min, t_max) = ray.intersect_aabb(&unit_box()).unwrap();
        assert!((t_min - 5.0).abs() < 1e-10);
        assert!((t_max - 6.0).abs() < 1e-10);
        assert!((ray.direction.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn slab_test_misses_box_beside_the_ray() {
        let ray = Ray::new(Point3::new(-5.0, 5.0, 0.5), Vector3::new(1.0, 0.0, 0.0));
        assert!(ray.intersect_aabb(&unit_box()).is_none());
        let behind = Ray::new(Point3::new(5.0, 0.5, 0.5), Vector3::new(1.0, 0.0, 0.0));
        assert!(behind.intersect_aabb(&unit_box()).is_none());
    }

    #[test]
    fn slab_test_handles_flat_boxes_in_the_plane() {
        let flat = Aabb {
            min: Point3::new(0.0, 0.0, 0.0),
            max: Point3::new(1.0, 1.0, 0.0),
        };
        let ray = Ray::new(Point3::new(0.5, 3.0, 0.0), Vector3::new(0.0, -1.0, 0.0));
        assert!(ray.intersect_aabb(&flat).is_some());
    }

    #[test]
    fn disk_is_hit_only_from_the_front() {
        let disk = Disk {
            center: Point3::new(0.0, 0.0, 0.0),
            normal: Vector3::new(0.0, 0.0, 1.0),
            radius: 0.5,
        };
        let down = Ray::new(Point3::new(0.2, 0.2, 2.0), Vector3::new(0.0, 0.0, -1.0));
        assert!((disk.intersect(&down).unwrap() - 2.0).abs() < 1e-12);

        let up = Ray::new(Point3::new(0.2, 0.2, -2.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(disk.intersect(&up).is_none());

        let outside = Ray::new(Point3::new(0.6, 0.0, 2.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(disk.intersect(&outside).is_none());
    }

    #[test]
    fn aabb_grows_to_include_other_boxes() {
        let mut aabb = Aabb::empty();
        aabb.include(&Aabb::around_disk(&Point3::new(1.0, 0.0, 0.0), 0.5));
        aabb.include(&Aabb::around_disk(&Point3::new(-3.0, 0.0, 0.0), 0.5));
        assert_eq!(aabb.longest_axis(), 0);
        assert!((aabb.centroid().x + 1.0).abs() < 1e-12);
    }
}
