//! Bounding volume hierarchy over the surface disks.
//!
//! Built with a median split along the longest axis of each node's centroid bounds.

use super::ray::{Aabb, Disk, Ray};
use crate::core::surface::SurfacePointCloud;

const MAX_LEAF_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskHit {
    pub disk: usize,
    pub t: f64,
}

#[derive(Debug, Clone)]
enum BvhNode {
    Leaf {
        aabb: Aabb,
        disks: Vec<usize>,
    },
    Internal {
        aabb: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn aabb(&self) -> &Aabb {
        match self {
            BvhNode::Leaf { aabb, .. } | BvhNode::Internal { aabb, .. } => aabb,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiskBvh {
    disks: Vec<Disk>,
    root: Option<BvhNode>,
}

impl DiskBvh {
    pub fn build(cloud: &SurfacePointCloud) -> Self {
        let radius = cloud.disk_radius();
        let disks: Vec<Disk> = cloud
            .points()
            .iter()
            .map(|p| Disk {
                center: p.position,
                normal: p.normal,
                radius,
            })
            .collect();
        Self::from_disks(disks)
    }

    pub fn from_disks(disks: Vec<Disk>) -> Self {
        let mut items: Vec<(usize, Aabb)> = disks
            .iter()
            .enumerate()
            .map(|(id, d)| (id, Aabb::around_disk(&d.center, d.radius)))
            .collect();
        let root = (!items.is_empty()).then(|| build_node(&mut items));
        Self { disks, root }
    }

    pub fn disks(&self) -> &[Disk] {
        &self.disks
    }

    pub fn len(&self) -> usize {
        self.disks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    /// Intersection of the ray with a single disk.
    pub fn intersect_disk(&self, ray: &Ray, disk: usize) -> Option<f64> {
        self.disks.get(disk)?.intersect(ray)
    }

    /// Closest front-facing disk hit, ignoring `skip` (the disk the ray just left).
    pub fn closest_hit(&self, ray: &Ray, skip: Option<usize>) -> Option<DiskHit> {
        let root = self.root.as_ref()?;
        let mut closest: Option<DiskHit> = None;
        let mut closest_t = f64::INFINITY;
        self.closest_in_node(ray, root, skip, &mut closest, &mut closest_t);
        closest
    }

    fn closest_in_node(
        &self,
        ray: &Ray,
        node: &BvhNode,
        skip: Option<usize>,
        closest: &mut Option<DiskHit>,
        closest_t: &mut f64,
    ) {
        let Some((t_entry, _)) = ray.intersect_aabb(node.aabb()) else {
            return;
        };
        if t_entry >= *closest_t {
            return;
        }

        match node {
            BvhNode::Leaf { disks, .. } => {
                for &disk in disks {
                    if Some(disk) == skip {
                        continue;
                    }
                    if let Some(t) = self.disks[disk].intersect(ray) {
                        if t < *closest_t {
                            *closest_t = t;
                            *closest = Some(DiskHit { disk, t });
                        }
                    }
                }
            }
            BvhNode::Internal { left, right, .. } => {
                let left_t = ray.intersect_aabb(left.aabb()).map(|(t, _)| t);
                let right_t = ray.intersect_aabb(right.aabb()).map(|(t, _)| t);
                match (left_t, right_t) {
                    (Some(lt), Some(rt)) if rt < lt => {
                        self.closest_in_node(ray, right, skip, closest, closest_t);
                        self.closest_in_node(ray, left, skip, closest, closest_t);
                    }
                    (Some(_), _) => {
                        self.closest_in_node(ray, left, skip, closest, closest_t);
                        self.closest_in_node(ray, right, skip, closest, closest_t);
                    }
                    (None, Some(_)) => {
                        self.closest_in_node(ray, right, skip, closest, closest_t);
                    }
                    (None, None) => {}
                }
            }
        }
    }
}

fn build_node(items: &mut [(usize, Aabb)]) -> BvhNode {
    let mut bounds = Aabb::empty();
    let mut centroid_bounds = Aabb::empty();
    for (_, aabb) in items.iter() {
        bounds.include(aabb);
        let c = aabb.centroid();
        centroid_bounds.include(&Aabb { min: c, max: c });
    }

    if items.len() <= MAX_LEAF_SIZE {
        return BvhNode::Leaf {
            aabb: bounds,
            disks: items.iter().map(|(id, _)| *id).collect(),
        };
    }

    let axis = centroid_bounds.longest_axis();
    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |a, b| {
        a.1.centroid()[axis].total_cmp(&b.1.centroid()[axis])
    });
    let (left, right) = items.split_at_mut(mid);

    BvhNode::Internal {
        aabb: bounds,
        left: Box::new(build_node(left)),
        right: Box::new(build_node(right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    fn floor(n: i32, spacing: f64) -> Vec<Disk> {
        let mut disks = Vec::new();
        for i in -n..=n {
            for j in -n..=n {
                disks.push(Disk {
                    center: Point3::new(i as f64 * spacing, j as f64 * spacing, 0.0),
                    normal: Vector3::new(0.0, 0.0, 1.0),
                    radius: spacing,
                });
            }
        }
        disks
    }

    fn brute_force(disks: &[Disk], ray: &Ray, skip: Option<usize>) -> Option<DiskHit> {
        disks
            .iter()
            .enumerate()
            .filter(|(id, _)| Some(*id) != skip)
            .filter_map(|(id, d)| d.intersect(ray).map(|t| DiskHit { disk: id, t }))
            .min_by(|a, b| a.t.total_cmp(&b.t))
    }

    #[test]
    fn closest_hit_matches_brute_force() {
        let disks = floor(6, 0.5);
        let bvh = DiskBvh::from_disks(disks.clone());
        for k in 0..20 {
            let x = -2.5 + 0.27 * k as f64;
            let ray = Ray::new(Point3::new(x, 0.3 * x, 4.0), Vector3::new(0.1, -0.2, -1.0));
            let expected = brute_force(&disks, &ray, None);
            let found = bvh.closest_hit(&ray, None);
            // Overlapping disks share a plane, so compare distances rather than ids.
            match (found, expected) {
                (Some(f), Some(e)) => assert!((f.t - e.t).abs() < 1e-12),
                (None, None) => {}
                other => panic!("bvh and brute force disagree: {:?}", other),
            }
        }
    }

    #[test]
    fn skipped_disk_is_ignored() {
        let disks = vec![Disk {
            center: Point3::origin(),
            normal: Vector3::new(0.0, 0.0, 1.0),
            radius: 1.0,
        }];
        let bvh = DiskBvh::from_disks(disks);
        let ray = Ray::new(Point3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(bvh.closest_hit(&ray, None).map(|h| h.disk), Some(0));
        assert!(bvh.closest_hit(&ray, Some(0)).is_none());
    }

    #[test]
    fn upper_disk_shadows_lower_disk() {
        let disks = vec![
            Disk {
                center: Point3::new(0.0, 0.0, 0.0),
                normal: Vector3::new(0.0, 0.0, 1.0),
                radius: 1.0,
            },
            Disk {
                center: Point3::new(0.0, 0.0, 2.0),
                normal: Vector3::new(0.0, 0.0, 1.0),
                radius: 1.0,
            },
        ];
        let bvh = DiskBvh::from_disks(disks);
        let ray = Ray::new(Point3::new(0.1, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
        let hit = bvh.closest_hit(&ray, None).unwrap();
        assert_eq!(hit.disk, 1);
        assert!((hit.t - 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_hierarchy_has_no_hits() {
        let bvh = DiskBvh::from_disks(Vec::new());
        assert!(bvh.is_empty());
        let ray = Ray::new(Point3::origin(), Vector3::new(0.0, 0.0, -1.0));
        assert!(bvh.closest_hit(&ray, None).is_none());
    }
}
