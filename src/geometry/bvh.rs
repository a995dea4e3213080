//! BVH (Bounding Volume Hierarchy) over the triangles of a geometry set
//!
//! Answers closest-point, first-hit and crossing-count queries in
//! O(log n) per query.
//!
//! Author: Moroya Sakamoto

use glam::Vec3;

/// Axis-Aligned Bounding Box
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Create an empty (inverted) AABB
    #[inline]
    pub fn empty() -> Self {
        Aabb {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    /// Expand AABB to include a point
    #[inline]
    pub fn expand_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Expand AABB to include another AABB
    #[inline]
    pub fn expand_aabb(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Get center of AABB
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get longest axis (0=X, 1=Y, 2=Z)
    #[inline]
    pub fn longest_axis(&self) -> usize {
        let d = self.max - self.min;
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// Distance from a point to the box (0 inside)
    #[inline]
    pub fn distance(&self, point: Vec3) -> f32 {
        (self.min - point).max(point - self.max).max(Vec3::ZERO).length()
    }

    /// Entry parameter of a ray into the box, if it enters before `t_max`
    #[inline]
    pub fn ray_entry(&self, origin: Vec3, inv_dir: Vec3, t_max: f32) -> Option<f32> {
        let t0 = (self.min - origin) * inv_dir;
        let t1 = (self.max - origin) * inv_dir;
        let near = t0.min(t1).max_element().max(0.0);
        let far = t0.max(t1).min_element().min(t_max);
        (near <= far).then_some(near)
    }
}

/// Triangle with precomputed data and its owning mesh/face
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    /// First corner
    pub v0: Vec3,
    /// Second corner
    pub v1: Vec3,
    /// Third corner
    pub v2: Vec3,
    /// Unit face normal (counter-clockwise winding)
    pub normal: Vec3,
    /// Bounds
    pub aabb: Aabb,
    /// Index of the mesh in its geometry set
    pub obj: u32,
    /// Index of the face in its mesh
    pub face: u32,
}

/// Result of a triangle query: location, barycentrics and distance or ray parameter
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    /// Triangle index in the BVH
    pub triangle: usize,
    /// Point on the triangle
    pub position: Vec3,
    /// Barycentric coordinates relative to (v0, v1, v2)
    pub bary: Vec3,
    /// Euclidean distance, or ray parameter for ray hits
    pub t: f32,
}

impl Triangle {
    /// Create triangle from vertices
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, obj: u32, face: u32) -> Self {
        let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();

        let mut aabb = Aabb::empty();
        aabb.expand_point(v0);
        aabb.expand_point(v1);
        aabb.expand_point(v2);

        Triangle {
            v0,
            v1,
            v2,
            normal,
            aabb,
            obj,
            face,
        }
    }

    /// Closest point on the triangle and its barycentric coordinates
    pub fn closest_point(&self, p: Vec3) -> (Vec3, Vec3) {
        let (a, b, c) = (self.v0, self.v1, self.v2);
        let ab = b - a;
        let ac = c - a;
        let ap = p - a;
        let d1 = ab.dot(ap);
        let d2 = ac.dot(ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return (a, Vec3::X);
        }

        let bp = p - b;
        let d3 = ab.dot(bp);
        let d4 = ac.dot(bp);
        if d3 >= 0.0 && d4 <= d3 {
            return (b, Vec3::Y);
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return (a + ab * v, Vec3::new(1.0 - v, v, 0.0));
        }

        let cp = p - c;
        let d5 = ab.dot(cp);
        let d6 = ac.dot(cp);
        if d6 >= 0.0 && d5 <= d6 {
            return (c, Vec3::Z);
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return (a + ac * w, Vec3::new(1.0 - w, 0.0, w));
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return (b + (c - b) * w, Vec3::new(0.0, 1.0 - w, w));
        }

        let denom = 1.0 / (va + vb + vc);
        let v = vb * denom;
        let w = vc * denom;
        (a + ab * v + ac * w, Vec3::new(1.0 - v - w, v, w))
    }

    /// Möller-Trumbore intersection; returns (t, barycentrics)
    pub fn intersect(&self, origin: Vec3, dir: Vec3) -> Option<(f32, Vec3)> {
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        let h = dir.cross(e2);
        let a = e1.dot(h);
        if a.abs() < 1e-12 {
            return None;
        }
        let f = 1.0 / a;
        let s = origin - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(e1);
        let v = f * dir.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = f * e2.dot(q);
        (t >= 0.0).then_some((t, Vec3::new(1.0 - u - v, u, v)))
    }
}

/// BVH Node
#[derive(Debug)]
pub enum BvhNode {
    /// Leaf node containing triangle indices
    Leaf {
        /// Bounds of the contained triangles
        aabb: Aabb,
        /// Indices into [`MeshBvh::triangles`]
        triangles: Vec<usize>,
    },
    /// Internal node with two children
    Internal {
        /// Bounds of both children
        aabb: Aabb,
        /// First child
        left: Box<BvhNode>,
        /// Second child
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    /// Get AABB of this node
    #[inline]
    pub fn aabb(&self) -> &Aabb {
        match self {
            BvhNode::Leaf { aabb, .. } => aabb,
            BvhNode::Internal { aabb, .. } => aabb,
        }
    }
}

/// BVH for the triangles of every mesh in a geometry set
#[derive(Debug)]
pub struct MeshBvh {
    /// All triangles
    pub triangles: Vec<Triangle>,
    /// Tree root (`None` when there are no triangles)
    pub root: Option<BvhNode>,
}

impl MeshBvh {
    /// Build a BVH over prepared triangles
    pub fn build(triangles: Vec<Triangle>, max_triangles_per_leaf: usize) -> Self {
        if triangles.is_empty() {
            return MeshBvh {
                triangles,
                root: None,
            };
        }

        let indices: Vec<usize> = (0..triangles.len()).collect();
        let root = Self::build_node(&triangles, indices, max_triangles_per_leaf.max(1));
        MeshBvh {
            triangles,
            root: Some(root),
        }
    }

    /// Recursively build BVH nodes
    fn build_node(triangles: &[Triangle], indices: Vec<usize>, max_per_leaf: usize) -> BvhNode {
        let mut aabb = Aabb::empty();
        for &idx in &indices {
            aabb.expand_aabb(&triangles[idx].aabb);
        }

        if indices.len() <= max_per_leaf {
            return BvhNode::Leaf {
                aabb,
                triangles: indices,
            };
        }

        // Split along longest axis using median
        let axis = aabb.longest_axis();
        let mut sorted_indices = indices;
        sorted_indices.sort_by(|&a, &b| {
            let va = triangles[a].aabb.center()[axis];
            let vb = triangles[b].aabb.center()[axis];
            va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal)
        });

        let mid = sorted_indices.len() / 2;
        let right_indices = sorted_indices.split_off(mid);

        let left = Self::build_node(triangles, sorted_indices, max_per_leaf);
        let right = Self::build_node(triangles, right_indices, max_per_leaf);

        BvhNode::Internal {
            aabb,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Closest point within `max_distance`, optionally skipping faces the point is behind
    pub fn nearest(&self, point: Vec3, max_distance: f32, ignore_backfaces: bool) -> Option<TriangleHit> {
        let root = self.root.as_ref()?;
        let mut best: Option<TriangleHit> = None;
        let mut limit = max_distance;
        self.nearest_recursive(root, point, ignore_backfaces, &mut limit, &mut best);
        best
    }

    fn nearest_recursive(
        &self,
        node: &BvhNode,
        point: Vec3,
        ignore_backfaces: bool,
        limit: &mut f32,
        best: &mut Option<TriangleHit>,
    ) {
        match node {
            BvhNode::Leaf { triangles, .. } => {
                for &idx in triangles {
                    let tri = &self.triangles[idx];
                    if ignore_backfaces && tri.normal.dot(point - tri.v0) < 0.0 {
                        continue;
                    }
                    let (position, bary) = tri.closest_point(point);
                    let d = position.distance(point);
                    if d <= *limit {
                        *limit = d;
                        *best = Some(TriangleHit {
                            triangle: idx,
                            position,
                            bary,
                            t: d,
                        });
                    }
                }
            }
            BvhNode::Internal { left, right, .. } => {
                // Query children, closest first
                let left_dist = left.aabb().distance(point);
                let right_dist = right.aabb().distance(point);
                let (first, second, second_dist) = if left_dist < right_dist {
                    (left, right, right_dist)
                } else {
                    (right, left, left_dist)
                };
                if first.aabb().distance(point) <= *limit {
                    self.nearest_recursive(first, point, ignore_backfaces, limit, best);
                }
                if second_dist <= *limit {
                    self.nearest_recursive(second, point, ignore_backfaces, limit, best);
                }
            }
        }
    }

    /// First triangle hit along a ray with parameter in `[0, max_t]`
    pub fn raycast(&self, origin: Vec3, dir: Vec3, max_t: f32, ignore_backfaces: bool) -> Option<TriangleHit> {
        let root = self.root.as_ref()?;
        let inv_dir = dir.recip();
        let mut best: Option<TriangleHit> = None;
        let mut limit = max_t;
        let mut stack: Vec<&BvhNode> = vec![root];
        while let Some(node) = stack.pop() {
            if node.aabb().ray_entry(origin, inv_dir, limit).is_none() {
                continue;
            }
            match node {
                BvhNode::Leaf { triangles, .. } => {
                    for &idx in triangles {
                        let tri = &self.triangles[idx];
                        if ignore_backfaces && tri.normal.dot(dir) > 0.0 {
                            continue;
                        }
                        if let Some((t, bary)) = tri.intersect(origin, dir) {
                            if t <= limit {
                                limit = t;
                                best = Some(TriangleHit {
                                    triangle: idx,
                                    position: origin + dir * t,
                                    bary,
                                    t,
                                });
                            }
                        }
                    }
                }
                BvhNode::Internal { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        best
    }

    /// Number of triangles a ray crosses
    pub fn count_crossings(&self, origin: Vec3, dir: Vec3) -> usize {
        let Some(root) = self.root.as_ref() else {
            return 0;
        };
        let inv_dir = dir.recip();
        let mut count = 0;
        let mut stack: Vec<&BvhNode> = vec![root];
        while let Some(node) = stack.pop() {
            if node.aabb().ray_entry(origin, inv_dir, f32::INFINITY).is_none() {
                continue;
            }
            match node {
                BvhNode::Leaf { triangles, .. } => {
                    count += triangles
                        .iter()
                        .filter(|&&i| self.triangles[i].intersect(origin, dir).is_some())
                        .count();
                }
                BvhNode::Internal { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        count
    }

    /// Get total triangle count
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Get mesh bounds
    pub fn bounds(&self) -> Option<Aabb> {
        self.root.as_ref().map(|r| *r.aabb())
    }
}
