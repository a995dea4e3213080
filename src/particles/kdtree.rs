//! Static 3D k-d tree over particle positions
//!
//! The tree is stored implicitly: a permutation of point indices where the
//! median of every sub-range is the splitting point of that range.
//!
//! Author: Moroya Sakamoto

use glam::Vec3;

/// A located particle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Particle index
    pub index: usize,
    /// Squared distance to the query point
    pub distance_sq: f32,
}

/// Balanced k-d tree built once over a fixed point set
#[derive(Debug, Clone, Default)]
pub struct KdTree {
    points: Vec<Vec3>,
    order: Vec<u32>,
    axes: Vec<u8>,
}

impl KdTree {
    /// Build over `points`; indices in results refer to this slice
    pub fn build(points: Vec<Vec3>) -> Self {
        let mut order: Vec<u32> = (0..points.len() as u32).collect();
        let mut axes = vec![0u8; points.len()];
        split(&points, &mut order, &mut axes, 0, points.len());
        KdTree { points, order, axes }
    }

    /// Number of points
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the tree holds no points
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Position of a point
    #[inline]
    pub fn point(&self, index: usize) -> Option<Vec3> {
        self.points.get(index).copied()
    }

    /// The closest point
    pub fn locate_closest(&self, query: Vec3) -> Option<Neighbor> {
        let mut best = Vec::with_capacity(1);
        self.locate_k_nearest(query, 1, &mut best);
        best.first().copied()
    }

    /// The `k` closest points, nearest first
    ///
    /// `out` is cleared first. Equal distances are ordered by index.
    pub fn locate_k_nearest(&self, query: Vec3, k: usize, out: &mut Vec<Neighbor>) {
        out.clear();
        if k == 0 {
            return;
        }
        self.knn(query, k, 0, self.points.len(), out);
    }

    /// Every point within `radius`, nearest first
    pub fn locate_within_radius(&self, query: Vec3, radius: f32, out: &mut Vec<Neighbor>) {
        out.clear();
        if radius < 0.0 {
            return;
        }
        self.range(query, radius * radius, 0, self.points.len(), out);
        out.sort_by(|a, b| {
            a.distance_sq
                .total_cmp(&b.distance_sq)
                .then(a.index.cmp(&b.index))
        });
    }

    fn knn(&self, q: Vec3, k: usize, lo: usize, hi: usize, out: &mut Vec<Neighbor>) {
        if lo >= hi {
            return;
        }
        let mid = (lo + hi) / 2;
        let index = self.order[mid] as usize;
        let p = self.points[index];
        insert_bounded(
            out,
            k,
            Neighbor {
                index,
                distance_sq: p.distance_squared(q),
            },
        );

        let axis = self.axes[mid] as usize;
        let diff = q[axis] - p[axis];
        let (near, far) = if diff < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };
        self.knn(q, k, near.0, near.1, out);
        let bound = if out.len() < k {
            f32::INFINITY
        } else {
            out[out.len() - 1].distance_sq
        };
        if diff * diff <= bound {
            self.knn(q, k, far.0, far.1, out);
        }
    }

    fn range(&self, q: Vec3, r2: f32, lo: usize, hi: usize, out: &mut Vec<Neighbor>) {
        if lo >= hi {
            return;
        }
        let mid = (lo + hi) / 2;
        let index = self.order[mid] as usize;
        let p = self.points[index];
        let d2 = p.distance_squared(q);
        if d2 <= r2 {
            out.push(Neighbor {
                index,
                distance_sq: d2,
            });
        }
        let axis = self.axes[mid] as usize;
        let diff = q[axis] - p[axis];
        if diff <= 0.0 || diff * diff <= r2 {
            self.range(q, r2, lo, mid, out);
        }
        if diff >= 0.0 || diff * diff <= r2 {
            self.range(q, r2, mid + 1, hi, out);
        }
    }
}

fn split(points: &[Vec3], order: &mut [u32], axes: &mut [u8], lo: usize, hi: usize) {
    if hi - lo <= 1 {
        return;
    }
    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);
    for &i in &order[lo..hi] {
        min = min.min(points[i as usize]);
        max = max.max(points[i as usize]);
    }
    let extent = max - min;
    let axis = if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    };

    let mid = (lo + hi) / 2;
    order[lo..hi].select_nth_unstable_by(mid - lo, |&a, &b| {
        points[a as usize][axis].total_cmp(&points[b as usize][axis])
    });
    axes[mid] = axis as u8;
    split(points, order, axes, lo, mid);
    split(points, order, axes, mid + 1, hi);
}

/// Insert into a list sorted by distance, keeping at most `k` entries
fn insert_bounded(out: &mut Vec<Neighbor>, k: usize, n: Neighbor) {
    let pos = out.partition_point(|e| {
        e.distance_sq < n.distance_sq || (e.distance_sq == n.distance_sq && e.index < n.index)
    });
    if pos >= k {
        return;
    }
    if out.len() == k {
        out.pop();
    }
    out.insert(pos, n);
}
